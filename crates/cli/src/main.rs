//! Command-line front-end over the reinforcement-learning core: `train` runs
//! self-play and learning, `play` is an interactive human-vs-engine game,
//! `selfplay` pits two policies against each other and reports the result,
//! `bench` reports tracker verify/throughput numbers. No GTP loop — these
//! are thin wrappers over `go_rl_core`'s own operations.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rand::RngCore;

use go_rl_core::board::{area_score, GoBoard, SimpleBoard};
use go_rl_core::error::{ConfigError, PersistenceError, RuntimeError};
use go_rl_core::evaluator::Evaluator;
use go_rl_core::features::shared::ShareKind;
use go_rl_core::features::FeatureSetArena;
use go_rl_core::history::{History, PolicyKind, State};
use go_rl_core::learning::{StepSizeMode, Td0Rule};
use go_rl_core::move_filter::MoveFilter;
use go_rl_core::point::{Color, Move, Point};
use go_rl_core::policy::{AtariPolicy, GreedyPolicy, Policy, PriorityPolicy, RandomPolicy};
use go_rl_core::sgf::{emit_game, SgfMove};
use go_rl_core::trackers::TrackerArena;
use go_rl_core::trainer::{EpisodeChoice, ForwardTrainer, Td0Step};
use go_rl_core::weight::WeightSet;

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Persistence(PersistenceError),
    Runtime(RuntimeError),
    Io(io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "{e}"),
            CliError::Persistence(e) => write!(f, "{e}"),
            CliError::Runtime(e) => write!(f, "{e}"),
            CliError::Io(e) => write!(f, "{e}"),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}
impl From<PersistenceError> for CliError {
    fn from(e: PersistenceError) -> Self {
        CliError::Persistence(e)
    }
}
impl From<RuntimeError> for CliError {
    fn from(e: RuntimeError) -> Self {
        CliError::Runtime(e)
    }
}
impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

#[derive(Parser)]
#[command(name = "go-rl", version, about = "Self-play reinforcement learning for Go")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run self-play games and learn a weight table from them.
    Train(TrainArgs),
    /// Play an interactive game against the engine on stdin/stdout.
    Play(PlayArgs),
    /// Two policies play one game against each other and report the result.
    Selfplay(SelfplayArgs),
    /// Report tracker verify/throughput numbers.
    Bench(BenchArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyChoiceArg {
    Greedy,
    Random,
    Priority,
}

fn build_policy(choice: PolicyChoiceArg) -> Box<dyn Policy> {
    match choice {
        PolicyChoiceArg::Greedy => Box::new(GreedyPolicy),
        PolicyChoiceArg::Random => Box::new(RandomPolicy),
        PolicyChoiceArg::Priority => Box::new(PriorityPolicy { atari: AtariPolicy, fallback: Box::new(GreedyPolicy) }),
    }
}

#[derive(clap::Args)]
struct TrainArgs {
    #[arg(long, default_value_t = 5)]
    size: usize,
    #[arg(long, default_value_t = 6.5)]
    komi: f32,
    #[arg(long, default_value_t = 3)]
    window: usize,
    #[arg(long, default_value_t = 100)]
    games: usize,
    #[arg(long, default_value_t = 200)]
    max_moves: usize,
    #[arg(long, default_value_t = 0.1)]
    step_size: f32,
    #[arg(long, value_enum, default_value_t = PolicyChoiceArg::Greedy)]
    policy: PolicyChoiceArg,
    #[arg(long)]
    weights_in: Option<PathBuf>,
    #[arg(long)]
    weights_out: Option<PathBuf>,
    /// Self-play games per batch run concurrently, one evaluator per thread.
    /// `0` uses the number of available cores.
    #[arg(long, default_value_t = 1)]
    threads: usize,
}

#[derive(clap::Args)]
struct PlayArgs {
    #[arg(long, default_value_t = 9)]
    size: usize,
    #[arg(long, default_value_t = 6.5)]
    komi: f32,
    #[arg(long, default_value_t = 3)]
    window: usize,
    #[arg(long, value_enum, default_value_t = PolicyChoiceArg::Greedy)]
    policy: PolicyChoiceArg,
    #[arg(long)]
    weights_in: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = ColorArg::Black)]
    human_color: ColorArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorArg {
    Black,
    White,
}

impl From<ColorArg> for Color {
    fn from(c: ColorArg) -> Color {
        match c {
            ColorArg::Black => Color::Black,
            ColorArg::White => Color::White,
        }
    }
}

#[derive(clap::Args)]
struct SelfplayArgs {
    #[arg(long, default_value_t = 9)]
    size: usize,
    #[arg(long, default_value_t = 6.5)]
    komi: f32,
    #[arg(long, default_value_t = 3)]
    window: usize,
    #[arg(long, default_value_t = 400)]
    max_moves: usize,
    #[arg(long, value_enum, default_value_t = PolicyChoiceArg::Greedy)]
    black_policy: PolicyChoiceArg,
    #[arg(long, value_enum, default_value_t = PolicyChoiceArg::Random)]
    white_policy: PolicyChoiceArg,
    #[arg(long)]
    weights_in: Option<PathBuf>,
    #[arg(long)]
    sgf_out: Option<PathBuf>,
}

#[derive(clap::Args)]
struct BenchArgs {
    #[arg(long, default_value_t = 9)]
    size: usize,
    #[arg(long, default_value_t = 3)]
    window: usize,
    #[arg(long, default_value_t = 2000)]
    moves: usize,
}

fn build_evaluator(size: usize, window: usize, step_size: f32) -> Result<Evaluator, CliError> {
    let mut arena = FeatureSetArena::new();
    let local_shape = arena.add_local_shape(window, window, size);
    let shared = arena.add_shared(local_shape, ShareKind::Ci, true, true)?;
    let trackers = TrackerArena::build(&arena)?;
    let weights = WeightSet::new(format!("local-shape-{window}x{window}-ci"), arena.num_features(shared), step_size);
    let filter = MoveFilter::new(size);
    Ok(Evaluator::new(trackers, weights, filter, shared))
}

fn format_move(mv: Move, size: usize) -> String {
    match mv {
        Move::Play(p) => p.to_coord(size),
        Move::Pass => "pass".to_string(),
        Move::Resign => "resign".to_string(),
    }
}

fn active_snapshot(evaluator: &Evaluator) -> Vec<(u32, i32)> {
    evaluator.trackers.active_set(evaluator.root()).iter().map(|(_, entry)| (entry.feature_index, entry.occurrences)).collect()
}

/// Plays one game between `policies[0]` (black) and `policies[1]` (white),
/// recording every ply into a fresh episode of `history`. Returns the
/// terminal area score.
fn play_game(
    evaluator: &mut Evaluator,
    board: &mut SimpleBoard,
    policies: &mut [Box<dyn Policy>; 2],
    history: &mut History,
    max_moves: usize,
    rng: &mut dyn RngCore,
) -> f32 {
    evaluator.reset(board);
    history.new_episode();
    history.push_state(State::initial(board.to_play(), evaluator.eval(), active_snapshot(evaluator))).unwrap();

    let mut color = Color::Black;
    let mut consecutive_passes = 0usize;
    let mut ply = 0usize;

    while ply < max_moves && consecutive_passes < 2 {
        let policy = &mut policies[color.index()];
        let selected = policy.select(evaluator, board, color, ply, rng);
        let (mut mv, kind) = match selected {
            Some(choice) => (choice.mv, choice.kind),
            None => (Move::Pass, PolicyKind::None),
        };
        if evaluator.play_execute(board, mv, color).is_err() {
            // The filter only tracks vacancy, not legality (simple ko,
            // suicide): a policy's choice can turn out illegal. Pass
            // instead of aborting the game.
            mv = Move::Pass;
            evaluator.play_execute(board, mv, color).expect("pass is always legal");
        }
        consecutive_passes = if mv == Move::Pass { consecutive_passes + 1 } else { 0 };
        ply += 1;
        color = color.opposite();

        history
            .push_state(State {
                timestep: ply,
                color_to_play: color,
                move_played: Some(mv),
                policy_type: kind,
                evaluated: true,
                terminal: false,
                active_set: Some(active_snapshot(evaluator)),
                reward: 0.0,
                eval: evaluator.eval(),
                best_move: None,
                best_value: None,
            })
            .unwrap();
    }

    let score = area_score(board);
    history.terminate_episode(score).unwrap();
    score
}

fn run_train(args: TrainArgs) -> Result<(), CliError> {
    let mut evaluator = build_evaluator(args.size, args.window, args.step_size)?;
    if let Some(path) = &args.weights_in {
        let mut file = File::open(path)?;
        if let Some(report) = evaluator.weights.load(&mut file, false)? {
            eprintln!(
                "{}",
                format!(
                    "loaded weights with size mismatch: dropped {} from file, {} from memory",
                    report.dropped_from_file, report.dropped_from_memory
                )
                .yellow()
            );
        }
    }

    let mut rng = rand::rng();
    let mut rule = Td0Rule::new(StepSizeMode::NormalizedByActiveCount(args.step_size));
    let trainer = ForwardTrainer { episode_choice: EpisodeChoice::Current, replays: 1, k: 1, interleave: true };

    // Self-play generates data in parallel, one evaluator per thread, against
    // a frozen snapshot of the weights; learning itself stays single-threaded
    // so updates are applied to one `WeightSet` in a fixed, reproducible order.
    let threads = if args.threads == 0 { num_cpus::get() } else { args.threads }.max(1);

    let mut total_score = 0.0f64;
    let mut games_done = 0usize;
    while games_done < args.games {
        let batch_len = threads.min(args.games - games_done);
        let weights_snapshot = evaluator.weights.clone();
        let episodes: Vec<Vec<State>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..batch_len)
                .map(|_| {
                    let weights_snapshot = weights_snapshot.clone();
                    let size = args.size;
                    let komi = args.komi;
                    let window = args.window;
                    let policy_choice = args.policy;
                    let max_moves = args.max_moves;
                    scope.spawn(move || {
                        let mut local_evaluator =
                            build_evaluator(size, window, 0.0).expect("evaluator configuration is static");
                        local_evaluator.weights = weights_snapshot;
                        let mut board = SimpleBoard::new(size, komi);
                        let mut history = History::new(1, max_moves + 4);
                        let mut policies: [Box<dyn Policy>; 2] = [build_policy(policy_choice), build_policy(policy_choice)];
                        let mut rng = rand::rng();
                        play_game(&mut local_evaluator, &mut board, &mut policies, &mut history, max_moves, &mut rng);
                        history.get_episode(0).expect("one episode just played").iter().cloned().collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().expect("self-play worker thread panicked")).collect()
        });

        for states in episodes {
            let score = states
                .iter()
                .rev()
                .find(|s| s.terminal && s.color_to_play == Color::Black)
                .map(|s| s.reward)
                .unwrap_or(0.0);
            total_score += score as f64;
            games_done += 1;

            let mut history = History::new(1, states.len() + 1);
            history.new_episode();
            for s in states {
                history.push_state(s).unwrap();
            }
            let updates = trainer.train(&history, &mut evaluator.weights, &mut Td0Step { rule: &mut rule }, &mut rng);
            rule.games_played += 1;

            if games_done % 10 == 0 || games_done == args.games {
                println!(
                    "game {:>5}/{} | score {:>+7.1} | avg {:>+7.2} | updates {}",
                    games_done,
                    args.games,
                    score,
                    total_score / games_done as f64,
                    updates
                );
            }
        }
    }

    if let Some(path) = &args.weights_out {
        let mut file = File::create(path)?;
        evaluator.weights.save(&mut file)?;
        println!("{}", format!("wrote weights to {}", path.display()).green());
    }
    Ok(())
}

fn run_play(args: PlayArgs) -> Result<(), CliError> {
    let mut evaluator = build_evaluator(args.size, args.window, 0.0)?;
    if let Some(path) = &args.weights_in {
        let mut file = File::open(path)?;
        evaluator.weights.load(&mut file, false)?;
    }
    let mut board = SimpleBoard::new(args.size, args.komi);
    evaluator.reset(&board);

    let human: Color = args.human_color.into();
    let mut engine_policy = build_policy(args.policy);
    let mut rng = rand::rng();
    let stdin = io::stdin();
    let mut lines = BufReader::new(stdin.lock()).lines();

    loop {
        print!("{board}");
        if board.to_play() == human {
            print!("{} to play ({}), enter a move (e.g. D4, pass, resign): ", human, "you".cyan());
            io::stdout().flush()?;
            let Some(Ok(line)) = lines.next() else { break };
            let trimmed = line.trim();
            let mv = if trimmed.eq_ignore_ascii_case("pass") {
                Move::Pass
            } else if trimmed.eq_ignore_ascii_case("resign") {
                Move::Resign
            } else {
                match Point::from_coord(trimmed, args.size) {
                    Some(p) => Move::Play(p),
                    None => {
                        println!("{}", "couldn't parse that move".red());
                        continue;
                    }
                }
            };
            if mv == Move::Resign {
                println!("{}", "you resigned".red());
                break;
            }
            if evaluator.play_execute(&mut board, mv, human).is_err() {
                println!("{}", "illegal move".red());
                continue;
            }
        } else {
            let color = board.to_play();
            let choice = engine_policy.select(&mut evaluator, &mut board, color, board.move_number(), &mut rng);
            let mv = choice.map(|c| c.mv).unwrap_or(Move::Pass);
            println!("engine plays {}", format_move(mv, args.size).cyan());
            evaluator.play_execute(&mut board, mv, color).expect("engine move was legal by construction");
        }
    }

    println!("final score (black's perspective): {:+.1}", area_score(&board));
    Ok(())
}

fn run_selfplay(args: SelfplayArgs) -> Result<(), CliError> {
    let mut evaluator = build_evaluator(args.size, args.window, 0.0)?;
    if let Some(path) = &args.weights_in {
        let mut file = File::open(path)?;
        evaluator.weights.load(&mut file, false)?;
    }
    let mut board = SimpleBoard::new(args.size, args.komi);
    let mut history = History::new(1, args.max_moves + 4);
    let mut rng = rand::rng();
    let mut policies: [Box<dyn Policy>; 2] = [build_policy(args.black_policy), build_policy(args.white_policy)];

    let score = play_game(&mut evaluator, &mut board, &mut policies, &mut history, args.max_moves, &mut rng);
    println!("{board}");
    println!("final score (black's perspective): {:+.1}", score);
    println!("winner: {}", if score > 0.0 { "black".cyan() } else if score < 0.0 { "white".cyan() } else { "draw".yellow() });

    if let Some(path) = &args.sgf_out {
        let episode = history.get_episode(0).expect("just played one episode");
        let moves: Vec<SgfMove> = episode
            .iter()
            .filter_map(|s| s.move_played.map(|mv| SgfMove { color: s.color_to_play.opposite(), mv }))
            .collect();
        let sgf = emit_game(args.size, args.komi, &moves);
        let mut file = File::create(path)?;
        file.write_all(sgf.as_bytes())?;
        println!("{}", format!("wrote game record to {}", path.display()).green());
    }
    Ok(())
}

fn run_bench(args: BenchArgs) -> Result<(), CliError> {
    let mut evaluator = build_evaluator(args.size, args.window, 0.0)?;
    let mut board = SimpleBoard::new(args.size, 6.5);
    evaluator.reset(&board);
    let mut rng = rand::rng();

    let started = Instant::now();
    let mut played = 0usize;
    while played < args.moves {
        let len = evaluator.filter.len();
        if len == 0 {
            board = SimpleBoard::new(args.size, 6.5);
            evaluator.reset(&board);
            continue;
        }
        let idx = rng.next_u32() as usize % len;
        let Some(p) = evaluator.filter.iter().nth(idx) else { continue };
        let color = board.to_play();
        if evaluator.play_execute(&mut board, Move::Play(p), color).is_err() {
            continue;
        }
        played += 1;
    }
    let elapsed = started.elapsed();
    println!(
        "{played} moves in {:.3}s ({:.0} moves/sec) on a {}x{} board, window {}",
        elapsed.as_secs_f64(),
        played as f64 / elapsed.as_secs_f64().max(1e-9),
        args.size,
        args.size,
        args.window
    );
    Ok(())
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Train(args) => run_train(args),
        Command::Play(args) => run_play(args),
        Command::Selfplay(args) => run_selfplay(args),
        Command::Bench(args) => run_bench(args),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{}: {}", "error".red().bold(), err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
