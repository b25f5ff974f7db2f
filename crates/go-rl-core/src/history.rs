//! Fixed-capacity ring of episodes, each a finite sequence of per-timestep
//! states, feeding the learning rules and trainers in [`crate::learning`]
//! and [`crate::trainer`].

use crate::error::RuntimeError;
use crate::point::{Color, Move};

/// Which policy (if any) produced the move recorded in a [`State`] — lets a
/// learning rule tell on-policy from off-policy steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    None,
    Best,
    On,
    Off,
    Terminal,
}

/// One ply's worth of recorded state. `active_set` is a plain snapshot of
/// `(feature_index, occurrences)` pairs rather than a live
/// [`crate::trackers::active_set::ActiveSet`] — history outlives any one
/// tracker instance and only ever needs to replay this list into a learning
/// rule, never to accept further incremental changes.
#[derive(Debug, Clone)]
pub struct State {
    pub timestep: usize,
    pub color_to_play: Color,
    pub move_played: Option<Move>,
    pub policy_type: PolicyKind,
    pub evaluated: bool,
    pub terminal: bool,
    pub active_set: Option<Vec<(u32, i32)>>,
    pub reward: f32,
    pub eval: f32,
    pub best_move: Option<Move>,
    pub best_value: Option<f32>,
}

impl State {
    /// The initial, pre-first-move state for a fresh episode (`t = 0`).
    pub fn initial(color_to_play: Color, eval: f32, active_set: Vec<(u32, i32)>) -> State {
        State {
            timestep: 0,
            color_to_play,
            move_played: None,
            policy_type: PolicyKind::None,
            evaluated: true,
            terminal: false,
            active_set: Some(active_set),
            reward: 0.0,
            eval,
            best_move: None,
            best_value: None,
        }
    }
}

/// Up to `t_max` states for one game.
#[derive(Debug, Clone)]
pub struct Episode {
    states: Vec<State>,
    t_max: usize,
}

impl Episode {
    fn new(t_max: usize) -> Episode {
        Episode { states: Vec::new(), t_max }
    }

    pub fn push(&mut self, state: State) -> Result<(), RuntimeError> {
        if state.timestep >= self.t_max {
            return Err(RuntimeError::TimestepOutOfRange { timestep: state.timestep, length: self.t_max });
        }
        self.states.push(state);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn get(&self, t: usize) -> Option<&State> {
        self.states.get(t)
    }

    /// Sum of rewards over the episode so far, including any terminal
    /// states already appended.
    pub fn return_value(&self) -> f32 {
        self.states.iter().map(|s| s.reward).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &State> {
        self.states.iter()
    }
}

/// Fixed-capacity ring buffer of [`Episode`]s.
#[derive(Debug, Clone)]
pub struct History {
    episodes: Vec<Episode>,
    capacity: usize,
    /// Index of the most recently started episode within `episodes`.
    cursor: usize,
    t_max: usize,
    /// Number of episodes actually recorded so far, capped at `capacity`.
    filled: usize,
}

impl History {
    pub fn new(capacity: usize, t_max: usize) -> History {
        assert!(capacity > 0, "history capacity must be positive");
        History { episodes: Vec::with_capacity(capacity), capacity, cursor: 0, t_max, filled: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of episodes currently held (`<= capacity`).
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Starts a new episode, overwriting the oldest one once the ring is
    /// full. Returns the index of the new current episode (for callers that
    /// want to push states immediately after).
    pub fn new_episode(&mut self) -> usize {
        if self.episodes.len() < self.capacity {
            self.episodes.push(Episode::new(self.t_max));
            self.cursor = self.episodes.len() - 1;
        } else {
            self.cursor = (self.cursor + 1) % self.capacity;
            self.episodes[self.cursor] = Episode::new(self.t_max);
        }
        self.filled = (self.filled + 1).min(self.capacity);
        self.cursor
    }

    pub fn current(&self) -> &Episode {
        &self.episodes[self.cursor]
    }

    pub fn current_mut(&mut self) -> &mut Episode {
        &mut self.episodes[self.cursor]
    }

    pub fn push_state(&mut self, state: State) -> Result<(), RuntimeError> {
        self.current_mut().push(state)
    }

    /// Appends two terminal states, one per color, so every color sees a
    /// terminal self-transition: black's reward is `score`, white's `-score`
    /// (an Open Question resolution matching area-score convention used
    /// elsewhere in the crate, see [`crate::point::Color::sign`]).
    pub fn terminate_episode(&mut self, score: f32) -> Result<(), RuntimeError> {
        let start = self.current().len();
        for (offset, color) in [Color::Black, Color::White].into_iter().enumerate() {
            let reward = score * color.sign();
            self.push_state(State {
                timestep: start + offset,
                color_to_play: color,
                move_played: None,
                policy_type: PolicyKind::Terminal,
                evaluated: true,
                terminal: true,
                active_set: None,
                reward,
                eval: reward,
                best_move: None,
                best_value: None,
            })?;
        }
        Ok(())
    }

    /// `n = 0` is the current (most recently started) episode, `n = 1` the
    /// one before it, and so on back to `len() - 1`.
    pub fn get_episode(&self, n: usize) -> Option<&Episode> {
        if n >= self.filled {
            return None;
        }
        let idx = (self.cursor + self.capacity - n) % self.capacity;
        self.episodes.get(idx)
    }

    pub fn get_state(&self, t: usize, n: usize) -> Option<&State> {
        self.get_episode(n)?.get(t)
    }

    pub fn return_of(&self, n: usize) -> Option<f32> {
        self.get_episode(n).map(Episode::return_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_dummy(history: &mut History, t: usize, terminal: bool) {
        history
            .push_state(State {
                timestep: t,
                color_to_play: Color::Black,
                move_played: None,
                policy_type: PolicyKind::On,
                evaluated: true,
                terminal,
                active_set: None,
                reward: 0.0,
                eval: 0.0,
                best_move: None,
                best_value: None,
            })
            .unwrap();
    }

    #[test]
    fn ring_buffer_overwrites_oldest_once_full() {
        let mut history = History::new(2, 16);
        history.new_episode();
        push_dummy(&mut history, 0, false);
        history.new_episode();
        push_dummy(&mut history, 0, false);
        assert_eq!(history.len(), 2);

        history.new_episode(); // capacity 2: overwrites episode 0
        push_dummy(&mut history, 0, false);
        assert_eq!(history.len(), 2);
        // The most recent three episodes requested as n=0,1,2 -> only two exist.
        assert!(history.get_episode(0).is_some());
        assert!(history.get_episode(1).is_some());
        assert!(history.get_episode(2).is_none());
    }

    #[test]
    fn terminate_episode_appends_both_colors_with_opposite_reward() {
        let mut history = History::new(4, 16);
        history.new_episode();
        push_dummy(&mut history, 0, false);
        history.terminate_episode(7.5).unwrap();
        assert_eq!(history.current().len(), 3);
        let black_terminal = history.get_state(1, 0).unwrap();
        let white_terminal = history.get_state(2, 0).unwrap();
        assert_eq!(black_terminal.reward, 7.5);
        assert_eq!(white_terminal.reward, -7.5);
        assert!(black_terminal.terminal && white_terminal.terminal);
    }

    #[test]
    fn push_past_t_max_is_an_error() {
        let mut history = History::new(1, 2);
        history.new_episode();
        push_dummy(&mut history, 0, false);
        push_dummy(&mut history, 1, false);
        let err = history
            .current_mut()
            .push(State {
                timestep: 2,
                color_to_play: Color::Black,
                move_played: None,
                policy_type: PolicyKind::On,
                evaluated: true,
                terminal: false,
                active_set: None,
                reward: 0.0,
                eval: 0.0,
                best_move: None,
                best_value: None,
            })
            .unwrap_err();
        assert!(matches!(err, RuntimeError::TimestepOutOfRange { timestep: 2, length: 2 }));
    }

    #[test]
    fn return_of_sums_rewards_including_terminal() {
        let mut history = History::new(2, 16);
        history.new_episode();
        push_dummy(&mut history, 0, false);
        history.terminate_episode(3.0).unwrap();
        // Black's terminal (+3) and white's terminal (-3) both count.
        assert_eq!(history.return_of(0).unwrap(), 0.0);
    }
}
