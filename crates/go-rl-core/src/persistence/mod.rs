//! Binary file formats for weights and the tables the trackers precompute.
//!
//! Every format starts with a `u32` version tag so a future incompatible
//! layout can be rejected cleanly rather than silently misread.

pub mod share_table;
pub mod successor_cache;
pub mod weight_file;

pub const FORMAT_VERSION: u32 = 1;
