//! Process-level introspection.

pub mod stats;

pub use self::stats::{ProcessStats, StatsProvider};
