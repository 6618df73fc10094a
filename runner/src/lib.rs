//! Sequence runner for the KCF tracker
//!
//! Loads a benchmark-style image sequence (frame list plus initial region),
//! runs [`kcftrack::KcfTracker`] over it and writes the tracked boxes.

pub mod error;
pub mod pipeline;
pub mod sequence;
pub mod settings;

pub use error::{Result, RunnerError};
pub use pipeline::{run_sequence, write_results, RunReport};
pub use sequence::Sequence;
pub use settings::RunnerSettings;

/// Get library version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
