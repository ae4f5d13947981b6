//! Library side of the `rehearsal` binary: option resolution, the debate runner and the
//! Graphviz tree renderer.
//!
//! Runs the baseline debate, the theory-of-mind debate, or both on the same topic
//! ([`Mode`]), prints turns as they are spoken, and writes one JSON report per debate plus
//! a `.dot` (and optionally `.png`) tree per turn into the outputs directory.

pub mod error;
pub mod knowledge;
pub mod options;
pub mod render;
pub mod runner;

pub use error::CliError;
pub use options::{Mode, RunOptions, DEFAULT_MODEL, DEFAULT_OLLAMA_URL, DEFAULT_OUTPUTS};
pub use render::DotFileRenderer;
pub use runner::{run_all, run_debate, write_report, DebateReport};
