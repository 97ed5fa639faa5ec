//! Command Line Interface (CLI) layer for ETPRO.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`): parameter merging, anchor pixel
//! prompts, and graceful handling of a declined prompt.
//!
//! If you are embedding ETPRO into another application, prefer using
//! the high-level `etpro::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
