//! CLI subcommand implementations.

pub mod flatten;
pub mod track;
pub mod util;
