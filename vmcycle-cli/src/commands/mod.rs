//! CLI command implementations

pub mod config;
pub mod plan;
pub mod run;

pub use plan::plan;
pub use run::run;
