//! Docker Compose integration
//!
//! Locates the compose manifest of a deployment and drives the compose
//! command line tool on its behalf.

pub mod cli;
pub mod parser;
pub mod stats;

pub use cli::ComposeCli;
pub use parser::ComposeManifest;
pub use stats::ResourceUsage;
