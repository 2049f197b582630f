//! Engine configuration
//!
//! `pkgdeploy.toml` tunes the retry and cleanup loops, selects which
//! built-in content transforms are registered, and supplies the token
//! values the preprocessor substitutes.

pub mod parser;
pub mod schema;

pub use parser::{parse_deploy_toml, parse_deploy_toml_str, to_toml};
pub use schema::{CleanupSettings, DeployConfig, RetrySettings, TransformSettings};
