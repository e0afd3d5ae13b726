//! dbdeploy - Database settings for Drupal deployments
//!
//! dbdeploy finds database credentials on a deployment target, fills in the
//! defaults Drupal assumes, and administers the databases they point at:
//! existence and emptiness checks, versioned copies, renames, drops, and
//! rewriting the release's `settings.php`.
//!
//! # Architecture
//! All remote work goes through [`ExecutionContext`]. The library never opens
//! a database connection itself; SQL is shipped to the target and run through
//! `drush sql-cli`.
//!
//! # Module Organization
//! - [`error`] - Error types and handling
//! - [`output`] - JSON output envelope types
//! - [`engine`] - Database settings types and SQL dialects
//! - [`exec`] - Command execution on the deployment target
//! - [`source`] - Loading credential sources (PHP and YAML)
//! - [`resolver`] - Picking the first management-complete source
//! - [`normalize`] - Derived defaults for resolved settings
//! - [`admin`] - Database administration and settings file generation
//! - [`config`] - Deployment configuration
//! - [`logging`] - Subscriber setup

pub mod admin;
pub mod config;
pub mod engine;
pub mod error;
pub mod exec;
pub mod logging;
pub mod normalize;
pub mod output;
pub mod resolver;
pub mod source;

pub use admin::{Administrator, DatabaseTarget};
pub use config::{load_with_precedence, DeployConfig};
pub use engine::{ConfigTree, DatabaseConfig, DatabasePorts, Dialect, Driver};
pub use error::{DbDeployError, Result};
pub use exec::{ExecutionContext, ShellExecutor};
pub use normalize::normalize;
pub use output::{ErrorEnvelope, ErrorInfo, Metadata, SuccessEnvelope};
pub use resolver::ConfigResolver;
pub use source::RawSettings;
