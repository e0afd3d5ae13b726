//! dbdeploy CLI Entry Point
//!
//! Resolves database settings on a deployment target and administers the
//! databases they describe. Every subcommand prints one JSON envelope on
//! stdout. Logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use dbdeploy::config::load_with_precedence;
use dbdeploy::logging::init_logging;
use dbdeploy::{
    normalize, Administrator, ConfigResolver, DbDeployError, DeployConfig, ErrorEnvelope,
    ErrorInfo, Metadata, ShellExecutor, SuccessEnvelope,
};

/// dbdeploy - Drupal database settings and administration
#[derive(Parser)]
#[command(name = "dbdeploy")]
#[command(about = "Resolve Drupal database credentials and manage deployment databases")]
#[command(version)]
struct Cli {
    /// Deployment config file (overrides .dbdeploy/config.json and the global config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Site to operate on
    #[arg(long, global = true)]
    site: Option<String>,

    /// Database role within the site
    #[arg(long, global = true)]
    role: Option<String>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve and print the database settings (passwords redacted)
    Configure,

    /// Check whether a database exists
    Exists {
        #[arg(long)]
        database: Option<String>,
    },

    /// Check whether a database has no tables
    Empty {
        #[arg(long)]
        database: Option<String>,
    },

    /// List versioned copies of the selected database, latest first
    Versions,

    /// List the tables of a database
    Tables {
        #[arg(long)]
        database: Option<String>,
    },

    /// Copy every table of one database into a new one
    Copy { from: String, to: String },

    /// Rename a database
    Rename { from: String, to: String },

    /// Drop a database
    Drop { database: String },

    /// Write the resolved settings into the release's settings.php
    UpdateSettings {
        /// Settings template (release-relative, ~/..., or absolute)
        #[arg(long)]
        template: Option<String>,
    },

    /// Run pending database updates
    Updatedb,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Exists { .. } => "exists",
            Self::Empty { .. } => "empty",
            Self::Versions => "versions",
            Self::Tables { .. } => "tables",
            Self::Copy { .. } => "copy",
            Self::Rename { .. } => "rename",
            Self::Drop { .. } => "drop",
            Self::UpdateSettings { .. } => "update-settings",
            Self::Updatedb => "updatedb",
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<DeployConfig> {
    let mut config = load_with_precedence(cli.config.as_deref())?;
    if let Some(site) = &cli.site {
        config.site.clone_from(site);
    }
    if let Some(role) = &cli.role {
        config.role.clone_from(role);
    }
    Ok(config)
}

/// Resolve, normalize, and hand the settings to an administrator
fn administrator(config: &DeployConfig) -> anyhow::Result<Administrator<ShellExecutor>> {
    let ctx = config.executor()?;
    let raw = {
        let mut resolver = ConfigResolver::new(&ctx, config.drush_bin.as_str());
        resolver.resolve(&config.databases_path, &config.databases)?
    };
    let databases = normalize(&raw, &config.database_ports)?;

    let redacted = serde_json::to_string(&databases.redacted())
        .context("Failed to serialize resolved settings")?;
    tracing::debug!(databases = %redacted, "resolved database settings");

    Ok(Administrator::new(ctx, databases, config.drush_bin.as_str()).with_target(config.target()))
}

fn execute(command: &Commands, config: &DeployConfig) -> anyhow::Result<(Value, Option<usize>)> {
    let mut admin = administrator(config)?;

    let result = match command {
        Commands::Configure => {
            let count = admin.databases().databases().count();
            (serde_json::to_value(admin.databases().redacted())?, Some(count))
        }
        Commands::Exists { database } => {
            let exists = admin.exists(database.as_deref())?;
            let name = match database {
                Some(name) => name.clone(),
                None => admin.config(false)?.database,
            };
            (json!({ "database": name, "exists": exists }), None)
        }
        Commands::Empty { database } => {
            let empty = admin.is_empty(database.as_deref())?;
            let name = match database {
                Some(name) => name.clone(),
                None => admin.config(false)?.database,
            };
            (json!({ "database": name, "empty": empty }), None)
        }
        Commands::Versions => {
            let versions = admin.list_versions()?;
            let count = versions.len();
            (json!({ "versions": versions }), Some(count))
        }
        Commands::Tables { database } => {
            let tables = admin.list_tables(database.as_deref())?;
            let count = tables.len();
            (json!({ "tables": tables }), Some(count))
        }
        Commands::Copy { from, to } => {
            admin.copy_database(from, to)?;
            (json!({ "from": from, "to": to }), None)
        }
        Commands::Rename { from, to } => {
            admin.rename_database(from, to)?;
            (json!({ "from": from, "to": to }), None)
        }
        Commands::Drop { database } => {
            admin.drop_database(database)?;
            (json!({ "database": database }), None)
        }
        Commands::UpdateSettings { template } => {
            let template = template.as_deref().unwrap_or(&config.settings_template);
            admin.update_settings_file(admin.databases(), Some(template))?;
            (json!({ "template": template }), None)
        }
        Commands::Updatedb => {
            admin.update_db()?;
            (json!({}), None)
        }
    };

    Ok(result)
}

fn error_info(err: &anyhow::Error) -> ErrorInfo {
    match err.downcast_ref::<DbDeployError>() {
        Some(err) => ErrorInfo::new(err.error_code(), err.message()),
        None => ErrorInfo::new("INTERNAL_ERROR", format!("{err:#}")),
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Failed to serialize output: {e}"),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("{e}");
    }

    let command = cli.command.name();
    let start = Instant::now();

    let mut site = format!(
        "{}.{}",
        cli.site.as_deref().unwrap_or(dbdeploy::admin::DEFAULT_SITE),
        cli.role.as_deref().unwrap_or(dbdeploy::admin::DEFAULT_ROLE)
    );

    let outcome = load_config(&cli).and_then(|config| {
        site = format!("{}.{}", config.site, config.role);
        execute(&cli.command, &config)
    });

    match outcome {
        Ok((data, items)) => {
            let elapsed = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            let meta = match items {
                Some(count) => Metadata::with_items(elapsed, count),
                None => Metadata::new(elapsed),
            };
            print_json(&SuccessEnvelope::new(command, site, data, meta));
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(command, "{err:#}");
            print_json(&ErrorEnvelope::new(command, site, error_info(&err)));
            ExitCode::FAILURE
        }
    }
}
