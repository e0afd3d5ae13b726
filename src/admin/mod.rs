//! Remote Database Administration
//!
//! The [`Administrator`] owns a normalized [`ConfigTree`] and issues SQL to the
//! deployment target through `drush sql-cli`. It is the only stateful piece of
//! dbdeploy: it remembers, per database name, whether that database was last
//! seen empty.
//!
//! # Status Cache
//! - [`Administrator::is_empty`] queries once per name, then answers from cache
//! - [`Administrator::list_tables`] refreshes the entry as a side effect
//! - copy and rename forget the destination's entry
//! - drop, and the source of a rename, are recorded as empty
//!
//! # Credentials
//! Emptiness checks use the ordinary credentials. Everything else connects
//! with `admin_username`/`admin_password` and fails with
//! `MissingAdminCredentials` before touching the target when they are absent.
//!
//! Every statement is staged in a temporary file on the target and fed to
//! `sql-cli` on stdin, then the file is removed.

use std::collections::HashMap;

use crate::engine::{ConfigTree, DatabaseConfig, Dialect};
use crate::error::{DbDeployError, Result};
use crate::exec::{shell_quote, stage_file, ExecutionContext};

pub mod settings;

pub const DEFAULT_SITE: &str = "default";
pub const DEFAULT_ROLE: &str = "default";

fn dialect(config: &DatabaseConfig) -> &'static dyn Dialect {
    config.driver.dialect()
}

/// Which database of the tree an operation applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub site: String,
    pub role: String,
}

impl DatabaseTarget {
    pub fn new(site: impl Into<String>, role: impl Into<String>) -> Self {
        Self { site: site.into(), role: role.into() }
    }
}

impl Default for DatabaseTarget {
    fn default() -> Self {
        Self::new(DEFAULT_SITE, DEFAULT_ROLE)
    }
}

/// Administers the databases of one deployment target
pub struct Administrator<E: ExecutionContext> {
    ctx: E,
    databases: ConfigTree,
    target: DatabaseTarget,
    drush_bin: String,
    status: HashMap<String, bool>,
}

impl<E: ExecutionContext> Administrator<E> {
    pub fn new(ctx: E, databases: ConfigTree, drush_bin: impl Into<String>) -> Self {
        Self {
            ctx,
            databases,
            target: DatabaseTarget::default(),
            drush_bin: drush_bin.into(),
            status: HashMap::new(),
        }
    }

    /// Select the database operations apply to by default
    #[must_use]
    pub fn with_target(mut self, target: DatabaseTarget) -> Self {
        self.target = target;
        self
    }

    pub fn set_target(&mut self, target: DatabaseTarget) {
        self.target = target;
    }

    #[must_use]
    pub fn target(&self) -> &DatabaseTarget {
        &self.target
    }

    #[must_use]
    pub fn databases(&self) -> &ConfigTree {
        &self.databases
    }

    #[must_use]
    pub fn context(&self) -> &E {
        &self.ctx
    }

    /// Cached emptiness of `database`, if known
    #[must_use]
    pub fn cached_status(&self, database: &str) -> Option<bool> {
        self.status.get(database).copied()
    }

    /// Settings of the selected database, optionally with admin credentials
    pub fn config(&self, admin: bool) -> Result<DatabaseConfig> {
        let DatabaseTarget { site, role } = &self.target;
        let config = self
            .databases
            .get(site, role)
            .ok_or_else(|| DbDeployError::unknown_database(site, role))?;
        if admin {
            config.as_admin().ok_or_else(|| DbDeployError::missing_admin_credentials(site, role))
        } else {
            Ok(config.clone())
        }
    }

    fn database_name(&self, database: Option<&str>) -> Result<String> {
        match database {
            Some(name) => Ok(name.to_string()),
            None => Ok(self.config(false)?.database),
        }
    }

    fn sql_command(&self, config: &DatabaseConfig, tmp: &str) -> String {
        let tmp = shell_quote(tmp);
        format!(
            "cd {} && {} sql-cli --db-url={} < {tmp} && rm -f {tmp}",
            shell_quote(self.ctx.current_release_path()),
            self.drush_bin,
            shell_quote(&config.url()),
        )
    }

    /// Execute `sql` against `config`
    fn run_sql(&self, sql: &str, config: &DatabaseConfig) -> Result<()> {
        let tmp = stage_file(&self.ctx, sql)?;
        self.ctx.run(&self.sql_command(config, &tmp))
    }

    /// Execute `sql` against `config` and return one value per result row
    fn query_rows(&self, sql: &str, config: &DatabaseConfig) -> Result<Vec<String>> {
        let tmp = stage_file(&self.ctx, sql)?;
        let output = self.ctx.capture(&self.sql_command(config, &tmp))?;
        Ok(dialect(config).parse_rows(&output))
    }

    fn query_count(&self, sql: &str, config: &DatabaseConfig) -> Result<u64> {
        let rows = self.query_rows(sql, config)?;
        Ok(rows.first().and_then(|count| count.trim().parse().ok()).unwrap_or(0))
    }

    /// Whether `database` (default: the selected one) has no tables
    pub fn is_empty(&mut self, database: Option<&str>) -> Result<bool> {
        let name = self.database_name(database)?;
        if let Some(empty) = self.status.get(&name) {
            return Ok(*empty);
        }

        let config = self.config(false)?;
        let dialect = dialect(&config);
        self.ctx.log_info(&format!("Fetching status of db {name}"));
        let count = self.query_count(
            &dialect.count_tables_sql(&name),
            &config.with_database(dialect.table_catalog(&name)),
        )?;

        let empty = count == 0;
        self.status.insert(name, empty);
        Ok(empty)
    }

    /// Whether a database named `database` (default: the selected one) exists
    pub fn exists(&self, database: Option<&str>) -> Result<bool> {
        let config = self.config(true)?;
        let name = database.map_or_else(|| config.database.clone(), str::to_string);
        let dialect = dialect(&config);
        self.ctx.log_info(&format!("Checking existence of {name}"));
        let count = self.query_count(
            &dialect.database_exists_sql(&name),
            &config.with_database(dialect.server_catalog()),
        )?;
        Ok(count != 0)
    }

    /// Versioned snapshots `<database>_<n>` of the selected database, latest first
    pub fn list_versions(&self) -> Result<Vec<String>> {
        let config = self.config(true)?;
        let dialect = dialect(&config);
        self.ctx.log_info("Getting list of database versions");
        let mut versions = self.query_rows(
            &dialect.list_versions_sql(&config.database),
            &config.with_database(dialect.server_catalog()),
        )?;
        versions.sort_unstable_by(|a, b| b.cmp(a));
        Ok(versions)
    }

    /// Base tables of `database` (default: the selected one); refreshes its status
    pub fn list_tables(&mut self, database: Option<&str>) -> Result<Vec<String>> {
        let config = self.config(true)?;
        let name = database.map_or_else(|| config.database.clone(), str::to_string);
        let dialect = dialect(&config);
        self.ctx.log_info(&format!("Fetching table list of {name}"));
        let tables = self.query_rows(
            &dialect.list_tables_sql(&name),
            &config.with_database(dialect.table_catalog(&name)),
        )?;
        self.status.insert(name, tables.is_empty());
        Ok(tables)
    }

    /// Copy every table of `from` into a new database `to`
    pub fn copy_database(&mut self, from: &str, to: &str) -> Result<()> {
        let config = self.config(true)?;
        let dialect = dialect(&config);
        self.ctx.log_info(&format!("Copying database {from} to {to}"));

        let tables = self.list_tables(Some(from))?;
        let server = config.with_database(dialect.server_catalog());
        self.run_sql(&dialect.create_copy_sql(from, to), &server)?;

        let script = dialect.copy_tables_sql(from, to, &tables);
        if !script.is_empty() {
            self.run_sql(&script, &server)?;
        }

        self.status.remove(to);
        Ok(())
    }

    /// Rename `from` to `to`
    pub fn rename_database(&mut self, from: &str, to: &str) -> Result<()> {
        let config = self.config(true)?;
        let dialect = dialect(&config);
        self.ctx.log_info(&format!("Renaming database {from} to {to}"));

        let tables = if dialect.renames_per_table() {
            self.list_tables(Some(from))?
        } else {
            Vec::new()
        };
        let server = config.with_database(dialect.server_catalog());
        self.run_sql(&dialect.rename_database_sql(from, to, &tables), &server)?;

        // `from` is gone, like after a drop
        self.status.insert(from.to_string(), true);
        self.status.remove(to);
        Ok(())
    }

    /// Drop `database`; it is recorded as empty afterwards
    pub fn drop_database(&mut self, database: &str) -> Result<()> {
        let config = self.config(true)?;
        let dialect = dialect(&config);
        self.ctx.log_info(&format!("Dropping database {database}"));

        self.run_sql(
            &dialect.drop_database_sql(database),
            &config.with_database(dialect.server_catalog()),
        )?;

        self.status.insert(database.to_string(), true);
        Ok(())
    }

    /// Run pending database updates of the current release
    pub fn update_db(&self) -> Result<()> {
        self.ctx.log_info("Running database updates");
        self.ctx.run(&format!(
            "cd {} && {} updatedb --yes",
            shell_quote(self.ctx.current_release_path()),
            self.drush_bin
        ))
    }

    /// Write `databases` into the release's settings file
    ///
    /// Only standard connection keys are written. `template` defaults to
    /// `sites/default/default.settings.php` and resolves like a source path.
    pub fn update_settings_file(
        &self,
        databases: &ConfigTree,
        template: Option<&str>,
    ) -> Result<()> {
        let release = self.ctx.current_release_path();
        let template = template.unwrap_or(settings::DEFAULT_TEMPLATE);
        self.ctx.log_info(&format!("Writing database settings from template {template}"));

        let script = settings::settings_script(release, template, databases);
        let tmp = shell_quote(&stage_file(&self.ctx, &script)?);
        self.ctx.run(&format!(
            "cd {} && {} php-script {tmp} && rm -f {tmp}",
            shell_quote(release),
            self.drush_bin
        ))
    }
}
