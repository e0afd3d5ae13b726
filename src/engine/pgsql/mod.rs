//! PostgreSQL Dialect
//!
//! SQL for administering PostgreSQL servers through `drush sql-cli`.
//!
//! # Implementation Notes
//! - Server-wide queries (existence, versions, DDL) connect to `postgres`
//! - Table catalogs are per-database in PostgreSQL, so table queries connect to
//!   the inspected database itself and look at its `public` schema
//! - Copies use `CREATE DATABASE ... TEMPLATE`, renames use `ALTER DATABASE`
//! - `psql` output is an aligned table: header, rule line, rows, `(N rows)` footer

use crate::engine::{sql_literal, Dialect, Driver};

/// PostgreSQL dialect implementation
pub struct PgsqlDialect;

fn ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl Dialect for PgsqlDialect {
    fn driver(&self) -> Driver {
        Driver::Pgsql
    }

    fn server_catalog(&self) -> &'static str {
        "postgres"
    }

    fn table_catalog<'a>(&self, database: &'a str) -> &'a str {
        database
    }

    fn count_tables_sql(&self, database: &str) -> String {
        format!(
            "SELECT count(*) FROM information_schema.tables \
             WHERE table_catalog = {} AND table_schema = 'public';",
            sql_literal(database)
        )
    }

    fn database_exists_sql(&self, database: &str) -> String {
        format!("SELECT count(*) FROM pg_database WHERE datname = {};", sql_literal(database))
    }

    fn list_versions_sql(&self, base: &str) -> String {
        format!(
            "SELECT datname FROM pg_database WHERE datname ~ {};",
            sql_literal(&format!("^{base}_[0-9]+$"))
        )
    }

    fn list_tables_sql(&self, database: &str) -> String {
        format!(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_catalog = {} AND table_schema = 'public' AND table_type = 'BASE TABLE';",
            sql_literal(database)
        )
    }

    fn create_copy_sql(&self, from: &str, to: &str) -> String {
        format!("CREATE DATABASE {} TEMPLATE {};", ident(to), ident(from))
    }

    fn copy_tables_sql(&self, _from: &str, _to: &str, _tables: &[String]) -> String {
        String::new()
    }

    fn renames_per_table(&self) -> bool {
        false
    }

    fn rename_database_sql(&self, from: &str, to: &str, _tables: &[String]) -> String {
        format!("ALTER DATABASE {} RENAME TO {};", ident(from), ident(to))
    }

    fn drop_database_sql(&self, database: &str) -> String {
        format!("DROP DATABASE {};", ident(database))
    }

    fn parse_rows(&self, output: &str) -> Vec<String> {
        output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .skip(1)
            .filter(|line| !line.starts_with("---") && !is_row_count_footer(line))
            .map(String::from)
            .collect()
    }
}

fn is_row_count_footer(line: &str) -> bool {
    line.starts_with('(') && (line.ends_with(" row)") || line.ends_with(" rows)"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rename_is_single_statement() {
        assert_eq!(
            PgsqlDialect.rename_database_sql("app", "app_1", &["node".to_string()]),
            r#"ALTER DATABASE "app" RENAME TO "app_1";"#
        );
        assert!(!PgsqlDialect.renames_per_table());
    }

    #[test]
    fn test_copy_uses_template() {
        assert_eq!(
            PgsqlDialect.create_copy_sql("app", "app_2"),
            r#"CREATE DATABASE "app_2" TEMPLATE "app";"#
        );
        assert!(PgsqlDialect.copy_tables_sql("app", "app_2", &["node".to_string()]).is_empty());
    }

    #[test]
    fn test_parse_rows_strips_psql_decoration() {
        let output = " table_name \n------------\n node\n users\n(2 rows)\n\n";
        assert_eq!(PgsqlDialect.parse_rows(output), vec!["node".to_string(), "users".to_string()]);

        let output = " count \n-------\n     0\n(1 row)\n";
        assert_eq!(PgsqlDialect.parse_rows(output), vec!["0".to_string()]);
    }

    #[test]
    fn test_catalogs() {
        assert_eq!(PgsqlDialect.server_catalog(), "postgres");
        assert_eq!(PgsqlDialect.table_catalog("app"), "app");
    }
}
