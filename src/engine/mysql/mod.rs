//! MySQL Dialect
//!
//! SQL for administering MySQL (and MariaDB) servers through `drush sql-cli`.
//!
//! # Implementation Notes
//! - Catalog queries run against `information_schema`
//! - Output of the `mysql` client in batch mode is one header line followed by
//!   one tab-separated row per line
//! - MySQL has no schema rename, so a rename creates the target schema, moves
//!   every table across with `RENAME TABLE`, then drops the source

use crate::engine::{sql_literal, Dialect, Driver};

/// MySQL dialect implementation
pub struct MySqlDialect;

fn ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

impl Dialect for MySqlDialect {
    fn driver(&self) -> Driver {
        Driver::Mysql
    }

    fn server_catalog(&self) -> &'static str {
        "information_schema"
    }

    fn table_catalog<'a>(&self, _database: &'a str) -> &'a str {
        "information_schema"
    }

    fn count_tables_sql(&self, database: &str) -> String {
        format!(
            "SELECT count(*) FROM information_schema.tables WHERE table_schema = {} LIMIT 1;",
            sql_literal(database)
        )
    }

    fn database_exists_sql(&self, database: &str) -> String {
        format!(
            "SELECT COUNT(*) FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = {};",
            sql_literal(database)
        )
    }

    fn list_versions_sql(&self, base: &str) -> String {
        format!(
            "SELECT SCHEMA_NAME FROM information_schema.SCHEMATA WHERE SCHEMA_NAME REGEXP {};",
            sql_literal(&format!("^{base}_[0-9]+$"))
        )
    }

    fn list_tables_sql(&self, database: &str) -> String {
        format!(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = {} AND table_type = 'BASE TABLE';",
            sql_literal(database)
        )
    }

    fn create_copy_sql(&self, _from: &str, to: &str) -> String {
        format!("CREATE DATABASE {};", ident(to))
    }

    fn copy_tables_sql(&self, from: &str, to: &str, tables: &[String]) -> String {
        let mut sql = String::new();
        for table in tables {
            let source = format!("{}.{}", ident(from), ident(table));
            let target = format!("{}.{}", ident(to), ident(table));
            sql.push_str(&format!("CREATE TABLE {target} LIKE {source};\n"));
            sql.push_str(&format!("INSERT INTO {target} SELECT * FROM {source};\n"));
        }
        sql
    }

    fn renames_per_table(&self) -> bool {
        true
    }

    fn rename_database_sql(&self, from: &str, to: &str, tables: &[String]) -> String {
        let mut sql = format!("CREATE DATABASE {};\n", ident(to));
        for table in tables {
            sql.push_str(&format!(
                "RENAME TABLE {}.{} TO {}.{};\n",
                ident(from),
                ident(table),
                ident(to),
                ident(table)
            ));
        }
        sql.push_str(&format!("DROP DATABASE {};\n", ident(from)));
        sql
    }

    fn drop_database_sql(&self, database: &str) -> String {
        format!("DROP DATABASE {};", ident(database))
    }
}
