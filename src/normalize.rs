//! Derived defaults for resolved database settings
//!
//! Turns a raw site -> role -> settings mapping into a typed [`ConfigTree`].
//! The driver is settled first because the default port depends on it.

use crate::engine::{
    ConfigTree, DatabaseConfig, DatabasePorts, Driver, PartialDatabaseConfig, DEFAULT_COLLATION,
    DEFAULT_HOST,
};
use crate::error::{DbDeployError, Result};
use crate::resolver::validate_shape;
use crate::source::RawSettings;

/// Apply defaults to one database entry
pub fn normalize_database(
    partial: PartialDatabaseConfig,
    ports: &DatabasePorts,
) -> Result<DatabaseConfig> {
    let driver = match partial.driver.as_deref() {
        Some(name) => name.parse::<Driver>()?,
        None if partial.port == Some(ports.pgsql) => Driver::Pgsql,
        None => Driver::Mysql,
    };

    Ok(DatabaseConfig {
        driver,
        database: partial.database.unwrap_or_default(),
        username: partial.username.unwrap_or_default(),
        password: partial.password.unwrap_or_default(),
        host: partial.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: partial.port.unwrap_or_else(|| ports.port_for(driver)),
        prefix: partial.prefix.unwrap_or_default(),
        collation: partial.collation.unwrap_or_else(|| DEFAULT_COLLATION.to_string()),
        admin_username: partial.admin_username,
        admin_password: partial.admin_password,
    })
}

/// Normalize every database entry of a resolved tree
pub fn normalize(tree: &RawSettings, ports: &DatabasePorts) -> Result<ConfigTree> {
    validate_shape(tree)?;

    let mut normalized = ConfigTree::default();
    for (site, roles) in tree {
        let Some(roles) = roles.as_object() else { continue };
        for (role, entry) in roles {
            let partial: PartialDatabaseConfig = serde_json::from_value(entry.clone())
                .map_err(|e| {
                    DbDeployError::invalid_config_shape(format!("Database '{site}.{role}': {e}"))
                })?;
            normalized.insert(site.clone(), role.clone(), normalize_database(partial, ports)?);
        }
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn tree(value: Value) -> RawSettings {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_pgsql_inferred_from_port() {
        let partial = PartialDatabaseConfig { port: Some(5432), ..Default::default() };
        let config = normalize_database(partial, &DatabasePorts::default()).unwrap();
        assert_eq!(config.driver, Driver::Pgsql);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.prefix, "");
        assert_eq!(config.collation, "utf8_general_ci");
    }

    #[test]
    fn test_empty_entry_defaults_to_mysql() {
        let ports = DatabasePorts::default();
        let config = normalize_database(PartialDatabaseConfig::default(), &ports).unwrap();
        assert_eq!(config.driver, Driver::Mysql);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 3306);
        assert_eq!(config.prefix, "");
        assert_eq!(config.collation, "utf8_general_ci");
    }

    #[test]
    fn test_port_default_follows_explicit_driver() {
        let partial =
            PartialDatabaseConfig { driver: Some(":pgsql".to_string()), ..Default::default() };
        let config = normalize_database(partial, &DatabasePorts::default()).unwrap();
        assert_eq!(config.driver, Driver::Pgsql);
        assert_eq!(config.port, 5432);
    }

    #[test]
    fn test_custom_port_table() {
        let ports = DatabasePorts { mysql: 3307, pgsql: 6432 };
        let partial = PartialDatabaseConfig { port: Some(6432), ..Default::default() };
        let config = normalize_database(partial, &ports).unwrap();
        assert_eq!(config.driver, Driver::Pgsql);

        let config = normalize_database(PartialDatabaseConfig::default(), &ports).unwrap();
        assert_eq!(config.port, 3307);
    }

    #[test]
    fn test_existing_values_are_kept() {
        let normalized = normalize(
            &tree(json!({"default": {"default": {
                "driver": "mysql", "database": "app", "host": "db.internal", "port": "3307",
                "prefix": "d7_", "collation": "utf8mb4_general_ci", "admin_username": "root"
            }}})),
            &DatabasePorts::default(),
        )
        .unwrap();
        let config = normalized.get("default", "default").unwrap();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 3307);
        assert_eq!(config.prefix, "d7_");
        assert_eq!(config.collation, "utf8mb4_general_ci");
        assert_eq!(config.admin_username.as_deref(), Some("root"));
    }

    #[test]
    fn test_normalize_every_leaf() {
        let normalized = normalize(
            &tree(json!({
                "default": {"default": {"database": "a"}, "slave": {"port": 5432}},
                "blog": {"default": {"database": "b"}}
            })),
            &DatabasePorts::default(),
        )
        .unwrap();
        assert_eq!(normalized.databases().count(), 3);
        assert_eq!(normalized.get("default", "slave").unwrap().driver, Driver::Pgsql);
        assert_eq!(normalized.get("blog", "default").unwrap().port, 3306);
    }

    #[test]
    fn test_unknown_driver_is_rejected() {
        let result = normalize(
            &tree(json!({"default": {"default": {"driver": "oracle"}}})),
            &DatabasePorts::default(),
        );
        assert!(matches!(result, Err(DbDeployError::InvalidConfigShape(_))));
    }
}
