//! Startup validation of the bridge configuration.

use crate::config::Config;
use crate::error_handling::ConfigError;

impl Config {
    /// Checks that every required field is present and numeric settings are usable.
    ///
    /// All problems are collected into a single [`ConfigError`] so the operator
    /// sees the complete list at once. The bridge refuses to start on error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        let required = [
            ("source", &self.source),
            ("topic", &self.topic),
            ("storage_url", &self.storage_url),
            ("database", &self.database),
            ("table", &self.table),
            ("sql_template", &self.sql_template),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                problems.push(format!("{name} must not be empty"));
            }
        }

        if self.batch_size == 0 {
            problems.push("batch_size must be at least 1".to_string());
        }
        if self.batch_timeout.is_zero() {
            problems.push("batch_timeout must be greater than zero".to_string());
        }
        if self.batch_columns.len() < 2 {
            problems.push(
                "batch_columns needs a timestamp column and at least one field".to_string(),
            );
        }
        if self.batch_columns.iter().any(|c| c.trim().is_empty()) {
            problems.push("batch_columns must not contain empty names".to_string());
        }
        if self.connect_timeout.is_zero() {
            problems.push("connect_timeout must be greater than zero".to_string());
        }
        if self.queue_capacity == 0 {
            problems.push("queue_capacity must be at least 1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            topic: "sensors/air".to_string(),
            storage_url: "sqlite::memory:".to_string(),
            database: "power".to_string(),
            table: "air_sensor_001".to_string(),
            sql_template: "INSERT INTO ${table} VALUES (NOW, ${co2})".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_missing_fields_are_reported_together() {
        let config = Config {
            topic: String::new(),
            table: "   ".to_string(),
            ..valid_config()
        };
        let err = config.validate().unwrap_err();
        let ConfigError::Invalid(problems) = &err;
        assert_eq!(problems.len(), 2);
        let message = err.to_string();
        assert!(message.contains("topic must not be empty"));
        assert!(message.contains("table must not be empty"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = Config {
            batch_size: 0,
            ..valid_config()
        };
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("batch_size"));
    }

    #[test]
    fn test_batch_columns_need_a_field() {
        let config = Config {
            batch_columns: vec!["ts".to_string()],
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }
}
