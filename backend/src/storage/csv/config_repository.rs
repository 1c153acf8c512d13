//! # Ledger Config Repository
//!
//! Stores `LedgerConfig` as `ledger_config.yaml` at the root of the data
//! directory. The file is created with defaults the first time it is read.
//!
//! ## YAML Format
//!
//! ```yaml
//! data_format_version: "1.0"
//! empty_summary_placeholder: "-"
//! decimal_separator: ","
//! thousands_separator: "."
//! cancellation_marker: "[CANCELADO]"
//! optimistic_concurrency: false
//! created_at: "2025-01-21T19:30:00Z"
//! updated_at: "2025-01-21T19:35:00Z"
//! ```

use anyhow::{anyhow, Result};
use chrono::Utc;
use log::{debug, info};
use std::fs;
use std::path::PathBuf;

use super::connection::CsvConnection;
use crate::domain::models::LedgerConfig;
use crate::storage::traits::LedgerConfigStorage;

const CONFIG_FILE_NAME: &str = "ledger_config.yaml";

#[derive(Clone)]
pub struct LedgerConfigRepository {
    connection: CsvConnection,
}

impl LedgerConfigRepository {
    pub fn new(connection: CsvConnection) -> Self {
        Self { connection }
    }

    fn config_path(&self) -> PathBuf {
        self.connection.base_directory().join(CONFIG_FILE_NAME)
    }

    /// Load config from file, creating the default one if it doesn't exist
    fn load_or_create_config(&self) -> Result<LedgerConfig> {
        let config_path = self.config_path();

        if config_path.exists() {
            let yaml_content = fs::read_to_string(&config_path)?;
            let config: LedgerConfig = serde_yaml::from_str(&yaml_content)?;
            debug!("Loaded ledger config from {:?}", config_path);
            Ok(config)
        } else {
            let config = LedgerConfig::default();
            self.save_config(&config)?;
            info!("Created default ledger config at {:?}", config_path);
            Ok(config)
        }
    }

    fn save_config(&self, config: &LedgerConfig) -> Result<()> {
        let config_path = self.config_path();
        let base_dir = self.connection.base_directory();

        if !base_dir.exists() {
            fs::create_dir_all(&base_dir)?;
            info!("Created base data directory: {:?}", base_dir);
        }

        let yaml_content = serde_yaml::to_string(config)?;

        let temp_path = config_path.with_extension("tmp");
        fs::write(&temp_path, yaml_content)?;
        fs::rename(&temp_path, &config_path)?;

        debug!("Saved ledger config to {:?}", config_path);
        Ok(())
    }
}

impl LedgerConfigStorage for LedgerConfigRepository {
    fn get_config(&self) -> Result<LedgerConfig> {
        self.load_or_create_config()
    }

    fn update_config(&self, config: &LedgerConfig) -> Result<()> {
        if config.cancellation_marker.trim().is_empty() {
            return Err(anyhow!("cancellation_marker cannot be empty"));
        }
        if Some(config.decimal_separator) == config.thousands_separator {
            return Err(anyhow!(
                "decimal and thousands separators must differ (both are '{}')",
                config.decimal_separator
            ));
        }

        let mut updated_config = config.clone();
        updated_config.updated_at = Utc::now().to_rfc3339();

        self.save_config(&updated_config)?;
        info!("Updated ledger config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::csv::test_utils::TestEnvironment;

    #[test]
    fn test_get_config_creates_default() {
        let env = TestEnvironment::new().unwrap();
        let repo = LedgerConfigRepository::new(env.connection.clone());

        let config = repo.get_config().unwrap();
        assert_eq!(config.data_format_version, "1.0");
        assert_eq!(config.cancellation_marker, "[CANCELADO]");
        assert!(!config.optimistic_concurrency);
        assert!(env.base_path.join(CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn test_update_config_persists() {
        let env = TestEnvironment::new().unwrap();
        let repo = LedgerConfigRepository::new(env.connection.clone());

        let mut config = repo.get_config().unwrap();
        config.optimistic_concurrency = true;
        config.empty_summary_placeholder = "sem produção".to_string();
        repo.update_config(&config).unwrap();

        // a fresh repository over the same directory sees the change
        let reopened = LedgerConfigRepository::new(env.reopen().unwrap());
        let loaded = reopened.get_config().unwrap();
        assert!(loaded.optimistic_concurrency);
        assert_eq!(loaded.empty_summary_placeholder, "sem produção");
        assert_eq!(loaded.created_at, config.created_at);
    }

    #[test]
    fn test_update_config_rejects_clashing_separators() {
        let env = TestEnvironment::new().unwrap();
        let repo = LedgerConfigRepository::new(env.connection.clone());

        let config = LedgerConfig {
            decimal_separator: '.',
            thousands_separator: Some('.'),
            ..Default::default()
        };
        let err = repo.update_config(&config).unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_hand_edited_partial_file() {
        let env = TestEnvironment::new().unwrap();
        fs::write(
            env.base_path.join(CONFIG_FILE_NAME),
            "cancellation_marker: \"[ANULADO]\"\n",
        )
        .unwrap();

        let config = LedgerConfigRepository::new(env.connection.clone())
            .get_config()
            .unwrap();
        assert_eq!(config.cancellation_marker, "[ANULADO]");
        assert_eq!(config.decimal_separator, ',');
    }
}
