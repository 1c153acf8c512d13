//! # Field Ledger Backend
//!
//! Record-keeping for field activities of an organic production plan:
//! planting, management, harvest and input use, with an append-only audit
//! trail, soft cancellation and production totals.
//!
//! - `domain`: business rules, independent of storage
//! - `storage`: the `LedgerStorage` trait with CSV and in-memory implementations

use anyhow::Result;
use log::info;
use std::path::Path;
use std::sync::Arc;

pub mod domain;
pub mod storage;

pub use domain::{LedgerError, LedgerResult, LedgerService, LedgerTableService, LedgerView};
pub use storage::csv::CsvConnection;

use domain::models::LedgerConfig;
use storage::csv::{LedgerConfigRepository, LedgerRepository};
use storage::traits::LedgerConfigStorage;

/// Services wired over one data directory
pub struct FieldLedger {
    pub config: LedgerConfig,
    pub ledger_service: LedgerService,
    pub table_service: LedgerTableService,
    pub connection: CsvConnection,
}

impl FieldLedger {
    /// Open the default data directory
    pub fn open_default() -> Result<Self> {
        Self::from_connection(CsvConnection::new_default()?)
    }

    pub fn open<P: AsRef<Path>>(data_directory: P) -> Result<Self> {
        Self::from_connection(CsvConnection::new(data_directory)?)
    }

    fn from_connection(connection: CsvConnection) -> Result<Self> {
        let config = LedgerConfigRepository::new(connection.clone()).get_config()?;
        let storage = Arc::new(LedgerRepository::new(connection.clone()));

        let ledger_service = LedgerService::with_config(storage, &config);
        let table_service = LedgerTableService::with_config(Default::default(), &config);

        info!(
            "Opened field ledger at {} (format {})",
            connection.base_directory().display(),
            config.data_format_version
        );
        Ok(Self {
            config,
            ledger_service,
            table_service,
            connection,
        })
    }
}
