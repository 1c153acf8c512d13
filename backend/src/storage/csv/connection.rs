use anyhow::Result;
use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::models::PlanId;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "FIELD_LEDGER_DATA_DIR";

const DEFAULT_DIRECTORY_NAME: &str = "Field Ledger";
const REDIRECT_FILE_NAME: &str = ".field_ledger_redirect";
const LEDGER_FILE_NAME: &str = "ledger.csv";

/// Header of every ledger file, in column order
pub const LEDGER_HEADER: [&str; 11] = [
    "id",
    "plan_id",
    "activity_timestamp",
    "activity_type",
    "product",
    "location_path",
    "quantity_value",
    "quantity_unit",
    "note",
    "technical_details",
    "history",
];

/// CsvConnection manages file paths and ensures ledger files exist for each plan
#[derive(Debug, Clone)]
pub struct CsvConnection {
    base_directory: PathBuf,
}

impl CsvConnection {
    /// Create a new CSV connection with a base directory
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Result<Self> {
        let base_path = base_directory.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
        }

        Ok(Self {
            base_directory: base_path,
        })
    }

    /// Create a connection in the default data directory.
    ///
    /// Uses `FIELD_LEDGER_DATA_DIR` when set, otherwise `~/Documents/Field Ledger`,
    /// following a redirect file in that directory if one exists.
    pub fn new_default() -> Result<Self> {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                info!("Using data directory from {}: {}", DATA_DIR_ENV, dir.trim());
                return Self::new(dir.trim());
            }
        }

        let home_dir = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| anyhow::anyhow!("Could not determine home directory"))?;

        let default_data_dir = PathBuf::from(home_dir)
            .join("Documents")
            .join(DEFAULT_DIRECTORY_NAME);
        Self::new(Self::follow_redirect(default_data_dir))
    }

    /// The directory named by a redirect file inside `default_dir`, or `default_dir` itself
    pub fn follow_redirect(default_dir: PathBuf) -> PathBuf {
        let redirect_file = default_dir.join(REDIRECT_FILE_NAME);
        if !redirect_file.exists() {
            info!(
                "No redirect file found, using data directory: {}",
                default_dir.display()
            );
            return default_dir;
        }

        match fs::read_to_string(&redirect_file) {
            Ok(redirected_path) => {
                let path = PathBuf::from(redirected_path.trim());
                if path.exists() {
                    info!("Found redirect file, using data directory: {}", path.display());
                    path
                } else {
                    warn!(
                        "Redirect file points to non-existent directory: {}. Using default.",
                        path.display()
                    );
                    default_dir
                }
            }
            Err(e) => {
                error!("Failed to read redirect file: {}. Using default directory.", e);
                default_dir
            }
        }
    }

    /// Get the base directory path
    pub fn base_directory(&self) -> PathBuf {
        self.base_directory.clone()
    }

    pub fn plans_directory(&self) -> PathBuf {
        self.base_directory.join("plans")
    }

    pub fn plan_directory(&self, plan_id: PlanId) -> PathBuf {
        self.plans_directory().join(plan_id.to_string())
    }

    pub fn ledger_file_path(&self, plan_id: PlanId) -> PathBuf {
        self.plan_directory(plan_id).join(LEDGER_FILE_NAME)
    }

    /// Ensure the plan's ledger file exists with its header row
    pub fn ensure_ledger_file_exists(&self, plan_id: PlanId) -> Result<()> {
        let plan_dir = self.plan_directory(plan_id);
        if !plan_dir.exists() {
            fs::create_dir_all(&plan_dir)?;
        }

        let file_path = plan_dir.join(LEDGER_FILE_NAME);
        if !file_path.exists() {
            fs::write(&file_path, format!("{}\n", LEDGER_HEADER.join(",")))?;
            info!("Created ledger file for plan {} at {:?}", plan_id, file_path);
        }
        Ok(())
    }

    /// Plans that have a ledger directory, in ascending order
    pub fn list_plan_ids(&self) -> Result<Vec<PlanId>> {
        let plans_dir = self.plans_directory();
        if !plans_dir.exists() {
            return Ok(Vec::new());
        }

        let mut plan_ids = Vec::new();
        for entry in fs::read_dir(&plans_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            match entry.file_name().to_str().and_then(|n| n.parse::<PlanId>().ok()) {
                Some(plan_id) => plan_ids.push(plan_id),
                None => warn!("Ignoring unexpected directory {:?} under plans", entry.path()),
            }
        }
        plan_ids.sort_unstable();
        Ok(plan_ids)
    }
}
