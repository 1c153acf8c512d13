//! Temporary data directories for CSV storage tests.
//!
//! The directory lives as long as the `TestEnvironment`, so it is removed when
//! the test finishes, including when it panics.
use anyhow::Result;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

use super::connection::CsvConnection;
use crate::domain::models::PlanId;

pub struct TestEnvironment {
    pub connection: CsvConnection,
    pub base_path: PathBuf,
    _temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let connection = CsvConnection::new(temp_dir.path())?;
        Ok(Self {
            connection,
            base_path: temp_dir.path().to_path_buf(),
            _temp_dir: temp_dir,
        })
    }

    /// A second connection over the same directory, as a fresh process would open it
    pub fn reopen(&self) -> Result<CsvConnection> {
        CsvConnection::new(&self.base_path)
    }

    /// Replace a plan's ledger file with hand-written CSV
    pub fn write_ledger(&self, plan_id: PlanId, content: &str) -> Result<()> {
        self.write_ledger_bytes(plan_id, content.as_bytes())
    }

    /// Same as `write_ledger`, for files that are not valid UTF-8
    pub fn write_ledger_bytes(&self, plan_id: PlanId, content: &[u8]) -> Result<()> {
        self.connection.ensure_ledger_file_exists(plan_id)?;
        fs::write(self.connection.ledger_file_path(plan_id), content)?;
        Ok(())
    }

    /// Append one raw line to a plan's ledger file
    pub fn append_ledger_line(&self, plan_id: PlanId, line: &str) -> Result<()> {
        self.connection.ensure_ledger_file_exists(plan_id)?;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(self.connection.ledger_file_path(plan_id))?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    pub fn read_ledger(&self, plan_id: PlanId) -> Result<String> {
        Ok(fs::read_to_string(self.connection.ledger_file_path(plan_id))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_removed_on_drop() {
        let base_path = {
            let env = TestEnvironment::new().unwrap();
            assert!(env.base_path.exists());
            env.base_path.clone()
        };
        assert!(!base_path.exists());
    }

    #[test]
    fn test_append_creates_ledger_with_header() {
        let env = TestEnvironment::new().unwrap();
        env.append_ledger_line(2, "entry::x,2").unwrap();

        let content = env.read_ledger(2).unwrap();
        assert!(content.starts_with("id,plan_id,"));
        assert!(content.ends_with("entry::x,2\n"));
        assert_eq!(env.reopen().unwrap().list_plan_ids().unwrap(), vec![2]);
    }
}
