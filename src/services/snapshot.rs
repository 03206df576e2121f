// src/services/snapshot.rs
use log::info;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::MeterSnapshot;

/// Last single-account result, written for diagnostic replay. Nothing in the
/// cycle reads it back.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SnapshotStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn save(&self, snapshot: &MeterSnapshot) -> Result<()> {
        let body = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&self.path, body).await?;
        info!("Snapshot for {} saved to {}", snapshot.account_number, self.path.display());
        Ok(())
    }

    pub async fn load(&self) -> Result<MeterSnapshot> {
        let body = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MeterSnapshot {
        MeterSnapshot {
            timestamp: "2025-08-17 09:03:00".to_string(),
            account_number: "37202772".to_string(),
            nickname: "Arif".to_string(),
            status: "success".to_string(),
            remaining_balance: "Remaining Balance: -36.3 BDT".to_string(),
            reading_time: "Reading time: 17 Aug 2025 00:00".to_string(),
            last_recharge_amount: "Last Recharge: 1,000.00 BDT".to_string(),
            last_recharge_date: "Recharge time: 17 Aug 2025 15:16".to_string(),
            balance_numeric: Some(36.3),
            recharge_amount_numeric: Some(1000.0),
            recently_recharged: true,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("data.json"));
        store.save(&sample()).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"remaining_balance\": \"Remaining Balance: -36.3 BDT\""));
        assert!(!raw.contains("error_message"));
        assert_eq!(store.load().await.unwrap(), sample());
    }

    #[tokio::test]
    async fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("missing.json"));
        assert!(store.load().await.is_err());
    }
}
