use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine settings, read from `<data_dir>/engine.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory agreement documents are written into.
    pub agreements_dir:       String,
    /// Prefix of the reference handed back for a written agreement.
    pub agreement_url_prefix: String,
    /// How long a transaction waits for another writer before failing.
    pub busy_timeout_ms:      u64,
    pub currency:             String,
    pub organisation:         String,
}

impl EngineConfig {
    /// Load from the data/ directory.
    /// In tests, use EngineConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/engine.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        if config.busy_timeout_ms == 0 {
            anyhow::bail!("{path}: busy_timeout_ms must be positive");
        }
        Ok(config)
    }

    /// Config with hardcoded defaults for use in tests.
    pub fn default_test() -> Self {
        Self {
            agreements_dir:       std::env::temp_dir()
                .join("loan-ledger-agreements")
                .to_string_lossy()
                .into_owned(),
            agreement_url_prefix: "/uploads/agreements".into(),
            busy_timeout_ms:      10_000,
            currency:             "Rp".into(),
            organisation:         "Loan Ledger Test".into(),
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
