use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level service configuration (loaded from encsvc.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncsvcConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub crypto: CryptoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP listen address (default: 0.0.0.0:8000)
    pub listen: String,
    /// Largest accepted request body in MiB
    pub max_upload_mb: u64,
    /// Concurrent cipher jobs (0 = cpu_count)
    pub workers: usize,
    /// Time budget for GET /api/health in milliseconds
    pub health_timeout_ms: u64,
    /// Allow cross-origin requests from any origin
    pub cors_permissive: bool,
    /// Log level (default: info)
    pub log_level: String,
    /// Log format: "json" or "text"
    pub log_format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding published artifacts and staging files
    pub root: PathBuf,
    /// Artifacts older than this are purged (0 = keep forever)
    pub retention_secs: u64,
    /// How often the retention sweeper runs
    pub sweep_interval_secs: u64,
}

/// Largest Argon2id memory cost accepted, in KiB. Artifact headers carry
/// their own parameters, so this also bounds what a decrypt can be made to do.
pub const ARGON2_MAX_MEM_COST_KIB: u32 = 256 * 1024;
pub const ARGON2_MAX_TIME_COST: u32 = 8;
pub const ARGON2_MAX_PARALLELISM: u32 = 16;

/// Cipher and key derivation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Plaintext bytes per sealed frame
    pub frame_size: u32,
    /// Argon2id memory cost in KiB (default: 19456 = 19 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 2)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 1)
    pub argon2_parallelism: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".into(),
            max_upload_mb: 256,
            workers: 0,
            health_timeout_ms: 500,
            cors_permissive: true,
            log_level: "info".into(),
            log_format: "text".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/var/lib/encsvc"),
            retention_secs: 3600,
            sweep_interval_secs: 300,
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            frame_size: 64 * 1024,
            argon2_mem_cost_kib: 19456,
            argon2_time_cost: 2,
            argon2_parallelism: 1,
        }
    }
}

impl ServerConfig {
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb as usize).saturating_mul(1024 * 1024)
    }

    /// Resolved worker count: the configured value, or the number of cores
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }
}

impl EncsvcConfig {
    /// Read and parse a TOML config file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("parsing config {}: {e}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::warn!(
                "config file not found: {}  (using defaults)",
                path.display()
            );
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.crypto.frame_size == 0 {
            anyhow::bail!("crypto.frame_size must be greater than zero");
        }
        if self.crypto.frame_size > 16 * 1024 * 1024 {
            anyhow::bail!("crypto.frame_size must not exceed 16 MiB");
        }
        let c = &self.crypto;
        if !(1..=ARGON2_MAX_TIME_COST).contains(&c.argon2_time_cost)
            || !(1..=ARGON2_MAX_PARALLELISM).contains(&c.argon2_parallelism)
        {
            anyhow::bail!(
                "crypto.argon2_time_cost must be 1..={ARGON2_MAX_TIME_COST} and \
                 crypto.argon2_parallelism 1..={ARGON2_MAX_PARALLELISM}"
            );
        }
        if c.argon2_mem_cost_kib < 8 * c.argon2_parallelism
            || c.argon2_mem_cost_kib > ARGON2_MAX_MEM_COST_KIB
        {
            anyhow::bail!(
                "crypto.argon2_mem_cost_kib must be between 8 x parallelism and {ARGON2_MAX_MEM_COST_KIB}"
            );
        }
        if self.server.max_upload_mb == 0 {
            anyhow::bail!("server.max_upload_mb must be greater than zero");
        }
        Ok(())
    }
}
