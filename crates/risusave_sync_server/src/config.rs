//! Server configuration.

use std::time::Duration;
use tracing::warn;

/// Environment variable that enables patch sync when set to `1` or `true`.
pub const PATCH_SYNC_ENV: &str = "RISU_PATCH_SYNC";

/// Environment variable overriding the debounce delay, in milliseconds.
pub const SAVE_INTERVAL_ENV: &str = "RISU_SAVE_INTERVAL_MS";

/// Default debounce delay between the last patch and the disk write.
pub const DEFAULT_SAVE_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Whether patch requests are accepted.
    pub patch_sync_enabled: bool,
    /// Quiet period after the last patch before the snapshot is written.
    pub save_interval: Duration,
    /// Keys whose logical name contains this marker get a backup on every
    /// debounced flush.
    pub primary_marker: String,
    /// Logical name prefix of backup keys.
    pub backup_prefix: String,
    /// Logical name suffix of backup keys.
    pub backup_suffix: String,
}

impl ServerConfig {
    /// Creates a configuration with defaults (patch sync disabled).
    pub fn new() -> Self {
        Self {
            patch_sync_enabled: false,
            save_interval: DEFAULT_SAVE_INTERVAL,
            primary_marker: "database/database.bin".to_string(),
            backup_prefix: "database/dbbackup-".to_string(),
            backup_suffix: ".bin".to_string(),
        }
    }

    /// Reads `RISU_PATCH_SYNC` and `RISU_SAVE_INTERVAL_MS` from the process
    /// environment on top of the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::new();
        if let Some(value) = lookup(PATCH_SYNC_ENV) {
            config.patch_sync_enabled = matches!(value.trim(), "1" | "true");
        }
        if let Some(value) = lookup(SAVE_INTERVAL_ENV) {
            match value.trim().parse::<u64>() {
                Ok(ms) => config.save_interval = Duration::from_millis(ms),
                Err(e) => warn!(
                    variable = SAVE_INTERVAL_ENV,
                    value = %value,
                    error = %e,
                    "ignoring invalid save interval"
                ),
            }
        }
        config
    }

    /// Enables or disables patch sync.
    pub fn with_patch_sync(mut self, enabled: bool) -> Self {
        self.patch_sync_enabled = enabled;
        self
    }

    /// Sets the debounce delay.
    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = interval;
        self
    }

    /// Sets the marker identifying the primary database key.
    pub fn with_primary_marker(mut self, marker: impl Into<String>) -> Self {
        self.primary_marker = marker.into();
        self
    }

    /// Sets the backup key prefix.
    pub fn with_backup_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.backup_prefix = prefix.into();
        self
    }

    /// Logical name of the backup with the given id.
    pub fn backup_name(&self, id: u64) -> String {
        format!("{}{id}{}", self.backup_prefix, self.backup_suffix)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert!(!config.patch_sync_enabled);
        assert_eq!(config.save_interval, Duration::from_secs(5));
        assert_eq!(config.primary_marker, "database/database.bin");
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new()
            .with_patch_sync(true)
            .with_save_interval(Duration::from_millis(50))
            .with_primary_marker("db.bin")
            .with_backup_prefix("backups/");

        assert!(config.patch_sync_enabled);
        assert_eq!(config.save_interval, Duration::from_millis(50));
        assert_eq!(config.primary_marker, "db.bin");
        assert_eq!(config.backup_name(7), "backups/7.bin");
    }

    #[test]
    fn backup_name_default() {
        assert_eq!(
            ServerConfig::default().backup_name(17_000_000_000),
            "database/dbbackup-17000000000.bin"
        );
    }

    #[test]
    fn from_lookup_reads_variables() {
        let config = ServerConfig::from_lookup(|name| match name {
            PATCH_SYNC_ENV => Some("1".into()),
            SAVE_INTERVAL_ENV => Some("250".into()),
            _ => None,
        });
        assert!(config.patch_sync_enabled);
        assert_eq!(config.save_interval, Duration::from_millis(250));
    }

    #[test]
    fn from_lookup_ignores_bad_values() {
        let config = ServerConfig::from_lookup(|name| match name {
            PATCH_SYNC_ENV => Some("0".into()),
            SAVE_INTERVAL_ENV => Some("soon".into()),
            _ => None,
        });
        assert!(!config.patch_sync_enabled);
        assert_eq!(config.save_interval, DEFAULT_SAVE_INTERVAL);
    }
}
