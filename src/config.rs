use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::{AppError, Result};

/// Car-wash income and expense dashboard.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Remote database URL (libsql://, https://) or a local database file.
    /// Without it everything is kept in the local fallback store.
    #[arg(long, env = "CARWASH_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Auth token for the remote database.
    #[arg(long, env = "CARWASH_AUTH_TOKEN", default_value = "", hide_env_values = true)]
    pub auth_token: String,

    /// Directory holding the local fallback snapshots.
    #[arg(long, env = "CARWASH_DATA_DIR", default_value = ".carwash")]
    pub data_dir: PathBuf,

    /// Directory receiving exported reports.
    #[arg(long, env = "CARWASH_EXPORT_DIR", default_value = "reports")]
    pub export_dir: PathBuf,

    /// Seconds between refreshes from the remote store.
    #[arg(long, default_value_t = 30)]
    pub refresh_secs: u64,

    /// Seconds between keep-alive pings to the remote store.
    #[arg(long, default_value_t = 300)]
    pub heartbeat_secs: u64,

    /// Seconds to wait for any single remote call.
    #[arg(long, default_value_t = 10)]
    pub remote_timeout_secs: u64,

    /// File receiving the application log.
    #[arg(long, default_value = "carwash.log")]
    pub log_file: PathBuf,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("--refresh-secs", self.refresh_secs),
            ("--heartbeat-secs", self.heartbeat_secs),
            ("--remote-timeout-secs", self.remote_timeout_secs),
        ] {
            if value == 0 {
                return Err(AppError::Config(format!("{name} must be greater than 0")));
            }
        }
        if self
            .database_url
            .as_deref()
            .is_some_and(|url| url.trim().is_empty())
        {
            return Err(AppError::Config("--database-url must not be empty".into()));
        }
        Ok(())
    }

    pub fn refresh_every(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }

    pub fn heartbeat_every(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_poll_and_heartbeat_cadence() {
        let config = Config::try_parse_from(["carwash-tui"]).unwrap();

        assert_eq!(config.refresh_every(), Duration::from_secs(30));
        assert_eq!(config.heartbeat_every(), Duration::from_secs(300));
        config.validate().unwrap();
    }

    #[test]
    fn zero_interval_is_rejected() {
        let config = Config::try_parse_from(["carwash-tui", "--refresh-secs", "0"]).unwrap();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn blank_database_url_is_rejected() {
        let config = Config::try_parse_from(["carwash-tui", "--database-url", " "]).unwrap();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }
}
