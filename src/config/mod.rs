mod file_config;

pub use file_config::{FileConfig, NotificationsConfig};

use anyhow::{bail, Result};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    /// Default verbosity, `LOG_LEVEL` still wins when set.
    pub log_level: LevelFilter,
    pub notifications: NotificationSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationSettings {
    /// Maximum number of new-mail notifications shown per account.
    pub max_active_per_account: usize,
    pub first_notification_id: u32,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            max_active_per_account: 8,
            first_notification_id: 1,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| anyhow::anyhow!("db_dir must be specified on the command line or in config file"))?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let log_level = match file.log_level.or_else(|| cli.log_level.clone()) {
            Some(level) => parse_log_level(&level)?,
            None => LevelFilter::INFO,
        };

        let defaults = NotificationSettings::default();
        let notifications_file = file.notifications.unwrap_or_default();
        let notifications = NotificationSettings {
            max_active_per_account: notifications_file
                .max_active_per_account
                .unwrap_or(defaults.max_active_per_account),
            first_notification_id: notifications_file
                .first_notification_id
                .unwrap_or(defaults.first_notification_id),
        };
        if notifications.max_active_per_account == 0 {
            bail!("notifications.max_active_per_account must be at least 1");
        }

        Ok(Self {
            db_dir,
            log_level,
            notifications,
        })
    }

    pub fn notifications_db_path(&self) -> PathBuf {
        self.db_dir.join("notifications.db")
    }
}

fn parse_log_level(s: &str) -> Result<LevelFilter> {
    s.parse::<LevelFilter>()
        .map_err(|_| anyhow::anyhow!("Invalid log level: {:?}", s))
}
