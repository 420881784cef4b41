use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mail_notification_tracker::config::{AppConfig, CliConfig, FileConfig};
use mail_notification_tracker::{
    MessageReference, NotificationRecord, NotificationStore, NotificationStoreOperation,
    SqliteNotificationStore,
};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(about = "Inspect and repair persisted mail notification state")]
struct CliArgs {
    /// Directory holding notifications.db.
    #[clap(value_parser = parse_path)]
    pub db_dir: PathBuf,

    /// Path to a TOML config file. Its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Default log level, LOG_LEVEL takes precedence.
    #[clap(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lists the notification records of an account, newest first.
    List {
        account_uuid: String,
        /// Prints the records as JSON.
        #[clap(long)]
        json: bool,
    },

    /// Shows the notification record of a message identity.
    Show { identity: MessageReference },

    /// Marks the notification of a message as no longer active.
    Deactivate { identity: MessageReference },

    /// Forgets the notification record of a message.
    Remove { identity: MessageReference },

    /// Drops every notification record.
    Clear,

    /// Prints the path of the notification database.
    Where,
}

fn format_record(record: &NotificationRecord) -> String {
    let status = match record.notification_id {
        Some(id) => format!("active {}", id),
        None => "inactive".to_string(),
    };
    let notified_at = DateTime::<Utc>::from_timestamp_millis(record.timestamp)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| record.timestamp.to_string());
    format!(
        "{}  {}  {}  {}",
        record.message.to_identity_string(),
        record.message,
        status,
        notified_at
    )
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let file_config = cli_args
        .config
        .as_deref()
        .map(FileConfig::load)
        .transpose()?;
    let cli_config = CliConfig {
        db_dir: Some(cli_args.db_dir.clone()),
        log_level: cli_args.log_level.clone(),
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(config.log_level.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let db_path = config.notifications_db_path();
    if let Command::Where = cli_args.command {
        println!("{}", db_path.display());
        return Ok(());
    }

    info!("Opening notification database at {:?}...", db_path);
    let store = SqliteNotificationStore::new(&db_path)?;

    match cli_args.command {
        Command::List { account_uuid, json } => {
            let records = store.get_notification_records(&account_uuid)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No notification records for account {}", account_uuid);
            } else {
                for record in &records {
                    println!("{}", format_record(record));
                }
            }
        }
        Command::Show { identity } => match store.get_notification_record(&identity)? {
            Some(record) => println!("{}", format_record(&record)),
            None => println!("No notification record for {}", identity),
        },
        Command::Deactivate { identity } => {
            store.persist_notification_changes(&[NotificationStoreOperation::ChangeToInactive {
                message: identity.clone(),
            }])?;
            println!("Deactivated {}", identity);
        }
        Command::Remove { identity } => {
            store.persist_notification_changes(&[NotificationStoreOperation::Remove {
                message: identity.clone(),
            }])?;
            println!("Removed {}", identity);
        }
        Command::Clear => {
            store.clear_notifications()?;
            println!("Cleared all notification records");
        }
        Command::Where => {}
    }

    Ok(())
}
