//! Wiring shared by every command: configuration, store, broker, workflows.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use riskdesk_broker::{LogNotifier, PaperBroker, RetryPolicy, Retrying, WebhookNotifier};
use riskdesk_core::{AppConfig, ConfigLoader, Notifier, RiskLimitMatrix};
use riskdesk_engine::{Collaborators, OrderWorkflow, SqliteStore};

/// Paths shared by all commands.
#[derive(Args, Debug, Clone)]
pub struct DeskArgs {
    /// Config file path
    #[arg(short, long, global = true, default_value = "config/Config.toml")]
    pub config: String,

    /// Profile overlay (loads Config.<profile>.toml next to the base file)
    #[arg(long, global = true, env = "RISKDESK_PROFILE")]
    pub profile: Option<String>,

    /// Paper broker state file
    #[arg(long, global = true, default_value = "config/paper_state.json")]
    pub paper_state: String,
}

/// Everything a command needs, built once per invocation.
pub struct Desk {
    pub config: AppConfig,
    pub limits: RiskLimitMatrix,
    pub store: Arc<SqliteStore>,
    pub broker: Arc<PaperBroker>,
    paper_state: PathBuf,
}

impl Desk {
    pub async fn open(args: &DeskArgs) -> Result<Self> {
        let config = match &args.profile {
            Some(profile) => ConfigLoader::load_with_profile(&args.config, profile),
            None => ConfigLoader::load(&args.config),
        }
        .with_context(|| format!("Failed to load config from {}", args.config))?;

        let limits = ConfigLoader::load_risk_limits(&config.risk_limits_path)
            .with_context(|| format!("Failed to load risk limits from {}", config.risk_limits_path))?;

        ensure_sqlite_dir(&config.database.url)?;
        tracing::info!(url = %config.database.url, "Opening proposal store");
        let store = SqliteStore::connect(&config.database.url, config.database.max_connections)
            .await
            .context("Failed to open proposal store")?;

        let paper_state = PathBuf::from(&args.paper_state);
        let broker = PaperBroker::from_file(&paper_state)?;

        Ok(Self {
            config,
            limits,
            store: Arc::new(store),
            broker: Arc::new(broker),
            paper_state,
        })
    }

    /// Order workflows against the paper broker. Order calls are not retried.
    pub fn workflow(&self) -> OrderWorkflow {
        OrderWorkflow::new(
            self.broker.clone(),
            self.broker.clone(),
            self.store.clone(),
            self.config.timeouts.clone(),
        )
    }

    /// Proposer collaborators; feed and what-if reads go through bounded retry.
    pub fn collaborators(&self) -> Result<Collaborators> {
        let reads = Arc::new(Retrying::new(self.broker.clone(), RetryPolicy::default()));
        Ok(Collaborators {
            greeks: reads.clone(),
            market: reads.clone(),
            simulator: reads,
            notifier: self.notifier()?,
            advisory: None,
        })
    }

    fn notifier(&self) -> Result<Arc<dyn Notifier>> {
        match &self.config.notification.webhook_url {
            Some(url) => {
                tracing::info!(%url, "Alerts go to webhook");
                Ok(Arc::new(WebhookNotifier::new(
                    url.clone(),
                    self.config.timeouts.notify(),
                )?))
            }
            None => Ok(Arc::new(LogNotifier)),
        }
    }

    /// Writes paper positions, including any fills, back to the state file.
    pub fn persist_broker(&self) -> Result<()> {
        self.broker.save(&self.paper_state)
    }
}

fn ensure_sqlite_dir(url: &str) -> Result<()> {
    let Some(file_path) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    if let Some(parent) = Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}
