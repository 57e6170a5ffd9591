use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use notify::{Event, RecursiveMode, Watcher};
use tokio::sync::watch;

use crate::config::RiskLimitMatrix;
use crate::config_loader::ConfigLoader;

/// Hot-reloads the risk-limit matrix.
///
/// Readers take an `Arc` snapshot from the receiver, so one resolution always
/// sees a single consistent matrix even if a reload lands mid-cycle.
pub struct RiskLimitWatcher {
    tx: watch::Sender<Arc<RiskLimitMatrix>>,
    path: PathBuf,
}

impl RiskLimitWatcher {
    /// Creates a new watcher with an initial matrix.
    ///
    /// Returns a tuple of the watcher and a receiver for matrix updates.
    #[must_use]
    pub fn new(
        path: impl AsRef<Path>,
        initial: RiskLimitMatrix,
    ) -> (Self, watch::Receiver<Arc<RiskLimitMatrix>>) {
        let (tx, rx) = watch::channel(Arc::new(initial));
        (
            Self {
                tx,
                path: path.as_ref().to_path_buf(),
            },
            rx,
        )
    }

    /// Re-reads the matrix file and publishes it if it parses and validates.
    ///
    /// A bad file keeps the previous snapshot in place.
    pub fn reload(&self) -> bool {
        match ConfigLoader::load_risk_limits(&self.path) {
            Ok(matrix) => {
                self.tx.send_replace(Arc::new(matrix));
                tracing::info!(path = %self.path.display(), "Risk-limit matrix reloaded");
                true
            }
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to reload risk-limit matrix, keeping previous snapshot"
                );
                false
            }
        }
    }

    /// Watches the matrix file for changes and broadcasts reloads.
    ///
    /// # Errors
    ///
    /// Returns an error if file watching cannot be initiated or if the watcher task fails.
    pub async fn watch(self) -> Result<()> {
        tokio::task::spawn_blocking(move || {
            let (notify_tx, notify_rx) = std::sync::mpsc::channel();

            let mut watcher = notify::recommended_watcher(move |res: Result<Event, _>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            })?;

            watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

            for event in notify_rx {
                if event.kind.is_modify() {
                    tracing::info!("Risk-limit matrix changed, reloading...");
                    self.reload();
                }
            }

            Ok::<_, anyhow::Error>(())
        })
        .await??;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regime::Regime;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn bad_reload_keeps_previous_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"this is not toml = = =").unwrap();

        let (watcher, rx) = RiskLimitWatcher::new(file.path(), RiskLimitMatrix::standard());
        assert!(!watcher.reload());
        assert_eq!(**rx.borrow(), RiskLimitMatrix::standard());
    }

    #[test]
    fn good_reload_replaces_snapshot_and_old_arc_is_unchanged() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"
[regimes.crisis_mode]
min_daily_theta_pct_nlv = 0
max_negative_vega_pct_nlv = 0
max_spx_delta_pct_nlv = 0
max_gamma_pct_nlv = 0.0001
max_position_contracts = 2
max_single_underlying_vega_pct = 0.2
"#,
        )
        .unwrap();

        let (watcher, rx) = RiskLimitWatcher::new(file.path(), RiskLimitMatrix::standard());
        let before = Arc::clone(&rx.borrow());
        assert!(watcher.reload());

        let after = Arc::clone(&rx.borrow());
        assert_eq!(after.regimes.len(), 1);
        assert_eq!(
            after.limits_for(Regime::CrisisMode).unwrap().max_gamma_pct_nlv,
            dec!(0.0001)
        );
        assert_eq!(before.regimes.len(), 4);
    }
}
