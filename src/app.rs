//! Terminal host: wallet commands and the live session loop.

use anyhow::{bail, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use callmeter_core::config::{Config, Settings, WalletCommand};
use callmeter_core::{FileStore, LiveSession, MeterSnapshot, WalletAccessor, WalletStore};

use crate::render;

/// Main application
pub struct App {
    settings: Settings,
    wallet: WalletAccessor<FileStore>,
}

impl App {
    /// Create the application over the configured wallet storage
    pub fn new(settings: Settings) -> Self {
        let store = FileStore::new(settings.wallet.resolved_storage_dir());
        let wallet =
            WalletAccessor::new(store).with_currency_label(settings.wallet.currency_label.clone());
        Self { settings, wallet }
    }

    pub fn wallet(&self) -> &WalletAccessor<FileStore> {
        &self.wallet
    }

    /// Dispatch the parsed command line
    pub async fn run(&self, cli: &Config) -> Result<()> {
        match cli.wallet_command() {
            Some(command) => self.run_wallet(command),
            None => self.run_session(cli.settle_on_exit()).await.map(|_| ()),
        }
    }

    /// Run a wallet subcommand
    pub fn run_wallet(&self, command: &WalletCommand) -> Result<()> {
        match command {
            WalletCommand::Show { json } => {
                let wallet = self.wallet.get_wallet();
                if *json {
                    println!("{}", serde_json::to_string_pretty(&wallet)?);
                } else {
                    println!("{}", render::wallet_line(&wallet));
                }
            }
            WalletCommand::Set { balance } => {
                let mut wallet = self.wallet.get_wallet();
                wallet.balance_minor_units = *balance;
                self.wallet.set_wallet(&wallet);

                // The accessor swallows write failures; the CLI should not
                if self.wallet.get_wallet() != wallet {
                    bail!(
                        "Failed to save wallet to {:?}",
                        self.wallet.store().dir()
                    );
                }
                println!("{}", render::wallet_line(&wallet));
            }
        }
        Ok(())
    }

    /// Join a live session and render it until exhaustion or Ctrl-C.
    ///
    /// With `settle`, the charge is debited from the stored wallet afterwards.
    pub async fn run_session(&self, settle: bool) -> Result<MeterSnapshot> {
        let label = self.settings.wallet.currency_label.as_str();
        let mut session = LiveSession::from_settings(&self.settings.meter)?;
        let mut events = session.subscribe();
        session.join(&self.wallet)?;
        info!("Joined session {}", session.session_id());

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => {
                        println!("{}", render::event_line(&event, label));
                        if event.is_final() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Display fell behind, skipped {} meter events", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = &mut ctrl_c => {
                    info!("Interrupted, ending session");
                    break;
                }
            }
        }

        let snapshot = session.end();
        println!("{}", render::summary(&snapshot, label));

        if settle {
            info!("Settling session {}", snapshot.session_id);
            let settlement = session.settle(&self.wallet)?;
            println!("{}", render::settlement_line(&settlement, label));
        }
        Ok(snapshot)
    }
}
