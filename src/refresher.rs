//! The Certificate Refresher: a single background task that periodically
//! fetches `/v3/certificates` and replaces the Config Store's Certificate
//! Store contents.
//!
//! It owns exactly one timer and one command channel — `enable`/`disable`
//! send commands to it rather than each spawning their own timer.
//! A refresh failure is logged and never propagates; the schedule is
//! preserved so a transient outage self-heals.

use crate::certificates;
use crate::config::ConfigStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{info, warn};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefresherState {
    Idle,
    Scheduled,
    Refreshing,
    Stopped,
}

enum Command {
    Enable(Duration),
    Disable,
    RefreshNow,
}

/// A handle to the background refresher task. Dropping every clone stops
/// the task (the channel closes and the task loop exits).
#[derive(Clone)]
pub struct CertificateRefresher {
    commands: mpsc::UnboundedSender<Command>,
    state: Arc<std::sync::Mutex<RefresherState>>,
}

impl CertificateRefresher {
    /// Spawns the background task against `config_store`. Starts `Idle`;
    /// call `enable` to begin the periodic schedule.
    pub fn spawn(config_store: Arc<ConfigStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(std::sync::Mutex::new(RefresherState::Idle));
        tokio::spawn(run(config_store, rx, state.clone()));
        CertificateRefresher {
            commands: tx,
            state,
        }
    }

    /// Cancels any pending timer and schedules one tick after `interval`.
    pub fn enable(&self, interval: Duration) {
        let _ = self.commands.send(Command::Enable(interval));
    }

    /// Cancels any pending timer and stops the schedule.
    pub fn disable(&self) {
        let _ = self.commands.send(Command::Disable);
    }

    /// Triggers an out-of-band refresh on the background task, so at most
    /// one refresh is ever in flight even when the caller asks manually.
    pub fn refresh_now(&self) {
        let _ = self.commands.send(Command::RefreshNow);
    }

    pub fn state(&self) -> RefresherState {
        *self.state.lock().unwrap()
    }
}

async fn run(
    config_store: Arc<ConfigStore>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    state: Arc<std::sync::Mutex<RefresherState>>,
) {
    let mut interval: Option<Duration> = None;

    loop {
        let sleep_fut = async {
            match interval {
                Some(d) => sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            cmd = commands.recv() => {
                match cmd {
                    Some(Command::Enable(d)) => {
                        interval = Some(d);
                        *state.lock().unwrap() = RefresherState::Scheduled;
                    }
                    Some(Command::Disable) => {
                        interval = None;
                        *state.lock().unwrap() = RefresherState::Stopped;
                    }
                    Some(Command::RefreshNow) => {
                        do_refresh(&config_store, &state).await;
                    }
                    None => break,
                }
            }
            _ = sleep_fut => {
                do_refresh(&config_store, &state).await;
            }
        }
    }
}

async fn do_refresh(config_store: &Arc<ConfigStore>, state: &Arc<std::sync::Mutex<RefresherState>>) {
    *state.lock().unwrap() = RefresherState::Refreshing;

    let config = config_store.load();
    // Verification is disabled only for the very first run while the
    // Certificate Store is still empty; every later refresh verifies.
    let verify = !config.platform_certs.is_empty();

    match certificates::get_certificates(&config, verify).await {
        Ok(records) => {
            let pairs = records
                .into_iter()
                .filter_map(|r| r.public_key.map(|k| (r.serial_no, k)))
                .collect::<Vec<_>>();
            info!(count = pairs.len(), "refreshed wechat pay platform certificates");
            config_store.update_certificates(pairs);
        }
        Err(e) => {
            warn!(error = %e, "certificate refresh failed, schedule preserved");
        }
    }

    *state.lock().unwrap() = RefresherState::Scheduled;
}
