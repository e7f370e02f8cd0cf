//! Automatic sync: debounced change events, startup and periodic cycles.

use crate::sync::config::SyncSettings;
use crate::sync::engine::{SyncOrchestrator, SyncOutcome};
use crate::sync::state::SyncPhase;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Capacity of the change event channel
const EVENT_BUFFER: usize = 64;

/// Notification from the host's configuration watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigEvent {
    /// The configuration file changed on disk
    Changed,
    /// Flush any pending change and stop
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoSyncOptions {
    /// Quiet period after the last change before a cycle starts
    pub debounce: Duration,
    /// Period of unconditional cycles; `None` disables them
    pub interval: Option<Duration>,
    pub sync_on_startup: bool,
    pub sync_on_change: bool,
}

impl Default for AutoSyncOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(5),
            interval: None,
            sync_on_startup: true,
            sync_on_change: true,
        }
    }
}

impl AutoSyncOptions {
    pub fn from_settings(settings: &SyncSettings) -> Self {
        let interval = (settings.sync_interval_minutes > 0)
            .then(|| Duration::from_secs(settings.sync_interval_minutes.saturating_mul(60)));
        Self {
            interval,
            sync_on_startup: settings.auto_sync_on_startup,
            sync_on_change: settings.auto_sync_on_change,
            ..Self::default()
        }
    }
}

/// Background driver turning configuration changes into sync cycles
///
/// A burst of change events collapses into one cycle once the debounce
/// period has passed without further events. Events that arrive while the
/// orchestrator writes merged configuration back are our own echo and are
/// dropped; a later event for the same write is skipped because the
/// content fingerprint matches the last sync.
pub struct AutoSync {
    orchestrator: Arc<SyncOrchestrator>,
    options: AutoSyncOptions,
    events: mpsc::Receiver<ConfigEvent>,
}

impl AutoSync {
    /// Create the driver and the sender the host's watcher feeds
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        options: AutoSyncOptions,
    ) -> (Self, mpsc::Sender<ConfigEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let auto = Self {
            orchestrator,
            options,
            events: rx,
        };
        (auto, tx)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run until `Shutdown` arrives or every sender is dropped
    pub async fn run(self) {
        let AutoSync {
            orchestrator,
            options,
            mut events,
        } = self;

        if options.sync_on_startup {
            run_cycle(&orchestrator, "startup").await;
        }

        let mut ticker = options.interval.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        let mut deadline: Option<Instant> = None;

        info!(
            debounce_ms = options.debounce.as_millis() as u64,
            interval_secs = options.interval.map(|i| i.as_secs()),
            "Auto-sync started"
        );

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(ConfigEvent::Changed) => {
                        if !options.sync_on_change {
                            continue;
                        }
                        if orchestrator.phase() == SyncPhase::WritingLocal {
                            debug!("Ignoring change event raised by our own write");
                            continue;
                        }
                        deadline = Some(Instant::now() + options.debounce);
                    }
                    Some(ConfigEvent::Shutdown) | None => {
                        if deadline.take().is_some() {
                            sync_if_changed(&orchestrator).await;
                        }
                        break;
                    }
                },
                _ = quiet_period(deadline) => {
                    deadline = None;
                    sync_if_changed(&orchestrator).await;
                }
                _ = next_tick(ticker.as_mut()) => {
                    run_cycle(&orchestrator, "interval").await;
                }
            }
        }

        info!("Auto-sync stopped");
    }
}

async fn quiet_period(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn sync_if_changed(orchestrator: &SyncOrchestrator) {
    match orchestrator.has_local_changes().await {
        Ok(true) => run_cycle(orchestrator, "change").await,
        Ok(false) => debug!("Configuration content unchanged since last sync"),
        Err(err) => warn!(error = %err, "Failed to check for local changes"),
    }
}

async fn run_cycle(orchestrator: &SyncOrchestrator, trigger: &str) {
    if !orchestrator.is_unlocked() {
        debug!(trigger, "Sync session locked, skipping automatic sync");
        return;
    }
    report(trigger, &orchestrator.sync().await);
}

fn report(trigger: &str, outcome: &SyncOutcome) {
    if outcome.success {
        debug!(trigger, action = ?outcome.action, "Automatic sync finished");
    } else {
        warn!(
            trigger,
            error = outcome.error.as_deref().unwrap_or("unknown"),
            "Automatic sync failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pathmap::{PathMapper, Platform};
    use crate::sync::config::MemoryStateStore;
    use crate::sync::memory::{MemoryBlobStore, MemoryConfigStore, StaticHostname};
    use serde_json::{json, Value};
    use tokio::time::sleep;

    fn orchestrator(
        host: &str,
        home: &str,
        raw: Value,
        blobs: &Arc<MemoryBlobStore>,
    ) -> (Arc<SyncOrchestrator>, Arc<MemoryConfigStore>) {
        let config = Arc::new(MemoryConfigStore::new(raw));
        let orchestrator = SyncOrchestrator::new(
            config.clone(),
            blobs.clone(),
            Arc::new(MemoryStateStore::default()),
        )
        .with_mapper(PathMapper::new(home, Platform::Unix))
        .with_hostname(Arc::new(StaticHostname(host.to_string())));
        (Arc::new(orchestrator), config)
    }

    fn config(name: &str) -> Value {
        json!({
            "profiles": [{ "id": "p1", "type": "ssh", "name": name, "options": { "host": "h" } }]
        })
    }

    fn quiet() -> AutoSyncOptions {
        AutoSyncOptions {
            sync_on_startup: false,
            ..AutoSyncOptions::default()
        }
    }

    #[test]
    fn options_follow_settings() {
        let settings = SyncSettings {
            sync_interval_minutes: 15,
            auto_sync_on_startup: false,
            ..SyncSettings::default()
        };
        let options = AutoSyncOptions::from_settings(&settings);

        assert_eq!(options.interval, Some(Duration::from_secs(900)));
        assert!(!options.sync_on_startup);
        assert!(options.sync_on_change);
        assert_eq!(options.debounce, Duration::from_secs(5));

        let options = AutoSyncOptions::from_settings(&SyncSettings::default());
        assert_eq!(options.interval, None);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_changes_uploads_once() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let (orch, config_store) = orchestrator("laptop", "/home/alice", config("prod"), &blobs);
        orch.set_master_password("alpha").await.unwrap();
        assert!(orch.sync().await.success);

        let (auto, tx) = AutoSync::new(orch.clone(), quiet());
        let handle = auto.spawn();

        config_store.set(config("prod-2"));
        for _ in 0..3 {
            tx.send(ConfigEvent::Changed).await.unwrap();
            sleep(Duration::from_secs(1)).await;
        }
        sleep(Duration::from_secs(10)).await;

        tx.send(ConfigEvent::Shutdown).await.unwrap();
        handle.await.unwrap();

        assert_eq!(blobs.upload_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn write_back_echo_does_not_upload() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let (a, _) = orchestrator("laptop", "/home/alice", config("prod"), &blobs);
        a.set_master_password("alpha").await.unwrap();
        assert!(a.sync().await.success);

        let (b, b_config) = orchestrator("desktop", "/home/bob", json!({}), &blobs);
        b.set_master_password("alpha").await.unwrap();
        let (auto, tx) = AutoSync::new(b.clone(), quiet());
        let handle = auto.spawn();

        assert!(b.pull().await.success);
        assert_eq!(b_config.write_count(), 1);
        tx.send(ConfigEvent::Changed).await.unwrap();
        sleep(Duration::from_secs(10)).await;

        tx.send(ConfigEvent::Shutdown).await.unwrap();
        handle.await.unwrap();

        assert_eq!(blobs.upload_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_flushes_pending_change() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let (orch, config_store) = orchestrator("laptop", "/home/alice", config("prod"), &blobs);
        orch.set_master_password("alpha").await.unwrap();
        assert!(orch.sync().await.success);

        let (auto, tx) = AutoSync::new(orch.clone(), quiet());
        let handle = auto.spawn();

        config_store.set(config("prod-2"));
        tx.send(ConfigEvent::Changed).await.unwrap();
        tx.send(ConfigEvent::Shutdown).await.unwrap();
        handle.await.unwrap();

        assert_eq!(blobs.upload_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_and_startup_cycles() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let (orch, config_store) = orchestrator("laptop", "/home/alice", config("prod"), &blobs);
        orch.set_master_password("alpha").await.unwrap();

        let options = AutoSyncOptions {
            interval: Some(Duration::from_secs(60)),
            ..AutoSyncOptions::default()
        };
        let (auto, tx) = AutoSync::new(orch.clone(), options);
        let handle = auto.spawn();

        sleep(Duration::from_secs(1)).await;
        assert_eq!(blobs.upload_count(), 1);

        config_store.set(config("prod-2"));
        sleep(Duration::from_secs(61)).await;
        assert_eq!(blobs.upload_count(), 2);

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn locked_session_skips_cycles() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let (orch, config_store) = orchestrator("laptop", "/home/alice", config("prod"), &blobs);
        orch.set_master_password("alpha").await.unwrap();
        assert!(orch.sync().await.success);
        orch.lock();

        let (auto, tx) = AutoSync::new(orch.clone(), AutoSyncOptions::default());
        let handle = auto.spawn();

        config_store.set(config("prod-2"));
        tx.send(ConfigEvent::Changed).await.unwrap();
        sleep(Duration::from_secs(10)).await;
        tx.send(ConfigEvent::Shutdown).await.unwrap();
        handle.await.unwrap();

        assert_eq!(blobs.upload_count(), 1);
        assert_eq!(orch.phase(), SyncPhase::Idle);
    }
}
