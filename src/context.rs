use anyhow::{Context, Result};

use mercury_bus::{EventBus, Subscription};
use mercury_logs::{
    EventHistory, InterceptorChain, LogTailer, Poller, PollerHandle, PollerStats, TrackerConfig,
};

use crate::notify::Notifier;
use crate::settings::SettingsStore;

/// Application-wide services, built once in `main` and passed down
pub struct AppContext {
    pub bus: EventBus,
    pub history: EventHistory,
    pub settings: SettingsStore,
    subscriptions: Vec<Subscription>,
}

impl AppContext {
    /// Create the bus and attach the event history to it
    pub fn new(settings: SettingsStore, history_capacity: usize) -> Result<Self> {
        let bus = EventBus::new();
        let history = EventHistory::new(history_capacity);
        let subscriptions = history
            .attach(&bus)
            .context("failed to attach event history")?;

        Ok(Self {
            bus,
            history,
            settings,
            subscriptions,
        })
    }

    /// Print every event through `notifier`
    pub fn attach_notifier(&mut self, notifier: &Notifier) -> Result<()> {
        let subscriptions = notifier
            .attach(&self.bus)
            .context("failed to attach notifier")?;
        self.subscriptions.extend(subscriptions);
        Ok(())
    }

    /// Validate `config` and start tailing the client log
    pub fn start_tracker(&self, config: &TrackerConfig) -> Result<PollerHandle> {
        let tailer = LogTailer::new(config).context("invalid tracker configuration")?;
        let chain = InterceptorChain::with_defaults(self.bus.clone(), &config.scanner_words())
            .context("failed to build interceptor chain")?;
        Ok(Poller::spawn(tailer, chain, config.poll_interval()))
    }

    /// Stop the tracker, detach subscribers and persist settings
    pub async fn shutdown(&mut self, tracker: PollerHandle) -> Result<PollerStats> {
        let stats = tracker.stop().await;
        for subscription in self.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        self.settings.flush().context("failed to save settings")?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mercury_logs::StartPosition;
    use std::time::Duration;

    #[tokio::test]
    async fn test_tracker_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("Client.txt");
        std::fs::write(&log, "Foo : Bob has joined the area.\n").unwrap();

        let settings = SettingsStore::load(dir.path().join("settings.json"));
        let mut ctx = AppContext::new(settings, 10).unwrap();

        let config = TrackerConfig::new(&log)
            .with_poll_interval_ms(10)
            .with_start_position(StartPosition::Beginning);
        let tracker = ctx.start_tracker(&config).unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while ctx.history.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let stats = ctx.shutdown(tracker).await.unwrap();
        assert_eq!(stats.published, 1);
        assert_eq!(ctx.history.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SettingsStore::load(dir.path().join("settings.json"));
        let ctx = AppContext::new(settings, 10).unwrap();

        let config = TrackerConfig::new(dir.path());
        assert!(ctx.start_tracker(&config).is_err());
    }
}
