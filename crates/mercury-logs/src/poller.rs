use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::chain::InterceptorChain;
use crate::tail::LogTailer;

/// Counters accumulated by a poll loop
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollerStats {
    /// Poll ticks completed
    pub polls: u64,

    /// Complete lines read from the log
    pub lines: u64,

    /// Events published on the bus
    pub published: u64,
}

/// Drives a [`LogTailer`] and an [`InterceptorChain`] on a fixed period
pub struct Poller {
    tailer: LogTailer,
    chain: InterceptorChain,
    interval: Duration,
    stats: PollerStats,
}

impl Poller {
    pub fn new(tailer: LogTailer, chain: InterceptorChain, interval: Duration) -> Self {
        Self {
            tailer,
            chain,
            interval,
            stats: PollerStats::default(),
        }
    }

    pub fn stats(&self) -> PollerStats {
        self.stats
    }

    /// Read the new lines and route each of them, in file order
    pub fn poll_once(&mut self) -> PollerStats {
        let lines = self.tailer.poll();
        let outcome = self.chain.route_all(&lines);

        self.stats.polls += 1;
        self.stats.lines += lines.len() as u64;
        self.stats.published += outcome.published as u64;

        if !lines.is_empty() {
            tracing::debug!(
                lines = lines.len(),
                matched = outcome.matched,
                published = outcome.published,
                failed = outcome.failed,
                "batch routed"
            );
        }
        self.stats
    }

    /// Start the poll loop on the Tokio runtime
    pub fn spawn(tailer: LogTailer, chain: InterceptorChain, interval: Duration) -> PollerHandle {
        Self::new(tailer, chain, interval).start()
    }

    /// Move this poller onto a background task
    ///
    /// Each batch runs on the blocking pool, so file reads never stall a
    /// runtime worker.
    pub fn start(self) -> PollerHandle {
        let cancel = CancellationToken::new();

        let task = {
            let cancel = cancel.clone();
            let mut poller = self;
            tokio::spawn(async move {
                tracing::info!(
                    path = %poller.tailer.path().display(),
                    interval_ms = poller.interval.as_millis() as u64,
                    "log tracker started"
                );

                let mut ticker = tokio::time::interval(poller.interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        biased;

                        _ = cancel.cancelled() => break,

                        _ = ticker.tick() => {
                            // A batch always runs to completion before the
                            // next cancellation check
                            let last = poller.stats;
                            let batch = tokio::task::spawn_blocking(move || {
                                poller.poll_once();
                                poller
                            });
                            match batch.await {
                                Ok(returned) => poller = returned,
                                Err(err) => {
                                    tracing::error!(error = %err, "log batch aborted, tracker stopped");
                                    return last;
                                }
                            }
                        }
                    }
                }

                tracing::info!(
                    polls = poller.stats.polls,
                    lines = poller.stats.lines,
                    published = poller.stats.published,
                    "log tracker stopped"
                );
                poller.stats
            })
        };

        PollerHandle { cancel, task }
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("tailer", &self.tailer)
            .field("chain", &self.chain)
            .field("interval", &self.interval)
            .field("stats", &self.stats)
            .finish()
    }
}

/// Handle to a running poll loop
pub struct PollerHandle {
    cancel: CancellationToken,
    task: JoinHandle<PollerStats>,
}

impl PollerHandle {
    /// Stop after the batch in progress and return the final counters
    pub async fn stop(self) -> PollerStats {
        self.cancel.cancel();
        match self.task.await {
            Ok(stats) => stats,
            Err(err) => {
                tracing::error!(error = %err, "poll loop ended abnormally");
                PollerStats::default()
            }
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Token that stops the loop when cancelled
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
