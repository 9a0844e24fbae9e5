use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

type Action = Box<dyn FnOnce() + Send + 'static>;

struct Pending {
    generation: u64,
    cancel: CancellationToken,
    action: Action,
}

#[derive(Default)]
struct State {
    generation: u64,
    pending: Option<Pending>,
}

/// Deferred action whose deadline restarts on every trigger
///
/// Only the most recently triggered action runs, once `delay` has passed
/// without another trigger. Must be used from within a Tokio runtime.
#[derive(Clone)]
pub struct Debouncer {
    delay: Duration,
    state: Arc<Mutex<State>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `action`, replacing any action still waiting
    pub fn trigger<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let generation = {
            let mut state = self.state.lock();
            state.generation += 1;
            if let Some(previous) = state.pending.take() {
                previous.cancel.cancel();
            }
            state.pending = Some(Pending {
                generation: state.generation,
                cancel: cancel.clone(),
                action: Box::new(action),
            });
            state.generation
        };

        let state = Arc::clone(&self.state);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let due = state
                        .lock()
                        .pending
                        .take_if(|p| p.generation == generation);
                    if let Some(pending) = due {
                        if tokio::task::spawn_blocking(pending.action).await.is_err() {
                            tracing::error!("debounced action panicked");
                        }
                    }
                }
            }
        });
    }

    /// Drop the waiting action without running it
    pub fn cancel(&self) -> bool {
        match self.state.lock().pending.take() {
            Some(pending) => {
                pending.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Run the waiting action now, on the calling thread
    pub fn flush(&self) -> bool {
        let pending = self.state.lock().pending.take();
        match pending {
            Some(pending) => {
                pending.cancel.cancel();
                (pending.action)();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish()
    }
}
