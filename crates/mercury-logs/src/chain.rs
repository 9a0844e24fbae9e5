use std::ops::AddAssign;
use std::panic::{self, AssertUnwindSafe};

use mercury_bus::EventBus;
use mercury_types::RawLine;

use crate::error::TrackerError;
use crate::interceptor::{default_interceptors, MessageInterceptor};

/// What happened to one routed line (or a batch, when summed)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Interceptors whose filter accepted the line
    pub matched: usize,

    /// Events published
    pub published: usize,

    /// Interceptors that failed to parse, or panicked in filter or parser
    pub failed: usize,
}

impl AddAssign for RouteOutcome {
    fn add_assign(&mut self, other: Self) {
        self.matched += other.matched;
        self.published += other.published;
        self.failed += other.failed;
    }
}

/// Ordered list of interceptors sharing one bus
///
/// Every line is offered to every interceptor in insertion order; all that
/// match get to publish. One interceptor failing never stops the rest.
pub struct InterceptorChain {
    interceptors: Vec<Box<dyn MessageInterceptor>>,
    bus: EventBus,
}

impl InterceptorChain {
    /// Create an empty chain publishing on `bus`
    pub fn new(bus: EventBus) -> Self {
        Self {
            interceptors: Vec::new(),
            bus,
        }
    }

    /// Chain with every built-in interceptor registered
    pub fn with_defaults(bus: EventBus, scanner_words: &[String]) -> Result<Self, TrackerError> {
        let mut chain = Self::new(bus);
        for interceptor in default_interceptors(scanner_words)? {
            chain.interceptors.push(interceptor);
        }
        tracing::debug!(interceptors = chain.len(), "interceptor chain built");
        Ok(chain)
    }

    pub fn push(&mut self, interceptor: impl MessageInterceptor + 'static) {
        self.interceptors.push(Box::new(interceptor));
    }

    /// Builder form of [`push`](Self::push)
    pub fn with(mut self, interceptor: impl MessageInterceptor + 'static) -> Self {
        self.push(interceptor);
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Offer `line` to every interceptor
    pub fn route(&self, line: &RawLine) -> RouteOutcome {
        let mut outcome = RouteOutcome::default();

        for interceptor in &self.interceptors {
            let topic = interceptor.topic();
            let mut matched = false;
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                if !interceptor.matches(line) {
                    return Ok(None);
                }
                matched = true;
                interceptor.parse_and_publish(line, &self.bus).map(Some)
            }));
            if matched {
                outcome.matched += 1;
            }

            match result {
                Ok(Ok(None)) => {}
                Ok(Ok(Some(_delivered))) => {
                    outcome.published += 1;
                }
                Ok(Err(err)) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        topic = %topic,
                        line = line.number(),
                        error = %err,
                        "interceptor failed to parse line"
                    );
                }
                Err(_) => {
                    outcome.failed += 1;
                    tracing::error!(topic = %topic, line = line.number(), "interceptor panicked");
                }
            }
        }

        outcome
    }

    /// Route a batch in order and sum the outcomes
    pub fn route_all(&self, lines: &[RawLine]) -> RouteOutcome {
        let mut total = RouteOutcome::default();
        for line in lines {
            total += self.route(line);
        }
        total
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics: Vec<_> = self.interceptors.iter().map(|i| i.topic()).collect();
        f.debug_struct("InterceptorChain")
            .field("interceptors", &topics)
            .finish()
    }
}
