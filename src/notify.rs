//! Console notifications for tracked events.

use std::io::Write;
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;

use mercury_bus::{BusError, EventBus, Subscription};
use mercury_types::{Event, Payload, TradeOffer};

/// One-line, human-readable description of an event
pub fn render(event: &Event) -> String {
    match &event.payload {
        Payload::PlayerJoined { nickname } => format!("{} joined your area", nickname),
        Payload::PlayerLeft { nickname } => format!("{} left your area", nickname),
        Payload::IncomingTrade(offer) => format!("{} wants {}", offer.nickname, offer_summary(offer)),
        Payload::OutgoingTrade(offer) => {
            format!("you asked {} for {}", offer.nickname, offer_summary(offer))
        }
        Payload::IncomingWhisper { nickname, message, .. } => {
            format!("@From {}: {}", nickname, message)
        }
        Payload::OutgoingWhisper { nickname, message, .. } => {
            format!("@To {}: {}", nickname, message)
        }
        Payload::AreaEntered { area } => format!("entered {}", area),
        Payload::PlayerOffline => "that character is not online".to_string(),
        Payload::AfkMode { enabled, .. } => format!("AFK mode {}", on_off(*enabled)),
        Payload::DndMode { enabled, .. } => format!("DND mode {}", on_off(*enabled)),
        Payload::TradeAccepted => "trade accepted".to_string(),
        Payload::TradeCancelled => "trade cancelled".to_string(),
        Payload::LevelUp {
            nickname,
            class,
            level,
        } => format!("{} ({}) reached level {}", nickname, class, level),
        Payload::PlayerSlain { nickname } => format!("{} has been slain", nickname),
        Payload::ChatScanner {
            channel,
            nickname,
            message,
            matched,
        } => format!(
            "{}{}: {} [{}]",
            channel.prefix(),
            nickname,
            message,
            matched.join(", ")
        ),
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

fn offer_summary(offer: &TradeOffer) -> String {
    let mut summary = offer.goods();
    if let Some(price) = &offer.price {
        summary.push_str(&format!(" for {}", price));
    }
    if let Some(league) = &offer.league {
        summary.push_str(&format!(" ({})", league));
    }
    summary
}

/// Writes a timestamped line for every event on the bus
#[derive(Clone)]
pub struct Notifier {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Notifier {
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
        }
    }

    pub fn notify(&self, event: &Event) {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), render(event));
        let mut out = self.out.lock();
        if let Err(err) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            tracing::warn!(error = %err, "failed to write notification");
        }
    }

    /// Subscribe to every topic on `bus`
    pub fn attach(&self, bus: &EventBus) -> Result<Vec<Subscription>, BusError> {
        let notifier = self.clone();
        bus.subscribe_all(move |event| notifier.notify(event))
    }
}
