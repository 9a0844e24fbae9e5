//! Message interceptors
//!
//! An interceptor pairs a [`MessageFilter`] with a parser for one category of
//! client message. The chain offers every line to every interceptor; those
//! whose filter matches parse the line and publish one event on their topic.

mod area;
mod scanner;
mod status;
mod trade;
mod whisper;

pub use area::{area_entered, player_joined, player_left, player_slain, LevelUpInterceptor};
pub use scanner::ChatScannerInterceptor;
pub use status::{afk_mode, dnd_mode, player_offline, trade_accepted, trade_cancelled};
pub use trade::TradeInterceptor;
pub use whisper::WhisperInterceptor;

use mercury_bus::EventBus;
use mercury_types::{ChatChannel, Event, Payload, RawLine, Topic};

use crate::error::TrackerError;
use crate::filter::MessageFilter;

/// Filter and parser for one category of client message
pub trait MessageInterceptor: Send + Sync {
    /// Topic the parsed events are published on
    fn topic(&self) -> Topic;

    fn filter(&self) -> &MessageFilter;

    /// Extract the payload from a line the filter accepted
    fn parse(&self, line: &RawLine) -> Result<Payload, TrackerError>;

    fn matches(&self, line: &RawLine) -> bool {
        self.filter().matches(line)
    }

    /// Parse `line` and publish the event. Returns the number of subscribers
    /// it was queued for.
    fn parse_and_publish(&self, line: &RawLine, bus: &EventBus) -> Result<usize, TrackerError> {
        let payload = self.parse(line)?;
        let delivered = bus.publish(self.topic(), Event::from_line(line, payload))?;
        Ok(delivered)
    }
}

type ParseFn = fn(&RawLine) -> Result<Payload, TrackerError>;

/// Interceptor made of a fixed filter and a plain parse function
///
/// Covers every category whose parsing needs no state of its own.
pub struct LineInterceptor {
    topic: Topic,
    filter: MessageFilter,
    parse: ParseFn,
}

impl LineInterceptor {
    pub fn new(topic: Topic, filter: MessageFilter, parse: ParseFn) -> Self {
        Self {
            topic,
            filter,
            parse,
        }
    }
}

impl MessageInterceptor for LineInterceptor {
    fn topic(&self) -> Topic {
        self.topic
    }

    fn filter(&self) -> &MessageFilter {
        &self.filter
    }

    fn parse(&self, line: &RawLine) -> Result<Payload, TrackerError> {
        (self.parse)(line)
    }
}

impl std::fmt::Debug for LineInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineInterceptor")
            .field("topic", &self.topic)
            .field("filter", &self.filter)
            .finish()
    }
}

/// Every built-in interceptor, in registration order
///
/// The chat scanner is only included when `scanner_words` has a usable word.
pub fn default_interceptors(
    scanner_words: &[String],
) -> Result<Vec<Box<dyn MessageInterceptor>>, TrackerError> {
    let mut interceptors: Vec<Box<dyn MessageInterceptor>> = vec![
        Box::new(player_joined()),
        Box::new(player_left()),
        Box::new(TradeInterceptor::incoming()?),
        Box::new(TradeInterceptor::outgoing()?),
        Box::new(WhisperInterceptor::incoming()),
        Box::new(WhisperInterceptor::outgoing()),
        Box::new(area_entered()),
        Box::new(player_offline()),
        Box::new(afk_mode()),
        Box::new(dnd_mode()),
        Box::new(trade_accepted()),
        Box::new(trade_cancelled()),
        Box::new(LevelUpInterceptor::new()?),
        Box::new(player_slain()),
    ];

    if let Some(scanner) = ChatScannerInterceptor::new(scanner_words)? {
        interceptors.push(Box::new(scanner));
    }
    Ok(interceptors)
}

/// Lines typed by a player: whispers and public chat
fn player_message() -> MessageFilter {
    MessageFilter::predicate(|line| {
        let body = line.body();
        body.starts_with('@') || body.chars().next().and_then(ChatChannel::from_prefix).is_some()
    })
}

/// `notice` when it comes from the client rather than from a player
pub(crate) fn system_notice(notice: MessageFilter) -> MessageFilter {
    MessageFilter::all_of(vec![notice, player_message().inverted()])
}

/// Text strictly between the first `open` and the next `close` after it
pub(crate) fn substring_between<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let len = text[start..].find(close)?;
    Some(&text[start..start + len])
}

/// Split `[<GUILD> ]nick: message` into its parts
pub(crate) fn split_sender(rest: &str) -> Option<(Option<&str>, &str, &str)> {
    let (guild, rest) = match rest.strip_prefix('<') {
        Some(tagged) => {
            let (guild, rest) = tagged.split_once("> ")?;
            (Some(guild), rest)
        }
        None => (None, rest),
    };
    let (nickname, message) = rest.split_once(": ")?;
    if nickname.is_empty() || nickname.contains(' ') {
        return None;
    }
    Some((guild, nickname, message))
}
