//! Shared types for mercury
//!
//! This crate contains the raw log line record and the event family that the
//! interceptors publish and the UI layer consumes.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Raw Log Types
// ============================================================================

/// Timestamp layout used by the game client at the start of every line
const CLIENT_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Length of a formatted client timestamp ("2017/01/17 23:15:29")
const CLIENT_TIMESTAMP_LEN: usize = 19;

/// A single complete line read from the client log
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawLine {
    /// Sequential line number assigned by the tailer (1-based)
    number: u64,

    /// Line text without the trailing line terminator
    text: String,
}

impl RawLine {
    pub fn new(number: u64, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parse the client timestamp prefix, if the line carries one
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        let prefix = self.text.get(..CLIENT_TIMESTAMP_LEN)?;
        NaiveDateTime::parse_from_str(prefix, CLIENT_TIMESTAMP_FORMAT).ok()
    }

    /// Message body after the `[INFO Client 1234] ` tag
    ///
    /// Lines without a timestamp prefix are returned unchanged.
    pub fn body(&self) -> &str {
        if self.timestamp().is_none() {
            return &self.text;
        }
        match self.text.find("] ") {
            Some(pos) => &self.text[pos + 2..],
            None => &self.text,
        }
    }
}

impl fmt::Display for RawLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<str> for RawLine {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

// ============================================================================
// Topics
// ============================================================================

/// Event bus channel. Every topic carries exactly one payload variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    PlayerJoined,
    PlayerLeft,
    IncomingTrade,
    OutgoingTrade,
    IncomingWhisper,
    OutgoingWhisper,
    AreaEntered,
    PlayerOffline,
    AfkMode,
    DndMode,
    TradeAccepted,
    TradeCancelled,
    LevelUp,
    PlayerSlain,
    ChatScanner,
}

impl Topic {
    /// Every topic, in declaration order
    pub const ALL: [Topic; 15] = [
        Topic::PlayerJoined,
        Topic::PlayerLeft,
        Topic::IncomingTrade,
        Topic::OutgoingTrade,
        Topic::IncomingWhisper,
        Topic::OutgoingWhisper,
        Topic::AreaEntered,
        Topic::PlayerOffline,
        Topic::AfkMode,
        Topic::DndMode,
        Topic::TradeAccepted,
        Topic::TradeCancelled,
        Topic::LevelUp,
        Topic::PlayerSlain,
        Topic::ChatScanner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlayerJoined => "player_joined",
            Self::PlayerLeft => "player_left",
            Self::IncomingTrade => "incoming_trade",
            Self::OutgoingTrade => "outgoing_trade",
            Self::IncomingWhisper => "incoming_whisper",
            Self::OutgoingWhisper => "outgoing_whisper",
            Self::AreaEntered => "area_entered",
            Self::PlayerOffline => "player_offline",
            Self::AfkMode => "afk_mode",
            Self::DndMode => "dnd_mode",
            Self::TradeAccepted => "trade_accepted",
            Self::TradeCancelled => "trade_cancelled",
            Self::LevelUp => "level_up",
            Self::PlayerSlain => "player_slain",
            Self::ChatScanner => "chat_scanner",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Trade Types
// ============================================================================

/// Amount of a named currency ("5 chaos", "1.5 exalted")
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    pub currency: String,
}

impl Price {
    pub fn new(amount: f64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

/// What the buyer asks for
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TradeKind {
    /// A single listed item
    Item { item: String },
    /// A stack of currency
    Currency { wanted: Price },
}

/// Stash cell of a listed item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashPosition {
    pub left: u32,
    pub top: u32,
}

/// A parsed trade whisper
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TradeOffer {
    /// Character name of the other party
    pub nickname: String,

    /// Guild tag, if the whisper carried one
    pub guild: Option<String>,

    pub kind: TradeKind,

    /// Listed price (item) or offered payment (currency)
    pub price: Option<Price>,

    pub league: Option<String>,

    pub stash_tab: Option<String>,

    pub position: Option<StashPosition>,

    /// Text after the offer sentence, usually a personal note
    pub note: Option<String>,

    /// Full whisper text
    pub message: String,
}

impl TradeOffer {
    /// Short description of the wanted goods
    pub fn goods(&self) -> String {
        match &self.kind {
            TradeKind::Item { item } => item.clone(),
            TradeKind::Currency { wanted } => wanted.to_string(),
        }
    }
}

/// Public chat channel watched by the chat scanner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatChannel {
    Global,
    Trade,
}

impl ChatChannel {
    /// Parse the channel prefix character used by the client
    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix {
            '#' => Some(Self::Global),
            '$' => Some(Self::Trade),
            _ => None,
        }
    }

    pub fn prefix(&self) -> char {
        match self {
            Self::Global => '#',
            Self::Trade => '$',
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Classified payload of one log line
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    PlayerJoined {
        nickname: String,
    },
    PlayerLeft {
        nickname: String,
    },
    IncomingTrade(TradeOffer),
    OutgoingTrade(TradeOffer),
    IncomingWhisper {
        nickname: String,
        guild: Option<String>,
        message: String,
    },
    OutgoingWhisper {
        nickname: String,
        guild: Option<String>,
        message: String,
    },
    AreaEntered {
        area: String,
    },
    PlayerOffline,
    AfkMode {
        enabled: bool,
        autoreply: Option<String>,
    },
    DndMode {
        enabled: bool,
        autoreply: Option<String>,
    },
    TradeAccepted,
    TradeCancelled,
    LevelUp {
        nickname: String,
        class: String,
        level: u32,
    },
    PlayerSlain {
        nickname: String,
    },
    ChatScanner {
        channel: ChatChannel,
        nickname: String,
        message: String,
        matched: Vec<String>,
    },
}

impl Payload {
    /// Topic this payload is published on
    pub fn topic(&self) -> Topic {
        match self {
            Self::PlayerJoined { .. } => Topic::PlayerJoined,
            Self::PlayerLeft { .. } => Topic::PlayerLeft,
            Self::IncomingTrade(_) => Topic::IncomingTrade,
            Self::OutgoingTrade(_) => Topic::OutgoingTrade,
            Self::IncomingWhisper { .. } => Topic::IncomingWhisper,
            Self::OutgoingWhisper { .. } => Topic::OutgoingWhisper,
            Self::AreaEntered { .. } => Topic::AreaEntered,
            Self::PlayerOffline => Topic::PlayerOffline,
            Self::AfkMode { .. } => Topic::AfkMode,
            Self::DndMode { .. } => Topic::DndMode,
            Self::TradeAccepted => Topic::TradeAccepted,
            Self::TradeCancelled => Topic::TradeCancelled,
            Self::LevelUp { .. } => Topic::LevelUp,
            Self::PlayerSlain { .. } => Topic::PlayerSlain,
            Self::ChatScanner { .. } => Topic::ChatScanner,
        }
    }

    /// Player the event is about, when there is one
    pub fn nickname(&self) -> Option<&str> {
        match self {
            Self::PlayerJoined { nickname }
            | Self::PlayerLeft { nickname }
            | Self::IncomingWhisper { nickname, .. }
            | Self::OutgoingWhisper { nickname, .. }
            | Self::LevelUp { nickname, .. }
            | Self::PlayerSlain { nickname }
            | Self::ChatScanner { nickname, .. } => Some(nickname),
            Self::IncomingTrade(offer) | Self::OutgoingTrade(offer) => Some(&offer.nickname),
            _ => None,
        }
    }
}

/// A classified occurrence, immutable once created
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Client timestamp of the originating line
    pub logged_at: Option<NaiveDateTime>,

    /// Line number of the originating line
    pub line_number: u64,

    #[serde(flatten)]
    pub payload: Payload,
}

impl Event {
    pub fn new(payload: Payload) -> Self {
        Self {
            logged_at: None,
            line_number: 0,
            payload,
        }
    }

    /// Create an event stamped with the origin of `line`
    pub fn from_line(line: &RawLine, payload: Payload) -> Self {
        Self {
            logged_at: line.timestamp(),
            line_number: line.number(),
            payload,
        }
    }

    pub fn topic(&self) -> Topic {
        self.payload.topic()
    }
}
