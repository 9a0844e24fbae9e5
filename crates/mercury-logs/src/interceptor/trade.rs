//! Trade whisper parsing
//!
//! Trade whispers are generated by the trade sites in a handful of fixed
//! shapes. Item offers may carry a listed price and a stash location; currency
//! offers name both the wanted and the offered amount.

use mercury_types::{Payload, Price, RawLine, StashPosition, Topic, TradeKind, TradeOffer};
use regex::{Captures, Regex};

use super::whisper::{parse_whisper, Direction};
use super::MessageInterceptor;
use crate::error::TrackerError;
use crate::filter::MessageFilter;

const ITEM_WITH_STASH: &str = r#"^(?:Hi, I would like to buy your|wtb) (?P<item>.+?)(?: listed for (?P<amount>[\d.,]+) (?P<currency>.+?))? in (?P<league>.+?) \(stash tab "(?P<tab>[^"]*)"; position: left (?P<left>\d+), top (?P<top>\d+)\)\s*(?P<note>.*)$"#;

const ITEM: &str = r"^(?:Hi, I would like to buy your|wtb) (?P<item>.+?)(?: listed for (?P<amount>[\d.,]+) (?P<currency>.+?))? in (?P<league>[^.(]+)\.?\s*(?P<note>.*)$";

const CURRENCY: &str = r"^Hi, I'd like to buy your (?P<wamount>[\d.,]+) (?P<wcurrency>.+?) for my (?P<amount>[\d.,]+) (?P<currency>.+?) in (?P<league>[^.(]+)\.?\s*(?P<note>.*)$";

/// Phrases that mark a whisper as a trade request
const TRADE_PHRASES: [&str; 2] = ["like to buy your", "wtb"];

struct OfferPatterns {
    item_with_stash: Regex,
    item: Regex,
    currency: Regex,
}

impl OfferPatterns {
    fn compile() -> Result<Self, TrackerError> {
        Ok(Self {
            item_with_stash: Regex::new(ITEM_WITH_STASH)?,
            item: Regex::new(ITEM)?,
            currency: Regex::new(CURRENCY)?,
        })
    }
}

/// Trade requests received or sent through whispers
pub struct TradeInterceptor {
    direction: Direction,
    filter: MessageFilter,
    patterns: OfferPatterns,
}

impl TradeInterceptor {
    pub fn incoming() -> Result<Self, TrackerError> {
        Self::new(Direction::Incoming)
    }

    pub fn outgoing() -> Result<Self, TrackerError> {
        Self::new(Direction::Outgoing)
    }

    fn new(direction: Direction) -> Result<Self, TrackerError> {
        let phrases = TRADE_PHRASES
            .iter()
            .map(|phrase| MessageFilter::contains(*phrase))
            .collect();

        Ok(Self {
            direction,
            filter: MessageFilter::all_of(vec![
                MessageFilter::body_starts_with(direction.marker()),
                MessageFilter::any_of(phrases),
            ]),
            patterns: OfferPatterns::compile()?,
        })
    }

    fn parse_offer(&self, message: &str) -> Result<OfferParts, TrackerError> {
        let topic = self.topic();

        if let Some(caps) = self.patterns.currency.captures(message) {
            let wanted = price(&caps, "wamount", "wcurrency", topic)?
                .ok_or_else(|| TrackerError::malformed(topic, "missing wanted currency"))?;
            return Ok(OfferParts {
                kind: TradeKind::Currency { wanted },
                price: price(&caps, "amount", "currency", topic)?,
                league: text(&caps, "league"),
                stash_tab: None,
                position: None,
                note: text(&caps, "note"),
            });
        }

        if let Some(caps) = self.patterns.item_with_stash.captures(message) {
            let position = match (caps.name("left"), caps.name("top")) {
                (Some(left), Some(top)) => Some(StashPosition {
                    left: left
                        .as_str()
                        .parse()
                        .map_err(|_| TrackerError::malformed(topic, "bad stash column"))?,
                    top: top
                        .as_str()
                        .parse()
                        .map_err(|_| TrackerError::malformed(topic, "bad stash row"))?,
                }),
                _ => None,
            };
            return Ok(OfferParts {
                kind: item_kind(&caps),
                price: price(&caps, "amount", "currency", topic)?,
                league: text(&caps, "league"),
                stash_tab: caps.name("tab").map(|m| m.as_str().to_string()),
                position,
                note: text(&caps, "note"),
            });
        }

        if let Some(caps) = self.patterns.item.captures(message) {
            return Ok(OfferParts {
                kind: item_kind(&caps),
                price: price(&caps, "amount", "currency", topic)?,
                league: text(&caps, "league"),
                stash_tab: None,
                position: None,
                note: text(&caps, "note"),
            });
        }

        Err(TrackerError::malformed(topic, "unrecognised trade offer"))
    }
}

impl MessageInterceptor for TradeInterceptor {
    fn topic(&self) -> Topic {
        match self.direction {
            Direction::Incoming => Topic::IncomingTrade,
            Direction::Outgoing => Topic::OutgoingTrade,
        }
    }

    fn filter(&self) -> &MessageFilter {
        &self.filter
    }

    fn parse(&self, line: &RawLine) -> Result<Payload, TrackerError> {
        let whisper = parse_whisper(line, self.direction, self.topic())?;
        let parts = self.parse_offer(whisper.message.trim())?;

        let offer = TradeOffer {
            nickname: whisper.nickname.to_string(),
            guild: whisper.guild.map(str::to_string),
            kind: parts.kind,
            price: parts.price,
            league: parts.league,
            stash_tab: parts.stash_tab,
            position: parts.position,
            note: parts.note,
            message: whisper.message.to_string(),
        };

        Ok(match self.direction {
            Direction::Incoming => Payload::IncomingTrade(offer),
            Direction::Outgoing => Payload::OutgoingTrade(offer),
        })
    }
}

impl std::fmt::Debug for TradeInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeInterceptor")
            .field("direction", &self.direction)
            .field("filter", &self.filter)
            .finish()
    }
}

/// Offer fields that do not come from the whisper header
struct OfferParts {
    kind: TradeKind,
    price: Option<Price>,
    league: Option<String>,
    stash_tab: Option<String>,
    position: Option<StashPosition>,
    note: Option<String>,
}

fn item_kind(caps: &Captures<'_>) -> TradeKind {
    TradeKind::Item {
        item: caps["item"].trim().to_string(),
    }
}

/// Trimmed capture, or None when absent or blank
fn text(caps: &Captures<'_>, name: &str) -> Option<String> {
    caps.name(name)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Amount and currency captures as a price. Amounts accept `,` as decimal
/// separator; a present but unparsable amount fails the match.
fn price(
    caps: &Captures<'_>,
    amount: &str,
    currency: &str,
    topic: Topic,
) -> Result<Option<Price>, TrackerError> {
    let (Some(amount), Some(currency)) = (caps.name(amount), caps.name(currency)) else {
        return Ok(None);
    };
    let value: f64 = amount
        .as_str()
        .replace(',', ".")
        .parse()
        .map_err(|_| TrackerError::malformed(topic, format!("bad amount '{}'", amount.as_str())))?;
    Ok(Some(Price::new(value, currency.as_str().trim())))
}
