use mercury_types::{Payload, RawLine, Topic};

use super::{split_sender, MessageInterceptor};
use crate::error::TrackerError;
use crate::filter::MessageFilter;

pub(crate) const FROM: &str = "@From ";
pub(crate) const TO: &str = "@To ";

/// Which side of a private conversation a line belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub(crate) fn marker(self) -> &'static str {
        match self {
            Self::Incoming => FROM,
            Self::Outgoing => TO,
        }
    }
}

/// Sender and text of a whisper line
pub(crate) struct Whisper<'a> {
    pub guild: Option<&'a str>,
    pub nickname: &'a str,
    pub message: &'a str,
}

/// Split a `@From`/`@To` line into sender and message
pub(crate) fn parse_whisper<'a>(
    line: &'a RawLine,
    direction: Direction,
    topic: Topic,
) -> Result<Whisper<'a>, TrackerError> {
    let rest = line
        .body()
        .strip_prefix(direction.marker())
        .ok_or_else(|| TrackerError::malformed(topic, "missing whisper marker"))?;
    let (guild, nickname, message) = split_sender(rest)
        .ok_or_else(|| TrackerError::malformed(topic, "missing whisper sender"))?;
    Ok(Whisper {
        guild,
        nickname,
        message,
    })
}

/// Private messages to or from the player
pub struct WhisperInterceptor {
    direction: Direction,
    filter: MessageFilter,
}

impl WhisperInterceptor {
    pub fn incoming() -> Self {
        Self::new(Direction::Incoming)
    }

    pub fn outgoing() -> Self {
        Self::new(Direction::Outgoing)
    }

    fn new(direction: Direction) -> Self {
        Self {
            direction,
            filter: MessageFilter::body_starts_with(direction.marker()),
        }
    }
}

impl MessageInterceptor for WhisperInterceptor {
    fn topic(&self) -> Topic {
        match self.direction {
            Direction::Incoming => Topic::IncomingWhisper,
            Direction::Outgoing => Topic::OutgoingWhisper,
        }
    }

    fn filter(&self) -> &MessageFilter {
        &self.filter
    }

    fn parse(&self, line: &RawLine) -> Result<Payload, TrackerError> {
        let whisper = parse_whisper(line, self.direction, self.topic())?;
        let nickname = whisper.nickname.to_string();
        let guild = whisper.guild.map(str::to_string);
        let message = whisper.message.to_string();

        Ok(match self.direction {
            Direction::Incoming => Payload::IncomingWhisper {
                nickname,
                guild,
                message,
            },
            Direction::Outgoing => Payload::OutgoingWhisper {
                nickname,
                guild,
                message,
            },
        })
    }
}

impl std::fmt::Debug for WhisperInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperInterceptor")
            .field("direction", &self.direction)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(body: &str) -> RawLine {
        RawLine::new(
            1,
            format!("2017/01/17 23:15:29 17343218 a1b [INFO Client 1234] {}", body),
        )
    }

    #[test]
    fn test_incoming_whisper_with_guild() {
        let line = client("@From <GG> Bob: are you there?");
        let interceptor = WhisperInterceptor::incoming();
        assert!(interceptor.matches(&line));
        assert_eq!(
            interceptor.parse(&line).unwrap(),
            Payload::IncomingWhisper {
                nickname: "Bob".into(),
                guild: Some("GG".into()),
                message: "are you there?".into(),
            }
        );
    }

    #[test]
    fn test_outgoing_whisper() {
        let line = client("@To Alice: sure, 5 min");
        let interceptor = WhisperInterceptor::outgoing();
        assert!(interceptor.matches(&line));
        assert!(!WhisperInterceptor::incoming().matches(&line));
        assert_eq!(
            interceptor.parse(&line).unwrap(),
            Payload::OutgoingWhisper {
                nickname: "Alice".into(),
                guild: None,
                message: "sure, 5 min".into(),
            }
        );
    }

    #[test]
    fn test_chat_mentioning_marker_not_matched() {
        let line = client("#Carl: type @From to see whispers");
        assert!(!WhisperInterceptor::incoming().matches(&line));
    }

    #[test]
    fn test_whisper_without_sender_is_malformed() {
        let line = client("@From nobody here");
        assert!(matches!(
            WhisperInterceptor::incoming().parse(&line),
            Err(TrackerError::MalformedMatch {
                topic: Topic::IncomingWhisper,
                ..
            })
        ));
    }
}
