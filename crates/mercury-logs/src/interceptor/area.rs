use mercury_types::{Payload, RawLine, Topic};
use regex::Regex;

use super::{substring_between, system_notice, LineInterceptor, MessageInterceptor};
use crate::error::TrackerError;
use crate::filter::MessageFilter;

const JOINED: &str = " has joined the area.";
const LEFT: &str = " has left the area.";
const SLAIN: &str = " has been slain.";
const ENTERED: &str = ": You have entered ";

const LEVEL_UP_PATTERN: &str =
    r": (?P<nick>[^\s:]+) \((?P<class>[^)]+)\) is now level (?P<level>\d+)";

/// Name between the ` : ` speaker separator and `suffix`
fn nickname_before(line: &RawLine, topic: Topic, suffix: &str) -> Result<String, TrackerError> {
    substring_between(line.text(), " : ", suffix)
        .map(str::trim)
        .filter(|nick| !nick.is_empty())
        .map(str::to_string)
        .ok_or_else(|| TrackerError::malformed(topic, "missing player name"))
}

pub fn player_joined() -> LineInterceptor {
    LineInterceptor::new(
        Topic::PlayerJoined,
        system_notice(MessageFilter::contains(JOINED.trim_start())),
        |line| {
            Ok(Payload::PlayerJoined {
                nickname: nickname_before(line, Topic::PlayerJoined, JOINED)?,
            })
        },
    )
}

pub fn player_left() -> LineInterceptor {
    LineInterceptor::new(
        Topic::PlayerLeft,
        system_notice(MessageFilter::contains(LEFT.trim_start())),
        |line| {
            Ok(Payload::PlayerLeft {
                nickname: nickname_before(line, Topic::PlayerLeft, LEFT)?,
            })
        },
    )
}

pub fn player_slain() -> LineInterceptor {
    LineInterceptor::new(
        Topic::PlayerSlain,
        system_notice(MessageFilter::contains(SLAIN.trim_start())),
        |line| {
            Ok(Payload::PlayerSlain {
                nickname: nickname_before(line, Topic::PlayerSlain, SLAIN)?,
            })
        },
    )
}

pub fn area_entered() -> LineInterceptor {
    LineInterceptor::new(Topic::AreaEntered, MessageFilter::contains(ENTERED), |line| {
        let text = line.text();
        let area = text
            .find(ENTERED)
            .map(|pos| text[pos + ENTERED.len()..].trim_end())
            .and_then(|rest| rest.strip_suffix('.'))
            .filter(|area| !area.is_empty())
            .ok_or_else(|| TrackerError::malformed(Topic::AreaEntered, "missing area name"))?;
        Ok(Payload::AreaEntered {
            area: area.to_string(),
        })
    })
}

/// Parses `: nick (Class) is now level N`
pub struct LevelUpInterceptor {
    pattern: Regex,
    filter: MessageFilter,
}

impl LevelUpInterceptor {
    pub fn new() -> Result<Self, TrackerError> {
        let pattern = Regex::new(LEVEL_UP_PATTERN)?;
        Ok(Self {
            filter: MessageFilter::Pattern(pattern.clone()),
            pattern,
        })
    }
}

impl MessageInterceptor for LevelUpInterceptor {
    fn topic(&self) -> Topic {
        Topic::LevelUp
    }

    fn filter(&self) -> &MessageFilter {
        &self.filter
    }

    fn parse(&self, line: &RawLine) -> Result<Payload, TrackerError> {
        let caps = self
            .pattern
            .captures(line.text())
            .ok_or_else(|| TrackerError::malformed(Topic::LevelUp, "no level announcement"))?;
        let level = caps["level"]
            .parse()
            .map_err(|_| TrackerError::malformed(Topic::LevelUp, "level out of range"))?;

        Ok(Payload::LevelUp {
            nickname: caps["nick"].to_string(),
            class: caps["class"].to_string(),
            level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "2017/01/17 23:15:29 17343218 a1b [INFO Client 1234]";

    fn client(body: &str) -> RawLine {
        RawLine::new(1, format!("{} {}", PREFIX, body))
    }

    #[test]
    fn test_player_joined() {
        let interceptor = player_joined();
        let line = RawLine::new(1, "Foo : PlayerOne has joined the area.");
        assert!(interceptor.matches(&line));
        assert_eq!(
            interceptor.parse(&line).unwrap(),
            Payload::PlayerJoined {
                nickname: "PlayerOne".into()
            }
        );
    }

    #[test]
    fn test_player_joined_requires_trailing_period() {
        let line = RawLine::new(1, "Foo : PlayerOne has joined the area");
        assert!(!player_joined().matches(&line));
    }

    #[test]
    fn test_player_joined_without_separator_is_malformed() {
        let interceptor = player_joined();
        let line = RawLine::new(1, "PlayerOne has joined the area.");
        assert!(interceptor.matches(&line));
        assert!(matches!(
            interceptor.parse(&line),
            Err(TrackerError::MalformedMatch {
                topic: Topic::PlayerJoined,
                ..
            })
        ));
    }

    #[test]
    fn test_player_left_and_slain() {
        let left = client(": Bob has left the area.");
        assert_eq!(
            player_left().parse(&left).unwrap(),
            Payload::PlayerLeft {
                nickname: "Bob".into()
            }
        );

        let slain = client(": Bob has been slain.");
        assert!(player_slain().matches(&slain));
        assert_eq!(
            player_slain().parse(&slain).unwrap(),
            Payload::PlayerSlain {
                nickname: "Bob".into()
            }
        );
    }

    #[test]
    fn test_chat_quoting_notice_ignored() {
        assert!(!player_joined().matches(&client("#Bob: Carl has joined the area.")));
        assert!(!player_left().matches(&client("@From Bob: Carl has left the area.")));
        assert!(!player_slain().matches(&client("$Bob: Carl has been slain.")));
        assert!(player_joined().matches(&client(": Carl has joined the area.")));
    }

    #[test]
    fn test_area_entered() {
        let line = client(": You have entered The Twilight Strand.");
        let interceptor = area_entered();
        assert!(interceptor.matches(&line));
        assert_eq!(
            interceptor.parse(&line).unwrap(),
            Payload::AreaEntered {
                area: "The Twilight Strand".into()
            }
        );

        let truncated = client(": You have entered Lioneye's Watch");
        assert!(interceptor.parse(&truncated).is_err());
    }

    #[test]
    fn test_level_up() {
        let interceptor = LevelUpInterceptor::new().unwrap();
        let line = client(": Bob (Witch) is now level 12");
        assert!(interceptor.matches(&line));
        assert_eq!(
            interceptor.parse(&line).unwrap(),
            Payload::LevelUp {
                nickname: "Bob".into(),
                class: "Witch".into(),
                level: 12,
            }
        );
        assert!(!interceptor.matches(&client(": Bob (Witch) is now level")));
    }
}
