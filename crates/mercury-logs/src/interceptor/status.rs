use mercury_types::{Payload, RawLine, Topic};

use super::{system_notice, LineInterceptor};
use crate::error::TrackerError;
use crate::filter::MessageFilter;

const AFK: &str = "AFK mode is now ";
const DND: &str = "DND mode is now ";
const AUTOREPLY: &str = "Autoreply \"";

/// ON/OFF flag and optional autoreply of an AFK or DND notice
fn parse_mode(line: &RawLine, topic: Topic, marker: &str) -> Result<(bool, Option<String>), TrackerError> {
    let text = line.text();
    let state = text
        .find(marker)
        .map(|pos| &text[pos + marker.len()..])
        .ok_or_else(|| TrackerError::malformed(topic, "missing mode marker"))?;

    let enabled = if state.starts_with("ON") {
        true
    } else if state.starts_with("OFF") {
        false
    } else {
        return Err(TrackerError::malformed(topic, "mode is neither ON nor OFF"));
    };

    // The reply may itself contain quotes, so close on the last one
    let autoreply = state.find(AUTOREPLY).and_then(|pos| {
        let reply = &state[pos + AUTOREPLY.len()..];
        reply.rfind('"').map(|end| reply[..end].to_string())
    });

    Ok((enabled, autoreply))
}

pub fn afk_mode() -> LineInterceptor {
    LineInterceptor::new(Topic::AfkMode, MessageFilter::contains(AFK), |line| {
        let (enabled, autoreply) = parse_mode(line, Topic::AfkMode, AFK)?;
        Ok(Payload::AfkMode { enabled, autoreply })
    })
}

pub fn dnd_mode() -> LineInterceptor {
    LineInterceptor::new(Topic::DndMode, MessageFilter::contains(DND), |line| {
        let (enabled, autoreply) = parse_mode(line, Topic::DndMode, DND)?;
        Ok(Payload::DndMode { enabled, autoreply })
    })
}

pub fn player_offline() -> LineInterceptor {
    LineInterceptor::new(
        Topic::PlayerOffline,
        system_notice(MessageFilter::contains("That character is not online.")),
        |_| Ok(Payload::PlayerOffline),
    )
}

pub fn trade_accepted() -> LineInterceptor {
    LineInterceptor::new(
        Topic::TradeAccepted,
        system_notice(MessageFilter::ends_with(": Trade accepted.")),
        |_| Ok(Payload::TradeAccepted),
    )
}

pub fn trade_cancelled() -> LineInterceptor {
    LineInterceptor::new(
        Topic::TradeCancelled,
        system_notice(MessageFilter::ends_with(": Trade cancelled.")),
        |_| Ok(Payload::TradeCancelled),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::MessageInterceptor;

    fn client(body: &str) -> RawLine {
        RawLine::new(
            1,
            format!("2017/01/17 23:15:29 17343218 a1b [INFO Client 1234] {}", body),
        )
    }

    #[test]
    fn test_afk_on_with_autoreply() {
        let line = client(r#": AFK mode is now ON. Autoreply "Out for "lunch"""#);
        let interceptor = afk_mode();
        assert!(interceptor.matches(&line));
        assert_eq!(
            interceptor.parse(&line).unwrap(),
            Payload::AfkMode {
                enabled: true,
                autoreply: Some(r#"Out for "lunch""#.into()),
            }
        );
    }

    #[test]
    fn test_afk_off() {
        let line = client(": AFK mode is now OFF.");
        assert_eq!(
            afk_mode().parse(&line).unwrap(),
            Payload::AfkMode {
                enabled: false,
                autoreply: None,
            }
        );
    }

    #[test]
    fn test_dnd_on() {
        let line = client(r#": DND mode is now ON. Autoreply "busy""#);
        assert_eq!(
            dnd_mode().parse(&line).unwrap(),
            Payload::DndMode {
                enabled: true,
                autoreply: Some("busy".into()),
            }
        );
        assert!(!afk_mode().matches(&line));
    }

    #[test]
    fn test_unknown_mode_state_is_malformed() {
        let line = client(": AFK mode is now MAYBE.");
        assert!(afk_mode().parse(&line).is_err());
    }

    #[test]
    fn test_fieldless_notices() {
        let offline = client(": That character is not online.");
        assert!(player_offline().matches(&offline));
        assert_eq!(player_offline().parse(&offline).unwrap(), Payload::PlayerOffline);

        let accepted = client(": Trade accepted.");
        assert!(trade_accepted().matches(&accepted));
        assert!(!trade_cancelled().matches(&accepted));

        assert!(!trade_accepted().matches(&client(": Trade accepted. later")));

        let cancelled = client(": Trade cancelled.");
        assert_eq!(
            trade_cancelled().parse(&cancelled).unwrap(),
            Payload::TradeCancelled
        );
    }

    #[test]
    fn test_notices_typed_by_players_ignored() {
        assert!(!trade_accepted().matches(&client("#Bob: Trade accepted.")));
        assert!(!trade_cancelled().matches(&client("@From Bob: Trade cancelled.")));
        assert!(!player_offline().matches(&client("$Bob: That character is not online.")));
    }
}
