use mercury_types::{ChatChannel, Payload, RawLine, Topic};

use super::{split_sender, MessageInterceptor};
use crate::error::TrackerError;
use crate::filter::MessageFilter;

/// Channel, sender and message of a public chat line
fn split_chat(line: &RawLine) -> Option<(ChatChannel, Option<&str>, &str, &str)> {
    let body = line.body();
    let channel = ChatChannel::from_prefix(body.chars().next()?)?;
    let (guild, nickname, message) = split_sender(&body[1..])?;
    Some((channel, guild, nickname, message))
}

/// Escaped `word`, with `\b` only on the edges that are word characters
fn bounded(word: &str) -> String {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let edge = |c: Option<char>| if c.is_some_and(is_word) { r"\b" } else { "" };
    format!(
        "{}{}{}",
        edge(word.chars().next()),
        regex::escape(word),
        edge(word.chars().last())
    )
}

/// Watches global and trade chat for configured words
pub struct ChatScannerInterceptor {
    words: MessageFilter,
    filter: MessageFilter,
}

impl ChatScannerInterceptor {
    /// Build a scanner for `words`, or None when no usable word is given
    ///
    /// Words match case-insensitively on word boundaries, and only inside the
    /// message text so a nickname alone never triggers the scanner.
    pub fn new(words: &[String]) -> Result<Option<Self>, TrackerError> {
        let alternatives: Vec<String> = words
            .iter()
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .map(bounded)
            .collect();
        if alternatives.is_empty() {
            return Ok(None);
        }

        let words =
            MessageFilter::regex_case_insensitive(&format!("(?:{})", alternatives.join("|")))?;

        let filter = {
            let words = words.clone();
            MessageFilter::predicate(move |line| match split_chat(line) {
                Some((_, _, _, message)) => !words.find_matches(message).is_empty(),
                None => false,
            })
        };

        Ok(Some(Self { words, filter }))
    }

    /// Distinct matched words, lowercased, in order of first appearance
    fn matched_words(&self, message: &str) -> Vec<String> {
        let mut matched: Vec<String> = Vec::new();
        for (start, end) in self.words.find_matches(message) {
            let word = message[start..end].to_lowercase();
            if !matched.contains(&word) {
                matched.push(word);
            }
        }
        matched
    }
}

impl MessageInterceptor for ChatScannerInterceptor {
    fn topic(&self) -> Topic {
        Topic::ChatScanner
    }

    fn filter(&self) -> &MessageFilter {
        &self.filter
    }

    fn parse(&self, line: &RawLine) -> Result<Payload, TrackerError> {
        let (channel, _, nickname, message) = split_chat(line)
            .ok_or_else(|| TrackerError::malformed(Topic::ChatScanner, "not a chat line"))?;

        let matched = self.matched_words(message);
        if matched.is_empty() {
            return Err(TrackerError::malformed(Topic::ChatScanner, "no scanned word"));
        }

        Ok(Payload::ChatScanner {
            channel,
            nickname: nickname.to_string(),
            message: message.to_string(),
            matched,
        })
    }
}

impl std::fmt::Debug for ChatScannerInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatScannerInterceptor")
            .field("words", &self.words)
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

    fn scanner(words: &[&str]) -> ChatScannerInterceptor {
        let words: Vec<String> = words.iter().map(|w| w.to_string()).collect();
        ChatScannerInterceptor::new(&words).unwrap().unwrap()
    }

    #[test]
    fn test_no_words_no_scanner() {
        assert!(ChatScannerInterceptor::new(&[]).unwrap().is_none());
        assert!(ChatScannerInterceptor::new(&[" ".to_string()]).unwrap().is_none());
    }

    #[test]
    fn test_trade_channel_match() {
        let scanner = scanner(&["exalted", "mirror"]);
        let line = client("$<GG> Bob: WTS Exalted orbs, also EXALTED shards");
        assert!(scanner.matches(&line));
        assert_eq!(
            scanner.parse(&line).unwrap(),
            Payload::ChatScanner {
                channel: ChatChannel::Trade,
                nickname: "Bob".into(),
                message: "WTS Exalted orbs, also EXALTED shards".into(),
                matched: vec!["exalted".into()],
            }
        );
    }

    #[test]
    fn test_global_channel_match() {
        let scanner = scanner(&["tabula"]);
        let line = client("#Carl: anyone selling tabula?");
        match scanner.parse(&line).unwrap() {
            Payload::ChatScanner { channel, matched, .. } => {
                assert_eq!(channel, ChatChannel::Global);
                assert_eq!(matched, vec!["tabula".to_string()]);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_word_boundaries_and_nickname() {
        let scanner = scanner(&["chaos"]);
        assert!(!scanner.matches(&client("#Bob: chaosless build")));
        assert!(!scanner.matches(&client("#chaos: hello")));
        assert!(!scanner.matches(&client("@From Bob: chaos please")));
    }

    #[test]
    fn test_regex_metacharacters_escaped() {
        let scanner = scanner(&["c++"]);
        assert!(!scanner.matches(&client("#Bob: c and more")));
        assert!(!scanner.matches(&client("#Bob: abc++ only")));
    }

    #[test]
    fn test_word_with_punctuation_edges_matches() {
        let scanner = scanner(&["c++", "(wts)", "chaos"]);
        let line = client("#Bob: (WTS) selling c++ books for chaos");
        assert!(scanner.matches(&line));
        match scanner.parse(&line).unwrap() {
            Payload::ChatScanner { matched, .. } => {
                assert_eq!(matched, vec!["(wts)", "c++", "chaos"]);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }
}
