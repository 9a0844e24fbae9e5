use regex::Regex;
use std::sync::Arc;

use mercury_types::RawLine;

type Predicate = Arc<dyn Fn(&RawLine) -> bool + Send + Sync>;

/// Stateless predicate deciding whether an interceptor wants a line
#[derive(Clone)]
pub enum MessageFilter {
    /// Line contains the literal anywhere
    Contains(String),

    /// Message body (after the client tag) starts with the literal
    BodyStartsWith(String),

    /// Line ends with the literal, ignoring trailing whitespace
    EndsWith(String),

    /// Regex pattern matched against the whole line
    Pattern(Regex),

    /// Every inner filter matches
    AllOf(Vec<MessageFilter>),

    /// At least one inner filter matches
    AnyOf(Vec<MessageFilter>),

    /// Inverted match
    Not(Box<MessageFilter>),

    /// Arbitrary check, for filters that need to look inside the line
    Predicate(Predicate),
}

impl MessageFilter {
    pub fn contains(literal: impl Into<String>) -> Self {
        Self::Contains(literal.into())
    }

    pub fn body_starts_with(literal: impl Into<String>) -> Self {
        Self::BodyStartsWith(literal.into())
    }

    pub fn ends_with(literal: impl Into<String>) -> Self {
        Self::EndsWith(literal.into())
    }

    /// Create a filter from a regex pattern
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::Pattern(Regex::new(pattern)?))
    }

    /// Create a case-insensitive regex filter
    pub fn regex_case_insensitive(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::Pattern(Regex::new(&format!("(?i){}", pattern))?))
    }

    pub fn all_of(filters: Vec<MessageFilter>) -> Self {
        Self::AllOf(filters)
    }

    pub fn any_of(filters: Vec<MessageFilter>) -> Self {
        Self::AnyOf(filters)
    }

    pub fn predicate<F>(check: F) -> Self
    where
        F: Fn(&RawLine) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(check))
    }

    /// Invert the match
    pub fn inverted(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Check if a line matches this filter
    pub fn matches(&self, line: &RawLine) -> bool {
        match self {
            Self::Contains(literal) => line.text().contains(literal.as_str()),
            Self::BodyStartsWith(literal) => line.body().starts_with(literal.as_str()),
            Self::EndsWith(literal) => line.text().trim_end().ends_with(literal.as_str()),
            Self::Pattern(re) => re.is_match(line.text()),
            Self::AllOf(filters) => filters.iter().all(|f| f.matches(line)),
            Self::AnyOf(filters) => filters.iter().any(|f| f.matches(line)),
            Self::Not(inner) => !inner.matches(line),
            Self::Predicate(check) => check(line),
        }
    }

    /// Find all match positions of a regex filter in a string (for highlighting)
    pub fn find_matches(&self, text: &str) -> Vec<(usize, usize)> {
        match self {
            Self::Pattern(re) => re.find_iter(text).map(|m| (m.start(), m.end())).collect(),
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Debug for MessageFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Contains(literal) => f.debug_tuple("Contains").field(literal).finish(),
            Self::BodyStartsWith(literal) => {
                f.debug_tuple("BodyStartsWith").field(literal).finish()
            }
            Self::EndsWith(literal) => f.debug_tuple("EndsWith").field(literal).finish(),
            Self::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            Self::AllOf(filters) => f.debug_tuple("AllOf").field(filters).finish(),
            Self::AnyOf(filters) => f.debug_tuple("AnyOf").field(filters).finish(),
            Self::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> RawLine {
        RawLine::new(1, text)
    }

    #[test]
    fn test_contains_filter() {
        let filter = MessageFilter::contains("has joined the area.");
        assert!(filter.matches(&line("Foo : PlayerOne has joined the area.")));
        assert!(!filter.matches(&line("Foo : PlayerOne has joined the area")));
    }

    #[test]
    fn test_body_starts_with() {
        let filter = MessageFilter::body_starts_with("@From ");
        assert!(filter.matches(&line(
            "2017/01/17 23:15:29 17343218 a1b [INFO Client 1234] @From Bob: hi"
        )));
        assert!(!filter.matches(&line(
            "2017/01/17 23:15:29 17343218 a1b [INFO Client 1234] #Bob: @From x"
        )));
    }

    #[test]
    fn test_ends_with_ignores_trailing_whitespace() {
        let filter = MessageFilter::ends_with("Trade accepted.");
        assert!(filter.matches(&line(": Trade accepted.  ")));
        assert!(!filter.matches(&line(": Trade accepted. later")));
    }

    #[test]
    fn test_regex_filter() {
        let filter = MessageFilter::regex(r"is now level \d+").unwrap();
        assert!(filter.matches(&line(": Bob (Witch) is now level 12")));
        assert!(!filter.matches(&line(": Bob (Witch) is now level")));
        assert!(MessageFilter::regex("(").is_err());
    }

    #[test]
    fn test_case_insensitive() {
        let filter = MessageFilter::regex_case_insensitive("exalted").unwrap();
        assert!(filter.matches(&line("#Bob: WTS EXALTED cheap")));
    }

    #[test]
    fn test_combinators() {
        let filter = MessageFilter::all_of(vec![
            MessageFilter::contains("@From"),
            MessageFilter::any_of(vec![
                MessageFilter::contains("like to buy your"),
                MessageFilter::contains("wtb"),
            ]),
        ]);
        assert!(filter.matches(&line("@From Bob: wtb Tabula Rasa")));
        assert!(!filter.matches(&line("@From Bob: hello")));
        assert!(filter.clone().inverted().matches(&line("@From Bob: hello")));
    }

    #[test]
    fn test_predicate_filter() {
        let filter = MessageFilter::predicate(|l| l.number() % 2 == 0);
        assert!(filter.matches(&RawLine::new(2, "x")));
        assert!(!filter.matches(&RawLine::new(3, "x")));
        assert_eq!(format!("{:?}", filter), "Predicate(..)");
    }

    #[test]
    fn test_find_matches() {
        let filter = MessageFilter::regex("chaos").unwrap();
        let matches = filter.find_matches("5 chaos or 6 chaos");
        assert_eq!(matches.len(), 2);
        assert!(MessageFilter::contains("x").find_matches("x").is_empty());
    }
}
