//! Inbound message classification.
//!
//! The relay decides whether to answer from three cheap text signals. The
//! policy is a trait so it can be tested and swapped independently of the
//! relay mechanics.

/// Text signals extracted from one chat message.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classification {
    /// The companion was addressed by one of its names.
    pub mentions_companion: bool,
    /// Ends with `?` or starts with an interrogative token.
    pub looks_like_question: bool,
    /// Contains a greeting token.
    pub looks_like_greeting: bool,
}

/// Classification policy for inbound chat messages.
pub trait MessageClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Classification;
}

/// Default policy: case-insensitive keyword lists.
pub struct KeywordClassifier {
    mention_keywords: Vec<String>,
    interrogative_prefixes: Vec<String>,
    greeting_tokens: Vec<String>,
}

impl KeywordClassifier {
    pub fn new(
        mention_keywords: &[String],
        interrogative_prefixes: &[String],
        greeting_tokens: &[String],
    ) -> Self {
        let lowered = |items: &[String]| items.iter().map(|s| s.to_lowercase()).collect();
        Self {
            mention_keywords: lowered(mention_keywords),
            interrogative_prefixes: lowered(interrogative_prefixes),
            greeting_tokens: lowered(greeting_tokens),
        }
    }
}

impl MessageClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Classification {
        let trimmed = text.trim();
        let lower = trimmed.to_lowercase();

        Classification {
            mentions_companion: self.mention_keywords.iter().any(|k| lower.contains(k)),
            looks_like_question: trimmed.ends_with('?')
                || self
                    .interrogative_prefixes
                    .iter()
                    .any(|p| lower.starts_with(p)),
            looks_like_greeting: self.greeting_tokens.iter().any(|t| lower.contains(t)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChatConfig;

    fn classifier() -> KeywordClassifier {
        let config = ChatConfig::default();
        KeywordClassifier::new(
            &config.mention_keywords,
            &config.interrogative_prefixes,
            &config.greeting_tokens,
        )
    }

    #[test]
    fn test_mention_is_case_insensitive() {
        let c = classifier().classify("EMBER, are you there");
        assert!(c.mentions_companion);
    }

    #[test]
    fn test_question_mark_marks_question() {
        let c = classifier().classify("anyone seen my horse?");
        assert!(c.looks_like_question);
    }

    #[test]
    fn test_interrogative_prefix_marks_question() {
        let c = classifier().classify("how do I make a saddle");
        assert!(c.looks_like_question);
        let c = classifier().classify("что делать с кучей булыжника");
        assert!(c.looks_like_question);
    }

    #[test]
    fn test_russian_greeting_with_question_mark() {
        let c = classifier().classify("Привет?");
        assert!(c.looks_like_greeting);
        assert!(c.looks_like_question);
    }

    #[test]
    fn test_plain_chatter_matches_nothing() {
        let c = classifier().classify("just finished the wheat farm");
        assert!(!c.mentions_companion);
        assert!(!c.looks_like_question);
        assert!(!c.looks_like_greeting);
    }
}
