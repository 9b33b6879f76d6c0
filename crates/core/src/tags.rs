use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound on the number of tags attached to an item.
pub const MAX_TAGS: usize = 5;

/// Part-of-speech classes as reported by the external tagger. Only common and
/// proper nouns survive tag derivation; everything else collapses to `Other`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartOfSpeech {
    #[serde(rename = "NOUN")]
    Noun,
    #[serde(rename = "PROPN")]
    ProperNoun,
    #[serde(other)]
    Other,
}

/// One analyzed token from the lemmatization service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub lemma: String,
    pub pos: PartOfSpeech,
    #[serde(default)]
    pub is_stop: bool,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LemmatizerError {
    #[error("lemmatizer transport failed: {0}")]
    Transport(String),
    #[error("lemmatizer returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Opaque text→tokens service (an external lemmatizer/POS tagger).
#[async_trait]
pub trait Lemmatizer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<Vec<Token>, LemmatizerError>;
}

/// Derives a bounded set of normalized keyword tags from free text.
///
/// Surviving lemmas are lowercased, deduplicated, and truncated to
/// [`MAX_TAGS`] in order of first appearance in the text, so the cut is
/// deterministic and reproducible across runs.
#[derive(Clone)]
pub struct TagExtractor {
    lemmatizer: Arc<dyn Lemmatizer>,
}

impl TagExtractor {
    pub fn new(lemmatizer: Arc<dyn Lemmatizer>) -> Self {
        Self { lemmatizer }
    }

    /// Empty or whitespace-only text yields an empty tag set without touching
    /// the service.
    pub async fn extract(&self, text: &str) -> Result<Vec<String>, LemmatizerError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let tokens = self.lemmatizer.analyze(text).await?;
        let mut tags = Vec::new();

        for token in tokens {
            if token.is_stop
                || !matches!(token.pos, PartOfSpeech::Noun | PartOfSpeech::ProperNoun)
            {
                continue;
            }

            let lemma = token.lemma.trim().to_lowercase();
            if lemma.is_empty() || tags.contains(&lemma) {
                continue;
            }

            tags.push(lemma);
            if tags.len() == MAX_TAGS {
                break;
            }
        }

        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::{Lemmatizer, LemmatizerError, PartOfSpeech, TagExtractor, Token, MAX_TAGS};

    struct ScriptedLemmatizer {
        tokens: Vec<Token>,
    }

    #[async_trait]
    impl Lemmatizer for ScriptedLemmatizer {
        async fn analyze(&self, _text: &str) -> Result<Vec<Token>, LemmatizerError> {
            Ok(self.tokens.clone())
        }
    }

    struct FailingLemmatizer;

    #[async_trait]
    impl Lemmatizer for FailingLemmatizer {
        async fn analyze(&self, _text: &str) -> Result<Vec<Token>, LemmatizerError> {
            Err(LemmatizerError::Transport("connection refused".to_owned()))
        }
    }

    fn noun(lemma: &str) -> Token {
        Token { lemma: lemma.to_owned(), pos: PartOfSpeech::Noun, is_stop: false }
    }

    fn extractor(tokens: Vec<Token>) -> TagExtractor {
        TagExtractor::new(Arc::new(ScriptedLemmatizer { tokens }))
    }

    #[tokio::test]
    async fn keeps_only_non_stop_nouns_lowercased() {
        let extractor = extractor(vec![
            noun("Паспорт"),
            Token { lemma: "синий".to_owned(), pos: PartOfSpeech::Other, is_stop: false },
            Token { lemma: "в".to_owned(), pos: PartOfSpeech::Noun, is_stop: true },
            Token { lemma: "Папка".to_owned(), pos: PartOfSpeech::ProperNoun, is_stop: false },
        ]);

        let tags = extractor.extract("Паспорт в синей папке").await.expect("extract");
        assert_eq!(tags, vec!["паспорт", "папка"]);
    }

    #[tokio::test]
    async fn deduplicates_preserving_first_appearance() {
        let extractor =
            extractor(vec![noun("полка"), noun("шкаф"), noun("Полка"), noun("папка")]);

        let tags = extractor.extract("полка шкафа, полка, папка").await.expect("extract");
        assert_eq!(tags, vec!["полка", "шкаф", "папка"]);
    }

    #[tokio::test]
    async fn truncates_to_first_five_qualifying_lemmas() {
        let extractor = extractor(
            ["а", "б", "в", "г", "д", "е", "ж"].iter().map(|l| noun(l)).collect(),
        );

        let tags = extractor.extract("семь существительных").await.expect("extract");
        assert_eq!(tags.len(), MAX_TAGS);
        assert_eq!(tags, vec!["а", "б", "в", "г", "д"]);
    }

    #[tokio::test]
    async fn empty_text_short_circuits_without_service_call() {
        let extractor = TagExtractor::new(Arc::new(FailingLemmatizer));

        let tags = extractor.extract("   \n\t").await.expect("no service call expected");
        assert!(tags.is_empty());
    }

    #[tokio::test]
    async fn service_failure_is_propagated() {
        let extractor = TagExtractor::new(Arc::new(FailingLemmatizer));

        let error = extractor.extract("паспорт").await.expect_err("must fail");
        assert!(matches!(error, LemmatizerError::Transport(_)));
    }
}
