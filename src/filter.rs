use crate::error::{StreamError, StreamResult};

/// Case-insensitive keyword set.
///
/// Each phrase is matched independently; a phrase of several words matches
/// when every one of its words occurs somewhere in the text, which is how the
/// streaming endpoint's `track` parameter behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordFilter {
    phrases: Vec<String>,
    terms: Vec<Vec<String>>,
}

impl KeywordFilter {
    pub fn new<I, S>(keywords: I) -> StreamResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut phrases: Vec<String> = Vec::new();
        for keyword in keywords {
            let phrase = keyword
                .as_ref()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();
            if !phrase.is_empty() && !phrases.contains(&phrase) {
                phrases.push(phrase);
            }
        }

        if phrases.is_empty() {
            return Err(StreamError::Config(
                "at least one search keyword is required".to_string(),
            ));
        }

        let terms = phrases
            .iter()
            .map(|p| p.split(' ').map(str::to_string).collect())
            .collect();

        Ok(Self { phrases, terms })
    }

    /// Parse comma-separated search terms, e.g. `"rust, async tokio"`.
    pub fn parse(terms: &str) -> StreamResult<Self> {
        Self::new(terms.split(','))
    }

    pub fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.terms
            .iter()
            .any(|words| words.iter().all(|w| text.contains(w.as_str())))
    }

    pub fn keywords(&self) -> &[String] {
        &self.phrases
    }

    /// Value for the endpoint's `track` parameter.
    pub fn track_param(&self) -> String {
        self.phrases.join(",")
    }
}
