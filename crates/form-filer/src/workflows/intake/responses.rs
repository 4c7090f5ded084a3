use std::collections::HashMap;

use tracing::warn;

use super::domain::ItemResponse;

/// Flattened question-title to answer lookup for one submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMap {
    answers: HashMap<String, String>,
    duplicate_titles: Vec<String>,
}

impl ResponseMap {
    /// Builds the lookup in one pass. A repeated title keeps the later answer and
    /// is recorded on the map so callers can surface the malformed input.
    pub fn build(items: &[ItemResponse]) -> Self {
        let mut answers = HashMap::with_capacity(items.len());
        let mut duplicate_titles = Vec::new();

        for item in items {
            let title = item.question_title();
            let flattened = item.answer().flatten();
            if let Some(previous) = answers.insert(title.to_string(), flattened) {
                warn!(
                    question = title,
                    discarded = %previous,
                    "duplicate question title in submission; keeping the later answer"
                );
                if !duplicate_titles.iter().any(|seen| seen == title) {
                    duplicate_titles.push(title.to_string());
                }
            }
        }

        Self {
            answers,
            duplicate_titles,
        }
    }

    pub fn get(&self, title: &str) -> Option<&str> {
        self.answers.get(title).map(String::as_str)
    }

    pub fn duplicate_titles(&self) -> &[String] {
        &self.duplicate_titles
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn as_map(&self) -> &HashMap<String, String> {
        &self.answers
    }
}
