use crate::{Result, RoutingError};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use switchyard_core::EstimatorConfig;

/// Lowest complexity score.
pub const MIN_COMPLEXITY: u8 = 1;
/// Highest complexity score.
pub const MAX_COMPLEXITY: u8 = 10;

/// Scores how much model capability a request needs, on a 1..=10 scale.
///
/// Pure and deterministic: the same text and hint always yield the same score.
#[derive(Debug, Clone)]
pub struct ComplexityEstimator {
    base_score: i32,
    word_threshold: usize,
    technical_terms: Vec<String>,
    interrogative_openers: Vec<String>,
    greetings: Vec<Regex>,
    task_floors: BTreeMap<String, u8>,
}

impl ComplexityEstimator {
    /// Build an estimator, compiling greeting patterns case-insensitively.
    ///
    /// # Errors
    /// Returns a configuration error if a greeting pattern is not a valid regex.
    pub fn from_config(config: &EstimatorConfig) -> Result<Self> {
        let greetings = config
            .greeting_patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|error| {
                        RoutingError::Config(format!("invalid greeting pattern '{pattern}': {error}"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            base_score: config.base_score,
            word_threshold: config.word_threshold,
            technical_terms: config
                .technical_terms
                .iter()
                .map(|term| term.to_lowercase())
                .collect(),
            interrogative_openers: config
                .interrogative_openers
                .iter()
                .map(|opener| opener.to_lowercase())
                .collect(),
            greetings,
            task_floors: config.task_floors.clone(),
        })
    }

    /// Estimate complexity of `text`, raised to the floor of `task_hint` if any.
    pub fn estimate(&self, text: &str, task_hint: Option<&str>) -> u8 {
        let mut score = self.base_score;

        if self.is_question(text) {
            score += 1;
        }
        if self.has_technical_terms(text) {
            score += 2;
        }
        if text.split_whitespace().count() > self.word_threshold {
            score += 2;
        }
        if self.is_greeting(text) {
            score -= 2;
        }

        let clamped = score.clamp(i32::from(MIN_COMPLEXITY), i32::from(MAX_COMPLEXITY));
        let additive = u8::try_from(clamped).unwrap_or(MIN_COMPLEXITY);

        match task_hint.and_then(|hint| self.task_floors.get(hint)) {
            Some(floor) => additive.max(*floor).min(MAX_COMPLEXITY),
            None => additive,
        }
    }

    fn is_question(&self, text: &str) -> bool {
        if text.contains('?') {
            return true;
        }
        text.split_whitespace()
            .next()
            .map(|word| {
                word.trim_matches(|character: char| !character.is_alphanumeric())
                    .to_lowercase()
            })
            .is_some_and(|opener| self.interrogative_openers.contains(&opener))
    }

    fn has_technical_terms(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.technical_terms
            .iter()
            .any(|term| lowered.contains(term.as_str()))
    }

    fn is_greeting(&self, text: &str) -> bool {
        self.greetings.iter().any(|pattern| pattern.is_match(text))
    }
}
