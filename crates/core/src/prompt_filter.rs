//! Blocked-term filtering for submitted prompts.
//!
//! A term matches case-insensitively when it is not directly adjacent to an
//! ASCII letter or digit, so `"topless,"` and `"top-less"` boundaries behave
//! like word boundaries while `"fakery"` does not match `"fake"`.

use std::collections::BTreeSet;

use regex::Regex;

use crate::error::CoreError;

/// Terms rejected when no explicit list is configured.
pub const DEFAULT_BLOCKED_TERMS: &[&str] = &["nude", "naked", "topless", "nsfw", "deepfake", "fake"];

#[derive(Debug, Clone)]
pub struct PromptFilterConfig {
    pub enabled: bool,
    pub blocked_terms: Vec<String>,
}

impl Default for PromptFilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blocked_terms: DEFAULT_BLOCKED_TERMS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Compiled filter. Build once at startup and share.
#[derive(Debug, Clone)]
pub struct PromptFilter {
    enabled: bool,
    patterns: Vec<(String, Regex)>,
}

impl PromptFilter {
    pub fn new(config: &PromptFilterConfig) -> Self {
        let patterns = config
            .blocked_terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter_map(|term| {
                let pattern = format!(
                    r"(?i)(?:^|[^a-z0-9]){}(?:$|[^a-z0-9])",
                    regex::escape(&term)
                );
                Regex::new(&pattern).ok().map(|re| (term, re))
            })
            .collect();

        Self {
            enabled: config.enabled,
            patterns,
        }
    }

    /// Sorted, de-duplicated blocked terms found in `text`.
    pub fn find_blocked_terms(&self, text: &str) -> Vec<String> {
        let haystack = text.trim();
        if haystack.is_empty() {
            return Vec::new();
        }
        self.patterns
            .iter()
            .filter(|(_, re)| re.is_match(haystack))
            .map(|(term, _)| term.clone())
            .collect()
    }

    /// Blocked terms across the instruction and optional system prompt.
    /// Always empty when the filter is disabled.
    pub fn check_fields(&self, instruction: &str, system_prompt: Option<&str>) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }
        let mut found: BTreeSet<String> = self.find_blocked_terms(instruction).into_iter().collect();
        if let Some(sp) = system_prompt {
            found.extend(self.find_blocked_terms(sp));
        }
        found.into_iter().collect()
    }

    /// Validation wrapper used by the submission path.
    pub fn validate(&self, instruction: &str, system_prompt: Option<&str>) -> Result<(), CoreError> {
        let found = self.check_fields(instruction, system_prompt);
        if found.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "Prompt contains blocked terms: {}",
                found.join(", ")
            )))
        }
    }
}
