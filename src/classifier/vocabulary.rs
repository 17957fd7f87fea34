//! Class vocabulary - ordered pest class names
//!
//! Position in the vocabulary == index in the model's output logits.

use std::collections::HashSet;
use std::path::Path;

use super::handle::InitializationError;

/// Number of classes the deployed model was trained on
pub const VOCABULARY_SIZE: usize = 132;

/// Ordered, validated list of class names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassVocabulary {
    names: Vec<String>,
}

impl ClassVocabulary {
    /// Build from an explicit list, enforcing size and uniqueness
    pub fn new(names: Vec<String>) -> Result<Self, InitializationError> {
        Self::with_expected_size(names, VOCABULARY_SIZE)
    }

    pub(crate) fn with_expected_size(
        names: Vec<String>,
        expected: usize,
    ) -> Result<Self, InitializationError> {
        if names.len() != expected {
            return Err(InitializationError::Vocabulary(format!(
                "expected {} class names, found {}",
                expected,
                names.len()
            )));
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if name.is_empty() {
                return Err(InitializationError::Vocabulary("empty class name".to_string()));
            }
            if !seen.insert(name.as_str()) {
                return Err(InitializationError::Vocabulary(format!(
                    "duplicate class name: {}",
                    name
                )));
            }
        }

        Ok(Self { names })
    }

    /// Parse the resource format: one name per line, blank lines ignored
    pub fn parse(contents: &str) -> Result<Self, InitializationError> {
        Self::new(split_names(contents))
    }

    /// Load and validate the vocabulary resource from disk
    pub fn load(path: &Path) -> Result<Self, InitializationError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            InitializationError::Vocabulary(format!("cannot read {}: {}", path.display(), e))
        })?;
        let vocabulary = Self::parse(&contents)?;
        tracing::info!("Loaded {} class names from {}", vocabulary.len(), path.display());
        Ok(vocabulary)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

fn split_names(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
pub(crate) const SHIPPED: &str = include_str!("../../resources/class_names.txt");

/// The vocabulary bundled in `resources/`, for tests across the crate
#[cfg(test)]
pub(crate) fn shipped() -> ClassVocabulary {
    ClassVocabulary::parse(SHIPPED).expect("bundled vocabulary is valid")
}
