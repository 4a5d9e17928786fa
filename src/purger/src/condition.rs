//! Value selection.
//!
//! A [`MatchCondition`] is the user-facing description of what to select. It
//! compiles into a [`Matcher`], which applies a size floor and then exactly one
//! [`Predicate`]: any value, byte-exact equality, or a minimum number of
//! non-overlapping substring occurrences.

use common::config::{AccessMode, SearchConfig};
use std::fmt;

use crate::error::PurgeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCondition {
    pub access_mode: AccessMode,
    /// Values shorter than this many bytes never match.
    pub size_threshold: usize,
    pub pattern: Vec<u8>,
    /// `0` selects exact matching; anything higher selects substring counting.
    pub min_occurrences: usize,
}

impl MatchCondition {
    pub fn new(access_mode: AccessMode, pattern: impl Into<Vec<u8>>) -> Self {
        Self {
            access_mode,
            size_threshold: 0,
            pattern: pattern.into(),
            min_occurrences: 0,
        }
    }

    pub fn with_size_threshold(mut self, size_threshold: usize) -> Self {
        self.size_threshold = size_threshold;
        self
    }

    pub fn with_min_occurrences(mut self, min_occurrences: usize) -> Self {
        self.min_occurrences = min_occurrences;
        self
    }

    pub fn predicate(&self) -> Predicate {
        if self.pattern.is_empty() {
            Predicate::Any
        } else if self.min_occurrences == 0 {
            Predicate::Exact(self.pattern.clone())
        } else {
            Predicate::AtLeast {
                needle: self.pattern.clone(),
                occurrences: self.min_occurrences,
            }
        }
    }

    pub fn matcher(&self) -> Matcher {
        Matcher {
            size_threshold: self.size_threshold,
            predicate: self.predicate(),
        }
    }

    pub fn matches(&self, value: &[u8]) -> bool {
        self.matcher().matches(value)
    }
}

impl TryFrom<&SearchConfig> for MatchCondition {
    type Error = PurgeError;

    fn try_from(config: &SearchConfig) -> Result<Self, Self::Error> {
        let pattern = config
            .pattern
            .as_ref()
            .ok_or_else(|| PurgeError::InvalidConfig("a search pattern is required".into()))?;

        Ok(MatchCondition::new(config.access_mode, pattern.as_bytes())
            .with_size_threshold(config.size_threshold)
            .with_min_occurrences(config.min_occurrences))
    }
}

impl fmt::Display for MatchCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(access-mode={}) Search=", self.access_mode)?;
        if self.pattern.is_empty() {
            write!(f, "(any)")?;
        } else {
            write!(f, "{:?}", String::from_utf8_lossy(&self.pattern))?;
        }

        if self.size_threshold > 0 {
            write!(f, " (size >= {} bytes)", self.size_threshold)?;
        }

        match self.predicate() {
            Predicate::Any => Ok(()),
            Predicate::Exact(_) => write!(f, " (exact match)"),
            Predicate::AtLeast { occurrences, .. } => {
                write!(f, " (match >= {occurrences} occurrences)")
            }
        }
    }
}

/// The single content rule a condition reduces to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Any,
    Exact(Vec<u8>),
    AtLeast { needle: Vec<u8>, occurrences: usize },
}

impl Predicate {
    pub fn accepts(&self, value: &[u8]) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => value == expected.as_slice(),
            Self::AtLeast {
                needle,
                occurrences,
            } => has_occurrences(value, needle, *occurrences),
        }
    }
}

/// Compiled form of a [`MatchCondition`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    size_threshold: usize,
    predicate: Predicate,
}

impl Matcher {
    pub fn matches(&self, value: &[u8]) -> bool {
        value.len() >= self.size_threshold && self.predicate.accepts(value)
    }
}

/// Whether `needle` occurs at least `wanted` times without overlap, scanning
/// left to right. An empty needle never occurs.
fn has_occurrences(haystack: &[u8], needle: &[u8], wanted: usize) -> bool {
    occurrences(haystack, needle).take(wanted).count() >= wanted
}

fn occurrences<'a>(haystack: &'a [u8], needle: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    let mut offset = 0;
    std::iter::from_fn(move || {
        if needle.is_empty() || offset + needle.len() > haystack.len() {
            return None;
        }
        let found = haystack[offset..]
            .windows(needle.len())
            .position(|window| window == needle)?;
        let at = offset + found;
        offset = at + needle.len();
        Some(at)
    })
}
