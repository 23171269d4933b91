//! Endpoint pattern compilation and matching (spec.md §4.1).
//!
//! A compiled [`EndpointPattern`] is an ordered list of [`Segment`]s. Two
//! patterns conflict iff their segment sequences are identical once
//! parameter names are erased — `:id` and `:userId` in the same position
//! still conflict, per spec.md §3.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::error::PatternError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Parameter(String),
}

/// A compiled endpoint pattern, normalised to start with `/` and containing
/// no empty segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPattern {
    source: String,
    segments: Vec<Segment>,
}

impl EndpointPattern {
    /// Compiles a pattern string such as `/users/:userId/posts/:postId`.
    ///
    /// Rejects empty segments (other than the leading slash) and empty
    /// parameter names.
    pub fn compile(source: &str) -> Result<Self, PatternError> {
        if source.trim().is_empty() {
            return Err(PatternError::Empty);
        }
        let trimmed = source.strip_prefix('/').unwrap_or(source);
        let mut segments = Vec::new();
        for (idx, raw) in trimmed.split('/').enumerate() {
            if raw.is_empty() {
                return Err(PatternError::EmptySegment(idx));
            }
            if let Some(name) = raw.strip_prefix(':') {
                if name.is_empty() {
                    return Err(PatternError::EmptyParameterName(idx));
                }
                segments.push(Segment::Parameter(name.to_string()));
            } else {
                segments.push(Segment::Literal(raw.to_string()));
            }
        }
        let normalised = format!(
            "/{}",
            segments
                .iter()
                .map(|s| match s {
                    Segment::Literal(l) => l.clone(),
                    Segment::Parameter(p) => format!(":{p}"),
                })
                .collect::<Vec<_>>()
                .join("/")
        );
        Ok(Self {
            source: normalised,
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of literal segments — used for specificity ordering (§4.1).
    pub fn literal_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// Two patterns conflict iff they produce identical literal/parameter
    /// segment sequences after normalisation — differently named parameter
    /// placeholders in the same position still conflict (spec.md §3).
    pub fn conflicts_with(&self, other: &EndpointPattern) -> bool {
        if self.segments.len() != other.segments.len() {
            return false;
        }
        self.segments.iter().zip(other.segments.iter()).all(|(a, b)| match (a, b) {
            (Segment::Literal(x), Segment::Literal(y)) => x == y,
            (Segment::Parameter(_), Segment::Parameter(_)) => true,
            _ => false,
        })
    }

    /// Attempts to match `path` (already percent-decoded, segment-split),
    /// returning the bound path parameters on success.
    pub fn matches(&self, path_segments: &[&str]) -> Option<HashMap<String, String>> {
        if self.segments.len() != path_segments.len() {
            return None;
        }
        let mut bindings = HashMap::new();
        for (pattern_seg, request_seg) in self.segments.iter().zip(path_segments.iter()) {
            match pattern_seg {
                Segment::Literal(lit) => {
                    if lit != request_seg {
                        return None;
                    }
                }
                Segment::Parameter(name) => {
                    bindings.insert(name.clone(), (*request_seg).to_string());
                }
            }
        }
        Some(bindings)
    }

    /// Ordering used to break ties between multiple matching registrations:
    /// more literal segments wins; ties broken lexicographically by the
    /// pattern string (§4.1). This is a "most specific first" ordering, so
    /// `a.specificity_cmp(b) == Ordering::Less` means `a` is MORE specific.
    pub fn specificity_cmp(&self, other: &EndpointPattern) -> Ordering {
        other
            .literal_count()
            .cmp(&self.literal_count())
            .then_with(|| self.source.cmp(&other.source))
    }
}

impl fmt::Display for EndpointPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Splits an already percent-decoded, normalised path into its segments,
/// dropping the leading empty segment produced by the initial `/`.
pub fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        Vec::new()
    } else {
        trimmed.split('/').collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_literal_and_parameter_segments() {
        let pattern = EndpointPattern::compile("/users/:userId/posts/:postId").unwrap();
        assert_eq!(pattern.as_str(), "/users/:userId/posts/:postId");
        assert_eq!(pattern.literal_count(), 2);
    }

    #[test]
    fn rejects_empty_segment() {
        let err = EndpointPattern::compile("/users//posts").unwrap_err();
        assert!(matches!(err, PatternError::EmptySegment(_)));
    }

    #[test]
    fn rejects_empty_parameter_name() {
        let err = EndpointPattern::compile("/users/:").unwrap_err();
        assert!(matches!(err, PatternError::EmptyParameterName(_)));
    }

    #[test]
    fn matches_and_extracts_bindings() {
        let pattern = EndpointPattern::compile("/users/:userId/posts/:postId").unwrap();
        let segments = split_path("/users/42/posts/7");
        let bindings = pattern.matches(&segments).unwrap();
        assert_eq!(bindings.get("userId").map(String::as_str), Some("42"));
        assert_eq!(bindings.get("postId").map(String::as_str), Some("7"));
    }

    #[test]
    fn segment_count_mismatch_does_not_match() {
        let pattern = EndpointPattern::compile("/users/:userId").unwrap();
        assert!(pattern.matches(&split_path("/users")).is_none());
        assert!(pattern.matches(&split_path("/users/1/extra")).is_none());
    }

    #[test]
    fn differently_named_parameters_in_same_position_conflict() {
        let a = EndpointPattern::compile("/users/:userId").unwrap();
        let b = EndpointPattern::compile("/users/:id").unwrap();
        assert!(a.conflicts_with(&b));
    }

    #[test]
    fn literal_and_parameter_in_same_position_do_not_conflict() {
        let a = EndpointPattern::compile("/users/:userId").unwrap();
        let b = EndpointPattern::compile("/users/active").unwrap();
        assert!(!a.conflicts_with(&b));
    }

    #[test]
    fn more_literal_segments_is_more_specific() {
        let specific = EndpointPattern::compile("/users/active").unwrap();
        let general = EndpointPattern::compile("/users/:status").unwrap();
        assert_eq!(specific.specificity_cmp(&general), Ordering::Less);
    }

    #[test]
    fn specificity_ties_break_lexicographically() {
        let a = EndpointPattern::compile("/a/:id").unwrap();
        let b = EndpointPattern::compile("/b/:id").unwrap();
        assert_eq!(a.specificity_cmp(&b), Ordering::Less);
    }
}
