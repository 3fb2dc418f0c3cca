//! Property name matching.
//!
//! A [`PropertyNameMatcher`] wraps one input field name. Matching it against a
//! candidate property name yields a [`PropertyNameMatch`] with a score, or
//! nothing when the names do not line up well enough. A *partial* match
//! consumes only a prefix of the field name; the rest travels on as the match's
//! leftover matcher, to be tried against the properties of the nested object:
//!
//! ```
//! use facet_mapper::{MatchingConfig, PropertyNameMatcher};
//!
//! let config = MatchingConfig::default();
//! let matcher = PropertyNameMatcher::new("address_city");
//!
//! let address = matcher.partial_match("address", &config).unwrap();
//! let leftover = address.leftover().unwrap();
//! assert_eq!(leftover.remaining(), "city");
//!
//! let city = leftover.matches("city", &config).unwrap();
//! assert_eq!(city.skipped_later(), 0);
//! ```
//!
//! Everything here is a pure function of its inputs: matchers are immutable
//! values and can be replayed at any nesting depth.

use core::cmp::Ordering;
use core::fmt;
use std::sync::Arc;

use crate::naming::{self, Segment};

mod align;

use align::{Alignment, align};

/// Scores and thresholds for name matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchingConfig {
    /// Gain for a segment equal to its counterpart, case included.
    pub exact_score: i32,

    /// Gain for a segment equal to its counterpart ignoring case.
    pub ignore_case_score: i32,

    /// Gain per segment when one segment matches several joined together
    /// (`firstname` against `first`, `Name`).
    pub compound_score: i32,

    /// Cost of skipping one segment inside an alignment, on either side.
    pub skip_penalty: i32,

    /// Matches scoring below this are rejected.
    pub min_score: i32,

    /// Most segments one segment may be compared with in a compound match.
    pub max_compound: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            exact_score: 8,
            ignore_case_score: 6,
            compound_score: 5,
            skip_penalty: 5,
            min_score: 6,
            max_compound: 4,
        }
    }
}

/// Matches one input field name (or what is left of it) against property names.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PropertyNameMatcher {
    column: Arc<str>,
    segments: Arc<[Segment]>,
    start: usize,
}

impl PropertyNameMatcher {
    /// Matcher for a whole field name.
    pub fn new(column: impl Into<Arc<str>>) -> Self {
        let column = column.into();
        let segments = naming::split(&column).into();
        Self {
            column,
            segments,
            start: 0,
        }
    }

    /// The full field name this matcher was created for.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// The part of the field name still to be matched.
    pub fn remaining(&self) -> &str {
        match self.segments.get(self.start) {
            Some(first) => &self.column[first.start()..],
            None => "",
        }
    }

    /// Segments still to be matched.
    pub fn remaining_segments(&self) -> impl Iterator<Item = &str> + '_ {
        self.segments[self.start..]
            .iter()
            .map(|segment| segment.text(&self.column))
    }

    /// How many segments are still to be matched.
    pub fn segment_count(&self) -> usize {
        self.segments.len() - self.start
    }

    /// Whether nothing is left to match.
    pub fn is_exhausted(&self) -> bool {
        self.segment_count() == 0
    }

    /// Matcher for what is left after consuming `consumed` more segments.
    fn advanced(&self, consumed: usize) -> Self {
        Self {
            column: Arc::clone(&self.column),
            segments: Arc::clone(&self.segments),
            start: self.start + consumed,
        }
    }

    fn alignments(&self, property: &str, config: &MatchingConfig) -> Vec<Alignment> {
        let input: Vec<&str> = self.remaining_segments().collect();
        let candidate = naming::split_str(property);
        align(&input, &candidate, config)
            .into_iter()
            .filter(|a| a.score >= config.min_score)
            .collect()
    }

    fn make_match(&self, property: &str, alignment: Alignment) -> PropertyNameMatch {
        let leftover = (alignment.consumed < self.segment_count())
            .then(|| self.advanced(alignment.consumed));
        PropertyNameMatch {
            property: property.to_string(),
            column: Arc::clone(&self.column),
            leftover,
            score: alignment.score,
            skipped_later: alignment.skipped,
            consumed: alignment.consumed,
        }
    }

    /// Match consuming every remaining segment, if `property` allows one.
    pub fn matches(&self, property: &str, config: &MatchingConfig) -> Option<PropertyNameMatch> {
        let count = self.segment_count();
        self.alignments(property, config)
            .into_iter()
            .find(|a| a.consumed == count)
            .map(|a| self.make_match(property, a))
    }

    /// Best match of `property` against a strict prefix of the remaining
    /// segments; the match carries a leftover matcher for the rest.
    pub fn partial_match(
        &self,
        property: &str,
        config: &MatchingConfig,
    ) -> Option<PropertyNameMatch> {
        let count = self.segment_count();
        self.alignments(property, config)
            .into_iter()
            .filter(|a| a.consumed < count)
            .max_by(|a, b| a.score.cmp(&b.score).then(a.consumed.cmp(&b.consumed)))
            .map(|a| self.make_match(property, a))
    }

    /// Every acceptable match against `candidates`, best first.
    ///
    /// Each candidate contributes at most one full and one partial match.
    /// Ranking is by score, then consumed segments, then fewest skipped
    /// segments, then candidate order.
    pub fn rank<'a, I>(&self, candidates: I, config: &MatchingConfig) -> Vec<RankedMatch>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut ranked = Vec::new();
        for (index, candidate) in candidates.into_iter().enumerate() {
            if let Some(found) = self.matches(candidate, config) {
                ranked.push(RankedMatch { index, found });
            }
            if let Some(found) = self.partial_match(candidate, config) {
                ranked.push(RankedMatch { index, found });
            }
        }
        ranked.sort_by(RankedMatch::cmp_rank);
        ranked
    }

    /// The best match among `candidates`, if any is acceptable.
    pub fn best_match<'a, I>(&self, candidates: I, config: &MatchingConfig) -> Option<RankedMatch>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.rank(candidates, config).into_iter().next()
    }
}

impl fmt::Debug for PropertyNameMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyNameMatcher")
            .field("column", &self.column)
            .field("remaining", &self.remaining())
            .finish()
    }
}

impl fmt::Display for PropertyNameMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.remaining())
    }
}

/// Outcome of matching one field name against one property name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyNameMatch {
    property: String,
    column: Arc<str>,
    leftover: Option<PropertyNameMatcher>,
    score: i32,
    skipped_later: usize,
    consumed: usize,
}

impl PropertyNameMatch {
    /// The property name that matched.
    pub fn property(&self) -> &str {
        &self.property
    }

    /// The field name that was matched.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Matcher for the unconsumed tail of the field name, for partial matches.
    pub fn leftover(&self) -> Option<&PropertyNameMatcher> {
        self.leftover.as_ref()
    }

    /// Whether the whole (remaining) field name was consumed.
    pub fn is_full(&self) -> bool {
        self.leftover.is_none()
    }

    /// Higher is better.
    pub fn score(&self) -> i32 {
        self.score
    }

    /// Input segments skipped inside the alignment.
    pub fn skipped_later(&self) -> usize {
        self.skipped_later
    }

    /// Input segments this match consumed.
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

/// A match together with the position of its candidate in the candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedMatch {
    /// Index of the candidate in the order it was offered.
    pub index: usize,
    /// The match itself.
    pub found: PropertyNameMatch,
}

impl RankedMatch {
    fn cmp_rank(a: &Self, b: &Self) -> Ordering {
        b.found
            .score
            .cmp(&a.found.score)
            .then(b.found.consumed.cmp(&a.found.consumed))
            .then(a.found.skipped_later.cmp(&b.found.skipped_later))
            .then(a.index.cmp(&b.index))
    }
}
