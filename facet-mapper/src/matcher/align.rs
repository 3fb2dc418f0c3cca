//! Segment alignment: the scoring core of property name matching.
//!
//! Aligns a candidate's segments against a prefix of the input segments. Both
//! sides must start on a matched segment and the alignment must end on one;
//! in between, segments on either side may be skipped at a penalty. Every
//! candidate segment must be consumed, input segments need not be: what is left
//! of the input becomes the leftover of a partial match.

use super::MatchingConfig;
use crate::naming::eq_ignore_case_joined;

/// Best way of aligning a candidate against the first `consumed` input segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Alignment {
    pub consumed: usize,
    pub score: i32,
    pub skipped: usize,
}

#[derive(Clone, Copy)]
struct Cell {
    score: i32,
    skipped: usize,
}

impl Cell {
    fn beats(self, other: Option<Cell>) -> bool {
        match other {
            None => true,
            Some(other) => {
                self.score > other.score
                    || (self.score == other.score && self.skipped < other.skipped)
            }
        }
    }
}

/// Score for matching `input` segments against `candidate` segments at this step.
fn step_score(input: &[&str], candidate: &[&str], config: &MatchingConfig) -> Option<i32> {
    match (input, candidate) {
        ([a], [b]) if a == b => Some(config.exact_score),
        ([a], [b]) if a.eq_ignore_ascii_case(b) || eq_ignore_case_joined(a, [*b]) => {
            Some(config.ignore_case_score)
        }
        ([a], parts) if parts.len() > 1 && eq_ignore_case_joined(a, parts.iter().copied()) => {
            Some(config.compound_score * parts.len() as i32)
        }
        (parts, [b]) if parts.len() > 1 && eq_ignore_case_joined(b, parts.iter().copied()) => {
            Some(config.compound_score * parts.len() as i32)
        }
        _ => None,
    }
}

/// All end states of aligning `candidate` against `input`, one per consumed count.
///
/// The result is ordered by `consumed` ascending and only contains counts for
/// which a complete alignment exists.
pub(crate) fn align(input: &[&str], candidate: &[&str], config: &MatchingConfig) -> Vec<Alignment> {
    let n = input.len();
    let m = candidate.len();
    if n == 0 || m == 0 {
        return Vec::new();
    }

    // table[i][j][last]: best way to consume i input and j candidate segments,
    // `last` telling whether the final step was a match.
    let mut table: Vec<Vec<[Option<Cell>; 2]>> = vec![vec![[None, None]; m + 1]; n + 1];
    table[0][0][0] = Some(Cell {
        score: 0,
        skipped: 0,
    });

    let span = config.max_compound.max(1);

    for i in 0..=n {
        for j in 0..=m {
            for last in 0..2 {
                let Some(cell) = table[i][j][last] else {
                    continue;
                };

                // Matches: one-to-one, or one-to-many in either direction.
                for a in 1..=span.min(n - i) {
                    for b in 1..=span.min(m - j) {
                        if a > 1 && b > 1 {
                            continue;
                        }
                        let Some(gain) = step_score(&input[i..i + a], &candidate[j..j + b], config)
                        else {
                            continue;
                        };
                        let next = Cell {
                            score: cell.score + gain,
                            skipped: cell.skipped,
                        };
                        let slot = &mut table[i + a][j + b][1];
                        if next.beats(*slot) {
                            *slot = Some(next);
                        }
                    }
                }

                // Skips happen strictly inside an alignment: after the first
                // match and before the candidate is exhausted.
                if (i, j) == (0, 0) || i == n || j == m {
                    continue;
                }

                let skip_input = Cell {
                    score: cell.score - config.skip_penalty,
                    skipped: cell.skipped + 1,
                };
                if skip_input.beats(table[i + 1][j][0]) {
                    table[i + 1][j][0] = Some(skip_input);
                }

                let skip_candidate = Cell {
                    score: cell.score - config.skip_penalty,
                    skipped: cell.skipped,
                };
                if skip_candidate.beats(table[i][j + 1][0]) {
                    table[i][j + 1][0] = Some(skip_candidate);
                }
            }
        }
    }

    (1..=n)
        .filter_map(|i| {
            table[i][m][1].map(|cell| Alignment {
                consumed: i,
                score: cell.score,
                skipped: cell.skipped,
            })
        })
        .collect()
}
