//! Verdict extraction and compliance aggregation.
//!
//! A model answer is reduced to [`Verdict::Yes`], [`Verdict::No`] or
//! [`Verdict::Unclear`] by looking at its leading characters only. The rule
//! depends on the answer's length in characters:
//!
//! | Length | Rule |
//! |--------|------|
//! | ≤ 3 | starts with `no` → No; equals `yes` → Yes |
//! | 4 | starts with `yes` → Yes (no `no` check at this length) |
//! | > 4 | starts with `no` → No; starts with `yes` → Yes |
//!
//! Everything else is Unclear. Comparisons are case-insensitive. The missing
//! `no` check for four-character answers ("Nope", "No!!") is kept as is:
//! scores must stay comparable with earlier runs.

use serde::Serialize;
use std::fmt;

/// Tri-state classification of a model answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Yes,
    No,
    Unclear,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Yes => "Yes",
            Verdict::No => "No",
            Verdict::Unclear => "N/A",
        };
        f.write_str(s)
    }
}

/// Classify an answer. Never fails.
pub fn extract(answer: &str) -> Verdict {
    let len = answer.chars().count();
    let first2 = lowercase_prefix(answer, 2);
    let first3 = lowercase_prefix(answer, 3);

    if len <= 3 {
        if first2 == "no" {
            Verdict::No
        } else if answer.to_lowercase() == "yes" {
            Verdict::Yes
        } else {
            Verdict::Unclear
        }
    } else if len == 4 {
        if first3 == "yes" {
            Verdict::Yes
        } else {
            Verdict::Unclear
        }
    } else if first2 == "no" {
        Verdict::No
    } else if first3 == "yes" {
        Verdict::Yes
    } else {
        Verdict::Unclear
    }
}

fn lowercase_prefix(s: &str, n: usize) -> String {
    s.chars().take(n).collect::<String>().to_lowercase()
}

/// Share of Yes among the Yes/No verdicts of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComplianceScore {
    /// `yes / (yes + no) × 100`, or `0.0` when there is no Yes/No verdict.
    pub percentage: f64,
    pub yes_count: usize,
    pub no_count: usize,
}

/// Display band of a score, used when reporting a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Red,
    Orange,
    Green,
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScoreBand::Red => "red",
            ScoreBand::Orange => "orange",
            ScoreBand::Green => "green",
        };
        f.write_str(s)
    }
}

impl ComplianceScore {
    pub fn band(&self) -> ScoreBand {
        if self.percentage < 50.0 {
            ScoreBand::Red
        } else if self.percentage < 70.0 {
            ScoreBand::Orange
        } else {
            ScoreBand::Green
        }
    }
}

/// Aggregate a batch of verdicts. Unclear verdicts are ignored entirely.
pub fn aggregate(verdicts: &[Verdict]) -> ComplianceScore {
    let yes_count = verdicts.iter().filter(|v| **v == Verdict::Yes).count();
    let no_count = verdicts.iter().filter(|v| **v == Verdict::No).count();
    let total = yes_count + no_count;

    let percentage = if total == 0 {
        0.0
    } else {
        yes_count as f64 / total as f64 * 100.0
    };

    ComplianceScore {
        percentage,
        yes_count,
        no_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_answers() {
        assert_eq!(extract("No."), Verdict::No);
        assert_eq!(extract("no"), Verdict::No);
        assert_eq!(extract("Yes"), Verdict::Yes);
        assert_eq!(extract("YES"), Verdict::Yes);
        assert_eq!(extract("N"), Verdict::Unclear);
        assert_eq!(extract("Ye"), Verdict::Unclear);
        assert_eq!(extract(""), Verdict::Unclear);
    }

    #[test]
    fn four_character_answers_only_check_yes() {
        assert_eq!(extract("Yes."), Verdict::Yes);
        assert_eq!(extract("yes!"), Verdict::Yes);
        assert_eq!(extract("Nope"), Verdict::Unclear);
        assert_eq!(extract("No.."), Verdict::Unclear);
    }

    #[test]
    fn long_answers() {
        assert_eq!(
            extract("Yes, ION supports single sign-on via SAML."),
            Verdict::Yes
        );
        assert_eq!(extract("No, ION does not export PDFs."), Verdict::No);
        assert_eq!(extract("I don't know."), Verdict::Unclear);
        assert_eq!(extract("Not sure"), Verdict::No);
        assert_eq!(extract("  Yes, leading space"), Verdict::Unclear);
    }

    #[test]
    fn multibyte_lengths_count_characters() {
        // 4 characters, 5+ bytes.
        assert_eq!(extract("Yesé"), Verdict::Yes);
        assert_eq!(extract("Noé"), Verdict::No);
    }

    #[test]
    fn aggregate_ignores_unclear() {
        let score = aggregate(&[Verdict::Yes, Verdict::No, Verdict::Unclear, Verdict::Yes]);
        assert_eq!(score.yes_count, 2);
        assert_eq!(score.no_count, 1);
        assert!((score.percentage - 66.666_666).abs() < 1e-3);
        assert_eq!(format!("{:.2}", score.percentage), "66.67");
    }

    #[test]
    fn aggregate_empty_is_zero() {
        let score = aggregate(&[]);
        assert_eq!(
            score,
            ComplianceScore {
                percentage: 0.0,
                yes_count: 0,
                no_count: 0
            }
        );
        assert_eq!(aggregate(&[Verdict::Unclear]).percentage, 0.0);
    }

    #[test]
    fn bands() {
        assert_eq!(aggregate(&[Verdict::No]).band(), ScoreBand::Red);
        assert_eq!(
            aggregate(&[Verdict::Yes, Verdict::No]).band(),
            ScoreBand::Orange
        );
        assert_eq!(aggregate(&[Verdict::Yes]).band(), ScoreBand::Green);
    }
}
