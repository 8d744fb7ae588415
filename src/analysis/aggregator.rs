//! Majority voting across prediction sets.
//!
//! Each row is decided by plurality. When several labels share the top
//! count the smallest label wins, so the result never depends on the
//! order in which predictors were loaded.

use crate::models::{FinalPredictions, Label, PredictionMatrix, VoteSummary};
use std::collections::BTreeMap;
use tracing::debug;

/// Per-row count of votes for each label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteTally {
    counts: BTreeMap<Label, usize>,
    total: usize,
}

impl VoteTally {
    /// Tally the given votes.
    pub fn from_votes(votes: impl IntoIterator<Item = Label>) -> Self {
        let mut tally = Self::default();
        for vote in votes {
            tally.add(vote);
        }
        tally
    }

    pub fn add(&mut self, label: Label) {
        *self.counts.entry(label).or_default() += 1;
        self.total += 1;
    }

    /// Number of votes for `label`.
    #[allow(dead_code)] // Utility for inspecting a tally
    pub fn count(&self, label: Label) -> usize {
        self.counts.get(&label).copied().unwrap_or(0)
    }

    /// Total number of votes cast.
    pub fn total(&self) -> usize {
        self.total
    }

    /// The winning label and its count, or `None` for an empty tally.
    ///
    /// Labels are visited in ascending order and only a strictly greater
    /// count replaces the current winner, which makes the smallest tied
    /// label win.
    pub fn winner(&self) -> Option<(Label, usize)> {
        let mut best: Option<(Label, usize)> = None;
        for (&label, &count) in &self.counts {
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((label, count)),
            }
        }
        best
    }

    /// True when two or more labels share the top count.
    pub fn is_tied(&self) -> bool {
        match self.winner() {
            Some((_, top)) => self.counts.values().filter(|&&c| c == top).count() > 1,
            None => false,
        }
    }

    /// True when all votes went to a single label.
    pub fn is_unanimous(&self) -> bool {
        self.counts.len() == 1
    }
}

/// Compute the per-row majority label.
pub fn majority_vote(matrix: &PredictionMatrix) -> FinalPredictions {
    let labels = row_tallies(matrix)
        .filter_map(|tally| tally.winner())
        .map(|(label, _)| label)
        .collect();

    FinalPredictions::new(labels)
}

/// Gather vote statistics for every row.
pub fn summarize_votes(matrix: &PredictionMatrix) -> VoteSummary {
    let mut summary = VoteSummary {
        rows: matrix.row_count(),
        predictors: matrix.predictor_count(),
        ..VoteSummary::default()
    };

    for (row, tally) in row_tallies(matrix).enumerate() {
        let Some((label, count)) = tally.winner() else {
            continue;
        };

        if tally.is_unanimous() {
            summary.unanimous_rows += 1;
        }
        if tally.is_tied() {
            debug!("Row {}: tie resolved to label {}", row, label);
            summary.tied_rows += 1;
        }
        if count * 2 <= tally.total() {
            summary.without_absolute_majority += 1;
        }

        *summary.label_distribution.entry(label).or_default() += 1;
    }

    summary
}

fn row_tallies(matrix: &PredictionMatrix) -> impl Iterator<Item = VoteTally> + '_ {
    (0..matrix.row_count()).map(move |row| VoteTally::from_votes(matrix.column(row)))
}

/// Generate a text summary of vote statistics.
pub fn generate_summary_text(summary: &VoteSummary) -> String {
    let mut lines = Vec::new();

    lines.push(format!(
        "Rows: {} | Predictors: {}",
        summary.rows, summary.predictors
    ));
    lines.push(format!("- Unanimous rows: {}", summary.unanimous_rows));
    lines.push(format!("- Tied rows (smallest label wins): {}", summary.tied_rows));
    lines.push(format!(
        "- Rows without absolute majority: {}",
        summary.without_absolute_majority
    ));

    if !summary.label_distribution.is_empty() {
        lines.push(String::new());
        lines.push("Label distribution:".to_string());
        for (label, count) in &summary.label_distribution {
            lines.push(format!("- {}: {}", label, count));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PredictionSet;

    fn matrix(sets: Vec<Vec<Label>>) -> PredictionMatrix {
        PredictionMatrix::new(
            sets.into_iter()
                .enumerate()
                .map(|(i, labels)| PredictionSet::new(format!("predictions_script{}.csv", i + 1), labels))
                .collect(),
        )
        .unwrap()
    }

    /// One row per predictor, each with a single vote.
    fn single_row(votes: &[Label]) -> PredictionMatrix {
        matrix(votes.iter().map(|&v| vec![v]).collect())
    }

    #[test]
    fn test_simple_majority() {
        let result = majority_vote(&single_row(&[1, 1, 2]));
        assert_eq!(result.labels(), &[1]);
    }

    #[test]
    fn test_tie_picks_smallest_label() {
        let result = majority_vote(&single_row(&[0, 1, 1, 0, 1, 0]));
        assert_eq!(result.labels(), &[0]);
    }

    #[test]
    fn test_two_predictors_three_rows() {
        let result = majority_vote(&matrix(vec![vec![1, 0, 1], vec![1, 1, 1]]));
        // row 1 is a 0-vs-1 tie
        assert_eq!(result.labels(), &[1, 0, 1]);
    }

    #[test]
    fn test_single_predictor_is_identity() {
        let result = majority_vote(&matrix(vec![vec![3, 1, 4, 1, 5]]));
        assert_eq!(result.labels(), &[3, 1, 4, 1, 5]);
    }

    #[test]
    fn test_empty_rows() {
        let result = majority_vote(&matrix(vec![Vec::new(), Vec::new(), Vec::new()]));
        assert!(result.is_empty());
    }

    #[test]
    fn test_unanimity() {
        let result = majority_vote(&matrix(vec![vec![7, 2], vec![7, 2], vec![7, 2]]));
        assert_eq!(result.labels(), &[7, 2]);
    }

    #[test]
    fn test_plurality_without_absolute_majority() {
        let m = single_row(&[2, 2, 1, 3, 4, 5]);
        let summary = summarize_votes(&m);
        assert_eq!(majority_vote(&m).labels(), &[2]);
        assert_eq!(summary.without_absolute_majority, 1);
        assert_eq!(summary.tied_rows, 0);
    }

    #[test]
    fn test_tie_with_negative_labels() {
        let result = majority_vote(&single_row(&[5, -3, 5, -3]));
        assert_eq!(result.labels(), &[-3]);
    }

    #[test]
    fn test_load_order_does_not_matter() {
        let sets = vec![
            vec![0, 1, 2, 2],
            vec![1, 1, 0, 2],
            vec![0, 2, 1, 1],
            vec![1, 0, 2, 0],
        ];
        let expected = majority_vote(&matrix(sets.clone()));

        let mut rotated = sets.clone();
        for _ in 0..sets.len() {
            rotated.rotate_left(1);
            assert_eq!(majority_vote(&matrix(rotated.clone())), expected);
        }

        let mut reversed = sets;
        reversed.reverse();
        assert_eq!(majority_vote(&matrix(reversed)), expected);
    }

    #[test]
    fn test_output_values_come_from_their_row() {
        let sets = vec![
            vec![10, 20, 30, 40],
            vec![11, 20, 31, 41],
            vec![12, 22, 30, 42],
        ];
        let m = matrix(sets);
        let result = majority_vote(&m);

        assert_eq!(result.len(), m.row_count());
        for (row, label) in result.labels().iter().enumerate() {
            assert!(m.column(row).any(|v| v == *label));
        }
    }

    #[test]
    fn test_tally_counts() {
        let tally = VoteTally::from_votes([3, 1, 3, 2, 3]);
        assert_eq!(tally.count(3), 3);
        assert_eq!(tally.count(9), 0);
        assert_eq!(tally.total(), 5);
        assert_eq!(tally.winner(), Some((3, 3)));
        assert!(!tally.is_tied());
        assert!(!tally.is_unanimous());
    }

    #[test]
    fn test_empty_tally_has_no_winner() {
        let tally = VoteTally::default();
        assert_eq!(tally.winner(), None);
        assert!(!tally.is_tied());
    }

    #[test]
    fn test_vote_summary() {
        let m = matrix(vec![
            vec![1, 0, 1, 2],
            vec![1, 1, 0, 2],
            vec![1, 0, 2, 2],
            vec![1, 1, 0, 2],
        ]);
        let summary = summarize_votes(&m);

        assert_eq!(majority_vote(&m).labels(), &[1, 0, 0, 2]);
        assert_eq!(summary.rows, 4);
        assert_eq!(summary.predictors, 4);
        assert_eq!(summary.unanimous_rows, 2);
        // row 1 ties 0 vs 1
        assert_eq!(summary.tied_rows, 1);
        // row 1 (2 of 4) has no absolute majority; row 2 (0 gets 2 of 4) neither
        assert_eq!(summary.without_absolute_majority, 2);
        assert_eq!(summary.label_distribution.get(&0), Some(&2));
        assert_eq!(summary.label_distribution.get(&1), Some(&1));
        assert_eq!(summary.label_distribution.get(&2), Some(&1));
    }

    #[test]
    fn test_distribution_matches_final_labels() {
        let m = matrix(vec![vec![4, 4, 1], vec![1, 4, 1], vec![1, 0, 0]]);
        let result = majority_vote(&m);
        let summary = summarize_votes(&m);

        let total: usize = summary.label_distribution.values().sum();
        assert_eq!(total, result.len());
        for label in result.labels() {
            assert!(summary.label_distribution.contains_key(label));
        }
    }

    #[test]
    fn test_generate_summary_text() {
        let summary = summarize_votes(&single_row(&[0, 1]));
        let text = generate_summary_text(&summary);

        assert!(text.contains("Rows: 1 | Predictors: 2"));
        assert!(text.contains("Tied rows (smallest label wins): 1"));
        assert!(text.contains("- 0: 1"));
    }
}
