//! Turning class scores into the printed label

use glyph_common::{labels, BackendKind};

use crate::{InferError, InferResult};

/// Label reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prediction {
    /// One confident class
    Single(char),
    /// Top two classes were too close to call
    Ambiguous(char, char),
}

impl std::fmt::Display for Prediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Prediction::Single(c) => write!(f, "{}", c),
            Prediction::Ambiguous(a, b) => write!(f, "{} or {}?", a, b),
        }
    }
}

/// Indices and scores of the `k` best classes, best first
///
/// Ties keep the lower class index first.
pub fn top_k(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(k);
    ranked
}

/// Rescale raw scores into a probability distribution
///
/// Scores that already form a distribution are returned unchanged; anything
/// else (logits) goes through a softmax.
pub fn to_probabilities(scores: &[f32]) -> Vec<f32> {
    let sum: f32 = scores.iter().sum();
    let is_distribution =
        scores.iter().all(|&s| (0.0..=1.0).contains(&s)) && (sum - 1.0).abs() < 1e-3;
    if is_distribution {
        return scores.to_vec();
    }
    softmax(scores)
}

pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

/// Pick the label for a score vector
///
/// With an ambiguity margin, the two best classes are both reported when
/// their probabilities differ by less than the margin.
pub fn decide(
    kind: BackendKind,
    scores: &[f32],
    ambiguity_margin: Option<f32>,
) -> InferResult<Prediction> {
    let probs = to_probabilities(scores);
    let ranked = top_k(&probs, 2);
    let label = |index: usize| labels::label_for(kind, index).ok_or(InferError::LabelIndex(index));

    let Some(&(best, best_p)) = ranked.first() else {
        return Err(InferError::EmptyOutput(scores.len()));
    };

    match (ambiguity_margin, ranked.get(1)) {
        (Some(margin), Some(&(second, second_p))) if best_p - second_p < margin => {
            Ok(Prediction::Ambiguous(label(best)?, label(second)?))
        }
        _ => Ok(Prediction::Single(label(best)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_hot_ish(best: usize, second: usize, p_best: f32, p_second: f32) -> Vec<f32> {
        let rest = (1.0 - p_best - p_second) / 45.0;
        let mut v = vec![rest; labels::CLASS_COUNT];
        v[best] = p_best;
        v[second] = p_second;
        v
    }

    #[test]
    fn test_top_k_orders_by_score() {
        let ranked = top_k(&[0.1, 0.7, 0.2], 2);
        assert_eq!(ranked, vec![(1, 0.7), (2, 0.2)]);
    }

    #[test]
    fn test_top_k_ties_prefer_lower_index() {
        let ranked = top_k(&[0.5, 0.5], 2);
        assert_eq!(ranked[0].0, 0);
    }

    #[test]
    fn test_softmax_applied_to_logits() {
        let probs = to_probabilities(&[2.0, 0.0, -1.0]);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(probs[0] > probs[1] && probs[1] > probs[2]);
    }

    #[test]
    fn test_distribution_passes_through() {
        let scores = [0.25, 0.75];
        assert_eq!(to_probabilities(&scores), scores.to_vec());
    }

    #[test]
    fn test_single_label_without_margin() {
        let scores = one_hot_ish(10, 11, 0.40, 0.39);
        let prediction = decide(BackendKind::Cnn, &scores, None).unwrap();
        assert_eq!(prediction, Prediction::Single('A'));
        assert_eq!(prediction.to_string(), "A");
    }

    #[test]
    fn test_close_candidates_are_ambiguous() {
        // EMNIST balanced: 36 = 'a', 46 = 't'
        let scores = one_hot_ish(36, 46, 0.45, 0.40);
        let prediction = decide(BackendKind::Rnn, &scores, Some(0.15)).unwrap();
        assert_eq!(prediction.to_string(), "a or t?");
    }

    #[test]
    fn test_clear_winner_is_single_under_margin() {
        let scores = one_hot_ish(36, 46, 0.90, 0.05);
        let prediction = decide(BackendKind::Rnn, &scores, Some(0.15)).unwrap();
        assert_eq!(prediction, Prediction::Single('a'));
    }

    #[test]
    fn test_full_margin_always_reports_two() {
        let scores = one_hot_ish(0, 1, 0.98, 0.01);
        let prediction = decide(BackendKind::Rnn, &scores, Some(1.0)).unwrap();
        assert_eq!(prediction, Prediction::Ambiguous('0', '1'));
    }

    #[test]
    fn test_index_outside_label_map() {
        let mut scores = vec![0.0; labels::CLASS_COUNT + 1];
        scores[labels::CLASS_COUNT] = 1.0;
        assert!(matches!(
            decide(BackendKind::Lr, &scores, None),
            Err(InferError::LabelIndex(47))
        ));
    }

    #[test]
    fn test_empty_scores() {
        assert!(matches!(
            decide(BackendKind::Lr, &[], None),
            Err(InferError::EmptyOutput(0))
        ));
    }
}
