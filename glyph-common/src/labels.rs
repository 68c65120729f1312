//! Class index to character tables
//!
//! Every backend predicts one of 47 classes. The order of each table is the
//! class order the corresponding model was trained with, so the tables are
//! not interchangeable: the LR model enumerates lowercase `a` through `k`,
//! while the networks use the EMNIST Balanced lowercase subset.

use crate::BackendKind;

/// Number of classes every backend predicts
pub const CLASS_COUNT: usize = 47;

/// Class order of the logistic regression model: `0-9`, `A-Z`, `a-k`
#[rustfmt::skip]
pub const LR_LABELS: [char; CLASS_COUNT] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J',
    'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T',
    'U', 'V', 'W', 'X', 'Y', 'Z',
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k',
];

/// EMNIST Balanced class order used by the CNN and RNN models
#[rustfmt::skip]
pub const EMNIST_BALANCED_LABELS: [char; CLASS_COUNT] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J',
    'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T',
    'U', 'V', 'W', 'X', 'Y', 'Z',
    'a', 'b', 'd', 'e', 'f', 'g', 'h', 'n', 'q', 'r', 't',
];

/// Label table bound to a backend
pub fn labels_for(kind: BackendKind) -> &'static [char] {
    match kind {
        BackendKind::Lr => &LR_LABELS,
        BackendKind::Cnn | BackendKind::Rnn => &EMNIST_BALANCED_LABELS,
    }
}

/// Map a predicted class index to its character, `None` when out of range
pub fn label_for(kind: BackendKind, index: usize) -> Option<char> {
    labels_for(kind).get(index).copied()
}
