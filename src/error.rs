use thiserror::Error;

/// Errors raised by the anchor layer.
///
/// Sparse inputs (no ground truth for a level, no anchors inside the border) are
/// not errors; they produce well-defined default outputs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnchorError {
    /// Score, box and anchor row counts disagree.
    #[error("anchor layer shape error {scores} vs {boxes} vs {anchors}")]
    ShapeMismatch {
        scores: usize,
        boxes: usize,
        anchors: usize,
    },

    /// An input tensor does not have the expected layout.
    #[error("invalid tensor layout for {name}: expected {expected}, got {got:?}")]
    InvalidLayout {
        name: &'static str,
        expected: String,
        got: Vec<usize>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to load configuration: {0}")]
    ConfigLoad(String),
}
