/// Training label of a single anchor.
///
/// Labels are stored as `f32` in the label tensors handed to the loss, which reads
/// `1` as an object, `0` as background and skips `-1` entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    Ignore,
    Background,
    Foreground,
}

impl Label {
    /// Value written into the label tensor.
    pub fn as_f32(self) -> f32 {
        match self {
            Label::Ignore => -1.0,
            Label::Background => 0.0,
            Label::Foreground => 1.0,
        }
    }

    /// Reads a label back from a label tensor value. Anything that is not `0` or `1` is
    /// treated as ignored.
    pub fn from_f32(value: f32) -> Self {
        if value == 1.0 {
            Label::Foreground
        } else if value == 0.0 {
            Label::Background
        } else {
            Label::Ignore
        }
    }

    /// Row of the inside weight mask for an anchor with this label.
    pub fn inside_weight(self) -> [f32; 4] {
        match self {
            Label::Foreground => [1.0; 4],
            _ => [0.0; 4],
        }
    }
}

/// Number of anchors carrying `label`.
pub fn count(labels: &[Label], label: Label) -> usize {
    labels.iter().filter(|l| **l == label).count()
}

/// Positions of the anchors carrying `label`, in ascending order.
pub fn positions(labels: &[Label], label: Label) -> Vec<usize> {
    labels
        .iter()
        .enumerate()
        .filter(|(_, l)| **l == label)
        .map(|(i, _)| i)
        .collect()
}
