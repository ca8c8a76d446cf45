/// Contract violations in datasets, batching and augmentation.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("batch size {batch_size} is not divisible by the number of classes ({num_classes})")]
    BatchSizeNotDivisible {
        batch_size: usize,
        num_classes: usize,
    },

    /// A class needed synthetic windows but has no source windows.
    #[error("class {class} has no source windows to splice from")]
    EmptyClass { class: usize },

    #[error("label {label} at position {index} is outside 0..{num_classes}")]
    LabelOutOfRange {
        index: usize,
        label: usize,
        num_classes: usize,
    },

    #[error("{what}: expected {expected}, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error(
        "{num_segments} segments of {segment_len} samples do not fit a window of {window_len} samples"
    )]
    SegmentsExceedWindow {
        num_segments: usize,
        segment_len: usize,
        window_len: usize,
    },

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("invalid split: {0}")]
    InvalidSplit(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Tensor(#[from] eegformer_core::Error),
}

pub type Result<T> = std::result::Result<T, DataError>;
