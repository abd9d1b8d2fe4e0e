use thiserror::Error;

/// Fatal conditions raised by the submission engine. Cache misses are not
/// errors; they take the normal construction paths.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("frames in flight must be greater than zero")]
    NoFramesInFlight,

    #[error("pipeline `{label}` has no vertex stage")]
    MissingVertexStage { label: String },

    #[error("pipeline `{label}` draws to color attachments but has no fragment stage")]
    MissingFragmentStage { label: String },

    #[error("render target attachment layout does not match the pipeline (expected {expected} color attachments, got {got})")]
    AttachmentMismatch { expected: usize, got: usize },

    #[error("unknown {kind} handle {index}")]
    UnknownHandle { kind: &'static str, index: usize },

    #[error("bindless table needs {required} entries but capacity is {capacity}")]
    TableCapacityExceeded { required: usize, capacity: usize },
}
