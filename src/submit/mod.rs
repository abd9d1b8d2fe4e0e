pub mod drawable;
pub mod engine;
pub mod error;
pub mod material;
pub mod objects;
pub mod pipeline;

pub(crate) mod internal;

pub use drawable::{BindingEntry, BindingMap, BoundResource, Drawable, DrawableFlags, SamplerKind};
pub use engine::{RecordedFrame, RenderTarget, SharedPipelineCache, SubmitEngine, SubmitStats};
pub use error::SubmitError;
pub use internal::pipeline::PipelineCache;
pub use material::MaterialParams;
pub use objects::{FrameUniform, HistoryData, MaterialData, ObjectData};
pub use pipeline::{DepthSpec, PipelineSpec, ResolvedPipelineSpec, TargetInfo, VertexLayoutSpec};
