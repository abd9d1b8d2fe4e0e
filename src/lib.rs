pub mod asset;
pub mod settings;
pub mod submit;

pub use asset::{Assets, GpuBuffer, Handle, Mesh, ShaderSet, Texture};
pub use settings::{EngineSettings, Viewport};
pub use submit::{
    BindingMap, BoundResource, Drawable, DrawableFlags, MaterialParams, PipelineSpec,
    RecordedFrame, RenderTarget, SamplerKind, SubmitEngine, SubmitError, SubmitStats,
};

/// Initialize env_logger for binaries and tests embedding the engine.
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}
