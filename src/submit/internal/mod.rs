pub(crate) mod batches;
pub(crate) mod bindings;
pub(crate) mod bindless;
pub(crate) mod buffers;
pub(crate) mod frame;
pub(crate) mod indirect;
pub(crate) mod pipeline;
