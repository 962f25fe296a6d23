//! wgpu-backed render tiers. Compiled only with the `gpu` feature.

pub(crate) mod context;
pub mod explicit;
pub mod immediate;
pub(crate) mod shaders;
