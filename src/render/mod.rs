//! Render tiers and the capability cascade that picks one.

/// Backend trait, tier kinds and readback frames.
pub mod backend;
/// Tier selection with ordered fallback.
pub mod cascade;
pub mod composite;
/// Destination-rectangle math shared by every tier.
pub mod geometry;
#[cfg(feature = "gpu")]
pub mod gpu;
/// Deferred destruction of GPU resources.
pub mod release;
/// CPU compositing tier.
pub mod software;
