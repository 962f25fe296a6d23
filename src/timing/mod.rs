/// Timestamp table lookup and the remote-lookup cache.
pub mod index;
/// Render-time statistics.
pub mod stats;
