/// Host playback clock abstraction.
pub mod clock;
/// Clock-synchronized render loop over the decode pipeline and render cascade.
pub mod overlay_session;
/// Session options, display settings and environment overrides.
pub mod settings;
