use crate::render::backend::BackendKind;

/// One-shot degradation events reported to the host.
///
/// Rendering continues after every notice; they exist so the host can tell the user.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FallbackNotice {
    /// A render tier failed and the next one in the cascade is being tried.
    BackendDowngrade {
        from: BackendKind,
        to: BackendKind,
        reason: String,
    },
    /// The background decode path failed and work now runs on the calling thread.
    BackgroundDisabled { reason: String },
}

impl std::fmt::Display for FallbackNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BackendDowngrade { from, to, reason } => {
                write!(f, "render backend {from} unavailable ({reason}); using {to}")
            }
            Self::BackgroundDisabled { reason } => {
                write!(f, "background decoding disabled ({reason}); decoding inline")
            }
        }
    }
}

/// Receiver for [`FallbackNotice`]s.
pub type NoticeSink<'a> = &'a mut dyn FnMut(&FallbackNotice);
