use crate::{decode::SubtitleSource, foundation::core::Frame};

/// Correlation id for one background request. Ids increase monotonically per dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub enum Request {
    /// Build the worker's decoder.
    Init,
    /// Replace loaded content. The payload is shared, not copied.
    Load(SubtitleSource),
    RenderAtIndex(usize),
    FindIndex { time_ms: f64 },
    GetTimestamps,
    ClearCache,
    /// Dispose the decoder and stop the worker.
    Dispose,
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Load(_) => "load",
            Self::RenderAtIndex(_) => "render_at_index",
            Self::FindIndex { .. } => "find_index",
            Self::GetTimestamps => "get_timestamps",
            Self::ClearCache => "clear_cache",
            Self::Dispose => "dispose",
        }
    }
}

/// Typed reply to a [`Request`]. Replies carry enough context to be routed without a side table.
#[derive(Clone, Debug)]
pub enum Response {
    Ready,
    Loaded { count: usize },
    Frame { index: usize, frame: Option<Frame> },
    Index { time_ms: f64, index: Option<usize> },
    Timestamps(Vec<f64>),
    CacheCleared,
    Disposed,
}

#[derive(Clone, Debug)]
pub struct Envelope<T> {
    pub id: RequestId,
    pub body: T,
}

/// What the worker sends back: a response or an error message.
pub type Reply = Envelope<Result<Response, String>>;
