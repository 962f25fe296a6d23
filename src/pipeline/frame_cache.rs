use std::{collections::HashMap, sync::Arc};

use crate::{
    foundation::{core::Frame, error::SublayResult},
    pipeline::protocol::RequestId,
};

/// Result of a frame-cache lookup.
#[derive(Clone, Debug)]
pub enum FrameLookup {
    /// Decoded. `None` means the entry has nothing to show.
    Ready(Option<Arc<Frame>>),
    /// A request for this index is in flight.
    Pending,
}

/// Decoded frames by index, plus at most one in-flight request per index.
#[derive(Debug, Default)]
pub struct FrameCache {
    frames: HashMap<usize, Option<Arc<Frame>>>,
    pending: HashMap<usize, RequestId>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<Option<Arc<Frame>>> {
        self.frames.get(&index).cloned()
    }

    /// Return the cached frame, or issue a request through `dispatch` unless one is already in
    /// flight for `index`.
    pub fn get_or_request(
        &mut self,
        index: usize,
        dispatch: impl FnOnce(usize) -> SublayResult<RequestId>,
    ) -> SublayResult<FrameLookup> {
        if let Some(frame) = self.frames.get(&index) {
            return Ok(FrameLookup::Ready(frame.clone()));
        }
        if self.pending.contains_key(&index) {
            return Ok(FrameLookup::Pending);
        }
        let id = dispatch(index)?;
        self.pending.insert(index, id);
        Ok(FrameLookup::Pending)
    }

    /// Store a completed frame. The pending entry is cleared only if `id` is the request it tracks,
    /// so a reply from before a seek cannot clear a newer request.
    ///
    /// Returns whether `id` was the tracked request.
    pub fn complete(&mut self, index: usize, id: RequestId, frame: Option<Frame>) -> bool {
        let matched = self.pending.get(&index) == Some(&id);
        if matched {
            self.pending.remove(&index);
        }
        self.frames.insert(index, frame.map(Arc::new));
        matched
    }

    pub fn insert(&mut self, index: usize, frame: Option<Frame>) -> Option<Arc<Frame>> {
        let frame = frame.map(Arc::new);
        self.frames.insert(index, frame.clone());
        frame
    }

    pub fn pending_request(&self, index: usize) -> Option<RequestId> {
        self.pending.get(&index).copied()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Forget in-flight bookkeeping. Returns the indices that were pending, sorted.
    pub fn drop_pending(&mut self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.pending.drain().map(|(i, _)| i).collect();
        indices.sort_unstable();
        indices
    }

    /// Drop decoded frames and in-flight bookkeeping.
    pub fn on_seek(&mut self) {
        self.frames.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/frame_cache.rs"]
mod tests;
