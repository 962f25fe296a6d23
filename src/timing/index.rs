use crate::{
    foundation::error::{SublayError, SublayResult},
    pipeline::protocol::RequestId,
};

/// Greatest index whose timestamp is `<= query_ms`, or `None` when the table is empty or every
/// timestamp lies after the query.
///
/// `timestamps` must be sorted ascending.
pub fn find_index(timestamps: &[f64], query_ms: f64) -> Option<usize> {
    timestamps
        .partition_point(|&t| t <= query_ms)
        .checked_sub(1)
}

/// Sorted presentation timestamps, one per subtitle entry.
///
/// Immutable once built; a reload builds a fresh table.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimestampTable {
    ms: Vec<f64>,
}

impl TimestampTable {
    pub fn new(ms: Vec<f64>) -> SublayResult<Self> {
        if let Some(i) = ms.iter().position(|t| !t.is_finite()) {
            return Err(SublayError::validation(format!(
                "timestamp {i} is not finite"
            )));
        }
        if let Some(i) = ms.windows(2).position(|w| w[1] < w[0]) {
            return Err(SublayError::validation(format!(
                "timestamps must be sorted ascending (entry {} < entry {i})",
                i + 1
            )));
        }
        Ok(Self { ms })
    }

    pub fn find_index(&self, query_ms: f64) -> Option<usize> {
        find_index(&self.ms, query_ms)
    }

    pub fn len(&self) -> usize {
        self.ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ms.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.ms.get(index).copied()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.ms
    }
}

/// Frame interval used to decide whether a remote lookup can be reused.
pub const DEFAULT_INDEX_REUSE_WINDOW_MS: f64 = 17.0;

/// Short-lived cache in front of an index lookup that costs a background round trip.
///
/// Queries close to the last resolved time reuse its answer. Otherwise at most one lookup is kept
/// in flight, and callers see the previous answer until it resolves.
#[derive(Clone, Debug)]
pub struct IndexCache {
    reuse_window_ms: f64,
    resolved_at_ms: Option<f64>,
    cached: Option<usize>,
    in_flight: Option<(RequestId, f64)>,
}

impl IndexCache {
    pub fn new(reuse_window_ms: f64) -> Self {
        Self {
            reuse_window_ms: reuse_window_ms.max(0.0),
            resolved_at_ms: None,
            cached: None,
            in_flight: None,
        }
    }

    /// Return the best known index for `time_ms`, issuing a lookup through `dispatch` when the
    /// cached answer is too old and none is outstanding.
    pub fn lookup<F>(&mut self, time_ms: f64, dispatch: F) -> SublayResult<Option<usize>>
    where
        F: FnOnce(f64) -> SublayResult<RequestId>,
    {
        if let Some(at) = self.resolved_at_ms
            && (time_ms - at).abs() < self.reuse_window_ms
        {
            return Ok(self.cached);
        }
        if self.in_flight.is_none() {
            let id = dispatch(time_ms)?;
            self.in_flight = Some((id, time_ms));
        }
        Ok(self.cached)
    }

    /// Record the answer for lookup `id`. Answers for any other id are ignored.
    pub fn resolve(&mut self, id: RequestId, index: Option<usize>) -> bool {
        match self.in_flight {
            Some((pending, time_ms)) if pending == id => {
                self.in_flight = None;
                self.cached = index;
                self.resolved_at_ms = Some(time_ms);
                true
            }
            _ => false,
        }
    }

    /// Forget the resolved time so the next query goes back to the source.
    pub fn invalidate(&mut self) {
        self.resolved_at_ms = None;
    }

    /// Drop the outstanding lookup, e.g. after the background path went away.
    pub fn abandon_in_flight(&mut self) {
        self.in_flight = None;
    }

    pub fn in_flight(&self) -> Option<RequestId> {
        self.in_flight.map(|(id, _)| id)
    }

    pub fn cached(&self) -> Option<usize> {
        self.cached
    }
}

impl Default for IndexCache {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_REUSE_WINDOW_MS)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timing/index.rs"]
mod tests;
