use crate::{
    foundation::{
        core::{Composition, SurfaceDesc},
        error::{SublayError, SublayResult},
        notice::{FallbackNotice, NoticeSink},
    },
    render::backend::{BackendKind, DrawParams, FrameRGBA, RenderBackend, create_backend},
};

/// Builds one tier. Injected in tests to script tier failures.
pub type BackendFactory =
    Box<dyn FnMut(BackendKind, SurfaceDesc) -> SublayResult<Box<dyn RenderBackend>>>;

/// Ordered tier list plus the single active tier.
///
/// Operations forwarded before [`BackendCascade::initialize`] succeed as no-ops.
pub struct BackendCascade {
    order: Vec<BackendKind>,
    factory: BackendFactory,
    active: Option<Box<dyn RenderBackend>>,
}

impl BackendCascade {
    pub fn new(order: &[BackendKind]) -> Self {
        Self::with_factory(order, Box::new(create_backend))
    }

    /// Cascade over `order`. Duplicates are dropped and `Software` is appended when missing, so
    /// the final tier can always initialize.
    pub fn with_factory(order: &[BackendKind], factory: BackendFactory) -> Self {
        let mut normalized: Vec<BackendKind> = Vec::with_capacity(order.len() + 1);
        for &kind in order {
            if !normalized.contains(&kind) {
                normalized.push(kind);
            }
        }
        if !normalized.contains(&BackendKind::Software) {
            normalized.push(BackendKind::Software);
        }
        Self {
            order: normalized,
            factory,
            active: None,
        }
    }

    pub fn order(&self) -> &[BackendKind] {
        &self.order
    }

    pub fn active_kind(&self) -> Option<BackendKind> {
        self.active.as_ref().map(|b| b.kind())
    }

    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    /// Bind to `surface`, trying tiers best-first. Each move to a later tier fires `notify` once.
    #[tracing::instrument(skip(self, notify))]
    pub fn initialize(
        &mut self,
        surface: SurfaceDesc,
        notify: NoticeSink<'_>,
    ) -> SublayResult<BackendKind> {
        surface.validate()?;
        self.destroy();
        let order = self.order.clone();
        self.start_from(&order, surface, None, notify)
    }

    /// Drop the active tier after a fatal error and continue the cascade below it.
    pub fn fail_over(
        &mut self,
        reason: &SublayError,
        notify: NoticeSink<'_>,
    ) -> SublayResult<BackendKind> {
        let Some(mut failed) = self.active.take() else {
            return Err(SublayError::initialization("no active render backend"));
        };
        let from = failed.kind();
        let surface = failed.surface();
        failed.destroy();
        tracing::warn!(backend = %from, error = %reason, "render backend failed mid-session");

        let pos = self.order.iter().position(|k| *k == from);
        let rest: Vec<BackendKind> = match pos {
            Some(i) => self.order[i + 1..].to_vec(),
            None => vec![BackendKind::Software],
        };
        if rest.is_empty() {
            return Err(SublayError::initialization(format!(
                "{from} failed and no lower tier remains: {reason}"
            )));
        }
        self.start_from(&rest, surface, Some((from, reason.to_string())), notify)
    }

    fn start_from(
        &mut self,
        tiers: &[BackendKind],
        surface: SurfaceDesc,
        mut failed: Option<(BackendKind, String)>,
        notify: NoticeSink<'_>,
    ) -> SublayResult<BackendKind> {
        for &kind in tiers {
            if let Some((from, reason)) = failed.take() {
                let notice = FallbackNotice::BackendDowngrade {
                    from,
                    to: kind,
                    reason,
                };
                tracing::warn!(%notice, "render backend fallback");
                notify(&notice);
            }
            match (self.factory)(kind, surface) {
                Ok(backend) => {
                    tracing::info!(backend = %kind, "render backend ready");
                    self.active = Some(backend);
                    return Ok(kind);
                }
                Err(e) => {
                    tracing::debug!(backend = %kind, error = %e, "render backend init failed");
                    failed = Some((kind, e.to_string()));
                }
            }
        }
        let reason = failed.map(|(_, r)| r).unwrap_or_default();
        Err(SublayError::initialization(format!(
            "no render backend could be initialized: {reason}"
        )))
    }

    pub fn surface(&self) -> Option<SurfaceDesc> {
        self.active.as_ref().map(|b| b.surface())
    }

    /// Resize the active tier. Resource exhaustion keeps the current surface instead of failing.
    pub fn resize(&mut self, width: u32, height: u32) -> SublayResult<()> {
        let Some(b) = self.active.as_mut() else {
            return Ok(());
        };
        match b.resize(width, height) {
            Err(SublayError::ResourceExhaustion(msg)) => {
                tracing::warn!(
                    backend = %b.kind(),
                    width,
                    height,
                    %msg,
                    "resize skipped: out of resources"
                );
                Ok(())
            }
            other => other,
        }
    }

    pub fn clear(&mut self) -> SublayResult<()> {
        match self.active.as_mut() {
            Some(b) => b.clear(),
            None => Ok(()),
        }
    }

    /// Draw on the active tier. Resource exhaustion skips the frame instead of failing.
    pub fn render(
        &mut self,
        compositions: &[Composition],
        params: &DrawParams,
    ) -> SublayResult<()> {
        let Some(b) = self.active.as_mut() else {
            return Ok(());
        };
        match b.render(compositions, params) {
            Err(SublayError::ResourceExhaustion(msg)) => {
                tracing::warn!(backend = %b.kind(), %msg, "skipping frame: out of resources");
                Ok(())
            }
            other => other,
        }
    }

    pub fn read_pixels(&mut self) -> SublayResult<FrameRGBA> {
        match self.active.as_mut() {
            Some(b) => b.read_pixels(),
            None => Err(SublayError::initialization("no active render backend")),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.active.as_ref().map_or(0, |b| b.slot_count())
    }

    pub fn destroy(&mut self) {
        if let Some(mut b) = self.active.take() {
            tracing::debug!(backend = %b.kind(), "destroying render backend");
            b.destroy();
        }
    }
}

impl Drop for BackendCascade {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/cascade.rs"]
mod tests;
