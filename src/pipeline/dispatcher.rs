use std::{
    collections::{HashMap, VecDeque},
    sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError},
    time::{Duration, Instant},
};

use crate::{
    decode::DecoderFactory,
    foundation::error::{SublayError, SublayResult},
    pipeline::{
        protocol::{Envelope, Reply, Request, RequestId, Response},
        worker::spawn_worker,
    },
};

pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug)]
struct Pending {
    deadline: Instant,
    request: &'static str,
}

/// Result of draining the reply channel.
///
/// `failure` is set when a reply carried an error, the worker disconnected, or a deadline passed.
/// Completions gathered before the failure are still returned.
#[derive(Debug, Default)]
pub struct PollOutcome {
    pub completed: Vec<(RequestId, Response)>,
    pub failure: Option<SublayError>,
}

/// Client half of the worker protocol.
///
/// Every request gets a fresh id and an entry in the pending table. Replies whose id is not pending
/// are dropped.
#[derive(Debug)]
pub struct Dispatcher {
    requests: Sender<Envelope<Request>>,
    replies: Receiver<Reply>,
    next_id: u64,
    pending: HashMap<RequestId, Pending>,
    stash: VecDeque<Reply>,
    timeout: Duration,
}

impl Dispatcher {
    /// Spawn the decode worker and connect to it.
    pub fn spawn(factory: DecoderFactory, timeout: Duration) -> SublayResult<Self> {
        let (tx, rx) = spawn_worker(factory)?;
        Ok(Self::from_channels(tx, rx, timeout))
    }

    pub fn from_channels(
        requests: Sender<Envelope<Request>>,
        replies: Receiver<Reply>,
        timeout: Duration,
    ) -> Self {
        Self {
            requests,
            replies,
            next_id: 0,
            pending: HashMap::new(),
            stash: VecDeque::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Send without waiting. The reply surfaces through [`Dispatcher::poll`].
    pub fn dispatch(&mut self, request: Request) -> SublayResult<RequestId> {
        self.dispatch_at(request, Instant::now())
    }

    pub fn dispatch_at(&mut self, request: Request, now: Instant) -> SublayResult<RequestId> {
        self.next_id += 1;
        let id = RequestId(self.next_id);
        let name = request.name();
        self.requests
            .send(Envelope { id, body: request })
            .map_err(|_| SublayError::initialization("decode worker is gone"))?;
        self.pending.insert(
            id,
            Pending {
                deadline: now + self.timeout,
                request: name,
            },
        );
        tracing::trace!(%id, request = name, "dispatched");
        Ok(id)
    }

    /// Drain available replies, then expire pending requests whose deadline is at or before `now`.
    pub fn poll(&mut self, now: Instant) -> PollOutcome {
        let mut out = PollOutcome::default();
        while let Some(reply) = self.stash.pop_front() {
            self.route(reply, &mut out);
        }
        loop {
            match self.replies.try_recv() {
                Ok(reply) => self.route(reply, &mut out),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    out.failure.get_or_insert_with(|| {
                        SublayError::initialization("decode worker disconnected")
                    });
                    self.pending.clear();
                    return out;
                }
            }
        }
        if let Some((id, p)) = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .min_by_key(|(id, _)| **id)
            .map(|(id, p)| (*id, *p))
        {
            self.pending.retain(|_, p| p.deadline > now);
            out.failure.get_or_insert_with(|| {
                SublayError::timeout(format!(
                    "{} request {id} got no reply within {:?}",
                    p.request, self.timeout
                ))
            });
        }
        out
    }

    /// Dispatch and block for the matching reply. Other replies that arrive meanwhile are kept
    /// for the next [`Dispatcher::poll`].
    pub fn call(&mut self, request: Request) -> SublayResult<Response> {
        let id = self.dispatch(request)?;
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.replies.recv_timeout(remaining) {
                Ok(reply) if reply.id == id => {
                    self.pending.remove(&id);
                    return reply.body.map_err(SublayError::decode);
                }
                Ok(reply) => self.stash.push_back(reply),
                Err(RecvTimeoutError::Timeout) => {
                    self.pending.remove(&id);
                    return Err(SublayError::timeout(format!(
                        "request {id} got no reply within {:?}",
                        self.timeout
                    )));
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.pending.clear();
                    return Err(SublayError::initialization("decode worker disconnected"));
                }
            }
        }
    }

    /// Forget every outstanding request so late replies are dropped.
    pub fn forget_pending(&mut self) {
        self.pending.clear();
        self.stash.clear();
    }

    fn route(&mut self, reply: Reply, out: &mut PollOutcome) {
        let Some(p) = self.pending.remove(&reply.id) else {
            tracing::debug!(id = %reply.id, "dropping reply with no pending request");
            return;
        };
        match reply.body {
            Ok(resp) => out.completed.push((reply.id, resp)),
            Err(msg) => {
                out.failure.get_or_insert_with(|| {
                    SublayError::decode(format!("{} request {} failed: {msg}", p.request, reply.id))
                });
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/dispatcher.rs"]
mod tests;
