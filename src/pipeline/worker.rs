use std::sync::mpsc::{self, Receiver, Sender};

use crate::{
    decode::{DecoderFactory, SubtitleDecoder},
    foundation::error::{SublayError, SublayResult},
    pipeline::protocol::{Envelope, Reply, Request, Response},
};

pub const WORKER_THREAD_NAME: &str = "sublay-decode";

/// Start a detached decode thread. The thread exits on `Dispose` or when the request sender drops.
///
/// A panic inside the decoder drops the reply sender, which the dispatcher sees as a disconnect.
pub fn spawn_worker(
    factory: DecoderFactory,
) -> SublayResult<(Sender<Envelope<Request>>, Receiver<Reply>)> {
    let (req_tx, req_rx) = mpsc::channel::<Envelope<Request>>();
    let (reply_tx, reply_rx) = mpsc::channel::<Reply>();
    std::thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || run(factory, req_rx, reply_tx))
        .map_err(|e| SublayError::initialization(format!("spawn decode worker: {e}")))?;
    Ok((req_tx, reply_rx))
}

fn run(factory: DecoderFactory, requests: Receiver<Envelope<Request>>, replies: Sender<Reply>) {
    let mut decoder: Option<Box<dyn SubtitleDecoder>> = None;
    while let Ok(Envelope { id, body }) = requests.recv() {
        let stop = matches!(body, Request::Dispose);
        let name = body.name();
        let result = handle(&factory, &mut decoder, body).map_err(|e| e.to_string());
        if let Err(msg) = &result {
            tracing::debug!(%id, request = name, error = %msg, "worker request failed");
        }
        if replies.send(Envelope { id, body: result }).is_err() || stop {
            break;
        }
    }
    tracing::debug!("decode worker exiting");
}

fn handle(
    factory: &DecoderFactory,
    decoder: &mut Option<Box<dyn SubtitleDecoder>>,
    req: Request,
) -> SublayResult<Response> {
    if let Request::Init = req {
        if decoder.is_none() {
            *decoder = Some(factory()?);
        }
        return Ok(Response::Ready);
    }
    let Some(dec) = decoder.as_mut() else {
        return Err(SublayError::initialization("decode worker was not initialized"));
    };
    Ok(match req {
        Request::Init => Response::Ready,
        Request::Load(source) => Response::Loaded {
            count: dec.load(&source)?,
        },
        Request::RenderAtIndex(index) => Response::Frame {
            index,
            frame: dec.render_at(index)?,
        },
        Request::FindIndex { time_ms } => Response::Index {
            time_ms,
            index: dec.find_index(time_ms),
        },
        Request::GetTimestamps => Response::Timestamps(dec.timestamps()),
        Request::ClearCache => {
            dec.clear_cache();
            Response::CacheCleared
        }
        Request::Dispose => {
            dec.dispose();
            Response::Disposed
        }
    })
}
