/// Client side of the worker protocol: ids, pending table, deadlines.
pub mod dispatcher;
/// Decoded frames keyed by index, with one in-flight request per index.
pub mod frame_cache;
/// Request and response messages.
pub mod protocol;
/// Background-or-inline decode service.
pub mod service;
/// The decode thread.
pub mod worker;
