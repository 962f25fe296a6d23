use std::cell::Cell;

use super::*;
use crate::foundation::core::Composition;

fn frame() -> Frame {
    Frame::new(8, 8, vec![Composition::new(0, 0, 1, 1, vec![1, 2, 3, 255])])
}

#[test]
fn concurrent_lookups_dispatch_once() {
    let mut cache = FrameCache::new();
    let calls = Cell::new(0u64);
    let dispatch = |_: usize| {
        calls.set(calls.get() + 1);
        Ok(RequestId(calls.get()))
    };

    assert!(matches!(
        cache.get_or_request(4, dispatch).unwrap(),
        FrameLookup::Pending
    ));
    assert!(matches!(
        cache.get_or_request(4, dispatch).unwrap(),
        FrameLookup::Pending
    ));
    assert_eq!(calls.get(), 1);
    assert_eq!(cache.pending_request(4), Some(RequestId(1)));

    assert!(cache.complete(4, RequestId(1), Some(frame())));
    assert_eq!(cache.pending_len(), 0);
    match cache.get_or_request(4, dispatch).unwrap() {
        FrameLookup::Ready(Some(f)) => assert_eq!(f.composition_count(), 1),
        other => panic!("expected a cached frame, got {other:?}"),
    }
    assert_eq!(calls.get(), 1);
}

#[test]
fn dispatch_errors_leave_no_pending_entry() {
    let mut cache = FrameCache::new();
    let res = cache.get_or_request(0, |_| {
        Err(crate::foundation::error::SublayError::timeout("late"))
    });
    assert!(res.is_err());
    assert_eq!(cache.pending_len(), 0);
}

#[test]
fn stale_completion_after_seek_is_cached_without_clearing_newer_request() {
    let mut cache = FrameCache::new();
    cache.get_or_request(2, |_| Ok(RequestId(1))).unwrap();
    cache.on_seek();
    cache.get_or_request(2, |_| Ok(RequestId(5))).unwrap();

    assert!(!cache.complete(2, RequestId(1), Some(frame())));
    assert_eq!(cache.pending_request(2), Some(RequestId(5)));
    assert!(matches!(cache.get(2), Some(Some(_))));

    assert!(cache.complete(2, RequestId(5), None));
    assert_eq!(cache.pending_len(), 0);
    assert!(matches!(cache.get(2), Some(None)));
}

#[test]
fn seek_clears_frames_and_pending() {
    let mut cache = FrameCache::new();
    cache.insert(0, Some(frame()));
    cache.get_or_request(1, |_| Ok(RequestId(1))).unwrap();
    cache.on_seek();
    assert!(cache.is_empty());
    assert_eq!(cache.pending_len(), 0);
}

#[test]
fn drop_pending_reports_indices() {
    let mut cache = FrameCache::new();
    cache.get_or_request(9, |_| Ok(RequestId(1))).unwrap();
    cache.get_or_request(3, |_| Ok(RequestId(2))).unwrap();
    assert_eq!(cache.drop_pending(), vec![3, 9]);
    assert_eq!(cache.pending_len(), 0);
}
