use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use super::*;
use crate::foundation::core::Composition;

#[derive(Clone, Default)]
struct Script {
    stall: Duration,
    fail_first_builds: usize,
    /// Only the first build succeeds.
    fail_after_first_build: bool,
}

struct Scripted {
    timestamps: Vec<f64>,
    stall: Duration,
}

impl SubtitleDecoder for Scripted {
    fn load(&mut self, _source: &SubtitleSource) -> SublayResult<usize> {
        self.timestamps = vec![100.0, 500.0, 900.0];
        Ok(self.timestamps.len())
    }

    fn timestamps(&self) -> Vec<f64> {
        self.timestamps.clone()
    }

    fn render_at(&mut self, index: usize) -> SublayResult<Option<Frame>> {
        std::thread::sleep(self.stall);
        if index >= self.timestamps.len() {
            return Ok(None);
        }
        Ok(Some(Frame::new(
            64,
            32,
            vec![
                Composition::new(index as u32, 0, 1, 1, vec![255, 0, 0, 255]),
                Composition::new(0, 0, 2, 2, vec![1, 2, 3]),
            ],
        )))
    }

    fn clear_cache(&mut self) {}

    fn dispose(&mut self) {
        self.timestamps.clear();
    }
}

fn factory(script: Script, builds: Arc<AtomicUsize>) -> DecoderFactory {
    Arc::new(move || {
        let n = builds.fetch_add(1, Ordering::SeqCst);
        if n < script.fail_first_builds || (script.fail_after_first_build && n > 0) {
            return Err(SublayError::initialization("decoder module failed to load"));
        }
        Ok(Box::new(Scripted {
            timestamps: Vec::new(),
            stall: script.stall,
        }) as Box<dyn SubtitleDecoder>)
    })
}

fn pgs() -> SubtitleSource {
    SubtitleSource::Pgs {
        data: Arc::from(vec![0u8; 16]),
    }
}

fn opts(use_background: bool, timeout_ms: u64) -> PipelineOpts {
    PipelineOpts {
        use_background,
        dispatch_timeout: Duration::from_millis(timeout_ms),
        ..PipelineOpts::default()
    }
}

/// Poll until `done` holds or two seconds pass.
fn settle(
    p: &mut FramePipeline,
    notices: &Mutex<Vec<FallbackNotice>>,
    mut done: impl FnMut(&mut FramePipeline, &PollReport) -> bool,
) -> bool {
    for _ in 0..400 {
        let report = p.poll(Instant::now(), &mut |n| notices.lock().unwrap().push(n.clone()));
        if done(p, &report) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn inline_mode_decodes_on_demand() {
    let builds = Arc::new(AtomicUsize::new(0));
    let mut p = FramePipeline::new(factory(Script::default(), builds.clone()), opts(false, 1000));
    let mut notices = Vec::new();
    let mut sink = |n: &FallbackNotice| notices.push(n.clone());

    assert_eq!(p.load(pgs(), &mut sink).unwrap(), 3);
    assert!(!p.background_active());
    assert_eq!(p.timestamps(), &[100.0, 500.0, 900.0]);
    assert_eq!(p.current_index(450.0, &mut sink), Some(0));

    match p.frame(1, &mut sink) {
        FrameLookup::Ready(Some(frame)) => {
            assert_eq!(frame.composition_count(), 1, "malformed composition dropped");
            assert_eq!(frame.compositions[0].x, 1);
        }
        other => panic!("expected a frame, got {other:?}"),
    }
    assert!(matches!(p.frame(7, &mut sink), FrameLookup::Ready(None)));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    drop(sink);
    assert!(notices.is_empty());
}

#[test]
fn background_frames_arrive_through_poll() {
    let builds = Arc::new(AtomicUsize::new(0));
    let notices = Mutex::new(Vec::new());
    let mut p = FramePipeline::new(factory(Script::default(), builds), opts(true, 5000));

    let count = p
        .load(pgs(), &mut |n| notices.lock().unwrap().push(n.clone()))
        .unwrap();
    assert_eq!(count, 3);
    assert!(p.background_active());

    let mut sink = |n: &FallbackNotice| notices.lock().unwrap().push(n.clone());
    assert!(matches!(p.frame(2, &mut sink), FrameLookup::Pending));
    assert!(matches!(p.frame(2, &mut sink), FrameLookup::Pending));
    assert_eq!(p.frame_cache().pending_len(), 1);

    assert!(settle(&mut p, &notices, |_, r| r.frames.contains(&2)));
    match p.frame(2, &mut |_| {}) {
        FrameLookup::Ready(Some(frame)) => assert_eq!(frame.composition_count(), 1),
        other => panic!("expected a frame, got {other:?}"),
    }
    assert!(notices.lock().unwrap().is_empty());
    p.dispose();
    assert!(!p.background_active());
}

#[test]
fn worker_init_failure_falls_back_inline_with_one_notice() {
    let builds = Arc::new(AtomicUsize::new(0));
    let script = Script {
        fail_first_builds: 1,
        ..Script::default()
    };
    let mut p = FramePipeline::new(factory(script, builds.clone()), opts(true, 2000));
    let mut notices = Vec::new();
    let mut sink = |n: &FallbackNotice| notices.push(n.clone());

    assert_eq!(p.load(pgs(), &mut sink).unwrap(), 3);
    assert!(!p.background_active());
    assert!(matches!(p.frame(0, &mut sink), FrameLookup::Ready(Some(_))));
    drop(sink);
    assert_eq!(notices.len(), 1);
    assert!(matches!(notices[0], FallbackNotice::BackgroundDisabled { .. }));
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn timeout_disables_background_for_good() {
    let builds = Arc::new(AtomicUsize::new(0));
    let script = Script {
        stall: Duration::from_millis(600),
        ..Script::default()
    };
    let notices = Mutex::new(Vec::new());
    let mut p = FramePipeline::new(factory(script, builds), opts(true, 100));
    p.load(pgs(), &mut |n| notices.lock().unwrap().push(n.clone()))
        .unwrap();
    assert!(p.background_active());

    assert!(matches!(p.frame(0, &mut |_| {}), FrameLookup::Pending));
    assert!(settle(&mut p, &notices, |p, _| !p.background_active()));
    assert_eq!(p.frame_cache().pending_len(), 0);

    let mut sink = |n: &FallbackNotice| notices.lock().unwrap().push(n.clone());
    assert!(matches!(p.frame(0, &mut sink), FrameLookup::Ready(Some(_))));
    p.start(&mut sink);
    assert!(!p.background_active());

    let notices = notices.into_inner().unwrap();
    assert_eq!(notices.len(), 1);
    match &notices[0] {
        FallbackNotice::BackgroundDisabled { reason } => assert!(reason.contains("no reply")),
        other => panic!("unexpected notice {other:?}"),
    }
}

#[test]
fn stateful_lookups_resolve_remotely() {
    let builds = Arc::new(AtomicUsize::new(0));
    let notices = Mutex::new(Vec::new());
    let mut p = FramePipeline::new(factory(Script::default(), builds), opts(true, 5000));
    let source = SubtitleSource::VobSubOnly {
        sub: Arc::from(vec![0u8; 8]),
    };
    p.load(source, &mut |_| {}).unwrap();
    assert_eq!(p.format(), Some(SubtitleFormat::VobSub));

    assert_eq!(p.current_index(600.0, &mut |_| {}), None);
    assert!(settle(&mut p, &notices, |_, r| r.index_resolved));
    assert_eq!(p.current_index(605.0, &mut |_| {}), Some(1));
    assert_eq!(p.index_at(950.0, &mut |_| {}).unwrap(), Some(2));
    assert!(notices.lock().unwrap().is_empty());
}

#[test]
fn failed_inline_decoder_is_not_rebuilt_until_reload() {
    let builds = Arc::new(AtomicUsize::new(0));
    let script = Script {
        stall: Duration::from_millis(600),
        fail_after_first_build: true,
        ..Script::default()
    };
    let notices = Mutex::new(Vec::new());
    let mut p = FramePipeline::new(factory(script, builds.clone()), opts(true, 100));
    let source = SubtitleSource::VobSubOnly {
        sub: Arc::from(vec![0u8; 8]),
    };
    p.load(source.clone(), &mut |_| {}).unwrap();
    assert!(p.background_active());

    assert!(matches!(p.frame(0, &mut |_| {}), FrameLookup::Pending));
    assert!(settle(&mut p, &notices, |p, _| !p.background_active()));

    for _ in 0..50 {
        assert_eq!(p.current_index(450.0, &mut |_| {}), Some(0));
    }
    assert!(matches!(p.frame(1, &mut |_| {}), FrameLookup::Ready(None)));
    assert_eq!(builds.load(Ordering::SeqCst), 2);
    assert_eq!(notices.lock().unwrap().len(), 1);

    assert!(p.load(source, &mut |_| {}).is_err());
    assert_eq!(builds.load(Ordering::SeqCst), 3);
}

#[test]
fn seek_forgets_frames_but_reload_keeps_working() {
    let builds = Arc::new(AtomicUsize::new(0));
    let mut p = FramePipeline::new(factory(Script::default(), builds), opts(false, 1000));
    p.load(pgs(), &mut |_| {}).unwrap();
    p.frame(0, &mut |_| {});
    assert_eq!(p.frame_cache().len(), 1);
    p.on_seek();
    assert!(p.frame_cache().is_empty());

    assert!(p.frame_blocking(1, &mut |_| {}).unwrap().is_some());
    p.clear_cache(&mut |_| {});
    assert!(p.frame_cache().is_empty());

    assert_eq!(p.load(pgs(), &mut |_| {}).unwrap(), 3);
    assert_eq!(p.count(), 3);
}
