//! End-to-end pipeline scenarios over synthetic sources.

use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use splitgray::sink::{CollectSink, FrameSink};
use splitgray::{
    reconstruct, run_job, FileConfig, FileSource, FrameSource, OutputFormat, ProgressEvent,
    SessionError,
};

fn stub_source(frames: u64) -> FileSource {
    FileSource::open(FileConfig {
        path: "stub://clip".to_string(),
        frame_limit: Some(frames),
    })
    .expect("open stub source")
}

/// A sink handle the test can inspect after run_job has consumed the box.
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<CollectSink>>);

impl FrameSink for SharedSink {
    fn write_frame(&mut self, frame: &splitgray::Frame) -> anyhow::Result<()> {
        self.0.lock().unwrap().write_frame(frame)
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        self.0.lock().unwrap().finish()
    }
}

#[test]
fn ten_frames_reach_the_sink_in_order() {
    let mut source = stub_source(10);
    let info = source.video_info();
    let sink = SharedSink::default();
    let sink_handle = sink.clone();
    let (events, event_rx) = mpsc::channel();
    let cancel = AtomicBool::new(false);

    let summary = run_job(
        &mut source,
        info.fps,
        info.total_frames,
        move |format| {
            assert_eq!(
                format,
                OutputFormat {
                    width: 640,
                    height: 720,
                    fps: 30,
                }
            );
            Ok(Box::new(sink_handle))
        },
        &events,
        &cancel,
    )
    .expect("job succeeds");

    assert_eq!(summary.frames, 10);
    assert!(!summary.cancelled);

    let collected = sink.0.lock().unwrap();
    assert_eq!(collected.frames.len(), 10);
    assert!(collected.finished);

    // A second identical source gives the reference sequence; the sink must
    // hold exactly the reconstruction of each input frame, in input order.
    let mut reference = stub_source(10);
    for written in &collected.frames {
        let input = reference
            .next_frame()
            .expect("read reference frame")
            .expect("reference has as many frames");
        let expected = reconstruct(&input).expect("reference reconstruction");
        assert_eq!(written.data(), expected.data());
    }

    // Progress events covered every frame.
    let progress: Vec<_> = event_rx.try_iter().collect();
    let frame_events = progress
        .iter()
        .filter(|event| matches!(event, ProgressEvent::Frame { .. }))
        .count();
    assert_eq!(frame_events, 10);
}

#[test]
fn empty_source_fails_before_creating_output() {
    let mut source = FileSource::open(FileConfig {
        path: "stub://empty".to_string(),
        frame_limit: None,
    })
    .expect("open empty stub");
    let info = source.video_info();
    let (events, _event_rx) = mpsc::channel();
    let cancel = AtomicBool::new(false);

    let sink_created = Arc::new(AtomicBool::new(false));
    let flag = sink_created.clone();
    let result = run_job(
        &mut source,
        info.fps,
        info.total_frames,
        move |_format| {
            flag.store(true, std::sync::atomic::Ordering::Relaxed);
            Ok(Box::new(CollectSink::new()))
        },
        &events,
        &cancel,
    );

    assert!(matches!(result, Err(SessionError::FirstFrameReadFailure)));
    assert!(!sink_created.load(std::sync::atomic::Ordering::Relaxed));
}

#[test]
fn cancellation_stops_between_frames_and_finalizes() {
    let mut source = stub_source(50);
    let info = source.video_info();
    let sink = SharedSink::default();
    let sink_handle = sink.clone();
    let (events, _event_rx) = mpsc::channel();
    // Flag set before the loop starts: only the first frame goes through.
    let cancel = AtomicBool::new(true);

    let summary = run_job(
        &mut source,
        info.fps,
        info.total_frames,
        move |_format| Ok(Box::new(sink_handle)),
        &events,
        &cancel,
    )
    .expect("cancelled job still succeeds");

    assert!(summary.cancelled);
    assert_eq!(summary.frames, 1);
    let collected = sink.0.lock().unwrap();
    assert_eq!(collected.frames.len(), 1);
    assert!(collected.finished);
}

#[test]
fn finalize_failure_is_distinct_from_a_frame_write_failure() {
    struct TrailerFailsSink;

    impl FrameSink for TrailerFailsSink {
        fn write_frame(&mut self, _frame: &splitgray::Frame) -> anyhow::Result<()> {
            Ok(())
        }

        fn finish(&mut self) -> anyhow::Result<()> {
            anyhow::bail!("trailer write failed")
        }
    }

    let mut source = stub_source(3);
    let info = source.video_info();
    let (events, _event_rx) = mpsc::channel();
    let cancel = AtomicBool::new(false);

    let result = run_job(
        &mut source,
        info.fps,
        info.total_frames,
        |_format| Ok(Box::new(TrailerFailsSink)),
        &events,
        &cancel,
    );

    // Every frame was written; the error must name finalization, not a frame.
    match result {
        Err(SessionError::OutputFinalizeFailure { frames, message }) => {
            assert_eq!(frames, 3);
            assert!(message.contains("trailer write failed"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn writer_open_failure_is_reported_as_such() {
    let mut source = stub_source(5);
    let info = source.video_info();
    let (events, _event_rx) = mpsc::channel();
    let cancel = AtomicBool::new(false);

    let result = run_job(
        &mut source,
        info.fps,
        info.total_frames,
        |_format| anyhow::bail!("disk full"),
        &events,
        &cancel,
    );

    match result {
        Err(SessionError::OutputWriterOpenFailure(message)) => {
            assert!(message.contains("disk full"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
}
