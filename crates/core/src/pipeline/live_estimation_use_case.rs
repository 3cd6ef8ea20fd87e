use std::time::{Duration, Instant};

use crate::shared::constants::DEFAULT_RETRY_BACKOFF;
use crate::video::domain::frame_display::{DisplayControl, FrameDisplay};
use crate::video::domain::frame_source::FrameSource;

use super::estimate_frame_use_case::{elapsed_ms, EstimateFrameUseCase};
use super::pipeline_logger::PipelineLogger;

/// Longest single sleep while waiting out a backoff, so a stop request is
/// seen promptly.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoopSettings {
    /// Wait after the source was unavailable or a read failed.
    pub retry_backoff: Duration,
    /// Stop after this many processed frames. `None` runs until the source
    /// is exhausted or a stop is requested.
    pub max_frames: Option<usize>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            max_frames: None,
        }
    }
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    Exhausted,
    StopRequested,
    FrameLimit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionReport {
    pub frames: usize,
    pub faces: usize,
    pub faults: usize,
    pub capture_retries: usize,
    pub end: SessionEnd,
}

/// Drives capture → estimate → display, one frame at a time, until the
/// source runs dry, the user stops it, or the frame limit is hit.
///
/// Capture problems other than end-of-stream never end the session: the
/// loop waits `retry_backoff` and reads again. Source and display are
/// released on every exit path.
pub struct LiveEstimationUseCase {
    source: Box<dyn FrameSource>,
    display: Box<dyn FrameDisplay>,
    estimator: EstimateFrameUseCase,
    settings: LoopSettings,
}

impl LiveEstimationUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        display: Box<dyn FrameDisplay>,
        estimator: EstimateFrameUseCase,
        settings: LoopSettings,
    ) -> Self {
        Self {
            source,
            display,
            estimator,
            settings,
        }
    }

    pub fn run(&mut self, logger: &mut dyn PipelineLogger) -> SessionReport {
        let mut report = SessionReport {
            frames: 0,
            faces: 0,
            faults: 0,
            capture_retries: 0,
            end: SessionEnd::Exhausted,
        };

        let end = loop {
            if self.display.stop_requested() {
                break SessionEnd::StopRequested;
            }
            if self
                .settings
                .max_frames
                .is_some_and(|limit| report.frames >= limit)
            {
                break SessionEnd::FrameLimit;
            }

            let frame = match self.source.read() {
                Ok(frame) => frame,
                Err(e) if !e.is_retryable() => break SessionEnd::Exhausted,
                Err(e) => {
                    log::warn!(
                        "{e}; retrying in {:.1}s",
                        self.settings.retry_backoff.as_secs_f64()
                    );
                    logger.fault("capture");
                    report.capture_retries += 1;
                    self.wait_backoff();
                    continue;
                }
            };

            let index = frame.index();
            let estimate = self.estimator.process(frame, logger);
            report.frames += 1;
            report.faces += estimate.faces.len();
            report.faults += estimate.faults.len();
            logger.frame(index);

            let t0 = Instant::now();
            let control = self.display.show(&estimate.frame);
            logger.timing("display", elapsed_ms(t0));
            match control {
                Ok(DisplayControl::Continue) => {}
                Ok(DisplayControl::Stop) => break SessionEnd::StopRequested,
                Err(e) => {
                    log::warn!("Frame {index}: display failed: {e}");
                    logger.fault("display");
                    report.faults += 1;
                }
            }
        };
        report.end = end;

        self.source.release();
        self.display.close();
        logger.info(&format!(
            "Session ended ({:?}): {} frames, {} faces, {} faults",
            report.end, report.frames, report.faces, report.faults
        ));
        logger.summary();
        report
    }

    fn wait_backoff(&self) {
        let deadline = Instant::now() + self.settings.retry_backoff;
        loop {
            if self.display.stop_requested() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            std::thread::sleep((deadline - now).min(STOP_POLL_INTERVAL));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cropping::domain::region_extractor::RegionExtractor;
    use crate::pipeline::estimate_frame_use_case::tests::{
        make_frame, RecordingAnnotator, StubDetector, StubLabelLog, StubPredictor,
    };
    use crate::pipeline::pipeline_logger::{NullPipelineLogger, StdoutPipelineLogger};
    use crate::shared::frame::Frame;
    use crate::shared::region::Region;
    use crate::video::domain::frame_source::CaptureError;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    // --- Stubs ---

    /// Replays a scripted sequence of reads, then reports exhaustion.
    struct ScriptedSource {
        script: VecDeque<Result<Frame, CaptureError>>,
        reads: Arc<Mutex<usize>>,
        released: Arc<Mutex<bool>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Frame, CaptureError>>) -> Self {
            Self {
                script: script.into(),
                reads: Arc::new(Mutex::new(0)),
                released: Arc::new(Mutex::new(false)),
            }
        }

        fn frames(n: usize) -> Self {
            Self::new((0..n).map(|i| Ok(make_frame(i))).collect())
        }
    }

    impl FrameSource for ScriptedSource {
        fn read(&mut self) -> Result<Frame, CaptureError> {
            *self.reads.lock().unwrap() += 1;
            self.script.pop_front().unwrap_or(Err(CaptureError::Exhausted))
        }

        fn release(&mut self) {
            *self.released.lock().unwrap() = true;
        }
    }

    /// Never runs out of frames.
    struct EndlessSource {
        next: usize,
    }

    impl FrameSource for EndlessSource {
        fn read(&mut self) -> Result<Frame, CaptureError> {
            self.next += 1;
            Ok(make_frame(self.next - 1))
        }

        fn release(&mut self) {}
    }

    struct StubDisplay {
        shown: Arc<Mutex<Vec<usize>>>,
        closed: Arc<Mutex<bool>>,
        stop: Arc<AtomicBool>,
        /// Answer `Stop` once this many frames were shown.
        stop_after: Option<usize>,
    }

    impl StubDisplay {
        fn new() -> Self {
            Self {
                shown: Arc::new(Mutex::new(Vec::new())),
                closed: Arc::new(Mutex::new(false)),
                stop: Arc::new(AtomicBool::new(false)),
                stop_after: None,
            }
        }
    }

    impl FrameDisplay for StubDisplay {
        fn show(&mut self, frame: &Frame) -> Result<DisplayControl, Box<dyn std::error::Error>> {
            let mut shown = self.shown.lock().unwrap();
            shown.push(frame.index());
            if self.stop_after.is_some_and(|n| shown.len() >= n) {
                return Ok(DisplayControl::Stop);
            }
            Ok(DisplayControl::Continue)
        }

        fn stop_requested(&self) -> bool {
            self.stop.load(Ordering::SeqCst)
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    struct FailingDisplay;

    impl FrameDisplay for FailingDisplay {
        fn show(&mut self, _frame: &Frame) -> Result<DisplayControl, Box<dyn std::error::Error>> {
            Err("window gone".into())
        }

        fn stop_requested(&self) -> bool {
            false
        }

        fn close(&mut self) {}
    }

    // --- Helpers ---

    fn estimator(regions: Vec<Region>) -> EstimateFrameUseCase {
        EstimateFrameUseCase::new(
            Box::new(StubDetector::new(regions)),
            Box::new(StubPredictor::new(vec![30])),
            RegionExtractor::default(),
            Box::new(RecordingAnnotator::new()),
            Box::new(StubLabelLog::new()),
        )
    }

    fn no_wait() -> LoopSettings {
        LoopSettings {
            retry_backoff: Duration::ZERO,
            max_frames: None,
        }
    }

    fn one_face() -> Vec<Region> {
        vec![Region::new(50, 40, 40, 40)]
    }

    // --- Tests ---

    #[test]
    fn test_runs_until_exhausted() {
        let source = ScriptedSource::frames(4);
        let released = source.released.clone();
        let display = StubDisplay::new();
        let shown = display.shown.clone();
        let closed = display.closed.clone();

        let mut uc = LiveEstimationUseCase::new(
            Box::new(source),
            Box::new(display),
            estimator(one_face()),
            no_wait(),
        );
        let report = uc.run(&mut NullPipelineLogger);

        assert_eq!(report.end, SessionEnd::Exhausted);
        assert_eq!(report.frames, 4);
        assert_eq!(report.faces, 4);
        assert_eq!(report.faults, 0);
        assert_eq!(*shown.lock().unwrap(), vec![0, 1, 2, 3]);
        assert!(*released.lock().unwrap());
        assert!(*closed.lock().unwrap());
    }

    #[test]
    fn test_frames_without_faces_still_displayed() {
        let display = StubDisplay::new();
        let shown = display.shown.clone();
        let mut uc = LiveEstimationUseCase::new(
            Box::new(ScriptedSource::frames(3)),
            Box::new(display),
            estimator(vec![]),
            no_wait(),
        );
        let report = uc.run(&mut NullPipelineLogger);

        assert_eq!(report.faces, 0);
        assert_eq!(shown.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_read_failure_does_not_end_loop() {
        let source = ScriptedSource::new(vec![
            Ok(make_frame(0)),
            Err(CaptureError::ReadFailed("connection reset".into())),
            Ok(make_frame(1)),
        ]);
        let display = StubDisplay::new();
        let shown = display.shown.clone();

        let mut uc = LiveEstimationUseCase::new(
            Box::new(source),
            Box::new(display),
            estimator(one_face()),
            no_wait(),
        );
        let report = uc.run(&mut NullPipelineLogger);

        assert_eq!(report.end, SessionEnd::Exhausted);
        assert_eq!(report.capture_retries, 1);
        assert_eq!(*shown.lock().unwrap(), vec![0, 1]);
    }

    #[test]
    fn test_unavailable_source_retried_after_backoff() {
        let source = ScriptedSource::new(vec![
            Err(CaptureError::Unavailable("not open".into())),
            Err(CaptureError::Unavailable("not open".into())),
            Ok(make_frame(0)),
        ]);
        let reads = source.reads.clone();
        let settings = LoopSettings {
            retry_backoff: Duration::from_millis(20),
            max_frames: None,
        };

        let mut logger = StdoutPipelineLogger::new(10);
        let start = Instant::now();
        let mut uc = LiveEstimationUseCase::new(
            Box::new(source),
            Box::new(StubDisplay::new()),
            estimator(vec![]),
            settings,
        );
        let report = uc.run(&mut logger);

        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(report.frames, 1);
        assert_eq!(report.capture_retries, 2);
        assert_eq!(logger.fault_count("capture"), 2);
        // two failures, one frame, one exhausted
        assert_eq!(*reads.lock().unwrap(), 4);
    }

    #[test]
    fn test_stop_flag_checked_before_read() {
        let source = ScriptedSource::frames(5);
        let reads = source.reads.clone();
        let display = StubDisplay::new();
        display.stop.store(true, Ordering::SeqCst);

        let mut uc = LiveEstimationUseCase::new(
            Box::new(source),
            Box::new(display),
            estimator(one_face()),
            no_wait(),
        );
        let report = uc.run(&mut NullPipelineLogger);

        assert_eq!(report.end, SessionEnd::StopRequested);
        assert_eq!(report.frames, 0);
        assert_eq!(*reads.lock().unwrap(), 0);
    }

    #[test]
    fn test_stop_from_display() {
        let mut display = StubDisplay::new();
        display.stop_after = Some(2);
        let closed = display.closed.clone();

        let mut uc = LiveEstimationUseCase::new(
            Box::new(EndlessSource { next: 0 }),
            Box::new(display),
            estimator(one_face()),
            no_wait(),
        );
        let report = uc.run(&mut NullPipelineLogger);

        assert_eq!(report.end, SessionEnd::StopRequested);
        assert_eq!(report.frames, 2);
        assert!(*closed.lock().unwrap());
    }

    #[test]
    fn test_stop_interrupts_backoff() {
        let source = ScriptedSource::new(vec![Err(CaptureError::Unavailable("down".into()))]);
        let display = StubDisplay::new();
        let stop = display.stop.clone();
        let settings = LoopSettings {
            retry_backoff: Duration::from_secs(30),
            max_frames: None,
        };

        let raiser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            stop.store(true, Ordering::SeqCst);
        });

        let start = Instant::now();
        let mut uc = LiveEstimationUseCase::new(
            Box::new(source),
            Box::new(display),
            estimator(vec![]),
            settings,
        );
        let report = uc.run(&mut NullPipelineLogger);
        raiser.join().unwrap();

        assert_eq!(report.end, SessionEnd::StopRequested);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_frame_limit() {
        let settings = LoopSettings {
            retry_backoff: Duration::ZERO,
            max_frames: Some(3),
        };
        let mut uc = LiveEstimationUseCase::new(
            Box::new(EndlessSource { next: 0 }),
            Box::new(StubDisplay::new()),
            estimator(one_face()),
            settings,
        );
        let report = uc.run(&mut NullPipelineLogger);

        assert_eq!(report.end, SessionEnd::FrameLimit);
        assert_eq!(report.frames, 3);
    }

    #[test]
    fn test_display_failure_does_not_end_loop() {
        let mut uc = LiveEstimationUseCase::new(
            Box::new(ScriptedSource::frames(3)),
            Box::new(FailingDisplay),
            estimator(vec![]),
            no_wait(),
        );
        let report = uc.run(&mut NullPipelineLogger);

        assert_eq!(report.end, SessionEnd::Exhausted);
        assert_eq!(report.frames, 3);
        assert_eq!(report.faults, 3);
    }

    #[test]
    fn test_logger_sees_every_frame_and_display_timing() {
        let mut logger = StdoutPipelineLogger::new(10);
        let mut uc = LiveEstimationUseCase::new(
            Box::new(ScriptedSource::frames(3)),
            Box::new(StubDisplay::new()),
            estimator(one_face()),
            no_wait(),
        );
        uc.run(&mut logger);

        assert_eq!(logger.frames(), 3);
        assert_eq!(logger.timings_for("display").map(|t| t.len()), Some(3));
        assert_eq!(logger.metrics_for("faces").unwrap(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_default_settings() {
        let settings = LoopSettings::default();
        assert_eq!(settings.retry_backoff, Duration::from_secs(5));
        assert_eq!(settings.max_frames, None);
    }
}
