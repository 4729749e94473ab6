//! Fixed-interval detection scheduler
//!
//! A single worker thread ticks at a fixed interval. Each tick runs the main
//! bar cycle and then the buffer bar cycle. A tick that arrives while a
//! cycle is still in flight is dropped, never queued.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::bar::{BarId, BarState, DetectionRegion};
use super::engine::{DetectionEngine, ResultSink};
use super::DetectionError;
use crate::vision::ColorSignature;

/// Default polling interval
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Shortest interval the worker accepts
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Scheduler state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No cycle in flight
    Idle,
    /// A cycle is running; ticks are dropped
    Detecting,
}

/// What happened to a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Both bar cycles ran; `emitted` results reached the sink
    Completed { emitted: usize },
    /// A cycle was already in flight
    Skipped,
}

/// Counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub completed_ticks: u64,
    pub skipped_ticks: u64,
    pub failed_cycles: u64,
}

struct Shared {
    engine: Mutex<DetectionEngine>,
    sink: Arc<dyn ResultSink>,
    detecting: AtomicBool,
    completed_ticks: AtomicU64,
    skipped_ticks: AtomicU64,
    failed_cycles: AtomicU64,
}

/// Puts the scheduler back to Idle when a tick ends, however it ends
struct DetectingGuard<'a>(&'a AtomicBool);

impl Drop for DetectingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Shared {
    fn tick(&self) -> TickOutcome {
        if self
            .detecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("Previous detection still running, dropping tick");
            self.skipped_ticks.fetch_add(1, Ordering::Relaxed);
            return TickOutcome::Skipped;
        }
        let _detecting = DetectingGuard(&self.detecting);
        let mut emitted = 0;

        for bar in BarId::ALL {
            match self.run_bar(bar) {
                Ok(()) => emitted += 1,
                Err(e) => {
                    self.failed_cycles.fetch_add(1, Ordering::Relaxed);
                    if matches!(e, DetectionError::Panicked(_)) {
                        log::error!("Error detecting {}: {}", bar, e);
                    } else {
                        log::warn!("Skipping {} this cycle: {}", bar, e);
                    }
                }
            }
        }

        self.completed_ticks.fetch_add(1, Ordering::Relaxed);
        TickOutcome::Completed { emitted }
    }

    /// Run one bar cycle and hand the result to the sink, containing panics.
    ///
    /// The engine lock is released before the sink runs, so a sink may call
    /// back into the scheduler.
    fn run_bar(&self, bar: BarId) -> Result<(), DetectionError> {
        catch_unwind(AssertUnwindSafe(|| -> Result<(), DetectionError> {
            let result = {
                let mut engine = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
                engine.run_cycle(bar)?
            };
            self.sink.on_result(bar, result);
            Ok(())
        }))
        .unwrap_or_else(|payload| Err(DetectionError::Panicked(panic_message(payload.as_ref()))))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Drives [`DetectionEngine`] cycles on a dedicated thread
pub struct DetectionScheduler {
    shared: Arc<Shared>,
    interval: Duration,
    worker: Mutex<Option<Worker>>,
}

impl DetectionScheduler {
    /// Create a stopped scheduler
    pub fn new(engine: DetectionEngine, sink: Arc<dyn ResultSink>, interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                engine: Mutex::new(engine),
                sink,
                detecting: AtomicBool::new(false),
                completed_ticks: AtomicU64::new(0),
                skipped_ticks: AtomicU64::new(0),
                failed_cycles: AtomicU64::new(0),
            }),
            interval: interval.max(MIN_INTERVAL),
            worker: Mutex::new(None),
        }
    }

    /// Polling interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking. Returns `false` if it was already started.
    pub fn start(&self) -> std::io::Result<bool> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() {
            return Ok(false);
        }

        let (stop, stop_rx) = mpsc::channel();
        let shared = Arc::clone(&self.shared);
        let interval = self.interval;
        let handle = thread::Builder::new()
            .name("hp-detection".to_string())
            .spawn(move || run_worker(&shared, interval, &stop_rx))?;

        *worker = Some(Worker { stop, handle });
        log::info!("HP detection started ({} ms interval)", interval.as_millis());
        Ok(true)
    }

    /// Stop ticking. A cycle already in flight finishes on its own. Returns
    /// `false` if it was already stopped.
    pub fn stop(&self) -> bool {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(Worker { stop, handle }) = worker else {
            return false;
        };

        // The worker may already have exited; either way it is done ticking
        let _ = stop.send(());
        if handle.is_finished() {
            log::debug!("HP detection worker had already exited");
        }
        log::info!("HP detection stopped");
        true
    }

    /// Check if the worker is started
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Current state
    pub fn state(&self) -> SchedulerState {
        if self.shared.detecting.load(Ordering::SeqCst) {
            SchedulerState::Detecting
        } else {
            SchedulerState::Idle
        }
    }

    /// Run one tick on the calling thread
    pub fn tick(&self) -> TickOutcome {
        self.shared.tick()
    }

    /// Diagnostic counters
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            completed_ticks: self.shared.completed_ticks.load(Ordering::Relaxed),
            skipped_ticks: self.shared.skipped_ticks.load(Ordering::Relaxed),
            failed_cycles: self.shared.failed_cycles.load(Ordering::Relaxed),
        }
    }

    /// Snapshot of a bar's state. Waits for an in-flight cycle.
    pub fn bar_state(&self, bar: BarId) -> BarState {
        self.with_engine(|engine| engine.bar_state(bar).clone())
    }

    /// Move the main bar region. Waits for an in-flight cycle.
    pub fn set_main_region(&self, region: DetectionRegion) {
        self.with_engine(|engine| engine.set_region(BarId::Main, region));
    }

    /// Replace the scan signature. Waits for an in-flight cycle.
    pub fn set_signature(&self, signature: ColorSignature) {
        self.with_engine(|engine| engine.set_signature(signature));
    }

    fn with_engine<R>(&self, f: impl FnOnce(&mut DetectionEngine) -> R) -> R {
        let mut engine = self
            .shared
            .engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut engine)
    }
}

impl Drop for DetectionScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(shared: &Shared, interval: Duration, stop: &mpsc::Receiver<()>) {
    let mut next = Instant::now() + interval;
    loop {
        let wait = next.saturating_duration_since(Instant::now());
        match stop.recv_timeout(wait) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        shared.tick();

        next += interval;
        let now = Instant::now();
        if next <= now {
            let behind = now - next;
            let missed = (behind.as_nanos() / interval.as_nanos()) as u32 + 1;
            log::warn!(
                "Detection cycle overran the {} ms interval, dropping {} tick(s)",
                interval.as_millis(),
                missed
            );
            shared.skipped_ticks.fetch_add(u64::from(missed), Ordering::Relaxed);
            next += interval * missed;
        }
    }
    log::debug!("HP detection worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectionResult;
    use crate::vision::color::HP_BAR_REDS;
    use crate::vision::{
        CaptureError, CaptureGate, CaptureRect, CaptureSource, FrameCapture, PixelBuffer,
        ProcessingGate, HP_BAR_SIGNATURE,
    };
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;

    const MAIN_REGION: DetectionRegion = DetectionRegion {
        min_x: 10,
        min_y: 0,
        max_x: 60,
        max_y: 6,
    };

    fn bar_frame(main_px: u32) -> PixelBuffer {
        let mut frame = PixelBuffer::blank(300, 60, 1200).unwrap();
        for y in 1..5 {
            frame.fill_row_span(y, 10, 10 + main_px - 1, HP_BAR_REDS[1]);
        }
        for y in 36..44 {
            frame.fill_row_span(y, 111, 160, HP_BAR_REDS[1]);
        }
        frame
    }

    #[derive(Default)]
    struct Recorder {
        results: Mutex<Vec<(BarId, DetectionResult)>>,
    }

    impl ResultSink for Recorder {
        fn on_result(&self, bar: BarId, result: DetectionResult) {
            self.results.lock().unwrap().push((bar, result));
        }
    }

    impl Recorder {
        fn bars(&self) -> Vec<BarId> {
            self.results.lock().unwrap().iter().map(|(bar, _)| *bar).collect()
        }
    }

    fn scheduler_with(
        source: Arc<dyn CaptureSource>,
        region: DetectionRegion,
        interval: Duration,
    ) -> (DetectionScheduler, Arc<Recorder>) {
        let engine = DetectionEngine::new(
            CaptureGate::new(source),
            ProcessingGate::new(),
            HP_BAR_SIGNATURE,
            region,
        );
        let recorder = Arc::new(Recorder::default());
        let scheduler = DetectionScheduler::new(engine, recorder.clone(), interval);
        (scheduler, recorder)
    }

    /// Blocks inside the first capture until released
    struct BlockingSource {
        inner: FrameCapture,
        captures: AtomicUsize,
        entered: Barrier,
        release: Barrier,
    }

    impl CaptureSource for BlockingSource {
        fn capture_region(&self, rect: CaptureRect) -> Result<PixelBuffer, CaptureError> {
            if self.captures.fetch_add(1, Ordering::SeqCst) == 0 {
                self.entered.wait();
                self.release.wait();
            }
            self.inner.capture_region(rect)
        }
    }

    struct PanickingSource;

    impl CaptureSource for PanickingSource {
        fn capture_region(&self, _rect: CaptureRect) -> Result<PixelBuffer, CaptureError> {
            panic!("render surface exploded");
        }
    }

    #[test]
    fn test_tick_emits_main_then_buffer() {
        let frames = Arc::new(FrameCapture::new());
        frames.replace(bar_frame(40));
        let (scheduler, recorder) = scheduler_with(frames, MAIN_REGION, DEFAULT_INTERVAL);

        assert_eq!(scheduler.tick(), TickOutcome::Completed { emitted: 2 });
        assert_eq!(recorder.bars(), vec![BarId::Main, BarId::Buffer]);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.bar_state(BarId::Main).calibrated_max_width, 40);
        assert_eq!(scheduler.bar_state(BarId::Buffer).calibrated_max_width, 50);
    }

    #[test]
    fn test_invalid_main_region_still_runs_buffer() {
        let frames = Arc::new(FrameCapture::new());
        frames.replace(bar_frame(40));
        let (scheduler, recorder) =
            scheduler_with(frames, DetectionRegion::new(0, 0, 0, 0), DEFAULT_INTERVAL);

        assert_eq!(scheduler.tick(), TickOutcome::Completed { emitted: 1 });
        assert_eq!(recorder.bars(), vec![BarId::Buffer]);
        assert_eq!(scheduler.stats().failed_cycles, 1);

        scheduler.set_main_region(MAIN_REGION);
        assert_eq!(scheduler.tick(), TickOutcome::Completed { emitted: 2 });
    }

    #[test]
    fn test_tick_while_detecting_is_dropped() {
        let frames = FrameCapture::new();
        frames.replace(bar_frame(40));
        let source = Arc::new(BlockingSource {
            inner: frames,
            captures: AtomicUsize::new(0),
            entered: Barrier::new(2),
            release: Barrier::new(2),
        });
        let (scheduler, recorder) =
            scheduler_with(source.clone(), MAIN_REGION, DEFAULT_INTERVAL);
        let scheduler = Arc::new(scheduler);

        let background = {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || scheduler.tick())
        };

        source.entered.wait();
        assert_eq!(scheduler.state(), SchedulerState::Detecting);
        assert_eq!(scheduler.tick(), TickOutcome::Skipped);
        source.release.wait();

        assert_eq!(
            background.join().unwrap(),
            TickOutcome::Completed { emitted: 2 }
        );
        // One capture per bar, none from the dropped tick
        assert_eq!(source.captures.load(Ordering::SeqCst), 2);
        assert_eq!(recorder.bars().len(), 2);
        assert_eq!(scheduler.stats().skipped_ticks, 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_panicking_cycle_is_contained() {
        let (scheduler, recorder) =
            scheduler_with(Arc::new(PanickingSource), MAIN_REGION, DEFAULT_INTERVAL);

        assert_eq!(scheduler.tick(), TickOutcome::Completed { emitted: 0 });
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.stats().failed_cycles, 2);
        assert!(recorder.bars().is_empty());

        // Locks were released; the next tick runs normally
        assert_eq!(scheduler.tick(), TickOutcome::Completed { emitted: 0 });
    }

    #[test]
    fn test_start_stop_are_idempotent() {
        let frames = Arc::new(FrameCapture::new());
        frames.replace(bar_frame(40));
        let (scheduler, recorder) =
            scheduler_with(frames, MAIN_REGION, Duration::from_millis(5));

        assert!(!scheduler.stop());
        assert!(!scheduler.is_running());

        assert!(scheduler.start().unwrap());
        assert!(!scheduler.start().unwrap());
        assert!(scheduler.is_running());

        let deadline = Instant::now() + Duration::from_secs(5);
        while recorder.bars().len() < 4 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(recorder.bars().len() >= 4);

        assert!(scheduler.stop());
        assert!(!scheduler.stop());
        assert!(!scheduler.is_running());

        // Let a possibly in-flight tick finish, then make sure nothing else arrives
        thread::sleep(Duration::from_millis(50));
        let settled = recorder.bars().len();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(recorder.bars().len(), settled);
    }

    #[test]
    fn test_results_alternate_main_and_buffer() {
        let frames = Arc::new(FrameCapture::new());
        frames.replace(bar_frame(40));
        let (scheduler, recorder) =
            scheduler_with(frames, MAIN_REGION, Duration::from_millis(5));

        scheduler.start().unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while recorder.bars().len() < 6 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        scheduler.stop();
        thread::sleep(Duration::from_millis(50));

        let bars = recorder.bars();
        assert!(bars.len() >= 6);
        for pair in bars.chunks_exact(2) {
            assert_eq!(pair, &[BarId::Main, BarId::Buffer]);
        }
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let frames = Arc::new(FrameCapture::new());
        let (scheduler, _) = scheduler_with(frames, MAIN_REGION, Duration::ZERO);
        assert_eq!(scheduler.interval(), MIN_INTERVAL);
    }

    /// Reads state back through the scheduler from inside `on_result`
    #[derive(Default)]
    struct ReadBackSink {
        scheduler: once_cell::sync::OnceCell<std::sync::Weak<DetectionScheduler>>,
        seen: Mutex<Vec<BarState>>,
    }

    impl ResultSink for ReadBackSink {
        fn on_result(&self, bar: BarId, _result: DetectionResult) {
            if let Some(scheduler) = self.scheduler.get().and_then(std::sync::Weak::upgrade) {
                let state = scheduler.bar_state(bar);
                scheduler.set_signature(HP_BAR_SIGNATURE);
                self.seen.lock().unwrap().push(state);
            }
        }
    }

    #[test]
    fn test_sink_may_call_back_into_scheduler() {
        let frames = Arc::new(FrameCapture::new());
        frames.replace(bar_frame(40));
        let engine = DetectionEngine::new(
            CaptureGate::new(frames),
            ProcessingGate::new(),
            HP_BAR_SIGNATURE,
            MAIN_REGION,
        );
        let sink = Arc::new(ReadBackSink::default());
        let scheduler = Arc::new(DetectionScheduler::new(
            engine,
            sink.clone(),
            DEFAULT_INTERVAL,
        ));
        let _ = sink.scheduler.set(Arc::downgrade(&scheduler));

        let (done_tx, done_rx) = mpsc::channel();
        {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || {
                let _ = done_tx.send(scheduler.tick());
            });
        }
        let outcome = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("tick blocked on a sink calling back into the scheduler");
        assert_eq!(outcome, TickOutcome::Completed { emitted: 2 });

        let seen = sink.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        // The sink sees the state the cycle just produced
        assert_eq!(seen[0].id, BarId::Main);
        assert_eq!(seen[0].calibrated_max_width, 40);
        assert_eq!(seen[1].id, BarId::Buffer);
        assert_eq!(seen[1].calibrated_max_width, 50);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        drop(seen);

        // Later ticks are not stalled
        assert_eq!(scheduler.tick(), TickOutcome::Completed { emitted: 2 });
    }
}
