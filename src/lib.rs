//! FlyFF HP bar - HP bar detection for FlyFF Universe
//!
//! This library watches the character HP bar and the buffer HP bar in a
//! captured game view and reports how full each one is. A bar's fill is
//! measured as the width of its red pixels relative to the widest bar seen
//! so far, so no per-resolution setup is needed beyond locating the bar.
//!
//! The host supplies frames through a [`vision::CaptureSource`] and receives
//! results through a [`detection::ResultSink`].

pub mod config;
pub mod detection;
pub mod presentation;
pub mod vision;

use once_cell::sync::OnceCell;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::{ConfigError, Settings};
use crate::detection::{
    BarId, BarState, DetectionEngine, DetectionScheduler, ResultSink, SchedulerStats, TickOutcome,
};
use crate::vision::{CaptureGate, CaptureSource, ProcessingGate, SnapshotError, SnapshotReport};

/// Global application state
pub struct HpBot {
    settings: Mutex<Settings>,
    capture: CaptureGate,
    processing: ProcessingGate,
    scheduler: DetectionScheduler,
}

impl HpBot {
    /// Create a stopped bot reading frames from `source` and reporting to `sink`.
    ///
    /// The polling interval is fixed here; region and tolerance can be
    /// changed later with [`HpBot::apply_settings`].
    pub fn new(settings: Settings, source: Arc<dyn CaptureSource>, sink: Arc<dyn ResultSink>) -> Self {
        let capture = CaptureGate::new(source);
        let processing = ProcessingGate::new();
        let engine = DetectionEngine::new(
            capture.clone(),
            processing.clone(),
            settings.signature(),
            settings.main_region(),
        );
        let scheduler = DetectionScheduler::new(engine, sink, settings.interval());

        Self {
            settings: Mutex::new(settings),
            capture,
            processing,
            scheduler,
        }
    }

    /// Start periodic detection. Returns `false` if it was already running.
    pub fn start(&self) -> std::io::Result<bool> {
        let started = self.scheduler.start()?;
        if started {
            log::info!("Bot has started");
        }
        Ok(started)
    }

    /// Stop periodic detection. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        let stopped = self.scheduler.stop();
        if stopped {
            log::info!("Bot has stopped");
        }
        stopped
    }

    /// Check if periodic detection is running
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Run one detection tick on the calling thread
    pub fn tick(&self) -> TickOutcome {
        self.scheduler.tick()
    }

    /// Tick and failure counters
    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Current settings
    pub fn settings(&self) -> Settings {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validate and apply new settings. Calibration is kept.
    pub fn apply_settings(&self, settings: Settings) -> Result<(), ConfigError> {
        settings.validate()?;
        self.scheduler.set_main_region(settings.main_region());
        self.scheduler.set_signature(settings.signature());

        let mut current = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
        if current.detection.interval_ms != settings.detection.interval_ms {
            log::warn!(
                "Interval change to {} ms is ignored; the bot keeps {} ms",
                settings.detection.interval_ms,
                self.scheduler.interval().as_millis()
            );
        }
        log::info!("HP region set to {}", settings.main_region());
        *current = settings;
        Ok(())
    }

    /// Snapshot of a bar's calibration and last reading
    pub fn bar_state(&self, bar: BarId) -> BarState {
        self.scheduler.bar_state(bar)
    }

    /// Save the configured HP region to the screenshot directory
    pub fn capture_calibration_snapshot(&self) -> Result<SnapshotReport, SnapshotError> {
        let settings = self.settings();
        vision::capture_calibration_snapshot(
            &self.capture,
            &self.processing,
            &settings.signature(),
            &settings.main_region(),
            &settings.screenshot_dir,
        )
    }
}

/// Global bot instance for host UIs
static BOT_INSTANCE: OnceCell<HpBot> = OnceCell::new();

/// Initialize the global bot instance. Later calls are ignored.
pub fn init_bot(settings: Settings, source: Arc<dyn CaptureSource>, sink: Arc<dyn ResultSink>) {
    let _ = BOT_INSTANCE.set(HpBot::new(settings, source, sink));
}

/// Get a reference to the global bot instance
pub fn get_bot() -> Option<&'static HpBot> {
    BOT_INSTANCE.get()
}
