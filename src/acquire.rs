//! The acquisition loop.
//!
//! A run is one straight-line sequence: open the device, apply the tuning,
//! wait for the hardware to stabilize, then capture `frame_count` frames at
//! the configured interval, converting each to grayscale and writing it to
//! the frame store. Frame indices are contiguous whether or not individual
//! reads succeed; a failed read consumes its index and produces no file.
//!
//! Failure taxonomy:
//! - device open failure is fatal (the error propagates out of [`run`]),
//! - a failed frame read is logged and skipped,
//! - a failed disk write is fatal.
//!
//! The device handle lives on this function's stack, so it is released on
//! every exit path, including fatal errors and shutdown requests.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::CaptureConfig;
use crate::source::CameraSource;
use crate::store::FrameStore;

/// Outcome of one acquisition run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AcquisitionReport {
    /// Indices the loop reached (equals `frame_count` unless cancelled).
    pub attempted: u32,
    /// Frames written to disk.
    pub saved: u32,
    /// Indices whose read failed and produced no file.
    pub skipped: u32,
    /// True if a shutdown request ended the run early.
    pub cancelled: bool,
}

/// Run one acquisition sequence to completion.
///
/// `shutdown` is checked between blocking steps; when set, the run stops
/// before the next capture and reports itself cancelled.
pub fn run(cfg: &CaptureConfig, shutdown: &AtomicBool) -> Result<AcquisitionReport> {
    let mut report = AcquisitionReport::default();

    let store = FrameStore::create(&cfg.output)?;

    log::info!("opening camera {}...", cfg.device);
    let mut source = CameraSource::new(&cfg.device, &cfg.tuning)?;
    source.connect()?;
    source.configure()?;

    if shutdown.load(Ordering::Relaxed) {
        report.cancelled = true;
        return Ok(report);
    }

    if cfg.stabilize > Duration::ZERO {
        log::info!("letting camera stabilize...");
        std::thread::sleep(cfg.stabilize);
    }

    log::info!("capturing {} frames...", cfg.frame_count);
    for index in 0..cfg.frame_count {
        if shutdown.load(Ordering::Relaxed) {
            log::info!("shutdown requested, stopping after {} frames", index);
            report.cancelled = true;
            break;
        }

        report.attempted += 1;
        match source.next_frame() {
            Ok(frame) => {
                let gray = frame.to_gray();
                let path = store.write_gray(index, &gray)?;
                log::info!("saved {}", path.display());
                report.saved += 1;
            }
            Err(err) => {
                log::warn!("failed to capture frame {}: {}", index, err);
                report.skipped += 1;
            }
        }

        // Pace the next capture. The original tool also slept after the final
        // frame; that trailing delay bought nothing and is dropped here.
        if index + 1 < cfg.frame_count {
            std::thread::sleep(cfg.interval);
        }
    }

    let stats = source.stats();
    log::info!(
        "capture complete: {} saved, {} skipped of {} ({} reads on {})",
        report.saved,
        report.skipped,
        report.attempted,
        stats.frames_read,
        stats.device
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptureConfig;

    fn test_config(dir: &std::path::Path, device: &str, frame_count: u32) -> CaptureConfig {
        let mut cfg = CaptureConfig::default();
        cfg.device = device.to_string();
        cfg.output.dir = dir.to_string_lossy().into_owned();
        cfg.frame_count = frame_count;
        cfg.interval = Duration::ZERO;
        cfg.stabilize = Duration::ZERO;
        cfg.tuning.width = 8;
        cfg.tuning.height = 4;
        cfg
    }

    #[test]
    fn preset_shutdown_stops_before_any_capture() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = test_config(tmp.path(), "stub://cam", 5);
        let shutdown = AtomicBool::new(true);

        let report = run(&cfg, &shutdown).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.attempted, 0);
        assert_eq!(report.saved, 0);
        assert!(!cfg_output_has_files(&cfg));
    }

    #[test]
    fn zero_frame_count_produces_no_files() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = test_config(tmp.path(), "stub://cam", 0);
        let shutdown = AtomicBool::new(false);

        let report = run(&cfg, &shutdown).unwrap();
        assert_eq!(report, AcquisitionReport::default());
        assert!(!cfg_output_has_files(&cfg));
    }

    #[test]
    fn open_failure_is_fatal_and_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        // Device paths are rejected without the v4l2 feature; with it, the
        // path does not exist. Either way the open step fails.
        let cfg = test_config(tmp.path(), "/dev/null/not-a-camera", 3);
        let shutdown = AtomicBool::new(false);

        assert!(run(&cfg, &shutdown).is_err());
        assert!(!cfg_output_has_files(&cfg));
    }

    fn cfg_output_has_files(cfg: &CaptureConfig) -> bool {
        std::fs::read_dir(&cfg.output.dir)
            .map(|entries| entries.count() > 0)
            .unwrap_or(false)
    }
}
