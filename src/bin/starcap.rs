//! starcap - star-tracker frame acquisition
//!
//! Opens the configured camera, applies the capture tuning, waits for the
//! hardware to stabilize, then captures a fixed number of grayscale frames
//! into sequentially numbered JPEG files. Configuration comes from compiled
//! defaults, an optional JSON file named by `STARCAP_CONFIG`, and `STARCAP_*`
//! environment overrides.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use star_capture::{acquire, CaptureConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = CaptureConfig::load().context("load configuration")?;
    log::info!(
        "starcap {}: device={} output={} frames={} interval={:?}",
        env!("CARGO_PKG_VERSION"),
        cfg.device,
        cfg.output.dir,
        cfg.frame_count,
        cfg.interval
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::Relaxed);
    })
    .expect("error setting Ctrl-C handler");

    let report = acquire::run(&cfg, &shutdown)?;
    if report.cancelled {
        log::warn!(
            "run cancelled: {} of {} frames saved",
            report.saved,
            cfg.frame_count
        );
    }
    Ok(())
}
