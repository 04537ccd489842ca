use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_DEVICE: &str = "stub://camera";
const DEFAULT_OUTPUT_DIR: &str = "star_images";
const DEFAULT_PREFIX: &str = "star";
const DEFAULT_EXTENSION: &str = ".jpg";
const DEFAULT_FRAME_COUNT: u32 = 30;
const DEFAULT_INTERVAL_MS: u64 = 1_000;
const DEFAULT_STABILIZE_SECS: u64 = 2;
const DEFAULT_MANUAL_EXPOSURE: bool = true;
const DEFAULT_EXPOSURE: i64 = 156;
const DEFAULT_GAIN: i64 = 0;
const DEFAULT_FPS: u32 = 5;
const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    device: Option<String>,
    output: Option<OutputConfigFile>,
    capture: Option<CaptureSectionFile>,
    tuning: Option<TuningConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputConfigFile {
    dir: Option<String>,
    prefix: Option<String>,
    extension: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureSectionFile {
    frame_count: Option<u32>,
    interval_ms: Option<u64>,
    stabilize_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TuningConfigFile {
    manual_exposure: Option<bool>,
    exposure: Option<i64>,
    gain: Option<i64>,
    fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Resolved run configuration for the acquisition loop.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Device string: a `/dev/video*` path, or `stub://` for the synthetic backend.
    pub device: String,
    pub output: OutputSettings,
    pub frame_count: u32,
    pub interval: Duration,
    pub stabilize: Duration,
    pub tuning: CameraTuning,
}

#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub dir: String,
    pub prefix: String,
    pub extension: String,
}

/// Camera tuning applied once after the device is opened.
///
/// `exposure` is in device-specific units (V4L2 `exposure_absolute`, 100 us
/// steps on most UVC cameras). Values the hardware rejects are logged as
/// warnings and otherwise ignored.
#[derive(Debug, Clone)]
pub struct CameraTuning {
    pub manual_exposure: bool,
    pub exposure: i64,
    pub gain: i64,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CameraTuning {
    fn default() -> Self {
        Self {
            manual_exposure: DEFAULT_MANUAL_EXPOSURE,
            exposure: DEFAULT_EXPOSURE,
            gain: DEFAULT_GAIN,
            fps: DEFAULT_FPS,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::from_file(CaptureConfigFile::default()).expect("default config is valid")
    }
}

impl CaptureConfig {
    /// Load configuration: compiled defaults, then the JSON file named by
    /// `STARCAP_CONFIG` (if set), then `STARCAP_*` env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("STARCAP_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CaptureConfigFile) -> Result<Self> {
        let device = file.device.unwrap_or_else(|| DEFAULT_DEVICE.to_string());
        let output = OutputSettings {
            dir: file
                .output
                .as_ref()
                .and_then(|out| out.dir.clone())
                .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
            prefix: file
                .output
                .as_ref()
                .and_then(|out| out.prefix.clone())
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            extension: file
                .output
                .and_then(|out| out.extension)
                .unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
        };
        let frame_count = file
            .capture
            .as_ref()
            .and_then(|cap| cap.frame_count)
            .unwrap_or(DEFAULT_FRAME_COUNT);
        let interval = Duration::from_millis(
            file.capture
                .as_ref()
                .and_then(|cap| cap.interval_ms)
                .unwrap_or(DEFAULT_INTERVAL_MS),
        );
        let stabilize = Duration::from_secs(
            file.capture
                .and_then(|cap| cap.stabilize_secs)
                .unwrap_or(DEFAULT_STABILIZE_SECS),
        );
        let tuning_file = file.tuning.unwrap_or_default();
        let defaults = CameraTuning::default();
        let tuning = CameraTuning {
            manual_exposure: tuning_file
                .manual_exposure
                .unwrap_or(defaults.manual_exposure),
            exposure: tuning_file.exposure.unwrap_or(defaults.exposure),
            gain: tuning_file.gain.unwrap_or(defaults.gain),
            fps: tuning_file.fps.unwrap_or(defaults.fps),
            width: tuning_file.width.unwrap_or(defaults.width),
            height: tuning_file.height.unwrap_or(defaults.height),
        };
        Ok(Self {
            device,
            output,
            frame_count,
            interval,
            stabilize,
            tuning,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(device) = std::env::var("STARCAP_DEVICE") {
            if !device.trim().is_empty() {
                self.device = device;
            }
        }
        if let Ok(dir) = std::env::var("STARCAP_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output.dir = dir;
            }
        }
        if let Ok(count) = std::env::var("STARCAP_FRAME_COUNT") {
            let count: u32 = count
                .parse()
                .map_err(|_| anyhow!("STARCAP_FRAME_COUNT must be an integer frame count"))?;
            self.frame_count = count;
        }
        if let Ok(interval) = std::env::var("STARCAP_INTERVAL_MS") {
            let ms: u64 = interval.parse().map_err(|_| {
                anyhow!("STARCAP_INTERVAL_MS must be an integer number of milliseconds")
            })?;
            self.interval = Duration::from_millis(ms);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.device.trim().is_empty() {
            return Err(anyhow!("device must not be empty"));
        }
        if self.output.prefix.is_empty() {
            return Err(anyhow!("output prefix must not be empty"));
        }
        if !self.output.extension.starts_with('.') {
            return Err(anyhow!(
                "output extension must start with '.', got {:?}",
                self.output.extension
            ));
        }
        if self.tuning.width == 0 || self.tuning.height == 0 {
            return Err(anyhow!("frame width and height must be greater than zero"));
        }
        if self.tuning.fps == 0 {
            return Err(anyhow!("frame rate must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<CaptureConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_field_setup() {
        let cfg = CaptureConfig::default();
        assert_eq!(cfg.device, "stub://camera");
        assert_eq!(cfg.output.dir, "star_images");
        assert_eq!(cfg.output.prefix, "star");
        assert_eq!(cfg.output.extension, ".jpg");
        assert_eq!(cfg.frame_count, 30);
        assert_eq!(cfg.interval, Duration::from_secs(1));
        assert_eq!(cfg.stabilize, Duration::from_secs(2));
        assert!(cfg.tuning.manual_exposure);
        assert_eq!(cfg.tuning.gain, 0);
        assert_eq!(cfg.tuning.fps, 5);
        assert_eq!(cfg.tuning.width, 1280);
        assert_eq!(cfg.tuning.height, 720);
    }

    #[test]
    fn validate_rejects_bad_extension() {
        let mut cfg = CaptureConfig::default();
        cfg.output.extension = "jpg".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_dimensions() {
        let mut cfg = CaptureConfig::default();
        cfg.tuning.width = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_prefix() {
        let mut cfg = CaptureConfig::default();
        cfg.output.prefix = String::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let file: CaptureConfigFile =
            serde_json::from_str(r#"{"capture": {"frame_count": 3}}"#).unwrap();
        let cfg = CaptureConfig::from_file(file).unwrap();
        assert_eq!(cfg.frame_count, 3);
        assert_eq!(cfg.output.prefix, "star");
        assert_eq!(cfg.tuning.height, 720);
    }
}
