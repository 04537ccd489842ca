//! USB camera source.
//!
//! `CameraSource` wraps a local V4L2 capture device (e.g. /dev/video2) with a
//! synthetic fallback for `stub://` device strings. The lifecycle is fixed:
//! `connect` opens the device node and is the one fatal failure point,
//! `configure` applies the camera tuning best-effort, `next_frame` reads one
//! RGB24 frame synchronously. The device is released on drop.
//!
//! Settings the hardware rejects are logged at warn level and otherwise
//! ignored; V4L2 gives no reliable way to verify that a control stuck, so no
//! per-setting result is surfaced to the caller.

use anyhow::{anyhow, Result};
use std::collections::HashSet;

use crate::config::CameraTuning;
use crate::frame::Frame;

/// Camera device handle. Owned exclusively by the acquisition loop.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "capture-v4l2")]
    Device(UsbCamera),
}

impl CameraSource {
    /// Create a source for the given device string.
    ///
    /// `stub://` strings select the synthetic backend; anything else is
    /// treated as a V4L2 device path and requires the `capture-v4l2` feature.
    pub fn new(device: &str, tuning: &CameraTuning) -> Result<Self> {
        if device.starts_with("stub://") {
            Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(device, tuning)?),
            })
        } else {
            #[cfg(feature = "capture-v4l2")]
            {
                return Ok(Self {
                    backend: CameraBackend::Device(UsbCamera::new(device, tuning)),
                });
            }
            #[cfg(not(feature = "capture-v4l2"))]
            Err(anyhow!(
                "device {} requires the capture-v4l2 feature (only stub:// sources are built in)",
                device
            ))
        }
    }

    /// Open the device. This is the one unrecoverable failure: callers abort
    /// the run if it fails.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.connect(),
            #[cfg(feature = "capture-v4l2")]
            CameraBackend::Device(camera) => camera.connect(),
        }
    }

    /// Apply the capture tuning once. Each setting is applied independently;
    /// rejections are logged, never fatal.
    pub fn configure(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.configure(),
            #[cfg(feature = "capture-v4l2")]
            CameraBackend::Device(camera) => camera.configure(),
        }
    }

    /// Read the next frame synchronously. An error here is a per-frame
    /// failure the loop skips, not a fatal condition.
    pub fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.next_frame(),
            #[cfg(feature = "capture-v4l2")]
            CameraBackend::Device(camera) => camera.next_frame(),
        }
    }

    pub fn stats(&self) -> SourceStats {
        match &self.backend {
            CameraBackend::Synthetic(camera) => camera.stats(),
            #[cfg(feature = "capture-v4l2")]
            CameraBackend::Device(camera) => camera.stats(),
        }
    }
}

/// Read counters for a source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_read: u64,
    pub device: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and hardware-free runs
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    device: String,
    width: u32,
    height: u32,
    read_index: u64,
    /// Read indices that simulate a failed capture.
    fail_indices: HashSet<u64>,
}

impl SyntheticCamera {
    /// Parse a `stub://` device string. A `fail=` query lists read indices
    /// that will report a capture failure, e.g. `stub://cam?fail=1,3`.
    fn new(device: &str, tuning: &CameraTuning) -> Result<Self> {
        let fail_indices = parse_fail_indices(device)?;
        Ok(Self {
            device: device.to_string(),
            width: tuning.width,
            height: tuning.height,
            read_index: 0,
            fail_indices,
        })
    }

    fn connect(&mut self) -> Result<()> {
        log::info!("camera: connected to {} (synthetic)", self.device);
        Ok(())
    }

    fn configure(&mut self) -> Result<()> {
        log::debug!(
            "camera: synthetic tuning accepted ({}x{})",
            self.width,
            self.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let index = self.read_index;
        self.read_index += 1;

        if self.fail_indices.contains(&index) {
            return Err(anyhow!("synthetic capture failure at read {}", index));
        }

        Frame::from_rgb(self.generate_pixels(index), self.width, self.height)
    }

    /// Generate a deterministic gradient that varies per read, so consecutive
    /// frames differ the way a real sensor's would.
    fn generate_pixels(&self, index: u64) -> Vec<u8> {
        let pixel_count = (self.width * self.height * 3) as usize;
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + index) % 256) as u8;
        }
        pixels
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_read: self.read_index,
            device: self.device.clone(),
        }
    }
}

fn parse_fail_indices(device: &str) -> Result<HashSet<u64>> {
    let Some((_, query)) = device.split_once('?') else {
        return Ok(HashSet::new());
    };
    let mut indices = HashSet::new();
    for param in query.split('&') {
        let Some(list) = param.strip_prefix("fail=") else {
            continue;
        };
        for entry in list.split(',').filter(|entry| !entry.is_empty()) {
            let index: u64 = entry
                .parse()
                .map_err(|_| anyhow!("invalid fail index {:?} in device {}", entry, device))?;
            indices.insert(index);
        }
    }
    Ok(indices)
}

// ----------------------------------------------------------------------------
// V4L2 device source
// ----------------------------------------------------------------------------

#[cfg(feature = "capture-v4l2")]
mod v4l2_backend {
    use super::SourceStats;
    use crate::config::CameraTuning;
    use crate::frame::Frame;
    use anyhow::{anyhow, Context, Result};
    use ouroboros::self_referencing;
    use v4l::control::{Control, Value};

    const V4L2_CID_EXPOSURE_AUTO: u32 = 0x009a_0901;
    const V4L2_CID_EXPOSURE_ABSOLUTE: u32 = 0x009a_0902;
    const V4L2_CID_GAIN: u32 = 0x0098_0913;

    /// V4L2 menu values for `exposure_auto`.
    const EXPOSURE_MANUAL: i64 = 1;
    const EXPOSURE_APERTURE_PRIORITY: i64 = 3;

    pub(super) struct UsbCamera {
        path: String,
        tuning: CameraTuning,
        /// Open device node, present between connect and configure.
        device: Option<v4l::Device>,
        /// Streaming state, present after configure.
        state: Option<UsbStreamState>,
        frame_count: u64,
        active_width: u32,
        active_height: u32,
    }

    #[self_referencing]
    struct UsbStreamState {
        device: v4l::Device,
        #[borrows(mut device)]
        #[covariant]
        stream: v4l::prelude::MmapStream<'this, v4l::Device>,
    }

    impl UsbCamera {
        pub(super) fn new(path: &str, tuning: &CameraTuning) -> Self {
            Self {
                path: path.to_string(),
                tuning: tuning.clone(),
                device: None,
                state: None,
                frame_count: 0,
                active_width: tuning.width,
                active_height: tuning.height,
            }
        }

        pub(super) fn connect(&mut self) -> Result<()> {
            let device = v4l::Device::with_path(&self.path)
                .with_context(|| format!("open v4l2 device {}", self.path))?;
            self.device = Some(device);
            log::info!("camera: connected to {}", self.path);
            Ok(())
        }

        pub(super) fn configure(&mut self) -> Result<()> {
            use v4l::buffer::Type;
            use v4l::video::Capture;

            let device = self
                .device
                .take()
                .ok_or_else(|| anyhow!("v4l2 device not connected"))?;

            let mut format = device.format().context("read v4l2 format")?;
            format.width = self.tuning.width;
            format.height = self.tuning.height;
            format.fourcc = v4l::FourCC::new(b"RGB3");
            let format = match device.set_format(&format) {
                Ok(format) => format,
                Err(err) => {
                    log::warn!("camera: failed to set format on {}: {}", self.path, err);
                    device
                        .format()
                        .context("read v4l2 format after set failure")?
                }
            };
            self.active_width = format.width;
            self.active_height = format.height;

            let params = v4l::video::capture::Parameters::with_fps(self.tuning.fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("camera: failed to set fps on {}: {}", self.path, err);
            }

            self.apply_controls(&device);

            let state = UsbStreamStateBuilder {
                device,
                stream_builder: |device| {
                    v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                        .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
                },
            }
            .try_build()?;
            self.state = Some(state);

            log::info!(
                "camera: streaming {} at {}x{}",
                self.path,
                self.active_width,
                self.active_height
            );
            Ok(())
        }

        /// Apply exposure and gain controls one by one. A control the driver
        /// rejects is reported and skipped; there is no readback check.
        fn apply_controls(&self, device: &v4l::Device) {
            let exposure_mode = if self.tuning.manual_exposure {
                EXPOSURE_MANUAL
            } else {
                EXPOSURE_APERTURE_PRIORITY
            };
            let controls = [
                ("exposure_auto", V4L2_CID_EXPOSURE_AUTO, exposure_mode),
                (
                    "exposure_absolute",
                    V4L2_CID_EXPOSURE_ABSOLUTE,
                    self.tuning.exposure,
                ),
                ("gain", V4L2_CID_GAIN, self.tuning.gain),
            ];
            for (name, id, value) in controls {
                let ctrl = Control {
                    id,
                    value: Value::Integer(value),
                };
                if let Err(err) = device.set_control(ctrl) {
                    log::warn!(
                        "camera: failed to set {}={} on {}: {}",
                        name,
                        value,
                        self.path,
                        err
                    );
                }
            }
        }

        pub(super) fn next_frame(&mut self) -> Result<Frame> {
            use v4l::io::traits::CaptureStream;

            let state = self
                .state
                .as_mut()
                .ok_or_else(|| anyhow!("v4l2 device not configured"))?;
            let (buf, _meta) = state
                .with_mut(|fields| fields.stream.next())
                .map_err(|err| anyhow::Error::new(err).context("capture v4l2 frame"))?;
            let pixels = buf.to_vec();
            self.frame_count += 1;

            Frame::from_rgb(pixels, self.active_width, self.active_height)
        }

        pub(super) fn stats(&self) -> SourceStats {
            SourceStats {
                frames_read: self.frame_count,
                device: self.path.clone(),
            }
        }
    }
}

#[cfg(feature = "capture-v4l2")]
use v4l2_backend::UsbCamera;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
