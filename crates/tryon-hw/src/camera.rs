//! V4L2 camera capture via the `v4l` crate.

use crate::capture::{CaptureConstraints, CaptureProvider, DeviceError, FrameSource};
use crate::frame::{self, Frame};
use serde::Serialize;
use std::io;
use std::path::Path;
use v4l::buffer::Type as BufType;
use v4l::io::traits::{CaptureStream, Stream};
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const STREAM_BUFFERS: u32 = 4;

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// 8-bit grayscale.
    Grey,
    /// 16-bit little-endian grayscale.
    Y16,
}

/// V4L2 camera device handle.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0") and
    /// negotiate the requested geometry.
    pub fn open(device_path: &str, constraints: &CaptureConstraints) -> Result<Self, DeviceError> {
        if !Path::new(device_path).exists() {
            return Err(DeviceError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| open_error(device_path, &e))?;

        let caps = device
            .query_caps()
            .map_err(|e| DeviceError::CaptureFailed(format!("failed to query capabilities: {e}")))?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        if !caps
            .capabilities
            .contains(v4l::capability::Flags::VIDEO_CAPTURE)
        {
            return Err(DeviceError::StreamingNotSupported);
        }

        // Ask for YUYV; accept GREY/Y16 if that is all the driver offers.
        let mut fmt = device
            .format()
            .map_err(|e| DeviceError::FormatNegotiationFailed(format!("failed to get format: {e}")))?;

        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = constraints.width;
        fmt.height = constraints.height;

        let negotiated = device
            .set_format(&fmt)
            .map_err(|e| DeviceError::FormatNegotiationFailed(format!("failed to set format: {e}")))?;

        let fourcc = negotiated.fourcc;
        let pixel_format = if fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else if fourcc == FourCC::new(b"GREY") {
            PixelFormat::Grey
        } else if fourcc == FourCC::new(b"Y16 ") || fourcc == FourCC::new(b"Y16\0") {
            PixelFormat::Y16
        } else {
            return Err(DeviceError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {fourcc:?} (need YUYV, GREY, or Y16)"
            )));
        };

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?fourcc,
            "negotiated format"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            fourcc,
            pixel_format,
        })
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Start a memory-mapped capture stream on this device.
    fn start_stream(&self) -> Result<MmapStream<'static>, DeviceError> {
        MmapStream::with_buffers(&self.device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| DeviceError::CaptureFailed(format!("failed to create mmap stream: {e}")))
    }

    /// Convert a raw buffer to RGB24 based on the negotiated format.
    fn buf_to_rgb(&self, buf: &[u8]) -> Result<Vec<u8>, DeviceError> {
        let converted = match self.pixel_format {
            PixelFormat::Yuyv => frame::yuyv_to_rgb(buf, self.width, self.height),
            PixelFormat::Grey => frame::grey_to_rgb(buf, self.width, self.height),
            PixelFormat::Y16 => {
                // 16-bit little-endian per pixel; keep the high byte
                let gray: Vec<u8> = buf.chunks_exact(2).map(|px| px[1]).collect();
                frame::grey_to_rgb(&gray, self.width, self.height)
            }
        };
        converted.map_err(|e| DeviceError::CaptureFailed(format!("{:?} conversion failed: {e}", self.pixel_format)))
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

fn open_error(device_path: &str, e: &io::Error) -> DeviceError {
    if e.kind() == io::ErrorKind::PermissionDenied {
        DeviceError::PermissionDenied(device_path.to_string())
    } else if e.raw_os_error() == Some(16) || e.to_string().contains("busy") {
        // EBUSY
        DeviceError::DeviceBusy
    } else {
        DeviceError::DeviceNotFound(format!("{device_path}: {e}"))
    }
}

/// A streaming camera, as handed out by [`CameraProvider`].
pub struct CameraStream {
    camera: Camera,
    stream: MmapStream<'static>,
}

impl FrameSource for CameraStream {
    fn next_frame(&mut self) -> Result<Frame, DeviceError> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| DeviceError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;
        let sequence = meta.sequence;
        let data = self.camera.buf_to_rgb(buf)?;

        Ok(Frame {
            data,
            width: self.camera.width,
            height: self.camera.height,
            timestamp: std::time::Instant::now(),
            sequence,
        })
    }
}

/// Capture provider backed by a V4L2 device path.
pub struct CameraProvider {
    device_path: String,
}

impl CameraProvider {
    pub fn new(device_path: impl Into<String>) -> Self {
        Self {
            device_path: device_path.into(),
        }
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

impl CaptureProvider for CameraProvider {
    type Stream = CameraStream;

    fn acquire(&mut self, constraints: &CaptureConstraints) -> Result<CameraStream, DeviceError> {
        let camera = Camera::open(&self.device_path, constraints)?;
        let stream = camera.start_stream()?;
        Ok(CameraStream { camera, stream })
    }

    fn release(&mut self, mut stream: CameraStream) -> Result<(), DeviceError> {
        tracing::debug!(device = %self.device_path, "stopping capture stream");
        // The device handle itself closes when `stream` drops.
        Stream::stop(&mut stream.stream)
            .map_err(|e| DeviceError::ReleaseFailed(format!("{}: {e}", self.device_path)))
    }
}
