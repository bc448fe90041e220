//! Camera seam.
//!
//! The perception loop owns the camera for its whole life: it calls the
//! `CameraOpener` on its own thread, reads frames, and releases the handle
//! before exiting. Handles therefore don't need to be `Send`.

use crate::error::CameraError;
use crate::types::VideoFrame;

/// An opened capture device.
pub trait Camera {
    fn name(&self) -> String;

    /// Request a capture size. Devices may ignore or round the request.
    fn configure(&mut self, width: u32, height: u32) -> Result<(), CameraError>;

    /// Blocking read of the next frame. `Err` is transient: the caller skips
    /// the iteration and tries again.
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError>;

    fn release(&mut self);
}

/// Opens the device at the given index. Runs on the perception thread.
pub type CameraOpener = Box<dyn FnOnce(u32) -> Result<Box<dyn Camera>, CameraError> + Send>;

#[cfg(feature = "camera")]
pub use device::DeviceCamera;

#[cfg(feature = "camera")]
mod device {
    use super::Camera;
    use crate::error::CameraError;
    use crate::types::{PixelFormat, VideoFrame};
    use log::{info, warn};
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType, Resolution};

    /// Webcam via nokhwa's native backend.
    pub struct DeviceCamera {
        inner: nokhwa::Camera,
        index: u32,
        streaming: bool,
    }

    impl DeviceCamera {
        pub fn open(index: u32) -> Result<Self, CameraError> {
            let requested =
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
            let mut inner = nokhwa::Camera::new(CameraIndex::Index(index), requested).map_err(|e| {
                CameraError::NotFound {
                    index,
                    reason: e.to_string(),
                }
            })?;
            inner.open_stream().map_err(|e| CameraError::NotFound {
                index,
                reason: e.to_string(),
            })?;
            info!("Camera {} opened: {}", index, inner.info().human_name());
            Ok(Self {
                inner,
                index,
                streaming: true,
            })
        }

        /// `CameraOpener` for the physical device.
        pub fn opener() -> super::CameraOpener {
            Box::new(|index| Ok(Box::new(DeviceCamera::open(index)?) as Box<dyn Camera>))
        }
    }

    impl Camera for DeviceCamera {
        fn name(&self) -> String {
            format!("{} (#{})", self.inner.info().human_name(), self.index)
        }

        fn configure(&mut self, width: u32, height: u32) -> Result<(), CameraError> {
            self.inner
                .set_resolution(Resolution::new(width, height))
                .map_err(|e| CameraError::Configure {
                    width,
                    height,
                    reason: e.to_string(),
                })?;
            let actual = self.inner.resolution();
            if actual.width() != width || actual.height() != height {
                warn!(
                    "Camera delivers {}x{} instead of {}x{}",
                    actual.width(),
                    actual.height(),
                    width,
                    height
                );
            }
            Ok(())
        }

        fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
            let buffer = self.inner.frame().map_err(|e| CameraError::Read(e.to_string()))?;
            let image = buffer
                .decode_image::<RgbFormat>()
                .map_err(|e| CameraError::Read(e.to_string()))?;
            let (w, h) = (image.width(), image.height());
            Ok(VideoFrame::new(w, h, PixelFormat::Rgb, image.into_raw()))
        }

        fn release(&mut self) {
            if !self.streaming {
                return;
            }
            self.streaming = false;
            match self.inner.stop_stream() {
                Ok(()) => info!("Camera {} released", self.index),
                Err(e) => warn!("Camera {} release failed: {}", self.index, e),
            }
        }
    }
}
