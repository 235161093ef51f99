//! Polling a frame stream until a QR symbol shows up.

use std::time::{Duration, Instant};

use image::DynamicImage;

use crate::error::AcquireError;
use crate::scan::{first_symbol, SymbolScanner};

/// A blocking stream of frames. `None` means the stream has ended.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<DynamicImage>;
}

/// Bounds for the polling loop. With no bound set the loop runs until a
/// symbol is found or the stream ends.
///
/// Both bounds are checked between frames only: a frame read that blocks
/// inside the capture backend is not interrupted by `timeout`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraOptions {
    pub timeout: Option<Duration>,
    pub max_frames: Option<u64>,
}

impl CameraOptions {
    fn exhausted(&self, started: Instant, polled: u64) -> bool {
        self.max_frames.map_or(false, |max| polled >= max)
            || self.timeout.map_or(false, |t| started.elapsed() >= t)
    }
}

pub fn scan_frames<F, S>(
    frames: &mut F,
    scanner: &S,
    options: &CameraOptions,
) -> Result<String, AcquireError>
where
    F: FrameSource,
    S: SymbolScanner,
{
    let started = Instant::now();
    let mut polled = 0u64;

    loop {
        if options.exhausted(started, polled) {
            return Err(AcquireError::Timeout { frames: polled });
        }

        let frame = frames.next_frame().ok_or(AcquireError::StreamClosed)?;
        polled += 1;
        log::trace!("frame {} ({}x{})", polled, frame.width(), frame.height());

        if let Some(symbol) = first_symbol(scanner.scan(&frame)) {
            log::debug!("qr code found after {} frames", polled);
            return Ok(symbol);
        }
    }
}

#[cfg(feature = "camera")]
mod device {
    use image::{DynamicImage, RgbImage};
    use nokhwa::pixel_format::RgbFormat;
    use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
    use nokhwa::{Camera, NokhwaError};

    use super::FrameSource;
    use crate::error::AcquireError;

    /// An open capture device. The stream is stopped on drop.
    pub struct Webcam {
        camera: Camera,
    }

    impl Webcam {
        pub fn open(id: u32) -> Result<Webcam, AcquireError> {
            let open_err = |e: NokhwaError| AcquireError::CameraOpen {
                id,
                reason: e.to_string(),
            };

            let format = RequestedFormat::new::<RgbFormat>(
                RequestedFormatType::AbsoluteHighestFrameRate,
            );
            let mut camera =
                Camera::new(CameraIndex::Index(id), format).map_err(open_err)?;
            camera.open_stream().map_err(open_err)?;
            log::info!("camera {} opened, waiting for a qr code", id);

            Ok(Webcam { camera })
        }
    }

    impl FrameSource for Webcam {
        fn next_frame(&mut self) -> Option<DynamicImage> {
            loop {
                let buffer = match self.camera.frame() {
                    Ok(buffer) => buffer,
                    Err(e) => {
                        log::debug!("camera stream ended: {}", e);
                        return None;
                    }
                };
                match buffer.decode_image::<RgbFormat>() {
                    Ok(rgb) => {
                        let (width, height) = (rgb.width(), rgb.height());
                        return RgbImage::from_raw(width, height, rgb.into_raw())
                            .map(DynamicImage::ImageRgb8);
                    }
                    Err(e) => log::debug!("dropping undecodable frame: {}", e),
                }
            }
        }
    }

    impl Drop for Webcam {
        fn drop(&mut self) {
            if let Err(e) = self.camera.stop_stream() {
                log::warn!("failed to stop camera stream: {}", e);
            }
        }
    }
}

#[cfg(feature = "camera")]
pub use device::Webcam;

#[cfg(feature = "camera")]
pub fn read_qr_from_camera<S: SymbolScanner>(
    id: u32,
    options: &CameraOptions,
    scanner: &S,
) -> Result<String, AcquireError> {
    let mut webcam = Webcam::open(id)?;
    scan_frames(&mut webcam, scanner, options)
}

#[cfg(not(feature = "camera"))]
pub fn read_qr_from_camera<S: SymbolScanner>(
    _id: u32,
    _options: &CameraOptions,
    _scanner: &S,
) -> Result<String, AcquireError> {
    Err(AcquireError::CameraUnsupported)
}
