use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::acquire::Source;
use crate::camera::CameraOptions;
use crate::error::ArgError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Read the payload from standard input
    Input,
    /// Take the payload from --payload
    Arg,
    /// Scan the QR code in --image_path
    Image,
    /// Scan camera frames until a QR code shows up (frames are not displayed)
    Camera,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Output {
    /// The whole decoded payload as indented JSON
    Json,
    /// The typed health certificate only
    Certificate,
}

/// Decode EU Digital COVID Certificate QR codes.
///
/// The COSE signature is not verified.
#[derive(Parser, Debug)]
#[command(name = "eudcc-reader", version, about)]
pub struct Cli {
    /// The input modality.
    #[arg(value_enum, default_value_t = Mode::Input)]
    pub mode: Mode,

    /// The qr-code content. Used only when mode is `arg`.
    #[arg(long)]
    pub payload: Option<String>,

    /// The qr-code image path. Used only when mode is `image`.
    #[arg(long = "image_path")]
    pub image_path: Option<PathBuf>,

    /// The camera id. Used only when mode is `camera`.
    #[arg(long = "camera_id", default_value_t = 0)]
    pub camera_id: u32,

    /// Give up scanning camera frames after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Give up after scanning this many camera frames.
    #[arg(long = "max_frames")]
    pub max_frames: Option<u64>,

    #[arg(long, value_enum, default_value_t = Output::Json)]
    pub output: Output,
}

impl Cli {
    pub fn source(&self) -> Result<Source, ArgError> {
        match self.mode {
            Mode::Input => Ok(Source::Stdin),
            Mode::Arg => self
                .payload
                .clone()
                .map(Source::Arg)
                .ok_or(ArgError::MissingPayload),
            Mode::Image => self
                .image_path
                .clone()
                .map(Source::Image)
                .ok_or(ArgError::MissingImagePath),
            Mode::Camera => Ok(Source::Camera {
                id: self.camera_id,
                options: CameraOptions {
                    timeout: self.timeout.map(Duration::from_secs),
                    max_frames: self.max_frames,
                },
            }),
        }
    }
}
