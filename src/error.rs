use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of the header check and of the four unwrapping stages.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid QR code header: data must start with {0} prefix")]
    InvalidHeader(&'static str),
    #[error("base45 decoding failed: {0}")]
    Base45(String),
    #[error("zlib inflation failed")]
    Inflate(#[source] io::Error),
    #[error("not a COSE_Sign1 envelope")]
    Envelope(#[source] serde_cbor::Error),
    #[error("envelope payload is not valid CBOR")]
    Payload(#[source] serde_cbor::Error),
    #[error("can't find the EU Digital COVID Certificate in the payload")]
    MissingCertificate,
    #[error("can't decode the EU Digital COVID Certificate")]
    Certificate(#[source] serde_cbor::Error),
}

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("unable to read payload from standard input")]
    Stdin(#[source] io::Error),
    #[error("standard input closed before a payload was entered")]
    EmptyInput,
    #[error("unable to open image from path: {}", path.display())]
    ImageOpen {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no qr code detected in the loaded image")]
    NoSymbol,
    #[error("unable to open stream from camera with id: {id}: {reason}")]
    CameraOpen { id: u32, reason: String },
    #[error("camera support is not compiled in (enable the `camera` feature)")]
    CameraUnsupported,
    #[error("video stream closed without detecting any qr code")]
    StreamClosed,
    #[error("no qr code detected after {frames} frames")]
    Timeout { frames: u64 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgError {
    #[error("missing `payload` argument")]
    MissingPayload,
    #[error("missing `image_path` argument")]
    MissingImagePath,
}
