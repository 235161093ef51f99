//! Decoder for EU Digital COVID Certificate QR codes.
//!
//! A payload is acquired from stdin, an argument, an image or a camera,
//! then unwrapped layer by layer (`HC1:` marker, Base45, zlib, COSE_Sign1,
//! CBOR) and printed as JSON.
//!
//! Signatures are **not** verified. The decoded document must not be trusted
//! as proof of anything.

pub mod acquire;
pub mod camera;
pub mod cli;
pub mod error;
pub mod eudcc;
pub mod logger;
pub mod present;
pub mod scan;

pub use acquire::Source;
pub use error::{AcquireError, ArgError, DecodeError};
pub use eudcc::{decode, Certificate, Decoded, Envelope};
