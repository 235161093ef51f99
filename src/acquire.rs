use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use crate::camera::{read_qr_from_camera, CameraOptions};
use crate::error::AcquireError;
use crate::scan::{first_symbol, QrScanner, SymbolScanner};

/// Where the raw `HC1:` text comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Stdin,
    Arg(String),
    Image(PathBuf),
    Camera { id: u32, options: CameraOptions },
}

impl Source {
    pub fn acquire(self) -> Result<String, AcquireError> {
        self.acquire_with(&QrScanner::default())
    }

    pub fn acquire_with<S: SymbolScanner>(self, scanner: &S) -> Result<String, AcquireError> {
        match self {
            Source::Stdin => {
                let stdin = io::stdin();
                let lock = stdin.lock();
                read_payload_line(lock)
            }
            Source::Arg(payload) => Ok(payload),
            Source::Image(path) => read_qr_from_image(&path, scanner),
            Source::Camera { id, options } => read_qr_from_camera(id, &options, scanner),
        }
    }
}

/// Reads a single line, without its line terminator.
pub fn read_payload_line<R: BufRead>(mut reader: R) -> Result<String, AcquireError> {
    let mut line = String::new();
    let read = reader.read_line(&mut line).map_err(AcquireError::Stdin)?;
    if read == 0 {
        return Err(AcquireError::EmptyInput);
    }
    let trimmed = line.trim_end_matches(&['\r', '\n'][..]).len();
    line.truncate(trimmed);
    Ok(line)
}

pub fn read_qr_from_image<S: SymbolScanner>(
    path: &Path,
    scanner: &S,
) -> Result<String, AcquireError> {
    let img = image::open(path).map_err(|source| AcquireError::ImageOpen {
        path: path.to_path_buf(),
        source,
    })?;

    first_symbol(scanner.scan(&img)).ok_or(AcquireError::NoSymbol)
}
