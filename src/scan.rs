use image::{DynamicImage, GrayImage};

/// Locates and decodes the QR symbols present in an image.
pub trait SymbolScanner {
    fn scan(&self, image: &DynamicImage) -> Vec<String>;
}

pub struct QrScanner {
    decoder: bardecoder::Decoder<DynamicImage, GrayImage, String>,
}

impl Default for QrScanner {
    fn default() -> Self {
        QrScanner {
            decoder: bardecoder::default_decoder(),
        }
    }
}

impl SymbolScanner for QrScanner {
    fn scan(&self, image: &DynamicImage) -> Vec<String> {
        self.decoder
            .decode(image)
            .into_iter()
            .filter_map(|result| match result {
                Ok(text) => Some(text),
                Err(e) => {
                    log::debug!("skipping unreadable qr code: {}", e);
                    None
                }
            })
            .collect()
    }
}

/// Picks the first symbol, warning when there were more.
pub fn first_symbol(symbols: Vec<String>) -> Option<String> {
    if symbols.len() > 1 {
        log::warn!(
            "Multiple QRs detected ({}), loading the first one only.",
            symbols.len()
        );
    }
    symbols.into_iter().next()
}
