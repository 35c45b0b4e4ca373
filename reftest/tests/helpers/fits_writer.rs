//! Minimal FITS file writer
//!
//! Writes header-only HDUs with string-valued cards; enough for the
//! extractor and the match engine. `write_raw_header` writes arbitrary,
//! possibly invalid, cards.

use anyhow::Result;
use std::path::{Path, PathBuf};

const BLOCK: usize = 2880;

/// One header unit
#[derive(Debug, Clone, Default)]
pub struct Hdu {
    cards: Vec<(String, String)>,
}

impl Hdu {
    pub fn new() -> Self {
        Self::default()
    }

    /// String-valued card
    pub fn card(mut self, key: &str, value: &str) -> Self {
        self.cards.push((key.to_string(), value.to_string()));
        self
    }

    fn to_bytes(&self, primary: bool) -> Vec<u8> {
        let mut text = String::new();
        if primary {
            text.push_str(&format!("{:<80}", format!("{:<8}= {:>20}", "SIMPLE", "T")));
        } else {
            text.push_str(&format!("{:<80}", format!("{:<8}= 'IMAGE   '", "XTENSION")));
        }
        text.push_str(&format!("{:<80}", format!("{:<8}= {:>20}", "BITPIX", 8)));
        text.push_str(&format!("{:<80}", format!("{:<8}= {:>20}", "NAXIS", 0)));
        if !primary {
            text.push_str(&format!("{:<80}", format!("{:<8}= {:>20}", "PCOUNT", 0)));
            text.push_str(&format!("{:<80}", format!("{:<8}= {:>20}", "GCOUNT", 1)));
        }

        for (key, value) in &self.cards {
            let quoted = format!("'{:<8}'", value.replace('\'', "''"));
            text.push_str(&format!("{:<80}", format!("{:<8}= {}", key, quoted)));
        }
        text.push_str(&format!("{:<80}", "END"));
        pad_to_block(text).into_bytes()
    }
}

fn pad_to_block(mut text: String) -> String {
    while text.len() % BLOCK != 0 {
        text.push(' ');
    }
    text
}

/// Header block made of `cards` exactly as given, mandatory keywords included
pub fn write_raw_header(path: &Path, cards: &[&str]) -> Result<PathBuf> {
    let mut text: String = cards.iter().map(|c| format!("{:<80}", c)).collect();
    text.push_str(&format!("{:<80}", "END"));
    std::fs::write(path, pad_to_block(text))?;
    Ok(path.to_path_buf())
}

/// Write `hdus` (first is primary) to `path`
pub fn write_fits(path: &Path, hdus: &[Hdu]) -> Result<PathBuf> {
    let mut bytes = Vec::new();
    for (i, hdu) in hdus.iter().enumerate() {
        bytes.extend(hdu.to_bytes(i == 0));
    }
    std::fs::write(path, bytes)?;
    Ok(path.to_path_buf())
}

/// Single-HDU exposure for `instrument` with extra cards
pub fn write_exposure(dir: &Path, name: &str, instrument: &str, cards: &[(&str, &str)]) -> Result<PathBuf> {
    let hdu = cards.iter().fold(
        Hdu::new()
            .card("TELESCOP", "JWST")
            .card("INSTRUME", instrument)
            .card("DATE-OBS", "2017-01-01")
            .card("TIME-OBS", "00:00:00"),
        |hdu, (k, v)| hdu.card(k, v),
    );
    write_fits(&dir.join(name), &[hdu])
}

/// Reference file for (`instrument`, `reftype`) with extra cards
pub fn write_reference(
    dir: &Path,
    name: &str,
    instrument: &str,
    reftype: &str,
    cards: &[(&str, &str)],
) -> Result<PathBuf> {
    let hdu = cards.iter().fold(
        Hdu::new().card("INSTRUME", instrument).card("REFTYPE", reftype),
        |hdu, (k, v)| hdu.card(k, v),
    );
    write_fits(&dir.join(name), &[hdu])
}
