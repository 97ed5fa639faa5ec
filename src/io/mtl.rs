//! Landsat scene metadata (MTL) reader.
//!
//! Accepts the classic `KEY = "VALUE"` text layout and the Collection-2
//! `*_MTL.xml` layout, where every leaf element becomes a key.
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::Error;

#[derive(Debug, Error)]
pub enum MtlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Value of `{key}` is not a number: {value:?}")]
    InvalidNumber { key: String, value: String },
    #[error("No metadata entries found in {0}")]
    Empty(String),
}

/// Parsed scene metadata. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct SceneMetadata {
    values: HashMap<String, String>,
}

impl SceneMetadata {
    /// Read a text or XML MTL file, picking the parser by extension or content.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, MtlError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let is_xml = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("xml"))
            .unwrap_or(false)
            || text.trim_start().starts_with('<');
        let meta = if is_xml {
            Self::parse_xml(&text)?
        } else {
            Self::parse_text(&text)
        };
        if meta.values.is_empty() {
            return Err(MtlError::Empty(path.display().to_string()));
        }
        info!(
            "Read {} metadata entries from {}",
            meta.values.len(),
            path.display()
        );
        Ok(meta)
    }

    /// `KEY = VALUE` per line; surrounding quotes are stripped and group markers ignored.
    pub fn parse_text(text: &str) -> Self {
        let mut values = HashMap::new();
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() || key == "GROUP" || key == "END_GROUP" {
                continue;
            }
            let value = value.trim().trim_matches('"');
            values.insert(key.to_string(), value.to_string());
        }
        Self { values }
    }

    /// Collection-2 XML: leaf element name -> text content.
    pub fn parse_xml(text: &str) -> Result<Self, MtlError> {
        let mut reader = Reader::from_reader(text.as_bytes());
        reader.trim_text(true);
        let mut buf = Vec::new();
        let mut values = HashMap::new();
        let mut curr: Option<String> = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    curr = Some(String::from_utf8_lossy(e.name().as_ref()).to_string());
                }
                Event::Text(e) => {
                    if let Some(tag) = curr.as_ref() {
                        let txt = e.unescape()?;
                        values.insert(tag.clone(), txt.trim().to_string());
                    }
                }
                Event::End(_) => curr = None,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        debug!("Parsed {} XML metadata leaves", values.len());
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_str(&self, key: &str) -> crate::Result<&str> {
        self.get(key)
            .ok_or_else(|| Error::MissingMetadataKey(key.to_string()))
    }

    pub fn get_f64(&self, key: &str) -> crate::Result<f64> {
        let raw = self.get_str(key)?;
        raw.trim().parse::<f64>().map_err(|_| {
            Error::Mtl(MtlError::InvalidNumber {
                key: key.to_string(),
                value: raw.to_string(),
            })
        })
    }

    /// `{prefix}_{band}` as a number; `None` when absent or not numeric.
    pub fn band_f64(&self, prefix: &str, band: u8) -> Option<f64> {
        self.get(&format!("{}_{}", prefix, band))
            .and_then(|v| v.trim().parse().ok())
    }

    /// Reflectance (mult, add) pair for a band, if both are present.
    pub fn reflectance_coefficients(&self, band: u8) -> Option<(f64, f64)> {
        Some((
            self.band_f64("REFLECTANCE_MULT_BAND", band)?,
            self.band_f64("REFLECTANCE_ADD_BAND", band)?,
        ))
    }

    /// Sun elevation in degrees.
    pub fn sun_elevation(&self) -> crate::Result<f64> {
        self.get_f64("SUN_ELEVATION")
    }

    /// Earth-Sun distance in astronomical units.
    pub fn earth_sun_distance(&self) -> crate::Result<f64> {
        self.get_f64("EARTH_SUN_DISTANCE")
    }

    pub fn scene_id(&self) -> Option<&str> {
        self.get("LANDSAT_PRODUCT_ID")
            .or_else(|| self.get("LANDSAT_SCENE_ID"))
    }
}
