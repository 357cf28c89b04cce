//! Display model shared between the engine and renderers

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// ARGB color, written as `#RRGGBB` or `#AARRGGBB`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Color = Color(0xFF00_0000);

    pub fn alpha(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Force full opacity; the terminal fallback must never be see-through
    pub fn opaque(self) -> Color {
        Color(self.0 | 0xFF00_0000)
    }
}

impl Default for Color {
    fn default() -> Self {
        // Dark slate, the default solid background
        Color(0xFF1A_1A1A)
    }
}

impl FromStr for Color {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        let value = u32::from_str_radix(hex, 16)
            .map_err(|_| Error::InvalidInput(format!("invalid color '{}'", s)))?;
        match hex.len() {
            6 => Ok(Color(0xFF00_0000 | value)),
            8 => Ok(Color(value)),
            _ => Err(Error::InvalidInput(format!("invalid color '{}'", s))),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.alpha() == 0xFF {
            write!(f, "#{:06X}", self.0 & 0x00FF_FFFF)
        } else {
            write!(f, "#{:08X}", self.0)
        }
    }
}

impl Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Where a displayed background image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtSource {
    Fanart,
    Screenshot,
    CustomImage,
    DefaultImage,
}

/// Background shown behind widgets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Background {
    Image { path: PathBuf, source: ArtSource },
    SolidColor { color: Color },
}

impl Background {
    pub fn image_path(&self) -> Option<&PathBuf> {
        match self {
            Background::Image { path, .. } => Some(path),
            Background::SolidColor { .. } => None,
        }
    }
}

/// Ambient music source
///
/// Compared after fallback: a system with no tracks resolves to `Generic`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "source", content = "name", rename_all = "snake_case")]
pub enum MusicSource {
    Generic,
    System(String),
}

impl fmt::Display for MusicSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MusicSource::Generic => write!(f, "generic"),
            MusicSource::System(name) => write!(f, "system:{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parse_rgb() {
        let c: Color = "#336699".parse().unwrap();
        assert_eq!(c, Color(0xFF33_6699));
        assert_eq!(c.to_string(), "#336699");
    }

    #[test]
    fn test_color_parse_argb() {
        let c: Color = "80FF0000".parse().unwrap();
        assert_eq!(c.alpha(), 0x80);
        assert_eq!(c.to_string(), "#80FF0000");
        assert_eq!(c.opaque().alpha(), 0xFF);
    }

    #[test]
    fn test_color_parse_invalid() {
        assert!("#12345".parse::<Color>().is_err());
        assert!("zzzzzz".parse::<Color>().is_err());
    }

    #[test]
    fn test_music_source_display() {
        assert_eq!(MusicSource::Generic.to_string(), "generic");
        assert_eq!(MusicSource::System("nes".into()).to_string(), "system:nes");
    }
}
