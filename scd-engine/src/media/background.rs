//! Background fallback chain
//!
//! preferred kind -> counterpart kind -> custom background -> bundled default
//! image -> solid color. The chain always ends in something drawable.

use std::path::PathBuf;

use scd_common::display::{ArtSource, Background, Color};

use super::resolver::{resolve_with_fallback, MediaKind, MediaResolver, MediaTarget};
use crate::config::BackgroundSource;
use crate::error::Result;

/// Inputs for one background lookup
#[derive(Debug, Clone)]
pub struct BackgroundRequest {
    /// `None` skips artwork and starts at the custom/default images
    pub target: Option<MediaTarget>,
    pub source: BackgroundSource,
    pub custom_background: Option<PathBuf>,
    pub default_background: Option<PathBuf>,
    pub solid_color: Color,
}

impl BackgroundRequest {
    /// Whether the result is known without any file-system access
    pub fn is_immediate(&self) -> bool {
        self.source == BackgroundSource::SolidColor
    }
}

/// Walk the fallback chain
pub fn resolve_background(
    resolver: &dyn MediaResolver,
    request: &BackgroundRequest,
) -> Result<Background> {
    let artwork_kind = match request.source {
        BackgroundSource::SolidColor => {
            return Ok(Background::SolidColor {
                color: request.solid_color,
            })
        }
        // Custom image never looks up artwork
        BackgroundSource::CustomImage => None,
        BackgroundSource::Fanart => Some(MediaKind::Fanart),
        BackgroundSource::Screenshot => Some(MediaKind::Screenshot),
    };

    if let (Some(kind), Some(target)) = (artwork_kind, &request.target) {
        if let Some((path, found)) =
            resolve_with_fallback(resolver, target, kind, kind.counterpart())?
        {
            let source = match found {
                MediaKind::Screenshot => ArtSource::Screenshot,
                _ => ArtSource::Fanart,
            };
            return Ok(Background::Image { path, source });
        }
    }

    if let Some(path) = request
        .custom_background
        .as_ref()
        .filter(|p| resolver.file_exists(p))
    {
        return Ok(Background::Image {
            path: path.clone(),
            source: ArtSource::CustomImage,
        });
    }

    if let Some(path) = request
        .default_background
        .as_ref()
        .filter(|p| resolver.file_exists(p))
    {
        return Ok(Background::Image {
            path: path.clone(),
            source: ArtSource::DefaultImage,
        });
    }

    Ok(Background::SolidColor {
        color: request.solid_color.opaque(),
    })
}
