//! Overlay widget model
//!
//! Widgets are user-positioned overlays persisted independently of the
//! browsing state. Positions are stored as percentages of the screen so a
//! layout survives resolution changes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::display::Color;

/// Layout partition a widget belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WidgetContext {
    System,
    Game,
}

impl std::fmt::Display for WidgetContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WidgetContext::System => write!(f, "SYSTEM"),
            WidgetContext::Game => write!(f, "GAME"),
        }
    }
}

/// What a widget displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WidgetImageType {
    SystemLogo,
    Marquee,
    Box2d,
    Box3d,
    BackCover,
    Fanart,
    Screenshot,
    TitleScreen,
    PhysicalMedia,
    GameDescription,
    ColorBackground,
    CustomImage,
    RandomFanart,
    RandomScreenshot,
}

impl WidgetImageType {
    pub fn all_variants() -> &'static [WidgetImageType] {
        &[
            WidgetImageType::SystemLogo,
            WidgetImageType::Marquee,
            WidgetImageType::Box2d,
            WidgetImageType::Box3d,
            WidgetImageType::BackCover,
            WidgetImageType::Fanart,
            WidgetImageType::Screenshot,
            WidgetImageType::TitleScreen,
            WidgetImageType::PhysicalMedia,
            WidgetImageType::GameDescription,
            WidgetImageType::ColorBackground,
            WidgetImageType::CustomImage,
            WidgetImageType::RandomFanart,
            WidgetImageType::RandomScreenshot,
        ]
    }

    /// Random widgets pick a folder-level image instead of a per-game one
    pub fn is_random(&self) -> bool {
        matches!(
            self,
            WidgetImageType::RandomFanart | WidgetImageType::RandomScreenshot
        )
    }
}

/// How the image is fitted into the widget frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleType {
    #[default]
    Fit,
    Crop,
    Stretch,
}

/// Resolution-independent widget frame, each value in 0.0..=100.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionPercent {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PositionPercent {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x: x.clamp(0.0, 100.0),
            y: y.clamp(0.0, 100.0),
            width: width.clamp(0.0, 100.0),
            height: height.clamp(0.0, 100.0),
        }
    }
}

/// A persisted overlay widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: Uuid,
    pub image_type: WidgetImageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solid_color: Option<Color>,
    pub position: PositionPercent,
    pub z_index: i32,
    pub context: WidgetContext,
    #[serde(default)]
    pub scale_type: ScaleType,
}

impl Widget {
    pub fn new(image_type: WidgetImageType, context: WidgetContext, position: PositionPercent) -> Self {
        Self {
            id: Uuid::new_v4(),
            image_type,
            image_path: None,
            solid_color: None,
            position,
            z_index: 0,
            context,
            scale_type: ScaleType::default(),
        }
    }
}

/// Content a renderer should draw for a widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WidgetContent {
    Image { path: PathBuf },
    Text { text: String },
    SolidColor { color: Color },
    /// Nothing to show for the current state; the frame stays empty
    Empty,
}

/// Widget paired with its resolved content, in paint order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedWidget {
    pub widget: Widget,
    pub content: WidgetContent,
}
