// src/config.rs
use crate::compose::ChannelOrder;
use anyhow::{Context, Result};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub retarget: RetargetConfig,
    pub segmentation: SegmentationConfig,
    pub capture: CaptureConfig,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetargetConfig {
    // Fold the legs into a sitting pose every frame.
    pub seated_posture: bool,
    // Damp the avatar leaning back further than the person does.
    pub lean_adjust: bool,
    // Pin the root's vertical position to `draw_height`; the sensor's height
    // above the floor is not known reliably.
    pub fix_draw_height: bool,
    pub draw_height: f32, // meters
    // Skeleton meters to avatar modeling units, per axis.
    pub translation_scale: [f32; 3],
}

impl Default for RetargetConfig {
    fn default() -> Self {
        Self {
            seated_posture: false,
            lean_adjust: false,
            fix_draw_height: false,
            draw_height: 0.8,
            translation_scale: [40.0, 40.0, 40.0],
        }
    }
}

impl RetargetConfig {
    pub fn fixed_draw_height(&self) -> Option<f32> {
        self.fix_draw_height.then_some(self.draw_height)
    }

    pub fn scale(&self) -> Vector3<f32> {
        Vector3::from(self.translation_scale)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub depth_width: u32,
    pub depth_height: u32,
    pub color_width: u32,
    pub color_height: u32,
    // Color resolution over depth resolution; mapped color coordinates are divided
    // by this before they index the mask.
    pub color_to_depth_divisor: i32,
    // Byte order of the sensor's raw color pixels.
    pub channel_order: ChannelOrder,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            depth_width: 640,
            depth_height: 480,
            color_width: 640,
            color_height: 480,
            color_to_depth_divisor: 1,
            channel_order: ChannelOrder::Bgra,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub output_directory: PathBuf,
    pub file_prefix: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_directory: directories::UserDirs::new()
                .and_then(|dirs| dirs.document_dir().map(|p| p.join("AvatarMirror")))
                .unwrap_or_else(|| PathBuf::from("./output")),
            file_prefix: "snapshot".to_string(),
        }
    }
}
