// src/compose.rs - Turns a color frame plus foreground mask into a capture image
use crate::error::ComposeError;
use crate::segment::ForegroundMask;
use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelOrder {
    Bgra,
    Rgba,
}

impl ChannelOrder {
    // Red, green and blue out of one raw pixel. The fourth byte is ignored; the
    // sensor leaves it at zero.
    fn rgb(self, raw: &[u8]) -> [u8; 3] {
        match self {
            ChannelOrder::Bgra => [raw[2], raw[1], raw[0]],
            ChannelOrder::Rgba => [raw[0], raw[1], raw[2]],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColorFrame {
    pub width: u32,
    pub height: u32,
    pub order: ChannelOrder,
    pub data: Vec<u8>,
}

impl ColorFrame {
    pub const BYTES_PER_PIXEL: usize = 4;

    pub fn new(width: u32, height: u32, order: ChannelOrder, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            order,
            data,
        }
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * Self::BYTES_PER_PIXEL
    }

    fn validate(&self) -> Result<(), ComposeError> {
        if self.data.len() != self.expected_len() {
            return Err(ComposeError::ColorBufferSize {
                width: self.width,
                height: self.height,
                expected: self.expected_len(),
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

// Integer factor between the color frame and a mask built at depth resolution.
fn mask_factor(color: &ColorFrame, mask: &ForegroundMask) -> Result<u32, ComposeError> {
    let mismatch = || ComposeError::MaskSize {
        width: color.width,
        height: color.height,
        mask_width: mask.width(),
        mask_height: mask.height(),
    };

    if mask.width() == 0 || mask.height() == 0 || color.width % mask.width() != 0 {
        return Err(mismatch());
    }
    let factor = color.width / mask.width();
    if factor == 0 || mask.height() * factor != color.height {
        return Err(mismatch());
    }
    Ok(factor)
}

// Foreground-only capture: masked pixels are copied in RGBA order with full
// opacity, everything else is left fully transparent.
pub fn compose(color: &ColorFrame, mask: &ForegroundMask) -> Result<RgbaImage, ComposeError> {
    compose_with(color, mask, |_x, _y| Rgba([0, 0, 0, 0]))
}

// Capture composited over `background`: masked pixels come from the camera,
// the rest straight from the background. No blending at the mask edge.
pub fn compose_onto(
    color: &ColorFrame,
    mask: &ForegroundMask,
    background: &RgbaImage,
) -> Result<RgbaImage, ComposeError> {
    if background.dimensions() != (color.width, color.height) {
        return Err(ComposeError::BackgroundSize {
            width: color.width,
            height: color.height,
            actual_width: background.width(),
            actual_height: background.height(),
        });
    }
    compose_with(color, mask, |x, y| *background.get_pixel(x, y))
}

fn compose_with<F>(color: &ColorFrame, mask: &ForegroundMask, outside: F) -> Result<RgbaImage, ComposeError>
where
    F: Fn(u32, u32) -> Rgba<u8>,
{
    color.validate()?;
    let factor = mask_factor(color, mask)?;

    let image = RgbaImage::from_fn(color.width, color.height, |x, y| {
        if mask.is_opaque(x / factor, y / factor) {
            let offset = (y as usize * color.width as usize + x as usize) * ColorFrame::BYTES_PER_PIXEL;
            let [r, g, b] = color.order.rgb(&color.data[offset..offset + ColorFrame::BYTES_PER_PIXEL]);
            Rgba([r, g, b, u8::MAX])
        } else {
            outside(x, y)
        }
    });

    Ok(image)
}

pub struct SnapshotWriter {
    directory: PathBuf,
    prefix: String,
    next_index: u32,
}

impl SnapshotWriter {
    pub fn new(directory: impl AsRef<Path>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            prefix: prefix.into(),
            next_index: 0,
        }
    }

    pub fn next_path(&self) -> PathBuf {
        self.directory
            .join(format!("{}-{}.png", self.prefix, self.next_index))
    }

    pub fn save(&mut self, image: &RgbaImage) -> Result<PathBuf> {
        fs::create_dir_all(&self.directory)
            .with_context(|| format!("Cannot create capture directory {}", self.directory.display()))?;

        let path = self.next_path();
        image
            .save(&path)
            .with_context(|| format!("Failed to write capture {}", path.display()))?;

        self.next_index += 1;
        info!("Saved capture {}", path.display());
        Ok(path)
    }
}
