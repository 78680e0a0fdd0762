// src/segment.rs - Depth-guided foreground mask in color-image space
use crate::error::SegmentError;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepthPixel {
    pub depth: u16, // millimeters
    // 0 when no tracked person covers the pixel.
    pub player_index: u8,
}

impl DepthPixel {
    const PLAYER_INDEX_BITS: u16 = 3;
    const PLAYER_INDEX_MASK: u16 = (1 << Self::PLAYER_INDEX_BITS) - 1;

    pub fn new(depth: u16, player_index: u8) -> Self {
        Self { depth, player_index }
    }

    // Decodes the sensor's packed format: player index in the low 3 bits, depth
    // in millimeters above them.
    pub fn from_packed(raw: u16) -> Self {
        Self {
            depth: raw >> Self::PLAYER_INDEX_BITS,
            player_index: (raw & Self::PLAYER_INDEX_MASK) as u8,
        }
    }

    pub fn has_player(&self) -> bool {
        self.player_index > 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<DepthPixel>,
}

impl DepthFrame {
    pub fn new(width: u32, height: u32, pixels: Vec<DepthPixel>) -> Result<Self, SegmentError> {
        let frame = Self { width, height, pixels };
        frame.validate()?;
        Ok(frame)
    }

    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![DepthPixel::default(); width as usize * height as usize],
        }
    }

    pub fn from_packed(width: u32, height: u32, raw: &[u16]) -> Result<Self, SegmentError> {
        Self::new(width, height, raw.iter().map(|&r| DepthPixel::from_packed(r)).collect())
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn validate(&self) -> Result<(), SegmentError> {
        if self.pixels.len() != self.expected_len() {
            return Err(SegmentError::DepthBufferSize {
                width: self.width,
                height: self.height,
                expected: self.expected_len(),
                actual: self.pixels.len(),
            });
        }
        Ok(())
    }

    pub fn get(&self, x: u32, y: u32) -> Option<DepthPixel> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }

    pub fn set(&mut self, x: u32, y: u32, pixel: DepthPixel) {
        if x < self.width && y < self.height {
            let index = (y * self.width + x) as usize;
            self.pixels[index] = pixel;
        }
    }
}

// Pixel in the color image. Signed because the sensor reports points that land
// outside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ColorPoint {
    pub x: i32,
    pub y: i32,
}

impl ColorPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

// Depth-to-color registration supplied by the sensor. `None` means the sensor has
// no color pixel for that depth sample.
pub trait CoordinateMapper {
    fn depth_to_color(&self, x: u32, y: u32, pixel: DepthPixel) -> Option<ColorPoint>;
}

impl<F> CoordinateMapper for F
where
    F: Fn(u32, u32, DepthPixel) -> Option<ColorPoint>,
{
    fn depth_to_color(&self, x: u32, y: u32, pixel: DepthPixel) -> Option<ColorPoint> {
        self(x, y, pixel)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappedFrame {
    width: u32,
    points: Vec<ColorPoint>,
}

impl MappedFrame {
    pub fn new(width: u32, points: Vec<ColorPoint>) -> Self {
        Self { width, points }
    }
}

impl CoordinateMapper for MappedFrame {
    fn depth_to_color(&self, x: u32, y: u32, _pixel: DepthPixel) -> Option<ColorPoint> {
        if x >= self.width {
            return None;
        }
        self.points.get((y * self.width + x) as usize).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundMask {
    width: u32,
    height: u32,
    opaque: Vec<bool>,
}

impl ForegroundMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            opaque: vec![false; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear(&mut self) {
        self.opaque.fill(false);
    }

    pub fn is_opaque(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.opaque[(y * self.width + x) as usize]
    }

    pub fn opaque_count(&self) -> usize {
        self.opaque.iter().filter(|&&o| o).count()
    }

    pub fn is_transparent(&self) -> bool {
        !self.opaque.iter().any(|&o| o)
    }

    fn mark(&mut self, index: usize) {
        self.opaque[index] = true;
    }
}

pub struct ForegroundSegmenter {
    divisor: i32,
}

impl ForegroundSegmenter {
    pub fn new(color_to_depth_divisor: i32) -> Result<Self, SegmentError> {
        if color_to_depth_divisor <= 0 {
            return Err(SegmentError::InvalidDivisor(color_to_depth_divisor));
        }
        Ok(Self {
            divisor: color_to_depth_divisor,
        })
    }

    // Marks each player pixel's mapped color pixel and its left neighbour. Column 0
    // is never a target so the left write stays in the row.
    pub fn segment<M: CoordinateMapper + ?Sized>(
        &self,
        depth: &DepthFrame,
        mapper: &M,
        mask: &mut ForegroundMask,
    ) -> Result<bool, SegmentError> {
        depth.validate()?;
        if mask.opaque.is_empty() {
            return Err(SegmentError::EmptyMask);
        }

        mask.clear();

        let mask_width = mask.width as i32;
        let mask_height = mask.height as i32;
        let mut found_player = false;
        let mut dropped = 0usize;

        for y in 0..depth.height {
            for x in 0..depth.width {
                let pixel = depth.pixels[(y * depth.width + x) as usize];
                if !pixel.has_player() {
                    continue;
                }
                found_player = true;

                let Some(point) = mapper.depth_to_color(x, y, pixel) else {
                    dropped += 1;
                    continue;
                };

                let color_x = point.x / self.divisor;
                let color_y = point.y / self.divisor;

                if color_x > 0 && color_x < mask_width && color_y >= 0 && color_y < mask_height {
                    let index = (color_x + color_y * mask_width) as usize;
                    mask.mark(index);
                    mask.mark(index - 1);
                } else {
                    dropped += 1;
                }
            }
        }

        debug!(
            found_player,
            opaque = mask.opaque_count(),
            dropped,
            "Foreground mask rebuilt"
        );

        Ok(found_player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_mapper(x: u32, y: u32, _pixel: DepthPixel) -> Option<ColorPoint> {
        Some(ColorPoint::new(x as i32, y as i32))
    }

    fn single_player_pixel() -> DepthFrame {
        let mut frame = DepthFrame::empty(640, 480);
        frame.set(10, 20, DepthPixel::new(1500, 1));
        frame
    }

    #[test]
    fn test_packed_depth_decoding() {
        let pixel = DepthPixel::from_packed((2000 << 3) | 2);
        assert_eq!(pixel.depth, 2000);
        assert_eq!(pixel.player_index, 2);
        assert!(!DepthPixel::from_packed(2000 << 3).has_player());
    }

    #[test]
    fn test_untracked_frame_is_transparent() {
        let segmenter = ForegroundSegmenter::new(1).unwrap();
        let frame = DepthFrame::empty(640, 480);
        let mut mask = ForegroundMask::new(640, 480);

        let found = segmenter.segment(&frame, &identity_mapper, &mut mask).unwrap();
        assert!(!found);
        assert!(mask.is_transparent());
    }

    #[test]
    fn test_single_pixel_marks_itself_and_left_neighbour() {
        let segmenter = ForegroundSegmenter::new(1).unwrap();
        let frame = single_player_pixel();
        let mapper = |_x: u32, _y: u32, _p: DepthPixel| Some(ColorPoint::new(100, 50));
        let mut mask = ForegroundMask::new(640, 480);

        let found = segmenter.segment(&frame, &mapper, &mut mask).unwrap();
        assert!(found);
        assert!(mask.is_opaque(100, 50));
        assert!(mask.is_opaque(99, 50));
        assert_eq!(mask.opaque_count(), 2);
    }

    #[test]
    fn test_column_zero_is_excluded() {
        let segmenter = ForegroundSegmenter::new(1).unwrap();
        let frame = single_player_pixel();
        let mapper = |_x: u32, _y: u32, _p: DepthPixel| Some(ColorPoint::new(0, 50));
        let mut mask = ForegroundMask::new(640, 480);

        let found = segmenter.segment(&frame, &mapper, &mut mask).unwrap();
        assert!(found);
        assert!(mask.is_transparent());
    }

    #[test]
    fn test_out_of_bounds_points_are_dropped() {
        let segmenter = ForegroundSegmenter::new(1).unwrap();
        let mut frame = DepthFrame::empty(4, 1);
        for x in 0..4 {
            frame.set(x, 0, DepthPixel::new(1000, 1));
        }
        let targets = MappedFrame::new(
            4,
            vec![
                ColorPoint::new(640, 10),
                ColorPoint::new(5, 480),
                ColorPoint::new(5, -1),
                ColorPoint::new(639, 479),
            ],
        );
        let mut mask = ForegroundMask::new(640, 480);

        assert!(segmenter.segment(&frame, &targets, &mut mask).unwrap());
        assert_eq!(mask.opaque_count(), 2);
        assert!(mask.is_opaque(639, 479));
        assert!(mask.is_opaque(638, 479));
    }

    #[test]
    fn test_divisor_scales_color_points() {
        let segmenter = ForegroundSegmenter::new(2).unwrap();
        let frame = single_player_pixel();
        let mapper = |_x: u32, _y: u32, _p: DepthPixel| Some(ColorPoint::new(201, 101));
        let mut mask = ForegroundMask::new(640, 480);

        segmenter.segment(&frame, &mapper, &mut mask).unwrap();
        assert!(mask.is_opaque(100, 50));
        assert!(mask.is_opaque(99, 50));
        assert_eq!(mask.opaque_count(), 2);
    }

    #[test]
    fn test_mask_is_rebuilt_from_scratch() {
        let segmenter = ForegroundSegmenter::new(1).unwrap();
        let mut mask = ForegroundMask::new(640, 480);

        segmenter
            .segment(&single_player_pixel(), &identity_mapper, &mut mask)
            .unwrap();
        assert_eq!(mask.opaque_count(), 2);

        let found = segmenter
            .segment(&DepthFrame::empty(640, 480), &identity_mapper, &mut mask)
            .unwrap();
        assert!(!found);
        assert!(mask.is_transparent());
    }

    #[test]
    fn test_unmapped_player_pixel_still_counts_as_found() {
        let segmenter = ForegroundSegmenter::new(1).unwrap();
        let mapper = |_x: u32, _y: u32, _p: DepthPixel| -> Option<ColorPoint> { None };
        let mut mask = ForegroundMask::new(640, 480);

        assert!(segmenter.segment(&single_player_pixel(), &mapper, &mut mask).unwrap());
        assert!(mask.is_transparent());
    }

    #[test]
    fn test_preconditions() {
        assert_eq!(ForegroundSegmenter::new(0).err(), Some(SegmentError::InvalidDivisor(0)));

        let bad = DepthFrame {
            width: 4,
            height: 4,
            pixels: vec![DepthPixel::default(); 3],
        };
        let segmenter = ForegroundSegmenter::new(1).unwrap();
        let mut mask = ForegroundMask::new(4, 4);
        assert!(matches!(
            segmenter.segment(&bad, &identity_mapper, &mut mask),
            Err(SegmentError::DepthBufferSize { expected: 16, actual: 3, .. })
        ));

        let mut empty = ForegroundMask::new(0, 0);
        assert_eq!(
            segmenter.segment(&DepthFrame::empty(4, 4), &identity_mapper, &mut empty),
            Err(SegmentError::EmptyMask)
        );
    }
}
