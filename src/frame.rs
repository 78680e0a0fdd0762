// src/frame.rs - One sensor frame through retargeting and capture
use crate::compose::{self, ChannelOrder, ColorFrame};
use crate::config::Config;
use crate::error::{FrameError, RetargetError, SegmentError};
use crate::mapping::{JointMapping, AVATAR_BONE_COUNT, ROOT_BONE};
use crate::retarget::{BoneTransform, RetargetSummary, RetargetingEngine};
use crate::segment::{CoordinateMapper, DepthFrame, ForegroundMask, ForegroundSegmenter};
use crate::skeleton::{select_active_skeletons, TrackedSkeleton};
use image::RgbaImage;
use nalgebra::{Matrix4, Vector3};
use tracing::{debug, info, warn};

// The sensor tracks at most this many people with full skeletons.
pub const MAX_AVATARS: usize = 2;

#[derive(Debug, Clone)]
pub struct AvatarAnimator {
    bind_pose: Vec<BoneTransform>,
    bind_root: Matrix4<f32>,
    bones: Vec<BoneTransform>,
    tracking_id: Option<u32>,
    visible: bool,
}

impl AvatarAnimator {
    pub fn new(bind_pose: Vec<BoneTransform>, bind_root: Matrix4<f32>) -> Self {
        Self {
            bones: bind_pose.clone(),
            bind_pose,
            bind_root,
            tracking_id: None,
            visible: false,
        }
    }

    pub fn identity_rig() -> Self {
        Self::new(vec![BoneTransform::identity(); AVATAR_BONE_COUNT], Matrix4::identity())
    }

    pub fn bones(&self) -> &[BoneTransform] {
        &self.bones
    }

    pub fn root_translation(&self) -> Vector3<f32> {
        self.bones
            .get(ROOT_BONE)
            .map(|bone| bone.translation.vector)
            .unwrap_or_else(Vector3::zeros)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn tracking_id(&self) -> Option<u32> {
        self.tracking_id
    }

    // Restarts from the bind pose and retargets `skeleton` onto it. Without a
    // skeleton the avatar is hidden and keeps its last pose.
    pub fn update(
        &mut self,
        engine: &RetargetingEngine<'_>,
        skeleton: Option<&TrackedSkeleton>,
    ) -> Result<Option<RetargetSummary>, RetargetError> {
        let Some(skeleton) = skeleton else {
            self.visible = false;
            self.tracking_id = None;
            return Ok(None);
        };

        self.bones.clone_from(&self.bind_pose);
        let summary = engine.retarget(Some(skeleton), &self.bind_root, &mut self.bones)?;
        self.visible = true;
        self.tracking_id = Some(skeleton.tracking_id);
        Ok(Some(summary))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SensorFrame<'a> {
    pub skeletons: &'a [TrackedSkeleton],
    pub color: Option<&'a ColorFrame>,
    pub depth: Option<&'a DepthFrame>,
}

#[derive(Debug, Clone, Default)]
pub struct FrameOutput {
    pub retargeted: [Option<RetargetSummary>; MAX_AVATARS],
    // Set when a capture was serviced this frame and a person was in view
    pub capture: Option<RgbaImage>,
    // A capture was serviced this frame, whether or not anyone was found
    pub capture_attempted: bool,
    // Why a serviced capture produced no image; poses are still valid
    pub capture_error: Option<FrameError>,
}

pub struct FrameProcessor {
    engine: RetargetingEngine<'static>,
    animators: [AvatarAnimator; MAX_AVATARS],
    segmenter: ForegroundSegmenter,
    mask: ForegroundMask,
    depth_size: (u32, u32),
    color_size: (u32, u32),
    channel_order: ChannelOrder,
    background: Option<RgbaImage>,
    capture_requested: bool,
}

impl FrameProcessor {
    pub fn new(config: &Config, animators: [AvatarAnimator; MAX_AVATARS]) -> Result<Self, SegmentError> {
        Self::with_mapping(JointMapping::default_rig(), config, animators)
    }

    pub fn with_mapping(
        mapping: &'static JointMapping,
        config: &Config,
        animators: [AvatarAnimator; MAX_AVATARS],
    ) -> Result<Self, SegmentError> {
        let seg = &config.segmentation;
        let segmenter = ForegroundSegmenter::new(seg.color_to_depth_divisor)?;
        // The mask lives at the divided color resolution, matching how mapped points
        // are scaled before they index it.
        let divisor = seg.color_to_depth_divisor as u32;
        let mask = ForegroundMask::new(seg.color_width / divisor, seg.color_height / divisor);

        Ok(Self {
            engine: RetargetingEngine::new(mapping, config.retarget.clone()),
            animators,
            segmenter,
            mask,
            depth_size: (seg.depth_width, seg.depth_height),
            color_size: (seg.color_width, seg.color_height),
            channel_order: seg.channel_order,
            background: None,
            capture_requested: false,
        })
    }

    pub fn set_background(&mut self, background: Option<RgbaImage>) {
        self.background = background;
    }

    // Arms a capture for the next frame that carries both color and depth.
    pub fn request_capture(&mut self) {
        self.capture_requested = true;
    }

    pub fn capture_pending(&self) -> bool {
        self.capture_requested
    }

    pub fn animator(&self, slot: usize) -> Option<&AvatarAnimator> {
        self.animators.get(slot)
    }

    pub fn mask(&self) -> &ForegroundMask {
        &self.mask
    }

    pub fn process_frame<M: CoordinateMapper + ?Sized>(
        &mut self,
        frame: SensorFrame<'_>,
        mapper: &M,
    ) -> Result<FrameOutput, FrameError> {
        let mut output = FrameOutput::default();

        let active = select_active_skeletons(frame.skeletons);
        for (slot, (animator, skeleton)) in self.animators.iter_mut().zip(active).enumerate() {
            output.retargeted[slot] = animator
                .update(&self.engine, skeleton)
                .map_err(|source| FrameError::Retarget { slot, source })?;
        }

        if self.capture_requested {
            if let (Some(color), Some(depth)) = (frame.color, frame.depth) {
                // One shot: a failed capture is reported and not retried.
                self.capture_requested = false;
                output.capture_attempted = true;
                match self.capture(color, depth, mapper) {
                    Ok(image) => output.capture = image,
                    Err(e) => {
                        warn!("Capture failed: {}", e);
                        output.capture_error = Some(e);
                    }
                }
            } else {
                debug!("Capture pending until color and depth arrive together");
            }
        }

        Ok(output)
    }

    fn check_frames(&self, color: &ColorFrame, depth: &DepthFrame) -> Result<(), FrameError> {
        for (stream, (width, height), (expected_width, expected_height)) in [
            ("depth", (depth.width, depth.height), self.depth_size),
            ("color", (color.width, color.height), self.color_size),
        ] {
            if (width, height) != (expected_width, expected_height) {
                return Err(FrameError::FrameSize {
                    stream,
                    width,
                    height,
                    expected_width,
                    expected_height,
                });
            }
        }

        if color.order != self.channel_order {
            return Err(FrameError::ChannelOrder {
                expected: self.channel_order,
                actual: color.order,
            });
        }
        Ok(())
    }

    fn capture<M: CoordinateMapper + ?Sized>(
        &mut self,
        color: &ColorFrame,
        depth: &DepthFrame,
        mapper: &M,
    ) -> Result<Option<RgbaImage>, FrameError> {
        self.check_frames(color, depth)?;

        let found = self.segmenter.segment(depth, mapper, &mut self.mask)?;
        if !found {
            info!("Capture requested but nobody is in view");
            return Ok(None);
        }

        let image = match &self.background {
            Some(background) => compose::compose_onto(color, &self.mask, background)?,
            None => compose::compose(color, &self.mask)?,
        };
        info!(opaque = self.mask.opaque_count(), "Foreground captured");
        Ok(Some(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{ColorPoint, DepthPixel};
    use crate::skeleton::{JointType, TrackingState};

    fn identity_mapper(x: u32, y: u32, _p: DepthPixel) -> Option<ColorPoint> {
        Some(ColorPoint::new(x as i32, y as i32))
    }

    fn small_config() -> Config {
        let mut config = Config::default();
        config.segmentation.depth_width = 8;
        config.segmentation.depth_height = 6;
        config.segmentation.color_width = 8;
        config.segmentation.color_height = 6;
        config
    }

    fn processor() -> FrameProcessor {
        FrameProcessor::new(&small_config(), [AvatarAnimator::identity_rig(), AvatarAnimator::identity_rig()]).unwrap()
    }

    fn person(id: u32, x: f32) -> TrackedSkeleton {
        let mut skeleton = TrackedSkeleton::new(id);
        skeleton.set_joint(JointType::HipCenter, Vector3::new(x, 1.0, 2.0), TrackingState::Tracked);
        skeleton
    }

    fn color() -> ColorFrame {
        ColorFrame::new(8, 6, ChannelOrder::Bgra, vec![50; 8 * 6 * 4])
    }

    #[test]
    fn test_two_people_drive_two_avatars() {
        let mut processor = processor();
        let skeletons = [person(11, 0.5), person(12, -0.5)];
        let frame = SensorFrame {
            skeletons: &skeletons,
            ..SensorFrame::default()
        };

        let output = processor.process_frame(frame, &identity_mapper).unwrap();
        assert!(output.retargeted.iter().all(|r| r.is_some()));
        assert_eq!(processor.animator(0).unwrap().tracking_id(), Some(11));
        assert_eq!(processor.animator(1).unwrap().root_translation(), Vector3::new(-20.0, 40.0, 80.0));
        assert!(output.capture.is_none());
    }

    #[test]
    fn test_missing_person_hides_avatar() {
        let mut processor = processor();
        let skeletons = [person(11, 0.0)];
        processor
            .process_frame(SensorFrame { skeletons: &skeletons, ..SensorFrame::default() }, &identity_mapper)
            .unwrap();
        assert!(processor.animator(0).unwrap().is_visible());
        assert!(!processor.animator(1).unwrap().is_visible());

        processor.process_frame(SensorFrame::default(), &identity_mapper).unwrap();
        assert!(!processor.animator(0).unwrap().is_visible());
    }

    #[test]
    fn test_capture_waits_for_both_frames() {
        let mut processor = processor();
        processor.request_capture();

        let color = color();
        let frame = SensorFrame {
            color: Some(&color),
            ..SensorFrame::default()
        };
        let output = processor.process_frame(frame, &identity_mapper).unwrap();
        assert!(!output.capture_attempted);
        assert!(processor.capture_pending());
    }

    #[test]
    fn test_capture_with_player() {
        let mut processor = processor();
        processor.request_capture();

        let color = color();
        let mut depth = DepthFrame::empty(8, 6);
        depth.set(4, 3, DepthPixel::new(1200, 1));
        let frame = SensorFrame {
            skeletons: &[],
            color: Some(&color),
            depth: Some(&depth),
        };

        let output = processor.process_frame(frame, &identity_mapper).unwrap();
        assert!(output.capture_attempted);
        assert!(!processor.capture_pending());
        let image = output.capture.unwrap();
        assert_eq!(image.get_pixel(4, 3)[3], 255);
        assert_eq!(image.get_pixel(3, 3)[3], 255);
        assert_eq!(image.get_pixel(5, 3)[3], 0);
    }

    #[test]
    fn test_capture_without_player_is_consumed() {
        let mut processor = processor();
        processor.request_capture();

        let color = color();
        let depth = DepthFrame::empty(8, 6);
        let frame = SensorFrame {
            skeletons: &[],
            color: Some(&color),
            depth: Some(&depth),
        };

        let output = processor.process_frame(frame, &identity_mapper).unwrap();
        assert!(output.capture_attempted);
        assert!(output.capture.is_none());
        assert!(!processor.capture_pending());
    }

    #[test]
    fn test_bad_capture_frame_does_not_block_retargeting() {
        let mut processor = processor();
        let skeletons = [person(21, 0.25)];
        // Two columns wider than the configured color stream.
        let wide = ColorFrame::new(10, 6, ChannelOrder::Bgra, vec![50; 10 * 6 * 4]);
        let mut depth = DepthFrame::empty(8, 6);
        depth.set(4, 3, DepthPixel::new(1200, 1));

        processor.request_capture();
        let output = processor
            .process_frame(
                SensorFrame {
                    skeletons: &skeletons,
                    color: Some(&wide),
                    depth: Some(&depth),
                },
                &identity_mapper,
            )
            .unwrap();

        assert!(output.capture_attempted);
        assert!(output.capture.is_none());
        assert_eq!(
            output.capture_error,
            Some(FrameError::FrameSize {
                stream: "color",
                width: 10,
                height: 6,
                expected_width: 8,
                expected_height: 6,
            })
        );
        assert!(!processor.capture_pending());

        let avatar = processor.animator(0).unwrap();
        assert!(output.retargeted[0].is_some());
        assert!(avatar.is_visible());
        assert_eq!(avatar.root_translation(), Vector3::new(10.0, 40.0, 80.0));

        // The next frame retargets normally with nothing pending.
        let output = processor
            .process_frame(SensorFrame { skeletons: &skeletons, ..SensorFrame::default() }, &identity_mapper)
            .unwrap();
        assert!(!output.capture_attempted);
        assert!(output.capture_error.is_none());
        assert!(processor.animator(0).unwrap().is_visible());
    }

    #[test]
    fn test_capture_rejects_unexpected_channel_order() {
        let mut processor = processor();
        let rgba = ColorFrame::new(8, 6, ChannelOrder::Rgba, vec![50; 8 * 6 * 4]);
        let depth = DepthFrame::empty(8, 6);

        processor.request_capture();
        let output = processor
            .process_frame(
                SensorFrame {
                    skeletons: &[],
                    color: Some(&rgba),
                    depth: Some(&depth),
                },
                &identity_mapper,
            )
            .unwrap();
        assert_eq!(
            output.capture_error,
            Some(FrameError::ChannelOrder {
                expected: ChannelOrder::Bgra,
                actual: ChannelOrder::Rgba,
            })
        );
    }
}
