use approx::assert_relative_eq;
use avatar_mirror::compose::{ChannelOrder, ColorFrame, SnapshotWriter};
use avatar_mirror::config::Config;
use avatar_mirror::export::PoseExporter;
use avatar_mirror::frame::{AvatarAnimator, FrameProcessor, SensorFrame};
use avatar_mirror::posture::{seated_ankle_rotation, seated_hip_rotation};
use avatar_mirror::remap::AxisRemap;
use avatar_mirror::segment::{ColorPoint, DepthFrame, DepthPixel};
use avatar_mirror::skeleton::{JointType, SkeletonTrackingState, TrackedSkeleton, TrackingState};
use nalgebra::{UnitQuaternion, Vector3};
use std::io::Write;

fn standing_person(id: u32) -> TrackedSkeleton {
    let mut skeleton = TrackedSkeleton::new(id);
    for joint in JointType::ALL {
        skeleton.set_joint(joint, Vector3::new(0.25, 1.0, 2.5), TrackingState::Tracked);
    }
    let bend = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 0.4).into_inner();
    skeleton.set_bone_rotation(JointType::KneeLeft, bend);
    skeleton.set_bone_rotation(JointType::AnkleRight, bend);
    skeleton
}

fn animators() -> [AvatarAnimator; 2] {
    [AvatarAnimator::identity_rig(), AvatarAnimator::identity_rig()]
}

#[test]
fn seated_config_from_file_drives_avatar() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "retarget": {{ "seated_posture": true, "fix_draw_height": true, "draw_height": 0.5 }} }}"#
    )
    .unwrap();
    let config = Config::load(file.path()).unwrap();

    let mut processor = FrameProcessor::new(&config, animators()).unwrap();
    let skeletons = [
        standing_person(3).with_state(SkeletonTrackingState::PositionOnly),
        standing_person(4),
    ];
    let output = processor
        .process_frame(
            SensorFrame {
                skeletons: &skeletons,
                ..SensorFrame::default()
            },
            &|_x: u32, _y: u32, _p: DepthPixel| -> Option<ColorPoint> { None },
        )
        .unwrap();

    // Position-only people do not get an avatar.
    assert!(output.retargeted[0].is_some());
    assert!(output.retargeted[1].is_none());

    let avatar = processor.animator(0).unwrap();
    assert_eq!(avatar.tracking_id(), Some(4));
    assert_relative_eq!(avatar.root_translation(), Vector3::new(10.0, 20.0, 100.0), epsilon = 1e-4);

    let thigh = AxisRemap::LEG.apply(&seated_hip_rotation());
    let lower_leg = AxisRemap::LEG.apply(&seated_ankle_rotation());
    let bones = avatar.bones();
    for index in [50, 54] {
        assert!(bones[index].rotation.angle_to(&thigh) < 1e-5, "bone {}", index);
    }
    for index in [51, 55] {
        assert!(bones[index].rotation.angle_to(&lower_leg) < 1e-5, "bone {}", index);
    }
}

#[test]
fn capture_at_half_depth_resolution_is_saved() {
    let mut config = Config::default();
    config.segmentation.depth_width = 4;
    config.segmentation.depth_height = 2;
    config.segmentation.color_width = 8;
    config.segmentation.color_height = 4;
    config.segmentation.color_to_depth_divisor = 2;

    let mut processor = FrameProcessor::new(&config, animators()).unwrap();
    assert_eq!((processor.mask().width(), processor.mask().height()), (4, 2));

    let color = ColorFrame::new(8, 4, ChannelOrder::Bgra, [10u8, 20, 30, 0].repeat(32));
    let mut depth = DepthFrame::empty(4, 2);
    depth.set(2, 1, DepthPixel::from_packed((1800 << 3) | 1));
    let mapper = |x: u32, y: u32, _p: DepthPixel| Some(ColorPoint::new(2 * x as i32, 2 * y as i32));

    processor.request_capture();
    let output = processor
        .process_frame(
            SensorFrame {
                skeletons: &[],
                color: Some(&color),
                depth: Some(&depth),
            },
            &mapper,
        )
        .unwrap();
    let image = output.capture.unwrap();

    // Depth (2, 1) lands on mask cells (2, 1) and (1, 1), i.e. color x 2..6, y 2..4.
    for y in 0..4 {
        for x in 0..8 {
            let expected = if (2..6).contains(&x) && (2..4).contains(&y) { 255 } else { 0 };
            assert_eq!(image.get_pixel(x, y)[3], expected, "({}, {})", x, y);
        }
    }
    assert_eq!(image.get_pixel(3, 3).0, [30, 20, 10, 255]);

    let dir = tempfile::tempdir().unwrap();
    let mut writer = SnapshotWriter::new(dir.path(), "guest");
    let saved = writer.save(&image).unwrap();
    assert!(saved.ends_with("guest-0.png"));
}

#[test]
fn session_export_covers_both_avatars() {
    let mut processor = FrameProcessor::new(&Config::default(), animators()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let mut exporter = PoseExporter::new(dir.path(), Some("two_people".to_string()));
    let mapper = |_x: u32, _y: u32, _p: DepthPixel| -> Option<ColorPoint> { None };

    for frame in 0..3u32 {
        let skeletons = [standing_person(1), standing_person(2)];
        let output = processor
            .process_frame(
                SensorFrame {
                    skeletons: &skeletons,
                    ..SensorFrame::default()
                },
                &mapper,
            )
            .unwrap();

        for (slot, summary) in output.retargeted.iter().enumerate() {
            assert!(summary.is_some());
            let avatar = processor.animator(slot).unwrap();
            exporter.add_pose(frame, frame as f64 / 30.0, slot, avatar.tracking_id().unwrap(), avatar.bones());
        }
    }

    let path = exporter.export_csv().unwrap();
    let rows = csv::Reader::from_path(&path).unwrap().records().count();
    assert_eq!(rows, 3 * 2 * 17);
}
