// src/main.rs
use anyhow::{Context, Result};
use avatar_mirror::compose::{ChannelOrder, ColorFrame, SnapshotWriter};
use avatar_mirror::config::Config;
use avatar_mirror::export::PoseExporter;
use avatar_mirror::frame::{AvatarAnimator, FrameProcessor, SensorFrame};
use avatar_mirror::segment::{ColorPoint, DepthFrame, DepthPixel};
use avatar_mirror::skeleton::{JointType, TrackedSkeleton, TrackingState};
use nalgebra::{UnitQuaternion, Vector3};
use tracing::{info, warn};

const FRAME_RATE: f64 = 30.0;
const SESSION_FRAMES: u32 = 90;
const CAPTURE_FRAME: u32 = 45;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    info!("Writing output to {}", config.capture.output_directory.display());

    let animators = [AvatarAnimator::identity_rig(), AvatarAnimator::identity_rig()];
    let mut processor = FrameProcessor::new(&config, animators).context("Invalid segmentation settings")?;
    let mut snapshots = SnapshotWriter::new(&config.capture.output_directory, config.capture.file_prefix.clone());
    let mut exporter = PoseExporter::new(&config.capture.output_directory, None);

    let seg = &config.segmentation;
    // Depth and color cameras share a viewpoint in the simulation, so registration
    // is a pure resolution change.
    let scale_x = seg.color_width as f32 / seg.depth_width as f32;
    let scale_y = seg.color_height as f32 / seg.depth_height as f32;
    let mapper = move |x: u32, y: u32, _pixel: DepthPixel| {
        Some(ColorPoint::new((x as f32 * scale_x) as i32, (y as f32 * scale_y) as i32))
    };

    for frame in 0..SESSION_FRAMES {
        let t = frame as f64 / FRAME_RATE;
        let skeletons = [simulated_person(1, t, -0.4), simulated_person(2, t + 1.5, 0.4)];

        if frame == CAPTURE_FRAME {
            processor.request_capture();
        }

        // The sensor only streams images while someone is asking for them.
        let images = processor.capture_pending().then(|| {
            (
                simulated_color(seg.color_width, seg.color_height, seg.channel_order),
                simulated_depth(seg.depth_width, seg.depth_height, t),
            )
        });

        let output = processor.process_frame(
            SensorFrame {
                skeletons: &skeletons,
                color: images.as_ref().map(|(color, _)| color),
                depth: images.as_ref().map(|(_, depth)| depth),
            },
            &mapper,
        )?;

        for (slot, summary) in output.retargeted.iter().enumerate() {
            if let (Some(summary), Some(animator)) = (summary, processor.animator(slot)) {
                if summary.failed > 0 {
                    warn!(slot, failed = summary.failed, "Some joints kept their previous pose");
                }
                exporter.add_pose(frame, t, slot, animator.tracking_id().unwrap_or_default(), animator.bones());
            }
        }

        if let Some(image) = output.capture {
            snapshots.save(&image)?;
        } else if let Some(e) = output.capture_error {
            warn!("Capture at frame {} failed: {}", frame, e);
        } else if output.capture_attempted {
            warn!("Capture at frame {} found nobody in view", frame);
        }
    }

    let csv_path = exporter.export_csv()?;
    info!(
        frames = exporter.frame_count(),
        "Session finished, poses in {}",
        csv_path.display()
    );
    Ok(())
}

// A standing person swaying in place: arms swing, head nods, knees flex.
fn simulated_person(tracking_id: u32, t: f64, offset_x: f32) -> TrackedSkeleton {
    let mut skeleton = TrackedSkeleton::new(tracking_id);
    let sway = (0.05 * (t * 0.5).sin()) as f32;

    for joint in JointType::ALL {
        let position = rest_position(joint) + Vector3::new(offset_x + sway, 0.0, 2.2);
        skeleton.set_joint(joint, position, TrackingState::Tracked);
    }

    let swing = (0.6 * t.sin()) as f32;
    let nod = (0.2 * (t * 2.0).sin()) as f32;
    let flex = (0.3 * (t * 1.5).sin().abs()) as f32;

    let about = |axis: Vector3<f32>, angle: f32| {
        UnitQuaternion::from_axis_angle(&nalgebra::Unit::new_normalize(axis), angle).into_inner()
    };
    skeleton.set_bone_rotation(JointType::Head, about(Vector3::x(), nod));
    skeleton.set_bone_rotation(JointType::ElbowLeft, about(Vector3::x(), swing));
    skeleton.set_bone_rotation(JointType::ElbowRight, about(Vector3::x(), -swing));
    skeleton.set_bone_rotation(JointType::KneeLeft, about(Vector3::x(), flex));
    skeleton.set_bone_rotation(JointType::KneeRight, about(Vector3::x(), flex));
    skeleton.set_bone_rotation(JointType::HipCenter, about(Vector3::y(), sway));
    skeleton
}

fn rest_position(joint: JointType) -> Vector3<f32> {
    use JointType::*;
    let (x, y) = match joint {
        HipCenter => (0.0, 0.9),
        Spine => (0.0, 1.1),
        ShoulderCenter => (0.0, 1.4),
        Head => (0.0, 1.6),
        ShoulderLeft => (-0.2, 1.4),
        ElbowLeft => (-0.25, 1.15),
        WristLeft => (-0.27, 0.9),
        HandLeft => (-0.28, 0.82),
        ShoulderRight => (0.2, 1.4),
        ElbowRight => (0.25, 1.15),
        WristRight => (0.27, 0.9),
        HandRight => (0.28, 0.82),
        HipLeft => (-0.1, 0.85),
        KneeLeft => (-0.1, 0.5),
        AnkleLeft => (-0.1, 0.1),
        FootLeft => (-0.1, 0.05),
        HipRight => (0.1, 0.85),
        KneeRight => (0.1, 0.5),
        AnkleRight => (0.1, 0.1),
        FootRight => (0.1, 0.05),
    };
    Vector3::new(x, y, 0.0)
}

fn simulated_color(width: u32, height: u32, order: ChannelOrder) -> ColorFrame {
    let mut data = Vec::with_capacity(width as usize * height as usize * ColorFrame::BYTES_PER_PIXEL);
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / width.max(1)) as u8;
            let g = (y * 255 / height.max(1)) as u8;
            let b = 128;
            match order {
                ChannelOrder::Bgra => data.extend_from_slice(&[b, g, r, 0]),
                ChannelOrder::Rgba => data.extend_from_slice(&[r, g, b, 0]),
            }
        }
    }
    ColorFrame::new(width, height, order, data)
}

// Background wall at 3.5 m with an elliptical player silhouette at 2.2 m.
fn simulated_depth(width: u32, height: u32, t: f64) -> DepthFrame {
    let mut frame = DepthFrame::empty(width, height);
    let center_x = width as f64 * (0.5 + 0.1 * (t * 0.5).sin());
    let center_y = height as f64 * 0.55;
    let radius_x = width as f64 * 0.12;
    let radius_y = height as f64 * 0.4;

    for y in 0..height {
        for x in 0..width {
            let dx = (x as f64 - center_x) / radius_x;
            let dy = (y as f64 - center_y) / radius_y;
            let pixel = if dx * dx + dy * dy <= 1.0 {
                DepthPixel::new(2200, 1)
            } else {
                DepthPixel::new(3500, 0)
            };
            frame.set(x, y, pixel);
        }
    }
    frame
}
