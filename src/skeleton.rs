// src/skeleton.rs
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

// The discriminant indexes a skeleton's joint and bone arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JointType {
    HipCenter = 0,
    Spine,
    ShoulderCenter,
    Head,
    ShoulderLeft,
    ElbowLeft,
    WristLeft,
    HandLeft,
    ShoulderRight,
    ElbowRight,
    WristRight,
    HandRight,
    HipLeft,
    KneeLeft,
    AnkleLeft,
    FootLeft,
    HipRight,
    KneeRight,
    AnkleRight,
    FootRight,
}

impl JointType {
    pub const COUNT: usize = 20;

    pub const ALL: [JointType; Self::COUNT] = [
        JointType::HipCenter,
        JointType::Spine,
        JointType::ShoulderCenter,
        JointType::Head,
        JointType::ShoulderLeft,
        JointType::ElbowLeft,
        JointType::WristLeft,
        JointType::HandLeft,
        JointType::ShoulderRight,
        JointType::ElbowRight,
        JointType::WristRight,
        JointType::HandRight,
        JointType::HipLeft,
        JointType::KneeLeft,
        JointType::AnkleLeft,
        JointType::FootLeft,
        JointType::HipRight,
        JointType::KneeRight,
        JointType::AnkleRight,
        JointType::FootRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    // Start joint of the bone ending at this joint. The root is its own parent.
    pub fn parent(self) -> JointType {
        use JointType::*;
        match self {
            HipCenter => HipCenter,
            Spine => HipCenter,
            ShoulderCenter => Spine,
            Head => ShoulderCenter,
            ShoulderLeft => ShoulderCenter,
            ElbowLeft => ShoulderLeft,
            WristLeft => ElbowLeft,
            HandLeft => WristLeft,
            ShoulderRight => ShoulderCenter,
            ElbowRight => ShoulderRight,
            WristRight => ElbowRight,
            HandRight => WristRight,
            HipLeft => HipCenter,
            KneeLeft => HipLeft,
            AnkleLeft => KneeLeft,
            FootLeft => AnkleLeft,
            HipRight => HipCenter,
            KneeRight => HipRight,
            AnkleRight => KneeRight,
            FootRight => AnkleRight,
        }
    }

    pub fn name(self) -> &'static str {
        use JointType::*;
        match self {
            HipCenter => "hip_center",
            Spine => "spine",
            ShoulderCenter => "shoulder_center",
            Head => "head",
            ShoulderLeft => "shoulder_left",
            ElbowLeft => "elbow_left",
            WristLeft => "wrist_left",
            HandLeft => "hand_left",
            ShoulderRight => "shoulder_right",
            ElbowRight => "elbow_right",
            WristRight => "wrist_right",
            HandRight => "hand_right",
            HipLeft => "hip_left",
            KneeLeft => "knee_left",
            AnkleLeft => "ankle_left",
            FootLeft => "foot_left",
            HipRight => "hip_right",
            KneeRight => "knee_right",
            AnkleRight => "ankle_right",
            FootRight => "foot_right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackingState {
    #[default]
    NotTracked,
    Inferred,
    Tracked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SkeletonTrackingState {
    #[default]
    NotTracked,
    PositionOnly,
    Tracked,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joint {
    pub position: Vector3<f32>, // meters, sensor space
    pub state: TrackingState,
}

impl Default for Joint {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            state: TrackingState::NotTracked,
        }
    }
}

// Raw sensor quaternion, normalized only when consumed so a zero reading is detectable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneOrientation {
    pub start_joint: JointType,
    pub end_joint: JointType,
    pub hierarchical_rotation: Quaternion<f32>,
}

impl BoneOrientation {
    pub fn is_root(&self) -> bool {
        self.start_joint == self.end_joint
    }

    pub fn rotation(&self) -> Option<UnitQuaternion<f32>> {
        UnitQuaternion::try_new(self.hierarchical_rotation, f32::EPSILON)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackedSkeleton {
    pub tracking_id: u32,
    pub state: SkeletonTrackingState,
    joints: [Joint; JointType::COUNT],
    bones: [BoneOrientation; JointType::COUNT],
}

impl TrackedSkeleton {
    pub fn new(tracking_id: u32) -> Self {
        let bones = JointType::ALL.map(|joint| BoneOrientation {
            start_joint: joint.parent(),
            end_joint: joint,
            hierarchical_rotation: Quaternion::identity(),
        });

        Self {
            tracking_id,
            state: SkeletonTrackingState::Tracked,
            joints: [Joint::default(); JointType::COUNT],
            bones,
        }
    }

    pub fn with_state(mut self, state: SkeletonTrackingState) -> Self {
        self.state = state;
        self
    }

    pub fn joint(&self, joint: JointType) -> &Joint {
        &self.joints[joint.index()]
    }

    pub fn joint_state(&self, joint: JointType) -> TrackingState {
        self.joints[joint.index()].state
    }

    pub fn set_joint(&mut self, joint: JointType, position: Vector3<f32>, state: TrackingState) {
        self.joints[joint.index()] = Joint { position, state };
    }

    pub fn bone(&self, end_joint: JointType) -> &BoneOrientation {
        &self.bones[end_joint.index()]
    }

    pub fn bones(&self) -> impl Iterator<Item = &BoneOrientation> {
        self.bones.iter()
    }

    // Sets the hierarchical rotation of the bone ending at `end_joint`. The
    // start joint is fixed by the sensor topology.
    pub fn set_bone_rotation(&mut self, end_joint: JointType, rotation: Quaternion<f32>) {
        self.bones[end_joint.index()].hierarchical_rotation = rotation;
    }

    pub fn is_tracked(&self) -> bool {
        self.state == SkeletonTrackingState::Tracked
    }
}

// First tracked skeleton takes slot 0, the last tracked one with another id slot 1.
pub fn select_active_skeletons(all: &[TrackedSkeleton]) -> [Option<&TrackedSkeleton>; 2] {
    let mut active: [Option<&TrackedSkeleton>; 2] = [None, None];

    for skeleton in all.iter().filter(|s| s.is_tracked()) {
        match active[0] {
            None => active[0] = Some(skeleton),
            Some(first) if first.tracking_id != skeleton.tracking_id => {
                active[1] = Some(skeleton)
            }
            Some(_) => {}
        }
    }

    active
}
