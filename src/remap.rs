// src/remap.rs - Sensor-to-avatar axis conventions per joint group
use crate::skeleton::JointType;
use nalgebra::{Quaternion, Unit, UnitQuaternion, Vector3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedAxis {
    PosX,
    PosY,
    PosZ,
    NegX,
    NegY,
    NegZ,
}

impl SignedAxis {
    fn pick(self, q: &Quaternion<f32>) -> f32 {
        match self {
            SignedAxis::PosX => q.i,
            SignedAxis::PosY => q.j,
            SignedAxis::PosZ => q.k,
            SignedAxis::NegX => -q.i,
            SignedAxis::NegY => -q.j,
            SignedAxis::NegZ => -q.k,
        }
    }
}

// Which sensor components feed the avatar quaternion's x, y and z. W is always
// carried over unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRemap {
    pub x: SignedAxis,
    pub y: SignedAxis,
    pub z: SignedAxis,
}

impl AxisRemap {
    // Sensor: +X left, +Y up, +Z forward. Avatar: +Z left, +X up, +Y forward.
    // Legs and feet share the same permutation.
    pub const TORSO: AxisRemap = AxisRemap::new(SignedAxis::PosY, SignedAxis::PosZ, SignedAxis::PosX);
    pub const LEG: AxisRemap = AxisRemap::TORSO;
    // Sensor arm: +Y along the arm. Avatar arm: +X along the arm, Z flipped.
    pub const ARM: AxisRemap = AxisRemap::new(SignedAxis::PosY, SignedAxis::NegZ, SignedAxis::NegX);
    pub const LEFT_HAND: AxisRemap = AxisRemap::new(SignedAxis::PosY, SignedAxis::PosX, SignedAxis::NegZ);
    pub const RIGHT_HAND: AxisRemap = AxisRemap::new(SignedAxis::PosY, SignedAxis::NegX, SignedAxis::PosZ);

    pub const fn new(x: SignedAxis, y: SignedAxis, z: SignedAxis) -> Self {
        Self { x, y, z }
    }

    pub fn apply(&self, rotation: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
        let q = rotation.quaternion();
        let remapped = Quaternion::new(q.w, self.x.pick(q), self.y.pick(q), self.z.pick(q));
        // A signed permutation keeps the norm; renormalize only to shed float drift.
        UnitQuaternion::new_normalize(remapped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAxis {
    Lateral,  // X
    Vertical, // Y
    Forward,  // Z
}

impl LocalAxis {
    pub fn unit(self) -> Unit<Vector3<f32>> {
        match self {
            LocalAxis::Lateral => Vector3::x_axis(),
            LocalAxis::Vertical => Vector3::y_axis(),
            LocalAxis::Forward => Vector3::z_axis(),
        }
    }
}

// Fixed rotation that lines the avatar's neutral pose up with the sensor's.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub axis: LocalAxis,
    pub degrees: f32,
}

impl Calibration {
    pub const fn new(axis: LocalAxis, degrees: f32) -> Self {
        Self { axis, degrees }
    }

    pub fn rotation(&self) -> UnitQuaternion<f32> {
        rotation_about(self.axis, self.degrees)
    }
}

pub fn rotation_about(axis: LocalAxis, degrees: f32) -> UnitQuaternion<f32> {
    UnitQuaternion::from_axis_angle(&axis.unit(), degrees.to_radians())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointRule {
    pub remap: AxisRemap,
    pub calibration: Option<Calibration>,
    // Joint whose hierarchical rotation is composed onto this one before remapping.
    pub composite_with: Option<JointType>,
    // Skip unless both this joint and its start joint are fully tracked.
    pub require_tracked_parent: bool,
    // Damp backward lean before calibration.
    pub lean_correction: bool,
}

impl JointRule {
    const fn remap(remap: AxisRemap) -> Self {
        Self {
            remap,
            calibration: None,
            composite_with: None,
            require_tracked_parent: false,
            lean_correction: false,
        }
    }

    const fn calibrated(mut self, axis: LocalAxis, degrees: f32) -> Self {
        self.calibration = Some(Calibration::new(axis, degrees));
        self
    }

    const fn composite(mut self, joint: JointType) -> Self {
        self.composite_with = Some(joint);
        self
    }

    const fn tracked_parent(mut self) -> Self {
        self.require_tracked_parent = true;
        self
    }

    const fn lean(mut self) -> Self {
        self.lean_correction = true;
        self
    }

    // Calibration then axis remap. The rotation passed in already includes any
    // composite partner and lean correction.
    pub fn convert(&self, rotation: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
        let calibrated = match &self.calibration {
            Some(calibration) => rotation * calibration.rotation(),
            None => *rotation,
        };
        self.remap.apply(&calibrated)
    }
}

// How a bone is handled during retargeting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointGroup {
    // Hip center: cancels the rig's baked root and pelvis bind rotations.
    Root,
    // Shoulder center: held back for a seated-mode root override.
    Reserved,
    Remapped(JointRule),
}

// Looks up the retargeting rule for the bone ending at `joint`. `None` means the
// sensor bone has no avatar counterpart and is ignored.
pub fn joint_group(joint: JointType) -> Option<JointGroup> {
    use JointType::*;

    let group = match joint {
        HipCenter => JointGroup::Root,
        ShoulderCenter => JointGroup::Reserved,
        Spine => JointGroup::Remapped(
            JointRule::remap(AxisRemap::TORSO)
                .calibrated(LocalAxis::Lateral, 20.0)
                .lean(),
        ),
        Head => JointGroup::Remapped(JointRule::remap(AxisRemap::TORSO).calibrated(LocalAxis::Lateral, -30.0)),
        ElbowLeft => JointGroup::Remapped(JointRule::remap(AxisRemap::ARM).calibrated(LocalAxis::Forward, -15.0)),
        WristLeft => JointGroup::Remapped(JointRule::remap(AxisRemap::ARM)),
        HandLeft => {
            JointGroup::Remapped(JointRule::remap(AxisRemap::LEFT_HAND).calibrated(LocalAxis::Vertical, -90.0))
        }
        ElbowRight => JointGroup::Remapped(JointRule::remap(AxisRemap::ARM).calibrated(LocalAxis::Forward, 15.0)),
        WristRight => JointGroup::Remapped(JointRule::remap(AxisRemap::ARM)),
        HandRight => {
            JointGroup::Remapped(JointRule::remap(AxisRemap::RIGHT_HAND).calibrated(LocalAxis::Vertical, 90.0))
        }
        KneeLeft => JointGroup::Remapped(JointRule::remap(AxisRemap::LEG).composite(HipLeft)),
        KneeRight => JointGroup::Remapped(JointRule::remap(AxisRemap::LEG).composite(HipRight)),
        AnkleLeft | AnkleRight => JointGroup::Remapped(JointRule::remap(AxisRemap::LEG)),
        FootLeft | FootRight => JointGroup::Remapped(
            JointRule::remap(AxisRemap::LEG)
                .calibrated(LocalAxis::Lateral, -45.0)
                .tracked_parent(),
        ),
        ShoulderLeft | ShoulderRight | HipLeft | HipRight => return None,
    };

    Some(group)
}
