// src/posture.rs - Posture heuristics layered over the per-joint mapping
use crate::mapping::JointMapping;
use crate::remap::{rotation_about, AxisRemap, LocalAxis};
use crate::retarget::{replace_bone_transform, BoneTransform};
use crate::skeleton::JointType;
use nalgebra::{Translation3, UnitQuaternion, Vector3};
use tracing::debug;

// A spine tipped back past the hips (negative dot of hip forward and spine up)
// is rotated forward by -(angle / 2) * (dot / 2) about X.
pub fn correct_backward_lean(
    hip_center: &UnitQuaternion<f32>,
    spine: &UnitQuaternion<f32>,
    enabled: bool,
) -> UnitQuaternion<f32> {
    let hip_forward = -(hip_center * Vector3::z());
    let spine_up = spine * Vector3::y();

    let cos_angle = hip_forward.normalize().dot(&spine_up.normalize());

    if cos_angle < 0.0 && enabled {
        let angle = cos_angle.clamp(-1.0, 1.0).acos();
        let correction = -(angle / 2.0) * (cos_angle / 2.0);
        debug!("Backward lean detected (cos {:.3}), correcting by {:.3} rad", cos_angle, correction);
        spine * UnitQuaternion::from_axis_angle(&LocalAxis::Lateral.unit(), correction)
    } else {
        *spine
    }
}

// Hip rotation that folds both thighs up into a sitting pose: flip the leg to
// point down, then pull the knee forward.
pub fn seated_hip_rotation() -> UnitQuaternion<f32> {
    rotation_about(LocalAxis::Lateral, 90.0) * rotation_about(LocalAxis::Forward, 180.0)
}

pub fn seated_ankle_rotation() -> UnitQuaternion<f32> {
    rotation_about(LocalAxis::Lateral, -90.0)
}

// Overwrites both legs with the fixed seated posture. Thigh bones are driven by
// the knee joints, lower legs by the ankles.
pub fn apply_seated_posture(mapping: &JointMapping, bones: &mut [BoneTransform]) {
    let hip = AxisRemap::LEG.apply(&seated_hip_rotation());
    let ankle = AxisRemap::LEG.apply(&seated_ankle_rotation());

    for (joint, rotation) in [
        (JointType::KneeLeft, hip),
        (JointType::KneeRight, hip),
        (JointType::AnkleLeft, ankle),
        (JointType::AnkleRight, ankle),
    ] {
        let transform = BoneTransform::from_parts(Translation3::identity(), rotation);
        replace_bone_transform(mapping, joint, transform, false, bones);
    }
}
