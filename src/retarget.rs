// src/retarget.rs - Maps a tracked skeleton's bone rotations onto the avatar rig
use crate::config::RetargetConfig;
use crate::error::RetargetError;
use crate::mapping::{JointMapping, ROOT_BONE};
use crate::posture::{apply_seated_posture, correct_backward_lean};
use crate::remap::{joint_group, JointGroup, JointRule};
use crate::skeleton::{BoneOrientation, JointType, TrackedSkeleton, TrackingState};
use nalgebra::{Isometry3, Matrix3, Matrix4, Translation3, UnitQuaternion, Vector3};
use tracing::{debug, warn};

pub type BoneTransform = Isometry3<f32>;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RetargetSummary {
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub root_translation: Vector3<f32>,
}

// Unmapped joints are ignored. Without replace_translation only the rotation is written.
pub fn replace_bone_transform(
    mapping: &JointMapping,
    joint: JointType,
    transform: BoneTransform,
    replace_translation: bool,
    bones: &mut [BoneTransform],
) -> bool {
    let Some(slot) = mapping.bone_index(joint).and_then(|index| bones.get_mut(index)) else {
        return false;
    };

    if replace_translation {
        *slot = transform;
    } else {
        slot.rotation = transform.rotation;
    }
    true
}

fn unit_rotation(bone: &BoneOrientation) -> Result<UnitQuaternion<f32>, RetargetError> {
    bone.rotation()
        .ok_or(RetargetError::DegenerateRotation(bone.end_joint))
}

pub struct RetargetingEngine<'m> {
    mapping: &'m JointMapping,
    config: RetargetConfig,
}

impl RetargetingEngine<'static> {
    pub fn with_default_rig(config: RetargetConfig) -> Self {
        Self::new(JointMapping::default_rig(), config)
    }
}

impl<'m> RetargetingEngine<'m> {
    pub fn new(mapping: &'m JointMapping, config: RetargetConfig) -> Self {
        Self { mapping, config }
    }

    pub fn config(&self) -> &RetargetConfig {
        &self.config
    }

    pub fn mapping(&self) -> &JointMapping {
        self.mapping
    }

    // Bones in sensor order, then the seated override, then the root translation.
    pub fn retarget(
        &self,
        skeleton: Option<&TrackedSkeleton>,
        bind_root: &Matrix4<f32>,
        bones: &mut [BoneTransform],
    ) -> Result<RetargetSummary, RetargetError> {
        if bones.len() < self.mapping.bone_count() {
            return Err(RetargetError::BoneCountMismatch {
                expected: self.mapping.bone_count(),
                actual: bones.len(),
            });
        }

        let Some(skeleton) = skeleton else {
            debug!("No skeleton this frame, avatar left as is");
            return Ok(RetargetSummary::default());
        };

        let mut summary = RetargetSummary::default();

        for bone in skeleton.bones() {
            if skeleton.joint_state(bone.end_joint) == TrackingState::NotTracked {
                summary.skipped += 1;
                continue;
            }

            match self.apply_bone(skeleton, bone, bind_root, bones) {
                Ok(true) => summary.applied += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    warn!(joint = bone.end_joint.name(), "Leaving joint at previous transform: {}", e);
                    summary.failed += 1;
                }
            }
        }

        if self.config.seated_posture {
            apply_seated_posture(self.mapping, bones);
        }

        let root = self.root_world_position(skeleton);
        if let Some(root_bone) = bones.get_mut(ROOT_BONE) {
            root_bone.translation.vector = root;
        }
        summary.root_translation = root;

        Ok(summary)
    }

    fn apply_bone(
        &self,
        skeleton: &TrackedSkeleton,
        bone: &BoneOrientation,
        bind_root: &Matrix4<f32>,
        bones: &mut [BoneTransform],
    ) -> Result<bool, RetargetError> {
        let Some(group) = joint_group(bone.end_joint) else {
            return Ok(false);
        };

        match group {
            JointGroup::Root => {
                let Some(rotation) = self.root_rotation(bone, bind_root, bones)? else {
                    return Ok(false);
                };
                let transform = BoneTransform::from_parts(Translation3::identity(), rotation);
                Ok(replace_bone_transform(self.mapping, JointType::HipCenter, transform, true, bones))
            }
            JointGroup::Reserved => Ok(false),
            JointGroup::Remapped(rule) => {
                let Some(rotation) = self.pre_remap_rotation(skeleton, bone, &rule)? else {
                    return Ok(false);
                };
                let transform = BoneTransform::from_parts(Translation3::identity(), rule.convert(&rotation));
                Ok(replace_bone_transform(self.mapping, bone.end_joint, transform, false, bones))
            }
        }
    }

    // Sensor rotation for a remapped joint after composition and lean damping,
    // before calibration and axis remap. `None` when the rule declines the joint.
    pub fn pre_remap_rotation(
        &self,
        skeleton: &TrackedSkeleton,
        bone: &BoneOrientation,
        rule: &JointRule,
    ) -> Result<Option<UnitQuaternion<f32>>, RetargetError> {
        if rule.require_tracked_parent
            && (skeleton.joint_state(bone.end_joint) != TrackingState::Tracked
                || skeleton.joint_state(bone.start_joint) != TrackingState::Tracked)
        {
            return Ok(None);
        }

        let mut rotation = unit_rotation(bone)?;

        if let Some(partner) = rule.composite_with {
            rotation *= unit_rotation(skeleton.bone(partner))?;
        }

        if rule.lean_correction {
            match skeleton.bone(JointType::HipCenter).rotation() {
                Some(hip) => rotation = correct_backward_lean(&hip, &rotation, self.config.lean_adjust),
                None => debug!("Hip rotation degenerate, spine lean left uncorrected"),
            }
        }

        Ok(Some(rotation))
    }

    // Hip-center rotation with the rig's baked root and pelvis bind rotations
    // cancelled out, so the hips face where the sensor says they do.
    fn root_rotation(
        &self,
        bone: &BoneOrientation,
        bind_root: &Matrix4<f32>,
        bones: &[BoneTransform],
    ) -> Result<Option<UnitQuaternion<f32>>, RetargetError> {
        let Some(pelvis) = self
            .mapping
            .bone_index(JointType::HipCenter)
            .and_then(|index| bones.get(index))
        else {
            return Ok(None);
        };

        let inv_bind_root = inverse_bind_rotation(bind_root)?;
        let hip = unit_rotation(bone)?;
        let inv_pelvis = pelvis.rotation.inverse();

        Ok(Some(inv_bind_root * hip * inv_pelvis))
    }

    // Hip center, else shoulder center, else the origin; scaled to modeling units.
    pub fn root_world_position(&self, skeleton: &TrackedSkeleton) -> Vector3<f32> {
        let mut position = [JointType::HipCenter, JointType::ShoulderCenter]
            .into_iter()
            .map(|joint| skeleton.joint(joint))
            .find(|joint| joint.state != TrackingState::NotTracked)
            .map(|joint| joint.position)
            .unwrap_or_else(Vector3::zeros);

        if let Some(height) = self.config.fixed_draw_height() {
            position.y = height;
        }

        position.component_mul(&self.config.scale())
    }
}

fn inverse_bind_rotation(bind_root: &Matrix4<f32>) -> Result<UnitQuaternion<f32>, RetargetError> {
    let linear: Matrix3<f32> = bind_root.fixed_view::<3, 3>(0, 0).into_owned();
    let inverse = linear
        .try_inverse()
        .filter(|m| m.iter().all(|v| v.is_finite()))
        .ok_or(RetargetError::SingularBindPose)?;
    Ok(UnitQuaternion::from_matrix_eps(&inverse, 1.0e-6, 64, UnitQuaternion::identity()))
}
