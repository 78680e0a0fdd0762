// src/mapping.rs
use crate::skeleton::JointType;
use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const AVATAR_BONE_COUNT: usize = 58;

// Bone index of the rig's root node. Only this bone receives a world translation.
pub const ROOT_BONE: usize = 0;

// Avatar rig bone layout:
//  0 root node       1 pelvis          2-5 spine..spine3   6 neck    7 head
//  8-11 eyes         12 L clavicle     13 L upper arm      14 L forearm
//  15 L hand         16-30 L fingers   31 R clavicle       32 R upper arm
//  33 R forearm      34 R hand         35-49 R fingers     50 L thigh
//  51 L knee         52 L ankle        53 L ball           54 R thigh
//  55 R knee         56 R ankle        57 R ball
//
// The sensor stores a bone's rotation at its end joint, so e.g. the knee joint
// drives the thigh bone.
const DEFAULT_ENTRIES: [(JointType, usize); 16] = [
    (JointType::HipCenter, 1),
    (JointType::Spine, 4),
    (JointType::ShoulderCenter, 6),
    (JointType::Head, 7),
    (JointType::ElbowLeft, 13),
    (JointType::WristLeft, 14),
    (JointType::HandLeft, 15),
    (JointType::ElbowRight, 32),
    (JointType::WristRight, 33),
    (JointType::HandRight, 34),
    (JointType::KneeLeft, 50),
    (JointType::AnkleLeft, 51),
    (JointType::FootLeft, 52),
    (JointType::KneeRight, 54),
    (JointType::AnkleRight, 55),
    (JointType::FootRight, 56),
];

static DEFAULT_MAPPING: Lazy<JointMapping> = Lazy::new(|| JointMapping::from_entries(&DEFAULT_ENTRIES));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JointMapping {
    entries: HashMap<JointType, usize>,
    bone_count: usize,
}

impl JointMapping {
    pub fn default_rig() -> &'static JointMapping {
        &DEFAULT_MAPPING
    }

    pub fn from_entries(entries: &[(JointType, usize)]) -> Self {
        Self::with_bone_count(entries, AVATAR_BONE_COUNT)
    }

    pub fn with_bone_count(entries: &[(JointType, usize)], bone_count: usize) -> Self {
        Self {
            entries: entries.iter().copied().collect(),
            bone_count,
        }
    }

    pub fn bone_index(&self, joint: JointType) -> Option<usize> {
        self.entries.get(&joint).copied()
    }

    pub fn is_mapped(&self, joint: JointType) -> bool {
        self.entries.contains_key(&joint)
    }

    pub fn bone_count(&self) -> usize {
        self.bone_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Mapped joints in sensor order.
    pub fn joints(&self) -> impl Iterator<Item = (JointType, usize)> + '_ {
        JointType::ALL
            .iter()
            .filter_map(move |joint| self.bone_index(*joint).map(|index| (*joint, index)))
    }
}
