// src/export.rs
use crate::mapping::{JointMapping, ROOT_BONE};
use crate::retarget::BoneTransform;
use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use std::fs::File;
use std::path::{Path, PathBuf};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
struct PoseRecord {
    timestamp: f64,
    frame: u32,
    slot: usize,
    tracking_id: u32,
    joint: &'static str,
    bone: usize,
    qx: f32,
    qy: f32,
    qz: f32,
    qw: f32,
    // Only the root bone carries translation
    tx: Option<f32>,
    ty: Option<f32>,
    tz: Option<f32>,
}

// Collects retargeted poses over a session and writes them as CSV, one row per
// mapped bone per avatar per frame.
pub struct PoseExporter {
    output_dir: PathBuf,
    session_name: String,
    mapping: &'static JointMapping,
    records: Vec<PoseRecord>,
    frames: u32,
}

impl PoseExporter {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            mapping: JointMapping::default_rig(),
            records: Vec::new(),
            frames: 0,
        }
    }

    pub fn with_mapping(mut self, mapping: &'static JointMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    pub fn frame_count(&self) -> u32 {
        self.frames
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    // Records one avatar's bones for frame `frame`. Bones beyond the end of
    // `bones` are skipped.
    pub fn add_pose(
        &mut self,
        frame: u32,
        timestamp: f64,
        slot: usize,
        tracking_id: u32,
        bones: &[BoneTransform],
    ) {
        self.frames = self.frames.max(frame.saturating_add(1));

        if let Some(root) = bones.get(ROOT_BONE) {
            self.records.push(Self::record(frame, timestamp, slot, tracking_id, "root", ROOT_BONE, root, true));
        }

        for (joint, bone) in self.mapping.joints() {
            if let Some(transform) = bones.get(bone) {
                self.records.push(Self::record(
                    frame,
                    timestamp,
                    slot,
                    tracking_id,
                    joint.name(),
                    bone,
                    transform,
                    false,
                ));
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        frame: u32,
        timestamp: f64,
        slot: usize,
        tracking_id: u32,
        joint: &'static str,
        bone: usize,
        transform: &BoneTransform,
        with_translation: bool,
    ) -> PoseRecord {
        let q = transform.rotation.quaternion();
        let t = transform.translation.vector;
        PoseRecord {
            timestamp,
            frame,
            slot,
            tracking_id,
            joint,
            bone,
            qx: q.i,
            qy: q.j,
            qz: q.k,
            qw: q.w,
            tx: with_translation.then_some(t.x),
            ty: with_translation.then_some(t.y),
            tz: with_translation.then_some(t.z),
        }
    }

    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self.session_dir().join("pose_data.csv");

        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create session directory {}", parent.display()))?;
        }

        let file = File::create(&csv_path)
            .with_context(|| format!("Cannot create {}", csv_path.display()))?;
        let mut writer = Writer::from_writer(file);

        for record in &self.records {
            writer.serialize(record)?;
        }

        writer.flush()?;
        info!(rows = self.records.len(), "Exported poses to {}", csv_path.display());
        Ok(csv_path)
    }
}
