// src/lib.rs
pub mod compose;
pub mod config;
pub mod error;
pub mod export;
pub mod frame;
pub mod mapping;
pub mod posture;
pub mod remap;
pub mod retarget;
pub mod segment;
pub mod skeleton;

pub use compose::{ChannelOrder, ColorFrame, SnapshotWriter};
pub use config::Config;
pub use error::{ComposeError, FrameError, RetargetError, SegmentError};
pub use export::PoseExporter;
pub use frame::{AvatarAnimator, FrameOutput, FrameProcessor, SensorFrame};
pub use mapping::JointMapping;
pub use retarget::{BoneTransform, RetargetSummary, RetargetingEngine};
pub use segment::{ColorPoint, CoordinateMapper, DepthFrame, DepthPixel, ForegroundMask, ForegroundSegmenter};
pub use skeleton::{JointType, TrackedSkeleton, TrackingState};
