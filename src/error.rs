// src/error.rs
use crate::compose::ChannelOrder;
use crate::skeleton::JointType;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetargetError {
    #[error("bone array holds {actual} transforms but the rig needs {expected}")]
    BoneCountMismatch { expected: usize, actual: usize },

    #[error("bind-pose root rotation cannot be inverted")]
    SingularBindPose,

    #[error("sensor rotation for {0:?} has zero length")]
    DegenerateRotation(JointType),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentError {
    #[error("depth buffer holds {actual} pixels, {width}x{height} frame needs {expected}")]
    DepthBufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("color-to-depth divisor must be positive, got {0}")]
    InvalidDivisor(i32),

    #[error("foreground mask has no pixels")]
    EmptyMask,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComposeError {
    #[error("color buffer holds {actual} bytes, {width}x{height} frame needs {expected}")]
    ColorBufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("mask {mask_width}x{mask_height} does not evenly cover {width}x{height} frame")]
    MaskSize {
        width: u32,
        height: u32,
        mask_width: u32,
        mask_height: u32,
    },

    #[error("background is {actual_width}x{actual_height}, expected {width}x{height}")]
    BackgroundSize {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("retargeting avatar {slot}: {source}")]
    Retarget {
        slot: usize,
        #[source]
        source: RetargetError,
    },

    #[error("{stream} frame is {width}x{height}, configured for {expected_width}x{expected_height}")]
    FrameSize {
        stream: &'static str,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    #[error("color frame is {actual:?}, configured for {expected:?}")]
    ChannelOrder {
        expected: ChannelOrder,
        actual: ChannelOrder,
    },

    #[error(transparent)]
    Segment(#[from] SegmentError),

    #[error(transparent)]
    Compose(#[from] ComposeError),
}
