// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 错误类型定义

use std::time::Duration;

use thiserror::Error;

use crate::pipeline::SessionState;

/// 会话错误 (启动阶段)
#[derive(Debug, Error)]
pub enum SessionError {
    /// 帧源不可用或被拒绝, 会话保持 Idle
    #[error("frame source unavailable: {0}")]
    ResourceUnavailable(#[source] anyhow::Error),

    #[error("session is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },

    #[error("session stopped while starting")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// 单次检测失败 (可恢复, 不终止会话)
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("detector timed out after {0:?}")]
    Timeout(Duration),

    #[error("detector failed: {0}")]
    Failed(#[from] anyhow::Error),
}

/// 配置校验错误
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be within [0, 1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f32 },

    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },

    #[error("stroke min_step ({min_step}) must be below max_jump ({max_jump})")]
    StepBounds { min_step: f32, max_jump: f32 },

    #[error("palette must contain at least one color")]
    EmptyPalette,
}
