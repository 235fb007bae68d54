// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 会话配置参数
pub mod detection; // 手势稳定 + 笔画跟踪
pub mod error; // 错误类型
pub mod input; // 帧源
pub mod pipeline; // 检测调度
pub mod render; // 画布与调色板

pub use crate::config::SessionConfig;
pub use crate::detection::{
    Bbox, Detector, GestureAction, GestureEvent, GestureStabilizer, Label, Point2, Prediction,
    ScriptedDetector, Segment, Size, StrokeTracker,
};
pub use crate::error::{ConfigError, DetectError, SessionError};
pub use crate::input::{FrameInfo, FrameSource, SyntheticCamera};
pub use crate::pipeline::{DetectionScheduler, SessionEvent, SessionHandle, SessionReport, SessionState};
pub use crate::render::{CanvasSink, Palette, RenderSink, StrokeStyle};

/// 时间戳字符串 (北京时间), 用于输出文件名
pub fn gen_time_string(delimiter: &str) -> String {
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    match chrono::FixedOffset::east_opt(8 * 60 * 60) {
        Some(offset) => chrono::Utc::now().with_timezone(&offset).format(&fmt).to_string(),
        None => chrono::Utc::now().format(&fmt).to_string(),
    }
}
