// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测系统 (Detection System)
///
/// 把逐帧的检测结果变成稳定的手势和连续的笔画
/// - Detector:   外部检测器接口
/// - Stabilizer: 手势防抖与单次触发
/// - Stroke:     point 手势 → 绘图线段
/// - Scripted:   脚本回放检测器 (演示/测试)
pub mod detector;
pub mod scripted;
pub mod stabilizer;
pub mod stroke;
pub mod types;

pub use detector::Detector;
pub use scripted::{ScriptStep, ScriptedDetector};
pub use stabilizer::{
    top_prediction, GestureAction, GestureEvent, GestureStabilizer, GestureState,
};
pub use stroke::{StrokeState, StrokeTracker};
pub use types::{Bbox, Label, Point2, Prediction, Segment, Size};
