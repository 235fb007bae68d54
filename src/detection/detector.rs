// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测器接口 (Detector)
//! 职责: 输入一帧 → 异步返回带标签和置信度的检测框
//!
//! 具体模型由外部提供, 可能很慢, 也可能失败

use anyhow::Result;

use super::types::Prediction;
use crate::input::FrameInfo;
use crate::render::RenderSink;

/// 手势检测器统一接口
///
/// 调度器保证同一时刻最多只有一个 `detect` 在执行
#[allow(async_fn_in_trait)]
pub trait Detector<F> {
    /// 检测单帧
    async fn detect(&mut self, frame: &F) -> Result<Vec<Prediction>>;

    /// 在叠加层上绘制检测结果
    ///
    /// 调度器只传入最高分的那一个 (或空), 与手势判定保持一致
    fn render_predictions(
        &mut self,
        predictions: &[Prediction],
        sink: &mut dyn RenderSink,
        frame: FrameInfo,
    ) {
        let frame_size = frame.size();
        sink.clear_overlay();
        for prediction in predictions {
            sink.draw_detection(prediction, frame_size);
        }
    }
}
