// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 渲染输出 (Render Sink)
///
/// 核心只调用两个绘图原语: 清屏 和 画线段.
/// 叠加层 (检测框) 由检测器的 render_predictions 驱动
/// - CanvasSink: 基于 image/imageproc 的内存画布
/// - Palette:    画笔颜色轮换
pub mod canvas;
pub mod palette;

use crate::detection::types::{Point2, Prediction, Size};

pub use canvas::CanvasSink;
pub use palette::Palette;

/// 画笔样式
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: [u8; 4],
    pub width: f32,
}

/// 绘图表面
///
/// 所有方法都是同步的, 只有副作用, 重复调用安全
pub trait RenderSink {
    /// 绘图表面尺寸 (笔画坐标系)
    fn surface_size(&self) -> Size;

    /// 清空笔画 ("open" 手势)
    fn clear_surface(&mut self);

    fn draw_segment(&mut self, from: Point2, to: Point2, style: &StrokeStyle);

    /// 清除上一帧的叠加层
    fn clear_overlay(&mut self) {}

    /// 叠加绘制一个检测框 (帧坐标)
    fn draw_detection(&mut self, _prediction: &Prediction, _frame_size: Size) {}
}
