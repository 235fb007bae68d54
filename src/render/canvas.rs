// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 内存画布 (CanvasSink)
//!
//! 笔画画在持久层上, 检测框只保留最近一帧, 合成时再叠加

use std::path::Path;

use anyhow::Result;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use super::{RenderSink, StrokeStyle};
use crate::detection::types::{Label, Point2, Prediction, Size};

const OVERLAY_COLOR: Rgba<u8> = Rgba([0, 200, 0, 255]);

/// 叠加层上的检测框 (表面坐标)
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub label: Label,
    pub score: f32,
}

pub struct CanvasSink {
    drawing: RgbaImage,
    background: Rgba<u8>,
    overlay: Option<OverlayBox>,
    segments_drawn: usize,
    clears: usize,
}

impl CanvasSink {
    pub fn new(width: u32, height: u32) -> Self {
        let background = Rgba([255, 255, 255, 255]);
        Self {
            drawing: RgbaImage::from_pixel(width.max(1), height.max(1), background),
            background,
            overlay: None,
            segments_drawn: 0,
            clears: 0,
        }
    }

    pub fn with_background(mut self, color: [u8; 4]) -> Self {
        self.background = Rgba(color);
        self.fill_background();
        self
    }

    pub fn image(&self) -> &RgbaImage {
        &self.drawing
    }

    pub fn overlay(&self) -> Option<&OverlayBox> {
        self.overlay.as_ref()
    }

    pub fn segments_drawn(&self) -> usize {
        self.segments_drawn
    }

    pub fn clears(&self) -> usize {
        self.clears
    }

    /// 笔画层 + 检测框
    pub fn composite(&self) -> RgbaImage {
        let mut out = self.drawing.clone();
        if let Some(b) = &self.overlay {
            let rect = Rect::at(b.x.round() as i32, b.y.round() as i32)
                .of_size(b.width.round().max(1.0) as u32, b.height.round().max(1.0) as u32);
            draw_hollow_rect_mut(&mut out, rect, OVERLAY_COLOR);
        }
        out
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.composite().save(path.as_ref())?;
        Ok(())
    }

    fn fill_background(&mut self) {
        for pixel in self.drawing.pixels_mut() {
            *pixel = self.background;
        }
    }
}

impl RenderSink for CanvasSink {
    fn surface_size(&self) -> Size {
        Size::new(self.drawing.width() as f32, self.drawing.height() as f32)
    }

    fn clear_surface(&mut self) {
        self.fill_background();
        self.clears += 1;
    }

    fn draw_segment(&mut self, from: Point2, to: Point2, style: &StrokeStyle) {
        let color = Rgba(style.color);
        let radius = (style.width / 2.0).round() as i32;
        if radius <= 0 {
            draw_line_segment_mut(&mut self.drawing, (from.x, from.y), (to.x, to.y), color);
        } else {
            // 沿线段每像素盖一个圆点, 得到圆头粗线
            let steps = from.distance(&to).ceil().max(1.0) as usize;
            for i in 0..=steps {
                let t = i as f32 / steps as f32;
                let x = from.x + (to.x - from.x) * t;
                let y = from.y + (to.y - from.y) * t;
                draw_filled_circle_mut(
                    &mut self.drawing,
                    (x.round() as i32, y.round() as i32),
                    radius,
                    color,
                );
            }
        }
        self.segments_drawn += 1;
    }

    fn clear_overlay(&mut self) {
        self.overlay = None;
    }

    fn draw_detection(&mut self, prediction: &Prediction, frame_size: Size) {
        if frame_size.is_degenerate() {
            return;
        }
        let surface = self.surface_size();
        let sx = surface.width / frame_size.width;
        let sy = surface.height / frame_size.height;
        let b = prediction.bbox;
        self.overlay = Some(OverlayBox {
            x: b.x * sx,
            y: b.y * sy,
            width: b.width * sx,
            height: b.height * sy,
            label: prediction.label.clone(),
            score: prediction.score(),
        });
    }
}
