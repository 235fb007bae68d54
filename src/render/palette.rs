// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 画笔调色板 - 只由 "closed" 手势推进

use super::StrokeStyle;
use crate::config::PaletteConfig;

#[derive(Debug, Clone)]
pub struct Palette {
    colors: Vec<[u8; 4]>,
    width: f32,
    index: usize,
}

impl Palette {
    pub fn new(config: &PaletteConfig) -> Self {
        let colors = if config.colors.is_empty() {
            PaletteConfig::default().colors
        } else {
            config.colors.clone()
        };
        Self {
            colors,
            width: config.stroke_width,
            index: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// 切换到下一个颜色, 返回新的下标
    pub fn advance(&mut self) -> usize {
        self.index = (self.index + 1) % self.colors.len();
        self.index
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    pub fn style(&self) -> StrokeStyle {
        StrokeStyle {
            color: self.colors[self.index],
            width: self.width,
        }
    }
}
