// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 会话配置 - 通过JSON文件调整参数

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;

/// 大跳变被拒绝后锚点的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JumpPolicy {
    /// 保持旧锚点, 等手回到附近
    #[default]
    Hold,
    /// 锚点移动到新位置但不画线
    Reset,
}

/// 微小抖动 (< min_step) 时锚点的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterPolicy {
    /// 锚点不动, 慢速移动累积到超过 min_step 再画
    #[default]
    Accumulate,
    /// 锚点跟随当前点 (线段之间可能留下小于 min_step 的缝隙)
    Follow,
}

/// 手势稳定器参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    pub confidence_floor: f32,    // 置信度下限
    pub stability_step: f32,      // 同标签每帧累加
    pub seed_score: f32,          // 标签切换后的初始稳定度
    pub stability_threshold: f32, // 可触发阈值
    pub min_dwell_ms: u64,        // 最短驻留时间
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            confidence_floor: 0.65,
            stability_step: 0.15,
            seed_score: 0.1,
            stability_threshold: 0.5,
            min_dwell_ms: 500,
        }
    }
}

impl StabilizerConfig {
    pub fn min_dwell(&self) -> Duration {
        Duration::from_millis(self.min_dwell_ms)
    }
}

/// 笔画跟踪参数 (单位: 绘图表面像素)
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StrokeConfig {
    pub max_jump: f32,
    pub min_step: f32,
    pub jump_policy: JumpPolicy,
    pub jitter_policy: JitterPolicy,
}

impl Default for StrokeConfig {
    fn default() -> Self {
        Self {
            max_jump: 100.0,
            min_step: 2.0,
            jump_policy: JumpPolicy::Hold,
            jitter_policy: JitterPolicy::Accumulate,
        }
    }
}

/// 调度器参数
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub tick_period_ms: u64,
    /// 0 表示不限时
    pub detect_timeout_ms: u64,
    pub ready_timeout_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: 120,
            detect_timeout_ms: 0,
            ready_timeout_ms: 3000,
        }
    }
}

impl SchedulerConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn detect_timeout(&self) -> Option<Duration> {
        (self.detect_timeout_ms > 0).then(|| Duration::from_millis(self.detect_timeout_ms))
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

/// 画笔调色板
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteConfig {
    pub colors: Vec<[u8; 4]>,
    pub stroke_width: f32,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            colors: vec![
                [230, 57, 70, 255],  // 红
                [42, 157, 143, 255], // 青
                [69, 123, 157, 255], // 蓝
                [244, 162, 97, 255], // 橙
                [29, 29, 29, 255],   // 黑
            ],
            stroke_width: 4.0,
        }
    }
}

/// 会话配置 (会话启动时传入)
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub stabilizer: StabilizerConfig,
    pub stroke: StrokeConfig,
    pub scheduler: SchedulerConfig,
    pub palette: PaletteConfig,
}

impl SessionConfig {
    /// 从JSON文件加载配置
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                config.save(path);
                config
            }
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    warn!("❌ 保存配置失败: {}", e);
                } else {
                    info!("💾 配置已保存到 {}", path.display());
                }
            }
            Err(e) => warn!("❌ 序列化配置失败: {}", e),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.stabilizer;
        for (field, value) in [
            ("confidence_floor", s.confidence_floor),
            ("stability_step", s.stability_step),
            ("seed_score", s.seed_score),
            ("stability_threshold", s.stability_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfUnitRange { field, value });
            }
        }
        if s.stability_step <= 0.0 {
            return Err(ConfigError::NotPositive {
                field: "stability_step",
            });
        }
        if self.stroke.min_step < 0.0 || self.stroke.min_step >= self.stroke.max_jump {
            return Err(ConfigError::StepBounds {
                min_step: self.stroke.min_step,
                max_jump: self.stroke.max_jump,
            });
        }
        if self.scheduler.tick_period_ms == 0 {
            return Err(ConfigError::NotPositive {
                field: "tick_period_ms",
            });
        }
        if self.palette.colors.is_empty() {
            return Err(ConfigError::EmptyPalette);
        }
        if self.palette.stroke_width <= 0.0 {
            return Err(ConfigError::NotPositive {
                field: "stroke_width",
            });
        }
        Ok(())
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        info!("🎛️  当前会话配置:");
        info!(
            "  置信度下限: {:.2} | 稳定阈值: {:.2} | 驻留: {}ms",
            self.stabilizer.confidence_floor,
            self.stabilizer.stability_threshold,
            self.stabilizer.min_dwell_ms
        );
        info!(
            "  笔画距离: [{:.1}, {:.1}) px | 跳变策略: {:?} | 抖动策略: {:?}",
            self.stroke.min_step,
            self.stroke.max_jump,
            self.stroke.jump_policy,
            self.stroke.jitter_policy
        );
        info!(
            "  检测周期: {}ms | 颜色数: {}",
            self.scheduler.tick_period_ms,
            self.palette.colors.len()
        );
    }
}
