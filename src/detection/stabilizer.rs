// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 手势稳定器 (Gesture Stabilizer)
//!
//! 逐帧检测结果 → 置信度门限 → 稳定度累积 + 驻留时间 → 单次触发动作
//!
//! 核心思想:
//! 1. 每帧只看最高分的检测框, 低于置信度下限视为 "none"
//! 2. 同一标签连续出现时稳定度递增, 标签变化时重置为种子值并重新计时
//! 3. 稳定度超过阈值 且 驻留时间足够 才算可触发
//! 4. 单次动作 (open → 清屏, closed → 换色) 在一个连续稳定期内只触发一次

use std::time::Instant;

use tracing::debug;

use super::types::{Label, Prediction};
use crate::config::StabilizerConfig;

/// 手势触发的单次动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureAction {
    /// open: 清空画布
    ClearSurface,
    /// closed: 切换画笔颜色
    NextColor,
}

impl GestureAction {
    pub fn for_label(label: &Label) -> Option<Self> {
        match label {
            Label::Open => Some(GestureAction::ClearSurface),
            Label::Closed => Some(GestureAction::NextColor),
            _ => None,
        }
    }
}

/// 单帧更新的输出
#[derive(Debug, Clone, PartialEq)]
pub struct GestureEvent {
    /// 通过置信度门限的原始标签 (None 即 "none")
    pub observed: Option<Label>,
    /// 当前可触发的稳定手势
    pub stable: Option<Label>,
    /// 本帧刚触发的动作 (边沿事件)
    pub triggered: Option<GestureAction>,
    pub stability: f32,
}

/// 跨帧手势状态, 每个会话一份
#[derive(Debug, Clone, PartialEq)]
pub struct GestureState {
    current_label: Option<Label>,
    stable_since: Option<Instant>,
    stability_score: f32,
    /// 当前稳定期内是否已派发过动作
    action_dispatched: bool,
}

impl GestureState {
    pub fn new() -> Self {
        Self {
            current_label: None,
            stable_since: None,
            stability_score: 0.0,
            action_dispatched: false,
        }
    }

    pub fn current_label(&self) -> Option<&Label> {
        self.current_label.as_ref()
    }

    pub fn stable_since(&self) -> Option<Instant> {
        self.stable_since
    }

    pub fn stability_score(&self) -> f32 {
        self.stability_score
    }

    pub fn action_dispatched(&self) -> bool {
        self.action_dispatched
    }
}

impl Default for GestureState {
    fn default() -> Self {
        Self::new()
    }
}

/// 取最高分的检测结果, 同分保留先出现的
pub fn top_prediction(predictions: &[Prediction]) -> Option<&Prediction> {
    predictions.iter().fold(None, |best: Option<&Prediction>, p| match best {
        Some(b) if p.score() <= b.score() => Some(b),
        _ => Some(p),
    })
}

pub struct GestureStabilizer {
    config: StabilizerConfig,
    state: GestureState,
}

impl GestureStabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        Self {
            config,
            state: GestureState::new(),
        }
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    /// 重置状态 (会话停止/重启)
    pub fn reset(&mut self) {
        self.state = GestureState::new();
    }

    /// 参与手势判定的检测结果: 最高分且不低于置信度下限
    pub fn gated_top<'a>(&self, predictions: &'a [Prediction]) -> Option<&'a Prediction> {
        top_prediction(predictions).filter(|p| p.score() >= self.config.confidence_floor)
    }

    /// 低于置信度下限或无检测时返回 None
    pub fn observe(&self, predictions: &[Prediction]) -> Option<Label> {
        self.gated_top(predictions).map(|p| p.label.clone())
    }

    pub fn update(&mut self, predictions: &[Prediction], now: Instant) -> GestureEvent {
        let observed = self.observe(predictions);
        let state = &mut self.state;

        if state.stable_since.is_some() && observed == state.current_label {
            state.stability_score = (state.stability_score + self.config.stability_step).min(1.0);
        } else {
            debug!(
                "手势变化: {} → {}",
                label_str(state.current_label.as_ref()),
                label_str(observed.as_ref())
            );
            state.current_label = observed.clone();
            state.stability_score = self.config.seed_score;
            state.stable_since = Some(now);
            state.action_dispatched = false;
        }

        let stable = self.actionable_label(now).cloned();

        let mut triggered = None;
        if let Some(label) = &stable {
            if !self.state.action_dispatched {
                if let Some(action) = GestureAction::for_label(label) {
                    self.state.action_dispatched = true;
                    triggered = Some(action);
                }
            }
        }

        GestureEvent {
            observed,
            stable,
            triggered,
            stability: self.state.stability_score,
        }
    }

    /// 稳定度超过阈值 且 驻留时间达到下限
    fn actionable_label(&self, now: Instant) -> Option<&Label> {
        let label = self.state.current_label.as_ref()?;
        let since = self.state.stable_since?;
        let dwelled = now.saturating_duration_since(since) >= self.config.min_dwell();
        (self.state.stability_score > self.config.stability_threshold && dwelled).then_some(label)
    }
}

fn label_str(label: Option<&Label>) -> &str {
    label.map(Label::as_str).unwrap_or("none")
}
