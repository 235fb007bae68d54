// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 检测调度流水线 (Detection Pipeline)
///
/// 单线程协作式调度, 每个tick:
/// 帧源 → 检测器 → [手势稳定器, 笔画跟踪] → 渲染输出
///
/// 同一时刻最多一个检测调用在执行, 停止时通过取消令牌立即生效
pub mod scheduler;

use std::time::{Duration, Instant};

use crate::detection::stabilizer::{GestureAction, GestureEvent};

pub use scheduler::{DetectionScheduler, SessionHandle};

// ========== 会话状态 ==========

/// 会话状态机: Idle → Starting → Running → Stopping → Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
}

// ========== 诊断事件 (调度器 → 外部) ==========

#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// 稳定手势发生变化
    Gesture(GestureEvent),
    ActionFired(GestureAction),
    /// 单帧检测失败 (会话继续)
    DetectionFailed { tick: u64, error: String },
    Throughput { fps: f64 },
}

/// 会话统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionReport {
    pub ticks: u64,
    pub frames: u64, // 成功完成检测的帧数
    pub skipped_invalid: u64,
    pub failures: u64,
    pub stale_discarded: u64,
    pub actions_fired: u64,
    pub segments_drawn: u64,
    pub fps: f64,
}

// ========== 吞吐统计 ==========

/// 1秒窗口的帧率统计
#[derive(Debug, Clone, Default)]
pub struct FpsCounter {
    count: u64,
    last: Option<Instant>,
    current: f64,
}

impl FpsCounter {
    const WINDOW: Duration = Duration::from_secs(1);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    /// 记录一帧, 窗口满1秒时返回新的帧率
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        let Some(last) = self.last else {
            self.last = Some(now);
            return None;
        };
        self.count += 1;
        let elapsed = now.saturating_duration_since(last);
        if elapsed >= Self::WINDOW {
            self.current = self.count as f64 / elapsed.as_secs_f64();
            self.count = 0;
            self.last = Some(now);
            Some(self.current)
        } else {
            None
        }
    }
}
