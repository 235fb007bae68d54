// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 脚本回放检测器
//!
//! 按调用顺序回放预先写好的检测结果, 支持模拟延迟、失败和检测框抖动.
//! 用于没有真实模型时的演示与调度器测试

use std::f32::consts::TAU;
use std::time::Duration;

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::detector::Detector;
use super::types::{Bbox, Prediction, Size};

/// 每次 detect 调用消费一步
#[derive(Debug, Clone)]
pub enum ScriptStep {
    Emit(Vec<Prediction>),
    Fail(String),
}

pub struct ScriptedDetector {
    steps: Vec<ScriptStep>,
    cursor: usize,
    looping: bool,
    latency: Duration,
    jitter: f32,
    rng: StdRng,
    calls: usize,
}

impl ScriptedDetector {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            cursor: 0,
            looping: false,
            latency: Duration::ZERO,
            jitter: 0.0,
            rng: StdRng::seed_from_u64(0),
            calls: 0,
        }
    }

    /// 脚本结束后从头开始
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// 检测框随机偏移 ±px (帧像素)
    pub fn with_jitter(mut self, px: f32, seed: u64) -> Self {
        self.jitter = px.max(0.0);
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// detect 被调用的次数 (包括被取消的)
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// 已完成回放的步数
    pub fn consumed(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn next_step(&mut self) -> Option<ScriptStep> {
        if self.steps.is_empty() {
            return None;
        }
        if self.cursor >= self.steps.len() {
            if !self.looping {
                return None;
            }
            self.cursor = 0;
        }
        let step = self.steps[self.cursor].clone();
        self.cursor += 1;
        Some(step)
    }

    fn jittered(&mut self, mut prediction: Prediction) -> Prediction {
        if self.jitter > 0.0 {
            prediction.bbox.x += self.rng.gen_range(-self.jitter..=self.jitter);
            prediction.bbox.y += self.rng.gen_range(-self.jitter..=self.jitter);
        }
        prediction
    }
}

impl<F> Detector<F> for ScriptedDetector {
    async fn detect(&mut self, _frame: &F) -> Result<Vec<Prediction>> {
        self.calls += 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        // 延迟之后才消费脚本, 被取消的调用不占用步数
        match self.next_step() {
            None => Ok(Vec::new()),
            Some(ScriptStep::Fail(message)) => Err(anyhow!(message)),
            Some(ScriptStep::Emit(predictions)) => Ok(predictions
                .into_iter()
                .map(|p| self.jittered(p))
                .collect()),
        }
    }
}

// ========== 脚本构造 ==========

/// 同一个手势保持若干帧
pub fn hold(label: &str, score: f32, bbox: Bbox, ticks: usize) -> Vec<ScriptStep> {
    (0..ticks)
        .map(|_| ScriptStep::Emit(vec![Prediction::new(label, score, bbox)]))
        .collect()
}

/// 若干帧没有任何检测
pub fn idle(ticks: usize) -> Vec<ScriptStep> {
    (0..ticks).map(|_| ScriptStep::Emit(Vec::new())).collect()
}

/// point 手势沿给定中心点序列移动
pub fn trace(centers: &[(f32, f32)], score: f32, box_size: f32) -> Vec<ScriptStep> {
    centers
        .iter()
        .map(|&(cx, cy)| {
            let bbox = Bbox::new(cx - box_size / 2., cy - box_size / 2., box_size, box_size);
            ScriptStep::Emit(vec![Prediction::new("point", score, bbox)])
        })
        .collect()
}

/// 圆周上的 n 个中心点
pub fn circle(center: (f32, f32), radius: f32, n: usize) -> Vec<(f32, f32)> {
    (0..=n)
        .map(|i| {
            let a = i as f32 / n.max(1) as f32 * TAU;
            (center.0 + radius * a.cos(), center.1 + radius * a.sin())
        })
        .collect()
}

/// 正弦波形的 n 个中心点
pub fn wave(from: (f32, f32), to_x: f32, amplitude: f32, n: usize) -> Vec<(f32, f32)> {
    (0..=n)
        .map(|i| {
            let t = i as f32 / n.max(1) as f32;
            let x = from.0 + (to_x - from.0) * t;
            (x, from.1 + amplitude * (t * TAU * 2.0).sin())
        })
        .collect()
}

/// 内置演示脚本
///
/// - `doodle`: 画圆 → 握拳换色 → 画波浪线 → 张开清屏 → 再画一个圆
/// - `circle`: 只画一个圆
/// - `flicker`: open/closed 每帧交替 (演示防抖, 不会触发任何动作)
pub fn preset(name: &str, frame: Size) -> Option<Vec<ScriptStep>> {
    let (w, h) = (frame.width, frame.height);
    let hand = Bbox::new(w * 0.4, h * 0.4, w * 0.15, h * 0.2);
    let box_size = w.min(h) * 0.06;
    let center = (w / 2., h / 2.);

    let steps = match name {
        "doodle" => {
            let mut steps = trace(&circle(center, h * 0.25, 48), 0.9, box_size);
            steps.extend(idle(3));
            steps.extend(hold("closed", 0.92, hand, 8));
            steps.extend(trace(
                &wave((w * 0.15, h * 0.7), w * 0.85, h * 0.08, 60),
                0.88,
                box_size,
            ));
            steps.extend(idle(3));
            steps.extend(hold("open", 0.95, hand, 8));
            steps.extend(trace(&circle(center, h * 0.15, 36), 0.9, box_size));
            steps.extend(idle(5));
            steps
        }
        "circle" => {
            let mut steps = trace(&circle(center, h * 0.3, 60), 0.9, box_size);
            steps.extend(idle(3));
            steps
        }
        "flicker" => (0..40)
            .map(|i| {
                let label = if i % 2 == 0 { "open" } else { "closed" };
                ScriptStep::Emit(vec![Prediction::new(label, 0.9, hand)])
            })
            .collect(),
        _ => return None,
    };
    Some(steps)
}
