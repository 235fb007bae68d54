// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 笔画跟踪 (Stroke Tracker)
//!
//! "point" 手势的检测框中心 → 归一化 → 映射到绘图表面 → 距离过滤 → 输出线段

use tracing::debug;

use super::types::{Label, Point2, Prediction, Segment, Size};
use crate::config::{JitterPolicy, JumpPolicy, StrokeConfig};

/// 跨帧笔画状态, 每个会话一份
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrokeState {
    /// None 表示当前没有笔画在进行
    pub last_point: Option<Point2>,
}

pub struct StrokeTracker {
    config: StrokeConfig,
    state: StrokeState,
}

impl StrokeTracker {
    pub fn new(config: StrokeConfig) -> Self {
        Self {
            config,
            state: StrokeState::default(),
        }
    }

    pub fn state(&self) -> &StrokeState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = StrokeState::default();
    }

    /// 帧坐标 → 绘图表面坐标
    pub fn map_to_surface(point: Point2, frame_size: Size, surface_size: Size) -> Option<Point2> {
        if frame_size.is_degenerate() {
            return None;
        }
        let nx = point.x / frame_size.width;
        let ny = point.y / frame_size.height;
        Some(Point2::new(nx * surface_size.width, ny * surface_size.height))
    }

    pub fn update(
        &mut self,
        predictions: &[Prediction],
        frame_size: Size,
        surface_size: Size,
    ) -> Option<Segment> {
        let current = predictions
            .iter()
            .find(|p| p.label == Label::Point)
            .and_then(|p| Self::map_to_surface(p.bbox.cxcy(), frame_size, surface_size));

        // 抬起 point 手势即结束笔画
        let Some(current) = current else {
            self.state.last_point = None;
            return None;
        };

        let Some(last) = self.state.last_point else {
            self.state.last_point = Some(current);
            return None;
        };

        let distance = last.distance(&current);

        if distance >= self.config.max_jump {
            debug!("✋ 丢弃跳变: {:.1}px ({:?})", distance, self.config.jump_policy);
            if self.config.jump_policy == JumpPolicy::Reset {
                self.state.last_point = Some(current);
            }
            return None;
        }

        if distance < self.config.min_step {
            if self.config.jitter_policy == JitterPolicy::Follow {
                self.state.last_point = Some(current);
            }
            return None;
        }

        self.state.last_point = Some(current);
        Some(Segment {
            from: last,
            to: current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::types::Bbox;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const FRAME: Size = Size {
        width: 640.0,
        height: 480.0,
    };
    const SURFACE: Size = Size {
        width: 320.0,
        height: 240.0,
    };

    fn point_at(x: f32, y: f32) -> Vec<Prediction> {
        vec![Prediction::new("point", 0.9, Bbox::new(x, y, 20.0, 20.0))]
    }

    /// 表面坐标 (sx, sy) 对应的 point 检测框
    fn point_on_surface(sx: f32, sy: f32) -> Vec<Prediction> {
        point_at(sx * 2.0 - 10.0, sy * 2.0 - 10.0)
    }

    fn approx(a: Point2, b: Point2) -> bool {
        (a.x - b.x).abs() < 1e-3 && (a.y - b.y).abs() < 1e-3
    }

    #[test]
    fn test_first_segment_scenario() {
        let mut tracker = StrokeTracker::new(StrokeConfig::default());
        assert_eq!(tracker.update(&point_at(100.0, 100.0), FRAME, SURFACE), None);
        let seg = tracker
            .update(&point_at(110.0, 100.0), FRAME, SURFACE)
            .unwrap();
        assert!(approx(seg.from, Point2::new(55.0, 55.0)));
        assert!(approx(seg.to, Point2::new(60.0, 55.0)));
    }

    #[test]
    fn test_no_point_clears_stroke() {
        let mut tracker = StrokeTracker::new(StrokeConfig::default());
        tracker.update(&point_at(100.0, 100.0), FRAME, SURFACE);
        let open = vec![Prediction::new("open", 0.9, Bbox::new(0.0, 0.0, 5.0, 5.0))];
        assert_eq!(tracker.update(&open, FRAME, SURFACE), None);
        assert_eq!(tracker.state().last_point, None);
    }

    #[test]
    fn test_lift_leaves_gap() {
        let mut tracker = StrokeTracker::new(StrokeConfig::default());
        tracker.update(&point_on_surface(50.0, 50.0), FRAME, SURFACE);
        assert!(tracker
            .update(&point_on_surface(60.0, 50.0), FRAME, SURFACE)
            .is_some());
        tracker.update(&[], FRAME, SURFACE);
        // 重新出现: 第一帧只建立锚点
        assert_eq!(
            tracker.update(&point_on_surface(70.0, 50.0), FRAME, SURFACE),
            None
        );
        let seg = tracker
            .update(&point_on_surface(80.0, 50.0), FRAME, SURFACE)
            .unwrap();
        assert!(approx(seg.from, Point2::new(70.0, 50.0)));
    }

    #[test]
    fn test_jump_hold_policy() {
        let mut tracker = StrokeTracker::new(StrokeConfig::default());
        tracker.update(&point_on_surface(50.0, 50.0), FRAME, SURFACE);
        // 正好等于上限也拒绝
        assert_eq!(
            tracker.update(&point_on_surface(150.0, 50.0), FRAME, SURFACE),
            None
        );
        assert!(approx(
            tracker.state().last_point.unwrap(),
            Point2::new(50.0, 50.0)
        ));
        let seg = tracker
            .update(&point_on_surface(55.0, 52.0), FRAME, SURFACE)
            .unwrap();
        assert!(approx(seg.from, Point2::new(50.0, 50.0)));
        assert!(approx(seg.to, Point2::new(55.0, 52.0)));
    }

    #[test]
    fn test_jump_reset_policy() {
        let config = StrokeConfig {
            jump_policy: JumpPolicy::Reset,
            ..Default::default()
        };
        let mut tracker = StrokeTracker::new(config);
        tracker.update(&point_on_surface(10.0, 10.0), FRAME, SURFACE);
        assert_eq!(
            tracker.update(&point_on_surface(200.0, 150.0), FRAME, SURFACE),
            None
        );
        assert!(approx(
            tracker.state().last_point.unwrap(),
            Point2::new(200.0, 150.0)
        ));
        let seg = tracker
            .update(&point_on_surface(205.0, 150.0), FRAME, SURFACE)
            .unwrap();
        assert!(approx(seg.from, Point2::new(200.0, 150.0)));
    }

    #[test]
    fn test_jitter_accumulates() {
        let mut tracker = StrokeTracker::new(StrokeConfig::default());
        tracker.update(&point_on_surface(50.0, 50.0), FRAME, SURFACE);
        assert_eq!(
            tracker.update(&point_on_surface(51.0, 50.0), FRAME, SURFACE),
            None
        );
        assert_eq!(
            tracker.update(&point_on_surface(51.5, 50.0), FRAME, SURFACE),
            None
        );
        let seg = tracker
            .update(&point_on_surface(52.5, 50.0), FRAME, SURFACE)
            .unwrap();
        assert!(approx(seg.from, Point2::new(50.0, 50.0)));
    }

    #[test]
    fn test_jitter_follow() {
        let config = StrokeConfig {
            jitter_policy: JitterPolicy::Follow,
            ..Default::default()
        };
        let mut tracker = StrokeTracker::new(config);
        tracker.update(&point_on_surface(50.0, 50.0), FRAME, SURFACE);
        assert_eq!(
            tracker.update(&point_on_surface(51.0, 50.0), FRAME, SURFACE),
            None
        );
        assert!(approx(
            tracker.state().last_point.unwrap(),
            Point2::new(51.0, 50.0)
        ));
    }

    #[test]
    fn test_segments_connected() {
        let mut tracker = StrokeTracker::new(StrokeConfig::default());
        let mut rng = StdRng::seed_from_u64(42);
        let (mut x, mut y) = (160.0f32, 120.0f32);
        let mut segments = Vec::new();

        for _ in 0..400 {
            if rng.gen_bool(0.1) {
                // 偶发大跳变 (检测噪声)
                x = rng.gen_range(0.0..320.0);
                y = rng.gen_range(0.0..240.0);
            } else {
                x = (x + rng.gen_range(-8.0..8.0)).clamp(0.0, 320.0);
                y = (y + rng.gen_range(-8.0..8.0)).clamp(0.0, 240.0);
            }
            if let Some(seg) = tracker.update(&point_on_surface(x, y), FRAME, SURFACE) {
                assert!(seg.length() < 100.0);
                assert!(seg.length() >= 2.0 - 1e-3);
                segments.push(seg);
            }
        }

        assert!(!segments.is_empty());
        for pair in segments.windows(2) {
            assert_eq!(pair[1].from, pair[0].to);
        }
    }

    #[test]
    fn test_degenerate_frame() {
        let mut tracker = StrokeTracker::new(StrokeConfig::default());
        tracker.update(&point_at(100.0, 100.0), FRAME, SURFACE);
        assert_eq!(
            tracker.update(&point_at(110.0, 100.0), Size::new(0.0, 0.0), SURFACE),
            None
        );
        assert_eq!(tracker.state().last_point, None);
    }
}
