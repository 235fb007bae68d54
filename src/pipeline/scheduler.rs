// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 检测调度器 (Detection Scheduler)
//! 职责: 按固定周期取帧 → 检测 → 手势稳定 + 笔画跟踪 → 渲染
//!
//! - 同一时刻最多一个检测调用 (in-flight 标志, RAII 守卫在所有退出路径上清除)
//! - 帧无效 (尺寸为0/暂停/结束) 时跳过本tick, 但继续调度
//! - 单帧检测失败只记录, 不终止会话
//! - 停止请求同步取消令牌; 发出检测前、处理结果前都检查令牌

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::Sender;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{FpsCounter, SessionEvent, SessionReport, SessionState};
use crate::config::SessionConfig;
use crate::detection::stabilizer::{GestureAction, GestureStabilizer, GestureState};
use crate::detection::stroke::{StrokeState, StrokeTracker};
use crate::detection::types::{Label, Prediction};
use crate::detection::Detector;
use crate::error::{DetectError, SessionError};
use crate::input::{FrameInfo, FrameSource};
use crate::render::{Palette, RenderSink};

/// 会话控制句柄 (可克隆, 同步调用)
#[derive(Clone)]
pub struct SessionHandle {
    state: Arc<watch::Sender<SessionState>>,
    token: Arc<Mutex<CancellationToken>>,
    in_flight: Arc<AtomicBool>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// 是否有检测调用正在执行
    pub fn is_detecting(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// 停止会话, 返回后不会再发出新的检测
    ///
    /// 只有 Starting/Running 时生效, 返回是否真的发出了停止
    pub fn stop(&self) -> bool {
        let stopping = self.state.send_if_modified(|state| {
            if matches!(*state, SessionState::Starting | SessionState::Running) {
                *state = SessionState::Stopping;
                true
            } else {
                false
            }
        });
        if stopping {
            self.current_token().cancel();
            info!("⏹️ 收到停止请求");
        }
        stopping
    }

    fn current_token(&self) -> CancellationToken {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_token(&self, token: CancellationToken) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }
}

/// 检测中标志, 离开作用域时清除 (成功、失败、取消都一样)
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    /// 已有检测在执行时返回 None
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct DetectionScheduler<S, D, R>
where
    S: FrameSource,
    D: Detector<S::Frame>,
    R: RenderSink,
{
    config: SessionConfig,
    source: S,
    detector: D,
    sink: R,

    // 会话状态 (每次启动重新初始化)
    stabilizer: GestureStabilizer,
    stroke: StrokeTracker,
    palette: Palette,
    last_stable: Option<Label>,

    handle: SessionHandle,
    events: Option<Sender<SessionEvent>>,

    // 统计
    report: SessionReport,
    fps: FpsCounter,
}

impl<S, D, R> DetectionScheduler<S, D, R>
where
    S: FrameSource,
    D: Detector<S::Frame>,
    R: RenderSink,
{
    pub fn new(config: SessionConfig, source: S, detector: D, sink: R) -> Result<Self, SessionError> {
        config.validate()?;
        let (state, _) = watch::channel(SessionState::Idle);
        Ok(Self {
            stabilizer: GestureStabilizer::new(config.stabilizer.clone()),
            stroke: StrokeTracker::new(config.stroke.clone()),
            palette: Palette::new(&config.palette),
            last_stable: None,
            config,
            source,
            detector,
            sink,
            handle: SessionHandle {
                state: Arc::new(state),
                token: Arc::new(Mutex::new(CancellationToken::new())),
                in_flight: Arc::new(AtomicBool::new(false)),
            },
            events: None,
            report: SessionReport::default(),
            fps: FpsCounter::new(),
        })
    }

    /// 诊断事件通道 (满了直接丢弃)
    pub fn with_events(mut self, events: Sender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut R {
        &mut self.sink
    }

    pub fn gesture_state(&self) -> &GestureState {
        self.stabilizer.state()
    }

    pub fn stroke_state(&self) -> &StrokeState {
        self.stroke.state()
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn report(&self) -> &SessionReport {
        &self.report
    }

    /// Idle → Starting → Running
    ///
    /// 帧源获取失败时回到 Idle 并返回错误
    pub async fn start(&mut self) -> Result<(), SessionError> {
        let actual = self.state();
        if actual != SessionState::Idle {
            return Err(SessionError::InvalidState {
                expected: SessionState::Idle,
                actual,
            });
        }

        let token = CancellationToken::new();
        self.handle.replace_token(token.clone());
        self.set_state(SessionState::Starting);

        if let Err(e) = self.source.acquire().await {
            warn!("❌ 帧源获取失败: {:#}", e);
            self.source.release();
            self.set_state(SessionState::Idle);
            return Err(SessionError::ResourceUnavailable(e));
        }

        // 就绪信号只等一次, 超时也继续
        let ready_timeout = self.config.scheduler.ready_timeout();
        tokio::select! {
            biased;
            _ = token.cancelled() => {}
            ready = time::timeout(ready_timeout, self.source.wait_ready()) => {
                if ready.is_err() {
                    warn!("⚠️ 等待帧源就绪超时 ({:?}), 继续启动", ready_timeout);
                }
            }
        }

        if token.is_cancelled() {
            self.teardown();
            return Err(SessionError::Cancelled);
        }

        self.reset_session();
        self.report = SessionReport::default();
        self.fps = FpsCounter::new();
        self.set_state(SessionState::Running);

        let frame = self.source.info();
        info!(
            "🚀 检测会话启动: 帧 {}x{} | 周期 {}ms",
            frame.width, frame.height, self.config.scheduler.tick_period_ms
        );
        Ok(())
    }

    /// 运行直到被停止, 结束时释放帧源并重置状态
    pub async fn run(&mut self) -> SessionReport {
        let token = self.handle.current_token();
        match self.state() {
            SessionState::Running if !token.is_cancelled() => {}
            SessionState::Idle => {
                warn!("⚠️ 会话未启动, 忽略 run()");
                return self.report.clone();
            }
            // start 之后、run 之前已被停止: 仍然要释放帧源
            _ => {
                self.teardown();
                return self.report.clone();
            }
        }

        let mut interval = time::interval(self.config.scheduler.tick_period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => {}
            }
            if token.is_cancelled() || self.state() != SessionState::Running {
                break;
            }
            self.tick(&token).await;
        }

        self.teardown();
        self.report.clone()
    }

    pub async fn run_session(&mut self) -> Result<SessionReport, SessionError> {
        self.start().await?;
        Ok(self.run().await)
    }

    /// 同步停止并立即释放资源 (run 没有在执行时使用)
    pub fn stop(&mut self) {
        self.handle.stop();
        self.teardown();
    }

    async fn tick(&mut self, token: &CancellationToken) {
        self.report.ticks += 1;
        let tick = self.report.ticks;

        // 循环本身会等待 detect 完成, 错过的 tick 由 interval 直接跳过 (不排队),
        // 所以这里正常不会失败; 标志主要供 SessionHandle::is_detecting 观察
        let Some(_in_flight) = InFlightGuard::try_acquire(&self.handle.in_flight) else {
            warn!("⏳ 上一次检测未完成, 跳过第{}个tick", tick);
            return;
        };

        let info = self.source.info();
        if !info.is_valid() {
            self.report.skipped_invalid += 1;
            return;
        }
        let Some(frame) = self.source.current_frame() else {
            self.report.skipped_invalid += 1;
            return;
        };

        let timeout = self.config.scheduler.detect_timeout();
        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = detect_with_timeout(self.detector.detect(&frame), timeout) => Some(result),
        };

        // 会话停止后到达的结果直接丢弃
        let result = match outcome {
            Some(result) if !token.is_cancelled() => result,
            _ => {
                self.report.stale_discarded += 1;
                debug!("🗑️ 会话已停止, 丢弃第{}个tick的检测结果", tick);
                return;
            }
        };

        match result {
            Ok(predictions) => self.apply(&predictions, info),
            Err(e) => {
                self.report.failures += 1;
                warn!("⚠️ 第{}个tick检测失败: {}", tick, e);
                self.post(SessionEvent::DetectionFailed {
                    tick,
                    error: e.to_string(),
                });
            }
        }
    }

    /// 一帧检测结果 → 手势/笔画 → 渲染
    fn apply(&mut self, predictions: &[Prediction], info: FrameInfo) {
        let now = Instant::now().into_std();
        let event = self.stabilizer.update(predictions, now);
        let segment = self
            .stroke
            .update(predictions, info.size(), self.sink.surface_size());

        // 叠加层只画手势判定用的那一个 (低于置信度下限则不画)
        let top: Vec<Prediction> = self
            .stabilizer
            .gated_top(predictions)
            .cloned()
            .into_iter()
            .collect();
        self.detector.render_predictions(&top, &mut self.sink, info);

        if let Some(action) = event.triggered {
            match action {
                GestureAction::ClearSurface => self.sink.clear_surface(),
                GestureAction::NextColor => {
                    self.palette.advance();
                }
            }
            self.report.actions_fired += 1;
            info!("✋ 手势触发: {:?}", action);
            self.post(SessionEvent::ActionFired(action));
        }

        if let Some(segment) = segment {
            let style = self.palette.style();
            self.sink.draw_segment(segment.from, segment.to, &style);
            self.report.segments_drawn += 1;
        }

        if event.stable != self.last_stable {
            self.last_stable = event.stable.clone();
            self.post(SessionEvent::Gesture(event));
        }

        self.report.frames += 1;
        if let Some(fps) = self.fps.tick(now) {
            self.report.fps = fps;
            self.post(SessionEvent::Throughput { fps });
        }

        // 每60帧打印一次
        if self.report.frames % 60 == 0 {
            info!(
                "🎯 检测: {}帧 | {:.1}fps | 失败{} | 无效帧{} | 线段{}",
                self.report.frames,
                self.report.fps,
                self.report.failures,
                self.report.skipped_invalid,
                self.report.segments_drawn
            );
        }
    }

    /// Stopping → 释放帧源 → 重置状态 → Idle
    fn teardown(&mut self) {
        if self.state() == SessionState::Idle {
            return;
        }
        // 句柄可能已经置为 Stopping, 这里总是通知一次
        self.handle.state.send_replace(SessionState::Stopping);
        self.post(SessionEvent::StateChanged(SessionState::Stopping));
        self.source.release();
        self.handle.in_flight.store(false, Ordering::Release);
        self.reset_session();
        self.set_state(SessionState::Idle);
        info!(
            "🛑 检测会话结束: {}帧 | 失败{} | 丢弃{} | 动作{} | 线段{}",
            self.report.frames,
            self.report.failures,
            self.report.stale_discarded,
            self.report.actions_fired,
            self.report.segments_drawn
        );
    }

    fn reset_session(&mut self) {
        self.stabilizer.reset();
        self.stroke.reset();
        self.palette.reset();
        self.last_stable = None;
    }

    fn set_state(&self, next: SessionState) {
        let changed = self.handle.state.send_if_modified(|state| {
            if *state != next {
                *state = next;
                true
            } else {
                false
            }
        });
        if changed {
            self.post(SessionEvent::StateChanged(next));
        }
    }

    fn post(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            let _ = events.try_send(event);
        }
    }
}

impl<S, D, R> Drop for DetectionScheduler<S, D, R>
where
    S: FrameSource,
    D: Detector<S::Frame>,
    R: RenderSink,
{
    fn drop(&mut self) {
        if self.state() != SessionState::Idle {
            self.handle.stop();
            self.source.release();
            self.handle.state.send_replace(SessionState::Idle);
        }
    }
}

async fn detect_with_timeout<Fut>(
    detect: Fut,
    limit: Option<Duration>,
) -> Result<Vec<Prediction>, DetectError>
where
    Fut: Future<Output = anyhow::Result<Vec<Prediction>>>,
{
    match limit {
        Some(limit) => match time::timeout(limit, detect).await {
            Ok(result) => result.map_err(DetectError::from),
            Err(_) => Err(DetectError::Timeout(limit)),
        },
        None => detect.await.map_err(DetectError::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::scripted::{self, ScriptStep, ScriptedDetector};
    use crate::detection::types::{Bbox, Point2, Size};
    use crate::input::{DecodedFrame, SyntheticCamera};
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Clear,
        ClearOverlay,
        Segment(Point2, Point2),
        Detection(Label),
    }

    #[derive(Default)]
    struct RecordingSink {
        calls: Vec<Call>,
    }

    impl RecordingSink {
        fn segments(&self) -> Vec<(Point2, Point2)> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Segment(a, b) => Some((*a, *b)),
                    _ => None,
                })
                .collect()
        }

        fn clears(&self) -> usize {
            self.calls.iter().filter(|c| **c == Call::Clear).count()
        }

        fn detections(&self) -> Vec<Label> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Detection(l) => Some(l.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl RenderSink for RecordingSink {
        fn surface_size(&self) -> Size {
            Size::new(320.0, 240.0)
        }

        fn clear_surface(&mut self) {
            self.calls.push(Call::Clear);
        }

        fn draw_segment(&mut self, from: Point2, to: Point2, _style: &crate::render::StrokeStyle) {
            self.calls.push(Call::Segment(from, to));
        }

        fn clear_overlay(&mut self) {
            self.calls.push(Call::ClearOverlay);
        }

        fn draw_detection(&mut self, prediction: &Prediction, _frame_size: Size) {
            self.calls.push(Call::Detection(prediction.label.clone()));
        }
    }

    /// 记录并发度的检测器
    struct SlowDetector {
        latency: Duration,
        active: Rc<Cell<usize>>,
        max_active: Rc<Cell<usize>>,
        calls: Rc<Cell<usize>>,
    }

    impl Detector<DecodedFrame> for SlowDetector {
        async fn detect(&mut self, _frame: &DecodedFrame) -> anyhow::Result<Vec<Prediction>> {
            self.calls.set(self.calls.get() + 1);
            self.active.set(self.active.get() + 1);
            self.max_active.set(self.max_active.get().max(self.active.get()));
            time::sleep(self.latency).await;
            self.active.set(self.active.get() - 1);
            Ok(Vec::new())
        }
    }

    type TestScheduler<D> = DetectionScheduler<SyntheticCamera, D, RecordingSink>;

    fn config(tick_ms: u64) -> SessionConfig {
        let mut config = SessionConfig::default();
        config.scheduler.tick_period_ms = tick_ms;
        config
    }

    fn point(x: f32, y: f32) -> Prediction {
        Prediction::new("point", 0.9, Bbox::new(x, y, 20.0, 20.0))
    }

    fn scripted(steps: Vec<ScriptStep>, tick_ms: u64) -> TestScheduler<ScriptedDetector> {
        DetectionScheduler::new(
            config(tick_ms),
            SyntheticCamera::new(640, 480),
            ScriptedDetector::new(steps),
            RecordingSink::default(),
        )
        .unwrap()
    }

    async fn run_for<D: Detector<DecodedFrame>>(
        scheduler: &mut TestScheduler<D>,
        duration: Duration,
    ) -> SessionReport {
        let handle = scheduler.handle();
        let (report, _) = tokio::join!(scheduler.run_session(), async move {
            time::sleep(duration).await;
            handle.stop();
        });
        report.unwrap()
    }

    fn approx(a: Point2, b: Point2) -> bool {
        (a.x - b.x).abs() < 1e-3 && (a.y - b.y).abs() < 1e-3
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_segment_scenario() {
        let steps = vec![
            ScriptStep::Emit(vec![point(100.0, 100.0)]),
            ScriptStep::Emit(vec![point(110.0, 100.0)]),
        ];
        let mut scheduler = scripted(steps, 100);
        let report = run_for(&mut scheduler, Duration::from_millis(150)).await;

        let segments = scheduler.sink().segments();
        assert_eq!(segments.len(), 1);
        assert!(approx(segments[0].0, Point2::new(55.0, 55.0)));
        assert!(approx(segments[0].1, Point2::new(60.0, 55.0)));
        assert_eq!(report.segments_drawn, 1);
        assert_eq!(scheduler.state(), SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_held_fires_one_clear() {
        let steps = scripted::hold("open", 0.95, Bbox::new(200.0, 150.0, 80.0, 100.0), 12);
        let mut scheduler = scripted(steps, 150);
        let report = run_for(&mut scheduler, Duration::from_millis(1700)).await;

        assert_eq!(scheduler.sink().clears(), 1);
        assert_eq!(report.actions_fired, 1);
        assert!(report.frames >= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_advances_palette() {
        let (tx, rx) = crossbeam_channel::bounded(256);
        let steps = scripted::hold("closed", 0.9, Bbox::new(10.0, 10.0, 50.0, 50.0), 8);
        let mut scheduler = scripted(steps, 150).with_events(tx);
        let handle = scheduler.handle();

        scheduler.start().await.unwrap();
        let (_, _) = tokio::join!(scheduler.run(), async {
            time::sleep(Duration::from_millis(1000)).await;
            assert_eq!(handle.state(), SessionState::Running);
            handle.stop();
        });

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, SessionEvent::ActionFired(GestureAction::NextColor)))
                .count(),
            1
        );
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::StateChanged(SessionState::Running))));
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::StateChanged(SessionState::Stopping))));
        assert!(matches!(
            events.last(),
            Some(SessionEvent::StateChanged(SessionState::Idle))
        ));
        // 停止后调色板重置
        assert_eq!(scheduler.palette().index(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_is_skipped() {
        let (tx, rx) = crossbeam_channel::bounded(256);
        let steps = vec![
            ScriptStep::Emit(vec![point(100.0, 100.0)]),
            ScriptStep::Fail("camera glitch".into()),
            ScriptStep::Emit(vec![point(110.0, 100.0)]),
        ];
        let mut scheduler = scripted(steps, 100).with_events(tx);
        let report = run_for(&mut scheduler, Duration::from_millis(250)).await;

        assert_eq!(report.failures, 1);
        assert_eq!(report.actions_fired, 0);
        // 失败的tick不影响笔画状态, 下一帧照常画线
        let segments = scheduler.sink().segments();
        assert_eq!(segments.len(), 1);
        assert!(approx(segments[0].0, Point2::new(55.0, 55.0)));

        let failed: Vec<_> = rx
            .try_iter()
            .filter_map(|e| match e {
                SessionEvent::DetectionFailed { tick, error } => Some((tick, error)),
                _ => None,
            })
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, 2);
        assert!(failed[0].1.contains("camera glitch"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_detecting_discards_result() {
        let mut steps = scripted::hold("open", 0.99, Bbox::new(0.0, 0.0, 50.0, 50.0), 10);
        steps.extend(scripted::trace(&[(100.0, 100.0), (110.0, 100.0)], 0.9, 20.0));
        let detector = ScriptedDetector::new(steps).with_latency(Duration::from_millis(500));
        let camera = SyntheticCamera::new(640, 480);
        let control = camera.control();
        let mut scheduler =
            DetectionScheduler::new(config(100), camera, detector, RecordingSink::default())
                .unwrap();

        let report = run_for(&mut scheduler, Duration::from_millis(250)).await;

        assert_eq!(report.frames, 0);
        assert_eq!(report.stale_discarded, 1);
        assert!(scheduler.sink().calls.is_empty());
        assert_eq!(scheduler.detector().calls(), 1);
        assert_eq!(scheduler.detector().consumed(), 0);
        assert_eq!(control.release_count(), 1);
        assert!(!scheduler.handle().is_detecting());

        // 之后再推进时间也不会有任何输出
        time::sleep(Duration::from_secs(2)).await;
        assert!(scheduler.sink().calls.is_empty());
        assert_eq!(scheduler.detector().calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_detector_never_overlaps() {
        let active = Rc::new(Cell::new(0));
        let max_active = Rc::new(Cell::new(0));
        let calls = Rc::new(Cell::new(0));
        let detector = SlowDetector {
            latency: Duration::from_millis(350),
            active: Rc::clone(&active),
            max_active: Rc::clone(&max_active),
            calls: Rc::clone(&calls),
        };
        let mut scheduler = DetectionScheduler::new(
            config(100),
            SyntheticCamera::new(640, 480),
            detector,
            RecordingSink::default(),
        )
        .unwrap();
        let handle = scheduler.handle();

        let (report, _) = tokio::join!(scheduler.run_session(), async {
            time::sleep(Duration::from_millis(200)).await;
            assert!(handle.is_detecting());
            time::sleep(Duration::from_millis(900)).await;
            handle.stop();
        });
        let report = report.unwrap();

        assert_eq!(max_active.get(), 1);
        assert!(calls.get() <= 4);
        assert!(report.frames >= 2);
        // 错过的tick被丢弃而不是排队: 每个tick恰好对应一次 detect
        assert_eq!(report.ticks as usize, calls.get());
        assert!(!handle.is_detecting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_frame_skips_work() {
        let camera = SyntheticCamera::new(640, 480);
        let control = camera.control();
        control.set_paused(true);
        let detector = ScriptedDetector::new(scripted::idle(1)).looping(true);
        let mut scheduler =
            DetectionScheduler::new(config(100), camera, detector, RecordingSink::default())
                .unwrap();
        let handle = scheduler.handle();

        let (report, _) = tokio::join!(scheduler.run_session(), async {
            time::sleep(Duration::from_millis(450)).await;
            control.set_paused(false);
            time::sleep(Duration::from_millis(300)).await;
            handle.stop();
        });
        let report = report.unwrap();

        assert!(report.skipped_invalid >= 4);
        assert!(report.frames >= 2);
        assert_eq!(report.frames as usize, scheduler.detector().calls());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_size_frame_skipped() {
        let camera = SyntheticCamera::new(0, 0);
        let mut scheduler = DetectionScheduler::new(
            config(100),
            camera,
            ScriptedDetector::new(vec![]),
            RecordingSink::default(),
        )
        .unwrap();
        let report = run_for(&mut scheduler, Duration::from_millis(350)).await;
        assert_eq!(report.frames, 0);
        assert_eq!(report.skipped_invalid, report.ticks);
        assert_eq!(scheduler.detector().calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_detect_timeout_counts_as_failure() {
        let detector =
            ScriptedDetector::new(scripted::idle(20)).with_latency(Duration::from_millis(500));
        let mut config = config(100);
        config.scheduler.detect_timeout_ms = 200;
        let mut scheduler = DetectionScheduler::new(
            config,
            SyntheticCamera::new(640, 480),
            detector,
            RecordingSink::default(),
        )
        .unwrap();
        let report = run_for(&mut scheduler, Duration::from_millis(900)).await;
        assert!(report.failures >= 2);
        assert_eq!(report.frames, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_failure_stays_idle() {
        let camera = SyntheticCamera::new(640, 480).deny_access("permission denied");
        let control = camera.control();
        let mut scheduler = DetectionScheduler::new(
            config(100),
            camera,
            ScriptedDetector::new(vec![]),
            RecordingSink::default(),
        )
        .unwrap();

        let err = scheduler.start().await.unwrap_err();
        assert!(matches!(err, SessionError::ResourceUnavailable(_)));
        assert!(err.to_string().contains("permission denied"));
        assert_eq!(scheduler.state(), SessionState::Idle);
        assert!(!control.is_acquired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_requires_idle() {
        let camera = SyntheticCamera::new(640, 480);
        let control = camera.control();
        let mut scheduler = DetectionScheduler::new(
            config(100),
            camera,
            ScriptedDetector::new(vec![]),
            RecordingSink::default(),
        )
        .unwrap();

        scheduler.start().await.unwrap();
        let err = scheduler.start().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidState {
                expected: SessionState::Idle,
                actual: SessionState::Running
            }
        ));

        scheduler.stop();
        assert_eq!(scheduler.state(), SessionState::Idle);
        assert_eq!(control.release_count(), 1);
        // 重复停止无副作用
        scheduler.stop();
        assert_eq!(control.release_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_starting() {
        let camera = SyntheticCamera::new(640, 480).with_ready_delay(Duration::from_secs(1));
        let control = camera.control();
        let mut scheduler = DetectionScheduler::new(
            config(100),
            camera,
            ScriptedDetector::new(vec![]),
            RecordingSink::default(),
        )
        .unwrap();
        let handle = scheduler.handle();

        let (result, _) = tokio::join!(scheduler.start(), async {
            time::sleep(Duration::from_millis(200)).await;
            assert_eq!(handle.state(), SessionState::Starting);
            assert!(handle.stop());
        });

        assert!(matches!(result, Err(SessionError::Cancelled)));
        assert_eq!(scheduler.state(), SessionState::Idle);
        assert_eq!(control.release_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_timeout_still_starts() {
        let camera = SyntheticCamera::new(640, 480).with_ready_delay(Duration::from_secs(10));
        let mut config = config(100);
        config.scheduler.ready_timeout_ms = 100;
        let mut scheduler = DetectionScheduler::new(
            config,
            camera,
            ScriptedDetector::new(vec![]),
            RecordingSink::default(),
        )
        .unwrap();

        scheduler.start().await.unwrap();
        assert_eq!(scheduler.state(), SessionState::Running);
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_gets_fresh_state() {
        let mut steps = scripted::trace(&[(100.0, 100.0), (110.0, 100.0)], 0.9, 20.0);
        steps.extend(scripted::hold("closed", 0.9, Bbox::new(0.0, 0.0, 40.0, 40.0), 8));
        steps.extend(scripted::trace(&[(300.0, 300.0)], 0.9, 20.0));
        let camera = SyntheticCamera::new(640, 480);
        let control = camera.control();
        let mut scheduler = DetectionScheduler::new(
            config(150),
            camera,
            ScriptedDetector::new(steps),
            RecordingSink::default(),
        )
        .unwrap();

        let first = run_for(&mut scheduler, Duration::from_millis(1600)).await;
        assert_eq!(first.actions_fired, 1);
        assert_eq!(scheduler.gesture_state(), &GestureState::new());
        assert_eq!(scheduler.stroke_state().last_point, None);
        assert_eq!(scheduler.palette().index(), 0);

        let second = run_for(&mut scheduler, Duration::from_millis(320)).await;
        assert_eq!(control.acquire_count(), 2);
        assert_eq!(control.release_count(), 2);
        // 第二次会话的统计从0开始
        assert!(second.ticks < first.ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlay_gets_top_prediction_only() {
        let steps = vec![ScriptStep::Emit(vec![
            Prediction::new("open", 0.7, Bbox::new(0.0, 0.0, 10.0, 10.0)),
            point(100.0, 100.0),
            Prediction::new("closed", 0.9, Bbox::new(0.0, 0.0, 10.0, 10.0)),
        ])];
        let mut scheduler = scripted(steps, 100);
        run_for(&mut scheduler, Duration::from_millis(50)).await;

        assert_eq!(scheduler.sink().detections(), vec![Label::Point]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlay_empty_below_floor() {
        let steps = vec![
            ScriptStep::Emit(vec![point(100.0, 100.0)]),
            ScriptStep::Emit(vec![
                Prediction::new("point", 0.5, Bbox::new(100.0, 100.0, 20.0, 20.0)),
                Prediction::new("open", 0.6, Bbox::new(0.0, 0.0, 10.0, 10.0)),
            ]),
        ];
        let mut scheduler = scripted(steps, 100);
        run_for(&mut scheduler, Duration::from_millis(150)).await;

        // 第二帧最高分低于置信度下限: 手势为 none, 叠加层只清除不绘制
        assert_eq!(
            scheduler.sink().calls,
            vec![
                Call::ClearOverlay,
                Call::Detection(Label::Point),
                Call::ClearOverlay,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_between_start_and_run() {
        let camera = SyntheticCamera::new(640, 480);
        let control = camera.control();
        let mut scheduler = DetectionScheduler::new(
            config(100),
            camera,
            ScriptedDetector::new(scripted::idle(5)),
            RecordingSink::default(),
        )
        .unwrap();
        let handle = scheduler.handle();

        scheduler.start().await.unwrap();
        assert!(handle.stop());
        let report = scheduler.run().await;

        assert_eq!(report.ticks, 0);
        assert_eq!(scheduler.state(), SessionState::Idle);
        assert!(!control.is_acquired());
        assert_eq!(control.release_count(), 1);
        assert_eq!(scheduler.detector().calls(), 0);

        // 可以重新启动
        scheduler.start().await.unwrap();
        assert_eq!(scheduler.state(), SessionState::Running);
        assert_eq!(control.acquire_count(), 2);
        scheduler.stop();

        // Idle 时 run 直接返回
        scheduler.run().await;
        assert_eq!(scheduler.state(), SessionState::Idle);
        assert_eq!(control.release_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_releases_source() {
        let camera = SyntheticCamera::new(640, 480);
        let control = camera.control();
        let mut scheduler = DetectionScheduler::new(
            config(100),
            camera,
            ScriptedDetector::new(vec![]),
            RecordingSink::default(),
        )
        .unwrap();
        let handle = scheduler.handle();

        scheduler.start().await.unwrap();
        assert!(control.is_acquired());
        drop(scheduler);

        assert!(!control.is_acquired());
        assert_eq!(handle.state(), SessionState::Idle);
    }

    #[test]
    fn test_in_flight_guard() {
        let flag = Arc::new(AtomicBool::new(false));
        {
            let _guard = InFlightGuard::try_acquire(&flag).unwrap();
            assert!(flag.load(Ordering::Acquire));
            assert!(InFlightGuard::try_acquire(&flag).is_none());
        }
        assert!(!flag.load(Ordering::Acquire));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = SessionConfig::default();
        config.scheduler.tick_period_ms = 0;
        let result = DetectionScheduler::new(
            config,
            SyntheticCamera::new(640, 480),
            ScriptedDetector::new(vec![]),
            RecordingSink::default(),
        );
        assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
    }
}
