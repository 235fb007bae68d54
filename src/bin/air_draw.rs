// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 隔空绘画演示 - 合成摄像头 + 脚本检测器 + 内存画布
///
/// 主程序入口 - 直接运行: cargo run --bin air_draw -- --seconds 10 --preset doodle
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossbeam_channel::bounded;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gesture_draw_rs::detection::scripted;
use gesture_draw_rs::{
    gen_time_string, CanvasSink, DetectionScheduler, ScriptedDetector, SessionConfig,
    SessionEvent, Size, SyntheticCamera,
};

/// 隔空绘画演示程序
#[derive(Parser, Debug)]
#[command(author, version, about = "手势隔空绘画演示", long_about = None)]
struct Args {
    /// 会话配置文件 (不存在时写入默认配置)
    #[arg(short, long, default_value = "air_draw_config.json")]
    config: String,

    /// 运行时长 (秒), 到时自动停止; 也可以 Ctrl-C
    #[arg(short, long, default_value_t = 10)]
    seconds: u64,

    /// 演示脚本: doodle / circle / flicker
    #[arg(short, long, default_value = "doodle")]
    preset: String,

    /// 检测框位置抖动 (像素)
    #[arg(long, default_value_t = 1.5)]
    jitter: f32,

    /// 随机种子
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// 画布尺寸
    #[arg(long, default_value_t = 640)]
    width: u32,
    #[arg(long, default_value_t = 480)]
    height: u32,

    /// 摄像头帧尺寸
    #[arg(long, default_value_t = 1280)]
    frame_width: u32,
    #[arg(long, default_value_t = 720)]
    frame_height: u32,

    /// 覆盖配置中的检测周期 (毫秒)
    #[arg(long)]
    tick_ms: Option<u64>,

    /// 输出PNG路径 (默认按时间戳命名)
    #[arg(short, long)]
    output: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = SessionConfig::load(&args.config);
    if let Some(tick_ms) = args.tick_ms {
        config.scheduler.tick_period_ms = tick_ms;
    }
    config.print_summary();

    let frame = Size::new(args.frame_width as f32, args.frame_height as f32);
    let steps = scripted::preset(&args.preset, frame)
        .ok_or_else(|| anyhow!("未知的演示脚本: {} (可选 doodle/circle/flicker)", args.preset))?;
    info!("📜 演示脚本: {} | {}步 | 抖动 {:.1}px", args.preset, steps.len(), args.jitter);

    let camera = SyntheticCamera::new(args.frame_width, args.frame_height)
        .with_ready_delay(Duration::from_millis(200));
    let detector = ScriptedDetector::new(steps)
        .looping(true)
        .with_latency(Duration::from_millis(30))
        .with_jitter(args.jitter, args.seed);
    let canvas = CanvasSink::new(args.width, args.height);

    // 诊断事件在独立线程打印
    let (tx, rx) = bounded::<SessionEvent>(256);
    let printer = thread::spawn(move || {
        for event in rx {
            match event {
                SessionEvent::StateChanged(state) => info!("🔄 会话状态: {:?}", state),
                SessionEvent::Gesture(g) => info!(
                    "👋 稳定手势: {} (稳定度 {:.2})",
                    g.stable.map(|l| l.to_string()).unwrap_or_else(|| "无".into()),
                    g.stability
                ),
                SessionEvent::ActionFired(action) => info!("✨ 动作: {:?}", action),
                SessionEvent::DetectionFailed { tick, error } => {
                    warn!("⚠️ tick {} 检测失败: {}", tick, error)
                }
                SessionEvent::Throughput { fps } => info!("📊 吞吐: {:.1} fps", fps),
            }
        }
    });

    let mut scheduler = DetectionScheduler::new(config, camera, detector, canvas)?.with_events(tx);
    let handle = scheduler.handle();
    let seconds = args.seconds;

    let (report, _) = tokio::join!(scheduler.run_session(), async move {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(seconds)) => {
                info!("⏰ 到达运行时长 {}s", seconds);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 收到 Ctrl-C");
            }
        }
        handle.stop();
    });
    let report = report?;

    info!(
        "✅ 会话结束: tick {} | 检测 {}帧 | 无效帧 {} | 失败 {} | 动作 {} | 线段 {}",
        report.ticks,
        report.frames,
        report.skipped_invalid,
        report.failures,
        report.actions_fired,
        report.segments_drawn
    );

    let output = args
        .output
        .unwrap_or_else(|| format!("air_draw_{}.png", gen_time_string("")));
    scheduler
        .sink()
        .save(&output)
        .with_context(|| format!("保存画布失败: {}", output))?;
    info!("💾 画布已保存: {}", output);

    // 关闭事件通道, 等待打印线程退出
    drop(scheduler);
    if printer.join().is_err() {
        warn!("⚠️ 事件打印线程异常退出");
    }
    Ok(())
}
