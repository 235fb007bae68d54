// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 合成摄像头 - 内存中生成固定画面的帧源
//!
//! 画面内容不变 (Arc 共享同一块缓冲区), 尺寸/暂停/结束可通过 CameraControl 在外部修改

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tracing::{info, warn};

use super::{FrameInfo, FrameSource};

/// 已解码帧 (帧源 → 检测器)
#[derive(Clone, Debug)]
pub struct DecodedFrame {
    pub rgba_data: Arc<Vec<u8>>, // 使用Arc共享数据,避免复制
    pub width: u32,
    pub height: u32,
    pub frame_id: u64,
}

/// 摄像头外部控制 (调度器持有摄像头时也能修改状态)
#[derive(Debug, Default)]
pub struct CameraControl {
    width: AtomicU32,
    height: AtomicU32,
    paused: AtomicBool,
    ended: AtomicBool,
    acquired: AtomicBool,
    acquire_count: AtomicUsize,
    release_count: AtomicUsize,
    frames_served: AtomicU64,
}

impl CameraControl {
    pub fn set_size(&self, width: u32, height: u32) {
        self.width.store(width, Ordering::Relaxed);
        self.height.store(height, Ordering::Relaxed);
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    pub fn set_ended(&self, ended: bool) {
        self.ended.store(ended, Ordering::Relaxed);
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired.load(Ordering::Relaxed)
    }

    pub fn acquire_count(&self) -> usize {
        self.acquire_count.load(Ordering::Relaxed)
    }

    pub fn release_count(&self) -> usize {
        self.release_count.load(Ordering::Relaxed)
    }

    pub fn frames_served(&self) -> u64 {
        self.frames_served.load(Ordering::Relaxed)
    }
}

pub struct SyntheticCamera {
    control: Arc<CameraControl>,
    ready_delay: Duration,
    deny: Option<String>,
    buffer: Arc<Vec<u8>>,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        let control = CameraControl::default();
        control.set_size(width, height);
        Self {
            control: Arc::new(control),
            ready_delay: Duration::ZERO,
            deny: None,
            buffer: Arc::new(Vec::new()),
        }
    }

    /// 模拟元数据加载耗时
    pub fn with_ready_delay(mut self, delay: Duration) -> Self {
        self.ready_delay = delay;
        self
    }

    /// 模拟设备被占用/权限被拒绝
    pub fn deny_access(mut self, reason: impl Into<String>) -> Self {
        self.deny = Some(reason.into());
        self
    }

    pub fn control(&self) -> Arc<CameraControl> {
        Arc::clone(&self.control)
    }

    /// 对角渐变的测试画面
    fn render_pattern(width: u32, height: u32) -> Vec<u8> {
        let mut data = Vec::with_capacity(frame_len(width, height));
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[gradient(x, width), gradient(y, height), 128, 255]);
            }
        }
        data
    }
}

/// RGBA 缓冲区字节数 (在 usize 中计算, 大尺寸不溢出)
fn frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

/// 0..extent 线性映射到 0..=255
fn gradient(pos: u32, extent: u32) -> u8 {
    (pos as u64 * 255 / extent.max(1) as u64) as u8
}

impl FrameSource for SyntheticCamera {
    type Frame = DecodedFrame;

    async fn acquire(&mut self) -> Result<()> {
        if let Some(reason) = &self.deny {
            bail!("camera unavailable: {}", reason);
        }
        let info = self.info();
        self.buffer = Arc::new(Self::render_pattern(info.width, info.height));
        self.control.acquired.store(true, Ordering::Relaxed);
        self.control.acquire_count.fetch_add(1, Ordering::Relaxed);
        info!("📷 合成摄像头已打开: {}x{}", info.width, info.height);
        Ok(())
    }

    async fn wait_ready(&mut self) {
        if !self.ready_delay.is_zero() {
            tokio::time::sleep(self.ready_delay).await;
        }
    }

    fn info(&self) -> FrameInfo {
        FrameInfo {
            width: self.control.width.load(Ordering::Relaxed),
            height: self.control.height.load(Ordering::Relaxed),
            paused: self.control.paused.load(Ordering::Relaxed),
            ended: self.control.ended.load(Ordering::Relaxed),
        }
    }

    fn current_frame(&mut self) -> Option<DecodedFrame> {
        if !self.control.is_acquired() {
            warn!("⚠️ 摄像头未打开, 无法取帧");
            return None;
        }
        let info = self.info();
        if frame_len(info.width, info.height) != self.buffer.len() {
            // 分辨率变化后重新生成画面
            self.buffer = Arc::new(Self::render_pattern(info.width, info.height));
        }
        let frame_id = self.control.frames_served.fetch_add(1, Ordering::Relaxed) + 1;
        Some(DecodedFrame {
            rgba_data: Arc::clone(&self.buffer),
            width: info.width,
            height: info.height,
            frame_id,
        })
    }

    fn release(&mut self) {
        if self.control.acquired.swap(false, Ordering::Relaxed) {
            self.control.release_count.fetch_add(1, Ordering::Relaxed);
            self.buffer = Arc::new(Vec::new());
            info!("📷 合成摄像头已释放");
        }
    }
}
