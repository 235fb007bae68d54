// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// 视频输入系统 (Video Input System)
///
/// 帧源由调度器在整个会话期间独占, 停止时释放
/// - FrameSource:     帧源接口
/// - SyntheticCamera: 内存中的合成摄像头 (演示/测试)
pub mod synthetic;

use anyhow::Result;

use crate::detection::types::Size;

pub use synthetic::{CameraControl, DecodedFrame, SyntheticCamera};

/// 帧源当前状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub paused: bool,
    pub ended: bool,
}

impl FrameInfo {
    /// 尺寸为0、暂停或结束时本帧无事可做
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && !self.paused && !self.ended
    }

    pub fn size(&self) -> Size {
        Size::new(self.width as f32, self.height as f32)
    }
}

/// 帧源接口
#[allow(async_fn_in_trait)]
pub trait FrameSource {
    type Frame;

    /// 获取设备/流 (失败则会话无法启动)
    async fn acquire(&mut self) -> Result<()>;

    /// 等待首帧元数据就绪, 启动时只调用一次
    async fn wait_ready(&mut self) {}

    fn info(&self) -> FrameInfo;

    fn current_frame(&mut self) -> Option<Self::Frame>;

    /// 释放设备/流, 可重复调用
    fn release(&mut self);
}
