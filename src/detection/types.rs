// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 手势检测数据结构定义
//! Data structures for gesture detection

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ========== 枚举类型 ==========

/// 检测器输出的手势标签 (开放集合,实际只有少量取值)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    Open,
    Closed,
    Point,
    Face,
    Other(String),
}

impl Label {
    /// 从文本解析标签 (大小写不敏感)
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" => Label::Open,
            "closed" => Label::Closed,
            "point" => Label::Point,
            "face" => Label::Face,
            other => Label::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Label::Open => "open",
            Label::Closed => "closed",
            Label::Point => "point",
            Label::Face => "face",
            Label::Other(s) => s,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Label {
    fn from(raw: &str) -> Self {
        Label::parse(raw)
    }
}

impl Serialize for Label {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Label::parse(&raw))
    }
}

// ========== 数据结构 ==========

/// 二维点 (绘图表面坐标)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// 欧氏距离
    pub fn distance(&self, other: &Point2) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// 宽高 (帧尺寸 / 绘图表面尺寸)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// 宽高都大于0才能用于归一化
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// 检测框 (帧像素坐标, 左上角为原点)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bbox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bbox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn xmax(&self) -> f32 {
        self.x + self.width
    }

    pub fn ymax(&self) -> f32 {
        self.y + self.height
    }

    pub fn cxcy(&self) -> Point2 {
        Point2::new(self.x + self.width / 2., self.y + self.height / 2.)
    }
}

/// 单帧的一个检测结果
///
/// 只在一个tick内有效,不做持久化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: Label,
    /// 置信度, 反序列化时接受数字或数字文本, 归一化到 [0,1].
    /// 只能经 new/反序列化写入, 保证不会出现 NaN
    #[serde(deserialize_with = "deserialize_score")]
    score: f32,
    pub bbox: Bbox,
}

impl Prediction {
    pub fn new(label: impl Into<Label>, score: f32, bbox: Bbox) -> Self {
        Self {
            label: label.into(),
            score: normalize_score(score),
            bbox,
        }
    }

    /// 归一化后的置信度, 总在 [0,1] 内
    pub fn score(&self) -> f32 {
        self.score
    }
}

/// 一段待绘制的线段 (绘图表面坐标)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: Point2,
    pub to: Point2,
}

impl Segment {
    pub fn length(&self) -> f32 {
        self.from.distance(&self.to)
    }
}

// ========== 置信度归一化 ==========

/// NaN 视为 0, 其余截断到 [0,1]
pub fn normalize_score(score: f32) -> f32 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// 文本形式的置信度 ("0.87"), 无法解析时返回 0
pub fn parse_score(raw: &str) -> f32 {
    raw.trim()
        .parse::<f32>()
        .map(normalize_score)
        .unwrap_or(0.0)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScore {
    Number(f64),
    Text(String),
}

fn deserialize_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    Ok(match RawScore::deserialize(deserializer)? {
        RawScore::Number(n) => normalize_score(n as f32),
        RawScore::Text(s) => parse_score(&s),
    })
}
