// ==========================================
// 机加工排产系统 - 领域类型定义
// ==========================================
// 职责: 排产核心的枚举类型与解析规则
// 红线: 解析必须宽容(未知取默认), 序列化必须与外部约定一致
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 订单优先级 (Priority)
// ==========================================
// 红线: 调度顺序由优先级决定, 不是请求到达顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Urgent, // 紧急
    High,   // 高
    Normal, // 正常
    Low,    // 低
}

impl Priority {
    /// 调度评分(越小越先调度)
    pub fn dispatch_score(self) -> u8 {
        match self {
            Priority::Urgent => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }

    /// 从任意文本解析(大小写不敏感, 未知取 Normal)
    pub fn parse_label(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "urgent" => Priority::Urgent,
            "high" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Normal,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Urgent => write!(f, "Urgent"),
            Priority::High => write!(f, "High"),
            Priority::Normal => write!(f, "Normal"),
            Priority::Low => write!(f, "Low"),
        }
    }
}

// ==========================================
// 看机模式 (Handle Mode)
// ==========================================
// single: 操作工独占一台机
// double: 一人最多同时看管两台 double 模式机
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleMode {
    Single,
    Double,
}

impl HandleMode {
    /// 从任意文本解析: 含 "double"(大小写不敏感) 视为 Double, 其余 Single
    pub fn parse_label(value: &str) -> Self {
        if value.trim().to_lowercase().contains("double") {
            HandleMode::Double
        } else {
            HandleMode::Single
        }
    }

    /// 运行占用的人员容量单位
    ///
    /// # 规则
    /// - Double → 1 (允许同一人并行两台)
    /// - Single → 2 (占满容量, 禁止任何并行)
    pub fn run_units(self) -> u32 {
        match self {
            HandleMode::Double => 1,
            HandleMode::Single => 2,
        }
    }
}

impl Default for HandleMode {
    fn default() -> Self {
        HandleMode::Single
    }
}

impl fmt::Display for HandleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleMode::Single => write!(f, "single"),
            HandleMode::Double => write!(f, "double"),
        }
    }
}

// ==========================================
// 分批模式 (Batch Mode)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BatchMode {
    SingleBatch,     // 整单一批
    AutoSplit,       // 自动分批
    CustomBatchSize, // 固定批量
}

impl BatchMode {
    /// 从任意文本解析(未知取 AutoSplit)
    pub fn parse_label(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "single-batch" => BatchMode::SingleBatch,
            "custom-batch-size" => BatchMode::CustomBatchSize,
            _ => BatchMode::AutoSplit,
        }
    }
}

impl Default for BatchMode {
    fn default() -> Self {
        BatchMode::AutoSplit
    }
}

impl fmt::Display for BatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchMode::SingleBatch => write!(f, "single-batch"),
            BatchMode::AutoSplit => write!(f, "auto-split"),
            BatchMode::CustomBatchSize => write!(f, "custom-batch-size"),
        }
    }
}

// ==========================================
// 档位模式 (Profile Mode)
// ==========================================
// basic: 强制整单一批, 报表省略 Setup_output
// advanced: 允许分批, 完整报表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileMode {
    Basic,
    Advanced,
}

impl ProfileMode {
    pub fn parse_label(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "basic" => ProfileMode::Basic,
            _ => ProfileMode::Advanced,
        }
    }
}

impl Default for ProfileMode {
    fn default() -> Self {
        ProfileMode::Advanced
    }
}

impl fmt::Display for ProfileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileMode::Basic => write!(f, "basic"),
            ProfileMode::Advanced => write!(f, "advanced"),
        }
    }
}

// ==========================================
// 行状态 (Row Status)
// ==========================================
// Scheduled: 已放置
// Skipped: 工艺缺失, 整单跳过
// Unschedulable: 无可行的机台/人员/时间窗
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowStatus {
    Scheduled,
    Skipped,
    Unschedulable,
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowStatus::Scheduled => write!(f, "Scheduled"),
            RowStatus::Skipped => write!(f, "Skipped"),
            RowStatus::Unschedulable => write!(f, "Unschedulable"),
        }
    }
}

// ==========================================
// 人员来源区段 (Source Section)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSection {
    Production, // 生产区段
    Setup,      // 调机区段
}

impl fmt::Display for SourceSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSection::Production => write!(f, "production"),
            SourceSection::Setup => write!(f, "setup"),
        }
    }
}

// ==========================================
// 核验问题严重度 (Issue Severity)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Critical,
    Warning,
    Info,
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueSeverity::Critical => write!(f, "critical"),
            IssueSeverity::Warning => write!(f, "warning"),
            IssueSeverity::Info => write!(f, "info"),
        }
    }
}

// ==========================================
// 逐件视图渲染策略 (Piece Render Policy)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceRenderPolicy {
    All,   // 全量渲染
    Slice, // 窗口渲染
    Auto,  // 按行数密度自动决定
}

/// 渲染决策结果(Auto 归并为 All 或 Slice)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceRenderMode {
    All,
    Slice,
}
