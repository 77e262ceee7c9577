// ==========================================
// 机加工排产系统 - 排产结果实体
// ==========================================
// 职责: 引擎输出(批次行/逐件时刻/未排明细)的结构定义
// 红线: 行字段一经产出不再回填修改, 序列化口径须与报表约定一致
// ==========================================

use crate::domain::types::{HandleMode, RowStatus};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 缺交期序列化为 "N/A" 的约定
mod due_date_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.format(FORMAT).to_string()),
            None => serializer.serialize_str("N/A"),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(NaiveDateTime::parse_from_str(&raw, FORMAT).ok())
    }
}

// ==========================================
// 批次级排产行
// ==========================================

/// 一个批次在一道工序上的完整放置结果
///
/// `person` 是 `production_person_name` 的历史镜像字段, 两者恒相等,
/// 且必须是人员档案里的真实姓名, 不允许出现占位代号。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRow {
    pub id: String,
    pub part_number: String,
    pub order_qty: u32,
    /// 展示用优先级标签(首字母大写)
    pub priority: String,
    pub batch_id: String,
    pub batch_qty: u32,
    pub operation_seq: u32,
    pub operation_name: String,
    pub machine: String,
    pub person: String,
    pub setup_person_name: String,
    pub production_person_name: String,
    pub handle_mode: HandleMode,
    pub setup_start: NaiveDateTime,
    pub setup_end: NaiveDateTime,
    pub run_start: NaiveDateTime,
    pub run_end: NaiveDateTime,
    /// 总历时文本, 形如 "2H 15M" 或 "2H 15M (paused 20M)"
    pub timing: String,
    #[serde(with = "due_date_format")]
    pub due_date: Option<NaiveDateTime>,
    pub status: RowStatus,
}

// ==========================================
// 逐件时刻行
// ==========================================

/// 批次内单件的运行区间, 由逐件仿真产出
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PieceRow {
    pub part_number: String,
    pub batch_id: String,
    pub piece: u32,
    pub operation_seq: u32,
    pub operation_name: String,
    pub machine: String,
    pub person: String,
    pub handle_mode: HandleMode,
    pub run_start: NaiveDateTime,
    pub run_end: NaiveDateTime,
    pub status: RowStatus,
}

// ==========================================
// 未排明细
// ==========================================

/// 未能排下的原因码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// 工艺主数据缺该工序且订单无覆盖, 整单跳过
    MissingMasterOperation,
    /// 可用人员池为空(无调机或无生产候选)
    NoPersonnelAvailable,
    /// 搜索窗内找不到可行的机台/人员/时间组合
    NoFeasiblePlacement,
    /// 同批次上游工序未排下, 后续工序连带搁置
    BlockedByUpstream,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingMasterOperation => write!(f, "MISSING_MASTER_OPERATION"),
            SkipReason::NoPersonnelAvailable => write!(f, "NO_PERSONNEL_AVAILABLE"),
            SkipReason::NoFeasiblePlacement => write!(f, "NO_FEASIBLE_PLACEMENT"),
            SkipReason::BlockedByUpstream => write!(f, "BLOCKED_BY_UPSTREAM"),
        }
    }
}

/// 一条未排记录: 订单被跳过或某工序不可排
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedOperation {
    pub order_id: String,
    pub part_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_seq: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    pub reason: SkipReason,
    pub detail: String,
    pub status: RowStatus,
}

// ==========================================
// 排产总结果
// ==========================================

/// 一次 run_schedule 的全部产出
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOutcome {
    pub rows: Vec<ScheduleRow>,
    pub piece_timeline: Vec<PieceRow>,
    pub skipped: Vec<SkippedOperation>,
}

impl ScheduleOutcome {
    /// 是否全部订单行均已放置
    pub fn is_fully_scheduled(&self) -> bool {
        self.skipped.is_empty()
    }

    /// 已放置的批次行数
    pub fn scheduled_count(&self) -> usize {
        self.rows.len()
    }
}
