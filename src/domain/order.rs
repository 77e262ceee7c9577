// ==========================================
// 机加工排产系统 - 订单与工艺实体
// ==========================================
// 职责: 排产入参(订单/工序覆盖/工艺主数据)与解析后的工序规格
// 红线: 入参字段全部可缺省, 缺省语义在引擎侧统一补齐
// ==========================================

use crate::domain::lenient;
use crate::domain::types::HandleMode;
use serde::{Deserialize, Serialize};

// ==========================================
// 排产订单 (输入)
// ==========================================

/// 一条待排订单
///
/// 外部 JSON 按 camelCase 书写, 数字字段容忍文本混写。
/// `operation_seq` 形如 "1,2,3", 缺省按 "1" 处理。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulingOrder {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub part_number: Option<String>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub order_quantity: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub priority: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub due_date: Option<String>,
    /// 单独的投产起点(优先于 `start_date`)
    #[serde(deserialize_with = "lenient::opt_string")]
    pub start_date_time: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub start_date: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub batch_mode: Option<String>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub custom_batch_size: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub operation_seq: Option<String>,
    pub operation_details: Vec<OrderOperationDetail>,
}

/// 订单级工序覆盖: 同序号时优先于工艺主数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderOperationDetail {
    #[serde(alias = "OperationSeq", deserialize_with = "lenient::opt_f64")]
    pub operation_seq: Option<f64>,
    #[serde(alias = "OperationName", deserialize_with = "lenient::opt_string")]
    pub operation_name: Option<String>,
    #[serde(alias = "SetupTime_Min", deserialize_with = "lenient::opt_f64")]
    pub setup_time_min: Option<f64>,
    #[serde(alias = "CycleTime_Min", deserialize_with = "lenient::opt_f64")]
    pub cycle_time_min: Option<f64>,
    #[serde(alias = "Minimum_BatchSize", deserialize_with = "lenient::opt_f64")]
    pub minimum_batch_size: Option<f64>,
    /// 指定机台: 一旦给出, 可用机台收敛为这一台
    #[serde(alias = "machine", alias = "Machine", deserialize_with = "lenient::opt_string")]
    pub fixed_machine: Option<String>,
    /// 可用机台: 接受逗号分隔文本或字符串数组
    #[serde(alias = "EligibleMachines")]
    pub eligible_machines: Option<MachineSpec>,
    #[serde(
        alias = "HandleMode",
        alias = "HandleMachines",
        alias = "handle_machines",
        deserialize_with = "lenient::opt_string"
    )]
    pub handle_mode: Option<String>,
}

/// 机台清单的两种外部写法
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MachineSpec {
    List(Vec<String>),
    Text(String),
}

impl MachineSpec {
    /// 展开为去空白后的机台名列表(可能为空)
    pub fn to_machines(&self) -> Vec<String> {
        match self {
            MachineSpec::List(items) => items
                .iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
            MachineSpec::Text(text) => text
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }
}

// ==========================================
// 工艺主数据 (输入)
// ==========================================

/// 工艺主数据行, 列名沿用工艺表的原始写法
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterOperationRow {
    #[serde(
        rename = "PartNumber",
        alias = "partNumber",
        deserialize_with = "lenient::opt_string"
    )]
    pub part_number: Option<String>,
    #[serde(
        rename = "OperationSeq",
        alias = "operationSeq",
        deserialize_with = "lenient::opt_f64"
    )]
    pub operation_seq: Option<f64>,
    #[serde(
        rename = "OperationName",
        alias = "operationName",
        deserialize_with = "lenient::opt_string"
    )]
    pub operation_name: Option<String>,
    #[serde(
        rename = "SetupTime_Min",
        alias = "setupTimeMin",
        deserialize_with = "lenient::opt_f64"
    )]
    pub setup_time_min: Option<f64>,
    #[serde(
        rename = "CycleTime_Min",
        alias = "cycleTimeMin",
        deserialize_with = "lenient::opt_f64"
    )]
    pub cycle_time_min: Option<f64>,
    #[serde(
        rename = "Minimum_BatchSize",
        alias = "minimumBatchSize",
        deserialize_with = "lenient::opt_f64"
    )]
    pub minimum_batch_size: Option<f64>,
    #[serde(
        rename = "EligibleMachines",
        alias = "eligibleMachines",
        deserialize_with = "lenient::opt_string"
    )]
    pub eligible_machines: Option<String>,
    #[serde(
        rename = "HandleMachines",
        alias = "handleMachines",
        alias = "handle_machines",
        deserialize_with = "lenient::opt_string"
    )]
    pub handle_machines: Option<String>,
}

// ==========================================
// 解析后的工序规格 (引擎内部口径)
// ==========================================

/// 订单覆盖与工艺主数据合并后的单个工序
///
/// # 规则
/// - 时长与批量均已钳位到 ≥1, 排产按整分钟粒度推进
/// - `fixed_machine` 存在时 `eligible_machines` 即为该单台
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSpec {
    pub operation_seq: u32,
    pub operation_name: String,
    pub setup_time_min: u32,
    pub cycle_time_min: u32,
    pub minimum_batch_size: u32,
    pub eligible_machines: Vec<String>,
    pub fixed_machine: Option<String>,
    pub handle_mode: HandleMode,
}

impl OperationSpec {
    /// 工序缺名时的兜底名称
    pub fn fallback_name(seq: u32) -> String {
        format!("Operation {}", seq)
    }
}
