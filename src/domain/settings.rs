// ==========================================
// 机加工排产系统 - 排产设置实体
// ==========================================
// 职责: 排产设置入参(起点/时间窗/班次/人员/假日/故障)的外部结构
// 红线: 字段全部可缺省; 缺省与非法值的兜底在引擎解析层统一处理
// ==========================================

use crate::domain::lenient;
use crate::domain::order::MasterOperationRow;
use crate::domain::personnel::PersonProfile;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 一次排产的全局设置
///
/// 时间窗写法均为 "HH:MM-HH:MM"; 跨零点(如 "22:00-06:00")按过夜窗处理。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleSettings {
    /// 排产锚点, 缺省取当前时间所在/之后的首个调机窗起点
    #[serde(deserialize_with = "lenient::opt_string")]
    pub global_start_date_time: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub global_setup_window: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub shift1: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub shift2: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub shift3: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub production_window_shift1: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub production_window_shift2: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub production_window_shift3: Option<String>,
    /// 仅当恰为布尔 true 时启用操作工班次约束
    #[serde(deserialize_with = "lenient::opt_bool")]
    pub enforce_operator_shifts: Option<bool>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub profile_mode: Option<String>,
    pub personnel_profiles: Vec<PersonnelInputRow>,
    pub holidays: Vec<HolidayInput>,
    pub breakdowns: Vec<BreakdownInput>,
    /// 设置内嵌的工艺主数据(与外部工艺文件合并使用)
    pub master_operations: Vec<MasterOperationRow>,
}

/// 设置里的一条人员记录
///
/// 人员档案解析器的输出可原样回填到这里。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersonnelInputRow {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub uid: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub source_section: Option<String>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub level_up: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_bool")]
    pub setup_eligible: Option<bool>,
    #[serde(deserialize_with = "lenient::opt_bool")]
    pub production_eligible: Option<bool>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub setup_priority: Option<f64>,
}

impl From<&PersonProfile> for PersonnelInputRow {
    fn from(profile: &PersonProfile) -> Self {
        PersonnelInputRow {
            uid: Some(profile.uid.clone()),
            name: Some(profile.name.clone()),
            source_section: Some(profile.source_section.to_string()),
            level_up: Some(f64::from(profile.level_up)),
            setup_eligible: Some(profile.setup_eligible),
            production_eligible: Some(profile.production_eligible),
            setup_priority: Some(f64::from(profile.setup_priority)),
        }
    }
}

/// 假日的三种外部写法: 日期文本 / 起止对象 / 其他(忽略)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HolidayInput {
    Text(String),
    Range(HolidayRange),
    Other(Value),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HolidayRange {
    #[serde(
        alias = "start",
        alias = "from",
        alias = "date",
        deserialize_with = "lenient::opt_string"
    )]
    pub start_date_time: Option<String>,
    #[serde(alias = "end", alias = "to", deserialize_with = "lenient::opt_string")]
    pub end_date_time: Option<String>,
}

/// 机台故障区间, 起止任一非法或倒置则整条忽略
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BreakdownInput {
    #[serde(
        alias = "start",
        alias = "from",
        deserialize_with = "lenient::opt_string"
    )]
    pub start_date_time: Option<String>,
    #[serde(alias = "end", alias = "to", deserialize_with = "lenient::opt_string")]
    pub end_date_time: Option<String>,
    /// 受影响机台清单(非数组写法按单台字段处理)
    pub machines: Option<Value>,
    /// 单台写法
    #[serde(deserialize_with = "lenient::opt_string")]
    pub machine: Option<String>,
}

impl BreakdownInput {
    /// 归并 machines/machine 两种写法, 去空白
    pub fn affected_machines(&self) -> Vec<String> {
        if let Some(Value::Array(list)) = &self.machines {
            return list
                .iter()
                .filter_map(lenient::coerce_string)
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
        }
        match &self.machine {
            Some(m) if !m.trim().is_empty() => vec![m.trim().to_string()],
            _ => Vec::new(),
        }
    }
}
