// ==========================================
// 机加工排产系统 - 排产参数
// ==========================================
// 职责: 少量可覆写的排产常量, 支持从配置文件加载
// 红线: 文件缺失或格式错误一律回落默认值, 不中断排产
// ==========================================

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ==========================================
// 默认值常量
// ==========================================
pub mod defaults {
    /// 同一人同一时刻可占用的运行容量上限(double 每台记 1, single 记 2)
    pub const PERSON_RUN_CAPACITY_UNITS: u32 = 2;
    /// 自动分批的并行道数上限
    pub const AUTO_SPLIT_LANE_CAP: u32 = 2;
    /// 分钟级放置搜索的推进上限(45 天)
    pub const MAX_SEARCH_MINUTES: u32 = 60 * 24 * 45;
    /// 运行预约冲突后的重试次数上限
    pub const MAX_RUN_PLACEMENT_ATTEMPTS: u32 = 120;
    /// 逐件视图超过该行数时自动改用窗口渲染
    pub const FLOW_DENSE_ROW_THRESHOLD: usize = 600;
}

/// 可覆写的排产参数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingTunables {
    pub person_run_capacity_units: u32,
    pub auto_split_lane_cap: u32,
    pub max_search_minutes: u32,
    pub max_run_placement_attempts: u32,
    pub flow_dense_row_threshold: usize,
}

impl Default for SchedulingTunables {
    fn default() -> Self {
        SchedulingTunables {
            person_run_capacity_units: defaults::PERSON_RUN_CAPACITY_UNITS,
            auto_split_lane_cap: defaults::AUTO_SPLIT_LANE_CAP,
            max_search_minutes: defaults::MAX_SEARCH_MINUTES,
            max_run_placement_attempts: defaults::MAX_RUN_PLACEMENT_ATTEMPTS,
            flow_dense_row_threshold: defaults::FLOW_DENSE_ROW_THRESHOLD,
        }
    }
}

impl SchedulingTunables {
    /// 默认配置文件位置: <系统配置目录>/machining-aps/tunables.json
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("machining-aps").join("tunables.json"))
    }

    /// 从默认位置加载, 找不到目录或文件时用默认值
    pub fn load() -> Self {
        match Self::default_config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// 从指定文件加载
    ///
    /// # 规则
    /// - 文件不存在 → 默认值
    /// - JSON 格式错误 → 告警后回落默认值
    pub fn load_from(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(tunables) => tunables,
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "排产参数文件格式错误, 使用默认值"
                );
                Self::default()
            }
        }
    }
}
