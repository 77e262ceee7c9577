// ==========================================
// 机加工排产系统 - 配置层
// ==========================================
// 职责: 少量可覆写排产参数的默认值与文件加载
// ==========================================

pub mod tunables;

// 重导出排产参数
pub use tunables::{defaults, SchedulingTunables};
