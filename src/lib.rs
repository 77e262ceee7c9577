// ==========================================
// 机加工排产系统 - 核心库
// ==========================================
// 技术栈: Rust (纯内存计算, 无外部服务依赖)
// 系统定位: 确定性排产内核 (同输入必同输出)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 引擎层 - 排产/件流/校验
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 可调参数
pub mod config;

// 日志系统
pub mod logging;

// API 层 - 界面侧辅助
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    BatchMode, HandleMode, IssueSeverity, PieceRenderMode, PieceRenderPolicy, Priority,
    ProfileMode, RowStatus, SourceSection,
};

// 领域实体
pub use domain::{
    MasterOperationRow, OperationSpec, OrderOperationDetail, PersonProfile, PersonnelParseResult,
    PieceFlowBuildResult, PieceFlowFilter, PieceFlowRow, PieceRow, RawTimelineRow, ScheduleOutcome,
    ScheduleRow, ScheduleSettings, SchedulingOrder, SkippedOperation, VerificationIssue,
    VerificationReport,
};

// 引擎
pub use engine::{
    apply_piece_slice, build_piece_flow_rows, filter_piece_flow_rows, resolve_piece_render_mode,
    verify_piece_flow, DeterministicScheduler,
};

// 导入层
pub use importer::{
    load_master_operations, parse_personnel_profiles_from_file,
    parse_personnel_profiles_from_rows, ImportError, ImportResult,
};

// 配置
pub use config::SchedulingTunables;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "机加工排产系统";
