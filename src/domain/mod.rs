// ==========================================
// 机加工排产系统 - 领域模型层
// ==========================================
// 职责: 定义订单、设置、人员、排产结果、逐件视图的实体与类型
// 红线: 不含排产算法逻辑, 不含文件解析逻辑
// ==========================================

pub mod lenient;
pub mod order;
pub mod personnel;
pub mod pieceflow;
pub mod schedule;
pub mod settings;
pub mod types;

// 重导出核心类型
pub use order::{MachineSpec, MasterOperationRow, OperationSpec, OrderOperationDetail, SchedulingOrder};
pub use personnel::{
    PersonProfile, PersonnelIssue, PersonnelIssueCode, PersonnelParseResult, PersonnelSummary,
};
pub use pieceflow::{
    PieceFlowBuildResult, PieceFlowFilter, PieceFlowRow, RawTimelineRow, VerificationCode,
    VerificationIssue, VerificationReport,
};
pub use schedule::{PieceRow, ScheduleOutcome, ScheduleRow, SkipReason, SkippedOperation};
pub use settings::{
    BreakdownInput, HolidayInput, HolidayRange, PersonnelInputRow, ScheduleSettings,
};
pub use types::{
    BatchMode, HandleMode, IssueSeverity, PieceRenderMode, PieceRenderPolicy, Priority,
    ProfileMode, RowStatus, SourceSection,
};
