// ==========================================
// 机加工排产系统 - 引擎层
// ==========================================
// 职责: 确定性排产的全部纯函数逻辑(日历/分批/放置/编排/逐件视图/核验)
// 红线: 引擎不做 I/O; 同一输入必须产出相同输出
// ==========================================

pub mod batching;
pub mod calendar;
pub mod pieceflow;
pub mod placement;
pub mod scheduler;
pub mod settings;
pub mod verifier;

// 重导出核心引擎
pub use pieceflow::{
    apply_piece_slice, build_piece_flow_rows, filter_piece_flow_rows, normalize_machine_lane,
    resolve_piece_render_mode,
};
pub use scheduler::DeterministicScheduler;
pub use settings::{parse_settings, ParsedSettings};
pub use verifier::{build_event_pipeline, verify_piece_flow, PieceEvent};
