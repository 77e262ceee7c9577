// ==========================================
// 机加工排产系统 - 逐件视图构建
// ==========================================
// 职责: 排产结果 → 逐件甘特行(精确回放或均分合成), 外加筛选/切片/渲染决策
// 红线: 有逐件时刻必须精确回放; 仅在只有批次行时才允许均分合成
// ==========================================

use crate::config::defaults;
use crate::domain::{
    PieceFlowBuildResult, PieceFlowFilter, PieceFlowRow, PieceRenderMode, PieceRenderPolicy,
    ScheduleOutcome,
};
use crate::engine::calendar::{add_minutes, diff_minutes};
use tracing::debug;

// ==========================================
// 机台泳道归一化
// ==========================================

/// 机台名 → 泳道名
///
/// # 规则
/// - 空白 → "VMC 1"
/// - 紧凑形如 VMC + 数字(去前导零后至多两位) → "VMC {n}"
/// - 其余原样(仅去首尾空白)
pub fn normalize_machine_lane(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "VMC 1".to_string();
    }

    let compact: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    if let Some(digits) = compact.strip_prefix("VMC") {
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            let significant = digits.trim_start_matches('0');
            let lane = if significant.is_empty() { "0" } else { significant };
            if lane.len() <= 2 {
                return format!("VMC {}", lane);
            }
        }
    }
    trimmed.to_string()
}

// ==========================================
// 逐件行构建
// ==========================================

/// 从排产结果构建逐件甘特行
///
/// # 规则
/// - 有逐件时刻 → 逐条精确回放(区间倒置或序号非正的行丢弃), is_approximate = false
/// - 只有批次行 → 按批量均分运行区间(每件至少 1 分钟, 末件对齐 runEnd),
///   is_approximate = true
pub fn build_piece_flow_rows(outcome: &ScheduleOutcome) -> PieceFlowBuildResult {
    if !outcome.piece_timeline.is_empty() {
        let rows = outcome
            .piece_timeline
            .iter()
            .filter(|piece| {
                piece.run_end > piece.run_start && piece.piece > 0 && piece.operation_seq > 0
            })
            .map(|piece| PieceFlowRow {
                id: format!(
                    "{}-{}-op{}-p{}",
                    piece.part_number, piece.batch_id, piece.operation_seq, piece.piece
                ),
                part: piece.part_number.clone(),
                batch: piece.batch_id.clone(),
                piece: piece.piece,
                operation_seq: piece.operation_seq,
                machine: normalize_machine_lane(&piece.machine),
                start: piece.run_start,
                end: piece.run_end,
                status: piece.status.to_string(),
            })
            .collect();
        return PieceFlowBuildResult {
            rows,
            is_approximate: false,
        };
    }

    debug!(rows = outcome.rows.len(), "无逐件时刻, 按批次行均分合成");
    let mut rows: Vec<PieceFlowRow> = Vec::new();
    for batch_row in &outcome.rows {
        if batch_row.run_end <= batch_row.run_start {
            continue;
        }
        let qty = if batch_row.batch_qty > 0 {
            batch_row.batch_qty
        } else if batch_row.order_qty > 0 {
            batch_row.order_qty
        } else {
            1
        };
        let total_min = diff_minutes(batch_row.run_start, batch_row.run_end);
        let each_min = (total_min / qty as i64).max(1);

        for index in 0..qty {
            let start = add_minutes(batch_row.run_start, index as i64 * each_min);
            let end = if index == qty - 1 {
                batch_row.run_end
            } else {
                add_minutes(start, each_min)
            };
            rows.push(PieceFlowRow {
                id: format!(
                    "{}-{}-op{}-p{}",
                    batch_row.part_number,
                    batch_row.batch_id,
                    batch_row.operation_seq,
                    index + 1
                ),
                part: batch_row.part_number.clone(),
                batch: batch_row.batch_id.clone(),
                piece: index + 1,
                operation_seq: batch_row.operation_seq,
                machine: normalize_machine_lane(&batch_row.machine),
                start,
                end,
                status: batch_row.status.to_string(),
            });
        }
    }
    PieceFlowBuildResult {
        rows,
        is_approximate: true,
    }
}

// ==========================================
// 筛选与切片
// ==========================================

/// 按筛选条件过滤逐件行
///
/// 件号为 None/空白/"ALL" 时不过滤; 机台条件先归一化再比较。
pub fn filter_piece_flow_rows(rows: &[PieceFlowRow], filter: &PieceFlowFilter) -> Vec<PieceFlowRow> {
    let part_filter = filter
        .part
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case("ALL"));
    let machine_filter = filter.machine.as_deref().map(normalize_machine_lane);
    let piece_from = filter.piece_from.unwrap_or(1);
    let piece_to = filter.piece_to.unwrap_or(u32::MAX);

    rows.iter()
        .filter(|row| {
            if let Some(part) = part_filter {
                if row.part != part {
                    return false;
                }
            }
            if row.piece < piece_from || row.piece > piece_to {
                return false;
            }
            if let Some(seq) = filter.operation_seq {
                if row.operation_seq != seq {
                    return false;
                }
            }
            if let Some(machine) = &machine_filter {
                if &row.machine != machine {
                    return false;
                }
            }
            if let Some(batch) = &filter.batch {
                if &row.batch != batch {
                    return false;
                }
            }
            true
        })
        .cloned()
        .collect()
}

/// 1 基、双闭区间的窗口切片, 越界输入各自钳回合法范围
pub fn apply_piece_slice(rows: &[PieceFlowRow], from: i64, to: i64) -> &[PieceFlowRow] {
    if rows.is_empty() {
        return rows;
    }
    let len = rows.len() as i64;
    let safe_from = from.max(1).min(len);
    let safe_to = safe_from.max(to.min(len));
    &rows[(safe_from - 1) as usize..safe_to as usize]
}

/// 渲染策略归并: Auto 按行数密度选 All 或 Slice, 阈值缺省用全局密度常量
pub fn resolve_piece_render_mode(
    policy: PieceRenderPolicy,
    row_count: usize,
    density_threshold: Option<usize>,
) -> PieceRenderMode {
    match policy {
        PieceRenderPolicy::All => PieceRenderMode::All,
        PieceRenderPolicy::Slice => PieceRenderMode::Slice,
        PieceRenderPolicy::Auto => {
            if row_count > density_threshold.unwrap_or(defaults::FLOW_DENSE_ROW_THRESHOLD) {
                PieceRenderMode::Slice
            } else {
                PieceRenderMode::All
            }
        }
    }
}

// ==========================================
// 单元测试
// ==========================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{HandleMode, RowStatus};
    use crate::domain::{PieceRow, ScheduleRow};
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 22)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn piece_row(piece: u32, start: NaiveDateTime, end: NaiveDateTime) -> PieceRow {
        PieceRow {
            part_number: "PN1001".to_string(),
            batch_id: "B01".to_string(),
            piece,
            operation_seq: 1,
            operation_name: "Turning".to_string(),
            machine: "vmc1".to_string(),
            person: "Kannan".to_string(),
            handle_mode: HandleMode::Single,
            run_start: start,
            run_end: end,
            status: RowStatus::Scheduled,
        }
    }

    fn batch_row(batch_qty: u32, run_start: NaiveDateTime, run_end: NaiveDateTime) -> ScheduleRow {
        ScheduleRow {
            id: "SO-1-B01-op-1".to_string(),
            part_number: "PN1001".to_string(),
            order_qty: batch_qty,
            priority: "Normal".to_string(),
            batch_id: "B01".to_string(),
            batch_qty,
            operation_seq: 1,
            operation_name: "Turning".to_string(),
            machine: "VMC 1".to_string(),
            person: "Kannan".to_string(),
            setup_person_name: "Kannan".to_string(),
            production_person_name: "Kannan".to_string(),
            handle_mode: HandleMode::Single,
            setup_start: at(6, 0),
            setup_end: at(6, 30),
            run_start,
            run_end,
            timing: "34M".to_string(),
            due_date: None,
            status: RowStatus::Scheduled,
        }
    }

    fn flow_row(piece: u32) -> PieceFlowRow {
        PieceFlowRow {
            id: format!("PN1001-B01-op1-p{}", piece),
            part: "PN1001".to_string(),
            batch: "B01".to_string(),
            piece,
            operation_seq: 1,
            machine: "VMC 1".to_string(),
            start: at(6, 30 + piece),
            end: at(6, 31 + piece),
            status: "Scheduled".to_string(),
        }
    }

    // ==========================================
    // 测试组: 泳道归一化
    // ==========================================

    #[test]
    fn test_normalize_machine_lane() {
        assert_eq!(normalize_machine_lane(""), "VMC 1");
        assert_eq!(normalize_machine_lane("   "), "VMC 1");
        assert_eq!(normalize_machine_lane(" vmc2 "), "VMC 2");
        assert_eq!(normalize_machine_lane("VMC 007"), "VMC 7");
        assert_eq!(normalize_machine_lane("vmc012"), "VMC 12");
        assert_eq!(normalize_machine_lane("VMC 0"), "VMC 0");
        // 三位以上编号与非 VMC 名称保持原样
        assert_eq!(normalize_machine_lane("VMC100"), "VMC100");
        assert_eq!(normalize_machine_lane(" HAAS-1 "), "HAAS-1");
    }

    // ==========================================
    // 测试组: 构建
    // ==========================================

    #[test]
    fn test_build_exact_rows_from_piece_timeline() {
        let outcome = ScheduleOutcome {
            rows: vec![batch_row(2, at(6, 30), at(6, 34))],
            piece_timeline: vec![
                piece_row(1, at(6, 30), at(6, 32)),
                piece_row(2, at(6, 32), at(6, 34)),
            ],
            skipped: Vec::new(),
        };

        let built = build_piece_flow_rows(&outcome);
        assert!(!built.is_approximate);
        assert_eq!(built.rows.len(), 2);
        assert_eq!(built.rows[0].id, "PN1001-B01-op1-p1");
        assert_eq!(built.rows[0].machine, "VMC 1");
        assert_eq!(built.rows[1].start, at(6, 32));
        assert_eq!(built.rows[1].end, at(6, 34));
    }

    #[test]
    fn test_build_synthetic_rows_split_run_evenly() {
        let outcome = ScheduleOutcome {
            rows: vec![batch_row(3, at(6, 30), at(6, 36))],
            piece_timeline: Vec::new(),
            skipped: Vec::new(),
        };

        let built = build_piece_flow_rows(&outcome);
        assert!(built.is_approximate);
        assert_eq!(built.rows.len(), 3);
        assert_eq!(built.rows[0].start, at(6, 30));
        assert_eq!(built.rows[0].end, at(6, 32));
        assert_eq!(built.rows[1].start, at(6, 32));
        assert_eq!(built.rows[1].end, at(6, 34));
        // 末件对齐批次运行结束
        assert_eq!(built.rows[2].start, at(6, 34));
        assert_eq!(built.rows[2].end, at(6, 36));
    }

    #[test]
    fn test_build_synthetic_each_piece_at_least_one_minute() {
        let outcome = ScheduleOutcome {
            rows: vec![batch_row(4, at(6, 30), at(6, 31))],
            piece_timeline: Vec::new(),
            skipped: Vec::new(),
        };

        let built = build_piece_flow_rows(&outcome);
        assert_eq!(built.rows.len(), 4);
        assert_eq!(built.rows[0].start, at(6, 30));
        assert_eq!(built.rows[0].end, at(6, 31));
        assert_eq!(built.rows[1].start, at(6, 31));
        assert_eq!(built.rows[3].end, at(6, 31));
    }

    // ==========================================
    // 测试组: 筛选
    // ==========================================

    #[test]
    fn test_filter_part_all_keeps_everything() {
        let rows = vec![flow_row(1), flow_row(2)];
        let kept = filter_piece_flow_rows(
            &rows,
            &PieceFlowFilter {
                part: Some("ALL".to_string()),
                ..PieceFlowFilter::default()
            },
        );
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_filter_by_piece_range_and_machine() {
        let rows = vec![flow_row(1), flow_row(2), flow_row(3), flow_row(4)];
        let kept = filter_piece_flow_rows(
            &rows,
            &PieceFlowFilter {
                piece_from: Some(2),
                piece_to: Some(3),
                machine: Some("vmc01".to_string()),
                ..PieceFlowFilter::default()
            },
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].piece, 2);
        assert_eq!(kept[1].piece, 3);
    }

    #[test]
    fn test_filter_by_part_seq_and_batch() {
        let mut other = flow_row(1);
        other.part = "PN9".to_string();
        let rows = vec![flow_row(1), other];

        let by_part = filter_piece_flow_rows(
            &rows,
            &PieceFlowFilter {
                part: Some("PN9".to_string()),
                ..PieceFlowFilter::default()
            },
        );
        assert_eq!(by_part.len(), 1);
        assert_eq!(by_part[0].part, "PN9");

        let by_seq = filter_piece_flow_rows(
            &rows,
            &PieceFlowFilter {
                operation_seq: Some(7),
                ..PieceFlowFilter::default()
            },
        );
        assert!(by_seq.is_empty());

        let by_batch = filter_piece_flow_rows(
            &rows,
            &PieceFlowFilter {
                batch: Some("B01".to_string()),
                ..PieceFlowFilter::default()
            },
        );
        assert_eq!(by_batch.len(), 2);
    }

    // ==========================================
    // 测试组: 切片与渲染决策
    // ==========================================

    #[test]
    fn test_apply_piece_slice_clamps() {
        let rows = vec![flow_row(1), flow_row(2), flow_row(3), flow_row(4), flow_row(5)];

        let middle = apply_piece_slice(&rows, 2, 3);
        assert_eq!(middle.len(), 2);
        assert_eq!(middle[0].piece, 2);
        assert_eq!(middle[1].piece, 3);

        // to < from 时窗口收缩为单行
        let inverted = apply_piece_slice(&rows, 3, 1);
        assert_eq!(inverted.len(), 1);
        assert_eq!(inverted[0].piece, 3);

        let negative = apply_piece_slice(&rows, -4, 2);
        assert_eq!(negative.len(), 2);
        assert_eq!(negative[0].piece, 1);

        let empty: Vec<PieceFlowRow> = Vec::new();
        assert!(apply_piece_slice(&empty, 1, 10).is_empty());
    }

    #[test]
    fn test_resolve_piece_render_mode() {
        assert_eq!(
            resolve_piece_render_mode(PieceRenderPolicy::All, 100_000, None),
            PieceRenderMode::All
        );
        assert_eq!(
            resolve_piece_render_mode(PieceRenderPolicy::Slice, 1, None),
            PieceRenderMode::Slice
        );
        assert_eq!(
            resolve_piece_render_mode(PieceRenderPolicy::Auto, 3, Some(3)),
            PieceRenderMode::All
        );
        assert_eq!(
            resolve_piece_render_mode(PieceRenderPolicy::Auto, 4, Some(3)),
            PieceRenderMode::Slice
        );
        // 阈值缺省回落全局密度常量 600
        assert_eq!(
            resolve_piece_render_mode(PieceRenderPolicy::Auto, 600, None),
            PieceRenderMode::All
        );
        assert_eq!(
            resolve_piece_render_mode(PieceRenderPolicy::Auto, 601, None),
            PieceRenderMode::Slice
        );
    }
}
