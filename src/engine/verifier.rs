// ==========================================
// 机加工排产系统 - 逐件时刻核验
// ==========================================
// 职责: 宽松时刻行 → 机台重叠/工序先后/人员容量三类核验问题
// 红线: 核验只报告不修改; 任一 critical 问题即判整份时刻不通过
// ==========================================

use crate::config::defaults;
use crate::domain::types::{HandleMode, IssueSeverity};
use crate::domain::{RawTimelineRow, VerificationCode, VerificationIssue, VerificationReport};
use crate::engine::calendar::parse_flexible_datetime;
use std::collections::{HashMap, HashSet};
use tracing::debug;

// ==========================================
// 归一化事件
// ==========================================

/// 清洗排序后的一条逐件事件, 时间戳为毫秒
///
/// piece/operation_seq 保留小数口径, 仅钳掉非法值。
#[derive(Debug, Clone, PartialEq)]
pub struct PieceEvent {
    pub id: String,
    pub part: String,
    pub batch: String,
    pub piece: f64,
    pub operation_seq: f64,
    pub machine: String,
    pub person: String,
    pub handle_mode: HandleMode,
    pub start_ts: i64,
    pub end_ts: i64,
}

fn nonempty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

fn truthy_number(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v != 0.0 && !v.is_nan())
}

fn to_timestamp(value: Option<&str>) -> Option<i64> {
    parse_flexible_datetime(value?).map(|dt| dt.and_utc().timestamp_millis())
}

/// 宽松时刻行 → 归一化事件流
///
/// # 规则
/// - 起止任一解析失败或倒置(end <= start)的行丢弃
/// - 件号/批次/机台/人员缺省为 UNKNOWN/B00/UNKNOWN/Unassigned
/// - 输出按 (start_ts, end_ts) 升序
pub fn build_event_pipeline(timeline: &[RawTimelineRow]) -> Vec<PieceEvent> {
    let mut events: Vec<PieceEvent> = Vec::new();
    for (index, row) in timeline.iter().enumerate() {
        let start_ts = to_timestamp(nonempty(row.run_start.as_deref()).or(row.start.as_deref()));
        let end_ts = to_timestamp(nonempty(row.run_end.as_deref()).or(row.end.as_deref()));
        let (start_ts, end_ts) = match (start_ts, end_ts) {
            (Some(start), Some(end)) if end > start => (start, end),
            _ => continue,
        };

        let part = nonempty(row.part.as_deref())
            .or(nonempty(row.part_number.as_deref()))
            .unwrap_or("UNKNOWN")
            .trim()
            .to_string();
        let batch = nonempty(row.batch.as_deref())
            .or(nonempty(row.batch_id.as_deref()))
            .unwrap_or("B00")
            .trim()
            .to_string();
        let piece_raw = truthy_number(row.piece).unwrap_or(1.0);
        let seq_raw = truthy_number(row.operation_seq)
            .or(truthy_number(row.operation))
            .unwrap_or(1.0);
        let machine = nonempty(row.machine.as_deref())
            .unwrap_or("UNKNOWN")
            .trim()
            .to_string();
        let person = nonempty(row.person.as_deref())
            .or(nonempty(row.operator.as_deref()))
            .unwrap_or("Unassigned")
            .trim()
            .to_string();

        events.push(PieceEvent {
            id: nonempty(row.id.as_deref())
                .map(str::to_string)
                .unwrap_or_else(|| {
                    format!("{}-{}-{}-{}-{}", part, batch, piece_raw, seq_raw, index)
                }),
            part,
            batch,
            piece: if piece_raw.is_finite() && piece_raw > 0.0 {
                piece_raw
            } else {
                1.0
            },
            operation_seq: if seq_raw.is_finite() && seq_raw > 0.0 {
                seq_raw
            } else {
                1.0
            },
            machine,
            person,
            handle_mode: HandleMode::parse_label(row.handle_mode.as_deref().unwrap_or("")),
            start_ts,
            end_ts,
        });
    }
    events.sort_by_key(|event| (event.start_ts, event.end_ts));
    events
}

fn ranges_overlap(a_start: i64, a_end: i64, b_start: i64, b_end: i64) -> bool {
    a_start < b_end && b_start < a_end
}

/// 按首次出现顺序分组, 保证问题输出顺序确定
fn group_in_order<'a>(
    events: &'a [PieceEvent],
    key_of: impl Fn(&PieceEvent) -> String,
) -> Vec<(String, Vec<&'a PieceEvent>)> {
    let mut groups: Vec<(String, Vec<&PieceEvent>)> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();
    for event in events {
        let key = key_of(event);
        match index_by_key.get(&key) {
            Some(&index) => groups[index].1.push(event),
            None => {
                index_by_key.insert(key.clone(), groups.len());
                groups.push((key, vec![event]));
            }
        }
    }
    groups
}

// ==========================================
// 问题收集
// ==========================================

struct IssueSink {
    issues: Vec<VerificationIssue>,
    seen: HashSet<String>,
    is_valid: bool,
}

impl IssueSink {
    fn new() -> Self {
        IssueSink {
            issues: Vec::new(),
            seen: HashSet::new(),
            is_valid: true,
        }
    }

    fn push(&mut self, issue: VerificationIssue) {
        let key = format!(
            "{}|{}|{}|{}|{}",
            issue.code,
            issue.entity_id.as_deref().unwrap_or(""),
            ts_key(issue.start_ts),
            ts_key(issue.end_ts),
            issue.message
        );
        if !self.seen.insert(key) {
            return;
        }
        if issue.severity == IssueSeverity::Critical {
            self.is_valid = false;
        }
        self.issues.push(issue);
    }
}

fn ts_key(ts: Option<i64>) -> String {
    match ts {
        Some(value) if value != 0 => value.to_string(),
        _ => String::new(),
    }
}

// ==========================================
// 核验主流程
// ==========================================

/// 核验一份逐件时刻
///
/// # 检查项
/// - 机台重叠: 同机台按开始时间相邻两两扫描
/// - 工序先后: 同一件 (part|batch|piece) 内, 后序事件的工序号不大于前序
///   却又在前序结束前开始
/// - 人员容量: 事件端点切分子窗口, 活跃数 ≥2 时查 single 独占与容量超限
pub fn verify_piece_flow(timeline: &[RawTimelineRow]) -> VerificationReport {
    let events = build_event_pipeline(timeline);
    debug!(input = timeline.len(), events = events.len(), "逐件核验开始");
    let mut sink = IssueSink::new();

    for (machine, machine_events) in group_in_order(&events, |event| event.machine.clone()) {
        let mut sorted = machine_events;
        sorted.sort_by_key(|event| event.start_ts);
        for pair in sorted.windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            if !ranges_overlap(prev.start_ts, prev.end_ts, curr.start_ts, curr.end_ts) {
                continue;
            }
            sink.push(VerificationIssue {
                id: format!("MACH_OVERLAP_{}_{}", prev.id, curr.id),
                code: VerificationCode::MachineOverlap,
                severity: IssueSeverity::Critical,
                message: format!(
                    "Overlap on {}: {}/{}/P{}/OP{} with {}/{}/P{}/OP{}.",
                    machine,
                    prev.part,
                    prev.batch,
                    prev.piece,
                    prev.operation_seq,
                    curr.part,
                    curr.batch,
                    curr.piece,
                    curr.operation_seq
                ),
                entity_id: Some(machine.clone()),
                start_ts: Some(curr.start_ts),
                end_ts: Some(prev.end_ts),
            });
        }
    }

    let piece_key = |event: &PieceEvent| format!("{}|{}|{}", event.part, event.batch, event.piece);
    for (key, piece_events) in group_in_order(&events, piece_key) {
        let mut sorted = piece_events;
        sorted.sort_by(|a, b| {
            a.operation_seq
                .partial_cmp(&b.operation_seq)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.start_ts.cmp(&b.start_ts))
        });
        for pair in sorted.windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            if curr.operation_seq <= prev.operation_seq && curr.start_ts < prev.end_ts {
                sink.push(VerificationIssue {
                    id: format!("PRECEDENCE_{}_{}", prev.id, curr.id),
                    code: VerificationCode::PrecedenceViolation,
                    severity: IssueSeverity::Critical,
                    message: format!(
                        "Precedence violation for {}: OP{} starts before prior operation completion.",
                        key, curr.operation_seq
                    ),
                    entity_id: Some(key.clone()),
                    start_ts: Some(curr.start_ts),
                    end_ts: Some(prev.end_ts),
                });
            }
        }
    }

    for (person, person_events) in group_in_order(&events, |event| event.person.clone()) {
        if person_events.len() < 2 {
            continue;
        }
        let mut points: Vec<i64> = person_events
            .iter()
            .flat_map(|event| [event.start_ts, event.end_ts])
            .collect();
        points.sort_unstable();
        points.dedup();

        for pair in points.windows(2) {
            let (window_start, window_end) = (pair[0], pair[1]);
            let active: Vec<&&PieceEvent> = person_events
                .iter()
                .filter(|event| {
                    ranges_overlap(event.start_ts, event.end_ts, window_start, window_end)
                })
                .collect();
            if active.len() <= 1 {
                continue;
            }

            let has_single = active
                .iter()
                .any(|event| event.handle_mode == HandleMode::Single);
            let units: u32 = active.iter().map(|event| event.handle_mode.run_units()).sum();

            if has_single {
                sink.push(VerificationIssue {
                    id: format!("PERSON_SINGLE_{}_{}", person, window_start),
                    code: VerificationCode::PersonSingleModeOverlap,
                    severity: IssueSeverity::Critical,
                    message: format!(
                        "{} has SINGLE MACHINE run overlapping another run.",
                        person
                    ),
                    entity_id: Some(person.clone()),
                    start_ts: Some(window_start),
                    end_ts: Some(window_end),
                });
            }

            if units > defaults::PERSON_RUN_CAPACITY_UNITS {
                sink.push(VerificationIssue {
                    id: format!("PERSON_CAPACITY_{}_{}", person, window_start),
                    code: VerificationCode::PersonRunCapacityExceeded,
                    severity: IssueSeverity::Critical,
                    message: format!(
                        "{} run capacity exceeded (used {}, max {}).",
                        person,
                        units,
                        defaults::PERSON_RUN_CAPACITY_UNITS
                    ),
                    entity_id: Some(person.clone()),
                    start_ts: Some(window_start),
                    end_ts: Some(window_end),
                });
            }
        }
    }

    VerificationReport {
        is_valid: sink.is_valid,
        issues: sink.issues,
    }
}
