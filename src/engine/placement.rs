// ==========================================
// 机加工排产系统 - 放置搜索引擎
// ==========================================
// 职责: 为单个批次工序挑选 机台+调机员+生产员 的最早可行放置
// 红线: 纯函数, 不可行时返回 None, 不抛错不 panic
// ==========================================

use chrono::NaiveDateTime;
use std::collections::HashMap;

use crate::config::SchedulingTunables;
use crate::domain::{HandleMode, OperationSpec};
use crate::engine::batching::candidate_machines;
use crate::engine::calendar::{
    add_minutes, diff_minutes, is_holiday, is_in_breakdown, is_in_window, next_window_entry,
    windows_overlap, TimeWindow,
};
use crate::engine::settings::{Operator, ParsedSettings};

// ==========================================
// 人员预约模型
// ==========================================

/// 预约类型: 调机独占, 运行按容量计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationKind {
    Setup,
    Run,
}

/// 单个人员时间轴上的一段占用
#[derive(Debug, Clone)]
pub struct PersonReservation {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub kind: ReservationKind,
    pub units: u32,
    pub ref_label: String,
    pub handle_mode: HandleMode,
}

/// 人名 → 按开始时间排序的预约列表
pub type PersonCalendars = HashMap<String, Vec<PersonReservation>>;

fn person_key(person: &str) -> String {
    let trimmed = person.trim();
    if trimmed.is_empty() {
        "Unassigned".to_string()
    } else {
        trimmed.to_string()
    }
}

fn person_reservations<'a>(
    calendars: &'a PersonCalendars,
    person: &str,
) -> &'a [PersonReservation] {
    calendars
        .get(&person_key(person))
        .map(|bucket| bucket.as_slice())
        .unwrap_or(&[])
}

/// 登记一段调机占用(独占整个人)
pub fn reserve_person_setup(
    calendars: &mut PersonCalendars,
    person: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
    ref_label: &str,
) {
    let bucket = calendars.entry(person_key(person)).or_default();
    bucket.push(PersonReservation {
        start,
        end,
        kind: ReservationKind::Setup,
        units: 2,
        ref_label: ref_label.to_string(),
        handle_mode: HandleMode::Single,
    });
    bucket.sort_by_key(|res| res.start);
}

/// 登记一段运行占用(single 占满, double 占一半)
pub fn reserve_person_run(
    calendars: &mut PersonCalendars,
    person: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
    handle_mode: HandleMode,
    ref_label: &str,
) {
    let bucket = calendars.entry(person_key(person)).or_default();
    bucket.push(PersonReservation {
        start,
        end,
        kind: ReservationKind::Run,
        units: handle_mode.run_units(),
        ref_label: ref_label.to_string(),
        handle_mode,
    });
    bucket.sort_by_key(|res| res.start);
}

fn person_has_any_reservation_at(
    calendars: &PersonCalendars,
    person: &str,
    at: NaiveDateTime,
) -> bool {
    person_reservations(calendars, person)
        .iter()
        .any(|res| res.start <= at && at < res.end)
}

/// 从 `start` 起跳过所有在途预约, 返回人员下一个空闲时刻
pub fn next_person_availability(
    calendars: &PersonCalendars,
    person: &str,
    start: NaiveDateTime,
) -> NaiveDateTime {
    let reservations = person_reservations(calendars, person);
    let mut cursor = start;
    for _ in 0..2000 {
        let active = reservations
            .iter()
            .find(|res| res.start <= cursor && cursor < res.end);
        match active {
            Some(res) => cursor = res.end,
            None => return cursor,
        }
    }
    cursor
}

/// 检查 [run_start, run_end) 是否撞上人员容量
///
/// # 返回
/// 冲突时给出下一个候选时刻, 无冲突返回 None
///
/// # 规则
/// - 调机预约独占人, 先于运行预约判定
/// - 运行预约按分段中点抽样累加 units, 超过容量上限即冲突
pub fn find_run_reservation_conflict(
    calendars: &PersonCalendars,
    person: &str,
    run_start: NaiveDateTime,
    run_end: NaiveDateTime,
    required_units: u32,
    tunables: &SchedulingTunables,
) -> Option<NaiveDateTime> {
    let overlapping: Vec<&PersonReservation> = person_reservations(calendars, person)
        .iter()
        .filter(|res| res.start < run_end && run_start < res.end)
        .collect();
    if overlapping.is_empty() {
        return None;
    }

    let setup_conflict = overlapping
        .iter()
        .filter(|res| res.kind == ReservationKind::Setup)
        .min_by_key(|res| res.end);
    if let Some(setup) = setup_conflict {
        return Some(setup.end);
    }

    let run_reservations: Vec<&&PersonReservation> = overlapping
        .iter()
        .filter(|res| res.kind == ReservationKind::Run)
        .collect();
    if run_reservations.is_empty() {
        return None;
    }

    let mut points = vec![run_start, run_end];
    for res in &run_reservations {
        points.push(res.start.max(run_start));
        points.push(res.end.min(run_end));
    }
    points.sort();
    points.dedup();

    for pair in points.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let probe = from + (to - from) / 2;
        let mut used_units = 0u32;
        let mut active_ends: Vec<NaiveDateTime> = Vec::new();
        for res in &run_reservations {
            if res.start <= probe && probe < res.end {
                used_units += res.units;
                active_ends.push(res.end);
            }
        }
        if used_units + required_units > tunables.person_run_capacity_units {
            if let Some(earliest_end) = active_ends.into_iter().min() {
                return Some(earliest_end);
            }
        }
    }

    None
}

// ==========================================
// 分钟判定
// ==========================================

/// 调机分钟可用: 调机窗 ∩ 班次窗 ∩ 非节假日 ∩ 机台完好 ∩ 人员空闲
pub fn is_setup_minute_allowed(
    at: NaiveDateTime,
    machine: &str,
    setup_person: &Operator,
    settings: &ParsedSettings,
    calendars: &PersonCalendars,
) -> bool {
    if !is_in_window(at, &settings.setup_window) {
        return false;
    }
    if !is_in_window(at, &setup_person.shift) {
        return false;
    }
    if is_holiday(at, &settings.holiday_intervals) {
        return false;
    }
    if is_in_breakdown(at, machine, &settings.breakdown_by_machine) {
        return false;
    }
    if person_has_any_reservation_at(calendars, &setup_person.name, at) {
        return false;
    }
    true
}

/// 运行分钟可用: 非节假日 ∩ 机台完好 ∩ 落在任一生产窗内
pub fn is_run_minute_allowed(at: NaiveDateTime, machine: &str, settings: &ParsedSettings) -> bool {
    if is_holiday(at, &settings.holiday_intervals) {
        return false;
    }
    if is_in_breakdown(at, machine, &settings.breakdown_by_machine) {
        return false;
    }
    settings
        .production_windows
        .iter()
        .any(|window| is_in_window(at, window))
}

fn next_setup_candidate(
    at: NaiveDateTime,
    setup_window: &TimeWindow,
    shift_window: &TimeWindow,
) -> NaiveDateTime {
    let setup_entry = next_window_entry(at, setup_window);
    let shift_entry = next_window_entry(at, shift_window);
    setup_entry.max(shift_entry)
}

// ==========================================
// 调机放置
// ==========================================

/// 一段连续的调机时隙
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// 从 candidate 起搜索首个能连续容纳 setup_minutes 的调机时隙
///
/// # 规则
/// - 当前分钟不可用时跳到 max(调机窗入口, 班次窗入口), 无进展则 +1 分钟
/// - 搜索推进超过 max_search_minutes 仍无解 → None
pub fn find_contiguous_setup_slot(
    candidate: NaiveDateTime,
    setup_minutes: u32,
    machine: &str,
    setup_person: &Operator,
    settings: &ParsedSettings,
    calendars: &PersonCalendars,
    tunables: &SchedulingTunables,
) -> Option<SetupSlot> {
    let mut cursor = candidate;
    for _ in 0..tunables.max_search_minutes {
        if !is_setup_minute_allowed(cursor, machine, setup_person, settings, calendars) {
            let next_candidate =
                next_setup_candidate(cursor, &settings.setup_window, &setup_person.shift);
            cursor = if next_candidate > cursor {
                next_candidate
            } else {
                add_minutes(cursor, 1)
            };
            continue;
        }

        if can_fit_contiguous_setup(cursor, setup_minutes, machine, setup_person, settings, calendars) {
            return Some(SetupSlot {
                start: cursor,
                end: add_minutes(cursor, setup_minutes as i64),
            });
        }

        cursor = add_minutes(cursor, 1);
    }
    None
}

fn can_fit_contiguous_setup(
    start: NaiveDateTime,
    setup_minutes: u32,
    machine: &str,
    setup_person: &Operator,
    settings: &ParsedSettings,
    calendars: &PersonCalendars,
) -> bool {
    for minute in 0..setup_minutes {
        let current = add_minutes(start, minute as i64);
        if !is_setup_minute_allowed(current, machine, setup_person, settings, calendars) {
            return false;
        }
    }
    true
}

// ==========================================
// 运行放置
// ==========================================

/// 单件的加工区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceRun {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// 逐件推演的结果
#[derive(Debug, Clone)]
pub struct SimulatedRun {
    pub run_start: NaiveDateTime,
    pub run_end: NaiveDateTime,
    pub piece_runs: Vec<PieceRun>,
    pub piece_completions: Vec<NaiveDateTime>,
    pub paused_minutes: i64,
}

/// 逐件推演加工过程
///
/// # 规则
/// - 件到达序列为空时按调机结束时刻投一件
/// - 件只在生产窗内且机台完好时加工, 等窗时间计入 paused
/// - 等待上游来料(到达晚于游标)不计 paused
pub fn simulate_piece_flow(
    setup_end: NaiveDateTime,
    run_ready_at: NaiveDateTime,
    arrivals: &[NaiveDateTime],
    cycle_time_min: u32,
    machine: &str,
    settings: &ParsedSettings,
    tunables: &SchedulingTunables,
) -> Option<SimulatedRun> {
    let fallback_arrivals = [setup_end];
    let piece_arrivals: &[NaiveDateTime] = if arrivals.is_empty() {
        &fallback_arrivals
    } else {
        arrivals
    };

    let mut piece_runs: Vec<PieceRun> = Vec::with_capacity(piece_arrivals.len());
    let mut piece_completions: Vec<NaiveDateTime> = Vec::with_capacity(piece_arrivals.len());
    let mut cursor = setup_end.max(run_ready_at);
    let mut run_start: Option<NaiveDateTime> = None;
    let mut paused_minutes: i64 = 0;

    for arrival in piece_arrivals {
        if *arrival > cursor {
            cursor = *arrival;
        }

        if !is_run_minute_allowed(cursor, machine, settings) {
            let allowed_start = advance_to_next_allowed_run(cursor, machine, settings, tunables)?;
            if *arrival <= cursor {
                paused_minutes += diff_minutes(cursor, allowed_start);
            }
            cursor = allowed_start;
        }

        if run_start.is_none() {
            run_start = Some(cursor);
        }

        let piece_start = cursor;
        let (piece_end, paused) =
            add_run_work_minutes(cursor, cycle_time_min.max(1), machine, settings, tunables)?;
        paused_minutes += paused;
        cursor = piece_end;
        piece_runs.push(PieceRun {
            start: piece_start,
            end: piece_end,
        });
        piece_completions.push(cursor);
    }

    Some(SimulatedRun {
        run_start: run_start.unwrap_or(setup_end),
        run_end: cursor,
        piece_runs,
        piece_completions,
        paused_minutes,
    })
}

/// 从 start 逐分钟消耗 work_minutes 个可用分钟, 返回 (结束时刻, 等窗分钟数)
fn add_run_work_minutes(
    start: NaiveDateTime,
    work_minutes: u32,
    machine: &str,
    settings: &ParsedSettings,
    tunables: &SchedulingTunables,
) -> Option<(NaiveDateTime, i64)> {
    let mut cursor = start;
    let mut remaining = work_minutes.max(1) as i64;
    let mut paused: i64 = 0;
    let max_iterations = work_minutes as i64 + tunables.max_search_minutes as i64;

    for _ in 0..max_iterations {
        if is_run_minute_allowed(cursor, machine, settings) {
            remaining -= 1;
        } else {
            paused += 1;
        }
        cursor = add_minutes(cursor, 1);
        if remaining <= 0 {
            return Some((cursor, paused));
        }
    }
    None
}

fn advance_to_next_allowed_run(
    start: NaiveDateTime,
    machine: &str,
    settings: &ParsedSettings,
    tunables: &SchedulingTunables,
) -> Option<NaiveDateTime> {
    let mut cursor = start;
    for _ in 0..tunables.max_search_minutes {
        if is_run_minute_allowed(cursor, machine, settings) {
            return Some(cursor);
        }
        cursor = add_minutes(cursor, 1);
    }
    None
}

/// 在人员容量约束下找一段可行的运行放置
///
/// # 规则
/// - 每次冲突后把就绪时刻推到 max(就绪+1min, 冲突方空闲时刻) 重试
/// - 重试超过 max_run_placement_attempts 次 → None
pub fn find_feasible_run_reservation(
    setup_end: NaiveDateTime,
    arrivals: &[NaiveDateTime],
    cycle_time_min: u32,
    machine: &str,
    settings: &ParsedSettings,
    calendars: &PersonCalendars,
    production_person: &str,
    handle_mode: HandleMode,
    tunables: &SchedulingTunables,
) -> Option<SimulatedRun> {
    let required_units = handle_mode.run_units();
    let mut run_ready_at = setup_end;

    for _ in 0..tunables.max_run_placement_attempts {
        let simulated = simulate_piece_flow(
            setup_end,
            run_ready_at,
            arrivals,
            cycle_time_min,
            machine,
            settings,
            tunables,
        )?;

        match find_run_reservation_conflict(
            calendars,
            production_person,
            simulated.run_start,
            simulated.run_end,
            required_units,
            tunables,
        ) {
            None => return Some(simulated),
            Some(next_available) => {
                run_ready_at = add_minutes(run_ready_at, 1).max(next_available);
            }
        }
    }

    None
}

// ==========================================
// 最优放置挑选
// ==========================================

/// 单个批次工序的放置请求
#[derive(Debug)]
pub struct PlacementRequest<'a> {
    pub operation: &'a OperationSpec,
    pub order_start: NaiveDateTime,
    pub predecessor_ready: NaiveDateTime,
    pub arrivals: &'a [NaiveDateTime],
    pub prev_machine: Option<&'a str>,
}

/// 选定的放置方案
#[derive(Debug, Clone)]
pub struct PlacedCandidate {
    pub machine: String,
    pub setup_person: String,
    pub production_person: String,
    pub setup_start: NaiveDateTime,
    pub setup_end: NaiveDateTime,
    pub run_start: NaiveDateTime,
    pub run_end: NaiveDateTime,
    pub piece_runs: Vec<PieceRun>,
    pub piece_completions: Vec<NaiveDateTime>,
    pub run_paused_min: i64,
}

struct RankedCandidate {
    machine_rank: usize,
    setup_priority: u32,
    production_priority: u32,
    candidate: PlacedCandidate,
}

/// 遍历 机台 × 调机员 × 生产员, 挑出最优放置
///
/// # 规则
/// - 调机员候选取调机段人员, 空了退全员; 生产员候选取生产段人员(空了退全员)
///   再按名字去重补上调机段人员
/// - 先比 runEnd 早者胜; 平局依次比: 换机台优先(避免霸占上道机台)、
///   调机优先级、生产优先级、setupStart、机台序
/// - 全组合不可行 → None
pub fn pick_best_machine_and_operator(
    request: &PlacementRequest,
    settings: &ParsedSettings,
    machine_next_free: &HashMap<String, NaiveDateTime>,
    calendars: &PersonCalendars,
    tunables: &SchedulingTunables,
) -> Option<PlacedCandidate> {
    let setup_candidates: &[Operator] = if settings.setup_personnel.is_empty() {
        &settings.personnel
    } else {
        &settings.setup_personnel
    };
    let production_primary: &[Operator] = if settings.production_personnel.is_empty() {
        &settings.personnel
    } else {
        &settings.production_personnel
    };

    let mut run_candidates: Vec<&Operator> = production_primary.iter().collect();
    for candidate in &settings.setup_personnel {
        if !run_candidates.iter().any(|seen| seen.name == candidate.name) {
            run_candidates.push(candidate);
        }
    }

    let machines = candidate_machines(request.operation);
    let mut best: Option<RankedCandidate> = None;

    for (machine_rank, machine) in machines.iter().enumerate() {
        let machine_ready = machine_next_free
            .get(machine)
            .copied()
            .unwrap_or(settings.global_start);
        let base_candidate = request
            .order_start
            .max(request.predecessor_ready)
            .max(machine_ready);

        for setup_person in setup_candidates {
            if !windows_overlap(&settings.setup_window, &setup_person.shift) {
                continue;
            }

            let setup_candidate = base_candidate.max(next_person_availability(
                calendars,
                &setup_person.name,
                base_candidate,
            ));
            let setup_slot = match find_contiguous_setup_slot(
                setup_candidate,
                request.operation.setup_time_min,
                machine,
                setup_person,
                settings,
                calendars,
                tunables,
            ) {
                Some(slot) => slot,
                None => continue,
            };

            for production_person in &run_candidates {
                let simulated = match find_feasible_run_reservation(
                    setup_slot.end,
                    request.arrivals,
                    request.operation.cycle_time_min,
                    machine,
                    settings,
                    calendars,
                    &production_person.name,
                    request.operation.handle_mode,
                    tunables,
                ) {
                    Some(simulated) => simulated,
                    None => continue,
                };

                let current = RankedCandidate {
                    machine_rank,
                    setup_priority: setup_person.setup_priority,
                    production_priority: production_person.setup_priority,
                    candidate: PlacedCandidate {
                        machine: machine.clone(),
                        setup_person: setup_person.name.clone(),
                        production_person: production_person.name.clone(),
                        setup_start: setup_slot.start,
                        setup_end: setup_slot.end,
                        run_start: simulated.run_start,
                        run_end: simulated.run_end,
                        piece_runs: simulated.piece_runs,
                        piece_completions: simulated.piece_completions,
                        run_paused_min: simulated.paused_minutes,
                    },
                };

                best = Some(match best.take() {
                    None => current,
                    Some(incumbent) => prefer_candidate(incumbent, current, request.prev_machine),
                });
            }
        }
    }

    best.map(|ranked| ranked.candidate)
}

fn prefer_candidate(
    best: RankedCandidate,
    current: RankedCandidate,
    prev_machine: Option<&str>,
) -> RankedCandidate {
    if current.candidate.run_end < best.candidate.run_end {
        return current;
    }
    if current.candidate.run_end == best.candidate.run_end {
        if let Some(prev) = prev_machine {
            if best.candidate.machine == prev && current.candidate.machine != prev {
                return current;
            }
        }
        if current.setup_priority < best.setup_priority {
            return current;
        }
        if current.setup_priority == best.setup_priority
            && current.production_priority < best.production_priority
        {
            return current;
        }
        if current.candidate.setup_start < best.candidate.setup_start {
            return current;
        }
        if current.candidate.setup_start == best.candidate.setup_start
            && current.machine_rank < best.machine_rank
        {
            return current;
        }
    }
    best
}
