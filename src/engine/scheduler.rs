// ==========================================
// 机加工排产系统 - 确定性排产器
// ==========================================
// 职责: 订单排序 → 工序解析 → 分批 → 逐工序放置, 产出批次行/逐件时刻/未排明细
// 红线: 同一输入必须产出字节级相同的结果; 单个订单失败不得中断整场排产
// ==========================================

use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::config::SchedulingTunables;
use crate::domain::{
    BatchMode, HandleMode, MasterOperationRow, OperationSpec, PieceRow, Priority, RowStatus,
    ScheduleOutcome, ScheduleRow, ScheduleSettings, SchedulingOrder, SkipReason, SkippedOperation,
};
use crate::engine::batching::split_batch_quantities;
use crate::engine::calendar::{diff_minutes, parse_flexible_datetime};
use crate::engine::placement::{
    pick_best_machine_and_operator, reserve_person_run, reserve_person_setup, PersonCalendars,
    PlacementRequest,
};
use crate::engine::settings::{parse_machines, parse_settings, DEFAULT_MACHINES};

/// 确定性排产器
///
/// 工艺主数据在构造时注入, 之后不可变。
pub struct DeterministicScheduler {
    master_data: Vec<MasterOperationRow>,
    tunables: SchedulingTunables,
}

impl DeterministicScheduler {
    pub fn new(master_data: Vec<MasterOperationRow>) -> Self {
        Self::with_tunables(master_data, SchedulingTunables::default())
    }

    pub fn with_tunables(master_data: Vec<MasterOperationRow>, tunables: SchedulingTunables) -> Self {
        DeterministicScheduler {
            master_data,
            tunables,
        }
    }

    /// 执行一次完整排产
    ///
    /// # 参数
    /// - orders: 待排订单(入参顺序无关, 内部按派发序重排)
    /// - settings: 原始排产设置
    /// - now: 当前时刻, 仅在设置缺少锚点时用于推导默认起点
    ///
    /// # 规则
    /// - 同批次工序严格升序执行, 上游未排下则后续工序连带搁置
    /// - 缺工艺工序的订单整单跳过, 其余订单不受影响
    pub fn run_schedule(
        &self,
        orders: &[SchedulingOrder],
        settings: &ScheduleSettings,
        now: NaiveDateTime,
    ) -> ScheduleOutcome {
        let parsed = parse_settings(settings, now);
        let mut machine_next_free: HashMap<String, NaiveDateTime> = HashMap::new();
        let mut person_calendars = PersonCalendars::new();
        for person in &parsed.personnel {
            person_calendars.entry(person.name.clone()).or_default();
        }

        info!(
            orders = orders.len(),
            personnel = parsed.personnel.len(),
            global_start = %parsed.global_start,
            "开始排产"
        );

        let mut outcome = ScheduleOutcome::default();
        let mut ordered: Vec<&SchedulingOrder> = orders.iter().collect();
        ordered.sort_by(|a, b| compare_orders(a, b));
        let order_start_overrides = build_order_start_overrides(orders, parsed.global_start);
        let mut global_batch_counter: u32 = 1;

        for order in ordered {
            let part_number = order
                .part_number
                .as_deref()
                .unwrap_or("")
                .trim()
                .to_string();
            if part_number.is_empty() {
                debug!("订单缺件号, 忽略");
                continue;
            }
            let order_id = order.id.clone().unwrap_or_default();

            let order_qty = resolve_order_quantity(order);
            let requested_seqs = parse_operation_seq(order.operation_seq.as_deref());
            let (operation_specs, missing_seqs) =
                self.resolve_operation_specs(&part_number, &requested_seqs, order);

            if !missing_seqs.is_empty() {
                for seq in &missing_seqs {
                    warn!(part = %part_number, seq, "工艺主数据缺工序且订单无覆盖, 整单跳过");
                    outcome.skipped.push(SkippedOperation {
                        order_id: order_id.clone(),
                        part_number: part_number.clone(),
                        batch_id: None,
                        operation_seq: Some(*seq),
                        operation_name: None,
                        reason: SkipReason::MissingMasterOperation,
                        detail: format!(
                            "No master row or order override for OP{} of {}.",
                            seq, part_number
                        ),
                        status: RowStatus::Skipped,
                    });
                }
                continue;
            }
            if operation_specs.is_empty() {
                continue;
            }

            let order_start = order
                .id
                .as_deref()
                .and_then(|id| order_start_overrides.get(id))
                .copied()
                .unwrap_or(parsed.global_start);
            let batch_mode =
                BatchMode::parse_label(order.batch_mode.as_deref().unwrap_or("auto-split"));
            let custom_batch_size = order
                .custom_batch_size
                .filter(|v| v.is_finite() && *v > 0.0)
                .map(|v| v.round() as u32)
                .unwrap_or(0);

            let batch_quantities = split_batch_quantities(
                order_qty,
                batch_mode,
                custom_batch_size,
                parsed.profile_mode,
                &operation_specs,
                order_start,
                &machine_next_free,
                &self.tunables,
            );
            let due_date = order.due_date.as_deref().and_then(parse_flexible_datetime);
            let priority_label = to_priority_label(order.priority.as_deref());

            let batch_ids: Vec<String> = batch_quantities
                .iter()
                .map(|_| {
                    let batch_id = format!("B{:02}", global_batch_counter);
                    global_batch_counter += 1;
                    batch_id
                })
                .collect();

            debug!(
                part = %part_number,
                qty = order_qty,
                batches = batch_quantities.len(),
                operations = operation_specs.len(),
                "订单分批完成"
            );

            let mut upstream_completions: HashMap<String, Vec<NaiveDateTime>> = HashMap::new();
            let mut previous_machine: HashMap<String, String> = HashMap::new();
            let mut blocked_batches: HashSet<String> = HashSet::new();
            for (batch_index, batch_qty) in batch_quantities.iter().enumerate() {
                upstream_completions.insert(
                    batch_ids[batch_index].clone(),
                    vec![order_start; (*batch_qty).max(1) as usize],
                );
            }

            for operation in &operation_specs {
                let mut next_completions: HashMap<String, Vec<NaiveDateTime>> = HashMap::new();

                for (batch_index, batch_qty) in batch_quantities.iter().enumerate() {
                    let batch_id = &batch_ids[batch_index];

                    if blocked_batches.contains(batch_id) {
                        outcome.skipped.push(SkippedOperation {
                            order_id: order_id.clone(),
                            part_number: part_number.clone(),
                            batch_id: Some(batch_id.clone()),
                            operation_seq: Some(operation.operation_seq),
                            operation_name: Some(operation.operation_name.clone()),
                            reason: SkipReason::BlockedByUpstream,
                            detail: format!(
                                "Upstream operation of {}/{} is unschedulable.",
                                part_number, batch_id
                            ),
                            status: RowStatus::Unschedulable,
                        });
                        continue;
                    }

                    let arrivals = upstream_completions
                        .get(batch_id)
                        .cloned()
                        .unwrap_or_else(|| vec![order_start; (*batch_qty).max(1) as usize]);
                    let predecessor_ready = arrivals.first().copied().unwrap_or(order_start);
                    let prev_machine = previous_machine.get(batch_id).map(String::as_str);

                    let request = PlacementRequest {
                        operation,
                        order_start,
                        predecessor_ready,
                        arrivals: &arrivals,
                        prev_machine,
                    };
                    let candidate = match pick_best_machine_and_operator(
                        &request,
                        &parsed,
                        &machine_next_free,
                        &person_calendars,
                        &self.tunables,
                    ) {
                        Some(candidate) => candidate,
                        None => {
                            let (reason, detail) = if parsed.personnel.is_empty() {
                                (
                                    SkipReason::NoPersonnelAvailable,
                                    format!(
                                        "No personnel profiles available to place OP{} of {}/{}.",
                                        operation.operation_seq, part_number, batch_id
                                    ),
                                )
                            } else {
                                (
                                    SkipReason::NoFeasiblePlacement,
                                    format!(
                                        "No machine/person combination can place OP{} of {}/{} within the search window.",
                                        operation.operation_seq, part_number, batch_id
                                    ),
                                )
                            };
                            warn!(
                                part = %part_number,
                                batch = %batch_id,
                                seq = operation.operation_seq,
                                reason = %reason,
                                "工序不可排, 封锁该批次后续工序"
                            );
                            outcome.skipped.push(SkippedOperation {
                                order_id: order_id.clone(),
                                part_number: part_number.clone(),
                                batch_id: Some(batch_id.clone()),
                                operation_seq: Some(operation.operation_seq),
                                operation_name: Some(operation.operation_name.clone()),
                                reason,
                                detail,
                                status: RowStatus::Unschedulable,
                            });
                            blocked_batches.insert(batch_id.clone());
                            continue;
                        }
                    };

                    machine_next_free.insert(candidate.machine.clone(), candidate.run_end);
                    let reservation_ref =
                        format!("{}/{}/OP{}", part_number, batch_id, operation.operation_seq);
                    reserve_person_setup(
                        &mut person_calendars,
                        &candidate.setup_person,
                        candidate.setup_start,
                        candidate.setup_end,
                        &reservation_ref,
                    );
                    reserve_person_run(
                        &mut person_calendars,
                        &candidate.production_person,
                        candidate.run_start,
                        candidate.run_end,
                        operation.handle_mode,
                        &reservation_ref,
                    );

                    let row_order_id = if order_id.is_empty() {
                        format!("{}-{}", part_number, batch_id)
                    } else {
                        order_id.clone()
                    };
                    outcome.rows.push(ScheduleRow {
                        id: format!("{}-{}-op-{}", row_order_id, batch_id, operation.operation_seq),
                        part_number: part_number.clone(),
                        order_qty,
                        priority: priority_label.clone(),
                        batch_id: batch_id.clone(),
                        batch_qty: *batch_qty,
                        operation_seq: operation.operation_seq,
                        operation_name: operation.operation_name.clone(),
                        machine: candidate.machine.clone(),
                        person: candidate.production_person.clone(),
                        setup_person_name: candidate.setup_person.clone(),
                        production_person_name: candidate.production_person.clone(),
                        handle_mode: operation.handle_mode,
                        setup_start: candidate.setup_start,
                        setup_end: candidate.setup_end,
                        run_start: candidate.run_start,
                        run_end: candidate.run_end,
                        timing: format_timing(
                            candidate.setup_start,
                            candidate.run_end,
                            candidate.run_paused_min,
                        ),
                        due_date,
                        status: RowStatus::Scheduled,
                    });

                    for (piece_index, piece_run) in candidate.piece_runs.iter().enumerate() {
                        outcome.piece_timeline.push(PieceRow {
                            part_number: part_number.clone(),
                            batch_id: batch_id.clone(),
                            piece: piece_index as u32 + 1,
                            operation_seq: operation.operation_seq,
                            operation_name: operation.operation_name.clone(),
                            machine: candidate.machine.clone(),
                            person: candidate.production_person.clone(),
                            handle_mode: operation.handle_mode,
                            run_start: piece_run.start,
                            run_end: piece_run.end,
                            status: RowStatus::Scheduled,
                        });
                    }

                    next_completions.insert(batch_id.clone(), candidate.piece_completions);
                    previous_machine.insert(batch_id.clone(), candidate.machine);
                }

                upstream_completions = next_completions;
            }
        }

        info!(
            rows = outcome.rows.len(),
            pieces = outcome.piece_timeline.len(),
            skipped = outcome.skipped.len(),
            "排产完成"
        );
        outcome
    }

    /// 合并订单覆盖与工艺主数据, 返回 (已解析工序, 缺失序号)
    ///
    /// # 规则
    /// - 同序号时订单覆盖优先于工艺主数据
    /// - 既无覆盖也无主数据的序号进入缺失清单, 不再合成默认工序
    fn resolve_operation_specs(
        &self,
        part_number: &str,
        requested_seqs: &[u32],
        order: &SchedulingOrder,
    ) -> (Vec<OperationSpec>, Vec<u32>) {
        let order_ops = resolve_order_operation_details(order);

        let mut part_rows: Vec<&MasterOperationRow> = self
            .master_data
            .iter()
            .filter(|row| row.part_number.as_deref() == Some(part_number))
            .collect();
        part_rows.sort_by(|a, b| {
            let sa = a.operation_seq.unwrap_or(0.0);
            let sb = b.operation_seq.unwrap_or(0.0);
            sa.partial_cmp(&sb).unwrap_or(Ordering::Equal)
        });

        let mut selected: Vec<OperationSpec> = Vec::new();
        let mut missing: Vec<u32> = Vec::new();

        for seq in requested_seqs {
            if let Some(spec) = order_ops.iter().find(|op| op.operation_seq == *seq) {
                selected.push(spec.clone());
                continue;
            }

            let source = part_rows
                .iter()
                .find(|row| row.operation_seq == Some(*seq as f64));
            match source {
                None => missing.push(*seq),
                Some(row) => {
                    selected.push(OperationSpec {
                        operation_seq: *seq,
                        operation_name: row
                            .operation_name
                            .as_deref()
                            .map(str::trim)
                            .filter(|name| !name.is_empty())
                            .map(str::to_string)
                            .unwrap_or_else(|| OperationSpec::fallback_name(*seq)),
                        setup_time_min: clamp_duration_min(row.setup_time_min, 60),
                        cycle_time_min: clamp_duration_min(row.cycle_time_min, 1),
                        minimum_batch_size: clamp_duration_min(row.minimum_batch_size, 200),
                        eligible_machines: parse_machines(
                            row.eligible_machines.as_deref().unwrap_or(""),
                        ),
                        fixed_machine: None,
                        handle_mode: HandleMode::parse_label(
                            row.handle_machines.as_deref().unwrap_or(""),
                        ),
                    });
                }
            }
        }

        selected.sort_by_key(|spec| spec.operation_seq);
        (selected, missing)
    }
}

// ==========================================
// 订单级解析
// ==========================================

/// 订单派发排序: 优先级 → 交期(都有且不同比早; 有交期先于无交期) → id 字典序
pub fn compare_orders(a: &SchedulingOrder, b: &SchedulingOrder) -> Ordering {
    let pa = Priority::parse_label(a.priority.as_deref().unwrap_or("")).dispatch_score();
    let pb = Priority::parse_label(b.priority.as_deref().unwrap_or("")).dispatch_score();
    if pa != pb {
        return pa.cmp(&pb);
    }

    let da = a.due_date.as_deref().and_then(parse_flexible_datetime);
    let db = b.due_date.as_deref().and_then(parse_flexible_datetime);
    match (da, db) {
        (Some(da), Some(db)) if da != db => return da.cmp(&db),
        (Some(_), None) => return Ordering::Less,
        (None, Some(_)) => return Ordering::Greater,
        _ => {}
    }

    a.id.as_deref().unwrap_or("").cmp(b.id.as_deref().unwrap_or(""))
}

/// 每单独立的投产起点: startDateTime 优先, 其次 startDate, 都没有用全局锚点
fn build_order_start_overrides(
    orders: &[SchedulingOrder],
    global_start: NaiveDateTime,
) -> HashMap<String, NaiveDateTime> {
    let mut map = HashMap::new();
    for order in orders {
        let id = order.id.as_deref().unwrap_or("");
        if id.is_empty() {
            continue;
        }
        let start = order
            .start_date_time
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(order.start_date.as_deref())
            .and_then(parse_flexible_datetime)
            .unwrap_or(global_start);
        map.insert(id.to_string(), start);
    }
    map
}

/// 解析 "1,2,3" 形式的工序序号串
///
/// # 规则
/// - 每个逗号段剥离非数字字符后取正整数
/// - 去重保序; 全无有效序号时按 [1] 处理
pub fn parse_operation_seq(raw: Option<&str>) -> Vec<u32> {
    let text = raw.unwrap_or("");
    let mut values: Vec<u32> = Vec::new();
    for token in text.split(',') {
        let digits: String = token.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            continue;
        }
        if let Ok(value) = digits.parse::<u32>() {
            if value > 0 && !values.contains(&value) {
                values.push(value);
            }
        }
    }
    if values.is_empty() {
        vec![1]
    } else {
        values
    }
}

/// 订单级工序覆盖解析, 按序号升序返回
fn resolve_order_operation_details(order: &SchedulingOrder) -> Vec<OperationSpec> {
    let mut specs: Vec<OperationSpec> = order
        .operation_details
        .iter()
        .filter_map(|item| {
            let seq_raw = item.operation_seq?;
            if !seq_raw.is_finite() || seq_raw <= 0.0 || seq_raw.fract() != 0.0 {
                return None;
            }
            let seq = seq_raw as u32;

            let fixed_machine = item
                .fixed_machine
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string);
            let parsed_eligible: Vec<String> = item
                .eligible_machines
                .as_ref()
                .map(|spec| spec.to_machines())
                .unwrap_or_default();
            let eligible_machines = if let Some(fixed) = &fixed_machine {
                vec![fixed.clone()]
            } else if !parsed_eligible.is_empty() {
                parsed_eligible
            } else {
                DEFAULT_MACHINES.iter().map(|m| m.to_string()).collect()
            };

            Some(OperationSpec {
                operation_seq: seq,
                operation_name: item
                    .operation_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| OperationSpec::fallback_name(seq)),
                setup_time_min: clamp_duration_min(item.setup_time_min, 60),
                cycle_time_min: clamp_duration_min(item.cycle_time_min, 1),
                minimum_batch_size: clamp_duration_min(item.minimum_batch_size, 200),
                eligible_machines,
                fixed_machine,
                handle_mode: HandleMode::parse_label(item.handle_mode.as_deref().unwrap_or("")),
            })
        })
        .collect();

    specs.sort_by_key(|spec| spec.operation_seq);
    specs
}

/// 数量钳位: 非法/零取 1
fn resolve_order_quantity(order: &SchedulingOrder) -> u32 {
    let raw = order.order_quantity.unwrap_or(0.0);
    let qty = if raw.is_finite() && raw != 0.0 { raw } else { 1.0 };
    qty.max(1.0).round() as u32
}

/// 时长/批量钳位: 非法/零取缺省值, 上取整到分钟且 ≥1
fn clamp_duration_min(value: Option<f64>, fallback: u32) -> u32 {
    let parsed = match value {
        Some(v) if v.is_finite() && v != 0.0 => v,
        _ => fallback as f64,
    };
    parsed.max(1.0).ceil() as u32
}

/// 展示用优先级标签: 原文首字母大写, 其余小写; 空取 "Normal"
fn to_priority_label(raw: Option<&str>) -> String {
    let text = raw.unwrap_or("").trim();
    let text = if text.is_empty() { "Normal" } else { text };
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => format!("{}{}", first.to_uppercase(), chars.as_str().to_lowercase()),
        None => "Normal".to_string(),
    }
}

// ==========================================
// 历时文本
// ==========================================

/// 分钟数 → "3D 2H 5M" / "2H 5M" / "45M"
pub fn format_duration(minutes: i64) -> String {
    let total = minutes.max(0);
    let days = total / (24 * 60);
    let hours = (total % (24 * 60)) / 60;
    let mins = total % 60;

    if days > 0 {
        format!("{}D {}H {}M", days, hours, mins)
    } else if hours > 0 {
        format!("{}H {}M", hours, mins)
    } else {
        format!("{}M", mins)
    }
}

/// 行历时文本: 调机开始到运行结束的总历时, 有等窗时附注 paused
pub fn format_timing(
    setup_start: NaiveDateTime,
    run_end: NaiveDateTime,
    paused_min: i64,
) -> String {
    let elapsed_text = format_duration(diff_minutes(setup_start, run_end));
    if paused_min <= 0 {
        return elapsed_text;
    }
    format!("{} (paused {})", elapsed_text, format_duration(paused_min))
}
