// ==========================================
// 机加工排产系统 - 分批引擎
// ==========================================
// 职责: 按分批模式把订单数量切成批次数量序列
// 红线: 纯函数, 不落库, 不产生副作用
// ==========================================

use chrono::NaiveDateTime;
use std::collections::HashMap;

use crate::config::SchedulingTunables;
use crate::domain::{BatchMode, OperationSpec, ProfileMode};
use crate::engine::calendar::add_minutes;

/// 机台候选去重(保序, 去空白)
pub fn unique_machines(machines: &[String]) -> Vec<String> {
    let mut ordered: Vec<String> = Vec::new();
    for machine in machines {
        let normalized = machine.trim();
        if normalized.is_empty() || ordered.iter().any(|seen| seen == normalized) {
            continue;
        }
        ordered.push(normalized.to_string());
    }
    ordered
}

/// 工序的机台候选: 指定机台优先, 否则取可用机台列表
pub fn candidate_machines(operation: &OperationSpec) -> Vec<String> {
    match &operation.fixed_machine {
        Some(fixed) => unique_machines(std::slice::from_ref(fixed)),
        None => unique_machines(&operation.eligible_machines),
    }
}

/// 把订单数量切成批次数量序列
///
/// # 规则
/// - basic 档位一律整单单批
/// - single-batch: 整单一批
/// - custom-batch-size(>0): 逐批切 min(batchSize, 剩余), 尾批在最后
/// - 其余(含 auto-split): 按 [`pick_auto_split_lanes`] 分道, 余数从最后一道起逐道 +1
pub fn split_batch_quantities(
    order_qty: u32,
    batch_mode: BatchMode,
    custom_batch_size: u32,
    profile_mode: ProfileMode,
    operations: &[OperationSpec],
    order_start: NaiveDateTime,
    machine_next_free: &HashMap<String, NaiveDateTime>,
    tunables: &SchedulingTunables,
) -> Vec<u32> {
    let min_batch = operations
        .iter()
        .map(|op| op.minimum_batch_size)
        .min()
        .unwrap_or(200)
        .max(1);

    if profile_mode == ProfileMode::Basic || batch_mode == BatchMode::SingleBatch {
        return vec![order_qty];
    }

    if batch_mode == BatchMode::CustomBatchSize && custom_batch_size > 0 {
        let mut quantities: Vec<u32> = Vec::new();
        let mut remaining = order_qty;
        while remaining > 0 {
            let batch_qty = custom_batch_size.min(remaining);
            quantities.push(batch_qty);
            remaining -= batch_qty;
        }
        if quantities.is_empty() {
            return vec![order_qty];
        }
        return quantities;
    }

    let lanes = pick_auto_split_lanes(
        order_qty,
        min_batch,
        operations,
        order_start,
        machine_next_free,
        tunables,
    );
    if lanes <= 1 {
        return vec![order_qty];
    }

    let base_qty = order_qty / lanes;
    let mut quantities = vec![base_qty; lanes as usize];
    let mut remainder = order_qty - base_qty * lanes;
    for index in (0..quantities.len()).rev() {
        if remainder == 0 {
            break;
        }
        quantities[index] += 1;
        remainder -= 1;
    }
    quantities
}

/// 自动分批的并行道数
///
/// # 规则
/// - 首工序缺失或机台候选 ≤1 → 1
/// - 道数上限取 min(auto_split_lane_cap, 候选机台数)
/// - 数量不足 道数上限 × 最小批量 → 1
/// - 两小时内就绪的机台 ≥2 → 2, 否则取道数上限
pub fn pick_auto_split_lanes(
    order_qty: u32,
    min_batch: u32,
    operations: &[OperationSpec],
    order_start: NaiveDateTime,
    machine_next_free: &HashMap<String, NaiveDateTime>,
    tunables: &SchedulingTunables,
) -> u32 {
    let first_op = match operations.first() {
        Some(op) => op,
        None => return 1,
    };

    let machine_candidates = candidate_machines(first_op);
    if machine_candidates.len() <= 1 {
        return 1;
    }

    let max_lanes = tunables
        .auto_split_lane_cap
        .min(machine_candidates.len() as u32);
    if max_lanes <= 1 {
        return 1;
    }
    if (order_qty as u64) < (max_lanes as u64) * (min_batch.max(1) as u64) {
        return 1;
    }

    let ready_deadline = add_minutes(order_start, 120);
    let ready_within_two_hours = machine_candidates
        .iter()
        .filter(|machine| {
            let ready_at = machine_next_free
                .get(machine.as_str())
                .copied()
                .unwrap_or(order_start);
            ready_at <= ready_deadline
        })
        .count();

    if ready_within_two_hours >= 2 {
        return 2;
    }
    max_lanes
}
