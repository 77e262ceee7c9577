// ==========================================
// 完整排产流程端到端测试
// ==========================================
// 职责: 验证 订单+工艺+人员 → 排产 → 逐件时刻 → 核验 的完整数据流
// 场景: 三种分批模式、优先级派单、故障改线、假日顺延、档位模式
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use machining_aps::api::plan_workbook_sheets;
use machining_aps::domain::{
    MasterOperationRow, RawTimelineRow, ScheduleSettings, SchedulingOrder, SkipReason,
};
use machining_aps::{
    build_piece_flow_rows, verify_piece_flow, DeterministicScheduler, ProfileMode, RowStatus,
};
use serde_json::json;
use std::collections::{HashMap, HashSet};

// ==========================================
// 测试辅助函数
// ==========================================

fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn now() -> NaiveDateTime {
    at(2, 0, 0)
}

/// 创建一行工艺主数据
fn create_master_row(
    part: &str,
    seq: u32,
    name: &str,
    setup: u32,
    cycle: u32,
    min_batch: u32,
    machines: &str,
) -> MasterOperationRow {
    serde_json::from_value(json!({
        "PartNumber": part,
        "OperationSeq": seq,
        "OperationName": name,
        "SetupTime_Min": setup,
        "CycleTime_Min": cycle,
        "Minimum_BatchSize": min_batch,
        "EligibleMachines": machines,
        "HandleMachines": "SINGLE MACHINE",
    }))
    .unwrap()
}

/// 创建一条订单
fn create_order(id: &str, part: &str, qty: u32, seq: &str) -> SchedulingOrder {
    serde_json::from_value(json!({
        "id": id,
        "partNumber": part,
        "orderQuantity": qty,
        "operationSeq": seq,
    }))
    .unwrap()
}

/// 标准设置: 锚点 2026-03-02 06:00, 调机窗 06:00-22:00, 全天生产窗
fn create_settings() -> ScheduleSettings {
    create_settings_with_personnel(json!([
        { "uid": "23", "name": "Kannan", "sourceSection": "setup", "levelUp": 1 },
        { "uid": "31", "name": "Sivakumar C", "sourceSection": "production", "levelUp": 1 }
    ]))
}

/// 同标准设置, 人员清单由调用方给定
fn create_settings_with_personnel(personnel: serde_json::Value) -> ScheduleSettings {
    serde_json::from_value(json!({
        "globalStartDateTime": "2026-03-02T06:00:00",
        "globalSetupWindow": "06:00-22:00",
        "productionWindowShift1": "00:00-23:59",
        "personnelProfiles": personnel,
    }))
    .unwrap()
}

/// 三种分批模式混排的繁忙场景, 每次调用都重新构造全部输入
fn busy_inputs() -> (Vec<MasterOperationRow>, Vec<SchedulingOrder>, ScheduleSettings) {
    let master = vec![
        create_master_row("PN1001", 1, "Turning", 20, 2, 10, "VMC 1,VMC 2"),
        create_master_row("PN2002", 1, "Milling", 15, 1, 10, "VMC 2"),
        create_master_row("PN3003", 1, "Drilling", 10, 1, 100, "VMC 1,VMC 2"),
    ];

    let mut auto = create_order("A", "PN3003", 300, "1");
    auto.batch_mode = Some("auto-split".to_string());
    let mut custom = create_order("B", "PN2002", 200, "1");
    custom.batch_mode = Some("custom-batch-size".to_string());
    custom.custom_batch_size = Some(70.0);
    let mut single = create_order("C", "PN1001", 50, "1");
    single.batch_mode = Some("single-batch".to_string());

    (master, vec![auto, custom, single], create_settings())
}

// ==========================================
// 测试1: 整单一批的完整链路
// ==========================================
#[test]
fn test_e2e_single_batch_full_chain() {
    let scheduler = DeterministicScheduler::new(vec![create_master_row(
        "PN1001", 1, "Turning", 20, 2, 10, "VMC 1,VMC 2",
    )]);
    let mut order = create_order("SO-1", "PN1001", 20, "1");
    order.batch_mode = Some("single-batch".to_string());

    let outcome = scheduler.run_schedule(&[order], &create_settings(), now());

    assert!(outcome.is_fully_scheduled());
    assert_eq!(outcome.rows.len(), 1);
    let row = &outcome.rows[0];
    assert_eq!(row.id, "SO-1-B01-op-1");
    assert_eq!(row.order_qty, 20);
    assert_eq!(row.batch_qty, 20);
    assert_eq!(row.machine, "VMC 1");
    assert_eq!(row.setup_person_name, "Kannan");
    assert_eq!(row.production_person_name, "Kannan");
    assert_eq!(row.person, row.production_person_name);
    assert_eq!(row.setup_start, at(2, 6, 0));
    assert_eq!(row.setup_end, at(2, 6, 20));
    assert_eq!(row.run_start, at(2, 6, 20));
    assert_eq!(row.run_end, at(2, 7, 0));
    assert_eq!(row.timing, "1H 0M");
    assert_eq!(row.status, RowStatus::Scheduled);

    // 逐件时刻: 20 件, 每件 2 分钟, 首尾对齐批次运行区间
    assert_eq!(outcome.piece_timeline.len(), 20);
    assert_eq!(outcome.piece_timeline[0].piece, 1);
    assert_eq!(outcome.piece_timeline[0].run_start, at(2, 6, 20));
    assert_eq!(outcome.piece_timeline[0].run_end, at(2, 6, 22));
    assert_eq!(outcome.piece_timeline[19].run_end, at(2, 7, 0));

    // 有逐件时刻时走精确回放路径
    let flow = build_piece_flow_rows(&outcome);
    assert!(!flow.is_approximate);
    assert_eq!(flow.rows.len(), 20);
    assert_eq!(flow.rows[0].id, "PN1001-B01-op1-p1");
    assert_eq!(flow.rows[0].machine, "VMC 1");
}

// ==========================================
// 测试2: 无专职调机工时 level-up 操作工顶上
// ==========================================
#[test]
fn test_e2e_setup_falls_back_to_level_up_person() {
    let scheduler = DeterministicScheduler::new(vec![create_master_row(
        "PN1001", 1, "Turning", 20, 2, 10, "VMC 1,VMC 2",
    )]);
    let mut order = create_order("SO-1", "PN1001", 5, "1");
    order.batch_mode = Some("single-batch".to_string());
    let settings = create_settings_with_personnel(json!([
        { "uid": "31", "name": "Sivakumar C", "sourceSection": "production", "levelUp": 1 },
        { "uid": "45", "name": "Employee 45", "sourceSection": "production", "levelUp": 0 }
    ]));

    let outcome = scheduler.run_schedule(&[order], &settings, now());

    assert_eq!(outcome.rows.len(), 1);
    assert_eq!(outcome.rows[0].setup_person_name, "Sivakumar C");

    // level-up 0 的人永远不做调机
    let roster: HashSet<&str> = ["Sivakumar C", "Employee 45"].into_iter().collect();
    for row in &outcome.rows {
        assert_ne!(row.setup_person_name, "Employee 45");
        assert!(roster.contains(row.production_person_name.as_str()));
    }
}

// ==========================================
// 测试3: 三种分批模式下的数量守恒
// ==========================================
#[test]
fn test_e2e_quantity_conserved_across_batch_modes() {
    let (master, orders, settings) = busy_inputs();
    let outcome = DeterministicScheduler::new(master).run_schedule(&orders, &settings, now());

    assert!(outcome.is_fully_scheduled());

    let mut qty_by_part: HashMap<&str, u32> = HashMap::new();
    for row in &outcome.rows {
        *qty_by_part.entry(row.part_number.as_str()).or_default() += row.batch_qty;
    }
    assert_eq!(qty_by_part["PN3003"], 300);
    assert_eq!(qty_by_part["PN2002"], 200);
    assert_eq!(qty_by_part["PN1001"], 50);

    // 自动分批: 两泳道均分; 固定批量 70: 余数 60 放最后一批
    let auto_batches: Vec<u32> = outcome
        .rows
        .iter()
        .filter(|r| r.part_number == "PN3003")
        .map(|r| r.batch_qty)
        .collect();
    assert_eq!(auto_batches, vec![150, 150]);
    let custom_batches: Vec<u32> = outcome
        .rows
        .iter()
        .filter(|r| r.part_number == "PN2002")
        .map(|r| r.batch_qty)
        .collect();
    assert_eq!(custom_batches, vec![70, 70, 60]);

    // 每批的逐件行数与批量一致
    let mut pieces_by_batch: HashMap<(String, String), u32> = HashMap::new();
    for piece in &outcome.piece_timeline {
        *pieces_by_batch
            .entry((piece.part_number.clone(), piece.batch_id.clone()))
            .or_default() += 1;
    }
    for row in &outcome.rows {
        let key = (row.part_number.clone(), row.batch_id.clone());
        assert_eq!(pieces_by_batch[&key], row.batch_qty, "批 {} 件数不符", row.batch_id);
    }
}

// ==========================================
// 测试4: 自动分批尊重最小批量下限
// ==========================================
#[test]
fn test_e2e_auto_split_respects_minimum_batch() {
    // 300 件、最小批量 200: 拆两批会低于下限, 只能整单一批
    let scheduler = DeterministicScheduler::new(vec![create_master_row(
        "PN1001", 1, "Turning", 10, 1, 200, "VMC 1,VMC 2",
    )]);
    let order = create_order("A", "PN1001", 300, "1");
    let outcome = scheduler.run_schedule(&[order], &create_settings(), now());
    assert_eq!(outcome.rows.len(), 1);
    assert_eq!(outcome.rows[0].batch_qty, 300);

    // 最小批量 100: 双机就绪, 两泳道各 150
    let scheduler = DeterministicScheduler::new(vec![create_master_row(
        "PN1001", 1, "Turning", 10, 1, 100, "VMC 1,VMC 2",
    )]);
    let order = create_order("A", "PN1001", 300, "1");
    let outcome = scheduler.run_schedule(&[order], &create_settings(), now());
    assert_eq!(outcome.rows.len(), 2);
    let batches: Vec<u32> = outcome.rows.iter().map(|r| r.batch_qty).collect();
    assert_eq!(batches, vec![150, 150]);
    assert_eq!(outcome.rows[0].machine, "VMC 1");
    assert_eq!(outcome.rows[1].machine, "VMC 2");
}

// ==========================================
// 测试5: 人员姓名全部来自档案
// ==========================================
#[test]
fn test_e2e_personnel_names_are_real_everywhere() {
    let (master, orders, settings) = busy_inputs();
    let outcome = DeterministicScheduler::new(master).run_schedule(&orders, &settings, now());

    let roster: HashSet<&str> = ["Kannan", "Sivakumar C"].into_iter().collect();
    for row in &outcome.rows {
        assert!(
            roster.contains(row.setup_person_name.as_str()),
            "调机人必须来自人员档案: {}",
            row.setup_person_name
        );
        assert!(roster.contains(row.production_person_name.as_str()));
        assert_eq!(row.person, row.production_person_name);
    }
    for piece in &outcome.piece_timeline {
        assert!(roster.contains(piece.person.as_str()));
    }
}

// ==========================================
// 测试6: 机台指派不越出可用清单
// ==========================================
#[test]
fn test_e2e_machine_assignment_stays_eligible() {
    let (master, orders, settings) = busy_inputs();
    let outcome = DeterministicScheduler::new(master).run_schedule(&orders, &settings, now());

    let mut eligible: HashMap<&str, HashSet<&str>> = HashMap::new();
    eligible.insert("PN1001", ["VMC 1", "VMC 2"].into_iter().collect());
    eligible.insert("PN2002", ["VMC 2"].into_iter().collect());
    eligible.insert("PN3003", ["VMC 1", "VMC 2"].into_iter().collect());

    for row in &outcome.rows {
        assert!(
            eligible[row.part_number.as_str()].contains(row.machine.as_str()),
            "{} 被排到非可用机台 {}",
            row.part_number,
            row.machine
        );
    }
    for piece in &outcome.piece_timeline {
        assert!(eligible[piece.part_number.as_str()].contains(piece.machine.as_str()));
    }
}

// ==========================================
// 测试7: 引擎自产的逐件时刻必须通过核验
// ==========================================
#[test]
fn test_e2e_engine_timeline_passes_verifier() {
    let (master, orders, settings) = busy_inputs();
    let outcome = DeterministicScheduler::new(master).run_schedule(&orders, &settings, now());

    let raw: Vec<RawTimelineRow> = outcome.piece_timeline.iter().map(RawTimelineRow::from).collect();
    let report = verify_piece_flow(&raw);
    assert!(report.is_valid, "核验未通过: {:?}", report.issues);
    assert!(report.issues.is_empty());
}

// ==========================================
// 测试8: 工序 2 逐件等待工序 1 对应件完工
// ==========================================
#[test]
fn test_e2e_second_operation_waits_for_pieces() {
    let scheduler = DeterministicScheduler::new(vec![
        create_master_row("PN4004", 1, "Turning", 10, 3, 10, "VMC 1"),
        create_master_row("PN4004", 2, "Milling", 10, 2, 10, "VMC 2"),
    ]);
    let order = create_order("SO-9", "PN4004", 4, "1,2");

    let outcome = scheduler.run_schedule(&[order], &create_settings(), now());

    assert!(outcome.is_fully_scheduled());
    assert_eq!(outcome.rows.len(), 2);
    let op1 = outcome.rows.iter().find(|r| r.operation_seq == 1).unwrap();
    let op2 = outcome.rows.iter().find(|r| r.operation_seq == 2).unwrap();
    assert_eq!(op1.machine, "VMC 1");
    assert_eq!(op2.machine, "VMC 2");

    let op1_pieces: Vec<_> = outcome
        .piece_timeline
        .iter()
        .filter(|p| p.operation_seq == 1)
        .collect();
    let op2_pieces: Vec<_> = outcome
        .piece_timeline
        .iter()
        .filter(|p| p.operation_seq == 2)
        .collect();
    assert_eq!(op1_pieces.len(), 4);
    assert_eq!(op2_pieces.len(), 4);

    assert!(op2.run_start >= op1_pieces[0].run_end);
    for (upstream, downstream) in op1_pieces.iter().zip(op2_pieces.iter()) {
        assert_eq!(upstream.piece, downstream.piece);
        assert!(
            downstream.run_start >= upstream.run_end,
            "第 {} 件在上游完工前开跑",
            downstream.piece
        );
    }

    let raw: Vec<RawTimelineRow> = outcome.piece_timeline.iter().map(RawTimelineRow::from).collect();
    assert!(verify_piece_flow(&raw).is_valid);
}

// ==========================================
// 测试9: 缺工艺只跳过该订单, 其余照排
// ==========================================
#[test]
fn test_e2e_missing_operation_skips_only_that_order() {
    let scheduler = DeterministicScheduler::new(vec![
        create_master_row("PN1001", 1, "Turning", 10, 1, 10, "VMC 1"),
        create_master_row("PN2002", 1, "Milling", 10, 1, 10, "VMC 2"),
    ]);
    let bad = create_order("A", "PN1001", 5, "1,2");
    let good = create_order("B", "PN2002", 5, "1");

    let outcome = scheduler.run_schedule(&[bad, good], &create_settings(), now());

    assert!(!outcome.is_fully_scheduled());
    assert_eq!(outcome.rows.len(), 1);
    assert_eq!(outcome.rows[0].part_number, "PN2002");

    assert_eq!(outcome.skipped.len(), 1);
    let skipped = &outcome.skipped[0];
    assert_eq!(skipped.order_id, "A");
    assert_eq!(skipped.reason, SkipReason::MissingMasterOperation);
    assert_eq!(skipped.reason.to_string(), "MISSING_MASTER_OPERATION");
    assert_eq!(skipped.status, RowStatus::Skipped);

    // 整单跳过: 被跳订单一件都不产出
    assert!(outcome.piece_timeline.iter().all(|p| p.part_number == "PN2002"));
}

// ==========================================
// 测试10: 人员池为空时上游不可排、下游连带搁置
// ==========================================
#[test]
fn test_e2e_empty_personnel_blocks_downstream() {
    let scheduler = DeterministicScheduler::new(vec![
        create_master_row("PN4004", 1, "Turning", 10, 3, 10, "VMC 1"),
        create_master_row("PN4004", 2, "Milling", 10, 2, 10, "VMC 2"),
    ]);
    let order = create_order("SO-1", "PN4004", 4, "1,2");
    let settings = create_settings_with_personnel(json!([]));

    let outcome = scheduler.run_schedule(&[order], &settings, now());

    assert!(outcome.rows.is_empty());
    assert!(outcome.piece_timeline.is_empty());
    assert_eq!(outcome.skipped.len(), 2);
    assert_eq!(outcome.skipped[0].operation_seq, Some(1));
    assert_eq!(outcome.skipped[0].reason, SkipReason::NoPersonnelAvailable);
    assert_eq!(outcome.skipped[0].status, RowStatus::Unschedulable);
    assert_eq!(outcome.skipped[1].operation_seq, Some(2));
    assert_eq!(outcome.skipped[1].reason, SkipReason::BlockedByUpstream);
}

// ==========================================
// 测试11: 故障机台整链路改线
// ==========================================
#[test]
fn test_e2e_breakdown_diverts_whole_chain() {
    let scheduler = DeterministicScheduler::new(vec![create_master_row(
        "PN1001", 1, "Turning", 20, 2, 10, "VMC 1,VMC 2",
    )]);
    let mut order = create_order("SO-1", "PN1001", 5, "1");
    order.batch_mode = Some("single-batch".to_string());
    let mut settings = create_settings();
    settings.breakdowns = vec![serde_json::from_value(json!({
        "startDateTime": "2026-03-02T00:00:00",
        "endDateTime": "2026-03-03T00:00:00",
        "machines": ["VMC 1"]
    }))
    .unwrap()];

    let outcome = scheduler.run_schedule(&[order], &settings, now());

    assert_eq!(outcome.rows.len(), 1);
    assert_eq!(outcome.rows[0].machine, "VMC 2");
    assert_eq!(outcome.rows[0].setup_start, at(2, 6, 0));
    assert!(outcome.piece_timeline.iter().all(|p| p.machine == "VMC 2"));
}

// ==========================================
// 测试12: 假日把排产推到次日
// ==========================================
#[test]
fn test_e2e_holiday_pushes_whole_day() {
    let scheduler = DeterministicScheduler::new(vec![create_master_row(
        "PN1001", 1, "Turning", 20, 2, 10, "VMC 1,VMC 2",
    )]);
    let mut order = create_order("SO-1", "PN1001", 5, "1");
    order.batch_mode = Some("single-batch".to_string());
    let mut settings = create_settings();
    settings.holidays = vec![serde_json::from_value(json!("2026-03-02")).unwrap()];

    let outcome = scheduler.run_schedule(&[order], &settings, now());

    assert_eq!(outcome.rows.len(), 1);
    assert_eq!(outcome.rows[0].setup_start, at(3, 6, 0));
    assert!(outcome
        .piece_timeline
        .iter()
        .all(|p| p.run_start >= at(3, 0, 0)));
}

// ==========================================
// 测试13: 基础档强制整单一批并精简报表
// ==========================================
#[test]
fn test_e2e_basic_profile_forces_single_batch() {
    let scheduler = DeterministicScheduler::new(vec![create_master_row(
        "PN1001", 1, "Turning", 10, 1, 100, "VMC 1,VMC 2",
    )]);
    let mut order = create_order("A", "PN1001", 300, "1");
    order.batch_mode = Some("auto-split".to_string());
    let mut settings = create_settings();
    settings.profile_mode = Some("basic".to_string());

    let outcome = scheduler.run_schedule(&[order], &settings, now());

    assert_eq!(outcome.rows.len(), 1);
    assert_eq!(outcome.rows[0].batch_qty, 300);

    // 基础档导出省略调机页, 高级档五页齐全
    let mode = ProfileMode::parse_label(settings.profile_mode.as_deref().unwrap_or(""));
    assert_eq!(
        plan_workbook_sheets(mode),
        vec!["Output", "Output_2", "Client_Out", "Fixed_Report"]
    );
    assert_eq!(
        plan_workbook_sheets(ProfileMode::Advanced),
        vec!["Output", "Setup_output", "Output_2", "Client_Out", "Fixed_Report"]
    );
}

// ==========================================
// 测试14: 派单次序 = 优先级 > 交期 > 单号
// ==========================================
#[test]
fn test_e2e_priority_then_due_date_then_id() {
    let scheduler = DeterministicScheduler::new(vec![
        create_master_row("PN1001", 1, "Turning", 10, 1, 10, "VMC 1"),
        create_master_row("PN2002", 1, "Milling", 10, 1, 10, "VMC 1"),
        create_master_row("PN3003", 1, "Drilling", 10, 1, 10, "VMC 1"),
    ]);
    let mut late_due = create_order("X", "PN1001", 2, "1");
    late_due.priority = Some("normal".to_string());
    late_due.due_date = Some("2026-03-05".to_string());
    let mut urgent = create_order("Y", "PN2002", 2, "1");
    urgent.priority = Some("urgent".to_string());
    urgent.due_date = Some("2026-03-09".to_string());
    let mut early_due = create_order("Z", "PN3003", 2, "1");
    early_due.priority = Some("normal".to_string());
    early_due.due_date = Some("2026-03-04".to_string());

    let outcome =
        scheduler.run_schedule(&[late_due, urgent, early_due], &create_settings(), now());

    assert_eq!(outcome.rows.len(), 3);
    let parts: Vec<&str> = outcome.rows.iter().map(|r| r.part_number.as_str()).collect();
    assert_eq!(parts, vec!["PN2002", "PN3003", "PN1001"]);
    assert_eq!(outcome.rows[0].priority, "Urgent");
    assert!(outcome.rows[0].setup_start < outcome.rows[1].setup_start);
    assert!(outcome.rows[1].setup_start < outcome.rows[2].setup_start);
}

// ==========================================
// 测试15: 订单级覆盖改写机台与调机时长
// ==========================================
#[test]
fn test_e2e_order_override_redirects_machine() {
    let scheduler = DeterministicScheduler::new(vec![create_master_row(
        "PN1001", 1, "Turning", 30, 2, 10, "VMC 1,VMC 2",
    )]);
    let mut order = create_order("SO-1", "PN1001", 2, "1");
    order.batch_mode = Some("single-batch".to_string());
    order.operation_details = vec![serde_json::from_value(json!({
        "operationSeq": 1,
        "machine": "VMC 9",
        "setupTimeMin": 5
    }))
    .unwrap()];

    let outcome = scheduler.run_schedule(&[order], &create_settings(), now());

    assert_eq!(outcome.rows.len(), 1);
    let row = &outcome.rows[0];
    assert_eq!(row.machine, "VMC 9");
    assert_eq!(row.setup_start, at(2, 6, 0));
    assert_eq!(row.setup_end, at(2, 6, 5));
}

// ==========================================
// 测试16: 重跑输出逐字节一致
// ==========================================
#[test]
fn test_e2e_reruns_are_byte_identical() {
    let run = || {
        let (master, orders, settings) = busy_inputs();
        let outcome = DeterministicScheduler::new(master).run_schedule(&orders, &settings, now());
        let flow = build_piece_flow_rows(&outcome);
        (
            serde_json::to_string(&outcome).unwrap(),
            serde_json::to_string(&flow.rows).unwrap(),
        )
    };

    let (first_outcome, first_flow) = run();
    let (second_outcome, second_flow) = run();
    assert_eq!(first_outcome, second_outcome);
    assert_eq!(first_flow, second_flow);
}
