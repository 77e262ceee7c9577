// ==========================================
// 机加工排产系统 - 命令行主入口
// ==========================================
// 用法: machining-aps <orders.json> <settings.json>
//           [--master <master.xlsx|csv>] [--personnel <file>] [--out <rows.json>]
// 职责: 装载输入 → 执行排产 → 件流校验 → 写出结果 JSON
// ==========================================

use anyhow::Context;
use machining_aps::api::alerts::format_import_failure_alert;
use machining_aps::domain::settings::PersonnelInputRow;
use machining_aps::domain::{
    MasterOperationRow, RawTimelineRow, ScheduleSettings, SchedulingOrder,
};
use machining_aps::engine::verify_piece_flow;
use machining_aps::importer::{load_master_operations, parse_personnel_profiles_from_file};
use machining_aps::{DeterministicScheduler, SchedulingTunables};
use std::fs;
use std::path::PathBuf;

const USAGE: &str = "用法: machining-aps <orders.json> <settings.json> \
[--master <master.xlsx|csv>] [--personnel <file>] [--out <rows.json>]";

fn main() -> anyhow::Result<()> {
    machining_aps::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} - 确定性排产内核", machining_aps::APP_NAME);
    tracing::info!("系统版本: {}", machining_aps::VERSION);
    tracing::info!("==================================================");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut positional: Vec<String> = Vec::new();
    let mut master_path: Option<PathBuf> = None;
    let mut personnel_path: Option<PathBuf> = None;
    let mut out_path: Option<PathBuf> = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--master" => master_path = iter.next().map(PathBuf::from),
            "--personnel" => personnel_path = iter.next().map(PathBuf::from),
            "--out" => out_path = iter.next().map(PathBuf::from),
            _ => positional.push(arg.clone()),
        }
    }

    if positional.len() != 2 {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    }

    // 订单与设置
    let orders_text = fs::read_to_string(&positional[0])
        .with_context(|| format!("读取订单文件失败: {}", positional[0]))?;
    let orders: Vec<SchedulingOrder> =
        serde_json::from_str(&orders_text).context("订单 JSON 解析失败")?;

    let settings_text = fs::read_to_string(&positional[1])
        .with_context(|| format!("读取设置文件失败: {}", positional[1]))?;
    let mut settings: ScheduleSettings =
        serde_json::from_str(&settings_text).context("设置 JSON 解析失败")?;

    // 工艺主数据: 外部文件优先, 设置内嵌行垫后
    let mut master_rows: Vec<MasterOperationRow> = Vec::new();
    if let Some(path) = &master_path {
        match load_master_operations(path) {
            Ok(rows) => master_rows = rows,
            Err(err) => {
                tracing::error!("{}", format_import_failure_alert(Some(&err)));
                return Err(err.into());
            }
        }
    }
    master_rows.extend(std::mem::take(&mut settings.master_operations));

    // 人员档案: 给定文件时整体替换设置里的人员清单
    if let Some(path) = &personnel_path {
        match parse_personnel_profiles_from_file(path) {
            Ok(parsed) => {
                for issue in &parsed.issues {
                    tracing::warn!(code = %issue.code, row = issue.row, "{}", issue.message);
                }
                settings.personnel_profiles = parsed
                    .profiles
                    .iter()
                    .map(PersonnelInputRow::from)
                    .collect();
            }
            Err(err) => {
                tracing::error!("{}", format_import_failure_alert(Some(&err)));
                return Err(err.into());
            }
        }
    }

    // 排产(参数文件缺失时用默认值)
    let scheduler = DeterministicScheduler::with_tunables(master_rows, SchedulingTunables::load());
    let now = chrono::Local::now().naive_local();
    let outcome = scheduler.run_schedule(&orders, &settings, now);

    // 件流校验(咨询性, 不阻断输出)
    let timeline: Vec<RawTimelineRow> = outcome.piece_timeline.iter().map(RawTimelineRow::from).collect();
    let report = verify_piece_flow(&timeline);
    for issue in &report.issues {
        tracing::warn!(code = %issue.code, "{}", issue.message);
    }

    tracing::info!(
        rows = outcome.rows.len(),
        pieces = outcome.piece_timeline.len(),
        skipped = outcome.skipped.len(),
        verification_issues = report.issues.len(),
        verification_valid = report.is_valid,
        "排产结束"
    );

    // 写出结果
    let out = out_path.unwrap_or_else(|| PathBuf::from("schedule_rows.json"));
    let json = serde_json::to_string_pretty(&outcome).context("排产结果序列化失败")?;
    fs::write(&out, json).with_context(|| format!("写出排产结果失败: {}", out.display()))?;
    tracing::info!(file = %out.display(), "排产结果已写出");

    Ok(())
}
