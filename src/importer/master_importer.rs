// ==========================================
// 机加工排产系统 - 工艺主数据导入器
// ==========================================
// 职责: 原始行记录 → 工艺主数据行 (PartNumber/OperationSeq/...)
// 红线: 缺件号或序号非正的行直接丢弃, 不合成默认行
// ==========================================

use crate::domain::order::MasterOperationRow;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::UniversalFileParser;
use std::collections::HashMap;
use std::path::Path;

/// 提取字符串字段, 支持多个可能的列名（别名）
fn get_cell(row: &HashMap<String, String>, aliases: &[&str]) -> Option<String> {
    for alias in aliases {
        if let Some(v) = row.get(*alias) {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// 解析数值, 容忍千分位逗号
fn parse_number(value: &str) -> Option<f64> {
    let normalized = value.replace(',', "");
    normalized.trim().parse::<f64>().ok()
}

/// 一批原始行 → 工艺主数据行
///
/// # 丢弃规则
/// - 件号为空
/// - 工序序号缺失或非正
pub fn map_master_rows(records: &[HashMap<String, String>]) -> Vec<MasterOperationRow> {
    let mut rows = Vec::new();

    for (index, record) in records.iter().enumerate() {
        // 数据区从表格第 2 行起
        let row_number = index + 2;

        let part_number = get_cell(record, &["PartNumber", "partNumber", "Part Number", "part_number"]);
        let Some(part_number) = part_number else {
            tracing::debug!(row = row_number, "跳过工艺行: 件号为空");
            continue;
        };

        let operation_seq = get_cell(record, &["OperationSeq", "operationSeq", "Operation Seq", "operation_seq"])
            .and_then(|v| parse_number(&v));
        let Some(operation_seq) = operation_seq.filter(|seq| *seq > 0.0) else {
            tracing::debug!(row = row_number, part_number = %part_number, "跳过工艺行: 工序序号缺失或非正");
            continue;
        };

        rows.push(MasterOperationRow {
            part_number: Some(part_number),
            operation_seq: Some(operation_seq),
            operation_name: get_cell(
                record,
                &["OperationName", "operationName", "Operation Name", "operation_name"],
            ),
            setup_time_min: get_cell(record, &["SetupTime_Min", "setupTimeMin", "SetupTime", "setup_time_min"])
                .and_then(|v| parse_number(&v)),
            cycle_time_min: get_cell(record, &["CycleTime_Min", "cycleTimeMin", "CycleTime", "cycle_time_min"])
                .and_then(|v| parse_number(&v)),
            minimum_batch_size: get_cell(
                record,
                &["Minimum_BatchSize", "minimumBatchSize", "Minimum BatchSize", "minimum_batch_size"],
            )
            .and_then(|v| parse_number(&v)),
            eligible_machines: get_cell(
                record,
                &["EligibleMachines", "eligibleMachines", "Eligible Machines", "eligible_machines"],
            ),
            handle_machines: get_cell(
                record,
                &["HandleMachines", "handleMachines", "HandleMode", "handle_machines"],
            ),
        });
    }

    rows
}

/// 从文件加载工艺主数据 (.xlsx/.xls/.csv)
pub fn load_master_operations<P: AsRef<Path>>(file_path: P) -> ImportResult<Vec<MasterOperationRow>> {
    let records = UniversalFileParser.parse(&file_path)?;
    let rows = map_master_rows(&records);
    tracing::info!(
        file = %file_path.as_ref().display(),
        raw_rows = records.len(),
        master_rows = rows.len(),
        "工艺主数据导入完成"
    );
    Ok(rows)
}
