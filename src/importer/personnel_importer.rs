// ==========================================
// 机加工排产系统 - 人员档案解析器
// ==========================================
// 职责: 电子表格行 → 人员档案(区段状态机 + 按 uid 合并)
// 红线: 全函数不抛错, 所有异常都落到 issues 里
// ==========================================

use crate::domain::personnel::{
    PersonProfile, PersonnelIssue, PersonnelIssueCode, PersonnelParseResult, PersonnelSummary,
};
use crate::domain::types::{IssueSeverity, SourceSection};
use crate::importer::error::ImportResult;
use crate::importer::file_parser::UniversalFileParser;
use std::collections::HashMap;
use std::path::Path;

// ==========================================
// 列别名与标记词
// ==========================================

const SECTION_COLUMN_ALIASES: [&str; 3] =
    ["Production-Person", "production_person", "production person"];
const UID_COLUMN_ALIASES: [&str; 3] = ["uid", "user id", "employee id"];
const NAME_COLUMN_ALIASES: [&str; 3] = ["Name", "person name", "employee name"];
const LEVEL_COLUMN_ALIASES: [&str; 4] = ["level-up", "level up", "levelup", "level"];

const SECTION_PRODUCTION_TOKENS: [&str; 3] = ["productionperson", "production", "productionteam"];
const SECTION_SETUP_TOKENS: [&str; 3] = ["setupperson", "setup", "setupteam"];

/// 表头续行标记词: 人员单元格若命中这些字面量, 该行按表头残片处理
const HEADER_MARKER_TOKENS: [&str; 4] = ["uid", "name", "levelup", "level"];

// ==========================================
// 区段状态机
// ==========================================

/// 人员块的区段状态
///
/// 首个区段标记出现之前为 `PreSchema`, 此时的数据行只记问题不进档案。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionState {
    PreSchema,
    ProductionSection,
    SetupSection,
}

impl SectionState {
    fn as_section(self) -> Option<SourceSection> {
        match self {
            SectionState::PreSchema => None,
            SectionState::ProductionSection => Some(SourceSection::Production),
            SectionState::SetupSection => Some(SourceSection::Setup),
        }
    }
}

// ==========================================
// 单元格与标记解析
// ==========================================

/// 列名/标记词归一化: 小写 + 仅保留字母数字
fn normalize_key(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// 在所有行的表头键里找别名列, 按别名优先级 + 键名字典序保证确定性
fn find_column_key(rows: &[HashMap<String, String>], aliases: &[&str]) -> Option<String> {
    let mut keys: Vec<&String> = rows.iter().flat_map(|row| row.keys()).collect();
    keys.sort();
    keys.dedup();

    for alias in aliases {
        let target = normalize_key(alias);
        if let Some(key) = keys.iter().find(|key| normalize_key(key) == target) {
            return Some((*key).clone());
        }
    }
    None
}

fn read_cell(row: &HashMap<String, String>, key: &str) -> String {
    row.get(key).map(|v| v.trim().to_string()).unwrap_or_default()
}

fn parse_section_marker(value: &str) -> Option<SectionState> {
    let token = normalize_key(value);
    if token.is_empty() {
        return None;
    }
    if SECTION_SETUP_TOKENS.contains(&token.as_str()) {
        return Some(SectionState::SetupSection);
    }
    if SECTION_PRODUCTION_TOKENS.contains(&token.as_str()) {
        return Some(SectionState::ProductionSection);
    }
    None
}

/// level-up 只接受 0/1, 其余记警告并回落区段默认值
fn parse_level_value(raw: &str, row: u32, fallback: u8, issues: &mut Vec<PersonnelIssue>) -> u8 {
    if raw.is_empty() {
        return fallback;
    }
    match raw.parse::<f64>() {
        Ok(numeric) if numeric == 0.0 => 0,
        Ok(numeric) if numeric == 1.0 => 1,
        _ => {
            issues.push(PersonnelIssue {
                code: PersonnelIssueCode::InvalidLevelUpValue,
                severity: IssueSeverity::Warning,
                row,
                message: format!(
                    "Invalid level-up value \"{}\". Falling back to {}.",
                    raw, fallback
                ),
                value: Some(raw.to_string()),
            });
            fallback
        }
    }
}

// ==========================================
// 主解析流程
// ==========================================

/// 电子表格行 → 人员档案
///
/// # 流程
/// 1. 按别名发现四个必需列, 缺任何一列直接返回 critical 问题
/// 2. 逐行推进区段状态机, 标记行切换区段
/// 3. 数据行校验(表头残片/无区段/缺 uid 或 Name/level 取值)后并入档案
/// 4. 同 uid 合并: 保留首见姓名, 资格取并集, 优先级取最小, 调机区段胜出
///
/// 问题行号为表格行号(表头占第 1 行, 数据区从第 2 行起)。
pub fn parse_personnel_profiles_from_rows(
    raw_rows: &[HashMap<String, String>],
) -> PersonnelParseResult {
    let mut issues: Vec<PersonnelIssue> = Vec::new();

    let section_key = find_column_key(raw_rows, &SECTION_COLUMN_ALIASES);
    let uid_key = find_column_key(raw_rows, &UID_COLUMN_ALIASES);
    let name_key = find_column_key(raw_rows, &NAME_COLUMN_ALIASES);
    let level_key = find_column_key(raw_rows, &LEVEL_COLUMN_ALIASES);

    let (Some(section_key), Some(uid_key), Some(name_key), Some(level_key)) =
        (section_key, uid_key, name_key, level_key)
    else {
        issues.push(PersonnelIssue {
            code: PersonnelIssueCode::MissingRequiredColumn,
            severity: IssueSeverity::Critical,
            row: 1,
            message: "Personnel columns missing. Required: Production-Person, uid, Name, level-up."
                .to_string(),
            value: None,
        });
        return PersonnelParseResult {
            profiles: Vec::new(),
            issues,
            summary: PersonnelSummary::default(),
        };
    };

    let mut state = SectionState::PreSchema;
    let mut production_rows_detected = 0usize;
    let mut setup_rows_detected = 0usize;

    // 按首次出现顺序保存档案, 保证同 (优先级, 姓名) 时输出确定
    let mut profiles: Vec<PersonProfile> = Vec::new();
    let mut index_by_uid: HashMap<String, usize> = HashMap::new();
    let mut uid_by_name: HashMap<String, String> = HashMap::new();

    for (index, row) in raw_rows.iter().enumerate() {
        // 表头占第 1 行, 数据区从第 2 行起
        let row_number = (index + 2) as u32;

        let section_raw = read_cell(row, &section_key);
        if let Some(marker) = parse_section_marker(&section_raw) {
            state = marker;
        }

        let uid = read_cell(row, &uid_key);
        let name = read_cell(row, &name_key);
        let level_raw = read_cell(row, &level_key);

        if uid.is_empty() && name.is_empty() && level_raw.is_empty() {
            continue;
        }

        let is_header_marker_row = HEADER_MARKER_TOKENS.contains(&normalize_key(&uid).as_str())
            || HEADER_MARKER_TOKENS.contains(&normalize_key(&name).as_str())
            || HEADER_MARKER_TOKENS.contains(&normalize_key(&level_raw).as_str());
        if is_header_marker_row {
            issues.push(PersonnelIssue {
                code: PersonnelIssueCode::SchemaMarkerRow,
                severity: IssueSeverity::Warning,
                row: row_number,
                message: "Ignored schema marker row in personnel block.".to_string(),
                value: None,
            });
            continue;
        }

        let Some(source_section) = state.as_section() else {
            issues.push(PersonnelIssue {
                code: PersonnelIssueCode::PersonRowWithoutSection,
                severity: IssueSeverity::Warning,
                row: row_number,
                message: "Ignored personnel row because no section marker was found yet."
                    .to_string(),
                value: None,
            });
            continue;
        };

        if uid.is_empty() || name.is_empty() {
            issues.push(PersonnelIssue {
                code: PersonnelIssueCode::IncompletePersonRow,
                severity: IssueSeverity::Warning,
                row: row_number,
                message: "Ignored personnel row with missing uid or Name.".to_string(),
                value: None,
            });
            continue;
        }

        let default_level = if source_section == SourceSection::Setup { 1 } else { 0 };
        let level_up = parse_level_value(&level_raw, row_number, default_level, &mut issues);

        let setup_eligible = source_section == SourceSection::Setup || level_up == 1;
        let production_eligible = source_section == SourceSection::Production || level_up == 1;
        let setup_priority: u32 = if source_section == SourceSection::Setup {
            1
        } else if level_up == 1 {
            2
        } else {
            99
        };

        if source_section == SourceSection::Setup {
            setup_rows_detected += 1;
        } else {
            production_rows_detected += 1;
        }

        let name_key_lower = name.to_lowercase();
        if let Some(existing_uid) = uid_by_name.get(&name_key_lower) {
            if existing_uid != &uid {
                issues.push(PersonnelIssue {
                    code: PersonnelIssueCode::DuplicatePersonNameConflict,
                    severity: IssueSeverity::Warning,
                    row: row_number,
                    message: format!(
                        "Name \"{}\" is mapped to multiple UIDs ({}, {}).",
                        name, existing_uid, uid
                    ),
                    value: None,
                });
            }
        }
        uid_by_name.insert(name_key_lower, uid.clone());

        match index_by_uid.get(&uid) {
            None => {
                index_by_uid.insert(uid.clone(), profiles.len());
                profiles.push(PersonProfile {
                    uid,
                    name,
                    source_section,
                    level_up,
                    setup_eligible,
                    production_eligible,
                    setup_priority,
                });
            }
            Some(&slot) => {
                let existing = &mut profiles[slot];
                if existing.name != name {
                    issues.push(PersonnelIssue {
                        code: PersonnelIssueCode::DuplicatePersonUidConflict,
                        severity: IssueSeverity::Warning,
                        row: row_number,
                        message: format!(
                            "UID {} has conflicting names ({} vs {}). Keeping first name.",
                            uid, existing.name, name
                        ),
                        value: None,
                    });
                }
                existing.setup_eligible = existing.setup_eligible || setup_eligible;
                existing.production_eligible = existing.production_eligible || production_eligible;
                existing.setup_priority = existing.setup_priority.min(setup_priority);
                existing.level_up = existing.level_up.max(level_up);
                if source_section == SourceSection::Setup {
                    existing.source_section = SourceSection::Setup;
                }
            }
        }
    }

    profiles.sort_by(|a, b| {
        a.setup_priority
            .cmp(&b.setup_priority)
            .then_with(|| a.name.cmp(&b.name))
    });

    let summary = PersonnelSummary {
        production_rows_detected,
        setup_rows_detected,
        setup_eligible_count: profiles.iter().filter(|p| p.setup_eligible).count(),
        production_eligible_count: profiles.iter().filter(|p| p.production_eligible).count(),
    };

    PersonnelParseResult {
        profiles,
        issues,
        summary,
    }
}

/// 从文件解析人员档案 (.xlsx/.xls/.csv)
pub fn parse_personnel_profiles_from_file<P: AsRef<Path>>(
    file_path: P,
) -> ImportResult<PersonnelParseResult> {
    let records = UniversalFileParser.parse(&file_path)?;
    let result = parse_personnel_profiles_from_rows(&records);
    tracing::info!(
        file = %file_path.as_ref().display(),
        profiles = result.profiles.len(),
        issues = result.issues.len(),
        setup_eligible = result.summary.setup_eligible_count,
        production_eligible = result.summary.production_eligible_count,
        "人员档案解析完成"
    );
    Ok(result)
}
