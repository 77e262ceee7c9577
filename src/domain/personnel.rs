// ==========================================
// 机加工排产系统 - 人员档案实体
// ==========================================
// 职责: 人员档案解析器的输出结构(档案/问题/统计)
// 红线: 解析永不抛错, 一切异常都落到 issues 里
// ==========================================

use crate::domain::types::{IssueSeverity, SourceSection};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 合并去重后的一名人员
///
/// # 规则
/// - setup_eligible = 来自调机区段 或 level_up == 1
/// - production_eligible = 来自生产区段 或 level_up == 1
/// - setup_priority: 调机区段 1, level_up 晋升 2, 其余 99 (越小越先选)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonProfile {
    pub uid: String,
    pub name: String,
    pub source_section: SourceSection,
    pub level_up: u8,
    pub setup_eligible: bool,
    pub production_eligible: bool,
    pub setup_priority: u32,
}

/// 解析过程中记录的问题码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonnelIssueCode {
    MissingRequiredColumn,
    SchemaMarkerRow,
    PersonRowWithoutSection,
    InvalidLevelUpValue,
    IncompletePersonRow,
    DuplicatePersonUidConflict,
    DuplicatePersonNameConflict,
}

impl fmt::Display for PersonnelIssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PersonnelIssueCode::MissingRequiredColumn => "missing_required_column",
            PersonnelIssueCode::SchemaMarkerRow => "schema_marker_row",
            PersonnelIssueCode::PersonRowWithoutSection => "person_row_without_section",
            PersonnelIssueCode::InvalidLevelUpValue => "invalid_level_up_value",
            PersonnelIssueCode::IncompletePersonRow => "incomplete_person_row",
            PersonnelIssueCode::DuplicatePersonUidConflict => "duplicate_person_uid_conflict",
            PersonnelIssueCode::DuplicatePersonNameConflict => "duplicate_person_name_conflict",
        };
        write!(f, "{}", text)
    }
}

/// 一条解析问题, row 为表格行号(数据区从第 2 行起)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonnelIssue {
    pub code: PersonnelIssueCode,
    pub severity: IssueSeverity,
    pub row: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// 区段行数与合格人数统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonnelSummary {
    pub production_rows_detected: usize,
    pub setup_rows_detected: usize,
    pub setup_eligible_count: usize,
    pub production_eligible_count: usize,
}

/// 人员档案解析的总输出
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonnelParseResult {
    pub profiles: Vec<PersonProfile>,
    pub issues: Vec<PersonnelIssue>,
    pub summary: PersonnelSummary,
}
