// ==========================================
// 机加工排产系统 - 设置解析
// ==========================================
// 职责: 外部设置 → 引擎内部口径(锚点/窗口/人员池/假日/故障)
// 红线: 人员池为空时保持为空, 不得注入任何占位操作工
// ==========================================

use crate::domain::settings::{PersonnelInputRow, ScheduleSettings};
use crate::domain::types::{ProfileMode, SourceSection};
use crate::engine::calendar::{
    self, Interval, TimeWindow, DEFAULT_OPERATOR_WINDOW, DEFAULT_PRODUCTION_WINDOW,
};
use chrono::NaiveDateTime;
use std::collections::HashMap;

/// 默认机台清单, 工序未给可用机台时使用
pub const DEFAULT_MACHINES: [&str; 10] = [
    "VMC 1", "VMC 2", "VMC 3", "VMC 4", "VMC 5", "VMC 6", "VMC 7", "VMC 8", "VMC 9", "VMC 10",
];

/// 机台清单解析: 逗号分隔, 去空白, 空结果回落默认清单
pub fn parse_machines(raw: &str) -> Vec<String> {
    let parsed: Vec<String> = raw
        .split(',')
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();
    if parsed.is_empty() {
        DEFAULT_MACHINES.iter().map(|m| m.to_string()).collect()
    } else {
        parsed
    }
}

/// 合并去重后的一名可排操作工
#[derive(Debug, Clone)]
pub struct Operator {
    pub uid: String,
    pub name: String,
    pub source_section: SourceSection,
    pub level_up: u8,
    pub setup_eligible: bool,
    pub production_eligible: bool,
    pub setup_priority: u32,
    pub shift: TimeWindow,
}

/// 解析完毕、供放置搜索直接使用的设置
#[derive(Debug, Clone)]
pub struct ParsedSettings {
    pub global_start: NaiveDateTime,
    pub setup_window: TimeWindow,
    pub production_windows: Vec<TimeWindow>,
    pub profile_mode: ProfileMode,
    pub personnel: Vec<Operator>,
    pub setup_personnel: Vec<Operator>,
    pub production_personnel: Vec<Operator>,
    pub holiday_intervals: Vec<Interval>,
    pub breakdown_by_machine: HashMap<String, Vec<Interval>>,
}

/// 解析排产设置
///
/// # 规则
/// - 锚点缺省取 `now` 之后的首个调机窗起点
/// - 生产窗三班全空时回落 "00:00-23:59"
/// - 班次约束仅在 enforce_operator_shifts 恰为 true 且有班次时生效,
///   否则所有人按调机窗值班
pub fn parse_settings(settings: &ScheduleSettings, now: NaiveDateTime) -> ParsedSettings {
    let setup_window = calendar::parse_window(
        settings
            .global_setup_window
            .as_deref()
            .unwrap_or(DEFAULT_OPERATOR_WINDOW),
    );
    let global_start = settings
        .global_start_date_time
        .as_deref()
        .and_then(calendar::parse_flexible_datetime)
        .unwrap_or_else(|| calendar::next_window_start(now, &setup_window));

    let production_candidates: Vec<String> = [
        settings.production_window_shift1.as_deref(),
        settings.production_window_shift2.as_deref(),
        settings.production_window_shift3.as_deref(),
    ]
    .iter()
    .filter_map(|value| value.map(str::trim))
    .filter(|value| !value.is_empty())
    .map(str::to_string)
    .collect();
    let production_windows: Vec<TimeWindow> = if production_candidates.is_empty() {
        vec![calendar::parse_window(DEFAULT_PRODUCTION_WINDOW)]
    } else {
        production_candidates
            .iter()
            .map(|value| calendar::parse_window(value))
            .collect()
    };

    let enforce_operator_shifts = settings.enforce_operator_shifts == Some(true);
    let shift_candidates: Vec<String> = [
        settings.shift1.as_deref(),
        settings.shift2.as_deref(),
        settings.shift3.as_deref(),
    ]
    .iter()
    .filter_map(|value| value.map(str::trim))
    .filter(|value| !value.is_empty())
    .map(str::to_string)
    .collect();
    let shift_windows: Vec<TimeWindow> = if enforce_operator_shifts && !shift_candidates.is_empty()
    {
        shift_candidates
            .iter()
            .map(|value| calendar::parse_window(value))
            .collect()
    } else {
        vec![setup_window.clone()]
    };

    let personnel = parse_personnel(&settings.personnel_profiles, &shift_windows);
    let setup_personnel: Vec<Operator> = personnel
        .iter()
        .filter(|person| person.setup_eligible)
        .cloned()
        .collect();
    let production_personnel: Vec<Operator> = personnel
        .iter()
        .filter(|person| person.production_eligible)
        .cloned()
        .collect();

    ParsedSettings {
        global_start,
        setup_window,
        production_windows,
        profile_mode: ProfileMode::parse_label(settings.profile_mode.as_deref().unwrap_or("")),
        personnel,
        setup_personnel,
        production_personnel,
        holiday_intervals: calendar::parse_holiday_intervals(&settings.holidays),
        breakdown_by_machine: calendar::parse_breakdowns(&settings.breakdowns),
    }
}

/// 人员池解析: 按姓名合并, 资格取并集, 优先级取更优
///
/// 档案为空时返回空池, 由放置阶段报 NO_PERSONNEL_AVAILABLE,
/// 不再回落到占位操作工。
fn parse_personnel(rows: &[PersonnelInputRow], shift_windows: &[TimeWindow]) -> Vec<Operator> {
    let mut ordered: Vec<Operator> = Vec::new();
    let mut index_by_name: HashMap<String, usize> = HashMap::new();

    for (index, row) in rows.iter().enumerate() {
        let name = row.name.as_deref().unwrap_or("").trim().to_string();
        if name.is_empty() {
            continue;
        }

        let uid = match row.uid.as_deref().map(str::trim) {
            Some(uid) if !uid.is_empty() => uid.to_string(),
            _ => format!("UID-{}", index + 1),
        };
        let source_section = match row
            .source_section
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_lowercase()
            .as_str()
        {
            "setup" => SourceSection::Setup,
            _ => SourceSection::Production,
        };
        let level_up: u8 = match row.level_up {
            Some(level) if level == 1.0 => 1,
            _ => 0,
        };
        let setup_eligible = row.setup_eligible == Some(true)
            || source_section == SourceSection::Setup
            || level_up == 1;
        let production_eligible = row.production_eligible == Some(true)
            || source_section == SourceSection::Production
            || source_section == SourceSection::Setup;
        let setup_priority = if source_section == SourceSection::Setup {
            1
        } else if let Some(priority) = row.setup_priority {
            priority.max(1.0).round() as u32
        } else if level_up == 1 {
            2
        } else {
            99
        };
        let shift = shift_windows[index % shift_windows.len()].clone();

        match index_by_name.get(&name) {
            None => {
                index_by_name.insert(name.clone(), ordered.len());
                ordered.push(Operator {
                    uid,
                    name,
                    source_section,
                    level_up,
                    setup_eligible,
                    production_eligible,
                    setup_priority,
                    shift,
                });
            }
            Some(&existing_index) => {
                let existing = &mut ordered[existing_index];
                existing.setup_eligible = existing.setup_eligible || setup_eligible;
                existing.production_eligible = existing.production_eligible || production_eligible;
                existing.level_up = existing.level_up.max(level_up);
                existing.setup_priority = existing.setup_priority.min(setup_priority);
                if source_section == SourceSection::Setup {
                    existing.source_section = SourceSection::Setup;
                }
            }
        }
    }

    ordered.sort_by(|a, b| {
        a.setup_priority
            .cmp(&b.setup_priority)
            .then_with(|| a.name.cmp(&b.name))
    });
    ordered
}
