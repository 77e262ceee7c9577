// ==========================================
// 机加工排产系统 - 日历与时间窗
// ==========================================
// 职责: 时间窗解析/判定、弹性日期解析、假日与机台故障区间
// 红线: 全部按整分钟粒度判定; 非法输入回落默认值, 不抛错
// ==========================================

use crate::domain::settings::{BreakdownInput, HolidayInput};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::collections::HashMap;

/// 默认调机窗(也是窗口解析失败的兜底)
pub const DEFAULT_OPERATOR_WINDOW: &str = "06:00-22:00";
/// 默认生产窗
pub const DEFAULT_PRODUCTION_WINDOW: &str = "00:00-23:59";

// ==========================================
// 时间窗 (Time Window)
// ==========================================

/// 一天内的时间窗, end <= start 视为过夜窗
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_minute: u32,
    pub end_minute: u32,
    pub overnight: bool,
    pub raw: String,
}

/// 解析 "HH:MM-HH:MM", 非法写法回落默认调机窗
///
/// # 规则
/// - 小时钳位到 0..=23, 分钟钳位到 0..=59
/// - 结束不晚于开始 → overnight
pub fn parse_window(text: &str) -> TimeWindow {
    if let Some(window) = try_parse_window(text) {
        return window;
    }
    TimeWindow {
        start_minute: 6 * 60,
        end_minute: 22 * 60,
        overnight: false,
        raw: DEFAULT_OPERATOR_WINDOW.to_string(),
    }
}

fn try_parse_window(text: &str) -> Option<TimeWindow> {
    let (start_part, end_part) = text.split_once('-')?;
    let (start_hour, start_min) = parse_hhmm(start_part)?;
    let (end_hour, end_min) = parse_hhmm(end_part)?;

    let start = start_hour.min(23) * 60 + start_min.min(59);
    let end = end_hour.min(23) * 60 + end_min.min(59);

    Some(TimeWindow {
        start_minute: start,
        end_minute: end,
        overnight: end <= start,
        raw: text.to_string(),
    })
}

fn parse_hhmm(text: &str) -> Option<(u32, u32)> {
    let (hour, minute) = text.split_once(':')?;
    if hour.is_empty() || hour.len() > 2 || !hour.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if minute.len() != 2 || !minute.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((hour.parse().ok()?, minute.parse().ok()?))
}

/// 当日分钟序号 (0..1440)
pub fn minute_of_day(at: NaiveDateTime) -> u32 {
    at.time().hour() * 60 + at.time().minute()
}

pub fn is_minute_in_window(minute: u32, window: &TimeWindow) -> bool {
    if !window.overnight {
        minute >= window.start_minute && minute < window.end_minute
    } else {
        minute >= window.start_minute || minute < window.end_minute
    }
}

pub fn is_in_window(at: NaiveDateTime, window: &TimeWindow) -> bool {
    is_minute_in_window(minute_of_day(at), window)
}

/// 两窗是否存在公共分钟(逐分钟穷举, 过夜窗同样成立)
pub fn windows_overlap(a: &TimeWindow, b: &TimeWindow) -> bool {
    (0..24 * 60).any(|minute| is_minute_in_window(minute, a) && is_minute_in_window(minute, b))
}

/// 当天指定分钟的时间点, 秒归零
pub fn at_minute(at: NaiveDateTime, minute: u32) -> NaiveDateTime {
    let hour = (minute / 60).min(23);
    let min = (minute % 60).min(59);
    match at.date().and_hms_opt(hour, min, 0) {
        Some(dt) => dt,
        None => at.date().and_time(NaiveTime::MIN),
    }
}

/// 下一个窗口起点(可能就是今天, 也可能顺延到明天)
pub fn next_window_start(at: NaiveDateTime, window: &TimeWindow) -> NaiveDateTime {
    let minute = minute_of_day(at);
    let start_today = at_minute(at, window.start_minute);

    if !window.overnight {
        if at <= start_today {
            return start_today;
        }
        return start_today + Duration::days(1);
    }

    if minute >= window.start_minute {
        return start_today + Duration::days(1);
    }
    start_today
}

/// 已在窗内则原地返回, 否则给出下一个窗口起点
pub fn next_window_entry(at: NaiveDateTime, window: &TimeWindow) -> NaiveDateTime {
    if is_in_window(at, window) {
        return at;
    }
    next_window_start(at, window)
}

// ==========================================
// 时间算术
// ==========================================

pub fn add_minutes(at: NaiveDateTime, minutes: i64) -> NaiveDateTime {
    at + Duration::minutes(minutes)
}

pub fn start_of_day(at: NaiveDateTime) -> NaiveDateTime {
    at.date().and_time(NaiveTime::MIN)
}

/// 相差分钟数, 四舍五入且不小于 0
pub fn diff_minutes(from: NaiveDateTime, to: NaiveDateTime) -> i64 {
    let secs = (to - from).num_seconds() as f64;
    ((secs / 60.0).round() as i64).max(0)
}

// ==========================================
// 弹性日期解析
// ==========================================

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d %b %Y", "%b %d %Y", "%B %d %Y"];

/// 多格式日期解析; 首轮失败后去掉一个逗号重试("Feb 22, 2026" 这类写法)
pub fn parse_flexible_datetime(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(parsed) = parse_datetime_once(trimmed) {
        return Some(parsed);
    }
    let normalized = trimmed.replacen(',', "", 1);
    if normalized != trimmed {
        return parse_datetime_once(normalized.trim());
    }
    None
}

fn parse_datetime_once(text: &str) -> Option<NaiveDateTime> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(text) {
        return Some(with_offset.naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(parsed);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(text, format) {
            return Some(parsed.and_time(NaiveTime::MIN));
        }
    }
    None
}

// ==========================================
// 假日与机台故障区间
// ==========================================

/// 半开区间 [start, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Interval {
    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.start <= at && at < self.end
    }
}

/// 假日入参展开为区间: 日期文本按整天, 起止对象按区间, 只有起点按整天
pub fn parse_holiday_intervals(raw: &[HolidayInput]) -> Vec<Interval> {
    let mut intervals = Vec::new();
    for item in raw {
        match item {
            HolidayInput::Text(text) => {
                if let Some(date) = parse_flexible_datetime(text) {
                    intervals.push(whole_day(date));
                }
            }
            HolidayInput::Range(range) => {
                let start = range
                    .start_date_time
                    .as_deref()
                    .and_then(parse_flexible_datetime);
                let end = range
                    .end_date_time
                    .as_deref()
                    .and_then(parse_flexible_datetime);
                match (start, end) {
                    (Some(start), Some(end)) if end > start => {
                        intervals.push(Interval { start, end });
                    }
                    (Some(start), _) => intervals.push(whole_day(start)),
                    _ => {}
                }
            }
            HolidayInput::Other(_) => {}
        }
    }
    intervals
}

fn whole_day(at: NaiveDateTime) -> Interval {
    let start = start_of_day(at);
    Interval {
        start,
        end: start + Duration::days(1),
    }
}

/// 故障入参按机台归组, 起止非法或倒置的整条丢弃
pub fn parse_breakdowns(raw: &[BreakdownInput]) -> HashMap<String, Vec<Interval>> {
    let mut by_machine: HashMap<String, Vec<Interval>> = HashMap::new();
    for item in raw {
        let start = item
            .start_date_time
            .as_deref()
            .and_then(parse_flexible_datetime);
        let end = item
            .end_date_time
            .as_deref()
            .and_then(parse_flexible_datetime);
        let (start, end) = match (start, end) {
            (Some(start), Some(end)) if end > start => (start, end),
            _ => continue,
        };
        for machine in item.affected_machines() {
            by_machine
                .entry(machine)
                .or_default()
                .push(Interval { start, end });
        }
    }
    by_machine
}

pub fn is_holiday(at: NaiveDateTime, holidays: &[Interval]) -> bool {
    holidays.iter().any(|interval| interval.contains(at))
}

pub fn is_in_breakdown(
    at: NaiveDateTime,
    machine: &str,
    breakdowns: &HashMap<String, Vec<Interval>>,
) -> bool {
    breakdowns
        .get(machine)
        .map(|intervals| intervals.iter().any(|interval| interval.contains(at)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    // ==========================================
    // 测试组: 时间窗解析
    // ==========================================

    #[test]
    fn test_parse_window_basic() {
        let w = parse_window("06:00-22:00");
        assert_eq!(w.start_minute, 360);
        assert_eq!(w.end_minute, 1320);
        assert!(!w.overnight);
    }

    #[test]
    fn test_parse_window_overnight() {
        let w = parse_window("22:00-06:00");
        assert!(w.overnight);
        assert_eq!(w.start_minute, 1320);
        assert_eq!(w.end_minute, 360);
    }

    #[test]
    fn test_parse_window_invalid_falls_back() {
        let w = parse_window("garbage");
        assert_eq!(w.raw, DEFAULT_OPERATOR_WINDOW);
        assert_eq!(w.start_minute, 360);

        // 拼接多余内容同样判非法
        let w = parse_window("06:00-22:00-extra");
        assert_eq!(w.raw, DEFAULT_OPERATOR_WINDOW);
    }

    #[test]
    fn test_parse_window_clamps_out_of_range() {
        let w = parse_window("99:99-23:59");
        assert_eq!(w.start_minute, 23 * 60 + 59);
        assert_eq!(w.end_minute, 23 * 60 + 59);
        assert!(w.overnight);
    }

    // ==========================================
    // 测试组: 窗内判定与重叠
    // ==========================================

    #[test]
    fn test_minute_in_window() {
        let w = parse_window("06:00-22:00");
        assert!(!is_minute_in_window(359, &w));
        assert!(is_minute_in_window(360, &w));
        assert!(is_minute_in_window(1319, &w));
        assert!(!is_minute_in_window(1320, &w));
    }

    #[test]
    fn test_minute_in_overnight_window() {
        let w = parse_window("22:00-06:00");
        assert!(is_minute_in_window(1320, &w));
        assert!(is_minute_in_window(0, &w));
        assert!(is_minute_in_window(359, &w));
        assert!(!is_minute_in_window(360, &w));
        assert!(!is_minute_in_window(720, &w));
    }

    #[test]
    fn test_windows_overlap() {
        let day = parse_window("06:00-14:00");
        let evening = parse_window("14:00-22:00");
        let night = parse_window("22:00-06:00");
        assert!(!windows_overlap(&day, &evening));
        assert!(!windows_overlap(&day, &night));
        assert!(windows_overlap(&parse_window("05:00-07:00"), &day));
        assert!(windows_overlap(&parse_window("05:00-07:00"), &night));
    }

    // ==========================================
    // 测试组: 窗口起点推进
    // ==========================================

    #[test]
    fn test_next_window_start_same_day() {
        let w = parse_window("06:00-22:00");
        let at = dt(2026, 2, 22, 5, 0);
        assert_eq!(next_window_start(at, &w), dt(2026, 2, 22, 6, 0));
    }

    #[test]
    fn test_next_window_start_rolls_to_tomorrow() {
        let w = parse_window("06:00-22:00");
        let at = dt(2026, 2, 22, 7, 0);
        assert_eq!(next_window_start(at, &w), dt(2026, 2, 23, 6, 0));
    }

    #[test]
    fn test_next_window_start_overnight() {
        let w = parse_window("22:00-06:00");
        // 已过起点: 顺延到明天 22:00
        assert_eq!(next_window_start(dt(2026, 2, 22, 23, 0), &w), dt(2026, 2, 23, 22, 0));
        // 凌晨(窗内前半段): 今天 22:00
        assert_eq!(next_window_start(dt(2026, 2, 22, 3, 0), &w), dt(2026, 2, 22, 22, 0));
        // 白天(窗外): 今天 22:00
        assert_eq!(next_window_start(dt(2026, 2, 22, 12, 0), &w), dt(2026, 2, 22, 22, 0));
    }

    #[test]
    fn test_next_window_entry_inside_returns_as_is() {
        let w = parse_window("06:00-22:00");
        let at = dt(2026, 2, 22, 10, 30);
        assert_eq!(next_window_entry(at, &w), at);
        assert_eq!(next_window_entry(dt(2026, 2, 22, 23, 0), &w), dt(2026, 2, 23, 6, 0));
    }

    // ==========================================
    // 测试组: 弹性日期解析
    // ==========================================

    #[test]
    fn test_parse_flexible_datetime_formats() {
        assert_eq!(
            parse_flexible_datetime("2026-02-22T06:00:00"),
            Some(dt(2026, 2, 22, 6, 0))
        );
        assert_eq!(
            parse_flexible_datetime("2026-02-22 06:00"),
            Some(dt(2026, 2, 22, 6, 0))
        );
        assert_eq!(
            parse_flexible_datetime("2026-02-22"),
            Some(dt(2026, 2, 22, 0, 0))
        );
        assert_eq!(
            parse_flexible_datetime("2026/02/22 06:00:00"),
            Some(dt(2026, 2, 22, 6, 0))
        );
    }

    #[test]
    fn test_parse_flexible_datetime_comma_retry() {
        assert_eq!(
            parse_flexible_datetime("Feb 22, 2026"),
            Some(dt(2026, 2, 22, 0, 0))
        );
    }

    #[test]
    fn test_parse_flexible_datetime_rejects_garbage() {
        assert_eq!(parse_flexible_datetime(""), None);
        assert_eq!(parse_flexible_datetime("not a date"), None);
        assert_eq!(parse_flexible_datetime("2026-13-40"), None);
    }

    // ==========================================
    // 测试组: 假日与故障区间
    // ==========================================

    #[test]
    fn test_holiday_text_expands_to_whole_day() {
        let intervals =
            parse_holiday_intervals(&[HolidayInput::Text("2026-02-22".to_string())]);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].start, dt(2026, 2, 22, 0, 0));
        assert_eq!(intervals[0].end, dt(2026, 2, 23, 0, 0));
        assert!(is_holiday(dt(2026, 2, 22, 12, 0), &intervals));
        assert!(!is_holiday(dt(2026, 2, 23, 0, 0), &intervals));
    }

    #[test]
    fn test_holiday_range_and_start_only() {
        let range: HolidayInput = serde_json::from_str(
            r#"{"start": "2026-03-01T08:00:00", "end": "2026-03-02T08:00:00"}"#,
        )
        .unwrap();
        let start_only: HolidayInput =
            serde_json::from_str(r#"{"date": "2026-03-05"}"#).unwrap();
        let intervals = parse_holiday_intervals(&[range, start_only]);
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].start, dt(2026, 3, 1, 8, 0));
        assert_eq!(intervals[0].end, dt(2026, 3, 2, 8, 0));
        assert_eq!(intervals[1].start, dt(2026, 3, 5, 0, 0));
        assert_eq!(intervals[1].end, dt(2026, 3, 6, 0, 0));
    }

    #[test]
    fn test_breakdowns_grouped_by_machine() {
        let one: BreakdownInput = serde_json::from_str(
            r#"{"start": "2026-02-22T06:00:00", "end": "2026-02-22T20:00:00", "machines": ["VMC 1", "VMC 2"]}"#,
        )
        .unwrap();
        let inverted: BreakdownInput = serde_json::from_str(
            r#"{"start": "2026-02-23T20:00:00", "end": "2026-02-23T06:00:00", "machine": "VMC 3"}"#,
        )
        .unwrap();
        let map = parse_breakdowns(&[one, inverted]);
        assert_eq!(map.len(), 2);
        assert!(is_in_breakdown(dt(2026, 2, 22, 12, 0), "VMC 1", &map));
        assert!(is_in_breakdown(dt(2026, 2, 22, 12, 0), "VMC 2", &map));
        assert!(!is_in_breakdown(dt(2026, 2, 22, 12, 0), "VMC 3", &map));
    }

    #[test]
    fn test_diff_minutes_rounds_and_clamps() {
        assert_eq!(diff_minutes(dt(2026, 2, 22, 6, 0), dt(2026, 2, 22, 7, 30)), 90);
        assert_eq!(diff_minutes(dt(2026, 2, 22, 7, 0), dt(2026, 2, 22, 6, 0)), 0);
    }
}
