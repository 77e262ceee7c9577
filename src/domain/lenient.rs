// ==========================================
// 机加工排产系统 - 宽容反序列化
// ==========================================
// 职责: 外部 JSON 中数字/文本混写字段的容错读取
// 红线: 非法值一律回落 None, 不得让坏数据中断整次排产
// ==========================================

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// 数字字段: 接受 JSON number 或数字文本, 其余回落 None
///
/// # 规则
/// - `12` / `12.5` → Some(12.0) / Some(12.5)
/// - `"12"` / `" 12.5 "` → Some(12.0) / Some(12.5)
/// - `""` / `"abc"` / `null` / 对象 → None
/// - 非有限值(NaN/Inf) → None
pub fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_f64))
}

/// 文本字段: 接受 JSON string/number/bool, 其余回落 None
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_string))
}

/// 布尔字段: 仅接受 JSON true/false, 文本 "true" 不算(与严格等值口径一致)
pub fn opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        _ => None,
    })
}

/// Value → f64 的统一口径(供导入层复用)
pub fn coerce_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Value → String 的统一口径(供导入层复用)
pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Default)]
    #[serde(default)]
    struct Probe {
        #[serde(deserialize_with = "opt_f64")]
        qty: Option<f64>,
        #[serde(deserialize_with = "opt_string")]
        seq: Option<String>,
        #[serde(deserialize_with = "opt_bool")]
        flag: Option<bool>,
    }

    #[test]
    fn test_opt_f64_accepts_number_and_text() {
        let p: Probe = serde_json::from_str(r#"{"qty": 300}"#).unwrap();
        assert_eq!(p.qty, Some(300.0));
        let p: Probe = serde_json::from_str(r#"{"qty": " 12.5 "}"#).unwrap();
        assert_eq!(p.qty, Some(12.5));
    }

    #[test]
    fn test_opt_f64_rejects_garbage() {
        let p: Probe = serde_json::from_str(r#"{"qty": "abc"}"#).unwrap();
        assert_eq!(p.qty, None);
        let p: Probe = serde_json::from_str(r#"{"qty": ""}"#).unwrap();
        assert_eq!(p.qty, None);
        let p: Probe = serde_json::from_str(r#"{"qty": null}"#).unwrap();
        assert_eq!(p.qty, None);
        let p: Probe = serde_json::from_str(r#"{"qty": {"x": 1}}"#).unwrap();
        assert_eq!(p.qty, None);
    }

    #[test]
    fn test_opt_bool_only_real_booleans() {
        let p: Probe = serde_json::from_str(r#"{"flag": true}"#).unwrap();
        assert_eq!(p.flag, Some(true));
        // 文本 "true" 不等价于布尔 true
        let p: Probe = serde_json::from_str(r#"{"flag": "true"}"#).unwrap();
        assert_eq!(p.flag, None);
    }

    #[test]
    fn test_opt_string_accepts_number() {
        let p: Probe = serde_json::from_str(r#"{"seq": 1}"#).unwrap();
        assert_eq!(p.seq.as_deref(), Some("1"));
        let p: Probe = serde_json::from_str(r#"{"seq": "1,2"}"#).unwrap();
        assert_eq!(p.seq.as_deref(), Some("1,2"));
    }
}
