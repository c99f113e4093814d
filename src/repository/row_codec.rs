// ==========================================
// 学校教务核心 - 行映射工具
// ==========================================
// 职责: 日期/时间戳/枚举的存储格式统一
// ==========================================

use crate::db::{DATETIME_FMT, DATE_FMT};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::Row;

pub(crate) fn fmt_date(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

pub(crate) fn fmt_datetime(ts: NaiveDateTime) -> String {
    ts.format(DATETIME_FMT).to_string()
}

/// 当前时间戳（存储格式）
pub(crate) fn now_ts() -> String {
    fmt_datetime(chrono::Local::now().naive_local())
}

/// 今天（本地时区）
pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

pub(crate) fn get_date(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FMT)
        .map_err(|e| conversion_error(idx, format!("日期格式错误 '{}': {}", raw, e)))
}

pub(crate) fn get_opt_date(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(s) if !s.trim().is_empty() => NaiveDate::parse_from_str(&s, DATE_FMT)
            .map(Some)
            .map_err(|e| conversion_error(idx, format!("日期格式错误 '{}': {}", s, e))),
        _ => Ok(None),
    }
}

pub(crate) fn get_datetime(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, DATETIME_FMT)
        .map_err(|e| conversion_error(idx, format!("时间格式错误 '{}': {}", raw, e)))
}

/// 解析枚举列（未知值视为数据损坏，而不是静默回退）
pub(crate) fn get_enum<T>(
    row: &Row,
    idx: usize,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| conversion_error(idx, format!("未知枚举值 '{}'", raw)))
}

/// 年级集合以 JSON 数组存储
pub(crate) fn get_grade_levels(
    row: &Row,
    idx: usize,
) -> rusqlite::Result<std::collections::BTreeSet<i32>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| conversion_error(idx, format!("年级集合格式错误 '{}': {}", raw, e)))
}
