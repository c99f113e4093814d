// ==========================================
// 学校教务核心 - 字段校验
// ==========================================
// 职责: 草稿对象在写入前的字段级校验结果
// ==========================================

use serde::{Deserialize, Serialize};

/// 字段校验违规
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// 违规收集器
#[derive(Debug, Default)]
pub struct Violations {
    items: Vec<FieldViolation>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.items.push(FieldViolation::new(field, message));
    }

    /// 条件不满足时记录违规
    pub fn check(&mut self, ok: bool, field: &str, message: &str) {
        if !ok {
            self.push(field, message);
        }
    }

    /// 必填文本
    pub fn require_text(&mut self, value: &str, field: &str) {
        self.check(!value.trim().is_empty(), field, "must not be empty");
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_result(self) -> Result<(), Vec<FieldViolation>> {
        if self.items.is_empty() {
            Ok(())
        } else {
            Err(self.items)
        }
    }
}

/// 年级范围 1–12
pub const MIN_GRADE_LEVEL: i32 = 1;
pub const MAX_GRADE_LEVEL: i32 = 12;

pub fn is_valid_grade_level(grade: i32) -> bool {
    (MIN_GRADE_LEVEL..=MAX_GRADE_LEVEL).contains(&grade)
}

/// 粗粒度邮箱格式校验（local@domain.tld）
pub fn is_plausible_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !email.contains(char::is_whitespace)
                && !domain.contains('@')
        }
        None => false,
    }
}
