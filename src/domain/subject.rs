// ==========================================
// 学校教务核心 - 学科领域模型
// ==========================================
// 约束: primary_teacher 必须同时出现在学科的教师分配集中
// ==========================================

use crate::domain::validation::{is_valid_grade_level, FieldViolation, Violations};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ==========================================
// Subject - 学科
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub code: String, // 唯一，大写存储
    pub description: Option<String>,
    pub credit_hours: f64,
    pub department: Option<String>,
    pub is_core: bool,                   // 必修/选修
    pub grade_levels: BTreeSet<i32>,     // 适用年级，空集表示全部年级
    pub primary_teacher_id: Option<i64>, // 主讲教师
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Subject {
    /// 学科是否适用于指定年级
    pub fn applies_to_grade(&self, grade_level: i32) -> bool {
        self.grade_levels.is_empty() || self.grade_levels.contains(&grade_level)
    }
}

// ==========================================
// SubjectDraft - 创建/更新输入
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectDraft {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub credit_hours: f64,
    pub department: Option<String>,
    pub is_core: bool,
    pub grade_levels: BTreeSet<i32>,
}

impl SubjectDraft {
    pub fn new(name: &str, code: &str) -> Self {
        Self {
            name: name.to_string(),
            code: code.to_string(),
            description: None,
            credit_hours: 1.0,
            department: None,
            is_core: false,
            grade_levels: BTreeSet::new(),
        }
    }

    pub fn for_grades(mut self, grades: &[i32]) -> Self {
        self.grade_levels = grades.iter().copied().collect();
        self
    }

    pub fn core(mut self) -> Self {
        self.is_core = true;
        self
    }

    pub fn normalized_code(&self) -> String {
        self.code.trim().to_uppercase()
    }

    pub fn validate(&self) -> Result<(), Vec<FieldViolation>> {
        let mut v = Violations::new();
        v.require_text(&self.name, "name");
        v.require_text(&self.code, "code");
        v.check(self.code.trim().chars().count() <= 20, "code", "must be at most 20 characters");
        v.check(
            self.credit_hours.is_finite() && self.credit_hours >= 0.0,
            "credit_hours",
            "must be a non-negative number",
        );
        v.check(
            self.grade_levels.iter().all(|g| is_valid_grade_level(*g)),
            "grade_levels",
            "every grade level must be between 1 and 12",
        );
        v.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_applicability() {
        let draft = SubjectDraft::new("Algebra", " alg-101 ").for_grades(&[9, 10]);
        assert!(draft.validate().is_ok());
        assert_eq!(draft.normalized_code(), "ALG-101");

        let bad = SubjectDraft::new("Algebra", "ALG").for_grades(&[0, 10]);
        assert_eq!(bad.validate().unwrap_err()[0].field, "grade_levels");
    }
}
