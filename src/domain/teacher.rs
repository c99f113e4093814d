// ==========================================
// 学校教务核心 - 教师档案
// ==========================================
// 关系: 与 User 1:1，按学年拥有学科/班级分配
// ==========================================

use crate::domain::types::TeacherStatus;
use crate::domain::validation::{FieldViolation, Violations};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Teacher - 教师档案
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Teacher {
    pub id: i64,
    pub user_id: i64,
    pub employee_id: String, // 工号，唯一
    pub department: Option<String>,
    pub qualification: Option<String>,
    pub specialization: Option<String>,
    pub hire_date: NaiveDate,
    pub status: TeacherStatus,
    pub salary: f64,
    pub experience_years: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// TeacherProfileDraft - 档案输入
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherProfileDraft {
    /// None 时自动生成（teacher.id_prefix + 年份 + 序号）
    pub employee_id: Option<String>,
    pub department: Option<String>,
    pub qualification: Option<String>,
    pub specialization: Option<String>,
    pub hire_date: NaiveDate,
    pub status: TeacherStatus,
    pub salary: f64,
    pub experience_years: i32,
}

impl TeacherProfileDraft {
    pub fn new(hire_date: NaiveDate) -> Self {
        Self {
            employee_id: None,
            department: None,
            qualification: None,
            specialization: None,
            hire_date,
            status: TeacherStatus::Active,
            salary: 0.0,
            experience_years: 0,
        }
    }

    pub fn validate(&self) -> Result<(), Vec<FieldViolation>> {
        let mut v = Violations::new();
        if let Some(employee_id) = &self.employee_id {
            v.require_text(employee_id, "employee_id");
        }
        v.check(
            self.salary.is_finite() && self.salary >= 0.0,
            "salary",
            "must be a non-negative number",
        );
        v.check(self.experience_years >= 0, "experience_years", "must not be negative");
        v.into_result()
    }
}
