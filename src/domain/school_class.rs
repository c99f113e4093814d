// ==========================================
// 学校教务核心 - 班级领域模型
// ==========================================
// 唯一性: (grade_level, section, academic_year_id)
// 容量: 在选课时校验，不作为数据库约束
// ==========================================

use crate::domain::validation::{is_valid_grade_level, FieldViolation, Violations};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// SchoolClass - 班级 (Section)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchoolClass {
    pub id: i64,
    pub name: String,
    pub grade_level: i32,               // 1–12
    pub section: String,                // 分班标识，如 "A"
    pub capacity: i32,                  // > 0
    pub room_number: Option<String>,
    pub academic_year_id: i64,          // 所属学年
    pub class_teacher_id: Option<i64>,  // 班主任（可选，唯一）
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl SchoolClass {
    /// 展示名，如 "Grade 5 - A"
    pub fn display_name(&self) -> String {
        format!("Grade {} - {}", self.grade_level, self.section)
    }

    /// 剩余座位
    pub fn remaining_seats(&self, enrolled: i64) -> i64 {
        (self.capacity as i64 - enrolled).max(0)
    }
}

// ==========================================
// SchoolClassDraft - 创建/更新输入
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchoolClassDraft {
    pub name: String,
    pub grade_level: i32,
    pub section: String,
    /// None 时使用配置项 class.default_capacity
    pub capacity: Option<i32>,
    pub room_number: Option<String>,
    pub academic_year_id: i64,
    pub class_teacher_id: Option<i64>,
}

impl SchoolClassDraft {
    pub fn new(name: &str, grade_level: i32, section: &str, academic_year_id: i64) -> Self {
        Self {
            name: name.to_string(),
            grade_level,
            section: section.to_string(),
            capacity: None,
            room_number: None,
            academic_year_id,
            class_teacher_id: None,
        }
    }

    pub fn with_capacity(mut self, capacity: i32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn validate(&self) -> Result<(), Vec<FieldViolation>> {
        let mut v = Violations::new();
        v.require_text(&self.name, "name");
        v.require_text(&self.section, "section");
        v.check(
            self.section.chars().count() <= 10,
            "section",
            "must be at most 10 characters",
        );
        v.check(
            is_valid_grade_level(self.grade_level),
            "grade_level",
            "must be between 1 and 12",
        );
        if let Some(capacity) = self.capacity {
            v.check(capacity > 0, "capacity", "must be greater than 0");
        }
        v.into_result()
    }
}
