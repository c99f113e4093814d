// ==========================================
// 学校教务核心 - 学年领域模型
// ==========================================
// 红线: 全系统最多一个当前学年 (is_current)
// 生命周期: 管理员创建，有关联数据后只停用不删除
// ==========================================

use crate::domain::validation::{FieldViolation, Violations};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// AcademicYear - 学年
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicYear {
    pub id: i64,
    pub name: String,          // 唯一，如 "2024-2025"
    pub start_date: NaiveDate, // 开始日期
    pub end_date: NaiveDate,   // 结束日期 (> start_date)
    pub is_current: bool,      // 当前学年（全局单例）
    pub is_active: bool,       // 软停用标志
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl AcademicYear {
    /// 日期是否落在学年区间内（含首尾）
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// 学年天数
    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }
}

// ==========================================
// AcademicYearDraft - 创建/更新输入
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicYearDraft {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_current: bool,
}

impl AcademicYearDraft {
    pub fn new(name: &str, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            name: name.to_string(),
            start_date,
            end_date,
            is_current: false,
        }
    }

    pub fn current(mut self) -> Self {
        self.is_current = true;
        self
    }

    pub fn validate(&self) -> Result<(), Vec<FieldViolation>> {
        let mut v = Violations::new();
        v.require_text(&self.name, "name");
        v.check(self.name.chars().count() <= 100, "name", "must be at most 100 characters");
        v.check(
            self.end_date > self.start_date,
            "end_date",
            "must be after start_date",
        );
        v.into_result()
    }
}
