// ==========================================
// 学校教务核心 - 分配/选课关系
// ==========================================
// 统一实体: 教师-学科 / 教师-班级 / 学生-学科 / 学生-班级
// 唯一性: (relation_kind, owner_id, target_id, academic_year_id)
// 红线: 行不重复、不删除，状态原地更新
// ==========================================

use crate::domain::types::{AssignmentStatus, RelationKind};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Assignment - 分配行
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub relation_kind: RelationKind,
    pub owner_id: i64,  // 教师/学生档案ID
    pub target_id: i64, // 学科/班级ID
    pub academic_year_id: i64,
    pub assigned_date: NaiveDate, // 分配/选课日期
    pub status: AssignmentStatus,

    // ===== 关系特有属性 =====
    pub is_primary_teacher: bool, // 教师-学科
    pub is_class_teacher: bool,   // 教师-班级
    pub grade: Option<String>,    // 学生-学科 成绩
    pub notes: Option<String>,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Assignment {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

// ==========================================
// AssignmentAttrs - 分配属性（assign 的输入）
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentAttrs {
    /// None 时使用操作当天
    pub assigned_date: Option<NaiveDate>,
    pub is_primary_teacher: bool,
    pub is_class_teacher: bool,
    pub grade: Option<String>,
    pub notes: Option<String>,
}

impl AssignmentAttrs {
    pub fn primary_teacher() -> Self {
        Self {
            is_primary_teacher: true,
            ..Default::default()
        }
    }

    pub fn class_teacher() -> Self {
        Self {
            is_class_teacher: true,
            ..Default::default()
        }
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.assigned_date = Some(date);
        self
    }
}

// ==========================================
// AssignmentKey - 分配行逻辑主键
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignmentKey {
    pub relation_kind: RelationKind,
    pub owner_id: i64,
    pub target_id: i64,
    pub academic_year_id: i64,
}

impl AssignmentKey {
    pub fn new(relation_kind: RelationKind, owner_id: i64, target_id: i64, academic_year_id: i64) -> Self {
        Self {
            relation_kind,
            owner_id,
            target_id,
            academic_year_id,
        }
    }
}

// ==========================================
// SyncReport - 集合同步结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub added: Vec<i64>,       // 新插入
    pub reactivated: Vec<i64>, // 原有行重新激活
    pub removed: Vec<i64>,     // 置为失效状态
    pub unchanged: Vec<i64>,   // 已生效，仅更新属性
}

impl SyncReport {
    pub fn changed_count(&self) -> usize {
        self.added.len() + self.reactivated.len() + self.removed.len()
    }
}
