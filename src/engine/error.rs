// ==========================================
// 学校教务核心 - 业务规则违反
// ==========================================
// 约束: 只描述规则层面的拒绝原因，不含数据库细节
// ==========================================

use crate::domain::types::AssignmentStatus;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleViolation {
    // ===== 学年 =====
    #[error("当前学年不可停用: academic_year_id={year_id}")]
    CurrentYearLocked { year_id: i64 },

    #[error("学年仍有依赖数据: academic_year_id={year_id}, students={students}, classes={classes}")]
    YearHasDependents {
        year_id: i64,
        students: i64,
        classes: i64,
    },

    #[error("学年已停用: academic_year_id={year_id}")]
    YearInactive { year_id: i64 },

    // ===== 分配/选课 =====
    #[error("班级已满: class_id={class_id}, enrolled={enrolled}, capacity={capacity}")]
    CapacityExceeded {
        class_id: i64,
        enrolled: i64,
        capacity: i64,
    },

    #[error("非法状态迁移: {from} -> {to}")]
    IllegalTransition {
        from: AssignmentStatus,
        to: AssignmentStatus,
    },

    #[error("不可直接移除主讲教师: subject_id={subject_id}, teacher_id={teacher_id}")]
    PrimaryTeacherRemoval { subject_id: i64, teacher_id: i64 },

    #[error("学科不适用于该年级: subject={subject_code}, grade_level={grade_level}")]
    GradeNotApplicable { subject_code: String, grade_level: i32 },

    #[error("班级仍有在读学生: class_id={class_id}, enrolled={enrolled}")]
    ClassHasEnrollments { class_id: i64, enrolled: i64 },

    #[error("班级容量不能低于在读人数: class_id={class_id}, enrolled={enrolled}, capacity={capacity}")]
    CapacityBelowEnrollment {
        class_id: i64,
        enrolled: i64,
        capacity: i64,
    },

    #[error("档案状态不允许分配: {entity} id={id}, status={status}")]
    ProfileNotAssignable {
        entity: &'static str,
        id: i64,
        status: String,
    },

    #[error("目标已停用: {entity} id={id}")]
    TargetInactive { entity: &'static str, id: i64 },

    // ===== 学费 =====
    #[error("金额无效 (field={field}): {value}")]
    InvalidAmount { field: &'static str, value: f64 },
}

impl RuleViolation {
    /// 字段级规则（映射为 Validation），其余为状态冲突
    pub fn is_field_level(&self) -> bool {
        matches!(
            self,
            RuleViolation::InvalidAmount { .. } | RuleViolation::GradeNotApplicable { .. }
        )
    }

    /// 关联字段名（字段级规则使用）
    pub fn field(&self) -> Option<&'static str> {
        match self {
            RuleViolation::InvalidAmount { field, .. } => Some(field),
            RuleViolation::GradeNotApplicable { .. } => Some("subject_id"),
            _ => None,
        }
    }
}
