// ==========================================
// 学校教务核心 - 班级管理 API
// ==========================================
// 职责: 班级创建/更新/停用/启用，花名册查询
// 红线: (年级, 分班, 学年) 唯一；容量不得低于当前在读人数
// ==========================================

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::api::enrollment_api::assign_tx;
use crate::api::error::{ApiError, ApiResult};
use crate::api::record_action;
use crate::api::validator::{validate_draft, AccessValidator};
use crate::config::ConfigManager;
use crate::domain::action_log::ActionType;
use crate::domain::assignment::{Assignment, AssignmentAttrs};
use crate::domain::identity::Actor;
use crate::domain::school_class::{SchoolClass, SchoolClassDraft};
use crate::domain::types::{EntityKind, RelationKind};
use crate::engine::{AcademicYearRules, EnrollmentCore, RuleViolation};
use crate::repository::academic_year_repo::AcademicYearRepository;
use crate::repository::assignment_repo::AssignmentRepository;
use crate::repository::class_repo::SchoolClassRepository;
use crate::repository::transaction::{lock, write_transaction, SharedConnection};
use rusqlite::Connection;

/// 班级花名册
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRoster {
    pub class: SchoolClass,
    pub enrolled: i64,
    pub remaining_seats: i64,
    pub students: Vec<Assignment>,
    pub teachers: Vec<Assignment>,
}

// ==========================================
// ClassApi - 班级管理 API
// ==========================================
pub struct ClassApi {
    conn: SharedConnection,
    class_repo: Arc<SchoolClassRepository>,
}

impl ClassApi {
    pub fn new(conn: SharedConnection, class_repo: Arc<SchoolClassRepository>) -> Self {
        Self { conn, class_repo }
    }

    fn load_tx(conn: &Connection, id: i64) -> ApiResult<SchoolClass> {
        SchoolClassRepository::find_by_id_tx(conn, id)?.ok_or_else(|| ApiError::not_found("SchoolClass", id))
    }

    fn ensure_slot_free_tx(conn: &Connection, draft: &SchoolClassDraft, except_id: Option<i64>) -> ApiResult<()> {
        match SchoolClassRepository::find_by_slot_tx(conn, draft.grade_level, &draft.section, draft.academic_year_id)? {
            Some(other) if Some(other.id) != except_id => Err(ApiError::UniquenessConflict {
                field: "school_class.section".to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn require_active_year_tx(conn: &Connection, year_id: i64) -> ApiResult<()> {
        let year = AcademicYearRepository::find_by_id_tx(conn, year_id)?
            .ok_or_else(|| ApiError::not_found("AcademicYear", year_id))?;
        AcademicYearRules::require_active(&year)?;
        Ok(())
    }

    /// 创建班级
    ///
    /// # 说明
    /// - capacity 缺省时取配置项 class.default_capacity
    /// - class_teacher_id 给定时，同一事务内建立班主任分配
    pub fn create(&self, actor: &Actor, draft: &SchoolClassDraft) -> ApiResult<SchoolClass> {
        AccessValidator::require_admin(actor, "create class")?;
        validate_draft(draft.validate())?;

        let class = write_transaction(&self.conn, |tx| -> ApiResult<SchoolClass> {
            Self::require_active_year_tx(tx, draft.academic_year_id)?;
            Self::ensure_slot_free_tx(tx, draft, None)?;

            let capacity = match draft.capacity {
                Some(capacity) => capacity,
                None => ConfigManager::settings_tx(tx)?.class_default_capacity,
            };

            // 班主任字段由分配规则回写
            let mut insert_draft = draft.clone();
            insert_draft.class_teacher_id = None;
            let id = SchoolClassRepository::insert_tx(tx, &insert_draft, capacity)?;

            if let Some(teacher_id) = draft.class_teacher_id {
                assign_tx(
                    tx,
                    RelationKind::TeacherClass,
                    teacher_id,
                    id,
                    draft.academic_year_id,
                    &AssignmentAttrs::class_teacher(),
                )?;
            }

            record_action(
                tx,
                actor,
                ActionType::CreateClass,
                EntityKind::SchoolClass,
                id,
                json!({
                    "name": draft.name.trim(),
                    "grade_level": draft.grade_level,
                    "section": draft.section.trim().to_uppercase(),
                    "capacity": capacity,
                    "academic_year_id": draft.academic_year_id,
                    "class_teacher_id": draft.class_teacher_id,
                }),
            )?;
            Self::load_tx(tx, id)
        })?;

        tracing::info!(class_id = class.id, name = %class.display_name(), "班级已创建");
        Ok(class)
    }

    /// 更新班级
    ///
    /// # 规则
    /// - 容量低于当前在读人数 → Conflict
    /// - 已有生效分配时不允许更换学年 → Conflict
    /// - class_teacher_id 变化时同步班主任分配
    pub fn update(&self, actor: &Actor, id: i64, draft: &SchoolClassDraft) -> ApiResult<SchoolClass> {
        AccessValidator::require_admin(actor, "update class")?;
        validate_draft(draft.validate())?;

        let result = write_transaction(&self.conn, |tx| -> ApiResult<SchoolClass> {
            let existing = Self::load_tx(tx, id)?;
            Self::ensure_slot_free_tx(tx, draft, Some(id))?;

            let enrolled =
                AssignmentRepository::count_active_for_target_tx(tx, RelationKind::StudentClass, id, existing.academic_year_id)?;

            if draft.academic_year_id != existing.academic_year_id {
                let teachers = AssignmentRepository::count_active_for_target_tx(
                    tx,
                    RelationKind::TeacherClass,
                    id,
                    existing.academic_year_id,
                )?;
                if enrolled + teachers > 0 {
                    return Err(RuleViolation::ClassHasEnrollments {
                        class_id: id,
                        enrolled: enrolled + teachers,
                    }
                    .into());
                }
                Self::require_active_year_tx(tx, draft.academic_year_id)?;
            }

            let capacity = draft.capacity.unwrap_or(existing.capacity);
            EnrollmentCore::check_capacity_change(id, enrolled, capacity)?;
            SchoolClassRepository::update_tx(tx, id, draft, capacity)?;

            match (draft.class_teacher_id, existing.class_teacher_id) {
                (Some(new_teacher), current) if current != Some(new_teacher) => {
                    assign_tx(
                        tx,
                        RelationKind::TeacherClass,
                        new_teacher,
                        id,
                        draft.academic_year_id,
                        &AssignmentAttrs::class_teacher(),
                    )?;
                }
                (None, Some(_)) => {
                    AssignmentRepository::clear_class_teacher_tx(tx, id, draft.academic_year_id, None)?;
                    SchoolClassRepository::set_class_teacher_tx(tx, id, None)?;
                }
                _ => {}
            }

            record_action(
                tx,
                actor,
                ActionType::UpdateClass,
                EntityKind::SchoolClass,
                id,
                json!({
                    "name": draft.name.trim(),
                    "capacity": capacity,
                    "academic_year_id": draft.academic_year_id,
                    "class_teacher_id": draft.class_teacher_id,
                }),
            )?;
            Self::load_tx(tx, id)
        });

        match &result {
            Ok(_) => tracing::info!(class_id = id, "班级已更新"),
            Err(e) => tracing::warn!(class_id = id, code = e.code(), "班级更新被拒绝: {}", e),
        }
        result
    }

    /// 停用班级（仍有在读学生 → Conflict）
    pub fn deactivate(&self, actor: &Actor, id: i64) -> ApiResult<SchoolClass> {
        AccessValidator::require_admin(actor, "deactivate class")?;

        let result = write_transaction(&self.conn, |tx| -> ApiResult<SchoolClass> {
            let existing = Self::load_tx(tx, id)?;
            let enrolled = AssignmentRepository::count_active_for_target_tx(
                tx,
                RelationKind::StudentClass,
                id,
                existing.academic_year_id,
            )?;
            if enrolled > 0 {
                return Err(RuleViolation::ClassHasEnrollments { class_id: id, enrolled }.into());
            }
            SchoolClassRepository::set_active_tx(tx, id, false)?;
            record_action(
                tx,
                actor,
                ActionType::DeactivateClass,
                EntityKind::SchoolClass,
                id,
                json!({ "name": existing.name }),
            )?;
            Self::load_tx(tx, id)
        });

        match &result {
            Ok(_) => tracing::info!(class_id = id, "班级已停用"),
            Err(e) => tracing::warn!(class_id = id, code = e.code(), "班级停用被拒绝: {}", e),
        }
        result
    }

    pub fn activate(&self, actor: &Actor, id: i64) -> ApiResult<SchoolClass> {
        AccessValidator::require_admin(actor, "activate class")?;

        write_transaction(&self.conn, |tx| -> ApiResult<SchoolClass> {
            Self::load_tx(tx, id)?;
            SchoolClassRepository::set_active_tx(tx, id, true)?;
            record_action(tx, actor, ActionType::ActivateClass, EntityKind::SchoolClass, id, json!({}))?;
            Self::load_tx(tx, id)
        })
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get(&self, id: i64) -> ApiResult<SchoolClass> {
        self.class_repo
            .find_by_id(id)?
            .ok_or_else(|| ApiError::not_found("SchoolClass", id))
    }

    pub fn list_by_year(&self, academic_year_id: i64, include_inactive: bool) -> ApiResult<Vec<SchoolClass>> {
        Ok(self.class_repo.list_by_year(academic_year_id, include_inactive)?)
    }

    /// 花名册：生效的学生与教师分配
    pub fn roster(&self, id: i64) -> ApiResult<ClassRoster> {
        let conn = lock(&self.conn)?;
        let class = Self::load_tx(&conn, id)?;
        let students =
            AssignmentRepository::list_active_for_target_tx(&conn, RelationKind::StudentClass, id, class.academic_year_id)?;
        let teachers =
            AssignmentRepository::list_active_for_target_tx(&conn, RelationKind::TeacherClass, id, class.academic_year_id)?;
        let enrolled = students.len() as i64;

        Ok(ClassRoster {
            remaining_seats: class.remaining_seats(enrolled),
            enrolled,
            class,
            students,
            teachers,
        })
    }
}
