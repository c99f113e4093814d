// ==========================================
// 学校教务核心 - 教师管理 API
// ==========================================
// 职责: 教师建档（身份 + 角色 + 档案 + 分配，一个事务）、档案更新、查询
// 红线: 任一步失败整体回滚，不留孤立身份
// ==========================================

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::api::enrollment_api::assign_tx;
use crate::api::error::{ApiError, ApiResult};
use crate::api::record_action;
use crate::api::user_api::{create_identity_tx, ensure_email_free_tx};
use crate::api::validator::{validate_all, AccessValidator};
use crate::config::ConfigManager;
use crate::domain::action_log::ActionType;
use crate::domain::assignment::AssignmentAttrs;
use crate::domain::identity::{Actor, UserDraft};
use crate::domain::teacher::{Teacher, TeacherProfileDraft};
use crate::domain::types::{EntityKind, RelationKind, Role, TeacherStatus};
use crate::engine::IdentifierGenerator;
use crate::repository::academic_year_repo::AcademicYearRepository;
use crate::repository::error::RepositoryError;
use crate::repository::teacher_repo::TeacherRepository;
use crate::repository::transaction::{write_transaction, SharedConnection};
use crate::repository::user_repo::UserRepository;
use rusqlite::Connection;

/// 教师建档请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTeacher {
    pub user: UserDraft,
    pub profile: TeacherProfileDraft,
    #[serde(default)]
    pub subject_ids: Vec<i64>,
    #[serde(default)]
    pub class_ids: Vec<i64>,
    /// None 时使用当前学年
    pub academic_year_id: Option<i64>,
}

impl NewTeacher {
    pub fn new(user: UserDraft, profile: TeacherProfileDraft) -> Self {
        Self {
            user,
            profile,
            subject_ids: Vec::new(),
            class_ids: Vec::new(),
            academic_year_id: None,
        }
    }

    fn has_assignments(&self) -> bool {
        !self.subject_ids.is_empty() || !self.class_ids.is_empty()
    }
}

// ==========================================
// TeacherApi - 教师管理 API
// ==========================================
pub struct TeacherApi {
    conn: SharedConnection,
    teacher_repo: Arc<TeacherRepository>,
}

impl TeacherApi {
    pub fn new(conn: SharedConnection, teacher_repo: Arc<TeacherRepository>) -> Self {
        Self { conn, teacher_repo }
    }

    fn load_tx(conn: &Connection, id: i64) -> ApiResult<Teacher> {
        TeacherRepository::find_by_id_tx(conn, id)?.ok_or_else(|| ApiError::not_found("Teacher", id))
    }

    /// 工号：给定时校验唯一，缺省时按 <前缀><入职年份><序号> 生成
    fn resolve_employee_id_tx(conn: &Connection, profile: &TeacherProfileDraft) -> ApiResult<String> {
        if let Some(given) = &profile.employee_id {
            let given = given.trim();
            if TeacherRepository::exists_employee_id_tx(conn, given)? {
                return Err(ApiError::UniquenessConflict {
                    field: "teacher.employee_id".to_string(),
                });
            }
            return Ok(given.to_string());
        }

        let prefix = ConfigManager::settings_tx(conn)?.teacher_id_prefix;
        let year = profile.hire_date.year();
        let existing = TeacherRepository::count_with_prefix_tx(conn, &IdentifierGenerator::stem(&prefix, year))?;
        let id = IdentifierGenerator::next_available::<RepositoryError>(&prefix, year, existing, |candidate| {
            TeacherRepository::exists_employee_id_tx(conn, candidate)
        })?;
        Ok(id)
    }

    fn resolve_year_tx(conn: &Connection, request: &NewTeacher) -> ApiResult<Option<i64>> {
        if !request.has_assignments() {
            return Ok(request.academic_year_id);
        }
        match request.academic_year_id {
            Some(id) => Ok(Some(id)),
            None => match AcademicYearRepository::find_current_tx(conn)? {
                Some(year) => Ok(Some(year.id)),
                None => Err(ApiError::invalid(
                    "academic_year_id",
                    "required when no academic year is current",
                )),
            },
        }
    }

    /// 教师建档
    ///
    /// # 流程（同一事务）
    /// 1. 创建身份记录并附加 TEACHER 角色
    /// 2. 解析/生成工号，写入档案
    /// 3. 建立学科、班级分配
    pub fn create(&self, actor: &Actor, request: &NewTeacher) -> ApiResult<Teacher> {
        AccessValidator::require_admin(actor, "create teacher")?;
        validate_all([request.user.validate(), request.profile.validate()])?;

        let result = write_transaction(&self.conn, |tx| -> ApiResult<Teacher> {
            let year_id = Self::resolve_year_tx(tx, request)?;
            let user_id = create_identity_tx(tx, &request.user, &[Role::Teacher])?;
            let employee_id = Self::resolve_employee_id_tx(tx, &request.profile)?;
            let teacher_id = TeacherRepository::insert_tx(tx, user_id, &employee_id, &request.profile)?;

            if let Some(year_id) = year_id {
                for subject_id in &request.subject_ids {
                    assign_tx(
                        tx,
                        RelationKind::TeacherSubject,
                        teacher_id,
                        *subject_id,
                        year_id,
                        &AssignmentAttrs::default(),
                    )?;
                }
                for class_id in &request.class_ids {
                    assign_tx(
                        tx,
                        RelationKind::TeacherClass,
                        teacher_id,
                        *class_id,
                        year_id,
                        &AssignmentAttrs::default(),
                    )?;
                }
            }

            record_action(
                tx,
                actor,
                ActionType::CreateTeacher,
                EntityKind::Teacher,
                teacher_id,
                json!({
                    "user_id": user_id,
                    "employee_id": employee_id,
                    "subject_ids": request.subject_ids,
                    "class_ids": request.class_ids,
                    "academic_year_id": year_id,
                }),
            )?;
            Self::load_tx(tx, teacher_id)
        });

        match &result {
            Ok(t) => tracing::info!(teacher_id = t.id, employee_id = %t.employee_id, "教师已建档"),
            Err(e) => tracing::warn!(email = %request.user.normalized_email(), code = e.code(), "教师建档失败: {}", e),
        }
        result
    }

    /// 更新教师身份与档案
    ///
    /// # 说明
    /// - profile.employee_id 为 None 时保持原工号
    /// - 状态变为 INACTIVE / TERMINATED 不会自动撤销分配
    pub fn update(
        &self,
        actor: &Actor,
        teacher_id: i64,
        user: &UserDraft,
        profile: &TeacherProfileDraft,
    ) -> ApiResult<Teacher> {
        AccessValidator::require_admin(actor, "update teacher")?;
        validate_all([user.validate(), profile.validate()])?;

        let teacher = write_transaction(&self.conn, |tx| -> ApiResult<Teacher> {
            let existing = Self::load_tx(tx, teacher_id)?;
            ensure_email_free_tx(tx, user, Some(existing.user_id))?;
            if let Some(employee_id) = &profile.employee_id {
                if employee_id.trim() != existing.employee_id
                    && TeacherRepository::exists_employee_id_tx(tx, employee_id)?
                {
                    return Err(ApiError::UniquenessConflict {
                        field: "teacher.employee_id".to_string(),
                    });
                }
            }
            UserRepository::update_tx(tx, existing.user_id, user)?;
            TeacherRepository::update_tx(tx, teacher_id, profile)?;
            record_action(
                tx,
                actor,
                ActionType::UpdateTeacher,
                EntityKind::Teacher,
                teacher_id,
                json!({
                    "status": profile.status.to_db_str(),
                    "department": profile.department,
                    "salary": profile.salary,
                }),
            )?;
            Self::load_tx(tx, teacher_id)
        })?;

        tracing::info!(teacher_id, "教师档案已更新");
        Ok(teacher)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get(&self, teacher_id: i64) -> ApiResult<Teacher> {
        self.teacher_repo
            .find_by_id(teacher_id)?
            .ok_or_else(|| ApiError::not_found("Teacher", teacher_id))
    }

    pub fn get_by_user(&self, user_id: i64) -> ApiResult<Teacher> {
        self.teacher_repo
            .find_by_user_id(user_id)?
            .ok_or_else(|| ApiError::not_found("Teacher", format!("user_id={}", user_id)))
    }

    pub fn list(&self, status: Option<TeacherStatus>) -> ApiResult<Vec<Teacher>> {
        Ok(self.teacher_repo.list_by_status(status)?)
    }
}
