// ==========================================
// 学校教务核心 - 身份管理 API
// ==========================================
// 职责: 身份启停（级联档案状态）、角色标签授予/撤销
// 红线: 身份记录不物理删除
// 红线: SUPER_ADMIN 标签只能由 SuperAdmin 变更
// ==========================================

use serde_json::json;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::record_action;
use crate::api::validator::AccessValidator;
use crate::domain::action_log::ActionType;
use crate::domain::identity::{Actor, User, UserDraft};
use crate::domain::types::{EntityKind, RelationKind, Role, StudentStatus, TeacherStatus};
use crate::repository::assignment_repo::AssignmentRepository;
use crate::repository::class_repo::SchoolClassRepository;
use crate::repository::student_repo::StudentRepository;
use crate::repository::subject_repo::SubjectRepository;
use crate::repository::teacher_repo::TeacherRepository;
use crate::repository::transaction::{write_transaction, SharedConnection};
use crate::repository::user_repo::UserRepository;
use rusqlite::Connection;

/// 事务内创建身份记录（邮箱唯一）
pub(crate) fn create_identity_tx(conn: &Connection, draft: &UserDraft, roles: &[Role]) -> ApiResult<i64> {
    ensure_email_free_tx(conn, draft, None)?;
    Ok(UserRepository::insert_tx(conn, draft, roles)?)
}

pub(crate) fn ensure_email_free_tx(conn: &Connection, draft: &UserDraft, except_id: Option<i64>) -> ApiResult<()> {
    match UserRepository::find_by_email_tx(conn, &draft.normalized_email())? {
        Some(other) if Some(other.id) != except_id => Err(ApiError::UniquenessConflict {
            field: "users.email".to_string(),
        }),
        _ => Ok(()),
    }
}

// ==========================================
// UserApi - 身份管理 API
// ==========================================
pub struct UserApi {
    conn: SharedConnection,
    user_repo: Arc<UserRepository>,
}

impl UserApi {
    pub fn new(conn: SharedConnection, user_repo: Arc<UserRepository>) -> Self {
        Self { conn, user_repo }
    }

    fn load_tx(conn: &Connection, id: i64) -> ApiResult<User> {
        UserRepository::find_by_id_tx(conn, id)?.ok_or_else(|| ApiError::not_found("User", id))
    }

    /// 停用身份
    ///
    /// # 级联（同一事务）
    /// - 教师档案 → INACTIVE，生效分配 → UNASSIGNED，主讲/班主任标记清除
    /// - 学生档案 → INACTIVE，生效选课 → DROPPED（释放班级名额）
    pub fn deactivate_user(&self, actor: &Actor, user_id: i64) -> ApiResult<User> {
        AccessValidator::require_admin(actor, "deactivate user")?;

        let result = write_transaction(&self.conn, |tx| -> ApiResult<User> {
            let user = Self::load_tx(tx, user_id)?;
            if user.has_role(Role::SuperAdmin) && !actor.is_super_admin() {
                return Err(ApiError::PermissionDenied("停用超级管理员需要超级管理员权限".to_string()));
            }
            UserRepository::set_active_tx(tx, user_id, false)?;

            let mut released = 0usize;
            if let Some(teacher) = TeacherRepository::find_by_user_id_tx(tx, user_id)? {
                TeacherRepository::set_status_tx(tx, teacher.id, TeacherStatus::Inactive)?;
                released += AssignmentRepository::deactivate_all_for_owner_tx(tx, RelationKind::TeacherSubject, teacher.id)?;
                released += AssignmentRepository::deactivate_all_for_owner_tx(tx, RelationKind::TeacherClass, teacher.id)?;
                SubjectRepository::clear_primary_teacher_for_tx(tx, teacher.id)?;
                SchoolClassRepository::clear_class_teacher_for_tx(tx, teacher.id)?;
            }
            if let Some(student) = StudentRepository::find_by_user_id_tx(tx, user_id)? {
                StudentRepository::set_status_tx(tx, student.id, StudentStatus::Inactive)?;
                released += AssignmentRepository::deactivate_all_for_owner_tx(tx, RelationKind::StudentClass, student.id)?;
                released +=
                    AssignmentRepository::deactivate_all_for_owner_tx(tx, RelationKind::StudentSubject, student.id)?;
            }

            record_action(
                tx,
                actor,
                ActionType::DeactivateUser,
                EntityKind::User,
                user_id,
                json!({ "released_assignments": released }),
            )?;
            Self::load_tx(tx, user_id)
        });

        match &result {
            Ok(_) => tracing::info!(user_id, "身份已停用"),
            Err(e) => tracing::warn!(user_id, code = e.code(), "身份停用被拒绝: {}", e),
        }
        result
    }

    /// 重新启用身份
    ///
    /// # 说明
    /// - 仅把 INACTIVE 的档案恢复为 ACTIVE / ENROLLED
    /// - 已失效的分配不会自动恢复
    pub fn activate_user(&self, actor: &Actor, user_id: i64) -> ApiResult<User> {
        AccessValidator::require_admin(actor, "activate user")?;

        let user = write_transaction(&self.conn, |tx| -> ApiResult<User> {
            Self::load_tx(tx, user_id)?;
            UserRepository::set_active_tx(tx, user_id, true)?;
            if let Some(teacher) = TeacherRepository::find_by_user_id_tx(tx, user_id)? {
                if teacher.status == TeacherStatus::Inactive {
                    TeacherRepository::set_status_tx(tx, teacher.id, TeacherStatus::Active)?;
                }
            }
            if let Some(student) = StudentRepository::find_by_user_id_tx(tx, user_id)? {
                if student.status == StudentStatus::Inactive {
                    StudentRepository::set_status_tx(tx, student.id, StudentStatus::Enrolled)?;
                }
            }
            record_action(tx, actor, ActionType::ActivateUser, EntityKind::User, user_id, json!({}))?;
            Self::load_tx(tx, user_id)
        })?;

        tracing::info!(user_id, "身份已启用");
        Ok(user)
    }

    /// 授予角色标签（已持有时为幂等操作）
    pub fn assign_role(&self, actor: &Actor, user_id: i64, role: Role) -> ApiResult<User> {
        AccessValidator::require_role_grant(actor, role)?;

        write_transaction(&self.conn, |tx| -> ApiResult<User> {
            Self::load_tx(tx, user_id)?;
            let added = UserRepository::add_role_tx(tx, user_id, role)?;
            if added {
                record_action(
                    tx,
                    actor,
                    ActionType::AssignRole,
                    EntityKind::User,
                    user_id,
                    json!({ "role": role.to_db_str() }),
                )?;
                tracing::info!(user_id, role = role.to_db_str(), "角色已授予");
            }
            Self::load_tx(tx, user_id)
        })
    }

    /// 撤销角色标签
    pub fn revoke_role(&self, actor: &Actor, user_id: i64, role: Role) -> ApiResult<User> {
        AccessValidator::require_role_grant(actor, role)?;

        write_transaction(&self.conn, |tx| -> ApiResult<User> {
            Self::load_tx(tx, user_id)?;
            let removed = UserRepository::remove_role_tx(tx, user_id, role)?;
            if removed {
                record_action(
                    tx,
                    actor,
                    ActionType::RevokeRole,
                    EntityKind::User,
                    user_id,
                    json!({ "role": role.to_db_str() }),
                )?;
                tracing::info!(user_id, role = role.to_db_str(), "角色已撤销");
            }
            Self::load_tx(tx, user_id)
        })
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get(&self, user_id: i64) -> ApiResult<User> {
        self.user_repo
            .find_by_id(user_id)?
            .ok_or_else(|| ApiError::not_found("User", user_id))
    }

    /// 按邮箱查询（大小写不敏感）
    pub fn get_by_email(&self, email: &str) -> ApiResult<User> {
        self.user_repo
            .find_by_email(email)?
            .ok_or_else(|| ApiError::not_found("User", email.trim().to_lowercase()))
    }
}
