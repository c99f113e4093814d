// ==========================================
// 学校教务核心 - 学科管理 API
// ==========================================
// 职责: 学科创建/更新/停用/启用，学科查询
// 约束: 主讲教师只经由教师-学科分配设置
// ==========================================

use serde_json::json;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::record_action;
use crate::api::validator::{validate_draft, AccessValidator};
use crate::domain::action_log::ActionType;
use crate::domain::identity::Actor;
use crate::domain::subject::{Subject, SubjectDraft};
use crate::domain::types::EntityKind;
use crate::repository::subject_repo::SubjectRepository;
use crate::repository::transaction::{write_transaction, SharedConnection};
use rusqlite::Connection;

pub struct SubjectApi {
    conn: SharedConnection,
    subject_repo: Arc<SubjectRepository>,
}

impl SubjectApi {
    pub fn new(conn: SharedConnection, subject_repo: Arc<SubjectRepository>) -> Self {
        Self { conn, subject_repo }
    }

    fn load_tx(conn: &Connection, id: i64) -> ApiResult<Subject> {
        SubjectRepository::find_by_id_tx(conn, id)?.ok_or_else(|| ApiError::not_found("Subject", id))
    }

    fn ensure_code_free_tx(conn: &Connection, code: &str, except_id: Option<i64>) -> ApiResult<()> {
        match SubjectRepository::find_by_code_tx(conn, code)? {
            Some(other) if Some(other.id) != except_id => Err(ApiError::UniquenessConflict {
                field: "subject.code".to_string(),
            }),
            _ => Ok(()),
        }
    }

    pub fn create(&self, actor: &Actor, draft: &SubjectDraft) -> ApiResult<Subject> {
        AccessValidator::require_admin(actor, "create subject")?;
        validate_draft(draft.validate())?;

        let subject = write_transaction(&self.conn, |tx| -> ApiResult<Subject> {
            Self::ensure_code_free_tx(tx, &draft.normalized_code(), None)?;
            let id = SubjectRepository::insert_tx(tx, draft)?;
            record_action(
                tx,
                actor,
                ActionType::CreateSubject,
                EntityKind::Subject,
                id,
                json!({
                    "code": draft.normalized_code(),
                    "name": draft.name.trim(),
                    "grade_levels": draft.grade_levels,
                }),
            )?;
            Self::load_tx(tx, id)
        })?;

        tracing::info!(subject_id = subject.id, code = %subject.code, "学科已创建");
        Ok(subject)
    }

    pub fn update(&self, actor: &Actor, id: i64, draft: &SubjectDraft) -> ApiResult<Subject> {
        AccessValidator::require_admin(actor, "update subject")?;
        validate_draft(draft.validate())?;

        let subject = write_transaction(&self.conn, |tx| -> ApiResult<Subject> {
            Self::load_tx(tx, id)?;
            Self::ensure_code_free_tx(tx, &draft.normalized_code(), Some(id))?;
            SubjectRepository::update_tx(tx, id, draft)?;
            record_action(
                tx,
                actor,
                ActionType::UpdateSubject,
                EntityKind::Subject,
                id,
                json!({
                    "code": draft.normalized_code(),
                    "credit_hours": draft.credit_hours,
                    "grade_levels": draft.grade_levels,
                }),
            )?;
            Self::load_tx(tx, id)
        })?;

        tracing::info!(subject_id = id, "学科已更新");
        Ok(subject)
    }

    /// 停用学科（已有分配行保留；停用后不再接受新分配）
    pub fn deactivate(&self, actor: &Actor, id: i64) -> ApiResult<Subject> {
        self.set_active(actor, id, false)
    }

    pub fn activate(&self, actor: &Actor, id: i64) -> ApiResult<Subject> {
        self.set_active(actor, id, true)
    }

    fn set_active(&self, actor: &Actor, id: i64, is_active: bool) -> ApiResult<Subject> {
        AccessValidator::require_admin(actor, "change subject activity")?;
        let action_type = if is_active {
            ActionType::ActivateSubject
        } else {
            ActionType::DeactivateSubject
        };

        let subject = write_transaction(&self.conn, |tx| -> ApiResult<Subject> {
            Self::load_tx(tx, id)?;
            SubjectRepository::set_active_tx(tx, id, is_active)?;
            record_action(tx, actor, action_type, EntityKind::Subject, id, json!({ "is_active": is_active }))?;
            Self::load_tx(tx, id)
        })?;

        tracing::info!(subject_id = id, is_active, "学科启停状态已变更");
        Ok(subject)
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get(&self, id: i64) -> ApiResult<Subject> {
        self.subject_repo
            .find_by_id(id)?
            .ok_or_else(|| ApiError::not_found("Subject", id))
    }

    /// 按学科代码查询（大小写不敏感）
    pub fn get_by_code(&self, code: &str) -> ApiResult<Subject> {
        self.subject_repo
            .find_by_code(code)?
            .ok_or_else(|| ApiError::not_found("Subject", code.trim().to_uppercase()))
    }

    pub fn list(&self, include_inactive: bool) -> ApiResult<Vec<Subject>> {
        Ok(self.subject_repo.list(include_inactive)?)
    }
}
