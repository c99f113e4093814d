// ==========================================
// 学校教务核心 - 学年管理 API
// ==========================================
// 职责: 学年创建/更新/切换当前/停用/启用，学年查询
// 红线: 任一时刻至多一个当前学年（事务 + 部分唯一索引）
// 红线: 学年不物理删除
// ==========================================

use serde_json::json;
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::record_action;
use crate::api::validator::{validate_draft, AccessValidator};
use crate::domain::academic_year::{AcademicYear, AcademicYearDraft};
use crate::domain::action_log::ActionType;
use crate::domain::identity::Actor;
use crate::domain::types::EntityKind;
use crate::engine::AcademicYearRules;
use crate::repository::academic_year_repo::AcademicYearRepository;
use crate::repository::transaction::{write_transaction, SharedConnection};
use rusqlite::Connection;

// ==========================================
// AcademicYearApi - 学年管理 API
// ==========================================
pub struct AcademicYearApi {
    conn: SharedConnection,
    year_repo: Arc<AcademicYearRepository>,
}

impl AcademicYearApi {
    pub fn new(conn: SharedConnection, year_repo: Arc<AcademicYearRepository>) -> Self {
        Self { conn, year_repo }
    }

    fn load_tx(conn: &Connection, id: i64) -> ApiResult<AcademicYear> {
        AcademicYearRepository::find_by_id_tx(conn, id)?.ok_or_else(|| ApiError::not_found("AcademicYear", id))
    }

    fn ensure_name_free_tx(conn: &Connection, name: &str, except_id: Option<i64>) -> ApiResult<()> {
        match AcademicYearRepository::find_by_name_tx(conn, name)? {
            Some(other) if Some(other.id) != except_id => Err(ApiError::UniquenessConflict {
                field: "academic_year.name".to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// 创建学年
    ///
    /// # 说明
    /// - draft.is_current=true 时，同一事务内先清除其他当前学年
    pub fn create(&self, actor: &Actor, draft: &AcademicYearDraft) -> ApiResult<AcademicYear> {
        AccessValidator::require_admin(actor, "create academic year")?;
        validate_draft(draft.validate())?;

        let year = write_transaction(&self.conn, |tx| -> ApiResult<AcademicYear> {
            Self::ensure_name_free_tx(tx, &draft.name, None)?;
            let id = AcademicYearRepository::insert_tx(tx, draft)?;
            record_action(
                tx,
                actor,
                ActionType::CreateAcademicYear,
                EntityKind::AcademicYear,
                id,
                json!({ "name": draft.name.trim(), "is_current": draft.is_current }),
            )?;
            Self::load_tx(tx, id)
        })?;

        tracing::info!(academic_year_id = year.id, name = %year.name, "学年已创建");
        Ok(year)
    }

    /// 更新学年
    ///
    /// # 说明
    /// - is_current=false 不会取消当前学年；切换只能经由 set_current
    pub fn update(&self, actor: &Actor, id: i64, draft: &AcademicYearDraft) -> ApiResult<AcademicYear> {
        AccessValidator::require_admin(actor, "update academic year")?;
        validate_draft(draft.validate())?;

        let year = write_transaction(&self.conn, |tx| -> ApiResult<AcademicYear> {
            let existing = Self::load_tx(tx, id)?;
            Self::ensure_name_free_tx(tx, &draft.name, Some(id))?;
            if draft.is_current && !existing.is_current {
                AcademicYearRules::check_can_become_current(&existing)?;
            }
            AcademicYearRepository::update_tx(tx, id, draft)?;
            record_action(
                tx,
                actor,
                ActionType::UpdateAcademicYear,
                EntityKind::AcademicYear,
                id,
                json!({
                    "name": draft.name.trim(),
                    "start_date": draft.start_date,
                    "end_date": draft.end_date,
                    "is_current": draft.is_current,
                }),
            )?;
            Self::load_tx(tx, id)
        })?;

        tracing::info!(academic_year_id = id, "学年已更新");
        Ok(year)
    }

    /// 设为当前学年（同一事务内先清后设）
    pub fn set_current(&self, actor: &Actor, id: i64) -> ApiResult<AcademicYear> {
        AccessValidator::require_admin(actor, "set current academic year")?;

        let year = write_transaction(&self.conn, |tx| -> ApiResult<AcademicYear> {
            let existing = Self::load_tx(tx, id)?;
            AcademicYearRules::check_can_become_current(&existing)?;
            let previous = AcademicYearRepository::find_current_tx(tx)?.map(|y| y.id);
            AcademicYearRepository::set_current_tx(tx, id)?;
            record_action(
                tx,
                actor,
                ActionType::SetCurrentAcademicYear,
                EntityKind::AcademicYear,
                id,
                json!({ "previous_current_id": previous }),
            )?;
            Self::load_tx(tx, id)
        })?;

        tracing::info!(academic_year_id = id, "当前学年已切换");
        Ok(year)
    }

    /// 停用学年
    ///
    /// # 规则
    /// - 当前学年 → Conflict
    /// - 仍有学生或班级引用 → Conflict
    pub fn deactivate(&self, actor: &Actor, id: i64) -> ApiResult<AcademicYear> {
        AccessValidator::require_admin(actor, "deactivate academic year")?;

        let result = write_transaction(&self.conn, |tx| -> ApiResult<AcademicYear> {
            let existing = Self::load_tx(tx, id)?;
            let (students, classes) = AcademicYearRepository::count_dependents_tx(tx, id)?;
            AcademicYearRules::check_deactivation(&existing, students, classes)?;
            AcademicYearRepository::set_active_tx(tx, id, false)?;
            record_action(
                tx,
                actor,
                ActionType::DeactivateAcademicYear,
                EntityKind::AcademicYear,
                id,
                json!({ "name": existing.name }),
            )?;
            Self::load_tx(tx, id)
        });

        match &result {
            Ok(_) => tracing::info!(academic_year_id = id, "学年已停用"),
            Err(e) => tracing::warn!(academic_year_id = id, error = %e, "学年停用被拒绝"),
        }
        result
    }

    pub fn activate(&self, actor: &Actor, id: i64) -> ApiResult<AcademicYear> {
        AccessValidator::require_admin(actor, "activate academic year")?;

        write_transaction(&self.conn, |tx| -> ApiResult<AcademicYear> {
            Self::load_tx(tx, id)?;
            AcademicYearRepository::set_active_tx(tx, id, true)?;
            record_action(
                tx,
                actor,
                ActionType::ActivateAcademicYear,
                EntityKind::AcademicYear,
                id,
                json!({}),
            )?;
            Self::load_tx(tx, id)
        })
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get(&self, id: i64) -> ApiResult<AcademicYear> {
        self.year_repo
            .find_by_id(id)?
            .ok_or_else(|| ApiError::not_found("AcademicYear", id))
    }

    pub fn current(&self) -> ApiResult<Option<AcademicYear>> {
        Ok(self.year_repo.find_current()?)
    }

    pub fn list(&self, include_inactive: bool) -> ApiResult<Vec<AcademicYear>> {
        Ok(self.year_repo.list(include_inactive)?)
    }
}
