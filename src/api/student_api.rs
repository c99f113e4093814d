// ==========================================
// 学校教务核心 - 学生管理 API
// ==========================================
// 职责: 学生建档（身份 + 角色 + 档案 + 选课，一个事务）、档案更新、学费台账
// 红线: fees_pending 在仓储层写入时统一重算
// 宽松规则: 超额缴费接受，pending 压到 0
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
use crate::domain::student::{Student, StudentProfileDraft};
use crate::domain::types::{EntityKind, RelationKind, Role, StudentStatus};
use crate::engine::{AcademicYearRules, FeeLedgerEngine, FeeSnapshot, IdentifierGenerator};
use crate::repository::academic_year_repo::AcademicYearRepository;
use crate::repository::assignment_repo::AssignmentRepository;
use crate::repository::error::RepositoryError;
use crate::repository::student_repo::StudentRepository;
use crate::repository::transaction::{write_transaction, SharedConnection};
use crate::repository::user_repo::UserRepository;
use rusqlite::Connection;

/// 学生建档请求（选课学年取 profile.academic_year_id）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStudent {
    pub user: UserDraft,
    pub profile: StudentProfileDraft,
    pub class_id: Option<i64>,
    #[serde(default)]
    pub subject_ids: Vec<i64>,
}

impl NewStudent {
    pub fn new(user: UserDraft, profile: StudentProfileDraft) -> Self {
        Self {
            user,
            profile,
            class_id: None,
            subject_ids: Vec::new(),
        }
    }

    pub fn in_class(mut self, class_id: i64) -> Self {
        self.class_id = Some(class_id);
        self
    }
}

// ==========================================
// StudentApi - 学生管理 API
// ==========================================
pub struct StudentApi {
    conn: SharedConnection,
    student_repo: Arc<StudentRepository>,
}

impl StudentApi {
    pub fn new(conn: SharedConnection, student_repo: Arc<StudentRepository>) -> Self {
        Self { conn, student_repo }
    }

    fn load_tx(conn: &Connection, id: i64) -> ApiResult<Student> {
        StudentRepository::find_by_id_tx(conn, id)?.ok_or_else(|| ApiError::not_found("Student", id))
    }

    /// 学号：给定时校验唯一，缺省时按 <前缀><入学年份><序号> 生成
    fn resolve_student_id_tx(conn: &Connection, profile: &StudentProfileDraft) -> ApiResult<String> {
        if let Some(given) = &profile.student_id {
            let given = given.trim();
            if StudentRepository::exists_student_id_tx(conn, given)? {
                return Err(ApiError::UniquenessConflict {
                    field: "student.student_id".to_string(),
                });
            }
            return Ok(given.to_string());
        }

        let prefix = ConfigManager::settings_tx(conn)?.student_id_prefix;
        let year = profile.admission_date.year();
        let existing = StudentRepository::count_with_prefix_tx(conn, &IdentifierGenerator::stem(&prefix, year))?;
        let id = IdentifierGenerator::next_available::<RepositoryError>(&prefix, year, existing, |candidate| {
            StudentRepository::exists_student_id_tx(conn, candidate)
        })?;
        Ok(id)
    }

    /// 学生建档
    ///
    /// # 流程（同一事务）
    /// 1. 校验学年存在且启用
    /// 2. 创建身份记录并附加 STUDENT 角色
    /// 3. 解析/生成学号，写入档案（pending 按台账口径计算）
    /// 4. 先分班（容量检查），再选课（年级适用性依赖班级）
    pub fn create(&self, actor: &Actor, request: &NewStudent) -> ApiResult<Student> {
        AccessValidator::require_admin(actor, "create student")?;
        validate_all([request.user.validate(), request.profile.validate()])?;
        let year_id = request.profile.academic_year_id;

        let result = write_transaction(&self.conn, |tx| -> ApiResult<Student> {
            let year = AcademicYearRepository::find_by_id_tx(tx, year_id)?
                .ok_or_else(|| ApiError::not_found("AcademicYear", year_id))?;
            AcademicYearRules::require_active(&year)?;

            let user_id = create_identity_tx(tx, &request.user, &[Role::Student])?;
            let student_code = Self::resolve_student_id_tx(tx, &request.profile)?;
            let student_id = StudentRepository::insert_tx(tx, user_id, &student_code, &request.profile)?;

            if let Some(class_id) = request.class_id {
                assign_tx(
                    tx,
                    RelationKind::StudentClass,
                    student_id,
                    class_id,
                    year_id,
                    &AssignmentAttrs::default(),
                )?;
            }
            for subject_id in &request.subject_ids {
                assign_tx(
                    tx,
                    RelationKind::StudentSubject,
                    student_id,
                    *subject_id,
                    year_id,
                    &AssignmentAttrs::default(),
                )?;
            }

            record_action(
                tx,
                actor,
                ActionType::CreateStudent,
                EntityKind::Student,
                student_id,
                json!({
                    "user_id": user_id,
                    "student_id": student_code,
                    "class_id": request.class_id,
                    "subject_ids": request.subject_ids,
                    "academic_year_id": year_id,
                }),
            )?;
            Self::load_tx(tx, student_id)
        });

        match &result {
            Ok(s) => tracing::info!(student_id = s.id, code = %s.student_id, "学生已建档"),
            Err(e) => tracing::warn!(email = %request.user.normalized_email(), code = e.code(), "学生建档失败: {}", e),
        }
        result
    }

    /// 更新学生身份与档案（学费字段随档案一起保存并重算 pending）
    pub fn update(
        &self,
        actor: &Actor,
        student_id: i64,
        user: &UserDraft,
        profile: &StudentProfileDraft,
    ) -> ApiResult<Student> {
        AccessValidator::require_admin(actor, "update student")?;
        validate_all([user.validate(), profile.validate()])?;

        let student = write_transaction(&self.conn, |tx| -> ApiResult<Student> {
            let existing = Self::load_tx(tx, student_id)?;
            ensure_email_free_tx(tx, user, Some(existing.user_id))?;
            if let Some(code) = &profile.student_id {
                if code.trim() != existing.student_id && StudentRepository::exists_student_id_tx(tx, code)? {
                    return Err(ApiError::UniquenessConflict {
                        field: "student.student_id".to_string(),
                    });
                }
            }
            if profile.academic_year_id != existing.academic_year_id {
                AcademicYearRepository::find_by_id_tx(tx, profile.academic_year_id)?
                    .ok_or_else(|| ApiError::not_found("AcademicYear", profile.academic_year_id))?;
            }
            UserRepository::update_tx(tx, existing.user_id, user)?;
            StudentRepository::update_tx(tx, student_id, profile)?;

            // 离开在读状态（转出/毕业/停用）时释放生效选课与班级名额
            let mut released = 0usize;
            if existing.status == StudentStatus::Enrolled && profile.status != StudentStatus::Enrolled {
                released += AssignmentRepository::deactivate_all_for_owner_tx(tx, RelationKind::StudentClass, student_id)?;
                released +=
                    AssignmentRepository::deactivate_all_for_owner_tx(tx, RelationKind::StudentSubject, student_id)?;
            }
            record_action(
                tx,
                actor,
                ActionType::UpdateStudent,
                EntityKind::Student,
                student_id,
                json!({
                    "status": profile.status.to_db_str(),
                    "academic_year_id": profile.academic_year_id,
                    "total_fees": profile.total_fees,
                    "fees_paid": profile.fees_paid,
                    "released_assignments": released,
                }),
            )?;
            Self::load_tx(tx, student_id)
        })?;

        tracing::info!(student_id, status = %student.status, "学生档案已更新");
        Ok(student)
    }

    /// 记录缴费
    ///
    /// # 规则
    /// - amount 必须 > 0（Validation）
    /// - 超额缴费接受，fees_pending 压到 0
    pub fn record_payment(&self, actor: &Actor, student_id: i64, amount: f64) -> ApiResult<Student> {
        AccessValidator::require_admin(actor, "record payment")?;

        let result = write_transaction(&self.conn, |tx| -> ApiResult<Student> {
            let existing = Self::load_tx(tx, student_id)?;
            let snapshot = FeeLedgerEngine::apply_payment(&existing, amount)?;
            Self::save_snapshot_tx(tx, actor, ActionType::RecordPayment, student_id, &snapshot, amount)?;
            Self::load_tx(tx, student_id)
        });

        match &result {
            Ok(s) => tracing::info!(
                student_id,
                amount,
                fees_paid = s.fees_paid,
                fees_pending = s.fees_pending,
                "缴费已记录"
            ),
            Err(e) => tracing::warn!(student_id, amount, code = e.code(), "缴费被拒绝: {}", e),
        }
        result
    }

    /// 调整应收总额（total >= 0）
    pub fn set_total_fees(&self, actor: &Actor, student_id: i64, total_fees: f64) -> ApiResult<Student> {
        AccessValidator::require_admin(actor, "set total fees")?;

        let student = write_transaction(&self.conn, |tx| -> ApiResult<Student> {
            let existing = Self::load_tx(tx, student_id)?;
            let snapshot = FeeLedgerEngine::apply_total(&existing, total_fees)?;
            Self::save_snapshot_tx(tx, actor, ActionType::SetTotalFees, student_id, &snapshot, total_fees)?;
            Self::load_tx(tx, student_id)
        })?;

        tracing::info!(student_id, total_fees, "应收学费已调整");
        Ok(student)
    }

    fn save_snapshot_tx(
        conn: &Connection,
        actor: &Actor,
        action_type: ActionType,
        student_id: i64,
        snapshot: &FeeSnapshot,
        input: f64,
    ) -> ApiResult<()> {
        StudentRepository::save_fees_tx(conn, student_id, snapshot.total_fees, snapshot.fees_paid)?;
        record_action(
            conn,
            actor,
            action_type,
            EntityKind::Student,
            student_id,
            json!({
                "input": input,
                "total_fees": snapshot.total_fees,
                "fees_paid": snapshot.fees_paid,
                "fees_pending": snapshot.fees_pending,
            }),
        )
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get(&self, student_id: i64) -> ApiResult<Student> {
        self.student_repo
            .find_by_id(student_id)?
            .ok_or_else(|| ApiError::not_found("Student", student_id))
    }

    pub fn get_by_user(&self, user_id: i64) -> ApiResult<Student> {
        self.student_repo
            .find_by_user_id(user_id)?
            .ok_or_else(|| ApiError::not_found("Student", format!("user_id={}", user_id)))
    }

    pub fn list_by_year(&self, academic_year_id: i64) -> ApiResult<Vec<Student>> {
        Ok(self.student_repo.list_by_year(academic_year_id)?)
    }
}
