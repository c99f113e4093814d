// ==========================================
// 学校教务核心 - 分配/选课 API
// ==========================================
// 职责: 四种关系（教师-学科/教师-班级/学生-学科/学生-班级）的
//       assign / unassign / sync_set / complete / record_grade
// 红线: 每个操作一个事务（IMMEDIATE），容量检查与写入在同一事务
// 红线: 主讲教师、班主任在 (目标, 学年) 内唯一
// 红线: 行不删除，只改状态
// ==========================================

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::record_action;
use crate::api::validator::AccessValidator;
use crate::domain::academic_year::AcademicYear;
use crate::domain::action_log::ActionType;
use crate::domain::assignment::{Assignment, AssignmentAttrs, AssignmentKey, SyncReport};
use crate::domain::identity::Actor;
use crate::domain::types::{AssignmentStatus, EntityKind, RelationKind, Role, StudentStatus};
use crate::engine::{AcademicYearRules, AssignPlan, EnrollmentCore, RuleViolation};
use crate::repository::academic_year_repo::AcademicYearRepository;
use crate::repository::assignment_repo::AssignmentRepository;
use crate::repository::class_repo::SchoolClassRepository;
use crate::repository::row_codec::today;
use crate::repository::student_repo::StudentRepository;
use crate::repository::subject_repo::SubjectRepository;
use crate::repository::teacher_repo::TeacherRepository;
use crate::repository::transaction::{write_transaction, SharedConnection};
use rusqlite::Connection;

/// 单次 assign 的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignOutcome {
    pub assignment: Assignment,
    /// inserted / reactivated / refreshed
    pub action: String,
}

// ==========================================
// 事务内核心步骤（供教师/学生/班级 API 复用）
// ==========================================

fn load_year_tx(conn: &Connection, year_id: i64) -> ApiResult<AcademicYear> {
    let year = AcademicYearRepository::find_by_id_tx(conn, year_id)?
        .ok_or_else(|| ApiError::not_found("AcademicYear", year_id))?;
    AcademicYearRules::require_active(&year)?;
    Ok(year)
}

/// 校验关系主体（教师/学生）存在且可接受分配
fn check_owner_tx(conn: &Connection, kind: RelationKind, owner_id: i64) -> ApiResult<()> {
    match kind.owner_kind() {
        EntityKind::Teacher => {
            let teacher = TeacherRepository::find_by_id_tx(conn, owner_id)?
                .ok_or_else(|| ApiError::not_found("Teacher", owner_id))?;
            if !teacher.status.accepts_assignments() {
                return Err(RuleViolation::ProfileNotAssignable {
                    entity: "Teacher",
                    id: owner_id,
                    status: teacher.status.to_string(),
                }
                .into());
            }
        }
        _ => {
            let student = StudentRepository::find_by_id_tx(conn, owner_id)?
                .ok_or_else(|| ApiError::not_found("Student", owner_id))?;
            if student.status != StudentStatus::Enrolled {
                return Err(RuleViolation::ProfileNotAssignable {
                    entity: "Student",
                    id: owner_id,
                    status: student.status.to_string(),
                }
                .into());
            }
        }
    }
    Ok(())
}

/// 关系特有属性只能用于对应关系
fn check_attrs(kind: RelationKind, attrs: &AssignmentAttrs) -> ApiResult<()> {
    if attrs.is_primary_teacher && kind != RelationKind::TeacherSubject {
        return Err(ApiError::invalid("is_primary_teacher", "only applies to teacher-subject assignments"));
    }
    if attrs.is_class_teacher && kind != RelationKind::TeacherClass {
        return Err(ApiError::invalid("is_class_teacher", "only applies to teacher-class assignments"));
    }
    if attrs.grade.is_some() && kind != RelationKind::StudentSubject {
        return Err(ApiError::invalid("grade", "only applies to student-subject enrollments"));
    }
    Ok(())
}

/// 学生当年在读班级的年级（未分班返回 None）
fn enrolled_class_grade_tx(conn: &Connection, student_id: i64, year_id: i64) -> ApiResult<Option<i32>> {
    let rows = AssignmentRepository::list_for_owner_tx(conn, RelationKind::StudentClass, student_id, year_id)?;
    for row in rows.iter().filter(|r| r.is_active()) {
        if let Some(class) = SchoolClassRepository::find_by_id_tx(conn, row.target_id)? {
            return Ok(Some(class.grade_level));
        }
    }
    Ok(None)
}

/// assign：按 (kind, owner, target, year) 幂等 upsert
///
/// # 规则
/// - 主体/目标/学年不存在 → NotFound；学年停用 → Conflict
/// - 学生-班级新占名额时检查容量（已在读行重复确认不计）
/// - 学生-学科检查年级适用性
/// - 主讲/班主任标志：清除同目标其他行并回写 subject/class
pub(crate) fn assign_tx(
    conn: &Connection,
    kind: RelationKind,
    owner_id: i64,
    target_id: i64,
    year_id: i64,
    attrs: &AssignmentAttrs,
) -> ApiResult<AssignOutcome> {
    check_attrs(kind, attrs)?;
    load_year_tx(conn, year_id)?;
    check_owner_tx(conn, kind, owner_id)?;

    let key = AssignmentKey::new(kind, owner_id, target_id, year_id);
    let existing = AssignmentRepository::find_by_key_tx(conn, &key)?;
    let plan = EnrollmentCore::plan_assign(kind, existing.as_ref())?;
    // 本行在本学年原本是否持有主讲/班主任标志
    let was_holder = existing
        .as_ref()
        .map_or(false, |e| e.is_active() && (e.is_primary_teacher || e.is_class_teacher));

    // 目标校验 + 目标相关规则
    match kind {
        RelationKind::TeacherSubject | RelationKind::StudentSubject => {
            let subject = SubjectRepository::find_by_id_tx(conn, target_id)?
                .ok_or_else(|| ApiError::not_found("Subject", target_id))?;
            if !subject.is_active && plan.occupies_new_seat() {
                return Err(RuleViolation::TargetInactive { entity: "Subject", id: target_id }.into());
            }
            if kind == RelationKind::StudentSubject {
                let grade = enrolled_class_grade_tx(conn, owner_id, year_id)?;
                EnrollmentCore::check_grade_applicability(&subject, grade)?;
            }
        }
        RelationKind::TeacherClass | RelationKind::StudentClass => {
            let class = SchoolClassRepository::find_by_id_tx(conn, target_id)?
                .ok_or_else(|| ApiError::not_found("SchoolClass", target_id))?;
            if class.academic_year_id != year_id {
                return Err(ApiError::invalid(
                    "academic_year_id",
                    format!("class {} belongs to academic year {}", target_id, class.academic_year_id),
                ));
            }
            if !class.is_active && plan.occupies_new_seat() {
                return Err(RuleViolation::TargetInactive { entity: "SchoolClass", id: target_id }.into());
            }
            if kind == RelationKind::StudentClass && plan.occupies_new_seat() {
                let enrolled =
                    AssignmentRepository::count_active_for_target_tx(conn, kind, target_id, year_id)?;
                EnrollmentCore::check_capacity(target_id, enrolled, class.capacity)?;
            }
        }
    }

    let (id, action) = match plan {
        AssignPlan::Insert { status } => {
            let date = attrs.assigned_date.unwrap_or_else(today);
            (AssignmentRepository::insert_tx(conn, &key, status, date, attrs)?, "inserted")
        }
        AssignPlan::Reactivate { id, status } => {
            let date = attrs.assigned_date.unwrap_or_else(today);
            AssignmentRepository::update_tx(conn, id, status, date, attrs)?;
            (id, "reactivated")
        }
        AssignPlan::Refresh { id, status } => {
            let date = attrs
                .assigned_date
                .or_else(|| existing.as_ref().map(|e| e.assigned_date))
                .unwrap_or_else(today);
            AssignmentRepository::update_tx(conn, id, status, date, attrs)?;
            (id, "refreshed")
        }
    };

    sync_single_holder_tx(conn, kind, owner_id, target_id, year_id, id, attrs, was_holder)?;

    let assignment = AssignmentRepository::find_by_id_tx(conn, id)?
        .ok_or_else(|| ApiError::not_found("Assignment", id))?;
    Ok(AssignOutcome {
        assignment,
        action: action.to_string(),
    })
}

/// 主讲教师 / 班主任的单一持有者规则
///
/// 标志按学年记录在分配行上，subject/class 上的指针跟随最近一次指定。
/// 只有本学年原持有标志的行被改为非持有者时才清空指针，
/// 其他学年的分配不影响指针。
#[allow(clippy::too_many_arguments)]
fn sync_single_holder_tx(
    conn: &Connection,
    kind: RelationKind,
    owner_id: i64,
    target_id: i64,
    year_id: i64,
    row_id: i64,
    attrs: &AssignmentAttrs,
    was_holder: bool,
) -> ApiResult<()> {
    match kind {
        RelationKind::TeacherSubject => {
            if attrs.is_primary_teacher {
                AssignmentRepository::clear_primary_teacher_tx(conn, target_id, year_id, Some(row_id))?;
                SubjectRepository::set_primary_teacher_tx(conn, target_id, Some(owner_id))?;
            } else if was_holder {
                // 属性以最后一次为准：本学年原主讲被改为非主讲时清空
                let subject = SubjectRepository::find_by_id_tx(conn, target_id)?
                    .ok_or_else(|| ApiError::not_found("Subject", target_id))?;
                if subject.primary_teacher_id == Some(owner_id) {
                    SubjectRepository::set_primary_teacher_tx(conn, target_id, None)?;
                }
            }
        }
        RelationKind::TeacherClass => {
            if attrs.is_class_teacher {
                AssignmentRepository::clear_class_teacher_tx(conn, target_id, year_id, Some(row_id))?;
                SchoolClassRepository::set_class_teacher_tx(conn, target_id, Some(owner_id))?;
            } else if was_holder {
                let class = SchoolClassRepository::find_by_id_tx(conn, target_id)?
                    .ok_or_else(|| ApiError::not_found("SchoolClass", target_id))?;
                if class.class_teacher_id == Some(owner_id) {
                    SchoolClassRepository::set_class_teacher_tx(conn, target_id, None)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// unassign：状态置为 UNASSIGNED / DROPPED，行保留
///
/// # 规则
/// - 行不存在 → NotFound
/// - 移除主讲教师 → Conflict（需先指定新的主讲教师）
/// - 已失效的行再次 unassign 为幂等操作
pub(crate) fn unassign_tx(
    conn: &Connection,
    kind: RelationKind,
    owner_id: i64,
    target_id: i64,
    year_id: i64,
) -> ApiResult<Assignment> {
    let key = AssignmentKey::new(kind, owner_id, target_id, year_id);
    let existing = AssignmentRepository::find_by_key_tx(conn, &key)?.ok_or_else(|| {
        ApiError::not_found("Assignment", format!("{}/{}/{}/{}", kind, owner_id, target_id, year_id))
    })?;

    if kind == RelationKind::TeacherSubject && existing.is_active() && existing.is_primary_teacher {
        return Err(RuleViolation::PrimaryTeacherRemoval {
            subject_id: target_id,
            teacher_id: owner_id,
        }
        .into());
    }

    if let Some(status) = EnrollmentCore::plan_unassign(kind, &existing)? {
        AssignmentRepository::set_status_tx(conn, existing.id, status)?;
        if kind == RelationKind::TeacherClass && existing.is_class_teacher {
            SchoolClassRepository::set_class_teacher_tx(conn, target_id, None)?;
        }
    }

    AssignmentRepository::find_by_id_tx(conn, existing.id)?
        .ok_or_else(|| ApiError::not_found("Assignment", existing.id))
}

/// sync_set：使主体在该学年的生效目标集合等于 target_ids
///
/// # 说明
/// - 报告中的 ID 为目标 ID
/// - 已完成（终态）的行保持不动，计入 unchanged
/// - 移除的行置为失效状态，不删除
pub(crate) fn sync_set_tx(
    conn: &Connection,
    kind: RelationKind,
    owner_id: i64,
    target_ids: &BTreeSet<i64>,
    year_id: i64,
    attrs: &AssignmentAttrs,
) -> ApiResult<SyncReport> {
    check_attrs(kind, attrs)?;
    load_year_tx(conn, year_id)?;
    check_owner_tx(conn, kind, owner_id)?;

    let existing = AssignmentRepository::list_for_owner_tx(conn, kind, owner_id, year_id)?;
    let known: HashMap<i64, &Assignment> = existing.iter().map(|a| (a.target_id, a)).collect();
    let plan = EnrollmentCore::plan_sync(kind, &existing, target_ids);
    let mut report = SyncReport::default();

    // 先移除再新增，释放出的名额可被本次同步使用
    for (_, target_id) in &plan.to_remove {
        unassign_tx(conn, kind, owner_id, *target_id, year_id)?;
        report.removed.push(*target_id);
    }
    for target_id in &plan.to_assign {
        assign_tx(conn, kind, owner_id, *target_id, year_id, attrs)?;
        if known.contains_key(target_id) {
            report.reactivated.push(*target_id);
        } else {
            report.added.push(*target_id);
        }
    }
    // 保留的目标沿用已有的主讲/班主任标志，能否降级只由 assign 显式决定
    for target_id in &plan.to_refresh {
        let kept = match known.get(target_id) {
            Some(row) => AssignmentAttrs {
                is_primary_teacher: attrs.is_primary_teacher || row.is_primary_teacher,
                is_class_teacher: attrs.is_class_teacher || row.is_class_teacher,
                ..attrs.clone()
            },
            None => attrs.clone(),
        };
        assign_tx(conn, kind, owner_id, *target_id, year_id, &kept)?;
        report.unchanged.push(*target_id);
    }
    report.unchanged.extend(plan.frozen.iter().copied());
    report.unchanged.sort_unstable();

    Ok(report)
}

// ==========================================
// EnrollmentApi - 分配/选课 API
// ==========================================
pub struct EnrollmentApi {
    conn: SharedConnection,
    assignment_repo: Arc<AssignmentRepository>,
}

impl EnrollmentApi {
    pub fn new(conn: SharedConnection, assignment_repo: Arc<AssignmentRepository>) -> Self {
        Self { conn, assignment_repo }
    }

    /// 分配/选课（幂等；第二次调用的属性覆盖第一次）
    pub fn assign(
        &self,
        actor: &Actor,
        kind: RelationKind,
        owner_id: i64,
        target_id: i64,
        year_id: i64,
        attrs: &AssignmentAttrs,
    ) -> ApiResult<AssignOutcome> {
        AccessValidator::require_admin(actor, "assign")?;

        let result = write_transaction(&self.conn, |tx| -> ApiResult<AssignOutcome> {
            let outcome = assign_tx(tx, kind, owner_id, target_id, year_id, attrs)?;
            record_action(
                tx,
                actor,
                ActionType::Assign,
                kind.owner_kind(),
                owner_id,
                json!({
                    "relation_kind": kind.to_db_str(),
                    "target_id": target_id,
                    "academic_year_id": year_id,
                    "action": outcome.action,
                    "attrs": attrs,
                }),
            )?;
            Ok(outcome)
        });

        match &result {
            Ok(outcome) => tracing::info!(
                relation_kind = %kind,
                owner_id,
                target_id,
                academic_year_id = year_id,
                action = %outcome.action,
                "分配已提交"
            ),
            Err(e) => tracing::warn!(
                relation_kind = %kind,
                owner_id,
                target_id,
                academic_year_id = year_id,
                code = e.code(),
                "分配被拒绝: {}",
                e
            ),
        }
        result
    }

    pub fn unassign(
        &self,
        actor: &Actor,
        kind: RelationKind,
        owner_id: i64,
        target_id: i64,
        year_id: i64,
    ) -> ApiResult<Assignment> {
        AccessValidator::require_admin(actor, "unassign")?;

        let result = write_transaction(&self.conn, |tx| -> ApiResult<Assignment> {
            let row = unassign_tx(tx, kind, owner_id, target_id, year_id)?;
            record_action(
                tx,
                actor,
                ActionType::Unassign,
                kind.owner_kind(),
                owner_id,
                json!({
                    "relation_kind": kind.to_db_str(),
                    "target_id": target_id,
                    "academic_year_id": year_id,
                    "status": row.status.to_db_str(),
                }),
            )?;
            Ok(row)
        });

        if let Err(e) = &result {
            tracing::warn!(relation_kind = %kind, owner_id, target_id, code = e.code(), "移除分配被拒绝: {}", e);
        }
        result
    }

    /// 集合同步
    pub fn sync_set(
        &self,
        actor: &Actor,
        kind: RelationKind,
        owner_id: i64,
        target_ids: &[i64],
        year_id: i64,
        attrs: &AssignmentAttrs,
    ) -> ApiResult<SyncReport> {
        AccessValidator::require_admin(actor, "sync assignments")?;
        let desired: BTreeSet<i64> = target_ids.iter().copied().collect();

        let report = write_transaction(&self.conn, |tx| -> ApiResult<SyncReport> {
            let report = sync_set_tx(tx, kind, owner_id, &desired, year_id, attrs)?;
            record_action(
                tx,
                actor,
                ActionType::SyncAssignments,
                kind.owner_kind(),
                owner_id,
                json!({
                    "relation_kind": kind.to_db_str(),
                    "academic_year_id": year_id,
                    "report": report,
                }),
            )?;
            Ok(report)
        })?;

        tracing::info!(
            relation_kind = %kind,
            owner_id,
            changed = report.changed_count(),
            "集合同步完成"
        );
        Ok(report)
    }

    /// 结课：ENROLLED → COMPLETED（终态）
    pub fn complete(
        &self,
        actor: &Actor,
        kind: RelationKind,
        student_id: i64,
        target_id: i64,
        year_id: i64,
    ) -> ApiResult<Assignment> {
        AccessValidator::require_admin(actor, "complete enrollment")?;
        if !kind.is_student_relation() {
            return Err(ApiError::invalid("relation_kind", "only student enrollments can be completed"));
        }

        write_transaction(&self.conn, |tx| -> ApiResult<Assignment> {
            let key = AssignmentKey::new(kind, student_id, target_id, year_id);
            let row = AssignmentRepository::find_by_key_tx(tx, &key)?.ok_or_else(|| {
                ApiError::not_found("Assignment", format!("{}/{}/{}/{}", kind, student_id, target_id, year_id))
            })?;
            EnrollmentCore::check_transition(row.status, AssignmentStatus::Completed)?;
            AssignmentRepository::set_status_tx(tx, row.id, AssignmentStatus::Completed)?;
            record_action(
                tx,
                actor,
                ActionType::CompleteEnrollment,
                EntityKind::Student,
                student_id,
                json!({ "relation_kind": kind.to_db_str(), "target_id": target_id, "academic_year_id": year_id }),
            )?;
            AssignmentRepository::find_by_id_tx(tx, row.id)?.ok_or_else(|| ApiError::not_found("Assignment", row.id))
        })
    }

    /// 录入成绩
    ///
    /// # 权限
    /// - Admin / SuperAdmin
    /// - 或当年被分配到该学科的教师本人
    pub fn record_grade(
        &self,
        actor: &Actor,
        student_id: i64,
        subject_id: i64,
        year_id: i64,
        grade: &str,
    ) -> ApiResult<Assignment> {
        if grade.trim().is_empty() {
            return Err(ApiError::invalid("grade", "must not be empty"));
        }

        write_transaction(&self.conn, |tx| -> ApiResult<Assignment> {
            if !actor.is_admin() {
                Self::check_subject_teacher_tx(tx, actor, subject_id, year_id)?;
            }

            let key = AssignmentKey::new(RelationKind::StudentSubject, student_id, subject_id, year_id);
            let row = AssignmentRepository::find_by_key_tx(tx, &key)?.ok_or_else(|| {
                ApiError::not_found("Assignment", format!("STUDENT_SUBJECT/{}/{}/{}", student_id, subject_id, year_id))
            })?;
            if !matches!(row.status, AssignmentStatus::Enrolled | AssignmentStatus::Completed) {
                return Err(ApiError::Conflict(format!(
                    "grade requires an enrolled or completed row, found {}",
                    row.status
                )));
            }
            AssignmentRepository::set_grade_tx(tx, row.id, grade)?;
            record_action(
                tx,
                actor,
                ActionType::RecordGrade,
                EntityKind::Student,
                student_id,
                json!({ "subject_id": subject_id, "academic_year_id": year_id, "grade": grade.trim() }),
            )?;
            AssignmentRepository::find_by_id_tx(tx, row.id)?.ok_or_else(|| ApiError::not_found("Assignment", row.id))
        })
    }

    fn check_subject_teacher_tx(conn: &Connection, actor: &Actor, subject_id: i64, year_id: i64) -> ApiResult<()> {
        let denied = || ApiError::PermissionDenied("record grade 需要管理员或该学科任课教师".to_string());
        if !actor.has_role(Role::Teacher) {
            return Err(denied());
        }
        let teacher = TeacherRepository::find_by_user_id_tx(conn, actor.user_id)?.ok_or_else(denied)?;
        let key = AssignmentKey::new(RelationKind::TeacherSubject, teacher.id, subject_id, year_id);
        match AssignmentRepository::find_by_key_tx(conn, &key)? {
            Some(row) if row.is_active() => Ok(()),
            _ => {
                tracing::warn!(actor = actor.user_id, subject_id, "非任课教师尝试录入成绩");
                Err(denied())
            }
        }
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get(&self, key: &AssignmentKey) -> ApiResult<Option<Assignment>> {
        Ok(self.assignment_repo.find_by_key(key)?)
    }

    /// 主体在某学年的全部行（含失效行，用于历史）
    pub fn list_for_owner(&self, kind: RelationKind, owner_id: i64, year_id: i64) -> ApiResult<Vec<Assignment>> {
        Ok(self.assignment_repo.list_for_owner(kind, owner_id, year_id)?)
    }

    /// 目标在某学年的生效行（如班级花名册）
    pub fn roster(&self, kind: RelationKind, target_id: i64, year_id: i64) -> ApiResult<Vec<Assignment>> {
        Ok(self.assignment_repo.list_active_for_target(kind, target_id, year_id)?)
    }
}
