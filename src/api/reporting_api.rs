// ==========================================
// 学校教务核心 - 报表/汇总 API
// ==========================================
// 职责: 班级容量利用率、年级汇总、教师工作量、学费收缴率、总览
// 红线: 只读已提交数据，只用真实聚合
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::academic_year::AcademicYear;
use crate::domain::types::{RelationKind, StudentStatus};
use crate::engine::{FeeLedgerEngine, ReportingCore};
use crate::repository::academic_year_repo::AcademicYearRepository;
use crate::repository::assignment_repo::AssignmentRepository;
use crate::repository::class_repo::SchoolClassRepository;
use crate::repository::student_repo::StudentRepository;
use crate::repository::subject_repo::SubjectRepository;
use crate::repository::teacher_repo::TeacherRepository;
use crate::repository::transaction::{lock, SharedConnection};
use crate::repository::user_repo::UserRepository;
use rusqlite::Connection;

/// 班级容量利用率
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassUtilization {
    pub class_id: i64,
    pub name: String,
    pub grade_level: i32,
    pub section: String,
    pub enrolled: i64,
    pub capacity: i32,
    pub utilization: f64, // 百分比，1 位小数
}

/// 年级汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeSummary {
    pub grade_level: i32,
    pub classes: i64,
    pub enrolled: i64,
    pub capacity: i64,
    pub utilization: f64,
}

/// 教师工作量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherWorkload {
    pub teacher_id: i64,
    pub employee_id: String,
    pub classes: i64,
    pub subjects: i64,
    pub students: i64,
    pub score: f64,
}

/// 学费收缴
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeCollectionReport {
    pub academic_year_id: Option<i64>,
    pub total_fees: f64,
    pub fees_paid: f64,
    pub fees_pending: f64,
    pub collection_rate: f64,
}

/// 总览
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverviewReport {
    pub school_name: String,
    pub current_year: Option<AcademicYear>,
    pub active_students: i64,
    pub active_teachers: i64,
    pub active_classes: i64,
    pub active_subjects: i64,
    pub users_by_role: BTreeMap<String, i64>,
    pub fee_collection: FeeCollectionReport,
}

// ==========================================
// ReportingApi - 报表 API
// ==========================================
pub struct ReportingApi {
    conn: SharedConnection,
}

impl ReportingApi {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    fn require_year_tx(conn: &Connection, academic_year_id: i64) -> ApiResult<AcademicYear> {
        AcademicYearRepository::find_by_id_tx(conn, academic_year_id)?
            .ok_or_else(|| ApiError::not_found("AcademicYear", academic_year_id))
    }

    fn class_utilization_tx(conn: &Connection, academic_year_id: i64) -> ApiResult<Vec<ClassUtilization>> {
        Self::require_year_tx(conn, academic_year_id)?;
        let classes = SchoolClassRepository::list_by_year_tx(conn, academic_year_id, false)?;
        let counts = AssignmentRepository::active_counts_by_target_tx(conn, RelationKind::StudentClass, academic_year_id)?;

        Ok(classes
            .into_iter()
            .map(|class| {
                let enrolled = counts.get(&class.id).copied().unwrap_or(0);
                ClassUtilization {
                    class_id: class.id,
                    utilization: ReportingCore::capacity_utilization(enrolled, class.capacity),
                    name: class.name,
                    grade_level: class.grade_level,
                    section: class.section,
                    enrolled,
                    capacity: class.capacity,
                }
            })
            .collect())
    }

    /// 学年内各启用班级的在读人数与容量利用率（按年级、分班排序）
    pub fn class_utilization(&self, academic_year_id: i64) -> ApiResult<Vec<ClassUtilization>> {
        let conn = lock(&self.conn)?;
        Self::class_utilization_tx(&conn, academic_year_id)
    }

    /// 学年内按年级汇总
    pub fn grade_summary(&self, academic_year_id: i64) -> ApiResult<Vec<GradeSummary>> {
        let conn = lock(&self.conn)?;
        let rows = Self::class_utilization_tx(&conn, academic_year_id)?;

        let mut by_grade: BTreeMap<i32, (i64, i64, i64)> = BTreeMap::new();
        for row in &rows {
            let entry = by_grade.entry(row.grade_level).or_insert((0, 0, 0));
            entry.0 += 1;
            entry.1 += row.enrolled;
            entry.2 += i64::from(row.capacity);
        }

        Ok(by_grade
            .into_iter()
            .map(|(grade_level, (classes, enrolled, capacity))| GradeSummary {
                grade_level,
                classes,
                enrolled,
                capacity,
                utilization: ReportingCore::aggregate_utilization(enrolled, capacity),
            })
            .collect())
    }

    /// 教师工作量（可接受分配的教师；按得分降序）
    ///
    /// 学生数 = 该教师所教班级中去重后的在读学生数
    pub fn teacher_workload(&self, academic_year_id: i64) -> ApiResult<Vec<TeacherWorkload>> {
        let conn = lock(&self.conn)?;
        Self::require_year_tx(&conn, academic_year_id)?;
        let class_counts =
            AssignmentRepository::active_counts_by_owner_tx(&conn, RelationKind::TeacherClass, academic_year_id)?;
        let subject_counts =
            AssignmentRepository::active_counts_by_owner_tx(&conn, RelationKind::TeacherSubject, academic_year_id)?;

        let mut workloads = Vec::new();
        for teacher in TeacherRepository::list_by_status_tx(&conn, None)? {
            if !teacher.status.accepts_assignments() {
                continue;
            }
            let classes = class_counts.get(&teacher.id).copied().unwrap_or(0);
            let subjects = subject_counts.get(&teacher.id).copied().unwrap_or(0);
            let students = if classes > 0 {
                AssignmentRepository::students_taught_by_teacher_tx(&conn, teacher.id, academic_year_id)?
            } else {
                0
            };
            workloads.push(TeacherWorkload {
                teacher_id: teacher.id,
                employee_id: teacher.employee_id,
                classes,
                subjects,
                students,
                score: ReportingCore::workload_score(classes, subjects, students),
            });
        }

        workloads.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.employee_id.cmp(&b.employee_id)));
        Ok(workloads)
    }

    fn fee_collection_tx(conn: &Connection, academic_year_id: Option<i64>) -> ApiResult<FeeCollectionReport> {
        let totals = StudentRepository::fee_totals_tx(conn, academic_year_id)?;
        Ok(FeeCollectionReport {
            academic_year_id,
            total_fees: totals.total_fees,
            fees_paid: totals.fees_paid,
            fees_pending: totals.fees_pending,
            collection_rate: FeeLedgerEngine::collection_rate(totals.collected_capped, totals.total_fees),
        })
    }

    /// 学费收缴率；academic_year_id 为 None 时统计全校
    pub fn fee_collection(&self, academic_year_id: Option<i64>) -> ApiResult<FeeCollectionReport> {
        let conn = lock(&self.conn)?;
        if let Some(id) = academic_year_id {
            Self::require_year_tx(&conn, id)?;
        }
        Self::fee_collection_tx(&conn, academic_year_id)
    }

    /// 总览：当前学年、各类在用数量、按角色统计账号、全校收缴率
    pub fn overview(&self) -> ApiResult<OverviewReport> {
        let conn = lock(&self.conn)?;
        let settings = ConfigManager::settings_tx(&conn)?;
        let users_by_role = UserRepository::count_active_by_role_tx(&conn)?
            .into_iter()
            .map(|(role, count)| (role.to_db_str().to_string(), count))
            .collect();

        let report = OverviewReport {
            school_name: settings.school_name,
            current_year: AcademicYearRepository::find_current_tx(&conn)?,
            active_students: StudentRepository::count_by_status_tx(&conn, StudentStatus::Enrolled)?,
            active_teachers: TeacherRepository::count_active_tx(&conn)?,
            active_classes: SchoolClassRepository::count_active_tx(&conn, None)?,
            active_subjects: SubjectRepository::count_active_tx(&conn)?,
            users_by_role,
            fee_collection: Self::fee_collection_tx(&conn, None)?,
        };

        tracing::debug!(
            active_students = report.active_students,
            active_teachers = report.active_teachers,
            "总览已生成"
        );
        Ok(report)
    }
}
