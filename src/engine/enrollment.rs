// ==========================================
// 学校教务核心 - 分配/选课规则引擎
// ==========================================
// 状态机:
//   ASSIGNED ⇄ UNASSIGNED          （教师-学科 / 教师-班级）
//   ENROLLED → DROPPED → ENROLLED   （学生-学科 / 学生-班级）
//   ENROLLED → COMPLETED            （终态）
// 红线: 同一 (kind, owner, target, year) 只有一行，原地更新
// 红线: 已在读的行重复确认不重复计入容量
// ==========================================

use crate::domain::assignment::Assignment;
use crate::domain::subject::Subject;
use crate::domain::types::{AssignmentStatus, RelationKind};
use crate::engine::error::RuleViolation;
use std::collections::{BTreeSet, HashMap};

// ==========================================
// AssignPlan - assign 的执行计划
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignPlan {
    /// 新建行
    Insert { status: AssignmentStatus },
    /// 失效行重新激活（需要占用容量）
    Reactivate { id: i64, status: AssignmentStatus },
    /// 已生效，仅刷新属性
    Refresh { id: i64, status: AssignmentStatus },
}

impl AssignPlan {
    /// 是否会新增一个生效名额
    pub fn occupies_new_seat(&self) -> bool {
        !matches!(self, AssignPlan::Refresh { .. })
    }
}

// ==========================================
// SyncPlan - 集合同步差异
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// 需要 assign 的目标（新增或重新激活）
    pub to_assign: Vec<i64>,
    /// 已生效、仅刷新属性的目标
    pub to_refresh: Vec<i64>,
    /// 需要置为失效的 (行ID, 目标ID)
    pub to_remove: Vec<(i64, i64)>,
    /// 已完成（终态）而保持不动的目标
    pub frozen: Vec<i64>,
}

pub struct EnrollmentCore;

impl EnrollmentCore {
    /// 状态迁移是否合法（相同状态视为合法的原地刷新）
    pub fn is_legal_transition(from: AssignmentStatus, to: AssignmentStatus) -> bool {
        use AssignmentStatus::*;
        if from == to {
            return from != Completed;
        }
        matches!(
            (from, to),
            (Assigned, Unassigned)
                | (Unassigned, Assigned)
                | (Enrolled, Dropped)
                | (Enrolled, Completed)
                | (Dropped, Enrolled)
        )
    }

    pub fn check_transition(from: AssignmentStatus, to: AssignmentStatus) -> Result<(), RuleViolation> {
        if Self::is_legal_transition(from, to) {
            Ok(())
        } else {
            Err(RuleViolation::IllegalTransition { from, to })
        }
    }

    /// 根据现有行决定 assign 的动作
    pub fn plan_assign(kind: RelationKind, existing: Option<&Assignment>) -> Result<AssignPlan, RuleViolation> {
        let target = kind.active_status();
        match existing {
            None => Ok(AssignPlan::Insert { status: target }),
            Some(row) if row.status == target => Ok(AssignPlan::Refresh { id: row.id, status: target }),
            Some(row) => {
                Self::check_transition(row.status, target)?;
                Ok(AssignPlan::Reactivate { id: row.id, status: target })
            }
        }
    }

    /// 根据现有行决定 unassign 的目标状态
    ///
    /// 返回 None 表示行已失效（幂等，无需写入）
    pub fn plan_unassign(kind: RelationKind, existing: &Assignment) -> Result<Option<AssignmentStatus>, RuleViolation> {
        let target = kind.inactive_status();
        if existing.status == target {
            return Ok(None);
        }
        Self::check_transition(existing.status, target)?;
        Ok(Some(target))
    }

    /// 班级容量检查（enrolled 为当前在读人数，不含本次）
    pub fn check_capacity(class_id: i64, enrolled: i64, capacity: i32) -> Result<(), RuleViolation> {
        if enrolled >= i64::from(capacity) {
            return Err(RuleViolation::CapacityExceeded {
                class_id,
                enrolled,
                capacity: i64::from(capacity),
            });
        }
        Ok(())
    }

    /// 调整班级容量时不得低于在读人数
    pub fn check_capacity_change(class_id: i64, enrolled: i64, new_capacity: i32) -> Result<(), RuleViolation> {
        if i64::from(new_capacity) < enrolled {
            return Err(RuleViolation::CapacityBelowEnrollment {
                class_id,
                enrolled,
                capacity: i64::from(new_capacity),
            });
        }
        Ok(())
    }

    /// 学科年级适用性检查
    ///
    /// class_grade 为学生当年所在班级的年级；未分班时不做限制
    pub fn check_grade_applicability(subject: &Subject, class_grade: Option<i32>) -> Result<(), RuleViolation> {
        match class_grade {
            Some(grade) if !subject.applies_to_grade(grade) => Err(RuleViolation::GradeNotApplicable {
                subject_code: subject.code.clone(),
                grade_level: grade,
            }),
            _ => Ok(()),
        }
    }

    /// 计算集合同步差异
    ///
    /// # 参数
    /// - existing: 主体在该学年、该关系下的所有行（含失效行）
    /// - desired: 期望生效的目标集合
    pub fn plan_sync(kind: RelationKind, existing: &[Assignment], desired: &BTreeSet<i64>) -> SyncPlan {
        let active = kind.active_status();
        let by_target: HashMap<i64, &Assignment> = existing.iter().map(|a| (a.target_id, a)).collect();
        let mut plan = SyncPlan::default();

        for target_id in desired {
            match by_target.get(target_id) {
                Some(row) if row.status == AssignmentStatus::Completed => plan.frozen.push(*target_id),
                Some(row) if row.status == active => plan.to_refresh.push(*target_id),
                _ => plan.to_assign.push(*target_id),
            }
        }

        for row in existing {
            if desired.contains(&row.target_id) {
                continue;
            }
            if row.status == active {
                plan.to_remove.push((row.id, row.target_id));
            }
        }
        plan
    }
}
