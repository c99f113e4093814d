// ==========================================
// 学校教务核心 - 操作日志领域模型
// ==========================================
// 红线: 所有管理写操作必须在同一事务内留痕
// ==========================================

use crate::domain::types::EntityKind;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,             // UUID
    pub action_type: ActionType,
    pub action_ts: NaiveDateTime,
    pub actor: i64,                    // 操作人 user_id
    pub target_kind: EntityKind,
    pub target_id: i64,
    pub payload_json: Option<JsonValue>,
    pub detail: Option<String>,
}

impl ActionLog {
    /// 以当前时间创建日志
    pub fn new(
        action_type: ActionType,
        actor: i64,
        target_kind: EntityKind,
        target_id: i64,
        payload_json: Option<JsonValue>,
    ) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type,
            action_ts: chrono::Local::now().naive_local(),
            actor,
            target_kind,
            target_id,
            payload_json,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    CreateAcademicYear,
    UpdateAcademicYear,
    SetCurrentAcademicYear,
    DeactivateAcademicYear,
    ActivateAcademicYear,
    CreateClass,
    UpdateClass,
    DeactivateClass,
    ActivateClass,
    CreateSubject,
    UpdateSubject,
    DeactivateSubject,
    ActivateSubject,
    CreateTeacher,
    UpdateTeacher,
    CreateStudent,
    UpdateStudent,
    RecordPayment,
    SetTotalFees,
    Assign,
    Unassign,
    SyncAssignments,
    CompleteEnrollment,
    RecordGrade,
    DeactivateUser,
    ActivateUser,
    AssignRole,
    RevokeRole,
}

impl ActionType {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ActionType::CreateAcademicYear => "CREATE_ACADEMIC_YEAR",
            ActionType::UpdateAcademicYear => "UPDATE_ACADEMIC_YEAR",
            ActionType::SetCurrentAcademicYear => "SET_CURRENT_ACADEMIC_YEAR",
            ActionType::DeactivateAcademicYear => "DEACTIVATE_ACADEMIC_YEAR",
            ActionType::ActivateAcademicYear => "ACTIVATE_ACADEMIC_YEAR",
            ActionType::CreateClass => "CREATE_CLASS",
            ActionType::UpdateClass => "UPDATE_CLASS",
            ActionType::DeactivateClass => "DEACTIVATE_CLASS",
            ActionType::ActivateClass => "ACTIVATE_CLASS",
            ActionType::CreateSubject => "CREATE_SUBJECT",
            ActionType::UpdateSubject => "UPDATE_SUBJECT",
            ActionType::DeactivateSubject => "DEACTIVATE_SUBJECT",
            ActionType::ActivateSubject => "ACTIVATE_SUBJECT",
            ActionType::CreateTeacher => "CREATE_TEACHER",
            ActionType::UpdateTeacher => "UPDATE_TEACHER",
            ActionType::CreateStudent => "CREATE_STUDENT",
            ActionType::UpdateStudent => "UPDATE_STUDENT",
            ActionType::RecordPayment => "RECORD_PAYMENT",
            ActionType::SetTotalFees => "SET_TOTAL_FEES",
            ActionType::Assign => "ASSIGN",
            ActionType::Unassign => "UNASSIGN",
            ActionType::SyncAssignments => "SYNC_ASSIGNMENTS",
            ActionType::CompleteEnrollment => "COMPLETE_ENROLLMENT",
            ActionType::RecordGrade => "RECORD_GRADE",
            ActionType::DeactivateUser => "DEACTIVATE_USER",
            ActionType::ActivateUser => "ACTIVATE_USER",
            ActionType::AssignRole => "ASSIGN_ROLE",
            ActionType::RevokeRole => "REVOKE_ROLE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|t| t.to_db_str() == s.trim())
    }

    fn all() -> [ActionType; 28] {
        [
            ActionType::CreateAcademicYear,
            ActionType::UpdateAcademicYear,
            ActionType::SetCurrentAcademicYear,
            ActionType::DeactivateAcademicYear,
            ActionType::ActivateAcademicYear,
            ActionType::CreateClass,
            ActionType::UpdateClass,
            ActionType::DeactivateClass,
            ActionType::ActivateClass,
            ActionType::CreateSubject,
            ActionType::UpdateSubject,
            ActionType::DeactivateSubject,
            ActionType::ActivateSubject,
            ActionType::CreateTeacher,
            ActionType::UpdateTeacher,
            ActionType::CreateStudent,
            ActionType::UpdateStudent,
            ActionType::RecordPayment,
            ActionType::SetTotalFees,
            ActionType::Assign,
            ActionType::Unassign,
            ActionType::SyncAssignments,
            ActionType::CompleteEnrollment,
            ActionType::RecordGrade,
            ActionType::DeactivateUser,
            ActionType::ActivateUser,
            ActionType::AssignRole,
            ActionType::RevokeRole,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_db_round_trip() {
        for t in ActionType::all() {
            assert_eq!(ActionType::from_str(t.to_db_str()), Some(t));
        }
        assert_eq!(ActionType::from_str("DROP_TABLE"), None);
    }
}
