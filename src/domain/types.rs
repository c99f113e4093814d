// ==========================================
// 学校教务核心 - 领域类型定义
// ==========================================
// 职责: 角色、生命周期状态、分配关系类型
// 存储格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 角色 (Role)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin, // 超级管理员
    Admin,      // 管理员
    Teacher,    // 教师
    Student,    // 学生
}

impl Role {
    /// 从字符串解析
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "SUPER_ADMIN" => Some(Role::SuperAdmin),
            "ADMIN" => Some(Role::Admin),
            "TEACHER" => Some(Role::Teacher),
            "STUDENT" => Some(Role::Student),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "SUPER_ADMIN",
            Role::Admin => "ADMIN",
            Role::Teacher => "TEACHER",
            Role::Student => "STUDENT",
        }
    }

    /// 是否具备管理权限
    pub fn is_administrative(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Admin)
    }

    pub fn all() -> [Role; 4] {
        [Role::SuperAdmin, Role::Admin, Role::Teacher, Role::Student]
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 教师状态 (Teacher Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeacherStatus {
    Active,     // 在岗
    Inactive,   // 停用
    OnLeave,    // 休假
    Terminated, // 离职
}

impl TeacherStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE" => Some(TeacherStatus::Active),
            "INACTIVE" => Some(TeacherStatus::Inactive),
            "ON_LEAVE" => Some(TeacherStatus::OnLeave),
            "TERMINATED" => Some(TeacherStatus::Terminated),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            TeacherStatus::Active => "ACTIVE",
            TeacherStatus::Inactive => "INACTIVE",
            TeacherStatus::OnLeave => "ON_LEAVE",
            TeacherStatus::Terminated => "TERMINATED",
        }
    }

    /// 是否可以接受新的分配
    pub fn accepts_assignments(&self) -> bool {
        matches!(self, TeacherStatus::Active | TeacherStatus::OnLeave)
    }
}

impl fmt::Display for TeacherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 学生状态 (Student Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudentStatus {
    Enrolled,    // 在读
    Inactive,    // 停用
    Graduated,   // 毕业
    Transferred, // 转出
}

impl StudentStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ENROLLED" => Some(StudentStatus::Enrolled),
            "INACTIVE" => Some(StudentStatus::Inactive),
            "GRADUATED" => Some(StudentStatus::Graduated),
            "TRANSFERRED" => Some(StudentStatus::Transferred),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            StudentStatus::Enrolled => "ENROLLED",
            StudentStatus::Inactive => "INACTIVE",
            StudentStatus::Graduated => "GRADUATED",
            StudentStatus::Transferred => "TRANSFERRED",
        }
    }
}

impl fmt::Display for StudentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 分配状态 (Assignment Status)
// ==========================================
// 教师关系: ASSIGNED / UNASSIGNED
// 学生关系: ENROLLED / DROPPED / COMPLETED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Assigned,
    Unassigned,
    Enrolled,
    Dropped,
    Completed,
}

impl AssignmentStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ASSIGNED" => Some(AssignmentStatus::Assigned),
            "UNASSIGNED" => Some(AssignmentStatus::Unassigned),
            "ENROLLED" => Some(AssignmentStatus::Enrolled),
            "DROPPED" => Some(AssignmentStatus::Dropped),
            "COMPLETED" => Some(AssignmentStatus::Completed),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "ASSIGNED",
            AssignmentStatus::Unassigned => "UNASSIGNED",
            AssignmentStatus::Enrolled => "ENROLLED",
            AssignmentStatus::Dropped => "DROPPED",
            AssignmentStatus::Completed => "COMPLETED",
        }
    }

    /// 是否为生效状态（计入容量/工作量）
    pub fn is_active(&self) -> bool {
        matches!(self, AssignmentStatus::Assigned | AssignmentStatus::Enrolled)
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 实体类型 (Entity Kind)
// ==========================================
// 用途: 分配关系两端的类型 + 审计日志目标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    AcademicYear,
    SchoolClass,
    Subject,
    Teacher,
    Student,
    User,
}

impl EntityKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ACADEMIC_YEAR" => Some(EntityKind::AcademicYear),
            "SCHOOL_CLASS" => Some(EntityKind::SchoolClass),
            "SUBJECT" => Some(EntityKind::Subject),
            "TEACHER" => Some(EntityKind::Teacher),
            "STUDENT" => Some(EntityKind::Student),
            "USER" => Some(EntityKind::User),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            EntityKind::AcademicYear => "ACADEMIC_YEAR",
            EntityKind::SchoolClass => "SCHOOL_CLASS",
            EntityKind::Subject => "SUBJECT",
            EntityKind::Teacher => "TEACHER",
            EntityKind::Student => "STUDENT",
            EntityKind::User => "USER",
        }
    }

    /// 展示名（用于错误信息）
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::AcademicYear => "AcademicYear",
            EntityKind::SchoolClass => "SchoolClass",
            EntityKind::Subject => "Subject",
            EntityKind::Teacher => "Teacher",
            EntityKind::Student => "Student",
            EntityKind::User => "User",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ==========================================
// 分配关系类型 (Relation Kind)
// ==========================================
// 四种多对多关系共用一张 assignment 表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationKind {
    TeacherSubject,
    TeacherClass,
    StudentSubject,
    StudentClass,
}

impl RelationKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "TEACHER_SUBJECT" => Some(RelationKind::TeacherSubject),
            "TEACHER_CLASS" => Some(RelationKind::TeacherClass),
            "STUDENT_SUBJECT" => Some(RelationKind::StudentSubject),
            "STUDENT_CLASS" => Some(RelationKind::StudentClass),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            RelationKind::TeacherSubject => "TEACHER_SUBJECT",
            RelationKind::TeacherClass => "TEACHER_CLASS",
            RelationKind::StudentSubject => "STUDENT_SUBJECT",
            RelationKind::StudentClass => "STUDENT_CLASS",
        }
    }

    pub fn owner_kind(&self) -> EntityKind {
        match self {
            RelationKind::TeacherSubject | RelationKind::TeacherClass => EntityKind::Teacher,
            RelationKind::StudentSubject | RelationKind::StudentClass => EntityKind::Student,
        }
    }

    pub fn target_kind(&self) -> EntityKind {
        match self {
            RelationKind::TeacherSubject | RelationKind::StudentSubject => EntityKind::Subject,
            RelationKind::TeacherClass | RelationKind::StudentClass => EntityKind::SchoolClass,
        }
    }

    pub fn is_student_relation(&self) -> bool {
        self.owner_kind() == EntityKind::Student
    }

    /// 新建/重新激活时的状态
    pub fn active_status(&self) -> AssignmentStatus {
        if self.is_student_relation() {
            AssignmentStatus::Enrolled
        } else {
            AssignmentStatus::Assigned
        }
    }

    /// 移除时的状态（行保留用于历史）
    pub fn inactive_status(&self) -> AssignmentStatus {
        if self.is_student_relation() {
            AssignmentStatus::Dropped
        } else {
            AssignmentStatus::Unassigned
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}
