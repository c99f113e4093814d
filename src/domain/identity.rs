// ==========================================
// 学校教务核心 - 身份领域模型
// ==========================================
// 职责: 账号 + 个人资料 + 角色标签
// 约束: 身份记录永不物理删除，停用代替删除
// ==========================================

use crate::domain::types::Role;
use crate::domain::validation::{is_plausible_email, FieldViolation, Violations};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ==========================================
// User - 身份记录
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String, // 唯一，小写存储
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub is_active: bool,
    pub roles: BTreeSet<Role>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

// ==========================================
// UserDraft - 创建/更新身份的输入
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
}

impl UserDraft {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            ..Default::default()
        }
    }

    /// 规范化后的邮箱
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }

    pub fn validate(&self) -> Result<(), Vec<FieldViolation>> {
        let mut v = Violations::new();
        v.require_text(&self.name, "name");
        v.check(self.name.chars().count() <= 255, "name", "must be at most 255 characters");
        v.check(is_plausible_email(&self.email), "email", "must be a valid email address");
        if let Some(gender) = &self.gender {
            v.check(
                matches!(gender.to_lowercase().as_str(), "male" | "female" | "other"),
                "gender",
                "must be one of male, female, other",
            );
        }
        v.into_result()
    }
}

// ==========================================
// Actor - 当前操作人（由外部认证层提供）
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: i64,
    pub roles: BTreeSet<Role>,
}

impl Actor {
    pub fn new(user_id: i64, roles: &[Role]) -> Self {
        Self {
            user_id,
            roles: roles.iter().copied().collect(),
        }
    }

    /// 系统内部操作人（初始化/种子数据）
    pub fn system() -> Self {
        Self::new(0, &[Role::SuperAdmin])
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r.is_administrative())
    }

    pub fn is_super_admin(&self) -> bool {
        self.has_role(Role::SuperAdmin)
    }
}
