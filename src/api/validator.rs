// ==========================================
// 学校教务核心 - 操作权限校验器
// ==========================================
// 职责: 按调用方角色放行/拒绝管理操作
// 约束: 身份认证由外部提供，这里只消费 Actor
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::identity::Actor;
use crate::domain::types::Role;
use crate::domain::validation::FieldViolation;

pub struct AccessValidator;

impl AccessValidator {
    /// 管理操作：Admin 或 SuperAdmin
    pub fn require_admin(actor: &Actor, operation: &str) -> ApiResult<()> {
        if actor.is_admin() {
            return Ok(());
        }
        tracing::warn!(actor = actor.user_id, operation, "拒绝非管理员操作");
        Err(ApiError::PermissionDenied(format!("{} 需要管理员权限", operation)))
    }

    /// 超级管理员专属操作
    pub fn require_super_admin(actor: &Actor, operation: &str) -> ApiResult<()> {
        if actor.is_super_admin() {
            return Ok(());
        }
        tracing::warn!(actor = actor.user_id, operation, "拒绝非超级管理员操作");
        Err(ApiError::PermissionDenied(format!("{} 需要超级管理员权限", operation)))
    }

    /// 角色标签变更：SuperAdmin 标签只能由 SuperAdmin 授予/撤销
    pub fn require_role_grant(actor: &Actor, role: Role) -> ApiResult<()> {
        if role == Role::SuperAdmin {
            Self::require_super_admin(actor, "grant SUPER_ADMIN")
        } else {
            Self::require_admin(actor, "grant role")
        }
    }
}

/// 草稿字段校验结果 → ApiError::Validation
pub fn validate_draft(result: Result<(), Vec<FieldViolation>>) -> ApiResult<()> {
    result.map_err(|violations| {
        tracing::debug!(count = violations.len(), "字段校验失败");
        ApiError::Validation(violations)
    })
}

/// 多个草稿的校验结果合并后一次返回
pub fn validate_all<I>(results: I) -> ApiResult<()>
where
    I: IntoIterator<Item = Result<(), Vec<FieldViolation>>>,
{
    let violations: Vec<FieldViolation> = results.into_iter().filter_map(Result::err).flatten().collect();
    if violations.is_empty() {
        Ok(())
    } else {
        validate_draft(Err(violations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_gate() {
        assert!(AccessValidator::require_admin(&Actor::new(1, &[Role::Admin]), "op").is_ok());
        assert!(AccessValidator::require_admin(&Actor::new(1, &[Role::SuperAdmin]), "op").is_ok());
        let err = AccessValidator::require_admin(&Actor::new(1, &[Role::Teacher]), "op").unwrap_err();
        assert_eq!(err.code(), "PERMISSION_DENIED");
    }

    #[test]
    fn test_super_admin_tag_requires_super_admin() {
        let admin = Actor::new(1, &[Role::Admin]);
        assert!(AccessValidator::require_role_grant(&admin, Role::Teacher).is_ok());
        assert!(AccessValidator::require_role_grant(&admin, Role::SuperAdmin).is_err());
        assert!(AccessValidator::require_role_grant(&Actor::system(), Role::SuperAdmin).is_ok());
    }

    #[test]
    fn test_validate_all_merges_violations() {
        assert!(validate_all([Ok(()), Ok(())]).is_ok());
        let err = validate_all([
            Err(vec![FieldViolation::new("email", "must be a valid email address")]),
            Ok(()),
            Err(vec![FieldViolation::new("salary", "must be a non-negative number")]),
        ])
        .unwrap_err();
        match err {
            ApiError::Validation(v) => {
                let fields: Vec<&str> = v.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(fields, vec!["email", "salary"]);
            }
            other => panic!("Expected Validation, got {:?}", other),
        }
    }
}
