// ==========================================
// 学校教务核心 - API层错误类型
// ==========================================
// 职责: 定义对外错误分类，转换 Repository / Engine 错误
// 红线: 对外消息不暴露数据库/内部细节（细节只进日志）
// ==========================================

use crate::domain::validation::FieldViolation;
use crate::engine::error::RuleViolation;
use crate::i18n::{t, t_with_args};
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入/业务规则错误
    // ==========================================
    /// 字段级校验失败（写入前）
    #[error("输入校验失败: {}", summarize(.0))]
    Validation(Vec<FieldViolation>),

    /// 唯一性冲突（重复邮箱、学号、学科代码等）
    #[error("唯一性冲突: {field}")]
    UniquenessConflict { field: String },

    /// 与当前状态冲突（停用当前学年、非法状态迁移等）
    #[error("状态冲突: {0}")]
    Conflict(String),

    #[error("班级已满: class_id={class_id}, enrolled={enrolled}, capacity={capacity}")]
    CapacityExceeded {
        class_id: i64,
        enrolled: i64,
        capacity: i64,
    },

    #[error("资源未找到: {entity}(id={id})")]
    NotFound { entity: String, id: String },

    #[error("权限不足: {0}")]
    PermissionDenied(String),

    // ==========================================
    // 基础设施错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ApiError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        ApiError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ApiError::Validation(vec![FieldViolation::new(field, message)])
    }

    /// 稳定错误码（供表现层分支判断）
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::UniquenessConflict { .. } => "UNIQUENESS_CONFLICT",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::PermissionDenied(_) => "PERMISSION_DENIED",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::InternalError(_) | ApiError::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为基础设施错误（对外隐藏细节）
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            ApiError::DatabaseError(_) | ApiError::InternalError(_) | ApiError::Other(_)
        )
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================

/// 约束信息无法解析为列名时对外使用的占位字段
const UNKNOWN_FIELD: &str = "unknown";

/// 仅接受 `table.column` / `column` 形式，SQL 表达式一律不外露
fn is_plain_column(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => ApiError::NotFound { entity, id },
            RepositoryError::UniqueConstraintViolation(ref msg) => {
                let field = match err.violated_unique_column() {
                    Some(column) if is_plain_column(column) => column.to_string(),
                    _ => {
                        tracing::warn!(raw = %msg, "无法解析唯一约束列");
                        UNKNOWN_FIELD.to_string()
                    }
                };
                ApiError::UniquenessConflict { field }
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                tracing::warn!(raw = %msg, "外键约束失败");
                ApiError::Conflict("引用的记录不存在或仍被引用".to_string())
            }
            RepositoryError::CheckConstraintViolation(msg) => {
                let field = msg
                    .split("CHECK constraint failed:")
                    .nth(1)
                    .and_then(|expr| expr.split(|c: char| c.is_whitespace() || c == '(').find(|t| !t.is_empty()))
                    .filter(|s| is_plain_column(s))
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        tracing::warn!(raw = %msg, "无法解析检查约束");
                        UNKNOWN_FIELD.to_string()
                    });
                ApiError::Validation(vec![FieldViolation::new(&field, "violates a value constraint")])
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::Validation(vec![FieldViolation::new(&field, message)])
            }
            RepositoryError::LockError(msg) => ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg)),
            RepositoryError::DatabaseTransactionError(msg) | RepositoryError::DatabaseQueryError(msg) => {
                ApiError::DatabaseError(msg)
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 RuleViolation 转换
// ==========================================
impl From<RuleViolation> for ApiError {
    fn from(violation: RuleViolation) -> Self {
        match violation {
            RuleViolation::CapacityExceeded {
                class_id,
                enrolled,
                capacity,
            } => ApiError::CapacityExceeded {
                class_id,
                enrolled,
                capacity,
            },
            v if v.is_field_level() => {
                let field = v.field().unwrap_or("unknown");
                ApiError::invalid(field, v.to_string())
            }
            v => ApiError::Conflict(v.to_string()),
        }
    }
}

impl From<Vec<FieldViolation>> for ApiError {
    fn from(violations: Vec<FieldViolation>) -> Self {
        ApiError::Validation(violations)
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

// ==========================================
// ErrorResponse - 对外错误载荷
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldViolation>,
}

impl From<&ApiError> for ErrorResponse {
    fn from(err: &ApiError) -> Self {
        let message = match err {
            ApiError::Validation(violations) => {
                t_with_args("errors.validation", &[("detail", summarize(violations).as_str())])
            }
            ApiError::UniquenessConflict { field } => {
                t_with_args("errors.uniqueness_conflict", &[("field", field.as_str())])
            }
            ApiError::Conflict(reason) => t_with_args("errors.conflict", &[("reason", reason.as_str())]),
            ApiError::CapacityExceeded {
                enrolled, capacity, ..
            } => t_with_args(
                "errors.capacity_exceeded",
                &[
                    ("enrolled", enrolled.to_string().as_str()),
                    ("capacity", capacity.to_string().as_str()),
                ],
            ),
            ApiError::NotFound { entity, id } => {
                t_with_args("errors.not_found", &[("entity", entity.as_str()), ("id", id.as_str())])
            }
            ApiError::PermissionDenied(reason) => {
                t_with_args("errors.permission_denied", &[("reason", reason.as_str())])
            }
            ApiError::DatabaseError(_) | ApiError::InternalError(_) | ApiError::Other(_) => {
                tracing::error!(code = err.code(), "基础设施错误: {}", err);
                t("errors.internal")
            }
        };

        let fields = match err {
            ApiError::Validation(violations) => violations.clone(),
            _ => Vec::new(),
        };

        ErrorResponse {
            code: err.code().to_string(),
            message,
            fields,
        }
    }
}
