// ==========================================
// 学校教务核心 - 学生档案与学费台账
// ==========================================
// 红线: fees_pending = max(0, total_fees - fees_paid)，每次保存重算
// 宽松规则: 超额缴费被接受，只把 pending 压到 0，不报错
// ==========================================

use crate::domain::types::StudentStatus;
use crate::domain::validation::{FieldViolation, Violations};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Student - 学生档案
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,
    pub user_id: i64,
    pub student_id: String, // 学号，唯一
    pub admission_date: NaiveDate,
    pub academic_year_id: i64,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub status: StudentStatus,

    // ===== 学费台账 =====
    pub total_fees: f64,
    pub fees_paid: f64,
    pub fees_pending: f64,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// Trait: FeeLedger
// ==========================================
// 用途: 学费台账的统一计算口径
pub trait FeeLedger {
    fn total_fees(&self) -> f64;
    fn fees_paid(&self) -> f64;

    /// 待缴金额，最低为 0
    fn computed_pending(&self) -> f64 {
        pending_fees(self.total_fees(), self.fees_paid())
    }

    /// 是否已缴清
    fn is_settled(&self) -> bool {
        self.computed_pending() <= 0.0
    }
}

impl FeeLedger for Student {
    fn total_fees(&self) -> f64 {
        self.total_fees
    }

    fn fees_paid(&self) -> f64 {
        self.fees_paid
    }
}

impl Student {
    /// 按台账口径重算 fees_pending
    pub fn recompute_fees_pending(&mut self) {
        self.fees_pending = self.computed_pending();
    }
}

/// 待缴金额 = max(0, total - paid)
pub fn pending_fees(total_fees: f64, fees_paid: f64) -> f64 {
    (total_fees - fees_paid).max(0.0)
}

// ==========================================
// StudentProfileDraft - 档案输入
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentProfileDraft {
    /// None 时自动生成（student.id_prefix + 年份 + 序号）
    pub student_id: Option<String>,
    pub admission_date: NaiveDate,
    pub academic_year_id: i64,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub status: StudentStatus,
    pub total_fees: f64,
    pub fees_paid: f64,
}

impl StudentProfileDraft {
    pub fn new(admission_date: NaiveDate, academic_year_id: i64) -> Self {
        Self {
            student_id: None,
            admission_date,
            academic_year_id,
            guardian_name: None,
            guardian_phone: None,
            status: StudentStatus::Enrolled,
            total_fees: 0.0,
            fees_paid: 0.0,
        }
    }

    pub fn with_fees(mut self, total_fees: f64, fees_paid: f64) -> Self {
        self.total_fees = total_fees;
        self.fees_paid = fees_paid;
        self
    }

    pub fn validate(&self) -> Result<(), Vec<FieldViolation>> {
        let mut v = Violations::new();
        if let Some(student_id) = &self.student_id {
            v.require_text(student_id, "student_id");
        }
        v.check(
            self.total_fees.is_finite() && self.total_fees >= 0.0,
            "total_fees",
            "must be a non-negative number",
        );
        v.check(
            self.fees_paid.is_finite() && self.fees_paid >= 0.0,
            "fees_paid",
            "must be a non-negative number",
        );
        v.into_result()
    }
}
