// ==========================================
// 学校教务核心 - 学费台账规则
// ==========================================
// 规则:
// - 缴费金额必须 > 0
// - 应收总额必须 >= 0
// - 超额缴费接受，pending 压到 0
// - 收缴率 = Σmin(paid, total) / Σtotal × 100，保留 1 位小数；Σtotal = 0 时为 0
// ==========================================

use crate::domain::student::{pending_fees, FeeLedger};
use crate::engine::error::RuleViolation;
use crate::engine::round1;
use serde::{Deserialize, Serialize};

/// 台账快照（写库前的计算结果）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeeSnapshot {
    pub total_fees: f64,
    pub fees_paid: f64,
    pub fees_pending: f64,
}

impl FeeSnapshot {
    pub fn new(total_fees: f64, fees_paid: f64) -> Self {
        Self {
            total_fees,
            fees_paid,
            fees_pending: pending_fees(total_fees, fees_paid),
        }
    }
}

pub struct FeeLedgerEngine;

impl FeeLedgerEngine {
    /// 记一笔缴费
    pub fn apply_payment(ledger: &impl FeeLedger, amount: f64) -> Result<FeeSnapshot, RuleViolation> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(RuleViolation::InvalidAmount { field: "amount", value: amount });
        }
        Ok(FeeSnapshot::new(ledger.total_fees(), ledger.fees_paid() + amount))
    }

    /// 调整应收总额（已缴金额不变）
    pub fn apply_total(ledger: &impl FeeLedger, total_fees: f64) -> Result<FeeSnapshot, RuleViolation> {
        if !total_fees.is_finite() || total_fees < 0.0 {
            return Err(RuleViolation::InvalidAmount { field: "total_fees", value: total_fees });
        }
        Ok(FeeSnapshot::new(total_fees, ledger.fees_paid()))
    }

    /// 收缴率（百分比）
    ///
    /// # 参数
    /// - collected_capped: Σmin(paid, total)
    /// - total: Σtotal
    pub fn collection_rate(collected_capped: f64, total: f64) -> f64 {
        if total <= 0.0 {
            return 0.0;
        }
        round1(collected_capped / total * 100.0)
    }
}
