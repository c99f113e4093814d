// ==========================================
// 学校教务核心 - 报表口径
// ==========================================
// 工作量 = 班级数×2 + 学科数×1.5 + 学生数×0.1
// 容量利用率 = 在读人数 / 容量 × 100，保留 1 位小数
// ==========================================

use crate::engine::round1;

pub const WORKLOAD_CLASS_WEIGHT: f64 = 2.0;
pub const WORKLOAD_SUBJECT_WEIGHT: f64 = 1.5;
pub const WORKLOAD_STUDENT_WEIGHT: f64 = 0.1;

pub struct ReportingCore;

impl ReportingCore {
    pub fn workload_score(classes: i64, subjects: i64, students: i64) -> f64 {
        round1(
            classes as f64 * WORKLOAD_CLASS_WEIGHT
                + subjects as f64 * WORKLOAD_SUBJECT_WEIGHT
                + students as f64 * WORKLOAD_STUDENT_WEIGHT,
        )
    }

    pub fn capacity_utilization(enrolled: i64, capacity: i32) -> f64 {
        Self::aggregate_utilization(enrolled, i64::from(capacity))
    }

    /// 多个班级合计后的利用率（年级汇总）
    pub fn aggregate_utilization(enrolled: i64, capacity: i64) -> f64 {
        if capacity <= 0 {
            return 0.0;
        }
        round1(enrolled as f64 / capacity as f64 * 100.0)
    }
}
