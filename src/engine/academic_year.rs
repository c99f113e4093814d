// ==========================================
// 学校教务核心 - 学年生命周期规则
// ==========================================
// 规则:
// - 当前学年不可停用
// - 仍被学生/班级引用的学年不可停用
// - 已停用学年不可设为当前学年，也不接受新的分配
// ==========================================

use crate::domain::academic_year::AcademicYear;
use crate::engine::error::RuleViolation;

pub struct AcademicYearRules;

impl AcademicYearRules {
    /// 停用前检查
    ///
    /// # 参数
    /// - students / classes: 引用该学年的学生数、班级数
    pub fn check_deactivation(year: &AcademicYear, students: i64, classes: i64) -> Result<(), RuleViolation> {
        if year.is_current {
            return Err(RuleViolation::CurrentYearLocked { year_id: year.id });
        }
        if students > 0 || classes > 0 {
            return Err(RuleViolation::YearHasDependents {
                year_id: year.id,
                students,
                classes,
            });
        }
        Ok(())
    }

    pub fn check_can_become_current(year: &AcademicYear) -> Result<(), RuleViolation> {
        Self::require_active(year)
    }

    pub fn require_active(year: &AcademicYear) -> Result<(), RuleViolation> {
        if year.is_active {
            Ok(())
        } else {
            Err(RuleViolation::YearInactive { year_id: year.id })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn year(is_current: bool, is_active: bool) -> AcademicYear {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        AcademicYear {
            id: 1,
            name: "2024-2025".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            is_current,
            is_active,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn test_current_year_cannot_be_deactivated() {
        let err = AcademicYearRules::check_deactivation(&year(true, true), 0, 0).unwrap_err();
        assert_eq!(err, RuleViolation::CurrentYearLocked { year_id: 1 });
    }

    #[test]
    fn test_year_with_dependents_cannot_be_deactivated() {
        let err = AcademicYearRules::check_deactivation(&year(false, true), 3, 0).unwrap_err();
        assert!(matches!(err, RuleViolation::YearHasDependents { students: 3, .. }));
        assert!(AcademicYearRules::check_deactivation(&year(false, true), 0, 0).is_ok());
    }

    #[test]
    fn test_inactive_year_cannot_become_current() {
        assert!(AcademicYearRules::check_can_become_current(&year(false, false)).is_err());
        assert!(AcademicYearRules::check_can_become_current(&year(false, true)).is_ok());
    }
}
