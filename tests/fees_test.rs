// ==========================================
// 学费台账集成测试
// ==========================================
// 测试范围:
// 1. record_payment: 累加、超额压到 0、非法金额
// 2. set_total_fees: 重算 pending
// 3. 审计日志
// ==========================================

mod helpers;

use helpers::{date, TestEnv};
use school_core::api::NewStudent;
use school_core::{ApiError, Student, StudentProfileDraft, UserDraft};

fn student_with_fees(env: &TestEnv, name: &str, total: f64, paid: f64) -> Student {
    let year = match env.state.academic_year_api.current().expect("查询失败") {
        Some(year) => year,
        None => env.year("2024-2025", 2024, true),
    };
    env.student_request(NewStudent::new(
        UserDraft::new(name, &format!("{}@school.edu", name.to_lowercase())),
        StudentProfileDraft::new(date(2024, 9, 1), year.id).with_fees(total, paid),
    ))
}

#[test]
fn test_create_pending_按台账计算() {
    let env = TestEnv::new();
    let s = student_with_fees(&env, "Ann", 1000.0, 800.0);
    assert_eq!(s.total_fees, 1000.0);
    assert_eq!(s.fees_paid, 800.0);
    assert_eq!(s.fees_pending, 200.0);
}

#[test]
fn test_record_payment_超额缴费() {
    let env = TestEnv::new();
    let s = student_with_fees(&env, "Ann", 1000.0, 800.0);

    let updated = env
        .state
        .student_api
        .record_payment(&env.admin, s.id, 500.0)
        .expect("缴费失败");
    assert_eq!(updated.fees_paid, 1300.0);
    assert_eq!(updated.fees_pending, 0.0);
    assert_eq!(updated.total_fees, 1000.0);
}

#[test]
fn test_record_payment_分次累加() {
    let env = TestEnv::new();
    let s = student_with_fees(&env, "Ann", 1200.0, 0.0);
    let api = &env.state.student_api;

    api.record_payment(&env.admin, s.id, 300.0).unwrap();
    let updated = api.record_payment(&env.admin, s.id, 450.5).unwrap();
    assert_eq!(updated.fees_paid, 750.5);
    assert_eq!(updated.fees_pending, 449.5);

    assert_eq!(
        env.count("SELECT COUNT(*) FROM action_log WHERE action_type = 'RECORD_PAYMENT'"),
        2
    );
}

#[test]
fn test_record_payment_金额非法() {
    let env = TestEnv::new();
    let s = student_with_fees(&env, "Ann", 1000.0, 800.0);
    let api = &env.state.student_api;

    for amount in [0.0, -50.0, f64::NAN] {
        let err = api
            .record_payment(&env.admin, s.id, amount)
            .expect_err("金额必须为正");
        match err {
            ApiError::Validation(fields) => assert_eq!(fields[0].field, "amount"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    let unchanged = api.get(s.id).unwrap();
    assert_eq!(unchanged.fees_paid, 800.0);
    assert_eq!(
        env.count("SELECT COUNT(*) FROM action_log WHERE action_type = 'RECORD_PAYMENT'"),
        0
    );
}

#[test]
fn test_record_payment_学生不存在() {
    let env = TestEnv::new();
    let err = env
        .state
        .student_api
        .record_payment(&env.admin, 404, 100.0)
        .expect_err("学生不存在");
    assert_eq!(err.code(), "NOT_FOUND");
}

#[test]
fn test_set_total_fees_重算待缴() {
    let env = TestEnv::new();
    let s = student_with_fees(&env, "Ann", 1000.0, 800.0);
    let api = &env.state.student_api;

    let raised = api.set_total_fees(&env.admin, s.id, 1500.0).unwrap();
    assert_eq!(raised.fees_pending, 700.0);
    assert_eq!(raised.fees_paid, 800.0);

    // 低于已缴时 pending 为 0
    let lowered = api.set_total_fees(&env.admin, s.id, 600.0).unwrap();
    assert_eq!(lowered.fees_pending, 0.0);

    let err = api.set_total_fees(&env.admin, s.id, -1.0).expect_err("总额不能为负");
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[test]
fn test_create_学费为负被拒绝() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let request = NewStudent::new(
        UserDraft::new("Ann", "ann@school.edu"),
        StudentProfileDraft::new(date(2024, 9, 1), year.id).with_fees(-10.0, 0.0),
    );

    let err = env.state.student_api.create(&env.admin, &request).expect_err("学费为负");
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert_eq!(env.count("SELECT COUNT(*) FROM users"), 0);
}

#[test]
fn test_update_学费随档案保存重算() {
    let env = TestEnv::new();
    let s = student_with_fees(&env, "Ann", 1000.0, 200.0);
    let user = UserDraft::new("Ann", "ann@school.edu");

    let profile = StudentProfileDraft::new(date(2024, 9, 1), s.academic_year_id).with_fees(1500.0, 600.0);
    let updated = env
        .state
        .student_api
        .update(&env.admin, s.id, &user, &profile)
        .expect("更新档案");
    assert_eq!(updated.total_fees, 1500.0);
    assert_eq!(updated.fees_paid, 600.0);
    assert_eq!(updated.fees_pending, 900.0);

    // 超额时 pending 压到 0
    let profile = StudentProfileDraft::new(date(2024, 9, 1), s.academic_year_id).with_fees(500.0, 600.0);
    let updated = env.state.student_api.update(&env.admin, s.id, &user, &profile).unwrap();
    assert_eq!(updated.fees_pending, 0.0);
    assert_eq!(
        env.count(&format!("SELECT COUNT(*) FROM student WHERE id = {} AND fees_pending = 0", s.id)),
        1
    );
}
