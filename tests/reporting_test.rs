// ==========================================
// 报表集成测试
// ==========================================
// 测试范围:
// 1. 班级容量利用率、年级汇总
// 2. 教师工作量
// 3. 学费收缴率
// 4. 总览
// ==========================================

mod helpers;

use helpers::{date, TestEnv};
use school_core::api::NewStudent;
use school_core::{AssignmentAttrs, RelationKind, StudentProfileDraft, UserDraft};

fn enroll(env: &TestEnv, name: &str, year_id: i64, class_id: i64) -> i64 {
    env.student_request(
        NewStudent::new(
            UserDraft::new(name, &format!("{}@school.edu", name.to_lowercase())),
            StudentProfileDraft::new(date(2024, 9, 1), year_id),
        )
        .in_class(class_id),
    )
    .id
}

#[test]
fn test_class_utilization_与年级汇总() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let a = env.class(year.id, 5, "A", 3);
    let b = env.class(year.id, 5, "B", 2);
    let c = env.class(year.id, 6, "A", 4);
    enroll(&env, "Ann", year.id, a.id);
    enroll(&env, "Ben", year.id, b.id);
    enroll(&env, "Cat", year.id, b.id);

    let rows = env.state.reporting_api.class_utilization(year.id).expect("利用率");
    assert_eq!(rows.len(), 3);
    let row_a = rows.iter().find(|r| r.class_id == a.id).unwrap();
    assert_eq!(row_a.enrolled, 1);
    assert_eq!(row_a.utilization, 33.3);
    let row_b = rows.iter().find(|r| r.class_id == b.id).unwrap();
    assert_eq!(row_b.utilization, 100.0);
    let row_c = rows.iter().find(|r| r.class_id == c.id).unwrap();
    assert_eq!(row_c.enrolled, 0);
    assert_eq!(row_c.utilization, 0.0);

    let grades = env.state.reporting_api.grade_summary(year.id).expect("年级汇总");
    assert_eq!(grades.len(), 2);
    assert_eq!(grades[0].grade_level, 5);
    assert_eq!(grades[0].classes, 2);
    assert_eq!(grades[0].enrolled, 3);
    assert_eq!(grades[0].capacity, 5);
    assert_eq!(grades[0].utilization, 60.0);
    assert_eq!(grades[1].grade_level, 6);
    assert_eq!(grades[1].utilization, 0.0);
}

#[test]
fn test_class_utilization_学年不存在() {
    let env = TestEnv::new();
    let err = env.state.reporting_api.class_utilization(77).expect_err("学年不存在");
    assert_eq!(err.code(), "NOT_FOUND");
}

#[test]
fn test_teacher_workload_计算与排序() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let a = env.class(year.id, 5, "A", 30);
    let b = env.class(year.id, 5, "B", 30);
    let math = env.subject("MATH", &[]);
    let eng = env.subject("ENG", &[]);
    let busy = env.teacher("Tom");
    let light = env.teacher("Tina");
    let idle = env.teacher("Ted");
    for name in ["Ann", "Ben", "Cat"] {
        enroll(&env, name, year.id, a.id);
    }
    let api = &env.state.enrollment_api;
    let none = AssignmentAttrs::default();
    api.sync_set(&env.admin, RelationKind::TeacherClass, busy.id, &[a.id, b.id], year.id, &none)
        .unwrap();
    api.assign(&env.admin, RelationKind::TeacherSubject, busy.id, math.id, year.id, &none)
        .unwrap();
    api.assign(&env.admin, RelationKind::TeacherSubject, light.id, eng.id, year.id, &none)
        .unwrap();

    let report = env.state.reporting_api.teacher_workload(year.id).expect("工作量");
    assert_eq!(report.len(), 3);

    // 2 班 × 2 + 1 科 × 1.5 + 3 名学生 × 0.1
    assert_eq!(report[0].teacher_id, busy.id);
    assert_eq!(report[0].classes, 2);
    assert_eq!(report[0].subjects, 1);
    assert_eq!(report[0].students, 3);
    assert_eq!(report[0].score, 5.8);

    assert_eq!(report[1].teacher_id, light.id);
    assert_eq!(report[1].score, 1.5);
    assert_eq!(report[2].teacher_id, idle.id);
    assert_eq!(report[2].score, 0.0);
}

#[test]
fn test_teacher_workload_不计停用教师() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let t1 = env.teacher("Tom");
    let t2 = env.teacher("Tina");
    env.state.user_api.deactivate_user(&env.admin, t2.user_id).unwrap();

    let report = env.state.reporting_api.teacher_workload(year.id).unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].teacher_id, t1.id);
}

#[test]
fn test_fee_collection_收缴率() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let fees = [("Ann", 1000.0, 800.0), ("Ben", 500.0, 700.0), ("Cat", 0.0, 0.0)];
    for (name, total, paid) in fees {
        env.student_request(NewStudent::new(
            UserDraft::new(name, &format!("{}@school.edu", name.to_lowercase())),
            StudentProfileDraft::new(date(2024, 9, 1), year.id).with_fees(total, paid),
        ));
    }

    let report = env.state.reporting_api.fee_collection(Some(year.id)).expect("收缴率");
    assert_eq!(report.total_fees, 1500.0);
    assert_eq!(report.fees_pending, 200.0);
    // 超额部分不计入: (800 + 500) / 1500
    assert_eq!(report.collection_rate, 86.7);
}

#[test]
fn test_fee_collection_无应收时为零() {
    let env = TestEnv::new();
    let report = env.state.reporting_api.fee_collection(None).unwrap();
    assert_eq!(report.total_fees, 0.0);
    assert_eq!(report.collection_rate, 0.0);
}

#[test]
fn test_overview_总览() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let class = env.class(year.id, 5, "A", 30);
    env.subject("MATH", &[]);
    env.teacher("Tom");
    let ann = enroll(&env, "Ann", year.id, class.id);
    enroll(&env, "Ben", year.id, class.id);
    env.state.student_api.set_total_fees(&env.admin, ann, 400.0).unwrap();
    env.state.student_api.record_payment(&env.admin, ann, 100.0).unwrap();

    let overview = env.state.reporting_api.overview().expect("总览");
    assert_eq!(overview.school_name, "School");
    assert_eq!(overview.current_year.map(|y| y.id), Some(year.id));
    assert_eq!(overview.active_students, 2);
    assert_eq!(overview.active_teachers, 1);
    assert_eq!(overview.active_classes, 1);
    assert_eq!(overview.active_subjects, 1);
    assert_eq!(overview.users_by_role.get("STUDENT"), Some(&2));
    assert_eq!(overview.users_by_role.get("TEACHER"), Some(&1));
    assert_eq!(overview.fee_collection.collection_rate, 25.0);
}
