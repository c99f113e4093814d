// ==========================================
// 分配/选课集成测试
// ==========================================
// 测试范围:
// 1. 班级容量: 满员拒绝、重复确认不重复计数、退班释放名额
// 2. assign 幂等与属性覆盖
// 3. 主讲教师/班主任单一持有者
// 4. sync_set 差异报告
// 5. 年级适用性、结课、成绩录入
// ==========================================

mod helpers;

use helpers::{date, TestEnv};
use school_core::api::NewStudent;
use school_core::{
    Actor, ApiError, AssignmentAttrs, AssignmentKey, AssignmentStatus, RelationKind, Role, SchoolClassDraft,
    StudentProfileDraft, StudentStatus, UserDraft,
};

fn enrolled_in(env: &TestEnv, class_id: i64) -> i64 {
    env.count(&format!(
        "SELECT COUNT(*) FROM assignment WHERE relation_kind = 'STUDENT_CLASS' AND target_id = {} AND status = 'ENROLLED'",
        class_id
    ))
}

// ==========================================
// 班级容量
// ==========================================

#[test]
fn test_capacity_满员后拒绝新学生() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let class = env.class(year.id, 5, "A", 2);
    let api = &env.state.enrollment_api;

    let students: Vec<_> = ["Ann", "Ben", "Cat"].iter().map(|n| env.student(n, year.id)).collect();
    for s in &students[..2] {
        api.assign(&env.admin, RelationKind::StudentClass, s.id, class.id, year.id, &AssignmentAttrs::default())
            .expect("分班失败");
    }

    let err = api
        .assign(
            &env.admin,
            RelationKind::StudentClass,
            students[2].id,
            class.id,
            year.id,
            &AssignmentAttrs::default(),
        )
        .expect_err("第三名学生应超出容量");
    match err {
        ApiError::CapacityExceeded {
            class_id,
            enrolled,
            capacity,
        } => {
            assert_eq!(class_id, class.id);
            assert_eq!(enrolled, 2);
            assert_eq!(capacity, 2);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(enrolled_in(&env, class.id), 2);
    assert_eq!(
        env.count(&format!(
            "SELECT COUNT(*) FROM assignment WHERE owner_id = {} AND relation_kind = 'STUDENT_CLASS'",
            students[2].id
        )),
        0
    );
}

#[test]
fn test_capacity_重复确认不重复计数() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let class = env.class(year.id, 5, "A", 2);
    let api = &env.state.enrollment_api;
    let s1 = env.student("Ann", year.id);
    let s2 = env.student("Ben", year.id);

    for s in [&s1, &s2] {
        api.assign(&env.admin, RelationKind::StudentClass, s.id, class.id, year.id, &AssignmentAttrs::default())
            .unwrap();
    }

    // 满员时重复确认已在读的学生仍然成功
    let outcome = api
        .assign(&env.admin, RelationKind::StudentClass, s1.id, class.id, year.id, &AssignmentAttrs::default())
        .expect("重复确认应成功");
    assert_eq!(outcome.action, "refreshed");
    assert_eq!(enrolled_in(&env, class.id), 2);
}

#[test]
fn test_capacity_退班释放名额() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let class = env.class(year.id, 5, "A", 1);
    let api = &env.state.enrollment_api;
    let s1 = env.student("Ann", year.id);
    let s2 = env.student("Ben", year.id);

    api.assign(&env.admin, RelationKind::StudentClass, s1.id, class.id, year.id, &AssignmentAttrs::default())
        .unwrap();
    let dropped = api
        .unassign(&env.admin, RelationKind::StudentClass, s1.id, class.id, year.id)
        .expect("退班失败");
    assert_eq!(dropped.status, AssignmentStatus::Dropped);

    api.assign(&env.admin, RelationKind::StudentClass, s2.id, class.id, year.id, &AssignmentAttrs::default())
        .expect("名额已释放");

    // 重新激活需要占用名额
    let err = api
        .assign(&env.admin, RelationKind::StudentClass, s1.id, class.id, year.id, &AssignmentAttrs::default())
        .expect_err("班级已满");
    assert_eq!(err.code(), "CAPACITY_EXCEEDED");
}

#[test]
fn test_create_student_分班超额整体回滚() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let class = env.class(year.id, 5, "A", 1);

    let request = |name: &str| {
        NewStudent::new(
            UserDraft::new(name, &format!("{}@school.edu", name.to_lowercase())),
            StudentProfileDraft::new(date(2024, 9, 1), year.id),
        )
        .in_class(class.id)
    };
    env.student_request(request("Ann"));

    let err = env
        .state
        .student_api
        .create(&env.admin, &request("Ben"))
        .expect_err("班级已满");
    assert_eq!(err.code(), "CAPACITY_EXCEEDED");
    assert_eq!(env.count("SELECT COUNT(*) FROM users"), 1);
    assert_eq!(env.count("SELECT COUNT(*) FROM student"), 1);
}

#[test]
fn test_class_update_容量不能低于在读人数() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let class = env.class(year.id, 5, "A", 3);
    for name in ["Ann", "Ben"] {
        let s = env.student(name, year.id);
        env.state
            .enrollment_api
            .assign(&env.admin, RelationKind::StudentClass, s.id, class.id, year.id, &AssignmentAttrs::default())
            .unwrap();
    }

    let shrink = SchoolClassDraft::new("5A", 5, "A", year.id).with_capacity(1);
    let err = env.state.class_api.update(&env.admin, class.id, &shrink).expect_err("容量过小");
    assert_eq!(err.code(), "CONFLICT");

    let ok = SchoolClassDraft::new("5A", 5, "A", year.id).with_capacity(2);
    let updated = env.state.class_api.update(&env.admin, class.id, &ok).expect("容量等于在读人数");
    assert_eq!(updated.capacity, 2);

    let roster = env.state.class_api.roster(class.id).expect("花名册");
    assert_eq!(roster.enrolled, 2);
    assert_eq!(roster.remaining_seats, 0);
    assert_eq!(roster.students.len(), 2);
}

#[test]
fn test_assign_班级不属于该学年() {
    let env = TestEnv::new();
    let y1 = env.year("2024-2025", 2024, true);
    let y2 = env.year("2025-2026", 2025, false);
    let class = env.class(y1.id, 5, "A", 30);
    let s = env.student("Ann", y2.id);

    let err = env
        .state
        .enrollment_api
        .assign(&env.admin, RelationKind::StudentClass, s.id, class.id, y2.id, &AssignmentAttrs::default())
        .expect_err("班级属于其他学年");
    match err {
        ApiError::Validation(fields) => assert_eq!(fields[0].field, "academic_year_id"),
        other => panic!("unexpected error: {:?}", other),
    }
}

// ==========================================
// assign 幂等
// ==========================================

#[test]
fn test_assign_两次只有一行且以第二次属性为准() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let subject = env.subject("MATH", &[]);
    let teacher = env.teacher("Tom");
    let api = &env.state.enrollment_api;

    let first = AssignmentAttrs {
        notes: Some("first".to_string()),
        ..Default::default()
    }
    .on(date(2024, 9, 2));
    let second = AssignmentAttrs {
        notes: Some("second".to_string()),
        ..Default::default()
    };

    let a = api
        .assign(&env.admin, RelationKind::TeacherSubject, teacher.id, subject.id, year.id, &first)
        .unwrap();
    assert_eq!(a.action, "inserted");
    let b = api
        .assign(&env.admin, RelationKind::TeacherSubject, teacher.id, subject.id, year.id, &second)
        .unwrap();
    assert_eq!(b.action, "refreshed");
    assert_eq!(a.assignment.id, b.assignment.id);

    assert_eq!(env.count("SELECT COUNT(*) FROM assignment"), 1);
    let row = api
        .get(&AssignmentKey::new(RelationKind::TeacherSubject, teacher.id, subject.id, year.id))
        .unwrap()
        .expect("行应存在");
    assert_eq!(row.notes.as_deref(), Some("second"));
    // 未给日期时保留原分配日期
    assert_eq!(row.assigned_date, date(2024, 9, 2));
}

#[test]
fn test_assign_属性与关系不匹配() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let class = env.class(year.id, 5, "A", 30);
    let s = env.student("Ann", year.id);

    let err = env
        .state
        .enrollment_api
        .assign(&env.admin, RelationKind::StudentClass, s.id, class.id, year.id, &AssignmentAttrs::class_teacher())
        .expect_err("班主任标志只用于教师-班级");
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[test]
fn test_unassign_不存在的行() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let subject = env.subject("MATH", &[]);
    let teacher = env.teacher("Tom");

    let err = env
        .state
        .enrollment_api
        .unassign(&env.admin, RelationKind::TeacherSubject, teacher.id, subject.id, year.id)
        .expect_err("无分配行");
    assert_eq!(err.code(), "NOT_FOUND");
}

// ==========================================
// 主讲教师 / 班主任
// ==========================================

#[test]
fn test_primary_teacher_切换() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let subject = env.subject("MATH", &[]);
    let t1 = env.teacher("Tom");
    let t2 = env.teacher("Tina");
    let api = &env.state.enrollment_api;

    api.assign(&env.admin, RelationKind::TeacherSubject, t1.id, subject.id, year.id, &AssignmentAttrs::primary_teacher())
        .unwrap();
    assert_eq!(env.state.subject_api.get(subject.id).unwrap().primary_teacher_id, Some(t1.id));

    api.assign(&env.admin, RelationKind::TeacherSubject, t2.id, subject.id, year.id, &AssignmentAttrs::primary_teacher())
        .unwrap();
    assert_eq!(env.state.subject_api.get(subject.id).unwrap().primary_teacher_id, Some(t2.id));
    assert_eq!(
        env.count("SELECT COUNT(*) FROM assignment WHERE relation_kind = 'TEACHER_SUBJECT' AND is_primary_teacher = 1"),
        1
    );

    let old = api
        .get(&AssignmentKey::new(RelationKind::TeacherSubject, t1.id, subject.id, year.id))
        .unwrap()
        .unwrap();
    assert!(!old.is_primary_teacher);
    assert_eq!(old.status, AssignmentStatus::Assigned);

    // 原主讲已降级，可以移除
    let removed = api
        .unassign(&env.admin, RelationKind::TeacherSubject, t1.id, subject.id, year.id)
        .expect("移除非主讲教师");
    assert_eq!(removed.status, AssignmentStatus::Unassigned);
}

#[test]
fn test_primary_teacher_不可直接移除() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let subject = env.subject("MATH", &[]);
    let t1 = env.teacher("Tom");
    let api = &env.state.enrollment_api;

    api.assign(&env.admin, RelationKind::TeacherSubject, t1.id, subject.id, year.id, &AssignmentAttrs::primary_teacher())
        .unwrap();
    let err = api
        .unassign(&env.admin, RelationKind::TeacherSubject, t1.id, subject.id, year.id)
        .expect_err("主讲教师不可直接移除");
    assert!(matches!(err, ApiError::Conflict(_)));
    assert_eq!(env.state.subject_api.get(subject.id).unwrap().primary_teacher_id, Some(t1.id));

    // 改为非主讲后可移除
    api.assign(&env.admin, RelationKind::TeacherSubject, t1.id, subject.id, year.id, &AssignmentAttrs::default())
        .unwrap();
    assert_eq!(env.state.subject_api.get(subject.id).unwrap().primary_teacher_id, None);
    api.unassign(&env.admin, RelationKind::TeacherSubject, t1.id, subject.id, year.id)
        .expect("已非主讲");
}

#[test]
fn test_primary_teacher_跨学年分配不清空指针() {
    let env = TestEnv::new();
    let y1 = env.year("2024-2025", 2024, true);
    let y2 = env.year("2025-2026", 2025, false);
    let subject = env.subject("MATH", &[]);
    let t1 = env.teacher("Tom");
    let api = &env.state.enrollment_api;

    api.assign(&env.admin, RelationKind::TeacherSubject, t1.id, subject.id, y1.id, &AssignmentAttrs::primary_teacher())
        .unwrap();
    // 次年以非主讲身份任教同一学科
    api.assign(&env.admin, RelationKind::TeacherSubject, t1.id, subject.id, y2.id, &AssignmentAttrs::default())
        .unwrap();

    assert_eq!(env.state.subject_api.get(subject.id).unwrap().primary_teacher_id, Some(t1.id));
    let y1_row = api
        .get(&AssignmentKey::new(RelationKind::TeacherSubject, t1.id, subject.id, y1.id))
        .unwrap()
        .unwrap();
    assert!(y1_row.is_primary_teacher);
    let y2_row = api
        .get(&AssignmentKey::new(RelationKind::TeacherSubject, t1.id, subject.id, y2.id))
        .unwrap()
        .unwrap();
    assert!(!y2_row.is_primary_teacher);

    // 本学年仍是主讲，不可直接移除
    let err = api
        .unassign(&env.admin, RelationKind::TeacherSubject, t1.id, subject.id, y1.id)
        .expect_err("主讲教师不可直接移除");
    assert!(matches!(err, ApiError::Conflict(_)));
}

#[test]
fn test_sync_set_保留主讲标志() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let math = env.subject("MATH", &[]);
    let eng = env.subject("ENG", &[]);
    let t1 = env.teacher("Tom");
    let api = &env.state.enrollment_api;

    api.assign(&env.admin, RelationKind::TeacherSubject, t1.id, math.id, year.id, &AssignmentAttrs::primary_teacher())
        .unwrap();
    let report = api
        .sync_set(&env.admin, RelationKind::TeacherSubject, t1.id, &[math.id, eng.id], year.id, &AssignmentAttrs::default())
        .unwrap();
    assert_eq!(report.added, vec![eng.id]);
    assert_eq!(report.unchanged, vec![math.id]);

    assert_eq!(env.state.subject_api.get(math.id).unwrap().primary_teacher_id, Some(t1.id));
    let row = api
        .get(&AssignmentKey::new(RelationKind::TeacherSubject, t1.id, math.id, year.id))
        .unwrap()
        .unwrap();
    assert!(row.is_primary_teacher);
    assert!(!api
        .get(&AssignmentKey::new(RelationKind::TeacherSubject, t1.id, eng.id, year.id))
        .unwrap()
        .unwrap()
        .is_primary_teacher);

    // 从集合中去掉主讲学科 → Conflict，整体回滚
    let err = api
        .sync_set(&env.admin, RelationKind::TeacherSubject, t1.id, &[eng.id], year.id, &AssignmentAttrs::default())
        .expect_err("主讲学科不可通过同步移除");
    assert!(matches!(err, ApiError::Conflict(_)));
    assert_eq!(
        env.count("SELECT COUNT(*) FROM assignment WHERE relation_kind = 'TEACHER_SUBJECT' AND status = 'ASSIGNED'"),
        2
    );
}

#[test]
fn test_sync_set_保留班主任标志() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let a = env.class(year.id, 5, "A", 30);
    let b = env.class(year.id, 5, "B", 30);
    let t1 = env.teacher("Tom");
    let api = &env.state.enrollment_api;

    api.assign(&env.admin, RelationKind::TeacherClass, t1.id, a.id, year.id, &AssignmentAttrs::class_teacher())
        .unwrap();
    api.sync_set(&env.admin, RelationKind::TeacherClass, t1.id, &[a.id, b.id], year.id, &AssignmentAttrs::default())
        .unwrap();

    assert_eq!(env.state.class_api.get(a.id).unwrap().class_teacher_id, Some(t1.id));
    assert_eq!(
        env.count("SELECT COUNT(*) FROM assignment WHERE relation_kind = 'TEACHER_CLASS' AND is_class_teacher = 1"),
        1
    );
}

#[test]
fn test_class_teacher_单一持有者() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let class = env.class(year.id, 5, "A", 30);
    let t1 = env.teacher("Tom");
    let t2 = env.teacher("Tina");
    let api = &env.state.enrollment_api;

    api.assign(&env.admin, RelationKind::TeacherClass, t1.id, class.id, year.id, &AssignmentAttrs::class_teacher())
        .unwrap();
    api.assign(&env.admin, RelationKind::TeacherClass, t2.id, class.id, year.id, &AssignmentAttrs::class_teacher())
        .unwrap();
    assert_eq!(env.state.class_api.get(class.id).unwrap().class_teacher_id, Some(t2.id));
    assert_eq!(
        env.count("SELECT COUNT(*) FROM assignment WHERE relation_kind = 'TEACHER_CLASS' AND is_class_teacher = 1"),
        1
    );

    // 移除班主任同时清空班级指针
    api.unassign(&env.admin, RelationKind::TeacherClass, t2.id, class.id, year.id)
        .unwrap();
    assert_eq!(env.state.class_api.get(class.id).unwrap().class_teacher_id, None);
}

#[test]
fn test_create_class_指定班主任() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let teacher = env.teacher("Tom");

    let mut draft = SchoolClassDraft::new("6B", 6, "B", year.id).with_capacity(25);
    draft.class_teacher_id = Some(teacher.id);
    let class = env.state.class_api.create(&env.admin, &draft).expect("创建班级");

    assert_eq!(class.class_teacher_id, Some(teacher.id));
    let row = env
        .state
        .enrollment_api
        .get(&AssignmentKey::new(RelationKind::TeacherClass, teacher.id, class.id, year.id))
        .unwrap()
        .expect("班主任分配行");
    assert!(row.is_class_teacher);
}

// ==========================================
// sync_set
// ==========================================

#[test]
fn test_sync_set_差异报告() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let class = env.class(year.id, 5, "A", 30);
    let math = env.subject("MATH", &[5]);
    let eng = env.subject("ENG", &[]);
    let sci = env.subject("SCI", &[5, 6]);
    let s = env.student_request(
        NewStudent::new(
            UserDraft::new("Ann", "ann@school.edu"),
            StudentProfileDraft::new(date(2024, 9, 1), year.id),
        )
        .in_class(class.id),
    );
    let api = &env.state.enrollment_api;

    let report = api
        .sync_set(&env.admin, RelationKind::StudentSubject, s.id, &[math.id, eng.id], year.id, &AssignmentAttrs::default())
        .unwrap();
    assert_eq!(report.added, vec![math.id, eng.id]);
    assert!(report.removed.is_empty());

    let report = api
        .sync_set(&env.admin, RelationKind::StudentSubject, s.id, &[eng.id, sci.id], year.id, &AssignmentAttrs::default())
        .unwrap();
    assert_eq!(report.added, vec![sci.id]);
    assert_eq!(report.removed, vec![math.id]);
    assert_eq!(report.unchanged, vec![eng.id]);
    assert!(report.reactivated.is_empty());

    let report = api
        .sync_set(
            &env.admin,
            RelationKind::StudentSubject,
            s.id,
            &[math.id, eng.id, sci.id],
            year.id,
            &AssignmentAttrs::default(),
        )
        .unwrap();
    assert_eq!(report.reactivated, vec![math.id]);
    assert_eq!(report.changed_count(), 1);

    // 行只更新不删除
    assert_eq!(
        env.count("SELECT COUNT(*) FROM assignment WHERE relation_kind = 'STUDENT_SUBJECT'"),
        3
    );
    let rows = api.list_for_owner(RelationKind::StudentSubject, s.id, year.id).unwrap();
    assert!(rows.iter().all(|r| r.status == AssignmentStatus::Enrolled));
}

#[test]
fn test_sync_set_空集合移除全部() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let a = env.subject("MATH", &[]);
    let b = env.subject("ENG", &[]);
    let teacher = env.teacher("Tom");
    let api = &env.state.enrollment_api;

    api.sync_set(&env.admin, RelationKind::TeacherSubject, teacher.id, &[a.id, b.id], year.id, &AssignmentAttrs::default())
        .unwrap();
    let report = api
        .sync_set(&env.admin, RelationKind::TeacherSubject, teacher.id, &[], year.id, &AssignmentAttrs::default())
        .unwrap();
    assert_eq!(report.removed, vec![a.id, b.id]);
    assert_eq!(
        env.count("SELECT COUNT(*) FROM assignment WHERE status = 'UNASSIGNED'"),
        2
    );
}

#[test]
fn test_sync_set_目标不存在整体回滚() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let a = env.subject("MATH", &[]);
    let teacher = env.teacher("Tom");

    let err = env
        .state
        .enrollment_api
        .sync_set(&env.admin, RelationKind::TeacherSubject, teacher.id, &[a.id, 999], year.id, &AssignmentAttrs::default())
        .expect_err("目标不存在");
    assert_eq!(err.code(), "NOT_FOUND");
    assert_eq!(env.count("SELECT COUNT(*) FROM assignment"), 0);
}

// ==========================================
// 年级适用性 / 结课 / 成绩
// ==========================================

#[test]
fn test_student_subject_年级不适用() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let class = env.class(year.id, 5, "A", 30);
    let physics = env.subject("PHY", &[9, 10]);
    let s = env.student("Ann", year.id);
    let api = &env.state.enrollment_api;
    api.assign(&env.admin, RelationKind::StudentClass, s.id, class.id, year.id, &AssignmentAttrs::default())
        .unwrap();

    let err = api
        .assign(&env.admin, RelationKind::StudentSubject, s.id, physics.id, year.id, &AssignmentAttrs::default())
        .expect_err("5 年级不适用");
    match err {
        ApiError::Validation(fields) => assert_eq!(fields[0].field, "subject_id"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_complete_后为终态() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let math = env.subject("MATH", &[]);
    let s = env.student("Ann", year.id);
    let api = &env.state.enrollment_api;
    api.assign(&env.admin, RelationKind::StudentSubject, s.id, math.id, year.id, &AssignmentAttrs::default())
        .unwrap();

    let row = api
        .complete(&env.admin, RelationKind::StudentSubject, s.id, math.id, year.id)
        .expect("结课");
    assert_eq!(row.status, AssignmentStatus::Completed);

    let err = api
        .assign(&env.admin, RelationKind::StudentSubject, s.id, math.id, year.id, &AssignmentAttrs::default())
        .expect_err("终态不可重新选课");
    assert_eq!(err.code(), "CONFLICT");
    let err = api
        .unassign(&env.admin, RelationKind::StudentSubject, s.id, math.id, year.id)
        .expect_err("终态不可退课");
    assert_eq!(err.code(), "CONFLICT");

    // 已完成行可录入成绩
    let graded = api.record_grade(&env.admin, s.id, math.id, year.id, "A").expect("录入成绩");
    assert_eq!(graded.grade.as_deref(), Some("A"));
}

#[test]
fn test_record_grade_任课教师权限() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let math = env.subject("MATH", &[]);
    let teacher = env.teacher("Tom");
    let other = env.teacher("Tina");
    let s = env.student("Ann", year.id);
    let api = &env.state.enrollment_api;
    api.assign(&env.admin, RelationKind::TeacherSubject, teacher.id, math.id, year.id, &AssignmentAttrs::default())
        .unwrap();
    api.assign(&env.admin, RelationKind::StudentSubject, s.id, math.id, year.id, &AssignmentAttrs::default())
        .unwrap();

    let outsider = Actor::new(other.user_id, &[Role::Teacher]);
    let err = api
        .record_grade(&outsider, s.id, math.id, year.id, "B")
        .expect_err("非任课教师");
    assert_eq!(err.code(), "PERMISSION_DENIED");

    let owner = Actor::new(teacher.user_id, &[Role::Teacher]);
    let row = api.record_grade(&owner, s.id, math.id, year.id, "B+").expect("任课教师录入");
    assert_eq!(row.grade.as_deref(), Some("B+"));

    let err = api.record_grade(&env.admin, s.id, math.id, year.id, "  ").expect_err("空成绩");
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[test]
fn test_record_grade_已退课被拒绝() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let math = env.subject("MATH", &[]);
    let s = env.student("Ann", year.id);
    let api = &env.state.enrollment_api;
    api.assign(&env.admin, RelationKind::StudentSubject, s.id, math.id, year.id, &AssignmentAttrs::default())
        .unwrap();
    api.unassign(&env.admin, RelationKind::StudentSubject, s.id, math.id, year.id)
        .unwrap();

    let err = api.record_grade(&env.admin, s.id, math.id, year.id, "A").expect_err("已退课");
    assert_eq!(err.code(), "CONFLICT");
}

#[test]
fn test_assign_停用学科不接受新分配() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let math = env.subject("MATH", &[]);
    let s = env.student("Ann", year.id);
    env.state.subject_api.deactivate(&env.admin, math.id).expect("停用学科");

    let err = env
        .state
        .enrollment_api
        .assign(&env.admin, RelationKind::StudentSubject, s.id, math.id, year.id, &AssignmentAttrs::default())
        .expect_err("停用学科");
    assert_eq!(err.code(), "CONFLICT");
}

#[test]
fn test_student_update_转出释放名额() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let class = env.class(year.id, 5, "A", 1);
    let math = env.subject("MATH", &[]);
    let mut request = NewStudent::new(
        UserDraft::new("Ann", "ann@school.edu"),
        StudentProfileDraft::new(date(2024, 9, 1), year.id),
    )
    .in_class(class.id);
    request.subject_ids = vec![math.id];
    let ann = env.student_request(request);
    let ben = env.student("Ben", year.id);
    assert_eq!(enrolled_in(&env, class.id), 1);

    let mut profile = StudentProfileDraft::new(date(2024, 9, 1), year.id);
    profile.status = StudentStatus::Transferred;
    let updated = env
        .state
        .student_api
        .update(&env.admin, ann.id, &UserDraft::new("Ann", "ann@school.edu"), &profile)
        .expect("更新学生状态");
    assert_eq!(updated.status, StudentStatus::Transferred);

    // 班级与学科行均退出
    let rows = env.state.enrollment_api.list_for_owner(RelationKind::StudentClass, ann.id, year.id).unwrap();
    assert!(rows.iter().all(|r| r.status == AssignmentStatus::Dropped));
    let rows = env.state.enrollment_api.list_for_owner(RelationKind::StudentSubject, ann.id, year.id).unwrap();
    assert!(rows.iter().all(|r| r.status == AssignmentStatus::Dropped));
    assert_eq!(enrolled_in(&env, class.id), 0);

    // 释放的名额可被其他学生使用
    env.state
        .enrollment_api
        .assign(&env.admin, RelationKind::StudentClass, ben.id, class.id, year.id, &AssignmentAttrs::default())
        .expect("名额已释放");
    let rows = env.state.reporting_api.class_utilization(year.id).unwrap();
    assert_eq!(rows[0].enrolled, 1);
    assert_eq!(rows[0].utilization, 100.0);
}
