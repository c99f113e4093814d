// ==========================================
// 身份与档案集成测试
// ==========================================
// 测试范围:
// 1. 教师/学生建档: 编号生成、邮箱唯一、失败整体回滚
// 2. 身份停用级联、重新启用
// 3. 角色标签权限
// ==========================================

mod helpers;

use helpers::{date, TestEnv};
use school_core::api::{NewStudent, NewTeacher};
use school_core::{
    Actor, ApiError, AssignmentAttrs, AssignmentStatus, RelationKind, Role, StudentProfileDraft, StudentStatus,
    TeacherProfileDraft, TeacherStatus, UserDraft,
};

// ==========================================
// 建档
// ==========================================

#[test]
fn test_create_student_生成学号() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);

    let s1 = env.student("Ann", year.id);
    let s2 = env.student("Ben", year.id);
    assert_eq!(s1.student_id, "STU2024001");
    assert_eq!(s2.student_id, "STU2024002");

    let user = env.state.user_api.get(s1.user_id).expect("身份记录");
    assert!(user.has_role(Role::Student));
    assert!(user.is_active);
    assert_eq!(s1.status, StudentStatus::Enrolled);
}

#[test]
fn test_create_student_跳过已占用学号() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);

    let mut profile = StudentProfileDraft::new(date(2024, 9, 1), year.id);
    profile.student_id = Some("STU2024002".to_string());
    env.student_request(NewStudent::new(UserDraft::new("Ann", "ann@school.edu"), profile));

    // 已有 1 个同前缀学号，002 被占用，顺延到 003
    let next = env.student("Ben", year.id);
    assert_eq!(next.student_id, "STU2024003");
}

#[test]
fn test_create_teacher_生成工号() {
    let env = TestEnv::new();
    let t = env.teacher("Tom");
    assert_eq!(t.employee_id, "TCH2020001");
    assert_eq!(t.status, TeacherStatus::Active);
    assert!(env.state.user_api.get(t.user_id).unwrap().has_role(Role::Teacher));
}

#[test]
fn test_create_邮箱重复大小写不敏感() {
    let env = TestEnv::new();
    env.teacher("Tom");

    let request = NewTeacher::new(
        UserDraft::new("Tom Again", "  TOM@School.edu "),
        TeacherProfileDraft::new(date(2021, 8, 1)),
    );
    let err = env.state.teacher_api.create(&env.admin, &request).expect_err("邮箱重复");
    match err {
        ApiError::UniquenessConflict { field } => assert_eq!(field, "users.email"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(env.count("SELECT COUNT(*) FROM users"), 1);
}

#[test]
fn test_create_teacher_学科不存在整体回滚() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let math = env.subject("MATH", &[]);

    let mut request = NewTeacher::new(
        UserDraft::new("Tom", "tom@school.edu"),
        TeacherProfileDraft::new(date(2020, 8, 15)),
    );
    request.subject_ids = vec![math.id, 999];
    request.academic_year_id = Some(year.id);

    let err = env.state.teacher_api.create(&env.admin, &request).expect_err("学科不存在");
    assert_eq!(err.code(), "NOT_FOUND");
    assert_eq!(env.count("SELECT COUNT(*) FROM users"), 0);
    assert_eq!(env.count("SELECT COUNT(*) FROM teacher"), 0);
    assert_eq!(env.count("SELECT COUNT(*) FROM assignment"), 0);
    assert_eq!(env.count("SELECT COUNT(*) FROM action_log WHERE action_type = 'CREATE_TEACHER'"), 0);
}

#[test]
fn test_create_teacher_默认使用当前学年() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let math = env.subject("MATH", &[]);
    let class = env.class(year.id, 5, "A", 30);

    let mut request = NewTeacher::new(
        UserDraft::new("Tom", "tom@school.edu"),
        TeacherProfileDraft::new(date(2020, 8, 15)),
    );
    request.subject_ids = vec![math.id];
    request.class_ids = vec![class.id];
    let teacher = env.state.teacher_api.create(&env.admin, &request).expect("建档");

    let subjects = env
        .state
        .enrollment_api
        .list_for_owner(RelationKind::TeacherSubject, teacher.id, year.id)
        .unwrap();
    assert_eq!(subjects.len(), 1);
    assert_eq!(subjects[0].status, AssignmentStatus::Assigned);
    let classes = env
        .state
        .enrollment_api
        .list_for_owner(RelationKind::TeacherClass, teacher.id, year.id)
        .unwrap();
    assert_eq!(classes.len(), 1);
}

#[test]
fn test_create_teacher_无当前学年时需指定() {
    let env = TestEnv::new();
    let math = env.subject("MATH", &[]);

    let mut request = NewTeacher::new(
        UserDraft::new("Tom", "tom@school.edu"),
        TeacherProfileDraft::new(date(2020, 8, 15)),
    );
    request.subject_ids = vec![math.id];

    let err = env.state.teacher_api.create(&env.admin, &request).expect_err("缺少学年");
    match err {
        ApiError::Validation(fields) => assert_eq!(fields[0].field, "academic_year_id"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_create_student_停用学年被拒绝() {
    let env = TestEnv::new();
    env.year("2024-2025", 2024, true);
    let old = env.year("2023-2024", 2023, false);
    env.state.academic_year_api.deactivate(&env.admin, old.id).unwrap();

    let request = NewStudent::new(
        UserDraft::new("Ann", "ann@school.edu"),
        StudentProfileDraft::new(date(2023, 9, 1), old.id),
    );
    let err = env.state.student_api.create(&env.admin, &request).expect_err("学年已停用");
    assert_eq!(err.code(), "CONFLICT");
    assert_eq!(env.count("SELECT COUNT(*) FROM users"), 0);
}

#[test]
fn test_update_teacher_邮箱保持不冲突() {
    let env = TestEnv::new();
    let t = env.teacher("Tom");
    let mut profile = TeacherProfileDraft::new(date(2020, 8, 15));
    profile.department = Some("Science".to_string());
    profile.experience_years = 5;

    let updated = env
        .state
        .teacher_api
        .update(&env.admin, t.id, &UserDraft::new("Tom Lee", "tom@school.edu"), &profile)
        .expect("更新");
    assert_eq!(updated.department.as_deref(), Some("Science"));
    assert_eq!(updated.experience_years, 5);
    assert_eq!(updated.employee_id, t.employee_id);
    assert_eq!(env.state.user_api.get(t.user_id).unwrap().name, "Tom Lee");
}

// ==========================================
// 停用级联
// ==========================================

#[test]
fn test_deactivate_user_教师级联() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let math = env.subject("MATH", &[]);
    let class = env.class(year.id, 5, "A", 30);
    let t = env.teacher("Tom");
    let api = &env.state.enrollment_api;
    api.assign(&env.admin, RelationKind::TeacherSubject, t.id, math.id, year.id, &AssignmentAttrs::primary_teacher())
        .unwrap();
    api.assign(&env.admin, RelationKind::TeacherClass, t.id, class.id, year.id, &AssignmentAttrs::class_teacher())
        .unwrap();

    let user = env.state.user_api.deactivate_user(&env.admin, t.user_id).expect("停用");
    assert!(!user.is_active);

    assert_eq!(env.state.teacher_api.get(t.id).unwrap().status, TeacherStatus::Inactive);
    assert_eq!(env.state.subject_api.get(math.id).unwrap().primary_teacher_id, None);
    assert_eq!(env.state.class_api.get(class.id).unwrap().class_teacher_id, None);
    assert_eq!(
        env.count("SELECT COUNT(*) FROM assignment WHERE status = 'ASSIGNED'"),
        0
    );
    assert_eq!(
        env.count("SELECT COUNT(*) FROM assignment WHERE status = 'UNASSIGNED'"),
        2
    );

    // 停用教师不再接受新分配
    let err = api
        .assign(&env.admin, RelationKind::TeacherSubject, t.id, math.id, year.id, &AssignmentAttrs::default())
        .expect_err("教师已停用");
    assert_eq!(err.code(), "CONFLICT");
}

#[test]
fn test_deactivate_user_学生释放名额() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let class = env.class(year.id, 5, "A", 1);
    let s1 = env.student_request(
        NewStudent::new(
            UserDraft::new("Ann", "ann@school.edu"),
            StudentProfileDraft::new(date(2024, 9, 1), year.id),
        )
        .in_class(class.id),
    );

    env.state.user_api.deactivate_user(&env.admin, s1.user_id).unwrap();
    assert_eq!(env.state.student_api.get(s1.id).unwrap().status, StudentStatus::Inactive);

    // 名额已释放
    let s2 = env.student("Ben", year.id);
    env.state
        .enrollment_api
        .assign(&env.admin, RelationKind::StudentClass, s2.id, class.id, year.id, &AssignmentAttrs::default())
        .expect("名额已释放");

    // 重新启用只恢复档案状态，不恢复分配
    env.state.user_api.activate_user(&env.admin, s1.user_id).unwrap();
    assert_eq!(env.state.student_api.get(s1.id).unwrap().status, StudentStatus::Enrolled);
    let rows = env
        .state
        .enrollment_api
        .list_for_owner(RelationKind::StudentClass, s1.id, year.id)
        .unwrap();
    assert_eq!(rows[0].status, AssignmentStatus::Dropped);
}

// ==========================================
// 角色标签
// ==========================================

#[test]
fn test_assign_role_超级管理员标签() {
    let env = TestEnv::new();
    let t = env.teacher("Tom");
    let user_api = &env.state.user_api;

    let err = user_api
        .assign_role(&env.admin, t.user_id, Role::SuperAdmin)
        .expect_err("管理员不能授予超级管理员");
    assert_eq!(err.code(), "PERMISSION_DENIED");

    let root = Actor::new(99, &[Role::SuperAdmin]);
    let user = user_api.assign_role(&root, t.user_id, Role::SuperAdmin).expect("超级管理员授予");
    assert!(user.has_role(Role::SuperAdmin));
    assert!(user.has_role(Role::Teacher));

    // 管理员不能停用超级管理员
    let err = user_api.deactivate_user(&env.admin, t.user_id).expect_err("无权停用");
    assert_eq!(err.code(), "PERMISSION_DENIED");

    let user = user_api.revoke_role(&root, t.user_id, Role::SuperAdmin).unwrap();
    assert!(!user.has_role(Role::SuperAdmin));
}

#[test]
fn test_assign_role_重复授予幂等() {
    let env = TestEnv::new();
    let t = env.teacher("Tom");
    let user_api = &env.state.user_api;

    user_api.assign_role(&env.admin, t.user_id, Role::Admin).unwrap();
    let user = user_api.assign_role(&env.admin, t.user_id, Role::Admin).unwrap();
    assert_eq!(user.roles.len(), 2);
    assert_eq!(env.count("SELECT COUNT(*) FROM action_log WHERE action_type = 'ASSIGN_ROLE'"), 1);
}

#[test]
fn test_非管理员写操作被拒绝() {
    let env = TestEnv::new();
    let year = env.year("2024-2025", 2024, true);
    let teacher_actor = Actor::new(7, &[Role::Teacher]);
    let student_actor = Actor::new(8, &[Role::Student]);

    let request = NewStudent::new(
        UserDraft::new("Ann", "ann@school.edu"),
        StudentProfileDraft::new(date(2024, 9, 1), year.id),
    );
    for actor in [&teacher_actor, &student_actor] {
        let err = env.state.student_api.create(actor, &request).expect_err("无权限");
        assert_eq!(err.code(), "PERMISSION_DENIED");
    }
    assert_eq!(env.count("SELECT COUNT(*) FROM users"), 0);

    let s = env.student("Ben", year.id);
    let err = env
        .state
        .student_api
        .record_payment(&teacher_actor, s.id, 100.0)
        .expect_err("教师不能记录缴费");
    assert_eq!(err.code(), "PERMISSION_DENIED");
}
