// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库 + AppState 组装，常用测试数据构造
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDate;
use tempfile::NamedTempFile;

use school_core::api::{NewStudent, NewTeacher};
use school_core::app::AppState;
use school_core::domain::{
    AcademicYear, AcademicYearDraft, Actor, SchoolClass, SchoolClassDraft, Student, StudentProfileDraft, Subject,
    SubjectDraft, Teacher, TeacherProfileDraft, UserDraft,
};
use school_core::repository::lock;
use school_core::Role;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

/// 集成测试环境
///
/// 临时文件需要与环境同生命周期
pub struct TestEnv {
    pub state: AppState,
    pub admin: Actor,
    _temp_file: NamedTempFile,
}

impl TestEnv {
    pub fn new() -> Self {
        school_core::logging::init_test();
        let temp_file = NamedTempFile::new().expect("Failed to create temp db file");
        let db_path = temp_file.path().to_str().expect("utf-8 temp path").to_string();
        let state = AppState::new(db_path).expect("Failed to init AppState");
        Self {
            state,
            admin: Actor::new(1, &[Role::Admin]),
            _temp_file: temp_file,
        }
    }

    /// 执行计数 SQL
    pub fn count(&self, sql: &str) -> i64 {
        let conn = lock(&self.state.conn).expect("lock");
        conn.query_row(sql, [], |row| row.get(0)).expect("count query")
    }

    pub fn year(&self, name: &str, start_year: i32, current: bool) -> AcademicYear {
        let mut draft = AcademicYearDraft::new(name, date(start_year, 9, 1), date(start_year + 1, 6, 30));
        draft.is_current = current;
        self.state
            .academic_year_api
            .create(&self.admin, &draft)
            .expect("create academic year")
    }

    pub fn class(&self, year_id: i64, grade: i32, section: &str, capacity: i32) -> SchoolClass {
        let draft = SchoolClassDraft::new(&format!("{}{}", grade, section), grade, section, year_id)
            .with_capacity(capacity);
        self.state.class_api.create(&self.admin, &draft).expect("create class")
    }

    pub fn subject(&self, code: &str, grades: &[i32]) -> Subject {
        let draft = SubjectDraft::new(&format!("Subject {}", code), code).for_grades(grades);
        self.state.subject_api.create(&self.admin, &draft).expect("create subject")
    }

    pub fn teacher(&self, name: &str) -> Teacher {
        let request = NewTeacher::new(
            UserDraft::new(name, &format!("{}@school.edu", name.to_lowercase())),
            TeacherProfileDraft::new(date(2020, 8, 15)),
        );
        self.state.teacher_api.create(&self.admin, &request).expect("create teacher")
    }

    pub fn student(&self, name: &str, year_id: i64) -> Student {
        self.student_request(NewStudent::new(
            UserDraft::new(name, &format!("{}@school.edu", name.to_lowercase())),
            StudentProfileDraft::new(date(2024, 9, 1), year_id),
        ))
    }

    pub fn student_request(&self, request: NewStudent) -> Student {
        self.state.student_api.create(&self.admin, &request).expect("create student")
    }
}
