// ==========================================
// 学校教务核心 - 身份数据仓储
// ==========================================
// 表: users + user_role
// 红线: 身份记录不物理删除
// ==========================================

use crate::domain::identity::{User, UserDraft};
use crate::domain::types::Role;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_codec::{fmt_date, get_datetime, get_enum, get_opt_date, now_ts};
use crate::repository::transaction::{lock, SharedConnection};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, BTreeSet};

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, email, phone, address, date_of_birth, gender, is_active, created_at, updated_at
    FROM users
"#;

// ==========================================
// UserRepository - 身份仓储
// ==========================================
pub struct UserRepository {
    conn: SharedConnection,
}

impl UserRepository {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }

    /// 插入身份记录并附加角色
    pub fn insert_tx(conn: &Connection, draft: &UserDraft, roles: &[Role]) -> RepositoryResult<i64> {
        let now = now_ts();
        conn.execute(
            r#"INSERT INTO users (
                name, email, phone, address, date_of_birth, gender, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?7)"#,
            params![
                draft.name.trim(),
                draft.normalized_email(),
                draft.phone,
                draft.address,
                draft.date_of_birth.map(fmt_date),
                draft.gender.as_ref().map(|g| g.to_lowercase()),
                now,
            ],
        )?;
        let user_id = conn.last_insert_rowid();
        for role in roles {
            Self::add_role_tx(conn, user_id, *role)?;
        }
        Ok(user_id)
    }

    pub fn update_tx(conn: &Connection, id: i64, draft: &UserDraft) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"UPDATE users
               SET name = ?1, email = ?2, phone = ?3, address = ?4,
                   date_of_birth = ?5, gender = ?6, updated_at = ?7
               WHERE id = ?8"#,
            params![
                draft.name.trim(),
                draft.normalized_email(),
                draft.phone,
                draft.address,
                draft.date_of_birth.map(fmt_date),
                draft.gender.as_ref().map(|g| g.to_lowercase()),
                now_ts(),
                id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("User", id));
        }
        Ok(())
    }

    pub fn set_active_tx(conn: &Connection, id: i64, is_active: bool) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE users SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![is_active, now_ts(), id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("User", id));
        }
        Ok(())
    }

    /// 附加角色（已存在时忽略）
    pub fn add_role_tx(conn: &Connection, user_id: i64, role: Role) -> RepositoryResult<bool> {
        let rows = conn.execute(
            "INSERT OR IGNORE INTO user_role (user_id, role) VALUES (?1, ?2)",
            params![user_id, role.to_db_str()],
        )?;
        Ok(rows > 0)
    }

    pub fn remove_role_tx(conn: &Connection, user_id: i64, role: Role) -> RepositoryResult<bool> {
        let rows = conn.execute(
            "DELETE FROM user_role WHERE user_id = ?1 AND role = ?2",
            params![user_id, role.to_db_str()],
        )?;
        Ok(rows > 0)
    }

    pub fn roles_tx(conn: &Connection, user_id: i64) -> RepositoryResult<BTreeSet<Role>> {
        let mut stmt = conn.prepare("SELECT role FROM user_role WHERE user_id = ?1")?;
        let roles = stmt
            .query_map(params![user_id], |row| get_enum(row, 0, Role::from_str))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(roles)
    }

    pub fn find_by_id_tx(conn: &Connection, id: i64) -> RepositoryResult<Option<User>> {
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
        let user = conn.query_row(&sql, params![id], map_row).optional()?;
        Self::attach_roles(conn, user)
    }

    pub fn find_by_email_tx(conn: &Connection, email: &str) -> RepositoryResult<Option<User>> {
        let sql = format!("{} WHERE email = ?1", SELECT_COLUMNS);
        let user = conn
            .query_row(&sql, params![email.trim().to_lowercase()], map_row)
            .optional()?;
        Self::attach_roles(conn, user)
    }

    fn attach_roles(conn: &Connection, user: Option<User>) -> RepositoryResult<Option<User>> {
        match user {
            Some(mut u) => {
                u.roles = Self::roles_tx(conn, u.id)?;
                Ok(Some(u))
            }
            None => Ok(None),
        }
    }

    /// 统计每个角色的在用账号数
    pub fn count_active_by_role_tx(conn: &Connection) -> RepositoryResult<BTreeMap<Role, i64>> {
        let mut counts: BTreeMap<Role, i64> = Role::all().into_iter().map(|r| (r, 0)).collect();
        let mut stmt = conn.prepare(
            r#"SELECT ur.role, COUNT(*)
               FROM user_role ur
               JOIN users u ON u.id = ur.user_id
               WHERE u.is_active = 1
               GROUP BY ur.role"#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((get_enum(row, 0, Role::from_str)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (role, count) = row?;
            counts.insert(role, count);
        }
        Ok(counts)
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        let conn = lock(&self.conn)?;
        Self::find_by_id_tx(&conn, id)
    }

    pub fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let conn = lock(&self.conn)?;
        Self::find_by_email_tx(&conn, email)
    }
}

/// 映射数据库行到 User（角色由 attach_roles 补齐）
fn map_row(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        address: row.get(4)?,
        date_of_birth: get_opt_date(row, 5)?,
        gender: row.get(6)?,
        is_active: row.get(7)?,
        roles: BTreeSet::new(),
        created_at: get_datetime(row, 8)?,
        updated_at: get_datetime(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::transaction::share;

    #[test]
    fn test_insert_user_with_roles_and_count() {
        let conn = share(crate::db::open_in_memory().unwrap());
        let repo = UserRepository::new(conn.clone());
        let id = {
            let c = lock(&conn).unwrap();
            let id = UserRepository::insert_tx(
                &c,
                &UserDraft::new("Ana", "ANA@school.edu"),
                &[Role::Admin, Role::Teacher],
            )
            .unwrap();
            UserRepository::insert_tx(&c, &UserDraft::new("Bo", "bo@school.edu"), &[Role::Teacher])
                .unwrap();
            id
        };

        let user = repo.find_by_email("ana@SCHOOL.edu").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.email, "ana@school.edu");
        assert!(user.has_role(Role::Admin));

        let c = lock(&conn).unwrap();
        let counts = UserRepository::count_active_by_role_tx(&c).unwrap();
        assert_eq!(counts[&Role::Teacher], 2);
        assert_eq!(counts[&Role::Admin], 1);
        assert_eq!(counts[&Role::Student], 0);
    }

    #[test]
    fn test_duplicate_email_is_unique_violation() {
        let conn = crate::db::open_in_memory().unwrap();
        UserRepository::insert_tx(&conn, &UserDraft::new("Ana", "ana@school.edu"), &[]).unwrap();
        let err = UserRepository::insert_tx(&conn, &UserDraft::new("Ana 2", "Ana@School.edu"), &[])
            .unwrap_err();
        assert_eq!(err.violated_unique_column(), Some("users.email"));
    }
}
