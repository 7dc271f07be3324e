//! Storage for [`User`] rows.

use rusqlite::{params, Connection, OptionalExtension};

use crate::models::User;

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
    })
}

/// Inserts `user`.
///
/// # Errors
///
/// Fails with a constraint violation if the id is already taken.
pub fn insert_user(conn: &Connection, user: &User) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email) VALUES (?1, ?2, ?3)",
        params![user.id, user.name, user.email],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        "SELECT id, name, email FROM users WHERE id = ?1",
        params![id],
        from_row,
    )
    .optional()
}

/// All users, ordered by id.
pub fn list_users(conn: &Connection) -> rusqlite::Result<Vec<User>> {
    let mut stmt = conn.prepare("SELECT id, name, email FROM users ORDER BY id")?;
    let rows = stmt.query_map([], from_row)?;
    rows.collect()
}

/// Deletes the user with `id`, returning whether a row was removed.
pub fn delete_user(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let removed = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(removed > 0)
}
