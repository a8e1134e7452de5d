use rusqlite::{params, Connection};

use super::DatabaseError;

/// Get a value by key. Returns None if not set.
pub fn get_value(conn: &Connection, key: &str) -> Result<Option<String>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT value FROM kv_store WHERE key = ?1")?;
    match stmt.query_row([key], |row| row.get::<_, String>(0)) {
        Ok(val) => Ok(Some(val)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DatabaseError::from(e)),
    }
}

/// Set a value (upsert).
pub fn set_value(conn: &Connection, key: &str, value: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO kv_store (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))
         ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
        params![key, value],
    )?;
    Ok(())
}

/// Delete a key. Absent keys are not an error.
pub fn delete_value(conn: &Connection, key: &str) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM kv_store WHERE key = ?1", [key])?;
    Ok(())
}

/// Remove every stored key.
pub fn clear_values(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM kv_store", [])?;
    Ok(())
}

/// All stored keys, sorted.
pub fn list_keys(conn: &Connection) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT key FROM kv_store ORDER BY key")?;
    let keys = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn missing_key_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_value(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn set_then_overwrite() {
        let conn = open_memory_database().unwrap();
        set_value(&conn, "k", "one").unwrap();
        set_value(&conn, "k", "two").unwrap();
        assert_eq!(get_value(&conn, "k").unwrap().as_deref(), Some("two"));
        assert_eq!(list_keys(&conn).unwrap(), vec!["k".to_string()]);
    }

    #[test]
    fn delete_absent_key_is_ok() {
        let conn = open_memory_database().unwrap();
        assert!(delete_value(&conn, "ghost").is_ok());
    }

    #[test]
    fn clear_removes_everything() {
        let conn = open_memory_database().unwrap();
        set_value(&conn, "a", "1").unwrap();
        set_value(&conn, "b", "2").unwrap();
        clear_values(&conn).unwrap();
        assert!(list_keys(&conn).unwrap().is_empty());
    }
}
