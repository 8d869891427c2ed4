//! Persistence for substitution entries and daily messages.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

use super::Result;
use crate::models::{SubstituteEntry, SubstituteMessage};

/// SQLite-backed store for the plan's entries and messages.
pub struct PlanRepository {
    db_path: PathBuf,
}

impl PlanRepository {
    /// Open (and if needed create) the plan store.
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS substitute_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                class_name TEXT NOT NULL,
                lesson INTEGER NOT NULL,
                subject TEXT,
                substitute_teacher TEXT,
                teacher TEXT,
                kind TEXT NOT NULL,
                substitute_of TEXT,
                room TEXT,
                text TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_entries_date
                ON substitute_entries(date);
            CREATE INDEX IF NOT EXISTS idx_entries_date_lesson
                ON substitute_entries(date, lesson);
            CREATE TABLE IF NOT EXISTS substitute_messages (
                date TEXT PRIMARY KEY,
                absent_teachers TEXT,
                absent_classes TEXT,
                affected_classes TEXT,
                affected_rooms TEXT,
                blocked_rooms TEXT,
                messages TEXT
            );",
        )
    }

    /// All stored entries for one date.
    pub fn entries_for_date(&self, date: NaiveDate) -> Result<Vec<SubstituteEntry>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT * FROM substitute_entries WHERE date = ? ORDER BY lesson, id")?;
        let entries = stmt
            .query_map(params![date], row_to_entry)?
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Insert a fresh entry, returning its new row id.
    pub fn insert_entry(&self, entry: &SubstituteEntry) -> Result<i64> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO substitute_entries
                (date, class_name, lesson, subject, substitute_teacher,
                 teacher, kind, substitute_of, room, text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.date,
                entry.class_name,
                entry.lesson,
                entry.subject,
                entry.substitute_teacher,
                entry.teacher,
                entry.kind,
                entry.substitute_of,
                entry.room,
                entry.text,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Update a stored entry in place, keyed by its row id.
    pub fn update_entry(&self, entry: &SubstituteEntry) -> Result<()> {
        let id = match entry.id {
            Some(id) => id,
            None => return Err(rusqlite::Error::QueryReturnedNoRows),
        };
        let conn = self.connect()?;
        conn.execute(
            "UPDATE substitute_entries SET
                date = ?1, class_name = ?2, lesson = ?3, subject = ?4,
                substitute_teacher = ?5, teacher = ?6, kind = ?7,
                substitute_of = ?8, room = ?9, text = ?10
             WHERE id = ?11",
            params![
                entry.date,
                entry.class_name,
                entry.lesson,
                entry.subject,
                entry.substitute_teacher,
                entry.teacher,
                entry.kind,
                entry.substitute_of,
                entry.room,
                entry.text,
                id,
            ],
        )?;
        Ok(())
    }

    /// Delete stored entries by id, returning how many rows went away.
    pub fn delete_entries(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM substitute_entries WHERE id = ?")?;
            for id in ids {
                deleted += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    /// Lower-grade lookup: entries on (date, lesson) whose class name
    /// matches the combined-row tolerant LIKE pattern.
    pub fn find_by_class_pattern(
        &self,
        date: NaiveDate,
        lesson: u32,
        pattern: &str,
    ) -> Result<Vec<SubstituteEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM substitute_entries
             WHERE date = ?1 AND lesson = ?2 AND class_name LIKE ?3
             ORDER BY id",
        )?;
        let entries = stmt
            .query_map(params![date, lesson, pattern], row_to_entry)?
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Upper-grade lookup by (date, lesson, teacher).
    pub fn find_by_teacher(
        &self,
        date: NaiveDate,
        lesson: u32,
        teacher: &str,
    ) -> Result<Vec<SubstituteEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM substitute_entries
             WHERE date = ?1 AND lesson = ?2 AND teacher = ?3
             ORDER BY id",
        )?;
        let entries = stmt
            .query_map(params![date, lesson, teacher], row_to_entry)?
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Upper-grade lookup by (date, lesson, subject), used when the
    /// candidate has no teacher to correlate on.
    pub fn find_by_subject(
        &self,
        date: NaiveDate,
        lesson: u32,
        subject: &str,
    ) -> Result<Vec<SubstituteEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM substitute_entries
             WHERE date = ?1 AND lesson = ?2 AND subject = ?3
             ORDER BY id",
        )?;
        let entries = stmt
            .query_map(params![date, lesson, subject], row_to_entry)?
            .collect::<Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Replace the message block for a date (delete-then-insert, one
    /// transaction). There is never more than one message row per date.
    pub fn replace_message(&self, message: &SubstituteMessage) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM substitute_messages WHERE date = ?",
            params![message.date],
        )?;
        tx.execute(
            "INSERT INTO substitute_messages
                (date, absent_teachers, absent_classes, affected_classes,
                 affected_rooms, blocked_rooms, messages)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.date,
                message.absent_teachers,
                message.absent_classes,
                message.affected_classes,
                message.affected_rooms,
                message.blocked_rooms,
                message.messages,
            ],
        )?;
        tx.commit()
    }

    /// The stored message block for a date, if any.
    pub fn message_for_date(&self, date: NaiveDate) -> Result<Option<SubstituteMessage>> {
        use rusqlite::OptionalExtension;

        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM substitute_messages WHERE date = ?")?;
        stmt.query_row(params![date], |row| {
            Ok(SubstituteMessage {
                date: row.get("date")?,
                absent_teachers: row.get("absent_teachers")?,
                absent_classes: row.get("absent_classes")?,
                affected_classes: row.get("affected_classes")?,
                affected_rooms: row.get("affected_rooms")?,
                blocked_rooms: row.get("blocked_rooms")?,
                messages: row.get("messages")?,
            })
        })
        .optional()
    }

    /// Per-date entry counts, newest first (status output).
    pub fn dates_with_counts(&self) -> Result<Vec<(NaiveDate, i64)>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT date, COUNT(*) FROM substitute_entries
             GROUP BY date ORDER BY date DESC",
        )?;
        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>>>()?;
        Ok(counts)
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<SubstituteEntry> {
    Ok(SubstituteEntry {
        id: Some(row.get("id")?),
        date: row.get("date")?,
        class_name: row.get("class_name")?,
        lesson: row.get("lesson")?,
        subject: row.get("subject")?,
        substitute_teacher: row.get("substitute_teacher")?,
        teacher: row.get("teacher")?,
        kind: row.get("kind")?,
        substitute_of: row.get("substitute_of")?,
        room: row.get("room")?,
        text: row.get("text")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> (tempfile::TempDir, PlanRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = PlanRepository::new(&dir.path().join("test.db")).unwrap();
        (dir, repo)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 9, 12).unwrap()
    }

    fn entry(class_name: &str, lesson: u32) -> SubstituteEntry {
        SubstituteEntry {
            id: None,
            date: date(),
            class_name: class_name.to_string(),
            lesson,
            subject: Some("Ma1".to_string()),
            substitute_teacher: None,
            teacher: Some("ABC".to_string()),
            kind: "Vertretung".to_string(),
            substitute_of: None,
            room: Some("112".to_string()),
            text: None,
        }
    }

    #[test]
    fn insert_and_read_back() {
        let (_dir, repo) = repo();
        let id = repo.insert_entry(&entry("6b", 2)).unwrap();
        let stored = repo.entries_for_date(date()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, Some(id));
        assert_eq!(stored[0].class_name, "6b");
        assert_eq!(stored[0].teacher.as_deref(), Some("ABC"));
    }

    #[test]
    fn class_pattern_matches_combined_rows() {
        let (_dir, repo) = repo();
        repo.insert_entry(&entry("6bc", 2)).unwrap();
        let found = repo.find_by_class_pattern(date(), 2, "6%b%").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].class_name, "6bc");

        assert!(repo.find_by_class_pattern(date(), 3, "6%b%").unwrap().is_empty());
        assert!(repo.find_by_class_pattern(date(), 2, "7%b%").unwrap().is_empty());
    }

    #[test]
    fn update_keeps_identity() {
        let (_dir, repo) = repo();
        let id = repo.insert_entry(&entry("6b", 2)).unwrap();
        let mut stored = repo.entries_for_date(date()).unwrap().remove(0);
        stored.room = Some("204".to_string());
        repo.update_entry(&stored).unwrap();

        let again = repo.entries_for_date(date()).unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].id, Some(id));
        assert_eq!(again[0].room.as_deref(), Some("204"));
    }

    #[test]
    fn message_replacement_keeps_one_row_per_date() {
        let (_dir, repo) = repo();
        let mut message = SubstituteMessage::new(date());
        message.absent_teachers = Some("ABC".to_string());
        repo.replace_message(&message).unwrap();

        message.absent_teachers = Some("DEF".to_string());
        message.messages = Some("Sporthalle gesperrt.".to_string());
        repo.replace_message(&message).unwrap();

        let stored = repo.message_for_date(date()).unwrap().unwrap();
        assert_eq!(stored.absent_teachers.as_deref(), Some("DEF"));
        assert_eq!(stored.messages.as_deref(), Some("Sporthalle gesperrt."));

        let conn = repo.connect().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM substitute_messages", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
