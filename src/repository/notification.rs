//! Persistence for notification tokens and their priority topics.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use super::Result;
use crate::models::TokenRegistration;

/// SQLite-backed store for registered client tokens.
pub struct NotificationRepository {
    db_path: PathBuf,
}

impl NotificationRepository {
    /// Open (and if needed create) the token store.
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
            "CREATE TABLE IF NOT EXISTS notification_tokens (
                token TEXT PRIMARY KEY
            );
            CREATE TABLE IF NOT EXISTS priority_topics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token TEXT NOT NULL
                    REFERENCES notification_tokens(token) ON DELETE CASCADE,
                topic TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_topics_topic
                ON priority_topics(topic);",
        )
    }

    /// Register a token with its topic set.
    ///
    /// Re-registration replaces the token's previous topics atomically;
    /// stale topics never survive. Topic strings are stored as submitted
    /// (only blank ones are dropped) — the core resolves, it does not
    /// validate the grammar.
    pub fn register(&self, token: &str, topics: &[String]) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO notification_tokens (token) VALUES (?)",
            params![token],
        )?;
        tx.execute(
            "DELETE FROM priority_topics WHERE token = ?",
            params![token],
        )?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO priority_topics (token, topic) VALUES (?1, ?2)")?;
            for topic in topics {
                let topic = topic.trim();
                if topic.is_empty() {
                    continue;
                }
                stmt.execute(params![token, topic])?;
            }
        }
        tx.commit()
    }

    /// Remove a single token (cascading its topics). Returns whether it
    /// existed.
    pub fn remove_token(&self, token: &str) -> Result<bool> {
        let conn = self.connect()?;
        let deleted = conn.execute(
            "DELETE FROM notification_tokens WHERE token = ?",
            params![token],
        )?;
        Ok(deleted > 0)
    }

    /// Bulk-delete tokens the dispatch collaborator rejected as invalid.
    pub fn delete_tokens(&self, tokens: &[String]) -> Result<usize> {
        if tokens.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM notification_tokens WHERE token = ?")?;
            for token in tokens {
                deleted += stmt.execute(params![token])?;
            }
        }
        tx.commit()?;
        Ok(deleted)
    }

    /// Tokens subscribed to one encoded topic.
    pub fn tokens_for_topic(&self, topic: &str) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT token FROM priority_topics WHERE topic = ? ORDER BY token",
        )?;
        let tokens = stmt
            .query_map(params![topic], |row| row.get(0))?
            .collect::<Result<Vec<_>>>()?;
        Ok(tokens)
    }

    /// All registrations with their topics (listing output).
    pub fn registrations(&self) -> Result<Vec<TokenRegistration>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT token FROM notification_tokens ORDER BY token")?;
        let tokens: Vec<String> = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>>>()?;

        let mut stmt =
            conn.prepare("SELECT topic FROM priority_topics WHERE token = ? ORDER BY topic")?;
        let mut registrations = Vec::with_capacity(tokens.len());
        for token in tokens {
            let topics = stmt
                .query_map(params![&token], |row| row.get(0))?
                .collect::<Result<Vec<_>>>()?;
            registrations.push(TokenRegistration { token, topics });
        }
        Ok(registrations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> (tempfile::TempDir, NotificationRepository) {
        let dir = tempfile::tempdir().unwrap();
        let repo = NotificationRepository::new(&dir.path().join("test.db")).unwrap();
        (dir, repo)
    }

    #[test]
    fn reregistration_replaces_topics() {
        let (_dir, repo) = repo();
        repo.register(
            "tok-1",
            &[
                "substitute.timetable.1.2.ABC".to_string(),
                "substitute.timetable.1.2.9a".to_string(),
            ],
        )
        .unwrap();
        repo.register("tok-1", &["substitute.timetable.2.3.DEF".to_string()])
            .unwrap();

        assert!(repo
            .tokens_for_topic("substitute.timetable.1.2.ABC")
            .unwrap()
            .is_empty());
        assert_eq!(
            repo.tokens_for_topic("substitute.timetable.2.3.DEF").unwrap(),
            vec!["tok-1"]
        );
    }

    #[test]
    fn blank_topics_are_dropped() {
        let (_dir, repo) = repo();
        repo.register("tok-1", &["  ".to_string(), "some.topic".to_string()])
            .unwrap();
        let regs = repo.registrations().unwrap();
        assert_eq!(regs.len(), 1);
        assert_eq!(regs[0].topics, vec!["some.topic"]);
    }

    #[test]
    fn deleting_token_cascades_topics() {
        let (_dir, repo) = repo();
        repo.register("tok-1", &["substitute.timetable.1.2.9a".to_string()])
            .unwrap();
        repo.register("tok-2", &["substitute.timetable.1.2.9a".to_string()])
            .unwrap();

        assert_eq!(repo.delete_tokens(&["tok-1".to_string()]).unwrap(), 1);
        assert_eq!(
            repo.tokens_for_topic("substitute.timetable.1.2.9a").unwrap(),
            vec!["tok-2"]
        );

        let conn = repo.connect().unwrap();
        let orphans: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM priority_topics WHERE token = 'tok-1'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn remove_token_reports_existence() {
        let (_dir, repo) = repo();
        repo.register("tok-1", &[]).unwrap();
        assert!(repo.remove_token("tok-1").unwrap());
        assert!(!repo.remove_token("tok-1").unwrap());
    }
}
