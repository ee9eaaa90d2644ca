//! Bounded chat history

use rusqlite::params;
use tracing::debug;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{ChatRole, ChatTurn};

impl Database {
    /// Append a turn and drop the oldest beyond the configured cap
    pub fn save_chat_turn(&self, user_id: &str, role: ChatRole, content: &str) -> Result<()> {
        let keep = self.chat_history_limit as i64;
        self.write_tx(|conn| {
            conn.execute(
                "INSERT INTO chat_history (user_id, role, content) VALUES (?, ?, ?)",
                params![user_id, role.as_str(), content],
            )?;
            let pruned = conn.execute(
                r#"
                DELETE FROM chat_history
                WHERE user_id = ?1 AND id NOT IN (
                    SELECT id FROM chat_history WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2
                )
                "#,
                params![user_id, keep],
            )?;
            if pruned > 0 {
                debug!(user = %user_id, pruned, "Pruned chat history");
            }
            Ok(())
        })
    }

    /// The last `limit` turns, oldest first
    pub fn get_chat_history(&self, user_id: &str, limit: usize) -> Result<Vec<ChatTurn>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT role, content, created_at FROM chat_history WHERE user_id = ? ORDER BY id DESC LIMIT ?",
        )?;
        let mut turns = stmt
            .query_map(params![user_id, limit as i64], |row| {
                let role: String = row.get(0)?;
                let created_at: String = row.get(2)?;
                Ok(ChatTurn {
                    role: role.parse().unwrap_or(ChatRole::User),
                    content: row.get(1)?,
                    created_at: parse_datetime(&created_at),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        turns.reverse();
        Ok(turns)
    }

    /// Forget a user's conversation
    pub fn clear_chat_history(&self, user_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        Ok(conn.execute(
            "DELETE FROM chat_history WHERE user_id = ?",
            params![user_id],
        )?)
    }
}
