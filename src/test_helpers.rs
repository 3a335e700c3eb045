use crate::db::{Store, MIGRATIONS};
use crate::telegram::{DeliveryError, Messenger, TextOptions};
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::MigrationHarness;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Notify;

/// Create a test store backed by a temporary file
pub fn create_test_store() -> (TempDir, Store) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");
    let store = Store::open(&db_path.display().to_string()).expect("Failed to open store");
    (temp_dir, store)
}

/// Create an in-memory test database connection
pub fn get_test_db_connection() -> SqliteConnection {
    let mut conn = SqliteConnection::establish(":memory:")
        .unwrap_or_else(|_| panic!("Error connecting to in-memory SQLite database"));

    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run migrations");
    conn
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { chat_id: i64, text: String },
    Photo { chat_id: i64, url: String, caption: String },
}

/// Messenger that records every call. It can reject photos, panic for one chat,
/// or hold every send until `gate` is notified.
#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<Sent>>,
    pub reject_photos: bool,
    pub panic_for: Option<i64>,
    pub gate: Option<Arc<Notify>>,
}

impl RecordingMessenger {
    pub fn rejecting_photos() -> Self {
        Self {
            reject_photos: true,
            ..Default::default()
        }
    }

    pub fn panicking_for(chat_id: i64) -> Self {
        Self {
            panic_for: Some(chat_id),
            ..Default::default()
        }
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("messenger lock").clone()
    }

    async fn before_send(&self, chat_id: i64) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.panic_for == Some(chat_id) {
            panic!("messenger failure for chat {chat_id}");
        }
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        _options: &TextOptions,
    ) -> Result<(), DeliveryError> {
        self.before_send(chat_id).await;
        self.sent.lock().expect("messenger lock").push(Sent::Text {
            chat_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_photo(
        &self,
        chat_id: i64,
        photo_url: &str,
        caption: &str,
    ) -> Result<(), DeliveryError> {
        self.before_send(chat_id).await;
        if self.reject_photos {
            return Err(DeliveryError::Api {
                status: 400,
                description: "Bad Request: wrong file identifier".to_string(),
            });
        }
        self.sent.lock().expect("messenger lock").push(Sent::Photo {
            chat_id,
            url: photo_url.to_string(),
            caption: caption.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_test_db_connection() {
        let mut conn = get_test_db_connection();
        let count: i64 = crate::schema::feed_data::table
            .count()
            .get_result(&mut conn)
            .expect("Failed to count watermarks");
        assert_eq!(count, 0);
    }
}
