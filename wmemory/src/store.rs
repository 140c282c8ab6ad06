//! SQLite-backed conversation store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use wbackend::{Message, Role, ToolCall};
use wchat::{ChatError, ChatFuture, ConversationStore};

use crate::MemoryError;

/// Durable transcript storage; one row per message, ordered by an
/// explicit per-session sequence number so load order matches append order.
#[derive(Debug)]
pub struct SqliteTranscriptStore {
    connection: Mutex<Connection>,
}

impl SqliteTranscriptStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|error| {
                MemoryError::storage(format!("failed to create sqlite parent directory: {error}"))
            })?;
        }

        let connection = Connection::open(path).map_err(|error| {
            MemoryError::storage(format!("failed to open sqlite database: {error}"))
        })?;

        Self::from_connection(connection)
    }

    pub fn new_in_memory() -> Result<Self, MemoryError> {
        let connection = Connection::open_in_memory().map_err(|error| {
            MemoryError::storage(format!("failed to open in-memory sqlite database: {error}"))
        })?;

        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self, MemoryError> {
        connection
            .busy_timeout(Duration::from_secs(5))
            .map_err(|error| {
                MemoryError::storage(format!("failed to configure sqlite busy timeout: {error}"))
            })?;

        let store = Self {
            connection: Mutex::new(connection),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, MemoryError> {
        self.connection
            .lock()
            .map_err(|_| MemoryError::storage("sqlite store lock poisoned"))
    }

    fn initialize_schema(&self) -> Result<(), MemoryError> {
        let conn = self.connection()?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS transcript_messages (
                session_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                tool_call_id TEXT,
                tool_calls_json TEXT,
                PRIMARY KEY (session_id, seq)
            );
            ",
        )
        .map_err(|error| {
            MemoryError::storage(format!("failed to initialize sqlite schema: {error}"))
        })
    }

    fn load_sync(&self, session_id: &str) -> Result<Vec<Message>, MemoryError> {
        let conn = self.connection()?;
        let mut statement = conn
            .prepare(
                "SELECT role, content, tool_call_id, tool_calls_json
                 FROM transcript_messages
                 WHERE session_id = ?1
                 ORDER BY seq ASC",
            )
            .map_err(|error| MemoryError::storage(error.to_string()))?;

        let rows = statement
            .query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })
            .map_err(|error| MemoryError::storage(error.to_string()))?;

        let mut messages = Vec::new();
        for row in rows {
            let (role, content, tool_call_id, tool_calls_json) =
                row.map_err(|error| MemoryError::storage(error.to_string()))?;

            messages.push(Message {
                role: parse_role(&role)?,
                content,
                tool_calls: decode_tool_calls(tool_calls_json.as_deref())?,
                tool_call_id,
            });
        }

        Ok(messages)
    }

    fn append_sync(&self, session_id: &str, messages: Vec<Message>) -> Result<(), MemoryError> {
        let mut conn = self.connection()?;
        let tx = conn
            .transaction()
            .map_err(|error| MemoryError::storage(error.to_string()))?;

        let mut next_seq: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(seq), -1) + 1 FROM transcript_messages WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .map_err(|error| MemoryError::storage(error.to_string()))?;

        for message in messages {
            let tool_calls_json = encode_tool_calls(&message.tool_calls)?;
            tx.execute(
                "INSERT INTO transcript_messages
                 (session_id, seq, role, content, tool_call_id, tool_calls_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    session_id,
                    next_seq,
                    role_str(message.role),
                    message.content,
                    message.tool_call_id,
                    tool_calls_json,
                ],
            )
            .map_err(|error| MemoryError::storage(error.to_string()))?;
            next_seq += 1;
        }

        tx.commit()
            .map_err(|error| MemoryError::storage(error.to_string()))
    }
}

impl ConversationStore for SqliteTranscriptStore {
    fn load_messages<'a>(
        &'a self,
        session_id: &'a str,
    ) -> ChatFuture<'a, Result<Vec<Message>, ChatError>> {
        Box::pin(async move {
            self.load_sync(session_id)
                .map_err(|error| ChatError::store(error.to_string()))
        })
    }

    fn append_messages<'a>(
        &'a self,
        session_id: &'a str,
        messages: Vec<Message>,
    ) -> ChatFuture<'a, Result<(), ChatError>> {
        Box::pin(async move {
            self.append_sync(session_id, messages)
                .map_err(|error| ChatError::store(error.to_string()))
        })
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn parse_role(value: &str) -> Result<Role, MemoryError> {
    match value {
        "system" => Ok(Role::System),
        "user" => Ok(Role::User),
        "assistant" => Ok(Role::Assistant),
        "tool" => Ok(Role::Tool),
        other => Err(MemoryError::encoding(format!("unknown role '{other}'"))),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredToolCall {
    id: String,
    name: String,
    arguments: String,
}

fn encode_tool_calls(tool_calls: &[ToolCall]) -> Result<Option<String>, MemoryError> {
    if tool_calls.is_empty() {
        return Ok(None);
    }

    let stored = tool_calls
        .iter()
        .map(|tool_call| StoredToolCall {
            id: tool_call.id.clone(),
            name: tool_call.name.clone(),
            arguments: tool_call.arguments.clone(),
        })
        .collect::<Vec<_>>();

    serde_json::to_string(&stored)
        .map(Some)
        .map_err(|error| MemoryError::encoding(error.to_string()))
}

fn decode_tool_calls(tool_calls_json: Option<&str>) -> Result<Vec<ToolCall>, MemoryError> {
    let Some(tool_calls_json) = tool_calls_json else {
        return Ok(Vec::new());
    };

    let stored: Vec<StoredToolCall> = serde_json::from_str(tool_calls_json)
        .map_err(|error| MemoryError::encoding(error.to_string()))?;

    Ok(stored
        .into_iter()
        .map(|stored| ToolCall {
            id: stored.id,
            name: stored.name,
            arguments: stored.arguments,
        })
        .collect())
}
