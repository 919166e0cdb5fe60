//! SQLite [`Store`] backend.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC text (`...T09:00:00Z`),
//! which sorts chronologically, so the due-set query and its ordering run in
//! SQL against the `next_reminder` index.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use log::{debug, warn};
use sqlite::{Connection, State, Statement};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{bounded, normalize_basket, validate_instant, validate_title, Deadline, Pin, Store};
use crate::core::clock::Clock;
use crate::core::error::StoreError;
use crate::features::reminders::ReminderSchedule;

const CREATE_DEADLINES_TABLE: &str = "
CREATE TABLE IF NOT EXISTS deadlines(
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    due_at TEXT NOT NULL,
    next_reminder TEXT NOT NULL,
    next_remind_index INTEGER NOT NULL DEFAULT -1
);";

const CREATE_DEADLINES_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_deadlines_next_reminder ON deadlines(next_reminder);";

const CREATE_BASKETS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS baskets(
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL
);";

const CREATE_PINS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS pins(
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content TEXT NOT NULL,
    basket_id INTEGER NOT NULL,
    FOREIGN KEY(basket_id) REFERENCES baskets(id)
        ON DELETE CASCADE
);";

const DEADLINE_COLUMNS: &str = "id, title, due_at, next_reminder, next_remind_index";

impl From<sqlite::Error> for StoreError {
    fn from(e: sqlite::Error) -> Self {
        StoreError::Storage(e.to_string())
    }
}

fn to_db_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn from_db_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Storage(format!("corrupt timestamp '{raw}': {e}")))
}

fn read_deadline(statement: &Statement<'_>) -> Result<Deadline, StoreError> {
    let due_at: String = statement.read("due_at")?;
    let next_reminder: String = statement.read("next_reminder")?;

    Ok(Deadline {
        id: statement.read("id")?,
        title: statement.read("title")?,
        due_at: from_db_time(&due_at)?,
        next_reminder_at: from_db_time(&next_reminder)?,
        next_reminder_index: statement.read("next_remind_index")?,
    })
}

/// Rows that fail to decode are logged and skipped so the rest stay reachable.
fn collect_deadlines(mut statement: Statement<'_>) -> Result<Vec<Deadline>, StoreError> {
    let mut deadlines = Vec::new();
    while let State::Row = statement.next()? {
        match read_deadline(&statement) {
            Ok(deadline) => deadlines.push(deadline),
            Err(e) => {
                let id = statement.read::<i64, _>("id").unwrap_or_default();
                warn!("Skipping unreadable deadline row #{id}: {e}");
            }
        }
    }
    Ok(deadlines)
}

fn basket_id(conn: &Connection, name: &str) -> Result<i64, StoreError> {
    let mut statement = conn.prepare("SELECT id FROM baskets WHERE name = ?")?;
    statement.bind((1, name))?;

    match statement.next()? {
        State::Row => Ok(statement.read::<i64, _>("id")?),
        State::Done => Err(StoreError::not_found("basket", name)),
    }
}

/// Fails if the deadlines table predates the precomputed-reminder columns.
fn check_schema(conn: &Connection) -> Result<(), StoreError> {
    let mut statement = conn.prepare("PRAGMA table_info(deadlines)")?;
    let mut has_next_reminder = false;
    while let State::Row = statement.next()? {
        let column: String = statement.read("name")?;
        has_next_reminder |= column == "next_reminder";
    }

    if has_next_reminder {
        Ok(())
    } else {
        Err(StoreError::Storage(
            "deadlines table uses the legacy reminder_count layout; migrate or remove it".to_string(),
        ))
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    schedule: ReminderSchedule,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl SqliteStore {
    /// Open (or create) the database at `path`. `":memory:"` gives a private
    /// in-process database.
    pub fn open(
        path: impl AsRef<Path>,
        schedule: ReminderSchedule,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;

        conn.execute("PRAGMA journal_mode = WAL;")?;
        conn.execute("PRAGMA foreign_keys = ON;")?;
        conn.execute(CREATE_DEADLINES_TABLE)?;
        check_schema(&conn)?;
        conn.execute(CREATE_DEADLINES_INDEX)?;
        conn.execute(CREATE_BASKETS_TABLE)?;
        conn.execute(CREATE_PINS_TABLE)?;

        debug!("SQLite schema ready at {}", path.as_ref().display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            schedule,
            clock,
            timeout,
        })
    }

    /// Run `f` against the connection on the blocking pool, bounded by the
    /// store timeout. A timed-out call may still finish in the background;
    /// its effects are whole because every write is a single statement.
    async fn run<T, F>(&self, operation: &'static str, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let task = tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Storage("connection mutex poisoned".to_string()))?;
            f(&guard)
        });

        let result = bounded(operation, self.timeout, async move {
            task.await
                .map_err(|e| StoreError::Storage(format!("{operation} task failed: {e}")))?
        })
        .await;

        if let Err(e) = &result {
            if e.is_transient() {
                warn!("⏳ {e}");
            }
        }
        result
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn add_deadline(&self, title: &str, due_at: DateTime<Utc>) -> Result<Deadline, StoreError> {
        let title = validate_title(title)?;
        validate_instant("due date", due_at)?;
        let due_at = due_at.trunc_subsecs(0);
        let (next_reminder_at, next_reminder_index) =
            self.schedule.compute_initial_reminder(due_at, self.clock.now());
        validate_instant("first reminder", next_reminder_at)?;

        self.run("add_deadline", move |conn| {
            let mut statement = conn.prepare(
                "INSERT INTO deadlines (title, due_at, next_reminder, next_remind_index)
                 VALUES (?, ?, ?, ?);",
            )?;
            statement.bind((1, title.as_str()))?;
            statement.bind((2, to_db_time(due_at).as_str()))?;
            statement.bind((3, to_db_time(next_reminder_at).as_str()))?;
            statement.bind((4, next_reminder_index))?;
            statement.next()?;

            let mut statement = conn.prepare("SELECT last_insert_rowid() AS id")?;
            statement.next()?;
            let id: i64 = statement.read("id")?;

            Ok(Deadline {
                id,
                title,
                due_at,
                next_reminder_at: next_reminder_at.trunc_subsecs(0),
                next_reminder_index,
            })
        })
        .await
    }

    async fn list_deadlines(&self) -> Result<Vec<Deadline>, StoreError> {
        self.run("list_deadlines", |conn| {
            let statement = conn.prepare(format!(
                "SELECT {DEADLINE_COLUMNS} FROM deadlines ORDER BY due_at ASC, id ASC;"
            ))?;
            collect_deadlines(statement)
        })
        .await
    }

    async fn list_due_deadlines(&self, now: DateTime<Utc>) -> Result<Vec<Deadline>, StoreError> {
        let now = to_db_time(now);

        self.run("list_due_deadlines", move |conn| {
            let mut statement = conn.prepare(format!(
                "SELECT {DEADLINE_COLUMNS} FROM deadlines
                 WHERE next_reminder <= ?
                 ORDER BY next_reminder ASC, id ASC;"
            ))?;
            statement.bind((1, now.as_str()))?;
            collect_deadlines(statement)
        })
        .await
    }

    async fn update_next_reminder(
        &self,
        id: i64,
        next_reminder_at: DateTime<Utc>,
        next_reminder_index: i64,
    ) -> Result<(), StoreError> {
        validate_instant("next reminder", next_reminder_at)?;
        let next_reminder_at = to_db_time(next_reminder_at);

        self.run("update_next_reminder", move |conn| {
            let mut statement = conn.prepare(
                "UPDATE deadlines
                 SET next_reminder = ?, next_remind_index = ?
                 WHERE id = ?;",
            )?;
            statement.bind((1, next_reminder_at.as_str()))?;
            statement.bind((2, next_reminder_index))?;
            statement.bind((3, id))?;
            statement.next()?;

            if conn.change_count() == 0 {
                return Err(StoreError::not_found("deadline", id));
            }
            Ok(())
        })
        .await
    }

    async fn delete_deadline(&self, id: i64) -> Result<(), StoreError> {
        self.run("delete_deadline", move |conn| {
            let mut statement = conn.prepare("DELETE FROM deadlines WHERE id = ?;")?;
            statement.bind((1, id))?;
            statement.next()?;

            if conn.change_count() == 0 {
                return Err(StoreError::not_found("deadline", id));
            }
            Ok(())
        })
        .await
    }

    async fn add_basket(&self, name: &str) -> Result<(), StoreError> {
        let name = normalize_basket(name)?;

        self.run("add_basket", move |conn| {
            if basket_id(conn, &name).is_ok() {
                return Err(StoreError::AlreadyExists {
                    entity: "basket",
                    key: name,
                });
            }

            let mut statement = conn.prepare("INSERT INTO baskets (name) VALUES (?);")?;
            statement.bind((1, name.as_str()))?;
            statement.next()?;
            Ok(())
        })
        .await
    }

    async fn list_baskets(&self) -> Result<Vec<String>, StoreError> {
        self.run("list_baskets", |conn| {
            let mut statement = conn.prepare("SELECT name FROM baskets ORDER BY name ASC;")?;
            let mut names = Vec::new();
            while let State::Row = statement.next()? {
                names.push(statement.read::<String, _>("name")?);
            }
            Ok(names)
        })
        .await
    }

    async fn delete_basket(&self, name: &str) -> Result<(), StoreError> {
        let name = normalize_basket(name)?;

        self.run("delete_basket", move |conn| {
            let mut statement = conn.prepare("DELETE FROM baskets WHERE name = ?;")?;
            statement.bind((1, name.as_str()))?;
            statement.next()?;

            if conn.change_count() == 0 {
                return Err(StoreError::not_found("basket", &name));
            }
            Ok(())
        })
        .await
    }

    async fn add_pin(&self, basket: &str, content: &str) -> Result<Pin, StoreError> {
        let basket = normalize_basket(basket)?;
        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(StoreError::Validation("pin content cannot be empty".to_string()));
        }

        self.run("add_pin", move |conn| {
            let basket_id = basket_id(conn, &basket)?;

            let mut statement =
                conn.prepare("INSERT INTO pins (content, basket_id) VALUES (?, ?);")?;
            statement.bind((1, content.as_str()))?;
            statement.bind((2, basket_id))?;
            statement.next()?;

            let mut statement = conn.prepare("SELECT last_insert_rowid() AS id")?;
            statement.next()?;
            let id: i64 = statement.read("id")?;

            Ok(Pin { id, content })
        })
        .await
    }

    async fn list_pins(&self, basket: &str) -> Result<Vec<Pin>, StoreError> {
        let basket = normalize_basket(basket)?;

        self.run("list_pins", move |conn| {
            let basket_id = basket_id(conn, &basket)?;

            let mut statement =
                conn.prepare("SELECT id, content FROM pins WHERE basket_id = ? ORDER BY id ASC;")?;
            statement.bind((1, basket_id))?;

            let mut pins = Vec::new();
            while let State::Row = statement.next()? {
                pins.push(Pin {
                    id: statement.read("id")?,
                    content: statement.read("content")?,
                });
            }
            Ok(pins)
        })
        .await
    }

    async fn delete_pin(&self, basket: &str, id: i64) -> Result<(), StoreError> {
        let basket = normalize_basket(basket)?;

        self.run("delete_pin", move |conn| {
            let basket_id = basket_id(conn, &basket)?;

            let mut statement = conn.prepare("DELETE FROM pins WHERE basket_id = ? AND id = ?;")?;
            statement.bind((1, basket_id))?;
            statement.bind((2, id))?;
            statement.next()?;

            if conn.change_count() == 0 {
                return Err(StoreError::not_found("pin", id));
            }
            Ok(())
        })
        .await
    }
}
