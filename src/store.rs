//! Board metadata store — the durable boundary of the sync engine.
//!
//! ARCHITECTURE
//! ============
//! The relay never owns scene content; the store is the single durable home
//! of the last-saved snapshot plus the board's recorded owner. Two callers:
//! the snapshot synchronizer (read, on join/request) and the owning client's
//! debounced saver (write, after each quiet period).
//!
//! DESIGN
//! ======
//! `BoardStore` is a trait object so the engine runs against Postgres in
//! production and an in-memory map in tests. The in-memory implementation
//! counts writes and supports failure injection, which is what the saver's
//! skip/retry tests hinge on.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("board not found: {0}")]
    NotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable")]
    Unavailable,
}

impl crate::frame::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_BOARD_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
            Self::Unavailable => "E_STORE_UNAVAILABLE",
        }
    }

    fn retryable(&self) -> bool {
        !matches!(self, Self::NotFound(_))
    }
}

/// Durable board record. `canvas_data` is the last-saved scene snapshot,
/// opaque to the relay.
#[derive(Debug, Clone)]
pub struct BoardRecord {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Option<Uuid>,
    pub canvas_data: Option<String>,
}

// =============================================================================
// TRAIT
// =============================================================================

#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Fetch a board record, `None` if the board was never persisted.
    async fn get_board(&self, board_id: Uuid) -> Result<Option<BoardRecord>, StoreError>;

    /// Overwrite the board's snapshot. Creates the record if missing so a
    /// brand-new board is savable by its creator on the first flush.
    async fn update_canvas(&self, board_id: Uuid, canvas_data: &str) -> Result<(), StoreError>;
}

// =============================================================================
// POSTGRES
// =============================================================================

/// Postgres-backed store over the shared pool.
pub struct PgBoardStore {
    pool: PgPool,
}

impl PgBoardStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BoardStore for PgBoardStore {
    async fn get_board(&self, board_id: Uuid) -> Result<Option<BoardRecord>, StoreError> {
        let row = sqlx::query_as::<_, (Uuid, String, Option<Uuid>, Option<String>)>(
            "SELECT id, name, owner_id, canvas_data FROM boards WHERE id = $1",
        )
        .bind(board_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, name, owner_id, canvas_data)| BoardRecord { id, name, owner_id, canvas_data }))
    }

    async fn update_canvas(&self, board_id: Uuid, canvas_data: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO boards (id, name, canvas_data, updated_at) \
             VALUES ($1, 'Untitled Board', $2, now()) \
             ON CONFLICT (id) DO UPDATE SET canvas_data = EXCLUDED.canvas_data, updated_at = now()",
        )
        .bind(board_id)
        .bind(canvas_data)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// =============================================================================
// IN-MEMORY
// =============================================================================

/// In-memory store for tests: a mutexed map plus a write counter and a
/// failure toggle.
pub struct MemoryBoardStore {
    boards: Mutex<HashMap<Uuid, BoardRecord>>,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryBoardStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            boards: Mutex::new(HashMap::new()),
            writes: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Seed a board record (dropping any previous one).
    pub fn insert_board(&self, record: BoardRecord) {
        let mut boards = self.boards.lock().expect("store mutex poisoned");
        boards.insert(record.id, record);
    }

    /// Number of `update_canvas` calls that actually went through.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make subsequent reads fail with `Unavailable`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent writes fail with `Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// The currently stored snapshot for a board, if any.
    pub fn canvas_data(&self, board_id: Uuid) -> Option<String> {
        let boards = self.boards.lock().expect("store mutex poisoned");
        boards.get(&board_id).and_then(|b| b.canvas_data.clone())
    }
}

impl Default for MemoryBoardStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BoardStore for MemoryBoardStore {
    async fn get_board(&self, board_id: Uuid) -> Result<Option<BoardRecord>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        let boards = self.boards.lock().expect("store mutex poisoned");
        Ok(boards.get(&board_id).cloned())
    }

    async fn update_canvas(&self, board_id: Uuid, canvas_data: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        let mut boards = self.boards.lock().expect("store mutex poisoned");
        let record = boards.entry(board_id).or_insert_with(|| BoardRecord {
            id: board_id,
            name: "Untitled Board".into(),
            owner_id: None,
            canvas_data: None,
        });
        record.canvas_data = Some(canvas_data.to_owned());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
