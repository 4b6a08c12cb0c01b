//! Cross-entity transaction coordinator.
//!
//! Operations that change a fact and the counters mirroring it elsewhere are
//! written in one all-or-nothing transaction. [`TransactionBuilder`] collects
//! the `*_op` builders of the repositories, remembers which domain error each
//! operation stands for, and translates a canceled transaction into that
//! error. [`ChunkedWriter`] splits jobs too large for one transaction into
//! sequential atomic chunks that can be re-run safely.
//!
//! The composite operations themselves live on [`Coordinator`], grouped by
//! area in the submodules.

mod chat;
mod post;
mod rekey;
mod user;

use thiserror::Error;

use onetable_core::storage::{classify, RepositoryError, Result, StorageError, TransactOp};

use crate::repositories::{
    AlbumRepository, CardRepository, ChatMemberRepository, ChatMessageRepository, ChatRepository,
    CommentRepository, FeedRepository, FirstStoryRepository, FlagRepository, FollowerRepository,
    LikeRepository, PostRepository, UserRepository, ViewRepository,
};
use crate::table::Table;

pub use rekey::RekeyReport;

/// Errors from multi-step coordinator jobs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoordinatorError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("Chunk {chunk} failed after {applied} chunks were applied: {source}")]
    ChunkFailed {
        chunk: usize,
        applied: usize,
        source: RepositoryError,
    },
}

impl From<CoordinatorError> for RepositoryError {
    fn from(error: CoordinatorError) -> Self {
        match error {
            CoordinatorError::Repository(source) | CoordinatorError::ChunkFailed { source, .. } => source,
        }
    }
}

/// Result type for coordinator jobs.
pub type CoordinatorResult<T> = std::result::Result<T, CoordinatorError>;

// ============================================================================
// TransactionBuilder
// ============================================================================

/// Collects operations for one transaction.
#[derive(Debug, Default)]
pub struct TransactionBuilder {
    ops: Vec<TransactOp>,
    on_conflict: Vec<Option<RepositoryError>>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an operation whose failed condition maps to a generic `Conflict`.
    pub fn push(&mut self, op: TransactOp) -> &mut Self {
        self.ops.push(op);
        self.on_conflict.push(None);
        self
    }

    /// Adds an operation whose failed condition means `error`.
    pub fn push_or(&mut self, op: TransactOp, error: RepositoryError) -> &mut Self {
        self.ops.push(op);
        self.on_conflict.push(Some(error));
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[TransactOp] {
        &self.ops
    }

    /// Submits the operations as one transaction.
    pub async fn commit(self, table: &Table) -> Result<()> {
        if self.ops.is_empty() {
            return Ok(());
        }

        match table.engine().transact_write(&self.ops).await {
            Ok(()) => Ok(()),
            Err(StorageError::TransactionCanceled {
                failed_index: Some(index),
                reason,
            }) => {
                let kind = self.ops.get(index).map(TransactOp::kind).unwrap_or("unknown");
                let error = self
                    .on_conflict
                    .get(index)
                    .cloned()
                    .flatten()
                    .unwrap_or(RepositoryError::Conflict(reason));
                if matches!(error, RepositoryError::CounterUnderflow { .. }) {
                    tracing::error!(index, kind, error = %error, "transaction would drive a counter below zero");
                } else {
                    tracing::debug!(index, kind, error = %error, "transaction canceled");
                }
                Err(error)
            }
            Err(err) => Err(err.into()),
        }
    }
}

// ============================================================================
// ChunkedWriter
// ============================================================================

/// What happened to one chunk of a [`ChunkedWriter`] job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    Applied,
    /// The chunk's conditions showed it had been written by an earlier run.
    AlreadyApplied,
}

/// Writes long operation lists as a sequence of atomic transactions.
///
/// Operations are passed in groups; a group is never split across chunks.
/// A chunk canceled by a condition counts as already applied when every
/// conditioned operation in it is now false against the stored items, which
/// holds for create-then-delete style jobs that are re-run after a crash.
/// Any other failure stops the job with [`CoordinatorError::ChunkFailed`].
#[derive(Debug, Clone)]
pub struct ChunkedWriter {
    table: Table,
    chunk_size: usize,
}

impl ChunkedWriter {
    pub fn new(table: Table) -> Self {
        let chunk_size = table.max_transact_items();
        Self { table, chunk_size }
    }

    /// Caps chunks below the engine limit.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, self.table.max_transact_items().max(1));
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Writes single operations.
    pub async fn write(&self, ops: Vec<TransactOp>) -> CoordinatorResult<Vec<ChunkOutcome>> {
        self.write_groups(ops.into_iter().map(|op| vec![op]).collect())
            .await
    }

    /// Writes groups of operations, keeping each group in one chunk.
    pub async fn write_groups(&self, groups: Vec<Vec<TransactOp>>) -> CoordinatorResult<Vec<ChunkOutcome>> {
        let chunks = self.pack(groups);
        let total = chunks.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, chunk) in chunks.into_iter().enumerate() {
            match self.table.engine().transact_write(&chunk).await {
                Ok(()) => {
                    tracing::debug!(chunk = index, total, size = chunk.len(), "chunk applied");
                    outcomes.push(ChunkOutcome::Applied);
                }
                Err(err) if err.is_conflict() => {
                    let source = RepositoryError::from(err);
                    match self.already_applied(&chunk).await {
                        Ok(true) => {
                            tracing::info!(chunk = index, total, "chunk already applied, skipping");
                            outcomes.push(ChunkOutcome::AlreadyApplied);
                        }
                        Ok(false) => {
                            return Err(self.failed(index, outcomes.len(), source));
                        }
                        Err(check_error) => {
                            return Err(self.failed(index, outcomes.len(), check_error));
                        }
                    }
                }
                Err(err) => return Err(self.failed(index, outcomes.len(), err.into())),
            }
        }

        Ok(outcomes)
    }

    fn failed(&self, chunk: usize, applied: usize, source: RepositoryError) -> CoordinatorError {
        tracing::warn!(chunk, applied, class = ?classify(&source), error = %source, "chunked write stopped");
        CoordinatorError::ChunkFailed {
            chunk,
            applied,
            source,
        }
    }

    fn pack(&self, groups: Vec<Vec<TransactOp>>) -> Vec<Vec<TransactOp>> {
        let mut chunks: Vec<Vec<TransactOp>> = Vec::new();
        let mut current: Vec<TransactOp> = Vec::new();

        for group in groups.into_iter().filter(|group| !group.is_empty()) {
            if !current.is_empty() && current.len() + group.len() > self.chunk_size {
                chunks.push(std::mem::take(&mut current));
            }
            current.extend(group);
        }
        if !current.is_empty() {
            chunks.push(current);
        }
        chunks
    }

    async fn already_applied(&self, chunk: &[TransactOp]) -> Result<bool> {
        let mut conditioned = 0;
        for op in chunk {
            let Some(condition) = op.condition() else {
                continue;
            };
            conditioned += 1;
            let stored = self.table.get_item(&op.key()?).await?;
            if condition.evaluate(stored.as_ref()) {
                return Ok(false);
            }
        }
        Ok(conditioned > 0)
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Composite operations spanning several entities.
#[derive(Debug, Clone)]
pub struct Coordinator {
    table: Table,
}

impl Coordinator {
    pub fn new(table: Table) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn chunked_writer(&self) -> ChunkedWriter {
        ChunkedWriter::new(self.table.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.table.clone())
    }

    pub fn posts(&self) -> PostRepository {
        PostRepository::new(self.table.clone())
    }

    pub fn albums(&self) -> AlbumRepository {
        AlbumRepository::new(self.table.clone())
    }

    pub fn chats(&self) -> ChatRepository {
        ChatRepository::new(self.table.clone())
    }

    pub fn chat_members(&self) -> ChatMemberRepository {
        ChatMemberRepository::new(self.table.clone())
    }

    pub fn chat_messages(&self) -> ChatMessageRepository {
        ChatMessageRepository::new(self.table.clone())
    }

    pub fn comments(&self) -> CommentRepository {
        CommentRepository::new(self.table.clone())
    }

    pub fn likes(&self) -> LikeRepository {
        LikeRepository::new(self.table.clone())
    }

    pub fn flags(&self) -> FlagRepository {
        FlagRepository::new(self.table.clone())
    }

    pub fn views(&self) -> ViewRepository {
        ViewRepository::new(self.table.clone())
    }

    pub fn followers(&self) -> FollowerRepository {
        FollowerRepository::new(self.table.clone())
    }

    pub fn feeds(&self) -> FeedRepository {
        FeedRepository::new(self.table.clone())
    }

    pub fn first_stories(&self) -> FirstStoryRepository {
        FirstStoryRepository::new(self.table.clone())
    }

    pub fn cards(&self) -> CardRepository {
        CardRepository::new(self.table.clone())
    }
}
