//! JSONL-backed event store for the iteration log aggregate.
//!
//! One journal file per log directory, one JSON object per line, in commit
//! order. The journal is the source of truth for the lineage; snapshots are
//! a cache that cuts replay time on reopen and can be deleted at any time.
//! Competing writers are detected with a sequence check under an exclusive
//! file lock and surface as `AggregateConflict`.

use crate::domain::errors::LogError;
use crate::domain::types::TimestampUtc;
use crate::domain::IterationLogAggregate;
use crate::domain::LogEvent;
use async_trait::async_trait;
use chrono::Utc;
use cqrs_es::{
    Aggregate, AggregateContext, AggregateError, DomainEvent, EventEnvelope, EventStore,
};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// One journal line: an event with its position in the lineage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub aggregate_id: String,
    pub sequence: u64,
    pub recorded_at: TimestampUtc,
    pub event_type: String,
    pub event_version: String,
    pub event: LogEvent,
    pub metadata: HashMap<String, String>,
}

/// Aggregate state captured at a journal sequence, so reopening a long
/// lineage does not replay it from the first event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSnapshot {
    pub aggregate_id: String,
    pub sequence: u64,
    pub snapshot_at: TimestampUtc,
    pub state: IterationLogAggregate,
}

/// Event store over a journal file and its snapshot sibling.
#[derive(Debug, Clone)]
pub struct FileEventStore {
    /// The JSONL journal.
    pub log_path: PathBuf,
    /// The snapshot cache.
    pub snapshot_path: PathBuf,
    /// Snapshot cadence in events (0 disables snapshots).
    pub snapshot_every: u64,
}

/// Rehydrated aggregate plus the journal sequence it was loaded at. Commit
/// compares that sequence against the journal to catch competing writers.
pub struct FileAggregateContext<A: Aggregate> {
    pub aggregate_id: String,
    pub aggregate: A,
    pub current_sequence: u64,
}

impl<A: Aggregate> AggregateContext<A> for FileAggregateContext<A> {
    fn aggregate(&self) -> &A {
        &self.aggregate
    }
}

fn storage_err<E>(e: E) -> AggregateError<LogError>
where
    E: std::error::Error + Send + Sync + 'static,
{
    AggregateError::UnexpectedError(Box::new(e))
}

impl FileEventStore {
    pub fn new(log_path: PathBuf, snapshot_path: PathBuf, snapshot_every: u64) -> Self {
        Self {
            log_path,
            snapshot_path,
            snapshot_every,
        }
    }
}

#[async_trait]
impl EventStore<IterationLogAggregate> for FileEventStore {
    type AC = FileAggregateContext<IterationLogAggregate>;

    async fn load_events(
        &self,
        aggregate_id: &str,
    ) -> Result<Vec<EventEnvelope<IterationLogAggregate>>, AggregateError<LogError>> {
        let file = match File::open(&self.log_path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_err(e)),
        };

        // Shared lock: readers may overlap, but not with a committing writer.
        file.lock_shared().map_err(storage_err)?;

        let reader = BufReader::new(file);
        let mut envelopes = Vec::new();

        for line in reader.lines() {
            let line = line.map_err(storage_err)?;
            let stored: StoredEvent = serde_json::from_str(&line)
                .map_err(|e| AggregateError::DeserializationError(Box::new(e)))?;

            if stored.aggregate_id != aggregate_id {
                continue;
            }

            // A line whose recorded type disagrees with its payload means the
            // journal was written by an incompatible build; refuse to guess.
            if stored.event_type != stored.event.event_type()
                || stored.event_version != stored.event.event_version()
            {
                return Err(storage_err(std::io::Error::new(
                    ErrorKind::InvalidData,
                    "event version/type mismatch",
                )));
            }

            envelopes.push(EventEnvelope {
                aggregate_id: stored.aggregate_id,
                sequence: stored.sequence as usize,
                payload: stored.event,
                metadata: stored.metadata,
            });
        }

        Ok(envelopes)
    }

    async fn load_aggregate(
        &self,
        aggregate_id: &str,
    ) -> Result<Self::AC, AggregateError<LogError>> {
        let mut aggregate = IterationLogAggregate::default();
        let mut current_sequence = 0u64;

        if let Some(snapshot) = read_snapshot(&self.snapshot_path)? {
            if snapshot.aggregate_id == aggregate_id {
                aggregate = snapshot.state;
                current_sequence = snapshot.sequence;
            }
        }

        // Replay whatever the journal holds past the snapshot point.
        for event in self.load_events(aggregate_id).await? {
            let seq = event.sequence as u64;
            if seq > current_sequence {
                current_sequence = seq;
                aggregate.apply(event.payload);
            }
        }

        Ok(FileAggregateContext {
            aggregate_id: aggregate_id.to_string(),
            aggregate,
            current_sequence,
        })
    }

    async fn commit(
        &self,
        events: Vec<LogEvent>,
        context: Self::AC,
        metadata: HashMap<String, String>,
    ) -> Result<Vec<EventEnvelope<IterationLogAggregate>>, AggregateError<LogError>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent).map_err(storage_err)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.log_path)
            .map_err(storage_err)?;

        file.lock_exclusive().map_err(storage_err)?;

        let FileAggregateContext {
            aggregate_id,
            mut aggregate,
            current_sequence,
        } = context;

        // Optimistic concurrency: the journal must still end where this
        // context was loaded, otherwise another writer got there first.
        if committed_sequence(&file, &aggregate_id)? != current_sequence {
            return Err(AggregateError::AggregateConflict);
        }

        let mut sequence = current_sequence;
        let mut envelopes: Vec<EventEnvelope<IterationLogAggregate>> = Vec::new();

        for event in events {
            sequence += 1;

            let record = StoredEvent {
                aggregate_id: aggregate_id.clone(),
                sequence,
                recorded_at: TimestampUtc(Utc::now()),
                event_type: event.event_type(),
                event_version: event.event_version(),
                event: event.clone(),
                metadata: metadata.clone(),
            };

            let line = serde_json::to_string(&record).map_err(storage_err)?;
            writeln!(file, "{}", line).map_err(storage_err)?;

            envelopes.push(EventEnvelope {
                aggregate_id: aggregate_id.clone(),
                sequence: sequence as usize,
                payload: event,
                metadata: metadata.clone(),
            });
        }

        // The commit is not durable until the journal hits the disk.
        file.flush().map_err(storage_err)?;
        file.sync_all().map_err(storage_err)?;

        if snapshot_due(sequence, self.snapshot_every) {
            for envelope in &envelopes {
                aggregate.apply(envelope.payload.clone());
            }
            let snapshot = StoredSnapshot {
                aggregate_id,
                sequence,
                snapshot_at: TimestampUtc(Utc::now()),
                state: aggregate,
            };
            write_snapshot(&self.snapshot_path, &snapshot)?;
        }

        Ok(envelopes)
    }
}

fn read_snapshot(path: &Path) -> Result<Option<StoredSnapshot>, AggregateError<LogError>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(storage_err(e)),
    };

    let snapshot: StoredSnapshot = serde_json::from_str(&content)
        .map_err(|e| AggregateError::DeserializationError(Box::new(e)))?;

    Ok(Some(snapshot))
}

/// Writes the snapshot via a temp file and rename, so a crash mid-write
/// leaves the previous snapshot intact.
fn write_snapshot(path: &Path, snapshot: &StoredSnapshot) -> Result<(), AggregateError<LogError>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(storage_err)?;
    }

    let content = serde_json::to_string(snapshot).map_err(storage_err)?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, content).map_err(storage_err)?;
    std::fs::rename(&tmp_path, path).map_err(storage_err)?;

    Ok(())
}

/// Highest sequence the journal holds for an aggregate, 0 for none.
fn committed_sequence(file: &File, aggregate_id: &str) -> Result<u64, AggregateError<LogError>> {
    let mut reader = BufReader::new(file.try_clone().map_err(storage_err)?);
    reader.seek(SeekFrom::Start(0)).map_err(storage_err)?;

    let mut last_sequence = 0u64;

    for line in reader.lines() {
        let line = line.map_err(storage_err)?;
        let stored: StoredEvent = serde_json::from_str(&line)
            .map_err(|e| AggregateError::DeserializationError(Box::new(e)))?;

        if stored.aggregate_id == aggregate_id {
            last_sequence = stored.sequence;
        }
    }

    Ok(last_sequence)
}

fn snapshot_due(sequence: u64, snapshot_every: u64) -> bool {
    if snapshot_every == 0 {
        return false;
    }
    sequence.is_multiple_of(snapshot_every)
}

#[cfg(test)]
#[path = "tests/file_store_tests.rs"]
mod tests;
