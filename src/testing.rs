//! Test support: an in-memory search index and record builders
//!
//! `MemoryIndex` implements [`SearchIndex`] over plain hash maps, with a
//! scripted pending-task queue and call counters so tests can observe
//! exactly what the pipeline did without a live cluster.

use crate::config::PkType;
use crate::es::{Document, SearchIndex};
use crate::record::{FieldValue, Record};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

#[derive(Default)]
struct MemoryIndexState {
    indices: HashMap<String, HashMap<String, Document>>,
    /// Scripted responses for `pending_tasks`; empty queue answers 0.
    task_counts: VecDeque<Result<usize, String>>,
    task_polls: usize,
    create_calls: usize,
    update_calls: usize,
    fail_writes: bool,
}

/// In-memory [`SearchIndex`] double.
#[derive(Default)]
pub struct MemoryIndex {
    state: Mutex<MemoryIndexState>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a pending-task count for the next status poll.
    pub async fn push_task_count(&self, count: usize) {
        self.state.lock().await.task_counts.push_back(Ok(count));
    }

    /// Queue a status-poll failure.
    pub async fn push_task_error(&self, message: &str) {
        self.state
            .lock()
            .await
            .task_counts
            .push_back(Err(message.to_string()));
    }

    /// Make every create/update call fail until reset.
    pub async fn set_fail_writes(&self, fail: bool) {
        self.state.lock().await.fail_writes = fail;
    }

    pub async fn document(&self, index: &str, id: &str) -> Option<Document> {
        self.state
            .lock()
            .await
            .indices
            .get(index)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    pub async fn task_polls(&self) -> usize {
        self.state.lock().await.task_polls
    }

    pub async fn create_calls(&self) -> usize {
        self.state.lock().await.create_calls
    }

    pub async fn update_calls(&self) -> usize {
        self.state.lock().await.update_calls
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.state.lock().await.indices.contains_key(index))
    }

    async fn create_index(&self, index: &str) -> Result<()> {
        self.state
            .lock()
            .await
            .indices
            .entry(index.to_string())
            .or_default();
        Ok(())
    }

    async fn get_document(&self, index: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .state
            .lock()
            .await
            .indices
            .get(index)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn create_document(&self, index: &str, id: &str, body: &Document) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.fail_writes {
            bail!("write rejected");
        }
        state.create_calls += 1;
        state
            .indices
            .entry(index.to_string())
            .or_default()
            .insert(id.to_string(), body.clone());
        Ok(())
    }

    async fn update_document(&self, index: &str, id: &str, body: &Document) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.fail_writes {
            bail!("write rejected");
        }
        state.update_calls += 1;
        let doc = state
            .indices
            .entry(index.to_string())
            .or_default()
            .entry(id.to_string())
            .or_default();
        for (k, v) in body {
            doc.insert(k.clone(), v.clone());
        }
        Ok(())
    }

    async fn pending_tasks(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        state.task_polls += 1;
        match state.task_counts.pop_front() {
            Some(Ok(count)) => Ok(count),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(0),
        }
    }
}

/// Build a record with an integer `id` key for tests.
pub fn make_record(table: &str, index: &str, pk: &str, fields: &[(&str, FieldValue)]) -> Record {
    Record {
        table_name: table.to_string(),
        index_name: index.to_string(),
        pk_name: "id".to_string(),
        pk_type: PkType::Int,
        pk_value: pk.to_string(),
        fields: fields
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect(),
    }
}
