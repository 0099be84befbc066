use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::chunk::Chunk;

struct ChunkQueue {
    table_name: String,
    chunks: Vec<Chunk>,
    next_idx: usize,
}

impl ChunkQueue {
    fn is_exhausted(&self) -> bool {
        self.next_idx == self.chunks.len()
    }

    fn take_next(&mut self) -> Chunk {
        let chunk = self.chunks[self.next_idx].clone();
        self.next_idx += 1;
        chunk
    }
}

struct State {
    queues: HashMap<String, ChunkQueue>,
    current_processing: HashMap<String, usize>,
}

impl State {
    fn processing_count_all(&self) -> usize {
        self.current_processing.values().sum()
    }

    fn processing_count(&self, table: &str) -> usize {
        *self.current_processing.get(table).unwrap_or(&0)
    }

    fn min_score_table(&self) -> Option<&str> {
        let mut best: Option<(&str, usize)> = None;
        for queue in self.queues.values() {
            if queue.is_exhausted() {
                continue;
            }
            let score = self.processing_count(&queue.table_name);
            match best {
                Some((_, best_score)) if best_score <= score => {}
                _ => best = Some((queue.table_name.as_str(), score)),
            }
        }
        best.map(|(name, _)| name)
    }

    fn tables_with_remaining_chunks(&self) -> usize {
        self.queues.values().filter(|q| !q.is_exhausted()).count()
    }
}

/// Per-table chunk queues plus a least-in-flight / last-table selection policy (§4.3);
/// callers block on `get_next` until a chunk is admissible or all queues are drained.
pub struct ChunkManager {
    state: Mutex<State>,
    max_processing: usize,
    max_on_last_table: usize,
    sender: mpsc::UnboundedSender<Option<Chunk>>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<Option<Chunk>>>,
}

impl ChunkManager {
    pub fn new(max_processing: usize, max_on_last_table: usize) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(State { queues: HashMap::new(), current_processing: HashMap::new() }),
            max_processing,
            max_on_last_table,
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
        }
    }

    pub fn add_chunk(&self, chunk: Chunk) {
        let mut state = self.state.lock().unwrap();
        let queue = state
            .queues
            .entry(chunk.table_name.clone())
            .or_insert_with(|| ChunkQueue { table_name: chunk.table_name.clone(), chunks: Vec::new(), next_idx: 0 });
        queue.chunks.push(chunk);
    }

    /// Returns the next chunk to dispatch, or `None` once every queue is exhausted and
    /// nothing remains in flight — the exporter's signal to stop draining this table set.
    pub async fn get_next(&self) -> Option<Chunk> {
        self.recalculate_and_send();
        self.receiver.lock().await.recv().await.flatten()
    }

    pub fn done(&self, table: &str) {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(count) = state.current_processing.get_mut(table) {
                *count = count.saturating_sub(1);
            }
        }
        self.recalculate_and_send();
    }

    fn recalculate_and_send(&self) {
        let mut state = self.state.lock().unwrap();

        if state.processing_count_all() >= self.max_processing {
            return;
        }

        let Some(table) = state.min_score_table().map(|t| t.to_string()) else {
            let _ = self.sender.send(None);
            return;
        };

        let remaining_tables = state.tables_with_remaining_chunks();
        if remaining_tables == 1 && state.processing_count(&table) > self.max_on_last_table.saturating_sub(1) {
            return;
        }

        let chunk = state.queues.get_mut(&table).unwrap().take_next();
        *state.current_processing.entry(table).or_insert(0) += 1;
        let _ = self.sender.send(Some(chunk));
    }

    pub fn processing_counts(&self) -> HashMap<String, usize> {
        let state = self.state.lock().unwrap();
        state.current_processing.iter().filter(|(_, c)| **c > 0).map(|(k, v)| (k.clone(), *v)).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn drains_single_table_in_order() {
        let manager = ChunkManager::new(4, 2);
        manager.add_chunk(Chunk { table_name: "t".into(), condition: "a".into() });
        manager.add_chunk(Chunk { table_name: "t".into(), condition: "b".into() });

        let first = manager.get_next().await.unwrap();
        assert_eq!(first.condition, "a");
        manager.done("t");

        let second = manager.get_next().await.unwrap();
        assert_eq!(second.condition, "b");
        manager.done("t");

        assert!(manager.get_next().await.is_none());
    }

    #[tokio::test]
    async fn last_table_gate_caps_concurrency_below_global_max() {
        let manager = ChunkManager::new(4, 2);
        for i in 0..4 {
            manager.add_chunk(Chunk { table_name: "only".into(), condition: i.to_string() });
        }

        let mut in_flight = Vec::new();
        for _ in 0..2 {
            in_flight.push(manager.get_next().await.unwrap());
        }

        // third chunk should be withheld: only table has 2 in flight == max_on_last_table
        let maybe_third = tokio::time::timeout(std::time::Duration::from_millis(50), manager.get_next()).await;
        assert!(maybe_third.is_err(), "manager should not dispatch past the last-table gate");
    }

    #[tokio::test]
    async fn empty_manager_reports_done_immediately() {
        let manager = ChunkManager::new(4, 2);
        assert!(manager.get_next().await.is_none());
    }
}
