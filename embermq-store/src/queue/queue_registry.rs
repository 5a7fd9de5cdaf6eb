/*
 * Licensed to the Apache Software Foundation (ASF) under one or more
 * contributor license agreements.  See the NOTICE file distributed with
 * this work for additional information regarding copyright ownership.
 * The ASF licenses this file to You under the Apache License, Version 2.0
 * (the "License"); you may not use this file except in compliance with
 * the License.  You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::queue::message_queue::MessageQueue;
use crate::queue::queue_key::QueueKey;

/// Concurrent map of every queue the broker holds in memory.
///
/// Reads are lock free; `snapshot` iteration is weakly consistent (entries
/// inserted or removed during iteration may or may not appear). Admin
/// writers additionally serialise on the queue service mutation mutex, so
/// no admin operation races another admin operation.
#[derive(Default)]
pub struct QueueRegistry {
    table: DashMap<QueueKey, Arc<MessageQueue>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
        }
    }

    pub fn get(&self, key: &QueueKey) -> Option<Arc<MessageQueue>> {
        self.table.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains_key(&self, key: &QueueKey) -> bool {
        self.table.contains_key(key)
    }

    /// Insert unless the key is already present. Present entries are never
    /// displaced; returns whether the queue was inserted.
    pub fn try_insert(&self, key: QueueKey, queue: Arc<MessageQueue>) -> bool {
        match self.table.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(queue);
                true
            }
        }
    }

    pub fn remove(&self, key: &QueueKey) -> Option<Arc<MessageQueue>> {
        self.table.remove(key).map(|(_, queue)| queue)
    }

    pub fn snapshot(&self) -> Vec<Arc<MessageQueue>> {
        self.table
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn clear(&self) {
        self.table.clear();
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::queue_chunk_config::QueueChunkConfig;

    fn queue(topic: &str, queue_id: i32) -> Arc<MessageQueue> {
        Arc::new(MessageQueue::new(
            topic,
            queue_id,
            Arc::new(QueueChunkConfig::default()),
        ))
    }

    #[test]
    fn try_insert_keeps_first_queue_per_key() {
        let registry = QueueRegistry::new();
        let first = queue("t", 0);
        let second = queue("t", 0);

        assert!(registry.try_insert(QueueKey::new("t", 0), first.clone()));
        assert!(!registry.try_insert(QueueKey::new("t", 0), second));

        let stored = registry.get(&QueueKey::new("t", 0)).unwrap();
        assert!(Arc::ptr_eq(&stored, &first));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_returns_the_stored_queue() {
        let registry = QueueRegistry::new();
        registry.try_insert(QueueKey::new("t", 0), queue("t", 0));

        let removed = registry.remove(&QueueKey::new("t", 0)).unwrap();
        assert_eq!(removed.queue_id(), 0);
        assert!(registry.is_empty());
        assert!(registry.remove(&QueueKey::new("t", 0)).is_none());
    }

    #[test]
    fn snapshot_sees_all_current_entries() {
        let registry = QueueRegistry::new();
        registry.try_insert(QueueKey::new("a", 0), queue("a", 0));
        registry.try_insert(QueueKey::new("a", 1), queue("a", 1));
        registry.try_insert(QueueKey::new("b", 0), queue("b", 0));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 3);

        registry.clear();
        assert!(registry.is_empty());
        // the snapshot taken earlier still holds valid references
        assert_eq!(snapshot.len(), 3);
    }
}
