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

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use cheetah_string::CheetahString;
use embermq_error::EmberMQResult;
use tracing::error;
use tracing::info;

use crate::config::queue_chunk_config::QueueChunkConfig;
use crate::queue::index_chunk;
use crate::queue::index_chunk::IndexChunkWriter;
use crate::queue::queue_key::QueueKey;
use crate::queue::queue_setting::QueueSetting;
use crate::queue::queue_setting::QueueStatus;

/// One numbered fan-out slot of a topic.
///
/// Owns the queue's index chunk files under
/// `<basePath>/<topic>/<queueId>/` and the in-memory resident portion of the
/// index sequence, a contiguous map `queueOffset -> messagePosition`.
/// `current_offset` is the highest queue offset ever written (-1 when
/// empty); `consumed_offset` is the highest offset known consumed by every
/// subscribed group (-1 when nothing is consumed).
///
/// Counters and offsets are safe for concurrent reads; index mutations
/// (`put_message_position`, `remove_all_previous_queue_index`,
/// `remove_required_queue_index_from_last`) must not be issued concurrently
/// for the same queue; callers serialise them. All index-cache operations
/// stay well defined after `close`; `put_message_position` reopens the chunk
/// writer on demand.
pub struct MessageQueue {
    topic: CheetahString,
    queue_id: i32,
    chunk_config: Arc<QueueChunkConfig>,
    setting: parking_lot::RwLock<QueueSetting>,
    current_offset: AtomicI64,
    consumed_offset: AtomicI64,
    index_cache: parking_lot::RwLock<BTreeMap<i64, i64>>,
    chunk_writer: parking_lot::Mutex<Option<IndexChunkWriter>>,
}

impl MessageQueue {
    pub fn new(
        topic: impl Into<CheetahString>,
        queue_id: i32,
        chunk_config: Arc<QueueChunkConfig>,
    ) -> Self {
        Self {
            topic: topic.into(),
            queue_id,
            chunk_config,
            setting: parking_lot::RwLock::new(QueueSetting::default()),
            current_offset: AtomicI64::new(-1),
            consumed_offset: AtomicI64::new(-1),
            index_cache: parking_lot::RwLock::new(BTreeMap::new()),
            chunk_writer: parking_lot::Mutex::new(None),
        }
    }

    pub fn topic(&self) -> &CheetahString {
        &self.topic
    }

    pub fn queue_id(&self) -> i32 {
        self.queue_id
    }

    pub fn queue_key(&self) -> QueueKey {
        QueueKey::new(self.topic.clone(), self.queue_id)
    }

    pub fn setting(&self) -> QueueSetting {
        *self.setting.read()
    }

    pub fn set_setting(&self, setting: QueueSetting) {
        *self.setting.write() = setting;
    }

    pub fn status(&self) -> QueueStatus {
        self.setting.read().status
    }

    pub fn set_status(&self, status: QueueStatus) {
        self.setting.write().status = status;
    }

    fn chunk_dir(&self) -> PathBuf {
        PathBuf::from(self.chunk_config.base_path.as_str())
            .join(self.topic.as_str())
            .join(self.queue_id.to_string())
    }

    /// Replay all chunk files of this queue into the index cache.
    pub fn load(&self) -> EmberMQResult<()> {
        let dir = self.chunk_dir();
        fs::create_dir_all(&dir)?;

        let mut cache = BTreeMap::new();
        for path in index_chunk::sorted_chunk_files(&dir)? {
            for (queue_offset, message_position) in index_chunk::load_chunk(&path)? {
                cache.insert(queue_offset, message_position);
            }
        }
        let current_offset = cache.keys().next_back().copied().unwrap_or(-1);
        let entry_count = cache.len();

        *self.index_cache.write() = cache;
        self.current_offset.store(current_offset, Ordering::Release);
        self.consumed_offset.store(-1, Ordering::Release);
        *self.chunk_writer.lock() = None;

        info!(
            "load queue {} over, {} index entries, currentOffset: {}",
            self.queue_key(),
            entry_count,
            current_offset
        );
        Ok(())
    }

    /// Flush and drop the open chunk writer. The index cache stays resident.
    pub fn close(&self) {
        if let Some(mut writer) = self.chunk_writer.lock().take() {
            if let Err(e) = writer.flush() {
                error!(
                    "flush queue index chunk {} failed: {}",
                    writer.path().display(),
                    e
                );
            }
        }
    }

    /// Close the queue and delete its chunk directory.
    pub fn destroy(&self) -> EmberMQResult<()> {
        self.close();
        self.index_cache.write().clear();
        self.current_offset.store(-1, Ordering::Release);
        self.consumed_offset.store(-1, Ordering::Release);

        let dir = self.chunk_dir();
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        info!("destroy queue index directory OK, {}", self.queue_key());
        Ok(())
    }

    pub fn current_offset(&self) -> i64 {
        self.current_offset.load(Ordering::Acquire)
    }

    pub fn consumed_offset(&self) -> i64 {
        self.consumed_offset.load(Ordering::Acquire)
    }

    /// Lowest queue offset resident in the index cache, or the next write
    /// position when nothing is resident.
    pub fn min_queue_offset(&self) -> i64 {
        let cache = self.index_cache.read();
        match cache.first_key_value() {
            Some((&first, _)) => first,
            None => self.current_offset.load(Ordering::Acquire) + 1,
        }
    }

    /// Index entries currently resident in the cache.
    pub fn message_count(&self) -> i64 {
        self.index_cache.read().len() as i64
    }

    /// Live backlog: entries written but not yet consumed by every
    /// subscribed group.
    pub fn message_real_count(&self) -> i64 {
        let current = self.current_offset.load(Ordering::Acquire);
        let consumed = self.consumed_offset.load(Ordering::Acquire);
        (current - consumed).max(0)
    }

    /// Append one index entry, returning the queue offset it was assigned.
    pub fn put_message_position(&self, message_position: i64) -> EmberMQResult<i64> {
        let mut writer_guard = self.chunk_writer.lock();
        let next_offset = self.current_offset.load(Ordering::Acquire) + 1;

        if writer_guard.as_ref().is_some_and(|writer| writer.is_full()) {
            if let Some(mut full) = writer_guard.take() {
                full.flush()?;
            }
        }
        if writer_guard.is_none() {
            *writer_guard = Some(self.open_chunk_writer(next_offset)?);
        }
        if let Some(writer) = writer_guard.as_mut() {
            writer.append(next_offset, message_position)?;
        }

        self.index_cache.write().insert(next_offset, message_position);
        self.current_offset.store(next_offset, Ordering::Release);
        Ok(next_offset)
    }

    pub fn get_message_position(&self, queue_offset: i64) -> Option<i64> {
        self.index_cache.read().get(&queue_offset).copied()
    }

    /// Discard every resident index entry with queue offset <= `upto` and
    /// advance the consumed watermark. `upto` is clamped to the current
    /// offset; negative values are a no-op.
    pub fn remove_all_previous_queue_index(&self, upto: i64) {
        let upto = upto.min(self.current_offset.load(Ordering::Acquire));
        if upto < 0 {
            return;
        }
        {
            let mut cache = self.index_cache.write();
            let retained = cache.split_off(&(upto + 1));
            *cache = retained;
        }
        // TODO: delete chunk files whose whole offset range is at or below
        // the consumed watermark
        self.consumed_offset.fetch_max(upto, Ordering::AcqRel);
    }

    /// Trim up to `require_remove_count` entries from the newest end of the
    /// index cache. Returns the count actually removed. The entries remain
    /// on disk and in the message log; `current_offset` does not move.
    pub fn remove_required_queue_index_from_last(&self, require_remove_count: i64) -> i64 {
        if require_remove_count <= 0 {
            return 0;
        }
        let mut cache = self.index_cache.write();
        let mut removed = 0;
        while removed < require_remove_count {
            if cache.pop_last().is_none() {
                break;
            }
            removed += 1;
        }
        removed
    }

    fn open_chunk_writer(&self, next_offset: i64) -> EmberMQResult<IndexChunkWriter> {
        let dir = self.chunk_dir();
        fs::create_dir_all(&dir)?;
        if let Some(last) = index_chunk::sorted_chunk_files(&dir)?.pop() {
            let writer = IndexChunkWriter::open(last, self.chunk_config.chunk_entry_count)?;
            if !writer.is_full() {
                return Ok(writer);
            }
        }
        Ok(IndexChunkWriter::create(
            &dir,
            next_offset,
            self.chunk_config.chunk_entry_count,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_config(dir: &tempfile::TempDir, chunk_entry_count: usize) -> Arc<QueueChunkConfig> {
        Arc::new(QueueChunkConfig {
            base_path: dir.path().to_string_lossy().to_string().into(),
            chunk_entry_count,
        })
    }

    #[test]
    fn fresh_queue_has_empty_counters() {
        let dir = tempfile::tempdir().unwrap();
        let queue = MessageQueue::new("t", 0, chunk_config(&dir, 16));
        assert_eq!(queue.current_offset(), -1);
        assert_eq!(queue.message_count(), 0);
        assert_eq!(queue.message_real_count(), 0);
        assert_eq!(queue.min_queue_offset(), 0);
    }

    #[test]
    fn put_assigns_monotonic_offsets_and_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let config = chunk_config(&dir, 16);
        let queue = MessageQueue::new("t", 0, config.clone());
        queue.load().unwrap();
        for expected in 0..5i64 {
            let offset = queue.put_message_position(expected * 64).unwrap();
            assert_eq!(offset, expected);
        }
        assert_eq!(queue.current_offset(), 4);
        assert_eq!(queue.get_message_position(3), Some(192));
        queue.close();

        let reloaded = MessageQueue::new("t", 0, config);
        reloaded.load().unwrap();
        assert_eq!(reloaded.current_offset(), 4);
        assert_eq!(reloaded.message_count(), 5);
        assert_eq!(reloaded.get_message_position(2), Some(128));
    }

    #[test]
    fn appends_roll_into_new_chunk_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = chunk_config(&dir, 4);
        let queue = MessageQueue::new("t", 1, config.clone());
        queue.load().unwrap();
        for position in 0..10i64 {
            queue.put_message_position(position).unwrap();
        }
        queue.close();

        let chunk_dir = dir.path().join("t").join("1");
        let files = index_chunk::sorted_chunk_files(&chunk_dir).unwrap();
        assert_eq!(files.len(), 3);

        let reloaded = MessageQueue::new("t", 1, config);
        reloaded.load().unwrap();
        assert_eq!(reloaded.message_count(), 10);
        assert_eq!(reloaded.current_offset(), 9);
    }

    #[test]
    fn remove_all_previous_discards_entries_and_advances_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let queue = MessageQueue::new("t", 0, chunk_config(&dir, 16));
        queue.load().unwrap();
        for position in 0..10i64 {
            queue.put_message_position(position).unwrap();
        }
        assert_eq!(queue.message_real_count(), 10);

        queue.remove_all_previous_queue_index(3);
        assert_eq!(queue.message_count(), 6);
        assert_eq!(queue.min_queue_offset(), 4);
        assert_eq!(queue.message_real_count(), 6);

        // idempotent with no intervening writes
        queue.remove_all_previous_queue_index(3);
        assert_eq!(queue.message_count(), 6);
        assert_eq!(queue.min_queue_offset(), 4);
    }

    #[test]
    fn remove_all_previous_clamps_to_current_offset() {
        let dir = tempfile::tempdir().unwrap();
        let queue = MessageQueue::new("t", 0, chunk_config(&dir, 16));
        queue.load().unwrap();
        for position in 0..5i64 {
            queue.put_message_position(position).unwrap();
        }
        queue.remove_all_previous_queue_index(100);
        assert_eq!(queue.message_count(), 0);
        assert_eq!(queue.consumed_offset(), 4);
        assert_eq!(queue.message_real_count(), 0);
        assert_eq!(queue.min_queue_offset(), 5);
    }

    #[test]
    fn remove_all_previous_with_negative_offset_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let queue = MessageQueue::new("t", 0, chunk_config(&dir, 16));
        queue.load().unwrap();
        queue.put_message_position(7).unwrap();
        queue.remove_all_previous_queue_index(-1);
        assert_eq!(queue.message_count(), 1);
        assert_eq!(queue.consumed_offset(), -1);
    }

    #[test]
    fn remove_from_last_reports_actual_removed_count() {
        let dir = tempfile::tempdir().unwrap();
        let queue = MessageQueue::new("t", 0, chunk_config(&dir, 16));
        queue.load().unwrap();
        for position in 0..3i64 {
            queue.put_message_position(position).unwrap();
        }
        assert_eq!(queue.remove_required_queue_index_from_last(10), 3);
        assert_eq!(queue.message_count(), 0);
        // the newest-end trim does not move the write position
        assert_eq!(queue.current_offset(), 2);
        assert_eq!(queue.remove_required_queue_index_from_last(1), 0);
        assert_eq!(queue.remove_required_queue_index_from_last(0), 0);
    }

    #[test]
    fn evicted_entries_are_refaultable_from_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let config = chunk_config(&dir, 16);
        let queue = MessageQueue::new("t", 0, config.clone());
        queue.load().unwrap();
        for position in 0..8i64 {
            queue.put_message_position(position * 2).unwrap();
        }
        assert_eq!(queue.remove_required_queue_index_from_last(3), 3);
        assert_eq!(queue.message_count(), 5);
        queue.close();

        let reloaded = MessageQueue::new("t", 0, config);
        reloaded.load().unwrap();
        assert_eq!(reloaded.message_count(), 8);
        assert_eq!(reloaded.get_message_position(7), Some(14));
    }

    #[test]
    fn index_operations_after_close_stay_well_defined() {
        let dir = tempfile::tempdir().unwrap();
        let queue = MessageQueue::new("t", 0, chunk_config(&dir, 16));
        queue.load().unwrap();
        for position in 0..4i64 {
            queue.put_message_position(position).unwrap();
        }
        queue.close();

        queue.remove_all_previous_queue_index(1);
        assert_eq!(queue.message_count(), 2);
        assert_eq!(queue.remove_required_queue_index_from_last(1), 1);
        // the writer reopens on demand
        assert_eq!(queue.put_message_position(99).unwrap(), 4);
    }

    #[test]
    fn destroy_removes_chunk_directory() {
        let dir = tempfile::tempdir().unwrap();
        let queue = MessageQueue::new("t", 2, chunk_config(&dir, 16));
        queue.load().unwrap();
        queue.put_message_position(1).unwrap();
        let chunk_dir = dir.path().join("t").join("2");
        assert!(chunk_dir.exists());

        queue.destroy().unwrap();
        assert!(!chunk_dir.exists());
        assert_eq!(queue.message_count(), 0);
        assert_eq!(queue.current_offset(), -1);
    }

    #[test]
    fn status_flips_are_visible() {
        let dir = tempfile::tempdir().unwrap();
        let queue = MessageQueue::new("t", 0, chunk_config(&dir, 16));
        assert_eq!(queue.status(), QueueStatus::Enabled);
        queue.set_status(QueueStatus::Disabled);
        assert_eq!(queue.status(), QueueStatus::Disabled);
    }
}
