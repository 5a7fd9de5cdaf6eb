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

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use cheetah_string::CheetahString;
use embermq_common::common::broker::broker_config::BrokerConfig;
use embermq_error::EmberMQError;
use embermq_error::EmberMQResult;
use embermq_runtime::TaskScheduler;
use embermq_store::base::message_store::MessageStore;
use embermq_store::config::queue_chunk_config::QueueChunkConfig;
use embermq_store::queue::MessageQueue;
use embermq_store::queue::QueueKey;
use embermq_store::queue::QueueMeta;
use embermq_store::queue::QueueRegistry;
use embermq_store::queue::QueueStatus;
use embermq_store::queue::QueueStore;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::offset::OffsetManager;
use crate::queue::startup_loader;

pub const REMOVE_CONSUMED_QUEUE_INDEX_TASK: &str = "RemoveConsumedQueueIndex";
pub const REMOVE_EXCEED_MAX_CACHE_QUEUE_INDEX_TASK: &str = "RemoveExceedMaxCacheQueueIndex";

/// Owner of every queue the broker holds in memory.
///
/// All admin mutations (create/add/remove/enable/disable and the
/// auto-create branch of `get_or_create_queues`) serialise on one
/// process-wide mutation mutex, held across collaborator I/O; read-only
/// queries never take it. The two maintenance loops each carry their own
/// single-flight flag: an overlapping tick of the same task is skipped,
/// not queued.
#[derive(Clone)]
pub struct QueueService {
    inner: Arc<QueueServiceInner>,
}

struct QueueServiceInner {
    broker_config: Arc<BrokerConfig>,
    chunk_config: Arc<QueueChunkConfig>,
    registry: Arc<QueueRegistry>,
    queue_store: Arc<dyn QueueStore>,
    message_store: Arc<dyn MessageStore>,
    offset_manager: Arc<dyn OffsetManager>,
    scheduler: Arc<TaskScheduler>,
    queue_mutation_lock: parking_lot::ReentrantMutex<()>,
    removing_consumed_queue_index: AtomicBool,
    removing_exceed_max_cache: AtomicBool,
}

impl QueueService {
    pub fn new(
        broker_config: Arc<BrokerConfig>,
        chunk_config: Arc<QueueChunkConfig>,
        queue_store: Arc<dyn QueueStore>,
        message_store: Arc<dyn MessageStore>,
        offset_manager: Arc<dyn OffsetManager>,
        scheduler: Arc<TaskScheduler>,
    ) -> Self {
        Self {
            inner: Arc::new(QueueServiceInner {
                broker_config,
                chunk_config,
                registry: Arc::new(QueueRegistry::new()),
                queue_store,
                message_store,
                offset_manager,
                scheduler,
                queue_mutation_lock: parking_lot::ReentrantMutex::new(()),
                removing_consumed_queue_index: AtomicBool::new(false),
                removing_exceed_max_cache: AtomicBool::new(false),
            }),
        }
    }

    /// Idempotent bring-up: stop the maintenance tasks, clear and reload the
    /// registry from the chunk directories, then re-register both tasks.
    pub fn start(&self) -> EmberMQResult<()> {
        let inner = &self.inner;
        inner.scheduler.stop_task(REMOVE_CONSUMED_QUEUE_INDEX_TASK);
        inner
            .scheduler
            .stop_task(REMOVE_EXCEED_MAX_CACHE_QUEUE_INDEX_TASK);
        inner.registry.clear();

        let loaded = startup_loader::load_queues(&inner.chunk_config, &inner.registry)?;
        info!("queue service started, {} queues loaded", loaded);

        let reclaim_inner = inner.clone();
        let reclaim_interval =
            Duration::from_millis(inner.broker_config.remove_consumed_queue_index_interval);
        inner.scheduler.start_task(
            REMOVE_CONSUMED_QUEUE_INDEX_TASK,
            move || reclaim_inner.remove_consumed_queue_index(),
            Some(reclaim_interval),
            reclaim_interval,
        );

        let evict_inner = inner.clone();
        let evict_interval = Duration::from_millis(
            inner
                .broker_config
                .remove_exceed_max_cache_queue_index_interval,
        );
        inner.scheduler.start_task(
            REMOVE_EXCEED_MAX_CACHE_QUEUE_INDEX_TASK,
            move || evict_inner.remove_exceed_max_cache_queue_index(),
            Some(evict_interval),
            evict_interval,
        );
        Ok(())
    }

    pub fn shutdown(&self) {
        let inner = &self.inner;
        for queue in inner.registry.snapshot() {
            queue.close();
        }
        inner.registry.clear();
        inner.scheduler.stop_task(REMOVE_CONSUMED_QUEUE_INDEX_TASK);
        inner
            .scheduler
            .stop_task(REMOVE_EXCEED_MAX_CACHE_QUEUE_INDEX_TASK);
        info!("queue service shutdown");
    }

    pub fn create_topic(
        &self,
        topic: &CheetahString,
        initial_queue_count: i32,
    ) -> EmberMQResult<()> {
        if topic.is_empty() {
            return Err(EmberMQError::IllegalArgument("topic is empty".to_string()));
        }
        let max_queue_nums = self
            .inner
            .broker_config
            .topic_queue_config
            .max_topic_queue_nums;
        if initial_queue_count <= 0 || initial_queue_count > max_queue_nums {
            return Err(EmberMQError::IllegalArgument(format!(
                "initial queue count {} out of range (0, {}]",
                initial_queue_count, max_queue_nums
            )));
        }

        let inner = &self.inner;
        let _lock = inner.queue_mutation_lock.lock();
        for queue_id in 0..initial_queue_count {
            let key = QueueKey::new(topic.clone(), queue_id);
            if inner.registry.contains_key(&key) {
                continue;
            }
            let queue = Arc::new(MessageQueue::new(
                topic.clone(),
                queue_id,
                inner.chunk_config.clone(),
            ));
            queue.load()?;
            inner
                .queue_store
                .create_queue(&QueueMeta::new(topic.clone(), queue_id, queue.setting()))?;
            inner.registry.try_insert(key, queue);
        }
        info!(
            "create topic [{}] with {} queues",
            topic, initial_queue_count
        );
        Ok(())
    }

    /// Add one queue to the topic. The new id is `1 + max(existing ids)`,
    /// so freed middle ids are never reused while a freed highest id is.
    pub fn add_queue(&self, topic: &CheetahString) -> EmberMQResult<i32> {
        if topic.is_empty() {
            return Err(EmberMQError::IllegalArgument("topic is empty".to_string()));
        }
        let inner = &self.inner;
        let _lock = inner.queue_mutation_lock.lock();

        let existing_ids: Vec<i32> = inner
            .registry
            .snapshot()
            .iter()
            .filter(|queue| queue.topic() == topic)
            .map(|queue| queue.queue_id())
            .collect();
        let max_queue_nums = inner.broker_config.topic_queue_config.max_topic_queue_nums;
        if existing_ids.len() as i32 >= max_queue_nums {
            return Err(EmberMQError::IllegalArgument(format!(
                "topic {} already has {} queues",
                topic,
                existing_ids.len()
            )));
        }
        let queue_id = existing_ids.iter().max().map_or(0, |max_id| max_id + 1);

        let queue = Arc::new(MessageQueue::new(
            topic.clone(),
            queue_id,
            inner.chunk_config.clone(),
        ));
        queue.load()?;
        inner
            .queue_store
            .create_queue(&QueueMeta::new(topic.clone(), queue_id, queue.setting()))?;
        inner
            .registry
            .try_insert(QueueKey::new(topic.clone(), queue_id), queue);
        info!("add queue OK Topic: {} QueueId: {}", topic, queue_id);
        Ok(queue_id)
    }

    /// Remove a disabled, fully consumed queue. Deletion order is message
    /// store, offset manager, queue store, registry; a failure aborts the
    /// remaining steps and surfaces, leaving partial state for operator
    /// retry.
    pub fn remove_queue(&self, topic: &CheetahString, queue_id: i32) -> EmberMQResult<()> {
        let inner = &self.inner;
        let _lock = inner.queue_mutation_lock.lock();

        let key = QueueKey::new(topic.clone(), queue_id);
        let Some(queue) = inner.registry.get(&key) else {
            return Ok(());
        };
        if queue.status() != QueueStatus::Disabled {
            return Err(EmberMQError::PreconditionFailed(format!(
                "queue {} is not disabled",
                key
            )));
        }
        if queue.message_real_count() > 0 {
            return Err(EmberMQError::PreconditionFailed(format!(
                "queue {} still has messages",
                key
            )));
        }

        inner.message_store.delete_queue_message(topic, queue_id)?;
        inner.offset_manager.delete_queue_offset(topic, queue_id)?;
        inner.queue_store.delete_queue(topic, queue_id)?;
        inner.registry.remove(&key);
        if let Err(e) = queue.destroy() {
            warn!("destroy queue index directory {} failed: {}", key, e);
        }
        info!("remove queue OK, {}", key);
        Ok(())
    }

    pub fn enable_queue(&self, topic: &CheetahString, queue_id: i32) -> EmberMQResult<()> {
        self.set_queue_status(topic, queue_id, QueueStatus::Enabled)
    }

    pub fn disable_queue(&self, topic: &CheetahString, queue_id: i32) -> EmberMQResult<()> {
        self.set_queue_status(topic, queue_id, QueueStatus::Disabled)
    }

    fn set_queue_status(
        &self,
        topic: &CheetahString,
        queue_id: i32,
        status: QueueStatus,
    ) -> EmberMQResult<()> {
        let inner = &self.inner;
        let _lock = inner.queue_mutation_lock.lock();

        let key = QueueKey::new(topic.clone(), queue_id);
        let Some(queue) = inner.registry.get(&key) else {
            return Ok(());
        };
        let Some(mut meta) = inner.queue_store.get_queue(topic, queue_id) else {
            return Ok(());
        };
        meta.setting.status = status;
        inner.queue_store.update_queue(&meta)?;
        queue.set_status(status);
        info!("update queue {} status to {:?}", key, status);
        Ok(())
    }

    pub fn get_all_topics(&self) -> Vec<CheetahString> {
        let topics: HashSet<CheetahString> = self
            .inner
            .registry
            .snapshot()
            .iter()
            .map(|queue| queue.topic().clone())
            .collect();
        topics.into_iter().collect()
    }

    pub fn get_all_queue_count(&self) -> usize {
        self.inner.registry.len()
    }

    pub fn get_all_queue_index_count(&self) -> i64 {
        self.inner.all_queue_index_count()
    }

    pub fn get_all_queue_unconsumed_message_count(&self) -> i64 {
        self.inner
            .registry
            .snapshot()
            .iter()
            .map(|queue| queue.message_real_count())
            .sum()
    }

    /// Minimum resident queue offset across all queues, or -1 when the
    /// registry is empty.
    pub fn get_queue_min_message_offset(&self) -> i64 {
        self.inner
            .registry
            .snapshot()
            .iter()
            .map(|queue| queue.min_queue_offset())
            .min()
            .unwrap_or(-1)
    }

    pub fn is_queue_exist(&self, topic: &CheetahString, queue_id: i32) -> bool {
        self.inner
            .registry
            .contains_key(&QueueKey::new(topic.clone(), queue_id))
    }

    pub fn get_queue(&self, topic: &CheetahString, queue_id: i32) -> Option<Arc<MessageQueue>> {
        self.inner.registry.get(&QueueKey::new(topic.clone(), queue_id))
    }

    pub fn get_queue_current_offset(&self, topic: &CheetahString, queue_id: i32) -> i64 {
        self.get_queue(topic, queue_id)
            .map_or(-1, |queue| queue.current_offset())
    }

    pub fn get_queue_min_offset(&self, topic: &CheetahString, queue_id: i32) -> i64 {
        self.get_queue(topic, queue_id)
            .map_or(-1, |queue| queue.min_queue_offset())
    }

    /// Admin fuzzy search: every queue whose topic contains the given
    /// substring.
    pub fn query_queues(&self, topic: &str) -> Vec<Arc<MessageQueue>> {
        let mut queues: Vec<Arc<MessageQueue>> = self
            .inner
            .registry
            .snapshot()
            .into_iter()
            .filter(|queue| queue.topic().as_str().contains(topic))
            .collect();
        queues.sort_by(|a, b| {
            a.topic()
                .as_str()
                .cmp(b.topic().as_str())
                .then(a.queue_id().cmp(&b.queue_id()))
        });
        queues
    }

    pub fn find_queues(
        &self,
        topic: &CheetahString,
        status: Option<QueueStatus>,
    ) -> Vec<Arc<MessageQueue>> {
        let mut queues: Vec<Arc<MessageQueue>> = self
            .inner
            .registry
            .snapshot()
            .into_iter()
            .filter(|queue| queue.topic() == topic)
            .filter(|queue| status.map_or(true, |status| queue.status() == status))
            .collect();
        queues.sort_by_key(|queue| queue.queue_id());
        queues
    }

    pub fn get_or_create_queues(
        &self,
        topic: &CheetahString,
        status: Option<QueueStatus>,
    ) -> EmberMQResult<Vec<Arc<MessageQueue>>> {
        let inner = &self.inner;
        let _lock = inner.queue_mutation_lock.lock();
        let topic_exists = inner
            .registry
            .snapshot()
            .iter()
            .any(|queue| queue.topic() == topic);
        if !topic_exists && inner.broker_config.auto_create_topic_enable {
            self.create_topic(
                topic,
                inner.broker_config.topic_queue_config.default_topic_queue_nums,
            )?;
        }
        Ok(self.find_queues(topic, status))
    }

    /// Reclaim index entries already consumed by every subscribed group.
    pub fn remove_consumed_queue_index(&self) {
        self.inner.remove_consumed_queue_index();
    }

    /// Evict unconsumed index entries proportionally once the aggregate
    /// cache exceeds its ceiling.
    pub fn remove_exceed_max_cache_queue_index(&self) {
        self.inner.remove_exceed_max_cache_queue_index();
    }
}

impl QueueServiceInner {
    fn all_queue_index_count(&self) -> i64 {
        self.registry
            .snapshot()
            .iter()
            .map(|queue| queue.message_count())
            .sum()
    }

    fn remove_consumed_queue_index(&self) {
        if self
            .removing_consumed_queue_index
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        if let Err(e) = self.do_remove_consumed_queue_index() {
            error!("remove consumed queue index failed: {}", e);
        }
        self.removing_consumed_queue_index
            .store(false, Ordering::Release);
    }

    fn do_remove_consumed_queue_index(&self) -> EmberMQResult<()> {
        if self.offset_manager.get_consumer_group_count() <= 0 {
            return Ok(());
        }
        for queue in self.registry.snapshot() {
            let reported = self
                .offset_manager
                .get_min_offset(queue.topic(), queue.queue_id());
            if reported < 0 {
                continue;
            }
            // the offset manager may report past what was written, e.g.
            // stale metadata
            let consumed = reported.min(queue.current_offset());
            queue.remove_all_previous_queue_index(consumed);
            self.message_store
                .update_consumed_queue_offset(queue.topic(), queue.queue_id(), consumed)?;
        }
        Ok(())
    }

    fn remove_exceed_max_cache_queue_index(&self) {
        if self
            .removing_exceed_max_cache
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        if let Err(e) = self.do_remove_exceed_max_cache_queue_index() {
            error!("remove exceed max cache queue index failed: {}", e);
        }
        self.removing_exceed_max_cache
            .store(false, Ordering::Release);
    }

    fn do_remove_exceed_max_cache_queue_index(&self) -> EmberMQResult<()> {
        // eviction only makes sense when the entries can be re-faulted in
        // from the message log later
        if !self.message_store.supports_batch_load_queue_index() {
            return Ok(());
        }
        let max_cache_size = self.broker_config.queue_index_max_cache_size;
        let exceed_count = self.all_queue_index_count() - max_cache_size;
        if exceed_count <= 0 {
            return Ok(());
        }

        // consumed entries are the cheap ones, reclaim them first
        self.remove_consumed_queue_index();

        let snapshot: Vec<(Arc<MessageQueue>, i64)> = self
            .registry
            .snapshot()
            .into_iter()
            .map(|queue| {
                let count = queue.message_count();
                (queue, count)
            })
            .collect();
        let total_unconsumed: i64 = snapshot.iter().map(|(_, count)| *count).sum();
        if total_unconsumed <= 0 {
            return Ok(());
        }
        let unconsumed_exceed_count = total_unconsumed - max_cache_size;
        if unconsumed_exceed_count <= 0 {
            return Ok(());
        }

        let mut total_removed = 0i64;
        for (queue, count) in snapshot {
            let require_remove_count = unconsumed_exceed_count * count / total_unconsumed;
            if require_remove_count > 0 {
                total_removed += queue.remove_required_queue_index_from_last(require_remove_count);
            }
        }
        if total_removed > 0 {
            info!(
                "Removed {} unconsumed queue index entries, unconsumedExceed: {}, \
                 totalUnconsumed: {}",
                total_removed, unconsumed_exceed_count, total_unconsumed
            );
        }
        Ok(())
    }
}
