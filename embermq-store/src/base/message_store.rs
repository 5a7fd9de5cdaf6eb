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

use cheetah_string::CheetahString;
use embermq_error::EmberMQResult;

/// Contract the queue directory holds against the append-only message log.
pub trait MessageStore: Send + Sync {
    /// Remove every message belonging to the given queue from the log.
    fn delete_queue_message(&self, topic: &CheetahString, queue_id: i32) -> EmberMQResult<()>;

    /// Inform the log that all messages of the queue up to `consumed_offset`
    /// are consumed by every subscribed group and may be compacted.
    fn update_consumed_queue_offset(
        &self,
        topic: &CheetahString,
        queue_id: i32,
        consumed_offset: i64,
    ) -> EmberMQResult<()>;

    /// Whether evicted queue index entries can later be re-faulted in from
    /// the log in batch. Index eviction is only meaningful when this holds.
    fn supports_batch_load_queue_index(&self) -> bool;

    /// Current write position of the log, in bytes.
    fn current_message_position(&self) -> i64;
}
