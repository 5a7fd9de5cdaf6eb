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

pub mod manager;

/// Consumption progress the queue directory consults when reclaiming
/// consumed index entries and when tearing a queue down.
pub trait OffsetManager: Send + Sync {
    /// Minimum consumed offset of the queue across all subscribed consumer
    /// groups, or a negative value when no group has consumed from it.
    fn get_min_offset(&self, topic: &CheetahString, queue_id: i32) -> i64;

    /// Drop every group's consumption record of the queue.
    fn delete_queue_offset(&self, topic: &CheetahString, queue_id: i32) -> EmberMQResult<()>;

    fn get_consumer_group_count(&self) -> i32;
}
