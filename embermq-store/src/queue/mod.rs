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

pub mod index_chunk;
pub mod message_queue;
pub mod queue_key;
pub mod queue_registry;
pub mod queue_setting;
pub mod queue_store;

pub use message_queue::MessageQueue;
pub use queue_key::QueueKey;
pub use queue_registry::QueueRegistry;
pub use queue_setting::QueueSetting;
pub use queue_setting::QueueStatus;
pub use queue_store::LocalQueueStore;
pub use queue_store::QueueMeta;
pub use queue_store::QueueStore;
