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
use serde::Deserialize;
use serde::Serialize;

/// Default value functions for Serde deserialization
mod defaults {
    use super::*;

    pub fn store_path_root_dir() -> CheetahString {
        dirs::home_dir()
            .unwrap_or_default()
            .join("store")
            .to_string_lossy()
            .into_owned()
            .into()
    }

    pub fn auto_create_topic_enable() -> bool {
        true
    }

    pub fn topic_queue_config() -> TopicQueueConfig {
        TopicQueueConfig::default()
    }

    pub fn default_topic_queue_nums() -> i32 {
        4
    }

    pub fn max_topic_queue_nums() -> i32 {
        128
    }

    pub fn remove_consumed_queue_index_interval() -> u64 {
        1000 * 30
    }

    pub fn remove_exceed_max_cache_queue_index_interval() -> u64 {
        1000 * 10
    }

    pub fn queue_index_max_cache_size() -> i64 {
        2_000_000
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerConfig {
    #[serde(default = "defaults::store_path_root_dir")]
    pub store_path_root_dir: CheetahString,

    #[serde(default = "defaults::auto_create_topic_enable")]
    pub auto_create_topic_enable: bool,

    #[serde(default = "defaults::topic_queue_config")]
    pub topic_queue_config: TopicQueueConfig,

    /// Tick period of the consumed queue index reclamation task, in
    /// milliseconds.
    #[serde(default = "defaults::remove_consumed_queue_index_interval")]
    pub remove_consumed_queue_index_interval: u64,

    /// Tick period of the exceed-cache queue index eviction task, in
    /// milliseconds.
    #[serde(default = "defaults::remove_exceed_max_cache_queue_index_interval")]
    pub remove_exceed_max_cache_queue_index_interval: u64,

    /// Ceiling on the aggregate number of queue index entries resident in
    /// memory across all queues.
    #[serde(default = "defaults::queue_index_max_cache_size")]
    pub queue_index_max_cache_size: i64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            store_path_root_dir: defaults::store_path_root_dir(),
            auto_create_topic_enable: defaults::auto_create_topic_enable(),
            topic_queue_config: defaults::topic_queue_config(),
            remove_consumed_queue_index_interval:
                defaults::remove_consumed_queue_index_interval(),
            remove_exceed_max_cache_queue_index_interval:
                defaults::remove_exceed_max_cache_queue_index_interval(),
            queue_index_max_cache_size: defaults::queue_index_max_cache_size(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicQueueConfig {
    /// Number of queues created when a topic is auto created.
    #[serde(default = "defaults::default_topic_queue_nums")]
    pub default_topic_queue_nums: i32,

    /// Upper bound on the number of queues a single topic may hold.
    #[serde(default = "defaults::max_topic_queue_nums")]
    pub max_topic_queue_nums: i32,
}

impl Default for TopicQueueConfig {
    fn default() -> Self {
        Self {
            default_topic_queue_nums: defaults::default_topic_queue_nums(),
            max_topic_queue_nums: defaults::max_topic_queue_nums(),
        }
    }
}
