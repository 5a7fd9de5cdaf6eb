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

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use cheetah_string::CheetahString;
use embermq_common::common::broker::broker_config::BrokerConfig;
use embermq_common::common::config_manager::ConfigManager;
use embermq_error::EmberMQResult;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::broker_path_config_helper::get_consumer_offset_path;
use crate::offset::OffsetManager;

pub const TOPIC_GROUP_SEPARATOR: &str = "@";

/// Per consumer-group consumption progress, keyed `topic@group` with one
/// `queueId -> committed offset` table per key.
#[derive(Clone)]
pub struct ConsumerOffsetManager {
    broker_config: Arc<BrokerConfig>,
    offset_table: Arc<parking_lot::Mutex<HashMap<CheetahString, HashMap<i32, i64>>>>,
}

impl ConsumerOffsetManager {
    pub fn new(broker_config: Arc<BrokerConfig>) -> Self {
        ConsumerOffsetManager {
            broker_config,
            offset_table: Arc::new(parking_lot::Mutex::new(HashMap::new())),
        }
    }

    fn offset_table_key(topic: &str, group: &str) -> CheetahString {
        format!("{}{}{}", topic, TOPIC_GROUP_SEPARATOR, group).into()
    }

    pub fn commit_offset(&self, group: &str, topic: &str, queue_id: i32, offset: i64) {
        let key = Self::offset_table_key(topic, group);
        let mut offset_table = self.offset_table.lock();
        let map = offset_table.entry(key.clone()).or_default();
        let store_offset = map.insert(queue_id, offset);
        if let Some(store_offset) = store_offset {
            if offset < store_offset {
                warn!(
                    "[NOTIFYME]update consumer offset less than store. key={}, queueId={}, \
                     requestOffset={}, storeOffset={}",
                    key, queue_id, offset, store_offset
                );
            }
        }
    }

    pub fn query_offset(&self, group: &str, topic: &str, queue_id: i32) -> i64 {
        let key = Self::offset_table_key(topic, group);
        if let Some(map) = self.offset_table.lock().get(&key) {
            if let Some(offset) = map.get(&queue_id) {
                return *offset;
            }
        }
        -1
    }
}

impl OffsetManager for ConsumerOffsetManager {
    fn get_min_offset(&self, topic: &CheetahString, queue_id: i32) -> i64 {
        let offset_table = self.offset_table.lock();
        let mut min_offset = -1i64;
        for (key, map) in offset_table.iter() {
            let Some((key_topic, _group)) = key.as_str().split_once(TOPIC_GROUP_SEPARATOR) else {
                continue;
            };
            if key_topic != topic.as_str() {
                continue;
            }
            if let Some(&offset) = map.get(&queue_id) {
                if min_offset < 0 || offset < min_offset {
                    min_offset = offset;
                }
            }
        }
        min_offset
    }

    fn delete_queue_offset(&self, topic: &CheetahString, queue_id: i32) -> EmberMQResult<()> {
        let mut offset_table = self.offset_table.lock();
        for (key, map) in offset_table.iter_mut() {
            let Some((key_topic, _group)) = key.as_str().split_once(TOPIC_GROUP_SEPARATOR) else {
                continue;
            };
            if key_topic == topic.as_str() {
                map.remove(&queue_id);
            }
        }
        info!(
            "removeQueueFromOffsetTable OK Topic: {} QueueId: {}",
            topic, queue_id
        );
        Ok(())
    }

    fn get_consumer_group_count(&self) -> i32 {
        let offset_table = self.offset_table.lock();
        let groups: HashSet<&str> = offset_table
            .keys()
            .filter_map(|key| key.as_str().split_once(TOPIC_GROUP_SEPARATOR))
            .map(|(_topic, group)| group)
            .collect();
        groups.len() as i32
    }
}

impl ConfigManager for ConsumerOffsetManager {
    fn config_file_path(&self) -> String {
        get_consumer_offset_path(self.broker_config.store_path_root_dir.as_str())
    }

    fn encode_pretty(&self, pretty_format: bool) -> String {
        let wrapper = ConsumerOffsetWrapper {
            offset_table: self.offset_table.lock().clone(),
        };
        let result = if pretty_format {
            serde_json::to_string_pretty(&wrapper)
        } else {
            serde_json::to_string(&wrapper)
        };
        result.unwrap_or_default()
    }

    fn decode(&self, json_string: &str) {
        if json_string.is_empty() {
            return;
        }
        let wrapper =
            serde_json::from_str::<ConsumerOffsetWrapper>(json_string).unwrap_or_default();
        if !wrapper.offset_table.is_empty() {
            self.offset_table.lock().clone_from(&wrapper.offset_table);
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
struct ConsumerOffsetWrapper {
    offset_table: HashMap<CheetahString /* topic@group */, HashMap<i32, i64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with_root(root: &str) -> ConsumerOffsetManager {
        let broker_config = BrokerConfig {
            store_path_root_dir: root.to_string().into(),
            ..Default::default()
        };
        ConsumerOffsetManager::new(Arc::new(broker_config))
    }

    fn manager() -> ConsumerOffsetManager {
        manager_with_root("/tmp/embermq-test-store")
    }

    #[test]
    fn query_offset_returns_sentinel_for_unknown_queue() {
        let manager = manager();
        assert_eq!(manager.query_offset("group_a", "t", 0), -1);
    }

    #[test]
    fn commit_then_query_round_trips() {
        let manager = manager();
        manager.commit_offset("group_a", "t", 0, 42);
        assert_eq!(manager.query_offset("group_a", "t", 0), 42);
        assert_eq!(manager.query_offset("group_a", "t", 1), -1);
        assert_eq!(manager.query_offset("group_b", "t", 0), -1);
    }

    #[test]
    fn min_offset_is_the_slowest_group() {
        let manager = manager();
        let topic = CheetahString::from("t");
        assert_eq!(manager.get_min_offset(&topic, 0), -1);

        manager.commit_offset("group_a", "t", 0, 100);
        manager.commit_offset("group_b", "t", 0, 40);
        manager.commit_offset("group_c", "other", 0, 1);
        assert_eq!(manager.get_min_offset(&topic, 0), 40);
    }

    #[test]
    fn delete_queue_offset_clears_every_group() {
        let manager = manager();
        let topic = CheetahString::from("t");
        manager.commit_offset("group_a", "t", 0, 10);
        manager.commit_offset("group_b", "t", 0, 20);
        manager.commit_offset("group_a", "t", 1, 30);

        manager.delete_queue_offset(&topic, 0).unwrap();
        assert_eq!(manager.get_min_offset(&topic, 0), -1);
        assert_eq!(manager.get_min_offset(&topic, 1), 30);
    }

    #[test]
    fn consumer_group_count_is_distinct_groups() {
        let manager = manager();
        assert_eq!(manager.get_consumer_group_count(), 0);
        manager.commit_offset("group_a", "t", 0, 1);
        manager.commit_offset("group_a", "other", 0, 1);
        manager.commit_offset("group_b", "t", 0, 1);
        assert_eq!(manager.get_consumer_group_count(), 2);
    }

    #[test]
    fn offset_table_survives_persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let manager = manager_with_root(&root);
        manager.commit_offset("group_a", "t", 0, 7);
        manager.persist();

        let reloaded = manager_with_root(&root);
        assert!(reloaded.load());
        assert_eq!(reloaded.query_offset("group_a", "t", 0), 7);
    }
}
