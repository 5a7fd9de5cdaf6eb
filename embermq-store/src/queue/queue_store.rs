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
use std::path::PathBuf;
use std::sync::Arc;

use cheetah_string::CheetahString;
use embermq_common::common::config_manager::ConfigManager;
use embermq_error::EmberMQResult;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;

use crate::queue::queue_setting::QueueSetting;

/// Persisted description of a queue: its identity plus its admin setting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMeta {
    pub topic: CheetahString,
    pub queue_id: i32,
    #[serde(default)]
    pub setting: QueueSetting,
}

impl QueueMeta {
    pub fn new(topic: impl Into<CheetahString>, queue_id: i32, setting: QueueSetting) -> Self {
        Self {
            topic: topic.into(),
            queue_id,
            setting,
        }
    }
}

/// Persistent directory of the queues this broker owns.
pub trait QueueStore: Send + Sync {
    fn create_queue(&self, queue: &QueueMeta) -> EmberMQResult<()>;

    fn update_queue(&self, queue: &QueueMeta) -> EmberMQResult<()>;

    fn delete_queue(&self, topic: &CheetahString, queue_id: i32) -> EmberMQResult<()>;

    fn get_queue(&self, topic: &CheetahString, queue_id: i32) -> Option<QueueMeta>;
}

/// Queue directory persisted as one JSON table under
/// `<storeRoot>/config/queues.json`.
#[derive(Clone)]
pub struct LocalQueueStore {
    store_path_root_dir: CheetahString,
    queue_table: Arc<parking_lot::Mutex<HashMap<CheetahString, QueueMeta>>>,
}

impl LocalQueueStore {
    pub fn new(store_path_root_dir: impl Into<CheetahString>) -> Self {
        Self {
            store_path_root_dir: store_path_root_dir.into(),
            queue_table: Arc::new(parking_lot::Mutex::new(HashMap::new())),
        }
    }

    fn table_key(topic: &CheetahString, queue_id: i32) -> CheetahString {
        format!("{}-{}", topic, queue_id).into()
    }
}

impl QueueStore for LocalQueueStore {
    fn create_queue(&self, queue: &QueueMeta) -> EmberMQResult<()> {
        self.queue_table
            .lock()
            .insert(Self::table_key(&queue.topic, queue.queue_id), queue.clone());
        self.persist();
        info!(
            "create queue OK Topic: {} QueueId: {}",
            queue.topic, queue.queue_id
        );
        Ok(())
    }

    fn update_queue(&self, queue: &QueueMeta) -> EmberMQResult<()> {
        self.queue_table
            .lock()
            .insert(Self::table_key(&queue.topic, queue.queue_id), queue.clone());
        self.persist();
        Ok(())
    }

    fn delete_queue(&self, topic: &CheetahString, queue_id: i32) -> EmberMQResult<()> {
        self.queue_table.lock().remove(&Self::table_key(topic, queue_id));
        self.persist();
        info!("delete queue OK Topic: {} QueueId: {}", topic, queue_id);
        Ok(())
    }

    fn get_queue(&self, topic: &CheetahString, queue_id: i32) -> Option<QueueMeta> {
        self.queue_table
            .lock()
            .get(&Self::table_key(topic, queue_id))
            .cloned()
    }
}

impl ConfigManager for LocalQueueStore {
    fn config_file_path(&self) -> String {
        PathBuf::from(self.store_path_root_dir.as_str())
            .join("config")
            .join("queues.json")
            .to_string_lossy()
            .to_string()
    }

    fn encode_pretty(&self, pretty_format: bool) -> String {
        let queue_table = self.queue_table.lock().clone();
        let result = if pretty_format {
            serde_json::to_string_pretty(&queue_table)
        } else {
            serde_json::to_string(&queue_table)
        };
        result.unwrap_or_default()
    }

    fn decode(&self, json_string: &str) {
        if json_string.is_empty() {
            return;
        }
        let table =
            serde_json::from_str::<HashMap<CheetahString, QueueMeta>>(json_string).unwrap_or_default();
        let mut queue_table = self.queue_table.lock();
        for (key, value) in table {
            queue_table.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::queue_setting::QueueStatus;

    #[test]
    fn create_then_get_returns_the_meta() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalQueueStore::new(dir.path().to_string_lossy().to_string());
        let meta = QueueMeta::new("t", 0, QueueSetting::default());

        store.create_queue(&meta).unwrap();
        let topic = CheetahString::from("t");
        assert_eq!(store.get_queue(&topic, 0), Some(meta));
        assert_eq!(store.get_queue(&topic, 1), None);
    }

    #[test]
    fn update_overwrites_the_persisted_setting() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalQueueStore::new(dir.path().to_string_lossy().to_string());
        let topic = CheetahString::from("t");
        store
            .create_queue(&QueueMeta::new("t", 0, QueueSetting::default()))
            .unwrap();

        let mut meta = store.get_queue(&topic, 0).unwrap();
        meta.setting.status = QueueStatus::Disabled;
        store.update_queue(&meta).unwrap();

        assert_eq!(
            store.get_queue(&topic, 0).unwrap().setting.status,
            QueueStatus::Disabled
        );
    }

    #[test]
    fn delete_removes_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalQueueStore::new(dir.path().to_string_lossy().to_string());
        let topic = CheetahString::from("t");
        store
            .create_queue(&QueueMeta::new("t", 3, QueueSetting::default()))
            .unwrap();

        store.delete_queue(&topic, 3).unwrap();
        assert_eq!(store.get_queue(&topic, 3), None);
    }

    #[test]
    fn queue_table_survives_persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().to_string();
        let store = LocalQueueStore::new(root.clone());
        store
            .create_queue(&QueueMeta::new("order_topic", 2, QueueSetting::default()))
            .unwrap();

        let reloaded = LocalQueueStore::new(root);
        assert!(reloaded.load());
        let topic = CheetahString::from("order_topic");
        let meta = reloaded.get_queue(&topic, 2).unwrap();
        assert_eq!(meta.topic, topic);
        assert_eq!(meta.queue_id, 2);
        assert_eq!(meta.setting.status, QueueStatus::Enabled);
    }
}
