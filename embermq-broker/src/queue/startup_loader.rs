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

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use cheetah_string::CheetahString;
use embermq_error::EmberMQError;
use embermq_error::EmberMQResult;
use embermq_store::config::queue_chunk_config::QueueChunkConfig;
use embermq_store::queue::MessageQueue;
use embermq_store::queue::QueueKey;
use embermq_store::queue::QueueRegistry;
use tracing::info;

/// Repopulate the registry from the on-disk chunk tree
/// `<basePath>/<topic>/<queueId>/`. A queue directory whose name is not a
/// decimal integer is a startup fault.
pub fn load_queues(
    chunk_config: &Arc<QueueChunkConfig>,
    registry: &QueueRegistry,
) -> EmberMQResult<usize> {
    let base = Path::new(chunk_config.base_path.as_str());
    if !base.exists() {
        return Ok(0);
    }

    let mut loaded = 0usize;
    for topic_dir in sorted_sub_dirs(base)? {
        let topic = CheetahString::from_string(
            topic_dir.file_name().map_or_else(String::new, |name| {
                name.to_string_lossy().to_string()
            }),
        );
        for queue_dir in sorted_sub_dirs(&topic_dir)? {
            let queue_id = queue_dir
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.parse::<i32>().ok())
                .ok_or_else(|| {
                    EmberMQError::MalformedQueueDirectory(queue_dir.display().to_string())
                })?;

            let queue = Arc::new(MessageQueue::new(
                topic.clone(),
                queue_id,
                chunk_config.clone(),
            ));
            queue.load()?;
            registry.try_insert(QueueKey::new(topic.clone(), queue_id), queue);
            loaded += 1;
        }
    }
    info!(
        "load queues from {} all over, OK, {} queues",
        base.display(),
        loaded
    );
    Ok(loaded)
}

fn sorted_sub_dirs(dir: &Path) -> EmberMQResult<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_config(dir: &tempfile::TempDir) -> Arc<QueueChunkConfig> {
        Arc::new(QueueChunkConfig {
            base_path: dir.path().to_string_lossy().to_string().into(),
            chunk_entry_count: 16,
        })
    }

    #[test]
    fn missing_base_path_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Arc::new(QueueChunkConfig {
            base_path: dir
                .path()
                .join("never-created")
                .to_string_lossy()
                .to_string()
                .into(),
            chunk_entry_count: 16,
        });
        let registry = QueueRegistry::new();
        assert_eq!(load_queues(&config, &registry).unwrap(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn reloads_queues_written_by_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = chunk_config(&dir);

        for (topic, queue_id, entries) in [("order_topic", 0, 3i64), ("order_topic", 1, 5), ("pay", 0, 2)] {
            let queue = MessageQueue::new(topic, queue_id, config.clone());
            queue.load().unwrap();
            for position in 0..entries {
                queue.put_message_position(position).unwrap();
            }
            queue.close();
        }

        let registry = QueueRegistry::new();
        assert_eq!(load_queues(&config, &registry).unwrap(), 3);
        assert_eq!(registry.len(), 3);

        let queue = registry
            .get(&QueueKey::new("order_topic", 1))
            .expect("queue should be loaded");
        assert_eq!(queue.current_offset(), 4);
        assert_eq!(queue.message_count(), 5);
    }

    #[test]
    fn non_numeric_queue_directory_is_a_startup_fault() {
        let dir = tempfile::tempdir().unwrap();
        let config = chunk_config(&dir);
        fs::create_dir_all(dir.path().join("t").join("not-a-number")).unwrap();

        let registry = QueueRegistry::new();
        let result = load_queues(&config, &registry);
        assert!(matches!(
            result,
            Err(EmberMQError::MalformedQueueDirectory(_))
        ));
    }

    #[test]
    fn files_under_base_path_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config = chunk_config(&dir);
        fs::write(dir.path().join("queues.json"), "{}").unwrap();
        fs::create_dir_all(dir.path().join("t").join("0")).unwrap();

        let registry = QueueRegistry::new();
        assert_eq!(load_queues(&config, &registry).unwrap(), 1);
        assert!(registry.contains_key(&QueueKey::new("t", 0)));
    }
}
