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

    pub fn base_path() -> CheetahString {
        dirs::home_dir()
            .unwrap_or_default()
            .join("store")
            .join("queuechunks")
            .to_string_lossy()
            .into_owned()
            .into()
    }

    pub fn chunk_entry_count() -> usize {
        100_000
    }
}

/// Layout of the on-disk queue index chunks: one directory per queue under
/// `<basePath>/<topic>/<queueId>/`, rolled every `chunk_entry_count` records.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueChunkConfig {
    #[serde(default = "defaults::base_path")]
    pub base_path: CheetahString,

    #[serde(default = "defaults::chunk_entry_count")]
    pub chunk_entry_count: usize,
}

impl Default for QueueChunkConfig {
    fn default() -> Self {
        Self {
            base_path: defaults::base_path(),
            chunk_entry_count: defaults::chunk_entry_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_chunk_config_defaults() {
        let config = QueueChunkConfig::default();
        assert!(config.base_path.as_str().ends_with("queuechunks"));
        assert_eq!(config.chunk_entry_count, 100_000);
    }

    #[test]
    fn queue_chunk_config_deserializes_camel_case_keys() {
        let json = r#"{"basePath": "/data/embermq/queuechunks", "chunkEntryCount": 64}"#;
        let config: QueueChunkConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.base_path.as_str(), "/data/embermq/queuechunks");
        assert_eq!(config.chunk_entry_count, 64);
    }
}
