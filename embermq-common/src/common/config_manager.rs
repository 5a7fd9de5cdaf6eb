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

use embermq_error::EmberMQResult;
use parking_lot::Mutex;
use tracing::error;
use tracing::info;
use tracing::warn;

// Managers may share one config directory; the backup-then-write sequence
// must not interleave.
static PERSIST_LOCK: Mutex<()> = Mutex::new(());

/// JSON file persistence shared by the broker's metadata managers.
///
/// `persist` keeps the previous generation as `<file>.bak`; `load` falls
/// back to that backup when the primary file is missing or empty.
pub trait ConfigManager {
    fn load(&self) -> bool {
        let file_name = self.config_file_path();
        info!("Config file Path: {}", file_name);
        match fs::read_to_string(&file_name) {
            Ok(content) if !content.is_empty() => {
                self.decode(&content);
                true
            }
            Ok(_) => {
                warn!("config file {} is empty, load the backup", file_name);
                self.load_bak()
            }
            Err(_) => self.load_bak(),
        }
    }

    fn load_bak(&self) -> bool {
        let file_name = self.config_file_path();
        match fs::read_to_string(format!("{}.bak", file_name)) {
            Ok(content) => {
                if !content.is_empty() {
                    self.decode(&content);
                }
                true
            }
            Err(_) => false,
        }
    }

    fn persist(&self) {
        let json = self.encode_pretty(true);
        if json.is_empty() {
            return;
        }
        let file_name = self.config_file_path();
        if let Err(e) = write_with_backup(json.as_str(), file_name.as_str()) {
            error!("persist config file {} failed: {}", file_name, e);
        }
    }

    fn config_file_path(&self) -> String;

    fn encode(&self) -> String {
        self.encode_pretty(false)
    }

    fn encode_pretty(&self, pretty_format: bool) -> String;

    fn decode(&self, json_string: &str);
}

fn write_with_backup(content: &str, file_name: &str) -> EmberMQResult<()> {
    let _lock = PERSIST_LOCK.lock();

    let path = Path::new(file_name);
    if path.exists() {
        fs::copy(path, format!("{}.bak", file_name))?;
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestConfig {
        file: String,
        state: Mutex<String>,
    }

    impl TestConfig {
        fn new(file: String, state: &str) -> Self {
            Self {
                file,
                state: Mutex::new(state.to_string()),
            }
        }

        fn state(&self) -> String {
            self.state.lock().clone()
        }
    }

    impl ConfigManager for TestConfig {
        fn config_file_path(&self) -> String {
            self.file.clone()
        }

        fn encode_pretty(&self, _pretty_format: bool) -> String {
            self.state.lock().clone()
        }

        fn decode(&self, json_string: &str) {
            *self.state.lock() = json_string.to_string();
        }
    }

    #[test]
    fn persist_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir
            .path()
            .join("config")
            .join("queues.json")
            .to_string_lossy()
            .to_string();

        TestConfig::new(file.clone(), r#"{"queues":1}"#).persist();

        let reloaded = TestConfig::new(file, "");
        assert!(reloaded.load());
        assert_eq!(reloaded.state(), r#"{"queues":1}"#);
    }

    #[test]
    fn persist_keeps_the_previous_generation_as_backup() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("queues.json").to_string_lossy().to_string();

        let config = TestConfig::new(file.clone(), "first");
        config.persist();
        config.decode("second");
        config.persist();

        assert_eq!(fs::read_to_string(&file).unwrap(), "second");
        assert_eq!(fs::read_to_string(format!("{}.bak", file)).unwrap(), "first");
    }

    #[test]
    fn load_falls_back_to_the_backup_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("queues.json").to_string_lossy().to_string();
        fs::write(format!("{}.bak", file), "from-backup").unwrap();

        let config = TestConfig::new(file.clone(), "");
        assert!(config.load());
        assert_eq!(config.state(), "from-backup");

        // an empty primary is treated the same as a missing one
        fs::write(&file, "").unwrap();
        let config = TestConfig::new(file, "");
        assert!(config.load());
        assert_eq!(config.state(), "from-backup");
    }

    #[test]
    fn load_reports_failure_when_nothing_was_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("missing.json").to_string_lossy().to_string();
        assert!(!TestConfig::new(file, "").load());
    }

    #[test]
    fn persist_with_empty_encoding_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.json").to_string_lossy().to_string();

        let config = TestConfig::new(file.clone(), "");
        config.persist();
        assert!(!Path::new(&file).exists());
    }
}
