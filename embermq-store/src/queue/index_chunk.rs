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
use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use bytes::Buf;
use bytes::BufMut;
use bytes::BytesMut;
use tracing::warn;

/// Queue index store unit. Format:
///
/// ┌───────────────────────────────┬───────────────────────────────┐
/// │          Queue Offset         │        Message Position       │
/// │           (8 Bytes)           │           (8 Bytes)           │
/// └───────────────────────────────┴───────────────────────────────┘
///
/// Size: Queue Offset(8) + Message Position(8) = 16 Bytes
pub const INDEX_UNIT_SIZE: usize = 16;

/// Chunk files are named by the queue offset of their first record,
/// zero padded to 20 digits so lexical order equals offset order.
pub fn chunk_file_name(start_offset: i64) -> String {
    format!("{:020}", start_offset)
}

/// All chunk files of one queue directory, in offset order.
pub fn sorted_chunk_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

pub fn load_chunk(path: &Path) -> io::Result<Vec<(i64, i64)>> {
    let data = fs::read(path)?;
    if data.len() % INDEX_UNIT_SIZE != 0 {
        // torn trailing record from an unflushed writer, drop it
        warn!(
            "queue index chunk {} has {} trailing bytes, ignored",
            path.display(),
            data.len() % INDEX_UNIT_SIZE
        );
    }
    let mut buf: &[u8] = &data;
    let mut entries = Vec::with_capacity(data.len() / INDEX_UNIT_SIZE);
    while buf.remaining() >= INDEX_UNIT_SIZE {
        let queue_offset = buf.get_i64();
        let message_position = buf.get_i64();
        entries.push((queue_offset, message_position));
    }
    Ok(entries)
}

pub struct IndexChunkWriter {
    path: PathBuf,
    file: BufWriter<File>,
    entry_count: usize,
    capacity: usize,
}

impl IndexChunkWriter {
    /// Open a chunk file for appending, creating it (and its parent
    /// directory) when absent. Entries already present count against
    /// `capacity`.
    pub fn open(path: PathBuf, capacity: usize) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let entry_count = file.metadata()?.len() as usize / INDEX_UNIT_SIZE;
        Ok(Self {
            path,
            file: BufWriter::new(file),
            entry_count,
            capacity,
        })
    }

    pub fn create(dir: &Path, start_offset: i64, capacity: usize) -> io::Result<Self> {
        Self::open(dir.join(chunk_file_name(start_offset)), capacity)
    }

    pub fn is_full(&self) -> bool {
        self.entry_count >= self.capacity
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, queue_offset: i64, message_position: i64) -> io::Result<()> {
        let mut bytes = BytesMut::with_capacity(INDEX_UNIT_SIZE);
        bytes.put_i64(queue_offset);
        bytes.put_i64(message_position);
        self.file.write_all(&bytes)?;
        self.entry_count += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
