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

use std::io;

use thiserror::Error;

pub type EmberMQResult<T> = std::result::Result<T, EmberMQError>;

#[derive(Debug, Error)]
pub enum EmberMQError {
    #[error("{0}")]
    IllegalArgument(String),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("{0}")]
    IllegalState(String),

    /// A collaborator store (queue store, message store, offset manager)
    /// failed; the partial state is left for operator attention.
    #[error("storage fault: {0}")]
    StorageFault(String),

    #[error("malformed queue directory: {0}")]
    MalformedQueueDirectory(String),

    #[error("{0:?}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn illegal_argument_displays_inner_message() {
        let err = EmberMQError::IllegalArgument("topic is empty".to_string());
        assert_eq!(err.to_string(), "topic is empty");
    }

    #[test]
    fn storage_fault_is_prefixed() {
        let err = EmberMQError::StorageFault("delete queue failed".to_string());
        assert_eq!(err.to_string(), "storage fault: delete queue failed");
    }

    #[test]
    fn io_error_converts_via_from() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "no such chunk");
        let err: EmberMQError = io_err.into();
        assert!(matches!(err, EmberMQError::Io(_)));
    }
}
