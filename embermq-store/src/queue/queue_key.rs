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

use std::fmt;

use cheetah_string::CheetahString;

/// Composite identifier of a queue. The tagged pair is the map key; the
/// `"{topic}-{queueId}"` form is for logging only, since topics may contain
/// the separator themselves.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueueKey {
    topic: CheetahString,
    queue_id: i32,
}

impl QueueKey {
    pub fn new(topic: impl Into<CheetahString>, queue_id: i32) -> Self {
        Self {
            topic: topic.into(),
            queue_id,
        }
    }

    pub fn topic(&self) -> &CheetahString {
        &self.topic
    }

    pub fn queue_id(&self) -> i32 {
        self.queue_id
    }
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.topic, self.queue_id)
    }
}
