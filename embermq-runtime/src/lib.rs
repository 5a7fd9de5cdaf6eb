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

use std::time::Duration;

use cheetah_string::CheetahString;
use dashmap::DashMap;
use tracing::info;

pub enum EmberMQRuntime {
    Multi(tokio::runtime::Runtime),
}

impl EmberMQRuntime {
    #[inline]
    pub fn new_multi(threads: usize, name: &str) -> Self {
        Self::Multi(
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(threads)
                .thread_name(name)
                .enable_all()
                .build()
                .unwrap(),
        )
    }

    #[inline]
    pub fn get_handle(&self) -> &tokio::runtime::Handle {
        match self {
            Self::Multi(runtime) => runtime.handle(),
        }
    }

    #[inline]
    pub fn shutdown(self) {
        match self {
            Self::Multi(runtime) => runtime.shutdown_background(),
        }
    }

    #[inline]
    pub fn shutdown_timeout(self, timeout: Duration) {
        match self {
            Self::Multi(runtime) => runtime.shutdown_timeout(timeout),
        }
    }

    /// Run `task` every `period`, first after `initial_delay`. A run that
    /// overshoots its period delays the following tick rather than bursting
    /// to catch up.
    pub fn schedule_at_fixed_rate<F>(
        &self,
        task: F,
        initial_delay: Option<Duration>,
        period: Duration,
    ) -> tokio::task::JoinHandle<()>
    where
        F: Fn() + Send + 'static,
    {
        match self {
            EmberMQRuntime::Multi(runtime) => runtime.handle().spawn(async move {
                if let Some(delay) = initial_delay {
                    tokio::time::sleep(delay).await;
                }
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    task();
                }
            }),
        }
    }
}

/// Named periodic tasks on top of [`EmberMQRuntime`].
///
/// Registering a task under an existing name replaces (aborts) the previous
/// one; stopping an unknown name is a no-op.
pub struct TaskScheduler {
    runtime: EmberMQRuntime,
    tasks: DashMap<CheetahString, tokio::task::JoinHandle<()>>,
}

impl TaskScheduler {
    pub fn new(threads: usize, name: &str) -> Self {
        Self {
            runtime: EmberMQRuntime::new_multi(threads, name),
            tasks: DashMap::new(),
        }
    }

    pub fn start_task<F>(
        &self,
        name: impl Into<CheetahString>,
        task: F,
        initial_delay: Option<Duration>,
        period: Duration,
    ) where
        F: Fn() + Send + 'static,
    {
        let name = name.into();
        let handle = self
            .runtime
            .schedule_at_fixed_rate(task, initial_delay, period);
        info!("register periodic task {}, period: {:?}", name, period);
        if let Some(previous) = self.tasks.insert(name, handle) {
            previous.abort();
        }
    }

    pub fn stop_task(&self, name: &str) -> bool {
        match self.tasks.remove(name) {
            Some((name, handle)) => {
                handle.abort();
                info!("stop periodic task {}", name);
                true
            }
            None => false,
        }
    }

    pub fn contains_task(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn stop_all_tasks(&self) {
        self.tasks.retain(|_, handle| {
            handle.abort();
            false
        });
    }

    pub fn shutdown(self) {
        self.stop_all_tasks();
        self.runtime.shutdown();
    }
}
