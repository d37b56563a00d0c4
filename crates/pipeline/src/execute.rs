//! Sequential and fan-out/fan-in execution of mission tasks.
//!
//! Both modes run the same per-mission task ([`Sampler::sample`]) under
//! the same retry policy, and both return rows in key order.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use retrieval::{RetrievalError, RetryPolicy};
use sampler_common::{GroupKey, MissionDescriptor, Sentinels};
use tracing::{debug, error};

use crate::config::ExecutionMode;
use crate::error::{PipelineError, PipelineResult};
use crate::request::MissionRequest;
use crate::row::merge_row;
use crate::sample::{MissionSamples, Sampler};

const TASK_OPERATION: &str = "mission_task";
const BARRIER_OPERATION: &str = "merge_row";

/// A requested mission with its sorted variables.
#[derive(Debug, Clone)]
struct MissionTask {
    descriptor: MissionDescriptor,
    variables: Arc<[String]>,
}

pub struct Executor {
    sampler: Arc<Sampler>,
    request: Arc<MissionRequest>,
    tasks: Vec<MissionTask>,
    sentinels: Sentinels,
    task_retry: RetryPolicy,
    mode: ExecutionMode,
    max_concurrent_keys: usize,
}

impl Executor {
    /// Resolve every requested mission against the sampler's registry.
    pub fn new(
        sampler: Arc<Sampler>,
        request: Arc<MissionRequest>,
        sentinels: Sentinels,
        task_retry: RetryPolicy,
        mode: ExecutionMode,
        max_concurrent_keys: usize,
    ) -> PipelineResult<Self> {
        let tasks = request
            .missions()
            .map(|name| {
                let descriptor = sampler.registry().get(name)?.clone();
                Ok(MissionTask {
                    descriptor,
                    variables: request.variables(name).into(),
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        Ok(Self {
            sampler,
            request,
            tasks,
            sentinels,
            task_retry,
            mode,
            max_concurrent_keys: max_concurrent_keys.max(1),
        })
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Sample every key, returning one row per key in the same order.
    pub async fn sample_keys(&self, keys: &[GroupKey]) -> PipelineResult<Vec<Vec<f64>>> {
        match self.mode {
            ExecutionMode::Sequential => {
                let mut rows = Vec::with_capacity(keys.len());
                for key in keys {
                    rows.push(self.sample_sequential(key).await?);
                }
                Ok(rows)
            }
            ExecutionMode::Parallel => {
                stream::iter(keys.iter().cloned())
                    .map(|key| self.fan_out(key))
                    .buffered(self.max_concurrent_keys)
                    .try_collect()
                    .await
            }
        }
    }

    async fn sample_sequential(&self, key: &GroupKey) -> PipelineResult<Vec<f64>> {
        let mut parts = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            parts.push(
                run_task(
                    self.sampler.clone(),
                    key.clone(),
                    task.clone(),
                    self.task_retry,
                )
                .await?,
            );
        }
        merge_row(key, &self.request, &parts, &self.sentinels)
    }

    /// Spawn one task per mission, then merge once all have finished.
    async fn fan_out(&self, key: GroupKey) -> PipelineResult<Vec<f64>> {
        let handles: Vec<_> = self
            .tasks
            .iter()
            .map(|task| {
                tokio::spawn(run_task(
                    self.sampler.clone(),
                    key.clone(),
                    task.clone(),
                    self.task_retry,
                ))
            })
            .collect();

        // Wait for every task before reporting, so none is left in flight
        let mut parts = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(part)) => parts.push(part),
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(PipelineError::Join(e.to_string()));
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        self.barrier(&key, &parts).await
    }

    async fn barrier(&self, key: &GroupKey, parts: &[MissionSamples]) -> PipelineResult<Vec<f64>> {
        merge_with_retry(key, &self.request, parts, &self.sentinels, self.task_retry).await
    }
}

/// Merge a key's parts under the task retry policy.
///
/// Only transient failures are retried. Deterministic ones, such as a
/// missing column, are returned as they are on the first attempt.
async fn merge_with_retry(
    key: &GroupKey,
    request: &MissionRequest,
    parts: &[MissionSamples],
    sentinels: &Sentinels,
    policy: RetryPolicy,
) -> PipelineResult<Vec<f64>> {
    let attempts = AtomicU32::new(0);
    let result = {
        let attempts = &attempts;
        policy
            .retry(
                BARRIER_OPERATION,
                PipelineError::is_transient,
                move || async move {
                    attempts.fetch_add(1, Ordering::Relaxed);
                    merge_row(key, request, parts, sentinels)
                },
            )
            .await
    };

    match result {
        Ok(row) => Ok(row),
        Err(e) if e.is_transient() => Err(PipelineError::BarrierExhausted {
            key: key.to_string(),
            attempts: attempts.load(Ordering::Relaxed),
            message: e.to_string(),
        }),
        Err(e) => Err(e),
    }
}

/// One mission at one key, retried until it succeeds or the policy is
/// spent.
async fn run_task(
    sampler: Arc<Sampler>,
    key: GroupKey,
    task: MissionTask,
    policy: RetryPolicy,
) -> PipelineResult<MissionSamples> {
    let attempts = AtomicU32::new(0);
    let result = {
        let (sampler, key, task, attempts) = (&sampler, &key, &task, &attempts);
        policy
            .retry(TASK_OPERATION, retryable, move || async move {
                attempts.fetch_add(1, Ordering::Relaxed);
                sampler
                    .sample(key, &task.descriptor, &task.variables)
                    .await
            })
            .await
    };

    match result {
        Ok(part) => {
            debug!(mission = task.descriptor.name, key = %key, "Mission task complete");
            Ok(part)
        }
        Err(source) => {
            let attempts = attempts.load(Ordering::Relaxed);
            error!(
                mission = task.descriptor.name,
                key = %key,
                attempts,
                error = %source,
                "Mission task exhausted its retries"
            );
            Err(PipelineError::TaskExhausted {
                mission: task.descriptor.name.to_string(),
                key: key.to_string(),
                attempts,
                source,
            })
        }
    }
}

fn retryable(error: &RetrievalError) -> bool {
    !matches!(error, RetrievalError::Config(_))
}
