use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

use super::evaluation::EvaluationEngine;
use crate::domain::entities::enclosure::Enclosure;
use crate::domain::entities::sample::Sample;

/// A persisted sample waiting for evaluation.
#[derive(Debug, Clone)]
pub struct EvaluationJob {
    pub sample: Sample,
    pub enclosure: Enclosure,
}

#[derive(Error, Debug)]
#[error("evaluation worker stopped, sample {0} not evaluated")]
pub struct QueueClosed(pub i64);

/// Handle used by ingest to hand samples to the evaluation worker.
///
/// The worker stops once every clone of the queue is dropped and its
/// in-flight jobs finish.
#[derive(Clone)]
pub struct EvaluationQueue {
    sender: mpsc::Sender<EvaluationJob>,
}

impl EvaluationQueue {
    /// Enqueue a job, waiting for room when the queue is full.
    ///
    /// # Errors
    ///
    /// Returns `QueueClosed` if the worker is no longer running.
    pub async fn submit(&self, job: EvaluationJob) -> Result<(), QueueClosed> {
        let sample_id = job.sample.id;
        self.sender
            .send(job)
            .await
            .map_err(|_| QueueClosed(sample_id))
    }
}

/// Totals reported by the worker when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub samples_evaluated: usize,
    pub alarms_raised: usize,
    pub evaluation_failures: usize,
}

/// Start the evaluation stage. Each job runs on its own task so samples
/// evaluate in parallel and ingest latency does not depend on fan-out.
///
/// At most `max_in_flight` jobs run at once. Beyond that, jobs wait in the
/// queue, and `submit` waits once `capacity` of them are queued.
#[must_use]
pub fn spawn_evaluation_worker(
    engine: Arc<EvaluationEngine>,
    capacity: usize,
    max_in_flight: usize,
) -> (EvaluationQueue, JoinHandle<WorkerStats>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(run_worker(engine, receiver, max_in_flight.max(1)));
    (EvaluationQueue { sender }, handle)
}

enum JobResult {
    Evaluated { alarms: usize },
    Failed,
}

async fn run_worker(
    engine: Arc<EvaluationEngine>,
    mut receiver: mpsc::Receiver<EvaluationJob>,
    max_in_flight: usize,
) -> WorkerStats {
    let mut stats = WorkerStats::default();
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            job = receiver.recv(), if in_flight.len() < max_in_flight => {
                let Some(job) = job else { break };
                let engine = Arc::clone(&engine);
                in_flight.spawn(async move { run_job(&engine, job).await });
            }
            Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                record(&mut stats, done);
            }
        }
    }

    while let Some(done) = in_flight.join_next().await {
        record(&mut stats, done);
    }

    tracing::info!(
        samples = stats.samples_evaluated,
        alarms = stats.alarms_raised,
        failures = stats.evaluation_failures,
        "evaluation worker stopped"
    );
    stats
}

async fn run_job(engine: &EvaluationEngine, job: EvaluationJob) -> JobResult {
    match engine.evaluate(&job.sample, &job.enclosure).await {
        Ok(fired) => JobResult::Evaluated {
            alarms: fired.len(),
        },
        Err(e) => {
            tracing::warn!(sample_id = job.sample.id, "evaluation aborted: {e}");
            JobResult::Failed
        }
    }
}

fn record(stats: &mut WorkerStats, done: Result<JobResult, tokio::task::JoinError>) {
    match done {
        Ok(JobResult::Evaluated { alarms }) => {
            stats.samples_evaluated += 1;
            stats.alarms_raised += alarms;
        }
        Ok(JobResult::Failed) => stats.evaluation_failures += 1,
        Err(e) => {
            tracing::error!("evaluation task panicked: {e}");
            stats.evaluation_failures += 1;
        }
    }
}
