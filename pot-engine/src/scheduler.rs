//! Delayed Jobs
//!
//! A job runs on its own task and decides after every run how long to wait
//! before the next one: the next natural period on success, a short retry
//! on failure. A manual trigger cancels the pending delay, runs the job at
//! once and lets that run pick the next delay, so a job never runs twice
//! concurrently.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};

/// Self-rescheduling unit of work
#[async_trait]
pub trait Job: Send + Sync + 'static {
    type Output: Send + 'static;

    fn name(&self) -> &'static str;

    /// Delay before the first scheduled run
    fn first_delay(&self) -> Duration;

    /// Run once; returns the result and the delay until the next run
    async fn run(&self) -> (Self::Output, Duration);
}

enum Command<T> {
    RunNow(oneshot::Sender<T>),
    Stop,
}

/// Handle to a scheduled job
pub struct JobHandle<J: Job> {
    name: &'static str,
    commands: mpsc::Sender<Command<J::Output>>,
    task: JoinHandle<()>,
}

impl<J: Job> JobHandle<J> {
    /// Start `job` on the current runtime
    pub fn spawn(job: Arc<J>) -> Self {
        let name = job.name();
        let (commands, mut rx) = mpsc::channel::<Command<J::Output>>(8);

        let task = tokio::spawn(async move {
            let mut delay = job.first_delay();
            debug!(job = name, delay_secs = delay.as_secs(), "Job scheduled");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        let (_, next) = job.run().await;
                        delay = next;
                    }
                    command = rx.recv() => match command {
                        Some(Command::RunNow(reply)) => {
                            debug!(job = name, "Pending run cancelled for manual trigger");
                            let (output, next) = job.run().await;
                            delay = next;
                            let _ = reply.send(output);
                        }
                        Some(Command::Stop) | None => break,
                    },
                }
                debug!(job = name, delay_secs = delay.as_secs(), "Job rescheduled");
            }
            info!(job = name, "Job stopped");
        });

        Self { name, commands, task }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run the job now and wait for its result
    pub async fn run_now(&self) -> EngineResult<J::Output> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::RunNow(reply))
            .await
            .map_err(|_| EngineError::JobStopped(self.name.to_string()))?;
        rx.await.map_err(|_| EngineError::JobStopped(self.name.to_string()))
    }

    /// Cancel the pending run and end the job
    pub async fn stop(self) {
        let _ = self.commands.send(Command::Stop).await;
        let _ = self.task.await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
