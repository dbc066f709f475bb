//! Mock transcoder for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};

use crate::transcoder::{InputDescriptor, Outcome, ProgressUpdate, TranscodeCommand, Transcoder};

/// A recorded execution for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedExecution {
    pub command: TranscodeCommand,
    pub input: InputDescriptor,
}

/// Mock implementation of the Transcoder trait.
///
/// - Records every command it is asked to run
/// - Returns scripted outcomes in order, then success
/// - Sends a configurable series of progress percentages
/// - Can hold executions until released, or panic on demand
#[derive(Debug)]
pub struct MockTranscoder {
    executions: Arc<RwLock<Vec<RecordedExecution>>>,
    outcomes: Arc<RwLock<VecDeque<Outcome>>>,
    progress_steps: Arc<RwLock<Vec<u8>>>,
    duration: Arc<RwLock<Duration>>,
    panic_next: Arc<RwLock<Option<String>>>,
    held: watch::Sender<bool>,
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscoder {
    pub fn new() -> Self {
        let (held, _) = watch::channel(false);
        Self {
            executions: Arc::new(RwLock::new(Vec::new())),
            outcomes: Arc::new(RwLock::new(VecDeque::new())),
            progress_steps: Arc::new(RwLock::new(vec![25, 50, 75, 100])),
            duration: Arc::new(RwLock::new(Duration::from_millis(10))),
            panic_next: Arc::new(RwLock::new(None)),
            held,
        }
    }

    /// Get all recorded executions.
    pub async fn recorded_executions(&self) -> Vec<RecordedExecution> {
        self.executions.read().await.clone()
    }

    pub async fn execution_count(&self) -> usize {
        self.executions.read().await.len()
    }

    /// Queue an outcome for the next execution.
    pub async fn push_outcome(&self, outcome: Outcome) {
        self.outcomes.write().await.push_back(outcome);
    }

    /// Queue a failed outcome with the given exit code and diagnostic lines.
    pub async fn push_failure(&self, exit_code: i32, diagnostics: &[&str]) {
        self.push_outcome(Outcome::from_exit(
            exit_code,
            diagnostics.iter().map(|d| d.to_string()).collect(),
        ))
        .await;
    }

    /// Percentages reported during each execution.
    pub async fn set_progress_steps(&self, steps: Vec<u8>) {
        *self.progress_steps.write().await = steps;
    }

    /// Simulated run time per execution.
    pub async fn set_duration(&self, duration: Duration) {
        *self.duration.write().await = duration;
    }

    /// Make the next execution panic with the given message.
    pub async fn panic_next(&self, message: impl Into<String>) {
        *self.panic_next.write().await = Some(message.into());
    }

    /// Park executions after they are recorded, until `release` is called.
    pub fn hold(&self) {
        self.held.send_replace(true);
    }

    pub fn release(&self) {
        self.held.send_replace(false);
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(
        &self,
        command: &TranscodeCommand,
        input: &InputDescriptor,
        progress_tx: mpsc::Sender<ProgressUpdate>,
    ) -> Outcome {
        self.executions.write().await.push(RecordedExecution {
            command: command.clone(),
            input: input.clone(),
        });

        let mut held = self.held.subscribe();
        let _ = held.wait_for(|h| !*h).await;

        if let Some(message) = self.panic_next.write().await.take() {
            panic!("{}", message);
        }

        let steps = self.progress_steps.read().await.clone();
        let duration = *self.duration.read().await;
        let pause = duration / (steps.len() as u32 + 1);
        for pct in steps {
            tokio::time::sleep(pause).await;
            let _ = progress_tx
                .send(ProgressUpdate {
                    percentage: pct,
                    elapsed: pause,
                    estimated_remaining: None,
                    speed: Some("1.0x".to_string()),
                })
                .await;
        }
        tokio::time::sleep(pause).await;

        self.outcomes
            .write()
            .await
            .pop_front()
            .unwrap_or_else(|| Outcome::from_exit(0, Vec::new()))
    }
}
