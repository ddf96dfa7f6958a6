//! Step-status reporting for flows
//!
//! A flow declares its stages up front; each starts `Pending`. As the flow
//! runs, the [`StepTracker`] it owns moves stages through `Running` to
//! `Success` or `Error` and publishes a [`StepEvent`] together with the full
//! step list to a [`ProgressObserver`].
//!
//! Observers are purely informational. A panicking observer is caught and
//! logged; it never aborts the flow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Named pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    BuildTransaction,
    Simulate,
    SignAuthorization,
    Resimulate,
    Submit,
    Confirm,
    Verify,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::BuildTransaction => "Build transaction",
            Self::Simulate => "Simulate",
            Self::SignAuthorization => "Sign authorization",
            Self::Resimulate => "Re-simulate",
            Self::Submit => "Submit",
            Self::Confirm => "Confirm",
            Self::Verify => "Verify",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Error,
}

/// One entry in a flow's step list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStep {
    pub stage: Stage,
    pub status: StepStatus,
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A single status transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEvent {
    pub stage: Stage,
    pub status: StepStatus,
    pub message: Option<String>,
}

/// Receives step transitions
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &StepEvent, steps: &[TransferStep]);
}

/// Discards all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_event(&self, _event: &StepEvent, _steps: &[TransferStep]) {}
}

/// Forwards events over an unbounded channel
///
/// A dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<StepEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StepEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressObserver for ChannelObserver {
    fn on_event(&self, event: &StepEvent, _steps: &[TransferStep]) {
        let _ = self.tx.send(event.clone());
    }
}

/// Writes events to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn on_event(&self, event: &StepEvent, _steps: &[TransferStep]) {
        let message = event.message.as_deref().unwrap_or("");
        match event.status {
            StepStatus::Pending => {}
            StepStatus::Running => info!("⏳ {}", event.stage),
            StepStatus::Success => info!("✅ {} {}", event.stage, message),
            StepStatus::Error => error!("❌ {}: {}", event.stage, message),
        }
    }
}

/// Owns the step list of exactly one flow
pub struct StepTracker<'a> {
    steps: Vec<TransferStep>,
    observer: &'a dyn ProgressObserver,
}

impl<'a> StepTracker<'a> {
    pub fn new(stages: &[Stage], observer: &'a dyn ProgressObserver) -> Self {
        let now = Utc::now();
        let steps = stages
            .iter()
            .map(|&stage| TransferStep {
                stage,
                status: StepStatus::Pending,
                message: None,
                updated_at: now,
            })
            .collect();
        Self { steps, observer }
    }

    pub fn steps(&self) -> &[TransferStep] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<TransferStep> {
        self.steps
    }

    pub fn status_of(&self, stage: Stage) -> Option<StepStatus> {
        self.steps.iter().find(|s| s.stage == stage).map(|s| s.status)
    }

    /// Record a transition and notify the observer
    pub fn update(&mut self, stage: Stage, status: StepStatus, message: Option<String>) {
        let Some(step) = self.steps.iter_mut().find(|s| s.stage == stage) else {
            warn!(stage = %stage, "Update for undeclared stage ignored");
            return;
        };
        step.status = status;
        step.message = message.clone();
        step.updated_at = Utc::now();

        let event = StepEvent {
            stage,
            status,
            message,
        };
        let observer = self.observer;
        let steps = &self.steps;
        if catch_unwind(AssertUnwindSafe(|| observer.on_event(&event, steps))).is_err() {
            warn!(stage = %stage, "Progress observer panicked; continuing");
        }
    }

    /// Run one stage: mark it running, await it, then mark success or error
    ///
    /// `describe` turns the stage's output into the success message.
    pub async fn run<T, E, F>(
        &mut self,
        stage: Stage,
        fut: F,
        describe: impl FnOnce(&T) -> Option<String>,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.update(stage, StepStatus::Running, None);
        match fut.await {
            Ok(value) => {
                let message = describe(&value);
                self.update(stage, StepStatus::Success, message);
                Ok(value)
            }
            Err(e) => {
                self.update(stage, StepStatus::Error, Some(e.to_string()));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PanickingObserver;

    impl ProgressObserver for PanickingObserver {
        fn on_event(&self, _event: &StepEvent, _steps: &[TransferStep]) {
            panic!("observer exploded");
        }
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Resimulate.to_string(), "Re-simulate");
        assert_eq!(Stage::BuildTransaction.name(), "Build transaction");
    }

    #[tokio::test]
    async fn test_run_success_and_error_transitions() {
        let (observer, mut rx) = ChannelObserver::new();
        let mut tracker = StepTracker::new(&[Stage::Simulate, Stage::Submit], &observer);
        assert!(tracker
            .steps()
            .iter()
            .all(|s| s.status == StepStatus::Pending));

        let ok: Result<u32, String> = tracker
            .run(Stage::Simulate, async { Ok(5) }, |v| Some(format!("fee {}", v)))
            .await;
        assert_eq!(ok.unwrap(), 5);

        let err: Result<u32, String> = tracker
            .run(Stage::Submit, async { Err("txBadSeq".to_string()) }, |_| None)
            .await;
        assert!(err.is_err());

        assert_eq!(tracker.status_of(Stage::Simulate), Some(StepStatus::Success));
        assert_eq!(tracker.status_of(Stage::Submit), Some(StepStatus::Error));
        assert_eq!(tracker.steps()[1].message.as_deref(), Some("txBadSeq"));

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push((event.stage, event.status));
        }
        assert_eq!(
            events,
            vec![
                (Stage::Simulate, StepStatus::Running),
                (Stage::Simulate, StepStatus::Success),
                (Stage::Submit, StepStatus::Running),
                (Stage::Submit, StepStatus::Error),
            ]
        );
    }

    #[tokio::test]
    async fn test_observer_panic_does_not_abort() {
        let observer = PanickingObserver;
        let mut tracker = StepTracker::new(&[Stage::Verify], &observer);
        let result: Result<bool, String> =
            tracker.run(Stage::Verify, async { Ok(true) }, |_| None).await;
        assert!(result.unwrap());
        assert_eq!(tracker.status_of(Stage::Verify), Some(StepStatus::Success));
    }

    #[test]
    fn test_dropped_receiver_ignored() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        let mut tracker = StepTracker::new(&[Stage::Confirm], &observer);
        tracker.update(Stage::Confirm, StepStatus::Running, None);
        assert_eq!(tracker.status_of(Stage::Confirm), Some(StepStatus::Running));
    }
}
