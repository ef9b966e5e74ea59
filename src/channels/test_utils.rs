use crate::core::{ChannelAdapter, ChannelResult, SendError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a [`ScriptedChannel`] does on one call to `send`.
#[derive(Debug, Clone)]
pub enum Step {
    /// Return a positive result
    Succeed,
    /// Return a negative result with this error text
    Reject(String),
    /// Return `Err` with this error
    Raise(SendError),
    /// Never complete
    Hang,
    /// Panic inside `send`
    Panic,
}

/// Fake channel that plays back a script of steps, one per call.
///
/// Once the script runs out the last step repeats.
pub struct ScriptedChannel {
    name: String,
    configured: bool,
    delay: Option<Duration>,
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Step>,
    calls: Arc<AtomicU32>,
}

impl ScriptedChannel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            configured: true,
            delay: None,
            steps: Mutex::new(VecDeque::new()),
            last: Mutex::new(Step::Succeed),
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    /// A channel that always succeeds.
    pub fn succeeding(name: &str) -> Self {
        Self::new(name).then(Step::Succeed)
    }

    /// A channel that always raises `err`.
    pub fn raising(name: &str, err: SendError) -> Self {
        Self::new(name).then(Step::Raise(err))
    }

    pub fn then(self, step: Step) -> Self {
        self.steps.lock().unwrap().push_back(step);
        self
    }

    /// Sleeps for `delay` before acting on every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        if let Some(step) = steps.pop_front() {
            *last = step.clone();
            step
        } else {
            last.clone()
        }
    }
}

#[async_trait]
impl ChannelAdapter for ScriptedChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn send(&self, _title: &str, _content: &str) -> Result<ChannelResult, SendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.next_step() {
            Step::Succeed => Ok(ChannelResult::success(&self.name, "delivered")),
            Step::Reject(error) => Ok(ChannelResult::failure(&self.name, "send failed", error)),
            Step::Raise(err) => Err(err),
            Step::Hang => futures::future::pending().await,
            Step::Panic => panic!("scripted panic in {}", self.name),
        }
    }
}
