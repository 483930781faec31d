//! Scripted stand-in for the model provider, used by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{GardenError, Result};
use crate::llm::{CompletionProvider, Credential};

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Delayed(String, Duration),
    Fail(u16),
}

impl Reply {
    pub fn text(value: impl Into<String>) -> Self {
        Reply::Text(value.into())
    }
}

type Responder = Box<dyn Fn(&str) -> Reply + Send + Sync>;

/// Replies from a queue, or from a responder once the queue is drained
#[derive(Default)]
pub struct ScriptedProvider {
    queue: Mutex<VecDeque<Reply>>,
    responder: Option<Responder>,
    prompts: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Reply>,
    {
        let provider = Self::new();
        provider.queue.lock().extend(replies);
        provider
    }

    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Reply + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, prompt: &str, _credential: &Credential) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());

        let reply = self.queue.lock().pop_front();
        let reply = match (reply, &self.responder) {
            (Some(reply), _) => reply,
            (None, Some(responder)) => responder(prompt),
            (None, None) => Reply::Fail(500),
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = match reply {
            Reply::Text(text) => Ok(text),
            Reply::Delayed(text, delay) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Reply::Fail(status) => Err(GardenError::Transport {
                status: Some(status),
                message: "scripted failure".to_string(),
            }),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub fn credential() -> Credential {
    Credential::new("sk-test").unwrap()
}
