//! Offline replay backend.
//!
//! Serves canned responses and errors from a queue, recording every
//! invocation. Backs `--dry-run` and the scenario tests: the recorded
//! prompts are how tests verify that validation feedback actually reaches
//! the next generation request.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use reelforge_utils::error::ModelError;

use crate::types::{ModelBackend, ModelRequest};

/// One observed backend invocation.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub task: String,
    pub prompt: String,
    /// Virtual-clock instant of the call; scenario tests use this to check
    /// stagger spacing.
    pub at: tokio::time::Instant,
}

/// Backend that replays a script.
///
/// Each `invoke` pops the front of the script; an empty script serves the
/// default response, so open-ended loops (e.g. a validator that never
/// passes) keep running.
#[derive(Debug)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, ModelError>>>,
    default_response: String,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedBackend {
    #[must_use]
    pub fn new(default_response: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_response: default_response.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue the outcome for a future invocation.
    pub fn enqueue(&self, outcome: Result<String, ModelError>) {
        self.script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(outcome);
    }

    /// Snapshot of every invocation seen so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    async fn invoke(&self, model: &str, request: &ModelRequest) -> Result<String, ModelError> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(RecordedCall {
                model: model.to_string(),
                task: request.task.clone(),
                prompt: request.rendered_prompt(),
                at: tokio::time::Instant::now(),
            });

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        match scripted {
            Some(outcome) => outcome,
            None => Ok(self.default_response.clone()),
        }
    }
}

/// A canned model response containing a complete site bundle, used as the
/// scripted backend's default in dry-run mode.
#[must_use]
pub fn sample_bundle_response() -> String {
    concat!(
        "Here is the generated site.\n\n",
        "```html\n",
        "<!doctype html>\n<html><head><title>Sample</title></head>\n",
        "<body><main><h1>Sample walkthrough site</h1></main></body></html>\n",
        "```\n\n",
        "```css\n",
        "body { font-family: system-ui, sans-serif; margin: 0; }\n",
        "main { max-width: 60rem; margin: 0 auto; padding: 2rem; }\n",
        "```\n\n",
        "```js\n",
        "document.addEventListener('DOMContentLoaded', () => {});\n",
        "```\n",
    )
    .to_string()
}
