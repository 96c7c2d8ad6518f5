//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use vramroute::backend::{BackendFailure, Generate, Generated};
use vramroute::router::GenerationOptions;
use vramroute::{Config, Dispatcher, Registry};

/// Configuration mirroring the reference deployment.
pub const TEST_CONFIG: &str = r#"
[constrained]
name = "intel"
url = "http://intel.test:11434"
model = "phi3:3.8b"
max_context_tokens = 8192
admission_threshold = 4000

[high_capacity]
name = "nvidia"
url = "http://nvidia.test:11435"
model = "gemma:2b"
max_context_tokens = 8192
temperature = 0.7
"#;

pub fn test_registry() -> Registry {
    let config = Config::parse_str(TEST_CONFIG).expect("test config parses");
    Registry::from_config(&config).expect("test config is valid")
}

/// A prompt whose cost is exactly 4001.
pub fn oversized_prompt() -> String {
    "word ".repeat(3078)
}

/// One call received by a [`MockBackend`].
#[derive(Debug, Clone)]
pub struct Call {
    pub model: String,
    pub prompt: String,
    pub options: GenerationOptions,
}

/// Backend that replays scripted results in order and records every call.
///
/// Once the script runs out, every call succeeds with `"<label> response"`.
pub struct MockBackend {
    label: &'static str,
    script: Mutex<VecDeque<Result<Generated, BackendFailure>>>,
    calls: AtomicU32,
    log: Mutex<Vec<Call>>,
}

impl MockBackend {
    pub fn new(label: &'static str) -> Arc<Self> {
        Self::scripted(label, vec![])
    }

    pub fn scripted(
        label: &'static str,
        script: Vec<Result<Generated, BackendFailure>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            label,
            script: Mutex::new(script.into()),
            calls: AtomicU32::new(0),
            log: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(label: &'static str, failure: BackendFailure) -> Arc<Self> {
        Self::scripted(label, vec![Err(failure)])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn log(&self) -> Vec<Call> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generate for MockBackend {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generated, BackendFailure> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.log.lock().unwrap().push(Call {
            model: model.to_string(),
            prompt: prompt.to_string(),
            options: *options,
        });
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(Generated {
                text: format!("{} response", self.label),
            })
        })
    }
}

/// Dispatcher over two mock backends.
pub fn mock_dispatcher(
    constrained: &Arc<MockBackend>,
    high_capacity: &Arc<MockBackend>,
) -> Dispatcher {
    Dispatcher::new(test_registry(), constrained.clone(), high_capacity.clone())
}
