//! Sources of request sequences.

use std::path::Path;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::router::Request;

/// Short in-budget demo task.
pub const DEMO_SHORT_PROMPT: &str =
    "Briefly explain the concept of redundancy in Shannon's information theory.";

/// Twenty words, repeated to build the oversized demo task.
const DEMO_LONG_SENTENCE: &str = "Write a short synopsis of how limited VRAM shapes the design of a microservice architecture built on large language models. ";

/// 20 words * 200 = 4000 words, cost 5200: over the default threshold of 4000.
const DEMO_LONG_REPEAT: usize = 200;

/// The built-in demonstration sequence: one in-budget and one oversized task.
pub fn demo_requests() -> Vec<Request> {
    vec![
        Request::new(DEMO_SHORT_PROMPT),
        Request::new(DEMO_LONG_SENTENCE.repeat(DEMO_LONG_REPEAT).trim_end()),
    ]
}

/// Requests listed under `[[requests]]` in the config.
pub fn config_requests(config: &Config) -> Vec<Request> {
    config
        .requests
        .iter()
        .map(|r| Request::new(r.prompt.as_str()))
        .collect()
}

/// Split prompt-file contents into prompts.
///
/// Prompts are separated by blank lines; a prompt may span several lines.
pub fn parse_prompts(content: &str) -> Vec<Request> {
    let mut requests = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                requests.push(Request::new(current.join("\n")));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        requests.push(Request::new(current.join("\n")));
    }

    requests
}

/// Load prompts from a file (see [`parse_prompts`]).
pub fn load_prompts_file(path: impl AsRef<Path>) -> Result<Vec<Request>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| Error::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(parse_prompts(&content))
}

/// Pick the request sequence for a run: prompts file, then config, then demo.
pub fn resolve_requests(config: &Config, prompts_file: Option<&Path>) -> Result<Vec<Request>> {
    if let Some(path) = prompts_file {
        let requests = load_prompts_file(path)?;
        tracing::info!(path = %path.display(), count = requests.len(), "Loaded prompts file");
        return Ok(requests);
    }

    let requests = config_requests(config);
    if !requests.is_empty() {
        tracing::info!(count = requests.len(), "Using configured request sequence");
        return Ok(requests);
    }

    tracing::info!("No requests configured, running demonstration sequence");
    Ok(demo_requests())
}
