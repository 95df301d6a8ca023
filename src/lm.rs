//! Completion service access for location extraction and scoring.
//!
//! Two backends implement [`CompletionService`]:
//!
//! - [`ChatCompletionClient`]: an OpenAI-compatible `/chat/completions`
//!   endpoint (DeepSeek by default), called over `ureq`.
//! - [`CommandCompletion`]: a user-configured local command that receives the
//!   prompt on stdin and answers on stdout (`llm`, `ollama run`, scripts).
//!
//! Both make exactly one attempt per call. Callers own the fallback policy.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// A single instruction plus the fixed system role for that task.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub system: &'a str,
    pub prompt: &'a str,
}

/// Text-in, text-out completion. Responses are non-deterministic and may be
/// malformed; implementations only report transport or service failures.
pub trait CompletionService {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String>;
}

/// Blocking client for OpenAI-compatible chat completion endpoints.
#[derive(Clone)]
pub struct ChatCompletionClient {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatCompletionClient {
    pub fn new(api_key: String, base_url: &str, model: String, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        Self {
            agent,
            endpoint,
            model,
            api_key,
        }
    }
}

impl CompletionService for ChatCompletionClient {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            stream: false,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.prompt,
                },
            ],
        };
        let start = Instant::now();
        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key.trim()))
            .send_json(&body)
            .with_context(|| format!("call chat completions at {}", self.endpoint))?;
        let parsed: ChatResponse = response
            .body_mut()
            .read_json()
            .context("parse chat completions response")?;

        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis(),
            prompt_bytes = request.prompt.len(),
            "completion call complete"
        );

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("chat completions response had no choices"))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: String,
}

/// Local LM command. The system role and prompt are written to stdin,
/// separated by a blank line; stdout is the response.
#[derive(Debug, Clone)]
pub struct CommandCompletion {
    argv: Vec<String>,
}

impl CommandCompletion {
    /// Parse the command line with shell quoting rules.
    pub fn new(command: &str) -> Result<Self> {
        let argv =
            shell_words::split(command).with_context(|| format!("parse LM command: {command}"))?;
        if argv.is_empty() {
            return Err(anyhow!("LM command is empty"));
        }
        Ok(Self { argv })
    }
}

impl CompletionService for CommandCompletion {
    fn complete(&self, request: &CompletionRequest<'_>) -> Result<String> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| anyhow!("LM command is empty"))?;

        let start = Instant::now();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn LM command: {program}"))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("LM command stdin unavailable"))?;
        let input = format!("{}\n\n{}", request.system, request.prompt);

        // stdin is fed from its own thread so a command that streams output
        // while reading cannot block on a full stdout pipe.
        let output = thread::scope(|scope| -> Result<Output> {
            let writer = scope.spawn(move || stdin.write_all(input.as_bytes()));
            let output = child.wait_with_output().context("wait for LM command")?;
            writer
                .join()
                .map_err(|_| anyhow!("LM stdin writer panicked"))?
                .context("write prompt to LM stdin")?;
            Ok(output)
        })?;
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis(),
            prompt_bytes = request.prompt.len(),
            response_bytes = output.stdout.len(),
            "lm command complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "LM command failed with status {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        String::from_utf8(output.stdout).context("decode LM stdout as UTF-8")
    }
}

/// Fill `{name}` placeholders in a single pass over `template`.
///
/// Substituted values are never rescanned, so post text containing
/// `{body}` or similar comes through verbatim. Braces that do not name a
/// known placeholder are left as they are.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut filled = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        filled.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let placeholder = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match placeholder {
            Some((close, value)) => {
                filled.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                filled.push('{');
                rest = after;
            }
        }
    }
    filled.push_str(rest);
    filled
}

/// Greedy span from the first `open` to the last `close`, inclusive.
///
/// Models wrap JSON in prose or code fences; scanning for the outermost
/// delimiters recovers it. Stray delimiters elsewhere in the text widen the
/// span and make the parse fail, which callers treat as malformed output.
pub fn json_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&text[start..end + close.len_utf8()])
}
