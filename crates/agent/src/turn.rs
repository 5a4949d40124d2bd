//! The streaming turn: request, stream, dispatch tools, continue.
//!
//! One call to [`StreamingToolCallSession::send_turn`] runs a whole logical
//! turn. Each round is one request plus one streamed response; when the
//! response asks for functions, they are dispatched and the next round
//! replays every call/result pair of the turn so far.

use futures::StreamExt;
use monadic_core::event::CALLING_FUNCTIONS;
use monadic_core::{
    ConfigSource, EventSink, FinishReason, HttpRequest, HttpResponse, HttpTransport, Role, Session,
    StreamEvent, StreamItem, ToolCall, ToolRegistry, ToolRound, TurnError, VendorAdapter, monad,
};
use monadic_providers::IncrementalJsonReader;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Limits and pacing for one session.
#[derive(Debug, Clone)]
pub struct TurnOptions {
    /// Tool rounds allowed per logical turn
    pub max_call_depth: u32,

    /// Retries after the first attempt
    pub max_retries: u32,

    pub retry_delay: Duration,

    /// Pause after each emitted character
    pub fragment_delay: Duration,
}

impl Default for TurnOptions {
    fn default() -> Self {
        Self {
            max_call_depth: 5,
            max_retries: 5,
            retry_delay: Duration::from_secs(1),
            fragment_delay: Duration::from_millis(10),
        }
    }
}

/// How a turn ended.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// The model answered; a `message` event was emitted.
    Completed {
        text: String,
        finish_reason: Option<FinishReason>,
    },

    /// Nothing to say and nothing went wrong. No terminal event.
    Empty,

    /// The turn failed; an `error` event was emitted.
    Failed(TurnError),
}

impl TurnOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Completed { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&TurnError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// What one streamed response produced.
struct RoundOutput {
    text: String,
    calls: Vec<ToolCall>,
    finish_reason: Option<FinishReason>,
}

/// Why an attempt at a round stopped.
enum RoundFailure {
    /// Nothing reached the sink yet.
    Retryable(TurnError),
    Fatal(TurnError),
}

impl From<TurnError> for RoundFailure {
    fn from(e: TurnError) -> Self {
        Self::Fatal(e)
    }
}

/// Drives turns for one app against one vendor.
pub struct StreamingToolCallSession {
    adapter: Arc<dyn VendorAdapter>,
    transport: Arc<dyn HttpTransport>,
    tools: Arc<ToolRegistry>,
    config: Arc<dyn ConfigSource>,
    options: TurnOptions,
}

impl StreamingToolCallSession {
    pub fn new(
        adapter: Arc<dyn VendorAdapter>,
        transport: Arc<dyn HttpTransport>,
        tools: Arc<ToolRegistry>,
        config: Arc<dyn ConfigSource>,
        options: TurnOptions,
    ) -> Self {
        Self {
            adapter,
            transport,
            tools,
            config,
            options,
        }
    }

    pub fn vendor(&self) -> &str {
        self.adapter.name()
    }

    pub fn options(&self) -> &TurnOptions {
        &self.options
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one logical turn.
    ///
    /// `role` is [`Role::User`] for a new user turn or [`Role::Tool`] to
    /// continue from tool rounds already on the session. Errors never escape:
    /// each one becomes a single `error` event and [`TurnOutcome::Failed`].
    pub async fn send_turn(
        &self,
        session: &mut Session,
        role: Role,
        call_depth: u32,
        sink: &dyn EventSink,
    ) -> TurnOutcome {
        info!(
            vendor = %self.adapter.name(),
            model = %session.parameters.model,
            call_depth,
            role = %role,
            "Starting turn"
        );

        match self.run(session, role, call_depth, sink).await {
            Ok(Some((text, finish_reason))) => {
                sink.emit(StreamEvent::done(finish_reason));
                TurnOutcome::Completed {
                    text,
                    finish_reason,
                }
            }
            Ok(None) => TurnOutcome::Empty,
            Err(e) => {
                warn!(vendor = %self.adapter.name(), error = %e, "Turn failed");
                sink.emit(StreamEvent::error(e.to_string()));
                TurnOutcome::Failed(e)
            }
        }
    }

    async fn run(
        &self,
        session: &mut Session,
        role: Role,
        call_depth: u32,
        sink: &dyn EventSink,
    ) -> Result<Option<(String, Option<FinishReason>)>, TurnError> {
        let key_name = self.adapter.api_key_name();
        let api_key = self
            .config
            .lookup(key_name)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                TurnError::Configuration(format!(
                    "{key_name} not found. Set it in the environment or in the [keys] table of the config file."
                ))
            })?;

        if role == Role::User {
            if let Some(written) = session.commit_pending_message() {
                debug!(messages = session.messages.len(), "User message appended");
                sink.emit(StreamEvent::user(&written));
            }
            session.parameters.tool_rounds.clear();
        }

        let active = session.slide_window();
        if active == 0 && session.parameters.tool_rounds.is_empty() {
            debug!("Nothing to send");
            return Ok(None);
        }

        let mut role = role;
        let mut depth = call_depth;

        loop {
            let request = self.adapter.build_request(session, role, &api_key);
            let separate = session
                .parameters
                .tool_rounds
                .iter()
                .any(|r| !r.text.is_empty());
            let round = self.round_with_retry(request, separate, sink).await?;

            if round.calls.is_empty() {
                let mut text = session
                    .parameters
                    .tool_rounds
                    .iter()
                    .map(|r| r.text.as_str())
                    .chain(std::iter::once(round.text.as_str()))
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n");

                if text.is_empty() {
                    return Ok(None);
                }
                if session.parameters.monadic {
                    text = monad::map(&text, &mut session.parameters.monadic_context);
                }
                return Ok(Some((text, round.finish_reason)));
            }

            depth += 1;
            if depth > self.options.max_call_depth {
                return Err(TurnError::RecursionLimit {
                    max: self.options.max_call_depth,
                });
            }

            let mut results = Vec::with_capacity(round.calls.len());
            for call in &round.calls {
                debug!(tool = %call.name, call_depth = depth, "Calling function");
                results.push(self.tools.dispatch(call).await?);
            }

            session.parameters.tool_rounds.push(ToolRound {
                text: round.text,
                results,
            });
            role = Role::Tool;
        }
    }

    /// Send one round with fixed-delay retries.
    ///
    /// An attempt fails on a transport error, a non-2xx status, or a body
    /// that breaks before anything reached the sink. Once output has been
    /// emitted a broken body fails the turn.
    async fn round_with_retry(
        &self,
        request: HttpRequest,
        separate: bool,
        sink: &dyn EventSink,
    ) -> Result<RoundOutput, TurnError> {
        let attempts = self.options.max_retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            debug!(vendor = %self.adapter.name(), attempt, "Sending request");

            let error = match self.transport.post(request.clone()).await {
                Ok(response) if response.is_success() => {
                    match self.stream_round(response, attempt, separate, sink).await {
                        Ok(round) => return Ok(round),
                        Err(RoundFailure::Fatal(e)) => return Err(e),
                        Err(RoundFailure::Retryable(e)) => {
                            warn!(attempt, error = %e, "Stream broke before any output");
                            e
                        }
                    }
                }
                Ok(response) => {
                    let status = response.status;
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
                    warn!(status, attempt, "Vendor returned error status");
                    TurnError::Vendor { status, body }
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Request failed");
                    TurnError::Transport {
                        attempts: attempt,
                        message: e.to_string(),
                    }
                }
            };
            last_error = Some(error);

            if attempt < attempts {
                tokio::time::sleep(self.options.retry_delay).await;
            }
        }

        Err(last_error.unwrap_or(TurnError::Transport {
            attempts: 0,
            message: "no attempt was made".into(),
        }))
    }

    /// Consume one streamed body, emitting events as items arrive.
    ///
    /// With `separate` set, a newline fragment precedes this round's first
    /// character so the fragments add up to the joined turn text.
    async fn stream_round(
        &self,
        response: HttpResponse,
        attempt: u32,
        mut separate: bool,
        sink: &dyn EventSink,
    ) -> Result<RoundOutput, RoundFailure> {
        let mut reader = IncrementalJsonReader::new();
        let mut decoder = self.adapter.new_decoder();
        let mut text = String::new();
        let mut finish_reason = None;
        let mut emitted = false;

        let mut body = response.body;
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let error = TurnError::Transport {
                        attempts: attempt,
                        message: e.to_string(),
                    };
                    return Err(if emitted {
                        RoundFailure::Fatal(error)
                    } else {
                        RoundFailure::Retryable(error)
                    });
                }
            };

            for object in reader.push(&chunk)? {
                for item in decoder.decode(object)? {
                    match item {
                        StreamItem::Text(s) => {
                            if separate {
                                sink.emit(StreamEvent::fragment("\n"));
                                separate = false;
                            }
                            self.emit_fragments(&s, sink).await;
                            text.push_str(&s);
                            emitted = true;
                        }
                        StreamItem::ToolCallStarted(name) => {
                            debug!(tool = %name, "Function call requested");
                            sink.emit(StreamEvent::wait(CALLING_FUNCTIONS));
                            emitted = true;
                        }
                        StreamItem::Finish(reason) => finish_reason = Some(reason),
                    }
                }
            }
        }

        reader.finish()?;
        if reader.yielded() == 0 {
            return Err(TurnError::Parse("response body contained no JSON objects".into()).into());
        }

        let calls = decoder.finish()?;
        debug!(
            chars = text.chars().count(),
            calls = calls.len(),
            finish_reason = ?finish_reason,
            "Round complete"
        );

        Ok(RoundOutput {
            text,
            calls,
            finish_reason,
        })
    }

    /// One `fragment` event per character, paced.
    async fn emit_fragments(&self, s: &str, sink: &dyn EventSink) {
        for ch in s.chars() {
            sink.emit(StreamEvent::fragment(ch.to_string()));
            if !self.options.fragment_delay.is_zero() {
                tokio::time::sleep(self.options.fragment_delay).await;
            }
        }
    }
}
