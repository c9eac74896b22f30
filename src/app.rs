use tokio::sync::mpsc;

use crate::config::Config;
use crate::conversation::Conversation;
use crate::exec::Gate;
use crate::extract::first_python_block;
use crate::ollama::OllamaClient;
use crate::stream::{self, StreamEvent};

/// One transcript display entry. Notices and code output live only here;
/// the conversation store never sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    User(String),
    Assistant(String),
    Notice(String),
    CodeOutput(String),
}

/// The one stream that may exist at a time. `Completed` is transient: the
/// transition function consumes it (append, extract, arm) and lands on
/// `Idle` before the next render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming(String),
    Completed(String),
}

pub struct App {
    pub should_quit: bool,

    // Conversation state: mutated only here, never by the stream worker
    pub conversation: Conversation,
    pub entries: Vec<Entry>,
    pub stream: StreamState,
    pub stream_rx: Option<mpsc::UnboundedReceiver<StreamEvent>>,
    pub gate: Gate,

    // Input line state
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Transcript scroll state
    pub scroll: u16,
    pub chat_height: u16, // inner chat area, updated during render
    pub chat_width: u16,

    // Animation state (ellipsis while waiting for the first chunk)
    pub animation_frame: u8,

    pub ollama: OllamaClient,
    pub config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        let ollama = OllamaClient::new(&config.ollama_url);
        Self {
            should_quit: false,
            conversation: Conversation::new(),
            entries: Vec::new(),
            stream: StreamState::Idle,
            stream_rx: None,
            gate: Gate::Disarmed,
            input: String::new(),
            cursor: 0,
            scroll: 0,
            chat_height: 0,
            chat_width: 0,
            animation_frame: 0,
            ollama,
            config,
        }
    }

    /// One request in flight at a time; while true the input line is
    /// disabled and submits are ignored.
    pub fn in_flight(&self) -> bool {
        matches!(self.stream, StreamState::Streaming(_))
    }

    /// Handle Enter on the input line. Blank input is ignored, the literal
    /// `run` goes to the execution gate instead of the conversation, and
    /// anything else starts a streaming exchange unless one is in flight.
    pub fn submit(&mut self) {
        let text = self.input.trim().to_string();
        self.input.clear();
        self.cursor = 0;

        if text.is_empty() {
            return;
        }
        if text == "run" {
            self.run_armed();
            return;
        }
        if self.in_flight() {
            return;
        }

        self.conversation.append_user(&text);
        self.entries.push(Entry::User(text));
        self.stream = StreamState::Streaming(String::new());
        self.stream_rx = Some(stream::spawn(
            self.ollama.clone(),
            self.config.model.clone(),
            self.conversation.snapshot(),
        ));
        self.scroll_to_bottom();
    }

    /// The single transition function for stream events, in arrival order.
    pub fn on_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Partial(text) => {
                if let StreamState::Streaming(partial) = &mut self.stream {
                    // Accumulated text only ever grows
                    if text.len() >= partial.len() {
                        *partial = text;
                    }
                }
                self.scroll_to_bottom();
            }
            StreamEvent::Completed(final_text) => {
                self.stream = StreamState::Completed(final_text);
                self.finish_completed();
            }
            StreamEvent::Failed(reason) => {
                self.stream_rx = None;
                self.stream = StreamState::Idle;
                self.entries
                    .push(Entry::Notice(format!("request failed: {}", reason)));
                self.scroll_to_bottom();
            }
        }
    }

    /// The worker's channel closed without a terminal event (e.g. the task
    /// panicked). Treated as a transport failure.
    pub fn on_stream_closed(&mut self) {
        if self.in_flight() {
            self.on_stream_event(StreamEvent::Failed(
                "stream ended unexpectedly".to_string(),
            ));
        } else {
            self.stream_rx = None;
        }
    }

    fn finish_completed(&mut self) {
        let final_text = match std::mem::replace(&mut self.stream, StreamState::Idle) {
            StreamState::Completed(text) => text,
            other => {
                self.stream = other;
                return;
            }
        };
        self.stream_rx = None;

        // Exactly one append per completed stream
        self.conversation.append_assistant(&final_text);

        let code = first_python_block(&final_text);
        self.entries.push(Entry::Assistant(final_text));

        if let Some(code) = code {
            self.gate.arm(code);
            self.entries.push(Entry::Notice(
                "python code detected — type run to execute it".to_string(),
            ));
        }
        self.scroll_to_bottom();
    }

    /// The `run` command. Nothing armed is a silent no-op.
    fn run_armed(&mut self) {
        if !self.gate.is_armed() {
            return;
        }
        if !self.config.allow_exec {
            self.entries.push(Entry::Notice(
                "code execution is disabled (allow_exec = false)".to_string(),
            ));
            self.scroll_to_bottom();
            return;
        }

        // Synchronous and unsandboxed; the UI blocks until the child exits
        if let Some(result) = self.gate.fire(&self.config.interpreter) {
            self.entries.push(Entry::CodeOutput(result.output));
            self.scroll_to_bottom();
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.in_flight() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, amount: u16) {
        self.scroll = self.scroll.saturating_sub(amount);
    }

    pub fn scroll_down(&mut self, amount: u16) {
        let max = self.transcript_lines().saturating_sub(self.chat_height);
        self.scroll = self.scroll.saturating_add(amount).min(max);
    }

    /// Keep the newest text visible while a reply streams in.
    pub fn scroll_to_bottom(&mut self) {
        let total = self.transcript_lines();
        let visible = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };
        self.scroll = total.saturating_sub(visible);
    }

    /// Estimate of how many lines the transcript renders to at the current
    /// width, counting wrap the same way the render path does.
    fn transcript_lines(&self) -> u16 {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total: u16 = 0;
        for entry in &self.entries {
            let content = match entry {
                Entry::User(text)
                | Entry::Assistant(text)
                | Entry::Notice(text)
                | Entry::CodeOutput(text) => text,
            };
            total += 1; // role/header line
            total += wrapped_line_count(content, wrap_width);
            total += 1; // blank line after entry
        }

        if let StreamState::Streaming(partial) = &self.stream {
            total += 1;
            if partial.is_empty() {
                total += 1; // "Thinking..."
            } else {
                total += wrapped_line_count(partial, wrap_width);
            }
        }

        total
    }
}

fn wrapped_line_count(text: &str, wrap_width: usize) -> u16 {
    let mut total: u16 = 0;
    for line in text.lines() {
        // Character count, not byte length, for proper UTF-8 handling
        let char_count = line.chars().count();
        if char_count == 0 {
            total += 1;
        } else {
            total += char_count.div_ceil(wrap_width) as u16;
        }
    }
    total.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> App {
        App::new(Config::default())
    }

    fn submit_text(app: &mut App, text: &str) {
        app.input = text.to_string();
        app.submit();
    }

    #[tokio::test]
    async fn round_trip_appends_exactly_twice() {
        let mut app = app();
        submit_text(&mut app, "2+2?");
        assert_eq!(app.conversation.len(), 1);
        assert!(app.in_flight());

        app.on_stream_event(StreamEvent::Partial("4".to_string()));
        assert_eq!(app.stream, StreamState::Streaming("4".to_string()));
        assert_eq!(app.conversation.len(), 1);

        app.on_stream_event(StreamEvent::Completed("4".to_string()));
        assert_eq!(app.conversation.len(), 2);
        assert_eq!(app.stream, StreamState::Idle);
        assert!(app.stream_rx.is_none());
        assert!(!app.gate.is_armed());
        assert_eq!(
            app.entries,
            vec![
                Entry::User("2+2?".to_string()),
                Entry::Assistant("4".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn second_submit_mid_stream_is_ignored() {
        let mut app = app();
        submit_text(&mut app, "first");
        submit_text(&mut app, "second");
        assert_eq!(app.conversation.len(), 1);
        assert_eq!(app.entries.len(), 1);
    }

    #[tokio::test]
    async fn failure_leaves_history_untouched() {
        let mut app = app();
        submit_text(&mut app, "write hello world");
        app.on_stream_event(StreamEvent::Partial("Hel".to_string()));
        app.on_stream_event(StreamEvent::Partial("Hello".to_string()));
        app.on_stream_event(StreamEvent::Failed("connection reset".to_string()));

        assert_eq!(app.conversation.len(), 1);
        assert_eq!(app.stream, StreamState::Idle);
        assert!(!app.in_flight());
        assert!(matches!(
            app.entries.last(),
            Some(Entry::Notice(n)) if n.contains("connection reset")
        ));
    }

    #[tokio::test]
    async fn completed_reply_with_code_arms_the_gate() {
        let mut app = app();
        submit_text(&mut app, "write hello world");
        app.on_stream_event(StreamEvent::Completed(
            "Sure:\n```python\nprint(\"hello\")\n```\n".to_string(),
        ));

        assert_eq!(app.gate, Gate::Armed("print(\"hello\")\n".to_string()));
        assert!(matches!(
            app.entries.last(),
            Some(Entry::Notice(n)) if n.contains("run")
        ));
    }

    #[tokio::test]
    async fn run_executes_once_and_disarms() {
        let mut app = app();
        // sh stands in for python so the test runs anywhere
        app.config.interpreter = "sh".to_string();
        app.gate.arm("printf 'hello\\n'".to_string());

        submit_text(&mut app, "run");
        assert_eq!(
            app.entries.last(),
            Some(&Entry::CodeOutput("hello\n".to_string()))
        );
        assert!(!app.gate.is_armed());
        // run is a command, not conversation content
        assert_eq!(app.conversation.len(), 0);

        let before = app.entries.len();
        submit_text(&mut app, "run");
        assert_eq!(app.entries.len(), before, "disarmed run is a silent no-op");
    }

    #[tokio::test]
    async fn run_respects_allow_exec() {
        let mut app = app();
        app.config.allow_exec = false;
        app.gate.arm("print('hi')".to_string());

        submit_text(&mut app, "run");
        assert!(app.gate.is_armed(), "gate stays armed when execution is off");
        assert!(matches!(
            app.entries.last(),
            Some(Entry::Notice(n)) if n.contains("disabled")
        ));
    }

    #[tokio::test]
    async fn blank_submissions_are_rejected() {
        let mut app = app();
        submit_text(&mut app, "   \n ");
        assert_eq!(app.conversation.len(), 0);
        assert!(app.entries.is_empty());
        assert!(!app.in_flight());
    }

    #[tokio::test]
    async fn partials_never_shrink_the_reply() {
        let mut app = app();
        submit_text(&mut app, "hi");
        app.on_stream_event(StreamEvent::Partial("Hello".to_string()));
        app.on_stream_event(StreamEvent::Partial("He".to_string()));
        assert_eq!(app.stream, StreamState::Streaming("Hello".to_string()));
    }

    #[test]
    fn wrap_estimate_matches_the_render_path() {
        // A line of exactly the wrap width occupies one rendered line
        assert_eq!(wrapped_line_count(&"x".repeat(50), 50), 1);
        assert_eq!(wrapped_line_count(&"x".repeat(51), 50), 2);
        assert_eq!(wrapped_line_count(&"x".repeat(100), 50), 2);
        assert_eq!(wrapped_line_count("short\n\nlines", 50), 3);
    }

    #[tokio::test]
    async fn closed_channel_mid_stream_is_a_failure() {
        let mut app = app();
        submit_text(&mut app, "hi");
        app.on_stream_closed();
        assert_eq!(app.conversation.len(), 1);
        assert!(!app.in_flight());
        assert!(matches!(app.entries.last(), Some(Entry::Notice(_))));
    }
}
