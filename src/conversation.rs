use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation. Immutable once appended.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Append-only conversation history. This is the single source of truth for
/// what gets sent to Ollama: `snapshot()` is the request payload verbatim.
/// Notices and code output shown in the transcript never land here.
#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    pub fn append_user(&mut self, content: &str) {
        self.turns.push(Turn {
            role: Role::User,
            content: content.to_string(),
        });
    }

    pub fn append_assistant(&mut self, content: &str) {
        self.turns.push(Turn {
            role: Role::Assistant,
            content: content.to_string(),
        });
    }

    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
