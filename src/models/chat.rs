use serde::{ Serialize, Serializer, Deserialize };
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted message. Field order matches the on-disk layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

/// Role/content pair handed to a completion provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl From<&Turn> for ChatTurn {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    pub messages: Vec<Turn>,
    pub message_count: usize,
    pub created_at: Option<String>,
    pub last_updated: Option<String>,
}

impl ConversationSummary {
    pub fn from_turns(id: &str, turns: &[Turn]) -> Self {
        Self {
            id: id.to_string(),
            messages: turns.to_vec(),
            message_count: turns.len(),
            created_at: turns.first().map(|t| t.timestamp.clone()),
            last_updated: turns.last().map(|t| t.timestamp.clone()),
        }
    }
}

/// Summaries in store order, serialized as an object keyed by conversation id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationIndex(pub Vec<ConversationSummary>);

impl ConversationIndex {
    pub fn get(&self, conversation_id: &str) -> Option<&ConversationSummary> {
        self.0.iter().find(|summary| summary.id == conversation_id)
    }

    pub fn contains(&self, conversation_id: &str) -> bool {
        self.get(conversation_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ConversationIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|summary| (&summary.id, summary)))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatOutcome {
    pub reply: String,
    pub conversation_id: String,
    pub model: String,
}
