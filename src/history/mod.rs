mod file;
mod snapshot;

pub use file::JsonFileHistoryStore;
pub use snapshot::Snapshot;

use async_trait::async_trait;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use crate::cli::Args;
use crate::models::chat::{ ConversationIndex, Role, Turn };

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history file IO error at {}: {}", path.display(), source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends several turns to one conversation as a single durable write.
    async fn append_exchange(
        &self,
        conversation_id: &str,
        turns: &[(Role, &str)]
    ) -> Result<String, HistoryError>;

    async fn append(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str
    ) -> Result<String, HistoryError> {
        self.append_exchange(conversation_id, &[(role, content)]).await
    }

    /// Turns for `conversation_id`, or empty when unknown or unreadable.
    async fn get_conversation(&self, conversation_id: &str) -> Vec<Turn>;

    /// `None` when the id has never been written.
    async fn find_conversation(
        &self,
        conversation_id: &str
    ) -> Result<Option<Vec<Turn>>, HistoryError>;

    async fn get_all_conversations(&self) -> Result<ConversationIndex, HistoryError>;
}

pub async fn initialize_history_store(
    args: &Args
) -> Result<Arc<dyn HistoryStore>, Box<dyn std::error::Error + Send + Sync>> {
    info!("Chat history will be stored in: {}", args.data_file);
    let store = JsonFileHistoryStore::open(&args.data_file).await?;
    Ok(Arc::new(store))
}
