use crate::error::ServiceError;
use crate::history::{ initialize_history_store, HistoryStore };
use crate::cli::Args;
use crate::llm::{ LlmConfig, LlmType };
use crate::llm::chat::{ ChatClient, CompletionError, new_client as new_chat_client };
use crate::models::chat::{ ChatOutcome, ChatTurn, ConversationIndex, Role, Turn };

use log::{ info, error };
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

pub const FALLBACK_REPLY: &str =
    "I'm sorry, I encountered an issue while processing your request. Please try again later.";

const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns one user message into a provider call and a stored exchange.
#[derive(Clone)]
pub struct ChatAgent {
    chat_client: Arc<dyn ChatClient>,
    history_store: Arc<dyn HistoryStore>,
    completion_timeout: Duration,
}

impl ChatAgent {
    pub fn with_parts(
        chat_client: Arc<dyn ChatClient>,
        history_store: Arc<dyn HistoryStore>
    ) -> Self {
        Self {
            chat_client,
            history_store,
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }

    pub fn completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = timeout;
        self
    }

    pub async fn new(args: Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let chat_llm_type: LlmType = args.chat_llm_type.parse()?;
        let chat_api_key = if !args.chat_api_key.is_empty() {
            Some(args.chat_api_key.clone())
        } else {
            None
        };
        let chat_config = LlmConfig {
            llm_type: chat_llm_type,
            base_url: args.chat_base_url.clone(),
            api_key: chat_api_key,
            completion_model: args.chat_model.clone(),
            temperature: args.temperature,
            max_tokens: args.max_tokens,
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={}",
            chat_config.llm_type,
            chat_client.get_model(),
            chat_client.get_base_url().as_deref().unwrap_or("adapter default")
        );

        let history_store = initialize_history_store(&args).await?;

        Ok(
            Self::with_parts(chat_client, history_store).completion_timeout(
                Duration::from_secs(args.completion_timeout_secs)
            )
        )
    }

    pub fn model(&self) -> String {
        self.chat_client.get_model()
    }

    pub async fn handle(
        &self,
        conversation_id: Option<String>,
        content: &str
    ) -> Result<ChatOutcome, ServiceError> {
        let conversation_id = match conversation_id.filter(|id| !id.is_empty()) {
            Some(id) => {
                info!("Using existing conversation with ID: {}", id);
                id
            }
            None => {
                let id = Uuid::new_v4().to_string();
                info!("Created new conversation with ID: {}", id);
                id
            }
        };

        let history = self.history_store.get_conversation(&conversation_id).await;
        let mut context: Vec<ChatTurn> = history.iter().map(ChatTurn::from).collect();
        context.push(ChatTurn {
            role: Role::User,
            content: content.to_string(),
        });

        let reply = match self.complete(&context).await {
            Ok(reply) => {
                info!("Received completion for conversation {}", conversation_id);
                reply
            }
            Err(e) => {
                error!("Completion failed for conversation {}: {}", conversation_id, e);
                FALLBACK_REPLY.to_string()
            }
        };

        self.history_store
            .append_exchange(
                &conversation_id,
                &[
                    (Role::User, content),
                    (Role::Assistant, reply.as_str()),
                ]
            ).await
            .map_err(|e| {
                error!("Error storing exchange for conversation {}: {}", conversation_id, e);
                e
            })?;

        Ok(ChatOutcome {
            reply,
            conversation_id,
            model: self.chat_client.get_model(),
        })
    }

    async fn complete(&self, context: &[ChatTurn]) -> Result<String, CompletionError> {
        let response = timeout(self.completion_timeout, self.chat_client.complete(context)).await
            .map_err(|_| CompletionError::Timeout(self.completion_timeout))??;
        Ok(response.response)
    }

    pub async fn get_all_conversations(&self) -> Result<ConversationIndex, ServiceError> {
        Ok(self.history_store.get_all_conversations().await?)
    }

    pub async fn get_conversation(&self, conversation_id: &str) -> Result<Vec<Turn>, ServiceError> {
        self.history_store
            .find_conversation(conversation_id).await?
            .ok_or_else(|| ServiceError::NotFound(conversation_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::JsonFileHistoryStore;
    use crate::llm::chat::CompletionResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        seen: Mutex<Vec<Vec<ChatTurn>>>,
    }

    #[async_trait]
    impl ChatClient for RecordingClient {
        async fn complete(
            &self,
            messages: &[ChatTurn]
        ) -> Result<CompletionResponse, CompletionError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            Ok(CompletionResponse { response: format!("echo: {}", messages.len()) })
        }

        fn get_model(&self) -> String {
            "recording".into()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    struct FailingClient;

    #[async_trait]
    impl ChatClient for FailingClient {
        async fn complete(&self, _: &[ChatTurn]) -> Result<CompletionResponse, CompletionError> {
            Err(CompletionError::EmptyResponse("Test"))
        }

        fn get_model(&self) -> String {
            "failing".into()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    struct SlowClient;

    #[async_trait]
    impl ChatClient for SlowClient {
        async fn complete(&self, _: &[ChatTurn]) -> Result<CompletionResponse, CompletionError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(CompletionResponse { response: "too late".into() })
        }

        fn get_model(&self) -> String {
            "slow".into()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    async fn store_in(dir: &tempfile::TempDir) -> Arc<JsonFileHistoryStore> {
        Arc::new(JsonFileHistoryStore::open(dir.path().join("conversations.json")).await.unwrap())
    }

    #[tokio::test]
    async fn new_conversation_gets_fresh_id_and_two_turns() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let agent = ChatAgent::with_parts(Arc::new(RecordingClient::default()), store.clone());

        let before = store.get_all_conversations().await.unwrap();
        let outcome = agent.handle(None, "hello").await.unwrap();

        assert!(!outcome.conversation_id.is_empty());
        assert!(!before.contains(&outcome.conversation_id));
        assert_eq!(outcome.reply, "echo: 1");

        let turns = store.get_conversation(&outcome.conversation_id).await;
        assert_eq!(turns.len(), 2);
        assert_eq!((turns[0].role, turns[0].content.as_str()), (Role::User, "hello"));
        assert_eq!((turns[1].role, turns[1].content.as_str()), (Role::Assistant, "echo: 1"));
    }

    #[tokio::test]
    async fn empty_id_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let agent = ChatAgent::with_parts(Arc::new(RecordingClient::default()), store_in(&dir).await);

        let outcome = agent.handle(Some(String::new()), "hi").await.unwrap();
        assert!(Uuid::parse_str(&outcome.conversation_id).is_ok());
    }

    #[tokio::test]
    async fn existing_conversation_sends_full_context_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        store.append_exchange("abc", &[(Role::User, "first"), (Role::Assistant, "reply one")]).await.unwrap();

        let client = Arc::new(RecordingClient::default());
        let agent = ChatAgent::with_parts(client.clone(), store.clone());
        let outcome = agent.handle(Some("abc".into()), "again").await.unwrap();
        assert_eq!(outcome.conversation_id, "abc");

        let seen = client.seen.lock().unwrap().clone();
        assert_eq!(
            seen[0],
            vec![
                ChatTurn { role: Role::User, content: "first".into() },
                ChatTurn { role: Role::Assistant, content: "reply one".into() },
                ChatTurn { role: Role::User, content: "again".into() }
            ]
        );

        let contents: Vec<String> = store
            .get_conversation("abc").await
            .into_iter()
            .map(|t| t.content)
            .collect();
        assert_eq!(contents, vec!["first", "reply one", "again", "echo: 3"]);
    }

    #[tokio::test]
    async fn provider_failure_falls_back_and_still_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let agent = ChatAgent::with_parts(Arc::new(FailingClient), store.clone());

        let outcome = agent.handle(None, "anyone there?").await.unwrap();
        assert_eq!(outcome.reply, FALLBACK_REPLY);

        let turns = store.get_conversation(&outcome.conversation_id).await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].content, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn slow_provider_times_out_into_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let agent = ChatAgent::with_parts(Arc::new(SlowClient), store_in(&dir).await).completion_timeout(
            Duration::from_millis(50)
        );

        let outcome = agent.handle(None, "hurry").await.unwrap();
        assert_eq!(outcome.reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn exchange_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let agent = ChatAgent::with_parts(Arc::new(RecordingClient::default()), store_in(&dir).await);
        let outcome = agent.handle(None, "remember me").await.unwrap();
        drop(agent);

        let reopened = store_in(&dir).await;
        let turns = reopened.get_conversation(&outcome.conversation_id).await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "remember me");
        assert_eq!(turns[1].content, outcome.reply);
    }

    #[tokio::test]
    async fn corrupt_store_does_not_block_chatting() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("conversations.json"), "not json at all").unwrap();
        let store = store_in(&dir).await;
        let agent = ChatAgent::with_parts(Arc::new(RecordingClient::default()), store.clone());

        let outcome = agent.handle(None, "hello").await.unwrap();
        assert_eq!(store.get_conversation(&outcome.conversation_id).await.len(), 2);
    }

    #[tokio::test]
    async fn persistence_failure_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let path = dir.path().join("conversations.json");
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let agent = ChatAgent::with_parts(Arc::new(RecordingClient::default()), store);
        let err = agent.handle(None, "hello").await.unwrap_err();
        assert!(matches!(err, ServiceError::Persistence(_)));
    }

    #[tokio::test]
    async fn failed_save_stores_neither_turn() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        std::fs::create_dir(dir.path().join("conversations.json.tmp")).unwrap();

        let agent = ChatAgent::with_parts(Arc::new(RecordingClient::default()), store.clone());
        let err = agent.handle(Some("abc".into()), "hello").await.unwrap_err();
        assert!(matches!(err, ServiceError::Persistence(_)));
        assert_eq!(store.find_conversation("abc").await.unwrap(), None);
        assert_eq!(std::fs::read_to_string(dir.path().join("conversations.json")).unwrap(), "{}");
    }

    #[tokio::test]
    async fn lookup_distinguishes_unknown_ids() {
        let dir = tempfile::tempdir().unwrap();
        let agent = ChatAgent::with_parts(Arc::new(RecordingClient::default()), store_in(&dir).await);
        let outcome = agent.handle(None, "hello").await.unwrap();

        assert_eq!(agent.get_conversation(&outcome.conversation_id).await.unwrap().len(), 2);
        assert!(matches!(agent.get_conversation("missing").await, Err(ServiceError::NotFound(id)) if id == "missing"));
    }
}
