use async_trait::async_trait;
use chrono::Local;
use log::{ debug, error, info, warn };
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{ Path, PathBuf };
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{ HistoryError, HistoryStore, Snapshot };
use crate::models::chat::{ ConversationIndex, Role, Turn };

/// Conversation history kept in a single JSON document on disk.
///
/// Every operation reloads the file under one store-wide lock before acting,
/// and every mutation rewrites the whole document through a temp file and a
/// rename, so readers only ever observe complete snapshots.
pub struct JsonFileHistoryStore {
    path: PathBuf,
    snapshot: Mutex<Snapshot>,
}

fn io_error(path: &Path, source: std::io::Error) -> HistoryError {
    HistoryError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("conversations.json"));
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

impl JsonFileHistoryStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| io_error(parent, e))?;
        }

        let store = Self {
            path,
            snapshot: Mutex::new(Snapshot::new()),
        };
        let count = {
            let mut snapshot = store.snapshot.lock().await;
            store.reload(&mut snapshot).await?;
            snapshot.len()
        };
        info!("Loaded {} conversations from {}", count, store.path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current persisted state, repairing a missing or unreadable file.
    pub async fn load(&self) -> Result<Snapshot, HistoryError> {
        let mut snapshot = self.snapshot.lock().await;
        self.reload(&mut snapshot).await?;
        Ok(snapshot.clone())
    }

    async fn reload(&self, snapshot: &mut Snapshot) -> Result<(), HistoryError> {
        match fs::read(&self.path).await {
            Ok(bytes) =>
                match serde_json::from_slice::<Snapshot>(&bytes) {
                    Ok(loaded) => {
                        *snapshot = loaded;
                        Ok(())
                    }
                    Err(e) => {
                        warn!(
                            "Invalid JSON in history file {}: {}. Initializing empty history.",
                            self.path.display(),
                            e
                        );
                        self.quarantine().await;
                        let empty = Snapshot::new();
                        self.persist(&empty).await?;
                        *snapshot = empty;
                        Ok(())
                    }
                }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                let empty = Snapshot::new();
                self.persist(&empty).await?;
                info!("Created new history file at {}", self.path.display());
                *snapshot = empty;
                Ok(())
            }
            Err(e) => Err(io_error(&self.path, e)),
        }
    }

    /// Moves an unreadable file aside under a name no earlier backup uses.
    async fn quarantine(&self) {
        let stamp = Local::now().format("%Y%m%dT%H%M%S%.6f").to_string();
        let mut target = sibling(&self.path, &format!("corrupt-{}", stamp));
        let mut attempt = 1;
        while fs::metadata(&target).await.is_ok() {
            target = sibling(&self.path, &format!("corrupt-{}-{}", stamp, attempt));
            attempt += 1;
        }
        match fs::rename(&self.path, &target).await {
            Ok(()) => warn!("Moved unreadable history file to {}", target.display()),
            Err(e) => warn!("Could not move unreadable history file aside: {}", e),
        }
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<(), HistoryError> {
        let body = snapshot.to_json_bytes()?;
        let tmp = sibling(&self.path, "tmp");

        let mut file = fs::File::create(&tmp).await.map_err(|e| io_error(&tmp, e))?;
        file.write_all(&body).await.map_err(|e| io_error(&tmp, e))?;
        file.sync_all().await.map_err(|e| io_error(&tmp, e))?;
        drop(file);

        if let Err(e) = fs::rename(&tmp, &self.path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(io_error(&self.path, e));
        }
        debug!("Saved {} conversations to {}", snapshot.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for JsonFileHistoryStore {
    async fn append_exchange(
        &self,
        conversation_id: &str,
        turns: &[(Role, &str)]
    ) -> Result<String, HistoryError> {
        let mut snapshot = self.snapshot.lock().await;
        self.reload(&mut snapshot).await?;

        let mut next = snapshot.clone();
        for (role, content) in turns {
            next.push(conversation_id, *role, content);
        }

        if let Err(e) = self.persist(&next).await {
            error!("Failed to save conversation {}: {}", conversation_id, e);
            return Err(e);
        }
        *snapshot = next;

        for (role, _) in turns {
            info!("Added {} message to conversation {}", role, conversation_id);
        }
        Ok(conversation_id.to_string())
    }

    async fn get_conversation(&self, conversation_id: &str) -> Vec<Turn> {
        let mut snapshot = self.snapshot.lock().await;
        if let Err(e) = self.reload(&mut snapshot).await {
            warn!("Error getting conversation {}: {}", conversation_id, e);
            return Vec::new();
        }
        snapshot.get(conversation_id).map(<[Turn]>::to_vec).unwrap_or_default()
    }

    async fn find_conversation(
        &self,
        conversation_id: &str
    ) -> Result<Option<Vec<Turn>>, HistoryError> {
        let mut snapshot = self.snapshot.lock().await;
        self.reload(&mut snapshot).await?;
        Ok(snapshot.get(conversation_id).map(<[Turn]>::to_vec))
    }

    async fn get_all_conversations(&self) -> Result<ConversationIndex, HistoryError> {
        let mut snapshot = self.snapshot.lock().await;
        self.reload(&mut snapshot).await?;
        Ok(snapshot.summaries())
    }
}
