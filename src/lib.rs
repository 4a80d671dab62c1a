pub mod agent;
pub mod cli;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod server;

use agent::ChatAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Data File: {}", args.data_file);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("adapter default"));
    info!("Completion Timeout: {}s", args.completion_timeout_secs);
    info!("-------------------------");

    let agent = Arc::new(ChatAgent::new(args.clone()).await?);
    info!("Successfully initialized chat service");

    let server = Server::new(args.server_addr.clone(), agent);
    server.run().await?;

    Ok(())
}
