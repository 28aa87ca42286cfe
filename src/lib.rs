pub mod background;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod options;
pub mod server;
pub mod terminal;
pub mod widget;

#[cfg(test)]
mod testing;

use background::menus::MenuRegistry;
use background::Coordinator;
use cli::{ Args, Command };
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    match args.command.clone() {
        None | Some(Command::Serve) => serve(args).await,
        Some(command) => cli::commands::execute(&args, command).await,
    }
}

async fn serve(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Data Directory: {}", args.data_dir.display());
    info!("Server Address: {}", args.server_addr);
    match args.http_port {
        Some(port) => info!("HTTP API Port: {}", port),
        None => info!("HTTP API: disabled"),
    }
    info!("-------------------------");

    let backend = config::initialize_store(&args.data_dir).await?;
    let client = llm::chat::new_client()?;
    let menus = Arc::new(MenuRegistry::new());
    let coordinator = Coordinator::start(backend, client, menus.clone()).await?;

    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, args.http_port, coordinator, menus);
    server.run().await?;

    Ok(())
}
