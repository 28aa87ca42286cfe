use crate::background::menus::MenuRegistry;
use crate::background::Coordinator;
use crate::models::chat::ChatReply;
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::server::page::SocketPage;

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use tokio_tungstenite::{ accept_async, WebSocketStream };
use tokio_tungstenite::tungstenite::protocol::Message;

use futures::{ SinkExt, StreamExt };
use log::{ debug, error, info, warn };

const MAX_MESSAGE_SIZE: usize = 1 * 1024 * 1024;

pub async fn start_ws_server(
    addr: &str,
    coordinator: Arc<Coordinator>,
    menus: Arc<MenuRegistry>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!("WS server listening on: {}", addr);
    serve(listener, coordinator, menus).await
}

/// Accepts page connections on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    coordinator: Arc<Coordinator>,
    menus: Arc<MenuRegistry>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    loop {
        let (stream, peer) = listener.accept().await?;
        info!("Incoming connection from: {}", peer);

        let coordinator = Arc::clone(&coordinator);
        let menus = Arc::clone(&menus);
        tokio::spawn(async move {
            match accept_async(stream).await {
                Ok(ws) => handle_connection(peer, ws, coordinator, menus).await,
                Err(e) => error!("Handshake failed for {}: {}", peer, e),
            }
        });
    }
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    coordinator: Arc<Coordinator>,
    menus: Arc<MenuRegistry>
)
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    info!("New WebSocket connection: {}", peer);

    let (mut tx, mut rx) = websocket.split();
    let (outbox, mut outgoing) = mpsc::unbounded_channel::<ServerMessage>();

    let writer = tokio::spawn(async move {
        while let Some(message) = outgoing.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize message for {}: {}", peer, e);
                    continue;
                }
            };
            if let Err(e) = tx.send(Message::Text(json)).await {
                debug!("Writer for {} stopped: {}", peer, e);
                break;
            }
        }
    });

    let page = Arc::new(SocketPage::new(outbox.clone()));

    let mut menu_updates = menus.subscribe();
    let menu_outbox = outbox.clone();
    let menu_forwarder = tokio::spawn(async move {
        loop {
            let entries = menu_updates.borrow_and_update().clone();
            if menu_outbox.send(ServerMessage::Menus { entries }).is_err() {
                break;
            }
            if menu_updates.changed().await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = rx.next().await {
        let message = match msg {
            Ok(message) => message,
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        };

        if message.len() > MAX_MESSAGE_SIZE {
            warn!(
                "Message from {} exceeds size limit ({} > {})",
                peer,
                message.len(),
                MAX_MESSAGE_SIZE
            );
            let _ = outbox.send(ServerMessage::Error { message: "Message too large".to_string() });
            break;
        }

        match message {
            Message::Text(text) => {
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_message) => {
                        dispatch(peer, client_message, &coordinator, &page).await;
                    }
                    Err(e) => {
                        error!("Failed to parse message from {}: {}", peer, e);
                        let _ = outbox.send(ServerMessage::Error {
                            message: format!("Failed to parse message: {}", e),
                        });
                    }
                }
            }
            Message::Close(_) => {
                info!("Received close frame from {}", peer);
                break;
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            Message::Binary(_) => {
                warn!("Ignoring binary message from {}", peer);
            }
        }
    }

    menu_forwarder.abort();
    page.abandon_prompts().await;
    // The writer drains whatever in-flight actions still send, then stops
    // once the last sender is gone.
    drop(writer);
    info!("WebSocket connection closed for {}", peer);
}

/// Runs one page action. Anything that may wait on the network or on the user
/// is spawned so the reader keeps serving `promptAnswer` messages.
async fn dispatch(
    peer: SocketAddr,
    message: ClientMessage,
    coordinator: &Arc<Coordinator>,
    page: &Arc<SocketPage>
) {
    match message {
        ClientMessage::ReloadConfig => {
            let coordinator = Arc::clone(coordinator);
            let page = Arc::clone(page);
            tokio::spawn(async move {
                let success = match coordinator.reload_config().await {
                    Ok(_) => true,
                    Err(e) => {
                        error!("Error loading configuration: {}", e);
                        false
                    }
                };
                let _ = page.send(ServerMessage::ConfigReloaded { success });
            });
        }
        ClientMessage::Chat { request_id, message, context } => {
            let coordinator = Arc::clone(coordinator);
            let page = Arc::clone(page);
            tokio::spawn(async move {
                let (message, error) = match coordinator.chat(&message, &context).await {
                    ChatReply::Message { message } => (Some(message), None),
                    ChatReply::Error { error } => (None, Some(error)),
                };
                let _ = page.send(ServerMessage::ChatResponse { request_id, message, error });
            });
        }
        ClientMessage::ResetChatContext => {
            let coordinator = Arc::clone(coordinator);
            tokio::spawn(async move {
                if let Err(e) = coordinator.reset_chat_context().await {
                    error!("Error resetting chat history: {}", e);
                }
            });
        }
        ClientMessage::TextSelected { text, url } => {
            debug!("Selection from {} on {}", peer, url);
            coordinator.text_selected(&text, &url).await;
        }
        ClientMessage::MenuClicked { menu_item_id, selection_text } => {
            let coordinator = Arc::clone(coordinator);
            let page = Arc::clone(page);
            tokio::spawn(async move {
                let result = coordinator
                    .handle_menu_click(&menu_item_id, selection_text.as_deref(), page.as_ref())
                    .await;
                if let Err(e) = result {
                    error!("Menu action {} for {} failed: {}", menu_item_id, peer, e);
                }
            });
        }
        ClientMessage::PromptAnswer { request_id, text } => {
            page.resolve_prompt(&request_id, text).await;
        }
    }
}
