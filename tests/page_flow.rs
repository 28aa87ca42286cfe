use futures::{ SinkExt, StreamExt };
use gpt_helper::background::menus::MenuRegistry;
use gpt_helper::background::Coordinator;
use gpt_helper::config::settings::SettingsStore;
use gpt_helper::config::store::{ KeyValueStore, MemoryStore };
use gpt_helper::llm::chat::new_client;
use gpt_helper::models::settings::{ Prompt, Settings };
use gpt_helper::models::websocket::ServerMessage;
use gpt_helper::server::{ api, websocket };
use serde_json::{ json, Value };
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{ TcpListener, TcpStream };
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{ connect_async, MaybeTlsStream, WebSocketStream };
use wiremock::matchers::{ body_partial_json, header, method, path };
use wiremock::{ Mock, MockServer, ResponseTemplate };

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    }))
}

async fn start(api_server: &MockServer) -> (Arc<Coordinator>, Arc<MenuRegistry>, Arc<dyn KeyValueStore>) {
    let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    SettingsStore::new(backend.clone())
        .replace(Settings {
            api_key: "sk-test".into(),
            api_endpoint: api_server.uri(),
            selected_model: "gpt-4o-mini".into(),
            available_models: vec![],
            custom_prompts: vec![Prompt {
                id: 1,
                name: "French".into(),
                prompt: "Translate to French".into(),
            }],
        })
        .await
        .unwrap();

    let menus = Arc::new(MenuRegistry::new());
    let coordinator = Coordinator::start(backend.clone(), new_client().unwrap(), menus.clone())
        .await
        .unwrap();
    (coordinator, menus, backend)
}

async fn connect(coordinator: Arc<Coordinator>, menus: Arc<MenuRegistry>) -> Socket {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(websocket::serve(listener, coordinator, menus));
    let (socket, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    socket
}

async fn send(socket: &mut Socket, value: Value) {
    socket.send(Message::Text(value.to_string())).await.unwrap();
}

/// Next message from the server, skipping menu pushes unless asked for.
async fn next(socket: &mut Socket, want_menus: bool) -> ServerMessage {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let frame = socket.next().await.expect("socket closed").unwrap();
            if let Message::Text(text) = frame {
                let message: ServerMessage = serde_json::from_str(&text).unwrap();
                if want_menus || !matches!(message, ServerMessage::Menus { .. }) {
                    return message;
                }
            }
        }
    }).await.expect("timed out waiting for server message")
}

#[tokio::test]
async fn menu_click_translates_and_follow_up_chat_works() {
    let api_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [
                { "role": "system" },
                { "role": "user", "content": "Translate to French\n\nText: Hello world" }
            ]
        })))
        .respond_with(completion("Bonjour le monde"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&api_server).await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({ "temperature": 0.7, "max_tokens": 4000 })))
        .respond_with(completion("Salut le monde"))
        .mount(&api_server).await;

    let (coordinator, menus, _) = start(&api_server).await;
    let mut socket = connect(coordinator, menus).await;

    match next(&mut socket, true).await {
        ServerMessage::Menus { entries } => {
            let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
            assert_eq!(ids, vec!["gpt-menu", "prompt-1", "prompt-on-the-fly"]);
        }
        other => panic!("expected menus first, got {:?}", other),
    }

    send(&mut socket, json!({
        "action": "menuClicked",
        "menuItemId": "prompt-1",
        "selectionText": "Hello world"
    })).await;

    assert_eq!(next(&mut socket, false).await, ServerMessage::ShowChatWindow {
        model: "gpt-4o-mini".into(),
        initial_message: "Translate to French\n\nHello world".into(),
        overlay_enabled: true,
    });
    assert_eq!(next(&mut socket, false).await, ServerMessage::AppendChatResponse {
        response_text: "Bonjour le monde".into(),
    });

    send(&mut socket, json!({
        "action": "chat",
        "requestId": "r1",
        "message": "less formal",
        "context": { "originalText": "Translate to French\n\nHello world", "resultText": "Bonjour le monde" }
    })).await;

    assert_eq!(next(&mut socket, false).await, ServerMessage::ChatResponse {
        request_id: Some("r1".into()),
        message: Some("Salut le monde".into()),
        error: None,
    });
}

#[tokio::test]
async fn ad_hoc_prompt_round_trips_through_the_page() {
    let api_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [{ "role": "system" }, { "content": "Make it rhyme\n\nText: roses are red" }]
        })))
        .respond_with(completion("violets are blue"))
        .expect(1)
        .mount(&api_server).await;

    let (coordinator, menus, _) = start(&api_server).await;
    let mut socket = connect(coordinator, menus).await;

    send(&mut socket, json!({ "action": "text_selected", "text": "roses are red", "url": "https://a.test" })).await;
    send(&mut socket, json!({ "action": "menuClicked", "menuItemId": "prompt-on-the-fly" })).await;

    let request_id = match next(&mut socket, false).await {
        ServerMessage::Prompt { request_id, message } => {
            assert_eq!(message, "Enter your custom prompt");
            request_id
        }
        other => panic!("expected a prompt, got {:?}", other),
    };
    send(&mut socket, json!({ "action": "promptAnswer", "requestId": request_id, "text": "Make it rhyme" })).await;

    assert!(matches!(next(&mut socket, false).await, ServerMessage::ShowChatWindow { .. }));
    assert_eq!(next(&mut socket, false).await, ServerMessage::AppendChatResponse {
        response_text: "violets are blue".into(),
    });
}

#[tokio::test]
async fn unconfigured_settings_alert_without_api_call() {
    let api_server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(completion("nope")).expect(0).mount(&api_server).await;

    let (coordinator, menus, backend) = start(&api_server).await;
    SettingsStore::new(backend).replace(Settings::default()).await.unwrap();
    let mut socket = connect(coordinator, menus).await;

    send(&mut socket, json!({ "action": "menuClicked", "menuItemId": "prompt-on-the-fly", "selectionText": "x" })).await;
    let request_id = match next(&mut socket, false).await {
        ServerMessage::Prompt { request_id, .. } => request_id,
        other => panic!("expected a prompt, got {:?}", other),
    };
    send(&mut socket, json!({ "action": "promptAnswer", "requestId": request_id, "text": "Explain" })).await;

    assert_eq!(next(&mut socket, false).await, ServerMessage::Alert {
        message: "Please configure API settings in the extension options".into(),
    });
}

#[tokio::test]
async fn malformed_page_message_gets_an_error_reply() {
    let api_server = MockServer::start().await;
    let (coordinator, menus, _) = start(&api_server).await;
    let mut socket = connect(coordinator, menus).await;

    send(&mut socket, json!({ "action": "launchRockets" })).await;

    assert!(matches!(next(&mut socket, false).await, ServerMessage::Error { .. }));
}

#[tokio::test]
async fn http_api_exports_imports_and_tests_connection() {
    let api_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [{ "id": "gpt-4o" }] })))
        .mount(&api_server).await;

    let (coordinator, _, _) = start(&api_server).await;
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = api::router(coordinator.clone());
    tokio::spawn(async move { axum::serve(listener, app.into_make_service()).await });
    let http = reqwest::Client::new();
    let base = format!("http://{}", addr);

    let exported = http.get(format!("{}/api/settings/export", base)).send().await.unwrap();
    assert!(exported.status().is_success());
    let disposition = exported.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.contains("gpt_helper_settings_"));
    let body: Value = exported.json().await.unwrap();
    assert_eq!(body["customPrompts"][0]["name"], "French");

    let imported = http
        .post(format!("{}/api/settings/import", base))
        .body(json!({
            "apiEndpoint": api_server.uri(),
            "apiKey": "sk-other",
            "selectedModel": "gpt-4o",
            "availableModels": ["gpt-4o"],
            "prompts": [{ "id": 9, "name": "Fix", "prompt": "Fix grammar" }]
        }).to_string())
        .send().await.unwrap();
    assert!(imported.status().is_success());
    let settings = coordinator.context().settings().await;
    assert_eq!(settings.api_key, "sk-other");
    assert_eq!(settings.custom_prompts[0].id, 9);

    let rejected = http.post(format!("{}/api/settings/import", base)).body("[]").send().await.unwrap();
    assert_eq!(rejected.status().as_u16(), 400);

    let connection: Value = http
        .get(format!("{}/api/connection", base))
        .send().await.unwrap()
        .json().await.unwrap();
    assert_eq!(connection, json!({ "success": true, "message": "Connection successful" }));

    let reload: Value = http
        .post(format!("{}/api/reload", base))
        .send().await.unwrap()
        .json().await.unwrap();
    assert_eq!(reload["success"], true);
    assert_eq!(reload["details"], json!(["Fix"]));
}
