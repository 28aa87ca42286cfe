use crate::background::Coordinator;
use crate::options::OptionsPage;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    extract::State,
    response::{ IntoResponse, Response },
    http::{ header, StatusCode },
};
use serde::Serialize;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Serialize)]
struct ActionResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

impl ActionResponse {
    fn failed(status: StatusCode, message: String) -> Response {
        (status, axum::Json(ActionResponse { success: false, message, details: None })).into_response()
    }
}

#[derive(Clone)]
struct AppState {
    coordinator: Arc<Coordinator>,
}

pub fn router(coordinator: Arc<Coordinator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/settings/export", get(export_handler))
        .route("/api/settings/import", post(import_handler))
        .route("/api/connection", get(connection_handler))
        .route("/api/reload", post(reload_handler))
        .layer(cors)
        .with_state(AppState { coordinator })
}

pub async fn start_http_server(
    http_port: u16,
    coordinator: Arc<Coordinator>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("127.0.0.1:{}", http_port).parse::<SocketAddr>()?;
    info!("Starting HTTP API server on: http://{}", addr);

    let app = router(coordinator);

    tokio::spawn(async move {
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => {
                if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                    error!("HTTP server error: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
            }
        }
    });

    info!("HTTP server started");
    Ok(())
}

async fn options_page(state: &AppState) -> Result<OptionsPage, Response> {
    OptionsPage::load(
        state.coordinator.settings_store().clone(),
        Arc::clone(state.coordinator.client())
    ).await.map_err(|e| {
        error!("Error loading settings: {}", e);
        ActionResponse::failed(StatusCode::INTERNAL_SERVER_ERROR, format!("Error loading settings: {}", e))
    })
}

async fn export_handler(State(state): State<AppState>) -> Response {
    let page = match options_page(&state).await {
        Ok(page) => page,
        Err(response) => return response,
    };
    match page.export_settings().await {
        Ok(exported) => {
            let disposition = format!("attachment; filename=\"{}\"", exported.file_name);
            (
                [
                    (header::CONTENT_TYPE, "application/json".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                exported.contents,
            ).into_response()
        }
        Err(e) => {
            error!("Export failed: {}", e);
            ActionResponse::failed(StatusCode::INTERNAL_SERVER_ERROR, format!("Error exporting settings: {}", e))
        }
    }
}

async fn import_handler(State(state): State<AppState>, body: String) -> Response {
    let mut page = match options_page(&state).await {
        Ok(page) => page,
        Err(response) => return response,
    };
    if let Err(e) = page.import_settings(&body).await {
        error!("Error importing settings: {}", e);
        return ActionResponse::failed(StatusCode::BAD_REQUEST, format!("Error importing settings: {}", e));
    }
    if let Err(e) = state.coordinator.reload_config().await {
        error!("Error loading configuration: {}", e);
    }
    let prompts = page.prompts().len();
    (StatusCode::OK, axum::Json(ActionResponse {
        success: true,
        message: "Import successful".into(),
        details: Some(vec![format!("{} prompts", prompts)]),
    })).into_response()
}

async fn connection_handler(State(state): State<AppState>) -> Response {
    let mut page = match options_page(&state).await {
        Ok(page) => page,
        Err(response) => return response,
    };
    let status = page.test_connection().await;
    let code = if status.success { StatusCode::OK } else { StatusCode::BAD_GATEWAY };
    (code, axum::Json(status)).into_response()
}

async fn reload_handler(State(state): State<AppState>) -> Response {
    match state.coordinator.reload_config().await {
        Ok(settings) => {
            (StatusCode::OK, axum::Json(ActionResponse {
                success: true,
                message: "Reload complete".into(),
                details: Some(
                    settings.custom_prompts.iter().map(|p| p.name.clone()).collect()
                ),
            })).into_response()
        }
        Err(e) => {
            error!("Error loading configuration: {}", e);
            ActionResponse::failed(StatusCode::INTERNAL_SERVER_ERROR, format!("Reload errors: {}", e))
        }
    }
}
