pub mod api;
pub mod page;
pub mod websocket;

use crate::background::menus::MenuRegistry;
use crate::background::Coordinator;
use std::error::Error;
use std::sync::Arc;

pub struct Server {
    addr: String,
    http_port: Option<u16>,
    coordinator: Arc<Coordinator>,
    menus: Arc<MenuRegistry>,
}

impl Server {
    pub fn new(
        addr: String,
        http_port: Option<u16>,
        coordinator: Arc<Coordinator>,
        menus: Arc<MenuRegistry>
    ) -> Self {
        Self {
            addr,
            http_port,
            coordinator,
            menus,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let _watcher = self.coordinator.spawn_settings_watcher();

        if let Some(http_port) = self.http_port {
            api::start_http_server(http_port, self.coordinator.clone()).await?;
        }

        websocket::start_ws_server(
            &self.addr,
            self.coordinator.clone(),
            self.menus.clone(),
        ).await
    }
}
