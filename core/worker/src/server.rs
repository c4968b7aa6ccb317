//! Tool server lifecycle: bind, serve, publish.

use std::net::SocketAddr;
use std::sync::Arc;

use distbuild_config::CoordinatorSettings;
use distbuild_coordinator::CoordinatorClient;
use distbuild_error::ErrorExt;
use distbuild_error::Location;
use distbuild_error::StatusCode;
use distbuild_transport::TransportSettings;
use distbuild_transport::serve;
use snafu::ResultExt;
use snafu::Snafu;
use tokio::net::TcpListener;
use tracing::info;

use crate::service::WorkerService;

/// Errors starting a tool server.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module)]
pub enum WorkerError {
    #[snafu(display("failed to bind {addr}: {source}"))]
    Bind {
        addr: String,
        source: std::io::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

impl ErrorExt for WorkerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Bind { .. } => StatusCode::InvalidConfig,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// A running tool server: the serve loop plus the coordinator publisher.
pub struct ToolServer {
    service: Arc<WorkerService>,
    local_addr: SocketAddr,
    coordinator: Option<CoordinatorClient>,
}

impl ToolServer {
    /// Bind the listen socket, spawn the serve loop and, when configured,
    /// begin publishing status to the coordinators.
    pub async fn start(
        service: Arc<WorkerService>,
        listen_host: &str,
        listen_port: u16,
        coordinator_settings: CoordinatorSettings,
        transport: TransportSettings,
    ) -> Result<Self, WorkerError> {
        let host = if listen_host.is_empty() {
            "0.0.0.0"
        } else {
            listen_host
        };
        let addr = format!("{host}:{listen_port}");
        let listener = TcpListener::bind(&addr)
            .await
            .context(worker_error::BindSnafu { addr: addr.clone() })?;
        let local_addr = listener
            .local_addr()
            .context(worker_error::BindSnafu { addr })?;
        info!(%local_addr, tools = ?service.status().tool_ids, "tool server listening");

        tokio::spawn(serve(listener, transport.clone(), Arc::clone(&service)));

        let coordinator = if coordinator_settings.enabled {
            let client = CoordinatorClient::new(coordinator_settings, transport);
            let status_service = Arc::clone(&service);
            client.set_status_source(Box::new(move || status_service.status()));
            client.start();
            Some(client)
        } else {
            None
        };

        Ok(Self {
            service,
            local_addr,
            coordinator,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn service(&self) -> &Arc<WorkerService> {
        &self.service
    }

    pub fn stop(&self) {
        if let Some(coordinator) = &self.coordinator {
            coordinator.stop();
        }
    }
}
