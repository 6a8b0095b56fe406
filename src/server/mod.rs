pub mod api;
pub mod error;

use crate::cli::Args;
use std::error::Error;
use std::net::SocketAddr;
use log::{ error, info };

use self::api::AppState;

pub struct Server {
    addr: String,
    state: AppState,
    args: Args,
}

impl Server {
    pub fn new(addr: String, state: AppState, args: Args) -> Self {
        Self { addr, state, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let app = api::router(self.state.clone(), self.args.max_upload_bytes());

        if self.args.enable_tls {
            let (cert_path, key_path) = match (&self.args.tls_cert_path, &self.args.tls_key_path) {
                (Some(cert), Some(key)) => (cert, key),
                (Some(_), None) | (None, Some(_)) => {
                    error!(
                        "Both --tls-cert-path and --tls-key-path must be provided to enable TLS."
                    );
                    return Err("Missing TLS certificate or key path".into());
                }
                (None, None) => {
                    error!("--enable-tls was set but no certificate/key paths provided.");
                    return Err("TLS enabled without cert/key".into());
                }
            };

            // rustls needs one process-wide crypto provider when several backends are compiled in.
            let _ = rustls::crypto::ring::default_provider().install_default();

            info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
            let tls_config = axum_server::tls_rustls::RustlsConfig
                ::from_pem_file(cert_path, key_path).await
                .map_err(|e| format!("Failed to load TLS certificate/key: {}", e))?;

            let addr: SocketAddr = self.addr
                .parse()
                .map_err(|e| format!("Invalid server address '{}': {}", self.addr, e))?;
            info!("HTTPS server listening on: https://{}", addr);
            axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
        } else {
            let listener = tokio::net::TcpListener
                ::bind(&self.addr).await
                .map_err(|e|
                    format!("Failed to bind HTTP server to {}: {}. Try a different port.", self.addr, e)
                )?;
            info!("HTTP server listening on: http://{}", listener.local_addr()?);
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown_signal()).await?;
        }

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}
