//! oscardd: the oscard server daemon.
//!
//! Single OS process running a Tokio async runtime with three TCP
//! listeners: AUTH (sign-on), BOS (the main service connection), and CHAT
//! (per-room connections).

use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use oscard_daemon::connection::{run_bos_connection, run_chat_connection, ConnOptions};
use oscard_daemon::{AuthService, ServerConfig};
use oscard_service::{BosRouter, ServerContext};
use oscard_state::{ChatRegistry, SessionConfig, SessionManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = ServerConfig::load()?;

    // 2. Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("oscard={}", config.log_level).parse()?),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "oscard starting");

    // 3. Open the store
    let conn = oscard_store::open(Path::new(&config.db_path))?;
    let db = Arc::new(tokio::sync::Mutex::new(conn));

    // 4. Build the shared state
    let session_config = SessionConfig::default();
    let ctx = Arc::new(ServerContext {
        sessions: Arc::new(SessionManager::new(session_config.clone())),
        chat_rooms: Arc::new(ChatRegistry::new(session_config)),
        db,
        host: config.oscar_host.clone(),
        bos_port: config.bos_port,
        chat_port: config.chat_port,
    });
    let router = Arc::new(BosRouter::new(ctx.clone()));
    let auth = Arc::new(AuthService::new(ctx.clone(), config.disable_auth));
    let options = ConnOptions {
        fail_fast: config.fail_fast,
    };

    // 5. Bind the listeners; bind failures are fatal at startup.
    let auth_listener =
        TcpListener::bind((config.oscar_host.as_str(), config.auth_port)).await?;
    let bos_listener = TcpListener::bind((config.oscar_host.as_str(), config.bos_port)).await?;
    let chat_listener =
        TcpListener::bind((config.oscar_host.as_str(), config.chat_port)).await?;
    info!(
        auth = config.auth_port,
        bos = config.bos_port,
        chat = config.chat_port,
        "listening"
    );

    // 6. Accept loops
    let auth_loop = {
        let auth = auth.clone();
        tokio::spawn(async move {
            loop {
                match auth_listener.accept().await {
                    Ok((stream, addr)) => {
                        let auth = auth.clone();
                        tokio::spawn(async move {
                            if let Err(e) = auth.handle_connection(stream).await {
                                warn!(%addr, error = %e, "auth connection error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "auth accept error"),
                }
            }
        })
    };

    let bos_loop = {
        let ctx = ctx.clone();
        let router = router.clone();
        tokio::spawn(async move {
            loop {
                match bos_listener.accept().await {
                    Ok((stream, addr)) => {
                        let ctx = ctx.clone();
                        let router = router.clone();
                        tokio::spawn(async move {
                            if let Err(e) =
                                run_bos_connection(stream, ctx, router, options).await
                            {
                                warn!(%addr, error = %e, "BOS connection error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "BOS accept error"),
                }
            }
        })
    };

    let chat_loop = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            loop {
                match chat_listener.accept().await {
                    Ok((stream, addr)) => {
                        let ctx = ctx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = run_chat_connection(stream, ctx, options).await {
                                warn!(%addr, error = %e, "chat connection error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "chat accept error"),
                }
            }
        })
    };

    // 7. Run until interrupted.
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
        result = auth_loop => {
            error!(?result, "auth listener exited");
        }
        result = bos_loop => {
            error!(?result, "BOS listener exited");
        }
        result = chat_loop => {
            error!(?result, "chat listener exited");
        }
    }

    info!("oscard stopped");
    Ok(())
}
