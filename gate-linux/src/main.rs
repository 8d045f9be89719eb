// NFC Gate Linux: relay server client with an optional PC/SC reader.

mod config;
mod host;
mod transport;

#[cfg(any(feature = "pcsc", test))]
mod atr;
#[cfg(feature = "pcsc")]
mod reader;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use gate_core::GateCore;
use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const LEAVE_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, Parser)]
#[command(name = "gate-linux", version, about = "NFC relay gate daemon")]
struct Args {
    /// Ask the server for a new session once connected.
    #[arg(long, conflicts_with = "join")]
    create: bool,
    /// Join the session with this secret once connected.
    #[arg(long, value_name = "SECRET")]
    join: Option<String>,
    /// Relay server, overriding the config file.
    #[arg(long, value_name = "HOST:PORT")]
    server: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut cfg = config::load();
    if let Some(server) = &args.server {
        let (host, port) = config::parse_server(server)
            .with_context(|| format!("invalid --server {:?}, expected HOST:PORT", server))?;
        cfg.server_host = host;
        cfg.server_port = port;
    }

    let (transport, outbound) = transport::channel();
    let core = Arc::new(Mutex::new(GateCore::new(
        cfg.core_config(),
        Box::new(transport),
        Box::new(host::LogHost),
        Box::new(host::LoggedProfile::default()),
    )));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let stream = transport::connect(&cfg.server_host, cfg.server_port)
            .await
            .with_context(|| format!("connecting to {}:{}", cfg.server_host, cfg.server_port))?;
        {
            let mut c = core.lock().await;
            if args.create {
                c.request_create()?;
            } else if let Some(secret) = args.join {
                c.request_join(secret)?;
            }
        }

        let (read_half, write_half) = stream.into_split();
        let conn = tokio::spawn(transport::run_connection(
            read_half,
            write_half,
            core.clone(),
            outbound,
        ));
        tokio::spawn(transport::run_ticks(core.clone()));
        #[cfg(feature = "pcsc")]
        {
            let core_reader = core.clone();
            tokio::spawn(async move {
                if let Err(e) = reader::run_reader_watch(core_reader).await {
                    error!("pcsc unavailable: {}", e);
                }
            });
        }

        tokio::select! {
            res = conn => match res {
                Ok(Ok(())) => info!("relay connection closed"),
                Ok(Err(e)) => error!("relay connection failed: {}", e),
                Err(e) => error!("connection task: {}", e),
            },
            res = shutdown_signal() => {
                res?;
                info!("shutting down");
                let mut c = core.lock().await;
                if c.session().is_active() && c.request_leave().is_ok() {
                    drop(c);
                    tokio::time::sleep(LEAVE_GRACE).await;
                }
            }
        }
        Ok::<(), anyhow::Error>(())
    })
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_join_conflict() {
        assert!(Args::try_parse_from(["gate-linux", "--create", "--join", "abc"]).is_err());
        let args = Args::try_parse_from(["gate-linux", "--join", "abc"]).unwrap();
        assert_eq!(args.join.as_deref(), Some("abc"));
        assert!(!args.create);
    }
}
