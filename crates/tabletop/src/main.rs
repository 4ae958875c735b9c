//! `tabletop-server`: hosts the bundled games over WebSocket.

use clap::Parser;
use tabletop::{TabletopError, TabletopServer, logging};
use tabletop_games::{Checkers, Hanoi, SnakesAndLadders};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Default log level; `RUST_LOG` takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), TabletopError> {
    let args = Args::parse();
    logging::init(&args.log_level);

    let server = TabletopServer::builder()
        .bind(&format!("{}:{}", args.host, args.port))
        .register::<Checkers>()
        .register::<Hanoi>()
        .register::<SnakesAndLadders>()
        .build()
        .await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}
