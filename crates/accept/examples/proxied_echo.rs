//! Minimal echo server behind a PROXY-protocol-aware listener.
//!
//! Run it, then exercise both paths:
//!
//! ```text
//! printf 'PROXY TCP4 203.0.113.7 203.0.113.1 51234 443\r\nhello\n' | nc 127.0.0.1 8080
//! printf 'hello\n' | nc 127.0.0.1 8080
//! ```

use proxy_accept::config::ProxyProtocolConfig;
use proxy_accept::listener::ProxyListener;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = ProxyProtocolConfig { enabled: true, ..ProxyProtocolConfig::default() };

    let listener = match ProxyListener::bind("127.0.0.1:8080", &config).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(cause = %e, "bind failed");
            return;
        }
    };

    loop {
        let (mut conn, socket_peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(cause = %e, "accept failed");
                continue;
            }
        };

        tokio::spawn(async move {
            let client = match conn.peer_addr().await {
                Ok(client) => client,
                Err(e) => {
                    error!(%socket_peer, cause = %e, "dropping connection");
                    return;
                }
            };
            info!(%client, %socket_peer, "client connected");

            let mut buf = vec![0u8; 4096];
            loop {
                match conn.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Err(e) = conn.write_all(&buf[..n]).await {
                            error!(%client, cause = %e, "write failed");
                            break;
                        }
                    }
                    Err(e) => {
                        error!(%client, cause = %e, "read failed");
                        break;
                    }
                }
            }
            info!(%client, "connection closed");
        });
    }
}
