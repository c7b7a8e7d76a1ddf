//! WebTransport endpoint.
//!
//! Accepts connections, runs one read loop per client, and forwards decoded
//! messages to the session task. Each connection owns a writer task that
//! drains its outbound frame queue onto the stream, so the session never
//! waits on a socket.

use std::net::SocketAddr;

use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::net::framing::{self, FramingError};
use crate::net::protocol::{decode, ClientMessage};
use crate::net::session::{self, Command, SessionHandle};
use crate::net::tls::TlsConfig;

/// WebTransport server
pub struct WebTransportServer {
    config: ServerConfig,
    tls_config: TlsConfig,
    session: SessionHandle,
}

impl WebTransportServer {
    /// Create a new WebTransport server bound to the given session
    pub async fn new(config: ServerConfig, session: SessionHandle) -> anyhow::Result<Self> {
        let tls_config = TlsConfig::load(&config).await?;
        Ok(Self {
            config,
            tls_config,
            session,
        })
    }

    /// Get the certificate hash for client configuration
    pub fn cert_hash(&self) -> &str {
        self.tls_config.get_cert_hash()
    }

    /// Get the bind address
    #[allow(dead_code)]
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.config.bind_address, self.config.port)
    }

    /// Run the accept loop
    pub async fn run(self) -> anyhow::Result<()> {
        use wtransport::Endpoint;
        use wtransport::ServerConfig;

        // with_bind_default gives dual-stack (IPv4 + IPv6) support, so both
        // localhost and LAN clients can connect.
        let server_config = ServerConfig::builder()
            .with_bind_default(self.config.port)
            .with_identity(self.tls_config.identity)
            .build();

        let server = Endpoint::server(server_config)?;

        info!(
            "WebTransport server listening on port {}",
            self.config.port
        );
        info!("Certificate hash: {}", self.tls_config.cert_hash);

        loop {
            let incoming = server.accept().await;
            let session = self.session.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(incoming, session).await {
                    warn!("Connection error: {}", e);
                }
            });
        }
    }
}

/// Handle a single WebTransport connection for its whole lifetime
async fn handle_connection(
    incoming: wtransport::endpoint::IncomingSession,
    session: SessionHandle,
) -> anyhow::Result<()> {
    let session_request = incoming.await?;

    debug!(
        "New connection from: {:?}, path: {}",
        session_request.authority(),
        session_request.path()
    );

    let connection = session_request.accept().await?;
    let (mut send, mut recv) = connection.accept_bi().await?;

    let player_id = uuid::Uuid::new_v4();
    let (outbound_tx, mut outbound_rx) = session::outbound_channel();
    session.send(Command::Connect {
        id: player_id,
        outbound: outbound_tx,
    });
    debug!(player = %player_id, "Connection accepted");

    // Writer task: drains this client's frame queue onto the stream.
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if let Err(e) = framing::write_message(&mut send, frame.as_slice()).await {
                debug!("Stream write error: {}", e);
                break;
            }
        }
    });

    loop {
        let data = match framing::read_message(&mut recv).await {
            Ok(data) => data,
            Err(FramingError::ConnectionClosed) => break,
            Err(e) => {
                debug!(player = %player_id, "Stream read error: {}", e);
                break;
            }
        };

        let message: ClientMessage = match decode(&data) {
            Ok(message) => message,
            Err(e) => {
                // Undecodable frames are dropped; the connection survives.
                warn!(player = %player_id, "Failed to decode client message: {}", e);
                continue;
            }
        };

        session.send(Command::Message {
            id: player_id,
            message,
        });
    }

    session.send(Command::Disconnect { id: player_id });
    writer.abort();

    debug!(player = %player_id, "Connection closed");
    Ok(())
}
