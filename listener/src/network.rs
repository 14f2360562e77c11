//! UDP log ingestion and session lifecycle.

use crate::dispatch::EventHandler;
use crate::error::ListenerError;
use crate::packet;
use crate::registry::{Session, SessionRegistry};
use crate::secret::Secret;
use events::LineClassifier;
use log::{debug, error, info, warn};
use rcon::{Dialer, RconConnection, RconError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// Source engine log lines are capped well below this.
const MAX_DATAGRAM_SIZE: usize = 4096;

/// How long [`Listener::verify_delivery`] waits for the first datagram.
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Local UDP address to receive logs on
    pub bind_addr: String,
    /// `ip:port` servers are told to send logs to. Defaults to the bound address.
    pub redirect_addr: Option<String>,
    /// Log every received datagram at info level
    pub echo_logs: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8002".to_string(),
            redirect_addr: None,
            echo_logs: false,
        }
    }
}

/// Receives log datagrams from any number of servers and dispatches each to
/// the session its secret names.
///
/// Dropping the listener stops the receive loop.
pub struct Listener {
    local_addr: SocketAddr,
    redirect_addr: String,
    sessions: Arc<RwLock<SessionRegistry>>,
    receiver: JoinHandle<()>,
}

impl Listener {
    pub async fn bind(config: ListenerConfig) -> Result<Self, ListenerError> {
        let socket = UdpSocket::bind(&config.bind_addr).await?;
        let local_addr = socket.local_addr()?;
        info!("Log listener bound to {}", local_addr);

        let redirect_addr = match config.redirect_addr {
            Some(addr) => addr,
            None => {
                if local_addr.ip().is_unspecified() {
                    warn!(
                        "Listening on {} without a redirect address, servers cannot reach it",
                        local_addr
                    );
                }
                local_addr.to_string()
            }
        };

        let sessions = Arc::new(RwLock::new(SessionRegistry::new()));
        let receiver = Self::spawn_receiver(socket, Arc::clone(&sessions), config.echo_logs);

        Ok(Self {
            local_addr,
            redirect_addr,
            sessions,
            receiver,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address passed to `logaddress_add`.
    pub fn redirect_addr(&self) -> &str {
        &self.redirect_addr
    }

    fn spawn_receiver(
        socket: UdpSocket,
        sessions: Arc<RwLock<SessionRegistry>>,
        echo_logs: bool,
    ) -> JoinHandle<()> {
        let classifier = Arc::new(LineClassifier::new());

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        let result = Self::route_datagram(
                            &buffer[..len],
                            addr,
                            &sessions,
                            &classifier,
                            echo_logs,
                        )
                        .await;

                        match result {
                            Ok(()) => {}
                            Err(ListenerError::UnknownSecret(secret)) => {
                                debug!("Dropping datagram from {} with unknown secret {}", addr, secret);
                            }
                            Err(e) => warn!("Dropping datagram from {}: {}", addr, e),
                        }
                    }
                    Err(e) => {
                        error!("Error receiving datagram: {}", e);
                        sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        })
    }

    /// Frames a datagram, resolves its session and hands it to a dispatch task.
    async fn route_datagram(
        datagram: &[u8],
        addr: SocketAddr,
        sessions: &RwLock<SessionRegistry>,
        classifier: &Arc<LineClassifier>,
        echo_logs: bool,
    ) -> Result<(), ListenerError> {
        let packet = packet::parse(datagram)?;

        if echo_logs {
            info!(
                "{} [{}] {}",
                addr,
                packet.secret,
                packet.payload.trim_end_matches(|c: char| c.is_whitespace() || c == '\0')
            );
        }

        let session = sessions
            .read()
            .await
            .lookup(packet.secret)
            .ok_or_else(|| ListenerError::UnknownSecret(packet.secret.to_string()))?;

        let payload = packet.payload.into_owned();
        let classifier = Arc::clone(classifier);
        tokio::spawn(async move {
            if !session.deliver(&classifier, &payload).await {
                debug!("Session {} closed before delivery", session.secret());
            }
        });

        Ok(())
    }

    /// Previews a free secret. [`register`](Self::register) allocates its own
    /// under the write lock, so the value returned here is not reserved.
    pub async fn allocate_secret(&self) -> Secret {
        self.sessions.read().await.allocate()
    }

    pub async fn lookup(&self, secret: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.lookup(secret)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Creates a session with a fresh secret and points the server's log
    /// stream at this listener.
    ///
    /// On [`ListenerError::Setup`] the session stays registered and must be
    /// passed to [`remove`](Self::remove).
    pub async fn register<D: Dialer>(
        &self,
        handler: Arc<dyn EventHandler>,
        conn: &mut RconConnection<D>,
    ) -> Result<Arc<Session>, ListenerError> {
        let session = {
            let mut sessions = self.sessions.write().await;
            let session = Arc::new(Session::new(sessions.allocate(), conn.address(), handler));
            sessions.insert(Arc::clone(&session))?;
            session
        };

        self.start_redirection(session, conn).await
    }

    /// Like [`register`](Self::register), with a caller-chosen secret.
    pub async fn register_with_secret<D: Dialer>(
        &self,
        secret: &str,
        handler: Arc<dyn EventHandler>,
        conn: &mut RconConnection<D>,
    ) -> Result<Arc<Session>, ListenerError> {
        let secret: Secret = secret.parse()?;
        let session = Arc::new(Session::new(secret, conn.address(), handler));
        self.sessions.write().await.insert(Arc::clone(&session))?;

        self.start_redirection(session, conn).await
    }

    async fn start_redirection<D: Dialer>(
        &self,
        session: Arc<Session>,
        conn: &mut RconConnection<D>,
    ) -> Result<Arc<Session>, ListenerError> {
        info!("Registered session {} for {}", session.secret(), session.server());

        match Self::redirect(conn, session.secret(), &self.redirect_addr).await {
            Ok(()) => Ok(session),
            Err(source) => Err(ListenerError::Setup { session, source }),
        }
    }

    async fn redirect<D: Dialer>(
        conn: &mut RconConnection<D>,
        secret: &Secret,
        redirect_addr: &str,
    ) -> Result<(), RconError> {
        conn.set_log_secret(secret.as_str()).await?;
        conn.redirect_logs(redirect_addr).await
    }

    /// Stops delivery to `session` and asks the server to stop sending logs.
    ///
    /// Once this returns no handler call for the session is running or will
    /// start. The `logaddress_del` is best-effort.
    pub async fn remove<D: Dialer>(&self, session: &Session, conn: &mut RconConnection<D>) {
        session.close().await;

        if self.sessions.write().await.remove(session) {
            info!("Removed session {} for {}", session.secret(), session.server());
        }

        conn.stop_log_redirection(&self.redirect_addr).await;
    }

    /// Checks that the server's logs reach this listener, waiting up to
    /// [`VERIFY_TIMEOUT`] for the first datagram.
    pub async fn verify_delivery<D: Dialer>(
        &self,
        conn: &mut RconConnection<D>,
    ) -> Result<bool, ListenerError> {
        let (arrived_tx, arrived_rx) = oneshot::channel();

        let session = {
            let mut sessions = self.sessions.write().await;
            let session = Arc::new(Session::verification(
                sessions.allocate(),
                conn.address(),
                arrived_tx,
            ));
            sessions.insert(Arc::clone(&session))?;
            session
        };

        let session = match self.start_redirection(session, conn).await {
            Ok(session) => session,
            Err(ListenerError::Setup { session, source }) => {
                self.remove(&session, conn).await;
                return Err(source.into());
            }
            Err(e) => return Err(e),
        };

        let delivered = matches!(timeout(VERIFY_TIMEOUT, arrived_rx).await, Ok(Ok(())));
        if !delivered {
            warn!(
                "No logs from {} within {:?}",
                session.server(),
                VERIFY_TIMEOUT
            );
        }

        self.remove(&session, conn).await;
        Ok(delivered)
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.receiver.abort();
    }
}
