//! Live log sessions, indexed by secret.
//!
//! A [`Session`] ties one game server's log stream to one consumer. The
//! [`SessionRegistry`] only maps secrets to sessions; the
//! [`Listener`](crate::Listener) wraps it in a `RwLock` so the receive loop
//! can look sessions up while registrations are in flight.

use crate::dispatch::EventHandler;
use crate::error::ListenerError;
use crate::secret::{self, Secret};
use events::LineClassifier;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

/// Log text kept for [`Session::take_logs`]. Past this, the oldest lines are
/// dropped.
pub const MAX_BUFFERED_LOG_BYTES: usize = 1 << 20;

enum Delivery {
    Events(Arc<dyn EventHandler>),
    /// Reports the first datagram and ignores its content
    Verification,
}

struct SessionState {
    live: bool,
    /// One line per delivered payload since the last `take_logs`
    logs: String,
    arrived: Option<oneshot::Sender<()>>,
}

pub struct Session {
    secret: Secret,
    server: String,
    delivery: Delivery,
    /// Set before `close` queues for the lock, so dispatches already waiting
    /// behind a running handler see it
    closing: AtomicBool,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(secret: Secret, server: &str, handler: Arc<dyn EventHandler>) -> Self {
        Self::with_delivery(secret, server, Delivery::Events(handler), None)
    }

    /// A session that only signals `arrived` when its first datagram lands.
    pub(crate) fn verification(secret: Secret, server: &str, arrived: oneshot::Sender<()>) -> Self {
        Self::with_delivery(secret, server, Delivery::Verification, Some(arrived))
    }

    fn with_delivery(
        secret: Secret,
        server: &str,
        delivery: Delivery,
        arrived: Option<oneshot::Sender<()>>,
    ) -> Self {
        Self {
            secret,
            server: server.to_string(),
            delivery,
            closing: AtomicBool::new(false),
            state: Mutex::new(SessionState {
                live: true,
                logs: String::new(),
                arrived,
            }),
        }
    }

    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    /// RCON address of the server feeding this session.
    pub fn server(&self) -> &str {
        &self.server
    }

    pub async fn is_live(&self) -> bool {
        self.state.lock().await.live
    }

    /// Drains the log text received so far, one line per datagram.
    pub async fn take_logs(&self) -> String {
        std::mem::take(&mut self.state.lock().await.logs)
    }

    /// Records and dispatches one log payload. Returns `false` once the
    /// session is closed.
    ///
    /// The session lock is held for the whole handler call, which is what
    /// lets [`close`](Self::close) wait out an in-progress dispatch.
    pub(crate) async fn deliver(&self, classifier: &LineClassifier, payload: &str) -> bool {
        let mut state = self.state.lock().await;
        if !state.live || self.closing.load(Ordering::SeqCst) {
            return false;
        }

        buffer_line(&mut state.logs, payload);

        match &self.delivery {
            Delivery::Events(handler) => handler.handle_line(&classifier.parse_line(payload)),
            Delivery::Verification => {
                if let Some(arrived) = state.arrived.take() {
                    let _ = arrived.send(());
                }
            }
        }

        true
    }

    /// Stops delivery. Once this returns no handler call is running or will start.
    pub(crate) async fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        state.live = false;
        state.arrived = None;
    }
}

fn buffer_line(logs: &mut String, payload: &str) {
    logs.push_str(payload.trim_end_matches(|c: char| matches!(c, '\n' | '\r' | '\0')));
    logs.push('\n');

    if logs.len() > MAX_BUFFERED_LOG_BYTES {
        let excess = logs.len() - MAX_BUFFERED_LOG_BYTES;
        let cut = logs.as_bytes()[excess..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(logs.len(), |i| excess + i + 1);
        logs.drain(..cut);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("secret", &self.secret)
            .field("server", &self.server)
            .field("verification", &matches!(self.delivery, Delivery::Verification))
            .finish()
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<Secret, Arc<Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A secret no current session holds.
    pub fn allocate(&self) -> Secret {
        secret::allocate(|s| self.sessions.contains_key(s))
    }

    pub fn insert(&mut self, session: Arc<Session>) -> Result<(), ListenerError> {
        if self.sessions.contains_key(session.secret()) {
            return Err(ListenerError::SecretInUse(session.secret().to_string()));
        }
        self.sessions.insert(session.secret().clone(), session);
        Ok(())
    }

    pub fn lookup(&self, secret: &str) -> Option<Arc<Session>> {
        self.sessions.get(secret).cloned()
    }

    /// Removes `session` if it is still the one registered under its secret.
    pub fn remove(&mut self, session: &Session) -> bool {
        let registered = self
            .sessions
            .get(session.secret())
            .is_some_and(|entry| std::ptr::eq(Arc::as_ptr(entry), session));

        if registered {
            self.sessions.remove(session.secret());
        }
        registered
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::EventSender;
    use events::Event;

    const GAME_OVER: &str =
        "L 10/29/2015 - 16:50:46: World triggered \"Game_Over\" reason \"Reached Win Limit\"\n";

    fn session(n: u32) -> (Arc<Session>, tokio::sync::mpsc::UnboundedReceiver<Event>) {
        let (sender, rx) = EventSender::channel();
        let session = Session::new(Secret::from(n), "10.0.0.1:27015", Arc::new(sender));
        (Arc::new(session), rx)
    }

    #[tokio::test]
    async fn test_deliver_classifies_and_buffers() {
        let (session, mut rx) = session(7);
        let classifier = LineClassifier::new();

        assert!(session.deliver(&classifier, GAME_OVER).await);

        assert_eq!(
            rx.try_recv().unwrap(),
            Event::GameOver {
                reason: "Reached Win Limit".to_string()
            }
        );
        assert_eq!(session.take_logs().await, GAME_OVER);
        assert!(session.take_logs().await.is_empty());
    }

    #[tokio::test]
    async fn test_closed_session_drops_lines() {
        let (session, mut rx) = session(7);
        let classifier = LineClassifier::new();

        session.close().await;

        assert!(!session.is_live().await);
        assert!(!session.deliver(&classifier, GAME_OVER).await);
        assert!(rx.try_recv().is_err());
        assert!(session.take_logs().await.is_empty());
    }

    #[tokio::test]
    async fn test_buffer_strips_terminators() {
        let (session, _rx) = session(7);
        let classifier = LineClassifier::new();

        let raw = GAME_OVER.replace('\n', "\n\0");
        assert!(session.deliver(&classifier, &raw).await);
        assert!(session.deliver(&classifier, "L 10/29/2015 - 16:50:47: rcon from \"1.2.3.4\"").await);

        let logs = session.take_logs().await;
        assert!(!logs.contains('\0'));
        assert_eq!(
            logs,
            format!("{}L 10/29/2015 - 16:50:47: rcon from \"1.2.3.4\"\n", GAME_OVER)
        );
    }

    #[tokio::test]
    async fn test_buffer_drops_oldest_lines_past_limit() {
        let (session, _rx) = session(7);
        let classifier = LineClassifier::new();

        let filler = "x".repeat(64 * 1024);
        for i in 0..20 {
            let payload = format!("L 10/29/2015 - 16:50:46: {} {}\n\0", i, filler);
            assert!(session.deliver(&classifier, &payload).await);
        }

        let logs = session.take_logs().await;
        assert!(logs.len() <= MAX_BUFFERED_LOG_BYTES);
        assert!(logs.starts_with("L 10/29/2015"));
        assert!(logs.ends_with(&format!("19 {}\n", filler)));
        assert!(!logs.contains(": 0 x"));
    }

    #[tokio::test]
    async fn test_verification_reports_first_datagram() {
        let (tx, rx) = oneshot::channel();
        let session = Session::verification(Secret::from(3), "10.0.0.1:27015", tx);
        let classifier = LineClassifier::new();

        assert!(session.deliver(&classifier, GAME_OVER).await);
        assert!(session.deliver(&classifier, GAME_OVER).await);
        assert!(rx.await.is_ok());
    }

    #[test]
    fn test_insert_rejects_live_secret() {
        let mut registry = SessionRegistry::new();
        let (first, _rx1) = session(42);
        let (second, _rx2) = session(42);

        registry.insert(first).unwrap();
        assert!(matches!(
            registry.insert(second),
            Err(ListenerError::SecretInUse(s)) if s == "42"
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_and_remove() {
        let mut registry = SessionRegistry::new();
        let (session, _rx) = session(42);
        registry.insert(Arc::clone(&session)).unwrap();

        assert!(registry.lookup("42").is_some());
        assert!(registry.lookup("43").is_none());

        assert!(registry.remove(&session));
        assert!(!registry.remove(&session));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_ignores_newer_session_with_same_secret() {
        let mut registry = SessionRegistry::new();
        let (old, _rx1) = session(42);
        let (new, _rx2) = session(42);

        registry.insert(Arc::clone(&old)).unwrap();
        registry.remove(&old);
        registry.insert(Arc::clone(&new)).unwrap();

        assert!(!registry.remove(&old));
        assert!(Arc::ptr_eq(&registry.lookup("42").unwrap(), &new));
    }

    #[test]
    fn test_allocate_avoids_registered_secrets() {
        let mut registry = SessionRegistry::new();
        for _ in 0..200 {
            let secret = registry.allocate();
            let (sender, _rx) = EventSender::channel();
            let session = Session::new(secret, "10.0.0.1:27015", Arc::new(sender));
            registry.insert(Arc::new(session)).unwrap();
        }
        assert_eq!(registry.len(), 200);
    }
}
