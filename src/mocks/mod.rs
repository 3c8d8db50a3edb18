//! Mock implementations for testing.
//!
//! [`MockClientFactory`] hands out scripted [`MockRemoteClient`]s and records
//! every client it creates in a shared [`ClientJournal`], so tests can assert
//! how many clients were created and the state each one ended in.
//! [`LogCapture`] records `tracing` events emitted while it is installed.

use crate::client::{ClientEvent, ClientFactory, ClientState, ConnectionLifecycle, RemoteClient};
use crate::errors::{InvokeResult, InvokerError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Scripted behavior for one mock client.
#[derive(Debug, Clone, Default)]
pub struct ClientBehavior {
    fail_open: Option<InvokerError>,
    fail_close: Option<InvokerError>,
    fail_call: Option<InvokerError>,
    open_delay: Option<Duration>,
    call_delay: Option<Duration>,
    close_delay: Option<Duration>,
}

impl ClientBehavior {
    /// A client that opens, serves, and closes successfully
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the handshake with `error`, leaving the client faulted
    pub fn fail_open(mut self, error: InvokerError) -> Self {
        self.fail_open = Some(error);
        self
    }

    /// Fail the graceful close with `error`
    pub fn fail_close(mut self, error: InvokerError) -> Self {
        self.fail_close = Some(error);
        self
    }

    /// Fail every [`MockRemoteClient::call`] with `error`
    pub fn fail_call(mut self, error: InvokerError) -> Self {
        self.fail_call = Some(error);
        self
    }

    /// Delay the handshake
    pub fn open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    /// Delay every [`MockRemoteClient::call`]
    pub fn call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = Some(delay);
        self
    }

    /// Delay the graceful close
    pub fn close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = Some(delay);
        self
    }
}

/// Shared record of every client a [`MockClientFactory`] created.
#[derive(Debug, Default)]
pub struct ClientJournal {
    created: AtomicUsize,
    opens: AtomicUsize,
    closes: AtomicUsize,
    aborts: AtomicUsize,
    operations: AtomicUsize,
    lifecycles: Mutex<Vec<Arc<ConnectionLifecycle>>>,
}

impl ClientJournal {
    /// Number of clients created
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Number of handshakes started
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of graceful closes attempted
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Number of aborts
    pub fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }

    /// Number of calls that reached an opened client
    pub fn operations(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    /// Current state of every created client, in creation order
    pub fn final_states(&self) -> Vec<ClientState> {
        self.lifecycles.lock().iter().map(|l| l.state()).collect()
    }
}

/// A remote client whose behavior is scripted by [`ClientBehavior`].
pub struct MockRemoteClient {
    id: usize,
    lifecycle: Arc<ConnectionLifecycle>,
    behavior: ClientBehavior,
    journal: Arc<ClientJournal>,
}

impl MockRemoteClient {
    /// Zero-based creation index of this client
    pub fn id(&self) -> usize {
        self.id
    }

    /// Simulate a transport failure on an open connection
    pub fn fault(&self) {
        let _ = self.lifecycle.apply(ClientEvent::Fault);
    }

    /// Simulate a remote call that echoes `value`.
    ///
    /// Fails with [`InvokerError::InvalidState`] unless the client is opened.
    pub async fn call<T: Send>(&self, value: T) -> InvokeResult<T> {
        if self.lifecycle.state() != ClientState::Opened {
            return Err(InvokerError::InvalidState {
                message: format!("call on a client in state {}", self.lifecycle.state()),
            });
        }
        self.journal.operations.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.behavior.call_delay {
            tokio::time::sleep(delay).await;
        }
        match &self.behavior.fail_call {
            Some(error) => Err(error.clone()),
            None => Ok(value),
        }
    }
}

#[async_trait]
impl RemoteClient for MockRemoteClient {
    fn state(&self) -> ClientState {
        self.lifecycle.state()
    }

    async fn open(&self) -> InvokeResult<()> {
        self.journal.opens.fetch_add(1, Ordering::SeqCst);
        self.lifecycle.apply(ClientEvent::BeginOpen)?;

        if let Some(delay) = self.behavior.open_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.behavior.fail_open {
            self.lifecycle.apply(ClientEvent::Fault)?;
            return Err(error.clone());
        }
        self.lifecycle.apply(ClientEvent::Opened)?;
        Ok(())
    }

    async fn close(&self) -> InvokeResult<()> {
        self.journal.closes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.behavior.close_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.behavior.fail_close {
            self.lifecycle.apply(ClientEvent::Fault)?;
            return Err(error.clone());
        }
        self.lifecycle.apply(ClientEvent::Close)?;
        Ok(())
    }

    fn abort(&self) {
        self.journal.aborts.fetch_add(1, Ordering::SeqCst);
        let _ = self.lifecycle.apply(ClientEvent::Abort);
    }
}

impl fmt::Debug for MockRemoteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockRemoteClient")
            .field("id", &self.id)
            .field("state", &self.lifecycle.state())
            .finish()
    }
}

/// Factory handing out [`MockRemoteClient`]s.
///
/// The n-th created client follows the n-th scripted behavior; clients beyond
/// the script behave normally. Clones share the same journal and script.
#[derive(Clone, Default)]
pub struct MockClientFactory {
    script: Arc<Vec<ClientBehavior>>,
    journal: Arc<ClientJournal>,
}

impl MockClientFactory {
    /// Create a factory whose clients always succeed
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the behavior of the first clients created
    pub fn with_script(mut self, script: Vec<ClientBehavior>) -> Self {
        self.script = Arc::new(script);
        self
    }

    /// Get the shared journal
    pub fn journal(&self) -> Arc<ClientJournal> {
        self.journal.clone()
    }
}

impl ClientFactory<MockRemoteClient> for MockClientFactory {
    fn create(&self) -> InvokeResult<MockRemoteClient> {
        let id = self.journal.created.fetch_add(1, Ordering::SeqCst);
        let lifecycle = Arc::new(ConnectionLifecycle::new());
        self.journal.lifecycles.lock().push(lifecycle.clone());

        Ok(MockRemoteClient {
            id,
            lifecycle,
            behavior: self.script.get(id).cloned().unwrap_or_default(),
            journal: self.journal.clone(),
        })
    }
}

/// A `tracing` event captured by [`LogCapture`].
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    /// Event level
    pub level: Level,
    /// Rendered message
    pub message: String,
    /// Structured fields, excluding the message
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    /// Get a field value by name
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// `tracing_subscriber` layer that records events in memory.
#[derive(Clone, Default)]
pub struct LogCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl LogCapture {
    /// Create an empty capture
    pub fn new() -> Self {
        Self::default()
    }

    /// Install as the thread-local default subscriber until the guard drops
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
    }

    /// All captured events
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().clone()
    }

    /// Number of captured events with exactly this message
    pub fn count(&self, message: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.message == message)
            .count()
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        self.events.lock().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push((field.name().to_string(), format!("{:?}", value)));
        }
    }
}
