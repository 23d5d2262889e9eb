use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque observer connection handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receiving end of one observer's outbound queue.
///
/// Messages arrive in the order the broadcaster emitted them. The queue
/// closes once the broadcaster drops the session, either on disconnect or
/// after eviction.
#[derive(Debug)]
pub struct ObserverSession {
    id: SessionId,
    receiver: mpsc::Receiver<String>,
}

impl ObserverSession {
    pub(crate) fn new(id: SessionId, receiver: mpsc::Receiver<String>) -> Self {
        Self { id, receiver }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Next queued message, `None` once the session has been dropped
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<String> {
        self.receiver.try_recv().ok()
    }
}
