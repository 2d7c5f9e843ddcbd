use std::fmt;
use std::net::SocketAddr;

use uuid::Uuid;

/// The transport session as seen from the SSH/SFTP layer.
///
/// Implemented by whatever library terminates SSH. Integer properties
/// (handle size limits and the like) belong to the transport; nothing in
/// this crate interprets them.
pub trait TransportSession: Send + Sync {
    fn session_id(&self) -> SessionId;

    fn username(&self) -> &str;

    fn client_address(&self) -> Option<SocketAddr>;

    fn int_property(&self, _name: &str, default: i64) -> i64 {
        default
    }
}

/// Opaque identity of a single connection, usable as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for SessionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only snapshot of an authenticated (or authenticating) session.
///
/// Every session strategy is a function of this value, so it never
/// changes after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SftpSession {
    id: SessionId,
    username: String,
    client_address: Option<SocketAddr>,
}

impl SftpSession {
    pub fn new(
        id: SessionId,
        username: impl Into<String>,
        client_address: Option<SocketAddr>,
    ) -> Self {
        Self {
            id,
            username: username.into(),
            client_address,
        }
    }

    /// Snapshot a transport session.
    pub fn of(transport: &dyn TransportSession) -> Self {
        Self::new(
            transport.session_id(),
            transport.username(),
            transport.client_address(),
        )
    }

    /// Snapshot a transport session for a username that is still being
    /// authenticated and therefore not yet recorded on the transport.
    pub fn for_user(transport: &dyn TransportSession, username: &str) -> Self {
        Self::new(transport.session_id(), username, transport.client_address())
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn client_address(&self) -> Option<SocketAddr> {
        self.client_address
    }
}

impl fmt::Display for SftpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.client_address {
            Some(addr) => write!(f, "{}@{} ({})", self.username, addr, self.id),
            None => write!(f, "{} ({})", self.username, self.id),
        }
    }
}
