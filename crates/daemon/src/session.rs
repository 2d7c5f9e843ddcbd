//! Sessions opened from the command line instead of an SSH connection.

use std::net::SocketAddr;

use common::gateway::GatewayError;
use common::prelude::*;
use tracing::debug;

use crate::config::{AppConfig, ConfigError};

/// A transport session for a user working locally, with no client address.
#[derive(Debug, Clone)]
pub struct LocalSession {
    id: SessionId,
    username: String,
}

impl LocalSession {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: SessionId::generate(),
            username: username.into(),
        }
    }
}

impl TransportSession for LocalSession {
    fn session_id(&self) -> SessionId {
        self.id
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn client_address(&self) -> Option<SocketAddr> {
        None
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Build a gateway from `config` and open a session for `username`.
///
/// Credentials are not checked; the operator already has the config file.
pub async fn open_local_session(
    config: &AppConfig,
    username: &str,
) -> Result<JailedSftpSubsystem, SessionError> {
    let gateway = config.build_gateway().await?;
    let transport = LocalSession::new(username);
    debug!(username = %username, session = %transport.session_id(), "opening local session");
    Ok(gateway.open_session(&transport)?)
}
