//! Ephemeral port allocation

use std::net::{Ipv4Addr, SocketAddr};

use tokio::net::TcpListener;

use crate::error::FixtureError;

/// Ask the OS for a currently unused TCP port.
///
/// Binds port 0 on the unspecified address, reads back the assigned port and
/// releases the listener before returning. Another process may grab the port
/// before the caller binds it; that race is accepted.
pub async fn allocate_port() -> Result<u16, FixtureError> {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
        .await
        .map_err(FixtureError::Allocation)?;
    let port = listener
        .local_addr()
        .map_err(FixtureError::Allocation)?
        .port();
    drop(listener);

    tracing::debug!(port, "Allocated free port");
    Ok(port)
}
