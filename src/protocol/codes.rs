//! Application close codes exchanged at connection teardown.

use quinn::VarInt;

/// Reason a peer closed the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// Listener refused the connection because every admission slot is held.
    PoolFull,
    /// Dialer acknowledges a rejection notice and leaves.
    RejectAck,
    /// Listener is shutting down.
    ServerShutdown,
    /// Dialer typed `exit`.
    ClientExit,
}

impl CloseCode {
    /// Raw wire value.
    pub const fn as_u32(self) -> u32 {
        match self {
            CloseCode::PoolFull => 0x10,
            CloseCode::RejectAck => 0x11,
            CloseCode::ServerShutdown => 0x12,
            CloseCode::ClientExit => 0x42,
        }
    }

    /// Human-readable reason sent alongside the code.
    pub const fn reason(self) -> &'static [u8] {
        match self {
            CloseCode::PoolFull => b"Maximum Connection Reached",
            CloseCode::RejectAck => b"Client exiting due to max connections reached",
            CloseCode::ServerShutdown => b"Server shutting down",
            CloseCode::ClientExit => b"Client Closed Connection",
        }
    }

    /// Map a received application close code back to a known reason.
    pub fn from_varint(code: VarInt) -> Option<Self> {
        match code.into_inner() {
            0x10 => Some(CloseCode::PoolFull),
            0x11 => Some(CloseCode::RejectAck),
            0x12 => Some(CloseCode::ServerShutdown),
            0x42 => Some(CloseCode::ClientExit),
            _ => None,
        }
    }

    /// Close `connection` with this code and its reason phrase.
    pub fn close(self, connection: &quinn::Connection) {
        connection.close(self.into(), self.reason());
    }
}

impl From<CloseCode> for VarInt {
    fn from(code: CloseCode) -> Self {
        VarInt::from_u32(code.as_u32())
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.as_u32())
    }
}
