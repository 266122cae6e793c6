// Transport module
// Connection lifecycle, wire records and the concrete links that carry them

pub mod connection;
pub mod framing;
#[cfg(test)]
pub mod loopback;
pub mod protocol;
pub mod tcp;

pub use connection::{
    ConnectionState, Delivery, EventTransport, Link, LinkEvent, TransportError, TransportEvent,
};
pub use protocol::{
    Channel, DeviceStatus, ImpactRecord, Record, StatusKind, StatusRecord, PROTOCOL_VERSION,
};
pub use framing::{Frame, LineReader, MAX_CONFIG_LINE, MAX_RECORD_LINE};
pub use tcp::TcpLink;
