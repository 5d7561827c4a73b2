//! Protocol kinds a device actor may own (spec §4.5 — WebSocket/FIFO are
//! client/server-plane transports, not device-facing ones).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolKind {
    Mqtt,
    Grpc,
    Zmq,
    Tcp,
    Stdio,
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProtocolKind::Mqtt => "mqtt",
            ProtocolKind::Grpc => "grpc",
            ProtocolKind::Zmq => "zmq",
            ProtocolKind::Tcp => "tcp",
            ProtocolKind::Stdio => "stdio",
        };
        write!(f, "{s}")
    }
}
