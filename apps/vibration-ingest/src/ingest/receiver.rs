use super::notify::Notifier;
use super::state::IngestState;
use super::lock_state;
use crate::error::{IngestError, IngestResult};
use crate::telemetry::parse_record;
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

pub(in crate::ingest) const RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);
pub(in crate::ingest) const MAX_DATAGRAM_BYTES: usize = 1024;

pub(in crate::ingest) fn bind_socket(address: &str, port: u16) -> IngestResult<UdpSocket> {
    let display = format!("{address}:{port}");
    let ip = match address.trim() {
        "localhost" => IpAddr::V4(Ipv4Addr::LOCALHOST),
        other => other
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map_err(|_| IngestError::InvalidAddress {
                address: display.clone(),
            })?,
    };
    let socket_addr = SocketAddr::new(ip, port);

    let bind_err = |source: std::io::Error| IngestError::Bind {
        address: display.clone(),
        source,
    };

    let socket = Socket::new(
        Domain::for_address(socket_addr),
        Type::DGRAM,
        Some(Protocol::UDP),
    )
    .map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    socket.bind(&socket_addr.into()).map_err(bind_err)?;

    let socket: UdpSocket = socket.into();
    socket
        .set_read_timeout(Some(RECEIVE_TIMEOUT))
        .map_err(bind_err)?;
    Ok(socket)
}

/// Shuts down both directions so a blocked `recv_from` returns and nothing more is read.
/// Unconnected UDP sockets may report `NotConnected` here even though the shutdown took effect.
pub(in crate::ingest) fn interrupt(socket: &UdpSocket) {
    if let Err(err) = SockRef::from(socket).shutdown(Shutdown::Both) {
        if err.kind() != ErrorKind::NotConnected {
            tracing::debug!(error = %err, "socket shutdown failed");
        }
    }
}

/// Nudges a receiver blocked in `recv_from` so it notices the stop flag before its timeout.
pub(in crate::ingest) fn wake(local_addr: SocketAddr) {
    let target_ip = match local_addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    let bind_ip: IpAddr = match target_ip {
        IpAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
        IpAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
    };
    if let Ok(socket) = UdpSocket::bind(SocketAddr::new(bind_ip, 0)) {
        let _ = socket.send_to(&[], SocketAddr::new(target_ip, local_addr.port()));
    }
}

pub(in crate::ingest) struct Receiver {
    pub(in crate::ingest) socket: UdpSocket,
    pub(in crate::ingest) state: Arc<Mutex<IngestState>>,
    pub(in crate::ingest) notifier: Arc<Notifier>,
    pub(in crate::ingest) running: Arc<AtomicBool>,
}

impl Receiver {
    pub(in crate::ingest) fn spawn(self, done_tx: mpsc::Sender<()>) -> IngestResult<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("udp-receiver".to_string())
            .spawn(move || {
                self.run();
                let _ = done_tx.send(());
            })
            .map_err(IngestError::Spawn)
    }

    fn run(self) {
        let local = self
            .socket
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_default();
        tracing::info!(address = %local, "UDP receiver started");

        let mut buf = [0u8; MAX_DATAGRAM_BYTES];
        while self.running.load(Ordering::Acquire) {
            match self.socket.recv_from(&mut buf) {
                Ok((len, peer)) => {
                    if !self.running.load(Ordering::Acquire) {
                        break;
                    }
                    self.handle_datagram(&buf[..len], peer);
                }
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    continue;
                }
                Err(err) => {
                    if self.running.load(Ordering::Acquire) {
                        self.report(IngestError::Transport(err));
                    }
                }
            }
        }

        tracing::info!(address = %local, "UDP receiver stopped");
    }

    fn handle_datagram(&self, payload: &[u8], peer: SocketAddr) {
        let text = match std::str::from_utf8(payload) {
            Ok(text) => text,
            Err(source) => {
                self.report(IngestError::Decode { peer, source });
                return;
            }
        };

        let record = match parse_record(text) {
            Ok(record) => record,
            Err(err) => {
                self.report(err.into());
                return;
            }
        };

        let accepted = lock_state(&self.state).accept(&record, peer);

        if let Some(binding) = &accepted.new_binding {
            tracing::info!(sensor = %binding.source_id, peer = %binding.peer, "sensor connected");
            self.notifier.connected(binding);
        }
        tracing::debug!(
            sensor = %record.source_id(),
            value = record.value(),
            unit = %record.unit(),
            level = accepted.level.as_str(),
            "reading accepted"
        );
        self.notifier.data(&record, &accepted.stats, accepted.level);
    }

    fn report(&self, err: IngestError) {
        let message = err.to_string();
        tracing::warn!(error = %message, "dropped datagram");
        self.notifier.error(&message);
    }
}
