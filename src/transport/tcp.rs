// TCP link
// Newline-delimited JSON over a single-peer TCP connection, bridged to the polled Link interface

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify};

use crate::transport::connection::{Link, LinkEvent, TransportError};
use crate::transport::framing::{is_blank, Frame, LineReader, MAX_CONFIG_LINE};
use crate::transport::protocol::Channel;

/// Queued notifications beyond this are dropped rather than buffered
const OUTBOUND_QUEUE: usize = 64;
const EVENT_QUEUE: usize = 64;

/// Single-peer TCP stand-in for the radio link
///
/// A background task accepts one connection per advertise request and
/// forwards lines in both directions. Connection attempts that arrive while
/// not advertising wait in the listen backlog.
pub struct TcpLink {
    events_rx: mpsc::Receiver<LinkEvent>,
    outbound_tx: mpsc::Sender<Vec<u8>>,
    advertise: Arc<Notify>,
    local_addr: SocketAddr,
}

impl TcpLink {
    /// Bind and start the accept task on the current tokio runtime
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        Self::spawn(listener)
    }

    pub fn spawn(listener: TcpListener) -> Result<Self, TransportError> {
        let local_addr = listener.local_addr()?;
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let advertise = Arc::new(Notify::new());

        tokio::spawn(serve(listener, events_tx, outbound_rx, Arc::clone(&advertise)));
        log::info!("Listening on {}", local_addr);

        Ok(TcpLink {
            events_rx,
            outbound_tx,
            advertise,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Link for TcpLink {
    fn start_advertising(&mut self) -> Result<(), TransportError> {
        if self.outbound_tx.is_closed() {
            return Err(TransportError::ChannelClosed);
        }
        self.advertise.notify_one();
        Ok(())
    }

    fn poll_event(&mut self) -> Option<LinkEvent> {
        self.events_rx.try_recv().ok()
    }

    fn send(&mut self, channel: Channel, payload: &[u8]) -> Result<(), TransportError> {
        log::trace!("{:?} <- {} bytes", channel, payload.len());
        self.outbound_tx
            .try_send(payload.to_vec())
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => TransportError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => TransportError::ChannelClosed,
            })
    }
}

async fn serve(
    listener: TcpListener,
    events_tx: mpsc::Sender<LinkEvent>,
    mut outbound_rx: mpsc::Receiver<Vec<u8>>,
    advertise: Arc<Notify>,
) {
    loop {
        advertise.notified().await;

        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("Accept failed: {}", e);
                // Still advertising from the device's point of view
                advertise.notify_one();
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };
        log::info!("Accepted connection from {}", peer);

        // Anything queued before this peer arrived is stale
        while outbound_rx.try_recv().is_ok() {}

        if events_tx.send(LinkEvent::Connected).await.is_err() {
            break;
        }
        run_session(stream, &events_tx, &mut outbound_rx).await;
        log::info!("Connection from {} closed", peer);
        if events_tx.send(LinkEvent::Disconnected).await.is_err() {
            break;
        }
    }
    log::debug!("TCP link task exiting");
}

async fn run_session(
    stream: TcpStream,
    events_tx: &mpsc::Sender<LinkEvent>,
    outbound_rx: &mut mpsc::Receiver<Vec<u8>>,
) {
    let (reader, mut writer) = stream.into_split();
    let mut frames = LineReader::new(reader, MAX_CONFIG_LINE);

    loop {
        tokio::select! {
            frame = frames.next_frame() => match frame {
                Ok(Some(Frame::Line(line))) => {
                    if is_blank(&line) {
                        continue;
                    }
                    if events_tx.send(LinkEvent::Message(line)).await.is_err() {
                        return;
                    }
                }
                Ok(Some(Frame::Oversized)) => {
                    log::warn!("Rejected config write over {} bytes", MAX_CONFIG_LINE);
                }
                Ok(None) => return,
                Err(e) => {
                    log::debug!("Read error: {}", e);
                    return;
                }
            },
            payload = outbound_rx.recv() => match payload {
                Some(mut payload) => {
                    payload.push(b'\n');
                    if let Err(e) = writer.write_all(&payload).await {
                        log::debug!("Write error: {}", e);
                        return;
                    }
                }
                None => return,
            },
        }
    }
}
