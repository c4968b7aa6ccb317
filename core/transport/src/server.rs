//! Accept loop and per-connection frame dispatch.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use distbuild_protocol::Frame;
use distbuild_protocol::FrameBody;
use distbuild_protocol::FrameCodec;
use futures::SinkExt;
use futures::StreamExt;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::TransportSettings;

/// Handle for answering frames on one accepted connection. Responses may be
/// sent from any task, in any order; the writer serializes them.
#[derive(Clone)]
pub struct ConnectionCtx {
    pub connection_id: u64,
    pub peer: SocketAddr,
    sender: mpsc::UnboundedSender<Frame>,
}

impl ConnectionCtx {
    /// Queue a frame for this connection. Returns false when the
    /// connection is already gone.
    pub fn send(&self, frame: Frame) -> bool {
        self.sender.send(frame).is_ok()
    }
}

/// What a server does with its connections. Methods are called from the
/// connection's reader task and must not block; spawn for real work.
pub trait FrameHandler: Send + Sync + 'static {
    /// One decoded frame arrived. Heartbeats are handled below this layer.
    fn on_frame(self: Arc<Self>, ctx: ConnectionCtx, frame: Frame);

    /// Gate connections before any frame is read. Default: allow all.
    fn allow(&self, _peer: &SocketAddr) -> bool {
        true
    }

    fn on_connected(&self, _ctx: &ConnectionCtx) {}

    fn on_disconnected(&self, _ctx: &ConnectionCtx) {}
}

/// Run the accept loop forever. Each connection gets a reader and a writer
/// task; the handler sees decoded frames and answers through its
/// [`ConnectionCtx`].
pub async fn serve<H: FrameHandler>(
    listener: TcpListener,
    settings: TransportSettings,
    handler: Arc<H>,
) {
    let connection_counter = AtomicU64::new(1);
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                warn!(%error, "accept failed");
                continue;
            }
        };
        if !handler.allow(&peer) {
            info!(%peer, "rejecting connection: host not allowed");
            continue;
        }
        let connection_id = connection_counter.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(drive_connection(
            stream,
            peer,
            connection_id,
            settings.clone(),
            Arc::clone(&handler),
        ));
    }
}

async fn drive_connection<H: FrameHandler>(
    stream: TcpStream,
    peer: SocketAddr,
    connection_id: u64,
    settings: TransportSettings,
    handler: Arc<H>,
) {
    stream.set_nodelay(true).ok();
    let framed = Framed::new(stream, FrameCodec::new(settings.segment_size));
    let (mut sink, mut source) = framed.split();
    let (sender, mut outgoing) = mpsc::unbounded_channel::<Frame>();

    let ctx = ConnectionCtx {
        connection_id,
        peer,
        sender,
    };
    handler.on_connected(&ctx);
    debug!(%peer, connection_id, "connection accepted");

    // Writer: drains handler responses and emits idle heartbeats.
    let writer_settings = settings.clone();
    let writer = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(writer_settings.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Lead with our version so the peer can verify the channel.
        let hello = Frame::notification(FrameBody::ConnectionStatus {
            protocol_version: writer_settings.protocol_version,
        });
        if sink.send(hello.encode()).await.is_err() {
            return;
        }
        loop {
            tokio::select! {
                frame = outgoing.recv() => {
                    let Some(frame) = frame else { break };
                    if sink.send(frame.encode()).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    let beat = Frame::notification(FrameBody::ConnectionStatus {
                        protocol_version: writer_settings.protocol_version,
                    });
                    if sink.send(beat.encode()).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Reader: decode and dispatch until the peer goes away.
    let mut version_checked = false;
    while let Some(next) = source.next().await {
        let raw = match next {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%peer, %error, "connection codec error");
                break;
            }
        };
        let frame = match Frame::decode(raw) {
            Ok(frame) => frame,
            Err(error) => {
                warn!(%peer, %error, "dropping undecodable frame");
                continue;
            }
        };
        if let FrameBody::ConnectionStatus { protocol_version } = frame.body {
            if !version_checked {
                version_checked = true;
                if protocol_version != settings.protocol_version {
                    warn!(
                        %peer,
                        ours = settings.protocol_version,
                        theirs = protocol_version,
                        "protocol version mismatch; closing"
                    );
                    break;
                }
            }
            continue;
        }
        Arc::clone(&handler).on_frame(ctx.clone(), frame);
    }

    handler.on_disconnected(&ctx);
    writer.abort();
    debug!(%peer, connection_id, "connection closed");
}

#[cfg(test)]
#[path = "server.test.rs"]
mod tests;
