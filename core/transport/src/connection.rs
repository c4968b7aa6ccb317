//! Client-side connection with request/response correlation.

use std::collections::HashMap;
use std::time::Duration;
use std::time::Instant;

use distbuild_protocol::Frame;
use distbuild_protocol::FrameBody;
use distbuild_protocol::FrameCodec;
use futures::SinkExt;
use futures::StreamExt;
use snafu::ResultExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio_util::codec::Framed;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::EXPIRY_SCAN_INTERVAL;
use crate::TransportSettings;
use crate::error::Result;
use crate::error::TransportError;
use crate::error::transport_error;

/// Unsolicited frames (coordinator pushes, heartbeats excluded) land here.
pub type PushHandler = Box<dyn Fn(Frame) + Send + Sync + 'static>;

enum Command {
    Request {
        body: FrameBody,
        timeout: Duration,
        reply: oneshot::Sender<Result<Frame>>,
    },
    Notify {
        body: FrameBody,
    },
}

/// A live connection. Cloning shares the underlying socket; dropping every
/// clone closes it once in-flight writes drain.
#[derive(Clone, Debug)]
pub struct Connection {
    addr: String,
    sender: mpsc::UnboundedSender<Command>,
}

impl Connection {
    /// Connect and spawn the driver task. `push` receives frames that
    /// correlate to no pending request.
    pub async fn connect(
        addr: &str,
        settings: TransportSettings,
        push: Option<PushHandler>,
    ) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .context(transport_error::ConnectSnafu { addr })?;
        stream.set_nodelay(true).ok();
        let (sender, receiver) = mpsc::unbounded_channel();
        let driver = Driver {
            addr: addr.to_string(),
            settings,
            pending: HashMap::new(),
            next_transaction_id: 1,
            push,
            peer_version_checked: false,
            last_incoming: Instant::now(),
        };
        tokio::spawn(driver.run(stream, receiver));
        Ok(Self {
            addr: addr.to_string(),
            sender,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// True while the driver is alive. A lost socket tears the driver down
    /// after failing everything pending.
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Send a frame that expects a reply. Resolves with the response, a
    /// `Timeout` after `timeout`, or `ConnectionLost`.
    pub async fn request(&self, body: FrameBody, timeout: Duration) -> Result<Frame> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::Request {
                body,
                timeout,
                reply,
            })
            .map_err(|_| self.lost())?;
        rx.await.map_err(|_| self.lost())?
    }

    /// Send a frame nobody will answer.
    pub fn notify(&self, body: FrameBody) -> Result<()> {
        self.sender
            .send(Command::Notify { body })
            .map_err(|_| self.lost())
    }

    fn lost(&self) -> TransportError {
        transport_error::ConnectionLostSnafu {
            addr: self.addr.clone(),
        }
        .build()
    }
}

struct PendingEntry {
    reply: oneshot::Sender<Result<Frame>>,
    deadline: Instant,
}

struct Driver {
    addr: String,
    settings: TransportSettings,
    pending: HashMap<u64, PendingEntry>,
    next_transaction_id: u64,
    push: Option<PushHandler>,
    peer_version_checked: bool,
    last_incoming: Instant,
}

impl Driver {
    async fn run(mut self, stream: TcpStream, mut receiver: mpsc::UnboundedReceiver<Command>) {
        let mut framed = Framed::new(stream, FrameCodec::new(self.settings.segment_size));

        // Announce our protocol version before anything else.
        let hello = Frame::notification(FrameBody::ConnectionStatus {
            protocol_version: self.settings.protocol_version,
        });
        if framed.send(hello.encode()).await.is_err() {
            self.fail_all();
            return;
        }

        let mut expiry = tokio::time::interval(EXPIRY_SCAN_INTERVAL);
        let mut heartbeat = tokio::time::interval(self.settings.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = receiver.recv() => {
                    let Some(command) = command else {
                        // Every handle dropped; drain and close.
                        break;
                    };
                    let frame = match command {
                        Command::Request { body, timeout, reply } => {
                            let id = self.next_transaction_id;
                            self.next_transaction_id += 1;
                            self.pending.insert(id, PendingEntry {
                                reply,
                                deadline: Instant::now() + timeout,
                            });
                            Frame::new(id, body)
                        }
                        Command::Notify { body } => Frame::notification(body),
                    };
                    trace!(addr = %self.addr, kind = ?frame.kind(), "sending frame");
                    if framed.send(frame.encode()).await.is_err() {
                        self.fail_all();
                        return;
                    }
                }
                incoming = framed.next() => {
                    self.last_incoming = Instant::now();
                    match incoming {
                        Some(Ok(raw)) => {
                            let frame = match Frame::decode(raw) {
                                Ok(frame) => frame,
                                Err(error) => {
                                    warn!(addr = %self.addr, %error, "dropping undecodable frame");
                                    continue;
                                }
                            };
                            if !self.handle_incoming(frame) {
                                self.fail_all();
                                return;
                            }
                        }
                        Some(Err(error)) => {
                            warn!(addr = %self.addr, %error, "connection codec error");
                            self.fail_all();
                            return;
                        }
                        None => {
                            debug!(addr = %self.addr, "peer closed connection");
                            self.fail_all();
                            return;
                        }
                    }
                }
                _ = expiry.tick() => {
                    self.expire_overdue();
                }
                _ = heartbeat.tick() => {
                    // A peer that has sent nothing for several heartbeat
                    // periods is gone even if the socket looks open.
                    if self.last_incoming.elapsed() > self.settings.heartbeat_interval * 4 {
                        warn!(addr = %self.addr, "peer silent, closing connection");
                        self.fail_all();
                        return;
                    }
                    let beat = Frame::notification(FrameBody::ConnectionStatus {
                        protocol_version: self.settings.protocol_version,
                    });
                    if framed.send(beat.encode()).await.is_err() {
                        self.fail_all();
                        return;
                    }
                }
            }
        }
    }

    /// Returns false when the connection must close (version mismatch).
    fn handle_incoming(&mut self, frame: Frame) -> bool {
        if let FrameBody::ConnectionStatus { protocol_version } = frame.body {
            if !self.peer_version_checked {
                self.peer_version_checked = true;
                if protocol_version != self.settings.protocol_version {
                    warn!(
                        addr = %self.addr,
                        ours = self.settings.protocol_version,
                        theirs = protocol_version,
                        "protocol version mismatch"
                    );
                    return false;
                }
            }
            return true;
        }
        if frame.transaction_id != 0 {
            if let Some(entry) = self.pending.remove(&frame.transaction_id) {
                let _ = entry.reply.send(Ok(frame));
                return true;
            }
        }
        if let Some(push) = &self.push {
            push(frame);
        } else {
            trace!(addr = %self.addr, kind = ?frame.kind(), "dropping unsolicited frame");
        }
        true
    }

    fn expire_overdue(&mut self) {
        let now = Instant::now();
        let overdue: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in overdue {
            if let Some(entry) = self.pending.remove(&id) {
                debug!(addr = %self.addr, transaction = id, "request timed out");
                let _ = entry.reply.send(Err(transport_error::TimeoutSnafu {
                    addr: self.addr.clone(),
                }
                .build()));
            }
        }
    }

    fn fail_all(&mut self) {
        for (_, entry) in self.pending.drain() {
            let _ = entry.reply.send(Err(transport_error::ConnectionLostSnafu {
                addr: self.addr.clone(),
            }
            .build()));
        }
    }
}

#[cfg(test)]
#[path = "connection.test.rs"]
mod tests;
