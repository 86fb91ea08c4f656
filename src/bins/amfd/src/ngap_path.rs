//! NGAP Path - Transport for RAN Node Associations
//!
//! The dispatcher consumes [`TransportEvent`]s and answers through
//! [`NgapTransport`]. NGAP runs over SCTP in a deployment; that association
//! layer lives outside this crate and plugs in behind the same two seams.
//! [`TcpTransport`] is a stand-in for it: one TCP connection per RAN node,
//! each NGAP PDU framed with a 4-byte big-endian length prefix, connection
//! loss reported as the matching association notification.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::context::AssociationId;
use crate::ngap_send::SendError;

// ============================================================================
// Constants
// ============================================================================

/// Default NGAP bind address
pub const DEFAULT_NGAP_ADDR: &str = "0.0.0.0:38412";

/// Maximum NGAP message size
pub const MAX_NGAP_MSG_SIZE: usize = 65535;

// ============================================================================
// Events
// ============================================================================

/// Association notifications raised by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Peer unreachable or connection reset
    CommLost,
    ShutdownComplete,
    /// Peer initiated shutdown
    ShutdownEvent,
    /// A queued message could not be delivered
    SendFailed,
    PeerAddressChange,
}

impl NotificationKind {
    /// True for notifications that end the association
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NotificationKind::CommLost
                | NotificationKind::ShutdownComplete
                | NotificationKind::ShutdownEvent
        )
    }
}

#[derive(Debug, Clone)]
pub enum TransportEvent {
    Connected {
        assoc: AssociationId,
        peer: SocketAddr,
    },
    Message {
        assoc: AssociationId,
        data: Bytes,
    },
    Notification {
        assoc: AssociationId,
        kind: NotificationKind,
    },
}

impl TransportEvent {
    pub fn assoc(&self) -> AssociationId {
        match self {
            TransportEvent::Connected { assoc, .. }
            | TransportEvent::Message { assoc, .. }
            | TransportEvent::Notification { assoc, .. } => *assoc,
        }
    }
}

/// Delivery of encoded NGAP PDUs to an association
#[async_trait]
pub trait NgapTransport: Send + Sync {
    async fn send(&self, assoc: AssociationId, data: Bytes) -> Result<(), SendError>;
}

// ============================================================================
// Framing
// ============================================================================

/// Prefix a PDU with its 4-byte big-endian length
pub fn encode_frame(data: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(4 + data.len());
    buf.put_u32(data.len() as u32);
    buf.put_slice(data);
    buf.freeze()
}

/// Read one length-prefixed frame. `Ok(None)` on a clean end of stream.
pub async fn read_frame<R>(reader: &mut R) -> std::io::Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_NGAP_MSG_SIZE {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("NGAP frame too large: {len} bytes"),
        ));
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;
    Ok(Some(Bytes::from(data)))
}

async fn write_frame<W>(writer: &mut W, data: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&encode_frame(data)).await?;
    writer.flush().await
}

// ============================================================================
// TCP Transport
// ============================================================================

/// TCP transport shared by the accept loop and the senders
pub struct TcpTransport {
    writers: RwLock<HashMap<AssociationId, mpsc::UnboundedSender<Bytes>>>,
    next_assoc: AtomicU64,
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self {
            writers: RwLock::new(HashMap::new()),
            next_assoc: AtomicU64::new(1),
        }
    }
}

impl TcpTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn num_associations(&self) -> usize {
        self.writers.read().map(|w| w.len()).unwrap_or(0)
    }

    fn register(&self, tx: mpsc::UnboundedSender<Bytes>) -> AssociationId {
        let assoc = self.next_assoc.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut writers) = self.writers.write() {
            writers.insert(assoc, tx);
        }
        assoc
    }

    fn unregister(&self, assoc: AssociationId) {
        if let Ok(mut writers) = self.writers.write() {
            writers.remove(&assoc);
        }
    }

    /// Accept RAN node connections until the listener fails
    pub async fn serve(
        self: Arc<Self>,
        listener: TcpListener,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<()> {
        log::info!("NGAP server listening on {}", listener.local_addr()?);

        loop {
            let (stream, peer) = listener.accept().await?;
            let transport = self.clone();
            let events = events.clone();
            tokio::spawn(async move {
                transport.run_association(stream, peer, events).await;
            });
        }
    }

    async fn run_association(
        self: Arc<Self>,
        stream: TcpStream,
        peer: SocketAddr,
        events: mpsc::Sender<TransportEvent>,
    ) {
        let (mut reader, mut writer) = stream.into_split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
        let assoc = self.register(tx);

        log::info!("[assoc:{}] RAN node connected from {}", assoc, peer);
        if events.send(TransportEvent::Connected { assoc, peer }).await.is_err() {
            self.unregister(assoc);
            return;
        }

        let write_events = events.clone();
        let write_task = tokio::spawn(async move {
            while let Some(data) = rx.recv().await {
                if let Err(e) = write_frame(&mut writer, &data).await {
                    log::warn!("[assoc:{}] send failed: {}", assoc, e);
                    let _ = write_events
                        .send(TransportEvent::Notification {
                            assoc,
                            kind: NotificationKind::SendFailed,
                        })
                        .await;
                    break;
                }
            }
        });

        let kind = loop {
            match read_frame(&mut reader).await {
                Ok(Some(data)) => {
                    if events
                        .send(TransportEvent::Message { assoc, data })
                        .await
                        .is_err()
                    {
                        break NotificationKind::ShutdownComplete;
                    }
                }
                Ok(None) => break NotificationKind::ShutdownEvent,
                Err(e) => {
                    log::warn!("[assoc:{}] receive failed: {}", assoc, e);
                    break NotificationKind::CommLost;
                }
            }
        };

        self.unregister(assoc);
        write_task.abort();
        log::info!("[assoc:{}] RAN node disconnected ({:?})", assoc, kind);
        let _ = events
            .send(TransportEvent::Notification { assoc, kind })
            .await;
    }
}

#[async_trait]
impl NgapTransport for TcpTransport {
    async fn send(&self, assoc: AssociationId, data: Bytes) -> Result<(), SendError> {
        let tx = self
            .writers
            .read()
            .ok()
            .and_then(|writers| writers.get(&assoc).cloned());

        match tx {
            Some(tx) => tx.send(data).map_err(|_| SendError::Transport {
                assoc,
                reason: "association closed".to_string(),
            }),
            None => Err(SendError::Transport {
                assoc,
                reason: "unknown association".to_string(),
            }),
        }
    }
}
