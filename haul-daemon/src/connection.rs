//! Per-connection protocol driver
//!
//! One task reads frames and one drains the session's outbound queue into
//! the socket. Each request is dispatched in its own spawned task, so a
//! slow handler on one session never stalls that session's reads or any
//! other session. Only protocol violations terminate the connection;
//! every other failure is answered as a fault and the loop continues.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

use haul_core::{AuthLevel, SessionId};
use haul_plugin_api::CallArgs;
use haul_proto::{
    Compression, Envelope, EnvelopeCodec, FaultKind, Message, PROTOCOL_VERSION, ProtocolError,
    Request, Response,
};

use crate::state::DaemonState;

/// Drive one (already encrypted) connection to completion.
pub async fn drive<S>(stream: S, peer: SocketAddr, state: Arc<DaemonState>)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let codec = EnvelopeCodec::new(state.config.max_frame_bytes);
    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = FramedRead::new(read_half, codec.clone());
    let mut writer = FramedWrite::new(write_half, codec);

    let (outbound, mut outbound_rx) = mpsc::channel(state.config.outbound_queue_capacity);
    let session_id = state.sessions.open(peer, outbound.clone()).await;
    info!(session = session_id, peer = %peer, "client connected");

    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if writer.send(Envelope::new(message)).await.is_err() {
                break;
            }
        }
    });

    if let Err(e) = serve(&mut reader, &outbound, session_id, &state).await {
        warn!(session = session_id, error = %e, "closing connection");
    }

    state.sessions.close(session_id).await;
    drop(outbound);
    // Late handler results have nowhere to go once the queue is gone
    writer_task.abort();
    let _ = writer_task.await;
    info!(session = session_id, "client disconnected");
}

/// Read one frame, treating idle timeout and EOF as a clean end of stream.
async fn next_frame<S>(
    reader: &mut FramedRead<ReadHalf<S>, EnvelopeCodec>,
    idle: Duration,
) -> Result<Option<Envelope>, ProtocolError>
where
    S: AsyncRead + AsyncWrite,
{
    match tokio::time::timeout(idle, reader.next()).await {
        Err(_elapsed) => {
            debug!("session idle timeout");
            Ok(None)
        }
        Ok(None) => Ok(None),
        Ok(Some(frame)) => frame.map(Some),
    }
}

async fn serve<S>(
    reader: &mut FramedRead<ReadHalf<S>, EnvelopeCodec>,
    outbound: &mpsc::Sender<Message>,
    session_id: SessionId,
    state: &Arc<DaemonState>,
) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let idle = Duration::from_secs(state.config.idle_timeout_secs);

    // The connection must open with hello
    let Some(envelope) = next_frame(reader, idle).await? else {
        return Ok(());
    };
    match envelope.message {
        Message::Hello { compression: _ } => {
            if envelope.version != PROTOCOL_VERSION {
                return Err(ProtocolError::UnsupportedVersion {
                    found: envelope.version,
                    supported: PROTOCOL_VERSION,
                });
            }
        }
        other => {
            return Err(ProtocolError::HandshakeExpected {
                got: other.kind().to_string(),
            });
        }
    }

    let _ = outbound
        .send(Message::HelloAck {
            compression: Compression::None,
        })
        .await;
    if state.sessions.handshake_complete(session_id).await.is_err() {
        return Ok(());
    }

    while let Some(envelope) = next_frame(reader, idle).await? {
        match envelope.message {
            Message::Request(request) if request.operation == "daemon.login" => {
                let response = login(session_id, request, state).await;
                if outbound.send(Message::Response(response)).await.is_err() {
                    break;
                }
            }
            Message::Request(request) => {
                let state = state.clone();
                let outbound = outbound.clone();
                tokio::spawn(async move {
                    // Level is read at call time, not connection time
                    let level = state
                        .sessions
                        .auth_level(session_id)
                        .await
                        .unwrap_or(AuthLevel::None);
                    let response = state.dispatcher.dispatch(session_id, level, request).await;
                    if outbound.send(Message::Response(response)).await.is_err() {
                        debug!(session = session_id, "session gone, response discarded");
                    }
                });
            }
            other => {
                return Err(ProtocolError::UnexpectedMessage {
                    got: other.kind().to_string(),
                });
            }
        }
    }

    Ok(())
}

/// `daemon.login` is intercepted here rather than registered as an
/// operation: level gating cannot apply to the call that establishes the
/// level, and the session manager owns credential checks.
async fn login(session_id: SessionId, request: Request, state: &Arc<DaemonState>) -> Response {
    let call = CallArgs::new(request.args, request.kwargs);
    let credentials = call
        .string(0, "username")
        .and_then(|username| Ok((username.to_string(), call.string(1, "password")?.to_string())));

    let (username, password) = match credentials {
        Ok(parsed) => parsed,
        Err(e) => return Response::fault(request.id, FaultKind::AuthError, e.to_string()),
    };

    match state
        .sessions
        .authenticate(session_id, &username, &password)
        .await
    {
        Ok(level) => Response::result(request.id, serde_json::json!({ "level": level })),
        Err(e) => Response::fault(request.id, FaultKind::AuthError, e.to_string()),
    }
}
