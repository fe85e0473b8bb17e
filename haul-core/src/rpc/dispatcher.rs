//! Dispatcher - tagged operation registry and call execution
//!
//! Registry mutation is atomic relative to dispatch: lookups clone the
//! handler `Arc` out under a read lock, so a register or unregister either
//! happens before a given lookup or after it, never partway. A dispatch
//! already past its lookup runs the handler it resolved even if the
//! operation is removed meanwhile; the registry guarantees present-or-absent,
//! not revoked-mid-call.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::RwLock;
use tracing::{error, warn};

use haul_proto::{FaultKind, Request, Response};
use haul_plugin_api::{AuthLevel, CallArgs, CallContext, Handler};

use crate::error::{AuthError, DispatchError};
use crate::session::SessionId;

struct OperationRecord {
    handler: Arc<dyn Handler>,
    min_level: AuthLevel,
    owner: Option<String>,
}

/// Introspection view of one registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationInfo {
    pub name: String,
    pub min_level: AuthLevel,
    pub owner: Option<String>,
}

/// Registry of callable operations plus the dispatch algorithm.
pub struct Dispatcher {
    operations: RwLock<HashMap<String, OperationRecord>>,
    handler_timeout: Option<Duration>,
}

impl Dispatcher {
    /// A dispatcher without a handler timeout.
    pub fn new() -> Self {
        Self {
            operations: RwLock::new(HashMap::new()),
            handler_timeout: None,
        }
    }

    /// A dispatcher that answers a `timeout` fault for any handler running
    /// longer than `timeout`. The handler itself keeps running in the
    /// background and its eventual result is discarded.
    pub fn with_handler_timeout(timeout: Duration) -> Self {
        Self {
            operations: RwLock::new(HashMap::new()),
            handler_timeout: Some(timeout),
        }
    }

    /// Register an operation. Fails if the name is already taken.
    pub async fn register(
        &self,
        name: impl Into<String>,
        min_level: AuthLevel,
        handler: Arc<dyn Handler>,
        owner: Option<String>,
    ) -> Result<(), DispatchError> {
        let name = name.into();
        let mut operations = self.operations.write().await;
        if operations.contains_key(&name) {
            return Err(DispatchError::DuplicateOperation(name));
        }
        operations.insert(
            name,
            OperationRecord {
                handler,
                min_level,
                owner,
            },
        );
        Ok(())
    }

    /// Remove every operation registered under the owner tag. Returns the
    /// number removed; zero is a no-op, not an error.
    pub async fn unregister_all(&self, owner: &str) -> usize {
        let mut operations = self.operations.write().await;
        let before = operations.len();
        operations.retain(|_, record| record.owner.as_deref() != Some(owner));
        before - operations.len()
    }

    /// Authorize and invoke one request, producing exactly one response
    /// carrying the request's id.
    pub async fn dispatch(
        &self,
        session_id: SessionId,
        level: AuthLevel,
        request: Request,
    ) -> Response {
        let Request {
            id,
            operation,
            args,
            kwargs,
        } = request;

        let resolved = {
            let operations = self.operations.read().await;
            operations
                .get(&operation)
                .map(|record| (record.handler.clone(), record.min_level))
        };

        let Some((handler, min_level)) = resolved else {
            return Response::fault(
                id,
                FaultKind::MethodNotFound,
                format!("no such operation: {operation}"),
            );
        };

        if level < min_level {
            let denial = AuthError::InsufficientLevel {
                operation,
                required: min_level,
                actual: level,
            };
            return Response::fault(id, FaultKind::AuthError, denial.to_string());
        }

        let ctx = CallContext {
            session_id,
            auth_level: level,
            request_id: id,
        };
        let call = CallArgs::new(args, kwargs);

        // Spawned so a timeout leaves the handler running detached; the
        // catch_unwind keeps a panicking handler from poisoning anything
        // beyond its own call.
        let task = tokio::spawn(
            AssertUnwindSafe(async move { handler.call(&ctx, &call).await }).catch_unwind(),
        );

        let joined = match self.handler_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, task).await {
                Ok(joined) => joined,
                Err(_elapsed) => {
                    warn!(
                        operation = %operation,
                        request = id,
                        "handler exceeded {}ms; result will be discarded",
                        timeout.as_millis()
                    );
                    return Response::fault(
                        id,
                        FaultKind::Timeout,
                        format!(
                            "operation '{operation}' did not complete within {}ms",
                            timeout.as_millis()
                        ),
                    );
                }
            },
            None => task.await,
        };

        match joined {
            Ok(Ok(Ok(value))) => Response::result(id, value),
            Ok(Ok(Err(err))) => Response::fault(id, FaultKind::HandlerError, err.to_string()),
            Ok(Err(_panic)) => {
                error!(operation = %operation, request = id, "handler panicked");
                Response::fault(
                    id,
                    FaultKind::HandlerError,
                    format!("operation '{operation}' panicked"),
                )
            }
            Err(join_err) => {
                error!(operation = %operation, request = id, error = %join_err, "handler task failed");
                Response::fault(
                    id,
                    FaultKind::HandlerError,
                    format!("operation '{operation}' aborted"),
                )
            }
        }
    }

    /// Whether an operation name is currently registered.
    pub async fn contains(&self, name: &str) -> bool {
        self.operations.read().await.contains_key(name)
    }

    /// Sorted introspection snapshot of the registry.
    pub async fn operations(&self) -> Vec<OperationInfo> {
        let operations = self.operations.read().await;
        let mut infos: Vec<OperationInfo> = operations
            .iter()
            .map(|(name, record)| OperationInfo {
                name: name.clone(),
                min_level: record.min_level,
                owner: record.owner.clone(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
