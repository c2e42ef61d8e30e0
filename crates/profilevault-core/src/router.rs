//! Typed message router.
//!
//! A single-handler table: each message type maps to at most one async
//! handler, and registering a type again replaces the previous handler.
//!
//! ```text
//! Unattached --on()--> Configured --listen()--> Listening
//! ```
//!
//! [`MessageRouter::listen`] consumes the router, so a listening router can
//! no longer be reconfigured and there is no way back.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{VaultError, VaultResult};
use crate::transport::{Envelope, Inbound};
use crate::types::{MessageType, Request, Response};

type Handler = Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, VaultResult<Value>> + Send + Sync>;

/// Lifecycle of a router instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    /// Constructed, no handlers
    Unattached,
    /// At least one handler registered, not yet listening
    Configured,
    /// Bound to a transport
    Listening,
}

/// Dispatches requests to the handler registered for their type.
#[derive(Default)]
pub struct MessageRouter {
    handlers: HashMap<MessageType, Handler>,
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("message_types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RouterState {
        if self.handlers.is_empty() {
            RouterState::Unattached
        } else {
            RouterState::Configured
        }
    }

    /// Whether a handler is registered for `kind`
    pub fn handles(&self, kind: &MessageType) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Register the handler for a message type, replacing any previous one.
    ///
    /// The request payload is decoded into `P` (a missing payload decodes
    /// from `null`); a payload that does not fit is reported as
    /// [`VaultError::Validation`] without invoking the handler. The handler's
    /// result is serialized into the response `data`.
    pub fn on<P, R, F, Fut>(&mut self, kind: impl Into<MessageType>, handler: F) -> &mut Self
    where
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = VaultResult<R>> + Send + 'static,
    {
        let kind = kind.into();
        let tag = kind.clone();

        let erased: Handler = Arc::new(move |payload: Option<Value>| {
            match serde_json::from_value::<P>(payload.unwrap_or(Value::Null)) {
                Ok(payload) => {
                    let fut = handler(payload);
                    async move {
                        let result = fut.await?;
                        serde_json::to_value(result)
                            .map_err(|e| VaultError::Serialization(e.to_string()))
                    }
                    .boxed()
                }
                Err(e) => {
                    let err = VaultError::Validation(format!("Invalid payload for {}: {}", tag, e));
                    async move { Err::<Value, _>(err) }.boxed()
                }
            }
        });

        if self.handlers.insert(kind.clone(), erased).is_some() {
            debug!(message_type = %kind, "Replaced existing handler");
        } else {
            debug!(message_type = %kind, "Registered handler");
        }
        self
    }

    /// Run one request through its handler and build the correlated response.
    pub async fn dispatch(&self, request: Request) -> Response {
        let Request {
            kind,
            payload,
            request_id,
        } = request;

        let Some(handler) = self.handlers.get(&kind).cloned() else {
            warn!(message_type = %kind, "No handler registered");
            return Response::failure(VaultError::NoHandler(kind.to_string()).to_string(), request_id);
        };

        let outcome = AssertUnwindSafe(async move { (*handler)(payload).await })
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(VaultError::HandlerPanicked(
                    kind.to_string(),
                    panic_message(panic.as_ref()),
                ))
            });

        match outcome {
            Ok(data) => Response::success(data, request_id),
            Err(e) => {
                error!(message_type = %kind, error = %e, "Handler failed");
                Response::failure(e.to_string(), request_id)
            }
        }
    }

    /// Bind to a transport and start processing requests.
    ///
    /// Each envelope is handled on its own task, so responses may complete
    /// out of order. Must be called from within a tokio runtime.
    pub fn listen(self, mut inbound: Inbound) -> ListeningRouter {
        let message_types: Vec<MessageType> = self.handlers.keys().cloned().collect();
        info!(handlers = message_types.len(), "Message router listening");

        let router = Arc::new(self);
        let task = tokio::spawn(async move {
            while let Some(envelope) = inbound.recv().await {
                let router = Arc::clone(&router);
                tokio::spawn(async move {
                    let Envelope { request, reply } = envelope;
                    let response = router.dispatch(request).await;
                    if let Some(reply) = reply {
                        if reply.send(response).is_err() {
                            debug!("Caller went away before the response was delivered");
                        }
                    }
                });
            }
            debug!("Inbound transport closed");
        });

        ListeningRouter {
            message_types,
            task,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Handle to a router that is bound to its transport.
#[derive(Debug)]
pub struct ListeningRouter {
    message_types: Vec<MessageType>,
    task: JoinHandle<()>,
}

impl ListeningRouter {
    pub fn state(&self) -> RouterState {
        RouterState::Listening
    }

    pub fn handles(&self, kind: &MessageType) -> bool {
        self.message_types.contains(kind)
    }

    /// Wait until every client has been dropped and the inbound loop ends.
    pub async fn closed(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "Router task ended abnormally");
        }
    }
}
