//! In-process request/response transport.
//!
//! Callers hold a [`RouterClient`]; the [`MessageRouter`](crate::router::MessageRouter)
//! consumes the matching [`Envelope`] receiver. Each awaited request carries
//! a one-shot reply slot and a fresh correlation id, and is bounded by the
//! client's timeout.

use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::config::{VaultConfig, DEFAULT_REQUEST_TIMEOUT};
use crate::error::{VaultError, VaultResult};
use crate::types::{MessageType, Request, Response};

/// One inbound request and the slot its response goes to.
#[derive(Debug)]
pub struct Envelope {
    pub request: Request,
    /// `None` for fire-and-forget requests
    pub reply: Option<oneshot::Sender<Response>>,
}

/// Inbound half of the transport, handed to the router
pub type Inbound = mpsc::Receiver<Envelope>;

/// Create a transport with the default request timeout.
pub fn channel(capacity: usize) -> (RouterClient, Inbound) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let client = RouterClient {
        tx,
        timeout: DEFAULT_REQUEST_TIMEOUT,
    };
    (client, rx)
}

/// Create a transport sized and timed from a [`VaultConfig`].
pub fn channel_from_config(config: &VaultConfig) -> (RouterClient, Inbound) {
    let (client, rx) = channel(config.channel_capacity);
    (client.with_timeout(config.request_timeout), rx)
}

/// Caller side of the transport.
#[derive(Debug, Clone)]
pub struct RouterClient {
    tx: mpsc::Sender<Envelope>,
    timeout: Duration,
}

impl RouterClient {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a request with a fresh correlation id and wait for its response.
    pub async fn request(
        &self,
        kind: impl Into<MessageType>,
        payload: Option<Value>,
    ) -> VaultResult<Response> {
        let mut request = Request::new(kind).with_request_id(Ulid::new().to_string());
        request.payload = payload;
        self.call(request).await
    }

    /// Send a prepared request and wait for its response.
    ///
    /// Fails with [`VaultError::Timeout`] if no response arrives in time and
    /// with [`VaultError::Transport`] if the router is gone or answers with
    /// a different correlation id.
    pub async fn call(&self, request: Request) -> VaultResult<Response> {
        let expected_id = request.request_id.clone();
        let kind = request.kind.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        debug!(message_type = %kind, request_id = ?expected_id, "Sending request");

        let exchange = async {
            self.tx
                .send(Envelope {
                    request,
                    reply: Some(reply_tx),
                })
                .await
                .map_err(|_| VaultError::Transport("router is not listening".to_string()))?;

            reply_rx.await.map_err(|_| {
                VaultError::Transport(format!("{} was dropped without a response", kind))
            })
        };

        let response = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(request_id = ?expected_id, timeout = ?self.timeout, "Request timed out");
                return Err(VaultError::Timeout(self.timeout));
            }
        };

        if response.request_id != expected_id {
            return Err(VaultError::Transport(format!(
                "correlation id mismatch: sent {:?}, received {:?}",
                expected_id, response.request_id
            )));
        }

        Ok(response)
    }

    /// Typed request: serialize `payload`, decode `data` on success, and turn
    /// a failure response into [`VaultError::Remote`].
    pub async fn send<P, R>(&self, kind: impl Into<MessageType>, payload: &P) -> VaultResult<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let payload = serde_json::to_value(payload)
            .map_err(|e| VaultError::Serialization(e.to_string()))?;
        let response = self.request(kind, Some(payload)).await?;
        decode_response(response)
    }

    /// Typed request without a payload.
    pub async fn send_empty<R: DeserializeOwned>(
        &self,
        kind: impl Into<MessageType>,
    ) -> VaultResult<R> {
        let response = self.request(kind, None).await?;
        decode_response(response)
    }

    /// Deliver a request without a correlation id and without waiting.
    ///
    /// Only delivery into the transport is reported; handler failures are
    /// not observable.
    pub fn send_fire_and_forget(
        &self,
        kind: impl Into<MessageType>,
        payload: Option<Value>,
    ) -> VaultResult<()> {
        let mut request = Request::new(kind);
        request.payload = payload;
        let kind = request.kind.clone();

        self.tx
            .try_send(Envelope {
                request,
                reply: None,
            })
            .map_err(|e| {
                warn!(message_type = %kind, error = %e, "Fire-and-forget delivery failed");
                let reason = match e {
                    mpsc::error::TrySendError::Full(_) => "transport is full",
                    mpsc::error::TrySendError::Closed(_) => "router is not listening",
                };
                VaultError::Transport(reason.to_string())
            })
    }
}

fn decode_response<R: DeserializeOwned>(response: Response) -> VaultResult<R> {
    if !response.success {
        return Err(VaultError::Remote(
            response
                .error
                .unwrap_or_else(|| "Unknown error".to_string()),
        ));
    }

    serde_json::from_value(response.data.unwrap_or(Value::Null))
        .map_err(|e| VaultError::Serialization(e.to_string()))
}
