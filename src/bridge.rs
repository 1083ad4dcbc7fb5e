//! Request/response correlation between two isolated contexts, e.g. an
//! inspector panel and the page it inspects.
//!
//! Each request is wrapped in an [`Envelope`] with a fresh id and pushed on an
//! outbound channel; whoever serves the other side answers by handing the
//! response back through [`Bridge::dispatch`] with the same id.

use crate::error::{LocatorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, oneshot};

/// Message plus its correlation id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub id: u64,
    pub payload: T,
}

type Pending<Resp> = Arc<Mutex<HashMap<u64, oneshot::Sender<Resp>>>>;

pub struct Bridge<Req, Resp> {
    request_id: AtomicU64,
    pending: Pending<Resp>,
    outbound: mpsc::UnboundedSender<Envelope<Req>>,
    timeout: Duration,
}

impl<Req, Resp> Bridge<Req, Resp> {
    /// Create a bridge and the receiving end of its outbound requests
    pub fn new(timeout: Duration) -> (Self, mpsc::UnboundedReceiver<Envelope<Req>>) {
        let (outbound, requests) = mpsc::unbounded_channel();
        let bridge = Self { request_id: AtomicU64::new(1), pending: Arc::new(Mutex::new(HashMap::new())), outbound, timeout };
        (bridge, requests)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a request and wait for the response carrying the same id
    pub async fn request(&self, payload: Req) -> Result<Resp> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if self.outbound.send(Envelope { id, payload }).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(LocatorError::BridgeClosed);
        }
        log::trace!("Bridge request {} sent", id);

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(LocatorError::BridgeClosed),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                log::debug!("Bridge request {} timed out after {:?}", id, self.timeout);
                Err(LocatorError::BridgeTimeout(id))
            }
        }
    }

    /// Resolve the pending request with `response.id`.
    ///
    /// Returns false for unknown ids (already timed out, or never issued).
    pub async fn dispatch(&self, response: Envelope<Resp>) -> bool {
        let Some(sender) = self.pending.lock().await.remove(&response.id) else {
            log::debug!("Dropping response for unknown request {}", response.id);
            return false;
        };
        sender.send(response.payload).is_ok()
    }

    /// Number of requests still waiting for a response
    pub async fn in_flight(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_out_of_order_responses() {
        let (bridge, mut requests) = Bridge::<String, usize>::new(Duration::from_secs(5));
        let bridge = Arc::new(bridge);

        let first = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.request("short".to_string()).await }
        });
        let second = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.request("much longer".to_string()).await }
        });

        let a = requests.recv().await.unwrap();
        let b = requests.recv().await.unwrap();
        assert_ne!(a.id, b.id);

        // Answer in reverse order
        assert!(bridge.dispatch(Envelope { id: b.id, payload: b.payload.len() }).await);
        assert!(bridge.dispatch(Envelope { id: a.id, payload: a.payload.len() }).await);

        let mut results = vec![first.await.unwrap().unwrap(), second.await.unwrap().unwrap()];
        results.sort();
        assert_eq!(results, vec![5, 11]);
        assert_eq!(bridge.in_flight().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout() {
        let (bridge, mut requests) = Bridge::<(), ()>::new(Duration::from_millis(100));

        let result = bridge.request(()).await;
        let sent = requests.recv().await.unwrap();

        assert!(matches!(result, Err(LocatorError::BridgeTimeout(id)) if id == sent.id));
        assert_eq!(bridge.in_flight().await, 0);

        // A late answer is dropped
        assert!(!bridge.dispatch(Envelope { id: sent.id, payload: () }).await);
    }

    #[tokio::test]
    async fn test_closed_channel() {
        let (bridge, requests) = Bridge::<u8, u8>::new(Duration::from_secs(1));
        drop(requests);

        assert!(matches!(bridge.request(1).await, Err(LocatorError::BridgeClosed)));
        assert_eq!(bridge.in_flight().await, 0);
    }

    #[test]
    fn test_envelope_wire_format() {
        let json = serde_json::to_value(Envelope { id: 7, payload: "pick" }).unwrap();
        assert_eq!(json, serde_json::json!({"id": 7, "payload": "pick"}));
    }
}
