//! JSON-RPC ledger client
//!
//! Reads go over HTTP (`getAccountInfo`, `getMultipleAccounts`,
//! `getEpochInfo`), account payloads requested as base64. Subscriptions go
//! over one shared WebSocket, opened on the first `subscribe`:
//! - `accountSubscribe` requests are matched to their confirmation by
//!   request id
//! - `accountNotification` messages are routed to callbacks by
//!   subscription id
//!
//! A dropped socket is reopened with exponential backoff. Every registered
//! account is subscribed again on the new socket and the routing map is
//! rebuilt from the fresh confirmations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tokio::sync::{mpsc, oneshot, OnceCell};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::ledger::{AccountCallback, AccountKey, EpochInfo, LedgerClient};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::{BridgeConfig, BridgeError};

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Contextual<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct RpcAccount {
    /// `[payload, encoding]`
    data: Vec<String>,
}

impl RpcAccount {
    fn decode(&self) -> Result<Vec<u8>, BridgeError> {
        match self.data.as_slice() {
            [payload, encoding] if encoding == "base64" => BASE64
                .decode(payload)
                .map_err(|e| BridgeError::Payload(format!("base64: {}", e))),
            other => Err(BridgeError::Payload(format!(
                "unsupported account data shape: {:?}",
                other.get(1)
            ))),
        }
    }
}

/// Events read off the subscription socket.
#[derive(Debug, PartialEq)]
enum WsEvent {
    Confirmed { id: u64, subscription: u64 },
    Rejected { id: u64, code: i64, message: String },
    Notification { subscription: u64, data: Vec<u8> },
}

fn parse_ws_message(text: &str) -> Result<Option<WsEvent>, BridgeError> {
    let msg: JsonValue =
        serde_json::from_str(text).map_err(|e| BridgeError::Payload(e.to_string()))?;

    if msg.get("method").and_then(JsonValue::as_str) == Some("accountNotification") {
        let params = &msg["params"];
        let subscription = params["subscription"]
            .as_u64()
            .ok_or_else(|| BridgeError::Payload("notification without subscription".into()))?;
        let account: RpcAccount = serde_json::from_value(params["result"]["value"].clone())
            .map_err(|e| BridgeError::Payload(e.to_string()))?;
        return Ok(Some(WsEvent::Notification {
            subscription,
            data: account.decode()?,
        }));
    }

    let Some(id) = msg.get("id").and_then(JsonValue::as_u64) else {
        return Ok(None);
    };
    if let Some(err) = msg.get("error") {
        return Ok(Some(WsEvent::Rejected {
            id,
            code: err["code"].as_i64().unwrap_or_default(),
            message: err["message"].as_str().unwrap_or_default().to_string(),
        }));
    }
    match msg.get("result").and_then(JsonValue::as_u64) {
        Some(subscription) => Ok(Some(WsEvent::Confirmed { id, subscription })),
        None => Ok(None),
    }
}

struct SubscribeCommand {
    key: AccountKey,
    callback: AccountCallback,
    reply: oneshot::Sender<Result<u64, BridgeError>>,
}

struct Registration {
    key: AccountKey,
    callback: AccountCallback,
    /// Taken by the first confirmation or rejection.
    reply: Option<oneshot::Sender<Result<u64, BridgeError>>>,
}

/// Subscription bookkeeping that outlives any one socket.
///
/// Registrations are kept in slots for the client's lifetime. Request ids
/// and subscription ids only live as long as the socket that issued them,
/// so a reconnect drops both maps and reissues a request per slot.
struct SubscriptionRouter {
    commitment: String,
    next_id: u64,
    slots: Vec<Option<Registration>>,
    /// request id -> slot
    pending: HashMap<u64, usize>,
    /// subscription id -> slot
    routes: HashMap<u64, usize>,
}

impl SubscriptionRouter {
    fn new(commitment: String) -> Self {
        Self {
            commitment,
            next_id: 1,
            slots: Vec::new(),
            pending: HashMap::new(),
            routes: HashMap::new(),
        }
    }

    fn register(&mut self, command: SubscribeCommand) -> usize {
        self.slots.push(Some(Registration {
            key: command.key,
            callback: command.callback,
            reply: Some(command.reply),
        }));
        self.slots.len() - 1
    }

    /// `accountSubscribe` request for a slot under a fresh request id.
    fn request(&mut self, slot: usize) -> Option<String> {
        let key = self.slots.get(slot)?.as_ref()?.key;
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id, slot);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "accountSubscribe",
            "params": [
                key.to_string(),
                { "encoding": "base64", "commitment": self.commitment },
            ],
        });
        Some(request.to_string())
    }

    fn handle(&mut self, event: WsEvent) {
        match event {
            WsEvent::Confirmed { id, subscription } => {
                let Some(slot) = self.pending.remove(&id) else {
                    return;
                };
                self.routes.insert(subscription, slot);
                if let Some(reply) = self
                    .slots
                    .get_mut(slot)
                    .and_then(Option::as_mut)
                    .and_then(|registration| registration.reply.take())
                {
                    let _ = reply.send(Ok(subscription));
                }
            }
            WsEvent::Rejected { id, code, message } => {
                let Some(slot) = self.pending.remove(&id) else {
                    return;
                };
                let Some(registration) = self.slots.get_mut(slot).and_then(Option::take) else {
                    return;
                };
                match registration.reply {
                    Some(reply) => {
                        let _ = reply.send(Err(BridgeError::Rpc { code, message }));
                    }
                    None => warn!(
                        account = %registration.key,
                        code,
                        message = %message,
                        "Resubscribe rejected, dropping account"
                    ),
                }
            }
            WsEvent::Notification { subscription, data } => {
                let registration = self
                    .routes
                    .get(&subscription)
                    .and_then(|slot| self.slots.get(*slot))
                    .and_then(Option::as_ref);
                match registration {
                    Some(registration) => (registration.callback)(&data),
                    None => debug!(subscription, "Notification for unknown subscription"),
                }
            }
        }
    }

    /// Forget every id issued on the closed socket.
    fn on_disconnect(&mut self) {
        self.pending.clear();
        self.routes.clear();
    }

    /// One request per live registration, sent first on a new socket.
    /// Callers still waiting on a first confirmation are answered by it.
    fn resubscribe_requests(&mut self) -> Vec<String> {
        let live: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| index)
            .collect();
        live.into_iter().filter_map(|slot| self.request(slot)).collect()
    }

    fn fail_all(&mut self) {
        self.on_disconnect();
        for registration in self.slots.drain(..).flatten() {
            if let Some(reply) = registration.reply {
                let _ = reply.send(Err(BridgeError::WebSocket(
                    "subscription socket could not reconnect".to_string(),
                )));
            }
        }
    }

    fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Ledger client over HTTP JSON-RPC and WebSocket subscriptions.
pub struct RpcLedgerClient {
    http: reqwest::Client,
    rpc_url: String,
    ws_url: String,
    commitment: String,
    reconnect: ReconnectConfig,
    next_id: AtomicU64,
    socket: OnceCell<mpsc::UnboundedSender<SubscribeCommand>>,
}

impl RpcLedgerClient {
    pub fn new(config: &BridgeConfig) -> Result<Self, BridgeError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            rpc_url: config.rpc_url.clone(),
            ws_url: config.ws_url.clone(),
            commitment: config.commitment.clone(),
            reconnect: config.reconnect.clone(),
            next_id: AtomicU64::new(1),
            socket: OnceCell::new(),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: JsonValue,
    ) -> Result<T, BridgeError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self.http.post(&self.rpc_url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(BridgeError::Rpc {
                code: i64::from(status.as_u16()),
                message,
            });
        }

        let reply: RpcResponse<T> = response.json().await?;
        if let Some(err) = reply.error {
            return Err(BridgeError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        reply
            .result
            .ok_or_else(|| BridgeError::Payload(format!("{} returned no result", method)))
    }

    fn account_config(&self) -> JsonValue {
        json!({ "encoding": "base64", "commitment": self.commitment })
    }

    async fn socket(&self) -> Result<&mpsc::UnboundedSender<SubscribeCommand>, BridgeError> {
        self.socket
            .get_or_try_init(|| async {
                let (stream, _) = connect_async(self.ws_url.as_str())
                    .await
                    .map_err(|e| BridgeError::WebSocket(e.to_string()))?;
                info!(url = %self.ws_url, "Subscription socket connected");

                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(supervise_socket(
                    stream,
                    self.ws_url.clone(),
                    rx,
                    SubscriptionRouter::new(self.commitment.clone()),
                    ReconnectPolicy::new(self.reconnect.clone()),
                ));
                Ok::<_, BridgeError>(tx)
            })
            .await
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

enum SessionEnd {
    /// Every client handle is gone.
    Released,
    Disconnected,
}

/// Owns the subscription socket for the client's lifetime, reconnecting
/// with backoff and resubscribing every registered account.
async fn supervise_socket(
    mut stream: WsStream,
    url: String,
    mut commands: mpsc::UnboundedReceiver<SubscribeCommand>,
    mut router: SubscriptionRouter,
    mut policy: ReconnectPolicy,
) {
    loop {
        match run_session(stream, &mut commands, &mut router).await {
            SessionEnd::Released => return,
            SessionEnd::Disconnected => router.on_disconnect(),
        }

        stream = loop {
            let Some(delay) = policy.next_delay() else {
                warn!(
                    attempts = policy.attempt_count(),
                    subscriptions = router.len(),
                    "Subscription socket gave up reconnecting"
                );
                router.fail_all();
                return;
            };
            if !accept_while_waiting(delay, &mut commands, &mut router).await {
                return;
            }
            match connect_async(url.as_str()).await {
                Ok((stream, _)) => {
                    info!(
                        attempt = policy.attempt_count(),
                        subscriptions = router.len(),
                        "Subscription socket reconnected"
                    );
                    policy.reset();
                    break stream;
                }
                Err(err) => warn!(
                    error = %err,
                    attempt = policy.attempt_count(),
                    "Subscription socket reconnect failed"
                ),
            }
        };
    }
}

/// Sleeps out a backoff delay while still queueing new registrations.
/// Returns false once every client handle is gone.
async fn accept_while_waiting(
    delay: Duration,
    commands: &mut mpsc::UnboundedReceiver<SubscribeCommand>,
    router: &mut SubscriptionRouter,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            command = commands.recv() => match command {
                Some(command) => {
                    router.register(command);
                }
                None => return false,
            },
        }
    }
}

/// Drives one connected socket: resubscribes, then sends new subscribe
/// requests and routes confirmations and notifications until it drops.
async fn run_session(
    stream: WsStream,
    commands: &mut mpsc::UnboundedReceiver<SubscribeCommand>,
    router: &mut SubscriptionRouter,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    for request in router.resubscribe_requests() {
        if let Err(err) = write.send(Message::Text(request.into())).await {
            warn!(error = %err, "Resubscribe write failed");
            return SessionEnd::Disconnected;
        }
    }

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("Subscription socket released");
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Released;
                };
                let slot = router.register(command);
                if let Some(request) = router.request(slot) {
                    // An unsent request is reissued after the reconnect.
                    if let Err(err) = write.send(Message::Text(request.into())).await {
                        warn!(error = %err, "Subscription socket write failed");
                        return SessionEnd::Disconnected;
                    }
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match parse_ws_message(text.as_str()) {
                        Ok(Some(event)) => router.handle(event),
                        Ok(None) => {}
                        Err(err) => warn!(error = %err, "Unreadable socket message"),
                    },
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        warn!(subscriptions = router.len(), "Subscription socket closed");
                        return SessionEnd::Disconnected;
                    }
                    Some(Err(err)) => {
                        warn!(error = %err, "Subscription socket failed");
                        return SessionEnd::Disconnected;
                    }
                    _ => {}
                }
            }
        }
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn get_account(&self, key: &AccountKey) -> Result<Option<Vec<u8>>, BridgeError> {
        let reply: Contextual<Option<RpcAccount>> = self
            .call("getAccountInfo", json!([key.to_string(), self.account_config()]))
            .await?;
        reply.value.map(|account| account.decode()).transpose()
    }

    async fn get_multiple_accounts(
        &self,
        keys: &[AccountKey],
    ) -> Result<Vec<Option<Vec<u8>>>, BridgeError> {
        let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
        let reply: Contextual<Vec<Option<RpcAccount>>> = self
            .call("getMultipleAccounts", json!([keys, self.account_config()]))
            .await?;
        // A bad payload drops only its own slot.
        Ok(reply
            .value
            .into_iter()
            .zip(&keys)
            .map(|(account, key)| match account.map(|a| a.decode()) {
                Some(Ok(data)) => Some(data),
                Some(Err(err)) => {
                    warn!(account = %key, error = %err, "Account payload undecodable");
                    None
                }
                None => None,
            })
            .collect())
    }

    async fn subscribe(
        &self,
        key: AccountKey,
        callback: AccountCallback,
    ) -> Result<u64, BridgeError> {
        let socket = self.socket().await?;
        let (reply, confirmed) = oneshot::channel();
        socket
            .send(SubscribeCommand {
                key,
                callback,
                reply,
            })
            .map_err(|_| BridgeError::ChannelClosed)?;
        confirmed.await.map_err(|_| BridgeError::ChannelClosed)?
    }

    async fn epoch_info(&self) -> Result<EpochInfo, BridgeError> {
        self.call("getEpochInfo", json!([{ "commitment": self.commitment }]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn test_decode_account_data() {
        let account = RpcAccount {
            data: vec![BASE64.encode([1u8, 2, 3]), "base64".to_string()],
        };
        assert_eq!(account.decode().unwrap(), vec![1, 2, 3]);

        let jsonish = RpcAccount {
            data: vec!["{}".to_string(), "jsonParsed".to_string()],
        };
        assert!(matches!(jsonish.decode(), Err(BridgeError::Payload(_))));
    }

    #[test]
    fn test_multiple_accounts_response_shape() {
        let text = format!(
            r#"{{"jsonrpc":"2.0","id":1,"result":{{"context":{{"slot":5}},"value":[
                {{"data":["{}","base64"],"executable":false,"lamports":1,"owner":"x","rentEpoch":0}},
                null
            ]}}}}"#,
            BASE64.encode([7u8; 4])
        );
        let reply: RpcResponse<Contextual<Vec<Option<RpcAccount>>>> =
            serde_json::from_str(&text).unwrap();
        let value = reply.result.unwrap().value;
        assert_eq!(value.len(), 2);
        assert_eq!(value[0].as_ref().unwrap().decode().unwrap(), vec![7u8; 4]);
        assert!(value[1].is_none());
    }

    #[test]
    fn test_rpc_error_shape() {
        let reply: RpcResponse<JsonValue> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"Too many inputs provided; max 100"}}"#,
        )
        .unwrap();
        assert!(reply.result.is_none());
        assert_eq!(reply.error.unwrap().code, -32602);
    }

    #[test]
    fn test_ws_confirmation_and_rejection() {
        assert_eq!(
            parse_ws_message(r#"{"jsonrpc":"2.0","result":23784,"id":1}"#).unwrap(),
            Some(WsEvent::Confirmed {
                id: 1,
                subscription: 23784
            })
        );
        assert_eq!(
            parse_ws_message(r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"Invalid"},"id":2}"#)
                .unwrap(),
            Some(WsEvent::Rejected {
                id: 2,
                code: -32602,
                message: "Invalid".to_string()
            })
        );
    }

    #[test]
    fn test_ws_notification() {
        let text = format!(
            r#"{{"jsonrpc":"2.0","method":"accountNotification","params":{{
                "result":{{"context":{{"slot":5199307}},"value":{{"data":["{}","base64"],"lamports":1}}}},
                "subscription":23784}}}}"#,
            BASE64.encode(b"price")
        );
        assert_eq!(
            parse_ws_message(&text).unwrap(),
            Some(WsEvent::Notification {
                subscription: 23784,
                data: b"price".to_vec()
            })
        );
    }

    #[test]
    fn test_ws_ignores_unrelated_messages() {
        assert_eq!(
            parse_ws_message(r#"{"jsonrpc":"2.0","method":"slotNotification","params":{}}"#)
                .unwrap(),
            None
        );
        assert!(parse_ws_message("not json").is_err());
    }

    fn notification(subscription: u64, payload: &[u8]) -> String {
        format!(
            r#"{{"jsonrpc":"2.0","method":"accountNotification","params":{{
                "result":{{"context":{{"slot":1}},"value":{{"data":["{}","base64"]}}}},
                "subscription":{}}}}}"#,
            BASE64.encode(payload),
            subscription
        )
    }

    fn feed(router: &mut SubscriptionRouter, text: &str) {
        if let Some(event) = parse_ws_message(text).unwrap() {
            router.handle(event);
        }
    }

    fn request_id(request: &str) -> u64 {
        let value: JsonValue = serde_json::from_str(request).unwrap();
        value["id"].as_u64().unwrap()
    }

    fn request_key(request: &str) -> String {
        let value: JsonValue = serde_json::from_str(request).unwrap();
        value["params"][0].as_str().unwrap().to_string()
    }

    fn recording(seen: &Arc<Mutex<Vec<Vec<u8>>>>) -> AccountCallback {
        let seen = seen.clone();
        Arc::new(move |data: &[u8]| seen.lock().push(data.to_vec()))
    }

    fn command(
        key: AccountKey,
        callback: AccountCallback,
    ) -> (SubscribeCommand, oneshot::Receiver<Result<u64, BridgeError>>) {
        let (reply, confirmed) = oneshot::channel();
        (
            SubscribeCommand {
                key,
                callback,
                reply,
            },
            confirmed,
        )
    }

    #[test]
    fn test_router_resubscribes_after_close() {
        let a = AccountKey::new([1; 32]);
        let b = AccountKey::new([2; 32]);
        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));
        let mut router = SubscriptionRouter::new("confirmed".to_string());

        let (cmd_a, mut reply_a) = command(a, recording(&seen_a));
        let (cmd_b, mut reply_b) = command(b, recording(&seen_b));
        let slot_a = router.register(cmd_a);
        let slot_b = router.register(cmd_b);
        let first_a = router.request(slot_a).unwrap();
        let first_b = router.request(slot_b).unwrap();
        assert_eq!(request_key(&first_a), a.to_string());

        feed(&mut router, &format!(r#"{{"jsonrpc":"2.0","result":100,"id":{}}}"#, request_id(&first_a)));
        feed(&mut router, &format!(r#"{{"jsonrpc":"2.0","result":200,"id":{}}}"#, request_id(&first_b)));
        assert_eq!(reply_a.try_recv().unwrap().unwrap(), 100);
        assert_eq!(reply_b.try_recv().unwrap().unwrap(), 200);
        feed(&mut router, &notification(100, b"a1"));
        assert_eq!(seen_a.lock().len(), 1);

        // Socket closed; the supervisor forgets its ids and reconnects.
        router.on_disconnect();
        let again = router.resubscribe_requests();
        assert_eq!(again.len(), 2);
        let keys: Vec<String> = again.iter().map(|r| request_key(r)).collect();
        assert_eq!(keys, vec![a.to_string(), b.to_string()]);
        let ids: Vec<u64> = again.iter().map(|r| request_id(r)).collect();
        assert!(!ids.contains(&request_id(&first_a)));
        assert!(!ids.contains(&request_id(&first_b)));

        // Ids from the dead socket no longer route.
        feed(&mut router, &notification(100, b"stale"));
        assert_eq!(seen_a.lock().len(), 1);

        feed(&mut router, &format!(r#"{{"jsonrpc":"2.0","result":300,"id":{}}}"#, ids[0]));
        feed(&mut router, &format!(r#"{{"jsonrpc":"2.0","result":400,"id":{}}}"#, ids[1]));
        feed(&mut router, &notification(300, b"a2"));
        feed(&mut router, &notification(400, b"b1"));
        assert_eq!(*seen_a.lock(), vec![b"a1".to_vec(), b"a2".to_vec()]);
        assert_eq!(*seen_b.lock(), vec![b"b1".to_vec()]);
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn test_router_unconfirmed_subscribe_answered_after_reconnect() {
        let key = AccountKey::new([3; 32]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut router = SubscriptionRouter::new("confirmed".to_string());
        let (cmd, mut reply) = command(key, recording(&seen));
        let slot = router.register(cmd);
        let lost = router.request(slot).unwrap();

        router.on_disconnect();
        feed(&mut router, &format!(r#"{{"jsonrpc":"2.0","result":7,"id":{}}}"#, request_id(&lost)));
        assert!(reply.try_recv().is_err());

        let again = router.resubscribe_requests();
        feed(&mut router, &format!(r#"{{"jsonrpc":"2.0","result":8,"id":{}}}"#, request_id(&again[0])));
        assert_eq!(reply.try_recv().unwrap().unwrap(), 8);
    }

    #[test]
    fn test_router_rejection_drops_registration() {
        let mut router = SubscriptionRouter::new("confirmed".to_string());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (cmd, mut reply) = command(AccountKey::new([4; 32]), recording(&seen));
        let slot = router.register(cmd);
        let request = router.request(slot).unwrap();

        feed(
            &mut router,
            &format!(
                r#"{{"jsonrpc":"2.0","error":{{"code":-32602,"message":"Invalid"}},"id":{}}}"#,
                request_id(&request)
            ),
        );
        assert!(matches!(
            reply.try_recv().unwrap(),
            Err(BridgeError::Rpc { code: -32602, .. })
        ));
        assert_eq!(router.len(), 0);
        assert!(router.resubscribe_requests().is_empty());
    }

    #[test]
    fn test_router_gives_up_answers_waiting_callers() {
        let mut router = SubscriptionRouter::new("confirmed".to_string());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (cmd, mut reply) = command(AccountKey::new([5; 32]), recording(&seen));
        router.register(cmd);

        router.fail_all();
        assert!(matches!(reply.try_recv().unwrap(), Err(BridgeError::WebSocket(_))));
        assert_eq!(router.len(), 0);
    }
}
