//! # Task-backed Peer
//!
//! A [`Transport`] whose far end is a tokio task running a [`PeerService`].
//! Replies are delivered to the channel's dispatcher from the peer task, so
//! callbacks run on a different thread than the caller, as they would behind a
//! real socket.
//!
//! [`Helpdesk`] is a small ticket service used by the scenarios: request-style
//! actions answer with one response, mutations also push a `ticket.*` event.

use duplex_mux::{
    InboundHandler, RequestEnvelope, RequestId, ResponseEnvelope, Transport, TransportError, Verb,
};
use mux_telemetry::log_exchange;
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

const PEER_SERVICE: &str = "helpdesk-peer";

/// Server-side request handling.
pub trait PeerService: Send + Sync + 'static {
    /// Replies for one request, in delivery order. Pushes use
    /// `Verb::Subscription`.
    fn handle(&self, request: &RequestEnvelope) -> Vec<ResponseEnvelope>;
}

impl<S: PeerService + ?Sized> PeerService for Arc<S> {
    fn handle(&self, request: &RequestEnvelope) -> Vec<ResponseEnvelope> {
        (**self).handle(request)
    }
}

enum Frame {
    Request {
        event: String,
        envelope: RequestEnvelope,
    },
    Inject {
        event: String,
        envelope: ResponseEnvelope,
    },
}

type HandlerMap = Arc<Mutex<HashMap<String, InboundHandler>>>;

/// Transport backed by a spawned peer task.
pub struct PeerTransport {
    handlers: HandlerMap,
    frames: mpsc::UnboundedSender<Frame>,
    requests_seen: Arc<AtomicU64>,
    offline: AtomicBool,
    paused: watch::Sender<bool>,
}

impl PeerTransport {
    /// Spawn a peer that answers in arrival order.
    pub fn spawn<S: PeerService>(service: S) -> Arc<Self> {
        Self::spawn_with_jitter(service, None)
    }

    /// Spawn a peer that delays each request's replies by a random amount up
    /// to `max_jitter`, so responses come back out of order.
    pub fn spawn_with_jitter<S: PeerService>(
        service: S,
        max_jitter: Option<Duration>,
    ) -> Arc<Self> {
        let (frames, mut rx) = mpsc::unbounded_channel::<Frame>();
        let handlers: HandlerMap = Arc::new(Mutex::new(HashMap::new()));
        let requests_seen = Arc::new(AtomicU64::new(0));
        let (paused, mut paused_rx) = watch::channel(false);

        let peer_handlers = handlers.clone();
        let seen = requests_seen.clone();
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                // Hold frames while paused; a dropped sender means shutdown.
                if paused_rx.wait_for(|paused| !*paused).await.is_err() {
                    break;
                }
                let (event, replies) = match frame {
                    Frame::Request { event, envelope } => {
                        seen.fetch_add(1, Ordering::Relaxed);
                        let replies = service.handle(&envelope);
                        log_exchange!(
                            debug,
                            PEER_SERVICE,
                            "Request served",
                            request_id = %envelope.request_id,
                            action = %envelope.action,
                            replies = replies.len()
                        );
                        (event, replies)
                    }
                    Frame::Inject { event, envelope } => (event, vec![envelope]),
                };

                match max_jitter {
                    Some(max) if !max.is_zero() => {
                        let delay = rand::thread_rng().gen_range(Duration::ZERO..=max);
                        let handlers = peer_handlers.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            deliver_all(&handlers, &event, replies);
                        });
                    }
                    _ => deliver_all(&peer_handlers, &event, replies),
                }
            }
        });

        Arc::new(Self {
            handlers,
            frames,
            requests_seen,
            offline: AtomicBool::new(false),
            paused,
        })
    }

    /// Push an envelope from the peer side, ordered after everything already
    /// sent to the peer.
    pub fn inject(&self, event: &str, envelope: ResponseEnvelope) -> anyhow::Result<()> {
        self.frames
            .send(Frame::Inject {
                event: event.to_string(),
                envelope,
            })
            .map_err(|_| anyhow::anyhow!("peer task stopped"))
    }

    /// Push a subscription event for `action`.
    pub fn push(&self, event: &str, action: &str, data: Value) -> anyhow::Result<()> {
        self.inject(
            event,
            ResponseEnvelope {
                method: Verb::Subscription,
                action: action.to_string(),
                request_id: RequestId::generate(),
                status: 200,
                data,
            },
        )
    }

    /// Forget every inbound listener, as a reconnecting socket would.
    pub fn reset_listeners(&self) {
        self.handlers.lock().clear();
    }

    /// Refuse sends until set back to false.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Stop serving frames until [`resume`](Self::resume). Sends are still
    /// accepted and queued in order.
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn requests_seen(&self) -> u64 {
        self.requests_seen.load(Ordering::Relaxed)
    }
}

fn deliver_all(handlers: &HandlerMap, event: &str, replies: Vec<ResponseEnvelope>) {
    for reply in replies {
        // Clone out so the handler runs without the map locked.
        let handler = handlers.lock().get(event).cloned();
        match handler {
            Some(handler) => handler(reply),
            None => {
                log_exchange!(warn, PEER_SERVICE, "No listener for reply", event = event);
            }
        }
    }
}

impl Transport for PeerTransport {
    fn send(&self, event: &str, envelope: RequestEnvelope) -> Result<(), TransportError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Send("peer offline".to_string()));
        }
        self.frames
            .send(Frame::Request {
                event: event.to_string(),
                envelope,
            })
            .map_err(|_| TransportError::Closed)
    }

    fn on_receive(&self, event: &str, handler: InboundHandler) {
        self.handlers.lock().insert(event.to_string(), handler);
    }

    fn listener(&self, event: &str) -> Option<InboundHandler> {
        self.handlers.lock().get(event).cloned()
    }

    fn remove_listener(&self, event: &str) -> bool {
        self.handlers.lock().remove(event).is_some()
    }
}

// =============================================================================
// HELPDESK SERVICE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    pub title: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct TicketRef {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct NewTicket {
    title: String,
}

#[derive(Debug, Deserialize)]
struct StatusChange {
    id: u64,
    status: String,
}

/// In-memory ticket service.
#[derive(Default)]
pub struct Helpdesk {
    tickets: Mutex<BTreeMap<u64, Ticket>>,
    next_id: AtomicU64,
    /// Answer every request-style call twice.
    pub duplicate_responses: AtomicBool,
}

impl Helpdesk {
    /// A helpdesk holding tickets `1..=count`, all `open`.
    pub fn with_tickets(count: u64) -> Self {
        let desk = Self::default();
        for _ in 0..count {
            let id = desk.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            desk.tickets.lock().insert(
                id,
                Ticket {
                    id,
                    title: format!("ticket {id}"),
                    status: "open".to_string(),
                },
            );
        }
        desk
    }

    pub fn ticket(&self, id: u64) -> Option<Ticket> {
        self.tickets.lock().get(&id).cloned()
    }

    fn route(&self, request: &RequestEnvelope) -> (i64, Value, Option<(&'static str, Value)>) {
        match (request.method, request.action.as_str()) {
            (Verb::Get, "ticket.fetch") => match parse::<TicketRef>(&request.data) {
                Some(TicketRef { id }) => match self.ticket(id) {
                    Some(ticket) => (200, to_value(&ticket), None),
                    None => (404, json!({"error": "ticket not found"}), None),
                },
                None => (400, json!({"error": "id required"}), None),
            },
            (Verb::Get, "ticket.list") => {
                let tickets: Vec<Ticket> = self.tickets.lock().values().cloned().collect();
                (200, to_value(&tickets), None)
            }
            (Verb::Post, "ticket.create") => match parse::<NewTicket>(&request.data) {
                Some(NewTicket { title }) => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
                    let ticket = Ticket {
                        id,
                        title,
                        status: "open".to_string(),
                    };
                    self.tickets.lock().insert(id, ticket.clone());
                    let body = to_value(&ticket);
                    (201, body.clone(), Some(("ticket.created", body)))
                }
                None => (400, json!({"error": "title required"}), None),
            },
            (Verb::Patch, "ticket.update") => match parse::<StatusChange>(&request.data) {
                Some(StatusChange { id, status }) => {
                    let updated = self.tickets.lock().get_mut(&id).map(|ticket| {
                        ticket.status = status;
                        ticket.clone()
                    });
                    match updated {
                        Some(ticket) => {
                            let body = to_value(&ticket);
                            (200, body.clone(), Some(("ticket.updated", body)))
                        }
                        None => (404, json!({"error": "ticket not found"}), None),
                    }
                }
                None => (400, json!({"error": "id and status required"}), None),
            },
            (Verb::Delete, "ticket.delete") => match parse::<TicketRef>(&request.data) {
                Some(TicketRef { id }) if self.tickets.lock().remove(&id).is_some() => {
                    (204, Value::Null, Some(("ticket.deleted", json!({"id": id}))))
                }
                Some(_) => (404, json!({"error": "ticket not found"}), None),
                None => (400, json!({"error": "id required"}), None),
            },
            _ => (400, json!({"error": "unknown action"}), None),
        }
    }
}

impl PeerService for Helpdesk {
    fn handle(&self, request: &RequestEnvelope) -> Vec<ResponseEnvelope> {
        // Subscriptions are acknowledged by later pushes only.
        if request.method.is_subscription() {
            return Vec::new();
        }

        let (status, data, push) = self.route(request);
        let response = ResponseEnvelope {
            method: request.method,
            action: request.action.clone(),
            request_id: request.request_id.clone(),
            status,
            data,
        };

        let mut replies = vec![response.clone()];
        if self.duplicate_responses.load(Ordering::Relaxed) {
            replies.push(response);
        }
        if let Some((action, data)) = push {
            replies.push(ResponseEnvelope {
                method: Verb::Subscription,
                action: action.to_string(),
                request_id: RequestId::generate(),
                status: 200,
                data,
            });
        }
        replies
    }
}

fn parse<T: serde::de::DeserializeOwned>(data: &Value) -> Option<T> {
    serde_json::from_value(data.clone()).ok()
}

fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
