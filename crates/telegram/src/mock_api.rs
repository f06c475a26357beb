//! In-process Bot API stand-in for tests.
//!
//! Every request is recorded. Responses can be scripted per method; anything
//! unscripted gets a plausible success answer.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicI32, Ordering},
    },
    time::Duration,
};

use {
    axum::{Json, Router, body::Bytes, extract::State, http::Uri, routing::post},
    serde_json::{Value, json},
    tokio::sync::oneshot,
};

pub const CHAT_ID: i64 = -100200;

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    /// Method as it appears in the request path, e.g. `SendMessage`.
    pub method: String,
    pub body: String,
}

#[derive(Clone, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    scripted: Arc<Mutex<HashMap<String, VecDeque<Value>>>>,
    last_id: Arc<AtomicI32>,
}

pub struct MockBotApi {
    state: MockState,
    url: reqwest::Url,
    _shutdown: oneshot::Sender<()>,
}

impl MockBotApi {
    pub async fn start() -> Self {
        let state = MockState::default();
        let app = Router::new()
            .route("/{*path}", post(handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("serve mock bot api");
        });

        Self {
            state,
            url: reqwest::Url::parse(&format!("http://{addr}/")).expect("parse api url"),
            _shutdown: shutdown_tx,
        }
    }

    pub fn bot(&self) -> teloxide::Bot {
        teloxide::Bot::new("test-token").set_api_url(self.url.clone())
    }

    /// Queue a full response envelope for the next call of `method`.
    pub fn respond(&self, method: &str, envelope: Value) {
        self.state
            .scripted
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(envelope);
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Requests other than `GetUpdates`.
    pub fn calls(&self) -> Vec<CapturedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method != "GetUpdates")
            .collect()
    }

    /// Message id handed out by the most recent send.
    pub fn last_id(&self) -> i32 {
        self.state.last_id.load(Ordering::SeqCst)
    }
}

pub fn not_modified() -> Value {
    json!({
        "ok": false,
        "error_code": 400,
        "description": "Bad Request: message is not modified: specified new message content and reply markup are exactly the same as a current content and reply markup of the message"
    })
}

pub fn channel_message(id: i32, chat_id: i64, text: &str) -> Value {
    json!({
        "message_id": id,
        "date": 0,
        "chat": { "id": chat_id, "type": "channel", "title": "Mirror" },
        "text": text
    })
}

async fn handler(State(state): State<MockState>, uri: Uri, body: Bytes) -> Json<Value> {
    let method = uri.path().rsplit('/').next().unwrap_or_default().to_string();
    state.requests.lock().unwrap().push(CapturedRequest {
        method: method.clone(),
        body: String::from_utf8_lossy(&body).to_string(),
    });

    let scripted = state
        .scripted
        .lock()
        .unwrap()
        .get_mut(&method)
        .and_then(VecDeque::pop_front);
    if let Some(envelope) = scripted {
        return Json(envelope);
    }

    let result = match method.as_str() {
        "GetUpdates" => {
            // Stand in for long polling so idle loops do not spin.
            tokio::time::sleep(Duration::from_millis(20)).await;
            json!([])
        },
        "SendMessage" | "SendPhoto" | "SendDocument" | "SendVideo" => {
            let id = state.last_id.fetch_add(1, Ordering::SeqCst) + 1;
            channel_message(id, CHAT_ID, "ok")
        },
        "CopyMessage" => {
            let id = state.last_id.fetch_add(1, Ordering::SeqCst) + 1;
            json!({ "message_id": id })
        },
        "EditMessageText" | "EditMessageCaption" => channel_message(1, CHAT_ID, "ok"),
        _ => json!(true),
    };
    Json(json!({ "ok": true, "result": result }))
}
