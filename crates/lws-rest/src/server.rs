//! REST dispatch.
//!
//! The framing rules live here: POST only, per-endpoint body caps, 404 for
//! unknown paths, 501 for registered-but-unimplemented endpoints, 400 for
//! oversized or unparsable bodies, and the handler error to status-code
//! mapping. The `logged_in` flag is connection-scoped: one TCP connection
//! is one remote `(ip, port)` while it lives, so sessions key on the peer
//! socket address.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::{ConnectInfo, DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, post};
use axum::Router;
use serde_json::Value;
use tracing::info;

use crate::error::Error;
use crate::handlers::{self, Context, HandlerState};

/// Body cap for every endpoint except transaction submission.
pub const MAX_REQUEST_SIZE: usize = 2 * 1024;

/// Body cap for `/submit_raw_tx`.
pub const MAX_SUBMIT_SIZE: usize = 50 * 1024;

/// A session outlives its last request by this much before the peer must
/// log in again.
const SESSION_TTL: Duration = Duration::from_secs(30 * 60);
const SESSION_PRUNE_THRESHOLD: usize = 10_000;

#[derive(Clone, Copy)]
enum Endpoint {
    Login,
    AddressInfo,
    AddressTxs,
    UnspentOuts,
    RandomOuts,
    ImportRequest,
    SubmitRawTx,
}

impl Endpoint {
    fn name(self) -> &'static str {
        match self {
            Endpoint::Login => "/login",
            Endpoint::AddressInfo => "/get_address_info",
            Endpoint::AddressTxs => "/get_address_txs",
            Endpoint::UnspentOuts => "/get_unspent_outs",
            Endpoint::RandomOuts => "/get_random_outs",
            Endpoint::ImportRequest => "/import_request",
            Endpoint::SubmitRawTx => "/submit_raw_tx",
        }
    }

    fn max_size(self) -> usize {
        match self {
            Endpoint::SubmitRawTx => MAX_SUBMIT_SIZE,
            _ => MAX_REQUEST_SIZE,
        }
    }

    async fn run(
        self,
        state: &HandlerState,
        root: &Value,
        ctx: &mut Context,
    ) -> Result<Value, Error> {
        match self {
            Endpoint::Login => handlers::login(state, root, ctx).await,
            Endpoint::AddressInfo => handlers::get_address_info(state, root, ctx).await,
            Endpoint::AddressTxs => handlers::get_address_txs(state, root, ctx).await,
            Endpoint::UnspentOuts => handlers::get_unspent_outs(state, root, ctx).await,
            Endpoint::RandomOuts => handlers::get_random_outs(state, root, ctx).await,
            Endpoint::ImportRequest => handlers::import_request(state, root, ctx).await,
            Endpoint::SubmitRawTx => handlers::submit_raw_tx(state, root, ctx).await,
        }
    }
}

/// Connection-scoped login state, keyed by remote socket address.
#[derive(Default)]
struct Sessions {
    inner: Mutex<HashMap<SocketAddr, Instant>>,
}

impl Sessions {
    fn is_logged_in(&self, peer: SocketAddr) -> bool {
        let sessions = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        sessions
            .get(&peer)
            .is_some_and(|seen| seen.elapsed() < SESSION_TTL)
    }

    fn mark(&self, peer: SocketAddr) {
        let mut sessions = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if sessions.len() >= SESSION_PRUNE_THRESHOLD {
            sessions.retain(|_, seen| seen.elapsed() < SESSION_TTL);
        }
        sessions.insert(peer, Instant::now());
    }
}

#[derive(Clone)]
pub struct AppState {
    handler: Arc<HandlerState>,
    sessions: Arc<Sessions>,
}

impl AppState {
    pub fn new(handler: HandlerState) -> Self {
        Self {
            handler: Arc::new(handler),
            sessions: Arc::new(Sessions::default()),
        }
    }
}

fn plain_status(code: StatusCode) -> Response {
    code.into_response()
}

async fn dispatch(
    endpoint: Endpoint,
    app: AppState,
    peer: SocketAddr,
    body: Bytes,
) -> Response {
    if body.len() > endpoint.max_size() {
        info!(
            "client {} exceeded maximum body size ({} bytes) on {}",
            peer,
            endpoint.max_size(),
            endpoint.name()
        );
        return plain_status(StatusCode::BAD_REQUEST);
    }

    let root: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => {
            info!("JSON parsing error from {} on {}", peer, endpoint.name());
            return plain_status(StatusCode::BAD_REQUEST);
        }
    };

    let mut ctx = Context { logged_in: app.sessions.is_logged_in(peer) };
    let result = endpoint.run(&app.handler, &root, &mut ctx).await;
    if ctx.logged_in {
        app.sessions.mark(peer);
    }

    match result {
        Ok(value) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            value.to_string(),
        )
            .into_response(),
        Err(err) => {
            info!("{} from {} on {}", err, peer, endpoint.name());
            let code = StatusCode::from_u16(err.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            plain_status(code)
        }
    }
}

macro_rules! route_fn {
    ($name:ident, $endpoint:expr) => {
        async fn $name(
            State(app): State<AppState>,
            ConnectInfo(peer): ConnectInfo<SocketAddr>,
            body: Bytes,
        ) -> Response {
            dispatch($endpoint, app, peer, body).await
        }
    };
}

route_fn!(ep_login, Endpoint::Login);
route_fn!(ep_address_info, Endpoint::AddressInfo);
route_fn!(ep_address_txs, Endpoint::AddressTxs);
route_fn!(ep_unspent_outs, Endpoint::UnspentOuts);
route_fn!(ep_random_outs, Endpoint::RandomOuts);
route_fn!(ep_import_request, Endpoint::ImportRequest);
route_fn!(ep_submit_raw_tx, Endpoint::SubmitRawTx);

async fn not_implemented() -> Response {
    plain_status(StatusCode::NOT_IMPLEMENTED)
}

/// The REST router. Unknown paths fall through to 404 and non-POST methods
/// on registered paths to 405.
pub fn router(app: AppState) -> Router {
    Router::new()
        .route("/login", post(ep_login))
        .route("/get_address_info", post(ep_address_info))
        .route("/get_address_txs", post(ep_address_txs))
        .route("/get_unspent_outs", post(ep_unspent_outs))
        .route("/get_random_outs", post(ep_random_outs))
        .route("/import_request", post(ep_import_request))
        .route("/submit_raw_tx", post(ep_submit_raw_tx))
        .route("/get_txt_records", any(not_implemented))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(app)
}

/// Parse `http://host[:port]` into host and port, defaulting the port to
/// 8080. A trailing `]` marks a bare IPv6 literal without a port.
pub fn parse_bind(address: &str) -> Result<(String, u16), Error> {
    let rest = address.strip_prefix("http://").ok_or(Error::InvalidUriScheme)?;
    match rest.rfind([':', ']']) {
        Some(at) if rest.as_bytes()[at] == b':' => {
            let port = rest[at + 1..].parse().map_err(|_| Error::InvalidUriScheme)?;
            Ok((rest[..at].to_string(), port))
        }
        _ => Ok((rest.to_string(), 8080)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_parsing() {
        assert_eq!(parse_bind("http://0.0.0.0").unwrap(), ("0.0.0.0".into(), 8080));
        assert_eq!(
            parse_bind("http://127.0.0.1:9000").unwrap(),
            ("127.0.0.1".into(), 9000)
        );
        assert_eq!(parse_bind("http://[::1]").unwrap(), ("[::1]".into(), 8080));
        assert_eq!(parse_bind("http://[::1]:81").unwrap(), ("[::1]".into(), 81));
        assert!(matches!(
            parse_bind("https://127.0.0.1"),
            Err(Error::InvalidUriScheme)
        ));
        assert!(matches!(
            parse_bind("http://host:notaport"),
            Err(Error::InvalidUriScheme)
        ));
    }

    #[test]
    fn sessions_expire_and_mark() {
        let sessions = Sessions::default();
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert!(!sessions.is_logged_in(peer));
        sessions.mark(peer);
        assert!(sessions.is_logged_in(peer));
    }
}
