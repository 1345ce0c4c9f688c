use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use {
    axum::{
        Router,
        extract::{RawQuery, State},
        http::{StatusCode, header},
        response::{Html, IntoResponse},
        routing::get,
    },
    tokio::{net::TcpListener, sync::oneshot, task::JoinHandle},
    tracing::{debug, info, warn},
};

use crate::{Error, Result, types::AuthorizationResult};

pub const LOGIN_PATH: &str = "/login";
pub const CALLBACK_PATH: &str = "/oauth2/callback";

/// How long `shutdown` waits for open browser connections to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle of one login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Listening,
    /// The browser fetched `/login` and was sent to the provider.
    Redirected,
    /// A code arrived and is being exchanged; the port stays bound so late
    /// browser requests still get an answer.
    Exchanging,
    Done {
        succeeded: bool,
    },
}

struct Shared {
    state: ListenerState,
    authorize_url: String,
    expected_state: Option<String>,
    captured: Option<AuthorizationResult>,
    result_tx: Option<oneshot::Sender<AuthorizationResult>>,
}

type SharedState = Arc<Mutex<Shared>>;

fn lock(shared: &SharedState) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

/// One-shot local HTTP listener that sends the browser to the provider's
/// consent page and captures the redirect back.
///
/// The first request to [`CALLBACK_PATH`] decides the outcome; later ones are
/// answered but ignored. The port is released by [`CallbackServer::shutdown`]
/// or, failing that, on drop.
pub struct CallbackServer {
    port: u16,
    addr: Option<SocketAddr>,
    shared: SharedState,
    result_rx: Option<oneshot::Receiver<AuthorizationResult>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

#[derive(Debug, Default)]
struct CallbackParams {
    code: Option<String>,
    error: Option<String>,
    state: Option<String>,
}

impl CallbackParams {
    /// Parse the raw query string. The first value of a repeated key wins and
    /// unknown keys are ignored, so no query is ever rejected.
    fn from_query(raw: Option<&str>) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "error" => &mut params.error,
                "state" => &mut params.state,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }
}

impl CallbackServer {
    /// Prepare a listener for `127.0.0.1:{port}` that redirects `/login` to
    /// `authorize_url`. Nothing is bound until [`CallbackServer::listen`].
    pub fn new(port: u16, authorize_url: impl Into<String>) -> Self {
        let (result_tx, result_rx) = oneshot::channel();
        let shared = Shared {
            state: ListenerState::Idle,
            authorize_url: authorize_url.into(),
            expected_state: None,
            captured: None,
            result_tx: Some(result_tx),
        };
        Self {
            port,
            addr: None,
            shared: Arc::new(Mutex::new(shared)),
            result_rx: Some(result_rx),
            shutdown_tx: None,
            task: None,
        }
    }

    /// Reject callbacks whose `state` parameter differs from `state`.
    #[must_use]
    pub fn with_expected_state(self, state: impl Into<String>) -> Self {
        lock(&self.shared).expected_state = Some(state.into());
        self
    }

    /// Bind the port and start serving. Returns the bound address.
    pub async fn listen(&mut self) -> Result<SocketAddr> {
        if let Some(addr) = self.addr {
            return Ok(addr);
        }

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, self.port))
            .await
            .map_err(|e| {
                Error::external(
                    format!("failed to bind callback listener on port {}", self.port),
                    e,
                )
            })?;
        let addr = listener.local_addr()?;

        let app = Router::new()
            .route(LOGIN_PATH, get(login))
            .route(CALLBACK_PATH, get(callback))
            .fallback(not_found)
            .with_state(Arc::clone(&self.shared));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                warn!(error = %e, "callback listener stopped with an error");
            }
        });

        lock(&self.shared).state = ListenerState::Listening;
        self.addr = Some(addr);
        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);
        info!(%addr, "callback listener started");
        Ok(addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    /// The URL the user opens to begin the login.
    pub fn login_url(&self) -> Option<String> {
        self.addr.map(|addr| format!("http://{addr}{LOGIN_PATH}"))
    }

    pub fn state(&self) -> ListenerState {
        lock(&self.shared).state
    }

    /// The outcome of the first callback, if one arrived.
    pub fn captured(&self) -> Option<AuthorizationResult> {
        lock(&self.shared).captured.clone()
    }

    /// Wait for the first callback, giving up after `timeout`.
    pub async fn wait_for_result(&mut self, timeout: Duration) -> Result<AuthorizationResult> {
        let rx = self
            .result_rx
            .take()
            .ok_or_else(|| Error::message("callback result was already taken"))?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(Error::message(
                "callback listener closed before the browser returned",
            )),
            Err(_) => Err(Error::AuthenticationTimedOut { timeout }),
        }
    }

    pub fn mark_exchanging(&self) {
        lock(&self.shared).state = ListenerState::Exchanging;
    }

    pub fn mark_done(&self, succeeded: bool) {
        lock(&self.shared).state = ListenerState::Done { succeeded };
    }

    /// Stop accepting connections and wait briefly for in-flight responses.
    pub async fn shutdown(mut self) {
        self.signal_shutdown();
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(DRAIN_TIMEOUT, &mut task).await.is_err() {
                debug!("callback listener did not drain in time, aborting");
                task.abort();
            }
        }
        info!(addr = ?self.addr, "callback listener stopped");
    }

    fn signal_shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        self.signal_shutdown();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn login(State(shared): State<SharedState>) -> impl IntoResponse {
    let mut guard = lock(&shared);
    if guard.state == ListenerState::Listening {
        guard.state = ListenerState::Redirected;
    }
    debug!("redirecting browser to the authorization page");
    (
        StatusCode::FOUND,
        [(header::LOCATION, guard.authorize_url.clone())],
    )
}

async fn callback(
    State(shared): State<SharedState>,
    RawQuery(query): RawQuery,
) -> Html<&'static str> {
    let params = CallbackParams::from_query(query.as_deref());
    let mut guard = lock(&shared);
    let result = classify(params, guard.expected_state.as_deref());
    let accepted = matches!(result, AuthorizationResult::Code(_));

    match guard.result_tx.take() {
        Some(tx) => {
            match &result {
                AuthorizationResult::Code(_) => info!("authorization code received"),
                AuthorizationResult::Error(reason) => {
                    warn!(reason = %reason, "provider redirected without a code")
                },
            }
            guard.captured = Some(result.clone());
            let _ = tx.send(result);
        },
        None => debug!("ignoring repeated callback"),
    }

    if accepted {
        Html("<h1>Success!</h1><p>You can close this window and return to the terminal.</p>")
    } else {
        Html("<h1>Authorization was not granted</h1><p>Return to the terminal for details.</p>")
    }
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

fn classify(params: CallbackParams, expected_state: Option<&str>) -> AuthorizationResult {
    if let Some(error) = params.error {
        return AuthorizationResult::Error(error);
    }
    if let Some(expected) = expected_state
        && params.state.as_deref() != Some(expected)
    {
        return AuthorizationResult::Error("state mismatch".into());
    }
    match params.code {
        Some(code) if !code.is_empty() => AuthorizationResult::Code(code),
        _ => AuthorizationResult::Error("missing code".into()),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const AUTHORIZE: &str = "https://accounts.example.com/authorize?client_id=c";

    fn browser() -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap()
    }

    async fn started(state: Option<&str>) -> (CallbackServer, String) {
        let mut server = CallbackServer::new(0, AUTHORIZE);
        if let Some(state) = state {
            server = server.with_expected_state(state);
        }
        let addr = server.listen().await.unwrap();
        (server, format!("http://{addr}"))
    }

    async fn can_rebind(addr: SocketAddr) -> bool {
        for _ in 0..40 {
            if std::net::TcpListener::bind(addr).is_ok() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[test]
    fn new_server_is_idle() {
        let server = CallbackServer::new(0, AUTHORIZE);
        assert_eq!(server.state(), ListenerState::Idle);
        assert!(server.login_url().is_none());
    }

    #[tokio::test]
    async fn login_redirects_to_provider() {
        let (server, base) = started(None).await;
        assert_eq!(server.state(), ListenerState::Listening);
        assert_eq!(server.login_url(), Some(format!("{base}/login")));

        let resp = browser().get(format!("{base}/login")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()[header::LOCATION], AUTHORIZE);
        assert_eq!(server.state(), ListenerState::Redirected);
    }

    #[tokio::test]
    async fn unknown_paths_are_404_and_keep_waiting() {
        let (mut server, base) = started(None).await;

        let resp = browser().get(format!("{base}/favicon.ico")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let err = server
            .wait_for_result(Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthenticationTimedOut { .. }));
    }

    #[tokio::test]
    async fn callback_with_code_resolves_wait() {
        let (mut server, base) = started(None).await;

        let resp = browser()
            .get(format!("{base}/oauth2/callback?code=ABC123"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let result = server.wait_for_result(Duration::from_secs(5)).await.unwrap();
        assert_eq!(result, AuthorizationResult::Code("ABC123".into()));
    }

    #[tokio::test]
    async fn first_callback_wins() {
        let (mut server, base) = started(None).await;
        let client = browser();

        for code in ["first", "second"] {
            let resp = client
                .get(format!("{base}/oauth2/callback?code={code}"))
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::OK);
        }

        assert_eq!(
            server.captured(),
            Some(AuthorizationResult::Code("first".into()))
        );
        let result = server.wait_for_result(Duration::from_secs(5)).await.unwrap();
        assert_eq!(result, AuthorizationResult::Code("first".into()));
    }

    #[tokio::test]
    async fn provider_error_is_answered_with_200_and_captured() {
        let (mut server, base) = started(None).await;

        let resp = browser()
            .get(format!("{base}/oauth2/callback?error=access_denied"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let result = server.wait_for_result(Duration::from_secs(5)).await.unwrap();
        assert_eq!(result, AuthorizationResult::Error("access_denied".into()));
    }

    #[tokio::test]
    async fn state_is_checked_when_expected() {
        let (mut server, base) = started(Some("s-1")).await;

        browser()
            .get(format!("{base}/oauth2/callback?code=ABC&state=forged"))
            .send()
            .await
            .unwrap();

        let result = server.wait_for_result(Duration::from_secs(5)).await.unwrap();
        assert_eq!(result, AuthorizationResult::Error("state mismatch".into()));
    }

    #[test]
    fn missing_code_is_an_error() {
        assert_eq!(
            classify(CallbackParams::from_query(None), None),
            AuthorizationResult::Error("missing code".into())
        );
        assert_eq!(
            classify(CallbackParams::from_query(Some("%zz=%")), None),
            AuthorizationResult::Error("missing code".into())
        );
    }

    #[test]
    fn repeated_keys_keep_first_value() {
        let params = CallbackParams::from_query(Some("code=a&state=s&code=b&state=t&extra=1"));
        assert_eq!(params.code.as_deref(), Some("a"));
        assert_eq!(params.state.as_deref(), Some("s"));
    }

    #[tokio::test]
    async fn repeated_code_is_answered_and_resolves_wait() {
        let (mut server, base) = started(None).await;

        let resp = browser()
            .get(format!("{base}/oauth2/callback?code=a&code=b"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let result = server.wait_for_result(Duration::from_secs(5)).await.unwrap();
        assert_eq!(result, AuthorizationResult::Code("a".into()));
    }

    #[tokio::test]
    async fn garbled_query_is_answered_and_resolves_wait() {
        let (mut server, base) = started(None).await;

        let resp = browser()
            .get(format!("{base}/oauth2/callback?%ZZ&=&&error"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let result = server.wait_for_result(Duration::from_millis(500)).await.unwrap();
        assert!(matches!(result, AuthorizationResult::Error(_)));
    }

    #[tokio::test]
    async fn shutdown_after_timeout_releases_port() {
        let (mut server, _) = started(None).await;
        let addr = server.local_addr().unwrap();

        let err = server
            .wait_for_result(Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AuthenticationTimedOut { .. }));

        server.shutdown().await;
        assert!(can_rebind(addr).await);
    }

    #[tokio::test]
    async fn drop_releases_port() {
        let (server, _) = started(None).await;
        let addr = server.local_addr().unwrap();
        drop(server);
        assert!(can_rebind(addr).await);
    }

    #[tokio::test]
    async fn state_transitions_through_exchange() {
        let (server, _) = started(None).await;
        server.mark_exchanging();
        assert_eq!(server.state(), ListenerState::Exchanging);
        server.mark_done(true);
        assert_eq!(server.state(), ListenerState::Done { succeeded: true });
        server.shutdown().await;
    }
}
