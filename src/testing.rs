// SPDX-FileCopyrightText: © 2024 Claudio Cicconetti <c.cicconetti@iit.cnr.it>
// SPDX-License-Identifier: MIT

//! Helpers shared by the tests.

use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Configuration with the required settings filled in and no delays.
pub fn test_config(base_url: &str) -> crate::config::Config {
    crate::config::Settings {
        class_id: Some("114514".to_string()),
        cookie: Some("remember_student_abc=xyz".to_string()),
        base_url: Some(base_url.to_string()),
        notify_url: Some(format!("{}/send", base_url)),
        verify_delay: Some(0.0),
        request_timeout: Some(2.0),
        notify_timeout: Some(2.0),
        ..Default::default()
    }
    .validate()
    .expect("invalid test configuration")
}

/// A request as seen by the canned server.
#[derive(Debug, Clone)]
pub struct Captured {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl Captured {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|x| x.to_str().ok())
    }
}

#[derive(Clone, Default)]
struct Canned {
    responses: Arc<Mutex<VecDeque<(u16, String)>>>,
    requests: Arc<Mutex<Vec<Captured>>>,
}

/// Local HTTP server answering with canned responses.
pub struct CannedServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<Captured>>>,
}

impl CannedServer {
    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<Captured> {
        self.requests.lock().unwrap().clone()
    }
}

/// Answer each request with the next `(status, body)` in `responses`, then
/// with 500 once they are exhausted.
pub async fn serve(responses: Vec<(u16, String)>) -> anyhow::Result<CannedServer> {
    let state = Canned {
        responses: Arc::new(Mutex::new(responses.into())),
        ..Default::default()
    };
    let requests = state.requests.clone();
    let app = axum::Router::new().fallback(reply).with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let base_url = format!("http://{}", listener.local_addr()?);
    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("canned server failed");
    });
    Ok(CannedServer { base_url, requests })
}

async fn reply(
    State(state): State<Canned>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, [(header::HeaderName, &'static str); 1], String) {
    state.requests.lock().unwrap().push(Captured {
        method,
        path: uri.path().to_string(),
        headers,
        body,
    });
    let (status, body) = state
        .responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((500, "unexpected request".to_string()));
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        body,
    )
}
