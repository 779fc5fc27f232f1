//! In-flight request as seen by handlers.

use std::collections::HashMap;

use axum::body::to_bytes;
use axum::extract::{FromRequestParts, Path, Request};
use axum::http::{header, HeaderMap, Method};
use http_body_util::LengthLimitError;
use serde_json::{Map, Value};

use crate::error::DispatchError;

/// Header carrying the request id when the client (or an outer layer) set one.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Read-only view of the in-flight request.
///
/// Query and path parameters use "last write wins" when a name repeats.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    method: Method,
    path: String,
    query: HashMap<String, String>,
    path_params: HashMap<String, String>,
    headers: HeaderMap,
    body: Option<Value>,
    request_id: String,
}

fn exceeds_limit(err: &axum::Error) -> bool {
    let mut cur: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = cur {
        if e.is::<LengthLimitError>() {
            return true;
        }
        cur = e.source();
    }
    false
}

impl RequestHandle {
    /// Bare request; `target` may carry a query string (`/greet?lang=fr`).
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((p, q)) => (p, parse_query(q)),
            None => (target, HashMap::new()),
        };
        Self {
            method,
            path: path.to_string(),
            query,
            path_params: HashMap::new(),
            headers: HeaderMap::new(),
            body: None,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_path_params(mut self, params: HashMap<String, String>) -> Self {
        self.path_params = params;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = id.into();
        self
    }

    /// Consume an axum request: collects the body (up to `body_limit` bytes)
    /// and decodes it as JSON or urlencoded form according to its content type.
    pub async fn from_axum(req: Request, body_limit: usize) -> Result<Self, DispatchError> {
        let (mut parts, body) = req.into_parts();

        let path_params = Path::<HashMap<String, String>>::from_request_parts(&mut parts, &())
            .await
            .map(|Path(p)| p)
            .unwrap_or_default();

        let bytes = to_bytes(body, body_limit).await.map_err(|e| {
            if exceeds_limit(&e) {
                DispatchError::PayloadTooLarge { limit: body_limit }
            } else {
                DispatchError::MalformedBody(e.to_string())
            }
        })?;
        let body = decode_body(&parts.headers, &bytes)?;

        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(parse_query).unwrap_or_default(),
            path_params,
            headers: parts.headers,
            body,
            request_id,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }

    /// Header lookup (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Top-level field of an object body.
    pub fn body_field(&self, name: &str) -> Option<&Value> {
        self.body.as_ref().and_then(|b| b.get(name))
    }
}

fn parse_query(q: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(q.as_bytes())
        .into_owned()
        .collect()
}

fn decode_body(headers: &HeaderMap, bytes: &[u8]) -> Result<Option<Value>, DispatchError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let map: Map<String, Value> = url::form_urlencoded::parse(bytes)
            .into_owned()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        return Ok(Some(Value::Object(map)));
    }

    if content_type.is_empty() || content_type.contains("json") {
        return serde_json::from_slice(bytes)
            .map(Some)
            .map_err(|e| DispatchError::MalformedBody(e.to_string()));
    }

    Ok(None)
}
