use rocket::http::Method;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
    #[error("unsupported method {0}")]
    Method(Method),
    #[error("no JSON reply from server")]
    NoReply,
}

/// Status and JSON body of a server answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `error` message of a failure envelope.
    pub fn error_message(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }
}

/// Sends one JSON request to the profile server.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Reply, TransportError>;
}

/// Transport over HTTP to a running server.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: impl ToString) -> HttpTransport {
        HttpTransport {
            base_url: base_url.to_string().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Transport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Reply, TransportError> {
        let http_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .map_err(|_| TransportError::Method(method))?;

        let mut request = self
            .http
            .request(http_method, format!("{}{}", self.base_url, path));
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.json::<Value>().await?;

        Ok(Reply { status, body })
    }
}
