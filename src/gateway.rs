//! HTTP access to the dashboard backend.
//!
//! [`HttpGateway`] talks to the real API with a hyper client. Everything
//! above this module only sees the [`Gateway`] trait.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client, Method, Request, StatusCode, Uri};
use hyper_rustls::HttpsConnector;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::record::Record;

pub const RECORDS_PATH: &str = "dashboard";
pub const AGGREGATES_PATH: &str = "avgscore";
pub const INSERT_PATH: &str = "datainsert";
pub const LOGIN_PATH: &str = "";
pub const SIGNIN_PATH: &str = "signin";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("server answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Format(String),
    #[error("response is not JSON: {0}")]
    Decode(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("invalid url {0}")]
    InvalidUrl(String),
}

impl From<hyper::Error> for GatewayError {
    fn from(err: hyper::Error) -> Self {
        GatewayError::Network(err.to_string())
    }
}

#[derive(Clone, PartialEq, Serialize)]
pub struct Credentials {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Password")]
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// The backend as seen by the screens.
pub trait Gateway {
    fn fetch_records(&self) -> impl Future<Output = Result<Vec<Record>, GatewayError>> + Send;

    fn fetch_aggregates(&self)
    -> impl Future<Output = Result<Vec<Record>, GatewayError>> + Send;

    fn submit_record(
        &self,
        record: &Record,
    ) -> impl Future<Output = Result<Value, GatewayError>> + Send;

    fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Value, GatewayError>> + Send;

    fn sign_in(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Value, GatewayError>> + Send;
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    recordset: Option<Vec<Record>>,
}

/// Pull the `recordset` array out of a list response.
///
/// Records are decoded straight into [`Record`] so their fields keep the
/// order the server sent them in.
pub fn parse_recordset(body: &[u8]) -> Result<Vec<Record>, GatewayError> {
    serde_json::from_slice::<IgnoredAny>(body).map_err(|e| GatewayError::Decode(e.to_string()))?;
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|e| GatewayError::Format(format!("bad recordset: {e}")))?;
    envelope
        .recordset
        .ok_or_else(|| GatewayError::Format(String::from("missing recordset array")))
}

/// The `message` field of an error body, if there is one.
fn server_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(String::from)
}

struct Reply {
    status: StatusCode,
    body: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Result<Value, GatewayError> {
        if self.body.is_empty() {
            return Err(GatewayError::Format(String::from("empty response body")));
        }
        serde_json::from_slice(&self.body).map_err(|e| GatewayError::Format(e.to_string()))
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub struct HttpGateway {
    base: String,
    timeout: Duration,
    client: Client<HttpsConnector<HttpConnector>, Body>,
}

impl HttpGateway {
    pub fn new(base: &Url, timeout: Duration) -> Self {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        Self {
            base: base.as_str().trim_end_matches('/').to_string(),
            timeout,
            client: Client::builder().build(https),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Uri, GatewayError> {
        let url = format!("{}/{}", self.base, path);
        url.parse().map_err(|_| GatewayError::InvalidUrl(url))
    }

    async fn send(&self, method: Method, path: &str, body: Body) -> Result<Reply, GatewayError> {
        let uri = self.endpoint(path)?;
        debug!("{method} {uri}");
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .map_err(|e| GatewayError::InvalidUrl(e.to_string()))?;

        let exchange = async {
            let response = self.client.request(request).await?;
            let status = response.status();
            let body = hyper::body::to_bytes(response.into_body()).await?;
            Ok::<_, GatewayError>(Reply {
                status,
                body: body.to_vec(),
            })
        };
        let reply = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| GatewayError::Timeout(self.timeout))??;
        debug!("{path:?} answered {}", reply.status);
        Ok(reply)
    }

    async fn post_json<T: Serialize>(&self, path: &str, payload: &T) -> Result<Reply, GatewayError> {
        let body = serde_json::to_vec(payload).map_err(|e| GatewayError::Format(e.to_string()))?;
        self.send(Method::POST, path, Body::from(body)).await
    }

    async fn get_recordset(&self, path: &str) -> Result<Vec<Record>, GatewayError> {
        let reply = self.send(Method::GET, path, Body::empty()).await?;
        if !reply.status.is_success() {
            return Err(GatewayError::Status {
                status: reply.status.as_u16(),
                message: reply.text(),
            });
        }
        parse_recordset(&reply.body).inspect_err(|e| warn!("{path:?}: {e}"))
    }
}

impl Gateway for HttpGateway {
    async fn fetch_records(&self) -> Result<Vec<Record>, GatewayError> {
        self.get_recordset(RECORDS_PATH).await
    }

    async fn fetch_aggregates(&self) -> Result<Vec<Record>, GatewayError> {
        self.get_recordset(AGGREGATES_PATH).await
    }

    async fn submit_record(&self, record: &Record) -> Result<Value, GatewayError> {
        let reply = self.post_json(INSERT_PATH, record).await?;
        // The body is read before the status, an unreadable body always fails.
        let result = reply.json()?;
        if reply.status.is_success() {
            Ok(result)
        } else {
            let message = server_message(&reply.body).unwrap_or_else(|| reply.text());
            Err(GatewayError::Status {
                status: reply.status.as_u16(),
                message,
            })
        }
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Value, GatewayError> {
        let reply = self.post_json(LOGIN_PATH, credentials).await?;
        if reply.status == StatusCode::UNAUTHORIZED {
            let message =
                server_message(&reply.body).unwrap_or_else(|| String::from("Unauthorized"));
            return Err(AuthError::Unauthorized(message).into());
        }
        if !reply.status.is_success() {
            return Err(AuthError::Rejected {
                status: reply.status.as_u16(),
                body: reply.text(),
            }
            .into());
        }
        reply.json()
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Value, GatewayError> {
        self.post_json(SIGNIN_PATH, credentials).await?.json()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::net::SocketAddr;

    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Response, Server};
    use pretty_assertions::assert_eq;

    use super::*;

    type Route = fn(&Method, &str, &[u8]) -> (u16, String);

    // Serve canned answers on a random local port.
    async fn serve(route: Route) -> Url {
        let make_service = make_service_fn(move |_| async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| async move {
                let method = req.method().clone();
                let path = req.uri().path().to_string();
                let body = hyper::body::to_bytes(req.into_body()).await.unwrap();
                let (status, text) = route(&method, &path, &body);
                Ok::<_, Infallible>(
                    Response::builder()
                        .status(status)
                        .body(Body::from(text))
                        .unwrap(),
                )
            }))
        });
        let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
        let server = Server::bind(&addr).serve(make_service);
        let url = format!("http://{}/", server.local_addr());
        tokio::spawn(server);
        url.parse().unwrap()
    }

    fn gateway(url: &Url) -> HttpGateway {
        HttpGateway::new(url, Duration::from_secs(5))
    }

    fn creds() -> Credentials {
        Credentials {
            username: "ann".into(),
            password: "secret".into(),
        }
    }

    #[tokio::test]
    async fn fetches_records_in_server_order() {
        let url = serve(|method, path, _| {
            if *method == Method::GET && path == "/dashboard" {
                (
                    200,
                    r#"{"recordset":[{"StudentID":1,"DVRTID":90},{"StudentID":2,"DVRTID":70}]}"#
                        .into(),
                )
            } else {
                (404, "nope".into())
            }
        })
        .await;
        let records = gateway(&url).fetch_records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].keys().collect::<Vec<_>>(),
            vec!["StudentID", "DVRTID"]
        );
        assert_eq!(records[1].cell("DVRTID"), "70");
    }

    #[tokio::test]
    async fn missing_recordset_is_a_format_error() {
        let url = serve(|_, _, _| (200, r#"{"rows":[]}"#.into())).await;
        let err = gateway(&url).fetch_aggregates().await.unwrap_err();
        assert!(matches!(err, GatewayError::Format(_)), "{err:?}");
    }

    #[test]
    fn recordset_keeps_field_order_of_every_record() {
        let records = parse_recordset(
            br#"{"recordset":[{"StudentID":1,"SexID":2,"DVRTID":90},{"zeta":true,"alpha":null}]}"#,
        )
        .unwrap();
        assert_eq!(
            records[0].keys().collect::<Vec<_>>(),
            vec!["StudentID", "SexID", "DVRTID"]
        );
        assert_eq!(records[0].to_json(), r#"{"StudentID":1,"SexID":2,"DVRTID":90}"#);
        assert_eq!(records[1].keys().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
    }

    #[test]
    fn recordset_shapes() {
        assert!(matches!(
            parse_recordset(b"<html>oops</html>"),
            Err(GatewayError::Decode(_))
        ));
        assert!(matches!(
            parse_recordset(br#"{"recordset":"nope"}"#),
            Err(GatewayError::Format(_))
        ));
        assert!(matches!(
            parse_recordset(br#"{"recordset":null}"#),
            Err(GatewayError::Format(_))
        ));
        assert_eq!(
            parse_recordset(br#"{"recordset":[],"extra":1}"#),
            Ok(Vec::new())
        );
    }

    #[tokio::test]
    async fn failed_fetch_reports_status() {
        let url = serve(|_, _, _| (503, "down".into())).await;
        let err = gateway(&url).fetch_records().await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::Status {
                status: 503,
                message: "down".into()
            }
        );
    }

    #[tokio::test]
    async fn unauthorized_login_uses_server_message() {
        let url = serve(|_, _, _| (401, r#"{"message":"Invalid password"}"#.into())).await;
        let err = gateway(&url).authenticate(&creds()).await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::Auth(AuthError::Unauthorized("Invalid password".into()))
        );
    }

    #[tokio::test]
    async fn unauthorized_login_without_message() {
        let url = serve(|_, _, _| (401, String::new())).await;
        let err = gateway(&url).authenticate(&creds()).await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::Auth(AuthError::Unauthorized("Unauthorized".into()))
        );
    }

    #[tokio::test]
    async fn server_error_on_login_keeps_raw_text() {
        let url = serve(|_, _, _| (500, "database exploded".into())).await;
        let err = gateway(&url).authenticate(&creds()).await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::Auth(AuthError::Rejected {
                status: 500,
                body: "database exploded".into()
            })
        );
        assert_eq!(err.to_string(), "database exploded");
    }

    #[tokio::test]
    async fn login_posts_credentials_to_root() {
        let url = serve(|method, path, body| {
            let sent: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
            if *method == Method::POST
                && path == "/"
                && sent["Username"] == "ann"
                && sent["Password"] == "secret"
            {
                (200, r#"{"user":"ann"}"#.into())
            } else {
                (400, "bad request".into())
            }
        })
        .await;
        let payload = gateway(&url).authenticate(&creds()).await.unwrap();
        assert_eq!(payload["user"], "ann");
    }

    #[tokio::test]
    async fn submit_echoes_record_body() {
        let url = serve(|method, path, body| {
            if *method == Method::POST && path == "/datainsert" {
                (200, String::from_utf8_lossy(body).into_owned())
            } else {
                (404, "nope".into())
            }
        })
        .await;
        let record = Record::new().with("StudentID", 0).with("SexID", 2);
        let value = gateway(&url).submit_record(&record).await.unwrap();
        assert_eq!(value, serde_json::json!({"StudentID": 0, "SexID": 2}));
    }

    #[tokio::test]
    async fn submit_with_empty_body_is_a_format_error() {
        let url = serve(|_, _, _| (200, String::new())).await;
        let err = gateway(&url)
            .submit_record(&Record::new().with("SexID", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Format(_)), "{err:?}");
    }

    #[tokio::test]
    async fn submit_rejection_surfaces_server_message() {
        let url = serve(|_, _, _| (400, r#"{"message":"DVRTID must be a number"}"#.into())).await;
        let err = gateway(&url)
            .submit_record(&Record::new().with("DVRTID", "abc"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::Status {
                status: 400,
                message: "DVRTID must be a number".into()
            }
        );
    }

    #[tokio::test]
    async fn sign_in_ignores_status() {
        let url = serve(|_, path, _| match path {
            "/signin" => (409, r#"{"exists":true}"#.into()),
            _ => (404, "nope".into()),
        })
        .await;
        let value = gateway(&url).sign_in(&creds()).await.unwrap();
        assert_eq!(value["exists"], true);
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_network_error() {
        let url: Url = "http://127.0.0.1:9/".parse().unwrap();
        let err = gateway(&url).fetch_records().await.unwrap_err();
        assert!(
            matches!(err, GatewayError::Network(_) | GatewayError::Timeout(_)),
            "{err:?}"
        );
    }

    #[test]
    fn credentials_debug_hides_password() {
        let text = format!("{:?}", creds());
        assert!(text.contains("ann"));
        assert!(!text.contains("secret"));
    }
}
