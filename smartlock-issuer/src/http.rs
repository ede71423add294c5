use std::sync::Arc;

use log::{error, info, warn};

use crate::keys::KeyDir;

pub type HttpResult<E = std::io::Error> = Result<HttpResponse, E>;

pub type HttpResponse =
    hyper::Response<http_body_util::combinators::BoxBody<hyper::body::Bytes, std::io::Error>>;

pub async fn run_server(addr: &str, keys: Arc<KeyDir>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        "Listening on http://{addr}, keys in {}",
        keys.root().display()
    );
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                tokio::task::spawn(handle_connection(stream, keys.clone()));
            }
            Err(e) => error!("failed to accept: {e:?}"),
        }
    }
}

async fn handle_connection(stream: tokio::net::TcpStream, keys: Arc<KeyDir>) {
    let io = hyper_util::rt::TokioIo::new(stream);

    let builder =
        hyper_util::server::conn::auto::Builder::new(hyper_util::rt::tokio::TokioExecutor::new());
    // the auto Builder runs an http1.1 server that upgrades to http2 if the client requests.
    let conn = builder.serve_connection(
        io,
        hyper::service::service_fn(|r| handle_request(r, keys.clone())),
    );

    if let Err(e) = conn.await {
        warn!("connection error: {e:?}");
    }
}

async fn handle_request(r: hyper::Request<hyper::body::Incoming>, keys: Arc<KeyDir>) -> HttpResult {
    info!("{} {}", r.method(), r.uri().path());
    // key files are small; the blocking fs calls stay on the request task
    smartlock_issuer::routes::route(r.method(), r.uri().path(), &keys)
}

pub fn json<T: serde::Serialize>(o: T) -> HttpResult {
    let bytes = match serde_json::to_vec(&o) {
        Ok(v) => v,
        Err(e) => return server_error_(format!("failed to serialize json: {e:?}")),
    };
    let mut r = bytes_to_resp(bytes, hyper::StatusCode::OK)?;
    r.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    Ok(r)
}

pub fn server_error_(s: String) -> HttpResult {
    error!("{s}");
    bytes_to_resp(s.into_bytes(), hyper::StatusCode::INTERNAL_SERVER_ERROR)
}

pub fn bytes_to_resp(bytes: Vec<u8>, status: hyper::StatusCode) -> HttpResult {
    use http_body_util::BodyExt;

    let mut r = hyper::Response::new(
        http_body_util::Full::new(hyper::body::Bytes::from(bytes))
            .map_err(|e| match e {})
            .boxed(),
    );
    *r.status_mut() = status;
    Ok(r)
}

pub fn not_found_(m: String) -> HttpResult {
    bytes_to_resp(m.into_bytes(), hyper::StatusCode::NOT_FOUND)
}

pub fn bad_request_(m: String) -> HttpResult {
    bytes_to_resp(m.into_bytes(), hyper::StatusCode::BAD_REQUEST)
}

pub fn method_not_allowed_(m: String) -> HttpResult {
    bytes_to_resp(m.into_bytes(), hyper::StatusCode::METHOD_NOT_ALLOWED)
}

#[macro_export]
macro_rules! server_error {
    ($($t:tt)*) => {{
        smartlock_issuer::http::server_error_(format!($($t)*))
    }};
}

#[macro_export]
macro_rules! not_found {
    ($($t:tt)*) => {{
        smartlock_issuer::http::not_found_(format!($($t)*))
    }};
}

#[macro_export]
macro_rules! bad_request {
    ($($t:tt)*) => {{
        smartlock_issuer::http::bad_request_(format!($($t)*))
    }};
}

#[macro_export]
macro_rules! method_not_allowed {
    ($($t:tt)*) => {{
        smartlock_issuer::http::method_not_allowed_(format!($($t)*))
    }};
}
