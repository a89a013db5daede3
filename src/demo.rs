//! Small dynamic handlers that sit in front of the compression layer.
//!
//! They set a status, a content type and an in-memory body; validation
//! failures answer 400 with an empty body so nothing is compressed.

use bytes::Bytes;
use http::{HeaderValue, Method, Request, Response, StatusCode, header};
use http_body_util::Full;
use std::borrow::Cow;
use std::convert::Infallible;
use std::future::{Ready, ready};
use std::task::{Context, Poll};
use tower::Service;
use tracing::debug;

/// Longest accepted `name` for `/strings/hello`, in characters.
pub const MAX_NAME_LEN: usize = 500;

/// Largest accepted `n` for `/math/power-reciprocals-alt`.
pub const MAX_TERMS: u32 = 10_000;

const TEXT_PLAIN: &str = "text/plain";
const TEXT_HTML: &str = "text/html; charset=utf-8";

/// Routes the demo endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoApp;

impl<ReqBody> Service<Request<ReqBody>> for DemoApp {
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Ready<Result<Self::Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        ready(Ok(route(req.method(), req.uri().path(), req.uri().query())))
    }
}

fn route(method: &Method, path: &str, query: Option<&str>) -> Response<Full<Bytes>> {
    if method != Method::GET && method != Method::HEAD {
        return empty(StatusCode::NOT_FOUND);
    }

    match path {
        "/" => text(TEXT_HTML, "Hello World!".to_owned()),
        "/strings/hello" => match hello(query_param(query, "name").as_deref()) {
            Some(greeting) => text(TEXT_PLAIN, greeting),
            None => empty(StatusCode::BAD_REQUEST),
        },
        "/math/power-reciprocals-alt" => {
            match query_param(query, "n").and_then(|n| n.trim().parse::<u32>().ok()) {
                Some(n) if n <= MAX_TERMS => {
                    text(TEXT_PLAIN, power_reciprocals_alt(n).to_string())
                }
                _ => empty(StatusCode::BAD_REQUEST),
            }
        }
        _ => empty(StatusCode::NOT_FOUND),
    }
}

/// Greets `name`, or `World` if absent. Oversized names are rejected.
pub fn hello(name: Option<&str>) -> Option<String> {
    let name = name.unwrap_or("World");
    if name.chars().count() > MAX_NAME_LEN {
        debug!(len = name.len(), "rejected oversized name");
        return None;
    }
    Some(format!("Hello, {name}!"))
}

/// Partial sum of `1/4 - 1/8 + 1/16 - ...` over `n` terms.
///
/// Term `i` (1-indexed) is `+1/2^(i+1)` for odd `i` and `-1/2^(i+1)` for even
/// `i`. Terms are added strictly in order.
pub fn power_reciprocals_alt(n: u32) -> f64 {
    let mut sum = 0.0;
    for i in 1..=n {
        let term = 1.0 / 2f64.powi(i as i32 + 1);
        if i % 2 == 1 {
            sum += term;
        } else {
            sum -= term;
        }
    }
    sum
}

fn query_param<'a>(query: Option<&'a str>, key: &str) -> Option<Cow<'a, str>> {
    form_urlencoded::parse(query?.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
}

fn text(content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn empty(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
