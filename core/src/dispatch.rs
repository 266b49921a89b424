//! Single-request dispatch with diagnostics.
//!
//! # Design
//! `Dispatcher` resolves a context into an `HttpRequest`, hands it to a
//! `Transport` and reports what happened on the session output: the method
//! and URL before sending, then the status line and every response header.
//! Those lines are diagnostics only; the caller gets the raw body back.
//!
//! `UreqTransport` is the blocking network transport. Every call is bounded
//! by the agent's global timeout and non-2xx statuses come back as data.

use std::io::Write;
use std::time::Duration;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes one request.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        (**self).execute(request)
    }
}

/// Blocking transport backed by a `ureq` agent.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let url = request.url.as_str();
        let headers = request.headers.as_slice();
        let body = request.body.as_deref().unwrap_or_default().as_bytes();

        tracing::trace!(?request, "executing request");

        let result = match request.method {
            HttpMethod::Get => with_headers(self.agent.get(url), headers).call(),
            HttpMethod::Delete if request.body.is_none() => {
                with_headers(self.agent.delete(url), headers).call()
            }
            HttpMethod::Delete => with_headers(self.agent.delete(url), headers)
                .force_send_body()
                .send(body),
            HttpMethod::Post => with_headers(self.agent.post(url), headers).send(body),
            HttpMethod::Put => with_headers(self.agent.put(url), headers).send(body),
        };
        let mut response = result.map_err(transport_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(transport_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn with_headers<B>(
    builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    headers
        .iter()
        .fold(builder, |builder, (name, value)| {
            builder.header(name.as_str(), value.as_str())
        })
}

fn transport_error(err: ureq::Error) -> Error {
    Error::Transport(err.to_string())
}

/// Per-call adjustments to how a context is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Replaces `context.method` when set.
    pub method: Option<String>,
    /// Applied last; wins over context headers of the same name.
    pub headers: Vec<(String, String)>,
}

impl SendOptions {
    pub fn with_method(method: HttpMethod) -> Self {
        Self {
            method: Some(method.as_str().to_string()),
            headers: Vec::new(),
        }
    }

    /// POST with a form content type, whatever the context says.
    pub fn form() -> Self {
        Self {
            method: Some(HttpMethod::Post.as_str().to_string()),
            headers: vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
        }
    }
}

pub struct Dispatcher<T> {
    transport: T,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Send one request built from `ctx` and return the response body.
    ///
    /// Nothing is written to `out` when the context cannot be resolved; a
    /// transport failure leaves only the request line.
    pub fn send(&self, ctx: &Context, options: &SendOptions, out: &mut dyn Write) -> Result<String> {
        let request = HttpRequest::from_context(ctx, options.method.as_deref(), &options.headers)?;

        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        writeln!(out, "=> {} {}", request.method, request.url)?;

        let response = self.transport.execute(&request)?;

        tracing::debug!(status = response.status, bytes = response.body.len(), "response received");
        writeln!(out, "<= {}", response.status)?;
        for (name, value) in &response.headers {
            writeln!(out, "{name}: {value}")?;
        }
        writeln!(out)?;

        Ok(response.body)
    }
}
