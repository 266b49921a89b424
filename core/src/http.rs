//! HTTP request and response described as plain data.
//!
//! # Design
//! `HttpRequest::from_context` applies the whole request policy (method
//! check, URL, body choice, header precedence) without touching the
//! network. A `Transport` executes the result, so the policy is tested on
//! its own and the transport stays a thin adapter.
//!
//! All fields use owned types so a request can be logged, stored or handed
//! to any transport without lifetime concerns.

use std::fmt;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::target::{build_url_for, encode_form};

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Case-insensitive; anything but the four verbs is `UnsupportedMethod`.
    pub fn parse(s: &str) -> Result<HttpMethod> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(Error::UnsupportedMethod(s.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Always `None` for GET.
    pub body: Option<String>,
}

impl HttpRequest {
    /// Resolve `ctx` into a request.
    ///
    /// `method` overrides `ctx.method` when given. `extra_headers` are
    /// applied after the context's headers and replace any context header
    /// with the same name, compared case-insensitively.
    pub fn from_context(
        ctx: &Context,
        method: Option<&str>,
        extra_headers: &[(String, String)],
    ) -> Result<HttpRequest> {
        let method = HttpMethod::parse(method.unwrap_or(&ctx.method))?;
        let url = build_url_for(ctx, method.as_str()).ok_or(Error::InvalidContext)?;

        let body = match method {
            HttpMethod::Get => None,
            _ if !ctx.data.is_empty() => Some(ctx.data.clone()),
            _ => Some(encode_form(&ctx.query)),
        };

        let mut headers: Vec<(String, String)> = ctx
            .header
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, value) in extra_headers {
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(key));
            headers.push((key.clone(), value.clone()));
        }

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeaderCase;

    fn context() -> Context {
        Context {
            host: "api.example".into(),
            path: "/items".into(),
            ..Context::default()
        }
    }

    #[test]
    fn method_parse_is_case_insensitive() {
        assert_eq!(HttpMethod::parse("get").unwrap(), HttpMethod::Get);
        assert_eq!(HttpMethod::parse("Delete").unwrap(), HttpMethod::Delete);
        assert!(matches!(
            HttpMethod::parse("PATCH"),
            Err(Error::UnsupportedMethod(m)) if m == "PATCH"
        ));
    }

    #[test]
    fn get_has_no_body_and_query_in_url() {
        let mut ctx = context();
        ctx.set_query("page", "2");
        ctx.data = "ignored".into();
        let req = HttpRequest::from_context(&ctx, None, &[]).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://api.example/items?page=2");
        assert!(req.body.is_none());
    }

    #[test]
    fn data_is_sent_raw_for_non_get() {
        let mut ctx = context();
        ctx.method = "put".into();
        ctx.data = r#"{"a":1}"#.into();
        ctx.set_query("page", "2");
        let req = HttpRequest::from_context(&ctx, None, &[]).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.url, "http://api.example/items");
        assert_eq!(req.body.as_deref(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn query_becomes_form_body_without_data() {
        let mut ctx = context();
        ctx.set_query("name", "a b");
        ctx.set_query("n", "1");
        let req = HttpRequest::from_context(&ctx, Some("POST"), &[]).unwrap();
        assert_eq!(req.body.as_deref(), Some("n=1&name=a+b"));
    }

    #[test]
    fn extra_headers_take_precedence() {
        let mut ctx = context();
        ctx.set_header("content-type", "application/json", HeaderCase::Preserve);
        ctx.set_header("Accept", "*/*", HeaderCase::Preserve);
        let extra = [(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        )];
        let req = HttpRequest::from_context(&ctx, Some("POST"), &extra).unwrap();
        assert_eq!(
            req.headers,
            vec![
                ("Accept".to_string(), "*/*".to_string()),
                (
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string()
                ),
            ]
        );
    }

    #[test]
    fn unsupported_method_is_checked_first() {
        let mut ctx = context();
        ctx.host.clear();
        ctx.method = "PATCH".into();
        let err = HttpRequest::from_context(&ctx, None, &[]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMethod(_)));
    }

    #[test]
    fn unbuildable_context_is_invalid() {
        let mut ctx = context();
        ctx.scheme = "ftp".into();
        let err = HttpRequest::from_context(&ctx, None, &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidContext));
    }
}
