//! Request URL construction from a context.
//!
//! # Design
//! `build_url` is pure and returns `None` when the context cannot name a
//! target. A non-empty `url` field wins over scheme/host/port/path; for GET
//! requests the query parameters are still appended to it, joined with `&`
//! when the override already carries a query string.

use std::collections::BTreeMap;

use crate::context::Context;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// Only the exact lower-case names are accepted.
    pub fn parse(s: &str) -> Option<Scheme> {
        match s {
            "http" => Some(Scheme::Http),
            "https" => Some(Scheme::Https),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(self) -> i64 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// URL for the context's own method.
pub fn build_url(ctx: &Context) -> Option<String> {
    build_url_for(ctx, &ctx.method)
}

/// URL for `method`, which decides whether the query goes into the URL.
pub fn build_url_for(ctx: &Context, method: &str) -> Option<String> {
    let with_query = method.eq_ignore_ascii_case("GET") && !ctx.query.is_empty();

    if !ctx.url.is_empty() {
        let mut url = ctx.url.clone();
        if with_query {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&encode_form(&ctx.query));
        }
        return Some(url);
    }

    let scheme = Scheme::parse(&ctx.scheme)?;
    if ctx.host.is_empty() {
        return None;
    }
    let mut url = format!("{}://{}", scheme.as_str(), ctx.host);

    match ctx.port {
        0 => {}
        port if !(1..=65535).contains(&port) => return None,
        port if port == scheme.default_port() => {}
        port => url.push_str(&format!(":{port}")),
    }

    url.push_str(&normalize_path(&ctx.path));

    if with_query {
        url.push('?');
        url.push_str(&encode_form(&ctx.query));
    }
    Some(url)
}

/// One leading slash, no trailing slash, `/` when nothing is left.
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_start_matches('/').trim_end_matches('/');
    format!("/{trimmed}")
}

/// `application/x-www-form-urlencoded` serialization; spaces become `+`.
pub(crate) fn encode_form(pairs: &BTreeMap<String, String>) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter())
        .finish()
}
