//! Core of `reqsh`, a scriptable HTTP request shell.
//!
//! # Overview
//! A session keeps one mutable request context, lets Rhai scripts change it
//! through a `context` binding and a set of commands, persists it as
//! re-loadable script files and dispatches it as a single blocking HTTP
//! request.
//!
//! # Design
//! - `value` converts between script maps, the closed `Tree` shape, JSON
//!   and script source.
//! - `context` is the typed request record; `target` turns it into a URL;
//!   `http` applies the request policy as plain data; `dispatch` executes it
//!   through a `Transport` and prints diagnostics.
//! - `session` and `commands` bind all of it to the script engine; `store`
//!   and `config` cover the base directory and environment settings.

pub mod commands;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod session;
pub mod store;
pub mod target;
pub mod value;

pub use config::Config;
pub use context::{Context, HeaderCase};
pub use dispatch::{Dispatcher, SendOptions, Transport, UreqTransport};
pub use error::{Error, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use session::Session;
pub use store::ContextStore;
pub use target::build_url;
pub use value::{pretty_json, table_to_string_map, Tree};
