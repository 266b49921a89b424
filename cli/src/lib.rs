//! Command-line front end for `reqsh`.
//!
//! Flags are applied to the context as ordinary mutations; `--file` runs one
//! script and exits, otherwise the interactive loop takes over.

pub mod repl;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use reqsh_core::{Config, HeaderCase, Session};

/// Scriptable HTTP request shell.
#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
pub struct Args {
    /// Run this script once and exit; the context flags below are ignored
    #[arg(short = 'f', long)]
    pub file: Option<PathBuf>,

    #[arg(long)]
    pub scheme: Option<String>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<i64>,

    #[arg(long)]
    pub path: Option<String>,

    /// HTTP method
    #[arg(short = 'm', long)]
    pub method: Option<String>,

    /// Full request URL, used instead of scheme/host/port/path
    #[arg(long)]
    pub url: Option<String>,

    /// Request body
    #[arg(short = 'd', long)]
    pub data: Option<String>,

    /// Query parameter as key=value (repeatable)
    #[arg(short = 'q', long = "query", value_parser = parse_pair)]
    pub query: Vec<(String, String)>,

    /// Header as key=value (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_pair)]
    pub header: Vec<(String, String)>,

    /// Header key policy: preserve or canonical
    #[arg(long)]
    pub header_case: Option<HeaderCase>,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got {raw:?}")),
    }
}

impl Args {
    /// Copy the context flags onto the session's context.
    pub fn apply(&self, session: &Session) {
        let case = session.header_case();
        session.update_context(|ctx| {
            let fields = [
                (&self.scheme, &mut ctx.scheme),
                (&self.host, &mut ctx.host),
                (&self.path, &mut ctx.path),
                (&self.method, &mut ctx.method),
                (&self.url, &mut ctx.url),
                (&self.data, &mut ctx.data),
            ];
            for (flag, field) in fields {
                if let Some(value) = flag {
                    *field = value.clone();
                }
            }
            if let Some(port) = self.port {
                ctx.port = port;
            }
            for (key, value) in &self.query {
                ctx.set_query(key, value);
            }
            for (key, value) in &self.header {
                ctx.set_header(key, value, case);
            }
        });
    }
}

pub fn run(args: Args) -> ExitCode {
    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("reqsh: {err}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(case) = args.header_case {
        config.header_case = case;
    }
    tracing::debug!(base_dir = %config.base_dir.display(), "starting session");

    let mut session = match Session::new(config) {
        Ok(session) => session,
        Err(err) => {
            eprintln!("reqsh: init: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(file) = &args.file {
        return match session.run_file(file) {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                eprintln!("reqsh: {err}");
                ExitCode::FAILURE
            }
        };
    }

    args.apply(&session);
    let stdin = io::stdin();
    match repl::run(&mut session, stdin.lock(), io::stdout(), io::stderr()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("reqsh: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_pairs() {
        let args = Args::try_parse_from([
            "reqsh", "-q", "a=1", "--query", "b=x=y", "-H", "X-Token=abc", "-m", "POST",
        ])
        .unwrap();
        assert_eq!(
            args.query,
            vec![("a".into(), "1".into()), ("b".into(), "x=y".into())]
        );
        assert_eq!(args.header, vec![("X-Token".into(), "abc".into())]);
        assert_eq!(args.method.as_deref(), Some("POST"));
    }

    #[test]
    fn rejects_pairs_without_key() {
        assert!(Args::try_parse_from(["reqsh", "-q", "novalue"]).is_err());
        assert!(Args::try_parse_from(["reqsh", "-H", "=v"]).is_err());
    }

    #[test]
    fn parses_header_case() {
        let args = Args::try_parse_from(["reqsh", "--header-case", "canonical"]).unwrap();
        assert_eq!(args.header_case, Some(HeaderCase::Canonical));
        assert!(Args::try_parse_from(["reqsh", "--header-case", "shout"]).is_err());
    }

    #[test]
    fn help_says_file_mode_ignores_context_flags() {
        use clap::CommandFactory;

        let command = Args::command();
        let file = command
            .get_arguments()
            .find(|arg| arg.get_id() == "file")
            .unwrap();
        let help = file.get_help().unwrap().to_string();
        assert!(help.contains("context flags below are ignored"), "{help}");
    }

    #[test]
    fn empty_value_is_allowed() {
        assert_eq!(parse_pair("k="), Ok(("k".into(), String::new())));
    }
}
