//! Named operations exposed to scripts.
//!
//! Every command works on the session's single context. Failures surface as
//! Rhai runtime errors carrying the core error's message; argument count and
//! type mismatches are reported by the engine itself.

use std::collections::BTreeMap;
use std::rc::Rc;

use rhai::{Dynamic, Engine, EvalAltResult, ImmutableString, Map, NativeCallContext, FLOAT, INT};

use crate::config::expand_home;
use crate::context::Context;
use crate::dispatch::SendOptions;
use crate::error::Error;
use crate::http::HttpMethod;
use crate::session::{ContextHandle, Shell};
use crate::value::{table_to_string_map, Tree};

type CommandResult<T = ()> = Result<T, Box<EvalAltResult>>;

/// Signatures and one-line descriptions printed by `help()`.
pub const COMMANDS: &[(&str, &str)] = &[
    ("reset()", "reinstall the default context and run the init script"),
    ("set_query(key, value)", "set context.query[key]"),
    ("set_header(key, value)", "set context.header[key]"),
    ("send([pretty])", "send with context.method"),
    ("send_get([pretty])", "send as GET"),
    ("send_post([pretty])", "send as POST"),
    ("send_form([pretty])", "send as POST with a form content type"),
    ("send_script(name, [pretty])", "run a stored script, send, restore the context"),
    ("json_encode(map, [pretty])", "encode a map as JSON"),
    ("save(name, [overwrite])", "store the context in the base directory"),
    ("load(name)", "run a stored script from the base directory"),
    ("loadf(path)", "run a script file by path"),
    ("list()", "list stored scripts"),
    ("debug()", "print the context as JSON"),
    ("help()", "show this table"),
];

pub(crate) fn register(engine: &mut Engine, shell: &Rc<Shell>) {
    register_context_type(engine);

    let s = shell.clone();
    engine.on_print(move |text| {
        let _ = s.print(text);
    });
    // `debug` is a keyword: whatever string the call returns goes here.
    let s = shell.clone();
    engine.on_debug(move |text, _, _| {
        let _ = s.print(text);
    });

    let s = shell.clone();
    engine.register_fn("reset", move |ctx: NativeCallContext| -> CommandResult {
        s.reset(ctx.engine()).map_err(raise)
    });

    let s = shell.clone();
    engine.register_fn("set_query", move |key: &str, value: Dynamic| -> CommandResult {
        let value = query_value(&value)?;
        s.context.borrow_mut().set_query(key, value);
        Ok(())
    });

    let s = shell.clone();
    engine.register_fn("set_header", move |key: &str, value: &str| {
        s.context.borrow_mut().set_header(key, value, s.header_case);
    });

    register_send(engine, shell, "send", SendOptions::default());
    register_send(engine, shell, "send_get", SendOptions::with_method(HttpMethod::Get));
    register_send(engine, shell, "send_post", SendOptions::with_method(HttpMethod::Post));
    register_send(engine, shell, "send_form", SendOptions::form());

    let s = shell.clone();
    engine.register_fn(
        "send_script",
        move |ctx: NativeCallContext, name: &str| -> CommandResult {
            s.send_script(ctx.engine(), name, false).map_err(raise)
        },
    );
    let s = shell.clone();
    engine.register_fn(
        "send_script",
        move |ctx: NativeCallContext, name: &str, pretty: bool| -> CommandResult {
            s.send_script(ctx.engine(), name, pretty).map_err(raise)
        },
    );

    engine.register_fn("json_encode", |map: Map| json_encode(&map, false));
    engine.register_fn("json_encode", |map: Map, pretty: bool| json_encode(&map, pretty));

    let s = shell.clone();
    engine.register_fn("save", move |name: &str| -> CommandResult {
        s.save(name, false).map_err(raise)
    });
    let s = shell.clone();
    engine.register_fn("save", move |name: &str, overwrite: bool| -> CommandResult {
        s.save(name, overwrite).map_err(raise)
    });

    let s = shell.clone();
    engine.register_fn("load", move |ctx: NativeCallContext, name: &str| -> CommandResult {
        s.run_file(ctx.engine(), &s.store.resolve(name)).map_err(raise)
    });
    let s = shell.clone();
    engine.register_fn("loadf", move |ctx: NativeCallContext, path: &str| -> CommandResult {
        s.run_file(ctx.engine(), &expand_home(path)).map_err(raise)
    });

    let s = shell.clone();
    engine.register_fn("list", move || -> CommandResult { s.list().map_err(raise) });

    let s = shell.clone();
    engine.register_fn("debug", move || -> CommandResult<String> { s.dump().map_err(raise) });

    let s = shell.clone();
    engine.register_fn("help", move || -> CommandResult {
        let width = COMMANDS.iter().map(|(sig, _)| sig.len()).max().unwrap_or(0);
        for (signature, about) in COMMANDS {
            s.print(&format!("{signature:<width$}  {about}")).map_err(raise)?;
        }
        Ok(())
    });
}

/// `name()` and `name(pretty)` for one send variant.
fn register_send(engine: &mut Engine, shell: &Rc<Shell>, name: &str, options: SendOptions) {
    let (s, o) = (shell.clone(), options.clone());
    engine.register_fn(name, move || -> CommandResult { s.send(&o, false).map_err(raise) });
    let (s, o) = (shell.clone(), options);
    engine.register_fn(name, move |pretty: bool| -> CommandResult {
        s.send(&o, pretty).map_err(raise)
    });
}

/// Properties of the `context` binding.
fn register_context_type(engine: &mut Engine) {
    engine.register_type_with_name::<ContextHandle>("Context");

    text_property(engine, "scheme", |c| &mut c.scheme);
    text_property(engine, "host", |c| &mut c.host);
    text_property(engine, "path", |c| &mut c.path);
    text_property(engine, "method", |c| &mut c.method);
    text_property(engine, "url", |c| &mut c.url);
    text_property(engine, "data", |c| &mut c.data);

    engine.register_get_set(
        "port",
        |h: &mut ContextHandle| -> INT { h.context().borrow().port },
        |h: &mut ContextHandle, port: INT| h.context().borrow_mut().port = port,
    );
    engine.register_set("port", |h: &mut ContextHandle, port: FLOAT| -> CommandResult {
        if port.fract() != 0.0 || port.abs() > INT::MAX as FLOAT {
            return Err(raise(Error::UnsupportedType(format!(
                "port must be a whole number, got {port}"
            ))));
        }
        h.context().borrow_mut().port = port as INT;
        Ok(())
    });

    map_property(engine, "query", |c| &mut c.query);
    map_property(engine, "header", |c| &mut c.header);

    engine.register_fn("to_string", |h: &mut ContextHandle| context_json(&h.context().borrow()));
    engine.register_fn("to_debug", |h: &mut ContextHandle| context_json(&h.context().borrow()));
}

fn text_property(engine: &mut Engine, name: &str, field: fn(&mut Context) -> &mut String) {
    engine.register_get_set(
        name,
        move |h: &mut ContextHandle| -> ImmutableString {
            field(&mut h.context().borrow_mut()).as_str().into()
        },
        move |h: &mut ContextHandle, value: ImmutableString| {
            *field(&mut h.context().borrow_mut()) = value.to_string();
        },
    );
}

/// Reads hand out a copy; the engine writes chained updates such as
/// `context.query.page = "2"` back through the setter.
fn map_property(
    engine: &mut Engine,
    name: &str,
    field: fn(&mut Context) -> &mut BTreeMap<String, String>,
) {
    engine.register_get_set(
        name,
        move |h: &mut ContextHandle| -> Map {
            field(&mut h.context().borrow_mut())
                .iter()
                .map(|(k, v)| (k.as_str().into(), Dynamic::from(v.clone())))
                .collect()
        },
        move |h: &mut ContextHandle, map: Map| {
            *field(&mut h.context().borrow_mut()) = table_to_string_map(Some(&map));
        },
    );
}

fn context_json(ctx: &Context) -> String {
    ctx.to_tree().to_json(true).unwrap_or_default()
}

fn json_encode(map: &Map, pretty: bool) -> CommandResult<String> {
    Tree::from_table(map)
        .and_then(|tree| tree.to_json(pretty))
        .map_err(raise)
}

/// Query values may be strings or numbers.
fn query_value(value: &Dynamic) -> CommandResult<String> {
    if value.is_string() || value.is::<INT>() || value.is::<FLOAT>() {
        Ok(value.to_string())
    } else {
        Err(raise(Error::UnsupportedType(format!(
            "query value must be a string or number, got {}",
            value.type_name()
        ))))
    }
}

fn raise(err: Error) -> Box<EvalAltResult> {
    err.to_string().into()
}
