//! The live shell session: one context, one script engine.
//!
//! # Design
//! `Session` owns the Rhai engine, the persistent top-level scope and the
//! `Shell` state every registered command works on. The typed `Context`
//! lives in `Shell`; scripts reach it through the `context` binding, a
//! `ContextHandle` whose properties read and write the struct directly.
//!
//! When a script assigns a plain object map to `context` (which is what a
//! saved context file does), the map is converted with `Context::from_table`
//! after the run and the binding is pointed back at the handle. Nested runs
//! started by commands (`load`, `reset`, `send_script`) get their own scope
//! holding the same handle.

use std::cell::RefCell;
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;

use rhai::{Dynamic, Engine, Map, Scope};

use crate::commands;
use crate::config::Config;
use crate::context::{Context, HeaderCase};
use crate::dispatch::{Dispatcher, SendOptions, Transport, UreqTransport};
use crate::error::{Error, Result};
use crate::store::ContextStore;
use crate::value::pretty_json;

/// Name of the script binding holding the context.
pub const CONTEXT_VAR: &str = "context";

pub struct Session {
    engine: Engine,
    scope: Scope<'static>,
    shell: Rc<Shell>,
}

impl Session {
    /// Session sending over the network and printing to stdout.
    pub fn new(config: Config) -> Result<Session> {
        let transport = UreqTransport::new(config.timeout);
        Session::with_parts(config, Box::new(transport), Box::new(io::stdout()))
    }

    /// Session with an explicit transport and output, then reset as on
    /// startup (defaults plus the init script).
    pub fn with_parts(
        config: Config,
        transport: Box<dyn Transport>,
        out: Box<dyn Write>,
    ) -> Result<Session> {
        let shell = Rc::new(Shell {
            context: RefCell::new(Context::default()),
            store: ContextStore::new(config.base_dir),
            dispatcher: Dispatcher::new(transport),
            header_case: config.header_case,
            out: RefCell::new(out),
        });

        let mut engine = Engine::new();
        commands::register(&mut engine, &shell);

        let mut scope = Scope::new();
        scope.push(CONTEXT_VAR, ContextHandle(shell.clone()));

        shell.reset(&engine)?;
        Ok(Session {
            engine,
            scope,
            shell,
        })
    }

    /// Run a snippet in the persistent scope.
    pub fn eval(&mut self, code: &str) -> Result<()> {
        let result = self.engine.run_with_scope(&mut self.scope, code);
        let absorbed = self.shell.absorb(&mut self.scope);
        result?;
        absorbed
    }

    pub fn run_file(&mut self, path: &Path) -> Result<()> {
        let code = ContextStore::read(path)?;
        tracing::debug!(path = %path.display(), "running script");
        self.eval(&code)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.shell.reset(&self.engine)
    }

    /// Snapshot of the live context.
    pub fn context(&self) -> Context {
        self.shell.context.borrow().clone()
    }

    pub fn update_context<R>(&self, f: impl FnOnce(&mut Context) -> R) -> R {
        f(&mut self.shell.context.borrow_mut())
    }

    pub fn header_case(&self) -> HeaderCase {
        self.shell.header_case
    }

    pub fn store(&self) -> &ContextStore {
        &self.shell.store
    }
}

/// State shared by the session and the commands registered in its engine.
pub(crate) struct Shell {
    pub(crate) context: RefCell<Context>,
    pub(crate) store: ContextStore,
    pub(crate) dispatcher: Dispatcher<Box<dyn Transport>>,
    pub(crate) header_case: HeaderCase,
    pub(crate) out: RefCell<Box<dyn Write>>,
}

/// The `context` binding seen by scripts.
#[derive(Clone)]
pub(crate) struct ContextHandle(pub(crate) Rc<Shell>);

impl ContextHandle {
    pub(crate) fn context(&self) -> &RefCell<Context> {
        &self.0.context
    }
}

impl Shell {
    /// Reinstall the defaults and run the init script when there is one.
    pub(crate) fn reset(self: &Rc<Self>, engine: &Engine) -> Result<()> {
        *self.context.borrow_mut() = Context::default();
        let init = self.store.init_script();
        if init.is_file() {
            self.run_file(engine, &init)?;
        }
        Ok(())
    }

    /// Run a script file in a fresh scope bound to this shell's context.
    pub(crate) fn run_file(self: &Rc<Self>, engine: &Engine, path: &Path) -> Result<()> {
        let code = ContextStore::read(path)?;
        tracing::debug!(path = %path.display(), "loading script");

        let mut scope = Scope::new();
        scope.push(CONTEXT_VAR, ContextHandle(self.clone()));
        let result = engine.run_with_scope(&mut scope, &code);
        let absorbed = self.absorb(&mut scope);
        result?;
        absorbed
    }

    /// Take over an object map assigned to `context` and restore the handle.
    fn absorb(self: &Rc<Self>, scope: &mut Scope) -> Result<()> {
        let value = scope.get_value::<Dynamic>(CONTEXT_VAR);
        if value.as_ref().is_some_and(|v| v.is::<ContextHandle>()) {
            return Ok(());
        }
        scope.set_value(CONTEXT_VAR, ContextHandle(self.clone()));

        let map = value
            .and_then(|v| v.try_cast::<Map>())
            .ok_or_else(|| Error::Script(format!("{CONTEXT_VAR} must be an object map")))?;
        let ctx = Context::from_table(&map)?;
        *self.context.borrow_mut() = ctx;
        Ok(())
    }

    /// Dispatch the context and print the body, pretty-printed on request.
    pub(crate) fn send(&self, options: &SendOptions, pretty: bool) -> Result<()> {
        let body = {
            let ctx = self.context.borrow();
            let mut out = self.out.borrow_mut();
            self.dispatcher.send(&ctx, options, &mut **out)?
        };
        let text = if pretty { pretty_json(&body) } else { body };
        self.print(&text)
    }

    /// Run a stored script, send the context it produced, then put the
    /// previous context back whatever happened.
    pub(crate) fn send_script(self: &Rc<Self>, engine: &Engine, name: &str, pretty: bool) -> Result<()> {
        let saved = self.context.borrow().clone();
        let result = self
            .run_file(engine, &self.store.resolve(name))
            .and_then(|()| self.send(&SendOptions::default(), pretty));
        *self.context.borrow_mut() = saved;
        result
    }

    pub(crate) fn save(&self, name: &str, overwrite: bool) -> Result<()> {
        let ctx = self.context.borrow();
        self.store.save(name, &ctx, overwrite)?;
        Ok(())
    }

    pub(crate) fn list(&self) -> Result<()> {
        for name in self.store.list()? {
            self.print(&name)?;
        }
        Ok(())
    }

    /// The context as pretty JSON.
    pub(crate) fn dump(&self) -> Result<String> {
        self.context.borrow().to_tree().to_json(true)
    }

    pub(crate) fn print(&self, text: &str) -> Result<()> {
        writeln!(self.out.borrow_mut(), "{text}")?;
        Ok(())
    }
}
