//! Named context scripts kept in the base directory.
//!
//! # Design
//! A stored context is a Rhai file holding one assignment,
//! `context = #{ ... }`, so loading it is just running it. Saving rewrites
//! the whole file in place; an interrupted write can leave it truncated and
//! nothing tries to recover from that.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::config::expand_home;
use crate::context::Context;
use crate::error::{Error, Result};

/// Run on every reset when present in the base directory.
pub const INIT_SCRIPT: &str = "init.rhai";

#[derive(Debug, Clone)]
pub struct ContextStore {
    base_dir: PathBuf,
}

impl ContextStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `~/` and absolute names are taken as paths; anything else is relative
    /// to the base directory.
    pub fn resolve(&self, name: &str) -> PathBuf {
        let path = expand_home(name);
        if path.is_absolute() {
            path
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn init_script(&self) -> PathBuf {
        self.base_dir.join(INIT_SCRIPT)
    }

    /// Script text that restores `ctx` when run.
    pub fn render(ctx: &Context) -> Result<String> {
        let code = ctx.to_tree().to_script_code("")?;
        Ok(format!("context = {code}\n"))
    }

    /// Write `ctx` under `name`. Without `overwrite` an existing file is left
    /// untouched and `FileExists` is returned.
    pub fn save(&self, name: &str, ctx: &Context, overwrite: bool) -> Result<PathBuf> {
        let path = self.resolve(name);
        let script = Self::render(ctx)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut options = OpenOptions::new();
        options.write(true);
        if overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        let mut file = options.open(&path).map_err(|err| match err.kind() {
            ErrorKind::AlreadyExists => Error::FileExists(path.clone()),
            _ => Error::Io(err),
        })?;
        file.write_all(script.as_bytes())?;

        tracing::debug!(path = %path.display(), overwrite, "context saved");
        Ok(path)
    }

    /// Read a script, mapping a missing file to `FileNotFound`.
    pub fn read(path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
            _ => Error::Io(err),
        })
    }

    /// Sorted file names in the base directory; empty when it does not exist.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}
