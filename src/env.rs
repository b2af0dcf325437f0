use std::collections::HashMap;
use std::env as stdenv;
use std::io;
use std::path::{Path, PathBuf};

/// Process-level view the shell keeps between commands.
///
/// Holds the variables handed to spawned programs, the working directory and
/// the flag the read-evaluate loop checks after every command.
#[derive(Debug, Clone)]
pub struct Environment {
    vars: HashMap<String, String>,
    current_dir: PathBuf,
    should_exit: bool,
}

impl Environment {
    /// Capture the current process state.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars: stdenv::vars().collect(),
            current_dir,
            should_exit: false,
        }
    }

    /// An environment with no variables, rooted at `current_dir`.
    pub fn empty(current_dir: PathBuf) -> Self {
        Self {
            vars: HashMap::new(),
            current_dir,
            should_exit: false,
        }
    }

    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    pub fn vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn current_dir(&self) -> &Path {
        &self.current_dir
    }

    /// `$HOME`, if set and non-empty.
    pub fn home(&self) -> Option<&str> {
        self.get_var("HOME").filter(|home| !home.is_empty())
    }

    /// Changes the process working directory.
    ///
    /// Relative paths resolve against the current directory. On failure
    /// nothing changes.
    pub fn change_dir(&mut self, target: &Path) -> io::Result<&Path> {
        let new_dir = if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.current_dir.join(target)
        };
        let canonical = new_dir.canonicalize()?;
        stdenv::set_current_dir(&canonical)?;
        self.current_dir = canonical;
        Ok(&self.current_dir)
    }

    pub fn request_exit(&mut self) {
        self.should_exit = true;
    }

    pub fn should_exit(&self) -> bool {
        self.should_exit
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
