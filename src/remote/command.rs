//! Remote command pull, parse and dispatch.
//!
//! A component owns one command slot in the store. Each poll reads at most
//! one command string, dispatches it through the component's table and
//! clears the slot, whether or not a handler matched.

use super::store::{Namespace, RemoteStore};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

/// A parsed `verb` or `verb:argument` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub verb: String,
    pub arg: Option<String>,
}

impl Command {
    /// Parse a raw command string.
    ///
    /// Splits once on `:`, so the argument may itself contain colons.
    /// Returns `None` for empty or whitespace-only input.
    ///
    /// ```rust
    /// use parkgate::remote::Command;
    ///
    /// let cmd = Command::parse("set_get:tid-1,ABC123").unwrap();
    /// assert_eq!(cmd.verb, "set_get");
    /// assert_eq!(cmd.arg.as_deref(), Some("tid-1,ABC123"));
    /// assert!(Command::parse("  ").is_none());
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let (verb, arg) = match raw.split_once(':') {
            Some((verb, arg)) => (verb, Some(arg.to_string())),
            None => (raw, None),
        };
        Some(Self {
            verb: verb.to_string(),
            arg,
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.arg {
            Some(arg) => write!(f, "{}:{}", self.verb, arg),
            None => f.write_str(&self.verb),
        }
    }
}

type UnitFn<T> = Box<dyn Fn(&mut T) + Send + Sync>;
type ArgFn<T> = Box<dyn Fn(&mut T, &str) + Send + Sync>;

/// A command handler taking zero or one argument.
pub enum Handler<T> {
    Unit(UnitFn<T>),
    Arg(ArgFn<T>),
}

impl<T> Handler<T> {
    pub fn unit<F>(f: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        Self::Unit(Box::new(f))
    }

    pub fn arg<F>(f: F) -> Self
    where
        F: Fn(&mut T, &str) + Send + Sync + 'static,
    {
        Self::Arg(Box::new(f))
    }
}

/// Result of one dispatch attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The slot was empty.
    Idle,
    Executed(Command),
    Unmatched(Command),
    MissingArgument(Command),
}

/// Verb to handler table for one component.
pub struct CommandTable<T> {
    handlers: HashMap<String, Handler<T>>,
}

impl<T> Default for CommandTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CommandTable<T> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler, replacing any previous one for the verb.
    pub fn insert(&mut self, verb: impl Into<String>, handler: Handler<T>) {
        self.handlers.insert(verb.into(), handler);
    }

    pub fn with(mut self, verb: impl Into<String>, handler: Handler<T>) -> Self {
        self.insert(verb, handler);
        self
    }

    pub fn contains(&self, verb: &str) -> bool {
        self.handlers.contains_key(verb)
    }

    /// Run the handler registered for `command.verb`, if any.
    pub fn dispatch(&self, target: &mut T, command: Command) -> Dispatch {
        match (self.handlers.get(&command.verb), command.arg.as_deref()) {
            (None, _) => Dispatch::Unmatched(command),
            (Some(Handler::Unit(f)), _) => {
                f(target);
                Dispatch::Executed(command)
            }
            (Some(Handler::Arg(f)), Some(arg)) => {
                f(target, arg);
                Dispatch::Executed(command)
            }
            (Some(Handler::Arg(_)), None) => Dispatch::MissingArgument(command),
        }
    }
}

/// The command slot of one namespace.
#[derive(Debug, Clone)]
pub struct CommandChannel {
    path: String,
}

impl CommandChannel {
    pub fn new(namespace: &Namespace) -> Self {
        Self {
            path: namespace.command(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Empty the slot.
    pub fn clear(&self, store: &dyn RemoteStore) {
        if let Err(err) = store.set(&self.path, Value::String(String::new())) {
            warn!(path = %self.path, error = %err, "Failed to clear command slot");
        }
    }

    /// Read, dispatch and clear at most one pending command.
    pub fn poll<T>(&self, store: &dyn RemoteStore, table: &CommandTable<T>, target: &mut T) -> Dispatch {
        let raw = match store.get(&self.path) {
            Ok(Some(Value::String(raw))) => raw,
            Ok(Some(Value::Null)) | Ok(None) => return Dispatch::Idle,
            Ok(Some(other)) => {
                warn!(path = %self.path, value = %other, "Discarding non-string command");
                self.clear(store);
                return Dispatch::Idle;
            }
            Err(err) => {
                warn!(path = %self.path, error = %err, "Failed to read command slot");
                return Dispatch::Idle;
            }
        };
        let Some(command) = Command::parse(&raw) else {
            if !raw.is_empty() {
                self.clear(store);
            }
            return Dispatch::Idle;
        };

        info!(path = %self.path, command = %command, "Received command");
        let outcome = table.dispatch(target, command);
        match &outcome {
            Dispatch::Executed(cmd) => debug!(path = %self.path, command = %cmd, "Command executed"),
            Dispatch::Unmatched(cmd) => {
                warn!(path = %self.path, verb = %cmd.verb, "No handler for command verb")
            }
            Dispatch::MissingArgument(cmd) => {
                warn!(path = %self.path, verb = %cmd.verb, "Command requires an argument")
            }
            Dispatch::Idle => {}
        }
        self.clear(store);
        outcome
    }
}
