use crate::client::Client;
use crate::errors::{ClientError, ErrorKind};
use crate::value::{FlagMap, Value};
use log::{error, warn};
use serde::Serialize;
use std::fmt::Write;

/// Inspection and override surface for the flags of a [`Client`], meant for
/// debugging builds.
///
/// The panel is visible in debug builds or when explicitly shown via
/// [`DebugPanel::show`]; a hidden panel renders nothing. Overrides made
/// through the panel are in-memory only, like [`Client::override_flag`].
///
/// # Examples
///
/// ```rust
/// use flagcache::{Client, DebugPanel, Source, Value};
///
/// let client = Client::builder(Source::Local)
///     .default_flags([("welcome", Value::Bool(false))])
///     .build()
///     .unwrap();
///
/// let panel = DebugPanel::new(&client);
/// panel.toggle("welcome");
/// println!("{}", panel.render());
/// ```
pub struct DebugPanel<'a, F = FlagMap> {
    client: &'a Client<F>,
    show: bool,
}

impl<'a, F: Serialize + Send + 'static> DebugPanel<'a, F> {
    /// Creates a panel for the given client, visible in debug builds.
    pub fn new(client: &'a Client<F>) -> Self {
        Self {
            client,
            show: cfg!(debug_assertions),
        }
    }

    /// Overrides the build-mode visibility default.
    pub fn show(mut self, show: bool) -> Self {
        self.show = show;
        self
    }

    /// True when the panel renders its content.
    pub fn is_visible(&self) -> bool {
        self.show
    }

    /// Renders one line per flag, sorted by key. Boolean flags show their
    /// toggle state, other values their JSON form. Hidden panels render an
    /// empty string.
    pub fn render(&self) -> String {
        if !self.is_visible() {
            return String::new();
        }
        let flags = self.client.flags();
        let mut keys: Vec<&String> = flags.keys().collect();
        keys.sort();

        let mut out = String::from("Feature Flags Debug Panel\n");
        for key in keys {
            match &flags[key] {
                Value::Bool(val) => {
                    let state = if *val { "on " } else { "off" };
                    _ = writeln!(out, "  [{state}] {key}");
                }
                value => {
                    let text = serde_json::to_string(value)
                        .unwrap_or_else(|_| value.to_string());
                    _ = writeln!(out, "        {key} = {text}");
                }
            }
        }
        out
    }

    /// Flips a boolean flag. Non-boolean or unknown flags are left untouched
    /// and reported as a warning.
    pub fn toggle(&self, key: &str) {
        match self.client.get_flag(key) {
            Some(Value::Bool(val)) => self.client.override_flag(key, !val),
            Some(_) => {
                let err = ClientError::new(
                    ErrorKind::InvalidOverrideValue,
                    format!("The flag '{key}' is not a boolean and cannot be toggled."),
                );
                warn!(event_id = err.kind.as_u16(); "{}", err);
            }
            None => {
                let err = ClientError::new(
                    ErrorKind::InvalidOverrideValue,
                    format!("There is no flag named '{key}' to toggle."),
                );
                warn!(event_id = err.kind.as_u16(); "{}", err);
            }
        }
    }

    /// Parses free-text JSON input and overrides the flag with the parsed
    /// value. Unparseable or unsupported input is discarded without touching
    /// the flag.
    pub fn set_from_input(&self, key: &str, input: &str) {
        let parsed = match serde_json::from_str::<serde_json::Value>(input) {
            Ok(parsed) => parsed,
            Err(_) => {
                let err = ClientError::new(
                    ErrorKind::InvalidOverrideValue,
                    format!("Invalid JSON input for the flag '{key}', the value is discarded."),
                );
                error!(event_id = err.kind.as_u16(); "{}", err);
                return;
            }
        };
        match Value::from_json_val(&parsed) {
            Some(value) => self.client.override_flag(key, value),
            None => {
                let err = ClientError::new(
                    ErrorKind::InvalidOverrideValue,
                    format!("Unsupported value for the flag '{key}', the value is discarded."),
                );
                error!(event_id = err.kind.as_u16(); "{}", err);
            }
        }
    }
}
