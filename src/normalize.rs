use crate::value::{FlagMap, Value};
use serde::Serialize;
use std::any::Any;

pub(crate) type FormatFn<F> = Box<dyn Fn(F) -> FlagMap + Send + Sync>;

/// Default coercion of an arbitrary payload into a flag map: booleans pass
/// through, every other value degrades to `false`. Payloads that don't
/// serialize to a JSON object yield an empty map. Never panics.
pub(crate) fn normalize<F: Serialize>(raw: &F) -> FlagMap {
    match serde_json::to_value(raw) {
        Ok(serde_json::Value::Object(entries)) => entries
            .into_iter()
            .map(|(key, value)| {
                let coerced = match value {
                    serde_json::Value::Bool(val) => Value::Bool(val),
                    _ => Value::Bool(false),
                };
                (key, coerced)
            })
            .collect(),
        _ => FlagMap::new(),
    }
}

/// Merges a produced flag map over the configured defaults, so the published
/// map always carries at least the declared keys.
pub(crate) fn with_defaults(defaults: &FlagMap, produced: FlagMap) -> FlagMap {
    let mut merged = defaults.clone();
    merged.extend(produced);
    merged
}

/// Runs the custom formatter over the default flags when the fetched shape is
/// the flag map itself; custom fetched shapes cannot be fed the defaults.
pub(crate) fn format_defaults<F: 'static>(
    format: &FormatFn<F>,
    defaults: &FlagMap,
) -> Option<FlagMap> {
    let raw: Box<dyn Any> = Box::new(defaults.clone());
    match raw.downcast::<F>() {
        Ok(raw) => Some(format(*raw)),
        Err(_) => None,
    }
}
