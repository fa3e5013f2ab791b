//! Environment variable helpers
//!
//! Used by the executor configuration to layer `CPOOL_*` overrides on top
//! of compiled-in defaults. A variable that is set but does not parse is
//! reported with a `warn!` event and the default wins.
//!
//! ```ignore
//! use corepool_sync::env::{env_get, env_get_bool, env_get_opt};
//!
//! let core: usize = env_get("CPOOL_CORE_SIZE", 20);
//! let fair = env_get_bool("CPOOL_FAIR", false);
//! let stack: Option<usize> = env_get_opt("CPOOL_STACK_SIZE");
//! ```

use std::str::FromStr;
use tracing::warn;

/// Read `key` and parse it as `T`, falling back to `default`
pub fn env_get<T: FromStr>(key: &str, default: T) -> T {
    env_get_opt(key).unwrap_or(default)
}

/// Read `key` as a boolean
///
/// `1`/`true`/`yes`/`on` and `0`/`false`/`no`/`off` are recognised,
/// case-insensitively. Anything else keeps `default`.
pub fn env_get_bool(key: &str, default: bool) -> bool {
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(key, value = %raw, "ignoring unrecognised boolean");
            default
        }
    }
}

/// Read `key` and parse it as `T`; `None` if unset or unparsable
pub fn env_get_opt<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable value");
            None
        }
    }
}
