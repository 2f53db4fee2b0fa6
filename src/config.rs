//! Paths and environment defaults

use std::env;
use std::path::PathBuf;

/// Environment variable overriding the credential store location.
pub const STORE_ENV: &str = "SSHHOP_STORE";

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "SSHHOP_LOG";

/// Shell used when `$SHELL` is unset or empty.
pub const FALLBACK_SHELL: &str = "/bin/bash";

const STORE_DIR: &str = "sshhop";
const STORE_FILE: &str = "passwords.enc";

/// Location of the credential store.
///
/// `$SSHHOP_STORE` if set, otherwise `sshhop/passwords.enc` under the
/// user's configuration directory (`$XDG_CONFIG_HOME` or `~/.config` on
/// Linux). Falls back to the working directory when no home is known.
pub fn default_store_path() -> PathBuf {
    if let Some(path) = env::var_os(STORE_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STORE_DIR)
        .join(STORE_FILE)
}

/// The user's login shell: `$SHELL`, else [`FALLBACK_SHELL`].
pub fn login_shell() -> String {
    env::var("SHELL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_SHELL.to_string())
}
