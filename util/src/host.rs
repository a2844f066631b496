//! Host platform (linux for example) utility functions

use std::path::PathBuf;

/// Retrieve a short description of the host platform.
pub fn get_uname() -> std::io::Result<String> {
    Ok(format!("{} ({})", std::env::consts::OS, std::env::consts::ARCH))
}

/// Get the software root directory from the `ARES_SW_ROOT` environment
/// variable.
pub fn get_ares_sw_root() -> Result<PathBuf, std::env::VarError> {
    match std::env::var("ARES_SW_ROOT") {
        Ok(s) => Ok(s.into()),
        Err(e) => Err(e)
    }
}
