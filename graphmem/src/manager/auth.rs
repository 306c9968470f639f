//! Per-project authorization tokens (§4.2)
//!
//! Each project directory in multi-tenant mode may carry a `.auth_token`
//! file (mode 0600) holding an opaque bearer token. Callers present a token
//! out-of-band (the MCP transport or HTTP layer extracts it); this module
//! only knows how to create, read, and compare tokens.

use std::path::Path;

use rand::Rng;

use crate::error::{Error, Result};

const TOKEN_FILE: &str = ".auth_token";
const TOKEN_BYTES: usize = 32;

/// Generate a new random token, hex-encoded
pub fn generate_token() -> String {
    let bytes: [u8; TOKEN_BYTES] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Read the token stored for a project directory, if any
pub fn read_token(project_dir: &Path) -> Result<Option<String>> {
    let path = project_dir.join(TOKEN_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)?;
    Ok(Some(contents.trim().to_string()))
}

/// Write a token for a project directory, creating the file with 0600
/// permissions on unix so only the owning process user can read it.
pub fn write_token(project_dir: &Path, token: &str) -> Result<()> {
    let path = project_dir.join(TOKEN_FILE);
    std::fs::write(&path, token)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&path)?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(&path, perms)?;
    }

    Ok(())
}

/// Read the project's token, generating and persisting one if absent and
/// `auto_init` is set
pub fn ensure_token(project_dir: &Path, auto_init: bool) -> Result<Option<String>> {
    if let Some(token) = read_token(project_dir)? {
        return Ok(Some(token));
    }
    if !auto_init {
        return Ok(None);
    }
    let token = generate_token();
    write_token(project_dir, &token)?;
    Ok(Some(token))
}

/// Constant-time token comparison, to avoid leaking match length via timing
pub fn tokens_match(expected: &str, presented: &str) -> bool {
    let a = expected.as_bytes();
    let b = presented.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Authorize a presented token (or its absence) against a project's stored
/// token, per the configured auth policy (§4.2, §7 `UNAUTHORIZED`)
pub fn authorize(
    expected: Option<&str>,
    presented: Option<&str>,
    required: bool,
) -> Result<()> {
    match (expected, presented) {
        (None, _) if !required => Ok(()),
        (None, _) => Err(Error::Unauthorized(
            "project has no auth token configured but auth is required".into(),
        )),
        (Some(_), None) => Err(Error::Unauthorized("missing bearer token".into())),
        (Some(expected), Some(presented)) => {
            if tokens_match(expected, presented) {
                Ok(())
            } else {
                Err(Error::Unauthorized("token mismatch".into()))
            }
        }
    }
}
