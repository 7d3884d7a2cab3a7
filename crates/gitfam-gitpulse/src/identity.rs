//! Who "me" is.

use std::path::Path;

use gitfam_core::{FamError, UserIdentity};

use crate::files::open_repository;

/// Identity from `--user`, or from `user.name` / `user.email` in git config.
///
/// # Errors
///
/// Returns [`FamError::Config`] when no flag is given and git config has
/// neither a name nor an email.
pub fn resolve_user(repo_path: &Path, flag: Option<&str>) -> Result<UserIdentity, FamError> {
    if let Some(value) = flag.map(str::trim).filter(|v| !v.is_empty()) {
        return Ok(UserIdentity::from_flag(value));
    }

    let repo = open_repository(repo_path)?;
    let config = repo
        .config()
        .map_err(|e| FamError::Git(format!("failed to read git config: {e}")))?;
    let name = config.get_string("user.name").unwrap_or_default();
    let email = config.get_string("user.email").unwrap_or_default();
    if name.is_empty() && email.is_empty() {
        return Err(FamError::Config(
            "could not determine git user; set user.name/user.email or pass --user".into(),
        ));
    }
    Ok(UserIdentity::new(name, email))
}
