//! File permission checks for secret material
//!
//! The password file is only read, never rewritten, so loose permissions
//! are reported rather than enforced.

use crate::error::DashboardError;
use std::path::Path;
use tracing::{debug, warn};

/// Maximum permission mode expected on a secret file (owner rw, group r)
#[cfg(unix)]
pub const SECRET_FILE_MAX_MODE: u32 = 0o640;

/// Check whether a secret file is readable beyond owner and group.
///
/// Returns `Ok(true)` when the permissions are acceptable.
#[cfg(unix)]
pub fn check_secret_file_permissions(path: &Path) -> Result<bool, DashboardError> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = std::fs::metadata(path)?;
    let file_mode = metadata.permissions().mode() & 0o777;

    if file_mode & !SECRET_FILE_MAX_MODE != 0 {
        warn!(
            "Password file {:?} has loose permissions: {:o} (expected {:o} or stricter)",
            path, file_mode, SECRET_FILE_MAX_MODE
        );
        return Ok(false);
    }

    debug!("Permissions valid for {:?}: {:o}", path, file_mode);
    Ok(true)
}

/// Check secret file permissions (non-Unix stub)
#[cfg(not(unix))]
pub fn check_secret_file_permissions(path: &Path) -> Result<bool, DashboardError> {
    debug!("Permission validation not implemented for this platform: {:?}", path);
    Ok(true)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_private_file_accepted() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600)).unwrap();
        assert!(check_secret_file_permissions(file.path()).unwrap());
    }

    #[test]
    fn test_world_readable_file_flagged() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(!check_secret_file_permissions(file.path()).unwrap());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(check_secret_file_permissions(Path::new("/nonexistent/secret")).is_err());
    }
}
