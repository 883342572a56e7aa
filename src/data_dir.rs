//! Data directory validation.
//!
//! The configured directory is resolved once at startup. It is made absolute,
//! normalized lexically (no filesystem access, so a directory that does not
//! exist yet still validates), and rejected when a `..` segment climbs out of
//! its base. On Unix the result must also fall under an allow-listed prefix.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Prefixes a data directory may live under when no list is configured.
/// The working directory and the system temp dir are added at runtime.
pub const DEFAULT_ALLOWED_PREFIXES: [&str; 3] = ["/data", "/app/data", "/var/lib/todovault"];

/// Default allow-list: the static prefixes plus the working directory and
/// the system temp dir.
pub fn default_allowed_prefixes() -> Vec<PathBuf> {
    let mut prefixes: Vec<PathBuf> = DEFAULT_ALLOWED_PREFIXES.iter().map(PathBuf::from).collect();
    if let Ok(cwd) = std::env::current_dir() {
        prefixes.push(cwd);
    }
    prefixes.push(std::env::temp_dir());
    prefixes
}

/// Resolve and validate `configured` against the allow-list.
pub fn resolve_data_dir(configured: &Path, allowed_prefixes: &[PathBuf]) -> Result<PathBuf> {
    let base = std::env::current_dir().map_err(|e| {
        Error::InvalidConfiguration(format!("cannot determine working directory: {e}"))
    })?;
    resolve_data_dir_from(&base, configured, allowed_prefixes)
}

/// Same as [`resolve_data_dir`] with an explicit base for relative paths.
pub fn resolve_data_dir_from(
    base: &Path,
    configured: &Path,
    allowed_prefixes: &[PathBuf],
) -> Result<PathBuf> {
    if configured.as_os_str().is_empty() {
        return Err(Error::InvalidConfiguration(
            "storage.data_dir cannot be empty".to_string(),
        ));
    }

    let (anchor, absolute) = if configured.is_absolute() {
        (root_of(configured), configured.to_path_buf())
    } else {
        (base.to_path_buf(), base.join(configured))
    };

    let normalized = normalize(&absolute).ok_or_else(|| {
        Error::InvalidConfiguration(format!(
            "storage.data_dir '{}' escapes the filesystem root",
            configured.display()
        ))
    })?;

    if !normalized.starts_with(&anchor) {
        return Err(Error::InvalidConfiguration(format!(
            "storage.data_dir '{}' escapes its base directory",
            configured.display()
        )));
    }

    check_allowed(&normalized, allowed_prefixes)?;

    tracing::debug!(data_dir = %normalized.display(), "data directory validated");
    Ok(normalized)
}

/// Lexically collapse `.` and `..`. `None` when `..` would pop past the root.
pub fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                out.pop();
                depth -= 1;
            }
            Component::Normal(segment) => {
                out.push(segment);
                depth += 1;
            }
        }
    }
    Some(out)
}

fn root_of(path: &Path) -> PathBuf {
    let mut root = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => root.push(component.as_os_str()),
            _ => break,
        }
    }
    root
}

#[cfg(unix)]
fn check_allowed(path: &Path, allowed_prefixes: &[PathBuf]) -> Result<()> {
    let allowed = allowed_prefixes.iter().any(|prefix| {
        normalize(prefix)
            .map(|prefix| path.starts_with(prefix))
            .unwrap_or(false)
    });
    if allowed {
        Ok(())
    } else {
        Err(Error::InvalidConfiguration(format!(
            "storage.data_dir '{}' is outside the allowed prefixes",
            path.display()
        )))
    }
}

#[cfg(not(unix))]
fn check_allowed(_path: &Path, _allowed_prefixes: &[PathBuf]) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allow(prefixes: &[&str]) -> Vec<PathBuf> {
        prefixes.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn normalize_collapses_dots() {
        assert_eq!(
            normalize(Path::new("/data/./a/../b")),
            Some(PathBuf::from("/data/b"))
        );
        assert_eq!(normalize(Path::new("/..")), None);
    }

    #[test]
    fn relative_dir_resolves_under_base() {
        let dir = resolve_data_dir_from(
            Path::new("/srv/app"),
            Path::new("./data"),
            &allow(&["/srv/app"]),
        )
        .unwrap();
        assert_eq!(dir, PathBuf::from("/srv/app/data"));
    }

    #[test]
    fn relative_dir_escaping_base_is_rejected() {
        let err = resolve_data_dir_from(
            Path::new("/srv/app"),
            Path::new("../../etc"),
            &allow(&["/"]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn absolute_dir_climbing_past_root_is_rejected() {
        let err = resolve_data_dir_from(
            Path::new("/srv"),
            Path::new("/data/../../.."),
            &allow(&["/"]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn empty_dir_is_rejected() {
        assert!(resolve_data_dir_from(Path::new("/srv"), Path::new(""), &allow(&["/"])).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn dir_outside_allow_list_is_rejected() {
        let err = resolve_data_dir_from(
            Path::new("/srv"),
            Path::new("/etc/todovault"),
            &allow(&["/data", "/srv"]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("outside the allowed prefixes"));
    }

    #[cfg(unix)]
    #[test]
    fn allow_list_matches_whole_components() {
        let err = resolve_data_dir_from(
            Path::new("/srv"),
            Path::new("/database"),
            &allow(&["/data"]),
        );
        assert!(err.is_err());

        let ok = resolve_data_dir_from(Path::new("/srv"), Path::new("/data/todos"), &allow(&["/data"]));
        assert_eq!(ok.unwrap(), PathBuf::from("/data/todos"));
    }
}
