//! Shared path manipulation utilities.

use std::env;
use std::path::{Component, Path, PathBuf};

/// Resolve a path to an absolute, normalized path.
///
/// Existing paths go through `fs::canonicalize`. Paths that do not exist
/// (yet, or any more) are made absolute against the CWD and `..`/`.`
/// components are resolved syntactically.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let absolute = absolutize(path);
    if let Ok(canonical) = std::fs::canonicalize(&absolute) {
        return canonical;
    }
    normalize_syntactic(&absolute)
}

/// Absolute location of a directory entry without following the entry itself.
///
/// The parent directory is canonicalized, the final component is kept
/// verbatim. A symlink therefore resolves to the link's own location, which
/// is what provenance records must remember: the name the caller saw.
pub fn resolve_entry_path(path: &Path) -> PathBuf {
    let absolute = absolutize(path);
    let normalized = normalize_syntactic(&absolute);
    match (normalized.parent(), normalized.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = std::fs::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf());
            parent.join(name)
        }
        _ => normalized,
    }
}

/// Whether `path` lies inside (or is) `ancestor`, comparing resolved forms.
pub fn is_within(path: &Path, ancestor: &Path) -> bool {
    resolve_absolute_path(path).starts_with(resolve_absolute_path(ancestor))
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    }
}

fn normalize_syntactic(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Prefix(..) | Component::RootDir | Component::Normal(_) => {
                components.push(component);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if let Some(Component::Normal(_)) = components.last() {
                    components.pop();
                }
            }
        }
    }
    components.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_existing_path_canonically() {
        let cwd = env::current_dir().unwrap();
        let resolved = resolve_absolute_path(Path::new("."));
        assert_eq!(resolved, std::fs::canonicalize(&cwd).unwrap());
    }

    #[test]
    fn normalizes_nonexistent_path_syntactically() {
        let input = Path::new("/nonexistent_hwd/foo/../bar");
        assert!(std::fs::canonicalize(input).is_err());
        assert_eq!(
            resolve_absolute_path(input),
            PathBuf::from("/nonexistent_hwd/bar")
        );
    }

    #[test]
    fn handles_parent_at_root() {
        assert_eq!(normalize_syntactic(Path::new("/../foo")), Path::new("/foo"));
    }

    #[cfg(unix)]
    #[test]
    fn entry_path_keeps_symlink_name() {
        let tmp = tempfile::tempdir().unwrap();
        let real = tmp.path().join("real.bin");
        let link = tmp.path().join("link.bin");
        std::fs::write(&real, b"x").unwrap();
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let resolved = resolve_entry_path(&link);
        assert_eq!(resolved.file_name().unwrap(), "link.bin");
        assert_eq!(
            resolved.parent().unwrap(),
            std::fs::canonicalize(tmp.path()).unwrap()
        );
    }

    #[test]
    fn is_within_detects_nesting() {
        let tmp = tempfile::tempdir().unwrap();
        let inner = tmp.path().join("a").join("b");
        std::fs::create_dir_all(&inner).unwrap();
        assert!(is_within(&inner, tmp.path()));
        assert!(!is_within(tmp.path(), &inner));
    }
}
