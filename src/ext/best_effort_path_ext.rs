use std::path::{Component, Path, PathBuf};

/// Renders a path for messages, preferring its canonical form.
///
/// Paths handled by the synchronizer can disappear between discovery and use,
/// so canonicalization is allowed to fail. In that case the path is made
/// absolute against the working directory and lexically normalized.
pub fn best_effort_path_display(path: &Path) -> String {
    if let Ok(canonical) = path.canonicalize() {
        return canonical.display().to_string();
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|current_dir| current_dir.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    normalize_path(&absolute).display().to_string()
}

/// Resolves `.` and `..` without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized: Vec<Component> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.last() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normalized.push(component),
            },
            _ => normalized.push(component),
        }
    }

    normalized.iter().collect()
}

pub trait BestEffortPathExt {
    fn best_effort_path_display(&self) -> String;
}

impl<P> BestEffortPathExt for P
where
    P: AsRef<Path> + ?Sized,
{
    fn best_effort_path_display(&self) -> String {
        best_effort_path_display(self.as_ref())
    }
}
