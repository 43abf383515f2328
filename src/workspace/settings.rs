use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Client-provided configuration recorded at `initialize`, plus the derived
/// module search path used for import resolution.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub virtualenv_path: Option<PathBuf>,
    pub workspace_root: PathBuf,
    pub module_paths: Vec<PathBuf>,
}

impl ClientSettings {
    pub fn new(virtualenv_path: Option<PathBuf>, workspace_root: PathBuf) -> Self {
        let module_paths = compute_module_paths(virtualenv_path.as_deref(), &workspace_root);
        info!(?module_paths, "calculated module search path");
        Self {
            virtualenv_path,
            workspace_root,
            module_paths,
        }
    }

    /// Resolves a dotted module name against the search path. `a.b.c` maps
    /// to the first existing of `<root>/a/b/c.py`, then
    /// `<root>/a/b/c/__init__.py`, per search root in order.
    pub fn resolve_module(&self, dotted_name: &str) -> Option<PathBuf> {
        let relative: PathBuf = dotted_name.split('.').collect();
        for root in &self.module_paths {
            let base = root.join(&relative);

            let module_file = base.with_extension("py");
            if module_file.is_file() {
                return Some(module_file);
            }

            let package_init = base.join("__init__.py");
            if package_init.is_file() {
                return Some(package_init);
            }
        }
        None
    }
}

/// Search path order: venv site-packages, the system Python standard
/// library, then the workspace root itself.
fn compute_module_paths(virtualenv: Option<&Path>, workspace_root: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    paths.extend(virtualenv_site_packages(virtualenv));
    paths.extend(python_stdlib_paths(virtualenv));
    paths.push(workspace_root.to_path_buf());
    paths
}

fn virtualenv_site_packages(virtualenv: Option<&Path>) -> Vec<PathBuf> {
    let Some(venv) = virtualenv else {
        return Vec::new();
    };
    python_dirs_under(&venv.join("lib"))
        .into_iter()
        .map(|dir| dir.join("site-packages"))
        .collect()
}

/// Locates the interpreter backing the environment and derives its `lib`
/// directory: the venv's `bin/python` is a symlink into the installation,
/// whose parent-of-parent holds `lib/python*`.
fn python_stdlib_paths(virtualenv: Option<&Path>) -> Vec<PathBuf> {
    let interpreter = match virtualenv {
        Some(venv) => {
            let link = venv.join("bin").join("python");
            match std::fs::read_link(&link) {
                Ok(target) => target,
                Err(e) => {
                    warn!(path = %link.display(), error = %e, "could not read python symlink");
                    return Vec::new();
                }
            }
        }
        None => {
            warn!("no virtual environment configured, falling back to python on PATH");
            match find_in_path("python") {
                Some(path) => path,
                None => {
                    warn!("python executable not found on PATH");
                    return Vec::new();
                }
            }
        }
    };

    let Some(install_root) = interpreter.parent().and_then(Path::parent) else {
        return Vec::new();
    };
    python_dirs_under(&install_root.join("lib"))
}

/// Lists `python*` directories directly under `lib`.
fn python_dirs_under(lib: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(lib) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %lib.display(), error = %e, "could not read lib directory");
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
                && entry.file_name().to_string_lossy().starts_with("python")
        })
        .map(|entry| entry.path())
        .collect();
    dirs.sort();
    dirs
}

fn find_in_path(program: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn module_file_preferred_over_package_init() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("pkg/sub")).unwrap();
        fs::write(root.join("pkg/sub.py"), "").unwrap();
        fs::write(root.join("pkg/sub/__init__.py"), "").unwrap();

        let settings = ClientSettings::new(None, root.to_path_buf());
        let resolved = settings.resolve_module("pkg.sub").unwrap();
        assert_eq!(resolved, root.join("pkg/sub.py"));
    }

    #[test]
    fn package_init_used_when_no_module_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("pkg/sub")).unwrap();
        fs::write(root.join("pkg/sub/__init__.py"), "").unwrap();

        let settings = ClientSettings::new(None, root.to_path_buf());
        let resolved = settings.resolve_module("pkg.sub").unwrap();
        assert_eq!(resolved, root.join("pkg/sub/__init__.py"));
    }

    #[test]
    fn unknown_module_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ClientSettings::new(None, dir.path().to_path_buf());
        assert!(settings.resolve_module("no.such.module").is_none());
    }

    #[test]
    fn venv_site_packages_come_first() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let venv = root.join(".venv");
        fs::create_dir_all(venv.join("lib/python3.12/site-packages")).unwrap();
        fs::write(
            venv.join("lib/python3.12/site-packages/requests.py"),
            "",
        )
        .unwrap();
        // Shadowed by the site-packages entry
        fs::write(root.join("requests.py"), "").unwrap();

        let settings = ClientSettings::new(Some(venv.clone()), root.to_path_buf());
        let resolved = settings.resolve_module("requests").unwrap();
        assert_eq!(
            resolved,
            venv.join("lib/python3.12/site-packages/requests.py")
        );
    }

    #[test]
    fn workspace_root_is_last_search_entry() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ClientSettings::new(None, dir.path().to_path_buf());
        assert_eq!(settings.module_paths.last().unwrap(), dir.path());
    }
}
