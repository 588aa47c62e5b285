//! Location of the UI-element-tree runtime on disk.
//!
//! Portable-mode output embeds a `require(...)` of the `sprig-runtime`
//! package, so the compiler must know where that package lives. The entry
//! path is resolved once per process (node_modules lookup walking up from the
//! working directory, honoring the manifest's `main` field) and cached in an
//! immutable process-wide value; a failed resolution is returned to the
//! caller and never cached.

use crate::error::{self, CompilerError};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

/// npm package the generated module source requires.
pub const RUNTIME_PACKAGE: &str = "sprig-runtime";
/// Global the runtime binds in direct-mode evaluation contexts.
pub const RUNTIME_GLOBAL: &str = "Sprig";

static RUNTIME_ENTRY: OnceLock<PathBuf> = OnceLock::new();

#[derive(Deserialize)]
struct PackageManifest {
    #[serde(default)]
    main: Option<String>,
}

/// Absolute path of the runtime's entry file, resolved once per process.
pub fn runtime_entry() -> Result<PathBuf, CompilerError> {
    if let Some(entry) = RUNTIME_ENTRY.get() {
        return Ok(entry.clone());
    }
    let cwd = env::current_dir().map_err(|e| resolution_error(&e.to_string()))?;
    let resolved = resolve_entry_from(&cwd)?;
    Ok(RUNTIME_ENTRY.get_or_init(|| resolved).clone())
}

fn resolution_error(message: &str) -> CompilerError {
    CompilerError::new(error::RUNTIME_RESOLUTION_ERROR, message, "", 0, 0)
}

fn resolve_entry_from(start: &Path) -> Result<PathBuf, CompilerError> {
    for dir in start.ancestors() {
        let package_dir = dir.join("node_modules").join(RUNTIME_PACKAGE);
        let manifest_path = package_dir.join("package.json");
        if !manifest_path.is_file() {
            continue;
        }
        let raw = fs::read_to_string(&manifest_path)
            .map_err(|e| resolution_error(&format!("unreadable {}: {}", manifest_path.display(), e)))?;
        let manifest: PackageManifest = serde_json::from_str(&raw)
            .map_err(|e| resolution_error(&format!("invalid {}: {}", manifest_path.display(), e)))?;
        let entry = package_dir.join(manifest.main.as_deref().unwrap_or("index.js"));
        if !entry.is_file() {
            return Err(resolution_error(&format!(
                "{} entry {} does not exist",
                RUNTIME_PACKAGE,
                entry.display()
            )));
        }
        return Ok(entry);
    }
    Err(resolution_error(&format!(
        "unable to locate the {} package from {}",
        RUNTIME_PACKAGE,
        start.display()
    )))
}

/// Reference to the runtime entry for embedding in portable output: relative
/// to the output file's directory when one is supplied, absolute otherwise.
pub fn runtime_reference(output_file: Option<&str>) -> Result<String, CompilerError> {
    let entry = runtime_entry()?;
    Ok(reference_for(&entry, output_file))
}

pub(crate) fn reference_for(entry: &Path, output_file: Option<&str>) -> String {
    match output_file {
        Some(out) => {
            let out = absolute(Path::new(out));
            let base = out.parent().unwrap_or_else(|| Path::new("/"));
            let mut reference = forward_slashes(&relative_path(base, entry));
            if !reference.starts_with('.') {
                reference = format!("./{}", reference);
            }
            reference
        }
        None => forward_slashes(entry),
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut rel = PathBuf::new();
    for _ in common..from.len() {
        rel.push("..");
    }
    for part in &to[common..] {
        rel.push(part.as_os_str());
    }
    rel
}

fn forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Seeds the process-wide entry with an on-disk fixture so tests never depend
/// on the host's node_modules. Idempotent across test threads.
#[cfg(test)]
pub(crate) fn install_test_runtime() -> PathBuf {
    let root = env::temp_dir().join("sprig-runtime-fixture");
    let package_dir = root.join("node_modules").join(RUNTIME_PACKAGE);
    fs::create_dir_all(package_dir.join("lib")).unwrap();
    fs::write(
        package_dir.join("package.json"),
        "{\"name\": \"sprig-runtime\", \"main\": \"lib/index.js\"}",
    )
    .unwrap();
    fs::write(package_dir.join("lib").join("index.js"), "module.exports = {};\n").unwrap();
    let entry = package_dir.join("lib").join("index.js");
    let _ = RUNTIME_ENTRY.set(entry);
    RUNTIME_ENTRY.get().unwrap().clone()
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path_descends_and_climbs() {
        let rel = relative_path(Path::new("/a/b"), Path::new("/a/c/d.js"));
        assert_eq!(rel, PathBuf::from("../c/d.js"));
        let rel = relative_path(Path::new("/a/b"), Path::new("/a/b/d.js"));
        assert_eq!(rel, PathBuf::from("d.js"));
    }

    #[test]
    fn test_reference_is_relative_to_output_dir() {
        let entry = Path::new("/a/node_modules/sprig-runtime/lib/index.js");
        let reference = reference_for(entry, Some("/a/b/out.js"));
        assert_eq!(reference, "../node_modules/sprig-runtime/lib/index.js");
    }

    #[test]
    fn test_sibling_reference_gets_dot_prefix() {
        let entry = Path::new("/a/b/runtime.js");
        let reference = reference_for(entry, Some("/a/b/out.js"));
        assert_eq!(reference, "./runtime.js");
    }

    #[test]
    fn test_no_output_file_falls_back_to_absolute() {
        let entry = Path::new("/a/node_modules/sprig-runtime/lib/index.js");
        let reference = reference_for(entry, None);
        assert_eq!(reference, "/a/node_modules/sprig-runtime/lib/index.js");
    }

    #[test]
    fn test_resolves_entry_through_ancestors() {
        let root = env::temp_dir().join("sprig-resolve-fixture");
        let package_dir = root.join("node_modules").join(RUNTIME_PACKAGE);
        fs::create_dir_all(&package_dir).unwrap();
        fs::write(
            package_dir.join("package.json"),
            "{\"name\": \"sprig-runtime\", \"main\": \"runtime.js\"}",
        )
        .unwrap();
        fs::write(package_dir.join("runtime.js"), "module.exports = {};\n").unwrap();
        let start = root.join("app").join("views");
        fs::create_dir_all(&start).unwrap();

        let entry = resolve_entry_from(&start).unwrap();
        assert_eq!(entry, package_dir.join("runtime.js"));
    }

    #[test]
    fn test_missing_package_is_resolution_error() {
        let lonely = env::temp_dir().join("sprig-resolve-missing");
        fs::create_dir_all(&lonely).unwrap();
        let err = resolve_entry_from(&lonely).unwrap_err();
        assert_eq!(err.code, error::RUNTIME_RESOLUTION_ERROR);
        assert!(err.message.contains(RUNTIME_PACKAGE));
    }
}
