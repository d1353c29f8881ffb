//! CommonJS module resolution
//!
//! Relative and absolute requests resolve against the requiring module's
//! directory; bare requests search `node_modules` directories from there up
//! to the filesystem root. A candidate path is tried as a file, then with
//! each known extension, then as a directory (package `main`, then index).
//! Resolved paths are canonical, so one file always maps to one cache key.
//!
//! [`module_format`] decides how a resolved file is evaluated: `.mjs` files
//! and `.js` files under a `"type": "module"` package are ES modules.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

const EXTENSIONS: [&str; 4] = ["js", "cjs", "mjs", "json"];
const INDEX_FILES: [&str; 4] = ["index.js", "index.cjs", "index.mjs", "index.json"];

/// How a source file is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFormat {
    CommonJs,
    EsModule,
    Json,
}

/// Format of the file at `path`, following Node's rules.
pub fn module_format(path: &Path) -> ModuleFormat {
    match path.extension().and_then(OsStr::to_str) {
        Some("mjs") => ModuleFormat::EsModule,
        Some("cjs") => ModuleFormat::CommonJs,
        Some("json") => ModuleFormat::Json,
        _ if package_type(path).as_deref() == Some("module") => ModuleFormat::EsModule,
        _ => ModuleFormat::CommonJs,
    }
}

/// `type` of the nearest `package.json` above `path`.
fn package_type(path: &Path) -> Option<String> {
    let manifest = path
        .ancestors()
        .skip(1)
        .map(|dir| dir.join("package.json"))
        .find(|manifest| manifest.is_file())?;
    let manifest: serde_json::Value = serde_json::from_str(&fs::read_to_string(manifest).ok()?).ok()?;
    manifest.get("type")?.as_str().map(str::to_string)
}

/// Resolve the bundle path handed to the worker.
///
/// Relative paths are taken from the current working directory.
pub fn resolve_entry(path: &Path) -> Option<PathBuf> {
    if path.as_os_str().is_empty() {
        return None;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    resolve_path(&absolute)
}

/// Resolve a `require` request made by a module living in `base_dir`.
pub fn resolve(base_dir: &Path, request: &str) -> Option<PathBuf> {
    if request.is_empty() {
        return None;
    }

    if is_path_request(request) {
        return resolve_path(&base_dir.join(request));
    }

    base_dir
        .ancestors()
        .filter(|dir| dir.file_name() != Some(OsStr::new("node_modules")))
        .find_map(|dir| resolve_path(&dir.join("node_modules").join(request)))
}

fn is_path_request(request: &str) -> bool {
    request == "."
        || request == ".."
        || request.starts_with("./")
        || request.starts_with("../")
        || Path::new(request).is_absolute()
}

fn resolve_path(candidate: &Path) -> Option<PathBuf> {
    resolve_file(candidate)
        .or_else(|| resolve_directory(candidate))
        .and_then(|found| found.canonicalize().ok())
}

fn resolve_file(candidate: &Path) -> Option<PathBuf> {
    if candidate.is_file() {
        return Some(candidate.to_path_buf());
    }

    let file_name = candidate.file_name()?;
    EXTENSIONS.iter().find_map(|extension| {
        let mut name = file_name.to_os_string();
        name.push(".");
        name.push(extension);
        let with_extension = candidate.with_file_name(name);
        with_extension.is_file().then_some(with_extension)
    })
}

fn resolve_directory(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }

    if let Some(main) = package_main(dir) {
        let target = dir.join(main);
        if let Some(found) = resolve_file(&target).or_else(|| resolve_index(&target)) {
            return Some(found);
        }
    }

    resolve_index(dir)
}

fn resolve_index(dir: &Path) -> Option<PathBuf> {
    INDEX_FILES
        .iter()
        .map(|index| dir.join(index))
        .find(|path| path.is_file())
}

fn package_main(dir: &Path) -> Option<String> {
    let manifest = fs::read_to_string(dir.join("package.json")).ok()?;
    let manifest: serde_json::Value = serde_json::from_str(&manifest).ok()?;
    manifest
        .get("main")?
        .as_str()
        .filter(|main| !main.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path.canonicalize().unwrap()
    }

    #[test]
    fn test_relative_request_with_and_without_extension() {
        let dir = TempDir::new().unwrap();
        let helper = write(dir.path(), "lib/helper.js", "");
        let data = write(dir.path(), "lib/data.json", "{}");

        assert_eq!(resolve(dir.path(), "./lib/helper.js"), Some(helper.clone()));
        assert_eq!(resolve(dir.path(), "./lib/helper"), Some(helper));
        assert_eq!(resolve(dir.path(), "./lib/data"), Some(data));
        assert_eq!(resolve(dir.path(), "./lib/missing"), None);
    }

    #[test]
    fn test_parent_relative_request() {
        let dir = TempDir::new().unwrap();
        let shared = write(dir.path(), "shared.cjs", "");
        fs::create_dir_all(dir.path().join("pages")).unwrap();

        assert_eq!(resolve(&dir.path().join("pages"), "../shared"), Some(shared));
    }

    #[test]
    fn test_directory_uses_package_main_then_index() {
        let dir = TempDir::new().unwrap();
        let main = write(dir.path(), "widget/dist/widget.js", "");
        write(dir.path(), "widget/package.json", r#"{"main": "dist/widget"}"#);
        let index = write(dir.path(), "plain/index.js", "");

        assert_eq!(resolve(dir.path(), "./widget"), Some(main));
        assert_eq!(resolve(dir.path(), "./plain"), Some(index));
    }

    #[test]
    fn test_broken_package_main_falls_back_to_index() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "pkg/package.json", r#"{"main": "nowhere.js"}"#);
        let index = write(dir.path(), "pkg/index.js", "");

        assert_eq!(resolve(dir.path(), "./pkg"), Some(index));
    }

    #[test]
    fn test_bare_request_walks_up_node_modules() {
        let dir = TempDir::new().unwrap();
        let package = write(dir.path(), "node_modules/tiny/index.js", "");
        let nested = dir.path().join("src/pages");
        fs::create_dir_all(&nested).unwrap();

        assert_eq!(resolve(&nested, "tiny"), Some(package));
        assert_eq!(resolve(&nested, "absent"), None);
    }

    #[test]
    fn test_bare_request_prefers_nearest_node_modules() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "node_modules/dep.js", "");
        let near = write(dir.path(), "app/node_modules/dep.js", "");

        assert_eq!(resolve(&dir.path().join("app"), "dep"), Some(near));
    }

    #[test]
    fn test_module_format_follows_extension_and_package_type() {
        let dir = TempDir::new().unwrap();
        let plain = write(dir.path(), "plain.js", "");
        let esm = write(dir.path(), "page.mjs", "");
        let data = write(dir.path(), "data.json", "{}");
        write(dir.path(), "modern/package.json", r#"{"type": "module"}"#);
        let modern = write(dir.path(), "modern/src/entry.js", "");
        let legacy = write(dir.path(), "modern/src/legacy.cjs", "");

        assert_eq!(module_format(&plain), ModuleFormat::CommonJs);
        assert_eq!(module_format(&esm), ModuleFormat::EsModule);
        assert_eq!(module_format(&data), ModuleFormat::Json);
        assert_eq!(module_format(&modern), ModuleFormat::EsModule);
        assert_eq!(module_format(&legacy), ModuleFormat::CommonJs);
    }

    #[test]
    fn test_nearest_package_json_decides_type() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "package.json", r#"{"type": "module"}"#);
        write(dir.path(), "vendor/package.json", r#"{"name": "vendor"}"#);
        let vendored = write(dir.path(), "vendor/lib.js", "");

        assert_eq!(module_format(&vendored), ModuleFormat::CommonJs);
    }

    #[test]
    fn test_entry_paths_are_canonical() {
        let dir = TempDir::new().unwrap();
        let bundle = write(dir.path(), "bundle.js", "");
        let indirect = dir.path().join("sub/../bundle.js");
        fs::create_dir_all(dir.path().join("sub")).unwrap();

        assert_eq!(resolve_entry(&indirect), Some(bundle.clone()));
        assert_eq!(resolve_entry(&dir.path().join("bundle")), Some(bundle));
        assert_eq!(resolve_entry(Path::new("")), None);
        assert_eq!(resolve_entry(&dir.path().join("missing.js")), None);
    }
}
