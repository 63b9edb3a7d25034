//! Filesystem discovery: turning paths into registered modules.
//!
//! A path argument may be a single `.py` file, a package directory (one
//! containing `__init__.py`), or a plain source root whose children are
//! scanned one level deep for modules and packages. Traversal is sorted,
//! so registration order is stable across runs.
//!
//! A file that fails to parse is recorded as a diagnostic and skipped;
//! discovery continues with the next file. Only unreadable paths abort.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use docent_ast::ParseError;

use crate::error::{Error, Result};
use crate::model::{ObjId, System};

const INIT_FILE: &str = "__init__.py";

/// Registers every module reachable from `path` on the system.
pub fn add_tree(system: &mut System, path: &Path) -> Result<()> {
    if path.is_file() {
        add_source_file(system, None, path)?;
        return Ok(());
    }

    // Directory owners: a package directory maps to its entity, so files
    // below it attach to the right parent.
    let mut owners: HashMap<PathBuf, ObjId> = HashMap::new();
    let mut walker = WalkDir::new(path).sort_by_file_name().into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| walk_error(path, e))?;
        let entry_path = entry.path();
        if entry.file_type().is_dir() {
            if entry_path.join(INIT_FILE).is_file() {
                let parent = entry_path
                    .parent()
                    .and_then(|p| owners.get(p))
                    .copied();
                match add_package_dir(system, parent, entry_path)? {
                    Some(pkg) => {
                        owners.insert(entry_path.to_path_buf(), pkg);
                    }
                    // Unparseable __init__ or unusable name: skip the
                    // whole subtree, the diagnostic is already recorded.
                    None => walker.skip_current_dir(),
                }
            } else if entry.depth() == 0 {
                // A plain source root; its direct children get scanned.
            } else {
                walker.skip_current_dir();
            }
            continue;
        }
        if entry_path.extension().is_none_or(|ext| ext != "py") {
            continue;
        }
        if entry_path.file_name().is_some_and(|n| n == INIT_FILE) {
            continue;
        }
        let parent = entry_path
            .parent()
            .and_then(|p| owners.get(p))
            .copied();
        add_source_file(system, parent, entry_path)?;
    }
    Ok(())
}

/// Adds a package entity from its directory, parsing `__init__.py`.
fn add_package_dir(
    system: &mut System,
    parent: Option<ObjId>,
    dir: &Path,
) -> Result<Option<ObjId>> {
    let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
        return Ok(None);
    };
    let init = dir.join(INIT_FILE);
    let source = read_source(&init)?;
    match system.add_package(name, parent, &source) {
        Ok(pkg) => {
            system.set_source_path(pkg, init);
            debug!(package = name, "registered package");
            Ok(Some(pkg))
        }
        Err(err) => {
            report_parse_failure(system, &init, err);
            Ok(None)
        }
    }
}

/// Adds one module file under the given parent.
fn add_source_file(system: &mut System, parent: Option<ObjId>, file: &Path) -> Result<()> {
    let Some(name) = file.file_stem().and_then(|n| n.to_str()) else {
        return Ok(());
    };
    let source = read_source(file)?;
    match system.add_module(name, parent, &source) {
        Ok(module) => {
            system.set_source_path(module, file.to_path_buf());
            debug!(module = name, "registered module");
        }
        Err(err) => report_parse_failure(system, file, err),
    }
    Ok(())
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn report_parse_failure(system: &mut System, path: &Path, err: ParseError) {
    let ParseError::Syntax { line, message } = err;
    system.msg(
        &path.display().to_string(),
        line,
        format!("cannot parse: {message}"),
    );
}

fn walk_error(root: &Path, err: walkdir::Error) -> Error {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::other("directory walk failed"));
    Error::Read { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, text: &str) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, text).expect("write");
    }

    #[test]
    fn package_tree_registers_nested_modules() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("pkg");
        write(&root.join("__init__.py"), "\"top\"\n");
        write(&root.join("mod.py"), "def f():\n    pass\n");
        write(&root.join("sub/__init__.py"), "");
        write(&root.join("sub/deep.py"), "x = 1\n");
        write(&root.join("scripts/helper.py"), "y = 2\n");

        let mut system = System::new();
        add_tree(&mut system, &root).expect("add");
        system.process_all();

        for name in ["pkg", "pkg.mod", "pkg.mod.f", "pkg.sub", "pkg.sub.deep"] {
            assert!(system.find(name).is_some(), "missing {name}");
        }
        // scripts/ has no __init__.py, so nothing under it registers.
        assert!(system.find("pkg.scripts").is_none());
        assert!(system.find("pkg.scripts.helper").is_none());
        let pkg = system.find("pkg").expect("pkg");
        assert_eq!(
            system.obj(pkg).docstring.as_deref(),
            Some("top"),
            "__init__ docstring should land on the package"
        );
    }

    #[test]
    fn source_root_without_init_scans_children() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(&dir.path().join("one.py"), "a = 1\n");
        write(&dir.path().join("two.py"), "b = 2\n");
        write(&dir.path().join("pkg/__init__.py"), "");
        write(&dir.path().join("pkg/inner.py"), "c = 3\n");

        let mut system = System::new();
        add_tree(&mut system, dir.path()).expect("add");
        system.process_all();

        for name in ["one", "two", "pkg", "pkg.inner"] {
            assert!(system.find(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn unparseable_module_is_reported_and_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("pkg");
        write(&root.join("__init__.py"), "");
        write(&root.join("bad.py"), "def (:\n");
        write(&root.join("good.py"), "ok = True\n");

        let mut system = System::new();
        add_tree(&mut system, &root).expect("add");
        system.process_all();

        assert!(system.find("pkg.bad").is_none());
        assert!(system.find("pkg.good.ok").is_some());
        assert_eq!(system.diagnostics.len(), 1);
        let diag = &system.diagnostics[0];
        assert!(diag.label.ends_with("bad.py"), "label was {}", diag.label);
        assert!(diag.message.starts_with("cannot parse:"));
    }

    #[test]
    fn single_file_argument_registers_one_module() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("single.py");
        write(&file, "def f():\n    \"doc\"\n");

        let mut system = System::new();
        add_tree(&mut system, &file).expect("add");
        system.process_all();

        let f = system.find("single.f").expect("function");
        assert_eq!(system.obj(f).docstring.as_deref(), Some("doc"));
    }
}
