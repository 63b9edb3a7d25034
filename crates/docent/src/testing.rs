//! Helpers for building systems from source text.
//!
//! These are the entry points the test suites lean on; they are public so
//! downstream users can spin up a system from a string without touching
//! the discovery layer.

use std::sync::Arc;

use crate::model::{ObjId, System};
use crate::zope::ZopeInterfaceExtension;

/// Module name used when the caller does not pick one.
pub const DEFAULT_MODULE: &str = "<test>";

/// Parses one module into a fresh system and fully processes it.
///
/// # Panics
///
/// Panics when the source does not parse; tests want that loud.
pub fn from_text(source: &str) -> (System, ObjId) {
    from_text_named(source, DEFAULT_MODULE)
}

/// Like [`from_text`] with an explicit module name.
pub fn from_text_named(source: &str, modname: &str) -> (System, ObjId) {
    let mut system = System::new();
    let module = from_text_into(&mut system, source, modname);
    (system, module)
}

/// Adds one more module to an existing system and reprocesses.
pub fn from_text_into(system: &mut System, source: &str, modname: &str) -> ObjId {
    let module = system
        .add_module(modname, None, source)
        .expect("test source should parse");
    system.process_all();
    module
}

/// Like [`from_text_named`] with the zope.interface extension installed.
pub fn from_text_zope(source: &str, modname: &str) -> (System, ObjId) {
    let mut system = System::with_extension(Arc::new(ZopeInterfaceExtension));
    let module = from_text_into(&mut system, source, modname);
    (system, module)
}
