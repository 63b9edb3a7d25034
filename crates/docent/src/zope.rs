//! Recognizers for `zope.interface` and `zope.schema` idioms.
//!
//! [`ZopeInterfaceExtension`] plugs into the builder and teaches it:
//!
//! - classes deriving from `zope.interface.Interface` (directly or through
//!   any base that is itself an interface) are interfaces
//! - `implements(...)` / `implementsOnly(...)` calls in a class body
//! - `classImplements(...)` / `classImplementsOnly(...)` at module level
//! - the `@implementer(...)` class decorator
//! - `moduleProvides(...)` at module level
//! - `Attribute("doc")` and schema field constructor assignments inside
//!   class bodies
//! - the `InterfaceClass(...)` assignment idiom at module level
//!
//! Interface arguments are classified best-effort: an argument resolving
//! to a non-class is dropped with a diagnostic, one resolving to a plain
//! class is promoted to an interface with a diagnostic, and one that does
//! not resolve at all is assumed to be an interface defined elsewhere.
//! Diagnostic labels use the module's full name.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use docent_ast::nodes::Expr;

use crate::builder::BuilderExtension;
use crate::model::{Kind, ObjId, System};

const INTERFACE: &str = "zope.interface.Interface";
const IMPLEMENTS: &str = "zope.interface.implements";
const IMPLEMENTS_ONLY: &str = "zope.interface.implementsOnly";
const CLASS_IMPLEMENTS: &str = "zope.interface.classImplements";
const CLASS_IMPLEMENTS_ONLY: &str = "zope.interface.classImplementsOnly";
const MODULE_PROVIDES: &str = "zope.interface.moduleProvides";
const IMPLEMENTER: &str = "zope.interface.implementer";
const ATTRIBUTE: &str = "zope.interface.Attribute";
const INTERFACE_CLASS: &str = "zope.interface.interface.InterfaceClass";

static SCHEMA_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^zope\.schema\.(\w+)$").unwrap());

/// The strategy object for systems built from zope.interface-using code.
pub struct ZopeInterfaceExtension;

impl BuilderExtension for ZopeInterfaceExtension {
    fn classify_class(&self, system: &mut System, cls: ObjId) {
        let interface = match system.obj(cls).class() {
            Some(data) => data.bases.iter().any(|b| {
                b.expanded == INTERFACE
                    || b.resolved
                        .is_some_and(|bid| system.obj(bid).class().is_some_and(|c| c.is_interface))
            }),
            None => return,
        };
        if interface {
            mark_interface(system, cls);
        }
    }

    fn decorate_class(&self, system: &mut System, cls: ObjId) {
        let decorations = match system.obj(cls).class() {
            Some(data) => data.decorations.clone(),
            None => return,
        };
        for deco in &decorations {
            if deco.expanded.as_deref() != Some(IMPLEMENTER) {
                continue;
            }
            let Some(args) = &deco.args else {
                continue;
            };
            let mut names = Vec::new();
            for arg in args {
                if arg.starred {
                    continue;
                }
                let Some(full) = arg.expanded.clone() else {
                    continue;
                };
                if let Some(name) =
                    classify_interface_arg(system, cls, &full, arg.resolved, deco.line)
                {
                    names.push(name);
                }
            }
            apply_implements(system, cls, names, false);
        }
    }

    fn handle_class_call(&self, system: &mut System, cls: ObjId, call: &Expr, line: u32) {
        let Expr::Call { func, args, .. } = call else {
            return;
        };
        let Some(dotted) = func.as_dotted_name() else {
            return;
        };
        let full = system.expand_name(cls, &dotted);
        let only = match full.as_str() {
            IMPLEMENTS => false,
            IMPLEMENTS_ONLY => true,
            _ => return,
        };
        let names = interface_args(system, cls, args, line);
        apply_implements(system, cls, names, only);
    }

    fn handle_module_call(&self, system: &mut System, module: ObjId, call: &Expr, line: u32) {
        let Expr::Call { func, args, .. } = call else {
            return;
        };
        let Some(dotted) = func.as_dotted_name() else {
            return;
        };
        let full = system.expand_name(module, &dotted);
        match full.as_str() {
            CLASS_IMPLEMENTS | CLASS_IMPLEMENTS_ONLY => {
                let Some((target, rest)) = args.split_first() else {
                    return;
                };
                let Some(target_name) = target.as_dotted_name() else {
                    return;
                };
                let target_full = system.expand_name(module, &target_name);
                let Some(cls) = system.find(&target_full) else {
                    return;
                };
                if system.obj(cls).class().is_none() {
                    return;
                }
                let names = interface_args(system, module, rest, line);
                apply_implements(system, cls, names, full == CLASS_IMPLEMENTS_ONLY);
            }
            MODULE_PROVIDES => {
                let names = interface_args(system, module, args, line);
                let provided: Vec<ObjId> = names.iter().filter_map(|n| system.find(n)).collect();
                if let Some(data) = system.obj_mut(module).module_mut() {
                    for id in provided {
                        if !data.provides.contains(&id) {
                            data.provides.push(id);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_assignment(
        &self,
        system: &mut System,
        scope: ObjId,
        target: &str,
        value: &Expr,
        line: u32,
    ) -> Option<ObjId> {
        let Expr::Call {
            func,
            args,
            keywords,
        } = value
        else {
            return None;
        };
        let dotted = func.as_dotted_name()?;
        let full = system.expand_name(scope, &dotted);
        let in_class = system.obj(scope).class().is_some();

        if in_class && full == ATTRIBUTE {
            let id = system.add_object(Some(scope), Kind::Attribute, target, line);
            let doc = if keywords.is_empty() && args.len() == 1 {
                args[0].as_str_literal()
            } else {
                None
            };
            match doc {
                Some(text) => system.obj_mut(id).docstring = Some(text.to_string()),
                None => {
                    let label = module_label(system, scope);
                    system.msg(
                        &label,
                        line,
                        format!(
                            "definition of attribute \"{target}\" should have docstring \
                             as its sole argument"
                        ),
                    );
                }
            }
            return Some(id);
        }

        if in_class {
            if let Some(field) = schema_label(system, &full) {
                let id = system.add_object(Some(scope), Kind::Field(field), target, line);
                for kw in keywords {
                    if kw.arg.as_deref() != Some("description") {
                        continue;
                    }
                    match kw.value.as_str_literal() {
                        Some(text) => system.obj_mut(id).docstring = Some(text.to_string()),
                        None => {
                            let label = module_label(system, scope);
                            system.msg(
                                &label,
                                line,
                                format!("description of field \"{target}\" is not a string literal"),
                            );
                        }
                    }
                }
                return Some(id);
            }
        }

        if system.obj(scope).module().is_some() && full == INTERFACE_CLASS {
            let id = system.add_object(Some(scope), Kind::Interface, target, line);
            if let Some(data) = system.obj_mut(id).class_mut() {
                data.is_interface = true;
            }
            return Some(id);
        }

        None
    }

    fn post_process(&self, system: &mut System) {
        promote_interface_subclasses(system);
        compute_closures(system);
        rebuild_backrefs(system);
    }
}

// ============================================================================
// Interface argument classification
// ============================================================================

/// Expands and classifies the interface arguments of a call, in order.
fn interface_args(system: &mut System, scope: ObjId, args: &[Expr], line: u32) -> Vec<String> {
    let mut names = Vec::new();
    for arg in args {
        if matches!(arg, Expr::Starred(_)) {
            continue;
        }
        let Some(dotted) = arg.as_dotted_name() else {
            continue;
        };
        let full = system.expand_name(scope, &dotted);
        let resolved = system.find(&full);
        if let Some(name) = classify_interface_arg(system, scope, &full, resolved, line) {
            names.push(name);
        }
    }
    names
}

enum ArgShape {
    External,
    NotAClass,
    Interface,
    PlainClass(ObjId),
}

/// Yields the name to record for one interface argument, or `None` when
/// the argument is dropped.
fn classify_interface_arg(
    system: &mut System,
    ctx: ObjId,
    full: &str,
    resolved: Option<ObjId>,
    line: u32,
) -> Option<String> {
    let shape = match resolved {
        None => ArgShape::External,
        Some(id) => match system.obj(id).class() {
            None => ArgShape::NotAClass,
            Some(data) if data.is_interface => ArgShape::Interface,
            Some(_) => ArgShape::PlainClass(id),
        },
    };
    match shape {
        ArgShape::External | ArgShape::Interface => Some(full.to_string()),
        ArgShape::NotAClass => {
            let label = module_label(system, ctx);
            system.msg(
                &label,
                line,
                format!("probable interface {full} not detected as a class"),
            );
            None
        }
        ArgShape::PlainClass(id) => {
            let label = module_label(system, ctx);
            system.msg(
                &label,
                line,
                format!("probable interface {full} not marked as such"),
            );
            mark_interface(system, id);
            Some(full.to_string())
        }
    }
}

fn apply_implements(system: &mut System, cls: ObjId, names: Vec<String>, only: bool) {
    let Some(data) = system.obj_mut(cls).class_mut() else {
        return;
    };
    if only {
        data.implements_directly.clear();
        data.implements_only = true;
    }
    for name in names {
        if !data.implements_directly.contains(&name) {
            data.implements_directly.push(name);
        }
    }
}

fn mark_interface(system: &mut System, cls: ObjId) {
    let obj = system.obj_mut(cls);
    if let Some(data) = obj.class_mut() {
        data.is_interface = true;
        obj.kind = Kind::Interface;
    }
}

fn module_label(system: &System, id: ObjId) -> String {
    system.full_name(system.enclosing_module(id))
}

/// The display label for a schema field constructor: the captured name for
/// `zope.schema.<Name>`, or the constructor class's own name when any
/// ancestor derives from a schema field.
fn schema_label(system: &System, full: &str) -> Option<String> {
    if let Some(cap) = SCHEMA_FIELD.captures(full) {
        return Some(cap[1].to_string());
    }
    let id = system.find(full)?;
    system.obj(id).class()?;
    for ancestor in system.allbases(id, true) {
        let Some(data) = system.obj(ancestor).class() else {
            continue;
        };
        if data.bases.iter().any(|b| SCHEMA_FIELD.is_match(&b.expanded)) {
            return Some(system.obj(id).name.clone());
        }
    }
    None
}

// ============================================================================
// Post-processing
// ============================================================================

/// Marks every class whose resolved base chain reaches an interface, until
/// nothing changes. Catches bases that only resolved in phase two.
fn promote_interface_subclasses(system: &mut System) {
    loop {
        let mut changed = false;
        for id in system.ids() {
            let promote = match system.obj(id).class() {
                Some(data) if !data.is_interface => data
                    .bases
                    .iter()
                    .filter_map(|b| b.resolved)
                    .any(|bid| system.obj(bid).class().is_some_and(|c| c.is_interface)),
                _ => false,
            };
            if promote {
                mark_interface(system, id);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

fn compute_closures(system: &mut System) {
    let ids = system.ids();
    let mut memo: HashMap<ObjId, Vec<String>> = HashMap::new();
    for &id in &ids {
        let mut visiting = HashSet::new();
        closure_of(system, id, &mut memo, &mut visiting);
    }
    for &id in &ids {
        let Some(closure) = memo.get(&id) else {
            continue;
        };
        if let Some(data) = system.obj_mut(id).class_mut() {
            data.all_implemented = closure.clone();
        }
    }
}

/// A class's implemented-interface closure: its own declarations, then
/// (unless it declares exclusively) each ancestor's closure, then the base
/// interfaces of its own declarations. First occurrence wins.
fn closure_of(
    system: &System,
    id: ObjId,
    memo: &mut HashMap<ObjId, Vec<String>>,
    visiting: &mut HashSet<ObjId>,
) -> Vec<String> {
    if let Some(done) = memo.get(&id) {
        return done.clone();
    }
    let Some(data) = system.obj(id).class() else {
        return Vec::new();
    };
    let direct = data.implements_directly.clone();
    let only = data.implements_only;
    let bases: Vec<ObjId> = data.bases.iter().filter_map(|b| b.resolved).collect();
    if !visiting.insert(id) {
        return direct;
    }
    let mut out = Vec::new();
    for name in &direct {
        push_unique(&mut out, name.clone());
    }
    if !only {
        for base in bases {
            for name in closure_of(system, base, memo, visiting) {
                push_unique(&mut out, name);
            }
        }
    }
    for name in &direct {
        if let Some(iface) = system.find(name) {
            for ancestor in system.allbases(iface, false) {
                if system.obj(ancestor).class().is_some_and(|c| c.is_interface) {
                    push_unique(&mut out, system.full_name(ancestor));
                }
            }
        }
    }
    visiting.remove(&id);
    memo.insert(id, out.clone());
    out
}

enum Backref {
    Direct,
    All,
}

/// Rebuilds each interface's implementor lists from the class-side records,
/// in registration order.
fn rebuild_backrefs(system: &mut System) {
    let ids = system.ids();
    for &id in &ids {
        if let Some(data) = system.obj_mut(id).class_mut() {
            data.implementedby_directly.clear();
            data.all_implementations.clear();
        }
    }
    for &id in &ids {
        let (direct, closure) = match system.obj(id).class() {
            Some(data) if !data.is_interface => (
                data.implements_directly.clone(),
                data.all_implemented.clone(),
            ),
            _ => continue,
        };
        for name in direct {
            push_backref(system, &name, id, Backref::Direct);
        }
        for name in closure {
            push_backref(system, &name, id, Backref::All);
        }
    }
}

fn push_backref(system: &mut System, interface: &str, implementor: ObjId, list: Backref) {
    let Some(iface) = system.find(interface) else {
        return;
    };
    let Some(data) = system.obj_mut(iface).class_mut() else {
        return;
    };
    if !data.is_interface {
        return;
    }
    let target = match list {
        Backref::Direct => &mut data.implementedby_directly,
        Backref::All => &mut data.all_implementations,
    };
    if !target.contains(&implementor) {
        target.push(implementor);
    }
}

fn push_unique(list: &mut Vec<String>, name: String) {
    if !list.contains(&name) {
        list.push(name);
    }
}
