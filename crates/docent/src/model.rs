//! The documentation object model.
//!
//! This module provides the semantic model populated from parsed sources:
//! - [`Obj`]: one documentable entity (module, class, function, variable)
//! - [`System`]: the arena of entities plus the full-name registry
//! - [`Kind`]: display kinds, down to zope schema field labels
//! - [`Diagnostic`]: non-fatal messages collected during building
//!
//! The [`System`] owns every entity in a `Vec` arena indexed by [`ObjId`],
//! with `allobjects` mapping fully-qualified names to IDs. Iteration over
//! the arena is creation order, which keeps every derived list
//! (subclasses, implementations, dumps) deterministic.
//!
//! Name resolution lives here too: [`System::expand_name`] walks the scope
//! chain for the first segment of a dotted name and descends through local
//! tables for the rest, falling back to textual joining for names the
//! system has never seen. [`System::finalize`] is the second phase: alias
//! chains are flattened transitively and base-class slots that did not
//! resolve during the first pass are retried, so definition order across
//! modules does not matter.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use docent_ast::ParseError;
use tracing::debug;

use crate::builder::{Builder, BuilderExtension, NullExtension};

// ============================================================================
// ID Type
// ============================================================================

/// Unique identifier for an entity within a [`System`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId(pub u32);

impl ObjId {
    /// Create a new entity ID.
    pub fn new(id: u32) -> Self {
        ObjId(id)
    }
}

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj_{}", self.0)
    }
}

// ============================================================================
// Kinds, privacy, processing state
// ============================================================================

/// What an entity is, as shown to readers.
///
/// `Field` carries the simple name of a zope schema field constructor
/// (`TextLine`, `Bool`, ...), which doubles as the display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    Package,
    Module,
    Class,
    Interface,
    Function,
    Method,
    ClassMethod,
    StaticMethod,
    Variable,
    ClassVariable,
    InstanceVariable,
    Attribute,
    Field(String),
}

impl Kind {
    /// Display string for the kind.
    pub fn as_str(&self) -> &str {
        match self {
            Kind::Package => "Package",
            Kind::Module => "Module",
            Kind::Class => "Class",
            Kind::Interface => "Interface",
            Kind::Function => "Function",
            Kind::Method => "Method",
            Kind::ClassMethod => "Class Method",
            Kind::StaticMethod => "Static Method",
            Kind::Variable => "Variable",
            Kind::ClassVariable => "Class Variable",
            Kind::InstanceVariable => "Instance Variable",
            Kind::Attribute => "Attribute",
            Kind::Field(label) => label,
        }
    }

    /// True for the kinds that carry a variable-style value slot.
    pub fn is_variable(&self) -> bool {
        matches!(
            self,
            Kind::Variable
                | Kind::ClassVariable
                | Kind::InstanceVariable
                | Kind::Attribute
                | Kind::Field(_)
        )
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an entity appears in rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivacyClass {
    Visible,
    Private,
}

/// Privacy from naming convention: a leading underscore is private unless
/// the name is dunder-shaped (`__init__`).
pub fn privacy_for(name: &str) -> PrivacyClass {
    if name.starts_with('_') && !(name.starts_with("__") && name.ends_with("__")) {
        PrivacyClass::Private
    } else {
        PrivacyClass::Visible
    }
}

/// Module lifecycle during a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingState {
    #[default]
    Unprocessed,
    Processing,
    Processed,
}

// ============================================================================
// Diagnostics
// ============================================================================

/// One non-fatal message tied to a source location.
///
/// `label` is the module's source path when known, its full name for
/// semantic checks, or `"<unknown>"` for text without a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub label: String,
    pub line: u32,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.label, self.line, self.message)
    }
}

// ============================================================================
// Per-kind data
// ============================================================================

/// One base-class slot of a class.
#[derive(Debug, Clone)]
pub struct BaseRef {
    /// Base expression as written.
    pub raw: String,
    /// Expanded dotted name, as computed when the slot was last resolved.
    pub expanded: String,
    /// The base entity, when it lives in this system.
    pub resolved: Option<ObjId>,
}

/// A recorded decorator.
#[derive(Debug, Clone)]
pub struct Decoration {
    /// Decorator expression as written, without the `@`.
    pub raw: String,
    /// Expanded dotted name of the callee, for dotted-name decorators.
    pub expanded: Option<String>,
    /// The decorator entity, when it lives in this system.
    pub resolved: Option<ObjId>,
    /// Argument list for call-form decorators, `None` for bare ones.
    pub args: Option<Vec<DecorationArg>>,
    pub line: u32,
    /// Set when the decorator is on the configured suppression list.
    pub hidden: bool,
}

/// One argument of a call-form decorator.
#[derive(Debug, Clone)]
pub struct DecorationArg {
    pub raw: String,
    pub expanded: Option<String>,
    pub resolved: Option<ObjId>,
    pub starred: bool,
}

/// The argument specification of a function, kept as display strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgSpec {
    /// Positional parameter names, in order.
    pub args: Vec<String>,
    pub vararg: Option<String>,
    pub kwarg: Option<String>,
    /// Default values as source text, aligned to the tail of `args`.
    pub defaults: Vec<String>,
}

/// Data specific to modules and packages.
#[derive(Debug, Clone, Default)]
pub struct ModuleData {
    pub state: ProcessingState,
    /// Parsed tree; taken while the module is walked, then restored.
    pub ast: Option<docent_ast::Module>,
    /// The module's `__all__` export list, when declared.
    pub all: Option<Vec<String>>,
    /// Modules wildcard-imported into this one, in import order.
    pub wildcard_sources: Vec<ObjId>,
    pub is_package: bool,
    /// Interfaces declared via `moduleProvides`.
    pub provides: Vec<ObjId>,
    pub source_path: Option<PathBuf>,
}

/// Data specific to classes and interfaces.
#[derive(Debug, Clone, Default)]
pub struct ClassData {
    pub bases: Vec<BaseRef>,
    /// Classes that resolved this one as a base, in discovery order.
    pub subclasses: Vec<ObjId>,
    pub decorations: Vec<Decoration>,
    pub is_interface: bool,
    /// Full names of directly declared interfaces, in declaration order.
    pub implements_directly: Vec<String>,
    /// Set by `implementsOnly`: ancestors' interfaces are not inherited.
    pub implements_only: bool,
    /// Interface closure, computed by the extension's post-processing.
    pub all_implemented: Vec<String>,
    /// On interfaces: classes declaring this interface directly.
    pub implementedby_directly: Vec<ObjId>,
    /// On interfaces: all non-interface classes whose closure names this.
    pub all_implementations: Vec<ObjId>,
}

/// Data specific to functions and methods.
#[derive(Debug, Clone, Default)]
pub struct FunctionData {
    pub argspec: ArgSpec,
    pub is_async: bool,
    pub decorations: Vec<Decoration>,
}

/// Data specific to variables, attributes and schema fields.
#[derive(Debug, Clone, Default)]
pub struct VariableData {
    /// Displayed type expression, inferred or declared.
    pub type_expr: Option<String>,
    /// Structured doc text from an owner docstring field.
    pub field_doc: Option<String>,
    /// Type text from an owner docstring `@type` field.
    pub field_type: Option<String>,
    /// The value when the binding was a plain string literal.
    pub string_value: Option<String>,
}

/// Kind-specific payload of an entity.
#[derive(Debug, Clone)]
pub enum ObjData {
    Module(ModuleData),
    Class(ClassData),
    Function(FunctionData),
    Variable(VariableData),
}

impl ObjData {
    fn for_kind(kind: &Kind) -> ObjData {
        match kind {
            Kind::Package | Kind::Module => ObjData::Module(ModuleData::default()),
            Kind::Class | Kind::Interface => ObjData::Class(ClassData::default()),
            Kind::Function | Kind::Method | Kind::ClassMethod | Kind::StaticMethod => {
                ObjData::Function(FunctionData::default())
            }
            _ => ObjData::Variable(VariableData::default()),
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// One documentable entity.
#[derive(Debug, Clone)]
pub struct Obj {
    pub id: ObjId,
    pub name: String,
    pub parent: Option<ObjId>,
    pub kind: Kind,
    pub line: u32,
    pub docstring: Option<String>,
    pub privacy: PrivacyClass,
    /// Child entities in creation order. Lookups scan from the end, so a
    /// redefinition shadows the earlier entry.
    pub contents: Vec<(String, ObjId)>,
    /// Local alias bindings: imported or assigned names mapping to dotted
    /// targets. Modules and classes use this; functions never bind aliases.
    pub aliases: BTreeMap<String, String>,
    pub data: ObjData,
}

impl Obj {
    /// Latest member with the given name.
    pub fn get_member(&self, name: &str) -> Option<ObjId> {
        self.contents
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
    }

    pub fn module(&self) -> Option<&ModuleData> {
        match &self.data {
            ObjData::Module(m) => Some(m),
            _ => None,
        }
    }

    pub fn module_mut(&mut self) -> Option<&mut ModuleData> {
        match &mut self.data {
            ObjData::Module(m) => Some(m),
            _ => None,
        }
    }

    pub fn class(&self) -> Option<&ClassData> {
        match &self.data {
            ObjData::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn class_mut(&mut self) -> Option<&mut ClassData> {
        match &mut self.data {
            ObjData::Class(c) => Some(c),
            _ => None,
        }
    }

    pub fn function(&self) -> Option<&FunctionData> {
        match &self.data {
            ObjData::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn function_mut(&mut self) -> Option<&mut FunctionData> {
        match &mut self.data {
            ObjData::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn variable(&self) -> Option<&VariableData> {
        match &self.data {
            ObjData::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn variable_mut(&mut self) -> Option<&mut VariableData> {
        match &mut self.data {
            ObjData::Variable(v) => Some(v),
            _ => None,
        }
    }
}

// ============================================================================
// Options
// ============================================================================

/// Build options shared by the CLI and the library surface.
#[derive(Debug, Clone)]
pub struct Options {
    pub project_name: String,
    /// Decorator full names whose decorations are suppressed for rendering.
    pub hidden_decorators: BTreeSet<String>,
}

impl Default for Options {
    fn default() -> Self {
        let mut hidden = BTreeSet::new();
        hidden.insert("twisted.python.deprecate.deprecated".to_string());
        Options {
            project_name: "docent".to_string(),
            hidden_decorators: hidden,
        }
    }
}

// ============================================================================
// System
// ============================================================================

/// The registry of every entity in one documentation build.
pub struct System {
    objs: Vec<Obj>,
    /// Fully-qualified name to entity. The latest registration wins; the
    /// earlier holder is renamed, never silently dropped.
    pub allobjects: HashMap<String, ObjId>,
    /// Root modules and packages, in add order.
    pub roots: Vec<ObjId>,
    /// Every module and package, in add order; this is processing order.
    pub modules: Vec<ObjId>,
    pub diagnostics: Vec<Diagnostic>,
    pub options: Options,
    ext: Arc<dyn BuilderExtension>,
}

impl Default for System {
    fn default() -> Self {
        System::new()
    }
}

impl System {
    /// A system with no extension hooks.
    pub fn new() -> System {
        System::with_extension(Arc::new(NullExtension))
    }

    /// A system whose builder consults the given extension.
    pub fn with_extension(ext: Arc<dyn BuilderExtension>) -> System {
        System {
            objs: Vec::new(),
            allobjects: HashMap::new(),
            roots: Vec::new(),
            modules: Vec::new(),
            diagnostics: Vec::new(),
            options: Options::default(),
            ext,
        }
    }

    pub fn extension(&self) -> Arc<dyn BuilderExtension> {
        Arc::clone(&self.ext)
    }

    // ===== arena access =====

    pub fn obj(&self, id: ObjId) -> &Obj {
        &self.objs[id.0 as usize]
    }

    pub fn obj_mut(&mut self, id: ObjId) -> &mut Obj {
        &mut self.objs[id.0 as usize]
    }

    /// All entities in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Obj> {
        self.objs.iter()
    }

    /// All entity IDs in creation order.
    pub fn ids(&self) -> Vec<ObjId> {
        self.objs.iter().map(|o| o.id).collect()
    }

    pub fn find(&self, full_name: &str) -> Option<ObjId> {
        self.allobjects.get(full_name).copied()
    }

    /// Fully-qualified dotted name, by parent walk.
    pub fn full_name(&self, id: ObjId) -> String {
        let obj = self.obj(id);
        match obj.parent {
            None => obj.name.clone(),
            Some(parent) => format!("{}.{}", self.full_name(parent), obj.name),
        }
    }

    // ===== construction =====

    /// Creates an entity, appends it to its parent's contents and registers
    /// its full name. A full-name collision renames the earlier holder.
    pub fn add_object(
        &mut self,
        parent: Option<ObjId>,
        kind: Kind,
        name: &str,
        line: u32,
    ) -> ObjId {
        let id = ObjId::new(self.objs.len() as u32);
        let obj = Obj {
            id,
            name: name.to_string(),
            parent,
            privacy: privacy_for(name),
            data: ObjData::for_kind(&kind),
            kind,
            line,
            docstring: None,
            contents: Vec::new(),
            aliases: BTreeMap::new(),
        };
        self.objs.push(obj);
        match parent {
            Some(pid) => self.obj_mut(pid).contents.push((name.to_string(), id)),
            None => self.roots.push(id),
        }
        self.register(id);
        id
    }

    /// Adds a package entity, optionally with its `__init__` source.
    pub fn add_package(
        &mut self,
        name: &str,
        parent: Option<ObjId>,
        source: &str,
    ) -> Result<ObjId, ParseError> {
        let ast = docent_ast::parse_module(source)?;
        let id = self.add_object(parent, Kind::Package, name, 1);
        let data = self.obj_mut(id).module_mut().expect("package data");
        data.is_package = true;
        data.ast = Some(ast);
        self.modules.push(id);
        Ok(id)
    }

    /// Parses source text and adds it as a module entity.
    pub fn add_module(
        &mut self,
        name: &str,
        parent: Option<ObjId>,
        source: &str,
    ) -> Result<ObjId, ParseError> {
        let ast = docent_ast::parse_module(source)?;
        let id = self.add_object(parent, Kind::Module, name, 1);
        let data = self.obj_mut(id).module_mut().expect("module data");
        data.ast = Some(ast);
        self.modules.push(id);
        Ok(id)
    }

    /// Records where a module's source lives, for diagnostics.
    pub fn set_source_path(&mut self, module: ObjId, path: PathBuf) {
        if let Some(data) = self.obj_mut(module).module_mut() {
            data.source_path = Some(path);
        }
    }

    /// The diagnostic label for a module: its source path when known, else
    /// `"<unknown>"`.
    pub fn path_label(&self, module: ObjId) -> String {
        self.obj(module)
            .module()
            .and_then(|m| m.source_path.as_ref())
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unknown>".to_string())
    }

    /// The module or package an entity belongs to (itself, for a module).
    pub fn enclosing_module(&self, id: ObjId) -> ObjId {
        let mut cur = id;
        while self.obj(cur).module().is_none() {
            match self.obj(cur).parent {
                Some(parent) => cur = parent,
                None => break,
            }
        }
        cur
    }

    fn register(&mut self, id: ObjId) {
        let full = self.full_name(id);
        if let Some(&prev) = self.allobjects.get(&full) {
            if prev != id {
                self.handle_duplicate(prev, &full);
            }
        }
        self.allobjects.insert(full, id);
    }

    /// Renames the previous holder of a taken full name to `"<name> <i>"`
    /// and re-registers it together with its subtree.
    fn handle_duplicate(&mut self, prev: ObjId, full: &str) {
        let mut i = 0;
        while self.allobjects.contains_key(&format!("{full} {i}")) {
            i += 1;
        }
        self.unregister_subtree(prev);
        let renamed = format!("{} {}", self.obj(prev).name, i);
        debug!("renaming duplicate {} to {}", full, renamed);
        if let Some(pid) = self.obj(prev).parent {
            if let Some(entry) = self
                .obj_mut(pid)
                .contents
                .iter_mut()
                .find(|(_, cid)| *cid == prev)
            {
                entry.0 = renamed.clone();
            }
        }
        self.obj_mut(prev).name = renamed;
        self.register_subtree(prev);
    }

    fn unregister_subtree(&mut self, id: ObjId) {
        let full = self.full_name(id);
        if self.allobjects.get(&full) == Some(&id) {
            self.allobjects.remove(&full);
        }
        let children: Vec<ObjId> = self.obj(id).contents.iter().map(|(_, c)| *c).collect();
        for child in children {
            self.unregister_subtree(child);
        }
    }

    fn register_subtree(&mut self, id: ObjId) {
        let full = self.full_name(id);
        self.allobjects.insert(full, id);
        let children: Vec<ObjId> = self.obj(id).contents.iter().map(|(_, c)| *c).collect();
        for child in children {
            self.register_subtree(child);
        }
    }

    // ===== diagnostics =====

    /// Records a non-fatal diagnostic.
    pub fn msg(&mut self, label: &str, line: u32, message: impl Into<String>) {
        let diag = Diagnostic {
            label: label.to_string(),
            line,
            message: message.into(),
        };
        debug!("{diag}");
        self.diagnostics.push(diag);
    }

    // ===== name resolution =====

    /// Expands a dotted name in a scope to its fully-qualified form.
    ///
    /// The first segment is looked up along the lexical scope chain; the
    /// module at the top of the chain also consults its wildcard-import
    /// sources. Later segments descend through the local tables of each
    /// resolved entity, and join textually once resolution dead-ends.
    pub fn expand_name(&self, scope: ObjId, name: &str) -> String {
        let mut parts = name.split('.');
        let head = match parts.next() {
            Some(h) => h,
            None => return name.to_string(),
        };
        let mut full = self
            .lookup_in_scope(scope, head)
            .unwrap_or_else(|| head.to_string());
        for part in parts {
            match self.find(&full) {
                Some(oid) => match self.local_to_full(oid, part) {
                    Some(next) => full = next,
                    None => {
                        full.push('.');
                        full.push_str(part);
                    }
                },
                None => {
                    full.push('.');
                    full.push_str(part);
                }
            }
        }
        full
    }

    /// Resolves a dotted name in a scope to an entity, if the expanded
    /// name denotes one.
    pub fn resolve_name(&self, scope: ObjId, name: &str) -> Option<ObjId> {
        self.find(&self.expand_name(scope, name))
    }

    /// Looks up a single name along the lexical scope chain. The module at
    /// the top of the chain ends the walk; an unknown name is `None`.
    pub fn lookup_in_scope(&self, scope: ObjId, name: &str) -> Option<String> {
        let mut cur = Some(scope);
        while let Some(sid) = cur {
            let obj = self.obj(sid);
            if matches!(obj.data, ObjData::Module(_)) {
                let mut visited = HashSet::new();
                return self.module_lookup(sid, name, &mut visited);
            }
            if let Some(cid) = obj.get_member(name) {
                return Some(self.full_name(cid));
            }
            if let Some(target) = obj.aliases.get(name) {
                return Some(target.clone());
            }
            cur = obj.parent;
        }
        None
    }

    /// One entity's local name table: members, then aliases, then (for
    /// modules) wildcard-import sources.
    pub fn local_to_full(&self, oid: ObjId, name: &str) -> Option<String> {
        if matches!(self.obj(oid).data, ObjData::Module(_)) {
            let mut visited = HashSet::new();
            self.module_lookup(oid, name, &mut visited)
        } else {
            let obj = self.obj(oid);
            if let Some(cid) = obj.get_member(name) {
                return Some(self.full_name(cid));
            }
            obj.aliases.get(name).cloned()
        }
    }

    fn module_lookup(
        &self,
        mid: ObjId,
        name: &str,
        visited: &mut HashSet<ObjId>,
    ) -> Option<String> {
        if !visited.insert(mid) {
            return None;
        }
        let obj = self.obj(mid);
        if let Some(cid) = obj.get_member(name) {
            return Some(self.full_name(cid));
        }
        if let Some(target) = obj.aliases.get(name) {
            return Some(target.clone());
        }
        let sources = match obj.module() {
            Some(m) => m.wildcard_sources.clone(),
            None => return None,
        };
        for src in sources {
            if !self.wildcard_exports(src, name) {
                continue;
            }
            if let Some(full) = self.module_lookup(src, name, visited) {
                return Some(full);
            }
            // Exported but not locally findable: assume it lives there.
            return Some(format!("{}.{}", self.full_name(src), name));
        }
        None
    }

    /// Whether a wildcard import from `mid` would bind `name`: listed in
    /// `__all__` when declared, else any non-underscore local binding.
    fn wildcard_exports(&self, mid: ObjId, name: &str) -> bool {
        let obj = self.obj(mid);
        match obj.module().and_then(|m| m.all.as_ref()) {
            Some(all) => all.iter().any(|n| n == name),
            None => {
                !name.starts_with('_')
                    && (obj.get_member(name).is_some() || obj.aliases.contains_key(name))
            }
        }
    }

    /// Binds a local alias in a scope.
    pub fn bind_alias(&mut self, scope: ObjId, local: &str, target: String) {
        self.obj_mut(scope).aliases.insert(local.to_string(), target);
    }

    // ===== class relations =====

    /// Ancestors via resolved base slots, depth-first in declaration
    /// order. Each class appears once; cycles terminate.
    pub fn allbases(&self, cid: ObjId, include_self: bool) -> Vec<ObjId> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        self.collect_bases(cid, include_self, &mut out, &mut seen);
        out
    }

    fn collect_bases(
        &self,
        cid: ObjId,
        include_self: bool,
        out: &mut Vec<ObjId>,
        seen: &mut HashSet<ObjId>,
    ) {
        if !seen.insert(cid) {
            return;
        }
        if include_self {
            out.push(cid);
        }
        let bases: Vec<ObjId> = match self.obj(cid).class() {
            Some(c) => c.bases.iter().filter_map(|b| b.resolved).collect(),
            None => return,
        };
        for base in bases {
            self.collect_bases(base, true, out, seen);
        }
    }

    /// Ordered documentation sources for a member: itself, then same-named
    /// members of ancestor classes, then same-named members of implemented
    /// interfaces (a module owner uses its declared provides list).
    pub fn doc_sources(&self, oid: ObjId) -> Vec<ObjId> {
        let mut out = vec![oid];
        let name = self.obj(oid).name.clone();
        let Some(owner) = self.obj(oid).parent else {
            return out;
        };
        match &self.obj(owner).data {
            ObjData::Class(data) => {
                for base in self.allbases(owner, false) {
                    if let Some(member) = self.obj(base).get_member(&name) {
                        out.push(member);
                    }
                }
                for iface_name in &data.all_implemented {
                    if let Some(iface) = self.find(iface_name) {
                        // The member may live on a base interface.
                        for step in self.allbases(iface, true) {
                            if let Some(member) = self.obj(step).get_member(&name) {
                                out.push(member);
                            }
                        }
                    }
                }
            }
            ObjData::Module(data) => {
                for &iface in &data.provides {
                    for step in self.allbases(iface, true) {
                        if let Some(member) = self.obj(step).get_member(&name) {
                            out.push(member);
                        }
                    }
                }
            }
            _ => {}
        }
        out
    }

    // ===== processing =====

    /// Processes every unprocessed module, then runs the second resolution
    /// phase. Safe to call again after adding more modules.
    pub fn process_all(&mut self) {
        let modules = self.modules.clone();
        for mid in modules {
            self.process_module(mid);
        }
        self.finalize();
    }

    /// Walks one module's tree, moving it Unprocessed -> Processing ->
    /// Processed.
    pub fn process_module(&mut self, mid: ObjId) {
        let data = match self.obj_mut(mid).module_mut() {
            Some(d) => d,
            None => return,
        };
        if data.state != ProcessingState::Unprocessed {
            return;
        }
        data.state = ProcessingState::Processing;
        let ast = data.ast.take();
        if let Some(tree) = &ast {
            debug!("processing module {}", self.full_name(mid));
            let ext = Arc::clone(&self.ext);
            let mut builder = Builder::new(self, ext);
            builder.process_module(mid, tree);
        }
        let data = self.obj_mut(mid).module_mut().expect("module data");
        data.ast = ast;
        data.state = ProcessingState::Processed;
    }

    pub fn module_state(&self, mid: ObjId) -> ProcessingState {
        self.obj(mid)
            .module()
            .map(|m| m.state)
            .unwrap_or(ProcessingState::Processed)
    }

    /// Phase two: flattens alias chains, retries unresolved base slots in
    /// their defining scope, and hands the extension its post-processing
    /// pass. Idempotent.
    pub fn finalize(&mut self) {
        self.flatten_aliases();
        self.resolve_pending_bases();
        let ext = Arc::clone(&self.ext);
        ext.post_process(self);
    }

    fn flatten_aliases(&mut self) {
        for id in self.ids() {
            let entries: Vec<(String, String)> = self
                .obj(id)
                .aliases
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            for (local, target) in entries {
                let flattened = self.flatten_alias_target(&target);
                if flattened != target {
                    self.obj_mut(id).aliases.insert(local, flattened);
                }
            }
        }
    }

    /// Follows an alias target through local tables until it settles on a
    /// registered entity or stops changing.
    fn flatten_alias_target(&self, target: &str) -> String {
        let mut current = target.to_string();
        let mut visited: HashSet<String> = HashSet::new();
        while visited.insert(current.clone()) {
            let next = self.canonical_name(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    /// One descent of an absolute dotted name through local tables.
    fn canonical_name(&self, dotted: &str) -> String {
        if self.allobjects.contains_key(dotted) {
            return dotted.to_string();
        }
        let mut parts = dotted.split('.');
        let mut full = match parts.next() {
            Some(first) => first.to_string(),
            None => return dotted.to_string(),
        };
        for part in parts {
            match self.find(&full) {
                Some(oid) => match self.local_to_full(oid, part) {
                    Some(next) => full = next,
                    None => {
                        full.push('.');
                        full.push_str(part);
                    }
                },
                None => {
                    full.push('.');
                    full.push_str(part);
                }
            }
        }
        full
    }

    fn resolve_pending_bases(&mut self) {
        for id in self.ids() {
            let Some(parent) = self.obj(id).parent else {
                continue;
            };
            let Some(data) = self.obj(id).class() else {
                continue;
            };
            let pending: Vec<(usize, String)> = data
                .bases
                .iter()
                .enumerate()
                .filter(|(_, b)| b.resolved.is_none())
                .map(|(i, b)| (i, b.raw.clone()))
                .collect();
            for (slot, raw) in pending {
                let expanded = self.expand_name(parent, &raw);
                let resolved = self.find(&expanded);
                if let Some(data) = self.obj_mut(id).class_mut() {
                    let base = &mut data.bases[slot];
                    base.expanded = expanded;
                    base.resolved = resolved;
                }
                if let Some(bid) = resolved {
                    self.add_subclass(bid, id);
                }
            }
        }
    }

    /// Appends a subclass back-reference, once.
    pub fn add_subclass(&mut self, base: ObjId, subclass: ObjId) {
        if let Some(data) = self.obj_mut(base).class_mut() {
            if !data.subclasses.contains(&subclass) {
                data.subclasses.push(subclass);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system_with_module(source: &str) -> (System, ObjId) {
        let mut system = System::new();
        let mid = system.add_module("mod", None, source).expect("parse");
        system.process_all();
        (system, mid)
    }

    #[test]
    fn privacy_follows_naming() {
        assert_eq!(privacy_for("visible"), PrivacyClass::Visible);
        assert_eq!(privacy_for("_hidden"), PrivacyClass::Private);
        assert_eq!(privacy_for("__init__"), PrivacyClass::Visible);
        assert_eq!(privacy_for("__all__"), PrivacyClass::Visible);
        assert_eq!(privacy_for("_x_"), PrivacyClass::Private);
    }

    #[test]
    fn kind_display_strings() {
        assert_eq!(Kind::ClassMethod.to_string(), "Class Method");
        assert_eq!(Kind::InstanceVariable.to_string(), "Instance Variable");
        assert_eq!(Kind::Field("TextLine".to_string()).to_string(), "TextLine");
    }

    #[test]
    fn full_names_walk_parents() {
        let mut system = System::new();
        let pkg = system.add_package("pkg", None, "").expect("parse");
        let mid = system.add_module("mod", Some(pkg), "class C:\n    pass\n").expect("parse");
        system.process_all();
        let cls = system.obj(mid).get_member("C").expect("class");
        assert_eq!(system.full_name(cls), "pkg.mod.C");
        assert_eq!(system.find("pkg.mod.C"), Some(cls));
    }

    #[test]
    fn duplicate_full_name_renames_earlier_entity() {
        let (system, mid) = system_with_module("class A:\n    def f(self):\n        pass\nclass A:\n    pass\n");
        let latest = system.obj(mid).get_member("A").expect("class");
        let earlier = system.find("mod.A 0").expect("renamed");
        assert_ne!(latest, earlier);
        assert_eq!(system.find("mod.A"), Some(latest));
        // The subtree moved with its parent.
        assert!(system.find("mod.A 0.f").is_some());
        assert!(system.find("mod.A.f").is_none());
    }

    #[test]
    fn contents_lookup_prefers_latest() {
        let (system, mid) = system_with_module("def f():\n    pass\ndef f():\n    'doc'\n");
        let latest = system.obj(mid).get_member("f").expect("function");
        assert_eq!(system.obj(latest).docstring.as_deref(), Some("doc"));
    }

    #[test]
    fn expand_name_joins_unknown_tails() {
        let (system, mid) = system_with_module("import socket\n");
        assert_eq!(system.expand_name(mid, "socket.error"), "socket.error");
        assert_eq!(system.expand_name(mid, "unheard.of"), "unheard.of");
    }

    #[test]
    fn diagnostic_display() {
        let diag = Diagnostic {
            label: "mod".to_string(),
            line: 3,
            message: "something odd".to_string(),
        };
        assert_eq!(diag.to_string(), "mod:3: something odd");
    }
}
