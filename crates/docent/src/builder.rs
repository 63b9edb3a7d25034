//! The AST walker that populates a [`System`].
//!
//! One [`Builder`] processes one module tree. It keeps an explicit scope
//! stack, dispatches on the closed statement enum, and never aborts on a
//! single statement: anything it cannot make sense of becomes a
//! diagnostic or is skipped.
//!
//! Dynamic idioms outside the core language are recognized by a
//! [`BuilderExtension`] strategy object handed in at construction. The
//! builder calls its hooks at fixed points (class creation, class
//! decoration, bare calls, call-valued assignments) and hands it a final
//! post-processing pass through [`System::finalize`].

use std::sync::Arc;

use docent_ast::nodes::{Decorator, Expr, ImportAlias, Parameters, Stmt};

use crate::docfields;
use crate::infer::{annotation_text, infer_assignment_type};
use crate::model::{
    ArgSpec, BaseRef, Decoration, DecorationArg, Kind, ObjData, ObjId, ProcessingState, System,
};

// ============================================================================
// Extension hooks
// ============================================================================

/// Recognizer hooks for dynamic idioms the core walker does not know.
///
/// Every hook has a no-op default, so an extension implements only the
/// idioms it cares about.
pub trait BuilderExtension: Send + Sync {
    /// A class entity was created and its base slots filled; the body has
    /// not been walked yet. May reclassify the entity.
    fn classify_class(&self, _system: &mut System, _cls: ObjId) {}

    /// A class's body was walked and its decorations recorded.
    fn decorate_class(&self, _system: &mut System, _cls: ObjId) {}

    /// A bare call statement in a class body.
    fn handle_class_call(&self, _system: &mut System, _cls: ObjId, _call: &Expr, _line: u32) {}

    /// A bare call statement at module level.
    fn handle_module_call(&self, _system: &mut System, _module: ObjId, _call: &Expr, _line: u32) {}

    /// An assignment binding a simple name to a call. Returning an entity
    /// ID claims the binding; the builder then skips its own handling.
    fn handle_assignment(
        &self,
        _system: &mut System,
        _scope: ObjId,
        _target: &str,
        _value: &Expr,
        _line: u32,
    ) -> Option<ObjId> {
        None
    }

    /// Runs after every module is processed; see [`System::finalize`].
    fn post_process(&self, _system: &mut System) {}
}

/// The extension used when no idioms beyond the core language apply.
pub struct NullExtension;

impl BuilderExtension for NullExtension {}

// ============================================================================
// Builder
// ============================================================================

/// Walks one module's statements into the system.
pub struct Builder<'a> {
    system: &'a mut System,
    ext: Arc<dyn BuilderExtension>,
    scopes: Vec<ObjId>,
}

impl<'a> Builder<'a> {
    pub fn new(system: &'a mut System, ext: Arc<dyn BuilderExtension>) -> Builder<'a> {
        Builder {
            system,
            ext,
            scopes: Vec::new(),
        }
    }

    /// Processes a parsed module body in the module's scope.
    pub fn process_module(&mut self, module: ObjId, ast: &docent_ast::Module) {
        self.scopes = vec![module];
        self.walk_body(&ast.body, true);
        docfields::apply_fields(self.system, module);
    }

    fn current(&self) -> ObjId {
        *self.scopes.last().expect("scope stack is never empty")
    }

    fn in_module_scope(&self) -> bool {
        matches!(self.system.obj(self.current()).data, ObjData::Module(_))
    }

    /// The module this builder run belongs to.
    fn module(&self) -> ObjId {
        self.scopes[0]
    }

    /// Label for parse-shaped diagnostics: the module's source path.
    fn diag_label(&self) -> String {
        self.system.path_label(self.module())
    }

    // ===== statement walking =====

    /// Walks statements in the current scope. `scope_body` marks the
    /// direct body of a module or class, where the first statement's
    /// string literal is the scope docstring.
    ///
    /// A string literal statement elsewhere attaches to the variables the
    /// previous assignment bound; any other statement clears that set.
    fn walk_body(&mut self, body: &[Stmt], scope_body: bool) {
        let mut pending: Vec<ObjId> = Vec::new();
        for (i, stmt) in body.iter().enumerate() {
            if let Stmt::Expr {
                value: Expr::Str(text),
                ..
            } = stmt
            {
                if scope_body && i == 0 {
                    let scope = self.current();
                    self.system.obj_mut(scope).docstring = Some(text.clone());
                } else {
                    for id in pending.drain(..) {
                        self.system.obj_mut(id).docstring = Some(text.clone());
                    }
                }
                continue;
            }
            pending = self.dispatch(stmt);
        }
    }

    /// Handles one statement, returning the entities an immediately
    /// following string literal would document.
    fn dispatch(&mut self, stmt: &Stmt) -> Vec<ObjId> {
        match stmt {
            Stmt::FunctionDef {
                name,
                params,
                body,
                decorators,
                is_async,
                line,
                ..
            } => {
                self.handle_function(name, params, body, decorators, *is_async, *line);
                Vec::new()
            }
            Stmt::ClassDef {
                name,
                bases,
                body,
                decorators,
                line,
                ..
            } => {
                self.handle_class(name, bases, body, decorators, *line);
                Vec::new()
            }
            Stmt::Assign {
                targets,
                value,
                line,
            } => self.handle_assign(targets, value, *line),
            Stmt::AnnAssign {
                target,
                annotation,
                value,
                line,
            } => self.handle_ann_assign(target, annotation, value.as_ref(), *line),
            Stmt::Import { names, .. } => {
                self.handle_import(names);
                Vec::new()
            }
            Stmt::ImportFrom {
                module,
                names,
                level,
                ..
            } => {
                self.handle_import_from(module, names, *level);
                Vec::new()
            }
            Stmt::Expr { value, line } => {
                if matches!(value, Expr::Call { .. }) {
                    let scope = self.current();
                    if self.in_module_scope() {
                        self.ext.handle_module_call(self.system, scope, value, *line);
                    } else if matches!(self.system.obj(scope).data, ObjData::Class(_)) {
                        self.ext.handle_class_call(self.system, scope, value, *line);
                    }
                }
                Vec::new()
            }
            // Conditionally defined things are documented: compound
            // statement bodies are walked in the enclosing scope.
            Stmt::If { body, orelse, .. } => {
                self.walk_body(body, false);
                self.walk_body(orelse, false);
                Vec::new()
            }
            Stmt::For { body, orelse, .. } | Stmt::While { body, orelse, .. } => {
                self.walk_body(body, false);
                self.walk_body(orelse, false);
                Vec::new()
            }
            Stmt::With { body, .. } => {
                self.walk_body(body, false);
                Vec::new()
            }
            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            } => {
                self.walk_body(body, false);
                for handler in handlers {
                    self.walk_body(&handler.body, false);
                }
                self.walk_body(orelse, false);
                self.walk_body(finalbody, false);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    // ===== imports =====

    fn handle_import(&mut self, names: &[ImportAlias]) {
        let scope = self.current();
        for alias in names {
            match &alias.asname {
                Some(local) => {
                    self.system.bind_alias(scope, local, alias.name.clone());
                }
                None => {
                    // `import a.b` binds only the top-level name.
                    let top = alias.name.split('.').next().unwrap_or(&alias.name);
                    self.system.bind_alias(scope, top, top.to_string());
                }
            }
        }
    }

    fn handle_import_from(&mut self, module: &str, names: &[ImportAlias], level: u32) {
        let scope = self.current();
        let source = self.import_source(module, level);
        for alias in names {
            if alias.name == "*" {
                if let Some(src) = self.system.find(&source) {
                    if self.system.obj(src).module().is_some() {
                        let owner = self.module();
                        if let Some(data) = self.system.obj_mut(owner).module_mut() {
                            if !data.wildcard_sources.contains(&src) {
                                data.wildcard_sources.push(src);
                            }
                        }
                    }
                }
                continue;
            }
            let local = alias.asname.as_deref().unwrap_or(&alias.name);
            let mut target = if source.is_empty() {
                alias.name.clone()
            } else {
                format!("{}.{}", source, alias.name)
            };
            // Flatten eagerly through a module we have already seen; the
            // second phase covers the rest.
            if let Some(src) = self.system.find(&source) {
                if self.system.module_state(src) != ProcessingState::Unprocessed {
                    if let Some(flat) = self.system.local_to_full(src, &alias.name) {
                        target = flat;
                    }
                }
            }
            self.system.bind_alias(scope, local, target);
        }
    }

    /// The absolute module path a `from` import names, resolving leading
    /// dots against the current module's place in its package.
    fn import_source(&self, module: &str, level: u32) -> String {
        if level == 0 {
            return module.to_string();
        }
        let mid = self.module();
        let full = self.system.full_name(mid);
        let is_package = self
            .system
            .obj(mid)
            .module()
            .map(|m| m.is_package)
            .unwrap_or(false);
        let drop = if is_package { level - 1 } else { level } as usize;
        let mut parts: Vec<&str> = full.split('.').collect();
        for _ in 0..drop.min(parts.len()) {
            parts.pop();
        }
        let base = parts.join(".");
        if module.is_empty() {
            base
        } else if base.is_empty() {
            module.to_string()
        } else {
            format!("{base}.{module}")
        }
    }

    // ===== functions =====

    fn handle_function(
        &mut self,
        name: &str,
        params: &Parameters,
        body: &[Stmt],
        decorators: &[Decorator],
        is_async: bool,
        line: u32,
    ) {
        let scope = self.current();
        let in_class = matches!(self.system.obj(scope).data, ObjData::Class(_));
        let mut kind = if in_class { Kind::Method } else { Kind::Function };
        if in_class {
            for d in decorators {
                match d.expr.as_dotted_name().as_deref() {
                    Some("classmethod") => kind = Kind::ClassMethod,
                    Some("staticmethod") => kind = Kind::StaticMethod,
                    _ => {}
                }
            }
        }
        let decorations = self.record_decorations(decorators, scope);
        let id = self.system.add_object(Some(scope), kind, name, line);
        if let Some(Stmt::Expr {
            value: Expr::Str(text),
            ..
        }) = body.first()
        {
            self.system.obj_mut(id).docstring = Some(text.clone());
        }
        let argspec = argspec_from(params);
        if let Some(data) = self.system.obj_mut(id).function_mut() {
            data.argspec = argspec;
            data.is_async = is_async;
            data.decorations = decorations;
        }
        if in_class {
            self.scan_method_body(body, id, scope);
        }
    }

    /// Scans a method body for `self.<name>` bindings, which create or
    /// upgrade instance variables on the owning class. Compound statement
    /// bodies are scanned too; nested definitions are not.
    fn scan_method_body(&mut self, body: &[Stmt], method: ObjId, class_id: ObjId) {
        let mut pending: Vec<ObjId> = Vec::new();
        for stmt in body {
            if let Stmt::Expr {
                value: Expr::Str(text),
                ..
            } = stmt
            {
                for id in pending.drain(..) {
                    self.system.obj_mut(id).docstring = Some(text.clone());
                }
                continue;
            }
            pending = Vec::new();
            match stmt {
                Stmt::Assign {
                    targets,
                    value,
                    line,
                } => {
                    for target in targets {
                        let Some(attr) = self_attr(target) else {
                            continue;
                        };
                        let ty = infer_assignment_type(self.system, method, value);
                        let sv = value.as_str_literal().map(str::to_string);
                        if let Some(id) = self.upsert_variable(
                            class_id,
                            &attr,
                            Kind::InstanceVariable,
                            ty,
                            false,
                            sv,
                            *line,
                        ) {
                            pending.push(id);
                        }
                    }
                }
                Stmt::AnnAssign {
                    target,
                    annotation,
                    value,
                    line,
                } => {
                    let Some(attr) = self_attr(target) else {
                        continue;
                    };
                    let ty = Some(annotation_text(annotation));
                    let sv = value
                        .as_ref()
                        .and_then(|v| v.as_str_literal())
                        .map(str::to_string);
                    if let Some(id) = self.upsert_variable(
                        class_id,
                        &attr,
                        Kind::InstanceVariable,
                        ty,
                        true,
                        sv,
                        *line,
                    ) {
                        pending.push(id);
                    }
                }
                Stmt::If { body, orelse, .. }
                | Stmt::For { body, orelse, .. }
                | Stmt::While { body, orelse, .. } => {
                    self.scan_method_body(body, method, class_id);
                    self.scan_method_body(orelse, method, class_id);
                }
                Stmt::With { body, .. } => self.scan_method_body(body, method, class_id),
                Stmt::Try {
                    body,
                    handlers,
                    orelse,
                    finalbody,
                    ..
                } => {
                    self.scan_method_body(body, method, class_id);
                    for handler in handlers {
                        self.scan_method_body(&handler.body, method, class_id);
                    }
                    self.scan_method_body(orelse, method, class_id);
                    self.scan_method_body(finalbody, method, class_id);
                }
                _ => {}
            }
        }
    }

    // ===== classes =====

    fn handle_class(
        &mut self,
        name: &str,
        bases: &[Expr],
        body: &[Stmt],
        decorators: &[Decorator],
        line: u32,
    ) {
        let scope = self.current();
        // Bases resolve before the class registers, so `class A(A)` binds
        // to the earlier entity even though it is about to be renamed.
        let mut base_refs = Vec::new();
        for base in bases {
            let raw = base.to_source();
            let expanded = match base.as_dotted_name() {
                Some(dotted) => self.system.expand_name(scope, &dotted),
                None => raw.clone(),
            };
            let resolved = self.system.find(&expanded);
            base_refs.push(BaseRef {
                raw,
                expanded,
                resolved,
            });
        }
        let id = self.system.add_object(Some(scope), Kind::Class, name, line);
        for base in &base_refs {
            if let Some(bid) = base.resolved {
                self.system.add_subclass(bid, id);
            }
        }
        if let Some(data) = self.system.obj_mut(id).class_mut() {
            data.bases = base_refs;
        }
        self.ext.classify_class(self.system, id);
        self.scopes.push(id);
        self.walk_body(body, true);
        self.scopes.pop();
        let decorations = self.record_decorations(decorators, scope);
        if let Some(data) = self.system.obj_mut(id).class_mut() {
            data.decorations = decorations;
        }
        self.ext.decorate_class(self.system, id);
        docfields::apply_fields(self.system, id);
    }

    fn record_decorations(&mut self, decorators: &[Decorator], scope: ObjId) -> Vec<Decoration> {
        decorators
            .iter()
            .map(|d| {
                let raw = d.expr.to_source();
                let (callee, args) = match &d.expr {
                    Expr::Call { func, args, .. } => (func.as_ref(), Some(args)),
                    other => (other, None),
                };
                let expanded = callee
                    .as_dotted_name()
                    .map(|n| self.system.expand_name(scope, &n));
                let resolved = expanded.as_deref().and_then(|n| self.system.find(n));
                let hidden = expanded
                    .as_deref()
                    .is_some_and(|n| self.system.options.hidden_decorators.contains(n));
                let args = args.map(|args| {
                    args.iter()
                        .map(|arg| {
                            let (inner, starred) = match arg {
                                Expr::Starred(inner) => (inner.as_ref(), true),
                                other => (other, false),
                            };
                            let expanded = inner
                                .as_dotted_name()
                                .map(|n| self.system.expand_name(scope, &n));
                            let resolved = expanded.as_deref().and_then(|n| self.system.find(n));
                            DecorationArg {
                                raw: arg.to_source(),
                                expanded,
                                resolved,
                                starred,
                            }
                        })
                        .collect()
                });
                Decoration {
                    raw,
                    expanded,
                    resolved,
                    args,
                    line: d.line,
                    hidden,
                }
            })
            .collect()
    }

    // ===== assignments =====

    fn handle_assign(&mut self, targets: &[Expr], value: &Expr, line: u32) -> Vec<ObjId> {
        let mut pending = Vec::new();
        for target in targets {
            match target {
                Expr::Name(name) => {
                    if let Some(id) = self.assign_name(name, value, line) {
                        pending.push(id);
                    }
                }
                Expr::Attribute { value: owner, attr } if attr == "__doc__" => {
                    self.assign_dotted_doc(owner, value, line);
                }
                _ => {}
            }
        }
        pending
    }

    fn assign_name(&mut self, name: &str, value: &Expr, line: u32) -> Option<ObjId> {
        let scope = self.current();
        let is_module = self.in_module_scope();
        if name == "__doc__" {
            self.update_docstring(scope, value, line);
            return None;
        }
        if is_module && name == "__all__" {
            if let Some(names) = export_list(value) {
                if let Some(data) = self.system.obj_mut(scope).module_mut() {
                    data.all = Some(names);
                }
            }
            return None;
        }
        if !is_module {
            if let Some(upgraded) = self.method_rebinding(scope, value) {
                let kind = upgraded.1;
                self.system.obj_mut(upgraded.0).kind = kind;
                return None;
            }
        }
        if matches!(value, Expr::Call { .. }) {
            if let Some(id) = self
                .ext
                .handle_assignment(self.system, scope, name, value, line)
            {
                return Some(id);
            }
        }
        if let Some(dotted) = value.as_dotted_name() {
            // A bare dotted-name value is an alias binding, not a variable.
            let target = self.system.expand_name(scope, &dotted);
            self.system.bind_alias(scope, name, target);
            return None;
        }
        let kind = if is_module {
            Kind::Variable
        } else {
            Kind::ClassVariable
        };
        let ty = infer_assignment_type(self.system, scope, value);
        let sv = value.as_str_literal().map(str::to_string);
        self.upsert_variable(scope, name, kind, ty, false, sv, line)
    }

    /// Recognizes `f = classmethod(f)` and `f = staticmethod(f)` in a
    /// class body, yielding the function member and its new kind.
    fn method_rebinding(&self, scope: ObjId, value: &Expr) -> Option<(ObjId, Kind)> {
        let Expr::Call {
            func,
            args,
            keywords,
        } = value
        else {
            return None;
        };
        if !keywords.is_empty() || args.len() != 1 {
            return None;
        }
        let kind = match func.as_ref() {
            Expr::Name(n) if n == "classmethod" => Kind::ClassMethod,
            Expr::Name(n) if n == "staticmethod" => Kind::StaticMethod,
            _ => return None,
        };
        let Expr::Name(arg) = &args[0] else {
            return None;
        };
        let member = self.system.obj(scope).get_member(arg)?;
        self.system.obj(member).function()?;
        Some((member, kind))
    }

    fn handle_ann_assign(
        &mut self,
        target: &Expr,
        annotation: &Expr,
        value: Option<&Expr>,
        line: u32,
    ) -> Vec<ObjId> {
        let Expr::Name(name) = target else {
            return Vec::new();
        };
        let scope = self.current();
        if name == "__doc__" {
            if let Some(v) = value {
                self.update_docstring(scope, v, line);
            }
            return Vec::new();
        }
        let kind = if self.in_module_scope() {
            Kind::Variable
        } else {
            Kind::ClassVariable
        };
        let ty = Some(annotation_text(annotation));
        let sv = value.and_then(|v| v.as_str_literal()).map(str::to_string);
        match self.upsert_variable(scope, name, kind, ty, true, sv, line) {
            Some(id) => vec![id],
            None => Vec::new(),
        }
    }

    /// Creates a variable member or updates an existing one.
    ///
    /// An instance-variable binding upgrades an existing class variable;
    /// a declared type replaces any inferred one; a member that is not a
    /// variable is left alone.
    fn upsert_variable(
        &mut self,
        scope: ObjId,
        name: &str,
        kind: Kind,
        type_expr: Option<String>,
        declared: bool,
        string_value: Option<String>,
        line: u32,
    ) -> Option<ObjId> {
        if let Some(existing) = self.system.obj(scope).get_member(name) {
            if !self.system.obj(existing).kind.is_variable() {
                return None;
            }
            let obj = self.system.obj_mut(existing);
            if kind == Kind::InstanceVariable {
                obj.kind = Kind::InstanceVariable;
            }
            if let Some(data) = obj.variable_mut() {
                if type_expr.is_some() && (declared || data.type_expr.is_none()) {
                    data.type_expr = type_expr;
                }
                data.string_value = string_value;
            }
            return Some(existing);
        }
        let id = self.system.add_object(Some(scope), kind, name, line);
        if let Some(data) = self.system.obj_mut(id).variable_mut() {
            data.type_expr = type_expr;
            data.string_value = string_value;
        }
        Some(id)
    }

    // ===== __doc__ reassignment =====

    fn assign_dotted_doc(&mut self, owner: &Expr, value: &Expr, line: u32) {
        let scope = self.current();
        let label = self.diag_label();
        let Some(dotted) = owner.as_dotted_name() else {
            self.system.msg(
                &label,
                line,
                "Unable to figure out target for __doc__ assignment",
            );
            return;
        };
        let expanded = self.system.expand_name(scope, &dotted);
        match self.system.find(&expanded) {
            Some(target) => self.update_docstring(target, value, line),
            None => self.system.msg(
                &label,
                line,
                format!(
                    "Unable to figure out target for __doc__ assignment: \
                     computed full name not found: {expanded}.__doc__"
                ),
            ),
        }
    }

    fn update_docstring(&mut self, owner: ObjId, value: &Expr, line: u32) {
        let scope = self.current();
        let label = self.diag_label();
        match self.doc_value(scope, value) {
            DocValue::Text(text) => self.system.obj_mut(owner).docstring = Some(text),
            DocValue::NotString => self.system.msg(
                &label,
                line,
                "Ignoring value assigned to __doc__: not a string",
            ),
            DocValue::TooComplex => self.system.msg(
                &label,
                line,
                "Unable to figure out value for __doc__ assignment, maybe too complex",
            ),
        }
    }

    /// Classifies a `__doc__` value: a string literal, a recognized
    /// rot13-encoding call, or a name whose binding held a string
    /// literal all produce text.
    fn doc_value(&self, scope: ObjId, value: &Expr) -> DocValue {
        if let Some(text) = value.as_str_literal() {
            return DocValue::Text(text.to_string());
        }
        if let Expr::Call {
            func,
            args,
            keywords,
        } = value
        {
            if keywords.is_empty() && args.len() == 2 {
                if let Some(dotted) = func.as_dotted_name() {
                    if self.system.expand_name(scope, &dotted) == "codecs.encode" {
                        if let (Some(text), Some(codec)) =
                            (args[0].as_str_literal(), args[1].as_str_literal())
                        {
                            if codec.eq_ignore_ascii_case("rot13")
                                || codec.eq_ignore_ascii_case("rot_13")
                            {
                                return DocValue::Text(rot13(text));
                            }
                        }
                    }
                }
            }
            return DocValue::TooComplex;
        }
        if let Some(dotted) = value.as_dotted_name() {
            if let Some(id) = self.system.resolve_name(scope, &dotted) {
                if let Some(text) = self
                    .system
                    .obj(id)
                    .variable()
                    .and_then(|v| v.string_value.clone())
                {
                    return DocValue::Text(text);
                }
            }
            return DocValue::TooComplex;
        }
        if value.is_literal() {
            return DocValue::NotString;
        }
        DocValue::TooComplex
    }
}

enum DocValue {
    Text(String),
    NotString,
    TooComplex,
}

/// The `self.<attr>` attribute name of an assignment target, if that is
/// its shape.
fn self_attr(target: &Expr) -> Option<String> {
    match target {
        Expr::Attribute { value, attr } if matches!(value.as_ref(), Expr::Name(n) if n == "self") => {
            Some(attr.clone())
        }
        _ => None,
    }
}

/// `__all__` export names from a list or tuple of string literals.
fn export_list(value: &Expr) -> Option<Vec<String>> {
    let elts = match value {
        Expr::List(elts) | Expr::Tuple(elts) => elts,
        _ => return None,
    };
    Some(
        elts.iter()
            .filter_map(|e| e.as_str_literal().map(str::to_string))
            .collect(),
    )
}

/// Flattens a parameter list into display form. Keyword-only parameters
/// fold into the positional list; defaults keep source spelling.
fn argspec_from(params: &Parameters) -> ArgSpec {
    let mut spec = ArgSpec::default();
    for p in params.params.iter().chain(&params.kwonly) {
        spec.args.push(p.name.clone());
        if let Some(default) = &p.default {
            spec.defaults.push(default.to_source());
        }
    }
    spec.vararg = params.vararg.as_ref().map(|p| p.name.clone());
    spec.kwarg = params.kwarg.as_ref().map(|p| p.name.clone());
    spec
}

fn rot13(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'a'..='z' => (((c as u8 - b'a' + 13) % 26) + b'a') as char,
            'A'..='Z' => (((c as u8 - b'A' + 13) % 26) + b'A') as char,
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docent_ast::parse_module;

    #[test]
    fn argspec_flattens_parameters() {
        let module = parse_module("def f(a, b=3, *c, **kw):\n    pass\n").expect("parse");
        let Stmt::FunctionDef { params, .. } = &module.body[0] else {
            panic!("expected a function");
        };
        let spec = argspec_from(params);
        assert_eq!(spec.args, vec!["a", "b"]);
        assert_eq!(spec.vararg.as_deref(), Some("c"));
        assert_eq!(spec.kwarg.as_deref(), Some("kw"));
        assert_eq!(spec.defaults, vec!["3"]);
    }

    #[test]
    fn rot13_round_trips() {
        assert_eq!(rot13("Pnrfne fnynq"), "Caesar salad");
        assert_eq!(rot13(rot13("mixed Case 123!").as_str()), "mixed Case 123!");
    }

    #[test]
    fn export_list_takes_strings_only() {
        let module = parse_module("__all__ = ['a', 'b']\n").expect("parse");
        let Stmt::Assign { value, .. } = &module.body[0] else {
            panic!("expected an assignment");
        };
        assert_eq!(
            export_list(value),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        let module = parse_module("__all__ = 'nope'\n").expect("parse");
        let Stmt::Assign { value, .. } = &module.body[0] else {
            panic!("expected an assignment");
        };
        assert_eq!(export_list(value), None);
    }
}
