//! Syntax tree node types.
//!
//! The tree is a closed set of owned enums: every statement and expression
//! kind the parser can produce is a variant here, so consumers dispatch with
//! exhaustive `match` instead of downcasting. Nodes keep enough of the
//! source to reproduce it ([`Expr::to_source`]); formatting details such as
//! whitespace and comments are not preserved.
//!
//! Statement nodes carry the 1-based line of their first token. Expressions
//! inherit the line of the statement that contains them.

/// A parsed module: the top-level statement sequence of one source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub body: Vec<Stmt>,
}

/// One name in an `import` or `from ... import` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportAlias {
    /// Dotted name as written, or `"*"` for a wildcard import.
    pub name: String,
    /// The `as` rename, when present.
    pub asname: Option<String>,
}

/// A keyword argument in a call: `name=value`, or `**value` when `arg` is
/// `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Expr,
}

/// A decorator line: the expression after `@`.
#[derive(Debug, Clone, PartialEq)]
pub struct Decorator {
    pub expr: Expr,
    pub line: u32,
}

/// One formal parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub annotation: Option<Expr>,
    pub default: Option<Expr>,
}

/// The full parameter list of a function or lambda.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    pub params: Vec<Param>,
    pub vararg: Option<Param>,
    pub kwonly: Vec<Param>,
    pub kwarg: Option<Param>,
}

/// One `for ... in ... [if ...]` clause of a comprehension.
#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    pub target: Expr,
    pub iter: Expr,
    pub ifs: Vec<Expr>,
    pub is_async: bool,
}

/// One context manager in a `with` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct WithItem {
    pub context: Expr,
    pub optional_vars: Option<Expr>,
}

/// One `except` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    pub typ: Option<Expr>,
    pub name: Option<String>,
    pub body: Vec<Stmt>,
}

/// Statement kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// A bare expression statement (including docstrings and call idioms).
    Expr { value: Expr, line: u32 },
    Assign {
        targets: Vec<Expr>,
        value: Expr,
        line: u32,
    },
    AugAssign {
        target: Expr,
        op: String,
        value: Expr,
        line: u32,
    },
    AnnAssign {
        target: Expr,
        annotation: Expr,
        value: Option<Expr>,
        line: u32,
    },
    Import {
        names: Vec<ImportAlias>,
        line: u32,
    },
    ImportFrom {
        /// Dotted module path after the relative dots; empty for `from . import x`.
        module: String,
        names: Vec<ImportAlias>,
        /// Number of leading dots.
        level: u32,
        line: u32,
    },
    FunctionDef {
        name: String,
        params: Parameters,
        body: Vec<Stmt>,
        decorators: Vec<Decorator>,
        returns: Option<Expr>,
        is_async: bool,
        line: u32,
    },
    ClassDef {
        name: String,
        bases: Vec<Expr>,
        keywords: Vec<Keyword>,
        body: Vec<Stmt>,
        decorators: Vec<Decorator>,
        line: u32,
    },
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        line: u32,
    },
    For {
        target: Expr,
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        is_async: bool,
        line: u32,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
        line: u32,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<Stmt>,
        is_async: bool,
        line: u32,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
        line: u32,
    },
    Return { value: Option<Expr>, line: u32 },
    Raise {
        exc: Option<Expr>,
        cause: Option<Expr>,
        line: u32,
    },
    Delete { targets: Vec<Expr>, line: u32 },
    Global { names: Vec<String>, line: u32 },
    Nonlocal { names: Vec<String>, line: u32 },
    Assert {
        test: Expr,
        msg: Option<Expr>,
        line: u32,
    },
    Pass { line: u32 },
    Break { line: u32 },
    Continue { line: u32 },
}

impl Stmt {
    /// Line of the statement's first token.
    pub fn line(&self) -> u32 {
        match self {
            Stmt::Expr { line, .. }
            | Stmt::Assign { line, .. }
            | Stmt::AugAssign { line, .. }
            | Stmt::AnnAssign { line, .. }
            | Stmt::Import { line, .. }
            | Stmt::ImportFrom { line, .. }
            | Stmt::FunctionDef { line, .. }
            | Stmt::ClassDef { line, .. }
            | Stmt::If { line, .. }
            | Stmt::For { line, .. }
            | Stmt::While { line, .. }
            | Stmt::With { line, .. }
            | Stmt::Try { line, .. }
            | Stmt::Return { line, .. }
            | Stmt::Raise { line, .. }
            | Stmt::Delete { line, .. }
            | Stmt::Global { line, .. }
            | Stmt::Nonlocal { line, .. }
            | Stmt::Assert { line, .. }
            | Stmt::Pass { line }
            | Stmt::Break { line }
            | Stmt::Continue { line } => *line,
        }
    }
}

/// Expression kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name(String),
    Attribute { value: Box<Expr>, attr: String },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    /// A string literal (possibly concatenated), decoded.
    Str(String),
    /// An f-string, kept verbatim including prefix and quotes.
    FString(String),
    /// A bytes literal; inner text kept as written.
    Bytes(String),
    /// A numeric literal; lexeme kept as written.
    Num(String),
    Bool(bool),
    NoneLiteral,
    EllipsisLiteral,
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Set(Vec<Expr>),
    Dict {
        /// `None` key marks a `**` expansion entry.
        keys: Vec<Option<Expr>>,
        values: Vec<Expr>,
    },
    Subscript { value: Box<Expr>, index: Box<Expr> },
    Slice {
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Starred(Box<Expr>),
    UnaryOp { op: String, operand: Box<Expr> },
    BinOp {
        left: Box<Expr>,
        op: String,
        right: Box<Expr>,
    },
    BoolOp { op: String, values: Vec<Expr> },
    Compare {
        left: Box<Expr>,
        ops: Vec<String>,
        comparators: Vec<Expr>,
    },
    IfExp {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    Lambda {
        params: Box<Parameters>,
        body: Box<Expr>,
    },
    ListComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    SetComp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    DictComp {
        key: Box<Expr>,
        value: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    GeneratorExp {
        elt: Box<Expr>,
        generators: Vec<Comprehension>,
    },
    Yield(Option<Box<Expr>>),
    YieldFrom(Box<Expr>),
    Await(Box<Expr>),
}

impl Expr {
    /// Returns the dotted-name string for `Name` and `Attribute` chains, like
    /// `a.b.c`, or `None` if the expression has any other shape.
    pub fn as_dotted_name(&self) -> Option<String> {
        match self {
            Expr::Name(n) => Some(n.clone()),
            Expr::Attribute { value, attr } => {
                let mut base = value.as_dotted_name()?;
                base.push('.');
                base.push_str(attr);
                Some(base)
            }
            _ => None,
        }
    }

    /// Returns the content of a plain string literal.
    pub fn as_str_literal(&self) -> Option<&str> {
        match self {
            Expr::Str(s) => Some(s),
            _ => None,
        }
    }

    /// True for literal trees that a constant evaluator could fold: scalar
    /// literals and containers of literals.
    pub fn is_literal(&self) -> bool {
        match self {
            Expr::Str(_) | Expr::Bytes(_) | Expr::Num(_) | Expr::Bool(_) => true,
            Expr::NoneLiteral | Expr::EllipsisLiteral => true,
            Expr::List(elts) | Expr::Tuple(elts) | Expr::Set(elts) => {
                elts.iter().all(Expr::is_literal)
            }
            Expr::Dict { keys, values } => {
                keys.iter().all(|k| matches!(k, Some(e) if e.is_literal()))
                    && values.iter().all(Expr::is_literal)
            }
            _ => false,
        }
    }

    /// Renders the expression back to source text.
    pub fn to_source(&self) -> String {
        self.render(0)
    }

    /// Binding power used to decide parenthesization when rendering.
    fn prec(&self) -> u8 {
        match self {
            Expr::Lambda { .. } | Expr::IfExp { .. } => 1,
            Expr::Yield(_) | Expr::YieldFrom(_) => 1,
            Expr::BoolOp { op, .. } => {
                if op == "or" {
                    2
                } else {
                    3
                }
            }
            Expr::UnaryOp { op, .. } if op == "not" => 4,
            Expr::Compare { .. } => 5,
            Expr::BinOp { op, .. } => match op.as_str() {
                "|" => 6,
                "^" => 7,
                "&" => 8,
                "<<" | ">>" => 9,
                "+" | "-" => 10,
                "**" => 13,
                _ => 11,
            },
            Expr::UnaryOp { .. } => 12,
            Expr::Await(_) => 14,
            Expr::Starred(_) => 1,
            _ => 15,
        }
    }

    fn render(&self, min_prec: u8) -> String {
        let rendered = self.render_inner();
        if self.prec() < min_prec {
            format!("({rendered})")
        } else {
            rendered
        }
    }

    fn render_inner(&self) -> String {
        match self {
            Expr::Name(n) => n.clone(),
            Expr::Attribute { value, attr } => format!("{}.{}", value.render(15), attr),
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                let mut parts: Vec<String> = args.iter().map(|a| a.render(0)).collect();
                for kw in keywords {
                    match &kw.arg {
                        Some(name) => parts.push(format!("{}={}", name, kw.value.render(0))),
                        None => parts.push(format!("**{}", kw.value.render(0))),
                    }
                }
                format!("{}({})", func.render(15), parts.join(", "))
            }
            Expr::Str(s) => render_str(s),
            Expr::FString(raw) => raw.clone(),
            Expr::Bytes(raw) => format!("b'{raw}'"),
            Expr::Num(raw) => raw.clone(),
            Expr::Bool(true) => "True".to_string(),
            Expr::Bool(false) => "False".to_string(),
            Expr::NoneLiteral => "None".to_string(),
            Expr::EllipsisLiteral => "...".to_string(),
            Expr::List(elts) => format!("[{}]", join_rendered(elts)),
            Expr::Tuple(elts) => match elts.len() {
                0 => "()".to_string(),
                1 => format!("({},)", elts[0].render(0)),
                _ => format!("({})", join_rendered(elts)),
            },
            Expr::Set(elts) => format!("{{{}}}", join_rendered(elts)),
            Expr::Dict { keys, values } => {
                let items: Vec<String> = keys
                    .iter()
                    .zip(values)
                    .map(|(k, v)| match k {
                        Some(key) => format!("{}: {}", key.render(0), v.render(0)),
                        None => format!("**{}", v.render(0)),
                    })
                    .collect();
                format!("{{{}}}", items.join(", "))
            }
            Expr::Subscript { value, index } => {
                // A tuple index renders without parentheses: d[str, int].
                let idx = match index.as_ref() {
                    Expr::Tuple(elts) if !elts.is_empty() => join_rendered(elts),
                    other => other.render(0),
                };
                format!("{}[{}]", value.render(15), idx)
            }
            Expr::Slice { lower, upper, step } => {
                let mut out = String::new();
                if let Some(l) = lower {
                    out.push_str(&l.render(0));
                }
                out.push(':');
                if let Some(u) = upper {
                    out.push_str(&u.render(0));
                }
                if let Some(s) = step {
                    out.push(':');
                    out.push_str(&s.render(0));
                }
                out
            }
            Expr::Starred(value) => format!("*{}", value.render(15)),
            Expr::UnaryOp { op, operand } => {
                if op == "not" {
                    format!("not {}", operand.render(4))
                } else {
                    format!("{}{}", op, operand.render(12))
                }
            }
            Expr::BinOp { left, op, right } => {
                let prec = self.prec();
                format!("{} {} {}", left.render(prec), op, right.render(prec + 1))
            }
            Expr::BoolOp { op, values } => {
                let prec = self.prec();
                values
                    .iter()
                    .map(|v| v.render(prec + 1))
                    .collect::<Vec<_>>()
                    .join(&format!(" {op} "))
            }
            Expr::Compare {
                left,
                ops,
                comparators,
            } => {
                let mut out = left.render(6);
                for (op, right) in ops.iter().zip(comparators) {
                    out.push_str(&format!(" {} {}", op, right.render(6)));
                }
                out
            }
            Expr::IfExp { test, body, orelse } => format!(
                "{} if {} else {}",
                body.render(2),
                test.render(2),
                orelse.render(1)
            ),
            Expr::Lambda { params, body } => {
                let rendered = render_params(params);
                if rendered.is_empty() {
                    format!("lambda: {}", body.render(1))
                } else {
                    format!("lambda {}: {}", rendered, body.render(1))
                }
            }
            Expr::ListComp { elt, generators } => {
                format!("[{}{}]", elt.render(0), render_generators(generators))
            }
            Expr::SetComp { elt, generators } => {
                format!("{{{}{}}}", elt.render(0), render_generators(generators))
            }
            Expr::DictComp {
                key,
                value,
                generators,
            } => format!(
                "{{{}: {}{}}}",
                key.render(0),
                value.render(0),
                render_generators(generators)
            ),
            Expr::GeneratorExp { elt, generators } => {
                format!("({}{})", elt.render(0), render_generators(generators))
            }
            Expr::Yield(value) => match value {
                Some(v) => format!("yield {}", v.render(2)),
                None => "yield".to_string(),
            },
            Expr::YieldFrom(value) => format!("yield from {}", value.render(2)),
            Expr::Await(value) => format!("await {}", value.render(14)),
        }
    }
}

fn join_rendered(elts: &[Expr]) -> String {
    elts.iter()
        .map(|e| e.render(0))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_generators(generators: &[Comprehension]) -> String {
    let mut out = String::new();
    for gen in generators {
        if gen.is_async {
            out.push_str(" async");
        }
        out.push_str(&format!(
            " for {} in {}",
            gen.target.render(2),
            gen.iter.render(2)
        ));
        for cond in &gen.ifs {
            out.push_str(&format!(" if {}", cond.render(2)));
        }
    }
    out
}

fn render_params(params: &Parameters) -> String {
    let mut parts = Vec::new();
    for p in &params.params {
        parts.push(render_param(p));
    }
    if let Some(v) = &params.vararg {
        parts.push(format!("*{}", render_param(v)));
    } else if !params.kwonly.is_empty() {
        parts.push("*".to_string());
    }
    for p in &params.kwonly {
        parts.push(render_param(p));
    }
    if let Some(k) = &params.kwarg {
        parts.push(format!("**{}", render_param(k)));
    }
    parts.join(", ")
}

fn render_param(p: &Param) -> String {
    let mut out = p.name.clone();
    if let Some(ann) = &p.annotation {
        out.push_str(&format!(": {}", ann.render(0)));
    }
    if let Some(default) = &p.default {
        if p.annotation.is_some() {
            out.push_str(&format!(" = {}", default.render(0)));
        } else {
            out.push_str(&format!("={}", default.render(0)));
        }
    }
    out
}

/// Renders a string literal with single quotes, escaping as needed.
fn render_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str) -> Expr {
        Expr::Name(n.to_string())
    }

    #[test]
    fn dotted_names() {
        let expr = Expr::Attribute {
            value: Box::new(Expr::Attribute {
                value: Box::new(name("a")),
                attr: "b".to_string(),
            }),
            attr: "c".to_string(),
        };
        assert_eq!(expr.as_dotted_name(), Some("a.b.c".to_string()));
        assert_eq!(expr.to_source(), "a.b.c");

        let call = Expr::Call {
            func: Box::new(name("f")),
            args: vec![],
            keywords: vec![],
        };
        assert_eq!(call.as_dotted_name(), None);
    }

    #[test]
    fn subscript_tuple_index_renders_flat() {
        let expr = Expr::Subscript {
            value: Box::new(name("Dict")),
            index: Box::new(Expr::Tuple(vec![name("str"), name("int")])),
        };
        assert_eq!(expr.to_source(), "Dict[str, int]");
    }

    #[test]
    fn binop_parenthesization() {
        // (1 + 2) * 3 keeps its grouping.
        let expr = Expr::BinOp {
            left: Box::new(Expr::BinOp {
                left: Box::new(Expr::Num("1".to_string())),
                op: "+".to_string(),
                right: Box::new(Expr::Num("2".to_string())),
            }),
            op: "*".to_string(),
            right: Box::new(Expr::Num("3".to_string())),
        };
        assert_eq!(expr.to_source(), "(1 + 2) * 3");
    }

    #[test]
    fn string_rendering_escapes() {
        assert_eq!(Expr::Str("a'b".to_string()).to_source(), "'a\\'b'");
        assert_eq!(Expr::Str("line\n".to_string()).to_source(), "'line\\n'");
    }

    #[test]
    fn literal_classification() {
        assert!(Expr::Num("3".to_string()).is_literal());
        assert!(Expr::List(vec![Expr::Num("1".to_string())]).is_literal());
        assert!(!name("x").is_literal());
        let call = Expr::Call {
            func: Box::new(name("f")),
            args: vec![],
            keywords: vec![],
        };
        assert!(!call.is_literal());
    }
}
