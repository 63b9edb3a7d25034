//! Type inference for variable bindings.
//!
//! Only shallow, obviously-correct facts are inferred: scalar literals map
//! to their builtin type names, containers of uniform scalars map to a
//! parameterized spelling (`List[str]`), and everything else is left
//! untyped. Recognized attrs descriptor calls (`attr.ib`, `attr.attrib`)
//! take their `type=` keyword as written or fall back to inferring the
//! `default=` value.

use docent_ast::nodes::{Expr, Keyword};
use docent_ast::parse_expr;

use crate::model::{ObjId, System};

/// The builtin type name of a scalar literal, or `None`.
fn scalar_type(expr: &Expr) -> Option<&'static str> {
    match expr {
        Expr::Str(_) => Some("str"),
        Expr::Bytes(_) => Some("bytes"),
        Expr::Bool(_) => Some("bool"),
        Expr::Num(raw) => Some(num_type(raw)?),
        _ => None,
    }
}

/// `int` or `float` from a numeric lexeme; complex numbers yield `None`.
fn num_type(raw: &str) -> Option<&'static str> {
    if raw.ends_with('j') || raw.ends_with('J') {
        return None;
    }
    let lower = raw.to_ascii_lowercase();
    if lower.starts_with("0x") || lower.starts_with("0o") || lower.starts_with("0b") {
        return Some("int");
    }
    if lower.contains('.') || lower.contains('e') {
        Some("float")
    } else {
        Some("int")
    }
}

/// The single scalar type shared by every element, or `None` for empty,
/// mixed, or non-scalar content.
fn uniform_scalar(elts: &[Expr]) -> Option<&'static str> {
    let mut iter = elts.iter();
    let first = scalar_type(iter.next()?)?;
    for elt in iter {
        if scalar_type(elt) != Some(first) {
            return None;
        }
    }
    Some(first)
}

/// Infers a displayed type for a literal expression.
pub fn infer_literal(expr: &Expr) -> Option<String> {
    if let Some(scalar) = scalar_type(expr) {
        return Some(scalar.to_string());
    }
    match expr {
        Expr::List(elts) => Some(match uniform_scalar(elts) {
            Some(t) => format!("List[{t}]"),
            None => "List".to_string(),
        }),
        Expr::Tuple(elts) => Some(match uniform_scalar(elts) {
            Some(t) => format!("Tuple[{t}, ...]"),
            None => "Tuple".to_string(),
        }),
        Expr::Set(elts) => Some(match uniform_scalar(elts) {
            Some(t) => format!("Set[{t}]"),
            None => "Set".to_string(),
        }),
        Expr::Dict { keys, values } => {
            let key_exprs: Vec<Expr> = keys.iter().flatten().cloned().collect();
            if key_exprs.len() != keys.len() {
                // A ** expansion entry defeats element typing.
                return Some("Dict".to_string());
            }
            match (uniform_scalar(&key_exprs), uniform_scalar(values)) {
                (Some(k), Some(v)) => Some(format!("Dict[{k}, {v}]")),
                _ => Some("Dict".to_string()),
            }
        }
        _ => None,
    }
}

/// Infers the displayed type for an assignment's right-hand side.
///
/// `scope` is where names in the value resolve; it is used to recognize
/// attrs descriptor constructors through import aliases.
pub fn infer_assignment_type(system: &System, scope: ObjId, value: &Expr) -> Option<String> {
    if let Expr::Call { func, keywords, .. } = value {
        if is_attrs_constructor(system, scope, func) {
            return attrs_type(keywords);
        }
        return None;
    }
    infer_literal(value)
}

fn is_attrs_constructor(system: &System, scope: ObjId, func: &Expr) -> bool {
    let Some(dotted) = func.as_dotted_name() else {
        return false;
    };
    let expanded = system.expand_name(scope, &dotted);
    expanded == "attr.ib" || expanded == "attr.attrib"
}

/// `type=` as written (string literals unwrapped), else `default=`
/// inferred.
fn attrs_type(keywords: &[Keyword]) -> Option<String> {
    if let Some(kw) = keywords.iter().find(|k| k.arg.as_deref() == Some("type")) {
        return Some(annotation_text(&kw.value));
    }
    let default = keywords
        .iter()
        .find(|k| k.arg.as_deref() == Some("default"))?;
    infer_literal(&default.value)
}

/// Renders an annotation, unwrapping string literals recursively so
/// `'List["C"]'` displays as `List[C]`.
pub fn annotation_text(expr: &Expr) -> String {
    unstring_annotation(expr).to_source()
}

/// Replaces string literals in an annotation with their parsed content.
pub fn unstring_annotation(expr: &Expr) -> Expr {
    match expr {
        Expr::Str(text) => match parse_expr(text) {
            Ok(parsed) => unstring_annotation(&parsed),
            Err(_) => expr.clone(),
        },
        Expr::Subscript { value, index } => Expr::Subscript {
            value: Box::new(unstring_annotation(value)),
            index: Box::new(unstring_annotation(index)),
        },
        Expr::Tuple(elts) => Expr::Tuple(elts.iter().map(unstring_annotation).collect()),
        Expr::List(elts) => Expr::List(elts.iter().map(unstring_annotation).collect()),
        Expr::Attribute { value, attr } => Expr::Attribute {
            value: Box::new(unstring_annotation(value)),
            attr: attr.clone(),
        },
        _ => expr.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(source: &str) -> Expr {
        parse_expr(source).expect("parse")
    }

    #[test]
    fn scalar_literals() {
        assert_eq!(infer_literal(&value("'text'")), Some("str".to_string()));
        assert_eq!(infer_literal(&value("b'raw'")), Some("bytes".to_string()));
        assert_eq!(infer_literal(&value("True")), Some("bool".to_string()));
        assert_eq!(infer_literal(&value("4")), Some("int".to_string()));
        assert_eq!(infer_literal(&value("4.5")), Some("float".to_string()));
        assert_eq!(infer_literal(&value("1e3")), Some("float".to_string()));
        assert_eq!(infer_literal(&value("0x12")), Some("int".to_string()));
        assert_eq!(infer_literal(&value("3j")), None);
        assert_eq!(infer_literal(&value("None")), None);
    }

    #[test]
    fn container_literals() {
        assert_eq!(infer_literal(&value("[1, 2]")), Some("List[int]".to_string()));
        assert_eq!(infer_literal(&value("['a', 1]")), Some("List".to_string()));
        assert_eq!(infer_literal(&value("[]")), Some("List".to_string()));
        assert_eq!(infer_literal(&value("(1, 2)")), Some("Tuple[int, ...]".to_string()));
        assert_eq!(infer_literal(&value("{1, 2}")), Some("Set[int]".to_string()));
        assert_eq!(
            infer_literal(&value("{'a': 1, 'b': 2}")),
            Some("Dict[str, int]".to_string())
        );
        assert_eq!(infer_literal(&value("{'a': 1, 'b': 'x'}")), Some("Dict".to_string()));
        assert_eq!(infer_literal(&value("[[1], [2]]")), Some("List".to_string()));
    }

    #[test]
    fn names_and_calls_stay_untyped() {
        assert_eq!(infer_literal(&value("other")), None);
        assert_eq!(infer_literal(&value("f()")), None);
        assert_eq!(infer_literal(&value("[x for x in y]")), None);
    }

    #[test]
    fn annotations_unwrap_string_literals() {
        assert_eq!(annotation_text(&value("'List[\"C\"]'")), "List[C]");
        assert_eq!(annotation_text(&value("Dict[str, int]")), "Dict[str, int]");
        assert_eq!(annotation_text(&value("'int'")), "int");
    }
}
