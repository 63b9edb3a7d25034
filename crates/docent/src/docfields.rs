//! Docstring field extraction.
//!
//! When a module or class scope closes, its docstring is scanned for
//! `@var`/`@ivar`/`@cvar`/`@type <name>: <text>` fields. Field text fills
//! the named variable's structured doc slots; `@ivar` and `@cvar` force
//! the variable kind; `@type` supplies the displayed type. Fields never
//! overwrite an inline docstring, and a field naming an undeclared
//! variable creates it.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{Kind, ObjData, ObjId, System};

static FIELD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@(var|ivar|cvar|type)\s+([A-Za-z_][A-Za-z0-9_]*)\s*:\s*(.*)$").unwrap()
});

static INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"C\{([^}]*)\}").unwrap());

/// Which field introduced a piece of structured doc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Var,
    IVar,
    CVar,
    Type,
}

/// One parsed docstring field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocField {
    pub kind: FieldKind,
    pub name: String,
    pub text: String,
}

/// Normalizes a docstring: the first line loses its leading whitespace,
/// later lines lose the common indentation margin, and blank edges are
/// trimmed.
pub fn cleandoc(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut margin = usize::MAX;
    for line in lines.iter().skip(1) {
        let trimmed = line.trim_start();
        if !trimmed.is_empty() {
            margin = margin.min(line.len() - trimmed.len());
        }
    }
    let mut out: Vec<String> = Vec::new();
    if let Some(first) = lines.first() {
        out.push(first.trim_start().to_string());
    }
    for line in lines.iter().skip(1) {
        if margin == usize::MAX || line.len() <= margin {
            out.push(line.trim_start().to_string());
        } else {
            out.push(line[margin..].to_string());
        }
    }
    while out.first().is_some_and(|l| l.is_empty()) {
        out.remove(0);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

/// Extracts fields from a cleaned docstring. A field's text continues
/// over following indented lines.
pub fn parse_fields(cleaned: &str) -> Vec<DocField> {
    let mut fields: Vec<DocField> = Vec::new();
    for line in cleaned.lines() {
        if let Some(caps) = FIELD_LINE.captures(line) {
            let kind = match &caps[1] {
                "ivar" => FieldKind::IVar,
                "cvar" => FieldKind::CVar,
                "type" => FieldKind::Type,
                _ => FieldKind::Var,
            };
            fields.push(DocField {
                kind,
                name: caps[2].to_string(),
                text: caps[3].trim().to_string(),
            });
        } else if line.starts_with(char::is_whitespace) && !line.trim().is_empty() {
            if let Some(field) = fields.last_mut() {
                if !field.text.is_empty() {
                    field.text.push(' ');
                }
                field.text.push_str(line.trim());
            }
        }
    }
    fields
}

/// Reduces epytext `C{...}` markup to its content.
fn strip_inline_code(text: &str) -> String {
    INLINE_CODE.replace_all(text, "$1").into_owned()
}

/// Applies an owner's docstring fields to its member variables, creating
/// any that the fields name but the body never bound.
pub fn apply_fields(system: &mut System, owner: ObjId) {
    let Some(doc) = system.obj(owner).docstring.clone() else {
        return;
    };
    let owner_is_class = matches!(system.obj(owner).data, ObjData::Class(_));
    let owner_line = system.obj(owner).line;
    for field in parse_fields(&cleandoc(&doc)) {
        let member = match system.obj(owner).get_member(&field.name) {
            Some(id) if system.obj(id).kind.is_variable() => id,
            Some(_) => continue,
            None => {
                let kind = match field.kind {
                    FieldKind::IVar => Kind::InstanceVariable,
                    FieldKind::CVar => Kind::ClassVariable,
                    _ if owner_is_class => Kind::ClassVariable,
                    _ => Kind::Variable,
                };
                system.add_object(Some(owner), kind, &field.name, owner_line)
            }
        };
        match field.kind {
            FieldKind::IVar => system.obj_mut(member).kind = Kind::InstanceVariable,
            FieldKind::CVar => system.obj_mut(member).kind = Kind::ClassVariable,
            _ => {}
        }
        let obj = system.obj_mut(member);
        if let Some(data) = obj.variable_mut() {
            match field.kind {
                FieldKind::Type => data.field_type = Some(strip_inline_code(&field.text)),
                _ => data.field_doc = Some(field.text),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleandoc_strips_common_margin() {
        let doc = "Summary.\n\n    Indented body.\n      Deeper.\n";
        assert_eq!(cleandoc(doc), "Summary.\n\nIndented body.\n  Deeper.");
    }

    #[test]
    fn cleandoc_trims_blank_edges() {
        assert_eq!(cleandoc("\n\n  text\n\n"), "text");
    }

    #[test]
    fn fields_parse_with_kinds() {
        let fields = parse_fields("Intro line.\n@ivar foo: doc for foo\n@type foo: C{str}\n@cvar bar: shared\n");
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].kind, FieldKind::IVar);
        assert_eq!(fields[0].name, "foo");
        assert_eq!(fields[0].text, "doc for foo");
        assert_eq!(fields[1].kind, FieldKind::Type);
        assert_eq!(fields[2].kind, FieldKind::CVar);
    }

    #[test]
    fn field_text_continues_over_indented_lines() {
        let fields = parse_fields("@var x: first part\n    second part\n@var y: other\n");
        assert_eq!(fields[0].text, "first part second part");
        assert_eq!(fields[1].text, "other");
    }

    #[test]
    fn inline_code_markup_reduces() {
        assert_eq!(strip_inline_code("C{List[str]} or C{None}"), "List[str] or None");
    }
}
