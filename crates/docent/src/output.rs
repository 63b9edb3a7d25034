//! JSON model dump types and serialization.
//!
//! The dump is the CLI's machine-readable product: one record per entity,
//! in registration order, under a small envelope with the project name and
//! a generation timestamp. Fields that do not apply to an entity kind are
//! absent rather than null.

use serde::{Deserialize, Serialize};

use crate::model::{Obj, ObjData, PrivacyClass, System};

/// The toplevel JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDump {
    /// Project name from the options.
    pub project: String,
    /// Generation time, RFC 3339.
    pub generated: String,
    /// Every entity in the system, in registration order.
    pub entities: Vec<EntityDump>,
}

/// One documentable entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDump {
    /// Dotted name from the root.
    pub full_name: String,
    /// Display kind, e.g. `"Class Method"`.
    pub kind: String,
    pub name: String,
    pub privacy: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    /// Structured doc-field text for variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_text: Option<String>,
    /// Structured doc-field type for variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    /// Declared or inferred type expression for variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_expr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argspec: Option<ArgSpecDump>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub decorations: Vec<DecorationDump>,
    /// Expanded base-class names, in declaration order.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub bases: Vec<String>,
    /// Full names of registered subclasses.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub subclasses: Vec<String>,
    /// Directly declared interfaces.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub implements: Vec<String>,
    /// Full names of classes directly declaring this interface.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub implemented_by: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub is_async: bool,
}

/// Flattened parameter display for functions and methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgSpecDump {
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vararg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kwarg: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub defaults: Vec<String>,
}

/// One recorded decorator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecorationDump {
    pub raw: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expanded: Option<String>,
    pub line: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub hidden: bool,
}

impl ModelDump {
    /// Snapshots a processed system.
    pub fn from_system(system: &System) -> ModelDump {
        ModelDump {
            project: system.options.project_name.clone(),
            generated: chrono::Utc::now().to_rfc3339(),
            entities: system
                .iter()
                .map(|obj| EntityDump::from_obj(system, obj))
                .collect(),
        }
    }

    /// Renders the dump as pretty JSON with a trailing newline.
    pub fn render(&self) -> serde_json::Result<String> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }
}

impl EntityDump {
    fn from_obj(system: &System, obj: &Obj) -> EntityDump {
        let mut dump = EntityDump {
            full_name: system.full_name(obj.id),
            kind: obj.kind.as_str().to_string(),
            name: obj.name.clone(),
            privacy: match obj.privacy {
                PrivacyClass::Visible => "visible".to_string(),
                PrivacyClass::Private => "private".to_string(),
            },
            line: obj.line,
            docstring: obj.docstring.clone(),
            doc_text: None,
            doc_type: None,
            type_expr: None,
            argspec: None,
            decorations: Vec::new(),
            bases: Vec::new(),
            subclasses: Vec::new(),
            implements: Vec::new(),
            implemented_by: Vec::new(),
            is_async: false,
        };
        match &obj.data {
            ObjData::Class(data) => {
                dump.bases = data.bases.iter().map(|b| b.expanded.clone()).collect();
                dump.subclasses = data
                    .subclasses
                    .iter()
                    .map(|&id| system.full_name(id))
                    .collect();
                dump.implements = data.implements_directly.clone();
                dump.implemented_by = data
                    .implementedby_directly
                    .iter()
                    .map(|&id| system.full_name(id))
                    .collect();
                dump.decorations = data.decorations.iter().map(DecorationDump::from).collect();
            }
            ObjData::Function(data) => {
                dump.argspec = Some(ArgSpecDump {
                    args: data.argspec.args.clone(),
                    vararg: data.argspec.vararg.clone(),
                    kwarg: data.argspec.kwarg.clone(),
                    defaults: data.argspec.defaults.clone(),
                });
                dump.is_async = data.is_async;
                dump.decorations = data.decorations.iter().map(DecorationDump::from).collect();
            }
            ObjData::Variable(data) => {
                dump.type_expr = data.type_expr.clone();
                dump.doc_text = data.field_doc.clone();
                dump.doc_type = data.field_type.clone();
            }
            ObjData::Module(_) => {}
        }
        dump
    }
}

impl From<&crate::model::Decoration> for DecorationDump {
    fn from(deco: &crate::model::Decoration) -> DecorationDump {
        DecorationDump {
            raw: deco.raw.clone(),
            expanded: deco.expanded.clone(),
            line: deco.line,
            hidden: deco.hidden,
        }
    }
}
