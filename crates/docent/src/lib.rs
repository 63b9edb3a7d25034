//! Docent - a static documentation model extractor for Python packages.
//!
//! Docent parses Python source trees without importing them and builds a
//! registry of documentable entities: modules, packages, classes,
//! functions, variables and their relationships. The registry is the
//! input a documentation renderer would consume.
//!
//! ## Modules
//!
//! - `model` - the entity registry (`System`) and name resolution
//! - `builder` - the statement walker populating a system
//! - `infer` - literal type inference and annotation handling
//! - `docfields` - docstring cleanup and `@var`-style field extraction
//! - `zope` - recognizers for zope.interface / zope.schema idioms
//! - `discover` - filesystem discovery of modules and packages
//! - `output` - the JSON model dump
//! - `testing` - source-text helpers for building systems in tests
//!
//! ## Quick Start
//!
//! ```
//! use docent::testing::from_text;
//!
//! let (system, _module) = from_text("class C:\n    \"A class.\"\n");
//! let cls = system.find("<test>.C").expect("registered");
//! assert_eq!(system.obj(cls).docstring.as_deref(), Some("A class."));
//! ```

pub mod builder;
pub mod discover;
pub mod docfields;
pub mod error;
pub mod infer;
pub mod model;
pub mod output;
pub mod testing;
pub mod zope;

pub use builder::{Builder, BuilderExtension, NullExtension};
pub use error::{Error, Result};
pub use model::{Kind, ObjId, PrivacyClass, ProcessingState, System};
pub use zope::ZopeInterfaceExtension;
