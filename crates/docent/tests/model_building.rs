//! Scenario tests for the model builder: name resolution across modules,
//! docstring attachment, type inference and the entity graph.

use docent::model::{Kind, ObjData, PrivacyClass, System};
use docent::testing::{from_text, from_text_into, from_text_named};

#[test]
fn bases_resolve_in_declaration_order_with_backrefs() {
    let (system, module) = from_text("class C:\n    pass\nclass B:\n    pass\nclass D(C, B):\n    pass\n");
    let c = system.obj(module).get_member("C").expect("C");
    let b = system.obj(module).get_member("B").expect("B");
    let d = system.obj(module).get_member("D").expect("D");

    let bases: Vec<_> = system
        .obj(d)
        .class()
        .expect("class data")
        .bases
        .iter()
        .map(|base| base.resolved)
        .collect();
    assert_eq!(bases, vec![Some(c), Some(b)]);
    assert_eq!(system.obj(c).class().expect("class data").subclasses, vec![d]);
    assert_eq!(system.obj(b).class().expect("class data").subclasses, vec![d]);
}

#[test]
fn forward_references_resolve_in_phase_two() {
    // Module b uses a.C before module a exists in the system.
    let mut system = System::new();
    let b = from_text_into(&mut system, "from a import C\nclass D(C):\n    pass\n", "b");
    from_text_into(&mut system, "class C:\n    pass\n", "a");

    let d = system.obj(b).get_member("D").expect("D");
    let c = system.find("a.C").expect("a.C");
    let data = system.obj(d).class().expect("class data");
    assert_eq!(data.bases[0].expanded, "a.C");
    assert_eq!(data.bases[0].resolved, Some(c));
    assert_eq!(system.obj(c).class().expect("class data").subclasses, vec![d]);
}

#[test]
fn alias_chains_flatten_across_modules() {
    let mut system = System::new();
    from_text_into(&mut system, "class A:\n    pass\nB = A\n", "x");
    from_text_into(&mut system, "from x import B as C\n", "y");
    let z = from_text_into(&mut system, "from y import C as D\n", "z");

    assert_eq!(system.expand_name(z, "D"), "x.A");
    assert_eq!(system.resolve_name(z, "D"), system.find("x.A"));
}

#[test]
fn self_referential_rebinding_resolves_to_earlier_binding() {
    // `class A(A)` must bind the base to the previous A, which gets renamed.
    let (system, module) = from_text("class A:\n    pass\nclass A(A):\n    pass\n");
    let latest = system.obj(module).get_member("A").expect("A");
    let earlier = system.find("<test>.A 0").expect("renamed earlier A");
    let data = system.obj(latest).class().expect("class data");
    assert_eq!(data.bases[0].resolved, Some(earlier));
    assert_eq!(
        system.obj(earlier).class().expect("class data").subclasses,
        vec![latest]
    );
}

#[test]
fn wildcard_import_resolves_source_symbols() {
    let mut system = System::new();
    from_text_into(&mut system, "def f():\n    pass\n_hidden = 1\n", "a");
    let b = from_text_into(&mut system, "from a import *\n", "b");

    assert_eq!(system.expand_name(b, "f"), "a.f");
    // Underscore names are not wildcard-exported.
    assert_eq!(system.expand_name(b, "_hidden"), "_hidden");
}

#[test]
fn wildcard_respects_all_list() {
    let mut system = System::new();
    from_text_into(
        &mut system,
        "__all__ = ['pub']\ndef pub():\n    pass\ndef unlisted():\n    pass\n",
        "a",
    );
    let b = from_text_into(&mut system, "from a import *\n", "b");

    assert_eq!(system.expand_name(b, "pub"), "a.pub");
    assert_eq!(system.expand_name(b, "unlisted"), "unlisted");
}

#[test]
fn explicit_binding_beats_wildcard_candidate() {
    let mut system = System::new();
    from_text_into(&mut system, "def f():\n    pass\n", "a");
    let b = from_text_into(
        &mut system,
        "from a import *\ndef f():\n    pass\n",
        "b",
    );
    assert_eq!(system.expand_name(b, "f"), "b.f");
}

#[test]
fn resolution_is_idempotent_after_reprocessing() {
    let mut system = System::new();
    let b = from_text_into(&mut system, "from a import C\nclass D(C):\n    pass\n", "b");
    from_text_into(&mut system, "class C:\n    pass\n", "a");

    let first = system.expand_name(b, "C");
    system.finalize();
    assert_eq!(system.expand_name(b, "C"), first);
    assert_eq!(first, "a.C");
}

#[test]
fn trailing_string_documents_preceding_assignment_once() {
    let (system, module) = from_text("a = 1\n'doc for a'\nb = 2\n'doc for b'\nc = 3\nd = 4\n");
    let doc = |name: &str| {
        let id = system.obj(module).get_member(name).expect("member");
        system.obj(id).docstring.clone()
    };
    assert_eq!(doc("a").as_deref(), Some("doc for a"));
    assert_eq!(doc("b").as_deref(), Some("doc for b"));
    assert_eq!(doc("c"), None);
    assert_eq!(doc("d"), None);
}

#[test]
fn bare_string_without_preceding_assignment_is_discarded() {
    let (system, module) = from_text("x = 1\ndef f():\n    pass\n'stray text'\ny = 2\n");
    let y = system.obj(module).get_member("y").expect("y");
    assert_eq!(system.obj(y).docstring, None);
    let f = system.obj(module).get_member("f").expect("f");
    assert_eq!(system.obj(f).docstring, None);
}

#[test]
fn instance_variables_from_init_with_privacy() {
    let (system, _) = from_text(
        "class C:\n    def __init__(self):\n        self.a = 1\n        'doc for a'\n        self._b = 2\n        'doc for b'\n",
    );
    let a = system.find("<test>.C.a").expect("a");
    assert_eq!(system.obj(a).kind, Kind::InstanceVariable);
    assert_eq!(system.obj(a).docstring.as_deref(), Some("doc for a"));
    assert_eq!(system.obj(a).privacy, PrivacyClass::Visible);
    assert_eq!(
        system.obj(a).variable().expect("variable data").type_expr.as_deref(),
        Some("int")
    );

    let b = system.find("<test>.C._b").expect("_b");
    assert_eq!(system.obj(b).privacy, PrivacyClass::Private);
}

#[test]
fn instance_binding_upgrades_class_variable() {
    let (system, _) = from_text(
        "class C:\n    v = None\n    def __init__(self):\n        self.v = 3\n",
    );
    let v = system.find("<test>.C.v").expect("v");
    assert_eq!(system.obj(v).kind, Kind::InstanceVariable);
    assert_eq!(
        system.obj(v).variable().expect("variable data").type_expr.as_deref(),
        Some("int")
    );
}

#[test]
fn argspec_end_to_end() {
    let (system, _) = from_text("def f(a, b=3, *c, **kw):\n    pass\n");
    let f = system.find("<test>.f").expect("f");
    let spec = &system.obj(f).function().expect("function data").argspec;
    assert_eq!(spec.args, vec!["a", "b"]);
    assert_eq!(spec.vararg.as_deref(), Some("c"));
    assert_eq!(spec.kwarg.as_deref(), Some("kw"));
    assert_eq!(spec.defaults, vec!["3"]);
}

#[test]
fn module_doc_field_attaches_structured_text() {
    let (system, _) = from_text("'''Module intro.\n\n@var b: doc for b\n'''\nb = 2\n");
    let b = system.find("<test>.b").expect("b");
    assert_eq!(system.obj(b).docstring, None, "field text is not a plain docstring");
    let data = system.obj(b).variable().expect("variable data");
    assert_eq!(data.field_doc.as_deref(), Some("doc for b"));
}

#[test]
fn ivar_field_creates_and_classifies_member() {
    let (system, _) = from_text(
        "class C:\n    '''A class.\n\n    @ivar ghost: never assigned\n    @type ghost: C{str}\n    '''\n",
    );
    let ghost = system.find("<test>.C.ghost").expect("ghost");
    assert_eq!(system.obj(ghost).kind, Kind::InstanceVariable);
    let data = system.obj(ghost).variable().expect("variable data");
    assert_eq!(data.field_doc.as_deref(), Some("never assigned"));
    assert_eq!(data.field_type.as_deref(), Some("str"));
}

#[test]
fn doc_reassignment_forms() {
    let (system, module) = from_text(
        "import codecs\ndef f():\n    pass\ndef g():\n    pass\ndef h():\n    pass\n_text = 'held text'\nf.__doc__ = 'direct'\ng.__doc__ = codecs.encode('frperg', 'rot13')\nh.__doc__ = _text\n",
    );
    let doc = |name: &str| {
        let id = system.obj(module).get_member(name).expect("member");
        system.obj(id).docstring.clone()
    };
    assert_eq!(doc("f").as_deref(), Some("direct"));
    assert_eq!(doc("g").as_deref(), Some("secret"));
    assert_eq!(doc("h").as_deref(), Some("held text"));
    assert!(system.diagnostics.is_empty(), "{:?}", system.diagnostics);
}

#[test]
fn doc_reassignment_failures_emit_diagnostics_in_order() {
    let (system, module) = from_text(
        "def f():\n    pass\nf.__doc__ = 123\nf.__doc__ = mystery()\nmissing.__doc__ = 'text'\n",
    );
    let f = system.obj(module).get_member("f").expect("f");
    assert_eq!(system.obj(f).docstring, None);
    let messages: Vec<&str> = system
        .diagnostics
        .iter()
        .map(|d| d.message.as_str())
        .collect();
    assert_eq!(
        messages,
        vec![
            "Ignoring value assigned to __doc__: not a string",
            "Unable to figure out value for __doc__ assignment, maybe too complex",
            "Unable to figure out target for __doc__ assignment: computed full name not found: missing.__doc__",
        ]
    );
}

#[test]
fn module_doc_assignment_targets_the_module() {
    let (system, module) = from_text("__doc__ = 'assigned module doc'\n");
    assert_eq!(
        system.obj(module).docstring.as_deref(),
        Some("assigned module doc")
    );
}

#[test]
fn all_list_is_module_level_only() {
    let (system, module) = from_text("__all__ = ['a', 'b']\nclass C:\n    __all__ = ['c']\n");
    let data = system.obj(module).module().expect("module data");
    assert_eq!(
        data.all.as_deref(),
        Some(&["a".to_string(), "b".to_string()][..])
    );
    // Inside a class it is an ordinary class variable.
    let member = system.find("<test>.C.__all__").expect("class __all__");
    assert_eq!(system.obj(member).kind, Kind::ClassVariable);
}

#[test]
fn classmethod_by_decorator_and_by_rebinding() {
    let (system, _) = from_text(
        "class C:\n    @classmethod\n    def f(cls):\n        pass\n    def g(cls):\n        pass\n    g = classmethod(g)\n    @staticmethod\n    def h():\n        pass\n",
    );
    let kind = |name: &str| system.obj(system.find(&format!("<test>.C.{name}")).expect(name)).kind.clone();
    assert_eq!(kind("f"), Kind::ClassMethod);
    assert_eq!(kind("g"), Kind::ClassMethod);
    assert_eq!(kind("h"), Kind::StaticMethod);
}

#[test]
fn attrs_descriptor_inference() {
    let (system, _) = from_text(
        "import attr\n\nclass C:\n    x = attr.ib(type=int)\n    y = attr.attrib(type='C')\n    z = attr.ib(default=True)\n    w = attr.ib()\n",
    );
    let type_of = |name: &str| {
        let id = system.find(&format!("<test>.C.{name}")).expect(name);
        system.obj(id).variable().expect("variable data").type_expr.clone()
    };
    assert_eq!(type_of("x").as_deref(), Some("int"));
    assert_eq!(type_of("y").as_deref(), Some("C"));
    assert_eq!(type_of("z").as_deref(), Some("bool"));
    assert_eq!(type_of("w"), None);
}

#[test]
fn declared_annotation_beats_inferred_type() {
    let (system, module) = from_text("x: 'List[\"C\"]' = []\ny = {'a': 1}\nn = None\n");
    let type_of = |name: &str| {
        let id = system.obj(module).get_member(name).expect(name);
        system.obj(id).variable().expect("variable data").type_expr.clone()
    };
    assert_eq!(type_of("x").as_deref(), Some("List[C]"));
    assert_eq!(type_of("y").as_deref(), Some("Dict[str, int]"));
    assert_eq!(type_of("n"), None, "a bare None binding carries no type");
}

#[test]
fn dotted_value_assignment_binds_alias_not_variable() {
    let (system, module) = from_text("class A:\n    pass\nB = A\n");
    assert!(system.find("<test>.B").is_none(), "B is an alias, not an entity");
    assert_eq!(system.expand_name(module, "B"), "<test>.A");
}

#[test]
fn conditional_definitions_are_documented() {
    let (system, module) = from_text(
        "try:\n    import json\nexcept ImportError:\n    json = None\n\nif True:\n    def f():\n        'conditional'\nelse:\n    def g():\n        pass\n",
    );
    let f = system.obj(module).get_member("f").expect("f");
    assert_eq!(system.obj(f).docstring.as_deref(), Some("conditional"));
    assert!(system.obj(module).get_member("g").is_some());
}

#[test]
fn hidden_decorator_is_marked_but_recorded() {
    let (system, _) = from_text_named(
        "from twisted.python.deprecate import deprecated\n\n@deprecated(Version('Twisted', 8, 0, 0))\ndef f():\n    pass\n",
        "mod",
    );
    let f = system.find("mod.f").expect("f");
    let decorations = &system.obj(f).function().expect("function data").decorations;
    assert_eq!(decorations.len(), 1);
    assert!(decorations[0].hidden);
    assert_eq!(
        decorations[0].expanded.as_deref(),
        Some("twisted.python.deprecate.deprecated")
    );
    assert_eq!(decorations[0].raw, "deprecated(Version('Twisted', 8, 0, 0))");
}

#[test]
fn async_functions_are_flagged() {
    let (system, _) = from_text("async def f():\n    pass\n");
    let f = system.find("<test>.f").expect("f");
    assert!(system.obj(f).function().expect("function data").is_async);
}

#[test]
fn nested_package_names_qualify_members() {
    let mut system = System::new();
    let pkg = system.add_package("pkg", None, "").expect("parse");
    let sub = system.add_package("sub", Some(pkg), "").expect("parse");
    system
        .add_module("mod", Some(sub), "class C:\n    def m(self):\n        pass\n")
        .expect("parse");
    system.process_all();

    let m = system.find("pkg.sub.mod.C.m").expect("method");
    assert_eq!(system.obj(m).kind, Kind::Method);
    assert!(matches!(system.obj(pkg).data, ObjData::Module(_)));
}
