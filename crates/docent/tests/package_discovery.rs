//! End-to-end tests over on-disk package trees, through the same surface
//! the CLI uses.

use std::fs;
use std::path::Path;

use docent::discover::add_tree;
use docent::model::{Kind, System};
use docent::output::ModelDump;

fn write(path: &Path, text: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, text).expect("write");
}

#[test]
fn relative_imports_resolve_inside_a_package() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("pkg");
    write(&root.join("__init__.py"), "from .mod import Thing\n");
    write(&root.join("mod.py"), "class Thing:\n    '''A thing.'''\n");
    write(
        &root.join("sub/__init__.py"),
        "from ..mod import Thing as Base\n\nclass Sub(Base):\n    pass\n",
    );

    let mut system = System::new();
    add_tree(&mut system, &root).expect("add");
    system.process_all();

    let pkg = system.find("pkg").expect("pkg");
    assert_eq!(system.expand_name(pkg, "Thing"), "pkg.mod.Thing");

    let sub = system.find("pkg.sub.Sub").expect("Sub");
    let thing = system.find("pkg.mod.Thing").expect("Thing");
    let data = system.obj(sub).class().expect("class data");
    assert_eq!(data.bases[0].expanded, "pkg.mod.Thing");
    assert_eq!(data.bases[0].resolved, Some(thing));
}

#[test]
fn cross_module_docs_survive_discovery_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("proj");
    // `aa` sorts before `zz`, but `aa` depends on `zz`.
    write(&root.join("__init__.py"), "");
    write(
        &root.join("aa.py"),
        "from proj.zz import Late\n\nclass Early(Late):\n    pass\n",
    );
    write(&root.join("zz.py"), "class Late:\n    pass\n");

    let mut system = System::new();
    add_tree(&mut system, &root).expect("add");
    system.process_all();

    let early = system.find("proj.aa.Early").expect("Early");
    let late = system.find("proj.zz.Late").expect("Late");
    assert_eq!(
        system.obj(early).class().expect("class data").bases[0].resolved,
        Some(late)
    );
    assert_eq!(
        system.obj(late).class().expect("class data").subclasses,
        vec![early]
    );
}

#[test]
fn diagnostics_carry_source_paths() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("pkg");
    write(&root.join("__init__.py"), "");
    write(
        &root.join("mod.py"),
        "def f():\n    pass\nf.__doc__ = mystery()\n",
    );

    let mut system = System::new();
    add_tree(&mut system, &root).expect("add");
    system.process_all();

    assert_eq!(system.diagnostics.len(), 1);
    let rendered = system.diagnostics[0].to_string();
    assert!(rendered.ends_with(
        "mod.py:3: Unable to figure out value for __doc__ assignment, maybe too complex"
    ), "{rendered}");
}

#[test]
fn dump_of_a_discovered_tree_is_stable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("pkg");
    write(&root.join("__init__.py"), "'''Top docs.'''\n");
    write(
        &root.join("mod.py"),
        "class C:\n    def m(self):\n        pass\n",
    );

    let mut system = System::new();
    system.options.project_name = "example".to_string();
    add_tree(&mut system, &root).expect("add");
    system.process_all();

    let dump = ModelDump::from_system(&system);
    assert_eq!(dump.project, "example");
    let names: Vec<&str> = dump.entities.iter().map(|e| e.full_name.as_str()).collect();
    assert_eq!(names, vec!["pkg", "pkg.mod", "pkg.mod.C", "pkg.mod.C.m"]);
    assert_eq!(dump.entities[0].kind, "Package");
    assert_eq!(dump.entities[0].docstring.as_deref(), Some("Top docs."));
    assert_eq!(dump.entities[3].kind, "Method");

    let second = ModelDump::from_system(&system);
    let first_names: Vec<&str> = dump.entities.iter().map(|e| e.full_name.as_str()).collect();
    let second_names: Vec<&str> = second.entities.iter().map(|e| e.full_name.as_str()).collect();
    assert_eq!(first_names, second_names);
}

#[test]
fn kinds_round_trip_through_discovery() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("single.py");
    write(
        &file,
        "v = 1\n\nclass C:\n    cv = 2\n    def __init__(self):\n        self.iv = 3\n",
    );

    let mut system = System::new();
    add_tree(&mut system, &file).expect("add");
    system.process_all();

    let kind = |name: &str| system.obj(system.find(name).expect(name)).kind.clone();
    assert_eq!(kind("single.v"), Kind::Variable);
    assert_eq!(kind("single.C.cv"), Kind::ClassVariable);
    assert_eq!(kind("single.C.iv"), Kind::InstanceVariable);
}
