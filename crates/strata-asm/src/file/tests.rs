use std::sync::Arc;

use strata_identity::Version;

use super::*;
use crate::component::Composition;
use crate::constant::StaticLinkerContext;
use crate::diagnostics::{CollectingListener, VE_MODULE_MISSING};
use crate::errors::{AsmError, FormatError, StructureError, render_to_string};

fn v(text: &str) -> Version {
    Version::parse(text).unwrap()
}

/// `lib.example.org` with a parameterized class, a subclass, a method with
/// a default and two conditional bodies of `Impl`.
fn sample(options: AssemblerOptions) -> FileStructure {
    let mut file = FileStructure::new("lib.example.org", options);
    let module = file.module();
    let object = file.pool_mut().object_type();

    let util = file.create_package(module, "util", Access::Public).unwrap();
    let list = file.create_class(util, Format::Class, "List", Access::Public).unwrap();
    file.add_type_param(list, "Element", object).unwrap();
    let element = file.own_formal_params(list)[0];
    let add = file
        .create_method(list, "add", &[("value", element), ("at", object)], &[], Access::Public)
        .unwrap();
    file.set_default_count(add, 1).unwrap();
    file.create_property(list, "size", object, Access::Protected).unwrap();

    let sorted = file.create_class(util, Format::Class, "SortedList", Access::Public).unwrap();
    let list_type = file.formal_type(list);
    file.add_contribution(sorted, Composition::Extends, list_type).unwrap();

    let debug = file.pool_mut().ensure_named_condition("debug");
    let release = file.pool_mut().ensure_not_condition(debug);
    let first = file
        .create_conditional_class(module, Format::Class, "Impl", Access::Public, debug)
        .unwrap();
    file.create_conditional_class(module, Format::Class, "Impl", Access::Public, release)
        .unwrap();
    file.create_property(first, "trace", object, Access::Private).unwrap();
    file
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn eager_round_trip_keeps_the_tree() {
    let mut file = sample(AssemblerOptions::eager());
    let bytes = file.to_bytes().unwrap();
    let mut loaded = FileStructure::from_bytes(&bytes, AssemblerOptions::eager()).unwrap();

    assert_eq!(loaded.module_name(), "lib.example.org");
    assert_eq!(loaded.dump(), file.dump());
    let module = loaded.module();
    assert_eq!(loaded.child_names(module), vec!["util", "Impl"]);
}

#[test]
fn lazy_load_parses_on_first_access() {
    let mut file = sample(AssemblerOptions::default());
    let bytes = file.to_bytes().unwrap();
    let mut loaded = FileStructure::from_bytes(&bytes, AssemblerOptions::default()).unwrap();

    let module = loaded.module();
    assert!(loaded.has_unparsed_children(module));
    assert!(loaded.dump().contains("bytes not loaded"));

    let util = loaded.get_child(module, "util", None).single().unwrap();
    assert!(!loaded.has_unparsed_children(module));
    let sorted = loaded.get_child(util, "SortedList", None).single().unwrap();
    let list = loaded.super_class(sorted).unwrap();
    assert_eq!(loaded.own_type_params(list).len(), 1);
    assert_eq!(loaded.child_names(list), vec!["Element", "add", "size"]);
}

#[test]
fn reassembling_a_loaded_file_is_stable() {
    let mut file = sample(AssemblerOptions::default());
    let bytes = file.to_bytes().unwrap();
    let mut loaded = FileStructure::from_bytes(&bytes, AssemblerOptions::default()).unwrap();
    let again = loaded.to_bytes().unwrap();

    let first = FileStructure::from_bytes(&bytes, AssemblerOptions::eager()).unwrap();
    let second = FileStructure::from_bytes(&again, AssemblerOptions::eager()).unwrap();
    assert_eq!(first.dump(), second.dump());
}

#[test]
fn conditional_siblings_survive_a_round_trip() {
    let mut file = sample(AssemblerOptions::eager());
    let bytes = file.to_bytes().unwrap();
    let mut loaded = FileStructure::from_bytes(&bytes, AssemblerOptions::eager()).unwrap();
    let module = loaded.module();

    let all = loaded.get_child(module, "Impl", None);
    assert_eq!(all.ids().len(), 2);

    let debug = StaticLinkerContext::new().with_name("debug");
    let release = StaticLinkerContext::new();
    let in_debug = loaded.get_child(module, "Impl", Some(&debug)).single().unwrap();
    let in_release = loaded.get_child(module, "Impl", Some(&release)).single().unwrap();
    assert_ne!(in_debug, in_release);

    // both bodies share one child map
    assert_eq!(loaded.child_names(in_debug), vec!["trace"]);
    assert_eq!(loaded.child_names(in_release), vec!["trace"]);
}

#[test]
fn method_defaults_survive_a_round_trip() {
    let mut file = sample(AssemblerOptions::eager());
    let bytes = file.to_bytes().unwrap();
    let mut loaded = FileStructure::from_bytes(&bytes, AssemblerOptions::eager()).unwrap();
    let module = loaded.module();
    let util = loaded.get_child(module, "util", None).single().unwrap();
    let list = loaded.get_child(util, "List", None).single().unwrap();
    assert!(loaded.find_method(list, "add", 1).is_some());
    assert!(loaded.find_method(list, "add", 0).is_none());
}

// ============================================================================
// Malformed input
// ============================================================================

#[test]
fn bad_magic_is_rejected() {
    let mut bytes = sample(AssemblerOptions::default()).to_bytes().unwrap();
    bytes[0] ^= 0xFF;
    assert!(matches!(
        FileStructure::from_bytes(&bytes, AssemblerOptions::default()),
        Err(AsmError::Format(FormatError::BadMagic { .. }))
    ));
}

#[test]
fn rejected_file_renders_code_and_help() {
    let mut bytes = sample(AssemblerOptions::default()).to_bytes().unwrap();
    bytes[0] ^= 0xFF;
    let err = FileStructure::from_bytes(&bytes, AssemblerOptions::default()).unwrap_err();
    let rendered = render_to_string(&err);
    assert!(rendered.contains("A1001"));
    assert!(rendered.contains("0xEC57A5EE"));
}

#[test]
fn other_format_versions_are_rejected() {
    let mut bytes = sample(AssemblerOptions::default()).to_bytes().unwrap();
    bytes[4] = 1;
    assert!(matches!(
        FileStructure::from_bytes(&bytes, AssemblerOptions::default()),
        Err(AsmError::Format(FormatError::UnsupportedVersion { .. }))
    ));
}

#[test]
fn truncated_input_is_rejected() {
    let bytes = sample(AssemblerOptions::default()).to_bytes().unwrap();
    let short = &bytes[..bytes.len() - 1];
    assert!(matches!(
        FileStructure::from_bytes(short, AssemblerOptions::default()),
        Err(AsmError::Format(FormatError::UnexpectedEof { .. }))
    ));
    assert!(FileStructure::from_bytes(&bytes[..6], AssemblerOptions::default()).is_err());
}

#[test]
fn trailing_bytes_are_rejected() {
    let mut bytes = sample(AssemblerOptions::default()).to_bytes().unwrap();
    bytes.push(0);
    assert!(matches!(
        FileStructure::from_bytes(&bytes, AssemblerOptions::default()),
        Err(AsmError::Format(FormatError::TrailingBytes { count: 1, .. }))
    ));
}

#[test]
fn file_without_its_primary_module_is_rejected() {
    let mut file = sample(AssemblerOptions::default());
    let module = file.module();
    assert!(file.remove_child(module));
    let bytes = file.to_bytes().unwrap();
    assert!(matches!(
        FileStructure::from_bytes(&bytes, AssemblerOptions::default()),
        Err(AsmError::Format(FormatError::MissingPrimaryModule { .. }))
    ));
}

// ============================================================================
// Versions
// ============================================================================

#[test]
fn single_label_is_stored_as_the_module_version() {
    let mut file = sample(AssemblerOptions::default());
    file.label_module_version(&v("1.2")).unwrap();
    let bytes = file.to_bytes().unwrap();
    let loaded = FileStructure::from_bytes(&bytes, AssemblerOptions::default()).unwrap();

    assert!(loaded.is_versioned());
    assert!(loaded.contains_version(&v("1.2")));
    assert!(loaded.component(loaded.module()).condition().is_none());
}

#[test]
fn several_labels_survive_a_round_trip() {
    let mut file = sample(AssemblerOptions::default());
    file.label_module_version(&v("1.0")).unwrap();
    let mut other = FileStructure::new("lib.example.org", AssemblerOptions::default());
    other.label_module_version(&v("2.1")).unwrap();
    file.merge_versions(&other).unwrap();

    let bytes = file.to_bytes().unwrap();
    let loaded = FileStructure::from_bytes(&bytes, AssemblerOptions::default()).unwrap();
    assert_eq!(loaded.versions().count(), 2);
    assert!(loaded.contains_version(&v("1.0")));
    assert!(loaded.contains_version(&v("2.1")));
    assert!(loaded.component(loaded.module()).condition().is_some());
}

// ============================================================================
// Linking
// ============================================================================

fn library(name: &str, class: &str, depends_on: &[&str]) -> FileStructure {
    let mut file = FileStructure::new(name, AssemblerOptions::default());
    let module = file.module();
    file.create_class(module, Format::Class, class, Access::Public).unwrap();
    for dependency in depends_on {
        file.create_fingerprint(dependency, None).unwrap();
    }
    file
}

#[test]
fn runtime_link_grafts_dependencies() {
    let mut repository = InMemoryRepository::new();
    repository.store(library("lib.example.org", "Helper", &["base.example.org"]));
    repository.store(library("base.example.org", "Root", &[]));

    let mut app = library("app.example.org", "Main", &["lib.example.org", "base.example.org"]);
    assert_eq!(app.link_modules(&repository, true), None);
    assert!(app.is_linked());

    let lib = app.module_named("lib.example.org").unwrap();
    assert_eq!(
        app.component(lib).as_module().map(|m| m.module_type),
        Some(ModuleType::Embedded)
    );
    assert!(app.get_child(lib, "Helper", None).is_some());
    let base = app.module_named("base.example.org").unwrap();
    assert!(app.get_child(base, "Root", None).is_some());

    // the grafted tree is part of this file now
    let bytes = app.to_bytes().unwrap();
    let mut loaded = FileStructure::from_bytes(&bytes, AssemblerOptions::eager()).unwrap();
    let lib = loaded.module_named("lib.example.org").unwrap();
    assert_eq!(loaded.child_names(lib), vec!["Helper"]);
}

#[test]
fn runtime_link_needs_every_fingerprint_up_front() {
    let mut repository = InMemoryRepository::new();
    repository.store(library("lib.example.org", "Helper", &["base.example.org"]));
    repository.store(library("base.example.org", "Root", &[]));

    let mut app = library("app.example.org", "Main", &["lib.example.org"]);
    assert_eq!(
        app.link_modules(&repository, true),
        Some("base.example.org".to_string())
    );
    assert!(!app.is_linked());
}

#[test]
fn compile_link_records_origins() {
    let mut repository = InMemoryRepository::new();
    let lib_file = repository.store(library("lib.example.org", "Helper", &["base.example.org"]));
    let base_file = repository.store(library("base.example.org", "Root", &[]));

    let mut app = library("app.example.org", "Main", &["lib.example.org"]);
    assert_eq!(app.link_modules(&repository, false), None);

    let lib = app.module_named("lib.example.org").unwrap();
    assert!(Arc::ptr_eq(app.fingerprint_origin(lib).unwrap(), &lib_file));
    // a transitive dependency gains a fingerprint of its own
    let base = app.module_named("base.example.org").unwrap();
    assert!(Arc::ptr_eq(app.fingerprint_origin(base).unwrap(), &base_file));
    assert_eq!(
        app.component(base).as_module().map(|m| m.module_type),
        Some(ModuleType::Fingerprint)
    );
    assert!(app.pool().is_valid_pool(base_file.lock().unwrap().pool().id()));
}

#[test]
fn missing_module_is_named_and_reported() {
    let handle = CollectingListener::default();
    let repository = InMemoryRepository::new();
    let mut app = library("app.example.org", "Main", &["gone.example.org"]);
    app.set_error_listener(Box::new(handle.clone()));

    assert_eq!(
        app.link_modules(&repository, false),
        Some("gone.example.org".to_string())
    );
    assert!(handle.has_code(VE_MODULE_MISSING));
}

#[test]
fn repository_picks_a_supporting_version() {
    let mut repository = InMemoryRepository::new();
    let mut old = library("lib.example.org", "Helper", &[]);
    old.label_module_version(&v("1.0")).unwrap();
    let mut new = library("lib.example.org", "Helper", &[]);
    new.label_module_version(&v("2.0")).unwrap();
    let old = repository.store(old);
    let new = repository.store(new);

    let latest = repository.load_module("lib.example.org", None).unwrap();
    assert!(Arc::ptr_eq(&latest, &new));
    let pinned = repository.load_module("lib.example.org", Some(&v("1.0"))).unwrap();
    assert!(Arc::ptr_eq(&pinned, &old));
    assert!(repository.load_module("lib.example.org", Some(&v("3.0"))).is_none());
    assert_eq!(repository.module_names(), vec!["lib.example.org"]);
}

// ============================================================================
// Temporary replacement
// ============================================================================

#[test]
fn temporary_copy_takes_the_original_place() {
    let mut file = sample(AssemblerOptions::default());
    let module = file.module();
    let util = file.get_child(module, "util", None).single().unwrap();
    let list = file.get_child(util, "List", None).single().unwrap();

    let copy = file.replace_with_temporary(list).unwrap();
    assert_eq!(file.get_child(util, "List", None).single(), Some(copy));
    assert_eq!(file.component(list).parent(), None);
    assert_eq!(file.child_names(copy), vec!["Element", "add", "size"]);

    assert!(matches!(
        file.replace_with_temporary(list),
        Err(StructureError::Detached { .. })
    ));
    assert_eq!(
        file.replace_with_temporary(module),
        Err(StructureError::PrimaryModule)
    );
}
