use strata_identity::{ComponentId, ConstantId};

use super::Relation;
use crate::access::Access;
use crate::component::{Composition, Format, ResolutionResult, SimpleCollector};
use crate::diagnostics::{CollectingListener, Severity, VE_CYCLICAL_CONTRIBUTION, VE_TOO_MANY_TYPE_PARAMS};
use crate::errors::StructureError;
use crate::file::FileStructure;
use crate::options::{AssemblerOptions, DEFAULT_CORE_MODULE};

/// A core module with `Object`, `String`, `collections.Tuple`, a producer
/// `Box<T>` and a consumer `Sink<T>`.
struct Core {
    file: FileStructure,
    string: ConstantId,
    boxed: ComponentId,
    sink: ComponentId,
    tuple: ComponentId,
}

impl Core {
    fn new() -> Self {
        let mut file = FileStructure::new(DEFAULT_CORE_MODULE, AssemblerOptions::default());
        let module = file.module();
        file.create_class(module, Format::Class, "Object", Access::Public).unwrap();
        let string = file.create_class(module, Format::Const, "String", Access::Public).unwrap();
        let collections = file.create_package(module, "collections", Access::Public).unwrap();
        let tuple = file
            .create_class(collections, Format::Interface, "Tuple", Access::Public)
            .unwrap();

        let object = file.pool_mut().object_type();
        let boxed = file.create_class(module, Format::Class, "Box", Access::Public).unwrap();
        file.add_type_param(boxed, "T", object).unwrap();
        let t = file.own_formal_params(boxed)[0];
        file.create_method(boxed, "get", &[], &[t], Access::Public).unwrap();

        let sink = file.create_class(module, Format::Class, "Sink", Access::Public).unwrap();
        file.add_type_param(sink, "T", object).unwrap();
        let t = file.own_formal_params(sink)[0];
        file.create_method(sink, "put", &[("value", t)], &[], Access::Public).unwrap();

        let string = file.formal_type(string);
        Core {
            file,
            string,
            boxed,
            sink,
            tuple,
        }
    }

    fn object(&mut self) -> ConstantId {
        self.file.pool_mut().object_type()
    }

    fn class_of(&mut self, class: ComponentId, params: &[ConstantId]) -> ConstantId {
        let identity = self.file.component(class).identity();
        self.file.pool_mut().ensure_class_type(identity, params)
    }
}

// ============================================================================
// Relation ordering
// ============================================================================

#[test]
fn relation_combinators_follow_the_order() {
    assert!(Relation::Incompatible < Relation::IsAWeak);
    assert!(Relation::IsAWeak < Relation::IsA);
    assert_eq!(Relation::IsA.worst_of(Relation::IsAWeak), Relation::IsAWeak);
    assert_eq!(Relation::Incompatible.best_of(Relation::IsAWeak), Relation::IsAWeak);
    assert!(Relation::IsAWeak.is_assignable());
    assert!(!Relation::Incompatible.is_assignable());
    assert_eq!(Relation::IsAWeak.to_string(), "is-a (weak)");
}

// ============================================================================
// Assignability and variance
// ============================================================================

#[test]
fn everything_is_an_object() {
    let mut core = Core::new();
    let object = core.object();
    let string = core.string;
    assert!(core.file.is_a(string, object));
    assert!(!core.file.is_a(object, string));
    assert!(core.file.is_a(string, string));
}

#[test]
fn producer_is_covariant() {
    let mut core = Core::new();
    let object = core.object();
    let string = core.string;
    let box_object = core.class_of(core.boxed, &[object]);
    let box_string = core.class_of(core.boxed, &[string]);

    let boxed = core.boxed;
    assert!(core.file.produces_formal_type(boxed, "T", Access::Public));
    assert!(!core.file.consumes_formal_type(boxed, "T", Access::Public));
    assert_eq!(core.file.calculate_type_relation(box_object, box_string), Relation::IsA);
    assert_eq!(core.file.calculate_type_relation(box_string, box_object), Relation::Incompatible);
}

#[test]
fn consumer_is_contravariant() {
    let mut core = Core::new();
    let object = core.object();
    let string = core.string;
    let sink_object = core.class_of(core.sink, &[object]);
    let sink_string = core.class_of(core.sink, &[string]);

    let sink = core.sink;
    assert!(core.file.consumes_formal_type(sink, "T", Access::Public));
    assert!(!core.file.produces_formal_type(sink, "T", Access::Public));
    assert_eq!(core.file.calculate_type_relation(sink_string, sink_object), Relation::IsA);
    assert_eq!(core.file.calculate_type_relation(sink_object, sink_string), Relation::Incompatible);
}

#[test]
fn identical_actuals_are_assignable() {
    let mut core = Core::new();
    let string = core.string;
    let sink = core.sink;
    assert_eq!(
        core.file.calculate_assignability(sink, &[string], Access::Public, &[string]),
        Relation::IsA
    );
}

#[test]
fn shorter_tuple_accepts_longer_one() {
    let mut core = Core::new();
    let string = core.string;
    let pair = core.class_of(core.tuple, &[string, string]);
    let triple = core.class_of(core.tuple, &[string, string, string]);

    let tuple = core.tuple;
    assert!(core.file.is_tuple(tuple));
    assert!(core.file.calculate_type_relation(pair, triple).is_assignable());
    assert_eq!(core.file.calculate_type_relation(triple, pair), Relation::Incompatible);
}

#[test]
fn too_many_type_params_are_reported() {
    let mut core = Core::new();
    let handle = CollectingListener::new(Severity::Fatal);
    core.file.set_error_listener(Box::new(handle.clone()));
    let string = core.string;
    let boxed = core.boxed;

    let relation = core
        .file
        .calculate_assignability(boxed, &[string, string], Access::Public, &[string]);
    assert_eq!(relation, Relation::Incompatible);
    assert!(handle.has_code(VE_TOO_MANY_TYPE_PARAMS));
    assert_eq!(handle.worst_severity(), Severity::Warning);
}

#[test]
fn union_on_the_left_takes_the_best_part() {
    let mut core = Core::new();
    let string = core.string;
    let box_string = core.class_of(core.boxed, &[string]);
    let union = core.file.pool_mut().ensure_union_type(box_string, string);
    assert!(core.file.is_a(string, union));
    assert!(core.file.is_a(box_string, union));
}

#[test]
fn extends_chain_is_followed() {
    let mut core = Core::new();
    let module = core.file.module();
    let base = core
        .file
        .create_class(module, Format::Class, "Base", Access::Public)
        .unwrap();
    let derived = core
        .file
        .create_class(module, Format::Class, "Derived", Access::Public)
        .unwrap();
    let base_type = core.file.formal_type(base);
    core.file
        .add_contribution(derived, Composition::Extends, base_type)
        .unwrap();
    let derived_type = core.file.formal_type(derived);

    assert!(core.file.is_a(derived_type, base_type));
    assert!(!core.file.is_a(base_type, derived_type));
    assert_eq!(core.file.super_class(derived), Some(base));
    let base_identity = core.file.component(base).identity();
    assert!(core.file.extends_class(derived, base_identity));
    assert!(core.file.has_contribution(derived, base_identity));
}

// ============================================================================
// Generics
// ============================================================================

#[test]
fn formal_and_canonical_types_are_cached() {
    let mut core = Core::new();
    let boxed = core.boxed;
    let object = core.object();

    let formals = core.file.own_formal_params(boxed);
    let expected_formal = core.class_of(boxed, &formals);
    assert_eq!(core.file.formal_type(boxed), expected_formal);
    assert_eq!(core.file.formal_type(boxed), expected_formal);

    let expected_canonical = core.class_of(boxed, &[object]);
    assert_eq!(core.file.canonical_type(boxed), expected_canonical);
    assert!(core.file.is_parameterized(boxed));
    assert_eq!(core.file.index_of_generic_parameter(boxed, "T"), Some(0));
    assert_eq!(core.file.index_of_generic_parameter(boxed, "U"), None);
}

#[test]
fn missing_actuals_default_to_constraints() {
    let mut core = Core::new();
    let boxed = core.boxed;
    let object = core.object();
    let string = core.string;

    assert_eq!(core.file.normalize_parameters(boxed, &[]), vec![object]);
    let resolved = core.file.resolve_generics(boxed, &[string]);
    let expected = core.class_of(boxed, &[string]);
    assert_eq!(resolved, expected);
}

#[test]
fn tuple_canonical_type_is_bare() {
    let mut core = Core::new();
    let tuple = core.tuple;
    let identity = core.file.component(tuple).identity();
    let bare = core.file.pool_mut().ensure_terminal_type(identity);
    assert_eq!(core.file.canonical_type(tuple), bare);
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn find_method_counts_defaults() {
    let mut core = Core::new();
    let module = core.file.module();
    let object = core.object();
    let list = core
        .file
        .create_class(module, Format::Class, "List", Access::Public)
        .unwrap();
    let add = core
        .file
        .create_method(list, "add", &[("value", object), ("index", object)], &[], Access::Public)
        .unwrap();
    core.file.set_default_count(add, 1).unwrap();

    assert_eq!(core.file.find_method(list, "add", 2), Some(add));
    assert_eq!(core.file.find_method(list, "add", 1), Some(add));
    assert_eq!(core.file.find_method(list, "add", 0), None);
    assert_eq!(core.file.find_method(list, "add", 3), None);
    assert_eq!(core.file.find_method(list, "remove", 1), None);
}

#[test]
fn mixin_into_defaults_to_object() {
    let mut core = Core::new();
    let module = core.file.module();
    let mixin = core
        .file
        .create_class(module, Format::Mixin, "Tagged", Access::Public)
        .unwrap();
    let object = core.object();
    assert_eq!(core.file.type_into(mixin), Ok(object));

    let boxed = core.boxed;
    assert!(matches!(
        core.file.type_into(boxed),
        Err(StructureError::WrongFormat { expected: "mixin", .. })
    ));
}

#[test]
fn enums_rebase_natively() {
    let mut core = Core::new();
    let module = core.file.module();
    let color = core
        .file
        .create_class(module, Format::Enum, "Color", Access::Public)
        .unwrap();
    assert!(core.file.rebase_type(color).is_some());
    let boxed = core.boxed;
    assert_eq!(core.file.rebase_type(boxed), None);
}

#[test]
fn nested_class_of_a_class_is_virtual() {
    let mut core = Core::new();
    let boxed = core.boxed;
    let inner = core
        .file
        .create_class(boxed, Format::Class, "Entry", Access::Public)
        .unwrap();
    assert!(core.file.is_virtual_child(inner));
    assert!(!core.file.is_virtual_child(boxed));
    // the virtual child sees the parent's parameters first
    assert_eq!(core.file.type_params(inner).len(), 1);
    assert!(core.file.own_type_params(inner).is_empty());
}

#[test]
fn cyclical_implements_is_an_error() {
    let mut core = Core::new();
    let handle = CollectingListener::default();
    core.file.set_error_listener(Box::new(handle.clone()));
    let module = core.file.module();
    let a = core
        .file
        .create_class(module, Format::Interface, "A", Access::Public)
        .unwrap();
    let b = core
        .file
        .create_class(module, Format::Interface, "B", Access::Public)
        .unwrap();
    let a_type = core.file.formal_type(a);
    let b_type = core.file.formal_type(b);
    core.file.add_contribution(a, Composition::Implements, b_type).unwrap();
    core.file.add_contribution(b, Composition::Implements, a_type).unwrap();

    let mut collector = SimpleCollector::new();
    let result = core.file.resolve_name(a, "missing", Access::Public, &mut collector);
    assert_eq!(result, ResolutionResult::Error);
    assert!(handle.has_code(VE_CYCLICAL_CONTRIBUTION));
}

#[test]
fn mixin_reentered_without_into_is_no_cycle() {
    let mut core = Core::new();
    let handle = CollectingListener::default();
    core.file.set_error_listener(Box::new(handle.clone()));
    let module = core.file.module();
    let base = core
        .file
        .create_class(module, Format::Mixin, "Base", Access::Public)
        .unwrap();
    let mixin = core
        .file
        .create_class(module, Format::Mixin, "Logging", Access::Public)
        .unwrap();
    let host = core
        .file
        .create_class(module, Format::Class, "Host", Access::Public)
        .unwrap();
    let base_type = core.file.formal_type(base);
    let mixin_type = core.file.formal_type(mixin);
    let host_type = core.file.formal_type(host);
    core.file.add_contribution(mixin, Composition::Into, host_type).unwrap();
    core.file.add_contribution(mixin, Composition::Extends, base_type).unwrap();
    core.file.add_incorporates(host, mixin_type, Vec::new()).unwrap();

    let mut collector = SimpleCollector::new();
    let result = core.file.resolve_name(mixin, "missing", Access::Public, &mut collector);
    assert_eq!(result, ResolutionResult::Unknown);
    assert!(!handle.has_code(VE_CYCLICAL_CONTRIBUTION));
}

#[test]
fn name_found_through_a_contribution() {
    let mut core = Core::new();
    let module = core.file.module();
    let object = core.object();
    let base = core
        .file
        .create_class(module, Format::Class, "Base", Access::Public)
        .unwrap();
    let size = core
        .file
        .create_property(base, "size", object, Access::Public)
        .unwrap();
    let derived = core
        .file
        .create_class(module, Format::Class, "Derived", Access::Public)
        .unwrap();
    let base_type = core.file.formal_type(base);
    core.file
        .add_contribution(derived, Composition::Extends, base_type)
        .unwrap();

    let mut collector = SimpleCollector::new();
    let result = core.file.resolve_name(derived, "size", Access::Public, &mut collector);
    assert_eq!(result, ResolutionResult::Resolved);
    assert_eq!(collector.component.and_then(|c| c.single()), Some(size));
}
