// tests/scenarios.rs
//! End-to-end scenarios over the public API: building a core module,
//! asking the relation engine about it and moving it through a file.

use std::fs;

use strata_asm::component::VirtualSuperResult;
use strata_asm::diagnostics::{VE_CYCLICAL_CONTRIBUTION, VE_TOO_MANY_TYPE_PARAMS};
use strata_asm::{
    Access, AsmError, AssemblerOptions, ChildLookup, CollectingListener, ComponentId, Composition, ConstantId,
    DEFAULT_CORE_MODULE, FileStructure, Format, FormatError, Relation, ResolutionResult,
    SimpleCollector, StaticLinkerContext, Version,
};
use tracing_subscriber::EnvFilter;

/// Logs go to the test writer when RUST_LOG is set.
fn init_tracing() {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }
}

struct Core {
    file: FileStructure,
    object: ConstantId,
    string: ConstantId,
    boxed: ComponentId,
    sink: ComponentId,
    tuple: ComponentId,
}

impl Core {
    fn new(options: AssemblerOptions) -> Self {
        init_tracing();
        let mut file = FileStructure::new(DEFAULT_CORE_MODULE, options);
        let module = file.module();
        file.create_class(module, Format::Class, "Object", Access::Public)
            .expect("Object");
        let string = file
            .create_class(module, Format::Const, "String", Access::Public)
            .expect("String");
        let collections = file
            .create_package(module, "collections", Access::Public)
            .expect("collections");
        let tuple = file
            .create_class(collections, Format::Interface, "Tuple", Access::Public)
            .expect("Tuple");

        let object = file.pool_mut().object_type();
        let boxed = generic_class(&mut file, "Box", object, true);
        let sink = generic_class(&mut file, "Sink", object, false);
        let string = file.formal_type(string);
        Core {
            file,
            object,
            string,
            boxed,
            sink,
            tuple,
        }
    }

    fn of(&mut self, class: ComponentId, params: &[ConstantId]) -> ConstantId {
        let identity = self.file.component(class).identity();
        self.file.pool_mut().ensure_class_type(identity, params)
    }
}

/// `name<T>` with either `get(): T` or `put(T)`.
fn generic_class(file: &mut FileStructure, name: &str, object: ConstantId, produces: bool) -> ComponentId {
    let module = file.module();
    let class = file
        .create_class(module, Format::Class, name, Access::Public)
        .expect("class");
    file.add_type_param(class, "T", object).expect("type param");
    let t = file.own_formal_params(class)[0];
    if produces {
        file.create_method(class, "get", &[], &[t], Access::Public)
            .expect("get");
    } else {
        file.create_method(class, "put", &[("value", t)], &[], Access::Public)
            .expect("put");
    }
    class
}

#[test]
fn covariant_producer() {
    let mut core = Core::new(AssemblerOptions::default());
    let (object, string) = (core.object, core.string);
    let box_object = core.of(core.boxed, &[object]);
    let box_string = core.of(core.boxed, &[string]);

    assert_eq!(core.file.calculate_type_relation(box_object, box_string), Relation::IsA);
    assert_eq!(
        core.file.calculate_type_relation(box_string, box_object),
        Relation::Incompatible
    );
}

#[test]
fn contravariant_consumer() {
    let mut core = Core::new(AssemblerOptions::default());
    let (object, string) = (core.object, core.string);
    let sink_object = core.of(core.sink, &[object]);
    let sink_string = core.of(core.sink, &[string]);

    assert!(core.file.is_a(sink_object, sink_string));
    assert!(!core.file.is_a(sink_string, sink_object));
}

#[test]
fn tuple_prefix() {
    let mut core = Core::new(AssemblerOptions::default());
    let string = core.string;
    let pair = core.of(core.tuple, &[string, string]);
    let triple = core.of(core.tuple, &[string, string, string]);

    assert!(core.file.is_a(triple, pair));
    assert!(!core.file.is_a(pair, triple));
}

#[test]
fn too_many_type_arguments() {
    let mut core = Core::new(AssemblerOptions::default());
    let handle = CollectingListener::default();
    core.file.set_error_listener(Box::new(handle.clone()));
    let string = core.string;
    let wide = core.of(core.boxed, &[string, string]);
    let narrow = core.of(core.boxed, &[string]);

    assert_eq!(core.file.calculate_type_relation(narrow, wide), Relation::Incompatible);
    assert!(handle.has_code(VE_TOO_MANY_TYPE_PARAMS));
}

#[test]
fn cyclical_contributions() {
    let mut core = Core::new(AssemblerOptions::default());
    let handle = CollectingListener::default();
    core.file.set_error_listener(Box::new(handle.clone()));
    let module = core.file.module();
    let a = core
        .file
        .create_class(module, Format::Interface, "A", Access::Public)
        .expect("A");
    let b = core
        .file
        .create_class(module, Format::Interface, "B", Access::Public)
        .expect("B");
    let (a_type, b_type) = (core.file.formal_type(a), core.file.formal_type(b));
    core.file
        .add_contribution(a, Composition::Implements, b_type)
        .expect("A implements B");
    core.file
        .add_contribution(b, Composition::Implements, a_type)
        .expect("B implements A");

    let result = core
        .file
        .resolve_name(a, "nothing", Access::Public, &mut SimpleCollector::new());
    assert_eq!(result, ResolutionResult::Error);
    assert!(handle.has_code(VE_CYCLICAL_CONTRIBUTION));
}

#[test]
fn relations_hold_after_a_trip_through_disk() {
    let mut core = Core::new(AssemblerOptions::default());
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("core.xtc");
    let out = fs::File::create(&path).expect("create");
    core.file.assemble(out).expect("assemble");

    let input = fs::File::open(&path).expect("open");
    let mut loaded = FileStructure::disassemble(input, AssemblerOptions::default()).expect("disassemble");
    assert_eq!(loaded.module_name(), DEFAULT_CORE_MODULE);

    // positions changed on the way; go through names
    let module = loaded.module();
    let boxed = loaded.get_child(module, "Box", None).single().expect("Box");
    let string = loaded.get_child(module, "String", None).single().expect("String");
    let string = loaded.formal_type(string);
    let object = loaded.pool_mut().object_type();
    let identity = loaded.component(boxed).identity();
    let box_object = loaded.pool_mut().ensure_class_type(identity, &[object]);
    let box_string = loaded.pool_mut().ensure_class_type(identity, &[string]);

    assert_eq!(loaded.calculate_type_relation(box_object, box_string), Relation::IsA);
    assert_eq!(loaded.calculate_type_relation(box_string, box_object), Relation::Incompatible);
}

#[test]
fn type_parameter_survives_a_round_trip() {
    init_tracing();
    let mut file = FileStructure::new("app.example.org", AssemblerOptions::default());
    let module = file.module();
    let object = file.pool_mut().object_type();
    let class = file
        .create_class(module, Format::Class, "C", Access::Public)
        .expect("C");
    file.add_type_param(class, "T", object).expect("T");
    let t = file.own_formal_params(class)[0];
    file.create_property(class, "x", t, Access::Public).expect("x");

    let bytes = file.to_bytes().expect("to_bytes");
    let mut loaded = FileStructure::from_bytes(&bytes, AssemblerOptions::default()).expect("from_bytes");
    let module = loaded.module();
    let class = loaded.get_child(module, "C", None).single().expect("C");
    assert_eq!(loaded.type_params(class).len(), 1);

    let x = loaded.get_child(class, "x", None).single().expect("x");
    let ty = loaded.component(x).as_property().map(|p| p.ty);
    let formal = loaded.own_formal_params(class)[0];
    assert_eq!(ty, Some(formal));
}

#[test]
fn small_integers_intern_once() {
    let mut file = FileStructure::new("app.example.org", AssemblerOptions::default());
    let before = file.pool().len();
    let a = file.pool_mut().ensure_int(5);
    let b = file.pool_mut().ensure_int(5);
    assert_eq!(a, b);
    assert_eq!(file.pool().len(), before + 1);
}

#[test]
fn version_gated_siblings() {
    let mut file = FileStructure::new("app.example.org", AssemblerOptions::default());
    let module = file.module();
    let v1 = Version::parse("1").expect("v1");
    let v2 = Version::parse("2").expect("v2");
    let only_v1 = file.pool_mut().ensure_versioned_condition(&v1);
    let only_v2 = file.pool_mut().ensure_versioned_condition(&v2);
    let first = file
        .create_conditional_class(module, Format::Class, "Util", Access::Public, only_v1)
        .expect("Util v1");
    let second = file
        .create_conditional_class(module, Format::Class, "Util", Access::Public, only_v2)
        .expect("Util v2");

    let ctx = StaticLinkerContext::new().with_version(v1);
    for _ in 0..2 {
        assert_eq!(file.get_child(module, "Util", Some(&ctx)).single(), Some(first));
    }
    let ctx = StaticLinkerContext::new().with_version(v2);
    assert_eq!(file.get_child(module, "Util", Some(&ctx)).single(), Some(second));
    let ctx = StaticLinkerContext::new();
    assert!(file.get_child(module, "Util", Some(&ctx)).is_none());
}

#[test]
fn every_satisfied_sibling_is_present_at_once() {
    init_tracing();
    let mut file = FileStructure::new("app.example.org", AssemblerOptions::default());
    let module = file.module();
    let fast = file.pool_mut().ensure_named_condition("fast");
    let safe = file.pool_mut().ensure_named_condition("safe");
    let first = file
        .create_conditional_class(module, Format::Class, "Engine", Access::Public, fast)
        .expect("Engine when fast");
    let second = file
        .create_conditional_class(module, Format::Class, "Engine", Access::Public, safe)
        .expect("Engine when safe");

    let both = StaticLinkerContext::new().with_name("fast").with_name("safe");
    let lookup = file.get_child(module, "Engine", Some(&both));
    assert!(matches!(lookup, ChildLookup::Composite(_)));
    assert_eq!(lookup.ids(), &[first, second]);
    assert_eq!(lookup.first(), Some(first));
    assert_eq!(lookup.single(), None);

    let one = StaticLinkerContext::new().with_name("safe");
    assert_eq!(file.get_child(module, "Engine", Some(&one)), ChildLookup::One(second));
}

#[test]
fn virtual_child_inherits_its_super() {
    let mut file = FileStructure::new("app.example.org", AssemblerOptions::default());
    let module = file.module();
    let base = file
        .create_class(module, Format::Class, "Base", Access::Public)
        .expect("Base");
    file.create_class(base, Format::Class, "Inner", Access::Public)
        .expect("Base.Inner");
    let outer = file
        .create_class(module, Format::Class, "Outer", Access::Public)
        .expect("Outer");
    let base_type = file.formal_type(base);
    file.add_contribution(outer, Composition::Extends, base_type)
        .expect("Outer extends Base");
    let inner = file
        .create_class(outer, Format::Class, "Inner", Access::Public)
        .expect("Outer.Inner");

    let VirtualSuperResult::Found(found) = file.resolve_virtual_super(inner).expect("virtual child") else {
        panic!("expected Outer.Inner to extend Base.Inner");
    };
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].composition(), Composition::Extends);
    assert_eq!(file.pool().describe(found[0].type_constant()), "app.example.org:Base.Inner");
}

#[test]
fn truncated_stream_is_fatal() {
    let mut file = FileStructure::new("app.example.org", AssemblerOptions::default());
    let module = file.module();
    file.create_class(module, Format::Class, "Widget", Access::Public)
        .expect("Widget");
    let bytes = file.to_bytes().expect("to_bytes");

    let result = FileStructure::from_bytes(&bytes[..bytes.len() - 2], AssemblerOptions::default());
    assert!(matches!(result, Err(AsmError::Format(FormatError::UnexpectedEof { .. }))));
}
