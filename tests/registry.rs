//! Registry behaviour under growth, saturation and concurrent use.

use std::collections::HashSet;

use glr::prelude::*;
use proptest::prelude::*;

fn descriptor(name: &str) -> ClassDescriptor {
    let bytes = ClassFileWriter::named(name, ClassKind::Struct, AccessFlags::PUB).build();
    ClassDescriptor::from_bytes(&bytes, DecodeLimits::default()).unwrap()
}

fn small_registry() -> ClassRegistry {
    let _ = env_logger::builder().is_test(true).try_init();
    ClassRegistry::new(&RegistryConfig::default().with_initial_slots(8)).unwrap()
}

#[test]
fn growth_keeps_handles_and_base() -> Result<()> {
    let registry = small_registry();
    let base = registry.table_base();

    let first = registry.register(descriptor("First"))?;
    for index in 0..10_000 {
        registry.insert(descriptor(&format!("Class{index}")))?;
    }

    assert!(registry.capacity() >= 16_384);
    assert_eq!(registry.table_base(), base);
    assert_eq!(first.name(), "First");
    assert_eq!(registry.find("First"), Some(first));

    for index in (0..10_000).step_by(7) {
        let name = format!("Class{index}");
        let class = registry.find(&name).unwrap();
        assert_eq!(class.name(), name);
        assert_eq!(class.id().index(), index + 1);
    }

    let stats = registry.stats()?;
    assert_eq!(stats.occupied, 10_001);
    assert!(stats.load() <= 0.7);
    Ok(())
}

#[test]
fn saturated_table_reports_full() -> Result<()> {
    let config = RegistryConfig::default()
        .with_initial_slots(8)
        .with_max_slots(8);
    let registry = ClassRegistry::new(&config)?;

    for index in 0..8 {
        registry.insert(descriptor(&format!("Slot{index}")))?;
    }
    assert!(matches!(
        registry.insert(descriptor("Overflow")),
        Err(Error::RegistryFull { slots: 8 })
    ));

    assert_eq!(registry.len(), 8);
    assert!(registry.find("Overflow").is_none());
    for index in 0..8 {
        assert!(registry.find(&format!("Slot{index}")).is_some());
    }
    Ok(())
}

#[test]
fn duplicate_leaves_registry_unchanged() -> Result<()> {
    let registry = small_registry();
    let id = registry.insert(descriptor("Twice"))?;
    let before = registry.stats()?;

    assert!(matches!(
        registry.insert(descriptor("Twice")),
        Err(Error::DuplicateClass(name)) if name == "Twice"
    ));
    assert_eq!(registry.stats()?, before);
    assert_eq!(registry.find("Twice").map(|class| class.id()), Some(id));
    Ok(())
}

#[test]
fn iteration_follows_registration_order() -> Result<()> {
    let registry = small_registry();
    for name in ["c", "a", "b"] {
        registry.insert(descriptor(name))?;
    }

    let names: Vec<_> = registry.iter().map(|class| class.name().to_string()).collect();
    assert_eq!(names, vec!["c", "a", "b"]);
    Ok(())
}

#[test]
fn concurrent_loads_and_lookups() -> Result<()> {
    let loader = ClassLoader::new(
        LoaderConfig::default().with_registry(RegistryConfig::default().with_initial_slots(8)),
    )?;
    for index in 0..100 {
        loader.load_class(
            &ClassFileWriter::named(&format!("Seed{index}"), ClassKind::Module, AccessFlags::PUB)
                .build(),
        )?;
    }

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let loader = &loader;
            scope.spawn(move || {
                for index in 0..500 {
                    let name = format!("Worker{worker}.Class{index}");
                    let bytes =
                        ClassFileWriter::named(&name, ClassKind::Struct, AccessFlags::PUB).build();
                    let class = loader.load_class(&bytes).unwrap();
                    assert_eq!(class.name(), name);
                }
            });
        }

        for _ in 0..4 {
            let loader = &loader;
            scope.spawn(move || {
                for round in 0..2_000 {
                    let name = format!("Seed{}", round % 100);
                    let class = loader.find_class(&name).unwrap();
                    assert_eq!(class.name(), name);
                    assert!(loader.find_class("Missing").is_none());
                }
            });
        }
    });

    assert_eq!(loader.registry().len(), 2_100);
    for worker in 0..4 {
        for index in 0..500 {
            assert!(loader
                .find_class(&format!("Worker{worker}.Class{index}"))
                .is_some());
        }
    }
    Ok(())
}

fn constant_strategy() -> impl Strategy<Value = Constant> {
    prop_oneof![
        any::<i64>().prop_map(Constant::Int),
        any::<u64>().prop_map(Constant::UInt),
        (-1.0e12f64..1.0e12).prop_map(Constant::Float),
        "[a-z]{0,6}".prop_map(Constant::Str),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn writer_output_round_trips(
        kind in 0u8..4,
        access in 1u8..8,
        name in prop::option::of("[A-Z][a-z]{0,6}"),
        constants in prop::collection::vec(constant_strategy(), 0..6),
        fields in prop::collection::vec(
            (0u8..8, "[a-z]{0,6}", prop::collection::vec("[A-Za-z0-9]{1,6}", 1..4)),
            0..6,
        ),
        methods in prop::collection::vec(
            (
                0u8..8,
                0u8..4,
                "[a-z]{0,6}",
                prop::collection::vec("[A-Za-z0-9]{1,6}", 0..4),
                prop::collection::vec(any::<u8>(), 0..32),
            ),
            0..6,
        ),
    ) {
        let kind = ClassKind::from_repr(kind).unwrap();
        let class_access = AccessFlags::from_bits_truncate(access);
        let mut writer = match &name {
            Some(name) => ClassFileWriter::named(name, kind, class_access),
            None => ClassFileWriter::new(kind, class_access),
        };

        let mut indices = Vec::with_capacity(constants.len());
        for constant in &constants {
            indices.push(writer.constant(constant.clone()).unwrap());
        }
        for (access, field_name, types) in &fields {
            let types: Vec<&str> = types.iter().map(String::as_str).collect();
            writer
                .field(AccessFlags::from_bits_truncate(*access), field_name, &types)
                .unwrap();
        }
        for (access, call_kind, method_name, args, body) in &methods {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            writer
                .method(
                    AccessFlags::from_bits_truncate(*access),
                    CallKind::from_repr(*call_kind).unwrap(),
                    method_name,
                    &args,
                    body,
                )
                .unwrap();
        }

        let bytes = writer.build();
        let class = ClassDescriptor::from_bytes(&bytes, DecodeLimits::default()).unwrap();

        prop_assert_eq!(class.kind, kind);
        prop_assert_eq!(class.access, class_access);
        prop_assert_eq!(class.name(), name.as_deref().unwrap_or(""));
        prop_assert_eq!(class.is_anonymous(), name.is_none());
        prop_assert_eq!(class.pool.len(), writer.constant_count());
        for (index, constant) in indices.iter().zip(&constants) {
            prop_assert_eq!(class.pool.get(usize::from(*index)), Some(constant));
        }

        prop_assert_eq!(class.fields.len(), fields.len());
        for (field, (access, field_name, types)) in class.fields.iter().zip(&fields) {
            prop_assert_eq!(field.access, AccessFlags::from_bits_truncate(*access));
            prop_assert_eq!(class.field_name(field), Some(field_name.as_str()));
            let decoded: Vec<_> = field.ty.names(&class.pool).collect();
            let expected: Vec<_> = types.iter().map(|ty| Some(ty.as_str())).collect();
            prop_assert_eq!(decoded, expected);
        }

        prop_assert_eq!(class.methods.len(), methods.len());
        for (method, (access, call_kind, method_name, args, body)) in
            class.methods.iter().zip(&methods)
        {
            prop_assert_eq!(method.access, AccessFlags::from_bits_truncate(*access));
            prop_assert_eq!(method.call_kind, CallKind::from_repr(*call_kind).unwrap());
            prop_assert_eq!(class.method_name(method), Some(method_name.as_str()));
            let decoded: Vec<_> = method.args.names(&class.pool).collect();
            let expected: Vec<_> = args.iter().map(|arg| Some(arg.as_str())).collect();
            prop_assert_eq!(decoded, expected);
            prop_assert_eq!(&*method.body, &body[..]);
        }

        for length in 0..bytes.len() {
            let result = ClassDescriptor::from_bytes(&bytes[..length], DecodeLimits::default());
            prop_assert!(
                matches!(result, Err(Error::TruncatedInput { .. })),
                "prefix of {} bytes gave {:?}",
                length,
                result
            );
        }
    }

    #[test]
    fn inserted_names_are_found(
        names in prop::collection::hash_set("[A-Za-z_.]{0,12}", 0..400),
        probes in prop::collection::vec("[A-Za-z_.]{0,12}", 0..50),
    ) {
        let registry = small_registry();
        let mut ids = Vec::with_capacity(names.len());
        for name in &names {
            ids.push((name.clone(), registry.insert(descriptor(name)).unwrap()));
        }

        prop_assert_eq!(registry.len(), names.len());
        for (name, id) in &ids {
            let class = registry.find(name);
            prop_assert!(class.is_some());
            prop_assert_eq!(class.unwrap().id(), *id);
        }

        let known: HashSet<&str> = names.iter().map(String::as_str).collect();
        for probe in &probes {
            prop_assert_eq!(registry.find(probe).is_some(), known.contains(probe.as_str()));
        }

        let stats = registry.stats().unwrap();
        prop_assert_eq!(stats.occupied, names.len());
        prop_assert!(stats.occupied * 100 <= stats.slots * 70);
    }
}
