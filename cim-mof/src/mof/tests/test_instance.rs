#[cfg(test)]
mod instance_tests {
    use std::env::current_dir;
    use std::fs::File;
    use std::io::Read;

    use chrono::{Datelike, TimeDelta, Timelike};

    use crate::{
        error::mof::{ErrorKind, MofError},
        mof::{
            config::DeserializerConfig,
            deserializer::MofDeserializer,
            hooks::DeserializeOptions,
            models::{CimDateTime, CimInstance, CimType, CimValue},
            tests::builder::{
                document, instance, instance_body, null, present, property_with, qualifier,
                record, string_value, Bytes, ClassBuilder, INSTANCE,
            },
        },
    };

    fn decode_with(
        config: DeserializerConfig,
        records: &[Vec<u8>],
    ) -> Result<Vec<CimInstance>, MofError> {
        let bytes = document(records);
        let mut offset = 0;
        MofDeserializer::with_config(config).deserialize_instances(
            Some(&bytes[..]),
            &mut offset,
            DeserializeOptions::new(),
        )
    }

    fn decode(records: &[Vec<u8>]) -> Result<Vec<CimInstance>, MofError> {
        decode_with(DeserializerConfig::default(), records)
    }

    fn value<'a>(instance: &'a CimInstance, name: &str) -> &'a CimValue {
        instance
            .properties
            .get(name)
            .unwrap()
            .value
            .as_ref()
            .unwrap()
    }

    fn embedded_class(name: &str, reference_class: &str) -> Vec<u8> {
        ClassBuilder::new(name)
            .property("Id", CimType::UInt32)
            .raw_property(property_with(
                "Child",
                CimType::Instance,
                0,
                reference_class,
                &[],
                null(),
            ))
            .build()
    }

    #[test]
    fn test_scalar_values() {
        let class = ClassBuilder::new("Scalars")
            .property("b", CimType::Boolean)
            .property("u8", CimType::UInt8)
            .property("s8", CimType::SInt8)
            .property("u16", CimType::UInt16)
            .property("s16", CimType::SInt16)
            .property("u32", CimType::UInt32)
            .property("s32", CimType::SInt32)
            .property("u64", CimType::UInt64)
            .property("s64", CimType::SInt64)
            .property("r32", CimType::Real32)
            .property("r64", CimType::Real64)
            .property("c16", CimType::Char16)
            .property("str", CimType::String)
            .property("path", CimType::Reference)
            .build();
        let values = [
            ("b", present(vec![1])),
            ("u8", present(vec![0xfe])),
            ("s8", present(vec![0xfe])),
            ("u16", present(Bytes::new().u16(0xbeef).build())),
            ("s16", present((-2i16).to_le_bytes().to_vec())),
            ("u32", present(Bytes::new().u32(4_000_000_000).build())),
            ("s32", present((-40i32).to_le_bytes().to_vec())),
            ("u64", present(u64::MAX.to_le_bytes().to_vec())),
            ("s64", present(i64::MIN.to_le_bytes().to_vec())),
            ("r32", present(1.5f32.to_le_bytes().to_vec())),
            ("r64", present((-0.25f64).to_le_bytes().to_vec())),
            ("c16", present(Bytes::new().u16(0x41).build())),
            ("str", string_value("héllo")),
            ("path", string_value("Scalars.u8=1")),
        ];

        let instances = decode(&[class, instance("Scalars", &values)]).unwrap();

        let scalars = &instances[0];
        assert_eq!(scalars.properties.len(), 14);
        assert_eq!(value(scalars, "b"), &CimValue::Boolean(true));
        assert_eq!(value(scalars, "u8"), &CimValue::UInt8(0xfe));
        assert_eq!(value(scalars, "s8"), &CimValue::SInt8(-2));
        assert_eq!(value(scalars, "u16"), &CimValue::UInt16(0xbeef));
        assert_eq!(value(scalars, "s16"), &CimValue::SInt16(-2));
        assert_eq!(value(scalars, "u32"), &CimValue::UInt32(4_000_000_000));
        assert_eq!(value(scalars, "s32"), &CimValue::SInt32(-40));
        assert_eq!(value(scalars, "u64"), &CimValue::UInt64(u64::MAX));
        assert_eq!(value(scalars, "s64"), &CimValue::SInt64(i64::MIN));
        assert_eq!(value(scalars, "r32"), &CimValue::Real32(1.5));
        assert_eq!(value(scalars, "r64"), &CimValue::Real64(-0.25));
        assert_eq!(value(scalars, "c16"), &CimValue::Char16(0x41));
        assert_eq!(value(scalars, "c16").to_string(), "A");
        assert_eq!(value(scalars, "str").as_str(), Some("héllo"));
        assert_eq!(
            value(scalars, "path"),
            &CimValue::Reference("Scalars.u8=1".to_string())
        );

        let property = scalars.properties.get("R64").unwrap();
        assert_eq!(property.name, "r64");
        assert_eq!(property.cim_type, CimType::Real64);
    }

    #[test]
    fn test_property_order_and_case() {
        let class = ClassBuilder::new("A")
            .property("First", CimType::UInt8)
            .property("Second", CimType::UInt8)
            .build();

        let instances = decode(&[
            class,
            instance("A", &[("SECOND", present(vec![2])), ("first", present(vec![1]))]),
        ])
        .unwrap();

        let names: Vec<&str> = instances[0]
            .properties
            .iter()
            .map(|property| property.name.as_str())
            .collect();
        assert_eq!(names, ["Second", "First"]);
    }

    #[test]
    fn test_null_and_unset_values() {
        let class = ClassBuilder::new("A")
            .property("Set", CimType::String)
            .property("Unset", CimType::String)
            .build();

        let instances = decode(&[class, instance("A", &[("Set", null())])]).unwrap();

        let a = &instances[0];
        assert_eq!(a.properties.len(), 1);
        assert!(a.properties.get("set").unwrap().value.is_none());
        assert!(a.properties.get("unset").is_none());
    }

    #[test]
    fn test_arrays() {
        let class = ClassBuilder::new("A")
            .property("Numbers", CimType::SInt16Array)
            .property("Flags", CimType::BooleanArray)
            .property("Empty", CimType::StringArray)
            .build();
        let numbers = Bytes::new().u32(3).u16(1).u16(0xffff).u16(3).build();
        let flags = Bytes::new().u32(2).u8(0).u8(1).build();
        let empty = Bytes::new().u32(0).build();

        let instances = decode(&[
            class,
            instance(
                "A",
                &[
                    ("Numbers", present(numbers)),
                    ("Flags", present(flags)),
                    ("Empty", present(empty)),
                ],
            ),
        ])
        .unwrap();

        let a = &instances[0];
        assert_eq!(
            value(a, "numbers"),
            &CimValue::Array(vec![
                CimValue::SInt16(1),
                CimValue::SInt16(-1),
                CimValue::SInt16(3),
            ])
        );
        assert_eq!(value(a, "flags").to_string(), "{false, true}");
        assert_eq!(value(a, "empty"), &CimValue::Array(vec![]));
    }

    #[test]
    fn test_array_count_too_large() {
        let class = ClassBuilder::new("A")
            .property("Numbers", CimType::UInt8Array)
            .build();
        let numbers = Bytes::new().u32(u32::MAX).u8(1).build();

        let error = decode(&[class, instance("A", &[("Numbers", present(numbers))])]).unwrap_err();

        assert!(matches!(error, MofError::ArrayTooLong { .. }));
        assert_eq!(error.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn test_datetime_values() {
        let class = ClassBuilder::new("A")
            .property("When", CimType::DateTime)
            .property("Uptime", CimType::DateTime)
            .build();

        let instances = decode(&[
            class,
            instance(
                "A",
                &[
                    ("When", string_value("20240229133005.250000-300")),
                    ("Uptime", string_value("00000001020304.000000:000")),
                ],
            ),
        ])
        .unwrap();

        match value(&instances[0], "When") {
            CimValue::DateTime(CimDateTime::Timestamp(when)) => {
                assert_eq!(when.year(), 2024);
                assert_eq!(when.month(), 2);
                assert_eq!(when.day(), 29);
                assert_eq!(when.hour(), 13);
                assert_eq!(when.offset().local_minus_utc(), -300 * 60);
            }
            other => panic!("unexpected value {other:?}"),
        }
        let expected = TimeDelta::days(1)
            + TimeDelta::hours(2)
            + TimeDelta::minutes(3)
            + TimeDelta::seconds(4);
        assert_eq!(
            value(&instances[0], "Uptime"),
            &CimValue::DateTime(CimDateTime::Interval(expected))
        );
        assert_eq!(
            value(&instances[0], "When").to_string(),
            "20240229133005.250000-300"
        );
    }

    #[test]
    fn test_invalid_datetime() {
        let class = ClassBuilder::new("A")
            .property("When", CimType::DateTime)
            .build();

        let error = decode(&[
            class,
            instance("A", &[("When", string_value("yesterday, around noon"))]),
        ])
        .unwrap_err();

        assert!(matches!(error, MofError::InvalidDateTime { .. }));
        assert_eq!(error.kind(), ErrorKind::MalformedContent);
    }

    #[test]
    fn test_invalid_boolean() {
        let class = ClassBuilder::new("A").property("On", CimType::Boolean).build();

        let error = decode(&[class, instance("A", &[("On", present(vec![2]))])]).unwrap_err();

        assert!(matches!(
            error,
            MofError::InvalidMarker {
                what: "boolean",
                value: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_presence_marker() {
        let class = ClassBuilder::new("A").property("On", CimType::Boolean).build();

        let error = decode(&[class, instance("A", &[("On", vec![7, 1])])]).unwrap_err();

        assert!(matches!(
            error,
            MofError::InvalidMarker {
                what: "value presence",
                value: 7,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let class = ClassBuilder::new("A").property("Text", CimType::String).build();
        let text = Bytes::new().u32(2).raw(&[0xc3, 0x28]).build();

        let error = decode(&[class, instance("A", &[("Text", present(text))])]).unwrap_err();

        assert!(matches!(error, MofError::InvalidString { .. }));
        assert_eq!(error.kind(), ErrorKind::MalformedContent);
    }

    #[test]
    fn test_unknown_property() {
        let class = ClassBuilder::new("A").property("Known", CimType::UInt8).build();

        let error =
            decode(&[class, instance("A", &[("Unknown", present(vec![1]))])]).unwrap_err();

        match error {
            MofError::UnknownProperty { class, property } => {
                assert_eq!(class, "A");
                assert_eq!(property, "Unknown");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_property() {
        let class = ClassBuilder::new("A").property("Known", CimType::UInt8).build();

        let error = decode(&[
            class,
            instance(
                "A",
                &[("Known", present(vec![1])), ("KNOWN", present(vec![2]))],
            ),
        ])
        .unwrap_err();

        assert!(matches!(error, MofError::DuplicateMember { .. }));
    }

    #[test]
    fn test_abstract_class() {
        let class = ClassBuilder::new("A")
            .qualifier(qualifier(
                "Abstract",
                CimType::Boolean,
                0x200,
                present(vec![1]),
            ))
            .build();
        let derived = ClassBuilder::new("B").extends("A").build();

        let error = decode(&[class.clone(), instance("A", &[])]).unwrap_err();
        assert!(matches!(error, MofError::AbstractInstance(_)));

        let instances = decode(&[class, derived, instance("B", &[])]).unwrap();
        assert_eq!(instances[0].class_name(), "B");
    }

    #[test]
    fn test_abstract_is_not_inherited() {
        let class = ClassBuilder::new("A")
            .qualifier(qualifier(
                "Abstract",
                CimType::Boolean,
                0,
                present(vec![1]),
            ))
            .build();
        let derived = ClassBuilder::new("B").extends("A").build();

        let instances = decode(&[class, derived, instance("B", &[])]).unwrap();
        assert_eq!(instances[0].class_name(), "B");
        assert!(instances[0].class.superclass.as_ref().unwrap().is_abstract());
        assert!(!instances[0].class.is_abstract());
        assert!(instances[0].class.qualifiers.get("abstract").is_none());
    }

    #[test]
    fn test_inherited_property_value() {
        let base = ClassBuilder::new("Base").property("Name", CimType::String).build();
        let derived = ClassBuilder::new("Derived")
            .extends("Base")
            .property("Extra", CimType::UInt8)
            .build();

        let instances = decode(&[
            base,
            derived,
            instance(
                "Derived",
                &[("name", string_value("x")), ("Extra", present(vec![9]))],
            ),
        ])
        .unwrap();

        assert_eq!(value(&instances[0], "Name").as_str(), Some("x"));
        assert_eq!(instances[0].properties.get("name").unwrap().name, "Name");
    }

    #[test]
    fn test_embedded_instance() {
        let leaf = ClassBuilder::new("Leaf").property("Id", CimType::UInt32).build();
        let node = embedded_class("Node", "Leaf");
        let child = instance_body("Leaf", &[("Id", present(Bytes::new().u32(5).build()))]);

        let instances = decode(&[
            leaf,
            node,
            instance("Node", &[("Child", present(child))]),
        ])
        .unwrap();

        match value(&instances[0], "child") {
            CimValue::Instance(embedded) => {
                assert_eq!(embedded.class_name(), "Leaf");
                assert_eq!(value(embedded, "id"), &CimValue::UInt32(5));
            }
            other => panic!("unexpected value {other:?}"),
        }
    }

    #[test]
    fn test_embedded_instance_of_subclass() {
        let leaf = ClassBuilder::new("Leaf").build();
        let special = ClassBuilder::new("SpecialLeaf").extends("Leaf").build();
        let node = embedded_class("Node", "leaf");
        let child = instance_body("SpecialLeaf", &[]);

        let instances = decode(&[
            leaf,
            special,
            node,
            instance("Node", &[("Child", present(child))]),
        ])
        .unwrap();

        assert_eq!(instances.len(), 1);
    }

    #[test]
    fn test_embedded_instance_wrong_class() {
        let leaf = ClassBuilder::new("Leaf").build();
        let other = ClassBuilder::new("Other").build();
        let node = embedded_class("Node", "Leaf");
        let child = instance_body("Other", &[]);

        let error = decode(&[
            leaf,
            other,
            node,
            instance("Node", &[("Child", present(child))]),
        ])
        .unwrap_err();

        match error {
            MofError::EmbeddedClassMismatch {
                property,
                expected,
                found,
            } => {
                assert_eq!(property, "Node.Child");
                assert_eq!(expected, "Leaf");
                assert_eq!(found, "Other");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_nesting_too_deep() {
        // Node embeds Node, so each level wraps the previous one
        let node = embedded_class("Node", "Node");
        let mut body = instance_body("Node", &[]);
        for _ in 0..4 {
            body = instance_body("Node", &[("Child", present(body))]);
        }
        let records = [node, record(INSTANCE, &body)];

        let shallow = DeserializerConfig::default().with_max_instance_depth(3);
        let error = decode_with(shallow, &records).unwrap_err();
        assert!(matches!(error, MofError::NestingTooDeep(3)));

        let deep_enough = DeserializerConfig::default().with_max_instance_depth(4);
        assert_eq!(decode_with(deep_enough, &records).unwrap().len(), 1);
    }

    #[test]
    fn test_truncated_value() {
        let class = ClassBuilder::new("A").property("Big", CimType::UInt64).build();

        let error =
            decode(&[class, instance("A", &[("Big", present(vec![1, 2, 3]))])]).unwrap_err();

        assert_eq!(error.kind(), ErrorKind::OutOfRange);
    }

    #[test]
    fn test_inventory_instances() {
        let path = current_dir()
            .unwrap()
            .as_path()
            .join("test_data/mof/Inventory.bmof");
        let mut file = File::open(path).unwrap();
        let mut bytes = vec![];
        file.read_to_end(&mut bytes).unwrap();
        let mut offset = 0;

        let instances = MofDeserializer::new()
            .deserialize_instances(Some(&bytes[..]), &mut offset, DeserializeOptions::new())
            .unwrap();

        assert_eq!(instances.len(), 2);
        assert_eq!(offset, bytes.len());

        let disk = &instances[0];
        assert_eq!(disk.class_name(), "Inv_Disk");
        assert_eq!(disk.class.namespace, "root\\inventory");
        assert_eq!(value(disk, "Name").as_str(), Some("disk0"));
        assert_eq!(value(disk, "Capacity"), &CimValue::UInt64(512 * 1024 * 1024 * 1024));
        assert_eq!(value(disk, "Labels").to_string(), "{system, boot}");
        assert_eq!(
            value(disk, "Installed").to_string(),
            "20240115093000.000000+060"
        );

        let volume = &instances[1];
        assert_eq!(volume.class_name(), "Inv_Volume");
        match value(volume, "Disk") {
            CimValue::Instance(embedded) => {
                assert_eq!(embedded.class_name(), "Inv_Disk");
                assert_eq!(value(embedded, "name").as_str(), Some("disk1"));
            }
            other => panic!("unexpected value {other:?}"),
        }
        assert_eq!(
            value(volume, "Path"),
            &CimValue::Reference("Inv_Disk.Name=\"disk0\"".to_string())
        );
    }
}
