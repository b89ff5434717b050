mod common;

use apisig::classfile::parse_class;
use apisig::member::MemberDetail;
use apisig::{Modifiers, SigError};
use common::*;

fn sample_class() -> Vec<u8> {
    ClassBuilder::new("com/example/Foo", ACC_PUBLIC | ACC_SUPER)
        .int_constant(ACC_PUBLIC | ACC_FINAL, "X", 5)
        .field(ACC_PRIVATE, "secret", "I")
        .method(ACC_PUBLIC, "<init>", "()V")
        .annotated_method(
            ACC_PUBLIC | ACC_VARARGS,
            "run",
            "([Ljava/lang/String;)V",
            "Ljava/lang/Deprecated;",
        )
        .build()
}

#[test]
fn simple_class_with_constant_field() -> anyhow::Result<()> {
    let class = parse_class(&sample_class())?;
    assert_eq!(class.name, "com.example.Foo");
    assert_eq!(class.modifiers, Modifiers::PUBLIC);
    assert_eq!(class.super_class_name(), Some("java.lang.Object"));

    assert_eq!(class.fields.len(), 1);
    let x = &class.fields[0];
    assert_eq!(x.name, "X");
    assert_eq!(x.field_type(), Some("int"));
    assert_eq!(x.constant(), Some("5"));
    assert_eq!(x.modifiers, Modifiers::PUBLIC | Modifiers::FINAL);
    assert!(class.internal_fields.as_ref().is_some_and(|s| s.contains("secret")));

    assert_eq!(class.constructors.len(), 1);
    assert_eq!(class.constructors[0].name, "Foo");
    let run = class
        .method("run")
        .ok_or_else(|| anyhow::anyhow!("run is missing"))?;
    match &run.detail {
        MemberDetail::Method { args, return_type, .. } => {
            assert_eq!(args, "java.lang.String...");
            assert_eq!(return_type, "void");
        }
        other => anyhow::bail!("unexpected {other:?}"),
    }
    assert_eq!(run.annotations[0].name, "java.lang.Deprecated");
    Ok(())
}

#[test]
fn interfaces_resolve_to_dotted_names() -> anyhow::Result<()> {
    let bytes = ClassBuilder::new("p/Impl", ACC_PUBLIC | ACC_SUPER)
        .super_class("p/Base")
        .interface("java/lang/Runnable")
        .build();
    let class = parse_class(&bytes)?;
    assert_eq!(class.super_class_name(), Some("p.Base"));
    assert_eq!(class.interfaces[0].name, "java.lang.Runnable");
    Ok(())
}

#[test]
fn rejects_garbage() {
    assert!(matches!(parse_class(b"nope"), Err(SigError::ClassFormat { .. })));
    let mut truncated = sample_class();
    truncated.truncate(30);
    assert!(matches!(parse_class(&truncated), Err(SigError::ClassFormat { .. })));
}
