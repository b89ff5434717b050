//! `.class` bytes to [`ClassDescription`].
//!
//! The binary layout is parsed with `nom` into borrowed raw structures;
//! a second step resolves constant-pool references and renders types in
//! source form through [`crate::descriptor`].

use std::collections::BTreeSet;

use nom::Parser;
use nom::bytes::complete::take;
use nom::multi::count;
use nom::number::complete::{be_f32, be_f64, be_i32, be_i64, be_u16, be_u32, u8 as be_u8};

use crate::annotation::{AnnotationItem, AnnotationMember, AnnotationValue, TypeAnnotationInfo};
use crate::class::ClassDescription;
use crate::constant::{char_literal, float32_literal, float_literal, string_literal};
use crate::descriptor::{self, internal_to_dotted};
use crate::error::{Result, SigError};
use crate::member::MemberDescription;
use crate::modifiers::Modifiers;
use crate::module_info::{ModuleDescription, Requires};

const MAGIC: [u8; 4] = [0xca, 0xfe, 0xba, 0xbe];
const ACC_MODULE: u16 = 0x8000;

type Res<'a, T> = nom::IResult<&'a [u8], T>;
type Parse<T> = std::result::Result<T, String>;

fn u1(i: &[u8]) -> Res<'_, u8> {
    be_u8(i)
}

fn u2(i: &[u8]) -> Res<'_, u16> {
    be_u16(i)
}

fn u4(i: &[u8]) -> Res<'_, u32> {
    be_u32(i)
}

fn bytes(i: &[u8], n: usize) -> Res<'_, &[u8]> {
    take(n).parse(i)
}

fn u2_list(i: &[u8]) -> Res<'_, Vec<u16>> {
    let (i, n) = u2(i)?;
    count(u2, n as usize).parse(i)
}

#[derive(Debug)]
enum Constant<'a> {
    Empty,
    Utf8(&'a [u8]),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class(u16),
    String(u16),
    Module(u16),
    Package(u16),
    /// References, method handles, dynamic constants: never needed here.
    Other,
}

struct RawAttribute<'a> {
    name: u16,
    info: &'a [u8],
}

struct RawMember<'a> {
    access: u16,
    name: u16,
    descriptor: u16,
    attributes: Vec<RawAttribute<'a>>,
}

struct RawClass<'a> {
    pool: Vec<Constant<'a>>,
    access: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<RawMember<'a>>,
    methods: Vec<RawMember<'a>>,
    attributes: Vec<RawAttribute<'a>>,
}

fn constant(i: &[u8]) -> Res<'_, Constant<'_>> {
    let (i, tag) = u1(i)?;
    match tag {
        1 => {
            let (i, len) = u2(i)?;
            let (i, data) = bytes(i, len as usize)?;
            Ok((i, Constant::Utf8(data)))
        }
        3 => be_i32(i).map(|(i, v)| (i, Constant::Integer(v))),
        4 => be_f32(i).map(|(i, v)| (i, Constant::Float(v))),
        5 => be_i64(i).map(|(i, v)| (i, Constant::Long(v))),
        6 => be_f64(i).map(|(i, v)| (i, Constant::Double(v))),
        7 => u2(i).map(|(i, v)| (i, Constant::Class(v))),
        8 => u2(i).map(|(i, v)| (i, Constant::String(v))),
        9..=12 | 17 | 18 => bytes(i, 4).map(|(i, _)| (i, Constant::Other)),
        15 => bytes(i, 3).map(|(i, _)| (i, Constant::Other)),
        16 => bytes(i, 2).map(|(i, _)| (i, Constant::Other)),
        19 => u2(i).map(|(i, v)| (i, Constant::Module(v))),
        20 => u2(i).map(|(i, v)| (i, Constant::Package(v))),
        _ => Err(nom::Err::Failure(nom::error::Error::new(
            i,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

fn constant_pool(i: &[u8]) -> Res<'_, Vec<Constant<'_>>> {
    let (mut i, n) = u2(i)?;
    let n = n as usize;
    let mut pool = Vec::with_capacity(n.max(1));
    pool.push(Constant::Empty);
    while pool.len() < n {
        let c;
        (i, c) = constant(i)?;
        let wide = matches!(c, Constant::Long(_) | Constant::Double(_));
        pool.push(c);
        if wide {
            pool.push(Constant::Empty);
        }
    }
    Ok((i, pool))
}

fn attribute(i: &[u8]) -> Res<'_, RawAttribute<'_>> {
    let (i, name) = u2(i)?;
    let (i, len) = u4(i)?;
    let (i, info) = bytes(i, len as usize)?;
    Ok((i, RawAttribute { name, info }))
}

fn attributes(i: &[u8]) -> Res<'_, Vec<RawAttribute<'_>>> {
    let (i, n) = u2(i)?;
    count(attribute, n as usize).parse(i)
}

fn member(i: &[u8]) -> Res<'_, RawMember<'_>> {
    let (i, access) = u2(i)?;
    let (i, name) = u2(i)?;
    let (i, descriptor) = u2(i)?;
    let (i, attributes) = attributes(i)?;
    Ok((
        i,
        RawMember {
            access,
            name,
            descriptor,
            attributes,
        },
    ))
}

fn members(i: &[u8]) -> Res<'_, Vec<RawMember<'_>>> {
    let (i, n) = u2(i)?;
    count(member, n as usize).parse(i)
}

fn raw_class(i: &[u8]) -> Res<'_, RawClass<'_>> {
    let (i, _magic) = bytes(i, 4)?;
    let (i, _minor) = u2(i)?;
    let (i, _major) = u2(i)?;
    let (i, pool) = constant_pool(i)?;
    let (i, access) = u2(i)?;
    let (i, this_class) = u2(i)?;
    let (i, super_class) = u2(i)?;
    let (i, interfaces) = u2_list(i)?;
    let (i, fields) = members(i)?;
    let (i, methods) = members(i)?;
    let (i, attributes) = attributes(i)?;
    Ok((
        i,
        RawClass {
            pool,
            access,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        },
    ))
}

fn nom_message(e: nom::Err<nom::error::Error<&[u8]>>) -> String {
    match e {
        nom::Err::Incomplete(_) => "truncated class data".to_string(),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            format!("invalid class data ({:?}, {} bytes left)", e.code, e.input.len())
        }
    }
}

/// Runs an attribute-body parser over the whole body.
fn body<'a, T>(info: &'a [u8], parser: fn(&'a [u8]) -> Res<'a, T>) -> Parse<T> {
    parser(info).map(|(_, v)| v).map_err(nom_message)
}

// Annotation bodies (JVMS 4.7.16 - 4.7.20).

enum RawElement {
    Const(u8, u16),
    Enum(u16, u16),
    Class(u16),
    Annotation(RawAnnotation),
    Array(Vec<RawElement>),
}

struct RawAnnotation {
    type_index: u16,
    pairs: Vec<(u16, RawElement)>,
}

struct RawTypeAnnotation {
    target_type: u8,
    type_index: Option<u16>,
    bound_index: Option<u16>,
    parameter_index: Option<u16>,
    path: Vec<(u8, u8)>,
    annotation: RawAnnotation,
}

fn element(i: &[u8]) -> Res<'_, RawElement> {
    let (i, tag) = u1(i)?;
    match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => {
            u2(i).map(|(i, idx)| (i, RawElement::Const(tag, idx)))
        }
        b'e' => {
            let (i, ty) = u2(i)?;
            let (i, name) = u2(i)?;
            Ok((i, RawElement::Enum(ty, name)))
        }
        b'c' => u2(i).map(|(i, idx)| (i, RawElement::Class(idx))),
        b'@' => annotation(i).map(|(i, a)| (i, RawElement::Annotation(a))),
        b'[' => {
            let (i, n) = u2(i)?;
            let (i, items) = count(element, n as usize).parse(i)?;
            Ok((i, RawElement::Array(items)))
        }
        _ => Err(nom::Err::Failure(nom::error::Error::new(
            i,
            nom::error::ErrorKind::Tag,
        ))),
    }
}

fn element_pair(i: &[u8]) -> Res<'_, (u16, RawElement)> {
    let (i, name) = u2(i)?;
    let (i, value) = element(i)?;
    Ok((i, (name, value)))
}

fn annotation(i: &[u8]) -> Res<'_, RawAnnotation> {
    let (i, type_index) = u2(i)?;
    let (i, n) = u2(i)?;
    let (i, pairs) = count(element_pair, n as usize).parse(i)?;
    Ok((i, RawAnnotation { type_index, pairs }))
}

fn annotations(i: &[u8]) -> Res<'_, Vec<RawAnnotation>> {
    let (i, n) = u2(i)?;
    count(annotation, n as usize).parse(i)
}

fn parameter_annotations(i: &[u8]) -> Res<'_, Vec<Vec<RawAnnotation>>> {
    let (i, n) = u1(i)?;
    count(annotations, n as usize).parse(i)
}

fn type_path_step(i: &[u8]) -> Res<'_, (u8, u8)> {
    let (i, kind) = u1(i)?;
    let (i, arg) = u1(i)?;
    Ok((i, (kind, arg)))
}

fn type_annotation(i: &[u8]) -> Res<'_, RawTypeAnnotation> {
    let (mut i, target_type) = u1(i)?;
    let (mut type_index, mut bound_index, mut parameter_index) = (None, None, None);
    match target_type {
        0x00 | 0x01 => {
            let v;
            (i, v) = u1(i)?;
            type_index = Some(u16::from(v));
        }
        0x10 | 0x17 => {
            let v;
            (i, v) = u2(i)?;
            type_index = Some(v);
        }
        0x11 | 0x12 => {
            let (t, b);
            (i, t) = u1(i)?;
            (i, b) = u1(i)?;
            type_index = Some(u16::from(t));
            bound_index = Some(u16::from(b));
        }
        0x13..=0x15 => {}
        0x16 => {
            let v;
            (i, v) = u1(i)?;
            parameter_index = Some(u16::from(v));
        }
        _ => {
            return Err(nom::Err::Failure(nom::error::Error::new(
                i,
                nom::error::ErrorKind::Tag,
            )));
        }
    }
    let (i, path_len) = u1(i)?;
    let (i, path) = count(type_path_step, path_len as usize).parse(i)?;
    let (i, annotation) = annotation(i)?;
    Ok((
        i,
        RawTypeAnnotation {
            target_type,
            type_index,
            bound_index,
            parameter_index,
            path,
            annotation,
        },
    ))
}

fn type_annotations(i: &[u8]) -> Res<'_, Vec<RawTypeAnnotation>> {
    let (i, n) = u2(i)?;
    count(type_annotation, n as usize).parse(i)
}

/// `(inner_class, outer_class, inner_name, flags)` rows of `InnerClasses`.
fn inner_classes(i: &[u8]) -> Res<'_, Vec<(u16, u16, u16, u16)>> {
    fn row(i: &[u8]) -> Res<'_, (u16, u16, u16, u16)> {
        let (i, inner) = u2(i)?;
        let (i, outer) = u2(i)?;
        let (i, name) = u2(i)?;
        let (i, flags) = u2(i)?;
        Ok((i, (inner, outer, name, flags)))
    }
    let (i, n) = u2(i)?;
    count(row, n as usize).parse(i)
}

// Module attribute (JVMS 4.7.25).

struct RawModule {
    name: u16,
    version: u16,
    requires: Vec<(u16, u16)>,
    exports: Vec<(u16, Vec<u16>)>,
    uses: Vec<u16>,
    provides: Vec<(u16, Vec<u16>)>,
}

fn requires_row(i: &[u8]) -> Res<'_, (u16, u16)> {
    let (i, module) = u2(i)?;
    let (i, flags) = u2(i)?;
    let (i, _version) = u2(i)?;
    Ok((i, (module, flags)))
}

fn exports_row(i: &[u8]) -> Res<'_, (u16, Vec<u16>)> {
    let (i, package) = u2(i)?;
    let (i, _flags) = u2(i)?;
    let (i, targets) = u2_list(i)?;
    Ok((i, (package, targets)))
}

fn provides_row(i: &[u8]) -> Res<'_, (u16, Vec<u16>)> {
    let (i, service) = u2(i)?;
    let (i, providers) = u2_list(i)?;
    Ok((i, (service, providers)))
}

fn module_attribute(i: &[u8]) -> Res<'_, RawModule> {
    let (i, name) = u2(i)?;
    let (i, _flags) = u2(i)?;
    let (i, version) = u2(i)?;
    let (i, n) = u2(i)?;
    let (i, requires) = count(requires_row, n as usize).parse(i)?;
    let (i, n) = u2(i)?;
    let (i, exports) = count(exports_row, n as usize).parse(i)?;
    // `opens` rows share the exports layout and are not recorded.
    let (i, n) = u2(i)?;
    let (i, _opens) = count(exports_row, n as usize).parse(i)?;
    let (i, uses) = u2_list(i)?;
    let (i, n) = u2(i)?;
    let (i, provides) = count(provides_row, n as usize).parse(i)?;
    Ok((
        i,
        RawModule {
            name,
            version,
            requires,
            exports,
            uses,
            provides,
        },
    ))
}

struct Pool<'p, 'a> {
    entries: &'p [Constant<'a>],
}

impl<'p, 'a> Pool<'p, 'a> {
    fn get(&self, index: u16) -> Parse<&'p Constant<'a>> {
        match self.entries.get(index as usize) {
            Some(Constant::Empty) | None => Err(format!("bad constant pool index {index}")),
            Some(c) => Ok(c),
        }
    }

    fn utf8(&self, index: u16) -> Parse<String> {
        match self.get(index)? {
            Constant::Utf8(data) => cesu8::from_java_cesu8(data)
                .map(|s| s.into_owned())
                .map_err(|_| format!("constant {index} is not valid modified UTF-8")),
            other => Err(format!("constant {index} is not a string: {other:?}")),
        }
    }

    fn class_name(&self, index: u16) -> Parse<String> {
        match self.get(index)? {
            Constant::Class(name) => Ok(internal_to_dotted(&self.utf8(*name)?)),
            other => Err(format!("constant {index} is not a class: {other:?}")),
        }
    }

    fn module_name(&self, index: u16) -> Parse<String> {
        match self.get(index)? {
            Constant::Module(name) => self.utf8(*name),
            other => Err(format!("constant {index} is not a module: {other:?}")),
        }
    }

    fn package_name(&self, index: u16) -> Parse<String> {
        match self.get(index)? {
            Constant::Package(name) => Ok(internal_to_dotted(&self.utf8(*name)?)),
            other => Err(format!("constant {index} is not a package: {other:?}")),
        }
    }

    fn attribute<'r, 'b>(
        &self,
        list: &'r [RawAttribute<'b>],
        name: &str,
    ) -> Parse<Option<&'r RawAttribute<'b>>> {
        for attr in list {
            if self.utf8(attr.name)? == name {
                return Ok(Some(attr));
            }
        }
        Ok(None)
    }
}

const CLASS_FLAGS: &[(u16, Modifiers)] = &[
    (0x0001, Modifiers::PUBLIC),
    (0x0010, Modifiers::FINAL),
    (0x0200, Modifiers::INTERFACE),
    (0x0400, Modifiers::ABSTRACT),
    (0x1000, Modifiers::SYNTHETIC),
    (0x2000, Modifiers::ANNOTATION),
    (0x4000, Modifiers::ENUM),
];

const NESTED_FLAGS: &[(u16, Modifiers)] = &[
    (0x0001, Modifiers::PUBLIC),
    (0x0002, Modifiers::PRIVATE),
    (0x0004, Modifiers::PROTECTED),
    (0x0008, Modifiers::STATIC),
    (0x0010, Modifiers::FINAL),
    (0x0200, Modifiers::INTERFACE),
    (0x0400, Modifiers::ABSTRACT),
    (0x1000, Modifiers::SYNTHETIC),
    (0x2000, Modifiers::ANNOTATION),
    (0x4000, Modifiers::ENUM),
];

const FIELD_FLAGS: &[(u16, Modifiers)] = &[
    (0x0001, Modifiers::PUBLIC),
    (0x0002, Modifiers::PRIVATE),
    (0x0004, Modifiers::PROTECTED),
    (0x0008, Modifiers::STATIC),
    (0x0010, Modifiers::FINAL),
    (0x0040, Modifiers::VOLATILE),
    (0x0080, Modifiers::TRANSIENT),
    (0x1000, Modifiers::SYNTHETIC),
    (0x4000, Modifiers::ENUM),
];

const METHOD_FLAGS: &[(u16, Modifiers)] = &[
    (0x0001, Modifiers::PUBLIC),
    (0x0002, Modifiers::PRIVATE),
    (0x0004, Modifiers::PROTECTED),
    (0x0008, Modifiers::STATIC),
    (0x0010, Modifiers::FINAL),
    (0x0020, Modifiers::SYNCHRONIZED),
    (0x0040, Modifiers::BRIDGE),
    (0x0080, Modifiers::VARARGS),
    (0x0100, Modifiers::NATIVE),
    (0x0400, Modifiers::ABSTRACT),
    (0x0800, Modifiers::STRICTFP),
    (0x1000, Modifiers::SYNTHETIC),
];

fn modifiers(flags: u16, table: &[(u16, Modifiers)]) -> Modifiers {
    table
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .fold(Modifiers::empty(), |acc, (_, m)| acc | *m)
}

fn is_hidden(mods: Modifiers) -> bool {
    !mods.is_accessible() || mods.intersects(Modifiers::SYNTHETIC | Modifiers::BRIDGE)
}

/// Parses one class file. `module-info.class` yields a module description.
pub fn parse_class(data: &[u8]) -> Result<ClassDescription> {
    if !data.starts_with(&MAGIC) {
        return Err(SigError::class_format("<unknown>", "bad magic number"));
    }
    let (_, raw) = raw_class(data).map_err(|e| SigError::class_format("<unknown>", nom_message(e)))?;
    let pool = Pool { entries: &raw.pool };
    let name = pool
        .class_name(raw.this_class)
        .map_err(|m| SigError::class_format("<unknown>", m))?;
    describe(&raw, &pool, &name).map_err(|m| SigError::class_format(name, m))
}

fn describe(raw: &RawClass<'_>, pool: &Pool<'_, '_>, name: &str) -> Parse<ClassDescription> {
    if raw.access & ACC_MODULE != 0 {
        return describe_module(raw, pool).map(ClassDescription::from_module);
    }

    let mut class = ClassDescription::new(name, modifiers(raw.access, CLASS_FLAGS));
    let mut hidden_fields = BTreeSet::new();
    let mut hidden_classes = BTreeSet::new();

    if let Some(attr) = pool.attribute(&raw.attributes, "InnerClasses")? {
        for (inner, outer, simple, flags) in body(attr.info, inner_classes)? {
            let inner_name = pool.class_name(inner)?;
            let mods = modifiers(flags, NESTED_FLAGS);
            if inner_name == name {
                class.modifiers = mods;
                continue;
            }
            if outer == 0 || simple == 0 || pool.class_name(outer)? != name {
                continue;
            }
            if is_hidden(mods) {
                hidden_classes.insert(pool.utf8(simple)?);
            } else {
                class.add_member(MemberDescription::inner(name, &inner_name, mods));
            }
        }
    }
    if class.modifiers.contains(Modifiers::INTERFACE) {
        class.modifiers |= Modifiers::ABSTRACT;
    }

    let signature = match pool.attribute(&raw.attributes, "Signature")? {
        Some(attr) => Some(descriptor::class_signature(&pool.utf8(body(attr.info, u2)?)?)?),
        None => None,
    };
    let (super_class, interfaces) = match signature {
        Some(sig) => {
            class.type_parameters = sig.type_parameters;
            (sig.super_class, sig.interfaces)
        }
        None => {
            let super_class = match raw.super_class {
                0 => None,
                idx => Some(pool.class_name(idx)?),
            };
            let interfaces = raw
                .interfaces
                .iter()
                .map(|&i| pool.class_name(i))
                .collect::<Parse<Vec<_>>>()?;
            (super_class, interfaces)
        }
    };
    if !class.modifiers.contains(Modifiers::INTERFACE)
        && let Some(s) = super_class
    {
        class.add_member(MemberDescription::super_class(name, &s));
    }
    for iface in interfaces {
        class.add_member(MemberDescription::super_interface(name, &iface, true));
    }
    class.annotations = element_annotations(pool, &raw.attributes)?;

    for field in &raw.fields {
        let field_name = pool.utf8(field.name)?;
        let mods = modifiers(field.access, FIELD_FLAGS);
        if is_hidden(mods) {
            hidden_fields.insert(field_name);
            continue;
        }
        class.add_member(describe_field(pool, name, field_name, mods, field)?);
    }

    for method in &raw.methods {
        let method_name = pool.utf8(method.name)?;
        let mods = modifiers(method.access, METHOD_FLAGS);
        if method_name == "<clinit>" || is_hidden(mods) {
            continue;
        }
        class.add_member(describe_method(pool, name, &method_name, mods, method)?);
    }

    class.internal_fields = Some(hidden_fields);
    class.internal_classes = Some(hidden_classes);
    class.canonicalize();
    Ok(class)
}

fn describe_field(
    pool: &Pool<'_, '_>,
    class: &str,
    name: String,
    mods: Modifiers,
    field: &RawMember<'_>,
) -> Parse<MemberDescription> {
    let ty = match pool.attribute(&field.attributes, "Signature")? {
        Some(attr) => descriptor::field_signature(&pool.utf8(body(attr.info, u2)?)?)?,
        None => descriptor::field_type(&pool.utf8(field.descriptor)?)?,
    };
    let constant = match pool.attribute(&field.attributes, "ConstantValue")? {
        Some(attr) => Some(constant_value(pool, body(attr.info, u2)?, &ty)?),
        None => None,
    };
    let mut member = MemberDescription::field(class, &name, mods.visible(), &ty, constant.as_deref());
    member.annotations = element_annotations(pool, &field.attributes)?;
    Ok(member)
}

fn constant_value(pool: &Pool<'_, '_>, index: u16, ty: &str) -> Parse<String> {
    Ok(match (pool.get(index)?, ty) {
        (Constant::Integer(v), "boolean") => (*v != 0).to_string(),
        (Constant::Integer(v), "char") => char_literal(char::from_u32(*v as u32).unwrap_or('\u{fffd}')),
        (Constant::Integer(v), _) => v.to_string(),
        (Constant::Long(v), _) => v.to_string(),
        (Constant::Float(v), _) => float32_literal(*v),
        (Constant::Double(v), _) => float_literal(*v),
        (Constant::String(s), _) => string_literal(&pool.utf8(*s)?),
        (other, _) => return Err(format!("unsupported constant value {other:?}")),
    })
}

fn describe_method(
    pool: &Pool<'_, '_>,
    class: &str,
    name: &str,
    mods: Modifiers,
    method: &RawMember<'_>,
) -> Parse<MemberDescription> {
    let descriptor_sig = descriptor::method_descriptor(&pool.utf8(method.descriptor)?)?;
    let mut sig = match pool.attribute(&method.attributes, "Signature")? {
        Some(attr) => descriptor::method_signature(&pool.utf8(body(attr.info, u2)?)?)?,
        None => descriptor_sig.clone(),
    };
    if sig.throws.is_empty()
        && let Some(attr) = pool.attribute(&method.attributes, "Exceptions")?
    {
        sig.throws = body(attr.info, u2_list)?
            .into_iter()
            .map(|i| pool.class_name(i))
            .collect::<Parse<_>>()?;
    }
    if mods.contains(Modifiers::VARARGS)
        && let Some(last) = sig.args.last_mut()
        && let Some(base) = last.strip_suffix("[]")
    {
        *last = format!("{base}...");
    }
    let args = sig.args.join(",");
    let throws: Vec<&str> = sig.throws.iter().map(String::as_str).collect();

    let mut member = if name == "<init>" {
        MemberDescription::constructor(class, mods.visible(), &args)
    } else {
        MemberDescription::method(class, name, mods.visible(), &sig.return_type, &args)
    };
    member = member.with_throws(&throws);
    if let Some(tp) = &sig.type_parameters {
        member = member.with_type_parameters(tp);
    }
    if let Some(attr) = pool.attribute(&method.attributes, "AnnotationDefault")? {
        let (_, value) = convert_element(pool, &body(attr.info, element)?)?;
        member = member.with_default(&value.to_string());
    }

    member.annotations = element_annotations(pool, &method.attributes)?;
    if let Some(attr) = pool.attribute(&method.attributes, "RuntimeVisibleParameterAnnotations")? {
        for (index, list) in body(attr.info, parameter_annotations)?.iter().enumerate() {
            for raw in list {
                let mut item = convert_annotation(pool, raw)?;
                item.target = index as u32 + 1;
                member.annotations.push(item);
            }
        }
    }
    Ok(member)
}

/// Declaration and type annotations attached to a class, field or method.
fn element_annotations(pool: &Pool<'_, '_>, attrs: &[RawAttribute<'_>]) -> Parse<Vec<AnnotationItem>> {
    let mut out = Vec::new();
    if let Some(attr) = pool.attribute(attrs, "RuntimeVisibleAnnotations")? {
        for raw in body(attr.info, annotations)? {
            out.push(convert_annotation(pool, &raw)?);
        }
    }
    if let Some(attr) = pool.attribute(attrs, "RuntimeVisibleTypeAnnotations")? {
        for raw in body(attr.info, type_annotations)? {
            let mut item = convert_annotation(pool, &raw.annotation)?;
            let path: Vec<String> = raw.path.iter().map(|(k, a)| format!("{k}:{a}")).collect();
            item.type_info = Some(TypeAnnotationInfo {
                target_type: raw.target_type,
                type_index: raw.type_index,
                bound_index: raw.bound_index,
                parameter_index: raw.parameter_index,
                type_path: path.join("/"),
            });
            out.push(item);
        }
    }
    Ok(out)
}

fn convert_annotation(pool: &Pool<'_, '_>, raw: &RawAnnotation) -> Parse<AnnotationItem> {
    let mut item = AnnotationItem::new(descriptor::field_type(&pool.utf8(raw.type_index)?)?);
    for (name, value) in &raw.pairs {
        let (ty, value) = convert_element(pool, value)?;
        item.members.push(AnnotationMember {
            ty,
            name: pool.utf8(*name)?,
            value,
        });
    }
    Ok(item)
}

/// Converts an element value, deriving its type from the tag.
fn convert_element(pool: &Pool<'_, '_>, raw: &RawElement) -> Parse<(String, AnnotationValue)> {
    let literal = |s: String| AnnotationValue::Literal(s);
    Ok(match raw {
        RawElement::Const(tag, index) => {
            let c = pool.get(*index)?;
            match (tag, c) {
                (b'B', Constant::Integer(v)) => ("byte".into(), literal(v.to_string())),
                (b'S', Constant::Integer(v)) => ("short".into(), literal(v.to_string())),
                (b'I', Constant::Integer(v)) => ("int".into(), literal(v.to_string())),
                (b'Z', Constant::Integer(v)) => ("boolean".into(), literal((*v != 0).to_string())),
                (b'C', Constant::Integer(v)) => (
                    "char".into(),
                    literal(char_literal(char::from_u32(*v as u32).unwrap_or('\u{fffd}'))),
                ),
                (b'J', Constant::Long(v)) => ("long".into(), literal(v.to_string())),
                (b'F', Constant::Float(v)) => ("float".into(), literal(float32_literal(*v))),
                (b'D', Constant::Double(v)) => ("double".into(), literal(float_literal(*v))),
                (b's', Constant::Utf8(_)) => ("java.lang.String".into(), AnnotationValue::Str(pool.utf8(*index)?)),
                (tag, other) => {
                    return Err(format!(
                        "element tag '{}' does not match constant {other:?}",
                        *tag as char
                    ));
                }
            }
        }
        RawElement::Enum(ty, constant) => {
            let ty = descriptor::field_type(&pool.utf8(*ty)?)?;
            let value = format!("{ty}.{}", pool.utf8(*constant)?);
            (ty, literal(value))
        }
        RawElement::Class(index) => {
            let target = descriptor::field_type(&pool.utf8(*index)?)?;
            ("java.lang.Class".into(), literal(format!("{target}.class")))
        }
        RawElement::Annotation(raw) => {
            let item = convert_annotation(pool, raw)?;
            (item.name.clone(), AnnotationValue::Annotation(Box::new(item)))
        }
        RawElement::Array(items) => {
            let mut values = Vec::with_capacity(items.len());
            let mut element_type = None;
            for item in items {
                let (ty, value) = convert_element(pool, item)?;
                element_type.get_or_insert(ty);
                values.push(value);
            }
            let ty = element_type.unwrap_or_else(|| "java.lang.Object".to_string());
            (format!("{ty}[]"), AnnotationValue::Array(values))
        }
    })
}

fn describe_module(raw: &RawClass<'_>, pool: &Pool<'_, '_>) -> Parse<ModuleDescription> {
    let attr = pool
        .attribute(&raw.attributes, "Module")?
        .ok_or_else(|| "module-info without a Module attribute".to_string())?;
    let m = body(attr.info, module_attribute)?;

    let mut module = ModuleDescription::new(pool.module_name(m.name)?);
    if m.version != 0 {
        module.version = Some(pool.utf8(m.version)?);
    }
    for (index, flags) in m.requires {
        module.requires.insert(Requires {
            name: pool.module_name(index)?,
            public: flags & 0x0020 != 0,
            synthetic: flags & 0x1000 != 0,
            mandated: flags & 0x8000 != 0,
        });
    }
    for (package, targets) in m.exports {
        let targets = targets
            .into_iter()
            .map(|t| pool.module_name(t))
            .collect::<Parse<BTreeSet<_>>>()?;
        module.exports.insert(pool.package_name(package)?, targets);
    }
    for service in m.uses {
        module.uses.insert(pool.class_name(service)?);
    }
    for (service, providers) in m.provides {
        let providers = providers
            .into_iter()
            .map(|p| pool.class_name(p))
            .collect::<Parse<BTreeSet<_>>>()?;
        module.provides.insert(pool.class_name(service)?, providers);
    }

    if let Some(attr) = pool.attribute(&raw.attributes, "ModulePackages")? {
        for index in body(attr.info, u2_list)? {
            module.packages.insert(pool.package_name(index)?);
        }
    }
    for package in module.exports.keys() {
        module.packages.insert(package.clone());
    }
    module.conceals = module
        .packages
        .iter()
        .filter(|p| !module.exports.contains_key(*p))
        .cloned()
        .collect();
    if let Some(attr) = pool.attribute(&raw.attributes, "ModuleMainClass")? {
        module.main_class = Some(pool.class_name(body(attr.info, u2)?)?);
    }
    Ok(module)
}
