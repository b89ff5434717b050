//! Annotation model and its line grammar.
//!
//! ```text
//! anno <target> <name>(<type> <member>=<value>, ...)
//! annoEx <target> <targetType> <typeIndex> <boundIndex> <paramIndex> <typePath> <name>(...)
//! ```
//!
//! `target` is 0 for the annotated element itself and `n` for its `n-1`th
//! parameter. Values are literals, quoted strings, bracketed arrays, or a
//! complete nested annotation.

use std::fmt;

use crate::constant::{escape_java, unescape_java};
use crate::error::{Result, SigError};
use crate::grammar::{matching_close, scan_to, skip_quoted};

pub const ANNOTATION_PREFIX: &str = "anno";
pub const ANNOTATION_EX_PREFIX: &str = "annoEx";

const CLASS_TYPE_PREFIX: &str = "java.lang.Class<";
const ABSENT: &str = "-";

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationItem {
    pub target: u32,
    pub name: String,
    pub members: Vec<AnnotationMember>,
    /// Present for type annotations (`annoEx`).
    pub type_info: Option<TypeAnnotationInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeAnnotationInfo {
    pub target_type: u8,
    pub type_index: Option<u16>,
    pub bound_index: Option<u16>,
    pub parameter_index: Option<u16>,
    /// `kind:argument` steps joined by `/`; empty for the outermost type.
    pub type_path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationMember {
    pub ty: String,
    pub name: String,
    pub value: AnnotationValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    /// Numbers, booleans, char literals, enum constants and class literals,
    /// kept verbatim.
    Literal(String),
    /// Decoded string contents.
    Str(String),
    Array(Vec<AnnotationValue>),
    Annotation(Box<AnnotationItem>),
}

impl AnnotationItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            target: 0,
            name: name.into(),
            members: Vec::new(),
            type_info: None,
        }
    }

    pub fn with_member(
        mut self,
        ty: impl Into<String>,
        name: impl Into<String>,
        value: AnnotationValue,
    ) -> Self {
        self.members.push(AnnotationMember {
            ty: ty.into(),
            name: name.into(),
            value,
        });
        self
    }

    pub fn is_annotation_line(line: &str) -> bool {
        starts_annotation(line)
    }

    pub fn member(&self, name: &str) -> Option<&AnnotationValue> {
        self.members.iter().find(|m| m.name == name).map(|m| &m.value)
    }

    /// Parses a complete annotation line.
    pub fn parse(line: &str) -> Result<AnnotationItem> {
        let (item, end) = parse_at(line, 0).map_err(|m| SigError::malformed(0, m, line))?;
        if !line[end..].trim().is_empty() {
            return Err(SigError::malformed(0, "trailing text after annotation", line));
        }
        Ok(item)
    }

    /// Parses an annotation at the start of `text` and reports how many
    /// bytes it consumed.
    pub fn parse_prefix(text: &str) -> Result<(AnnotationItem, usize)> {
        parse_at(text, 0).map_err(|m| SigError::malformed(0, m, text))
    }
}

fn starts_annotation(text: &str) -> bool {
    text.starts_with("anno ") || text.starts_with("annoEx ")
}

type Parsed<T> = std::result::Result<T, String>;

fn skip_spaces(s: &str, mut pos: usize) -> usize {
    let bytes = s.as_bytes();
    while pos < bytes.len() && bytes[pos] == b' ' {
        pos += 1;
    }
    pos
}

fn word<'a>(s: &'a str, pos: &mut usize, what: &str) -> Parsed<&'a str> {
    let start = skip_spaces(s, *pos);
    let end = s[start..].find(' ').map(|i| start + i).unwrap_or(s.len());
    if start == end {
        return Err(format!("missing {what}"));
    }
    *pos = end;
    Ok(&s[start..end])
}

fn number<T: std::str::FromStr>(s: &str, pos: &mut usize, what: &str) -> Parsed<T> {
    let w = word(s, pos, what)?;
    w.parse().map_err(|_| format!("bad {what} {w:?}"))
}

fn optional_number(s: &str, pos: &mut usize, what: &str) -> Parsed<Option<u16>> {
    let w = word(s, pos, what)?;
    if w == ABSENT {
        return Ok(None);
    }
    w.parse().map(Some).map_err(|_| format!("bad {what} {w:?}"))
}

fn byte_at(s: &str, pos: usize) -> Option<u8> {
    s.as_bytes().get(pos).copied()
}

fn parse_at(s: &str, start: usize) -> Parsed<(AnnotationItem, usize)> {
    let rest = &s[start..];
    let (extended, mut pos) = if rest.starts_with("annoEx ") {
        (true, start + ANNOTATION_EX_PREFIX.len())
    } else if rest.starts_with("anno ") {
        (false, start + ANNOTATION_PREFIX.len())
    } else {
        return Err("expected annotation".to_string());
    };

    let target = number(s, &mut pos, "annotation target")?;
    let type_info = if extended {
        let target_type = number(s, &mut pos, "type annotation target type")?;
        let type_index = optional_number(s, &mut pos, "type index")?;
        let bound_index = optional_number(s, &mut pos, "bound index")?;
        let parameter_index = optional_number(s, &mut pos, "parameter index")?;
        let path = word(s, &mut pos, "type path")?;
        Some(TypeAnnotationInfo {
            target_type,
            type_index,
            bound_index,
            parameter_index,
            type_path: if path == ABSENT { String::new() } else { path.to_string() },
        })
    } else {
        None
    };

    pos = skip_spaces(s, pos);
    let open = s[pos..]
        .find('(')
        .map(|i| pos + i)
        .ok_or_else(|| "missing '(' after annotation name".to_string())?;
    let name = s[pos..open].trim();
    if name.is_empty() || name.contains(' ') {
        return Err(format!("bad annotation name {name:?}"));
    }
    pos = open + 1;

    let mut members = Vec::new();
    loop {
        pos = skip_spaces(s, pos);
        match byte_at(s, pos) {
            Some(b')') => {
                pos += 1;
                break;
            }
            None => return Err("unterminated annotation".to_string()),
            _ => {}
        }

        let type_end = if s[pos..].starts_with(CLASS_TYPE_PREFIX) {
            let mut end = matching_close(s, pos + CLASS_TYPE_PREFIX.len() - 1)? + 1;
            while s[end..].starts_with("[]") {
                end += 2;
            }
            end
        } else {
            s[pos..]
                .find(' ')
                .map(|i| pos + i)
                .ok_or_else(|| "missing annotation member name".to_string())?
        };
        let ty = s[pos..type_end].to_string();

        let eq = s[type_end..]
            .find('=')
            .map(|i| type_end + i)
            .ok_or_else(|| format!("missing '=' after member of type {ty}"))?;
        let member_name = s[type_end..eq].trim();
        if member_name.is_empty() || member_name.contains(' ') {
            return Err(format!("bad annotation member name {member_name:?}"));
        }

        let (value, end) = parse_value(s, eq + 1)?;
        members.push(AnnotationMember {
            ty,
            name: member_name.to_string(),
            value,
        });

        pos = skip_spaces(s, end);
        match byte_at(s, pos) {
            Some(b',') => pos += 1,
            Some(b')') => {
                pos += 1;
                break;
            }
            _ => return Err("expected ',' or ')' after annotation member".to_string()),
        }
    }

    Ok((
        AnnotationItem {
            target,
            name: name.to_string(),
            members,
            type_info,
        },
        pos,
    ))
}

fn parse_value(s: &str, pos: usize) -> Parsed<(AnnotationValue, usize)> {
    let pos = skip_spaces(s, pos);
    let bytes = s.as_bytes();
    match byte_at(s, pos) {
        None => Err("missing annotation value".to_string()),
        Some(b'[') => {
            let mut items = Vec::new();
            let mut cur = skip_spaces(s, pos + 1);
            if byte_at(s, cur) == Some(b']') {
                return Ok((AnnotationValue::Array(items), cur + 1));
            }
            loop {
                let (item, end) = parse_value(s, cur)?;
                items.push(item);
                cur = skip_spaces(s, end);
                match byte_at(s, cur) {
                    Some(b',') => cur += 1,
                    Some(b']') => return Ok((AnnotationValue::Array(items), cur + 1)),
                    _ => return Err("expected ',' or ']' in array value".to_string()),
                }
            }
        }
        Some(b'"') => {
            let close = skip_quoted(bytes, pos).ok_or_else(|| "unterminated string value".to_string())?;
            let text = unescape_java(&s[pos + 1..close])?;
            Ok((AnnotationValue::Str(text), close + 1))
        }
        Some(b'\'') => {
            let close = skip_quoted(bytes, pos).ok_or_else(|| "unterminated char value".to_string())?;
            Ok((AnnotationValue::Literal(s[pos..=close].to_string()), close + 1))
        }
        Some(_) if starts_annotation(&s[pos..]) => {
            let (item, end) = parse_at(s, pos)?;
            Ok((AnnotationValue::Annotation(Box::new(item)), end))
        }
        Some(_) => {
            let end = scan_to(s, pos, b",)]")?;
            let text = s[pos..end].trim_end();
            if text.is_empty() {
                return Err("empty annotation value".to_string());
            }
            Ok((AnnotationValue::Literal(text.to_string()), end))
        }
    }
}

fn write_index(f: &mut fmt::Formatter<'_>, index: Option<u16>) -> fmt::Result {
    match index {
        Some(i) => write!(f, " {i}"),
        None => write!(f, " {ABSENT}"),
    }
}

impl fmt::Display for AnnotationItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.type_info {
            None => write!(f, "{ANNOTATION_PREFIX} {}", self.target)?,
            Some(info) => {
                write!(f, "{ANNOTATION_EX_PREFIX} {} {}", self.target, info.target_type)?;
                write_index(f, info.type_index)?;
                write_index(f, info.bound_index)?;
                write_index(f, info.parameter_index)?;
                if info.type_path.is_empty() {
                    write!(f, " {ABSENT}")?;
                } else {
                    write!(f, " {}", info.type_path)?;
                }
            }
        }
        write!(f, " {}(", self.name)?;
        for (i, m) in self.members.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}={}", m.ty, m.name, m.value)?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for AnnotationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationValue::Literal(text) => f.write_str(text),
            AnnotationValue::Str(text) => write!(f, "\"{}\"", escape_java(text, '"')),
            AnnotationValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            AnnotationValue::Annotation(item) => write!(f, "{item}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_annotation() -> Result<()> {
        let a = AnnotationItem::parse("anno 0 java.lang.Deprecated()")?;
        assert_eq!(a.name, "java.lang.Deprecated");
        assert!(a.members.is_empty());
        assert_eq!(a.to_string(), "anno 0 java.lang.Deprecated()");
        Ok(())
    }

    #[test]
    fn array_of_nested_annotations_with_escaped_strings() -> Result<()> {
        let line = r#"anno 0 a.Outer(a.Inner[] value=[anno 0 a.Inner(java.lang.String s="say \"hi\", é)", int n=1), anno 0 a.Inner(java.lang.String s="x\u0041", int n=2)])"#;
        let a = AnnotationItem::parse(line)?;
        let Some(AnnotationValue::Array(items)) = a.member("value") else {
            panic!("value is not an array");
        };
        assert_eq!(items.len(), 2);
        let AnnotationValue::Annotation(first) = &items[0] else {
            panic!("not a nested annotation");
        };
        assert_eq!(first.name, "a.Inner");
        assert_eq!(
            first.member("s"),
            Some(&AnnotationValue::Str("say \"hi\", \u{e9})".to_string()))
        );
        assert_eq!(first.member("n"), Some(&AnnotationValue::Literal("1".to_string())));
        let AnnotationValue::Annotation(second) = &items[1] else {
            panic!("not a nested annotation");
        };
        assert_eq!(second.member("s"), Some(&AnnotationValue::Str("xA".to_string())));

        let again = AnnotationItem::parse(&a.to_string())?;
        assert_eq!(again, a);
        Ok(())
    }

    #[test]
    fn class_typed_member_with_wildcard() -> Result<()> {
        let line = "anno 0 a.Uses(java.lang.Class<? extends java.lang.Runnable>[] value=[java.lang.Thread, a.Task], char c='\\'')";
        let a = AnnotationItem::parse(line)?;
        assert_eq!(a.members[0].ty, "java.lang.Class<? extends java.lang.Runnable>[]");
        assert_eq!(
            a.members[0].value,
            AnnotationValue::Array(vec![
                AnnotationValue::Literal("java.lang.Thread".to_string()),
                AnnotationValue::Literal("a.Task".to_string()),
            ])
        );
        assert_eq!(a.members[1].value, AnnotationValue::Literal("'\\''".to_string()));
        Ok(())
    }

    #[test]
    fn extended_annotation_reports_consumed_length() -> Result<()> {
        let text = "annoEx 1 22 - - 0 0:0/3:0 a.NonNull() trailing";
        let (a, used) = AnnotationItem::parse_prefix(text)?;
        assert_eq!(&text[used..], " trailing");
        let info = a.type_info.as_ref().expect("type info");
        assert_eq!(info.target_type, 22);
        assert_eq!(info.type_index, None);
        assert_eq!(info.parameter_index, Some(0));
        assert_eq!(info.type_path, "0:0/3:0");
        assert_eq!(a.target, 1);
        assert_eq!(a.to_string(), "annoEx 1 22 - - 0 0:0/3:0 a.NonNull()");
        Ok(())
    }

    #[test]
    fn malformed_annotations_fail() {
        assert!(AnnotationItem::parse("anno 0 a.B(int x=1").is_err());
        assert!(AnnotationItem::parse("anno 0 a.B(int x=[1, 2)").is_err());
        assert!(AnnotationItem::parse("anno x a.B()").is_err());
        assert!(AnnotationItem::parse("anno 0 a.B(java.lang.String s=\"open)").is_err());
    }
}
