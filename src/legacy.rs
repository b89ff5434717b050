//! Per-format line rewrites.
//!
//! Older formats share the modern line grammar except for a handful of
//! spellings. Each [`LegacyRule`] is a pair of small functions: `decode`
//! turns an old spelling into the modern one before parsing, `encode` does
//! the reverse after formatting. A format lists the rules it needs and the
//! reader/writer apply them in order.

use crate::constant::{decode_legacy, encode_legacy};
use crate::error::{Result, SigError};
use crate::grammar::{scan_to_with, split_top_level_with};
use crate::member::{MemberType, simple_name};
use crate::modifiers::Modifiers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LegacyRule {
    /// `SUPR null` stands for "no superclass".
    NullSuper,
    /// Array types use VM descriptors: `[I`, `[Ljava.lang.String;`.
    VmArrays,
    /// Constructors are named `<init>`.
    InitConstructors,
    /// Constants are written `<constant> <value="...">`.
    EncodedConstants,
}

pub const NULL_SUPER_LINE: &str = "SUPR null";
const INIT: &str = "<init>";
const CONSTANT_MARKER: &str = " <constant> <value=\"";
/// A VM array descriptor opens with `[` that is never closed, so old lines
/// group tokens by parentheses and angle brackets only.
const LEGACY_BRACKETS: &[u8] = b"(<";

pub struct LineContext<'a> {
    pub class_name: &'a str,
}

impl LegacyRule {
    /// Returns `None` when the line carries no information in the modern form.
    pub fn decode(self, line: String, ctx: &LineContext<'_>) -> Result<Option<String>> {
        match self {
            LegacyRule::NullSuper => Ok((line != NULL_SUPER_LINE).then_some(line)),
            LegacyRule::VmArrays => rewrite_types(&line, vm_to_source).map(Some),
            LegacyRule::InitConstructors => rename_constructor(&line, INIT, simple_name(ctx.class_name)).map(Some),
            LegacyRule::EncodedConstants => decode_constant(line).map(Some),
        }
    }

    pub fn encode(self, line: String, ctx: &LineContext<'_>) -> Result<String> {
        match self {
            LegacyRule::NullSuper => Ok(line),
            LegacyRule::VmArrays => rewrite_types(&line, source_to_vm),
            LegacyRule::InitConstructors => rename_constructor(&line, simple_name(ctx.class_name), INIT),
            LegacyRule::EncodedConstants => encode_constant(line),
        }
    }
}

fn primitive_from_code(code: u8) -> Option<&'static str> {
    Some(match code {
        b'B' => "byte",
        b'C' => "char",
        b'D' => "double",
        b'F' => "float",
        b'I' => "int",
        b'J' => "long",
        b'S' => "short",
        b'Z' => "boolean",
        b'V' => "void",
        _ => return None,
    })
}

fn code_from_primitive(name: &str) -> Option<char> {
    Some(match name {
        "byte" => 'B',
        "char" => 'C',
        "double" => 'D',
        "float" => 'F',
        "int" => 'I',
        "long" => 'J',
        "short" => 'S',
        "boolean" => 'Z',
        _ => return None,
    })
}

/// `[[I` -> `int[][]`, `[Ljava.lang.String;` -> `java.lang.String[]`.
pub fn vm_to_source(ty: &str) -> String {
    let dims = ty.bytes().take_while(|&b| b == b'[').count();
    if dims == 0 {
        return ty.to_string();
    }
    let element = &ty[dims..];
    let base = if let Some(name) = element.strip_prefix('L').and_then(|e| e.strip_suffix(';')) {
        name.to_string()
    } else if element.len() == 1 {
        match primitive_from_code(element.as_bytes()[0]) {
            Some(p) => p.to_string(),
            None => return ty.to_string(),
        }
    } else {
        return ty.to_string();
    };
    format!("{base}{}", "[]".repeat(dims))
}

/// Inverse of [`vm_to_source`]; non-array types pass through.
pub fn source_to_vm(ty: &str) -> String {
    let mut base = ty;
    let mut dims = 0;
    while let Some(stripped) = base.strip_suffix("[]") {
        base = stripped;
        dims += 1;
    }
    if dims == 0 {
        return ty.to_string();
    }
    let element = match code_from_primitive(base) {
        Some(code) => code.to_string(),
        None => format!("L{base};"),
    };
    format!("{}{element}", "[".repeat(dims))
}

/// Byte ranges of the top-level tokens of a line.
fn token_spans(line: &str) -> Result<Vec<(usize, usize)>> {
    let mut spans = Vec::new();
    let bytes = line.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        if bytes[pos] == b' ' {
            pos += 1;
            continue;
        }
        let end = scan_to_with(line, pos, b" ", LEGACY_BRACKETS).map_err(|m| SigError::malformed(0, m, line))?;
        spans.push((pos, end));
        pos = end;
    }
    Ok(spans)
}

fn apply(line: &str, mut edits: Vec<((usize, usize), String)>) -> String {
    edits.sort_by_key(|((start, _), _)| std::cmp::Reverse(*start));
    let mut out = line.to_string();
    for ((start, end), text) in edits {
        out.replace_range(start..end, &text);
    }
    out
}

fn map_args(args: &str, f: fn(&str) -> String, line: &str) -> Result<String> {
    let parts = split_top_level_with(args, LEGACY_BRACKETS).map_err(|m| SigError::malformed(0, m, line))?;
    Ok(parts.into_iter().map(f).collect::<Vec<_>>().join(","))
}

fn map_call(token: &str, f: fn(&str) -> String, line: &str) -> Result<String> {
    let open = token
        .find('(')
        .ok_or_else(|| SigError::malformed(0, "missing argument list", line))?;
    let inner = token[open + 1..].strip_suffix(')').unwrap_or(&token[open + 1..]);
    Ok(format!("{}({})", &token[..open], map_args(inner, f, line)?))
}

/// Index of the first token after the tag and the modifier keywords.
fn first_after_modifiers(line: &str, spans: &[(usize, usize)]) -> usize {
    spans
        .iter()
        .skip(1)
        .position(|&(s, e)| Modifiers::from_keyword(&line[s..e]).is_none())
        .map(|i| i + 1)
        .unwrap_or(spans.len())
}

fn is_type_parameters(token: &str) -> bool {
    token.starts_with('<') && !token.contains('(')
}

fn rewrite_types(line: &str, f: fn(&str) -> String) -> Result<String> {
    let tag = line.split(' ').next().unwrap_or_default();
    let kind = match MemberType::from_prefix(tag) {
        Some(k @ (MemberType::Field | MemberType::Method | MemberType::Constructor)) => k,
        _ => return Ok(line.to_string()),
    };
    let spans = token_spans(line)?;
    let mut idx = first_after_modifiers(line, &spans);
    let token = |i: usize| spans.get(i).map(|&(s, e)| &line[s..e]);
    let mut edits = Vec::new();

    if token(idx).is_some_and(is_type_parameters) {
        idx += 1;
    }
    match kind {
        MemberType::Field => {
            if let Some(t) = token(idx) {
                edits.push((spans[idx], f(t)));
            }
        }
        MemberType::Method => {
            if let Some(t) = token(idx) {
                edits.push((spans[idx], f(t)));
            }
            if let Some(call) = token(idx + 1) {
                edits.push((spans[idx + 1], map_call(call, f, line)?));
            }
        }
        _ => {
            if let Some(call) = token(idx) {
                edits.push((spans[idx], map_call(call, f, line)?));
            }
        }
    }
    Ok(apply(line, edits))
}

fn rename_constructor(line: &str, from: &str, to: &str) -> Result<String> {
    if !line.starts_with("CONS ") {
        return Ok(line.to_string());
    }
    let spans = token_spans(line)?;
    let call = spans
        .iter()
        .find(|&&(s, e)| line[s..e].contains('('))
        .copied()
        .ok_or_else(|| SigError::malformed(0, "missing argument list", line))?;
    let token = &line[call.0..call.1];
    match token.strip_prefix(from) {
        Some(rest) if rest.starts_with('(') => Ok(apply(line, vec![(call, format!("{to}{rest}"))])),
        _ => Ok(line.to_string()),
    }
}

fn field_type(decl: &str) -> Result<String> {
    let spans = token_spans(decl)?;
    let idx = first_after_modifiers(decl, &spans);
    spans
        .get(idx)
        .map(|&(s, e)| decl[s..e].to_string())
        .ok_or_else(|| SigError::malformed(0, "missing field type", decl))
}

fn decode_constant(line: String) -> Result<String> {
    if !line.starts_with("FLD ") {
        return Ok(line);
    }
    let Some(at) = line.find(CONSTANT_MARKER) else {
        return Ok(line);
    };
    let decl = &line[..at];
    let payload = line[at + CONSTANT_MARKER.len()..]
        .strip_suffix("\">")
        .ok_or_else(|| SigError::malformed(0, "unterminated <value=...>", &line))?;
    let modern = decode_legacy(&field_type(decl)?, payload)
        .map_err(|m| SigError::malformed(0, m, &line))?;
    Ok(format!("{decl} = {modern}"))
}

fn encode_constant(line: String) -> Result<String> {
    if !line.starts_with("FLD ") {
        return Ok(line);
    }
    let Some(at) = line.find(" = ") else {
        return Ok(line);
    };
    let decl = &line[..at];
    let encoded = encode_legacy(&field_type(decl)?, &line[at + 3..]);
    Ok(format!("{decl}{CONSTANT_MARKER}{encoded}\">"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> LineContext<'static> {
        LineContext { class_name: "a.b.Foo" }
    }

    #[test]
    fn vm_descriptors_convert_both_ways() {
        assert_eq!(vm_to_source("[I"), "int[]");
        assert_eq!(vm_to_source("[[Ljava.lang.String;"), "java.lang.String[][]");
        assert_eq!(vm_to_source("java.lang.String"), "java.lang.String");
        assert_eq!(source_to_vm("int[]"), "[I");
        assert_eq!(source_to_vm("java.lang.String[][]"), "[[Ljava.lang.String;");
        assert_eq!(source_to_vm("long"), "long");
    }

    #[test]
    fn method_types_are_rewritten() -> Result<()> {
        let line = "METH public [Ljava.lang.String; split(java.lang.String,[C,int)".to_string();
        let out = LegacyRule::VmArrays.decode(line, &ctx())?;
        assert_eq!(
            out.as_deref(),
            Some("METH public java.lang.String[] split(java.lang.String,char[],int)")
        );
        let back = LegacyRule::VmArrays.encode(out.unwrap_or_default(), &ctx())?;
        assert_eq!(back, "METH public [Ljava.lang.String; split(java.lang.String,[C,int)");
        Ok(())
    }

    #[test]
    fn legacy_field_with_array_and_constant() -> Result<()> {
        let line = "FLD public final static [I X <constant> <value=\"5\">".to_string();
        let line = LegacyRule::VmArrays.decode(line, &ctx())?.unwrap_or_default();
        let line = LegacyRule::EncodedConstants.decode(line, &ctx())?.unwrap_or_default();
        assert_eq!(line, "FLD public final static int[] X = 5");
        Ok(())
    }

    #[test]
    fn array_descriptors_do_not_open_brackets() -> Result<()> {
        let line = "METH public [[I grid([Ljava.lang.String;,[[J)".to_string();
        let out = LegacyRule::VmArrays.decode(line, &ctx())?;
        assert_eq!(out.as_deref(), Some("METH public int[][] grid(java.lang.String[],long[][])"));

        let field = LegacyRule::VmArrays.encode("FLD public int[] xs".to_string(), &ctx())?;
        assert_eq!(field, "FLD public [I xs");
        assert_eq!(
            LegacyRule::VmArrays.decode(field, &ctx())?.as_deref(),
            Some("FLD public int[] xs")
        );
        Ok(())
    }

    #[test]
    fn legacy_constructor_with_array_argument() -> Result<()> {
        let line = "CONS public <init>([B,int)".to_string();
        let line = LegacyRule::VmArrays.decode(line, &ctx())?.unwrap_or_default();
        let line = LegacyRule::InitConstructors.decode(line, &ctx())?.unwrap_or_default();
        assert_eq!(line, "CONS public Foo(byte[],int)");
        Ok(())
    }

    #[test]
    fn constructors_and_null_super() -> Result<()> {
        assert_eq!(
            LegacyRule::InitConstructors.decode("CONS public <init>(int)".to_string(), &ctx())?,
            Some("CONS public Foo(int)".to_string())
        );
        assert_eq!(
            LegacyRule::InitConstructors.encode("CONS public Foo(int)".to_string(), &ctx())?,
            "CONS public <init>(int)"
        );
        assert_eq!(LegacyRule::NullSuper.decode(NULL_SUPER_LINE.to_string(), &ctx())?, None);
        Ok(())
    }

    #[test]
    fn string_constants_are_unescaped() -> Result<()> {
        let line = "FLD public final static java.lang.String S <constant> <value=\"caf\\u00e9\">".to_string();
        let out = LegacyRule::EncodedConstants.decode(line, &ctx())?;
        assert_eq!(
            out.as_deref(),
            Some("FLD public final static java.lang.String S = \"caf\\u00e9\"")
        );
        Ok(())
    }
}
