//! Line-level micro-grammar of the signature format.
//!
//! Every line is scanned left to right with a stack of open brackets; a
//! token boundary is only accepted when no `(`, `[` or `<` is open and no
//! quoted literal is in progress, so generic arguments, argument lists and
//! annotation arrays never split a token.

use std::collections::BTreeSet;

use crate::annotation::AnnotationItem;
use crate::error::{Result, SigError};
use crate::member::{MemberDescription, MemberDetail, MemberType};
use crate::modifiers::Modifiers;

pub const CLASS_PREFIX: &str = "CLSS";
pub const HIDDEN_FIELDS_PREFIX: &str = "hfds";
pub const HIDDEN_CLASSES_PREFIX: &str = "hcls";
pub const MODULE_PREFIX: &str = "<module";

const THROWS: &str = "throws";
const DEFAULT: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Class,
    Member(MemberType),
    Annotation,
    HiddenFields,
    HiddenClasses,
    Module,
    Unknown,
}

pub fn classify(line: &str) -> LineKind {
    if line.starts_with(MODULE_PREFIX) {
        return LineKind::Module;
    }
    let tag = line.split(' ').next().unwrap_or_default();
    match tag {
        CLASS_PREFIX => LineKind::Class,
        HIDDEN_FIELDS_PREFIX => LineKind::HiddenFields,
        HIDDEN_CLASSES_PREFIX => LineKind::HiddenClasses,
        _ if AnnotationItem::is_annotation_line(line) => LineKind::Annotation,
        _ => match MemberType::from_prefix(tag) {
            Some(t) => LineKind::Member(t),
            None => LineKind::Unknown,
        },
    }
}

fn closer(open: u8) -> u8 {
    match open {
        b'(' => b')',
        b'[' => b']',
        _ => b'>',
    }
}

/// Index of the quote closing the literal opened at `start`.
pub(crate) fn skip_quoted(bytes: &[u8], start: usize) -> Option<usize> {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            c if c == quote => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Brackets that group tokens in the modern grammar.
pub(crate) const BRACKETS: &[u8] = b"([<";

/// Scans from `from` to the first byte of `stops` found outside any bracket
/// or quoted literal. Returns `text.len()` when the text ends first.
pub(crate) fn scan_to(text: &str, from: usize, stops: &[u8]) -> std::result::Result<usize, String> {
    scan_to_with(text, from, stops, BRACKETS)
}

/// [`scan_to`] counting only the opening brackets listed in `opens`; any
/// other bracket byte is ordinary text.
pub(crate) fn scan_to_with(
    text: &str,
    from: usize,
    stops: &[u8],
    opens: &[u8],
) -> std::result::Result<usize, String> {
    let bytes = text.as_bytes();
    let mut open: Vec<u8> = Vec::new();
    let mut i = from;
    while i < bytes.len() {
        let c = bytes[i];
        if open.is_empty() && stops.contains(&c) {
            return Ok(i);
        }
        match c {
            b'"' | b'\'' => {
                i = skip_quoted(bytes, i).ok_or_else(|| "unterminated quoted literal".to_string())?;
            }
            _ if opens.contains(&c) => open.push(c),
            b')' | b']' | b'>' if opens.iter().any(|&o| closer(o) == c) => match open.last() {
                Some(&o) if closer(o) == c => {
                    open.pop();
                }
                _ => return Err(format!("unbalanced '{}'", c as char)),
            },
            _ => {}
        }
        i += 1;
    }
    if let Some(&o) = open.last() {
        return Err(format!("unclosed '{}'", o as char));
    }
    Ok(bytes.len())
}

/// Index of the bracket closing the one at `start`.
pub(crate) fn matching_close(text: &str, start: usize) -> std::result::Result<usize, String> {
    let bytes = text.as_bytes();
    let want = closer(bytes[start]);
    let mut open: Vec<u8> = vec![bytes[start]];
    let mut i = start + 1;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'"' | b'\'' => {
                i = skip_quoted(bytes, i).ok_or_else(|| "unterminated quoted literal".to_string())?;
            }
            b'(' | b'[' | b'<' => open.push(c),
            b')' | b']' | b'>' => {
                match open.last() {
                    Some(&o) if closer(o) == c => {
                        open.pop();
                    }
                    _ => return Err(format!("unbalanced '{}'", c as char)),
                }
                if open.is_empty() {
                    debug_assert_eq!(c, want);
                    return Ok(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(format!("unclosed '{}'", want as char))
}

/// Splits on commas that sit outside brackets and quotes.
pub(crate) fn split_top_level(text: &str) -> std::result::Result<Vec<&str>, String> {
    split_top_level_with(text, BRACKETS)
}

/// [`split_top_level`] counting only the opening brackets in `opens`.
pub(crate) fn split_top_level_with<'a>(
    text: &'a str,
    opens: &[u8],
) -> std::result::Result<Vec<&'a str>, String> {
    let mut parts = Vec::new();
    let mut start = 0;
    while start <= text.len() {
        let end = scan_to_with(text, start, b",", opens)?;
        let part = text[start..end].trim();
        if !part.is_empty() {
            parts.push(part);
        }
        start = end + 1;
    }
    Ok(parts)
}

/// Removes generic parameters and arguments; varargs become plain arrays.
pub fn strip_generics(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '<' => depth += 1,
            '>' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.replace("...", "[]")
}

const OBJECT: &str = "java.lang.Object";

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '.')
}

/// Type variables in scope and what each one erases to.
///
/// Built from a class's type parameters and extended with a method's own;
/// later declarations shadow earlier ones.
#[derive(Debug, Clone, Default)]
pub struct Erasure {
    bounds: Vec<(String, String)>,
}

impl Erasure {
    pub fn new(type_parameters: Option<&str>) -> Self {
        Self::default().with(type_parameters)
    }

    /// A nested scope that adds `type_parameters` (`<T extends A & B, U>`).
    pub fn with(&self, type_parameters: Option<&str>) -> Self {
        let mut scope = self.clone();
        let Some(list) = type_parameters
            .map(str::trim)
            .and_then(|t| t.strip_prefix('<'))
            .and_then(|t| t.strip_suffix('>'))
        else {
            return scope;
        };
        for param in split_top_level(list).unwrap_or_default() {
            let (name, bound) = match param.split_once(" extends ") {
                Some((name, bounds)) => {
                    let first = strip_generics(bounds);
                    let first = first.split('&').next().unwrap_or_default().trim().to_string();
                    (name.trim(), first)
                }
                None => (param.trim(), OBJECT.to_string()),
            };
            scope.bounds.push((name.to_string(), bound));
        }
        scope
    }

    fn resolve(&self, name: &str) -> Option<String> {
        let mut current = name;
        let mut hops = 0;
        while let Some((_, bound)) = self.bounds.iter().rev().find(|(n, _)| n == current) {
            hops += 1;
            if hops > self.bounds.len() {
                return Some(OBJECT.to_string());
            }
            current = bound;
        }
        (hops > 0).then(|| current.to_string())
    }

    /// `text` with generics removed and every type variable replaced by its
    /// first bound, or `java.lang.Object` when it has none.
    pub fn erase(&self, text: &str) -> String {
        let stripped = strip_generics(text);
        if self.bounds.is_empty() {
            return stripped;
        }
        let mut out = String::with_capacity(stripped.len());
        let mut word = String::new();
        for c in stripped.chars().chain(std::iter::once(' ')) {
            if is_name_char(c) {
                word.push(c);
                continue;
            }
            if !word.is_empty() {
                match self.resolve(&word) {
                    Some(erased) => out.push_str(&erased),
                    None => out.push_str(&word),
                }
                word.clear();
            }
            out.push(c);
        }
        out.pop();
        out
    }
}

/// Space-separated top-level tokens of one line.
pub(crate) struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn fail(&self, message: impl Into<String>) -> SigError {
        SigError::malformed(0, message, self.text)
    }

    fn skip_spaces(&mut self) {
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos] == b' ' {
            self.pos += 1;
        }
    }

    pub fn peek(&mut self) -> Result<Option<&'a str>> {
        let saved = self.pos;
        let token = self.next()?;
        self.pos = saved;
        Ok(token)
    }

    pub fn next(&mut self) -> Result<Option<&'a str>> {
        self.skip_spaces();
        if self.pos >= self.text.len() {
            return Ok(None);
        }
        let end = scan_to(self.text, self.pos, b" ").map_err(|m| self.fail(m))?;
        let token = &self.text[self.pos..end];
        self.pos = end;
        Ok(Some(token))
    }

    pub fn expect(&mut self, what: &str) -> Result<&'a str> {
        self.next()?
            .ok_or_else(|| self.fail(format!("missing {what}")))
    }

    pub fn rest(&mut self) -> &'a str {
        self.skip_spaces();
        let rest = &self.text[self.pos..];
        self.pos = self.text.len();
        rest.trim_end()
    }

    pub fn modifiers(&mut self) -> Result<Modifiers> {
        let mut mods = Modifiers::empty();
        while let Some(token) = self.peek()? {
            match Modifiers::from_keyword(token) {
                Some(flag) => {
                    mods |= flag;
                    self.next()?;
                }
                None => break,
            }
        }
        Ok(mods)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassHeader {
    pub modifiers: Modifiers,
    pub name: String,
    pub type_parameters: Option<String>,
}

pub fn parse_class_header(line: &str) -> Result<ClassHeader> {
    let mut sc = Scanner::new(line);
    sc.expect(CLASS_PREFIX)?;
    let modifiers = sc.modifiers()?;
    let token = sc.expect("class name")?;
    if sc.next()?.is_some() {
        return Err(SigError::malformed(0, "trailing tokens after class name", line));
    }
    let (name, type_parameters) = match token.find('<') {
        Some(i) => (&token[..i], Some(token[i..].to_string())),
        None => (token, None),
    };
    Ok(ClassHeader {
        modifiers,
        name: name.to_string(),
        type_parameters,
    })
}

pub fn parse_hidden(line: &str) -> BTreeSet<String> {
    let body = line.split_once(' ').map(|(_, rest)| rest).unwrap_or_default();
    body.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn format_hidden(prefix: &str, names: &BTreeSet<String>) -> String {
    let list: Vec<&str> = names.iter().map(String::as_str).collect();
    format!("{prefix} {}", list.join(","))
}

fn split_call(token: &str, line: &str) -> Result<(String, String)> {
    let open = token
        .find('(')
        .ok_or_else(|| SigError::malformed(0, "missing argument list", line))?;
    if !token.ends_with(')') {
        return Err(SigError::malformed(0, "argument list is not closed", line));
    }
    let name = token[..open].to_string();
    let args = token[open + 1..token.len() - 1].to_string();
    if name.is_empty() {
        return Err(SigError::malformed(0, "missing member name", line));
    }
    Ok((name, args))
}

fn parse_throws(sc: &mut Scanner<'_>, line: &str) -> Result<Vec<String>> {
    if sc.peek()? != Some(THROWS) {
        return Ok(Vec::new());
    }
    sc.next()?;
    let list = sc.expect("throws list")?;
    let types = split_top_level(list).map_err(|m| SigError::malformed(0, m, line))?;
    Ok(types.into_iter().map(str::to_string).collect())
}

/// Parses one member line of the given kind. `class_name` becomes the
/// declaring class of the member.
pub fn parse_member(line: &str, kind: MemberType, class_name: &str) -> Result<MemberDescription> {
    let mut sc = Scanner::new(line);
    sc.expect(kind.prefix())?;
    let modifiers = sc.modifiers()?;

    let (name, detail) = match kind {
        MemberType::SuperClass => (sc.expect("superclass")?.to_string(), MemberDetail::SuperClass),
        MemberType::SuperInterface => (
            sc.expect("interface")?.to_string(),
            MemberDetail::SuperInterface { direct: true },
        ),
        MemberType::Inner => {
            let simple = sc.expect("nested class name")?;
            (format!("{class_name}${simple}"), MemberDetail::Inner)
        }
        MemberType::Field => {
            let (decl, constant) = match line.find(" = ") {
                Some(i) => (&line[..i], Some(line[i + 3..].to_string())),
                None => (line, None),
            };
            let mut sc = Scanner::new(decl);
            sc.expect(kind.prefix())?;
            sc.modifiers()?;
            let ty = sc.expect("field type")?.to_string();
            let name = sc.expect("field name")?.to_string();
            if sc.next()?.is_some() {
                return Err(SigError::malformed(0, "unexpected token after field name", line));
            }
            (name, MemberDetail::Field { ty, constant })
        }
        MemberType::Method => {
            let mut token = sc.expect("return type")?;
            let type_parameters = if token.starts_with('<') {
                let tp = token.to_string();
                token = sc.expect("return type")?;
                Some(tp)
            } else {
                None
            };
            let return_type = token.to_string();
            let (name, args) = split_call(sc.expect("method name")?, line)?;
            let throws = parse_throws(&mut sc, line)?;
            let default_value = match sc.next()? {
                Some(DEFAULT) => {
                    let value = sc.rest();
                    if value.is_empty() {
                        return Err(SigError::malformed(0, "missing default value", line));
                    }
                    Some(value.to_string())
                }
                Some(other) => {
                    return Err(SigError::malformed(0, format!("unexpected token {other:?}"), line));
                }
                None => None,
            };
            (
                name,
                MemberDetail::Method {
                    type_parameters,
                    return_type,
                    args,
                    throws,
                    default_value,
                },
            )
        }
        MemberType::Constructor => {
            let mut token = sc.expect("constructor name")?;
            let type_parameters = if token.starts_with('<') && !token.starts_with("<init>") {
                let tp = token.to_string();
                token = sc.expect("constructor name")?;
                Some(tp)
            } else {
                None
            };
            let (name, args) = split_call(token, line)?;
            let throws = parse_throws(&mut sc, line)?;
            if let Some(other) = sc.next()? {
                return Err(SigError::malformed(0, format!("unexpected token {other:?}"), line));
            }
            (
                name,
                MemberDetail::Constructor {
                    type_parameters,
                    args,
                    throws,
                },
            )
        }
    };

    if matches!(kind, MemberType::SuperClass | MemberType::SuperInterface | MemberType::Inner)
        && let Some(extra) = sc.next()?
    {
        return Err(SigError::malformed(0, format!("unexpected token {extra:?}"), line));
    }

    Ok(MemberDescription {
        declaring_class: class_name.to_string(),
        name,
        modifiers,
        annotations: Vec::new(),
        detail,
    })
}

/// What the writer may put on a member line.
#[derive(Debug, Clone, Copy)]
pub struct LineStyle {
    pub constants: bool,
    pub generics: bool,
}

fn join(tokens: Vec<String>) -> String {
    tokens
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_class_header(
    modifiers: Modifiers,
    name: &str,
    type_parameters: Option<&str>,
    style: LineStyle,
) -> String {
    let mut tokens = vec![CLASS_PREFIX.to_string()];
    tokens.extend(modifiers.keywords().into_iter().map(str::to_string));
    match type_parameters {
        Some(tp) if style.generics => tokens.push(format!("{name}{tp}")),
        _ => tokens.push(name.to_string()),
    }
    join(tokens)
}

/// Formats one member line. Without generics, types are erased against
/// `scope` (the class's type variables) plus the member's own.
pub fn format_member(
    member: &MemberDescription,
    class_name: &str,
    scope: &Erasure,
    style: LineStyle,
) -> String {
    let own_parameters = match &member.detail {
        MemberDetail::Method { type_parameters, .. } | MemberDetail::Constructor { type_parameters, .. } => {
            type_parameters.as_deref()
        }
        _ => None,
    };
    let scope = scope.with(own_parameters);
    let ty = |t: &str| {
        if style.generics {
            t.to_string()
        } else {
            scope.erase(t)
        }
    };
    let tp = |t: &Option<String>| match t {
        Some(t) if style.generics => t.clone(),
        _ => String::new(),
    };

    let mut tokens = vec![member.member_type().prefix().to_string()];
    tokens.extend(member.modifiers.keywords().into_iter().map(str::to_string));

    match &member.detail {
        MemberDetail::SuperClass | MemberDetail::SuperInterface { .. } => {
            tokens.push(ty(&member.name));
        }
        MemberDetail::Inner => {
            let prefix = format!("{class_name}$");
            let simple = member.name.strip_prefix(&prefix).unwrap_or(&member.name);
            tokens.push(simple.to_string());
        }
        MemberDetail::Field { ty: field_type, constant } => {
            tokens.push(ty(field_type));
            tokens.push(member.name.clone());
            if style.constants
                && let Some(c) = constant
            {
                tokens.push(format!("= {c}"));
            }
        }
        MemberDetail::Method {
            type_parameters,
            return_type,
            args,
            throws,
            default_value,
        } => {
            tokens.push(tp(type_parameters));
            tokens.push(ty(return_type));
            tokens.push(format!("{}({})", member.name, ty(args)));
            if !throws.is_empty() {
                tokens.push(format!("{THROWS} {}", ty(&throws.join(","))));
            }
            if let Some(value) = default_value {
                tokens.push(format!("{DEFAULT} {value}"));
            }
        }
        MemberDetail::Constructor {
            type_parameters,
            args,
            throws,
        } => {
            tokens.push(tp(type_parameters));
            tokens.push(format!("{}({})", member.name, ty(args)));
            if !throws.is_empty() {
                tokens.push(format!("{THROWS} {}", ty(&throws.join(","))));
            }
        }
    }
    join(tokens)
}
