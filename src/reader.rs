//! Streaming reader for one signature file.

use std::io::BufRead;

use crate::annotation::AnnotationItem;
use crate::class::ClassDescription;
use crate::error::{Result, SigError};
use crate::format::{Feature, FeatureSet, Format};
use crate::grammar::{LineKind, classify, parse_class_header, parse_hidden, parse_member};
use crate::legacy::LineContext;
use crate::member::{MemberDescription, MemberDetail, MemberType};
use crate::module_info::ModuleDescription;

const VERSION_PREFIX: &str = "version ";
const COPYRIGHT_PREFIX: &str = "# ";
const MODULE_END: &str = "</module>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Unopened,
    HeaderRead,
    ClassLoop,
    Closed,
}

/// Reads the header once, then yields one description per class block or
/// module block.
pub struct SignatureReader<R> {
    format: Format,
    source: R,
    pushback: Option<(usize, String)>,
    line_no: usize,
    state: State,
    api_version: Option<String>,
    disabled: FeatureSet,
    copyright: Vec<String>,
}

/// Where pending annotation lines get attached.
#[derive(Clone, Copy)]
enum Owner {
    Class,
    Member(MemberType, usize),
}

impl<R: BufRead> SignatureReader<R> {
    pub fn new(format: Format, source: R) -> Self {
        Self {
            format,
            source,
            pushback: None,
            line_no: 0,
            state: State::Unopened,
            api_version: None,
            disabled: FeatureSet::new(),
            copyright: Vec::new(),
        }
    }

    /// A reader whose banner line was already consumed by format detection.
    pub(crate) fn with_first_line(format: Format, source: R, first: String) -> Self {
        let mut reader = Self::new(format, source);
        reader.line_no = 1;
        reader.pushback = Some((1, first));
        reader
    }

    pub fn format(&self) -> &Format {
        &self.format
    }

    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    pub fn copyright(&self) -> &[String] {
        &self.copyright
    }

    /// Features the format supports minus the ones the header marked absent.
    pub fn active_features(&self) -> FeatureSet {
        self.format.features().difference(&self.disabled).copied().collect()
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.format.supports(feature) && !self.disabled.contains(&feature)
    }

    fn next_line(&mut self) -> Result<Option<(usize, String)>> {
        if let Some(line) = self.pushback.take() {
            return Ok(Some(line));
        }
        let mut buf = String::new();
        if self.source.read_line(&mut buf)? == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        let trimmed = buf.trim_end_matches(['\r', '\n']).to_string();
        Ok(Some((self.line_no, trimmed)))
    }

    fn push_back(&mut self, line: (usize, String)) {
        self.pushback = Some(line);
    }

    /// Reads the banner, API version and feature comments. Called
    /// implicitly by the first class read.
    pub fn read_header(&mut self) -> Result<()> {
        if self.state != State::Unopened {
            return Ok(());
        }
        let banner = self.next_line()?.map(|(_, l)| l).unwrap_or_default();
        if banner.trim_end() != self.format.banner() {
            self.state = State::Closed;
            return Err(SigError::FormatMismatch(banner));
        }

        while let Some((no, line)) = self.next_line()? {
            if line.trim().is_empty() {
                break;
            }
            if let Some(version) = line.strip_prefix(VERSION_PREFIX) {
                self.api_version = Some(version.trim().to_string());
            } else if let Some(feature) = Feature::from_absence_marker(line.trim_end()) {
                self.disabled.insert(feature);
            } else if let Some(text) = line.strip_prefix(COPYRIGHT_PREFIX) {
                self.copyright.push(text.to_string());
            } else if line.starts_with('#') {
                tracing::debug!(line = no, text = %line, "ignoring header comment");
            } else {
                self.push_back((no, line));
                break;
            }
        }
        tracing::debug!(
            banner = self.format.banner(),
            api_version = ?self.api_version,
            disabled = ?self.disabled,
            "read signature header"
        );
        self.state = State::HeaderRead;
        Ok(())
    }

    /// Next class or module description, or `None` at end of file.
    pub fn read_next(&mut self) -> Result<Option<ClassDescription>> {
        self.read_header()?;
        if self.state == State::Closed {
            return Ok(None);
        }
        self.state = State::ClassLoop;

        loop {
            let Some((no, line)) = self.next_line()? else {
                self.state = State::Closed;
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            match classify(&line) {
                LineKind::Module => {
                    let module = self.read_module(no, line)?;
                    if self.has_feature(Feature::ModuleInfo) {
                        return Ok(Some(ClassDescription::from_module(module)));
                    }
                }
                LineKind::Class => return self.read_class(no, line).map(Some),
                _ => return Err(SigError::malformed(no, "expected a class header", line)),
            }
        }
    }

    fn read_module(&mut self, first_no: usize, first: String) -> Result<ModuleDescription> {
        let mut text = first;
        let self_closing = text.trim_end().ends_with("/>") && !text.contains(MODULE_END);
        if !self_closing && !text.contains(MODULE_END) {
            loop {
                let Some((_, line)) = self.next_line()? else {
                    return Err(SigError::malformed(first_no, "unterminated module block", text));
                };
                text.push('\n');
                text.push_str(&line);
                if line.contains(MODULE_END) {
                    break;
                }
            }
        }
        ModuleDescription::from_xml(&text)
            .map_err(|e| SigError::malformed(first_no, e.to_string(), text.clone()))
    }

    /// Collects the lines of one class block, applying the format's legacy
    /// rules, then builds the description in two passes.
    fn read_class(&mut self, header_no: usize, header: String) -> Result<ClassDescription> {
        let header = parse_class_header(&header).map_err(|e| e.at_line(header_no))?;
        let class_name = header.name.clone();
        let ctx = LineContext {
            class_name: &class_name,
        };

        let mut lines: Vec<(usize, LineKind, String)> = Vec::new();
        while let Some((no, line)) = self.next_line()? {
            let kind = classify(&line);
            if matches!(kind, LineKind::Class | LineKind::Module) {
                self.push_back((no, line));
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            let mut decoded = Some(line);
            for rule in self.format.rules() {
                let Some(l) = decoded.take() else { break };
                decoded = rule.decode(l, &ctx).map_err(|e| e.at_line(no))?;
            }
            if let Some(line) = decoded {
                lines.push((no, kind, line));
            }
        }

        let mut class = ClassDescription::new(&class_name, header.modifiers);
        class.type_parameters = header.type_parameters;

        for kind in MemberType::WRITE_ORDER {
            let count = lines
                .iter()
                .filter(|(_, k, _)| *k == LineKind::Member(kind))
                .count();
            if let Some(list) = class.members_mut(kind) {
                *list = Vec::with_capacity(count);
            }
        }

        let keep_constants = self.has_feature(Feature::ConstInfo);
        let keep_hidden = self.has_feature(Feature::ListOfHiders);
        let mut owner = Owner::Class;
        let mut pending: Vec<AnnotationItem> = Vec::new();

        for (no, kind, line) in lines {
            if kind == LineKind::Annotation {
                pending.push(AnnotationItem::parse(&line).map_err(|e| e.at_line(no))?);
                continue;
            }
            flush_annotations(&mut class, owner, &mut pending);
            match kind {
                LineKind::Member(member_type) => {
                    let mut member =
                        parse_member(&line, member_type, &class_name).map_err(|e| e.at_line(no))?;
                    if !keep_constants
                        && let MemberDetail::Field { constant, .. } = &mut member.detail
                    {
                        *constant = None;
                    }
                    owner = attach(&mut class, member);
                }
                LineKind::HiddenFields => {
                    if keep_hidden {
                        class.internal_fields = Some(parse_hidden(&line));
                    }
                }
                LineKind::HiddenClasses => {
                    if keep_hidden {
                        class.internal_classes = Some(parse_hidden(&line));
                    }
                }
                _ => return Err(SigError::malformed(no, "unrecognized line", line)),
            }
        }
        flush_annotations(&mut class, owner, &mut pending);
        Ok(class)
    }

    /// Reads every remaining description.
    pub fn read_all(&mut self) -> Result<Vec<ClassDescription>> {
        let mut out = Vec::new();
        while let Some(class) = self.read_next()? {
            out.push(class);
        }
        Ok(out)
    }

    pub fn close(&mut self) {
        self.state = State::Closed;
        self.pushback = None;
    }
}

fn attach(class: &mut ClassDescription, member: MemberDescription) -> Owner {
    let kind = member.member_type();
    class.add_member(member);
    let index = class.members(kind).len() - 1;
    Owner::Member(kind, index)
}

fn flush_annotations(class: &mut ClassDescription, owner: Owner, pending: &mut Vec<AnnotationItem>) {
    if pending.is_empty() {
        return;
    }
    let target = match owner {
        Owner::Class => Some(&mut class.annotations),
        Owner::Member(MemberType::SuperClass, _) => {
            class.super_class.as_mut().map(|m| &mut m.annotations)
        }
        Owner::Member(kind, index) => class
            .members_mut(kind)
            .and_then(|list| list.get_mut(index))
            .map(|m| &mut m.annotations),
    };
    if let Some(list) = target {
        list.append(pending);
    }
    pending.clear();
}

impl<R: BufRead> Iterator for SignatureReader<R> {
    type Item = Result<ClassDescription>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(class)) => Some(Ok(class)),
            Ok(None) => None,
            Err(e) => {
                self.close();
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::annotation::AnnotationValue;
    use crate::format::FormatRegistry;

    fn open(text: &str) -> Result<SignatureReader<Cursor<Vec<u8>>>> {
        FormatRegistry::standard()
            .reader(Cursor::new(text.as_bytes().to_vec()))?
            .ok_or_else(|| SigError::FormatMismatch(text.lines().next().unwrap_or_default().into()))
    }

    const V43: &str = "\
#Signature file v4.3
version 1.0

CLSS public a.Foo<T extends java.lang.Object>
anno 0 java.lang.Deprecated()
SUPR java.lang.Object
INTF java.lang.Runnable
FLD public final static int X = 5
FLD public java.util.List<T> items
METH public void run()
anno 0 java.lang.Override()
METH public <U extends java.lang.Object> U map(java.util.function.Function<T,U>)
CONS public Foo()
INNER public static Entry
hfds secret
hcls Impl

<module name=\"m\">
  <package name=\"a\"/>
</module>

CLSS public a.Bar
SUPR java.lang.Object
";

    #[test]
    fn reads_class_blocks_and_modules() -> Result<()> {
        let mut reader = open(V43)?;
        let classes = reader.read_all()?;
        assert_eq!(reader.api_version(), Some("1.0"));
        assert_eq!(classes.len(), 3);

        let foo = &classes[0];
        assert_eq!(foo.name, "a.Foo");
        assert_eq!(foo.type_parameters.as_deref(), Some("<T extends java.lang.Object>"));
        assert_eq!(foo.annotations.len(), 1);
        assert_eq!(foo.super_class_name(), Some("java.lang.Object"));
        assert_eq!(foo.interfaces.len(), 1);
        assert_eq!(foo.fields.len(), 2);
        assert_eq!(foo.field("X").and_then(MemberDescription::constant), Some("5"));
        assert_eq!(foo.methods.len(), 2);
        assert_eq!(foo.method("run").map(|m| m.annotations.len()), Some(1));
        assert_eq!(foo.constructors[0].name, "Foo");
        assert_eq!(foo.nested[0].name, "a.Foo$Entry");
        assert!(foo.internal_fields.as_ref().is_some_and(|s| s.contains("secret")));

        assert!(classes[1].is_module());
        assert_eq!(classes[2].name, "a.Bar");
        assert!(classes[2].annotations.is_empty());
        Ok(())
    }

    #[test]
    fn disabled_features_drop_data() -> Result<()> {
        let text = "#Signature file v4.3\nversion 1\n#ConstInfo\n#ModuleInfo\n\n\
                    <module name=\"m\"/>\nCLSS public a.B\nFLD public final static int X = 5\n";
        let mut reader = open(text)?;
        let classes = reader.read_all()?;
        assert!(!reader.has_feature(Feature::ConstInfo));
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].fields[0].constant(), None);
        Ok(())
    }

    #[test]
    fn legacy_v21_lines_are_modernized() -> Result<()> {
        let text = "#Signature file v2.1\nversion 1\n\nCLSS public a.B\nSUPR null\n\
                    FLD public final static [I X <constant> <value=\"5\">\n\
                    CONS public <init>([Ljava.lang.String;)\n";
        let classes = open(text)?.read_all()?;
        let b = &classes[0];
        assert!(b.super_class.is_none());
        assert_eq!(b.fields[0].field_type(), Some("int[]"));
        assert_eq!(b.fields[0].constant(), Some("5"));
        assert_eq!(b.constructors[0].name, "B");
        match &b.constructors[0].detail {
            MemberDetail::Constructor { args, .. } => assert_eq!(args, "java.lang.String[]"),
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn nested_annotation_values_round_trip_through_the_reader() -> Result<()> {
        let text = "#Signature file v4.0\nversion 1\n\nCLSS public a.B\n\
                    anno 0 a.Outer(a.Inner[] value=[anno 0 a.Inner(java.lang.String s=\"q\\\"x\\u0041\"), anno 0 a.Inner(int n=2)])\n";
        let classes = open(text)?.read_all()?;
        let anno = &classes[0].annotations[0];
        let Some(AnnotationValue::Array(items)) = anno.member("value") else {
            panic!("value is not an array");
        };
        assert_eq!(items.len(), 2);
        match &items[0] {
            AnnotationValue::Annotation(inner) => {
                assert_eq!(inner.member("s"), Some(&AnnotationValue::Str("q\"xA".to_string())));
            }
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn malformed_line_reports_its_number() -> Result<()> {
        let text = "#Signature file v4.0\nversion 1\n\nCLSS public a.B\nMETH public void run(int\n";
        let err = open(text)?.read_all().unwrap_err();
        match err {
            SigError::Malformed { line, .. } => assert_eq!(line, 5),
            other => panic!("unexpected {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn unknown_banner_is_not_an_error() -> Result<()> {
        let reg = FormatRegistry::standard();
        assert!(reg.reader(Cursor::new(b"#Signature file v1.0\n".to_vec()))?.is_none());
        assert!(reg.reader(Cursor::new(Vec::new()))?.is_none());
        Ok(())
    }
}
