//! Writer for one signature file.

use std::io::Write;

use crate::annotation::AnnotationItem;
use crate::class::ClassDescription;
use crate::error::{Result, SigError};
use crate::format::{Feature, FeatureSet, Format};
use crate::grammar::{
    Erasure, HIDDEN_CLASSES_PREFIX, HIDDEN_FIELDS_PREFIX, LineStyle, format_class_header,
    format_hidden, format_member,
};
use crate::legacy::{LegacyRule, LineContext, NULL_SUPER_LINE};
use crate::member::{MemberDescription, MemberType};

pub struct SignatureWriter<W: Write> {
    format: Format,
    out: W,
    features: FeatureSet,
    api_version: String,
    copyright: Option<String>,
    header_written: bool,
}

impl<W: Write> SignatureWriter<W> {
    pub fn new(format: Format, out: W) -> Self {
        let features = format.features().clone();
        Self {
            format,
            out,
            features,
            api_version: String::new(),
            copyright: None,
            header_written: false,
        }
    }

    pub fn format(&self) -> &Format {
        &self.format
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    /// Omits a feature's data from the output; the header records the
    /// omission so readers do not expect it.
    pub fn remove_feature(&mut self, feature: Feature) -> Result<()> {
        if !self.format.supports(feature) {
            return Err(SigError::UnsupportedFeature(feature.name()));
        }
        self.features.remove(&feature);
        Ok(())
    }

    pub fn set_api_version(&mut self, version: impl Into<String>) {
        self.api_version = version.into();
    }

    pub fn set_copyright(&mut self, text: impl Into<String>) {
        self.copyright = Some(text.into());
    }

    fn style(&self) -> LineStyle {
        LineStyle {
            constants: self.has_feature(Feature::ConstInfo),
            generics: self.has_feature(Feature::TigerInfo),
        }
    }

    pub fn write_header(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        writeln!(self.out, "{}", self.format.banner())?;
        writeln!(self.out, "version {}", self.api_version)?;
        for feature in self.format.features() {
            if !self.features.contains(feature) {
                writeln!(self.out, "{}", feature.absence_marker())?;
            }
        }
        if self.has_feature(Feature::CopyRight)
            && let Some(text) = &self.copyright
        {
            for line in text.lines() {
                writeln!(self.out, "# {line}")?;
            }
        }
        writeln!(self.out)?;
        self.header_written = true;
        Ok(())
    }

    /// Writes one class block, or one module block for a module description.
    pub fn write_class(&mut self, class: &ClassDescription) -> Result<()> {
        self.write_header()?;
        if let Some(module) = &class.module {
            if self.has_feature(Feature::ModuleInfo) {
                writeln!(self.out, "{}", module.to_xml()?)?;
                writeln!(self.out)?;
            }
            return Ok(());
        }

        let lines = self.class_lines(class)?;
        for line in lines {
            writeln!(self.out, "{line}")?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    /// The lines of one class block, without the trailing separator.
    pub fn class_lines(&self, class: &ClassDescription) -> Result<Vec<String>> {
        let style = self.style();
        let ctx = LineContext {
            class_name: &class.name,
        };
        let scope = Erasure::new(class.type_parameters.as_deref());
        let encode = |line: String| -> Result<String> {
            let mut line = line;
            for rule in self.format.rules().iter().rev() {
                line = rule.encode(line, &ctx)?;
            }
            Ok(line)
        };

        let mut lines = vec![encode(format_class_header(
            class.modifiers.visible(),
            &class.name,
            class.type_parameters.as_deref(),
            style,
        ))?];
        lines.extend(sorted_annotations(&class.annotations));

        for kind in MemberType::WRITE_ORDER {
            if kind == MemberType::SuperClass
                && class.super_class.is_none()
                && self.format.has_rule(LegacyRule::NullSuper)
            {
                lines.push(NULL_SUPER_LINE.to_string());
                continue;
            }
            let mut block: Vec<(String, Vec<String>)> = class
                .declared(kind)
                .map(|m| -> Result<(String, Vec<String>)> {
                    Ok((encode(format_member(m, &class.name, &scope, style))?, member_annotations(m)))
                })
                .collect::<Result<_>>()?;
            block.sort();
            for (line, annotations) in block {
                lines.push(line);
                lines.extend(annotations);
            }
        }

        if self.has_feature(Feature::ListOfHiders) {
            if let Some(names) = class.internal_fields.as_ref().filter(|s| !s.is_empty()) {
                lines.push(format_hidden(HIDDEN_FIELDS_PREFIX, names));
            }
            if let Some(names) = class.internal_classes.as_ref().filter(|s| !s.is_empty()) {
                lines.push(format_hidden(HIDDEN_CLASSES_PREFIX, names));
            }
        }
        Ok(lines)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Writes the header if nothing was written yet, flushes, and returns
    /// the underlying sink.
    pub fn close(mut self) -> Result<W> {
        self.write_header()?;
        self.out.flush()?;
        Ok(self.out)
    }
}

fn sorted_annotations(list: &[AnnotationItem]) -> Vec<String> {
    let mut lines: Vec<String> = list.iter().map(ToString::to_string).collect();
    lines.sort();
    lines
}

fn member_annotations(member: &MemberDescription) -> Vec<String> {
    sorted_annotations(&member.annotations)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::annotation::AnnotationValue;
    use crate::format::FormatRegistry;
    use crate::modifiers::Modifiers;

    fn sample() -> ClassDescription {
        let mut c = ClassDescription::new("a.Foo", Modifiers::PUBLIC);
        c.type_parameters = Some("<T extends java.lang.Object>".to_string());
        c.add_member(MemberDescription::super_class("a.Foo", "java.lang.Object"));
        c.add_member(MemberDescription::method("a.Foo", "zeta", Modifiers::PUBLIC, "void", ""));
        c.add_member(
            MemberDescription::method("a.Foo", "alpha", Modifiers::PUBLIC, "java.util.List<T>", "int")
                .with_annotation(AnnotationItem::new("java.lang.Deprecated")),
        );
        c.add_member(MemberDescription::field(
            "a.Foo",
            "X",
            Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::FINAL,
            "int",
            Some("5"),
        ));
        c.add_member(MemberDescription::constructor("a.Foo", Modifiers::PUBLIC, ""));
        c.add_member(MemberDescription::field("a.Base", "inherited", Modifiers::PUBLIC, "int", None));
        c.annotations.push(
            AnnotationItem::new("a.Marker").with_member("java.lang.String", "v", AnnotationValue::Str("x".into())),
        );
        c.internal_fields = Some(["hidden".to_string()].into_iter().collect());
        c
    }

    fn write(format_banner: &str, edit: impl FnOnce(&mut SignatureWriter<Vec<u8>>) -> Result<()>) -> Result<String> {
        let reg = FormatRegistry::standard();
        let format = reg
            .by_banner(format_banner)
            .ok_or_else(|| SigError::FormatMismatch(format_banner.to_string()))?;
        let mut w = format.writer(Vec::new());
        w.set_api_version("1.0");
        edit(&mut w)?;
        w.write_class(&sample())?;
        Ok(String::from_utf8_lossy(&w.close()?).into_owned())
    }

    #[test]
    fn members_are_sorted_and_inherited_ones_skipped() -> Result<()> {
        let text = write(crate::format::BANNER_V43, |_| Ok(()))?;
        let expected = "\
#Signature file v4.3
version 1.0

CLSS public a.Foo<T extends java.lang.Object>
anno 0 a.Marker(java.lang.String v=\"x\")
SUPR java.lang.Object
FLD public static final int X = 5
METH public java.util.List<T> alpha(int)
anno 0 java.lang.Deprecated()
METH public void zeta()
CONS public Foo()
hfds hidden

";
        assert_eq!(text, expected);
        Ok(())
    }

    #[test]
    fn removed_features_are_announced_and_omitted() -> Result<()> {
        let text = write(crate::format::BANNER_V43, |w| {
            w.remove_feature(Feature::ConstInfo)?;
            w.remove_feature(Feature::TigerInfo)
        })?;
        assert!(text.contains("\n#ConstInfo\n"));
        assert!(text.contains("\n#TigerInfo\n"));
        assert!(text.contains("CLSS public a.Foo\n"));
        assert!(text.contains("FLD public static final int X\n"));
        assert!(text.contains("METH public java.util.List alpha(int)\n"));

        let mut reader = FormatRegistry::standard()
            .reader(Cursor::new(text.into_bytes()))?
            .ok_or_else(|| SigError::FormatMismatch("v4.3".into()))?;
        let back = reader.read_all()?;
        assert_eq!(back[0].field("X").and_then(MemberDescription::constant), None);
        Ok(())
    }

    #[test]
    fn unsupported_feature_cannot_be_removed() {
        let reg = FormatRegistry::standard();
        let mut w = reg.formats()[0].writer(Vec::new());
        assert!(matches!(
            w.remove_feature(Feature::ModuleInfo),
            Err(SigError::UnsupportedFeature("ModuleInfo"))
        ));
    }

    #[test]
    fn v21_output_uses_legacy_spellings() -> Result<()> {
        let text = write(crate::format::BANNER_V21, |_| Ok(()))?;
        assert!(text.contains("FLD public static final int X <constant> <value=\"5\">\n"));
        assert!(text.contains("CONS public <init>()\n"));
        assert!(!text.contains("hfds"));
        Ok(())
    }

    #[test]
    fn copyright_lines_follow_feature_markers() -> Result<()> {
        let text = write(crate::format::BANNER_V41, |w| {
            w.set_copyright("Example Corp");
            Ok(())
        })?;
        assert!(text.starts_with("#Signature file v4.1\nversion 1.0\n# Example Corp\n\n"));
        Ok(())
    }
}
