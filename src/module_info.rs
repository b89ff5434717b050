//! Module metadata and the minimal XML block that carries it in `v4.3`
//! signature files.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Result, SigError};

const MODULE: &str = "module";
const PACKAGE: &str = "package";
const CONCEAL: &str = "conceal";
const EXPORTS: &str = "exports";
const TARGET: &str = "target";
const REQUIRES: &str = "requires";
const PROVIDES: &str = "provides";
const PROVIDER: &str = "provider";
const USES: &str = "uses";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModuleDescription {
    pub name: String,
    pub version: Option<String>,
    pub main_class: Option<String>,
    pub packages: BTreeSet<String>,
    /// Packages that exist in the module but are not exported.
    pub conceals: BTreeSet<String>,
    /// Exported package to its qualified targets; empty for an unqualified export.
    pub exports: BTreeMap<String, BTreeSet<String>>,
    pub requires: BTreeSet<Requires>,
    /// Service interface to its providers.
    pub provides: BTreeMap<String, BTreeSet<String>>,
    pub uses: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Requires {
    pub name: String,
    pub mandated: bool,
    /// `requires transitive`.
    pub public: bool,
    pub synthetic: bool,
}

impl Requires {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mandated: false,
            public: false,
            synthetic: false,
        }
    }
}

fn xml_err(e: impl std::fmt::Display) -> SigError {
    SigError::Xml(e.to_string())
}

fn emit<W: std::io::Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(xml_err)
}

fn element<'a>(name: &'a str, attrs: &[(&'a str, &'a str)]) -> BytesStart<'a> {
    let mut start = BytesStart::new(name);
    for attr in attrs {
        start.push_attribute(*attr);
    }
    start
}

fn flag(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

impl ModuleDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    fn is_empty(&self) -> bool {
        self.packages.is_empty()
            && self.conceals.is_empty()
            && self.exports.is_empty()
            && self.requires.is_empty()
            && self.provides.is_empty()
            && self.uses.is_empty()
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        let mut attrs = vec![("name", self.name.as_str())];
        if let Some(v) = self.version.as_deref() {
            attrs.push(("version", v));
        }
        if let Some(m) = self.main_class.as_deref() {
            attrs.push(("main", m));
        }
        let root = element(MODULE, &attrs);
        if self.is_empty() {
            emit(&mut writer, Event::Empty(root))?;
            return finish(writer);
        }
        emit(&mut writer, Event::Start(root))?;

        for p in &self.packages {
            emit(&mut writer, Event::Empty(element(PACKAGE, &[("name", p.as_str())])))?;
        }
        for p in &self.conceals {
            emit(&mut writer, Event::Empty(element(CONCEAL, &[("name", p.as_str())])))?;
        }
        for (source, targets) in &self.exports {
            let start = element(EXPORTS, &[("source", source.as_str())]);
            if targets.is_empty() {
                emit(&mut writer, Event::Empty(start))?;
                continue;
            }
            emit(&mut writer, Event::Start(start))?;
            for t in targets {
                emit(&mut writer, Event::Empty(element(TARGET, &[("module", t.as_str())])))?;
            }
            emit(&mut writer, Event::End(BytesEnd::new(EXPORTS)))?;
        }
        for r in &self.requires {
            let start = element(
                REQUIRES,
                &[
                    ("name", r.name.as_str()),
                    ("mandated", flag(r.mandated)),
                    ("public", flag(r.public)),
                    ("synthetic", flag(r.synthetic)),
                ],
            );
            emit(&mut writer, Event::Empty(start))?;
        }
        for (service, providers) in &self.provides {
            let start = element(PROVIDES, &[("service", service.as_str())]);
            if providers.is_empty() {
                emit(&mut writer, Event::Empty(start))?;
                continue;
            }
            emit(&mut writer, Event::Start(start))?;
            for p in providers {
                emit(&mut writer, Event::Empty(element(PROVIDER, &[("class", p.as_str())])))?;
            }
            emit(&mut writer, Event::End(BytesEnd::new(PROVIDES)))?;
        }
        for u in &self.uses {
            emit(&mut writer, Event::Empty(element(USES, &[("service", u.as_str())])))?;
        }

        emit(&mut writer, Event::End(BytesEnd::new(MODULE)))?;
        finish(writer)
    }

    pub fn from_xml(text: &str) -> Result<ModuleDescription> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);

        let mut module: Option<ModuleDescription> = None;
        let mut open_export: Option<String> = None;
        let mut open_service: Option<String> = None;

        loop {
            let (start, is_empty) = match reader.read_event().map_err(xml_err)? {
                Event::Start(e) => (e, false),
                Event::Empty(e) => (e, true),
                Event::End(e) => {
                    match e.name().as_ref() {
                        b"exports" => open_export = None,
                        b"provides" => open_service = None,
                        _ => {}
                    }
                    continue;
                }
                Event::Eof => break,
                _ => continue,
            };

            let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
            let attrs = attributes(&start)?;
            let get = |key: &str| -> Result<String> {
                attrs
                    .get(key)
                    .cloned()
                    .ok_or_else(|| SigError::Xml(format!("<{tag}> is missing attribute {key:?}")))
            };
            let get_flag = |key: &str| attrs.get(key).is_some_and(|v| v == "true");

            if tag == MODULE {
                let mut m = ModuleDescription::new(get("name")?);
                m.version = attrs.get("version").cloned();
                m.main_class = attrs.get("main").cloned();
                module = Some(m);
                continue;
            }

            let m = module
                .as_mut()
                .ok_or_else(|| SigError::Xml(format!("<{tag}> outside <module>")))?;
            match tag.as_str() {
                PACKAGE => {
                    m.packages.insert(get("name")?);
                }
                CONCEAL => {
                    m.conceals.insert(get("name")?);
                }
                EXPORTS => {
                    let source = get("source")?;
                    m.exports.entry(source.clone()).or_default();
                    if !is_empty {
                        open_export = Some(source);
                    }
                }
                TARGET => {
                    let source = open_export
                        .as_ref()
                        .ok_or_else(|| SigError::Xml("<target> outside <exports>".to_string()))?;
                    m.exports.entry(source.clone()).or_default().insert(get("module")?);
                }
                REQUIRES => {
                    m.requires.insert(Requires {
                        name: get("name")?,
                        mandated: get_flag("mandated"),
                        public: get_flag("public"),
                        synthetic: get_flag("synthetic"),
                    });
                }
                PROVIDES => {
                    let service = get("service")?;
                    m.provides.entry(service.clone()).or_default();
                    if !is_empty {
                        open_service = Some(service);
                    }
                }
                PROVIDER => {
                    let service = open_service
                        .as_ref()
                        .ok_or_else(|| SigError::Xml("<provider> outside <provides>".to_string()))?;
                    m.provides.entry(service.clone()).or_default().insert(get("class")?);
                }
                USES => {
                    m.uses.insert(get("service")?);
                }
                other => return Err(SigError::Xml(format!("unknown element <{other}>"))),
            }
        }

        module.ok_or_else(|| SigError::Xml("no <module> element".to_string()))
    }
}

fn attributes(start: &BytesStart<'_>) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for attr in start.attributes() {
        let attr = attr.map_err(xml_err)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(xml_err)?.into_owned();
        out.insert(key, value);
    }
    Ok(out)
}

fn finish(writer: Writer<Cursor<Vec<u8>>>) -> Result<String> {
    String::from_utf8(writer.into_inner().into_inner()).map_err(xml_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ModuleDescription {
        let mut m = ModuleDescription::new("org.example.core");
        m.version = Some("1.2".to_string());
        m.packages.insert("org.example.api".to_string());
        m.packages.insert("org.example.impl".to_string());
        m.conceals.insert("org.example.impl".to_string());
        m.exports.insert("org.example.api".to_string(), BTreeSet::new());
        m.exports.insert(
            "org.example.spi".to_string(),
            ["org.example.plugin".to_string()].into_iter().collect(),
        );
        let mut r = Requires::new("java.logging");
        r.public = true;
        m.requires.insert(r);
        let mut base = Requires::new("java.base");
        base.mandated = true;
        m.requires.insert(base);
        m.provides.insert(
            "org.example.api.Service".to_string(),
            ["org.example.impl.ServiceImpl".to_string()].into_iter().collect(),
        );
        m.uses.insert("org.example.api.Plugin".to_string());
        m
    }

    #[test]
    fn xml_block_round_trips() -> Result<()> {
        let m = sample();
        let xml = m.to_xml()?;
        assert!(xml.starts_with("<module name=\"org.example.core\" version=\"1.2\">"));
        assert!(xml.trim_end().ends_with("</module>"));
        assert!(xml.contains("<requires name=\"java.logging\" mandated=\"false\" public=\"true\" synthetic=\"false\"/>"));
        assert_eq!(ModuleDescription::from_xml(&xml)?, m);
        Ok(())
    }

    #[test]
    fn empty_module_is_a_single_element() -> Result<()> {
        let m = ModuleDescription::new("empty");
        let xml = m.to_xml()?;
        assert_eq!(xml, "<module name=\"empty\"/>");
        assert_eq!(ModuleDescription::from_xml(&xml)?, m);
        Ok(())
    }

    #[test]
    fn rejects_orphan_children() {
        assert!(ModuleDescription::from_xml("<target module=\"x\"/>").is_err());
        assert!(ModuleDescription::from_xml("<module name=\"m\"><bogus/></module>").is_err());
    }
}
