//! Registered signature-file formats and feature negotiation.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::error::Result;
use crate::legacy::LegacyRule;
use crate::reader::SignatureReader;
use crate::writer::SignatureWriter;

/// Optional serialization capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    ConstInfo,
    TigerInfo,
    ModuleInfo,
    ListOfHiders,
    MergeModeSupported,
    CopyRight,
}

pub type FeatureSet = BTreeSet<Feature>;

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::ConstInfo,
        Feature::TigerInfo,
        Feature::ModuleInfo,
        Feature::ListOfHiders,
        Feature::MergeModeSupported,
        Feature::CopyRight,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::ConstInfo => "ConstInfo",
            Feature::TigerInfo => "TigerInfo",
            Feature::ModuleInfo => "ModuleInfo",
            Feature::ListOfHiders => "ListOfHiders",
            Feature::MergeModeSupported => "MergeModeSupported",
            Feature::CopyRight => "CopyRight",
        }
    }

    pub fn from_name(name: &str) -> Option<Feature> {
        Feature::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Header comment announcing that this feature was left out.
    pub fn absence_marker(self) -> String {
        format!("#{}", self.name())
    }

    pub fn from_absence_marker(line: &str) -> Option<Feature> {
        line.strip_prefix('#').and_then(Feature::from_name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Format {
    banner: &'static str,
    features: FeatureSet,
    rules: &'static [LegacyRule],
}

impl Format {
    fn new(banner: &'static str, features: &[Feature], rules: &'static [LegacyRule]) -> Self {
        Self {
            banner,
            features: features.iter().copied().collect(),
            rules,
        }
    }

    pub fn banner(&self) -> &'static str {
        self.banner
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn supports(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    pub fn rules(&self) -> &'static [LegacyRule] {
        self.rules
    }

    pub fn has_rule(&self, rule: LegacyRule) -> bool {
        self.rules.contains(&rule)
    }

    pub fn reader<R: BufRead>(&self, source: R) -> SignatureReader<R> {
        SignatureReader::new(self.clone(), source)
    }

    pub fn writer<W: Write>(&self, out: W) -> SignatureWriter<W> {
        SignatureWriter::new(self.clone(), out)
    }
}

pub const BANNER_V21: &str = "#Signature file v2.1";
pub const BANNER_V31: &str = "#Signature file v3.1";
pub const BANNER_V40: &str = "#Signature file v4.0";
pub const BANNER_V41: &str = "#Signature file v4.1";
pub const BANNER_V42: &str = "#Signature file v4.2";
pub const BANNER_V43: &str = "#Signature file v4.3";

/// Formats ordered oldest to newest; each newer one enables strictly more
/// features than its predecessor.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatRegistry {
    formats: Vec<Format>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl FormatRegistry {
    pub fn standard() -> Self {
        use Feature::*;
        use LegacyRule::*;

        let formats = vec![
            Format::new(
                BANNER_V21,
                &[ConstInfo],
                &[NullSuper, VmArrays, InitConstructors, EncodedConstants],
            ),
            Format::new(BANNER_V31, &[ConstInfo, TigerInfo], &[EncodedConstants]),
            Format::new(BANNER_V40, &[ConstInfo, TigerInfo, ListOfHiders], &[]),
            Format::new(BANNER_V41, &[ConstInfo, TigerInfo, ListOfHiders, CopyRight], &[]),
            Format::new(
                BANNER_V42,
                &[ConstInfo, TigerInfo, ListOfHiders, CopyRight, MergeModeSupported],
                &[],
            ),
            Format::new(
                BANNER_V43,
                &[
                    ConstInfo,
                    TigerInfo,
                    ListOfHiders,
                    CopyRight,
                    MergeModeSupported,
                    ModuleInfo,
                ],
                &[],
            ),
        ];
        Self { formats }
    }

    pub fn formats(&self) -> &[Format] {
        &self.formats
    }

    pub fn latest(&self) -> &Format {
        &self.formats[self.formats.len() - 1]
    }

    /// The format whose banner equals `first_line`, preferring newer formats.
    pub fn by_banner(&self, first_line: &str) -> Option<&Format> {
        let banner = first_line.trim_end();
        self.formats.iter().rev().find(|f| f.banner == banner)
    }

    /// Reads the banner from `source` and returns a reader positioned on
    /// it, or `None` when no registered format matches.
    pub fn reader<R: BufRead>(&self, mut source: R) -> Result<Option<SignatureReader<R>>> {
        let mut first = String::new();
        source.read_line(&mut first)?;
        let first = first.trim_end_matches(['\r', '\n']).to_string();
        match self.by_banner(&first) {
            Some(format) => {
                tracing::debug!(banner = format.banner, "detected signature format");
                Ok(Some(SignatureReader::with_first_line(format.clone(), source, first)))
            }
            None => {
                tracing::debug!(header = %first, "no registered signature format matches");
                Ok(None)
            }
        }
    }

    pub fn open(&self, path: &Path) -> Result<Option<SignatureReader<BufReader<File>>>> {
        let file = File::open(path)?;
        self.reader(BufReader::new(file))
    }

    /// The newest format that declares exactly `features`.
    pub fn format_for(&self, features: &FeatureSet) -> Option<&Format> {
        self.formats.iter().rev().find(|f| &f.features == features)
    }

    pub fn writer<W: Write>(&self, features: &FeatureSet, out: W) -> Option<SignatureWriter<W>> {
        self.format_for(features).map(|f| f.writer(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_formats_are_strict_supersets() {
        let reg = FormatRegistry::standard();
        for pair in reg.formats().windows(2) {
            assert!(pair[0].features().is_subset(pair[1].features()));
            assert!(pair[1].features().len() > pair[0].features().len());
        }
        assert_eq!(reg.latest().banner(), BANNER_V43);
    }

    #[test]
    fn writer_lookup_is_exact_match() {
        let reg = FormatRegistry::standard();
        let wanted: FeatureSet = [Feature::ConstInfo, Feature::TigerInfo].into_iter().collect();
        assert_eq!(reg.format_for(&wanted).map(Format::banner), Some(BANNER_V31));

        let superset_only: FeatureSet = [Feature::ModuleInfo].into_iter().collect();
        assert!(reg.format_for(&superset_only).is_none());
    }

    #[test]
    fn banner_detection() {
        let reg = FormatRegistry::standard();
        assert_eq!(
            reg.by_banner("#Signature file v2.1\r").map(Format::banner),
            Some(BANNER_V21)
        );
        assert!(reg.by_banner("#Signature file v9.9").is_none());
        assert_eq!(Feature::from_absence_marker("#ConstInfo"), Some(Feature::ConstInfo));
        assert_eq!(Feature::from_absence_marker("# ConstInfo"), None);
    }
}
