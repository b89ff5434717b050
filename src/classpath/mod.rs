//! Classpath resolution: an ordered chain of class sources merged into one
//! logical classpath.
//!
//! Earlier elements shadow later ones. Every entry claims the names it
//! enumerates in a shared [`ShadowIndex`] while it is built, so a name
//! already claimed by an earlier entry is never enumerated again.

mod directory;
mod jar;
mod module_image;
mod sigfile;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};

pub use directory::DirectoryEntry;
pub use jar::JarEntry;
pub use module_image::ModuleImageEntry;
pub use sigfile::SignatureFileEntry;

use crate::class::ClassDescription;
use crate::classfile::parse_class;
use crate::config::Config;
use crate::error::{Result, SigError};
use crate::module_info::ModuleDescription;

/// What an entry hands back for a class name.
#[derive(Debug, Clone)]
pub enum ClassSource {
    Bytecode(Vec<u8>),
    Description(ClassDescription),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassPresence {
    /// A description could be produced, from a signature file or by
    /// parsing bytecode.
    Description,
    /// Class bytes exist but do not parse.
    BytecodeOnly,
    NotFound,
}

/// One source of classes on the path.
pub trait ClasspathEntry {
    fn location(&self) -> &Path;

    fn has_next(&self) -> bool;

    fn next_class_name(&mut self) -> Option<String>;

    fn set_list_to_begin(&mut self);

    /// `SigError::ClassNotFound` when the entry has no such class.
    fn find_class(&mut self, name: &str) -> Result<ClassSource>;

    /// Whether the class physically exists here, shadowed or not.
    fn contains(&self, name: &str) -> bool;

    fn modules(&mut self) -> Result<Vec<ModuleDescription>>;

    fn close(&mut self) -> Result<()>;
}

/// First entry claiming each class name.
#[derive(Debug, Default, Clone)]
pub struct ShadowIndex {
    owners: HashMap<String, usize>,
}

impl ShadowIndex {
    pub fn owner(&self, name: &str) -> Option<usize> {
        self.owners.get(name).copied()
    }

    /// Returns `true` when `entry` now owns `name`; `false` when an earlier
    /// entry already does.
    pub fn claim(&mut self, name: &str, entry: usize) -> bool {
        if self.owners.contains_key(name) {
            return false;
        }
        self.owners.insert(name.to_string(), entry);
        true
    }

    /// Keeps the names `entry` gets to own, in their original order.
    pub fn claim_all(&mut self, names: impl IntoIterator<Item = String>, entry: usize) -> Vec<String> {
        names
            .into_iter()
            .filter(|n| self.claim(n, entry))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Kind of a classpath element, decided from the path alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Jar,
    ModuleImage,
    SignatureFile,
}

impl EntryKind {
    pub fn classify(path: &Path) -> Option<EntryKind> {
        if path.is_dir() {
            return Some(EntryKind::Directory);
        }
        if path.file_name().is_some_and(|n| n == "modules") {
            return Some(EntryKind::ModuleImage);
        }
        let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
        match ext.as_str() {
            "jar" | "zip" => Some(EntryKind::Jar),
            "jimage" => Some(EntryKind::ModuleImage),
            "sig" => Some(EntryKind::SignatureFile),
            _ => None,
        }
    }
}

/// Dotted class name for a `.class` path relative to an entry root, or
/// `None` for non-class files and `module-info`/`package-info`.
pub(crate) fn class_name_from_path(relative: &str) -> Option<String> {
    let stem = relative.strip_suffix(".class")?;
    let name = stem.replace(['/', '\\'], ".");
    let simple = name.rsplit('.').next().unwrap_or(&name);
    if simple == "module-info" || simple == "package-info" {
        return None;
    }
    Some(name)
}

pub(crate) fn class_file_path(name: &str) -> String {
    format!("{}.class", name.replace('.', "/"))
}

fn open_entry(
    path: &Path,
    kind: EntryKind,
    shadow: &mut ShadowIndex,
    index: usize,
    config: &Config,
) -> anyhow::Result<Box<dyn ClasspathEntry>> {
    Ok(match kind {
        EntryKind::Directory => Box::new(DirectoryEntry::open(path, shadow, index)?),
        EntryKind::Jar => Box::new(JarEntry::open(path, shadow, index)?),
        EntryKind::ModuleImage => Box::new(ModuleImageEntry::open(path, shadow, index, config)?),
        EntryKind::SignatureFile => {
            Box::new(SignatureFileEntry::open(path, shadow, index, &config.registry)?)
        }
    })
}

/// The merged view over all classpath entries.
pub struct Classpath {
    entries: Vec<Box<dyn ClasspathEntry>>,
    shadow: ShadowIndex,
    cursor: usize,
    errors: Vec<String>,
    closed: bool,
}

impl Classpath {
    /// Builds every usable element of `path_list`. Problems with single
    /// elements are collected in [`Classpath::errors`] instead of failing.
    pub fn open(path_list: &str, config: &Config) -> Classpath {
        let mut cp = Classpath::empty();
        let mut seen = HashSet::new();

        for segment in path_list.split(config.path_separator) {
            if let Err(e) = cp.add_segment(segment, &mut seen, config) {
                let message = format!("{e:#}");
                tracing::warn!(element = segment, error = %message, "skipping classpath element");
                cp.errors.push(message);
            }
        }
        tracing::debug!(
            entries = cp.entries.len(),
            classes = cp.shadow.len(),
            errors = cp.errors.len(),
            "classpath ready"
        );
        cp
    }

    /// Like [`Classpath::open`] but the first bad element aborts; entries
    /// built so far are closed before the error is returned.
    pub fn open_strict(path_list: &str, config: &Config) -> anyhow::Result<Classpath> {
        let mut cp = Classpath::empty();
        let mut seen = HashSet::new();

        for segment in path_list.split(config.path_separator) {
            if let Err(e) = cp.add_segment(segment, &mut seen, config) {
                if let Err(close_err) = cp.close() {
                    tracing::warn!(error = %close_err, "failed to close classpath after error");
                }
                return Err(e);
            }
        }
        Ok(cp)
    }

    fn empty() -> Classpath {
        Classpath {
            entries: Vec::new(),
            shadow: ShadowIndex::default(),
            cursor: 0,
            errors: Vec::new(),
            closed: false,
        }
    }

    fn add_segment(
        &mut self,
        segment: &str,
        seen: &mut HashSet<PathBuf>,
        config: &Config,
    ) -> anyhow::Result<()> {
        if segment.trim().is_empty() {
            bail!("Empty classpath element");
        }
        let path = PathBuf::from(segment);
        if !path.exists() {
            bail!("Classpath element does not exist: {}", path.display());
        }
        let key = path.canonicalize().unwrap_or_else(|_| path.clone());
        if !seen.insert(key) {
            bail!("Duplicate classpath element: {}", path.display());
        }
        let kind = EntryKind::classify(&path)
            .with_context(|| format!("Unrecognized classpath element: {}", path.display()))?;

        // Entries that fail half-way must not leave claims behind.
        let mut shadow = self.shadow.clone();
        let index = self.entries.len();
        let entry = open_entry(&path, kind, &mut shadow, index, config)
            .with_context(|| format!("Failed to open {kind:?} entry {}", path.display()))?;
        tracing::debug!(path = %path.display(), ?kind, "added classpath entry");
        self.shadow = shadow;
        self.entries.push(entry);
        Ok(())
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn locations(&self) -> Vec<&Path> {
        self.entries.iter().map(|e| e.location()).collect()
    }

    pub fn has_next(&self) -> bool {
        !self.closed && self.entries[self.cursor.min(self.entries.len())..].iter().any(|e| e.has_next())
    }

    pub fn next_class_name(&mut self) -> Option<String> {
        if self.closed {
            return None;
        }
        while let Some(entry) = self.entries.get_mut(self.cursor) {
            if let Some(name) = entry.next_class_name() {
                return Some(name);
            }
            self.cursor += 1;
        }
        None
    }

    pub fn set_list_to_begin(&mut self) {
        for entry in &mut self.entries {
            entry.set_list_to_begin();
        }
        self.cursor = 0;
    }

    /// First hit in path order.
    pub fn find_class(&mut self, name: &str) -> Result<ClassSource> {
        for entry in &mut self.entries {
            match entry.find_class(name) {
                Err(e) if e.is_not_found() => continue,
                other => return other,
            }
        }
        Err(SigError::ClassNotFound(name.to_string()))
    }

    pub fn find_class_description(&mut self, name: &str) -> Result<ClassDescription> {
        match self.find_class(name)? {
            ClassSource::Description(d) => Ok(d),
            ClassSource::Bytecode(bytes) => parse_class(&bytes),
        }
    }

    pub fn is_class_present(&mut self, name: &str) -> ClassPresence {
        match self.find_class(name) {
            Ok(ClassSource::Description(_)) => ClassPresence::Description,
            Ok(ClassSource::Bytecode(bytes)) => match parse_class(&bytes) {
                Ok(_) => ClassPresence::Description,
                Err(e) => {
                    tracing::debug!(class = name, error = %e, "class bytes do not parse");
                    ClassPresence::BytecodeOnly
                }
            },
            Err(e) => {
                if !e.is_not_found() {
                    tracing::warn!(class = name, error = %e, "class lookup failed");
                }
                ClassPresence::NotFound
            }
        }
    }

    /// Module descriptors from every entry, first occurrence of a name wins.
    pub fn modules(&mut self) -> Result<Vec<ModuleDescription>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for entry in &mut self.entries {
            for module in entry.modules()? {
                if seen.insert(module.name.clone()) {
                    out.push(module);
                }
            }
        }
        Ok(out)
    }

    /// Closes every entry, reporting the first failure after trying all.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.cursor = self.entries.len();
        let mut first_error = None;
        for entry in &mut self.entries {
            if let Err(e) = entry.close() {
                tracing::warn!(path = %entry.location().display(), error = %e, "failed to close classpath entry");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for Classpath {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "classpath close on drop failed");
        }
    }
}
