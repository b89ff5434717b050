use std::collections::HashSet;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use anyhow::Context;
use memmap2::Mmap;
use zip::ZipArchive;
use zip::result::ZipError;

use super::{ClassSource, ClasspathEntry, ShadowIndex, class_file_path, class_name_from_path};
use crate::classfile::parse_class;
use crate::error::{Result, SigError};
use crate::module_info::ModuleDescription;

const MODULE_INFO: &str = "module-info.class";
const VERSIONED_MODULE_INFO: &str = "META-INF/versions/";

/// A `.jar` or `.zip` archive, memory-mapped for the lifetime of the entry.
pub struct JarEntry {
    path: PathBuf,
    archive: Option<ZipArchive<Cursor<Mmap>>>,
    /// Every class in the archive, shadowed or not.
    present: HashSet<String>,
    names: Vec<String>,
    pos: usize,
}

impl JarEntry {
    pub fn open(path: &Path, shadow: &mut ShadowIndex, index: usize) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        // SAFETY: The file is opened read-only and the mapping is owned by the archive.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to mmap {}", path.display()))?;
        let archive = ZipArchive::new(Cursor::new(mmap))
            .with_context(|| format!("Failed to read archive {}", path.display()))?;

        let mut all: Vec<String> = archive
            .file_names()
            .filter(|n| !n.starts_with("META-INF/"))
            .filter_map(class_name_from_path)
            .collect();
        all.sort();
        all.dedup();
        let present: HashSet<String> = all.iter().cloned().collect();
        let names = shadow.claim_all(all, index);
        tracing::debug!(jar = %path.display(), classes = names.len(), "indexed jar");

        Ok(Self {
            path: path.to_path_buf(),
            archive: Some(archive),
            present,
            names,
            pos: 0,
        })
    }

    fn archive(&mut self) -> Result<&mut ZipArchive<Cursor<Mmap>>> {
        let path = &self.path;
        self.archive.as_mut().ok_or_else(|| {
            SigError::Io(std::io::Error::other(format!("archive {} is closed", path.display())))
        })
    }

    fn read_entry(&mut self, entry_name: &str) -> Result<Option<Vec<u8>>> {
        let archive = self.archive()?;
        let mut file = match archive.by_name(entry_name) {
            Ok(f) => f,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)?;
        Ok(Some(bytes))
    }
}

impl ClasspathEntry for JarEntry {
    fn location(&self) -> &Path {
        &self.path
    }

    fn has_next(&self) -> bool {
        self.pos < self.names.len()
    }

    fn next_class_name(&mut self) -> Option<String> {
        let name = self.names.get(self.pos).cloned()?;
        self.pos += 1;
        Some(name)
    }

    fn set_list_to_begin(&mut self) {
        self.pos = 0;
    }

    fn find_class(&mut self, name: &str) -> Result<ClassSource> {
        if !self.present.contains(name) {
            return Err(SigError::ClassNotFound(name.to_string()));
        }
        match self.read_entry(&class_file_path(name))? {
            Some(bytes) => Ok(ClassSource::Bytecode(bytes)),
            None => Err(SigError::ClassNotFound(name.to_string())),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.present.contains(name)
    }

    /// The root `module-info.class`, or the one under
    /// `META-INF/versions/<n>/` for multi-release jars.
    fn modules(&mut self) -> Result<Vec<ModuleDescription>> {
        let mut bytes = self.read_entry(MODULE_INFO)?;
        if bytes.is_none() {
            let versioned = self
                .archive()?
                .file_names()
                .filter(|n| n.starts_with(VERSIONED_MODULE_INFO) && n.ends_with(MODULE_INFO))
                .max()
                .map(str::to_string);
            if let Some(entry_name) = versioned {
                bytes = self.read_entry(&entry_name)?;
            }
        }
        match bytes {
            Some(bytes) => Ok(parse_class(&bytes)?.module.into_iter().collect()),
            None => Ok(Vec::new()),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.archive = None;
        self.names.clear();
        self.pos = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use tempfile::TempDir;
    use zip::ZipWriter;
    use zip::write::FileOptions;

    fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
        let file = File::create(path)?;
        let mut zip = ZipWriter::new(file);
        for (name, data) in entries {
            zip.start_file(*name, FileOptions::default())?;
            zip.write_all(data)?;
        }
        zip.finish()?;
        Ok(())
    }

    #[test]
    fn reads_classes_and_skips_metadata() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let jar = dir.path().join("lib.jar");
        write_jar(
            &jar,
            &[
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
                ("com/example/Foo.class", b"foo"),
                ("com/example/Bar.class", b"bar"),
                ("com/example/package-info.class", b"pi"),
            ],
        )?;

        let mut shadow = ShadowIndex::default();
        shadow.claim("com.example.Bar", 0);
        let mut entry = JarEntry::open(&jar, &mut shadow, 1)?;
        assert_eq!(entry.next_class_name().as_deref(), Some("com.example.Foo"));
        assert!(!entry.has_next());
        assert!(entry.contains("com.example.Bar"));

        match entry.find_class("com.example.Foo")? {
            ClassSource::Bytecode(bytes) => assert_eq!(bytes, b"foo"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(entry.find_class("com.example.Nope"), Err(SigError::ClassNotFound(_))));
        assert!(entry.modules()?.is_empty());
        Ok(())
    }

    #[test]
    fn lookups_fail_after_close() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let jar = dir.path().join("lib.jar");
        write_jar(&jar, &[("a/B.class", b"b")])?;

        let mut entry = JarEntry::open(&jar, &mut ShadowIndex::default(), 0)?;
        entry.close()?;
        assert!(!entry.has_next());
        assert!(matches!(entry.find_class("a.B"), Err(SigError::Io(_))));
        Ok(())
    }

    #[test]
    fn rejects_non_archive() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let jar = dir.path().join("broken.jar");
        std::fs::write(&jar, b"not a zip")?;
        assert!(JarEntry::open(&jar, &mut ShadowIndex::default(), 0).is_err());
        Ok(())
    }
}
