use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use ignore::WalkBuilder;

use super::{ClassSource, ClasspathEntry, ShadowIndex, class_file_path, class_name_from_path};
use crate::classfile::parse_class;
use crate::error::{Result, SigError};
use crate::module_info::ModuleDescription;

const MODULE_INFO: &str = "module-info.class";

/// A directory tree of `.class` files rooted at the default package.
pub struct DirectoryEntry {
    root: PathBuf,
    names: Vec<String>,
    pos: usize,
}

impl DirectoryEntry {
    pub fn open(root: &Path, shadow: &mut ShadowIndex, index: usize) -> anyhow::Result<Self> {
        let names = list_classes(root)?;
        let names = shadow.claim_all(names, index);
        tracing::debug!(root = %root.display(), classes = names.len(), "indexed class directory");
        Ok(Self {
            root: root.to_path_buf(),
            names,
            pos: 0,
        })
    }

    fn class_path(&self, name: &str) -> PathBuf {
        self.root.join(class_file_path(name))
    }
}

fn list_classes(root: &Path) -> anyhow::Result<Vec<String>> {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .parents(false)
        .build();

    let mut names = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if let Some(name) = class_name_from_path(&relative.to_string_lossy()) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

impl ClasspathEntry for DirectoryEntry {
    fn location(&self) -> &Path {
        &self.root
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
        let path = self.class_path(name);
        match fs::read(&path) {
            Ok(bytes) => Ok(ClassSource::Bytecode(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(SigError::ClassNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.class_path(name).is_file()
    }

    fn modules(&mut self) -> Result<Vec<ModuleDescription>> {
        let path = self.root.join(MODULE_INFO);
        if !path.is_file() {
            return Ok(Vec::new());
        }
        let class = parse_class(&fs::read(&path)?)?;
        Ok(class.module.into_iter().collect())
    }

    fn close(&mut self) -> Result<()> {
        self.names.clear();
        self.pos = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) -> anyhow::Result<()> {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, b"\xCA\xFE\xBA\xBE")?;
        Ok(())
    }

    #[test]
    fn enumerates_sorted_class_names() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        touch(dir.path(), "b/Two.class")?;
        touch(dir.path(), "a/One.class")?;
        touch(dir.path(), "a/One$Inner.class")?;
        touch(dir.path(), "a/package-info.class")?;
        touch(dir.path(), "a/readme.txt")?;

        let mut shadow = ShadowIndex::default();
        let mut entry = DirectoryEntry::open(dir.path(), &mut shadow, 0)?;
        let mut names = Vec::new();
        while let Some(n) = entry.next_class_name() {
            names.push(n);
        }
        assert_eq!(names, vec!["a.One", "a.One$Inner", "b.Two"]);
        assert!(!entry.has_next());

        entry.set_list_to_begin();
        assert_eq!(entry.next_class_name().as_deref(), Some("a.One"));

        assert!(matches!(entry.find_class("a.One")?, ClassSource::Bytecode(b) if b.len() == 4));
        assert!(matches!(entry.find_class("a.Missing"), Err(SigError::ClassNotFound(_))));
        assert!(entry.modules()?.is_empty());
        Ok(())
    }

    #[test]
    fn shadowed_names_are_not_enumerated_but_still_contained() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        touch(dir.path(), "a/One.class")?;
        touch(dir.path(), "a/Two.class")?;

        let mut shadow = ShadowIndex::default();
        shadow.claim("a.One", 0);
        let mut entry = DirectoryEntry::open(dir.path(), &mut shadow, 1)?;
        assert_eq!(entry.next_class_name().as_deref(), Some("a.Two"));
        assert_eq!(entry.next_class_name(), None);
        assert!(entry.contains("a.One"));
        assert_eq!(shadow.owner("a.One"), Some(0));
        Ok(())
    }
}
