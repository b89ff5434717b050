use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::{ClassSource, ClasspathEntry, ShadowIndex};
use crate::class::ClassDescription;
use crate::error::{Result, SigError};
use crate::format::FormatRegistry;
use crate::module_info::ModuleDescription;

/// A previously written signature file used as a class source. The whole
/// file is read when the entry is opened; classes enumerate in file order.
pub struct SignatureFileEntry {
    path: PathBuf,
    classes: HashMap<String, ClassDescription>,
    /// Class names in the order the file lists them.
    order: Vec<String>,
    modules: Vec<ModuleDescription>,
    names: Vec<String>,
    pos: usize,
}

impl SignatureFileEntry {
    pub fn open(
        path: &Path,
        shadow: &mut ShadowIndex,
        index: usize,
        registry: &FormatRegistry,
    ) -> anyhow::Result<Self> {
        let mut reader = registry
            .open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?
            .ok_or_else(|| SigError::FormatMismatch(path.display().to_string()))?;
        let descriptions = reader
            .read_all()
            .with_context(|| format!("Failed to read signature file {}", path.display()))?;
        reader.close();

        let mut classes = HashMap::with_capacity(descriptions.len());
        let mut order = Vec::with_capacity(descriptions.len());
        let mut modules = Vec::new();
        for description in descriptions {
            match description.module {
                Some(module) => modules.push(module),
                None if classes.contains_key(&description.name) => {
                    tracing::warn!(
                        file = %path.display(),
                        class = %description.name,
                        "class listed twice, keeping the first block"
                    );
                }
                None => {
                    order.push(description.name.clone());
                    classes.insert(description.name.clone(), description);
                }
            }
        }

        let names = shadow.claim_all(order.iter().cloned(), index);
        tracing::debug!(
            file = %path.display(),
            classes = classes.len(),
            modules = modules.len(),
            "loaded signature file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            classes,
            order,
            modules,
            names,
            pos: 0,
        })
    }

    /// Every class the file describes, shadowed or not, in file order.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

impl ClasspathEntry for SignatureFileEntry {
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
        self.classes
            .get(name)
            .cloned()
            .map(ClassSource::Description)
            .ok_or_else(|| SigError::ClassNotFound(name.to_string()))
    }

    fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    fn modules(&mut self) -> Result<Vec<ModuleDescription>> {
        Ok(self.modules.clone())
    }

    fn close(&mut self) -> Result<()> {
        self.classes.clear();
        self.order.clear();
        self.modules.clear();
        self.names.clear();
        self.pos = 0;
        Ok(())
    }
}
