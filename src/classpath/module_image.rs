use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use tempfile::TempDir;

use super::{ClassSource, ClasspathEntry, DirectoryEntry, ShadowIndex};
use crate::config::Config;
use crate::error::{Result, SigError};
use crate::module_info::ModuleDescription;

const TOOL: &str = "jimage";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A packed runtime image, extracted into a temporary directory and served
/// as one directory entry per module.
pub struct ModuleImageEntry {
    path: PathBuf,
    extracted: Option<TempDir>,
    modules: Vec<DirectoryEntry>,
    cursor: usize,
}

impl ModuleImageEntry {
    pub fn open(
        path: &Path,
        shadow: &mut ShadowIndex,
        index: usize,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let extracted = match &config.temp_root {
            Some(root) => TempDir::new_in(root),
            None => TempDir::new(),
        }
        .context("Failed to create extraction directory")?;

        extract(&config.jimage_path(), path, extracted.path(), config.extract_timeout)?;

        let mut dirs: Vec<PathBuf> = fs::read_dir(extracted.path())
            .with_context(|| format!("Failed to list {}", extracted.path().display()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        let mut modules = Vec::with_capacity(dirs.len());
        for dir in &dirs {
            modules.push(DirectoryEntry::open(dir, shadow, index)?);
        }
        tracing::debug!(image = %path.display(), modules = modules.len(), "extracted module image");

        Ok(Self {
            path: path.to_path_buf(),
            extracted: Some(extracted),
            modules,
            cursor: 0,
        })
    }
}

fn tool_command(tool: &Path) -> Command {
    #[cfg(windows)]
    {
        let lower = tool.to_string_lossy().to_ascii_lowercase();
        if lower.ends_with(".cmd") || lower.ends_with(".bat") {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(tool);
            return cmd;
        }
    }
    Command::new(tool)
}

fn tool_error(message: impl Into<String>) -> SigError {
    SigError::Tool {
        tool: TOOL.to_string(),
        message: message.into(),
    }
}

/// Runs `jimage extract --dir <target> <image>` and waits for it, killing
/// the tool once `timeout` elapses.
fn extract(tool: &Path, image: &Path, target: &Path, timeout: Option<Duration>) -> Result<()> {
    // Stderr goes to an anonymous file so a chatty tool cannot fill a pipe
    // while we poll.
    let mut stderr = tempfile::tempfile()?;
    let mut child = tool_command(tool)
        .arg("extract")
        .arg("--dir")
        .arg(target)
        .arg(image)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::from(stderr.try_clone()?))
        .spawn()
        .map_err(|e| tool_error(format!("failed to start {}: {e}", tool.display())))?;

    let started = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if timeout.is_some_and(|t| started.elapsed() >= t) {
            if let Err(e) = child.kill() {
                tracing::warn!(error = %e, "failed to kill extraction tool");
            }
            if let Err(e) = child.wait() {
                tracing::warn!(error = %e, "failed to reap extraction tool");
            }
            return Err(tool_error(format!(
                "timed out after {:?} extracting {}",
                timeout.unwrap_or_default(),
                image.display()
            )));
        }
        thread::sleep(POLL_INTERVAL);
    };

    if !status.success() {
        let mut message = String::new();
        stderr.seek(SeekFrom::Start(0))?;
        stderr.read_to_string(&mut message)?;
        return Err(tool_error(format!(
            "{} while extracting {}: {}",
            status,
            image.display(),
            message.trim()
        )));
    }
    Ok(())
}

impl ClasspathEntry for ModuleImageEntry {
    fn location(&self) -> &Path {
        &self.path
    }

    fn has_next(&self) -> bool {
        self.modules[self.cursor.min(self.modules.len())..]
            .iter()
            .any(|m| m.has_next())
    }

    fn next_class_name(&mut self) -> Option<String> {
        while let Some(module) = self.modules.get_mut(self.cursor) {
            if let Some(name) = module.next_class_name() {
                return Some(name);
            }
            self.cursor += 1;
        }
        None
    }

    fn set_list_to_begin(&mut self) {
        for module in &mut self.modules {
            module.set_list_to_begin();
        }
        self.cursor = 0;
    }

    fn find_class(&mut self, name: &str) -> Result<ClassSource> {
        for module in &mut self.modules {
            match module.find_class(name) {
                Err(e) if e.is_not_found() => continue,
                other => return other,
            }
        }
        Err(SigError::ClassNotFound(name.to_string()))
    }

    fn contains(&self, name: &str) -> bool {
        self.modules.iter().any(|m| m.contains(name))
    }

    fn modules(&mut self) -> Result<Vec<ModuleDescription>> {
        let mut out = Vec::new();
        for module in &mut self.modules {
            out.extend(module.modules()?);
        }
        Ok(out)
    }

    /// Removes the extracted tree even when a module failed to close.
    fn close(&mut self) -> Result<()> {
        let mut first_error = None;
        for module in &mut self.modules {
            if let Err(e) = module.close() {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        self.modules.clear();
        self.cursor = 0;
        if let Some(dir) = self.extracted.take() {
            dir.close()?;
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for ModuleImageEntry {
    fn drop(&mut self) {
        if let Some(dir) = self.extracted.take()
            && let Err(e) = dir.close()
        {
            tracing::warn!(image = %self.path.display(), error = %e, "failed to remove extracted module image");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn fake_tool(dir: &Path, body: &str) -> anyhow::Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("jimage");
        fs::write(&path, format!("#!/bin/sh\n{body}"))?;
        let mut perms = fs::metadata(&path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms)?;
        Ok(path)
    }

    /// `$3` is the target directory.
    const EXTRACT_TWO_MODULES: &str = r#"set -e
[ "$1" = "extract" ] && [ "$2" = "--dir" ] || { echo "bad args" >&2; exit 2; }
mkdir -p "$3/java.base/java/lang" "$3/java.sql/java/sql" "$3/java.sql/java/lang"
printf 'x' > "$3/java.base/java/lang/Object.class"
printf 'x' > "$3/java.base/java/lang/String.class"
printf 'x' > "$3/java.sql/java/sql/Driver.class"
printf 'y' > "$3/java.sql/java/lang/Object.class"
"#;

    #[test]
    fn extracts_modules_in_name_order() -> anyhow::Result<()> {
        let work = TempDir::new()?;
        let tool = fake_tool(work.path(), EXTRACT_TWO_MODULES)?;
        let image = work.path().join("modules");
        fs::write(&image, b"image")?;
        let config = Config::default()
            .with_jimage(&tool)
            .with_temp_root(work.path());

        let mut entry = ModuleImageEntry::open(&image, &mut ShadowIndex::default(), 0, &config)?;
        let extracted = entry
            .extracted
            .as_ref()
            .map(|d| d.path().to_path_buf())
            .ok_or_else(|| anyhow::anyhow!("no extraction directory"))?;

        let mut names = Vec::new();
        while let Some(n) = entry.next_class_name() {
            names.push(n);
        }
        assert_eq!(names, vec!["java.lang.Object", "java.lang.String", "java.sql.Driver"]);
        assert!(matches!(entry.find_class("java.sql.Driver")?, ClassSource::Bytecode(_)));
        assert!(matches!(entry.find_class("java.lang.Object")?, ClassSource::Bytecode(b) if b == b"x"));
        assert!(entry.modules()?.is_empty());

        entry.close()?;
        assert!(!extracted.exists());
        Ok(())
    }

    #[test]
    fn tool_failure_is_reported_and_cleaned_up() -> anyhow::Result<()> {
        let work = TempDir::new()?;
        let tool = fake_tool(work.path(), "echo \"cannot read image\" >&2\nexit 3\n")?;
        let image = work.path().join("broken.jimage");
        fs::write(&image, b"image")?;
        let scratch = work.path().join("scratch");
        fs::create_dir(&scratch)?;
        let config = Config::default().with_jimage(&tool).with_temp_root(&scratch);

        let err = match ModuleImageEntry::open(&image, &mut ShadowIndex::default(), 0, &config) {
            Ok(_) => anyhow::bail!("extraction should fail"),
            Err(e) => format!("{e:#}"),
        };
        assert!(err.contains("jimage failed"));
        assert!(err.contains("cannot read image"));
        assert_eq!(fs::read_dir(&scratch)?.count(), 0);
        Ok(())
    }

    #[test]
    fn hung_tool_is_killed_after_timeout() -> anyhow::Result<()> {
        let work = TempDir::new()?;
        let tool = fake_tool(work.path(), "exec sleep 30\n")?;
        let image = work.path().join("modules");
        fs::write(&image, b"image")?;
        let config = Config::default()
            .with_jimage(&tool)
            .with_extract_timeout(Some(Duration::from_millis(200)));

        let started = Instant::now();
        let result = ModuleImageEntry::open(&image, &mut ShadowIndex::default(), 0, &config);
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(10));
        Ok(())
    }
}
