//! Captures a whole classpath into one signature file.

use std::io::Write;

use crate::class::ClassDescription;
use crate::classpath::Classpath;
use crate::error::Result;
use crate::format::Feature;
use crate::writer::SignatureWriter;

#[derive(Debug, Default)]
pub struct SnapshotReport {
    pub modules_written: usize,
    pub classes_written: usize,
    /// Class name and the reason it was left out.
    pub skipped: Vec<(String, String)>,
}

/// Writes every module and then every class the classpath enumerates.
/// Classes that cannot be resolved are skipped; write errors abort.
pub fn write_snapshot<W: Write>(
    classpath: &mut Classpath,
    writer: &mut SignatureWriter<W>,
) -> Result<SnapshotReport> {
    let mut report = SnapshotReport::default();
    writer.write_header()?;

    if writer.has_feature(Feature::ModuleInfo) {
        write_modules(classpath, writer, &mut report)?;
    } else {
        tracing::debug!("format has no module descriptors, leaving modules out");
    }

    classpath.set_list_to_begin();
    while let Some(name) = classpath.next_class_name() {
        match classpath.find_class_description(&name) {
            Ok(class) => {
                writer.write_class(&class)?;
                report.classes_written += 1;
            }
            Err(e) => {
                tracing::warn!(class = %name, error = %e, "skipping class");
                report.skipped.push((name, e.to_string()));
            }
        }
    }
    writer.flush()?;

    tracing::info!(
        modules = report.modules_written,
        classes = report.classes_written,
        skipped = report.skipped.len(),
        "snapshot written"
    );
    Ok(report)
}

fn write_modules<W: Write>(
    classpath: &mut Classpath,
    writer: &mut SignatureWriter<W>,
    report: &mut SnapshotReport,
) -> Result<()> {
    match classpath.modules() {
        Ok(modules) => {
            for module in modules {
                writer.write_class(&ClassDescription::from_module(module))?;
                report.modules_written += 1;
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "module descriptors unavailable");
            report.skipped.push(("<modules>".to_string(), e.to_string()));
        }
    }
    Ok(())
}
