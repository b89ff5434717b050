//! # apisig
//!
//! Reads and writes versioned Java API signature files and resolves class
//! descriptions from classpaths.
//!
//! ## Architecture
//!
//! - **class / member / annotation / modifiers / module_info**: the in-memory class model
//! - **grammar / constant**: the member-line micro-grammar and constant literals
//! - **format / legacy**: the six format revisions, their features and legacy line rules
//! - **reader / writer**: the signature-file codec
//! - **descriptor / classfile**: `.class` bytes to class descriptions
//! - **classpath**: directories, jars, module images and signature files merged
//!   into one shadowing classpath
//! - **snapshot**: a whole classpath written as one signature file
//! - **config**: per-run settings

pub mod annotation;
pub mod class;
pub mod classfile;
pub mod classpath;
pub mod config;
pub mod constant;
pub mod descriptor;
pub mod error;
pub mod format;
pub mod grammar;
pub mod legacy;
pub mod member;
pub mod modifiers;
pub mod module_info;
pub mod reader;
pub mod snapshot;
pub mod writer;

pub use class::ClassDescription;
pub use classpath::{ClassPresence, ClassSource, Classpath, ClasspathEntry};
pub use config::Config;
pub use error::{Result, SigError};
pub use format::{Feature, FeatureSet, Format, FormatRegistry};
pub use legacy::LegacyRule;
pub use member::{MemberDescription, MemberType};
pub use modifiers::Modifiers;
pub use module_info::ModuleDescription;
pub use reader::SignatureReader;
pub use snapshot::{SnapshotReport, write_snapshot};
pub use writer::SignatureWriter;
