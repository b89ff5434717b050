#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_VARARGS: u16 = 0x0080;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;

/// Assembles just enough of a class file for the parser: constant pool,
/// fields with optional int constants, and bodiless methods.
pub struct ClassBuilder {
    pool: Vec<Vec<u8>>,
    access: u16,
    this: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
}

impl ClassBuilder {
    /// `name` is in internal form, e.g. `com/example/Foo`.
    pub fn new(name: &str, access: u16) -> Self {
        let mut b = Self {
            pool: Vec::new(),
            access,
            this: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        };
        b.this = b.class(name);
        b.super_class = b.class("java/lang/Object");
        b
    }

    fn push(&mut self, entry: Vec<u8>) -> u16 {
        self.pool.push(entry);
        self.pool.len() as u16
    }

    fn utf8(&mut self, s: &str) -> u16 {
        let mut e = vec![1];
        e.extend((s.len() as u16).to_be_bytes());
        e.extend(s.as_bytes());
        self.push(e)
    }

    fn class(&mut self, internal: &str) -> u16 {
        let n = self.utf8(internal);
        let mut e = vec![7];
        e.extend(n.to_be_bytes());
        self.push(e)
    }

    pub fn super_class(mut self, internal: &str) -> Self {
        self.super_class = self.class(internal);
        self
    }

    pub fn interface(mut self, internal: &str) -> Self {
        let idx = self.class(internal);
        self.interfaces.push(idx);
        self
    }

    pub fn field(mut self, access: u16, name: &str, descriptor: &str) -> Self {
        let name = self.utf8(name);
        let desc = self.utf8(descriptor);
        self.fields.push(member(access, name, desc, &[]));
        self
    }

    pub fn int_constant(mut self, access: u16, name: &str, value: i32) -> Self {
        let name = self.utf8(name);
        let desc = self.utf8("I");
        let attr = self.utf8("ConstantValue");
        let mut e = vec![3];
        e.extend(value.to_be_bytes());
        let constant = self.push(e);
        self.fields
            .push(member(access, name, desc, &[(attr, constant.to_be_bytes().to_vec())]));
        self
    }

    pub fn method(mut self, access: u16, name: &str, descriptor: &str) -> Self {
        let name = self.utf8(name);
        let desc = self.utf8(descriptor);
        self.methods.push(member(access, name, desc, &[]));
        self
    }

    /// A bodiless method carrying one runtime-visible marker annotation,
    /// e.g. `Ljava/lang/Deprecated;`.
    pub fn annotated_method(mut self, access: u16, name: &str, descriptor: &str, annotation: &str) -> Self {
        let name = self.utf8(name);
        let desc = self.utf8(descriptor);
        let attr = self.utf8("RuntimeVisibleAnnotations");
        let ty = self.utf8(annotation);
        let mut info = 1u16.to_be_bytes().to_vec();
        info.extend(ty.to_be_bytes());
        info.extend(0u16.to_be_bytes());
        self.methods.push(member(access, name, desc, &[(attr, info)]));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = MAGIC.to_vec();
        out.extend([0, 0, 0, 52]);
        out.extend((self.pool.len() as u16 + 1).to_be_bytes());
        for e in &self.pool {
            out.extend(e);
        }
        out.extend(self.access.to_be_bytes());
        out.extend(self.this.to_be_bytes());
        out.extend(self.super_class.to_be_bytes());
        out.extend((self.interfaces.len() as u16).to_be_bytes());
        for i in &self.interfaces {
            out.extend(i.to_be_bytes());
        }
        out.extend((self.fields.len() as u16).to_be_bytes());
        for f in &self.fields {
            out.extend(f);
        }
        out.extend((self.methods.len() as u16).to_be_bytes());
        for m in &self.methods {
            out.extend(m);
        }
        out.extend(0u16.to_be_bytes());
        out
    }
}

fn member(access: u16, name: u16, desc: u16, attrs: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(access.to_be_bytes());
    out.extend(name.to_be_bytes());
    out.extend(desc.to_be_bytes());
    out.extend((attrs.len() as u16).to_be_bytes());
    for (n, info) in attrs {
        out.extend(n.to_be_bytes());
        out.extend((info.len() as u32).to_be_bytes());
        out.extend(info);
    }
    out
}

/// `public class com.example.Foo { public static final int X = 5; public Foo() }`
pub fn foo_class() -> Vec<u8> {
    ClassBuilder::new("com/example/Foo", ACC_PUBLIC | ACC_SUPER)
        .int_constant(ACC_PUBLIC | ACC_STATIC | ACC_FINAL, "X", 5)
        .method(ACC_PUBLIC, "<init>", "()V")
        .build()
}

pub fn write_file(path: &Path, content: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    use zip::write::FileOptions;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, content) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(content)?;
    }
    zip.finish()?;
    Ok(())
}

#[cfg(unix)]
pub fn make_executable(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}
