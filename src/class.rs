use std::collections::BTreeSet;

use crate::annotation::AnnotationItem;
use crate::member::{MemberDescription, MemberType, simple_name};
use crate::modifiers::Modifiers;
use crate::module_info::ModuleDescription;

/// In-memory shape of one type (or, when `module` is set, of one module).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassDescription {
    pub name: String,
    pub modifiers: Modifiers,
    pub type_parameters: Option<String>,
    pub super_class: Option<MemberDescription>,
    pub interfaces: Vec<MemberDescription>,
    pub fields: Vec<MemberDescription>,
    pub methods: Vec<MemberDescription>,
    pub constructors: Vec<MemberDescription>,
    pub nested: Vec<MemberDescription>,
    pub annotations: Vec<AnnotationItem>,
    pub internal_fields: Option<BTreeSet<String>>,
    pub internal_classes: Option<BTreeSet<String>>,
    pub module: Option<ModuleDescription>,
}

impl ClassDescription {
    pub fn new(name: impl Into<String>, modifiers: Modifiers) -> Self {
        Self {
            name: name.into(),
            modifiers,
            ..Default::default()
        }
    }

    pub fn from_module(module: ModuleDescription) -> Self {
        Self {
            name: module.name.clone(),
            module: Some(module),
            ..Default::default()
        }
    }

    pub fn is_module(&self) -> bool {
        self.module.is_some()
    }

    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    pub fn package_name(&self) -> &str {
        self.name.rsplit_once('.').map(|(p, _)| p).unwrap_or_default()
    }

    /// Files a member into the collection for its kind.
    pub fn add_member(&mut self, member: MemberDescription) {
        match member.member_type() {
            MemberType::SuperClass => self.super_class = Some(member),
            MemberType::SuperInterface => self.interfaces.push(member),
            MemberType::Field => self.fields.push(member),
            MemberType::Method => self.methods.push(member),
            MemberType::Constructor => self.constructors.push(member),
            MemberType::Inner => self.nested.push(member),
        }
    }

    pub fn members(&self, kind: MemberType) -> &[MemberDescription] {
        match kind {
            MemberType::SuperClass => self.super_class.as_slice(),
            MemberType::SuperInterface => &self.interfaces,
            MemberType::Field => &self.fields,
            MemberType::Method => &self.methods,
            MemberType::Constructor => &self.constructors,
            MemberType::Inner => &self.nested,
        }
    }

    pub fn members_mut(&mut self, kind: MemberType) -> Option<&mut Vec<MemberDescription>> {
        match kind {
            MemberType::SuperClass => None,
            MemberType::SuperInterface => Some(&mut self.interfaces),
            MemberType::Field => Some(&mut self.fields),
            MemberType::Method => Some(&mut self.methods),
            MemberType::Constructor => Some(&mut self.constructors),
            MemberType::Inner => Some(&mut self.nested),
        }
    }

    /// Members of `kind` that belong in this class's block: declared here,
    /// and for super-interfaces only the direct ones.
    pub fn declared(&self, kind: MemberType) -> impl Iterator<Item = &MemberDescription> {
        self.members(kind)
            .iter()
            .filter(|m| m.declaring_class == self.name && m.is_direct())
    }

    pub fn field(&self, name: &str) -> Option<&MemberDescription> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&MemberDescription> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn super_class_name(&self) -> Option<&str> {
        self.super_class.as_ref().map(|s| s.name.as_str())
    }

    /// Orders members and annotations deterministically and folds empty
    /// hidden-name sets to `None`, so two descriptions of the same API
    /// compare equal regardless of discovery order.
    pub fn canonicalize(&mut self) {
        fn sort_annotations(list: &mut [AnnotationItem]) {
            list.sort_by_cached_key(|a| a.to_string());
        }
        sort_annotations(&mut self.annotations);
        if let Some(s) = self.super_class.as_mut() {
            sort_annotations(&mut s.annotations);
        }
        for kind in MemberType::WRITE_ORDER {
            if let Some(list) = self.members_mut(kind) {
                for m in list.iter_mut() {
                    sort_annotations(&mut m.annotations);
                }
                list.sort_by(|a, b| {
                    a.name
                        .cmp(&b.name)
                        .then_with(|| format!("{:?}", a.detail).cmp(&format!("{:?}", b.detail)))
                });
            }
        }
        if self.internal_fields.as_ref().is_some_and(BTreeSet::is_empty) {
            self.internal_fields = None;
        }
        if self.internal_classes.as_ref().is_some_and(BTreeSet::is_empty) {
            self.internal_classes = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_filters_inherited_members() {
        let mut c = ClassDescription::new("a.B", Modifiers::PUBLIC);
        c.add_member(MemberDescription::field("a.B", "own", Modifiers::PUBLIC, "int", None));
        c.add_member(MemberDescription::field("a.A", "inherited", Modifiers::PUBLIC, "int", None));
        c.add_member(MemberDescription::super_interface("a.B", "a.I", true));
        c.add_member(MemberDescription::super_interface("a.B", "a.J", false));

        let fields: Vec<_> = c.declared(MemberType::Field).map(|m| m.name.as_str()).collect();
        assert_eq!(fields, vec!["own"]);
        let ifaces: Vec<_> = c
            .declared(MemberType::SuperInterface)
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(ifaces, vec!["a.I"]);
    }

    #[test]
    fn names() {
        let c = ClassDescription::new("a.b.Outer$Inner", Modifiers::PUBLIC);
        assert_eq!(c.simple_name(), "Inner");
        assert_eq!(c.package_name(), "a.b");
        assert_eq!(ClassDescription::new("Top", Modifiers::empty()).package_name(), "");
    }
}
