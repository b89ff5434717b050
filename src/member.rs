use crate::annotation::AnnotationItem;
use crate::modifiers::Modifiers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MemberType {
    SuperClass,
    SuperInterface,
    Field,
    Method,
    Constructor,
    Inner,
}

impl MemberType {
    /// Order in which member kinds are written inside a class block.
    pub const WRITE_ORDER: [MemberType; 6] = [
        MemberType::SuperClass,
        MemberType::SuperInterface,
        MemberType::Field,
        MemberType::Method,
        MemberType::Constructor,
        MemberType::Inner,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            MemberType::SuperClass => "SUPR",
            MemberType::SuperInterface => "INTF",
            MemberType::Field => "FLD",
            MemberType::Method => "METH",
            MemberType::Constructor => "CONS",
            MemberType::Inner => "INNER",
        }
    }

    pub fn from_prefix(tag: &str) -> Option<MemberType> {
        MemberType::WRITE_ORDER
            .into_iter()
            .find(|t| t.prefix() == tag)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberDescription {
    pub declaring_class: String,
    /// Field or method name, simple class name for constructors, qualified
    /// (`Outer$Inner`) name for nested classes, and the type name for
    /// super types.
    pub name: String,
    pub modifiers: Modifiers,
    pub annotations: Vec<AnnotationItem>,
    pub detail: MemberDetail,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MemberDetail {
    Field {
        ty: String,
        constant: Option<String>,
    },
    Method {
        type_parameters: Option<String>,
        return_type: String,
        /// Comma separated, no spaces between arguments.
        args: String,
        throws: Vec<String>,
        default_value: Option<String>,
    },
    Constructor {
        type_parameters: Option<String>,
        args: String,
        throws: Vec<String>,
    },
    Inner,
    SuperClass,
    SuperInterface {
        /// `false` when inherited through another type in the hierarchy.
        direct: bool,
    },
}

impl MemberDescription {
    fn new(declaring_class: &str, name: &str, modifiers: Modifiers, detail: MemberDetail) -> Self {
        Self {
            declaring_class: declaring_class.to_string(),
            name: name.to_string(),
            modifiers,
            annotations: Vec::new(),
            detail,
        }
    }

    pub fn field(
        declaring_class: &str,
        name: &str,
        modifiers: Modifiers,
        ty: &str,
        constant: Option<&str>,
    ) -> Self {
        Self::new(
            declaring_class,
            name,
            modifiers,
            MemberDetail::Field {
                ty: ty.to_string(),
                constant: constant.map(str::to_string),
            },
        )
    }

    pub fn method(
        declaring_class: &str,
        name: &str,
        modifiers: Modifiers,
        return_type: &str,
        args: &str,
    ) -> Self {
        Self::new(
            declaring_class,
            name,
            modifiers,
            MemberDetail::Method {
                type_parameters: None,
                return_type: return_type.to_string(),
                args: args.to_string(),
                throws: Vec::new(),
                default_value: None,
            },
        )
    }

    /// The constructor's name is always the simple name of `declaring_class`.
    pub fn constructor(declaring_class: &str, modifiers: Modifiers, args: &str) -> Self {
        Self::new(
            declaring_class,
            simple_name(declaring_class),
            modifiers,
            MemberDetail::Constructor {
                type_parameters: None,
                args: args.to_string(),
                throws: Vec::new(),
            },
        )
    }

    pub fn inner(declaring_class: &str, nested_name: &str, modifiers: Modifiers) -> Self {
        Self::new(declaring_class, nested_name, modifiers, MemberDetail::Inner)
    }

    pub fn super_class(declaring_class: &str, name: &str) -> Self {
        Self::new(declaring_class, name, Modifiers::empty(), MemberDetail::SuperClass)
    }

    pub fn super_interface(declaring_class: &str, name: &str, direct: bool) -> Self {
        Self::new(
            declaring_class,
            name,
            Modifiers::empty(),
            MemberDetail::SuperInterface { direct },
        )
    }

    pub fn with_throws(mut self, types: &[&str]) -> Self {
        if let MemberDetail::Method { throws, .. } | MemberDetail::Constructor { throws, .. } =
            &mut self.detail
        {
            *throws = types.iter().map(|t| t.to_string()).collect();
        }
        self
    }

    pub fn with_type_parameters(mut self, params: &str) -> Self {
        if let MemberDetail::Method { type_parameters, .. }
        | MemberDetail::Constructor { type_parameters, .. } = &mut self.detail
        {
            *type_parameters = Some(params.to_string());
        }
        self
    }

    pub fn with_default(mut self, value: &str) -> Self {
        if let MemberDetail::Method { default_value, .. } = &mut self.detail {
            *default_value = Some(value.to_string());
        }
        self
    }

    pub fn with_annotation(mut self, annotation: AnnotationItem) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn member_type(&self) -> MemberType {
        match self.detail {
            MemberDetail::Field { .. } => MemberType::Field,
            MemberDetail::Method { .. } => MemberType::Method,
            MemberDetail::Constructor { .. } => MemberType::Constructor,
            MemberDetail::Inner => MemberType::Inner,
            MemberDetail::SuperClass => MemberType::SuperClass,
            MemberDetail::SuperInterface { .. } => MemberType::SuperInterface,
        }
    }

    pub fn is_direct(&self) -> bool {
        !matches!(self.detail, MemberDetail::SuperInterface { direct: false })
    }

    pub fn constant(&self) -> Option<&str> {
        match &self.detail {
            MemberDetail::Field { constant, .. } => constant.as_deref(),
            _ => None,
        }
    }

    pub fn field_type(&self) -> Option<&str> {
        match &self.detail {
            MemberDetail::Field { ty, .. } => Some(ty),
            _ => None,
        }
    }
}

/// `a.b.Outer$Inner` -> `Inner`.
pub fn simple_name(qualified: &str) -> &str {
    let tail = qualified.rsplit('.').next().unwrap_or(qualified);
    tail.rsplit('$').next().unwrap_or(tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_take_the_simple_class_name() {
        let c = MemberDescription::constructor("a.b.Outer$Inner", Modifiers::PUBLIC, "int");
        assert_eq!(c.name, "Inner");
        assert_eq!(c.member_type(), MemberType::Constructor);
    }

    #[test]
    fn prefixes_round_trip() {
        for t in MemberType::WRITE_ORDER {
            assert_eq!(MemberType::from_prefix(t.prefix()), Some(t));
        }
        assert_eq!(MemberType::from_prefix("CLSS"), None);
    }
}
