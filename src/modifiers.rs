use bitflags::bitflags;

bitflags! {
    /// Modifier bitset shared by classes and members.
    ///
    /// The bit layout is independent of the JVM access flags, which reuse
    /// bits between classes, fields and methods; `classfile` translates.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u32 {
        const PUBLIC = 1 << 0;
        const PROTECTED = 1 << 1;
        const PRIVATE = 1 << 2;
        const ABSTRACT = 1 << 3;
        const STATIC = 1 << 4;
        const FINAL = 1 << 5;
        const TRANSIENT = 1 << 6;
        const VOLATILE = 1 << 7;
        const SYNCHRONIZED = 1 << 8;
        const NATIVE = 1 << 9;
        const STRICTFP = 1 << 10;
        const INTERFACE = 1 << 11;
        const ANNOTATION = 1 << 12;
        const ENUM = 1 << 13;
        // Never written; used to route members into the hidden lists.
        const SYNTHETIC = 1 << 14;
        const BRIDGE = 1 << 15;
        const VARARGS = 1 << 16;
    }
}

/// Keywords in the order they are written.
const KEYWORDS: &[(&str, Modifiers)] = &[
    ("public", Modifiers::PUBLIC),
    ("protected", Modifiers::PROTECTED),
    ("private", Modifiers::PRIVATE),
    ("abstract", Modifiers::ABSTRACT),
    ("static", Modifiers::STATIC),
    ("final", Modifiers::FINAL),
    ("transient", Modifiers::TRANSIENT),
    ("volatile", Modifiers::VOLATILE),
    ("synchronized", Modifiers::SYNCHRONIZED),
    ("native", Modifiers::NATIVE),
    ("strictfp", Modifiers::STRICTFP),
    ("interface", Modifiers::INTERFACE),
    ("annotation", Modifiers::ANNOTATION),
    ("enum", Modifiers::ENUM),
];

impl Default for Modifiers {
    fn default() -> Self {
        Modifiers::empty()
    }
}

impl Modifiers {
    pub fn from_keyword(word: &str) -> Option<Modifiers> {
        KEYWORDS
            .iter()
            .find(|(kw, _)| *kw == word)
            .map(|(_, flag)| *flag)
    }

    pub fn is_accessible(self) -> bool {
        self.intersects(Modifiers::PUBLIC | Modifiers::PROTECTED)
    }

    /// The writable keywords, in canonical order.
    pub fn keywords(self) -> Vec<&'static str> {
        KEYWORDS
            .iter()
            .filter(|(_, flag)| self.contains(*flag))
            .map(|(kw, _)| *kw)
            .collect()
    }

    /// Only the flags that survive serialization.
    pub fn visible(self) -> Modifiers {
        self - (Modifiers::SYNTHETIC | Modifiers::BRIDGE | Modifiers::VARARGS)
    }
}
