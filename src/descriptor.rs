//! JVM descriptors and generic signatures rendered as source-form types.
//!
//! `[Ljava/lang/String;` becomes `java.lang.String[]`, and
//! `Ljava/util/Map<TK;+Ljava/util/List<TV;>;>;` becomes
//! `java.util.Map<K,? extends java.util.List<V>>`. Generic arguments are
//! joined without spaces so a type stays a single token on a member line.

type Parse<T> = std::result::Result<T, String>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassSignature {
    pub type_parameters: Option<String>,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodSignature {
    pub type_parameters: Option<String>,
    pub args: Vec<String>,
    pub return_type: String,
    pub throws: Vec<String>,
}

/// `java/lang/String` -> `java.lang.String`; nested classes keep `$`.
pub fn internal_to_dotted(name: &str) -> String {
    name.replace('/', ".")
}

pub fn field_type(descriptor: &str) -> Parse<String> {
    let mut c = Cursor::new(descriptor);
    let ty = c.java_type()?;
    c.finish()?;
    Ok(ty)
}

pub fn method_descriptor(descriptor: &str) -> Parse<MethodSignature> {
    method_signature(descriptor)
}

pub fn class_signature(signature: &str) -> Parse<ClassSignature> {
    let mut c = Cursor::new(signature);
    let type_parameters = c.type_parameters()?;
    let super_class = Some(c.reference_type()?);
    let mut interfaces = Vec::new();
    while !c.at_end() {
        interfaces.push(c.reference_type()?);
    }
    Ok(ClassSignature {
        type_parameters,
        super_class,
        interfaces,
    })
}

/// Also accepts plain method descriptors, which are a subset.
pub fn method_signature(signature: &str) -> Parse<MethodSignature> {
    let mut c = Cursor::new(signature);
    let type_parameters = c.type_parameters()?;
    c.expect(b'(')?;
    let mut args = Vec::new();
    while c.peek() != Some(b')') {
        args.push(c.java_type()?);
    }
    c.expect(b')')?;
    let return_type = c.java_type()?;
    let mut throws = Vec::new();
    while c.peek() == Some(b'^') {
        c.bump();
        throws.push(c.reference_type()?);
    }
    c.finish()?;
    Ok(MethodSignature {
        type_parameters,
        args,
        return_type,
        throws,
    })
}

pub fn field_signature(signature: &str) -> Parse<String> {
    field_type(signature)
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn fail(&self, message: &str) -> String {
        format!("{message} at offset {} in {:?}", self.pos, self.text)
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn expect(&mut self, want: u8) -> Parse<()> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            _ => Err(self.fail(&format!("expected '{}'", want as char))),
        }
    }

    fn finish(&self) -> Parse<()> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.fail("trailing characters"))
        }
    }

    fn identifier(&mut self, stops: &[u8]) -> Parse<&'a str> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if stops.contains(&c) {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.fail("expected an identifier"));
        }
        Ok(&self.text[start..self.pos])
    }

    fn java_type(&mut self) -> Parse<String> {
        let name = match self.peek() {
            Some(b'B') => "byte",
            Some(b'C') => "char",
            Some(b'D') => "double",
            Some(b'F') => "float",
            Some(b'I') => "int",
            Some(b'J') => "long",
            Some(b'S') => "short",
            Some(b'Z') => "boolean",
            Some(b'V') => "void",
            _ => return self.reference_type(),
        };
        self.bump();
        Ok(name.to_string())
    }

    fn reference_type(&mut self) -> Parse<String> {
        match self.peek() {
            Some(b'L') => self.class_type(),
            Some(b'T') => {
                self.bump();
                let name = self.identifier(b";")?.to_string();
                self.expect(b';')?;
                Ok(name)
            }
            Some(b'[') => {
                self.bump();
                Ok(format!("{}[]", self.java_type()?))
            }
            _ => Err(self.fail("expected a type")),
        }
    }

    fn class_type(&mut self) -> Parse<String> {
        self.expect(b'L')?;
        let mut out = internal_to_dotted(self.identifier(b"<.;")?);
        loop {
            if self.peek() == Some(b'<') {
                out.push_str(&self.type_arguments()?);
            }
            match self.bump() {
                Some(b';') => return Ok(out),
                Some(b'.') => {
                    out.push('$');
                    out.push_str(self.identifier(b"<.;")?);
                }
                _ => return Err(self.fail("unterminated class type")),
            }
        }
    }

    fn type_arguments(&mut self) -> Parse<String> {
        self.expect(b'<')?;
        let mut args = Vec::new();
        while self.peek() != Some(b'>') {
            let arg = match self.peek() {
                Some(b'*') => {
                    self.bump();
                    "?".to_string()
                }
                Some(b'+') => {
                    self.bump();
                    format!("? extends {}", self.reference_type()?)
                }
                Some(b'-') => {
                    self.bump();
                    format!("? super {}", self.reference_type()?)
                }
                Some(_) => self.reference_type()?,
                None => return Err(self.fail("unterminated type arguments")),
            };
            args.push(arg);
        }
        self.expect(b'>')?;
        Ok(format!("<{}>", args.join(",")))
    }

    fn type_parameters(&mut self) -> Parse<Option<String>> {
        if self.peek() != Some(b'<') {
            return Ok(None);
        }
        self.bump();
        let mut params = Vec::new();
        while self.peek() != Some(b'>') {
            if self.at_end() {
                return Err(self.fail("unterminated type parameters"));
            }
            let name = self.identifier(b":")?.to_string();
            let mut bounds = Vec::new();
            // Class bound, possibly empty, then interface bounds.
            self.expect(b':')?;
            if !matches!(self.peek(), Some(b':') | Some(b'>')) {
                bounds.push(self.reference_type()?);
            }
            while self.peek() == Some(b':') {
                self.bump();
                bounds.push(self.reference_type()?);
            }
            if bounds.is_empty() {
                bounds.push("java.lang.Object".to_string());
            }
            params.push(format!("{name} extends {}", bounds.join(" & ")));
        }
        self.expect(b'>')?;
        Ok(Some(format!("<{}>", params.join(","))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_descriptors() -> Parse<()> {
        assert_eq!(field_type("I")?, "int");
        assert_eq!(field_type("[[Ljava/lang/String;")?, "java.lang.String[][]");
        let m = method_descriptor("(I[JLjava/util/List;)V")?;
        assert_eq!(m.args, vec!["int", "long[]", "java.util.List"]);
        assert_eq!(m.return_type, "void");
        assert!(field_type("Q").is_err());
        assert!(field_type("II").is_err());
        Ok(())
    }

    #[test]
    fn generic_class_signature() -> Parse<()> {
        let sig = class_signature(
            "<K:Ljava/lang/Object;V::Ljava/lang/Comparable<TV;>;>Ljava/util/AbstractMap<TK;TV;>;Ljava/io/Serializable;",
        )?;
        assert_eq!(
            sig.type_parameters.as_deref(),
            Some("<K extends java.lang.Object,V extends java.lang.Comparable<V>>")
        );
        assert_eq!(sig.super_class.as_deref(), Some("java.util.AbstractMap<K,V>"));
        assert_eq!(sig.interfaces, vec!["java.io.Serializable"]);
        Ok(())
    }

    #[test]
    fn generic_method_signature_with_wildcards_and_throws() -> Parse<()> {
        let sig = method_signature(
            "<T:Ljava/lang/Object;>(Ljava/util/List<+TT;>;Ljava/util/Map$Entry<*-Ljava/lang/Number;>;)TT;^Ljava/io/IOException;^TX;",
        )?;
        assert_eq!(sig.type_parameters.as_deref(), Some("<T extends java.lang.Object>"));
        assert_eq!(
            sig.args,
            vec![
                "java.util.List<? extends T>",
                "java.util.Map$Entry<?,? super java.lang.Number>"
            ]
        );
        assert_eq!(sig.return_type, "T");
        assert_eq!(sig.throws, vec!["java.io.IOException", "X"]);
        Ok(())
    }

    #[test]
    fn inner_class_of_generic_outer() -> Parse<()> {
        assert_eq!(
            field_signature("La/Outer<TT;>.Inner<Ljava/lang/String;>;")?,
            "a.Outer<T>$Inner<java.lang.String>"
        );
        Ok(())
    }
}
