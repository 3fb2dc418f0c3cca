//! Generic type model and JVM signature parsing.
//!
//! Class files describe types in two notations: erased *descriptors*
//! (`Ljava/lang/Object;`) and generic *signatures* (`TT;`,
//! `Ljava/util/List<Ljava/lang/String;>;`). Descriptors are a subset of
//! signatures, so a single parser handles both. Class names are kept in their
//! internal slash-separated form.

use core::fmt;

/// Primitive (base) types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Primitive {
    /// `Z`
    Boolean,
    /// `B`
    Byte,
    /// `C`
    Char,
    /// `S`
    Short,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `F`
    Float,
    /// `D`
    Double,
    /// `V`, only valid as a method return type
    Void,
}

impl Primitive {
    /// Parse a base type descriptor character.
    pub const fn from_descriptor(c: u8) -> Option<Self> {
        Some(match c {
            b'Z' => Self::Boolean,
            b'B' => Self::Byte,
            b'C' => Self::Char,
            b'S' => Self::Short,
            b'I' => Self::Int,
            b'J' => Self::Long,
            b'F' => Self::Float,
            b'D' => Self::Double,
            b'V' => Self::Void,
            _ => return None,
        })
    }

    /// The descriptor character for this type.
    pub const fn descriptor(self) -> char {
        match self {
            Self::Boolean => 'Z',
            Self::Byte => 'B',
            Self::Char => 'C',
            Self::Short => 'S',
            Self::Int => 'I',
            Self::Long => 'J',
            Self::Float => 'F',
            Self::Double => 'D',
            Self::Void => 'V',
        }
    }

    /// Source-level name: `int`, `boolean`, ...
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Void => "void",
        }
    }
}

/// A possibly parameterized type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GenericType {
    /// A primitive type.
    Primitive(Primitive),
    /// A raw class, by internal name (`java/lang/String`).
    Class(String),
    /// A class applied to type arguments (`java/util/List<T>`).
    Parameterized {
        /// Internal name of the generic class.
        raw: String,
        /// Its arguments, in declaration order.
        args: Vec<TypeArgument>,
    },
    /// A type variable (`T`).
    Variable(String),
    /// An array of the component type.
    Array(Box<GenericType>),
}

/// One argument of a parameterized type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeArgument {
    /// `T`
    Exact(GenericType),
    /// `? extends T`
    Extends(GenericType),
    /// `? super T`
    Super(GenericType),
    /// `?`
    Wildcard,
}

impl TypeArgument {
    /// The type a variable bound to this argument should be treated as.
    pub fn bound(&self) -> GenericType {
        match self {
            Self::Exact(ty) | Self::Extends(ty) => ty.clone(),
            Self::Super(_) | Self::Wildcard => GenericType::object(),
        }
    }

    fn substitute(&self, bindings: &TypeBindings) -> Self {
        match self {
            Self::Exact(ty) => Self::Exact(ty.substitute(bindings)),
            Self::Extends(ty) => Self::Extends(ty.substitute(bindings)),
            Self::Super(ty) => Self::Super(ty.substitute(bindings)),
            Self::Wildcard => Self::Wildcard,
        }
    }
}

impl From<GenericType> for TypeArgument {
    fn from(ty: GenericType) -> Self {
        Self::Exact(ty)
    }
}

const OBJECT: &str = "java/lang/Object";

impl GenericType {
    /// A raw class by internal name.
    pub fn class(name: impl Into<String>) -> Self {
        Self::Class(name.into())
    }

    /// A class applied to type arguments.
    pub fn parameterized<A>(raw: impl Into<String>, args: impl IntoIterator<Item = A>) -> Self
    where
        A: Into<TypeArgument>,
    {
        Self::Parameterized {
            raw: raw.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// A type variable.
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// An array of `component`.
    pub fn array(component: GenericType) -> Self {
        Self::Array(Box::new(component))
    }

    /// `java/lang/Object`, the fallback for anything unbound.
    pub fn object() -> Self {
        Self::class(OBJECT)
    }

    /// `java/lang/String`
    pub fn string() -> Self {
        Self::class("java/lang/String")
    }

    /// `int`
    pub fn int() -> Self {
        Self::Primitive(Primitive::Int)
    }

    /// `long`
    pub fn long() -> Self {
        Self::Primitive(Primitive::Long)
    }

    /// Parse a single type signature or field descriptor.
    pub fn from_signature(signature: &str) -> Result<Self, SignatureError> {
        let mut parser = SignatureParser::new(signature);
        let ty = parser.java_type()?;
        parser.finish()?;
        Ok(ty)
    }

    /// Internal name of the class, for class and parameterized types.
    pub fn raw_name(&self) -> Option<&str> {
        match self {
            Self::Class(name) | Self::Parameterized { raw: name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    /// Type arguments of a parameterized type; empty otherwise.
    pub fn type_arguments(&self) -> &[TypeArgument] {
        match self {
            Self::Parameterized { args, .. } => args.as_slice(),
            _ => &[],
        }
    }

    /// Whether this is a bare type variable.
    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }

    /// Whether this is `java/lang/Object`.
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Class(name) if name == OBJECT)
    }

    /// The runtime type: arguments dropped, variables replaced by `Object`.
    pub fn erasure(&self) -> Self {
        match self {
            Self::Primitive(_) | Self::Class(_) => self.clone(),
            Self::Parameterized { raw, .. } => Self::Class(raw.clone()),
            Self::Variable(_) => Self::object(),
            Self::Array(component) => Self::array(component.erasure()),
        }
    }

    /// Replace type variables by their bindings; unbound variables become `Object`.
    pub fn substitute(&self, bindings: &TypeBindings) -> Self {
        match self {
            Self::Primitive(_) | Self::Class(_) => self.clone(),
            Self::Parameterized { raw, args } => Self::Parameterized {
                raw: raw.clone(),
                args: args.iter().map(|arg| arg.substitute(bindings)).collect(),
            },
            Self::Variable(name) => bindings.get(name).cloned().unwrap_or_else(Self::object),
            Self::Array(component) => Self::array(component.substitute(bindings)),
        }
    }

    /// Internal names of every class this type mentions, outermost first.
    pub fn referenced_classes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_classes(&mut out);
        out
    }

    fn collect_classes<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Primitive(_) | Self::Variable(_) => {}
            Self::Class(name) => out.push(name),
            Self::Parameterized { raw, args } => {
                out.push(raw);
                for arg in args {
                    match arg {
                        TypeArgument::Exact(ty)
                        | TypeArgument::Extends(ty)
                        | TypeArgument::Super(ty) => ty.collect_classes(out),
                        TypeArgument::Wildcard => {}
                    }
                }
            }
            Self::Array(component) => component.collect_classes(out),
        }
    }

    /// Field descriptor of the erased type (`Ljava/lang/String;`, `[I`).
    pub fn descriptor(&self) -> String {
        match self.erasure() {
            Self::Primitive(p) => p.descriptor().to_string(),
            Self::Class(name) => format!("L{name};"),
            Self::Array(component) => format!("[{}", component.descriptor()),
            Self::Parameterized { .. } | Self::Variable(_) => unreachable!("erased"),
        }
    }
}

impl fmt::Display for GenericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => f.write_str(p.name()),
            Self::Class(name) => write_class_name(f, name),
            Self::Parameterized { raw, args } => {
                write_class_name(f, raw)?;
                f.write_str("<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(">")
            }
            Self::Variable(name) => f.write_str(name),
            Self::Array(component) => write!(f, "{component}[]"),
        }
    }
}

impl fmt::Display for TypeArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(ty) => write!(f, "{ty}"),
            Self::Extends(ty) => write!(f, "? extends {ty}"),
            Self::Super(ty) => write!(f, "? super {ty}"),
            Self::Wildcard => f.write_str("?"),
        }
    }
}

fn write_class_name(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    for part in name.split('/').enumerate() {
        match part {
            (0, part) => f.write_str(part)?,
            (_, part) => write!(f, ".{part}")?,
        }
    }
    Ok(())
}

/// Type variables bound to concrete types at a use site.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeBindings {
    entries: Vec<(String, GenericType)>,
}

impl TypeBindings {
    /// No bindings: every variable falls back to `Object`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a generic class's `type_params` to the arguments of `target`.
    ///
    /// A raw `target`, or one whose argument count does not line up, binds
    /// nothing.
    pub fn for_target(type_params: &[String], target: &GenericType) -> Self {
        let args = target.type_arguments();
        if args.len() != type_params.len() {
            return Self::new();
        }
        Self {
            entries: type_params
                .iter()
                .zip(args)
                .map(|(name, arg)| (name.clone(), arg.bound()))
                .collect(),
        }
    }

    /// Add one binding.
    pub fn bind(mut self, name: impl Into<String>, ty: GenericType) -> Self {
        self.entries.push((name.into(), ty));
        self
    }

    /// The type bound to `name`.
    pub fn get(&self, name: &str) -> Option<&GenericType> {
        self.entries
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, ty)| ty)
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A signature or descriptor that does not follow the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureError {
    /// The text being parsed.
    pub signature: String,
    /// Byte offset of the problem.
    pub pos: usize,
    /// What was expected there.
    pub message: &'static str,
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "malformed signature {:?} at position {}: {}",
            self.signature, self.pos, self.message
        )
    }
}

impl std::error::Error for SignatureError {}

/// A parsed method signature or descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    /// Method-level type parameter names.
    pub type_params: Vec<String>,
    /// Parameter types in order.
    pub params: Vec<GenericType>,
    /// Return type (`void` included).
    pub ret: GenericType,
}

impl MethodSignature {
    /// Parse a method signature (`<X:..>(TX;)V`) or descriptor (`(I)V`).
    pub fn parse(signature: &str) -> Result<Self, SignatureError> {
        let mut parser = SignatureParser::new(signature);
        let type_params = parser.type_parameters()?;
        parser.expect(b'(', "expected '('")?;
        let mut params = Vec::new();
        while parser.peek() != Some(b')') {
            params.push(parser.java_type()?);
        }
        parser.expect(b')', "expected ')'")?;
        let ret = parser.java_type()?;
        // Throws clauses (`^...`) carry nothing we use.
        while parser.peek() == Some(b'^') {
            parser.pos += 1;
            parser.java_type()?;
        }
        parser.finish()?;
        Ok(Self {
            type_params,
            params,
            ret,
        })
    }
}

/// Type-variable names declared by a class signature (`<T:..;U:..>L..;`).
pub fn class_type_parameters(signature: &str) -> Result<Vec<String>, SignatureError> {
    let mut parser = SignatureParser::new(signature);
    let names = parser.type_parameters()?;
    // Superclass then interfaces.
    while parser.peek().is_some() {
        parser.java_type()?;
    }
    Ok(names)
}

struct SignatureParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> SignatureParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self, message: &'static str) -> SignatureError {
        SignatureError {
            signature: self.input.to_string(),
            pos: self.pos,
            message,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn expect(&mut self, expected: u8, message: &'static str) -> Result<(), SignatureError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    fn finish(&self) -> Result<(), SignatureError> {
        match self.peek() {
            None => Ok(()),
            Some(_) => Err(self.error("trailing characters")),
        }
    }

    /// Identifier up to (not including) any byte in `stops`.
    fn identifier(&mut self, stops: &[u8]) -> Result<&'a str, SignatureError> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if stops.contains(&b) {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected identifier"));
        }
        Ok(&self.input[start..self.pos])
    }

    /// Optional `<T:bound;U::iface;>` block; returns the variable names.
    fn type_parameters(&mut self) -> Result<Vec<String>, SignatureError> {
        let mut names = Vec::new();
        if self.peek() != Some(b'<') {
            return Ok(names);
        }
        self.pos += 1;
        while self.peek() != Some(b'>') {
            names.push(self.identifier(b":>")?.to_string());
            // Class bound (possibly empty) then interface bounds.
            self.expect(b':', "expected ':' after type parameter")?;
            if !matches!(self.peek(), Some(b':') | Some(b'>')) {
                self.reference_type()?;
            }
            while self.peek() == Some(b':') {
                self.pos += 1;
                self.reference_type()?;
            }
        }
        self.pos += 1;
        if names.is_empty() {
            return Err(self.error("empty type parameter list"));
        }
        Ok(names)
    }

    fn java_type(&mut self) -> Result<GenericType, SignatureError> {
        match self.peek() {
            Some(b) => match Primitive::from_descriptor(b) {
                Some(p) => {
                    self.pos += 1;
                    Ok(GenericType::Primitive(p))
                }
                None => self.reference_type(),
            },
            None => Err(self.error("unexpected end of signature")),
        }
    }

    fn reference_type(&mut self) -> Result<GenericType, SignatureError> {
        match self.bump() {
            Some(b'L') => self.class_type(),
            Some(b'T') => {
                let name = self.identifier(b";")?;
                self.expect(b';', "expected ';' after type variable")?;
                Ok(GenericType::variable(name))
            }
            Some(b'[') => Ok(GenericType::array(self.java_type()?)),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.error("expected reference type"))
            }
        }
    }

    /// After the leading `L`: `pkg/Outer<..>.Inner<..>;`
    fn class_type(&mut self) -> Result<GenericType, SignatureError> {
        let mut raw = self.identifier(b"<.;")?.to_string();
        let mut args = self.type_arguments()?;
        while self.peek() == Some(b'.') {
            self.pos += 1;
            let inner = self.identifier(b"<.;")?;
            raw.push('$');
            raw.push_str(inner);
            args = self.type_arguments()?;
        }
        self.expect(b';', "expected ';' after class type")?;
        Ok(if args.is_empty() {
            GenericType::Class(raw)
        } else {
            GenericType::Parameterized { raw, args }
        })
    }

    fn type_arguments(&mut self) -> Result<Vec<TypeArgument>, SignatureError> {
        let mut args = Vec::new();
        if self.peek() != Some(b'<') {
            return Ok(args);
        }
        self.pos += 1;
        while self.peek() != Some(b'>') {
            let arg = match self.peek() {
                Some(b'*') => {
                    self.pos += 1;
                    TypeArgument::Wildcard
                }
                Some(b'+') => {
                    self.pos += 1;
                    TypeArgument::Extends(self.reference_type()?)
                }
                Some(b'-') => {
                    self.pos += 1;
                    TypeArgument::Super(self.reference_type()?)
                }
                Some(_) => TypeArgument::Exact(self.reference_type()?),
                None => return Err(self.error("unterminated type arguments")),
            };
            args.push(arg);
        }
        self.pos += 1;
        if args.is_empty() {
            return Err(self.error("empty type argument list"));
        }
        Ok(args)
    }
}
