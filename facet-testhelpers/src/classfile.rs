//! Writes JVM class files for tests.
//!
//! The output is structurally valid (magic, constant pool, members and
//! attributes, all lengths consistent) but method bodies are filled with
//! `nop`s: only the metadata matters to the code under test.
//!
//! ```
//! use facet_testhelpers::classfile::{ClassFileBuilder, MethodSpec, Param};
//!
//! let bytes = ClassFileBuilder::new("com/example/Person")
//!     .method(MethodSpec::constructor(
//!         "com/example/Person",
//!         [Param::new("name", "Ljava/lang/String;")],
//!     ))
//!     .build();
//! assert_eq!(&bytes[..4], &[0xca, 0xfe, 0xba, 0xbe]);
//! ```

use std::collections::HashMap;

/// `ACC_PUBLIC`
pub const ACC_PUBLIC: u16 = 0x0001;
/// `ACC_PRIVATE`
pub const ACC_PRIVATE: u16 = 0x0002;
/// `ACC_STATIC`
pub const ACC_STATIC: u16 = 0x0008;
/// `ACC_SUPER`, set on every class javac emits.
pub const ACC_SUPER: u16 = 0x0020;

/// Length of constructor bodies made by [`MethodSpec::constructor`].
pub const CONSTRUCTOR_CODE_LENGTH: u16 = 10;

#[derive(Default)]
struct PoolWriter {
    bytes: Vec<u8>,
    next_index: u16,
    utf8: HashMap<String, u16>,
    classes: HashMap<String, u16>,
}

impl PoolWriter {
    fn new() -> Self {
        Self {
            next_index: 1,
            ..Self::default()
        }
    }

    fn push(&mut self, entry: &[u8], slots: u16) -> u16 {
        let index = self.next_index;
        self.bytes.extend_from_slice(entry);
        self.next_index += slots;
        index
    }

    fn utf8(&mut self, text: &str) -> u16 {
        if let Some(&index) = self.utf8.get(text) {
            return index;
        }
        let mut entry = vec![1];
        // Test strings never contain NUL or supplementary characters, where
        // modified UTF-8 would differ.
        entry.extend_from_slice(&(text.len() as u16).to_be_bytes());
        entry.extend_from_slice(text.as_bytes());
        let index = self.push(&entry, 1);
        self.utf8.insert(text.to_string(), index);
        index
    }

    fn class(&mut self, name: &str) -> u16 {
        if let Some(&index) = self.classes.get(name) {
            return index;
        }
        let name_index = self.utf8(name);
        let mut entry = vec![7];
        entry.extend_from_slice(&name_index.to_be_bytes());
        let index = self.push(&entry, 1);
        self.classes.insert(name.to_string(), index);
        index
    }
}

struct FieldSpec {
    access: u16,
    name: String,
    descriptor: String,
    signature: Option<String>,
}

/// One entry of a method's `LocalVariableTable`.
///
/// With a [`signature`](Self::signature), a matching
/// `LocalVariableTypeTable` entry is written as well.
#[derive(Debug, Clone)]
pub struct LocalVar {
    start_pc: u16,
    length: u16,
    name: String,
    descriptor: String,
    index: u16,
    signature: Option<String>,
}

impl LocalVar {
    /// A variable in `slot`, live from `start_pc` for `length` bytes.
    pub fn new(start_pc: u16, length: u16, name: &str, descriptor: &str, slot: u16) -> Self {
        Self {
            start_pc,
            length,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            index: slot,
            signature: None,
        }
    }

    /// Generic signature of the variable's type, e.g. `TT;`.
    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }
}

/// A constructor parameter for [`MethodSpec::constructor`].
#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    descriptor: String,
    signature: Option<String>,
}

impl Param {
    /// A parameter with an erased type descriptor.
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature: None,
        }
    }

    /// Generic signature of the parameter type.
    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    /// Local variable slots taken by the parameter.
    fn slots(&self) -> u16 {
        match self.descriptor.as_str() {
            "J" | "D" => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct CodeSpec {
    length: u16,
    locals: Vec<LocalVar>,
    lines: Vec<u16>,
    handlers: Vec<(u16, u16, u16)>,
}

/// A method, optionally with a `Code` attribute.
#[derive(Debug, Clone)]
pub struct MethodSpec {
    access: u16,
    name: String,
    descriptor: String,
    signature: Option<String>,
    code: Option<CodeSpec>,
}

impl MethodSpec {
    /// A public method without a body.
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            access: ACC_PUBLIC,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature: None,
            code: None,
        }
    }

    /// A public constructor the way javac compiles it with `-g`: `this` in slot
    /// 0, parameters after it, all live across the whole body.
    ///
    /// A method `Signature` is derived when any parameter has one.
    pub fn constructor(owner: &str, params: impl IntoIterator<Item = Param>) -> Self {
        let params: Vec<Param> = params.into_iter().collect();
        let descriptor: String = params.iter().map(|p| p.descriptor.as_str()).collect();
        let mut method = Self::new("<init>", &format!("({descriptor})V"))
            .code_length(CONSTRUCTOR_CODE_LENGTH)
            .line(0)
            .local(LocalVar::new(
                0,
                CONSTRUCTOR_CODE_LENGTH,
                "this",
                &format!("L{owner};"),
                0,
            ));

        if params.iter().any(|p| p.signature.is_some()) {
            let signature: String = params
                .iter()
                .map(|p| p.signature.as_deref().unwrap_or(&p.descriptor))
                .collect();
            method = method.signature(&format!("({signature})V"));
        }

        let mut slot = 1;
        for param in params {
            let mut local = LocalVar::new(
                0,
                CONSTRUCTOR_CODE_LENGTH,
                &param.name,
                &param.descriptor,
                slot,
            );
            if let Some(signature) = &param.signature {
                local = local.signature(signature);
            }
            slot += param.slots();
            method = method.local(local);
        }
        method
    }

    /// A public `void` setter taking one argument.
    pub fn setter(name: &str, descriptor: &str) -> Self {
        Self::new(name, &format!("({descriptor})V")).code_length(6)
    }

    /// Replace the access flags.
    pub fn access(mut self, access: u16) -> Self {
        self.access = access;
        self
    }

    /// Method `Signature` attribute.
    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    fn code_mut(&mut self) -> &mut CodeSpec {
        self.code.get_or_insert_with(|| CodeSpec {
            length: 1,
            ..CodeSpec::default()
        })
    }

    /// Give the method a body of `length` bytes.
    pub fn code_length(mut self, length: u16) -> Self {
        self.code_mut().length = length;
        self
    }

    /// Add a `LineNumberTable` entry starting at `start_pc`.
    pub fn line(mut self, start_pc: u16) -> Self {
        self.code_mut().lines.push(start_pc);
        self
    }

    /// Add a local variable.
    pub fn local(mut self, local: LocalVar) -> Self {
        self.code_mut().locals.push(local);
        self
    }

    /// Add an exception table entry.
    pub fn handler(mut self, start_pc: u16, end_pc: u16, handler_pc: u16) -> Self {
        self.code_mut().handlers.push((start_pc, end_pc, handler_pc));
        self
    }

    /// Drop every debug table, as javac does without `-g`.
    pub fn without_debug_info(mut self) -> Self {
        if let Some(code) = &mut self.code {
            code.locals.clear();
            code.lines.clear();
        }
        self
    }
}

enum ExtraConstant {
    Integer(i32),
    Long(i64),
}

/// Builds a class file byte by byte.
pub struct ClassFileBuilder {
    major_version: u16,
    access: u16,
    this_class: String,
    super_class: Option<String>,
    interfaces: Vec<String>,
    signature: Option<String>,
    fields: Vec<FieldSpec>,
    methods: Vec<MethodSpec>,
    constants: Vec<ExtraConstant>,
}

impl ClassFileBuilder {
    /// A public class extending `java/lang/Object`, targeting Java 8.
    pub fn new(this_class: &str) -> Self {
        Self {
            major_version: 52,
            access: ACC_PUBLIC | ACC_SUPER,
            this_class: this_class.to_string(),
            super_class: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            signature: None,
            fields: Vec::new(),
            methods: Vec::new(),
            constants: Vec::new(),
        }
    }

    /// Replace the superclass; `None` is only valid for `java/lang/Object`.
    pub fn super_class(mut self, name: Option<&str>) -> Self {
        self.super_class = name.map(str::to_string);
        self
    }

    /// Add an implemented interface.
    pub fn interface(mut self, name: &str) -> Self {
        self.interfaces.push(name.to_string());
        self
    }

    /// Class `Signature` attribute, e.g. `<T:Ljava/lang/Object;>Ljava/lang/Object;`.
    pub fn signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    /// Add a field.
    pub fn field(
        mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        signature: Option<&str>,
    ) -> Self {
        self.fields.push(FieldSpec {
            access,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            signature: signature.map(str::to_string),
        });
        self
    }

    /// Add a method.
    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }

    /// Add an unreferenced `CONSTANT_Integer`.
    pub fn integer_constant(mut self, value: i32) -> Self {
        self.constants.push(ExtraConstant::Integer(value));
        self
    }

    /// Add an unreferenced `CONSTANT_Long`, which takes two pool slots.
    pub fn long_constant(mut self, value: i64) -> Self {
        self.constants.push(ExtraConstant::Long(value));
        self
    }

    /// Serialize the class file.
    pub fn build(&self) -> Vec<u8> {
        let mut pool = PoolWriter::new();
        for constant in &self.constants {
            match constant {
                ExtraConstant::Integer(value) => {
                    let mut entry = vec![3];
                    entry.extend_from_slice(&value.to_be_bytes());
                    pool.push(&entry, 1);
                }
                ExtraConstant::Long(value) => {
                    let mut entry = vec![5];
                    entry.extend_from_slice(&value.to_be_bytes());
                    pool.push(&entry, 2);
                }
            }
        }

        let mut body = Vec::new();
        put_u16(&mut body, self.access);
        put_u16(&mut body, pool.class(&self.this_class));
        let super_index = match &self.super_class {
            Some(name) => pool.class(name),
            None => 0,
        };
        put_u16(&mut body, super_index);

        put_u16(&mut body, self.interfaces.len() as u16);
        for interface in &self.interfaces {
            put_u16(&mut body, pool.class(interface));
        }

        put_u16(&mut body, self.fields.len() as u16);
        for field in &self.fields {
            put_u16(&mut body, field.access);
            put_u16(&mut body, pool.utf8(&field.name));
            put_u16(&mut body, pool.utf8(&field.descriptor));
            let attributes: Vec<Vec<u8>> = field
                .signature
                .iter()
                .map(|s| signature_attribute(&mut pool, s))
                .collect();
            put_attributes(&mut body, attributes);
        }

        put_u16(&mut body, self.methods.len() as u16);
        for method in &self.methods {
            put_u16(&mut body, method.access);
            put_u16(&mut body, pool.utf8(&method.name));
            put_u16(&mut body, pool.utf8(&method.descriptor));
            let mut attributes = Vec::new();
            if let Some(code) = &method.code {
                attributes.push(code_attribute(&mut pool, code));
            }
            if let Some(signature) = &method.signature {
                attributes.push(signature_attribute(&mut pool, signature));
            }
            put_attributes(&mut body, attributes);
        }

        let class_attributes: Vec<Vec<u8>> = self
            .signature
            .iter()
            .map(|s| signature_attribute(&mut pool, s))
            .collect();
        put_attributes(&mut body, class_attributes);

        let mut out = Vec::with_capacity(10 + pool.bytes.len() + body.len());
        out.extend_from_slice(&0xcafe_babe_u32.to_be_bytes());
        put_u16(&mut out, 0);
        put_u16(&mut out, self.major_version);
        put_u16(&mut out, pool.next_index);
        out.extend_from_slice(&pool.bytes);
        out.extend_from_slice(&body);
        out
    }
}

fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

fn put_attributes(out: &mut Vec<u8>, attributes: Vec<Vec<u8>>) {
    put_u16(out, attributes.len() as u16);
    for attribute in attributes {
        out.extend_from_slice(&attribute);
    }
}

/// An attribute with its name index and length prefix.
fn attribute(pool: &mut PoolWriter, name: &str, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(6 + payload.len());
    put_u16(&mut out, pool.utf8(name));
    put_u32(&mut out, payload.len() as u32);
    out.extend_from_slice(payload);
    out
}

fn signature_attribute(pool: &mut PoolWriter, signature: &str) -> Vec<u8> {
    let index = pool.utf8(signature);
    attribute(pool, "Signature", &index.to_be_bytes())
}

fn code_attribute(pool: &mut PoolWriter, code: &CodeSpec) -> Vec<u8> {
    let mut payload = Vec::new();
    put_u16(&mut payload, 4); // max_stack
    let max_locals = code
        .locals
        .iter()
        .map(|l| l.index + 1)
        .max()
        .unwrap_or(1);
    put_u16(&mut payload, max_locals);
    put_u32(&mut payload, code.length as u32);
    payload.resize(payload.len() + code.length as usize, 0x00);

    put_u16(&mut payload, code.handlers.len() as u16);
    for &(start, end, handler) in &code.handlers {
        put_u16(&mut payload, start);
        put_u16(&mut payload, end);
        put_u16(&mut payload, handler);
        put_u16(&mut payload, 0); // catch any
    }

    let mut attributes = Vec::new();
    if !code.lines.is_empty() {
        let mut table = Vec::new();
        put_u16(&mut table, code.lines.len() as u16);
        for (line, &start_pc) in code.lines.iter().enumerate() {
            put_u16(&mut table, start_pc);
            put_u16(&mut table, line as u16 + 1);
        }
        attributes.push(attribute(pool, "LineNumberTable", &table));
    }
    if !code.locals.is_empty() {
        let all: Vec<&LocalVar> = code.locals.iter().collect();
        attributes.push(local_table(pool, "LocalVariableTable", &all, |l| {
            l.descriptor.as_str()
        }));
    }
    let generic: Vec<&LocalVar> = code
        .locals
        .iter()
        .filter(|l| l.signature.is_some())
        .collect();
    if !generic.is_empty() {
        attributes.push(local_table(pool, "LocalVariableTypeTable", &generic, |l| {
            l.signature.as_deref().unwrap_or(&l.descriptor)
        }));
    }
    put_attributes(&mut payload, attributes);

    attribute(pool, "Code", &payload)
}

fn local_table(
    pool: &mut PoolWriter,
    name: &str,
    locals: &[&LocalVar],
    descriptor: impl Fn(&LocalVar) -> &str,
) -> Vec<u8> {
    let mut table = Vec::new();
    put_u16(&mut table, locals.len() as u16);
    for local in locals {
        put_u16(&mut table, local.start_pc);
        put_u16(&mut table, local.length);
        put_u16(&mut table, pool.utf8(&local.name));
        put_u16(&mut table, pool.utf8(descriptor(local)));
        put_u16(&mut table, local.index);
    }
    attribute(pool, name, &table)
}
