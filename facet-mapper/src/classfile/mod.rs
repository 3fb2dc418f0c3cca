//! A reader for the parts of JVM class files that carry naming metadata.
//!
//! Only what constructor and property discovery needs is kept: the class name
//! and generic signature, fields, and methods with the debug tables of their
//! `Code` attribute (`LocalVariableTable`, `LocalVariableTypeTable`,
//! `LineNumberTable`). Everything else is validated structurally and skipped.

use core::fmt;

mod reader;

use reader::{ByteReader, decode_modified_utf8};

/// `0xCAFEBABE`
pub const MAGIC: u32 = 0xcafe_babe;

/// `ACC_PUBLIC`
pub const ACC_PUBLIC: u16 = 0x0001;
/// `ACC_STATIC`
pub const ACC_STATIC: u16 = 0x0008;
/// `ACC_FINAL`
pub const ACC_FINAL: u16 = 0x0010;
/// `ACC_SYNTHETIC`
pub const ACC_SYNTHETIC: u16 = 0x1000;

/// What went wrong while reading a class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassFileErrorKind {
    /// Input ended in the middle of a structure.
    UnexpectedEof,
    /// The file does not start with `0xCAFEBABE`.
    BadMagic(u32),
    /// Unknown constant pool tag.
    BadConstantTag(u8),
    /// A constant pool index out of range or pointing at a second slot.
    BadConstantIndex(u16),
    /// A constant pool entry of the wrong kind.
    UnexpectedConstant {
        /// The offending index.
        index: u16,
        /// The kind that was required.
        expected: &'static str,
    },
    /// A `CONSTANT_Utf8` entry that is not valid modified UTF-8.
    InvalidUtf8,
    /// Bytes left over after the last class attribute.
    TrailingBytes,
}

/// A class file that could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFileError {
    /// What went wrong.
    pub kind: ClassFileErrorKind,
    /// Byte offset in the class file.
    pub pos: usize,
}

impl fmt::Display for ClassFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ClassFileErrorKind::UnexpectedEof => write!(f, "unexpected end of class file")?,
            ClassFileErrorKind::BadMagic(magic) => write!(f, "bad magic number {magic:#010x}")?,
            ClassFileErrorKind::BadConstantTag(tag) => write!(f, "unknown constant pool tag {tag}")?,
            ClassFileErrorKind::BadConstantIndex(index) => {
                write!(f, "invalid constant pool index {index}")?
            }
            ClassFileErrorKind::UnexpectedConstant { index, expected } => {
                write!(f, "constant pool entry {index} is not a {expected}")?
            }
            ClassFileErrorKind::InvalidUtf8 => write!(f, "invalid modified UTF-8 constant")?,
            ClassFileErrorKind::TrailingBytes => write!(f, "trailing bytes after class file")?,
        }
        write!(f, " at byte {}", self.pos)
    }
}

impl std::error::Error for ClassFileError {}

#[derive(Debug, Clone)]
enum Constant {
    /// Index 0, and the slot after a long or double.
    Unusable,
    Utf8(String),
    Class { name_index: u16 },
    Other,
}

struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    fn read(r: &mut ByteReader<'_>) -> Result<Self, ClassFileError> {
        let count = r.u16()? as usize;
        let mut entries = Vec::with_capacity(count);
        entries.push(Constant::Unusable);

        while entries.len() < count {
            let tag_pos = r.position();
            let tag = r.u8()?;
            let (entry, wide) = match tag {
                1 => {
                    let len = r.u16()? as usize;
                    let bytes = r.bytes(len)?;
                    let text = decode_modified_utf8(bytes).ok_or(ClassFileError {
                        kind: ClassFileErrorKind::InvalidUtf8,
                        pos: tag_pos,
                    })?;
                    (Constant::Utf8(text), false)
                }
                7 => (
                    Constant::Class {
                        name_index: r.u16()?,
                    },
                    false,
                ),
                // Integer, Float
                3 | 4 => {
                    r.skip(4)?;
                    (Constant::Other, false)
                }
                // Long, Double take two slots
                5 | 6 => {
                    r.skip(8)?;
                    (Constant::Other, true)
                }
                // String, MethodType, Module, Package
                8 | 16 | 19 | 20 => {
                    r.skip(2)?;
                    (Constant::Other, false)
                }
                // Fieldref, Methodref, InterfaceMethodref, NameAndType, Dynamic, InvokeDynamic
                9 | 10 | 11 | 12 | 17 | 18 => {
                    r.skip(4)?;
                    (Constant::Other, false)
                }
                // MethodHandle
                15 => {
                    r.skip(3)?;
                    (Constant::Other, false)
                }
                other => {
                    return Err(ClassFileError {
                        kind: ClassFileErrorKind::BadConstantTag(other),
                        pos: tag_pos,
                    });
                }
            };
            entries.push(entry);
            if wide {
                entries.push(Constant::Unusable);
            }
        }

        Ok(Self { entries })
    }

    fn get(&self, index: u16, r: &ByteReader<'_>) -> Result<&Constant, ClassFileError> {
        match self.entries.get(index as usize) {
            Some(Constant::Unusable) | None => {
                Err(r.error(ClassFileErrorKind::BadConstantIndex(index)))
            }
            Some(entry) => Ok(entry),
        }
    }

    fn utf8(&self, index: u16, r: &ByteReader<'_>) -> Result<&str, ClassFileError> {
        match self.get(index, r)? {
            Constant::Utf8(text) => Ok(text),
            _ => Err(r.error(ClassFileErrorKind::UnexpectedConstant {
                index,
                expected: "Utf8",
            })),
        }
    }

    fn class_name(&self, index: u16, r: &ByteReader<'_>) -> Result<&str, ClassFileError> {
        match self.get(index, r)? {
            Constant::Class { name_index } => self.utf8(*name_index, r),
            _ => Err(r.error(ClassFileErrorKind::UnexpectedConstant {
                index,
                expected: "Class",
            })),
        }
    }
}

/// The parts of a class file relevant to mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    /// Class-file major version.
    pub major_version: u16,
    /// Class access flags.
    pub access_flags: u16,
    /// Internal name of this class.
    pub this_class: String,
    /// Internal name of the superclass; `None` only for `java/lang/Object`.
    pub super_class: Option<String>,
    /// Internal names of implemented interfaces.
    pub interfaces: Vec<String>,
    /// The class `Signature` attribute, for generic classes.
    pub signature: Option<String>,
    /// Declared fields.
    pub fields: Vec<FieldInfo>,
    /// Declared methods, constructors (`<init>`) included.
    pub methods: Vec<MethodInfo>,
}

/// A declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Access flags.
    pub access_flags: u16,
    /// Field name.
    pub name: String,
    /// Erased type descriptor.
    pub descriptor: String,
    /// Generic signature, when the field's type is generic.
    pub signature: Option<String>,
}

/// A declared method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// Access flags.
    pub access_flags: u16,
    /// Method name; constructors are `<init>`.
    pub name: String,
    /// Erased method descriptor.
    pub descriptor: String,
    /// Generic signature, when the method is generic.
    pub signature: Option<String>,
    /// The `Code` attribute; absent for abstract and native methods.
    pub code: Option<CodeInfo>,
}

impl MethodInfo {
    /// Whether this method is a constructor.
    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    /// Whether `ACC_STATIC` is set.
    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }
}

/// Debug metadata from a `Code` attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeInfo {
    /// Length of the bytecode, in bytes.
    pub code_length: u32,
    /// `LocalVariableTable` entries, in table order.
    pub local_variables: Vec<LocalVariable>,
    /// `LocalVariableTypeTable` entries, in table order.
    pub local_variable_types: Vec<LocalVariable>,
    /// Start offsets from the `LineNumberTable`.
    pub line_starts: Vec<u16>,
    /// Exception table entries as `(start, end, handler)` offsets.
    pub exception_handlers: Vec<(u16, u16, u16)>,
}

impl CodeInfo {
    /// First and last bytecode offsets at which the method body places a label.
    ///
    /// Labels come from every offset the debug tables and the exception table
    /// refer to.
    pub fn label_bounds(&self) -> Option<(u32, u32)> {
        let variables = self
            .local_variables
            .iter()
            .chain(&self.local_variable_types)
            .flat_map(|v| [v.start_pc as u32, v.end_pc()]);
        let lines = self.line_starts.iter().map(|&pc| pc as u32);
        let handlers = self
            .exception_handlers
            .iter()
            .flat_map(|&(start, end, handler)| [start as u32, end as u32, handler as u32]);

        let mut offsets = variables.chain(lines).chain(handlers);
        let first = offsets.next()?;
        Some(offsets.fold((first, first), |(lo, hi), pc| (lo.min(pc), hi.max(pc))))
    }
}

/// One entry of a `LocalVariableTable` or `LocalVariableTypeTable`.
///
/// For the type table, `descriptor` holds the generic signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    /// First bytecode offset where the variable is live.
    pub start_pc: u16,
    /// Length of the live range.
    pub length: u16,
    /// Variable name.
    pub name: String,
    /// Descriptor, or signature for type-table entries.
    pub descriptor: String,
    /// Local variable slot.
    pub index: u16,
}

impl LocalVariable {
    /// Offset one past the live range.
    pub fn end_pc(&self) -> u32 {
        self.start_pc as u32 + self.length as u32
    }
}

impl ClassFile {
    /// Parse a class file.
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassFileError> {
        let mut r = ByteReader::new(bytes);

        let magic = r.u32()?;
        if magic != MAGIC {
            return Err(ClassFileError {
                kind: ClassFileErrorKind::BadMagic(magic),
                pos: 0,
            });
        }
        let _minor = r.u16()?;
        let major_version = r.u16()?;

        let pool = ConstantPool::read(&mut r)?;

        let access_flags = r.u16()?;
        let this_index = r.u16()?;
        let this_class = pool.class_name(this_index, &r)?.to_string();
        let super_index = r.u16()?;
        let super_class = match super_index {
            0 => None,
            index => Some(pool.class_name(index, &r)?.to_string()),
        };

        let interface_count = r.u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            let index = r.u16()?;
            interfaces.push(pool.class_name(index, &r)?.to_string());
        }

        let field_count = r.u16()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let member = Member::read(&mut r, &pool)?;
            fields.push(FieldInfo {
                access_flags: member.access_flags,
                name: member.name,
                descriptor: member.descriptor,
                signature: member.signature,
            });
        }

        let method_count = r.u16()?;
        let mut methods = Vec::with_capacity(method_count as usize);
        for _ in 0..method_count {
            let member = Member::read(&mut r, &pool)?;
            methods.push(MethodInfo {
                access_flags: member.access_flags,
                name: member.name,
                descriptor: member.descriptor,
                signature: member.signature,
                code: member.code,
            });
        }

        let mut signature = None;
        let attribute_count = r.u16()?;
        for _ in 0..attribute_count {
            let (name, mut body) = read_attribute(&mut r, &pool)?;
            if name == "Signature" {
                signature = Some(pool.utf8(body.u16()?, &body)?.to_string());
            }
        }

        if !r.is_at_end() {
            return Err(r.error(ClassFileErrorKind::TrailingBytes));
        }

        Ok(Self {
            major_version,
            access_flags,
            this_class,
            super_class,
            interfaces,
            signature,
            fields,
            methods,
        })
    }

    /// Constructors, in declaration order.
    pub fn constructors(&self) -> impl Iterator<Item = &MethodInfo> {
        self.methods.iter().filter(|m| m.is_constructor())
    }
}

/// Common shape of `field_info` and `method_info`.
struct Member {
    access_flags: u16,
    name: String,
    descriptor: String,
    signature: Option<String>,
    code: Option<CodeInfo>,
}

impl Member {
    fn read(r: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<Self, ClassFileError> {
        let access_flags = r.u16()?;
        let name = pool.utf8(r.u16()?, r)?.to_string();
        let descriptor = pool.utf8(r.u16()?, r)?.to_string();

        let mut signature = None;
        let mut code = None;
        let attribute_count = r.u16()?;
        for _ in 0..attribute_count {
            let (attr, mut body) = read_attribute(r, pool)?;
            match attr {
                "Signature" => signature = Some(pool.utf8(body.u16()?, &body)?.to_string()),
                "Code" => code = Some(read_code(&mut body, pool)?),
                _ => {}
            }
        }

        Ok(Self {
            access_flags,
            name,
            descriptor,
            signature,
            code,
        })
    }
}

/// Attribute name and a reader over its body.
fn read_attribute<'a, 'p>(
    r: &mut ByteReader<'a>,
    pool: &'p ConstantPool,
) -> Result<(&'p str, ByteReader<'a>), ClassFileError> {
    let name = pool.utf8(r.u16()?, r)?;
    let len = r.u32()? as usize;
    Ok((name, r.sub_reader(len)?))
}

fn read_code(r: &mut ByteReader<'_>, pool: &ConstantPool) -> Result<CodeInfo, ClassFileError> {
    let _max_stack = r.u16()?;
    let _max_locals = r.u16()?;
    let code_length = r.u32()?;
    r.skip(code_length as usize)?;

    let mut info = CodeInfo {
        code_length,
        ..CodeInfo::default()
    };

    let handler_count = r.u16()?;
    for _ in 0..handler_count {
        let start = r.u16()?;
        let end = r.u16()?;
        let handler = r.u16()?;
        let _catch_type = r.u16()?;
        info.exception_handlers.push((start, end, handler));
    }

    let attribute_count = r.u16()?;
    for _ in 0..attribute_count {
        let (name, mut body) = read_attribute(r, pool)?;
        match name {
            "LocalVariableTable" => info.local_variables = read_local_variables(&mut body, pool)?,
            "LocalVariableTypeTable" => {
                info.local_variable_types = read_local_variables(&mut body, pool)?
            }
            "LineNumberTable" => {
                let count = body.u16()?;
                for _ in 0..count {
                    info.line_starts.push(body.u16()?);
                    let _line = body.u16()?;
                }
            }
            _ => {}
        }
    }

    Ok(info)
}

fn read_local_variables(
    r: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<Vec<LocalVariable>, ClassFileError> {
    let count = r.u16()?;
    let mut variables = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let start_pc = r.u16()?;
        let length = r.u16()?;
        let name = pool.utf8(r.u16()?, r)?.to_string();
        let descriptor = pool.utf8(r.u16()?, r)?.to_string();
        let index = r.u16()?;
        variables.push(LocalVariable {
            start_pc,
            length,
            name,
            descriptor,
            index,
        });
    }
    Ok(variables)
}
