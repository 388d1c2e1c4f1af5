//! Input context for one analysis run: the enclosing class metadata and
//! the per-method attributes the upstream decoder hands over.

use bitflags::bitflags;

use crate::locals::LocalVariables;
use crate::symbols::SymIndex;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        /// Nested-type STATIC bit, folded in from InnerClasses metadata.
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FieldAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

/// A field of the enclosing class; the class-literal reconstructor marks
/// the `class$` cache fields it collapses as synthetic.
#[derive(Clone, Debug)]
pub struct FieldDecl {
    pub name: SymIndex,
    pub access_flags: FieldAccessFlags,
}

/// Metadata of the class the analyzed method belongs to.
#[derive(Clone, Debug)]
pub struct ClassContext {
    /// Internal name, e.g. `"com/example/Outer$Inner"`.
    pub internal_name: String,
    pub access_flags: ClassAccessFlags,
    /// True when this type is a member of an enclosing type.
    pub is_inner_class: bool,
    pub fields: Vec<FieldDecl>,
}

impl ClassContext {
    /// Field-descriptor form of this class, e.g. `"Lcom/example/Outer$Inner;"`.
    pub fn internal_signature(&self) -> String {
        format!("L{};", self.internal_name)
    }

    /// Descriptor of the enclosing type, derived from the inner-class name
    /// separator. None when the name carries no separator.
    pub fn outer_signature(&self) -> Option<String> {
        let sep = self.internal_name.rfind('$')?;
        Some(format!("L{};", &self.internal_name[..sep]))
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::STATIC)
    }
}

/// One method, as handed over by the decoder: descriptor text, raw code
/// bytes, and the persisted debug variable table when the class file
/// carried one. `local_variables` is established or completed by analysis.
#[derive(Clone, Debug)]
pub struct MethodContext {
    pub access_flags: MethodAccessFlags,
    /// JVM method descriptor, e.g. `"(ILjava/lang/String;)V"`.
    pub descriptor: String,
    /// Generic signature attribute, when present. Enum constructors
    /// declare fewer parameters here than in the descriptor.
    pub signature: Option<String>,
    /// True for `<init>`.
    pub is_instance_constructor: bool,
    /// Raw code bytes; only used to step to the next instruction offset
    /// during scope repair. Empty for abstract/native methods.
    pub code: Vec<u8>,
    pub local_variables: Option<LocalVariables>,
}

impl MethodContext {
    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn code_length(&self) -> u32 {
        self.code.len() as u32
    }

    /// The descriptor driving parameter analysis: the generic signature
    /// when present, the plain descriptor otherwise.
    pub fn effective_descriptor(&self) -> &str {
        self.signature.as_deref().unwrap_or(&self.descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outer_signature() {
        let class = ClassContext {
            internal_name: "com/example/Outer$Inner".into(),
            access_flags: ClassAccessFlags::PUBLIC,
            is_inner_class: true,
            fields: Vec::new(),
        };
        assert_eq!(class.outer_signature().as_deref(), Some("Lcom/example/Outer;"));
        assert_eq!(class.internal_signature(), "Lcom/example/Outer$Inner;");
    }

    #[test]
    fn test_effective_descriptor_prefers_signature() {
        let method = MethodContext {
            access_flags: MethodAccessFlags::empty(),
            descriptor: "(Ljava/lang/String;II)V".into(),
            signature: Some("(I)V".into()),
            is_instance_constructor: true,
            code: Vec::new(),
            local_variables: None,
        };
        assert_eq!(method.effective_descriptor(), "(I)V");
    }
}
