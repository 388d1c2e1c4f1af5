//! JVM type and method descriptor utilities.
//!
//! Variable types are carried as descriptor strings (`"I"`,
//! `"Ljava/lang/String;"`, `"[J"`, ...) interned in the symbol table, so
//! everything here works on raw descriptor text.

use bitflags::bitflags;

pub const OBJECT_SIGNATURE: &str = "Ljava/lang/Object;";
pub const CLASS_SIGNATURE: &str = "Ljava/lang/Class;";

/// Returns the end position (exclusive) of the type descriptor starting at
/// `pos`, or None if the text is not a valid descriptor.
fn type_end(desc: &str, pos: usize) -> Option<usize> {
    let bytes = desc.as_bytes();
    match bytes.get(pos)? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b'V' => Some(pos + 1),
        b'L' => {
            let semi = desc[pos + 1..].find(';')?;
            Some(pos + 1 + semi + 1)
        }
        b'[' => type_end(desc, pos + 1),
        _ => None,
    }
}

/// Split a method descriptor into its parameter signatures, e.g.
/// `"(ILjava/lang/String;[J)V"` -> `["I", "Ljava/lang/String;", "[J"]`.
pub fn parameter_signatures(desc: &str) -> Vec<String> {
    let mut params = Vec::new();
    if !desc.starts_with('(') {
        return params;
    }
    let close = match desc.find(')') {
        Some(c) => c,
        None => return params,
    };
    let mut pos = 1;
    while pos < close {
        match type_end(desc, pos) {
            Some(end) => {
                params.push(desc[pos..end].to_string());
                pos = end;
            }
            None => break,
        }
    }
    params
}

/// Number of declared parameters in a method descriptor.
pub fn parameter_count(desc: &str) -> usize {
    parameter_signatures(desc).len()
}

/// Return type signature of a method descriptor, e.g. `"(II)V"` -> `"V"`.
pub fn method_return_signature(desc: &str) -> Option<String> {
    let close = desc.find(')')?;
    let ret = &desc[close + 1..];
    let end = type_end(ret, 0)?;
    Some(ret[..end].to_string())
}

/// True for the single-slot integer family (stored with `istore`).
pub fn is_integer_signature(sig: &str) -> bool {
    matches!(sig, "I" | "S" | "B" | "C" | "Z")
}

/// True for any primitive signature.
pub fn is_primitive_signature(sig: &str) -> bool {
    matches!(sig, "I" | "S" | "B" | "C" | "Z" | "J" | "F" | "D" | "V")
}

/// True for long/double, which occupy two local slots.
pub fn is_wide_signature(sig: &str) -> bool {
    matches!(sig.as_bytes().first(), Some(b'D') | Some(b'J'))
}

/// Strip one array dimension: `"[[I"` -> `"[I"`, `"[Ljava/lang/String;"`
/// -> `"Ljava/lang/String;"`. Non-array signatures are returned unchanged.
pub fn cut_array_dimension_prefix(sig: &str) -> &str {
    sig.strip_prefix('[').unwrap_or(sig)
}

/// Simple class name of an internal name: `"java/lang/String"` -> `"String"`.
pub fn simple_class_name(name: &str) -> &str {
    match name.rfind('/') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}

bitflags! {
    /// Which integer-family declared types remain possible for a variable
    /// whose type has not yet been pinned down. Narrowing only: passes
    /// intersect sets, never re-add bits.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct IntTypeSet: u8 {
        const BOOLEAN = 0b0000_0001;
        const BYTE    = 0b0000_0010;
        const CHAR    = 0b0000_0100;
        const SHORT   = 0b0000_1000;
        const INT     = 0b0001_0000;
    }
}

impl IntTypeSet {
    /// The exact declared type implied by a value-producing instruction of
    /// known signature (a `baload` result is a byte, nothing else).
    pub fn from_signature(sig: &str) -> IntTypeSet {
        match sig {
            "I" => IntTypeSet::INT,
            "S" => IntTypeSet::SHORT,
            "B" => IntTypeSet::BYTE,
            "C" => IntTypeSet::CHAR,
            "Z" => IntTypeSet::BOOLEAN,
            _ => IntTypeSet::empty(),
        }
    }

    /// The set of declared variable types whose value may legally flow into
    /// an argument/return/field slot of the given signature. Widening
    /// conversions make this larger than `from_signature`: a short, byte or
    /// char variable may be passed where an int is expected.
    pub fn arg_or_return_set(sig: &str) -> IntTypeSet {
        match sig {
            "I" => IntTypeSet::INT | IntTypeSet::SHORT | IntTypeSet::BYTE | IntTypeSet::CHAR,
            "S" => IntTypeSet::SHORT | IntTypeSet::BYTE,
            "B" => IntTypeSet::BYTE,
            "C" => IntTypeSet::CHAR,
            "Z" => IntTypeSet::BOOLEAN,
            _ => IntTypeSet::empty(),
        }
    }

    /// Concrete signature to declare for this set. A set that still admits
    /// `int` resolves to `int` (an unconstrained numeric stays an int);
    /// only a set narrowed below int picks the narrowest surviving type.
    /// An empty set degrades to `int` as well.
    pub fn narrowest_signature(self) -> &'static str {
        if self.contains(IntTypeSet::INT) {
            "I"
        } else if self.contains(IntTypeSet::BOOLEAN) {
            "Z"
        } else if self.contains(IntTypeSet::BYTE) {
            "B"
        } else if self.contains(IntTypeSet::CHAR) {
            "C"
        } else if self.contains(IntTypeSet::SHORT) {
            "S"
        } else {
            "I"
        }
    }
}
