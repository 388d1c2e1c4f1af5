//! Append-only symbol interning shared by every analysis pass.
//!
//! Mirrors the constant-pool discipline of a class file: entries are only
//! ever appended, so an index handed out once stays valid for the lifetime
//! of the table. The table is shared across the methods of one class;
//! callers serialize access (this core takes no locks).

use std::collections::{HashMap, HashSet};

/// Index of an interned UTF-8 string.
pub type SymIndex = u32;

/// A field reference: class, name and type descriptor, all interned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldRef {
    pub class: SymIndex,
    pub name: SymIndex,
    pub descriptor: SymIndex,
}

/// A method reference: class, name and method descriptor, all interned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MethodRef {
    pub class: SymIndex,
    pub name: SymIndex,
    pub descriptor: SymIndex,
}

/// A loadable constant, as referenced by an `Ldc` instruction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LdcValue {
    String(SymIndex),
    Class(SymIndex),
    Int(i32),
    Float(f32),
}

/// Interning table for strings, field/method references and loadable
/// constants. Append-returns-index; lookups by index never fail for an
/// index the table handed out.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    strings: Vec<String>,
    string_index: HashMap<String, SymIndex>,
    field_refs: Vec<FieldRef>,
    method_refs: Vec<MethodRef>,
    constants: Vec<LdcValue>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning the existing index if already present.
    pub fn add_utf8(&mut self, s: &str) -> SymIndex {
        if let Some(&idx) = self.string_index.get(s) {
            return idx;
        }
        let idx = self.strings.len() as SymIndex;
        self.strings.push(s.to_string());
        self.string_index.insert(s.to_string(), idx);
        idx
    }

    pub fn utf8(&self, idx: SymIndex) -> &str {
        &self.strings[idx as usize]
    }

    pub fn add_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u32 {
        let fr = FieldRef {
            class: self.add_utf8(class),
            name: self.add_utf8(name),
            descriptor: self.add_utf8(descriptor),
        };
        self.field_refs.push(fr);
        (self.field_refs.len() - 1) as u32
    }

    pub fn field_ref(&self, idx: u32) -> &FieldRef {
        &self.field_refs[idx as usize]
    }

    pub fn add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u32 {
        let mr = MethodRef {
            class: self.add_utf8(class),
            name: self.add_utf8(name),
            descriptor: self.add_utf8(descriptor),
        };
        self.method_refs.push(mr);
        (self.method_refs.len() - 1) as u32
    }

    pub fn method_ref(&self, idx: u32) -> &MethodRef {
        &self.method_refs[idx as usize]
    }

    pub fn add_constant(&mut self, value: LdcValue) -> u32 {
        self.constants.push(value);
        (self.constants.len() - 1) as u32
    }

    pub fn add_string_constant(&mut self, s: &str) -> u32 {
        let sym = self.add_utf8(s);
        self.add_constant(LdcValue::String(sym))
    }

    pub fn add_class_constant(&mut self, internal_name: &str) -> u32 {
        let sym = self.add_utf8(internal_name);
        self.add_constant(LdcValue::Class(sym))
    }

    pub fn constant(&self, idx: u32) -> &LdcValue {
        &self.constants[idx as usize]
    }
}

/// Internal class names discovered during reconstruction, consumed by the
/// import/reference tracking of the emission stage.
#[derive(Clone, Debug, Default)]
pub struct ReferenceMap {
    names: HashSet<String>,
}

impl ReferenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, internal_name: &str) {
        self.names.insert(internal_name.to_string());
    }

    pub fn contains(&self, internal_name: &str) -> bool {
        self.names.contains(internal_name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_stable() {
        let mut table = SymbolTable::new();
        let a = table.add_utf8("Ljava/lang/String;");
        let b = table.add_utf8("I");
        let c = table.add_utf8("Ljava/lang/String;");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(table.utf8(a), "Ljava/lang/String;");
    }

    #[test]
    fn test_field_and_method_refs() {
        let mut table = SymbolTable::new();
        let fr = table.add_field_ref("Example", "class$java$lang$String", "Ljava/lang/Class;");
        let mr = table.add_method_ref("java/lang/Class", "forName", "(Ljava/lang/String;)Ljava/lang/Class;");
        assert_eq!(table.utf8(table.field_ref(fr).descriptor), "Ljava/lang/Class;");
        assert_eq!(table.utf8(table.method_ref(mr).name), "forName");
    }

    #[test]
    fn test_reference_map() {
        let mut refs = ReferenceMap::new();
        assert!(refs.is_empty());
        refs.add("java/lang/String");
        refs.add("java/lang/String");
        assert_eq!(refs.len(), 1);
        assert!(refs.contains("java/lang/String"));
    }
}
