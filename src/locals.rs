//! The symbolic local-variable table built for one method.
//!
//! A JVM local slot is untyped and may be reused by unrelated variables
//! over disjoint offset ranges, so one slot maps to any number of records,
//! each covering a half-open `[start, start + length)` scope. Records are
//! addressed by index into the table; passes that need two records at once
//! look up indices first and borrow one at a time.

use crate::descriptor::IntTypeSet;
use crate::symbols::{SymIndex, SymbolTable};

/// The type of a record during inference. Sentinels are placeholders that
/// resolution (analysis step 6) replaces with `Concrete` entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeRef {
    /// First touched by a reference load/store of unknown type.
    Undetermined,
    /// Integer-family slot whose width is still tracked in `int_types`.
    UntypedNumber,
    /// Two incompatible reference types were assigned; resolves to
    /// `java/lang/Object` with casts inserted at load sites.
    ObjectConflict,
    Concrete(SymIndex),
}

/// One interpretation of a local slot over one scope range.
#[derive(Clone, Debug)]
pub struct LocalVariable {
    pub slot: u16,
    pub start: u32,
    pub length: u32,
    pub name: Option<SymIndex>,
    pub type_ref: TypeRef,
    /// Meaningful only while `type_ref` is `UntypedNumber`.
    pub int_types: IntTypeSet,
    /// Synthetic slot holding a caught exception or a jsr return address;
    /// never merged with ordinary stores.
    pub exception_or_return_address: bool,
    /// Compiler-introduced temporary that must be declared at first use.
    pub declaration: bool,
}

impl LocalVariable {
    pub fn new(slot: u16, start: u32, length: u32, name: Option<SymIndex>, type_ref: TypeRef) -> Self {
        Self {
            slot,
            start,
            length,
            name,
            type_ref,
            int_types: IntTypeSet::all(),
            exception_or_return_address: false,
            declaration: false,
        }
    }

    pub fn with_int_types(mut self, int_types: IntTypeSet) -> Self {
        self.int_types = int_types;
        self
    }

    pub fn exception_or_return_address(mut self) -> Self {
        self.exception_or_return_address = true;
        self
    }

    pub fn contains(&self, offset: u32) -> bool {
        self.start <= offset && offset < self.start + self.length
    }

    pub fn end(&self) -> u32 {
        self.start + self.length
    }

    /// Widen the scope just enough to cover `offset`.
    pub fn update_range(&mut self, offset: u32) {
        if offset >= self.end() {
            self.length = offset - self.start + 1;
        }
        if offset < self.start {
            self.length += self.start - offset;
            self.start = offset;
        }
    }

    /// The resolved signature string, if the record is past the sentinel
    /// stage.
    pub fn concrete_signature(&self, symbols: &SymbolTable) -> Option<String> {
        match self.type_ref {
            TypeRef::Concrete(sym) => Some(symbols.utf8(sym).to_string()),
            _ => None,
        }
    }
}

/// Ordered collection of slot records. `index_of_first_local` is the cut
/// between records that pre-existed analysis (this, outer this,
/// parameters, persisted locals) and records synthesized by it.
#[derive(Clone, Debug, Default)]
pub struct LocalVariables {
    records: Vec<LocalVariable>,
    index_of_first_local: usize,
}

impl LocalVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, lv: LocalVariable) -> usize {
        self.records.push(lv);
        self.records.len() - 1
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, idx: usize) -> &LocalVariable {
        &self.records[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut LocalVariable {
        &mut self.records[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocalVariable> {
        self.records.iter()
    }

    pub fn index_of_first_local(&self) -> usize {
        self.index_of_first_local
    }

    pub fn set_index_of_first_local(&mut self, idx: usize) {
        self.index_of_first_local = idx;
    }

    /// Exact lookup: the record for `slot` whose scope contains `offset`.
    pub fn find_at(&self, slot: u16, offset: u32) -> Option<usize> {
        self.records
            .iter()
            .position(|lv| lv.slot == slot && lv.contains(offset))
    }

    /// Best-effort lookup used while scanning forward: the record for
    /// `slot` starting at or before `offset` with the greatest start.
    pub fn find_nearest(&self, slot: u16, offset: u32) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, lv) in self.records.iter().enumerate() {
            if lv.slot != slot || lv.start > offset {
                continue;
            }
            match best {
                Some(b) if self.records[b].start > lv.start => {}
                _ => best = Some(i),
            }
        }
        best
    }
}
