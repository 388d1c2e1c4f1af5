//! `.class` literal reconstruction.
//!
//! Pre-1.5 compilers lower `Foo.class` into a lazily initialized static
//! cache field:
//!
//! ```text
//! DupStore( GetStatic( this class, "class$..." ) )
//! IfXNull( DupLoad )
//! Pop( DupLoad )
//! try { TernaryOpStore( Assignment( ..., Class.forName("Foo") ) ) }
//! catch { throw ... }
//! consumer( DupLoad )
//! ```
//!
//! The five statements collapse into a single class literal at the former
//! use site, and the cache field is marked synthetic so emission skips it.

use crate::descriptor;
use crate::instruction::{self, Instr, InvokeKind};
use crate::method::{ClassContext, FieldAccessFlags};
use crate::symbols::{LdcValue, ReferenceMap, SymIndex, SymbolTable};

pub const CLASS_DOLLAR_PREFIX: &str = "class$";

struct Match {
    dup_store_offset: u32,
    literal_offset: u32,
    literal_line: u16,
    internal_name: String,
    cache_field_name: SymIndex,
}

pub fn reconstruct(
    references: &mut ReferenceMap,
    class: &mut ClassContext,
    symbols: &mut SymbolTable,
    list: &mut Vec<Instr>,
) {
    if list.len() < 5 {
        return;
    }
    let mut i = list.len() - 4;
    while i > 0 {
        i -= 1;
        let Some(found) = match_pattern(class, symbols, list, i) else {
            continue;
        };

        references.add(&found.internal_name);
        let index = symbols.add_class_constant(&found.internal_name);
        let literal = Instr::Ldc {
            offset: found.literal_offset,
            line: found.literal_line,
            index,
        };
        instruction::replace_dup_load(&mut list[i + 4], found.dup_store_offset, &literal);
        list.drain(i..i + 4);

        for field in class.fields.iter_mut() {
            if field.name == found.cache_field_name {
                field.access_flags |= FieldAccessFlags::SYNTHETIC;
                break;
            }
        }
    }
}

fn match_pattern(
    class: &ClassContext,
    symbols: &SymbolTable,
    list: &[Instr],
    i: usize,
) -> Option<Match> {
    let Instr::DupStore { offset: ds_offset, value, .. } = &list[i] else {
        return None;
    };
    let Instr::GetStatic { field_ref, .. } = value.as_ref() else {
        return None;
    };
    let cache_field = symbols.field_ref(*field_ref);
    if symbols.utf8(cache_field.class) != class.internal_name {
        return None;
    }

    let Instr::IfXNull { offset, line, value, .. } = &list[i + 1] else {
        return None;
    };
    let (literal_offset, literal_line) = (*offset, *line);
    if !matches!(
        value.as_ref(),
        Instr::DupLoad { dup_store_offset, .. } if dup_store_offset == ds_offset
    ) {
        return None;
    }

    let Instr::Pop { value, .. } = &list[i + 2] else {
        return None;
    };
    if !matches!(
        value.as_ref(),
        Instr::DupLoad { dup_store_offset, .. } if dup_store_offset == ds_offset
    ) {
        return None;
    }

    let Instr::Try { instructions, catches, finally_instructions, .. } = &list[i + 3] else {
        return None;
    };
    if finally_instructions.is_some() || instructions.len() != 1 || catches.len() != 1 {
        return None;
    }
    let handler = &catches[0].instructions;
    if handler.len() != 1 || !matches!(handler[0], Instr::AThrow { .. }) {
        return None;
    }

    let Instr::TernaryOpStore { value, .. } = &instructions[0] else {
        return None;
    };
    let Instr::Assignment { value2, .. } = value.as_ref() else {
        return None;
    };
    let Instr::Invoke { kind: InvokeKind::Static, method_ref, args, .. } = value2.as_ref() else {
        return None;
    };
    if args.len() != 1 {
        return None;
    }
    let Instr::Ldc { index, .. } = &args[0] else {
        return None;
    };

    if symbols.utf8(cache_field.descriptor) != descriptor::CLASS_SIGNATURE {
        return None;
    }
    if !symbols.utf8(cache_field.name).starts_with(CLASS_DOLLAR_PREFIX) {
        return None;
    }
    let forname = symbols.method_ref(*method_ref);
    if symbols.utf8(forname.class) != "java/lang/Class" || symbols.utf8(forname.name) != "forName" {
        return None;
    }
    let LdcValue::String(class_name) = symbols.constant(*index) else {
        return None;
    };

    Some(Match {
        dup_store_offset: *ds_offset,
        literal_offset,
        literal_line,
        internal_name: symbols.utf8(*class_name).replace('.', "/"),
        cache_field_name: cache_field.name,
    })
}
