//! Declaration of stack-duplication temporaries.
//!
//! A `DupStore` still present after every idiom pass ran has no source
//! construct to collapse into; it becomes an explicit temporary so the
//! emitted body stays valid. The store turns into a declaration backed by
//! a fresh variable record and its `DupLoad`s keep referring to it by the
//! store's offset.

use crate::descriptor;
use crate::instruction::{Instr, UNKNOWN_LINE_NUMBER};
use crate::locals::{LocalVariable, LocalVariables, TypeRef};
use crate::symbols::SymbolTable;

pub fn declare(
    symbols: &mut SymbolTable,
    locals: &mut LocalVariables,
    code_length: u32,
    list: &mut Vec<Instr>,
) {
    // Nested statement lists first.
    for instr in list.iter_mut() {
        match instr {
            Instr::Loop { instructions, .. } | Instr::Synchronized { instructions, .. } => {
                declare(symbols, locals, code_length, instructions);
            }
            Instr::IfElse { instructions, else_instructions, .. } => {
                declare(symbols, locals, code_length, instructions);
                declare(symbols, locals, code_length, else_instructions);
            }
            Instr::Switch { arms, .. } => {
                for arm in arms.iter_mut() {
                    declare(symbols, locals, code_length, &mut arm.instructions);
                }
            }
            Instr::Try { instructions, catches, finally_instructions, .. } => {
                declare(symbols, locals, code_length, instructions);
                for c in catches.iter_mut() {
                    declare(symbols, locals, code_length, &mut c.instructions);
                }
                if let Some(f) = finally_instructions {
                    declare(symbols, locals, code_length, f);
                }
            }
            _ => {}
        }
    }

    for stmt in list.iter_mut() {
        let Instr::DupStore { offset, value, .. } = stmt else {
            continue;
        };

        let signature = value
            .returned_signature(symbols, locals)
            .unwrap_or_else(|| descriptor::OBJECT_SIGNATURE.to_string());
        let sig_sym = symbols.add_utf8(&signature);
        let name_sym = symbols.add_utf8(&format!("tmp{}_{}", offset, value.offset()));

        let slot = locals.len() as u16;
        let start = *offset;
        // Scoped from the store to the end of the body, clipped to the
        // code range.
        let length = code_length.saturating_sub(start).max(1);
        let mut lv = LocalVariable::new(slot, start, length, Some(name_sym), TypeRef::Concrete(sig_sym));
        lv.declaration = true;
        let record = locals.add(lv);

        let placeholder = Instr::ReturnVoid { offset: start, line: UNKNOWN_LINE_NUMBER };
        let old = std::mem::replace(stmt, placeholder);
        if let Instr::DupStore { offset, value, .. } = old {
            // A synthesized declaration maps to no source line.
            *stmt = Instr::Declaration {
                offset,
                line: UNKNOWN_LINE_NUMBER,
                slot,
                record,
                value: Some(value),
            };
        }
    }
}
