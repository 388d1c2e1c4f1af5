//! The instruction tree for one decoded method body.
//!
//! Every node carries the byte offset of the bytecode it was decoded from.
//! Offsets are assigned once and never reused, so passes correlate nodes
//! across rewrites by offset instead of by reference — a `DupLoad` names
//! its producing `DupStore` by `dup_store_offset`, and a variable record is
//! addressed by `(slot, offset)`.

use crate::descriptor;
use crate::locals::LocalVariables;
use crate::symbols::{LdcValue, SymIndex, SymbolTable};

pub const UNKNOWN_LINE_NUMBER: u16 = 0;

/// Invocation kinds. `New` is constructor invocation fused with object
/// creation, producing the constructed object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
    New,
}

/// A width-ambiguous or fixed-width literal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
}

impl ConstValue {
    /// True when the literal is exactly 1, whatever its width — the only
    /// right-operand accepted by increment reconstruction.
    pub fn is_one(&self) -> bool {
        match *self {
            ConstValue::Int(v) => v == 1,
            ConstValue::Long(v) => v == 1,
            ConstValue::Float(v) => v == 1.0,
            ConstValue::Double(v) => v == 1.0,
            ConstValue::Null => false,
        }
    }
}

/// One arm of a switch; an empty `values` list marks the default arm.
#[derive(Clone, Debug)]
pub struct SwitchArm {
    pub values: Vec<i32>,
    pub instructions: Vec<Instr>,
}

/// A catch clause of a structured try node.
#[derive(Clone, Debug)]
pub struct CatchClause {
    pub exception_type: Option<SymIndex>,
    pub slot: u16,
    pub instructions: Vec<Instr>,
}

/// Closed set of operation kinds. Exhaustive matching in every pass means
/// a new kind fails to compile until each pass decides what to do with it.
#[derive(Clone, Debug)]
pub enum Instr {
    // Slot access. Integer loads/stores are width-ambiguous; typed
    // loads/stores (long/float/double) carry their signature; reference
    // loads/stores carry none until inference resolves one.
    ILoad { offset: u32, line: u16, slot: u16 },
    TypedLoad { offset: u32, line: u16, slot: u16, signature: SymIndex },
    ALoad { offset: u32, line: u16, slot: u16 },
    IStore { offset: u32, line: u16, slot: u16, value: Box<Instr> },
    TypedStore { offset: u32, line: u16, slot: u16, signature: SymIndex, value: Box<Instr> },
    AStore { offset: u32, line: u16, slot: u16, value: Box<Instr> },
    Iinc { offset: u32, line: u16, slot: u16, amount: i16 },

    // Reconstructed increments wrapping a slot or field access.
    PreInc { offset: u32, line: u16, value: Box<Instr>, amount: i32 },
    PostInc { offset: u32, line: u16, value: Box<Instr>, amount: i32 },

    // Stack duplication, offset-keyed.
    DupStore { offset: u32, line: u16, value: Box<Instr> },
    DupLoad { offset: u32, line: u16, dup_store_offset: u32 },

    // Literals. `signature` starts empty for width-ambiguous integer
    // literals and is filled in by constant type back-propagation.
    Const { offset: u32, line: u16, value: ConstValue, signature: Option<String> },
    Ldc { offset: u32, line: u16, index: u32 },

    BinaryOp {
        offset: u32,
        line: u16,
        operator: String,
        signature: String,
        value1: Box<Instr>,
        value2: Box<Instr>,
    },
    Convert { offset: u32, line: u16, target_signature: String, value: Box<Instr> },
    IfCmp { offset: u32, line: u16, value1: Box<Instr>, value2: Box<Instr>, branch_offset: i32 },
    IfXNull { offset: u32, line: u16, value: Box<Instr>, branch_offset: i32 },
    Pop { offset: u32, line: u16, value: Box<Instr> },

    Invoke {
        offset: u32,
        line: u16,
        kind: InvokeKind,
        method_ref: u32,
        object: Option<Box<Instr>>,
        args: Vec<Instr>,
    },

    GetField { offset: u32, line: u16, field_ref: u32, object: Box<Instr> },
    GetStatic { offset: u32, line: u16, field_ref: u32 },
    PutField { offset: u32, line: u16, field_ref: u32, object: Box<Instr>, value: Box<Instr> },
    PutStatic { offset: u32, line: u16, field_ref: u32, value: Box<Instr> },
    ArrayStore { offset: u32, line: u16, array: Box<Instr>, index: Box<Instr>, value: Box<Instr> },

    Return { offset: u32, line: u16, value: Box<Instr> },
    ReturnVoid { offset: u32, line: u16 },
    AThrow { offset: u32, line: u16, value: Box<Instr> },

    MonitorEnter { offset: u32, line: u16, object: Box<Instr> },
    MonitorExit { offset: u32, line: u16, object: Box<Instr> },

    /// The exception pushed on entry to a handler. `slot` is bound lazily:
    /// normally by the enclosing store, otherwise by analysis step 8.
    ExceptionLoad { offset: u32, line: u16, slot: Option<u16>, exception_type: Option<SymIndex> },
    ReturnAddressLoad { offset: u32, line: u16 },

    /// Value flowing out of one branch of a ternary; the merged second
    /// value lives at `second_value_offset`.
    TernaryOpStore { offset: u32, line: u16, value: Box<Instr>, second_value_offset: u32 },
    Assignment { offset: u32, line: u16, operator: String, value1: Box<Instr>, value2: Box<Instr> },

    CheckCast { offset: u32, line: u16, signature: SymIndex, value: Box<Instr> },

    /// A materialized temporary declaration; `record` indexes the variable
    /// table entry synthesized for it.
    Declaration { offset: u32, line: u16, slot: u16, record: usize, value: Option<Box<Instr>> },

    // Structured nodes produced by control-flow structuring. Only their
    // nested lists matter to the passes in this crate.
    Loop { offset: u32, line: u16, condition: Option<Box<Instr>>, instructions: Vec<Instr> },
    IfElse {
        offset: u32,
        line: u16,
        condition: Box<Instr>,
        instructions: Vec<Instr>,
        else_instructions: Vec<Instr>,
    },
    Switch { offset: u32, line: u16, selector: Box<Instr>, arms: Vec<SwitchArm> },
    Try {
        offset: u32,
        line: u16,
        instructions: Vec<Instr>,
        catches: Vec<CatchClause>,
        finally_instructions: Option<Vec<Instr>>,
    },
    Synchronized { offset: u32, line: u16, monitor: Box<Instr>, instructions: Vec<Instr> },
}

impl Instr {
    pub fn offset(&self) -> u32 {
        match self {
            Instr::ILoad { offset, .. }
            | Instr::TypedLoad { offset, .. }
            | Instr::ALoad { offset, .. }
            | Instr::IStore { offset, .. }
            | Instr::TypedStore { offset, .. }
            | Instr::AStore { offset, .. }
            | Instr::Iinc { offset, .. }
            | Instr::PreInc { offset, .. }
            | Instr::PostInc { offset, .. }
            | Instr::DupStore { offset, .. }
            | Instr::DupLoad { offset, .. }
            | Instr::Const { offset, .. }
            | Instr::Ldc { offset, .. }
            | Instr::BinaryOp { offset, .. }
            | Instr::Convert { offset, .. }
            | Instr::IfCmp { offset, .. }
            | Instr::IfXNull { offset, .. }
            | Instr::Pop { offset, .. }
            | Instr::Invoke { offset, .. }
            | Instr::GetField { offset, .. }
            | Instr::GetStatic { offset, .. }
            | Instr::PutField { offset, .. }
            | Instr::PutStatic { offset, .. }
            | Instr::ArrayStore { offset, .. }
            | Instr::Return { offset, .. }
            | Instr::ReturnVoid { offset, .. }
            | Instr::AThrow { offset, .. }
            | Instr::MonitorEnter { offset, .. }
            | Instr::MonitorExit { offset, .. }
            | Instr::ExceptionLoad { offset, .. }
            | Instr::ReturnAddressLoad { offset, .. }
            | Instr::TernaryOpStore { offset, .. }
            | Instr::Assignment { offset, .. }
            | Instr::CheckCast { offset, .. }
            | Instr::Declaration { offset, .. }
            | Instr::Loop { offset, .. }
            | Instr::IfElse { offset, .. }
            | Instr::Switch { offset, .. }
            | Instr::Try { offset, .. }
            | Instr::Synchronized { offset, .. } => *offset,
        }
    }

    pub fn line(&self) -> u16 {
        match self {
            Instr::ILoad { line, .. }
            | Instr::TypedLoad { line, .. }
            | Instr::ALoad { line, .. }
            | Instr::IStore { line, .. }
            | Instr::TypedStore { line, .. }
            | Instr::AStore { line, .. }
            | Instr::Iinc { line, .. }
            | Instr::PreInc { line, .. }
            | Instr::PostInc { line, .. }
            | Instr::DupStore { line, .. }
            | Instr::DupLoad { line, .. }
            | Instr::Const { line, .. }
            | Instr::Ldc { line, .. }
            | Instr::BinaryOp { line, .. }
            | Instr::Convert { line, .. }
            | Instr::IfCmp { line, .. }
            | Instr::IfXNull { line, .. }
            | Instr::Pop { line, .. }
            | Instr::Invoke { line, .. }
            | Instr::GetField { line, .. }
            | Instr::GetStatic { line, .. }
            | Instr::PutField { line, .. }
            | Instr::PutStatic { line, .. }
            | Instr::ArrayStore { line, .. }
            | Instr::Return { line, .. }
            | Instr::ReturnVoid { line, .. }
            | Instr::AThrow { line, .. }
            | Instr::MonitorEnter { line, .. }
            | Instr::MonitorExit { line, .. }
            | Instr::ExceptionLoad { line, .. }
            | Instr::ReturnAddressLoad { line, .. }
            | Instr::TernaryOpStore { line, .. }
            | Instr::Assignment { line, .. }
            | Instr::CheckCast { line, .. }
            | Instr::Declaration { line, .. }
            | Instr::Loop { line, .. }
            | Instr::IfElse { line, .. }
            | Instr::Switch { line, .. }
            | Instr::Try { line, .. }
            | Instr::Synchronized { line, .. } => *line,
        }
    }

    /// Direct child nodes, in evaluation order.
    pub fn children(&self) -> Vec<&Instr> {
        match self {
            Instr::IStore { value, .. }
            | Instr::TypedStore { value, .. }
            | Instr::AStore { value, .. }
            | Instr::PreInc { value, .. }
            | Instr::PostInc { value, .. }
            | Instr::DupStore { value, .. }
            | Instr::Convert { value, .. }
            | Instr::Pop { value, .. }
            | Instr::IfXNull { value, .. }
            | Instr::Return { value, .. }
            | Instr::AThrow { value, .. }
            | Instr::MonitorEnter { object: value, .. }
            | Instr::MonitorExit { object: value, .. }
            | Instr::GetField { object: value, .. }
            | Instr::TernaryOpStore { value, .. }
            | Instr::CheckCast { value, .. } => vec![value],
            Instr::BinaryOp { value1, value2, .. }
            | Instr::IfCmp { value1, value2, .. }
            | Instr::Assignment { value1, value2, .. } => vec![value1, value2],
            Instr::PutField { object, value, .. } => vec![object, value],
            Instr::PutStatic { value, .. } => vec![value],
            Instr::ArrayStore { array, index, value, .. } => vec![array, index, value],
            Instr::Invoke { object, args, .. } => {
                let mut out: Vec<&Instr> = Vec::with_capacity(args.len() + 1);
                if let Some(o) = object {
                    out.push(o);
                }
                out.extend(args.iter());
                out
            }
            Instr::Declaration { value, .. } => value.iter().map(|v| v.as_ref()).collect(),
            Instr::Loop { condition, instructions, .. } => {
                let mut out: Vec<&Instr> = Vec::new();
                if let Some(c) = condition {
                    out.push(c);
                }
                out.extend(instructions.iter());
                out
            }
            Instr::IfElse { condition, instructions, else_instructions, .. } => {
                let mut out: Vec<&Instr> = vec![condition.as_ref()];
                out.extend(instructions.iter());
                out.extend(else_instructions.iter());
                out
            }
            Instr::Switch { selector, arms, .. } => {
                let mut out: Vec<&Instr> = vec![selector.as_ref()];
                for arm in arms {
                    out.extend(arm.instructions.iter());
                }
                out
            }
            Instr::Try { instructions, catches, finally_instructions, .. } => {
                let mut out: Vec<&Instr> = instructions.iter().collect();
                for c in catches {
                    out.extend(c.instructions.iter());
                }
                if let Some(f) = finally_instructions {
                    out.extend(f.iter());
                }
                out
            }
            Instr::Synchronized { monitor, instructions, .. } => {
                let mut out: Vec<&Instr> = vec![monitor.as_ref()];
                out.extend(instructions.iter());
                out
            }
            _ => Vec::new(),
        }
    }

    /// Mutable counterpart of [`Instr::children`].
    pub fn children_mut(&mut self) -> Vec<&mut Instr> {
        match self {
            Instr::IStore { value, .. }
            | Instr::TypedStore { value, .. }
            | Instr::AStore { value, .. }
            | Instr::PreInc { value, .. }
            | Instr::PostInc { value, .. }
            | Instr::DupStore { value, .. }
            | Instr::Convert { value, .. }
            | Instr::Pop { value, .. }
            | Instr::IfXNull { value, .. }
            | Instr::Return { value, .. }
            | Instr::AThrow { value, .. }
            | Instr::MonitorEnter { object: value, .. }
            | Instr::MonitorExit { object: value, .. }
            | Instr::GetField { object: value, .. }
            | Instr::TernaryOpStore { value, .. }
            | Instr::CheckCast { value, .. } => vec![value],
            Instr::BinaryOp { value1, value2, .. }
            | Instr::IfCmp { value1, value2, .. }
            | Instr::Assignment { value1, value2, .. } => vec![value1, value2],
            Instr::PutField { object, value, .. } => vec![object, value],
            Instr::PutStatic { value, .. } => vec![value],
            Instr::ArrayStore { array, index, value, .. } => vec![array, index, value],
            Instr::Invoke { object, args, .. } => {
                let mut out: Vec<&mut Instr> = Vec::with_capacity(args.len() + 1);
                if let Some(o) = object {
                    out.push(o);
                }
                out.extend(args.iter_mut());
                out
            }
            Instr::Declaration { value, .. } => value.iter_mut().map(|v| v.as_mut()).collect(),
            Instr::Loop { condition, instructions, .. } => {
                let mut out: Vec<&mut Instr> = Vec::new();
                if let Some(c) = condition {
                    out.push(c);
                }
                out.extend(instructions.iter_mut());
                out
            }
            Instr::IfElse { condition, instructions, else_instructions, .. } => {
                let mut out: Vec<&mut Instr> = vec![condition.as_mut()];
                out.extend(instructions.iter_mut());
                out.extend(else_instructions.iter_mut());
                out
            }
            Instr::Switch { selector, arms, .. } => {
                let mut out: Vec<&mut Instr> = vec![selector.as_mut()];
                for arm in arms {
                    out.extend(arm.instructions.iter_mut());
                }
                out
            }
            Instr::Try { instructions, catches, finally_instructions, .. } => {
                let mut out: Vec<&mut Instr> = instructions.iter_mut().collect();
                for c in catches {
                    out.extend(c.instructions.iter_mut());
                }
                if let Some(f) = finally_instructions {
                    out.extend(f.iter_mut());
                }
                out
            }
            Instr::Synchronized { monitor, instructions, .. } => {
                let mut out: Vec<&mut Instr> = vec![monitor.as_mut()];
                out.extend(instructions.iter_mut());
                out
            }
            _ => Vec::new(),
        }
    }

    /// Signature of the value this instruction leaves behind, when it can
    /// be determined at this point of the analysis. `None` means the width
    /// or type is still ambiguous.
    pub fn returned_signature(
        &self,
        symbols: &SymbolTable,
        locals: &LocalVariables,
    ) -> Option<String> {
        match self {
            // Stays `None` until the slot record resolves; integer width
            // is tracked in the record's candidate set, not here.
            Instr::ILoad { slot, offset, .. } => locals
                .find_nearest(*slot, *offset)
                .and_then(|i| locals.get(i).concrete_signature(symbols)),
            Instr::TypedLoad { signature, .. } => Some(symbols.utf8(*signature).to_string()),
            Instr::ALoad { slot, offset, .. } => locals
                .find_nearest(*slot, *offset)
                .and_then(|i| locals.get(i).concrete_signature(symbols)),
            Instr::IStore { value, .. } | Instr::AStore { value, .. } => {
                value.returned_signature(symbols, locals)
            }
            Instr::TypedStore { signature, .. } => Some(symbols.utf8(*signature).to_string()),
            Instr::Const { value, signature, .. } => {
                if let Some(sig) = signature {
                    return Some(sig.clone());
                }
                match value {
                    ConstValue::Long(_) => Some("J".to_string()),
                    ConstValue::Float(_) => Some("F".to_string()),
                    ConstValue::Double(_) => Some("D".to_string()),
                    // Width of integer literals and the type of null are
                    // decided by their consumers.
                    ConstValue::Int(_) | ConstValue::Null => None,
                }
            }
            Instr::Ldc { index, .. } => match symbols.constant(*index) {
                LdcValue::String(_) => Some("Ljava/lang/String;".to_string()),
                LdcValue::Class(_) => Some(descriptor::CLASS_SIGNATURE.to_string()),
                LdcValue::Int(_) => Some("I".to_string()),
                LdcValue::Float(_) => Some("F".to_string()),
            },
            Instr::BinaryOp { signature, .. } => Some(signature.clone()),
            Instr::Convert { target_signature, .. } => Some(target_signature.clone()),
            Instr::Invoke { kind, method_ref, .. } => {
                let mr = symbols.method_ref(*method_ref);
                if *kind == InvokeKind::New {
                    Some(format!("L{};", symbols.utf8(mr.class)))
                } else {
                    descriptor::method_return_signature(symbols.utf8(mr.descriptor))
                }
            }
            Instr::GetField { field_ref, .. } | Instr::GetStatic { field_ref, .. } => {
                Some(symbols.utf8(symbols.field_ref(*field_ref).descriptor).to_string())
            }
            Instr::ExceptionLoad { exception_type, .. } => {
                exception_type.map(|s| symbols.utf8(s).to_string())
            }
            Instr::PreInc { value, .. } | Instr::PostInc { value, .. } => {
                value.returned_signature(symbols, locals)
            }
            Instr::TernaryOpStore { value, .. } => value.returned_signature(symbols, locals),
            Instr::Assignment { value2, .. } => value2.returned_signature(symbols, locals),
            Instr::CheckCast { signature, .. } => Some(symbols.utf8(*signature).to_string()),
            _ => None,
        }
    }
}

/// Offset-ordered flat view of a statement list: every node of every tree,
/// children before parents. Since operands are computed before the
/// instruction consuming them, post-order is bytecode-offset order.
pub fn flatten(list: &[Instr]) -> Vec<&Instr> {
    let mut out = Vec::new();
    for instr in list {
        flatten_into(instr, &mut out);
    }
    out
}

fn flatten_into<'a>(instr: &'a Instr, out: &mut Vec<&'a Instr>) {
    for child in instr.children() {
        flatten_into(child, out);
    }
    out.push(instr);
}

/// Locate the node carrying `offset` anywhere in the list.
pub fn find_by_offset<'a>(list: &'a [Instr], offset: u32) -> Option<&'a Instr> {
    for instr in list {
        if let Some(found) = find_in(instr, offset) {
            return Some(found);
        }
    }
    None
}

fn find_in(instr: &Instr, offset: u32) -> Option<&Instr> {
    if instr.offset() == offset {
        return Some(instr);
    }
    for child in instr.children() {
        if let Some(found) = find_in(child, offset) {
            return Some(found);
        }
    }
    None
}

/// Replace every `DupLoad` referencing `dup_store_offset` inside `instr`
/// with a clone of `replacement`. Returns the number of substitutions.
pub fn replace_dup_load(instr: &mut Instr, dup_store_offset: u32, replacement: &Instr) -> usize {
    let mut count = 0;
    for child in instr.children_mut() {
        if let Instr::DupLoad { dup_store_offset: target, .. } = child {
            if *target == dup_store_offset {
                *child = replacement.clone();
                count += 1;
                continue;
            }
        }
        count += replace_dup_load(child, dup_store_offset, replacement);
    }
    count
}

/// Post-order mutable walk over every node of the statement list.
pub fn visit_mut(list: &mut [Instr], f: &mut impl FnMut(&mut Instr)) {
    for instr in list {
        visit_instr_mut(instr, f);
    }
}

fn visit_instr_mut(instr: &mut Instr, f: &mut impl FnMut(&mut Instr)) {
    for child in instr.children_mut() {
        visit_instr_mut(child, f);
    }
    f(instr);
}

/// Byte offset of the instruction following the one at `offset` in the raw
/// code array. Used by scope repair: debug tables routinely mark a scope
/// as starting one instruction late.
pub fn next_instruction_offset(code: &[u8], offset: usize) -> usize {
    let opcode = match code.get(offset) {
        Some(&op) => op,
        None => return code.len(),
    };
    let size = match opcode {
        0x10 => 2,                   // bipush
        0x11 => 3,                   // sipush
        0x12 => 2,                   // ldc
        0x13 | 0x14 => 3,            // ldc_w, ldc2_w
        0x15..=0x19 => 2,            // iload..aload
        0x36..=0x3a => 2,            // istore..astore
        0x84 => 3,                   // iinc
        0x99..=0xa8 => 3,            // ifeq..jsr
        0xa9 => 2,                   // ret
        0xaa => {
            // tableswitch: opcode, pad, default, low, high, jump table
            let pad = (4 - (offset + 1) % 4) % 4;
            let base = offset + 1 + pad;
            let low = read_i32(code, base + 4);
            let high = read_i32(code, base + 8);
            let entries = (high - low + 1).max(0) as usize;
            1 + pad + 12 + 4 * entries
        }
        0xab => {
            // lookupswitch: opcode, pad, default, npairs, match/offset pairs
            let pad = (4 - (offset + 1) % 4) % 4;
            let base = offset + 1 + pad;
            let npairs = read_i32(code, base + 4).max(0) as usize;
            1 + pad + 8 + 8 * npairs
        }
        0xb2..=0xb8 => 3,            // getstatic..invokestatic
        0xb9 | 0xba => 5,            // invokeinterface, invokedynamic
        0xbb => 3,                   // new
        0xbc => 2,                   // newarray
        0xbd => 3,                   // anewarray
        0xc0 | 0xc1 => 3,            // checkcast, instanceof
        0xc4 => {
            // wide: iinc form is 6 bytes, load/store/ret form is 4
            if code.get(offset + 1) == Some(&0x84) {
                6
            } else {
                4
            }
        }
        0xc5 => 4,                   // multianewarray
        0xc6 | 0xc7 => 3,            // ifnull, ifnonnull
        0xc8 | 0xc9 => 5,            // goto_w, jsr_w
        _ => 1,
    };
    (offset + size).min(code.len())
}

fn read_i32(code: &[u8], at: usize) -> i32 {
    match code.get(at..at + 4) {
        Some(b) => i32::from_be_bytes([b[0], b[1], b[2], b[3]]),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iload(offset: u32, slot: u16) -> Instr {
        Instr::ILoad { offset, line: UNKNOWN_LINE_NUMBER, slot }
    }

    #[test]
    fn test_flatten_is_post_order() {
        let list = vec![Instr::IStore {
            offset: 4,
            line: 0,
            slot: 1,
            value: Box::new(Instr::BinaryOp {
                offset: 3,
                line: 0,
                operator: "+".into(),
                signature: "I".into(),
                value1: Box::new(iload(1, 1)),
                value2: Box::new(Instr::Const {
                    offset: 2,
                    line: 0,
                    value: ConstValue::Int(1),
                    signature: None,
                }),
            }),
        }];
        let flat = flatten(&list);
        let offsets: Vec<u32> = flat.iter().map(|i| i.offset()).collect();
        assert_eq!(offsets, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_find_by_offset() {
        let list = vec![Instr::Pop {
            offset: 10,
            line: 0,
            value: Box::new(iload(9, 2)),
        }];
        assert!(matches!(find_by_offset(&list, 9), Some(Instr::ILoad { slot: 2, .. })));
        assert!(find_by_offset(&list, 42).is_none());
    }

    #[test]
    fn test_replace_dup_load_by_offset() {
        let mut use_site = Instr::Pop {
            offset: 20,
            line: 0,
            value: Box::new(Instr::DupLoad { offset: 19, line: 0, dup_store_offset: 5 }),
        };
        let replacement = iload(5, 3);
        assert_eq!(replace_dup_load(&mut use_site, 5, &replacement), 1);
        assert!(matches!(
            use_site,
            Instr::Pop { ref value, .. } if matches!(**value, Instr::ILoad { slot: 3, .. })
        ));
    }

    #[test]
    fn test_next_instruction_offset_simple() {
        // iconst_1, istore_1, bipush 5, iload_1
        let code = [0x04, 0x3c, 0x10, 0x05, 0x1b];
        assert_eq!(next_instruction_offset(&code, 0), 1);
        assert_eq!(next_instruction_offset(&code, 1), 2);
        assert_eq!(next_instruction_offset(&code, 2), 4);
        assert_eq!(next_instruction_offset(&code, 4), 5);
    }

    #[test]
    fn test_next_instruction_offset_wide_and_switch() {
        // wide iinc 0x0102 by 1
        let wide = [0xc4, 0x84, 0x01, 0x02, 0x00, 0x01, 0x00];
        assert_eq!(next_instruction_offset(&wide, 0), 6);

        // tableswitch at offset 0: pad 3, default, low=0, high=1, 2 entries
        let mut ts = vec![0xaa, 0, 0, 0];
        ts.extend_from_slice(&0i32.to_be_bytes());
        ts.extend_from_slice(&0i32.to_be_bytes());
        ts.extend_from_slice(&1i32.to_be_bytes());
        ts.extend_from_slice(&[0; 8]);
        ts.push(0x00);
        assert_eq!(next_instruction_offset(&ts, 0), 24);
    }
}
