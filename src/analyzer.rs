//! Local-variable reconstruction for one method.
//!
//! The driver establishes or completes the variable table, repairs the
//! scope ranges persisted by compilers, infers a type for every slot
//! interpretation through a forward scan plus a reverse fixed point,
//! resolves the remaining sentinels, inserts narrowing casts where two
//! reference types collided, back-propagates literal widths, and finally
//! names everything that is still anonymous.
//!
//! No step aborts: shape mismatches degrade to the most conservative type
//! and are reported through `tracing` diagnostics only.

use tracing::{debug, warn};

use crate::descriptor::{self, IntTypeSet};
use crate::instruction::{self, Instr};
use crate::locals::{LocalVariable, LocalVariables, TypeRef};
use crate::method::{ClassAccessFlags, ClassContext, MethodAccessFlags, MethodContext};
use crate::name_gen::VariableNameGenerator;
use crate::symbols::{SymIndex, SymbolTable};

pub const THIS_LOCAL_VARIABLE_NAME: &str = "this";
pub const OUTER_THIS_LOCAL_VARIABLE_NAME: &str = "this$0";

/// Analyze one method: build/merge the variable table and annotate the
/// instruction list in place. Idempotent — every record and node written
/// here is recognizable on a second run, which then changes nothing.
pub fn analyze(
    class: &ClassContext,
    method: &mut MethodContext,
    symbols: &mut SymbolTable,
    name_gen: &mut VariableNameGenerator,
    list: &mut Vec<Instr>,
) {
    name_gen.clear_local_names();
    let code_length = method.code_length();

    let mut table = match method.local_variables.take() {
        None => {
            let mut table = LocalVariables::new();

            if !method.is_static() {
                let name = symbols.add_utf8(THIS_LOCAL_VARIABLE_NAME);
                let sig = symbols.add_utf8(&class.internal_signature());
                table.add(LocalVariable::new(0, 0, code_length, Some(name), TypeRef::Concrete(sig)));
            }

            if method.is_instance_constructor
                && class.is_inner_class
                && !class.access_flags.contains(ClassAccessFlags::STATIC)
            {
                if let Some(outer) = class.outer_signature() {
                    let name = symbols.add_utf8(OUTER_THIS_LOCAL_VARIABLE_NAME);
                    let sig = symbols.add_utf8(&outer);
                    table.add(LocalVariable::new(1, 0, code_length, Some(name), TypeRef::Concrete(sig)));
                }
            }

            analyze_method_parameters(class, method, &mut table, symbols, name_gen, code_length);
            let cut = table.len();
            table.set_index_of_first_local(cut);

            if !method.code.is_empty() {
                generate_missing_monitor_variables(symbols, &mut table, list);
            }
            table
        }
        Some(mut table) => {
            let expected = usize::from(!method.is_static())
                + descriptor::parameter_count(method.effective_descriptor());

            if expected > table.len() {
                // Compiler-generated methods ship incomplete debug tables;
                // fill the missing parameter entries from the descriptor.
                analyze_method_parameters(class, method, &mut table, symbols, name_gen, code_length);
            }
            table.set_index_of_first_local(expected);

            if !method.code.is_empty() {
                generate_missing_monitor_variables(symbols, &mut table, list);
                check_local_variable_ranges(symbols, &method.code, &mut table, name_gen, list);
            }
            table
        }
    };

    if !method.code.is_empty() {
        let return_sig = descriptor::method_return_signature(method.effective_descriptor());
        analyze_method_code(symbols, &mut table, list, return_sig.as_deref());
        set_constant_types(symbols, &table, list, return_sig.as_deref());
        initialize_exception_loads(&mut table, list);
    }

    generate_local_variable_names(&mut table, symbols, name_gen);
    method.local_variables = Some(table);
}

fn analyze_method_parameters(
    class: &ClassContext,
    method: &MethodContext,
    table: &mut LocalVariables,
    symbols: &mut SymbolTable,
    name_gen: &mut VariableNameGenerator,
    code_length: u32,
) {
    let sigs = descriptor::parameter_signatures(method.effective_descriptor());
    let mut slot: u16 = if method.is_static() { 0 } else { 1 };
    let mut first_visible = 0usize;

    if method.is_instance_constructor {
        if class.access_flags.contains(ClassAccessFlags::ENUM) {
            // Enum constructors: the descriptor carries the synthetic name
            // and ordinal, the generic signature does not.
            if method.signature.is_none() {
                first_visible = 2;
            } else {
                slot = 3;
            }
        } else if class.is_inner_class && !class.access_flags.contains(ClassAccessFlags::STATIC) {
            first_visible = 1;
        }
    }

    let varargs_index = if method.access_flags.contains(MethodAccessFlags::VARARGS) {
        sigs.len().wrapping_sub(1)
    } else {
        usize::MAX
    };

    for (i, sig) in sigs.iter().enumerate() {
        if table.find_at(slot, 0).is_none() {
            let visible = sigs.get(first_visible..).unwrap_or(&[]);
            let appears_once = visible.iter().filter(|s| *s == sig).count() <= 1;
            let name = name_gen.generate_parameter_name(sig, appears_once, i == varargs_index);
            let name_sym = symbols.add_utf8(&name);
            let sig_sym = symbols.add_utf8(sig);
            table.add(LocalVariable::new(
                slot,
                0,
                code_length,
                Some(name_sym),
                TypeRef::Concrete(sig_sym),
            ));
        }
        slot += if descriptor::is_wide_signature(sig) { 2 } else { 1 };
    }
}

/// Synthesize records for the hidden variable a `synchronized` block keeps
/// its monitor object in. Only a pairing with at least two `monitorexit`
/// instructions (the normal and the exceptional unwind path) is conclusive
/// enough to act on; a single exit is left to generic range repair.
fn generate_missing_monitor_variables(
    symbols: &mut SymbolTable,
    table: &mut LocalVariables,
    list: &[Instr],
) {
    for i in 1..list.len() {
        let (slot, enter_start) = match &list[i] {
            Instr::MonitorEnter { object, .. } => match object.as_ref() {
                // DupStore( expr ); AStore( DupLoad ); MonitorEnter( DupLoad )
                Instr::DupLoad { dup_store_offset, .. } => match &list[i - 1] {
                    Instr::AStore { slot, offset, value, .. }
                        if matches!(
                            value.as_ref(),
                            Instr::DupLoad { dup_store_offset: d, .. } if d == dup_store_offset
                        ) =>
                    {
                        (*slot, *offset)
                    }
                    _ => continue,
                },
                // AStore( expr ); MonitorEnter( ALoad )
                Instr::ALoad { slot: load_slot, .. } => match &list[i - 1] {
                    Instr::AStore { slot, offset, .. } if slot == load_slot => (*slot, *offset),
                    _ => continue,
                },
                _ => continue,
            },
            _ => continue,
        };

        let mut start = enter_start;
        let mut length = 1u32;
        let mut exit_count = 0u32;

        for stmt in &list[i + 1..] {
            if let Instr::MonitorExit { object, .. } = stmt {
                if let Instr::ALoad { slot: s, offset, .. } = object.as_ref() {
                    if *s == slot {
                        length = offset.saturating_sub(start);
                        exit_count += 1;
                    }
                }
            }
        }

        if exit_count == 1 {
            // One historical compiler (Jikes 1.22) emits the exceptional
            // exit before the enter; rescan backward for the pair. Legacy
            // behavior, kept as-is.
            for stmt in list[..i].iter().rev() {
                if let Instr::MonitorExit { object, .. } = stmt {
                    if let Instr::ALoad { slot: s, offset, .. } = object.as_ref() {
                        if *s == slot {
                            length += start.saturating_sub(*offset);
                            start = *offset;
                            exit_count += 1;
                            break;
                        }
                    }
                }
            }
        }

        if exit_count < 2 {
            continue;
        }

        let covered = match table.find_at(slot, start) {
            Some(idx) => table.get(idx).end() >= start + length,
            None => false,
        };
        if !covered {
            let sig = symbols.add_utf8(descriptor::OBJECT_SIGNATURE);
            table.add(LocalVariable::new(slot, start, length, None, TypeRef::Concrete(sig)));
        }
    }
}

/// Repair the scopes persisted in debug metadata: compilers mark a scope
/// as starting one instruction late and over-extend its length, so every
/// synthesized-region length is recomputed from actual slot accesses.
fn check_local_variable_ranges(
    symbols: &mut SymbolTable,
    code: &[u8],
    table: &mut LocalVariables,
    name_gen: &mut VariableNameGenerator,
    list: &[Instr],
) {
    for i in table.index_of_first_local()..table.len() {
        table.get_mut(i).length = 1;
    }

    for (stmt_idx, stmt) in list.iter().enumerate() {
        if let Instr::AStore { slot, offset, value, .. } = stmt {
            match value.as_ref() {
                Instr::ExceptionLoad { exception_type: Some(exc), .. } => {
                    check_exception_store_range(symbols, code, table, name_gen, *slot, *offset, *exc);
                    continue;
                }
                Instr::DupLoad { dup_store_offset, .. } => {
                    if let Some(Instr::MonitorEnter { object, .. }) = list.get(stmt_idx + 1) {
                        if table.find_at(*slot, *offset).is_none() {
                            let paired = matches!(
                                object.as_ref(),
                                Instr::DupLoad { dup_store_offset: d, .. } if d == dup_store_offset
                            );
                            if paired {
                                let sig = symbols.add_utf8(descriptor::OBJECT_SIGNATURE);
                                table.add(LocalVariable::new(
                                    *slot,
                                    *offset,
                                    1,
                                    None,
                                    TypeRef::Concrete(sig),
                                ));
                            } else {
                                check_range_for(code, table, *slot, *offset);
                            }
                        }
                        continue;
                    }
                }
                _ => {}
            }
        }

        for node in instruction::flatten(std::slice::from_ref(stmt)) {
            match node {
                Instr::ILoad { slot, offset, .. }
                | Instr::TypedLoad { slot, offset, .. }
                | Instr::ALoad { slot, offset, .. }
                | Instr::IStore { slot, offset, .. }
                | Instr::TypedStore { slot, offset, .. }
                | Instr::AStore { slot, offset, .. }
                | Instr::Iinc { slot, offset, .. } => check_range_for(code, table, *slot, *offset),
                _ => {}
            }
        }
    }
}

fn check_exception_store_range(
    symbols: &mut SymbolTable,
    code: &[u8],
    table: &mut LocalVariables,
    name_gen: &mut VariableNameGenerator,
    slot: u16,
    offset: u32,
    exception_type: SymIndex,
) {
    if table.find_at(slot, offset).is_some() {
        return;
    }
    let next = instruction::next_instruction_offset(code, offset as usize) as u32;
    if let Some(idx) = table.find_at(slot, next) {
        table.get_mut(idx).update_range(offset);
        return;
    }
    // No record at all: the handler variable never made it into the debug
    // table. Synthesize one, typed by the thrown class, named right away.
    let mut lv = LocalVariable::new(slot, offset, 1, None, TypeRef::Concrete(exception_type));
    lv.exception_or_return_address = true;
    let idx = table.add(lv);
    let sig = symbols.utf8(exception_type).to_string();
    let appears_once = signature_appears_once_in_locals(table, exception_type);
    let name = name_gen.generate_local_name(&sig, appears_once);
    table.get_mut(idx).name = Some(symbols.add_utf8(&name));
}

fn check_range_for(code: &[u8], table: &mut LocalVariables, slot: u16, offset: u32) {
    if let Some(idx) = table.find_at(slot, offset) {
        table.get_mut(idx).update_range(offset);
        return;
    }
    // Scopes start one instruction late; retry at the next offset and, on
    // a hit, widen that record's start backward.
    let next = instruction::next_instruction_offset(code, offset as usize) as u32;
    if let Some(idx) = table.find_at(slot, next) {
        table.get_mut(idx).update_range(offset);
        return;
    }
    if let Some(idx) = table.find_nearest(slot, offset) {
        table.get_mut(idx).update_range(offset);
        return;
    }
    debug!(slot, offset, "slot access matches no scope record");
}

// ---- Forward inference, reverse propagation, resolution ----

fn analyze_method_code(
    symbols: &mut SymbolTable,
    table: &mut LocalVariables,
    list: &mut Vec<Instr>,
    return_sig: Option<&str>,
) {
    {
        let flat = instruction::flatten(list);

        for idx in 0..flat.len() {
            if let Some(slot) = slot_of(flat[idx]) {
                sub_analyze(&flat, idx, slot, table, symbols, return_sig);
            }
        }

        reverse_propagate(table, symbols, &flat);
    }

    // Resolve the surviving sentinels: unknown references become Object,
    // numeric records take the narrowest width still admitted, conflicted
    // records become Object and get casts at their load sites.
    let object_sym = symbols.add_utf8(descriptor::OBJECT_SIGNATURE);
    for idx in 0..table.len() {
        let resolved = match table.get(idx).type_ref {
            TypeRef::Undetermined | TypeRef::ObjectConflict => Some(object_sym),
            TypeRef::UntypedNumber => {
                Some(symbols.add_utf8(table.get(idx).int_types.narrowest_signature()))
            }
            TypeRef::Concrete(_) => None,
        };
        if let Some(sym) = resolved {
            table.get_mut(idx).type_ref = TypeRef::Concrete(sym);
        }
    }

    for idx in 0..table.len() {
        if table.get(idx).type_ref == TypeRef::Concrete(object_sym) {
            for stmt in list.iter_mut() {
                insert_casts(stmt, symbols, table, idx);
            }
        }
    }
}

fn slot_of(instr: &Instr) -> Option<u16> {
    match instr {
        Instr::ILoad { slot, .. }
        | Instr::TypedLoad { slot, .. }
        | Instr::ALoad { slot, .. }
        | Instr::IStore { slot, .. }
        | Instr::TypedStore { slot, .. }
        | Instr::AStore { slot, .. }
        | Instr::Iinc { slot, .. } => Some(*slot),
        _ => None,
    }
}

fn slot_access_offset(instr: &Instr) -> u32 {
    instr.offset()
}

/// Type the interpretations of one slot, starting from its first untreated
/// access. Walks the rest of the sequence collecting every constraint the
/// slot participates in.
fn sub_analyze(
    flat: &[&Instr],
    start: usize,
    slot: u16,
    table: &mut LocalVariables,
    symbols: &mut SymbolTable,
    return_sig: Option<&str>,
) {
    let first = flat[start];
    if let Some(idx) = table.find_at(slot, slot_access_offset(first)) {
        // Already covered by an earlier pass over this slot; just make
        // sure the exception marker is in place.
        if let Instr::AStore { value, .. } = first {
            if matches!(value.as_ref(), Instr::ExceptionLoad { .. }) {
                table.get_mut(idx).exception_or_return_address = true;
            }
        }
        return;
    }

    for node in &flat[start..] {
        match node {
            Instr::IStore { slot: s, offset, value, .. } if *s == slot => {
                analyze_istore(table, symbols, *s, *offset, value);
            }
            Instr::TypedStore { slot: s, offset, signature, .. } if *s == slot => {
                analyze_typed_store(table, *s, *offset, *signature);
            }
            Instr::AStore { slot: s, offset, value, .. } if *s == slot => {
                analyze_astore(table, symbols, *s, *offset, value);
            }
            Instr::ILoad { slot: s, offset, .. } | Instr::Iinc { slot: s, offset, .. }
                if *s == slot =>
            {
                analyze_iload(table, *s, *offset);
            }
            Instr::TypedLoad { slot: s, offset, .. } if *s == slot => {
                analyze_ref_load(table, *s, *offset);
            }
            Instr::ExceptionLoad { slot: Some(s), offset, .. } if *s == slot => {
                analyze_ref_load(table, *s, *offset);
            }
            Instr::ALoad { slot: s, offset, .. } if *s == slot => {
                analyze_ref_load(table, *s, *offset);
            }
            Instr::Invoke { method_ref, args, .. } => {
                let desc = symbols.utf8(symbols.method_ref(*method_ref).descriptor).to_string();
                let sigs = descriptor::parameter_signatures(&desc);
                for (arg, sig) in args.iter().zip(sigs.iter()) {
                    analyze_arg_or_returned(table, symbols, arg, slot, sig);
                }
            }
            Instr::BinaryOp { offset, value1, value2, .. }
            | Instr::IfCmp { offset, value1, value2, .. } => {
                analyze_binary_operator(table, symbols, *offset, value1, value2, slot);
            }
            Instr::Return { value, .. } => {
                if let Some(sig) = return_sig {
                    analyze_arg_or_returned(table, symbols, value, slot, sig);
                }
            }
            _ => {}
        }
    }
}

fn analyze_istore(
    table: &mut LocalVariables,
    symbols: &mut SymbolTable,
    slot: u16,
    offset: u32,
    value: &Instr,
) {
    let sig = value.returned_signature(symbols, table);
    let found = table.find_nearest(slot, offset);

    let Some(idx) = found else {
        // First sight of this interpretation. With no value signature the
        // width stays open; a store-of-a-load inherits the source's set.
        let bits = match &sig {
            Some(s) => IntTypeSet::from_signature(s),
            None => match value {
                Instr::ILoad { slot: ls, offset: lo, .. } => table
                    .find_at(*ls, *lo)
                    .map(|i| table.get(i).int_types)
                    .unwrap_or_else(IntTypeSet::all),
                _ => IntTypeSet::all(),
            },
        };
        table.add(
            LocalVariable::new(slot, offset, 1, None, TypeRef::UntypedNumber).with_int_types(bits),
        );
        return;
    };

    let Some(sig) = sig else {
        table.get_mut(idx).update_range(offset);
        return;
    };

    let bits = IntTypeSet::from_signature(&sig);
    match table.get(idx).type_ref {
        TypeRef::UntypedNumber => {
            if !(bits & table.get(idx).int_types).is_empty() {
                let lv = table.get_mut(idx);
                lv.int_types &= bits;
                lv.update_range(offset);
            } else {
                // Incompatible width: a fresh interpretation starts here.
                table.add(
                    LocalVariable::new(slot, offset, 1, None, TypeRef::UntypedNumber)
                        .with_int_types(bits),
                );
            }
        }
        TypeRef::Undetermined | TypeRef::ObjectConflict => {
            table.add(
                LocalVariable::new(slot, offset, 1, None, TypeRef::UntypedNumber)
                    .with_int_types(bits),
            );
        }
        TypeRef::Concrete(sym) => {
            let lv_bits = IntTypeSet::from_signature(symbols.utf8(sym));
            if !(bits & lv_bits).is_empty() {
                table.get_mut(idx).update_range(offset);
            } else {
                table.add(
                    LocalVariable::new(slot, offset, 1, None, TypeRef::UntypedNumber)
                        .with_int_types(bits),
                );
            }
        }
    }
}

fn analyze_iload(table: &mut LocalVariables, slot: u16, offset: u32) {
    match table.find_nearest(slot, offset) {
        Some(idx) => table.get_mut(idx).update_range(offset),
        None => {
            // First access is a load: the integer width cannot be decided
            // yet, every candidate stays open.
            table.add(LocalVariable::new(slot, offset, 1, None, TypeRef::UntypedNumber));
        }
    }
}

fn analyze_ref_load(table: &mut LocalVariables, slot: u16, offset: u32) {
    match table.find_nearest(slot, offset) {
        Some(idx) => table.get_mut(idx).update_range(offset),
        None => {
            table.add(LocalVariable::new(slot, offset, 1, None, TypeRef::Undetermined));
        }
    }
}

fn analyze_typed_store(table: &mut LocalVariables, slot: u16, offset: u32, signature: SymIndex) {
    match table.find_nearest(slot, offset) {
        Some(idx) if table.get(idx).type_ref == TypeRef::Concrete(signature) => {
            table.get_mut(idx).update_range(offset);
        }
        _ => {
            table.add(LocalVariable::new(slot, offset, 1, None, TypeRef::Concrete(signature)));
        }
    }
}

fn analyze_astore(
    table: &mut LocalVariables,
    symbols: &mut SymbolTable,
    slot: u16,
    offset: u32,
    value: &Instr,
) {
    let sig = value.returned_signature(symbols, table);
    let candidate = match &sig {
        Some(s) => TypeRef::Concrete(symbols.add_utf8(s)),
        None => TypeRef::Undetermined,
    };
    let is_exception_or_ret = matches!(
        value,
        Instr::ExceptionLoad { .. } | Instr::ReturnAddressLoad { .. }
    );

    let found = table.find_nearest(slot, offset);
    let isolate = match found {
        None => true,
        Some(idx) => {
            let lv = table.get(idx);
            // Exception/ret-address slots never merge with ordinary
            // stores, in either direction.
            lv.exception_or_return_address || (is_exception_or_ret && lv.end() < offset)
        }
    };

    if isolate {
        let mut lv = LocalVariable::new(slot, offset, 1, None, candidate);
        lv.exception_or_return_address = is_exception_or_ret;
        table.add(lv);
        return;
    }
    if is_exception_or_ret {
        return;
    }

    let Some(idx) = found else {
        return;
    };
    let current = table.get(idx).type_ref;
    if current == TypeRef::Undetermined {
        // A load appeared before any store (Jikes finally blocks); the
        // first store decides the type.
        let lv = table.get_mut(idx);
        lv.type_ref = candidate;
        lv.update_range(offset);
    } else if current == TypeRef::UntypedNumber {
        table.add(LocalVariable::new(slot, offset, 1, None, candidate));
    } else if current == candidate || current == TypeRef::ObjectConflict {
        table.get_mut(idx).update_range(offset);
    } else if let TypeRef::Concrete(sym) = current {
        if descriptor::is_primitive_signature(symbols.utf8(sym)) {
            table.add(LocalVariable::new(slot, offset, 1, None, candidate));
        } else {
            // Two reference types for one record: widen to Object now,
            // recover precision with casts after resolution.
            if candidate != TypeRef::Undetermined {
                table.get_mut(idx).type_ref = TypeRef::ObjectConflict;
            }
            table.get_mut(idx).update_range(offset);
        }
    }
}

fn analyze_arg_or_returned(
    table: &mut LocalVariables,
    symbols: &mut SymbolTable,
    instr: &Instr,
    slot: u16,
    sig: &str,
) {
    match instr {
        Instr::ILoad { slot: s, offset, .. } if *s == slot => {
            if let Some(idx) = table.find_nearest(*s, *offset) {
                table.get_mut(idx).int_types &= IntTypeSet::arg_or_return_set(sig);
            }
        }
        Instr::ALoad { slot: s, offset, .. } if *s == slot => {
            if let Some(idx) = table.find_nearest(*s, *offset) {
                match table.get(idx).type_ref {
                    TypeRef::Undetermined => {
                        let sym = symbols.add_utf8(sig);
                        table.get_mut(idx).type_ref = TypeRef::Concrete(sym);
                    }
                    TypeRef::UntypedNumber => {
                        warn!(slot, "numeric record where a reference was expected");
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

fn as_iload(instr: &Instr) -> Option<(u16, u32)> {
    match instr {
        Instr::ILoad { slot, offset, .. } => Some((*slot, *offset)),
        _ => None,
    }
}

fn analyze_binary_operator(
    table: &mut LocalVariables,
    symbols: &mut SymbolTable,
    op_offset: u32,
    value1: &Instr,
    value2: &Instr,
    slot: u16,
) {
    let load1 = as_iload(value1);
    let load2 = as_iload(value2);
    let relevant = load1.is_some_and(|(s, _)| s == slot) || load2.is_some_and(|(s, _)| s == slot);
    if !relevant {
        return;
    }

    let lv1 = load1.and_then(|(s, o)| table.find_nearest(s, o));
    let lv2 = load2.and_then(|(s, o)| table.find_nearest(s, o));

    if let Some(i1) = lv1 {
        table.get_mut(i1).update_range(op_offset);
        if let Some(i2) = lv2 {
            table.get_mut(i2).update_range(op_offset);
        }

        if table.get(i1).type_ref == TypeRef::UntypedNumber {
            if let Some(i2) = lv2 {
                if table.get(i2).type_ref == TypeRef::UntypedNumber {
                    let both = table.get(i1).int_types & table.get(i2).int_types;
                    table.get_mut(i1).int_types = both;
                    table.get_mut(i2).int_types = both;
                } else {
                    let other = table.get(i2).type_ref;
                    table.get_mut(i1).type_ref = other;
                }
            } else if let Some(sig) = value2.returned_signature(symbols, table) {
                if descriptor::is_integer_signature(&sig) {
                    let set = IntTypeSet::from_signature(&sig);
                    if !set.is_empty() {
                        table.get_mut(i1).int_types &= set;
                    }
                }
            }
        } else if let Some(i2) = lv2 {
            if table.get(i2).type_ref == TypeRef::UntypedNumber {
                let other = table.get(i1).type_ref;
                table.get_mut(i2).type_ref = other;
            }
        }
    } else if let Some(i2) = lv2 {
        table.get_mut(i2).update_range(op_offset);
        if table.get(i2).type_ref == TypeRef::UntypedNumber {
            if let Some(sig) = value1.returned_signature(symbols, table) {
                if descriptor::is_integer_signature(&sig) {
                    let set = IntTypeSet::from_signature(&sig);
                    if !set.is_empty() {
                        table.get_mut(i2).int_types &= set;
                    }
                }
            }
        }
    }
}

/// Flow constraints backward until a full pass changes nothing. Each step
/// either narrows a bitmask or resolves a sentinel, so the loop is
/// monotone; the pass cap is defensive only.
fn reverse_propagate(table: &mut LocalVariables, symbols: &SymbolTable, flat: &[&Instr]) {
    let max_passes = 2 * table.len() + 2;
    for _ in 0..max_passes {
        let mut change = false;
        for node in flat {
            match node {
                Instr::IStore { slot, offset, value, .. } => {
                    if let Instr::ILoad { slot: ls, offset: lo, .. } = value.as_ref() {
                        change |= reverse_istore(table, (*ls, *lo), (*slot, *offset));
                    }
                }
                Instr::PutStatic { field_ref, value, .. }
                | Instr::PutField { field_ref, value, .. } => match value.as_ref() {
                    Instr::ILoad { slot, offset, .. } | Instr::ALoad { slot, offset, .. } => {
                        change |= reverse_put(table, symbols, *field_ref, (*slot, *offset));
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        if !change {
            return;
        }
    }
    warn!("reverse propagation hit its pass cap before stabilizing");
}

fn reverse_istore(table: &mut LocalVariables, load: (u16, u32), store: (u16, u32)) -> bool {
    let Some(li) = table.find_at(load.0, load.1) else {
        return false;
    };
    if table.get(li).type_ref != TypeRef::UntypedNumber {
        return false;
    }
    let Some(si) = table.find_at(store.0, store.1) else {
        return false;
    };
    match table.get(si).type_ref {
        TypeRef::UntypedNumber => {
            let narrowed = table.get(li).int_types & table.get(si).int_types;
            let changed = narrowed != table.get(li).int_types;
            table.get_mut(li).int_types = narrowed;
            changed
        }
        TypeRef::Concrete(sym) => {
            table.get_mut(li).type_ref = TypeRef::Concrete(sym);
            true
        }
        _ => false,
    }
}

fn reverse_put(
    table: &mut LocalVariables,
    symbols: &SymbolTable,
    field_ref: u32,
    load: (u16, u32),
) -> bool {
    let Some(li) = table.find_at(load.0, load.1) else {
        return false;
    };
    let descriptor_sym = symbols.field_ref(field_ref).descriptor;
    match table.get(li).type_ref {
        TypeRef::UntypedNumber => {
            let bits = IntTypeSet::arg_or_return_set(symbols.utf8(descriptor_sym));
            let narrowed = table.get(li).int_types & bits;
            let changed = narrowed != table.get(li).int_types;
            table.get_mut(li).int_types = narrowed;
            changed
        }
        TypeRef::Undetermined => {
            table.get_mut(li).type_ref = TypeRef::Concrete(descriptor_sym);
            true
        }
        _ => false,
    }
}

// ---- Cast insertion ----

/// Wrap loads of a conflicted (Object-resolved) record with a cast to the
/// type each consuming context declares.
fn insert_casts(
    instr: &mut Instr,
    symbols: &mut SymbolTable,
    table: &LocalVariables,
    record: usize,
) {
    match instr {
        Instr::Invoke { method_ref, args, .. } => {
            let desc = symbols.utf8(symbols.method_ref(*method_ref).descriptor).to_string();
            let sigs = descriptor::parameter_signatures(&desc);
            for (arg, sig) in args.iter_mut().zip(sigs.iter()) {
                maybe_wrap_cast(arg, sig, symbols, table, record);
            }
        }
        Instr::PutField { field_ref, value, .. } | Instr::PutStatic { field_ref, value, .. } => {
            let sig = symbols.utf8(symbols.field_ref(*field_ref).descriptor).to_string();
            maybe_wrap_cast(value, &sig, symbols, table, record);
        }
        Instr::ArrayStore { array, value, .. } => {
            if let Some(array_sig) = array.returned_signature(symbols, table) {
                let element = descriptor::cut_array_dimension_prefix(&array_sig).to_string();
                maybe_wrap_cast(value, &element, symbols, table, record);
            }
        }
        _ => {}
    }
    for child in instr.children_mut() {
        insert_casts(child, symbols, table, record);
    }
}

fn maybe_wrap_cast(
    node: &mut Instr,
    expected: &str,
    symbols: &mut SymbolTable,
    table: &LocalVariables,
    record: usize,
) {
    if !expected.starts_with('L') && !expected.starts_with('[') {
        return;
    }
    if expected == descriptor::OBJECT_SIGNATURE {
        return;
    }
    let matches_record = match node {
        Instr::ALoad { slot, offset, .. } => table.find_at(*slot, *offset) == Some(record),
        _ => false,
    };
    if matches_record {
        let signature = symbols.add_utf8(expected);
        let inner = node.clone();
        *node = Instr::CheckCast {
            offset: inner.offset(),
            line: inner.line(),
            signature,
            value: Box::new(inner),
        };
    }
}

// ---- Constant literal typing ----

fn is_int_const(instr: &Instr) -> bool {
    matches!(
        instr,
        Instr::Const { value: crate::instruction::ConstValue::Int(_), .. }
    )
}

fn set_const_signature(instr: &mut Instr, sig: &str) {
    if let Instr::Const { signature, .. } = instr {
        *signature = Some(sig.to_string());
    }
}

/// Small integer literals have no intrinsic width; give each one the
/// signature its consuming context expects so emission prints it right.
fn set_constant_types(
    symbols: &SymbolTable,
    table: &LocalVariables,
    list: &mut [Instr],
    return_sig: Option<&str>,
) {
    fn apply(
        instr: &mut Instr,
        symbols: &SymbolTable,
        table: &LocalVariables,
        return_sig: Option<&str>,
    ) {
        for child in instr.children_mut() {
            apply(child, symbols, table, return_sig);
        }
        match instr {
            Instr::ArrayStore { array, value, .. } => {
                if is_int_const(value) {
                    let array_sig = match array.as_ref() {
                        Instr::ALoad { slot, offset, .. } => table
                            .find_at(*slot, *offset)
                            .and_then(|i| table.get(i).concrete_signature(symbols)),
                        Instr::GetField { field_ref, .. } | Instr::GetStatic { field_ref, .. } => {
                            Some(symbols.utf8(symbols.field_ref(*field_ref).descriptor).to_string())
                        }
                        _ => None,
                    };
                    match array_sig {
                        Some(s) => {
                            set_const_signature(value, descriptor::cut_array_dimension_prefix(&s));
                        }
                        None => warn!("array store target has no resolved element type"),
                    }
                }
            }
            Instr::BinaryOp { value1, value2, .. } | Instr::IfCmp { value1, value2, .. } => {
                if is_int_const(value1) && !is_int_const(value2) {
                    if let Some(sig) = value2.returned_signature(symbols, table) {
                        set_const_signature(value1, &sig);
                    }
                } else if is_int_const(value2) && !is_int_const(value1) {
                    if let Some(sig) = value1.returned_signature(symbols, table) {
                        set_const_signature(value2, &sig);
                    }
                }
            }
            Instr::Invoke { method_ref, args, .. } => {
                let desc = symbols.utf8(symbols.method_ref(*method_ref).descriptor).to_string();
                let sigs = descriptor::parameter_signatures(&desc);
                for (arg, sig) in args.iter_mut().zip(sigs.iter()) {
                    if is_int_const(arg) {
                        set_const_signature(arg, sig);
                    }
                }
            }
            Instr::IStore { slot, offset, value, .. } => {
                if is_int_const(value) {
                    match table
                        .find_at(*slot, *offset)
                        .and_then(|i| table.get(i).concrete_signature(symbols))
                    {
                        Some(sig) => set_const_signature(value, &sig),
                        None => warn!(slot = *slot, "istore of literal into unresolved record"),
                    }
                }
            }
            Instr::PutField { field_ref, value, .. } | Instr::PutStatic { field_ref, value, .. } => {
                if is_int_const(value) {
                    let sig = symbols.utf8(symbols.field_ref(*field_ref).descriptor).to_string();
                    set_const_signature(value, &sig);
                }
            }
            Instr::Return { value, .. } => {
                if is_int_const(value) {
                    if let Some(sig) = return_sig {
                        set_const_signature(value, sig);
                    }
                }
            }
            _ => {}
        }
    }

    for stmt in list.iter_mut() {
        apply(stmt, symbols, table, return_sig);
    }

    // Literals flowing out of one ternary branch take the type of the
    // other branch's value, located by offset.
    let mut ternary_updates: Vec<(u32, String)> = Vec::new();
    for node in instruction::flatten(list) {
        if let Instr::TernaryOpStore { offset, value, second_value_offset, .. } = node {
            if is_int_const(value) {
                if let Some(other) = instruction::find_by_offset(list, *second_value_offset) {
                    if let Some(sig) = other.returned_signature(symbols, table) {
                        ternary_updates.push((*offset, sig));
                    }
                }
            }
        }
    }
    if !ternary_updates.is_empty() {
        instruction::visit_mut(list, &mut |instr| {
            if let Instr::TernaryOpStore { offset, value, .. } = instr {
                if let Some((_, sig)) = ternary_updates.iter().find(|(o, _)| o == offset) {
                    set_const_signature(value, sig);
                }
            }
        });
    }
}

// ---- Exception load binding ----

/// Bind every exception-load to a slot: through its enclosing store when
/// there is one, otherwise (unused catch variables) through a fresh
/// synthetic record so the catch clause still displays a name.
/// Finally-duplicated loads carry no thrown type and stay unbound.
fn initialize_exception_loads(table: &mut LocalVariables, list: &mut [Instr]) {
    instruction::visit_mut(list, &mut |instr| {
        if let Instr::AStore { slot, value, .. } = instr {
            if let Instr::ExceptionLoad { slot: el_slot, .. } = value.as_mut() {
                if el_slot.is_none() {
                    *el_slot = Some(*slot);
                }
            }
        }
    });

    instruction::visit_mut(list, &mut |instr| {
        if let Instr::ExceptionLoad { offset, slot, exception_type: Some(exc), .. } = instr {
            if slot.is_none() {
                let pseudo = table.len() as u16;
                let mut lv = LocalVariable::new(pseudo, *offset, 1, None, TypeRef::Concrete(*exc));
                lv.exception_or_return_address = true;
                table.add(lv);
                *slot = Some(pseudo);
            }
        }
    });
}

// ---- Naming ----

fn signature_appears_once_in_locals(table: &LocalVariables, signature: SymIndex) -> bool {
    let mut counter = 0;
    for lv in table.iter().skip(table.index_of_first_local()) {
        if lv.type_ref == TypeRef::Concrete(signature) {
            counter += 1;
            if counter > 1 {
                return false;
            }
        }
    }
    counter == 1
}

fn generate_local_variable_names(
    table: &mut LocalVariables,
    symbols: &mut SymbolTable,
    name_gen: &mut VariableNameGenerator,
) {
    for idx in table.index_of_first_local()..table.len() {
        if table.get(idx).name.is_some() {
            continue;
        }
        let sig_sym = match table.get(idx).type_ref {
            TypeRef::Concrete(sym) => sym,
            other => {
                warn!(?other, "record left unresolved at naming time");
                continue;
            }
        };
        let sig = symbols.utf8(sig_sym).to_string();
        let appears_once = signature_appears_once_in_locals(table, sig_sym);
        let name = name_gen.generate_local_name(&sig, appears_once);
        table.get_mut(idx).name = Some(symbols.add_utf8(&name));
    }
}
