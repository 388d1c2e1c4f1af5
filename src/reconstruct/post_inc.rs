//! Post-increment reconstruction.
//!
//! `i++` compiles to a duplication of the old value, a store of the old
//! value plus one, and uses of the duplicate:
//!
//! ```text
//! DupStore( load )
//! ...
//! store-or-put( DupLoad +/- 1 )
//! ...
//! consumer( DupLoad )
//! ```
//!
//! The pass collapses the triple into a `PostInc` placed at every former
//! `DupLoad` use site. Both slot and field targets are handled; the
//! counter value is accepted through an intervening numeric conversion.

use crate::instruction::{self, Instr};

pub fn reconstruct(list: &mut Vec<Instr>) {
    let mut i = 0;
    'scan: while i < list.len() {
        let (dup_store_offset, target) = match &list[i] {
            Instr::DupStore { offset, value, .. } => (*offset, (**value).clone()),
            _ => {
                i += 1;
                continue;
            }
        };

        for j in i + 1..list.len() {
            let Some(stored) = counter_store_value(&target, &list[j]) else {
                continue;
            };
            let inner = unwrap_convert(stored);
            let Instr::BinaryOp { offset, line, operator, value1, value2, .. } = inner else {
                continue;
            };
            let dup_matches = matches!(
                value1.as_ref(),
                Instr::DupLoad { dup_store_offset: d, .. } if *d == dup_store_offset
            );
            let one = matches!(value2.as_ref(), Instr::Const { value, .. } if value.is_one());
            if !dup_matches || !one {
                continue;
            }
            let amount = match operator.as_str() {
                "+" => 1,
                "-" => -1,
                _ => continue,
            };

            let inc = Instr::PostInc {
                offset: *offset,
                line: *line,
                value: Box::new(target.clone()),
                amount,
            };
            for stmt in list[j + 1..].iter_mut() {
                instruction::replace_dup_load(stmt, dup_store_offset, &inc);
            }
            list.remove(j);
            list.remove(i);
            // The statement now at `i` has not been examined yet.
            continue 'scan;
        }
        i += 1;
    }
}

/// The value stored by `stmt`, provided its target is the same slot or
/// field the duplicated load read from.
fn counter_store_value<'a>(target: &Instr, stmt: &'a Instr) -> Option<&'a Instr> {
    match (stmt, target) {
        (Instr::IStore { slot, value, .. }, Instr::ILoad { slot: t, .. }) if slot == t => {
            Some(value)
        }
        (Instr::TypedStore { slot, value, .. }, Instr::TypedLoad { slot: t, .. }) if slot == t => {
            Some(value)
        }
        (Instr::AStore { slot, value, .. }, Instr::ALoad { slot: t, .. }) if slot == t => {
            Some(value)
        }
        (Instr::PutField { field_ref, value, .. }, Instr::GetField { field_ref: t, .. })
            if field_ref == t =>
        {
            Some(value)
        }
        (Instr::PutStatic { field_ref, value, .. }, Instr::GetStatic { field_ref: t, .. })
            if field_ref == t =>
        {
            Some(value)
        }
        _ => None,
    }
}

fn unwrap_convert(instr: &Instr) -> &Instr {
    match instr {
        Instr::Convert { value, .. } => value,
        _ => instr,
    }
}
