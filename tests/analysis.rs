//! End-to-end tests for the local-variable analyzer: table establishment,
//! type inference, conflict handling, monitor synthesis and naming.

use classfile_recon::analyzer::analyze;
use classfile_recon::instruction::{ConstValue, Instr, InvokeKind};
use classfile_recon::locals::{LocalVariable, LocalVariables, TypeRef};
use classfile_recon::method::{ClassAccessFlags, ClassContext, MethodAccessFlags, MethodContext};
use classfile_recon::name_gen::VariableNameGenerator;
use classfile_recon::symbols::SymbolTable;

fn test_class() -> ClassContext {
    ClassContext {
        internal_name: "com/example/Main".into(),
        access_flags: ClassAccessFlags::PUBLIC,
        is_inner_class: false,
        fields: Vec::new(),
    }
}

fn static_method(descriptor: &str, code_len: usize) -> MethodContext {
    MethodContext {
        access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        descriptor: descriptor.into(),
        signature: None,
        is_instance_constructor: false,
        code: vec![0; code_len],
        local_variables: None,
    }
}

fn iload(offset: u32, slot: u16) -> Instr {
    Instr::ILoad { offset, line: 0, slot }
}

fn aload(offset: u32, slot: u16) -> Instr {
    Instr::ALoad { offset, line: 0, slot }
}

fn int_const(offset: u32, v: i32) -> Instr {
    Instr::Const { offset, line: 0, value: ConstValue::Int(v), signature: None }
}

fn new_instance(symbols: &mut SymbolTable, offset: u32, class: &str) -> Instr {
    let ctor = symbols.add_method_ref(class, "<init>", "()V");
    Instr::Invoke {
        offset,
        line: 0,
        kind: InvokeKind::New,
        method_ref: ctor,
        object: None,
        args: Vec::new(),
    }
}

fn signature_of(table: &LocalVariables, symbols: &SymbolTable, idx: usize) -> String {
    table.get(idx).concrete_signature(symbols).expect("record should be resolved")
}

fn name_of(table: &LocalVariables, symbols: &SymbolTable, idx: usize) -> String {
    symbols.utf8(table.get(idx).name.expect("record should be named")).to_string()
}

#[test]
fn test_static_method_parameter_record() {
    let class = test_class();
    let mut method = static_method("(I)V", 8);
    let mut symbols = SymbolTable::new();
    let mut names = VariableNameGenerator::new();
    let mut list = vec![Instr::ReturnVoid { offset: 0, line: 0 }];

    analyze(&class, &mut method, &mut symbols, &mut names, &mut list);

    let table = method.local_variables.as_ref().unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.index_of_first_local(), 1);
    let lv = table.get(0);
    assert_eq!(lv.slot, 0);
    assert_eq!((lv.start, lv.length), (0, 8));
    assert_eq!(signature_of(table, &symbols, 0), "I");
    assert_eq!(name_of(table, &symbols, 0), "paramInt");
}

#[test]
fn test_instance_method_gets_this() {
    let class = test_class();
    let mut method = static_method("(J)V", 6);
    method.access_flags = MethodAccessFlags::PUBLIC;
    let mut symbols = SymbolTable::new();
    let mut names = VariableNameGenerator::new();
    let mut list = vec![Instr::ReturnVoid { offset: 0, line: 0 }];

    analyze(&class, &mut method, &mut symbols, &mut names, &mut list);

    let table = method.local_variables.as_ref().unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(signature_of(table, &symbols, 0), "Lcom/example/Main;");
    assert_eq!(name_of(table, &symbols, 0), "this");
    // Long parameter sits after the receiver.
    assert_eq!(table.get(1).slot, 1);
    assert_eq!(signature_of(table, &symbols, 1), "J");
}

#[test]
fn test_persisted_table_is_completed_from_descriptor() {
    let class = test_class();
    let mut method = static_method("(J)V", 6);
    method.local_variables = Some(LocalVariables::new());
    let mut symbols = SymbolTable::new();
    let mut names = VariableNameGenerator::new();
    let mut list = vec![Instr::ReturnVoid { offset: 0, line: 0 }];

    analyze(&class, &mut method, &mut symbols, &mut names, &mut list);

    let table = method.local_variables.as_ref().unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.index_of_first_local(), 1);
    assert_eq!(signature_of(table, &symbols, 0), "J");
    assert_eq!(name_of(table, &symbols, 0), "paramLong");
}

#[test]
fn test_persisted_scope_is_repaired_from_slot_accesses() {
    let class = test_class();
    let mut method = static_method("()V", 10);
    // iconst_1; istore_0; iload_0; ...; iload_0; putstatic
    let mut code = vec![0u8; 10];
    code[0] = 0x04;
    code[1] = 0x3b;
    code[2] = 0x1a;
    code[5] = 0x1a;
    code[6] = 0xb3;
    method.code = code;

    let mut symbols = SymbolTable::new();
    let mut names = VariableNameGenerator::new();
    let name = symbols.add_utf8("count");
    let int_sig = symbols.add_utf8("I");
    // Scope marked one instruction after the store and over-extended past
    // the end of the code, the way debug tables come in.
    let mut persisted = LocalVariables::new();
    persisted.add(LocalVariable::new(0, 2, 40, Some(name), TypeRef::Concrete(int_sig)));
    method.local_variables = Some(persisted);

    let counter = symbols.add_field_ref("com/example/Main", "counter", "I");
    let mut list = vec![
        Instr::IStore { offset: 1, line: 0, slot: 0, value: Box::new(int_const(0, 7)) },
        Instr::PutStatic { offset: 6, line: 0, field_ref: counter, value: Box::new(iload(5, 0)) },
    ];

    analyze(&class, &mut method, &mut symbols, &mut names, &mut list);

    let table = method.local_variables.as_ref().unwrap();
    assert_eq!(table.len(), 1);
    let lv = table.get(0);
    // Widened backward to the store through the next-offset retry.
    assert_eq!(lv.start, 1);
    // Over-extension reset, then widened forward only to the last use.
    assert_eq!(lv.end(), 6);
    assert_eq!(name_of(table, &symbols, 0), "count");
    assert_eq!(signature_of(table, &symbols, 0), "I");
}

#[test]
fn test_untyped_number_pinned_by_argument_context() {
    let class = test_class();
    let mut method = static_method("()V", 10);
    let mut symbols = SymbolTable::new();
    let mut names = VariableNameGenerator::new();
    let check = symbols.add_method_ref("com/example/Main", "check", "(Z)V");
    let mut list = vec![
        Instr::IStore { offset: 1, line: 0, slot: 0, value: Box::new(int_const(0, 1)) },
        Instr::Invoke {
            offset: 4,
            line: 0,
            kind: InvokeKind::Static,
            method_ref: check,
            object: None,
            args: vec![iload(3, 0)],
        },
    ];

    analyze(&class, &mut method, &mut symbols, &mut names, &mut list);

    let table = method.local_variables.as_ref().unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(signature_of(table, &symbols, 0), "Z");
    assert_eq!(name_of(table, &symbols, 0), "bool");
    // The literal takes the width of the slot it initializes.
    let Instr::IStore { value, .. } = &list[0] else { panic!() };
    let Instr::Const { signature, .. } = value.as_ref() else { panic!() };
    assert_eq!(signature.as_deref(), Some("Z"));
}

#[test]
fn test_reverse_propagation_through_store_chain() {
    let class = test_class();
    let mut method = static_method("()V", 12);
    let mut symbols = SymbolTable::new();
    let mut names = VariableNameGenerator::new();
    let flag = symbols.add_field_ref("com/example/Main", "flag", "Z");
    let mut list = vec![
        Instr::IStore { offset: 1, line: 0, slot: 0, value: Box::new(int_const(0, 1)) },
        Instr::IStore { offset: 3, line: 0, slot: 1, value: Box::new(iload(2, 0)) },
        Instr::PutStatic { offset: 5, line: 0, field_ref: flag, value: Box::new(iload(4, 1)) },
    ];

    analyze(&class, &mut method, &mut symbols, &mut names, &mut list);

    let table = method.local_variables.as_ref().unwrap();
    assert_eq!(table.len(), 2);
    // The boolean constraint on slot 1 reaches slot 0 through the copy.
    assert_eq!(signature_of(table, &symbols, 0), "Z");
    assert_eq!(signature_of(table, &symbols, 1), "Z");
}

#[test]
fn test_reference_conflict_resolves_to_object_with_cast() {
    let class = test_class();
    let mut method = static_method("()V", 10);
    let mut symbols = SymbolTable::new();
    let mut names = VariableNameGenerator::new();
    let sb = new_instance(&mut symbols, 0, "java/lang/StringBuilder");
    let al = new_instance(&mut symbols, 2, "java/util/ArrayList");
    let take = symbols.add_method_ref("com/example/Main", "take", "(Ljava/util/List;)V");
    let mut list = vec![
        Instr::AStore { offset: 1, line: 0, slot: 0, value: Box::new(sb) },
        Instr::AStore { offset: 3, line: 0, slot: 0, value: Box::new(al) },
        Instr::Invoke {
            offset: 5,
            line: 0,
            kind: InvokeKind::Static,
            method_ref: take,
            object: None,
            args: vec![aload(4, 0)],
        },
    ];

    analyze(&class, &mut method, &mut symbols, &mut names, &mut list);

    let table = method.local_variables.as_ref().unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(signature_of(table, &symbols, 0), "Ljava/lang/Object;");
    assert_eq!(name_of(table, &symbols, 0), "localObject");

    let Instr::Invoke { args, .. } = &list[2] else { panic!() };
    let Instr::CheckCast { signature, value, .. } = &args[0] else {
        panic!("expected the conflicted load to be cast");
    };
    assert_eq!(symbols.utf8(*signature), "Ljava/util/List;");
    assert!(matches!(value.as_ref(), Instr::ALoad { slot: 0, .. }));
}

#[test]
fn test_slot_reuse_yields_disjoint_records() {
    let class = test_class();
    let mut method = static_method("()V", 10);
    let mut symbols = SymbolTable::new();
    let mut names = VariableNameGenerator::new();
    let sb = new_instance(&mut symbols, 2, "java/lang/StringBuilder");
    let mut list = vec![
        Instr::IStore { offset: 1, line: 0, slot: 0, value: Box::new(int_const(0, 7)) },
        Instr::AStore { offset: 3, line: 0, slot: 0, value: Box::new(sb) },
    ];

    analyze(&class, &mut method, &mut symbols, &mut names, &mut list);

    let table = method.local_variables.as_ref().unwrap();
    assert_eq!(table.len(), 2);
    let first = table.get(0);
    let second = table.get(1);
    assert_eq!(first.slot, second.slot);
    assert!(first.end() <= second.start || second.end() <= first.start);
    assert_eq!(signature_of(table, &symbols, 0), "I");
    assert_eq!(signature_of(table, &symbols, 1), "Ljava/lang/StringBuilder;");
    assert_ne!(name_of(table, &symbols, 0), name_of(table, &symbols, 1));
}

fn monitor_list(symbols: &mut SymbolTable, exits: &[u32]) -> Vec<Instr> {
    let mut list = vec![
        Instr::AStore {
            offset: 1,
            line: 0,
            slot: 2,
            value: Box::new(new_instance(symbols, 0, "java/lang/StringBuilder")),
        },
        Instr::MonitorEnter { offset: 2, line: 0, object: Box::new(aload(2, 2)) },
    ];
    for &offset in exits {
        list.push(Instr::MonitorExit { offset, line: 0, object: Box::new(aload(offset, 2)) });
    }
    list
}

#[test]
fn test_monitor_variable_synthesized_for_two_exits() {
    let class = test_class();
    let mut method = static_method("()V", 16);
    let mut symbols = SymbolTable::new();
    let mut names = VariableNameGenerator::new();
    let mut list = monitor_list(&mut symbols, &[8, 12]);

    analyze(&class, &mut method, &mut symbols, &mut names, &mut list);

    let table = method.local_variables.as_ref().unwrap();
    assert_eq!(table.len(), 1);
    let lv = table.get(0);
    assert_eq!(lv.slot, 2);
    assert_eq!(lv.start, 1);
    assert!(lv.contains(12));
    assert_eq!(signature_of(table, &symbols, 0), "Ljava/lang/Object;");
}

#[test]
fn test_monitor_variable_synthesized_for_dup_store_shape() {
    let class = test_class();
    let mut method = static_method("()V", 16);
    let mut symbols = SymbolTable::new();
    let mut names = VariableNameGenerator::new();
    let mut list = vec![
        Instr::DupStore { offset: 1, line: 0, value: Box::new(aload(0, 2)) },
        Instr::AStore {
            offset: 3,
            line: 0,
            slot: 3,
            value: Box::new(Instr::DupLoad { offset: 2, line: 0, dup_store_offset: 1 }),
        },
        Instr::MonitorEnter {
            offset: 4,
            line: 0,
            object: Box::new(Instr::DupLoad { offset: 4, line: 0, dup_store_offset: 1 }),
        },
        Instr::MonitorExit { offset: 8, line: 0, object: Box::new(aload(8, 3)) },
        Instr::MonitorExit { offset: 12, line: 0, object: Box::new(aload(12, 3)) },
    ];

    analyze(&class, &mut method, &mut symbols, &mut names, &mut list);

    let table = method.local_variables.as_ref().unwrap();
    let idx = table
        .find_at(3, 3)
        .expect("monitor record for slot 3 should exist");
    let lv = table.get(idx);
    assert_eq!(signature_of(table, &symbols, idx), "Ljava/lang/Object;");
    assert!(lv.contains(8) && lv.contains(12));
}

#[test]
fn test_single_exit_monitor_is_not_synthesized() {
    let class = test_class();
    let mut method = static_method("()V", 16);
    let mut symbols = SymbolTable::new();
    let mut names = VariableNameGenerator::new();
    let mut list = monitor_list(&mut symbols, &[8]);

    analyze(&class, &mut method, &mut symbols, &mut names, &mut list);

    // Inconclusive pairing: the slot is typed by ordinary inference from
    // the store instead.
    let table = method.local_variables.as_ref().unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(signature_of(table, &symbols, 0), "Ljava/lang/StringBuilder;");
}

#[test]
fn test_exit_before_enter_completes_monitor_pairing() {
    let class = test_class();
    let mut method = static_method("()V", 16);
    let mut symbols = SymbolTable::new();
    let mut names = VariableNameGenerator::new();
    // Jikes 1.22 emits the exceptional exit ahead of the enter; the single
    // forward exit triggers the backward rescan.
    let mut list = vec![
        Instr::MonitorExit { offset: 0, line: 0, object: Box::new(aload(0, 2)) },
        Instr::AStore {
            offset: 1,
            line: 0,
            slot: 2,
            value: Box::new(new_instance(&mut symbols, 0, "java/lang/StringBuilder")),
        },
        Instr::MonitorEnter { offset: 2, line: 0, object: Box::new(aload(2, 2)) },
        Instr::MonitorExit { offset: 8, line: 0, object: Box::new(aload(8, 2)) },
    ];

    analyze(&class, &mut method, &mut symbols, &mut names, &mut list);

    let table = method.local_variables.as_ref().unwrap();
    assert_eq!(table.len(), 1);
    let lv = table.get(0);
    assert_eq!(lv.slot, 2);
    assert_eq!(lv.start, 0);
    assert!(lv.contains(8));
    assert_eq!(signature_of(table, &symbols, 0), "Ljava/lang/Object;");
}

#[test]
fn test_unused_catch_variable_gets_synthetic_record() {
    let class = test_class();
    let mut method = static_method("()V", 8);
    let mut symbols = SymbolTable::new();
    let mut names = VariableNameGenerator::new();
    let exc = symbols.add_utf8("Ljava/lang/IllegalStateException;");
    let mut list = vec![Instr::AThrow {
        offset: 4,
        line: 0,
        value: Box::new(Instr::ExceptionLoad {
            offset: 3,
            line: 0,
            slot: None,
            exception_type: Some(exc),
        }),
    }];

    analyze(&class, &mut method, &mut symbols, &mut names, &mut list);

    let table = method.local_variables.as_ref().unwrap();
    assert_eq!(table.len(), 1);
    let lv = table.get(0);
    assert!(lv.exception_or_return_address);
    assert_eq!(signature_of(table, &symbols, 0), "Ljava/lang/IllegalStateException;");
    assert_eq!(name_of(table, &symbols, 0), "localIllegalStateException");

    let Instr::AThrow { value, .. } = &list[0] else { panic!() };
    let Instr::ExceptionLoad { slot: Some(slot), .. } = value.as_ref() else {
        panic!("load should be bound to the synthesized record");
    };
    assert_eq!(*slot, lv.slot);
}

#[test]
fn test_stored_exception_load_binds_to_store_slot() {
    let class = test_class();
    let mut method = static_method("()V", 8);
    let mut symbols = SymbolTable::new();
    let mut names = VariableNameGenerator::new();
    let exc = symbols.add_utf8("Ljava/io/IOException;");
    let mut list = vec![Instr::AStore {
        offset: 2,
        line: 0,
        slot: 3,
        value: Box::new(Instr::ExceptionLoad {
            offset: 1,
            line: 0,
            slot: None,
            exception_type: Some(exc),
        }),
    }];

    analyze(&class, &mut method, &mut symbols, &mut names, &mut list);

    let table = method.local_variables.as_ref().unwrap();
    assert_eq!(table.len(), 1);
    assert!(table.get(0).exception_or_return_address);
    assert_eq!(table.get(0).slot, 3);

    let Instr::AStore { value, .. } = &list[0] else { panic!() };
    assert!(matches!(value.as_ref(), Instr::ExceptionLoad { slot: Some(3), .. }));
}

#[test]
fn test_analysis_is_idempotent() {
    let class = test_class();
    let mut method = static_method("()V", 10);
    let mut symbols = SymbolTable::new();
    let mut names = VariableNameGenerator::new();
    let sb = new_instance(&mut symbols, 0, "java/lang/StringBuilder");
    let al = new_instance(&mut symbols, 2, "java/util/ArrayList");
    let take = symbols.add_method_ref("com/example/Main", "take", "(Ljava/util/List;)V");
    let mut list = vec![
        Instr::AStore { offset: 1, line: 0, slot: 0, value: Box::new(sb) },
        Instr::AStore { offset: 3, line: 0, slot: 0, value: Box::new(al) },
        Instr::Invoke {
            offset: 5,
            line: 0,
            kind: InvokeKind::Static,
            method_ref: take,
            object: None,
            args: vec![aload(4, 0)],
        },
    ];

    analyze(&class, &mut method, &mut symbols, &mut names, &mut list);
    let len_after_first = method.local_variables.as_ref().unwrap().len();
    let sig_after_first = signature_of(method.local_variables.as_ref().unwrap(), &symbols, 0);

    analyze(&class, &mut method, &mut symbols, &mut names, &mut list);

    let table = method.local_variables.as_ref().unwrap();
    assert_eq!(table.len(), len_after_first);
    assert_eq!(signature_of(table, &symbols, 0), sig_after_first);

    // Still exactly one cast around the conflicted load.
    let mut casts = 0;
    for node in classfile_recon::instruction::flatten(&list) {
        if matches!(node, Instr::CheckCast { .. }) {
            casts += 1;
        }
    }
    assert_eq!(casts, 1);
}
