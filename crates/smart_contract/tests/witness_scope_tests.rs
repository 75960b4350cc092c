//! Witness scope behavior across contract-call depth.
//!
//! Two contracts are deployed through ContractManagement; the entry
//! script calls A, and A calls B. A signer with CalledByEntry scope
//! covers code the entry calls directly, but not code reached one call
//! deeper.

use neo3_config::ProtocolSettings;
use neo3_core::{Signer, Transaction, UInt160, WitnessScope};
use neo3_persistence::{MemoryStore, Snapshot, SnapshotHandle};
use neo3_io::SerializableExt;
use neo3_smart_contract::manifest::{ContractAbi, ContractManifest, MethodDescriptor};
use neo3_smart_contract::{
    ApplicationEngine, Container, Contract, NativeRegistry, NefFile, TriggerType,
};
use neo3_vm::{CallFlags, OpCode, ScriptBuilder, VMState};
use std::sync::Arc;

struct Fixture {
    snapshot: SnapshotHandle,
    settings: Arc<ProtocolSettings>,
    natives: Arc<NativeRegistry>,
    tx: Arc<Transaction>,
    sender: UInt160,
}

impl Fixture {
    fn new() -> Self {
        let snapshot = Snapshot::on_store(Arc::new(MemoryStore::new())).into_handle();
        let settings = Arc::new(ProtocolSettings::private_net());
        let natives = Arc::new(NativeRegistry::new());
        let sender = UInt160::from_bytes(&[0xAA; 20]).unwrap();
        let mut tx = Transaction::new();
        tx.valid_until_block = 100;
        tx.script = vec![OpCode::PUSH1 as u8];
        tx.signers = vec![Signer::new(sender, WitnessScope::CALLED_BY_ENTRY)];
        tx.witnesses = vec![Default::default()];
        Self {
            snapshot,
            settings,
            natives,
            tx: Arc::new(tx),
            sender,
        }
    }

    fn engine(&self) -> ApplicationEngine {
        ApplicationEngine::create(
            TriggerType::Application,
            Some(Container::Transaction(self.tx.clone())),
            self.snapshot.clone(),
            None,
            self.settings.clone(),
            self.natives.clone(),
            -1,
        )
        .unwrap()
    }

    /// Deploys through the real ContractManagement.deploy path and
    /// returns the deterministic contract hash.
    fn deploy(&self, name: &str, script: Vec<u8>, methods: Vec<MethodDescriptor>) -> UInt160 {
        let nef = NefFile::new("neo3-rs-test", script).unwrap();
        let manifest = ContractManifest {
            name: name.to_string(),
            abi: ContractAbi {
                methods,
                events: Vec::new(),
            },
            ..Default::default()
        };
        let manifest_bytes = serde_json::to_vec(&manifest).unwrap();
        let management = self.natives.by_name("ContractManagement").unwrap().hash();

        let mut builder = ScriptBuilder::new();
        builder.emit_push_null();
        builder.emit_push_bytes(&manifest_bytes).unwrap();
        builder.emit_push_bytes(&nef.to_array().unwrap()).unwrap();
        builder.emit_push_i64(3);
        builder.emit(OpCode::PACK);
        builder.emit_push_i64(CallFlags::ALL.bits() as i64);
        builder.emit_push_string("deploy").unwrap();
        builder.emit_push_bytes(management.as_bytes()).unwrap();
        builder.emit_syscall("System.Contract.Call");

        let mut engine = self.engine();
        engine.load_script(builder.to_array(), CallFlags::ALL).unwrap();
        assert_eq!(
            engine.execute(),
            VMState::HALT,
            "deploy faulted: {:?}",
            engine.fault_message()
        );
        Contract::contract_hash(&self.sender, nef.checksum, name)
    }

    /// Calls `method` on `contract` from a fresh entry script and
    /// returns the boolean result.
    fn call_bool(&self, contract: &UInt160, method: &str) -> bool {
        let mut builder = ScriptBuilder::new();
        builder.emit(OpCode::NEWARRAY0);
        builder.emit_push_i64(CallFlags::ALL.bits() as i64);
        builder.emit_push_string(method).unwrap();
        builder.emit_push_bytes(contract.as_bytes()).unwrap();
        builder.emit_syscall("System.Contract.Call");

        let mut engine = self.engine();
        engine.load_script(builder.to_array(), CallFlags::ALL).unwrap();
        assert_eq!(
            engine.execute(),
            VMState::HALT,
            "call faulted: {:?}",
            engine.fault_message()
        );
        engine.result_stack()[0].as_bool().unwrap()
    }
}

fn method(name: &str, offset: usize) -> MethodDescriptor {
    MethodDescriptor {
        name: name.to_string(),
        parameters: Vec::new(),
        offset,
        return_type: "Boolean".to_string(),
        safe: false,
    }
}

/// A script fragment that checks the fixture signer's witness.
fn check_witness_fragment(builder: &mut ScriptBuilder, account: &UInt160) {
    builder.emit_push_bytes(account.as_bytes()).unwrap();
    builder.emit_syscall("System.Runtime.CheckWitness");
    builder.emit(OpCode::RET);
}

#[test]
fn called_by_entry_covers_depth_one_only() {
    let fixture = Fixture::new();

    // Contract B: check() asks for the signer's witness.
    let mut script_b = ScriptBuilder::new();
    check_witness_fragment(&mut script_b, &fixture.sender);
    let contract_b = fixture.deploy(
        "contract-b",
        script_b.to_array(),
        vec![method("check", 0)],
    );

    // Contract A: direct() checks the witness itself; indirect()
    // forwards to B.check().
    let mut script_a = ScriptBuilder::new();
    check_witness_fragment(&mut script_a, &fixture.sender);
    let indirect_offset = script_a.len();
    script_a.emit(OpCode::NEWARRAY0);
    script_a.emit_push_i64(CallFlags::ALL.bits() as i64);
    script_a.emit_push_string("check").unwrap();
    script_a.emit_push_bytes(contract_b.as_bytes()).unwrap();
    script_a.emit_syscall("System.Contract.Call");
    script_a.emit(OpCode::RET);
    let contract_a = fixture.deploy(
        "contract-a",
        script_a.to_array(),
        vec![method("direct", 0), method("indirect", indirect_offset)],
    );

    // Depth one from the entry: the CalledByEntry scope covers it.
    assert!(fixture.call_bool(&contract_a, "direct"));

    // Depth two: B is reached through A, so the scope does not cover.
    assert!(!fixture.call_bool(&contract_a, "indirect"));

    // B called directly from the entry is depth one again.
    assert!(fixture.call_bool(&contract_b, "check"));
}

#[test]
fn global_scope_covers_any_depth() {
    let mut fixture = Fixture::new();
    let mut tx = (*fixture.tx).clone();
    tx.signers = vec![Signer::new(fixture.sender, WitnessScope::GLOBAL)];
    fixture.tx = Arc::new(tx);

    let mut script_b = ScriptBuilder::new();
    check_witness_fragment(&mut script_b, &fixture.sender);
    let contract_b = fixture.deploy(
        "global-b",
        script_b.to_array(),
        vec![method("check", 0)],
    );

    let mut script_a = ScriptBuilder::new();
    script_a.emit(OpCode::NEWARRAY0);
    script_a.emit_push_i64(CallFlags::ALL.bits() as i64);
    script_a.emit_push_string("check").unwrap();
    script_a.emit_push_bytes(contract_b.as_bytes()).unwrap();
    script_a.emit_syscall("System.Contract.Call");
    script_a.emit(OpCode::RET);
    let contract_a = fixture.deploy(
        "global-a",
        script_a.to_array(),
        vec![method("forward", 0)],
    );

    assert!(fixture.call_bool(&contract_a, "forward"));
}
