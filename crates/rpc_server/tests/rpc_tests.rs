//! RPC method tests against an in-memory chain.

use neo3_config::{ProtocolSettings, RpcServerConfig};
use neo3_ledger::{Blockchain, Mempool};
use neo3_persistence::MemoryStore;
use neo3_rpc_server::{NoNetwork, RpcMethods};
use neo3_smart_contract::NativeRegistry;
use serde_json::{json, Value};
use std::sync::Arc;

fn methods() -> (RpcMethods, Arc<Blockchain>) {
    let settings = Arc::new(ProtocolSettings::private_net());
    let store = Arc::new(MemoryStore::new());
    let natives = Arc::new(NativeRegistry::new());
    let mempool = Arc::new(Mempool::new(100));
    let chain = Arc::new(
        Blockchain::new(settings, store, natives, mempool).expect("genesis must persist"),
    );
    (
        RpcMethods::new(chain.clone(), Arc::new(NoNetwork), RpcServerConfig::default()),
        chain,
    )
}

#[test]
fn block_count_is_height_plus_one() {
    let (methods, chain) = methods();
    assert_eq!(chain.height(), 0);
    let count = methods.handle("getblockcount", &[]).unwrap();
    assert_eq!(count, json!(1));
}

#[test]
fn best_block_hash_matches_the_chain_tip() {
    let (methods, chain) = methods();
    let hash = methods.handle("getbestblockhash", &[]).unwrap();
    assert_eq!(hash, json!(chain.best_block_hash().to_hex()));
}

#[test]
fn genesis_is_returned_verbose_and_raw() {
    let (methods, chain) = methods();
    let verbose = methods
        .handle("getblock", &[json!(0), json!(true)])
        .unwrap();
    assert_eq!(verbose["index"], 0);
    assert_eq!(verbose["hash"], chain.best_block_hash().to_hex());
    assert_eq!(verbose["confirmations"], 1);

    let raw = methods.handle("getblock", &[json!(0)]).unwrap();
    assert!(raw.is_string(), "non-verbose form is base64");
}

#[test]
fn unknown_block_uses_the_unknown_range() {
    let (methods, _) = methods();
    let error = methods.handle("getblock", &[json!(42)]).unwrap_err();
    assert_eq!(error.code, -100);
}

#[test]
fn unknown_method_is_reported() {
    let (methods, _) = methods();
    let error = methods.handle("definitelynotamethod", &[]).unwrap_err();
    assert_eq!(error.code, -32601);
}

#[test]
fn invokescript_runs_simple_arithmetic() {
    let (methods, _) = methods();
    // PUSH1 PUSH2 ADD
    let script = base64_encode(&[0x11, 0x12, 0x9E]);
    let result = methods
        .handle("invokescript", &[json!(script)])
        .unwrap();
    assert_eq!(result["state"], "HALT");
    assert!(result["exception"].is_null());
    let stack = result["stack"].as_array().unwrap();
    assert_eq!(stack.len(), 1);
    assert_eq!(stack[0]["type"], "Integer");
    assert_eq!(stack[0]["value"], "3");
    let gas: i64 = result["gasconsumed"].as_str().unwrap().parse().unwrap();
    assert!(gas > 0 && gas <= 20_00000000);
}

#[test]
fn invokescript_reports_faults_with_the_exception() {
    let (methods, _) = methods();
    // PUSH1 THROW
    let script = base64_encode(&[0x11, 0x3A]);
    let result = methods.handle("invokescript", &[json!(script)]).unwrap();
    assert_eq!(result["state"], "FAULT");
    assert!(!result["exception"].is_null());
}

#[test]
fn invokefunction_reaches_native_contracts() {
    let (methods, chain) = methods();
    let gas_hash = chain
        .natives()
        .by_name("GasToken")
        .unwrap()
        .hash()
        .to_hex();
    let result = methods
        .handle(
            "invokefunction",
            &[json!(gas_hash), json!("symbol"), json!([])],
        )
        .unwrap();
    assert_eq!(result["state"], "HALT");
    let stack = result["stack"].as_array().unwrap();
    let symbol = stack[0]["value"].as_str().unwrap();
    assert_eq!(base64_decode(symbol), b"GAS");
}

#[test]
fn native_contracts_enumerate_all_nine() {
    let (methods, _) = methods();
    let natives = methods.handle("getnativecontracts", &[]).unwrap();
    let list = natives.as_array().unwrap();
    assert_eq!(list.len(), 9);
    assert!(list.iter().any(|entry| entry["name"] == "GasToken"));
    assert!(list.iter().all(|entry| entry["id"].as_i64().unwrap() < 0));
}

#[test]
fn committee_and_validators_come_from_the_neo_native() {
    let (methods, chain) = methods();
    let committee = methods.handle("getcommittee", &[]).unwrap();
    assert_eq!(
        committee.as_array().unwrap().len(),
        chain.settings().standby_committee.len()
    );
    let validators = methods.handle("getnextblockvalidators", &[]).unwrap();
    assert_eq!(
        validators.as_array().unwrap().len(),
        chain.settings().validators_count as usize
    );
}

#[test]
fn storage_reads_hit_native_state() {
    let (methods, _) = methods();
    // GAS total supply lives under prefix 11 of contract -6.
    let key = base64_encode(&[11]);
    let value = methods
        .handle("getstorage", &[json!(-6), json!(key)])
        .unwrap();
    assert!(value.is_string());

    let found = methods
        .handle("findstorage", &[json!(-6), json!(base64_encode(&[]))])
        .unwrap();
    assert!(!found["results"].as_array().unwrap().is_empty());
}

#[test]
fn validateaddress_distinguishes_forms() {
    let (methods, chain) = methods();
    let version = chain.settings().address_version;
    let good = neo3_core::UInt160::zero().to_address(version);
    let result = methods
        .handle("validateaddress", &[json!(good)])
        .unwrap();
    assert_eq!(result["isvalid"], true);
    let result = methods
        .handle("validateaddress", &[json!("not-an-address")])
        .unwrap();
    assert_eq!(result["isvalid"], false);
}

#[test]
fn sendrawtransaction_rejects_garbage() {
    let (methods, _) = methods();
    assert!(methods
        .handle("sendrawtransaction", &[json!("%%%")])
        .is_err());
    let empty = methods.handle("getrawmempool", &[]).unwrap();
    assert_eq!(empty, Value::Array(vec![]));
}

#[test]
fn unknown_session_traversal_fails_cleanly() {
    let (methods, _) = methods();
    let error = methods
        .handle(
            "traverseiterator",
            &[json!("no-such"), json!("nope"), json!(10)],
        )
        .unwrap_err();
    assert_eq!(error.code, -105);
}

fn base64_encode(data: &[u8]) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.encode(data)
}

fn base64_decode(text: &str) -> Vec<u8> {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.decode(text).unwrap()
}
