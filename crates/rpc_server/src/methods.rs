// Copyright (C) 2015-2025 The Neo Project.
//
// methods.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The RPC method surface.
//!
//! Every read opens a fresh snapshot of the committed store, so a
//! response is internally consistent no matter what the import thread
//! does concurrently. Test invocations run on such a snapshot too and
//! never touch durable state.

use crate::error_codes;
use crate::session::IteratorSessions;
use crate::types::RpcError;
use base64::Engine as _;
use neo3_config::RpcServerConfig;
use neo3_core::{Block, Header, Signer, Transaction, UInt160, UInt256, Witness, WitnessScope};
use neo3_io::{Serializable, SerializableExt};
use neo3_ledger::{Blockchain, VerifyResult};
use neo3_persistence::StorageKey;
use neo3_smart_contract::interop::storage::StorageIterator;
use neo3_smart_contract::native::{contract_management, neo_token};
use neo3_smart_contract::{
    stack_item_to_json, ApplicationEngine, Container, TriggerType,
};
use neo3_vm::{CallFlags, OpCode, ScriptBuilder, StackItem, VMState};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::net::SocketAddr;
use std::sync::Arc;

/// Gas budget for invokefunction/invokescript, in datoshi.
const TEST_INVOKE_GAS: i64 = 20_00000000;
/// Depth cap when rendering stack items.
const JSON_DEPTH: usize = 16;

/// What the RPC layer may ask the P2P layer.
pub trait NetworkInfo: Send + Sync {
    fn connection_count(&self) -> usize {
        0
    }
    fn peers(&self) -> Vec<(SocketAddr, String, u32)> {
        Vec::new()
    }
}

/// Stand-in when the node runs without networking (tests, tools).
pub struct NoNetwork;

impl NetworkInfo for NoNetwork {}

fn b64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

fn from_b64(text: &str) -> Result<Vec<u8>, RpcError> {
    base64::engine::general_purpose::STANDARD
        .decode(text)
        .map_err(|e| RpcError::invalid_params(format!("invalid base64: {e}")))
}

/// Implements every method over the node's shared state.
pub struct RpcMethods {
    chain: Arc<Blockchain>,
    network: Arc<dyn NetworkInfo>,
    config: RpcServerConfig,
    sessions: IteratorSessions,
    node_nonce: u32,
    user_agent: String,
}

impl RpcMethods {
    pub fn new(
        chain: Arc<Blockchain>,
        network: Arc<dyn NetworkInfo>,
        config: RpcServerConfig,
    ) -> Self {
        let sessions = IteratorSessions::new(config.max_sessions);
        Self {
            chain,
            network,
            config,
            sessions,
            node_nonce: rand::random(),
            user_agent: format!("/neo3-rs:{}/", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Dispatches one request.
    pub fn handle(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        match method {
            "getversion" => self.get_version(),
            "getbestblockhash" => Ok(json!(self.chain.best_block_hash().to_hex())),
            "getblockcount" => Ok(json!(self.chain.height() + 1)),
            "getblockhash" => self.get_block_hash(params),
            "getblock" => self.get_block(params),
            "getblockheader" => self.get_block_header(params),
            "getrawtransaction" => self.get_raw_transaction(params),
            "gettransactionheight" => self.get_transaction_height(params),
            "sendrawtransaction" => self.send_raw_transaction(params),
            "submitblock" => self.submit_block(params),
            "invokefunction" => self.invoke_function(params),
            "invokescript" => self.invoke_script(params),
            "getcontractstate" => self.get_contract_state(params),
            "getstorage" => self.get_storage(params),
            "findstorage" => self.find_storage(params),
            "getrawmempool" => self.get_raw_mempool(),
            "getconnectioncount" => Ok(json!(self.network.connection_count())),
            "getpeers" => self.get_peers(),
            "getcommittee" => self.get_committee(),
            "getvalidators" | "getnextblockvalidators" => self.get_next_block_validators(),
            "getcandidates" => self.get_candidates(),
            "getunclaimedgas" => self.get_unclaimed_gas(params),
            "validateaddress" => self.validate_address(params),
            "getnativecontracts" => self.get_native_contracts(),
            "traverseiterator" => self.traverse_iterator(params),
            "terminatesession" => self.terminate_session(params),
            other => Err(RpcError::method_not_found(other)),
        }
    }

    fn str_param<'a>(params: &'a [Value], index: usize) -> Result<&'a str, RpcError> {
        params
            .get(index)
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::invalid_params(format!("parameter {index} must be a string")))
    }

    fn u64_param(params: &[Value], index: usize) -> Result<u64, RpcError> {
        params
            .get(index)
            .and_then(Value::as_u64)
            .ok_or_else(|| RpcError::invalid_params(format!("parameter {index} must be a number")))
    }

    fn bool_param(params: &[Value], index: usize, default: bool) -> bool {
        match params.get(index) {
            Some(Value::Bool(value)) => *value,
            Some(Value::Number(value)) => value.as_u64() != Some(0),
            _ => default,
        }
    }

    fn hash256_param(params: &[Value], index: usize) -> Result<UInt256, RpcError> {
        let text = Self::str_param(params, index)?;
        UInt256::from_hex(text)
            .map_err(|e| RpcError::invalid_params(format!("invalid hash: {e}")))
    }

    /// A block locator: hash string or height number.
    fn resolve_block(&self, params: &[Value]) -> Result<Block, RpcError> {
        let block = match params.first() {
            Some(Value::String(text)) => {
                let hash = UInt256::from_hex(text)
                    .map_err(|e| RpcError::invalid_params(format!("invalid hash: {e}")))?;
                self.chain.get_block(&hash)
            }
            Some(Value::Number(number)) => {
                let index = number
                    .as_u64()
                    .ok_or_else(|| RpcError::invalid_params("negative block index"))?;
                self.chain.get_block_by_index(index as u32)
            }
            _ => return Err(RpcError::invalid_params("expected block hash or index")),
        };
        block.ok_or_else(|| RpcError::new(error_codes::UNKNOWN_BLOCK, "unknown block"))
    }

    /// A contract locator: script hash string or numeric id.
    fn resolve_contract_id(&self, param: Option<&Value>) -> Result<i32, RpcError> {
        match param {
            Some(Value::Number(number)) => number
                .as_i64()
                .map(|id| id as i32)
                .ok_or_else(|| RpcError::invalid_params("invalid contract id")),
            Some(Value::String(text)) => {
                let hash = UInt160::from_hex(text)
                    .map_err(|e| RpcError::invalid_params(format!("invalid hash: {e}")))?;
                let snapshot = self.chain.snapshot();
                if let Some(native) = self.chain.natives().by_hash(&hash) {
                    return Ok(native.id());
                }
                contract_management::get_contract(&snapshot, &hash)
                    .map(|contract| contract.id)
                    .ok_or_else(|| {
                        RpcError::new(error_codes::UNKNOWN_CONTRACT, "unknown contract")
                    })
            }
            _ => Err(RpcError::invalid_params("expected contract hash or id")),
        }
    }

    fn get_version(&self) -> Result<Value, RpcError> {
        let settings = self.chain.settings();
        Ok(json!({
            "port": self.config.port,
            "nonce": self.node_nonce,
            "useragent": self.user_agent,
            "protocol": {
                "network": settings.network,
                "addressversion": settings.address_version,
                "validatorscount": settings.validators_count,
                "msperblock": settings.milliseconds_per_block,
                "maxvaliduntilblockincrement": settings.max_valid_until_block_increment,
                "maxtraceableblocks": settings.max_traceable_blocks,
                "maxtransactionsperblock": settings.max_transactions_per_block,
                "initialgasdistribution": settings.initial_gas_distribution,
            },
        }))
    }

    fn get_block_hash(&self, params: &[Value]) -> Result<Value, RpcError> {
        let index = Self::u64_param(params, 0)? as u32;
        self.chain
            .get_block_hash(index)
            .map(|hash| json!(hash.to_hex()))
            .ok_or_else(|| RpcError::new(error_codes::UNKNOWN_BLOCK, "unknown block"))
    }

    fn get_block(&self, params: &[Value]) -> Result<Value, RpcError> {
        let block = self.resolve_block(params)?;
        if Self::bool_param(params, 1, false) {
            Ok(self.block_to_json(&block))
        } else {
            let encoded = block
                .to_array()
                .map_err(|e| RpcError::internal(e.to_string()))?;
            Ok(json!(b64(&encoded)))
        }
    }

    fn get_block_header(&self, params: &[Value]) -> Result<Value, RpcError> {
        let block = self.resolve_block(params)?;
        if Self::bool_param(params, 1, false) {
            Ok(self.header_to_json(&block.header, block.transactions.len()))
        } else {
            let encoded = block
                .header
                .to_array()
                .map_err(|e| RpcError::internal(e.to_string()))?;
            Ok(json!(b64(&encoded)))
        }
    }

    fn get_raw_transaction(&self, params: &[Value]) -> Result<Value, RpcError> {
        let hash = Self::hash256_param(params, 0)?;
        let state = self.chain.get_transaction(&hash).ok_or_else(|| {
            RpcError::new(error_codes::UNKNOWN_TRANSACTION, "unknown transaction")
        })?;
        if Self::bool_param(params, 1, false) {
            let mut rendered = self.tx_to_json(&state.transaction);
            if let Some(block_hash) = self.chain.get_block_hash(state.block_index) {
                rendered["blockhash"] = json!(block_hash.to_hex());
            }
            rendered["blockindex"] = json!(state.block_index);
            rendered["confirmations"] = json!(self.chain.height() - state.block_index + 1);
            rendered["vmstate"] = json!(match state.vm_state {
                1 => "HALT",
                2 => "FAULT",
                _ => "NONE",
            });
            Ok(rendered)
        } else {
            let encoded = state
                .transaction
                .to_array()
                .map_err(|e| RpcError::internal(e.to_string()))?;
            Ok(json!(b64(&encoded)))
        }
    }

    fn get_transaction_height(&self, params: &[Value]) -> Result<Value, RpcError> {
        let hash = Self::hash256_param(params, 0)?;
        self.chain
            .get_transaction(&hash)
            .map(|state| json!(state.block_index))
            .ok_or_else(|| {
                RpcError::new(error_codes::UNKNOWN_TRANSACTION, "unknown transaction")
            })
    }

    fn send_raw_transaction(&self, params: &[Value]) -> Result<Value, RpcError> {
        let bytes = from_b64(Self::str_param(params, 0)?)?;
        let transaction = Transaction::from_array(&bytes)
            .map_err(|e| RpcError::invalid_params(format!("undecodable transaction: {e}")))?;
        let hash = transaction
            .hash()
            .map_err(|e| RpcError::internal(e.to_string()))?;
        match self.chain.relay_transaction(transaction) {
            Ok(VerifyResult::Succeed) => Ok(json!({"hash": hash.to_hex()})),
            Ok(result) => Err(RpcError::new(
                error_codes::code_for_verify_result(result),
                result.to_string(),
            )),
            Err(error) => Err(RpcError::internal(error.to_string())),
        }
    }

    fn submit_block(&self, params: &[Value]) -> Result<Value, RpcError> {
        let bytes = from_b64(Self::str_param(params, 0)?)?;
        let block = Block::from_array(&bytes)
            .map_err(|e| RpcError::invalid_params(format!("undecodable block: {e}")))?;
        let hash = block.hash().map_err(|e| RpcError::internal(e.to_string()))?;
        match self.chain.on_new_block(block, None) {
            Ok(VerifyResult::Succeed) => Ok(json!({"hash": hash.to_hex()})),
            Ok(VerifyResult::AlreadyExists) => Err(RpcError::new(
                error_codes::BLOCK_ALREADY_EXISTS,
                "block already exists",
            )),
            Ok(VerifyResult::UnableToVerify) => Err(RpcError::new(
                error_codes::BLOCK_UNLINKED,
                "previous block is missing",
            )),
            Ok(result) => Err(RpcError::new(
                error_codes::BLOCK_VALIDATION_FAILED,
                result.to_string(),
            )),
            Err(error) => Err(RpcError::internal(error.to_string())),
        }
    }

    fn invoke_function(&self, params: &[Value]) -> Result<Value, RpcError> {
        let contract = UInt160::from_hex(Self::str_param(params, 0)?)
            .map_err(|e| RpcError::invalid_params(format!("invalid script hash: {e}")))?;
        let method = Self::str_param(params, 1)?;
        let arguments = match params.get(2) {
            Some(Value::Array(values)) => values.clone(),
            _ => Vec::new(),
        };
        let signers = Self::parse_signers(params.get(3))?;

        let mut builder = ScriptBuilder::new();
        // Arguments pack into one array; the first argument must land
        // at index zero, so they push in reverse.
        for argument in arguments.iter().rev() {
            Self::push_argument(&mut builder, argument)?;
        }
        builder.emit_push_i64(arguments.len() as i64);
        builder.emit(OpCode::PACK);
        builder.emit_push_i64(CallFlags::ALL.bits() as i64);
        builder
            .emit_push_string(method)
            .map_err(|e| RpcError::invalid_params(e.to_string()))?;
        builder
            .emit_push_bytes(contract.as_bytes())
            .map_err(|e| RpcError::internal(e.to_string()))?;
        builder.emit_syscall("System.Contract.Call");
        self.run_test_invocation(builder.to_array(), signers)
    }

    fn invoke_script(&self, params: &[Value]) -> Result<Value, RpcError> {
        let script = from_b64(Self::str_param(params, 0)?)?;
        let signers = Self::parse_signers(params.get(1))?;
        self.run_test_invocation(script, signers)
    }

    fn parse_signers(param: Option<&Value>) -> Result<Vec<Signer>, RpcError> {
        let Some(Value::Array(entries)) = param else {
            return Ok(Vec::new());
        };
        entries
            .iter()
            .map(|entry| {
                let account = entry
                    .get("account")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RpcError::invalid_params("signer without account"))?;
                let account = UInt160::from_hex(account)
                    .map_err(|e| RpcError::invalid_params(format!("invalid account: {e}")))?;
                let scopes = match entry.get("scopes").and_then(Value::as_str) {
                    Some("Global") => WitnessScope::GLOBAL,
                    Some("None") => WitnessScope::NONE,
                    _ => WitnessScope::CALLED_BY_ENTRY,
                };
                Ok(Signer::new(account, scopes))
            })
            .collect()
    }

    fn push_argument(builder: &mut ScriptBuilder, argument: &Value) -> Result<(), RpcError> {
        let kind = argument.get("type").and_then(Value::as_str).unwrap_or("Any");
        let value = argument.get("value");
        let invalid = |reason: &str| {
            RpcError::new(
                error_codes::CONTRACT_INVALID_PARAMETER,
                format!("bad {kind} argument: {reason}"),
            )
        };
        match kind {
            "Any" => {
                builder.emit_push_null();
            }
            "Boolean" => {
                let flag = value.and_then(Value::as_bool).ok_or_else(|| invalid("not a bool"))?;
                builder.emit_push_bool(flag);
            }
            "Integer" => {
                let number = match value {
                    Some(Value::Number(number)) => number
                        .as_i64()
                        .ok_or_else(|| invalid("out of range"))?,
                    Some(Value::String(text)) => text
                        .parse::<i64>()
                        .map_err(|_| invalid("not an integer"))?,
                    _ => return Err(invalid("missing value")),
                };
                builder.emit_push_i64(number);
            }
            "String" => {
                let text = value.and_then(Value::as_str).ok_or_else(|| invalid("not a string"))?;
                builder
                    .emit_push_string(text)
                    .map_err(|e| invalid(&e.to_string()))?;
            }
            "ByteArray" => {
                let text = value.and_then(Value::as_str).ok_or_else(|| invalid("not base64"))?;
                let bytes = from_b64(text)?;
                builder
                    .emit_push_bytes(&bytes)
                    .map_err(|e| invalid(&e.to_string()))?;
            }
            "Hash160" => {
                let text = value.and_then(Value::as_str).ok_or_else(|| invalid("not hex"))?;
                let hash = UInt160::from_hex(text).map_err(|e| invalid(&e.to_string()))?;
                builder
                    .emit_push_bytes(hash.as_bytes())
                    .map_err(|e| invalid(&e.to_string()))?;
            }
            "Hash256" => {
                let text = value.and_then(Value::as_str).ok_or_else(|| invalid("not hex"))?;
                let hash = UInt256::from_hex(text).map_err(|e| invalid(&e.to_string()))?;
                builder
                    .emit_push_bytes(hash.as_bytes())
                    .map_err(|e| invalid(&e.to_string()))?;
            }
            "PublicKey" => {
                let text = value.and_then(Value::as_str).ok_or_else(|| invalid("not hex"))?;
                let bytes = hex::decode(text).map_err(|e| invalid(&e.to_string()))?;
                builder
                    .emit_push_bytes(&bytes)
                    .map_err(|e| invalid(&e.to_string()))?;
            }
            other => return Err(invalid(&format!("unsupported type {other}"))),
        }
        Ok(())
    }

    /// Runs a script on a throwaway snapshot and renders the outcome.
    fn run_test_invocation(
        &self,
        script: Vec<u8>,
        signers: Vec<Signer>,
    ) -> Result<Value, RpcError> {
        let snapshot = self.chain.snapshot();
        let container = if signers.is_empty() {
            None
        } else {
            let mut tx = Transaction::new();
            tx.valid_until_block = self.chain.height() + 1;
            tx.witnesses = signers.iter().map(|_| Witness::default()).collect();
            tx.signers = signers;
            tx.script = script.clone();
            Some(Container::Transaction(Arc::new(tx)))
        };
        let mut engine = ApplicationEngine::create(
            TriggerType::Application,
            container,
            snapshot,
            None,
            self.chain.settings().clone(),
            self.chain.natives().clone(),
            TEST_INVOKE_GAS,
        )
        .map_err(|e| RpcError::internal(e.to_string()))?;
        engine
            .load_script(script.clone(), CallFlags::ALL)
            .map_err(|e| RpcError::internal(e.to_string()))?;
        let state = engine.execute();

        let mut iterators: Vec<Vec<Value>> = Vec::new();
        let stack: Vec<Value> = engine
            .result_stack()
            .iter()
            .map(|item| self.render_result_item(item, &mut iterators))
            .collect();
        let exception = engine.fault_message();
        let gas_consumed = engine.gas_consumed();

        let state_text = if state == VMState::HALT { "HALT" } else { "FAULT" };
        let mut result = json!({
            "script": b64(&script),
            "state": state_text,
            "gasconsumed": gas_consumed.to_string(),
            "exception": exception,
            "stack": stack,
        });
        if !iterators.is_empty() {
            let (session, ids) = self.sessions.create(iterators);
            result["session"] = json!(session);
            // Rewrite iterator placeholders with their assigned ids.
            if let Some(stack) = result["stack"].as_array_mut() {
                let mut next = 0usize;
                for item in stack.iter_mut() {
                    if item["type"] == "InteropInterface" && next < ids.len() {
                        item["id"] = json!(ids[next]);
                        next += 1;
                    }
                }
            }
        }
        Ok(result)
    }

    /// Renders a result item, materializing storage iterators so
    /// traverseiterator can page through them later.
    fn render_result_item(&self, item: &StackItem, iterators: &mut Vec<Vec<Value>>) -> Value {
        if let StackItem::InteropInterface(_) = item {
            if let Ok(iterator) = item.as_interface::<RefCell<StorageIterator>>() {
                let mut materialized = Vec::new();
                let mut iterator = iterator.borrow_mut();
                while materialized.len() < self.config.max_iterator_items && iterator.next() {
                    match iterator.value() {
                        Ok(value) => {
                            materialized.push(stack_item_to_json(&value, JSON_DEPTH))
                        }
                        Err(_) => break,
                    }
                }
                iterators.push(materialized);
                return json!({"type": "InteropInterface", "interface": "IIterator"});
            }
        }
        stack_item_to_json(item, JSON_DEPTH)
    }

    fn get_contract_state(&self, params: &[Value]) -> Result<Value, RpcError> {
        // Natives answer by hash before the deployed-contract index.
        if let Some(Value::String(text)) = params.first() {
            if let Ok(hash) = UInt160::from_hex(text) {
                if let Some(native) = self.chain.natives().by_hash(&hash) {
                    return Ok(json!({
                        "id": native.id(),
                        "hash": native.hash().to_hex(),
                        "manifest": {"name": native.name()},
                    }));
                }
            }
        }
        let id = self.resolve_contract_id(params.first())?;
        if id < 0 {
            let native = self.chain.natives().by_id(id).ok_or_else(|| {
                RpcError::new(error_codes::UNKNOWN_CONTRACT, "unknown contract")
            })?;
            return Ok(json!({
                "id": native.id(),
                "hash": native.hash().to_hex(),
                "manifest": {"name": native.name()},
            }));
        }
        let snapshot = self.chain.snapshot();
        contract_management::get_contract_by_id(&snapshot, id)
            .map(|contract| serde_json::to_value(&contract).unwrap_or(Value::Null))
            .ok_or_else(|| RpcError::new(error_codes::UNKNOWN_CONTRACT, "unknown contract"))
    }

    fn get_storage(&self, params: &[Value]) -> Result<Value, RpcError> {
        let id = self.resolve_contract_id(params.first())?;
        let key = from_b64(Self::str_param(params, 1)?)?;
        let snapshot = self.chain.snapshot();
        let item = snapshot.read().get(&StorageKey::new(id, key));
        item.map(|item| json!(b64(&item.value))).ok_or_else(|| {
            RpcError::new(error_codes::UNKNOWN_STORAGE_ITEM, "unknown storage item")
        })
    }

    fn find_storage(&self, params: &[Value]) -> Result<Value, RpcError> {
        let id = self.resolve_contract_id(params.first())?;
        let prefix = from_b64(Self::str_param(params, 1)?)?;
        let start = params.get(2).and_then(Value::as_u64).unwrap_or(0) as usize;

        let snapshot = self.chain.snapshot();
        let full_prefix = StorageKey::new(id, prefix).to_bytes();
        let entries = snapshot.read().find(&full_prefix);
        let page: Vec<Value> = entries
            .iter()
            .skip(start)
            .take(self.config.max_iterator_items)
            .map(|(key, item)| {
                json!({
                    "key": b64(&key.key),
                    "value": b64(&item.value),
                })
            })
            .collect();
        let truncated = entries.len() > start + page.len();
        Ok(json!({
            "results": page,
            "next": start + page.len(),
            "truncated": truncated,
        }))
    }

    fn get_raw_mempool(&self) -> Result<Value, RpcError> {
        let hashes: Vec<String> = self
            .chain
            .mempool()
            .hashes()
            .into_iter()
            .map(|hash| hash.to_hex())
            .collect();
        Ok(json!(hashes))
    }

    fn get_peers(&self) -> Result<Value, RpcError> {
        let connected: Vec<Value> = self
            .network
            .peers()
            .into_iter()
            .map(|(address, user_agent, height)| {
                json!({
                    "address": address.ip().to_string(),
                    "port": address.port(),
                    "useragent": user_agent,
                    "lastknownheight": height,
                })
            })
            .collect();
        Ok(json!({"connected": connected, "unconnected": [], "bad": []}))
    }

    fn get_committee(&self) -> Result<Value, RpcError> {
        let snapshot = self.chain.snapshot();
        let members = neo_token::committee(&snapshot, self.chain.settings())
            .map_err(|e| RpcError::internal(e.to_string()))?;
        Ok(json!(members
            .iter()
            .map(|key| key.to_hex())
            .collect::<Vec<_>>()))
    }

    fn get_next_block_validators(&self) -> Result<Value, RpcError> {
        let snapshot = self.chain.snapshot();
        let validators = neo_token::next_block_validators(&snapshot, self.chain.settings())
            .map_err(|e| RpcError::internal(e.to_string()))?;
        let votes: std::collections::HashMap<String, i64> = neo_token::candidates(&snapshot)
            .into_iter()
            .map(|(key, votes)| (key.to_hex(), votes))
            .collect();
        Ok(json!(validators
            .iter()
            .map(|key| {
                let hex = key.to_hex();
                let vote_count = votes.get(&hex).copied().unwrap_or(0);
                json!({"publickey": hex, "votes": vote_count.to_string()})
            })
            .collect::<Vec<_>>()))
    }

    fn get_candidates(&self) -> Result<Value, RpcError> {
        let snapshot = self.chain.snapshot();
        let validators = neo_token::next_block_validators(&snapshot, self.chain.settings())
            .map_err(|e| RpcError::internal(e.to_string()))?;
        Ok(json!(neo_token::candidates(&snapshot)
            .into_iter()
            .map(|(key, votes)| {
                json!({
                    "publickey": key.to_hex(),
                    "votes": votes.to_string(),
                    "active": validators.contains(&key),
                })
            })
            .collect::<Vec<_>>()))
    }

    fn get_unclaimed_gas(&self, params: &[Value]) -> Result<Value, RpcError> {
        let text = Self::str_param(params, 0)?;
        let settings = self.chain.settings();
        let account = UInt160::from_address(text, settings.address_version)
            .or_else(|_| UInt160::from_hex(text))
            .map_err(|e| RpcError::invalid_params(format!("invalid address: {e}")))?;
        let snapshot = self.chain.snapshot();
        let unclaimed = neo_token::unclaimed_gas(&snapshot, &account, self.chain.height() + 1);
        Ok(json!({
            "unclaimed": unclaimed.to_string(),
            "address": account.to_address(settings.address_version),
        }))
    }

    fn validate_address(&self, params: &[Value]) -> Result<Value, RpcError> {
        let text = Self::str_param(params, 0)?;
        let valid = UInt160::from_address(text, self.chain.settings().address_version).is_ok();
        Ok(json!({"address": text, "isvalid": valid}))
    }

    fn get_native_contracts(&self) -> Result<Value, RpcError> {
        Ok(json!(self
            .chain
            .natives()
            .all()
            .iter()
            .map(|native| {
                json!({
                    "id": native.id(),
                    "hash": native.hash().to_hex(),
                    "name": native.name(),
                })
            })
            .collect::<Vec<_>>()))
    }

    fn traverse_iterator(&self, params: &[Value]) -> Result<Value, RpcError> {
        let session = Self::str_param(params, 0)?;
        let iterator = Self::str_param(params, 1)?;
        let count = Self::u64_param(params, 2)? as usize;
        if count > self.config.max_iterator_items {
            return Err(RpcError::invalid_params(format!(
                "count exceeds the {} item limit",
                self.config.max_iterator_items
            )));
        }
        self.sessions
            .traverse(session, iterator, count)
            .map(Value::Array)
            .ok_or_else(|| RpcError::new(error_codes::UNKNOWN_SESSION, "unknown session"))
    }

    fn terminate_session(&self, params: &[Value]) -> Result<Value, RpcError> {
        let session = Self::str_param(params, 0)?;
        if self.sessions.terminate(session) {
            Ok(json!(true))
        } else {
            Err(RpcError::new(error_codes::UNKNOWN_SESSION, "unknown session"))
        }
    }

    fn block_to_json(&self, block: &Block) -> Value {
        let mut rendered = self.header_to_json(&block.header, block.transactions.len());
        rendered["tx"] = json!(block
            .transactions
            .iter()
            .map(|tx| self.tx_to_json(tx))
            .collect::<Vec<_>>());
        rendered
    }

    fn header_to_json(&self, header: &Header, tx_count: usize) -> Value {
        let hash = header.hash().map(|h| h.to_hex()).unwrap_or_default();
        let confirmations = self.chain.height().saturating_sub(header.index) + 1;
        let mut rendered = json!({
            "hash": hash,
            "version": header.version,
            "previousblockhash": header.prev_hash.to_hex(),
            "merkleroot": header.merkle_root.to_hex(),
            "time": header.timestamp,
            "nonce": format!("{:016X}", header.nonce),
            "index": header.index,
            "primary": header.primary_index,
            "nextconsensus": header
                .next_consensus
                .to_address(self.chain.settings().address_version),
            "witnesses": [{
                "invocation": b64(&header.witness.invocation_script),
                "verification": b64(&header.witness.verification_script),
            }],
            "txcount": tx_count,
            "confirmations": confirmations,
        });
        if let Some(next) = self.chain.get_block_hash(header.index + 1) {
            rendered["nextblockhash"] = json!(next.to_hex());
        }
        rendered
    }

    fn tx_to_json(&self, tx: &Transaction) -> Value {
        let settings = self.chain.settings();
        json!({
            "hash": tx.hash().map(|h| h.to_hex()).unwrap_or_default(),
            "size": tx.size(),
            "version": tx.version,
            "nonce": tx.nonce,
            "sender": tx
                .sender()
                .map(|sender| sender.to_address(settings.address_version)),
            "sysfee": tx.system_fee.to_string(),
            "netfee": tx.network_fee.to_string(),
            "validuntilblock": tx.valid_until_block,
            "signers": tx
                .signers
                .iter()
                .map(|signer| {
                    json!({
                        "account": signer.account.to_hex(),
                        "scopes": signer.scopes.to_string(),
                    })
                })
                .collect::<Vec<_>>(),
            "attributes": tx
                .attributes
                .iter()
                .map(|attribute| json!({"type": format!("{:?}", attribute.attribute_type())}))
                .collect::<Vec<_>>(),
            "script": b64(&tx.script),
            "witnesses": tx
                .witnesses
                .iter()
                .map(|witness| {
                    json!({
                        "invocation": b64(&witness.invocation_script),
                        "verification": b64(&witness.verification_script),
                    })
                })
                .collect::<Vec<_>>(),
        })
    }
}
