// Copyright (C) 2015-2025 The Neo Project.
//
// neo_token.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! NEO native contract: the indivisible governance token, candidate
//! election and the GAS distribution schedule.

use super::{gas_token, native_hash, NativeCallContext, NativeContract, NativeMethod};
use crate::contract::Contract;
use crate::error::{ContractError, ContractResult};
use neo3_config::{ProtocolSettings, DATOSHI_PER_GAS};
use neo3_core::UInt160;
use neo3_cryptography::ECPoint;
use neo3_io::{BinaryWriter, MemoryReader};
use neo3_persistence::{SnapshotHandle, StorageItem, StorageKey};
use neo3_vm::StackItem;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;

pub const ID: i32 = -5;
const NAME: &str = "NeoToken";

static HASH: Lazy<UInt160> = Lazy::new(|| native_hash(NAME));

const PREFIX_VOTERS_COUNT: u8 = 1;
const PREFIX_TOTAL_SUPPLY: u8 = 11;
const PREFIX_REGISTER_PRICE: u8 = 13;
const PREFIX_COMMITTEE: u8 = 14;
const PREFIX_ACCOUNT: u8 = 20;
const PREFIX_GAS_PER_VOTE: u8 = 23;
const PREFIX_CANDIDATE: u8 = 33;

/// Fixed NEO supply.
pub const TOTAL_SUPPLY: i64 = 100_000_000;

/// GAS minted per block, split between holders, committee and voters.
pub const GAS_PER_BLOCK: i64 = 5 * DATOSHI_PER_GAS;
const HOLDER_RATIO: i64 = 10;
const COMMITTEE_RATIO: i64 = 10;
const VOTER_RATIO: i64 = 80;

/// Precision factor for the per-vote reward accumulator.
const VOTE_FACTOR: i128 = 100_000_000;

/// Default candidate registration price: 1000 GAS.
pub const DEFAULT_REGISTER_PRICE: i64 = 1000 * DATOSHI_PER_GAS;

pub fn neo_hash() -> UInt160 {
    *HASH
}

/// Per-account NEO state.
#[derive(Debug, Clone, Default)]
pub struct NeoAccountState {
    pub balance: i64,
    /// Height the holder reward was last settled at.
    pub balance_height: u32,
    pub vote_to: Option<ECPoint>,
    /// The candidate's accumulator value at the last settlement.
    pub last_gas_per_vote: i128,
}

impl NeoAccountState {
    fn to_bytes(&self) -> ContractResult<Vec<u8>> {
        let mut writer = BinaryWriter::new();
        writer.write_i64(self.balance)?;
        writer.write_u32(self.balance_height)?;
        match &self.vote_to {
            Some(key) => {
                writer.write_byte(1)?;
                writer.write_bytes(key.as_bytes())?;
            }
            None => writer.write_byte(0)?,
        }
        writer.write_bytes(&self.last_gas_per_vote.to_le_bytes())?;
        Ok(writer.to_bytes())
    }

    fn from_bytes(data: &[u8]) -> ContractResult<Self> {
        let mut reader = MemoryReader::new(data);
        let balance = reader.read_i64()?;
        let balance_height = reader.read_u32()?;
        let vote_to = if reader.read_bool()? {
            let bytes = reader.read_bytes(33)?;
            Some(ECPoint::from_bytes(&bytes)?)
        } else {
            None
        };
        let accumulator_bytes: [u8; 16] = reader
            .read_bytes(16)?
            .try_into()
            .map_err(|_| ContractError::Serialization("truncated accumulator".to_string()))?;
        Ok(Self {
            balance,
            balance_height,
            vote_to,
            last_gas_per_vote: i128::from_le_bytes(accumulator_bytes),
        })
    }
}

/// A registered candidate.
#[derive(Debug, Clone, Default)]
pub struct CandidateState {
    pub registered: bool,
    pub votes: i64,
}

fn account_key(account: &UInt160) -> StorageKey {
    StorageKey::with_prefix(ID, PREFIX_ACCOUNT, account.as_bytes())
}

fn candidate_key(key: &ECPoint) -> StorageKey {
    StorageKey::with_prefix(ID, PREFIX_CANDIDATE, key.as_bytes())
}

fn gas_per_vote_key(key: &ECPoint) -> StorageKey {
    StorageKey::with_prefix(ID, PREFIX_GAS_PER_VOTE, key.as_bytes())
}

/// The NEO balance of an account.
pub fn balance_of(snapshot: &SnapshotHandle, account: &UInt160) -> i64 {
    account_state(snapshot, account)
        .map(|s| s.balance)
        .unwrap_or(0)
}

pub fn account_state(snapshot: &SnapshotHandle, account: &UInt160) -> Option<NeoAccountState> {
    let item = snapshot.read().get(&account_key(account))?;
    NeoAccountState::from_bytes(&item.value).ok()
}

fn write_account(
    snapshot: &SnapshotHandle,
    account: &UInt160,
    state: &NeoAccountState,
) -> ContractResult<()> {
    let mut snapshot = snapshot.write();
    if state.balance == 0 && state.vote_to.is_none() {
        snapshot.delete(&account_key(account))?;
    } else {
        snapshot.put(account_key(account), StorageItem::new(state.to_bytes()?))?;
    }
    Ok(())
}

fn candidate_state(snapshot: &SnapshotHandle, key: &ECPoint) -> CandidateState {
    snapshot
        .read()
        .get(&candidate_key(key))
        .map(|item| {
            let registered = item.value.first().copied().unwrap_or(0) == 1;
            let votes = item.value[1..]
                .try_into()
                .ok()
                .map(i64::from_le_bytes)
                .unwrap_or(0);
            CandidateState { registered, votes }
        })
        .unwrap_or_default()
}

fn write_candidate(
    snapshot: &SnapshotHandle,
    key: &ECPoint,
    state: &CandidateState,
) -> ContractResult<()> {
    let mut snapshot = snapshot.write();
    if !state.registered && state.votes == 0 {
        snapshot.delete(&candidate_key(key))?;
    } else {
        let mut value = Vec::with_capacity(9);
        value.push(u8::from(state.registered));
        value.extend_from_slice(&state.votes.to_le_bytes());
        snapshot.put(candidate_key(key), StorageItem::new(value))?;
    }
    Ok(())
}

fn gas_per_vote(snapshot: &SnapshotHandle, key: &ECPoint) -> i128 {
    snapshot
        .read()
        .get(&gas_per_vote_key(key))
        .and_then(|item| item.value.try_into().ok().map(i128::from_le_bytes))
        .unwrap_or(0)
}

/// Every registered candidate with its vote count, in key order.
pub fn candidates(snapshot: &SnapshotHandle) -> Vec<(ECPoint, i64)> {
    snapshot
        .read()
        .find(&StorageKey::new(ID, vec![PREFIX_CANDIDATE]).to_bytes())
        .into_iter()
        .filter_map(|(key, item)| {
            let point = ECPoint::from_bytes(&key.key[1..]).ok()?;
            let registered = item.value.first().copied()? == 1;
            let votes = item.value[1..].try_into().ok().map(i64::from_le_bytes)?;
            registered.then_some((point, votes))
        })
        .collect()
}

/// The candidate registration price in datoshi.
pub fn register_price(snapshot: &SnapshotHandle) -> i64 {
    snapshot
        .read()
        .get(&StorageKey::with_prefix(ID, PREFIX_REGISTER_PRICE, &[]))
        .and_then(|item| item.value.try_into().ok().map(i64::from_le_bytes))
        .unwrap_or(DEFAULT_REGISTER_PRICE)
}

/// The current committee, falling back to the standby set before any
/// election has been cached.
pub fn committee(
    snapshot: &SnapshotHandle,
    settings: &ProtocolSettings,
) -> ContractResult<Vec<ECPoint>> {
    if let Some(item) = snapshot
        .read()
        .get(&StorageKey::with_prefix(ID, PREFIX_COMMITTEE, &[]))
    {
        let mut reader = MemoryReader::new(&item.value);
        let count = reader.read_var_int(64)? as usize;
        let mut keys = Vec::with_capacity(count);
        for _ in 0..count {
            let bytes = reader.read_bytes(33)?;
            keys.push(ECPoint::from_bytes(&bytes)?);
        }
        return Ok(keys);
    }
    settings
        .standby_committee
        .iter()
        .map(|hex| ECPoint::from_hex(hex).map_err(Into::into))
        .collect()
}

/// The multi-signature address authorizing committee actions.
pub fn committee_address(
    snapshot: &SnapshotHandle,
    settings: &ProtocolSettings,
) -> ContractResult<UInt160> {
    Contract::committee_address(&committee(snapshot, settings)?)
}

/// The validators producing the next block.
pub fn next_block_validators(
    snapshot: &SnapshotHandle,
    settings: &ProtocolSettings,
) -> ContractResult<Vec<ECPoint>> {
    let mut validators: Vec<ECPoint> = committee(snapshot, settings)?
        .into_iter()
        .take(settings.validators_count as usize)
        .collect();
    validators.sort();
    Ok(validators)
}

fn write_committee(snapshot: &SnapshotHandle, keys: &[ECPoint]) -> ContractResult<()> {
    let mut writer = BinaryWriter::new();
    writer.write_var_int(keys.len() as u64)?;
    for key in keys {
        writer.write_bytes(key.as_bytes())?;
    }
    snapshot.write().put(
        StorageKey::with_prefix(ID, PREFIX_COMMITTEE, &[]),
        StorageItem::new(writer.to_bytes()),
    )?;
    Ok(())
}

/// GAS owed to `account` up to `end_height` under the bonus schedule.
pub fn unclaimed_gas(
    snapshot: &SnapshotHandle,
    account: &UInt160,
    end_height: u32,
) -> i64 {
    let Some(state) = account_state(snapshot, account) else {
        return 0;
    };
    claimable(snapshot, &state, end_height)
}

fn claimable(snapshot: &SnapshotHandle, state: &NeoAccountState, end_height: u32) -> i64 {
    if state.balance <= 0 || end_height <= state.balance_height {
        return voter_claimable(snapshot, state);
    }
    let blocks = (end_height - state.balance_height) as i128;
    let holder = (state.balance as i128) * blocks * (GAS_PER_BLOCK as i128)
        * (HOLDER_RATIO as i128)
        / 100
        / (TOTAL_SUPPLY as i128);
    (holder as i64) + voter_claimable(snapshot, state)
}

fn voter_claimable(snapshot: &SnapshotHandle, state: &NeoAccountState) -> i64 {
    let Some(candidate) = &state.vote_to else {
        return 0;
    };
    let delta = gas_per_vote(snapshot, candidate) - state.last_gas_per_vote;
    ((state.balance as i128) * delta / VOTE_FACTOR) as i64
}

/// Settles the pending reward into GAS and resets the account's
/// settlement markers.
fn settle_rewards(
    ctx: &mut NativeCallContext<'_>,
    account: &UInt160,
    state: &mut NeoAccountState,
    height: u32,
) -> ContractResult<()> {
    let owed = claimable(ctx.snapshot(), state, height);
    state.balance_height = height;
    if let Some(candidate) = &state.vote_to {
        state.last_gas_per_vote = gas_per_vote(ctx.snapshot(), candidate);
    }
    if owed > 0 {
        gas_token::mint(ctx, account, owed)?;
    }
    Ok(())
}

fn current_height(ctx: &NativeCallContext<'_>) -> u32 {
    ctx.host
        .persisting_block
        .as_ref()
        .map(|b| b.header.index)
        .or_else(|| super::ledger_contract::current_index(ctx.snapshot()))
        .unwrap_or(0)
}

fn adjust_votes(
    snapshot: &SnapshotHandle,
    candidate: &ECPoint,
    delta: i64,
) -> ContractResult<()> {
    let mut state = candidate_state(snapshot, candidate);
    state.votes += delta;
    write_candidate(snapshot, candidate, &state)
}

pub struct NeoToken {
    methods: Vec<NativeMethod>,
}

impl NeoToken {
    pub fn new() -> Self {
        Self {
            methods: vec![
                NativeMethod::safe("symbol", 0, 0),
                NativeMethod::safe("decimals", 0, 0),
                NativeMethod::safe("totalSupply", 1 << 15, 0),
                NativeMethod::safe("balanceOf", 1 << 15, 1),
                NativeMethod::unsafe_method("transfer", 1 << 17, 4),
                NativeMethod::safe("unclaimedGas", 1 << 17, 2),
                NativeMethod::unsafe_method("registerCandidate", 0, 1),
                NativeMethod::unsafe_method("unregisterCandidate", 1 << 16, 1),
                NativeMethod::unsafe_method("vote", 1 << 16, 2),
                NativeMethod::safe("getCandidates", 1 << 22, 0),
                NativeMethod::safe("getCommittee", 1 << 16, 0),
                NativeMethod::safe("getNextBlockValidators", 1 << 16, 0),
                NativeMethod::safe("getAccountState", 1 << 15, 1),
                NativeMethod::safe("getRegisterPrice", 1 << 15, 0),
                NativeMethod::unsafe_method("setRegisterPrice", 1 << 15, 1).returns_nothing(),
            ],
        }
    }

    fn transfer(
        &self,
        ctx: &mut NativeCallContext<'_>,
        from: UInt160,
        to: UInt160,
        amount: i64,
    ) -> ContractResult<bool> {
        if amount < 0 {
            return Err(ContractError::InvalidArgument(
                "negative transfer amount".to_string(),
            ));
        }
        if !ctx.check_witness(&from)? {
            return Ok(false);
        }
        let height = current_height(ctx);

        let mut from_state = account_state(ctx.snapshot(), &from).unwrap_or_default();
        if from_state.balance < amount {
            return Ok(false);
        }
        settle_rewards(ctx, &from, &mut from_state, height)?;

        if from == to {
            write_account(ctx.snapshot(), &from, &from_state)?;
        } else {
            if let Some(candidate) = from_state.vote_to.clone() {
                adjust_votes(ctx.snapshot(), &candidate, -amount)?;
            }
            from_state.balance -= amount;
            if from_state.balance == 0 && from_state.vote_to.take().is_some() {
                decrement_voters_count(ctx.snapshot())?;
            }
            write_account(ctx.snapshot(), &from, &from_state)?;

            let mut to_state = account_state(ctx.snapshot(), &to).unwrap_or_default();
            settle_rewards(ctx, &to, &mut to_state, height)?;
            to_state.balance += amount;
            if let Some(candidate) = to_state.vote_to.clone() {
                adjust_votes(ctx.snapshot(), &candidate, amount)?;
            }
            write_account(ctx.snapshot(), &to, &to_state)?;
        }

        let state = StackItem::new_array(vec![
            StackItem::from_bytes(from.to_bytes()),
            StackItem::from_bytes(to.to_bytes()),
            StackItem::from_int(amount),
        ]);
        ctx.notify(*HASH, "Transfer", state);
        Ok(true)
    }

    fn vote(
        &self,
        ctx: &mut NativeCallContext<'_>,
        account: UInt160,
        candidate: Option<ECPoint>,
    ) -> ContractResult<bool> {
        if !ctx.check_witness(&account)? {
            return Ok(false);
        }
        let Some(mut state) = account_state(ctx.snapshot(), &account) else {
            return Ok(false);
        };
        if let Some(candidate) = &candidate {
            if !candidate_state(ctx.snapshot(), candidate).registered {
                return Ok(false);
            }
        }
        let height = current_height(ctx);
        settle_rewards(ctx, &account, &mut state, height)?;

        match (&state.vote_to, &candidate) {
            (None, Some(_)) => increment_voters_count(ctx.snapshot())?,
            (Some(_), None) => decrement_voters_count(ctx.snapshot())?,
            _ => {}
        }
        if let Some(previous) = state.vote_to.take() {
            adjust_votes(ctx.snapshot(), &previous, -state.balance)?;
        }
        if let Some(candidate) = &candidate {
            adjust_votes(ctx.snapshot(), candidate, state.balance)?;
            state.last_gas_per_vote = gas_per_vote(ctx.snapshot(), candidate);
        }
        state.vote_to = candidate;
        write_account(ctx.snapshot(), &account, &state)?;
        Ok(true)
    }
}

fn voters_count(snapshot: &SnapshotHandle) -> i64 {
    snapshot
        .read()
        .get(&StorageKey::with_prefix(ID, PREFIX_VOTERS_COUNT, &[]))
        .and_then(|item| item.value.try_into().ok().map(i64::from_le_bytes))
        .unwrap_or(0)
}

fn write_voters_count(snapshot: &SnapshotHandle, count: i64) -> ContractResult<()> {
    snapshot.write().put(
        StorageKey::with_prefix(ID, PREFIX_VOTERS_COUNT, &[]),
        StorageItem::new(count.to_le_bytes().to_vec()),
    )?;
    Ok(())
}

fn increment_voters_count(snapshot: &SnapshotHandle) -> ContractResult<()> {
    write_voters_count(snapshot, voters_count(snapshot) + 1)
}

fn decrement_voters_count(snapshot: &SnapshotHandle) -> ContractResult<()> {
    write_voters_count(snapshot, (voters_count(snapshot) - 1).max(0))
}

impl Default for NeoToken {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeContract for NeoToken {
    fn id(&self) -> i32 {
        ID
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn hash(&self) -> UInt160 {
        *HASH
    }

    fn methods(&self) -> &[NativeMethod] {
        &self.methods
    }

    /// Mints the fixed supply to the standby validators and caches the
    /// standby committee.
    fn initialize(&self, ctx: &mut NativeCallContext<'_>) -> ContractResult<()> {
        let supply_key = StorageKey::with_prefix(ID, PREFIX_TOTAL_SUPPLY, &[]);
        if ctx.snapshot().read().contains(&supply_key) {
            return Ok(());
        }
        ctx.snapshot().write().put(
            supply_key,
            StorageItem::new(TOTAL_SUPPLY.to_le_bytes().to_vec()),
        )?;

        let keys: ContractResult<Vec<ECPoint>> = ctx
            .settings()
            .standby_validators()
            .iter()
            .map(|hex| ECPoint::from_hex(hex).map_err(Into::into))
            .collect();
        let account = Contract::validators_address(&keys?)?;
        let state = NeoAccountState {
            balance: TOTAL_SUPPLY,
            ..Default::default()
        };
        write_account(ctx.snapshot(), &account, &state)?;

        let standby: ContractResult<Vec<ECPoint>> = ctx
            .settings()
            .standby_committee
            .iter()
            .map(|hex| ECPoint::from_hex(hex).map_err(Into::into))
            .collect();
        write_committee(ctx.snapshot(), &standby?)
    }

    /// Pays the per-block committee reward and advances the voter-reward
    /// accumulators.
    fn on_persist(&self, ctx: &mut NativeCallContext<'_>) -> ContractResult<()> {
        let block = ctx.persisting_block()?;
        let members = committee(ctx.snapshot(), ctx.settings())?;
        if members.is_empty() {
            return Ok(());
        }

        // Committee reward, round-robin by height.
        let member = &members[block.header.index as usize % members.len()];
        let committee_reward = GAS_PER_BLOCK * COMMITTEE_RATIO / 100;
        let account = Contract::signature_contract_hash(member);
        gas_token::mint(ctx, &account, committee_reward)?;

        // Voter rewards: each member's voters share the member's slice.
        let voter_reward_per_member = GAS_PER_BLOCK * VOTER_RATIO / 100 / members.len() as i64;
        for member in &members {
            let votes = candidate_state(ctx.snapshot(), member).votes;
            if votes <= 0 {
                continue;
            }
            let delta = (voter_reward_per_member as i128) * VOTE_FACTOR / (votes as i128);
            let accumulated = gas_per_vote(ctx.snapshot(), member) + delta;
            ctx.snapshot().write().put(
                gas_per_vote_key(member),
                StorageItem::new(accumulated.to_le_bytes().to_vec()),
            )?;
        }
        Ok(())
    }

    /// Recomputes the committee at epoch boundaries.
    fn post_persist(&self, ctx: &mut NativeCallContext<'_>) -> ContractResult<()> {
        let block = ctx.persisting_block()?;
        let committee_size = ctx.settings().committee_members_count().max(1);
        if (block.header.index as usize + 1) % committee_size != 0 {
            return Ok(());
        }

        let mut candidates: Vec<(ECPoint, i64)> = ctx
            .find_storage(ID, &[PREFIX_CANDIDATE])
            .into_iter()
            .filter_map(|(key, item)| {
                let point = ECPoint::from_bytes(&key.key[1..]).ok()?;
                let registered = item.value.first().copied().unwrap_or(0) == 1;
                let votes = item.value[1..].try_into().ok().map(i64::from_le_bytes)?;
                (registered && votes > 0).then_some((point, votes))
            })
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut elected: Vec<ECPoint> =
            candidates.into_iter().take(committee_size).map(|(k, _)| k).collect();
        if elected.len() < committee_size {
            for hex in &ctx.settings().standby_committee {
                if elected.len() == committee_size {
                    break;
                }
                let standby = ECPoint::from_hex(hex)?;
                if !elected.contains(&standby) {
                    elected.push(standby);
                }
            }
        }
        write_committee(ctx.snapshot(), &elected)
    }

    fn invoke(
        &self,
        ctx: &mut NativeCallContext<'_>,
        method: &str,
        args: Vec<StackItem>,
    ) -> ContractResult<StackItem> {
        let arg_hash = |index: usize| -> ContractResult<UInt160> {
            UInt160::from_bytes(&args[index].as_bytes().map_err(ContractError::Vm)?)
                .map_err(Into::into)
        };
        let arg_key = |index: usize| -> ContractResult<ECPoint> {
            ECPoint::from_bytes(&args[index].as_bytes().map_err(ContractError::Vm)?)
                .map_err(Into::into)
        };
        match method {
            "symbol" => Ok(StackItem::from_bytes(b"NEO".to_vec())),
            "decimals" => Ok(StackItem::from_int(0)),
            "totalSupply" => Ok(StackItem::from_int(TOTAL_SUPPLY)),
            "balanceOf" => Ok(StackItem::from_int(balance_of(
                ctx.snapshot(),
                &arg_hash(0)?,
            ))),
            "transfer" => {
                let from = arg_hash(0)?;
                let to = arg_hash(1)?;
                let amount = args[2]
                    .as_int()
                    .map_err(ContractError::Vm)?
                    .to_i64()
                    .ok_or_else(|| {
                        ContractError::InvalidArgument("amount out of range".to_string())
                    })?;
                Ok(StackItem::from_bool(self.transfer(ctx, from, to, amount)?))
            }
            "unclaimedGas" => {
                let account = arg_hash(0)?;
                let end = args[1]
                    .as_int()
                    .map_err(ContractError::Vm)?
                    .to_u32()
                    .ok_or_else(|| {
                        ContractError::InvalidArgument("invalid height".to_string())
                    })?;
                Ok(StackItem::from_int(unclaimed_gas(
                    ctx.snapshot(),
                    &account,
                    end,
                )))
            }
            "registerCandidate" => {
                let key = arg_key(0)?;
                let account = Contract::signature_contract_hash(&key);
                if !ctx.check_witness(&account)? {
                    return Ok(StackItem::from_bool(false));
                }
                // The registration price is burned through the gas meter.
                let price = register_price(ctx.snapshot());
                ctx.add_fee(price).map_err(ContractError::Vm)?;
                let mut state = candidate_state(ctx.snapshot(), &key);
                state.registered = true;
                write_candidate(ctx.snapshot(), &key, &state)?;
                Ok(StackItem::from_bool(true))
            }
            "unregisterCandidate" => {
                let key = arg_key(0)?;
                let account = Contract::signature_contract_hash(&key);
                if !ctx.check_witness(&account)? {
                    return Ok(StackItem::from_bool(false));
                }
                let mut state = candidate_state(ctx.snapshot(), &key);
                state.registered = false;
                write_candidate(ctx.snapshot(), &key, &state)?;
                Ok(StackItem::from_bool(true))
            }
            "vote" => {
                let account = arg_hash(0)?;
                let candidate = if args[1].is_null() {
                    None
                } else {
                    Some(arg_key(1)?)
                };
                Ok(StackItem::from_bool(self.vote(ctx, account, candidate)?))
            }
            "getCandidates" => {
                let items: Vec<StackItem> = ctx
                    .find_storage(ID, &[PREFIX_CANDIDATE])
                    .into_iter()
                    .filter_map(|(key, item)| {
                        let registered = item.value.first().copied().unwrap_or(0) == 1;
                        if !registered {
                            return None;
                        }
                        let votes =
                            item.value[1..].try_into().ok().map(i64::from_le_bytes)?;
                        Some(StackItem::new_struct(vec![
                            StackItem::from_bytes(key.key[1..].to_vec()),
                            StackItem::from_int(votes),
                        ]))
                    })
                    .collect();
                Ok(StackItem::new_array(items))
            }
            "getCommittee" => {
                let mut members = committee(ctx.snapshot(), ctx.settings())?;
                members.sort();
                Ok(StackItem::new_array(
                    members
                        .iter()
                        .map(|k| StackItem::from_bytes(k.to_bytes()))
                        .collect(),
                ))
            }
            "getNextBlockValidators" => {
                let validators = next_block_validators(ctx.snapshot(), ctx.settings())?;
                Ok(StackItem::new_array(
                    validators
                        .iter()
                        .map(|k| StackItem::from_bytes(k.to_bytes()))
                        .collect(),
                ))
            }
            "getAccountState" => {
                match account_state(ctx.snapshot(), &arg_hash(0)?) {
                    Some(state) => Ok(StackItem::new_struct(vec![
                        StackItem::from_int(state.balance),
                        StackItem::from_int(state.balance_height as i64),
                        state
                            .vote_to
                            .map(|k| StackItem::from_bytes(k.to_bytes()))
                            .unwrap_or(StackItem::Null),
                    ])),
                    None => Ok(StackItem::Null),
                }
            }
            "getRegisterPrice" => Ok(StackItem::from_int(register_price(ctx.snapshot()))),
            "setRegisterPrice" => {
                let price = args[0]
                    .as_int()
                    .map_err(ContractError::Vm)?
                    .to_i64()
                    .filter(|p| *p > 0)
                    .ok_or_else(|| {
                        ContractError::InvalidArgument("invalid register price".to_string())
                    })?;
                if !ctx.check_committee()? {
                    return Err(ContractError::Unauthorized(
                        "committee witness required".to_string(),
                    ));
                }
                ctx.put_storage(ID, &[PREFIX_REGISTER_PRICE], price.to_le_bytes().to_vec())?;
                Ok(StackItem::Null)
            }
            other => Err(ContractError::MethodNotFound(other.to_string())),
        }
    }
}
