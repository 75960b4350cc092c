// Copyright (C) 2015-2025 The Neo Project.
//
// error_codes.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! JSON-RPC error codes, grouped by subsystem range.

use neo3_ledger::VerifyResult;

// Standard JSON-RPC 2.0.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

// Unknown entities: -100..-107.
pub const UNKNOWN_BLOCK: i64 = -100;
pub const UNKNOWN_TRANSACTION: i64 = -101;
pub const UNKNOWN_CONTRACT: i64 = -102;
pub const UNKNOWN_STORAGE_ITEM: i64 = -103;
pub const UNKNOWN_SCRIPT_CONTAINER: i64 = -104;
pub const UNKNOWN_SESSION: i64 = -105;
pub const UNKNOWN_ITERATOR: i64 = -106;
pub const UNKNOWN_COMMITTEE: i64 = -107;

// Blockchain: -200..-209.
pub const BLOCK_VALIDATION_FAILED: i64 = -200;
pub const BLOCK_ALREADY_EXISTS: i64 = -201;
pub const BLOCK_UNLINKED: i64 = -202;

// Transactions: -300..-308.
pub const TX_VERIFICATION_FAILED: i64 = -300;
pub const TX_ALREADY_EXISTS: i64 = -301;
pub const TX_MEMPOOL_FULL: i64 = -302;
pub const TX_ALREADY_IN_POOL: i64 = -303;
pub const TX_INSUFFICIENT_FUNDS: i64 = -304;
pub const TX_EXPIRED: i64 = -305;
pub const TX_POLICY_FAILED: i64 = -306;
pub const TX_INVALID_SIGNATURE: i64 = -307;
pub const TX_CONFLICT: i64 = -308;

// Contracts: -400..-407.
pub const CONTRACT_EXECUTION_FAILED: i64 = -400;
pub const CONTRACT_INVALID_PARAMETER: i64 = -401;

// Network: -500..-505.
pub const NETWORK_UNAVAILABLE: i64 = -500;

// Storage: -800..-803.
pub const STORAGE_READ_FAILED: i64 = -800;

// Security: -900..-903.
pub const ACCESS_DENIED: i64 = -900;

/// Maps a relay rejection onto its transaction-range error code.
pub fn code_for_verify_result(result: VerifyResult) -> i64 {
    match result {
        VerifyResult::Succeed => 0,
        VerifyResult::AlreadyExists => TX_ALREADY_EXISTS,
        VerifyResult::AlreadyInPool => TX_ALREADY_IN_POOL,
        VerifyResult::OutOfMemory => TX_MEMPOOL_FULL,
        VerifyResult::InsufficientFunds => TX_INSUFFICIENT_FUNDS,
        VerifyResult::Expired => TX_EXPIRED,
        VerifyResult::PolicyFail => TX_POLICY_FAILED,
        VerifyResult::InvalidSignature | VerifyResult::InvalidWitness => TX_INVALID_SIGNATURE,
        VerifyResult::HasConflicts => TX_CONFLICT,
        _ => TX_VERIFICATION_FAILED,
    }
}
