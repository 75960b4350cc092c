// Copyright (C) 2015-2025 The Neo Project.
//
// lib.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! # Neo Core
//!
//! The ledger data model: fixed-width hashes, witnesses and their scopes,
//! signers, transactions, headers and blocks, together with their
//! deterministic wire encodings.

pub mod block;
pub mod error;
pub mod header;
pub mod signer;
pub mod transaction;
pub mod uint160;
pub mod uint256;
pub mod witness;
pub mod witness_rule;
pub mod witness_scope;

pub use block::Block;
pub use error::{CoreError, CoreResult};
pub use header::Header;
pub use signer::{Signer, MAX_SUB_ITEMS};
pub use transaction::{
    OracleResponseCode, Transaction, TransactionAttribute, TransactionAttributeType,
    HEADER_SIZE, MAX_TRANSACTION_ATTRIBUTES, MAX_TRANSACTION_SIZE,
};
pub use uint160::UInt160;
pub use uint256::UInt256;
pub use witness::Witness;
pub use witness_rule::{WitnessCondition, WitnessConditionType, WitnessRule, WitnessRuleAction};
pub use witness_scope::WitnessScope;
