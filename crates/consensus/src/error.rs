// Copyright (C) 2015-2025 The Neo Project.
//
// error.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! Consensus error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("io error: {0}")]
    Io(#[from] neo3_io::IoError),

    #[error("core error: {0}")]
    Core(#[from] neo3_core::CoreError),

    #[error("cryptography error: {0}")]
    Crypto(#[from] neo3_cryptography::CryptoError),

    #[error("ledger error: {0}")]
    Ledger(#[from] neo3_ledger::LedgerError),

    #[error("contract error: {0}")]
    Contract(#[from] neo3_smart_contract::ContractError),

    #[error("this node is not one of the {0} validators")]
    NotAValidator(usize),

    #[error("invalid consensus payload: {0}")]
    InvalidPayload(String),
}

pub type ConsensusResult<T> = Result<T, ConsensusError>;
