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

//! Ledger error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("io error: {0}")]
    Io(#[from] neo3_io::IoError),

    #[error("core error: {0}")]
    Core(#[from] neo3_core::CoreError),

    #[error("cryptography error: {0}")]
    Crypto(#[from] neo3_cryptography::CryptoError),

    #[error("persistence error: {0}")]
    Persistence(#[from] neo3_persistence::PersistenceError),

    #[error("contract error: {0}")]
    Contract(#[from] neo3_smart_contract::ContractError),

    /// A system script faulted or storage broke mid-persist. The caller
    /// must not commit and must shut the node down instead of forking
    /// the chain silently.
    #[error("fatal persistence failure at block {index}: {reason}")]
    FatalPersist { index: u32, reason: String },

    #[error("invalid block: {0}")]
    InvalidBlock(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
