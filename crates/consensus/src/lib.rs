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

//! # Neo Consensus
//!
//! The dBFT block production engine: signed consensus messages, the
//! per-round context tracking views, preparations and commits, and the
//! service task that drives a validator through the protocol.

pub mod context;
pub mod error;
pub mod messages;
pub mod service;

pub use context::{ConsensusContext, Proposal};
pub use error::{ConsensusError, ConsensusResult};
pub use messages::{
    ChangeViewReason, ConsensusMessage, ConsensusMessageType, ConsensusPayload,
};
pub use service::{ConsensusInput, ConsensusOutput, DbftService};
