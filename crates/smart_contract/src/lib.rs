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

//! # Neo Smart Contract
//!
//! The application execution layer: the gas-metered [`ApplicationEngine`]
//! driving the VM for a given trigger, the system-call interop table, the
//! contract state model (NEF + manifest) and the nine native contracts.

pub mod application_engine;
pub mod application_executed;
pub mod contract;
pub mod contract_state;
pub mod error;
pub mod interop;
pub mod manifest;
pub mod native;
pub mod storage_context;

pub use application_engine::{ApplicationEngine, Container, TriggerType};
pub use application_executed::{stack_item_to_json, ApplicationExecuted, NotificationRecord};
pub use contract::Contract;
pub use contract_state::{ContractState, NefFile};
pub use error::{ContractError, ContractResult};
pub use manifest::{ContractManifest, MethodDescriptor};
pub use native::{NativeContract, NativeRegistry};
pub use storage_context::{FindOptions, StorageContext};
