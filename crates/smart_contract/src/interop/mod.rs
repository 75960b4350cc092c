//! The system-call interop table.
//!
//! Every call carries a fixed price in datoshi and a required call-flags
//! mask; the router checks flags and charges gas before the handler runs.

pub mod contract;
pub mod crypto;
pub mod runtime;
pub mod storage;

use crate::application_engine::HostState;
use neo3_vm::{syscall_hash, CallFlags, ExecutionEngine, VmResult};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Handler signature for interop services.
pub type InteropHandler = fn(&mut HostState, &mut ExecutionEngine) -> VmResult<()>;

/// A registered system call.
pub struct InteropDescriptor {
    pub name: &'static str,
    pub hash: u32,
    /// Fixed price in datoshi; dynamic components are charged inside the
    /// handler.
    pub price: i64,
    pub required_flags: CallFlags,
    pub handler: InteropHandler,
}

impl InteropDescriptor {
    pub fn new(
        name: &'static str,
        price: i64,
        required_flags: CallFlags,
        handler: InteropHandler,
    ) -> Self {
        Self {
            name,
            hash: syscall_hash(name),
            price,
            required_flags,
            handler,
        }
    }
}

static REGISTRY: Lazy<HashMap<u32, InteropDescriptor>> = Lazy::new(|| {
    let mut descriptors = Vec::new();
    descriptors.extend(runtime::descriptors());
    descriptors.extend(storage::descriptors());
    descriptors.extend(contract::descriptors());
    descriptors.extend(crypto::descriptors());
    descriptors
        .into_iter()
        .map(|d| (d.hash, d))
        .collect()
});

/// Looks a descriptor up by its 32-bit hash.
pub fn descriptor(hash: u32) -> Option<&'static InteropDescriptor> {
    REGISTRY.get(&hash)
}

/// Looks a descriptor up by name (tests and tooling).
pub fn descriptor_by_name(name: &str) -> Option<&'static InteropDescriptor> {
    REGISTRY.get(&syscall_hash(name))
}
