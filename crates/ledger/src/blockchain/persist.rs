// Copyright (C) 2015-2025 The Neo Project.
//
// persist.rs file belongs to the neo project and is free
// software distributed under the MIT software license, see the
// accompanying file LICENSE in the main directory of the
// repository or http://www.opensource.org/licenses/mit-license.php
// for more details.
//
// Redistribution and use in source and binary forms with or without
// modifications are permitted.

//! The atomic persist sequence.
//!
//! OnPersist, the transactions and PostPersist all run against one
//! layered snapshot; each transaction executes in its own child layer
//! that is folded in on halt and thrown away on fault. Only after the
//! whole sequence succeeds does the outer layer reach the durable
//! store.

use super::Blockchain;
use crate::error::{LedgerError, LedgerResult};
use neo3_core::Block;
use neo3_persistence::Snapshot;
use neo3_smart_contract::native::{gas_token, ledger_contract};
use neo3_smart_contract::{
    ApplicationEngine, ApplicationExecuted, Container, NativeRegistry, TriggerType,
};
use neo3_vm::{CallFlags, VMState};
use std::sync::Arc;

impl Blockchain {
    /// Executes and commits `block`. Caller holds the persist lock and
    /// has already verified the block. A returned error is fatal: the
    /// store was left untouched and the node must stop.
    pub(super) fn persist_block(
        &self,
        block: &Arc<Block>,
    ) -> LedgerResult<Vec<Arc<ApplicationExecuted>>> {
        let root = Snapshot::on_store(self.store.clone()).into_handle();
        let mut logs = Vec::with_capacity(block.transactions.len() + 2);

        let mut engine = ApplicationEngine::create_system(
            TriggerType::OnPersist,
            root.clone(),
            block.clone(),
            self.settings.clone(),
            self.natives.clone(),
        )?;
        if block.index() == 0 {
            engine.initialize_natives()?;
        }
        engine.load_script(NativeRegistry::on_persist_script(), CallFlags::ALL)?;
        if engine.execute() != VMState::HALT {
            return Err(LedgerError::FatalPersist {
                index: block.index(),
                reason: engine
                    .fault_message()
                    .unwrap_or_else(|| "OnPersist faulted".to_string()),
            });
        }
        logs.push(Arc::new(engine.into_executed(None)));

        for tx in &block.transactions {
            let tx = Arc::new(tx.clone());
            let tx_hash = tx.hash()?;
            let child = Snapshot::child_of(&root)?.into_handle();
            let mut engine = ApplicationEngine::create(
                TriggerType::Application,
                Some(Container::Transaction(tx.clone())),
                child.clone(),
                Some(block.clone()),
                self.settings.clone(),
                self.natives.clone(),
                tx.system_fee,
            )?;
            engine.load_script(tx.script.clone(), CallFlags::ALL)?;
            let state = engine.execute();
            if state == VMState::HALT {
                child.write().commit()?;
            } else {
                child.write().discard();
            }
            // The record was written by Ledger.onPersist with state
            // NONE; stamp the actual outcome.
            ledger_contract::set_transaction_state(&root, &tx_hash, state)?;
            // OnPersist burned the declared system fee; the sender only
            // owes what execution actually consumed.
            if let Some(sender) = tx.sender() {
                let unspent = tx.system_fee - engine.gas_consumed().min(tx.system_fee);
                gas_token::refund_unspent_gas(&root, &sender, unspent)?;
            }
            logs.push(Arc::new(engine.into_executed(Some(tx_hash))));
        }

        let mut engine = ApplicationEngine::create_system(
            TriggerType::PostPersist,
            root.clone(),
            block.clone(),
            self.settings.clone(),
            self.natives.clone(),
        )?;
        engine.load_script(NativeRegistry::post_persist_script(), CallFlags::ALL)?;
        if engine.execute() != VMState::HALT {
            return Err(LedgerError::FatalPersist {
                index: block.index(),
                reason: engine
                    .fault_message()
                    .unwrap_or_else(|| "PostPersist faulted".to_string()),
            });
        }
        logs.push(Arc::new(engine.into_executed(None)));

        root.write().commit()?;
        Ok(logs)
    }
}
