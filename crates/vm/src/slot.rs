//! Slots holding static fields, local variables and arguments.

use crate::error::{VmError, VmResult};
use crate::reference_counter::ReferenceCounter;
use crate::stack_item::StackItem;

/// A fixed-size item store attached to an execution context.
#[derive(Debug)]
pub struct Slot {
    items: Vec<StackItem>,
    counter: ReferenceCounter,
}

impl Slot {
    /// A slot of `count` entries initialized to Null.
    pub fn new(count: usize, counter: ReferenceCounter) -> Self {
        counter.add(count);
        Self {
            items: vec![StackItem::Null; count],
            counter,
        }
    }

    /// A slot seeded with the given items (used for arguments).
    pub fn with_items(items: Vec<StackItem>, counter: ReferenceCounter) -> Self {
        counter.add(items.len());
        Self { items, counter }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> VmResult<StackItem> {
        self.items
            .get(index)
            .cloned()
            .ok_or(VmError::InvalidSlotAccess {
                slot: index,
                len: self.items.len(),
            })
    }

    pub fn put(&mut self, index: usize, item: StackItem) -> VmResult<()> {
        let len = self.items.len();
        let entry = self
            .items
            .get_mut(index)
            .ok_or(VmError::InvalidSlotAccess { slot: index, len })?;
        *entry = item;
        Ok(())
    }

    /// Releases the slot's references; called when the owning context
    /// unloads.
    pub fn release(&mut self) {
        self.counter.remove(self.items.len());
        self.items.clear();
    }
}
