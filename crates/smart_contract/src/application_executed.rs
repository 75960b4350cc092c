//! Execution transcripts kept in the application log.

use crate::application_engine::TriggerType;
use neo3_core::{UInt160, UInt256};
use neo3_vm::{StackItem, VMState};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One notification emitted during execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub contract: UInt160,
    pub event_name: String,
    /// The state array rendered to JSON at commit time.
    pub state: Value,
}

/// The consensus-relevant transcript of one engine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationExecuted {
    /// The transaction hash, absent for OnPersist/PostPersist runs.
    pub tx_hash: Option<UInt256>,
    pub trigger: TriggerType,
    pub vm_state: String,
    pub gas_consumed: i64,
    /// The fault description when `vm_state` is FAULT.
    pub exception: Option<String>,
    /// The result stack rendered to JSON.
    pub stack: Vec<Value>,
    pub notifications: Vec<NotificationRecord>,
}

impl ApplicationExecuted {
    pub fn halted(&self) -> bool {
        self.vm_state == VMState::HALT.to_string()
    }
}

/// Renders a stack item to the JSON shape RPC clients expect.
pub fn stack_item_to_json(item: &StackItem, depth_left: usize) -> Value {
    use base64::Engine as _;
    if depth_left == 0 {
        return json!({"type": item.type_name()});
    }
    match item {
        StackItem::Null => json!({"type": "Any", "value": Value::Null}),
        StackItem::Boolean(value) => json!({"type": "Boolean", "value": value}),
        StackItem::Integer(value) => json!({"type": "Integer", "value": value.to_string()}),
        StackItem::ByteString(bytes) => json!({
            "type": "ByteString",
            "value": base64::engine::general_purpose::STANDARD.encode(bytes.as_slice()),
        }),
        StackItem::Buffer(bytes) => json!({
            "type": "Buffer",
            "value": base64::engine::general_purpose::STANDARD.encode(bytes.borrow().as_slice()),
        }),
        StackItem::Array(items) => json!({
            "type": "Array",
            "value": items
                .borrow()
                .iter()
                .map(|i| stack_item_to_json(i, depth_left - 1))
                .collect::<Vec<_>>(),
        }),
        StackItem::Struct(items) => json!({
            "type": "Struct",
            "value": items
                .borrow()
                .iter()
                .map(|i| stack_item_to_json(i, depth_left - 1))
                .collect::<Vec<_>>(),
        }),
        StackItem::Map(map) => json!({
            "type": "Map",
            "value": map
                .borrow()
                .entries()
                .iter()
                .map(|(k, v)| {
                    json!({
                        "key": stack_item_to_json(k, depth_left - 1),
                        "value": stack_item_to_json(v, depth_left - 1),
                    })
                })
                .collect::<Vec<_>>(),
        }),
        StackItem::Pointer(position) => json!({"type": "Pointer", "value": position}),
        StackItem::InteropInterface(_) => json!({"type": "InteropInterface"}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_primitives() {
        assert_eq!(
            stack_item_to_json(&StackItem::from_int(3), 8)["value"],
            "3"
        );
        assert_eq!(
            stack_item_to_json(&StackItem::from_bool(true), 8)["value"],
            true
        );
    }

    #[test]
    fn renders_nested_arrays_with_depth_cap() {
        let inner = StackItem::new_array(vec![StackItem::from_int(1)]);
        let outer = StackItem::new_array(vec![inner]);
        let rendered = stack_item_to_json(&outer, 8);
        assert_eq!(rendered["type"], "Array");
        assert_eq!(rendered["value"][0]["type"], "Array");

        let capped = stack_item_to_json(&outer, 1);
        assert_eq!(capped["value"][0]["type"], "Array");
        assert!(capped["value"][0].get("value").is_none());
    }

    #[test]
    fn bytes_render_base64() {
        let rendered = stack_item_to_json(&StackItem::from_bytes(vec![1, 2, 3]), 4);
        assert_eq!(rendered["value"], "AQID");
    }
}
