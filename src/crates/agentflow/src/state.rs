//! Execution state
//!
//! The blackboard shared by the steps of one workflow run, plus the cursor
//! that tracks progress through the single active loop.

use serde_json::{Map, Value};

/// String-keyed structured values, the currency between steps and collaborators
pub type StateMap = Map<String, Value>;

/// Mutable key/value store scoped to one workflow run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionState {
    values: StateMap,
}

impl ExecutionState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Value under `key`, or `Null` when absent
    pub fn get_or_null(&self, key: &str) -> Value {
        self.values.get(key).cloned().unwrap_or(Value::Null)
    }

    /// Value under `key` rendered as text; strings are taken verbatim
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.values.get(key).and_then(value_text)
    }

    /// Store `value` under `key`
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Collect `keys` into a map, absent keys as `Null`
    pub fn select<'a, I>(&self, keys: I) -> StateMap
    where
        I: IntoIterator<Item = &'a String>,
    {
        keys.into_iter()
            .map(|key| (key.clone(), self.get_or_null(key)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop every value
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &StateMap {
        &self.values
    }
}

/// Render a value as prompt/file text
///
/// Strings are used as-is; `Null` has no text; anything else is JSON-encoded.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Progress through the active loop
///
/// At most one exists at a time. `current_index` never exceeds `items.len()`;
/// when they are equal the loop is finished.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopCursor {
    /// Index of the loop step among the workflow's top-level steps
    pub parent: usize,
    /// Snapshot of the list taken when the loop was entered
    pub items: Vec<Value>,
    /// Key the current element is published under
    pub item_key: String,
    /// Element being processed
    pub current_index: usize,
    /// Body sub-step to run next
    pub sub_step: usize,
}

impl LoopCursor {
    /// Start a loop over `items`
    pub fn new(parent: usize, items: Vec<Value>, item_key: impl Into<String>) -> Self {
        Self {
            parent,
            items,
            item_key: item_key.into(),
            current_index: 0,
            sub_step: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.current_index >= self.items.len()
    }

    /// Element at the current index, if still in range
    pub fn current_item(&self) -> Option<&Value> {
        self.items.get(self.current_index)
    }

    /// Move to the next element and rewind the body
    pub fn advance(&mut self) {
        if self.current_index < self.items.len() {
            self.current_index += 1;
        }
        self.sub_step = 0;
    }

    /// Publish the current element into `state`, if still in range
    pub fn publish(&self, state: &mut ExecutionState) {
        if let Some(item) = self.current_item() {
            state.insert(self.item_key.clone(), item.clone());
        }
    }
}
