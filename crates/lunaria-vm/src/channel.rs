//! Result channel
//!
//! Every call leaves its results here instead of returning them, so the
//! buffer is allocated once per context and reused. A callee that ends in a
//! tail call leaves a pending `TailCall` instead; the caller's trampoline
//! picks it up.

use crate::value::Value;

/// Call deferred to the caller's trampoline
#[derive(Debug, Clone)]
pub struct TailCall {
    pub target: Value,
    pub args: Vec<Value>,
}

/// Reusable buffer for call results
#[derive(Debug, Default)]
pub struct ResultChannel {
    values: Vec<Value>,
    tail_call: Option<TailCall>,
}

impl ResultChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear values and any pending tail call
    pub fn reset(&mut self) {
        self.values.clear();
        self.tail_call = None;
    }

    /// Single result
    pub fn set_to(&mut self, value: Value) {
        self.reset();
        self.values.push(value);
    }

    /// No results
    pub fn set_empty(&mut self) {
        self.reset();
    }

    /// Results from an iterator, keeping the buffer's allocation
    pub fn set_values(&mut self, values: impl IntoIterator<Item = Value>) {
        self.reset();
        self.values.extend(values);
    }

    /// Defer a call to the trampoline
    pub fn set_tail_call(&mut self, target: Value, args: Vec<Value>) {
        self.values.clear();
        self.tail_call = Some(TailCall { target, args });
    }

    pub fn is_tail_call(&self) -> bool {
        self.tail_call.is_some()
    }

    pub fn take_tail_call(&mut self) -> Option<TailCall> {
        self.tail_call.take()
    }

    /// First result, nil when there are none
    pub fn first(&self) -> Value {
        self.get(0)
    }

    /// Result at `idx`, nil past the end
    pub fn get(&self, idx: usize) -> Value {
        self.values.get(idx).cloned().unwrap_or(Value::Nil)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.values
    }

    /// Move the results out, leaving the channel empty
    pub fn take_values(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_results_are_nil() {
        let mut channel = ResultChannel::new();
        channel.set_values(vec![Value::Integer(1)]);
        assert_eq!(channel.first(), Value::Integer(1));
        assert_eq!(channel.get(3), Value::Nil);
        channel.set_empty();
        assert_eq!(channel.first(), Value::Nil);
    }

    #[test]
    fn test_tail_call_replaces_values() {
        let mut channel = ResultChannel::new();
        channel.set_to(Value::Integer(1));
        channel.set_tail_call(Value::Nil, vec![Value::Integer(2)]);
        assert!(channel.is_empty());
        assert!(channel.is_tail_call());

        let call = channel.take_tail_call().unwrap();
        assert_eq!(call.args, vec![Value::Integer(2)]);
        assert!(!channel.is_tail_call());
    }
}
