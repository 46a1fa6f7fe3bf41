//! Result of visiting one node.
//!
//! Besides the produced value a signal can carry one unwinding channel: a
//! raised fault, a function return, or a loop `continue`/`break`. Setting a
//! channel always resets the others first, so at most one is active.

use crate::runtime::exception::Fault;
use crate::runtime::value::Value;

#[derive(Debug, Default)]
pub struct Signal {
    pub value: Value,
    pub error: Option<Box<Fault>>,
    pub return_value: Option<Value>,
    pub should_continue: bool,
    pub should_break: bool,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.value = Value::Undefined;
        self.error = None;
        self.return_value = None;
        self.should_continue = false;
        self.should_break = false;
    }

    /// Takes over every unwinding channel of `other` and returns its value.
    pub fn register(&mut self, other: Signal) -> Value {
        self.error = other.error;
        self.return_value = other.return_value;
        self.should_continue = other.should_continue;
        self.should_break = other.should_break;
        other.value
    }

    pub fn success(mut self, value: Value) -> Self {
        self.reset();
        self.value = value;
        self
    }

    pub fn success_return(mut self, value: Value) -> Self {
        self.reset();
        self.return_value = Some(value);
        self
    }

    pub fn success_continue(mut self) -> Self {
        self.reset();
        self.should_continue = true;
        self
    }

    pub fn success_break(mut self) -> Self {
        self.reset();
        self.should_break = true;
        self
    }

    pub fn failure(mut self, fault: Fault) -> Self {
        self.reset();
        self.error = Some(Box::new(fault));
        self
    }

    pub fn should_unwind(&self) -> bool {
        self.error.is_some()
            || self.return_value.is_some()
            || self.should_continue
            || self.should_break
    }

    /// True when the pending unwind is a loop `continue` or `break` only.
    pub fn is_loop_control(&self) -> bool {
        self.error.is_none()
            && self.return_value.is_none()
            && (self.should_continue || self.should_break)
    }

    pub fn take_error(&mut self) -> Option<Fault> {
        self.error.take().map(|fault| *fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_exclusive() {
        let signal = Signal::new().success_break();
        assert!(signal.should_unwind());
        assert!(signal.is_loop_control());

        let signal = signal.success_return(Value::Int(1));
        assert!(!signal.should_break);
        assert!(signal.should_unwind());
        assert!(!signal.is_loop_control());

        let signal = signal.success(Value::Int(2));
        assert!(!signal.should_unwind());
        assert!(matches!(signal.value, Value::Int(2)));
    }

    #[test]
    fn register_takes_over_unwinding() {
        let mut outer = Signal::new();
        let value = outer.register(Signal::new().success_continue());
        assert!(value.is_undefined());
        assert!(outer.should_continue);
    }
}
