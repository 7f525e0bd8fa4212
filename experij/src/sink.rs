use bytecode::{AccessFlags, Op, ValueKind};
use descriptor::Descriptor;

/// Receives the instructions of generated methods, in order.
///
/// Implementations write into whatever represents the target class. The
/// emitter never reads anything back; a sink that can fail keeps the error
/// and reports it when the caller collects its output.
pub trait CodeSink {
    fn begin_method(&mut self, access: AccessFlags, name: &str, descriptor: &Descriptor);

    /// Push a local onto the operand stack.
    fn load(&mut self, op: Op, slot: u16);

    /// Pop the operand stack into a local.
    fn store(&mut self, op: Op, slot: u16);

    fn invoke(&mut self, op: Op, owner: &str, name: &str, descriptor: &str);

    /// Push a string constant.
    fn push_string(&mut self, value: &str);

    /// Pop two values of `kind` and push `1` if they are equal, else `0`.
    /// Only called for primitive kinds.
    fn compare(&mut self, kind: ValueKind);

    fn return_value(&mut self, op: Op);

    fn end_method(&mut self);
}

/// One [`CodeSink`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    BeginMethod {
        access: AccessFlags,
        name: String,
        descriptor: String,
    },
    Load {
        op: Op,
        slot: u16,
    },
    Store {
        op: Op,
        slot: u16,
    },
    Invoke {
        op: Op,
        owner: String,
        name: String,
        descriptor: String,
    },
    PushString(String),
    Compare(ValueKind),
    Return(Op),
    EndMethod,
}

/// A sink that keeps every call as a [`SinkEvent`].
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of invoked methods, in call order.
    pub fn invoked(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Invoke { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl CodeSink for RecordingSink {
    fn begin_method(&mut self, access: AccessFlags, name: &str, descriptor: &Descriptor) {
        self.events.push(SinkEvent::BeginMethod {
            access,
            name: name.to_owned(),
            descriptor: descriptor.to_string(),
        });
    }

    fn load(&mut self, op: Op, slot: u16) {
        self.events.push(SinkEvent::Load { op, slot });
    }

    fn store(&mut self, op: Op, slot: u16) {
        self.events.push(SinkEvent::Store { op, slot });
    }

    fn invoke(&mut self, op: Op, owner: &str, name: &str, descriptor: &str) {
        self.events.push(SinkEvent::Invoke {
            op,
            owner: owner.to_owned(),
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
        });
    }

    fn push_string(&mut self, value: &str) {
        self.events.push(SinkEvent::PushString(value.to_owned()));
    }

    fn compare(&mut self, kind: ValueKind) {
        self.events.push(SinkEvent::Compare(kind));
    }

    fn return_value(&mut self, op: Op) {
        self.events.push(SinkEvent::Return(op));
    }

    fn end_method(&mut self) {
        self.events.push(SinkEvent::EndMethod);
    }
}
