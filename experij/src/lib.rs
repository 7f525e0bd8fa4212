//! Shadow experiments at the bytecode level.
//!
//! An experiment groups one *control* method with any number of
//! *experiment* methods sharing its signature. [`ExperimentSetBuilder`]
//! collects and validates the members; [`EntryPointEmitter`] then writes a
//! synthetic entry point that calls every member with the same arguments,
//! compares each experiment's result with the control's, reports the
//! outcome and returns what the control returned.
//!
//! Instructions are written to a [`CodeSink`]. [`MethodAssembler`] encodes
//! them as JVM bytecode; [`RecordingSink`] keeps them as events.

mod assembler;
mod emitter;
mod error;
mod experiment;
mod observer;
mod settings;
mod sink;
pub mod strings;

pub use assembler::{AssembleError, Assembly, MethodAssembler, MethodBody};
pub use emitter::{EQUALITY_DESCRIPTOR, EntryPointEmitter, EqualityDispatch, REPORT_DESCRIPTOR};
pub use error::ExperimentError;
pub use experiment::{
    DEFAULT_METHOD_ACCESS, DEFAULT_STATIC_METHOD_ACCESS, ExperimentSet, ExperimentSetBuilder,
};
pub use observer::{
    LogObserver, RecordedRegistration, RecordingObserver, Registration, RegistrationObserver,
    Role,
};
pub use settings::{
    Collaborator, DEFAULT_ENTRY_POINT_FORMAT, DEFAULT_RENAMED_METHOD_FORMAT,
    DEFAULT_RUNTIME_OWNER, EmitterSettings,
};
pub use sink::{CodeSink, RecordingSink, SinkEvent};

pub use bytecode::{AccessFlags, Op, ValueKind};
pub use descriptor::{Descriptor, DescriptorError, Param, TypeTag};
