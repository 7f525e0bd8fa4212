//! JVM method descriptors parsed into typed parameter and return slots.
//!
//! A [`Descriptor`] assigns every parameter a local slot, advancing by the
//! parameter's width: `long` and `double` take two slots, everything else
//! (including arrays and object references) takes one.

mod descriptor;
mod param;

pub use descriptor::{Descriptor, DescriptorError, MAX_ARRAY_DEPTH, MAX_PARAMETER_SLOTS};
pub use param::{BaseType, InvalidOperation, Operation, Param, TypeTag};
