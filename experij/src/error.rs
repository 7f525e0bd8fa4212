use std::fmt;

use descriptor::{DescriptorError, InvalidOperation, MAX_PARAMETER_SLOTS};

/// Failure to build, validate or emit an experiment set.
///
/// Every failure is fatal to the set it concerns; nothing is emitted for a
/// set that fails validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperimentError {
    /// An experiment or method name is blank or contains characters that
    /// cannot appear in a generated method name.
    InvalidName { name: String, reason: String },
    /// A method's descriptor or calling convention differs from the one the
    /// set adopted on its first registration. `expected`/`found` render as
    /// `static (I)I` or `instance (I)I`.
    SignatureMismatch {
        experiment: String,
        method: String,
        expected: String,
        found: String,
    },
    DuplicateControl {
        experiment: String,
        existing: String,
        method: String,
    },
    DuplicateExperimentName { experiment: String, method: String },
    /// Parameters plus the receiver of an instance method take more local
    /// slots than a method may have.
    TooManySlots {
        experiment: String,
        method: String,
        slots: u16,
    },
    /// `validate()` found no control method (and so no descriptor).
    IncompleteExperiment { experiment: String },
    NoExperiments { experiment: String },
    InvalidOperation {
        experiment: String,
        source: InvalidOperation,
    },
    /// A method descriptor supplied by the caller did not parse.
    Descriptor(DescriptorError),
}

impl fmt::Display for ExperimentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName { name, reason } => {
                write!(f, "invalid name \"{name}\": {reason}")
            }
            Self::SignatureMismatch {
                experiment,
                method,
                expected,
                found,
            } => write!(
                f,
                "method `{method}` is `{found}` but experiment `{experiment}` \
                 requires `{expected}`; all methods of an experiment must share \
                 one signature"
            ),
            Self::DuplicateControl {
                experiment,
                existing,
                method,
            } => write!(
                f,
                "experiment `{experiment}` already has control `{existing}`, \
                 cannot add `{method}`"
            ),
            Self::DuplicateExperimentName { experiment, method } => write!(
                f,
                "experiment `{experiment}` already contains a method named `{method}`"
            ),
            Self::TooManySlots {
                experiment,
                method,
                slots,
            } => write!(
                f,
                "method `{method}` of `{experiment}` needs {slots} parameter \
                 slots including the receiver, at most {MAX_PARAMETER_SLOTS} \
                 are allowed"
            ),
            Self::IncompleteExperiment { experiment } => {
                write!(f, "no control method was registered for `{experiment}`")
            }
            Self::NoExperiments { experiment } => {
                write!(f, "no experiment methods were registered for `{experiment}`")
            }
            Self::InvalidOperation { experiment, source } => {
                write!(f, "cannot emit `{experiment}`: {source}")
            }
            Self::Descriptor(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ExperimentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidOperation { source, .. } => Some(source),
            Self::Descriptor(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DescriptorError> for ExperimentError {
    fn from(err: DescriptorError) -> Self {
        Self::Descriptor(err)
    }
}
