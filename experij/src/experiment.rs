use std::fmt;
use std::sync::Arc;

use bytecode::{AccessFlags, Op};
use descriptor::{Descriptor, MAX_PARAMETER_SLOTS, Param};

use crate::error::ExperimentError;
use crate::observer::{Registration, RegistrationObserver, Role};
use crate::settings::EmitterSettings;
use crate::strings::{confirm_internal_name, confirm_safe, format_template};

/// Access flags of every generated method.
pub const DEFAULT_METHOD_ACCESS: AccessFlags = AccessFlags::PRIVATE
    .union(AccessFlags::SYNTHETIC)
    .union(AccessFlags::FINAL);

/// Access flags of generated methods in static experiment sets.
pub const DEFAULT_STATIC_METHOD_ACCESS: AccessFlags =
    DEFAULT_METHOD_ACCESS.union(AccessFlags::STATIC);

/// The descriptor and calling convention shared by all methods of a set.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Shape {
    descriptor: Descriptor,
    is_static: bool,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let convention = if self.is_static { "static" } else { "instance" };
        write!(f, "{convention} {}", self.descriptor)
    }
}

/// Collects the control and experiment methods of one experiment.
///
/// The first registration fixes the set's descriptor and calling
/// convention; every later registration must match both. A rejected
/// registration leaves the builder untouched.
pub struct ExperimentSetBuilder {
    class_name: String,
    name: String,
    shape: Option<Shape>,
    control: Option<String>,
    experiments: Vec<String>,
    observer: Option<Arc<dyn RegistrationObserver>>,
}

impl fmt::Debug for ExperimentSetBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExperimentSetBuilder")
            .field("class_name", &self.class_name)
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("control", &self.control)
            .field("experiments", &self.experiments)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl ExperimentSetBuilder {
    pub fn new(
        class_name: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, ExperimentError> {
        let class_name = class_name.into();
        let name = name.into();
        confirm_internal_name(&class_name)?;
        confirm_safe(&name)?;
        Ok(Self {
            class_name,
            name,
            shape: None,
            control: None,
            experiments: Vec::with_capacity(3),
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn RegistrationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The adopted descriptor, once something has been registered.
    pub fn descriptor(&self) -> Option<&Descriptor> {
        self.shape.as_ref().map(|shape| &shape.descriptor)
    }

    pub fn is_static(&self) -> Option<bool> {
        self.shape.as_ref().map(|shape| shape.is_static)
    }

    pub fn control(&self) -> Option<&str> {
        self.control.as_deref()
    }

    pub fn experiments(&self) -> &[String] {
        &self.experiments
    }

    pub fn register(
        &mut self,
        method: &str,
        descriptor: Descriptor,
        is_control: bool,
        is_static: bool,
    ) -> Result<&mut Self, ExperimentError> {
        confirm_safe(method)?;

        // `this` counts against the parameter slot limit
        let slots = descriptor.occupied_slots() + u16::from(!is_static);
        if slots > MAX_PARAMETER_SLOTS {
            return Err(ExperimentError::TooManySlots {
                experiment: self.name.clone(),
                method: method.to_owned(),
                slots,
            });
        }

        let found = Shape {
            descriptor,
            is_static,
        };
        if let Some(expected) = &self.shape {
            if expected.is_static != found.is_static
                || expected.descriptor != found.descriptor
            {
                return Err(ExperimentError::SignatureMismatch {
                    experiment: self.name.clone(),
                    method: method.to_owned(),
                    expected: expected.to_string(),
                    found: found.to_string(),
                });
            }
        }

        if is_control {
            if let Some(existing) = &self.control {
                return Err(ExperimentError::DuplicateControl {
                    experiment: self.name.clone(),
                    existing: existing.clone(),
                    method: method.to_owned(),
                });
            }
        } else if self.experiments.iter().any(|name| name == method) {
            return Err(ExperimentError::DuplicateExperimentName {
                experiment: self.name.clone(),
                method: method.to_owned(),
            });
        }

        // All checks passed; commit.
        let shape = self.shape.get_or_insert(found);
        let role = if is_control {
            self.control = Some(method.to_owned());
            Role::Control
        } else {
            self.experiments.push(method.to_owned());
            Role::Experiment
        };
        log::debug!(
            "{}: registered {:?} `{}` ({})",
            self.name,
            role,
            method,
            shape
        );

        if let Some(observer) = &self.observer {
            observer.registered(&Registration {
                class_name: &self.class_name,
                experiment: &self.name,
                method,
                role,
                descriptor: &shape.descriptor,
                is_static: shape.is_static,
            });
        }
        Ok(self)
    }

    /// Checks that the set has a control, a descriptor and at least one
    /// experiment. Does not modify the builder.
    pub fn validate(&self) -> Result<(), ExperimentError> {
        if self.control.is_none() || self.shape.is_none() {
            return Err(ExperimentError::IncompleteExperiment {
                experiment: self.name.clone(),
            });
        }
        if self.experiments.is_empty() {
            return Err(ExperimentError::NoExperiments {
                experiment: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Validates and freezes the set.
    pub fn finish(self) -> Result<ExperimentSet, ExperimentError> {
        self.validate()?;
        let (Some(shape), Some(control)) = (self.shape, self.control) else {
            // validate() rules this out
            return Err(ExperimentError::IncompleteExperiment {
                experiment: self.name,
            });
        };
        Ok(ExperimentSet {
            class_name: self.class_name,
            name: self.name,
            descriptor: shape.descriptor,
            is_static: shape.is_static,
            control,
            experiments: self.experiments,
        })
    }
}

/// A validated experiment: one control and at least one experiment, all
/// sharing a descriptor and calling convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentSet {
    class_name: String,
    name: String,
    descriptor: Descriptor,
    is_static: bool,
    control: String,
    experiments: Vec<String>,
}

impl ExperimentSet {
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn control(&self) -> &str {
        &self.control
    }

    /// Experiment method names in registration order.
    pub fn experiments(&self) -> &[String] {
        &self.experiments
    }

    /// Number of experiments, not counting the control.
    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }

    /// Slots taken by `this`: one for instance sets, none for static ones.
    pub fn receiver_slots(&self) -> u16 {
        if self.is_static { 0 } else { 1 }
    }

    /// The local a parameter lives in once the receiver is accounted for.
    pub fn local_of(&self, param: &Param) -> u16 {
        param.slot() + self.receiver_slots()
    }

    /// First local not taken by the receiver or the parameters.
    pub fn first_free_slot(&self) -> u16 {
        self.descriptor.occupied_slots() + self.receiver_slots()
    }

    pub fn invocation_op(&self) -> Op {
        if self.is_static {
            Op::InvokeStatic
        } else {
            Op::InvokeVirtual
        }
    }

    pub fn method_access(&self) -> AccessFlags {
        if self.is_static {
            DEFAULT_STATIC_METHOD_ACCESS
        } else {
            DEFAULT_METHOD_ACCESS
        }
    }

    pub fn entry_point_name(&self, settings: &EmitterSettings) -> String {
        format_template(&settings.entry_point_format, &[&self.name])
    }

    pub fn renamed_method(&self, settings: &EmitterSettings, method: &str) -> String {
        format_template(&settings.renamed_method_format, &[&method])
    }

    /// Checks the names `settings` generates for this set: the entry point
    /// and every renamed member must be safe method names, distinct from
    /// each other and from the members' own names.
    pub fn check_names(&self, settings: &EmitterSettings) -> Result<(), ExperimentError> {
        let members = || std::iter::once(&self.control).chain(&self.experiments);

        let mut generated = Vec::with_capacity(self.experiments.len() + 2);
        generated.push((
            self.entry_point_name(settings),
            format!("entry point of `{}`", self.name),
        ));
        for method in members() {
            generated.push((self.renamed_method(settings, method), format!("`{method}`")));
        }

        for (i, (name, origin)) in generated.iter().enumerate() {
            confirm_safe(name)?;
            let clash = generated[..i]
                .iter()
                .find(|(other, _)| other == name)
                .map(|(_, other)| other.as_str())
                .or_else(|| members().any(|m| m == name).then_some("a member method"));
            if let Some(other) = clash {
                return Err(ExperimentError::InvalidName {
                    name: name.clone(),
                    reason: format!("generated for {origin} but already used by {other}"),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{RecordedRegistration, RecordingObserver};

    fn desc(text: &str) -> Descriptor {
        Descriptor::parse(text).expect("valid descriptor")
    }

    fn builder() -> ExperimentSetBuilder {
        ExperimentSetBuilder::new("demo/Calc", "sum").unwrap()
    }

    #[test]
    fn first_registration_adopts_shape() {
        let mut b = builder();
        assert_eq!(b.descriptor(), None);
        b.register("fast", desc("(ID)I"), false, true).unwrap();
        assert_eq!(b.descriptor(), Some(&desc("(ID)I")));
        assert_eq!(b.is_static(), Some(true));
    }

    #[test]
    fn mismatched_descriptor_keeps_shape() {
        let mut b = builder();
        b.register("baseline", desc("(ID)I"), true, false).unwrap();
        let err = b.register("fast", desc("(IJ)I"), false, false).unwrap_err();
        assert_eq!(
            err,
            ExperimentError::SignatureMismatch {
                experiment: "sum".into(),
                method: "fast".into(),
                expected: "instance (ID)I".into(),
                found: "instance (IJ)I".into(),
            }
        );
        assert_eq!(b.descriptor(), Some(&desc("(ID)I")));
        assert!(b.experiments().is_empty());
    }

    #[test]
    fn mismatched_convention_keeps_shape() {
        let mut b = builder();
        b.register("fast", desc("(ID)I"), false, false).unwrap();
        let err = b.register("baseline", desc("(ID)I"), true, true).unwrap_err();
        assert!(matches!(err, ExperimentError::SignatureMismatch { .. }));
        assert_eq!(b.is_static(), Some(false));
        assert_eq!(b.control(), None);
    }

    #[test]
    fn textually_different_descriptors_mismatch() {
        let mut b = builder();
        b.register("baseline", desc("(Z)I"), true, true).unwrap();
        assert!(b.register("fast", desc("(I)I"), false, true).is_err());
    }

    #[test]
    fn second_control_is_rejected_in_any_order() {
        let mut b = builder();
        b.register("fast", desc("()I"), false, false).unwrap();
        b.register("baseline", desc("()I"), true, false).unwrap();
        b.register("slow", desc("()I"), false, false).unwrap();
        let err = b.register("other", desc("()I"), true, false).unwrap_err();
        assert_eq!(
            err,
            ExperimentError::DuplicateControl {
                experiment: "sum".into(),
                existing: "baseline".into(),
                method: "other".into(),
            }
        );
        assert_eq!(b.control(), Some("baseline"));
    }

    #[test]
    fn duplicate_experiment_name() {
        let mut b = builder();
        b.register("fast", desc("()I"), false, false).unwrap();
        let err = b.register("fast", desc("()I"), false, false).unwrap_err();
        assert!(matches!(err, ExperimentError::DuplicateExperimentName { .. }));
        assert_eq!(b.experiments(), ["fast"]);
    }

    #[test]
    fn experiments_keep_registration_order() {
        let mut b = builder();
        b.register("c", desc("()J"), false, true)
            .and_then(|b| b.register("a", desc("()J"), false, true))
            .and_then(|b| b.register("ctl", desc("()J"), true, true))
            .and_then(|b| b.register("b", desc("()J"), false, true))
            .unwrap();
        let set = b.finish().unwrap();
        assert_eq!(set.experiments(), ["c", "a", "b"]);
        assert_eq!(set.control(), "ctl");
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn validation_gate() {
        let empty = builder();
        assert_eq!(
            empty.validate(),
            Err(ExperimentError::IncompleteExperiment {
                experiment: "sum".into()
            })
        );

        let mut experiments_only = builder();
        experiments_only.register("fast", desc("()I"), false, false).unwrap();
        assert!(matches!(
            experiments_only.validate(),
            Err(ExperimentError::IncompleteExperiment { .. })
        ));

        let mut control_only = builder();
        control_only.register("baseline", desc("()I"), true, false).unwrap();
        assert_eq!(
            control_only.validate(),
            Err(ExperimentError::NoExperiments {
                experiment: "sum".into()
            })
        );
        assert!(control_only.finish().is_err());

        let mut complete = builder();
        complete.register("baseline", desc("()I"), true, false).unwrap();
        complete.register("fast", desc("()I"), false, false).unwrap();
        assert_eq!(complete.validate(), Ok(()));
        // validate() is read-only
        assert_eq!(complete.experiments(), ["fast"]);
        assert!(complete.finish().is_ok());
    }

    #[test]
    fn instance_set_accessors() {
        let mut b = builder();
        b.register("baseline", desc("(ID)I"), true, false).unwrap();
        b.register("fast", desc("(ID)I"), false, false).unwrap();
        let set = b.finish().unwrap();

        assert_eq!(set.descriptor().occupied_slots(), 3);
        assert_eq!(set.first_free_slot(), 4);
        assert_eq!(set.invocation_op(), Op::InvokeVirtual);
        assert_eq!(set.method_access(), DEFAULT_METHOD_ACCESS);
        assert!(!set.method_access().contains(AccessFlags::STATIC));
        let locals: Vec<_> = set
            .descriptor()
            .parameters()
            .iter()
            .map(|p| set.local_of(p))
            .collect();
        assert_eq!(locals, vec![1, 2]);
    }

    #[test]
    fn static_set_accessors() {
        let mut b = builder();
        b.register("baseline", desc("(JLjava/lang/String;)V"), true, true).unwrap();
        b.register("fast", desc("(JLjava/lang/String;)V"), false, true).unwrap();
        let set = b.finish().unwrap();

        assert_eq!(set.first_free_slot(), 3);
        assert_eq!(set.invocation_op(), Op::InvokeStatic);
        assert_eq!(set.method_access().bits(), 0x101a);
    }

    #[test]
    fn generated_names() {
        let mut b = builder();
        b.register("baseline", desc("()I"), true, false).unwrap();
        b.register("fast", desc("()I"), false, false).unwrap();
        let set = b.finish().unwrap();
        let settings = EmitterSettings::default();

        assert_eq!(set.entry_point_name(&settings), "experij$entry$sum");
        assert_eq!(set.renamed_method(&settings, "fast"), "experij$fast");
    }

    #[test]
    fn unsafe_names_are_rejected() {
        assert!(ExperimentSetBuilder::new("demo/Calc", "bad name").is_err());
        let mut b = builder();
        let err = b.register("<init>", desc("()V"), true, false).unwrap_err();
        assert!(matches!(err, ExperimentError::InvalidName { .. }));
        assert_eq!(b.descriptor(), None);
    }

    #[test]
    fn observer_sees_successful_registrations() {
        let observer = Arc::new(RecordingObserver::new());
        let mut b = builder().with_observer(observer.clone());
        b.register("baseline", desc("()I"), true, false).unwrap();
        let _ = b.register("baseline", desc("()I"), true, false);
        b.register("fast", desc("()I"), false, false).unwrap();

        assert_eq!(observer.records(), vec![
            RecordedRegistration {
                experiment: "sum".into(),
                method: "baseline".into(),
                role: Role::Control,
            },
            RecordedRegistration {
                experiment: "sum".into(),
                method: "fast".into(),
                role: Role::Experiment,
            },
        ]);
    }

    fn ints(count: usize) -> Descriptor {
        desc(&format!("({})I", "I".repeat(count)))
    }

    #[test]
    fn receiver_counts_against_slot_limit() {
        let mut b = builder();
        let err = b.register("baseline", ints(255), true, false).unwrap_err();
        assert_eq!(
            err,
            ExperimentError::TooManySlots {
                experiment: "sum".into(),
                method: "baseline".into(),
                slots: 256,
            }
        );
        assert_eq!(b.descriptor(), None);

        b.register("baseline", ints(254), true, false).unwrap();
        b.register("fast", ints(254), false, false).unwrap();
        assert_eq!(b.finish().unwrap().first_free_slot(), 255);
    }

    #[test]
    fn static_methods_may_use_every_slot() {
        let mut b = builder();
        b.register("baseline", ints(255), true, true).unwrap();
        b.register("fast", ints(255), false, true).unwrap();
        assert_eq!(b.finish().unwrap().first_free_slot(), 255);
    }

    #[test]
    fn malformed_class_name_is_rejected() {
        let err = ExperimentSetBuilder::new("demo.Calc", "sum").unwrap_err();
        assert!(matches!(err, ExperimentError::InvalidName { name, .. } if name == "demo.Calc"));
        assert!(ExperimentSetBuilder::new("", "sum").is_err());
    }

    fn two_member_set() -> ExperimentSet {
        let mut b = builder();
        b.register("baseline", desc("(I)I"), true, true).unwrap();
        b.register("fast", desc("(I)I"), false, true).unwrap();
        b.finish().unwrap()
    }

    fn settings(entry: &str, renamed: &str) -> EmitterSettings {
        EmitterSettings {
            entry_point_format: entry.into(),
            renamed_method_format: renamed.into(),
            ..EmitterSettings::default()
        }
    }

    #[test]
    fn default_generated_names_pass() {
        let set = two_member_set();
        assert_eq!(set.check_names(&EmitterSettings::default()), Ok(()));
        assert_eq!(set.check_names(&settings("{}Entry", "{}Impl")), Ok(()));
    }

    #[test]
    fn unsafe_generated_name_is_rejected() {
        let set = two_member_set();
        let err = set.check_names(&settings("bad name.{}", "{}Impl")).unwrap_err();
        assert!(matches!(err, ExperimentError::InvalidName { name, .. } if name == "bad name.sum"));
    }

    #[test]
    fn colliding_generated_names_are_rejected() {
        let set = two_member_set();

        // no placeholder: every member renamed to the same method
        let err = set.check_names(&settings("{}Entry", "same")).unwrap_err();
        assert_eq!(
            err,
            ExperimentError::InvalidName {
                name: "same".into(),
                reason: "generated for `fast` but already used by `baseline`".into(),
            }
        );

        // entry point and a renamed member coincide
        let err = set.check_names(&settings("baselineImpl", "{}Impl")).unwrap_err();
        assert!(matches!(err, ExperimentError::InvalidName { name, .. } if name == "baselineImpl"));

        // renaming to the member's own name
        let err = set.check_names(&settings("{}Entry", "{}")).unwrap_err();
        assert_eq!(
            err,
            ExperimentError::InvalidName {
                name: "baseline".into(),
                reason: "generated for `baseline` but already used by a member method"
                    .into(),
            }
        );
    }
}
