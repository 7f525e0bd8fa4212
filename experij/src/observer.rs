use parking_lot::Mutex;

use descriptor::Descriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Control,
    Experiment,
}

/// A method accepted into an experiment set.
#[derive(Debug, Clone, Copy)]
pub struct Registration<'a> {
    pub class_name: &'a str,
    pub experiment: &'a str,
    pub method: &'a str,
    pub role: Role,
    pub descriptor: &'a Descriptor,
    pub is_static: bool,
}

/// Notified after each successful registration.
pub trait RegistrationObserver: Send + Sync {
    fn registered(&self, registration: &Registration<'_>);
}

/// Reports registrations through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl RegistrationObserver for LogObserver {
    fn registered(&self, r: &Registration<'_>) {
        log::info!(
            "Registering {}.{}{} as {} of `{}`",
            r.class_name,
            r.method,
            r.descriptor,
            match r.role {
                Role::Control => "control",
                Role::Experiment => "experiment",
            },
            r.experiment
        );
    }
}

/// An owned copy of a [`Registration`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRegistration {
    pub experiment: String,
    pub method: String,
    pub role: Role,
}

/// Keeps every registration it sees, in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    records: Mutex<Vec<RecordedRegistration>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<RecordedRegistration> {
        self.records.lock().clone()
    }
}

impl RegistrationObserver for RecordingObserver {
    fn registered(&self, r: &Registration<'_>) {
        self.records.lock().push(RecordedRegistration {
            experiment: r.experiment.to_owned(),
            method: r.method.to_owned(),
            role: r.role,
        });
    }
}
