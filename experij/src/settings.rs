/// A static method the emitted code calls into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collaborator {
    /// Internal name of the owning class, e.g. `experij/runtime/Equality`.
    pub owner: String,
    pub name: String,
}

impl Collaborator {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

/// Naming templates and runtime collaborators used when emitting entry
/// points. Templates use `{}` for the substituted name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterSettings {
    /// Entry-point name, filled with the experiment name.
    pub entry_point_format: String,
    /// Name a control/experiment method is moved to, filled with its
    /// original name.
    pub renamed_method_format: String,
    /// `(Ljava/lang/Object;Ljava/lang/Object;)Z`
    pub equality: Collaborator,
    /// `(ZLjava/lang/String;Ljava/lang/String;)V`: outcome, experiment,
    /// experiment method.
    pub reporter: Collaborator,
}

pub const DEFAULT_ENTRY_POINT_FORMAT: &str = "experij$entry${}";
pub const DEFAULT_RENAMED_METHOD_FORMAT: &str = "experij${}";
pub const DEFAULT_RUNTIME_OWNER: &str = "experij/runtime/Equality";

impl Default for EmitterSettings {
    fn default() -> Self {
        Self {
            entry_point_format: DEFAULT_ENTRY_POINT_FORMAT.into(),
            renamed_method_format: DEFAULT_RENAMED_METHOD_FORMAT.into(),
            equality: Collaborator::new(DEFAULT_RUNTIME_OWNER, "equals"),
            reporter: Collaborator::new(DEFAULT_RUNTIME_OWNER, "report"),
        }
    }
}
