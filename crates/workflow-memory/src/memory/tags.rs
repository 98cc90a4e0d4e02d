//! The closed vocabularies of data-type and status tags.

/// Pipeline-scoped data-type tags: `variable`, `secret`, `output`, `_output`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineDataTag {
    Variable,
    Secret,
    Output,
    /// The output template, stored under `_output`.
    OutputTemplate,
}

impl PipelineDataTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Variable => "variable",
            Self::Secret => "secret",
            Self::Output => "output",
            Self::OutputTemplate => "_output",
        }
    }
}

/// Component-scoped data-type tags: `input`, `output`, `element`, `setup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentDataTag {
    Input,
    Output,
    /// Iterator element binding; semantics belong to the orchestrator, the
    /// core treats it as an opaque slot.
    Element,
    Setup,
}

impl ComponentDataTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Element => "element",
            Self::Setup => "setup",
        }
    }
}

/// Component status flags: `started`, `skipped`, `completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFlag {
    Started,
    Skipped,
    Completed,
}

impl StatusFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Skipped => "skipped",
            Self::Completed => "completed",
        }
    }
}
