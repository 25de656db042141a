use std::fmt;

/// Something wrong with one task step of a chain, found by a validation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    /// A required input has no source at this point of the chain.
    Error {
        position: usize,
        task: String,
        message: String,
    },
    /// A binding refers to a name nothing upstream provides, but the input is not required.
    Warning {
        position: usize,
        task: String,
        message: String,
    },
}

impl ValidationIssue {
    /// Zero-based index of the step in the flattened chain.
    pub fn position(&self) -> usize {
        match self {
            ValidationIssue::Error { position, .. } | ValidationIssue::Warning { position, .. } => *position,
        }
    }

    pub fn task(&self) -> &str {
        match self {
            ValidationIssue::Error { task, .. } | ValidationIssue::Warning { task, .. } => task,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ValidationIssue::Error { message, .. } | ValidationIssue::Warning { message, .. } => message,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ValidationIssue::Error { .. })
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = if self.is_error() { "error" } else { "warning" };
        write!(
            f,
            "{} at step {} ('{}'): {}",
            severity,
            self.position(),
            self.task(),
            self.message()
        )
    }
}

/// Every issue found along a chain, in step order.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, position: usize, task: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue::Error {
            position,
            task: task.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, position: usize, task: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue::Warning {
            position,
            task: task.into(),
            message: message.into(),
        });
    }

    /// No step has an error. Warnings are allowed.
    pub fn is_safe(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn has_warnings(&self) -> bool {
        self.warnings().next().is_some()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| !i.is_error())
    }

    /// Issues raised against the step at `position`.
    pub fn at_step(&self, position: usize) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.position() == position)
    }

    /// Position of the first step with an error, which is where `verify` would stop.
    pub fn first_failing_step(&self) -> Option<usize> {
        self.errors().map(ValidationIssue::position).min()
    }

    /// Emits every issue through the `log` facade.
    pub fn log_summary(&self) {
        if self.issues.is_empty() {
            log::info!("Chain validation passed: all argument contracts are satisfied.");
            return;
        }

        for issue in &self.issues {
            if issue.is_error() {
                log::error!("{}", issue);
            } else {
                log::warn!("{}", issue);
            }
        }
    }
}
