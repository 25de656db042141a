use crate::core::error::InvalidChainArgs;
use crate::core::signature::{InjectArgs, Signature};
use crate::core::verify::verify_chain_arguments;
use std::ops::{BitOr, BitOrAssign};

/// Separator used to build a chain's default label.
pub const LABEL_SEPARATOR: &str = "|";

/// One element of a flattened chain.
#[derive(Debug, Clone)]
pub enum Step {
    Task(Signature),
    Seed(InjectArgs),
}

impl Step {
    /// Task name, `None` for injected seeds.
    pub fn task_name(&self) -> Option<&str> {
        match self {
            Step::Task(sig) => Some(sig.task_name()),
            Step::Seed(_) => None,
        }
    }
}

/// An ordered, flat pipeline of signatures and injected seeds.
///
/// Chains are built with `|`. Nested chains are spliced in place, so
/// `(a | b) | c` and `a | (b | c)` hold the same steps. The left operand's
/// label survives composition; labels on the right-hand side are dropped.
#[derive(Debug, Clone, Default)]
pub struct Chain {
    steps: Vec<Step>,
    label: Option<String>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Appends `other`, flattening it if it is itself a chain.
    pub fn push(&mut self, other: impl Into<Chain>) {
        self.steps.extend(other.into().steps);
    }

    pub fn then(mut self, other: impl Into<Chain>) -> Self {
        self.push(other);
        self
    }

    /// Names of the task steps, in order.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(Step::task_name)
    }

    pub fn get_label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => self.task_names().collect::<Vec<_>>().join(LABEL_SEPARATOR),
        }
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    /// Checks that every step will receive its required arguments.
    pub fn verify(&self) -> Result<(), InvalidChainArgs> {
        verify_chain_arguments(self)
    }
}

impl From<Signature> for Chain {
    fn from(sig: Signature) -> Self {
        let label = sig.explicit_label().map(str::to_string);
        Self {
            steps: vec![Step::Task(sig)],
            label,
        }
    }
}

impl From<InjectArgs> for Chain {
    fn from(seed: InjectArgs) -> Self {
        Self {
            steps: vec![Step::Seed(seed)],
            label: None,
        }
    }
}

impl From<Step> for Chain {
    fn from(step: Step) -> Self {
        match step {
            Step::Task(sig) => sig.into(),
            Step::Seed(seed) => seed.into(),
        }
    }
}

impl<T: Into<Chain>> FromIterator<T> for Chain {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut chain = Chain::new();
        for item in iter {
            chain.push(item);
        }
        chain
    }
}

impl<T: Into<Chain>> Extend<T> for Chain {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}

impl<R: Into<Chain>> BitOr<R> for Chain {
    type Output = Chain;

    fn bitor(self, rhs: R) -> Chain {
        self.then(rhs)
    }
}

impl<R: Into<Chain>> BitOr<R> for Signature {
    type Output = Chain;

    fn bitor(self, rhs: R) -> Chain {
        Chain::from(self).then(rhs)
    }
}

impl<R: Into<Chain>> BitOr<R> for InjectArgs {
    type Output = Chain;

    fn bitor(self, rhs: R) -> Chain {
        Chain::from(self).then(rhs)
    }
}

impl<R: Into<Chain>> BitOrAssign<R> for Chain {
    fn bitor_assign(&mut self, rhs: R) {
        self.push(rhs);
    }
}
