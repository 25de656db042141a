//! Argument verification for chains.
//!
//! The verifier walks the flattened steps of a [`Chain`] while keeping the set
//! of names that are available at each point: keys injected by seeds, literal
//! bindings of earlier steps, and the declared outputs of earlier tasks. A
//! required input is satisfied by a literal binding, by a reference binding to
//! an available name, or by being available itself under its own name.

use crate::core::chain::{Chain, Step};
use crate::core::error::InvalidChainArgs;
use crate::core::signature::{Binding, Signature};
use crate::core::validation::ValidationResult;
use std::collections::HashSet;

/// Knobs for [`ChainVerifier`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    check_extra_references: bool,
}

impl VerifyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also require references bound to optional or undeclared inputs to resolve.
    ///
    /// Off by default: only required inputs are inspected.
    pub fn check_extra_references(mut self, enabled: bool) -> Self {
        self.check_extra_references = enabled;
        self
    }

    pub fn checks_extra_references(&self) -> bool {
        self.check_extra_references
    }
}

/// What one step is missing, given the names available before it.
#[derive(Debug, Default)]
struct StepCheck {
    /// Required inputs with no source.
    missing: Vec<String>,
    /// Reference bindings on non-required inputs whose target is unavailable, as `(input, target)`.
    dangling: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChainVerifier {
    options: VerifyOptions,
}

impl ChainVerifier {
    pub fn new(options: VerifyOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> VerifyOptions {
        self.options
    }

    /// Fails on the first step with an unsatisfiable required input.
    ///
    /// Pure function of the chain: calling it again gives the same answer.
    pub fn verify(&self, chain: &Chain) -> Result<(), InvalidChainArgs> {
        let mut available: HashSet<&str> = HashSet::new();

        for (position, step) in chain.steps().iter().enumerate() {
            let sig = match step {
                Step::Seed(seed) => {
                    available.extend(seed.keys());
                    continue;
                }
                Step::Task(sig) => sig,
            };

            let check = check_step(sig, &available);
            let unresolved: Vec<String> = if self.options.check_extra_references {
                check.dangling.into_iter().map(|(input, _)| input).collect()
            } else {
                Vec::new()
            };

            if !check.missing.is_empty() || !unresolved.is_empty() {
                log::debug!(
                    "step {} ('{}') cannot be satisfied: missing {:?}, unresolved {:?}",
                    position,
                    sig.task_name(),
                    check.missing,
                    unresolved
                );
                return Err(InvalidChainArgs {
                    task: sig.task_name().to_string(),
                    position,
                    missing: check.missing,
                    unresolved,
                });
            }

            log::debug!("step {} ('{}') verified", position, sig.task_name());
            contribute(sig, &mut available);
        }

        Ok(())
    }

    /// Walks the whole chain and reports every issue instead of stopping at the first.
    ///
    /// A step that fails still contributes its literals and outputs, so later
    /// steps are judged as if it had been fixed.
    pub fn validate(&self, chain: &Chain) -> ValidationResult {
        let mut result = ValidationResult::new();
        let mut available: HashSet<&str> = HashSet::new();

        for (position, step) in chain.steps().iter().enumerate() {
            let sig = match step {
                Step::Seed(seed) => {
                    available.extend(seed.keys());
                    continue;
                }
                Step::Task(sig) => sig,
            };

            let check = check_step(sig, &available);
            for input in &check.missing {
                let message = match sig.binding(input).and_then(Binding::as_reference) {
                    Some(target) => format!(
                        "requires input '{}', bound to '{}' which no earlier step provides",
                        input, target
                    ),
                    None => format!("requires input '{}' which no earlier step provides", input),
                };
                result.add_error(position, sig.task_name(), message);
            }

            for (input, target) in &check.dangling {
                let message = format!("binds '{}' to '{}' which no earlier step provides", input, target);
                if self.options.check_extra_references {
                    result.add_error(position, sig.task_name(), message);
                } else {
                    result.add_warning(position, sig.task_name(), message);
                }
            }

            contribute(sig, &mut available);
        }

        result
    }
}

/// Verifies `chain` with the default options.
pub fn verify_chain_arguments(chain: &Chain) -> Result<(), InvalidChainArgs> {
    ChainVerifier::default().verify(chain)
}

fn check_step(sig: &Signature, available: &HashSet<&str>) -> StepCheck {
    let mut check = StepCheck::default();
    let contract = sig.contract();

    for required in contract.required_inputs() {
        let satisfied = match sig.binding(required) {
            Some(Binding::Literal(_)) => true,
            Some(Binding::Reference(target)) => available.contains(target.as_str()),
            None => available.contains(required.as_str()),
        };
        if !satisfied {
            check.missing.push(required.clone());
        }
    }

    for (input, binding) in sig.kwargs() {
        if contract.is_required(input) {
            continue;
        }
        if let Binding::Reference(target) = binding {
            if !available.contains(target.as_str()) {
                check.dangling.push((input.clone(), target.clone()));
            }
        }
    }

    check
}

fn contribute<'a>(sig: &'a Signature, available: &mut HashSet<&'a str>) {
    available.extend(sig.literal_keys());
    available.extend(sig.contract().declared_outputs().iter().map(String::as_str));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::signature::InjectArgs;
    use crate::core::task::{Task, TaskDef};
    use crate::core::ArgValue;
    use std::sync::Arc;

    fn task(def: TaskDef) -> Arc<Task> {
        Arc::new(Task::from(def))
    }

    fn noop(name: &str) -> TaskDef {
        TaskDef::new(name, |_| Ok(ArgValue::Null))
    }

    #[test]
    fn test_declared_output_satisfies_next_step() {
        let task1 = task(noop("task1").returns(["stuff"]).unwrap());
        let task2 = task(noop("task2").arg("stuff"));

        assert_eq!(verify_chain_arguments(&(task1.s() | task2.s())), Ok(()));
    }

    #[test]
    fn test_missing_input_is_reported_each_time() {
        let task1 = task(noop("task1"));
        let task2 = task(noop("task2raise").arg("stuff"));
        let chain = task1.s() | task2.s();

        let expected = InvalidChainArgs {
            task: "task2raise".to_string(),
            position: 1,
            missing: vec!["stuff".to_string()],
            unresolved: Vec::new(),
        };
        assert_eq!(chain.verify(), Err(expected.clone()));
        assert_eq!(chain.verify(), Err(expected));
    }

    #[test]
    fn test_literal_binding_becomes_available() {
        let task1 = task(noop("task1"));
        let task2 = task(noop("task2").arg("stuff"));

        assert!((task1.s().with("stuff", "yes") | task2.s()).verify().is_ok());
    }

    #[test]
    fn test_optional_inputs_never_fail() {
        let task1 = task(noop("task1"));
        let task2 = task(noop("task2ok").arg_default("stuff", ArgValue::Null));

        assert!((task1.s() | task2.s()).verify().is_ok());
    }

    #[test]
    fn test_first_offending_step_wins() {
        let a = task(noop("a").arg("x"));
        let b = task(noop("b").arg("y"));

        let err = (a.s() | b.s()).verify().unwrap_err();
        assert_eq!(err.task, "a");
        assert_eq!(err.position, 0);
    }

    #[test]
    fn test_all_missing_inputs_of_the_step_are_listed() {
        let ending = task(noop("ending").arg("final").arg("missing"));
        let err = Chain::from(ending.s()).verify().unwrap_err();
        assert_eq!(err.missing, vec!["final".to_string(), "missing".to_string()]);
    }

    #[test]
    fn test_reference_to_earlier_output() {
        let beginning = task(noop("beginning").arg("start").returns(["final"]).unwrap());
        let middle = task(noop("middle_task").arg("very_important"));

        let ok = beginning.s().with("start", "something") | middle.s().with_ref("very_important", "final");
        assert!(ok.verify().is_ok());

        let bad = beginning.s().with("start", "something")
            | middle.s().with_ref("very_important", "not_there");
        let err = bad.verify().unwrap_err();
        assert_eq!(err.task, "middle_task");
        assert_eq!(err.missing, vec!["very_important".to_string()]);
    }

    #[test]
    fn test_forward_reference_is_rejected() {
        let first = task(noop("first").arg("x"));
        let later = task(noop("later").returns(["produced"]).unwrap());

        let chain = first.s().with_ref("x", "produced") | later.s();
        assert!(chain.verify().is_err());
    }

    #[test]
    fn test_failed_reference_is_not_rescued_by_same_name() {
        let seed = InjectArgs::new().with("x", 1);
        let t = task(noop("t").arg("x"));

        let chain = seed | t.s().with_ref("x", "nowhere");
        assert!(chain.verify().is_err());
    }

    #[test]
    fn test_references_do_not_make_names_available() {
        let a = task(noop("a").returns(["stuff"]).unwrap());
        let b = task(noop("b"));
        let c = task(noop("c").arg("thing"));

        let chain = a.s() | b.s().with_ref("thing", "stuff") | c.s();
        assert!(chain.verify().is_err());
    }

    #[test]
    fn test_seed_satisfies_requirement() {
        let t = task(noop("injected_task2").arg("needed"));
        let chain = InjectArgs::new().with("not_needed", "stuff").with("needed", "thing") | t.s();
        assert!(chain.verify().is_ok());
    }

    #[test]
    fn test_extra_bindings_ignored_by_default() {
        let t = task(noop("task1_no_return"));
        let chain = Chain::from(t.s().with_ref("thing", "stuff").with("random", 1));

        assert!(chain.verify().is_ok());
    }

    #[test]
    fn test_strict_mode_checks_extra_references() {
        let t = task(noop("task1_no_return"));
        let chain = Chain::from(t.s().with_ref("thing", "stuff"));
        let verifier = ChainVerifier::new(VerifyOptions::new().check_extra_references(true));

        let err = verifier.verify(&chain).unwrap_err();
        assert_eq!(
            err,
            InvalidChainArgs {
                task: "task1_no_return".to_string(),
                position: 0,
                missing: Vec::new(),
                unresolved: vec!["thing".to_string()],
            }
        );
        assert!(!err.to_string().contains("missing required"));
    }

    #[test]
    fn test_strict_mode_keeps_missing_and_unresolved_apart() {
        let t = task(noop("t").arg("needed").arg_default("extra", 0));
        let chain = Chain::from(t.s().with_ref("extra", "nowhere"));
        let verifier = ChainVerifier::new(VerifyOptions::new().check_extra_references(true));

        let err = verifier.verify(&chain).unwrap_err();
        assert_eq!(err.missing, vec!["needed".to_string()]);
        assert_eq!(err.unresolved, vec!["extra".to_string()]);

        // Lenient mode only reports the required input.
        let err = chain.verify().unwrap_err();
        assert!(err.unresolved.is_empty());
    }

    #[test]
    fn test_validate_collects_everything() {
        let a = task(noop("a").arg("x"));
        let b = task(noop("b").arg("y").arg_default("z", 0));

        let chain = a.s() | b.s().with_ref("z", "nope");
        let result = ChainVerifier::default().validate(&chain);

        assert!(!result.is_safe());
        assert!(result.has_warnings());
        let errors: Vec<_> = result.errors().collect();
        assert_eq!(errors.len(), 2);
        assert_eq!((errors[0].position(), errors[0].task()), (0, "a"));
        assert!(errors[0].message().contains("requires input 'x'"));
        assert_eq!((errors[1].position(), errors[1].task()), (1, "b"));
        assert!(errors[1].message().contains("requires input 'y'"));

        let warning = result.warnings().next().unwrap();
        assert_eq!(warning.position(), 1);
        assert!(warning.message().contains("binds 'z' to 'nope'"));
        assert_eq!(result.first_failing_step(), Some(0));
    }

    #[test]
    fn test_validate_strict_promotes_warnings() {
        let t = task(noop("t"));
        let chain = Chain::from(t.s().with_ref("thing", "stuff"));
        let verifier = ChainVerifier::new(VerifyOptions::new().check_extra_references(true));

        let result = verifier.validate(&chain);
        assert!(!result.is_safe());
        assert!(!result.has_warnings());
        assert_eq!(result.at_step(0).count(), 1);
    }

    #[test]
    fn test_empty_chain_verifies() {
        assert!(Chain::new().verify().is_ok());
    }
}
