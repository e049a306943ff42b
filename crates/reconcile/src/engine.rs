//! Reconciliation engine
//!
//! Walks the descriptor set in dependency order, one resource at a time:
//! probe, diff against desired state, apply if needed, re-probe to verify.
//! Per-resource failures are recorded and their dependents skipped; the run
//! itself completes unless `halt_on_failure` is set.

use crate::descriptor::ResourceSpec;
use crate::error::ConfigError;
use crate::graph::execution_order;
use crate::progress::ProgressCallback;
use crate::report::{
    Action, FailureReason, OutcomeStatus, ReconcileOutcome, RunReport, SkipReason,
};
use crate::types::{ResourceId, satisfies};
use chrono::Utc;
use std::collections::HashMap;

/// Privilege context of the running process
///
/// Plain data; detection (euid, sudo) is the caller's job.
#[derive(Debug, Clone, Copy)]
pub struct PrivilegeContext {
    /// Effective uid of the process
    pub uid: u32,
    /// Whether root-level operations are possible
    pub elevated: bool,
}

impl PrivilegeContext {
    pub fn elevated() -> Self {
        Self {
            uid: 0,
            elevated: true,
        }
    }

    pub fn user(uid: u32) -> Self {
        Self {
            uid,
            elevated: false,
        }
    }
}

/// Engine options
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// Stop scheduling further resources after the first failure
    ///
    /// The failing resource's own probe/apply call is never interrupted;
    /// resources not yet scheduled are recorded as skipped.
    pub halt_on_failure: bool,
}

/// Run one full reconciliation pass over the descriptor set
///
/// Configuration errors (duplicate ids, unknown dependencies, cycles) abort
/// before any resource is probed. Everything else is contained in the
/// returned [`RunReport`], one outcome per resource in traversal order.
pub fn reconcile<P: ProgressCallback>(
    specs: &[ResourceSpec],
    privilege: &PrivilegeContext,
    opts: &EngineOptions,
    progress: &mut P,
) -> Result<RunReport, ConfigError> {
    let order = execution_order(specs)?;
    let started_at = Utc::now();

    let mut outcomes: Vec<ReconcileOutcome> = Vec::with_capacity(specs.len());
    let mut succeeded: HashMap<&ResourceId, bool> = HashMap::with_capacity(specs.len());
    let mut halted = false;

    progress.on_run_start(order.len());

    for &i in &order {
        let spec = &specs[i];

        let outcome = if halted {
            ReconcileOutcome {
                id: spec.id.clone(),
                start: None,
                end: None,
                action: Action::None,
                status: OutcomeStatus::Skipped(SkipReason::RunHalted),
            }
        } else if let Some(dep) = failed_dependency(spec, &succeeded) {
            ReconcileOutcome {
                id: spec.id.clone(),
                start: None,
                end: None,
                action: Action::None,
                status: OutcomeStatus::Skipped(SkipReason::DependencyFailed {
                    dependency: dep.clone(),
                }),
            }
        } else {
            progress.on_resource_start(spec.id.as_str());
            reconcile_one(spec, privilege)
        };

        if opts.halt_on_failure && matches!(outcome.status, OutcomeStatus::Failed(_)) {
            halted = true;
        }

        succeeded.insert(&spec.id, outcome.status.is_success());
        progress.on_resource_complete(&outcome);
        outcomes.push(outcome);
    }

    progress.on_run_complete();

    Ok(RunReport {
        outcomes,
        started_at,
        finished_at: Utc::now(),
    })
}

/// First prerequisite that did not succeed, if any
fn failed_dependency<'a>(
    spec: &'a ResourceSpec,
    succeeded: &HashMap<&ResourceId, bool>,
) -> Option<&'a ResourceId> {
    spec.depends_on
        .iter()
        .find(|dep| !succeeded.get(dep).copied().unwrap_or(false))
}

/// Drive one resource through probe / diff / apply / verify
fn reconcile_one(spec: &ResourceSpec, privilege: &PrivilegeContext) -> ReconcileOutcome {
    // Probing a root facility may itself need privilege, so gate up front
    if spec.needs_root() && !privilege.elevated {
        return ReconcileOutcome {
            id: spec.id.clone(),
            start: None,
            end: None,
            action: Action::None,
            status: OutcomeStatus::Failed(FailureReason::InsufficientPrivilege),
        };
    }

    let start = match spec.handler.probe() {
        Ok(observed) => observed,
        Err(e) => {
            return ReconcileOutcome {
                id: spec.id.clone(),
                start: None,
                end: None,
                action: Action::None,
                status: OutcomeStatus::Failed(FailureReason::Probe {
                    message: format!("{e:#}"),
                }),
            };
        }
    };

    // A converged resource must never reach its applier
    if satisfies(&start, &spec.desired) {
        return ReconcileOutcome {
            id: spec.id.clone(),
            start: Some(start),
            end: None,
            action: Action::None,
            status: OutcomeStatus::Unchanged,
        };
    }

    if let Err(e) = spec.handler.converge(&spec.desired) {
        return ReconcileOutcome {
            id: spec.id.clone(),
            start: Some(start),
            end: None,
            action: Action::Applied,
            status: OutcomeStatus::Failed(FailureReason::Apply {
                message: format!("{e:#}"),
            }),
        };
    }

    // Verify: "the tool reported success" is not "the system changed"
    match spec.handler.probe() {
        Ok(end) if satisfies(&end, &spec.desired) => ReconcileOutcome {
            id: spec.id.clone(),
            start: Some(start),
            end: Some(end),
            action: Action::Applied,
            status: OutcomeStatus::Converged,
        },
        Ok(end) => ReconcileOutcome {
            id: spec.id.clone(),
            start: Some(start),
            end: Some(end.clone()),
            action: Action::Applied,
            status: OutcomeStatus::Failed(FailureReason::Verification { observed: end }),
        },
        Err(_) => ReconcileOutcome {
            id: spec.id.clone(),
            start: Some(start),
            end: None,
            action: Action::Applied,
            status: OutcomeStatus::Failed(FailureReason::Verification {
                observed: crate::types::Observed::Unknown,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Apply, Probe};
    use crate::progress::NoProgress;
    use crate::types::{Observed, Privilege, StateValue};
    use anyhow::Result;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted handler: serves probe observations in order, counts calls
    #[derive(Debug)]
    struct Scripted {
        observations: Mutex<Vec<Observed>>,
        probe_fails: bool,
        apply_fails: bool,
        probes: Arc<AtomicUsize>,
        applies: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(observations: Vec<Observed>) -> Self {
            Self {
                observations: Mutex::new(observations),
                probe_fails: false,
                apply_fails: false,
                probes: Arc::new(AtomicUsize::new(0)),
                applies: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
            (Arc::clone(&self.probes), Arc::clone(&self.applies))
        }
    }

    impl Probe for Scripted {
        fn probe(&self) -> Result<Observed> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.probe_fails {
                anyhow::bail!("probe tool failed");
            }
            let mut obs = self.observations.lock().unwrap();
            // Last observation repeats: state is stable once reached
            if obs.len() > 1 {
                Ok(obs.remove(0))
            } else {
                Ok(obs.first().cloned().unwrap_or(Observed::Unknown))
            }
        }
    }

    impl Apply for Scripted {
        fn converge(&self, _desired: &StateValue) -> Result<()> {
            self.applies.fetch_add(1, Ordering::SeqCst);
            if self.apply_fails {
                anyhow::bail!("apply tool failed");
            }
            Ok(())
        }
    }

    fn on() -> StateValue {
        StateValue::Flag(true)
    }

    fn present() -> Observed {
        Observed::Value(StateValue::Flag(true))
    }

    fn run(specs: &[ResourceSpec], privilege: &PrivilegeContext) -> RunReport {
        reconcile(specs, privilege, &EngineOptions::default(), &mut NoProgress).unwrap()
    }

    #[test]
    fn converged_resource_is_unchanged_and_never_applied() {
        let handler = Scripted::new(vec![present()]);
        let (_, applies) = handler.counters();
        let specs = vec![ResourceSpec::new(
            "a",
            on(),
            Privilege::User,
            Box::new(handler),
        )];

        let report = run(&specs, &PrivilegeContext::user(501));
        assert_eq!(report.outcomes[0].status, OutcomeStatus::Unchanged);
        assert_eq!(report.outcomes[0].action, Action::None);
        assert_eq!(applies.load(Ordering::SeqCst), 0);
        assert!(report.overall_success());
    }

    #[test]
    fn second_pass_over_converged_set_is_all_unchanged() {
        // Absent on first probe, present ever after: pass one converges,
        // pass two must not apply anything.
        let handler = Scripted::new(vec![Observed::Absent, present()]);
        let (probes, applies) = handler.counters();
        let specs = vec![ResourceSpec::new(
            "a",
            on(),
            Privilege::User,
            Box::new(handler),
        )];
        let privilege = PrivilegeContext::user(501);

        let first = run(&specs, &privilege);
        assert_eq!(first.outcomes[0].status, OutcomeStatus::Converged);
        assert_eq!(applies.load(Ordering::SeqCst), 1);
        assert_eq!(probes.load(Ordering::SeqCst), 2);

        let second = run(&specs, &privilege);
        assert_eq!(second.outcomes[0].status, OutcomeStatus::Unchanged);
        assert_eq!(applies.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn divergent_resource_is_applied_and_verified() {
        let handler = Scripted::new(vec![Observed::Absent, present()]);
        let specs = vec![ResourceSpec::new(
            "a",
            on(),
            Privilege::User,
            Box::new(handler),
        )];

        let report = run(&specs, &PrivilegeContext::user(501));
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.status, OutcomeStatus::Converged);
        assert_eq!(outcome.action, Action::Applied);
        assert_eq!(outcome.start, Some(Observed::Absent));
        assert_eq!(outcome.end, Some(present()));
    }

    /// Probe answers once, then the tool starts failing
    #[derive(Debug)]
    struct ProbeDropsOut {
        probes: AtomicUsize,
    }

    impl ProbeDropsOut {
        fn new() -> Self {
            Self {
                probes: AtomicUsize::new(0),
            }
        }
    }

    impl Probe for ProbeDropsOut {
        fn probe(&self) -> Result<Observed> {
            if self.probes.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(Observed::Absent)
            } else {
                anyhow::bail!("probe tool failed")
            }
        }
    }

    impl Apply for ProbeDropsOut {
        fn converge(&self, _desired: &StateValue) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn reprobe_error_after_apply_is_a_verification_failure() {
        // Apply succeeded but the re-probe errored: convergence is unprovable,
        // which is a verification failure, not a probe failure.
        let specs = vec![ResourceSpec::new(
            "a",
            on(),
            Privilege::User,
            Box::new(ProbeDropsOut::new()),
        )];

        let report = run(&specs, &PrivilegeContext::user(501));
        let outcome = &report.outcomes[0];
        assert_eq!(
            outcome.status,
            OutcomeStatus::Failed(FailureReason::Verification {
                observed: Observed::Unknown
            })
        );
        assert_eq!(outcome.start, Some(Observed::Absent));
        assert_eq!(outcome.action, Action::Applied);
    }

    #[test]
    fn lying_applier_yields_verification_failure() {
        // Applier "succeeds" but the system never changes
        let handler = Scripted::new(vec![Observed::Absent]);
        let specs = vec![ResourceSpec::new(
            "a",
            on(),
            Privilege::User,
            Box::new(handler),
        )];

        let report = run(&specs, &PrivilegeContext::user(501));
        assert_eq!(
            report.outcomes[0].status,
            OutcomeStatus::Failed(FailureReason::Verification {
                observed: Observed::Absent
            })
        );
        assert!(!report.overall_success());
    }

    #[test]
    fn root_resource_without_elevation_is_gated_before_probing() {
        let handler = Scripted::new(vec![present()]);
        let (probes, _) = handler.counters();
        let specs = vec![ResourceSpec::new(
            "fw",
            on(),
            Privilege::Root,
            Box::new(handler),
        )];

        let report = run(&specs, &PrivilegeContext::user(501));
        assert_eq!(
            report.outcomes[0].status,
            OutcomeStatus::Failed(FailureReason::InsufficientPrivilege)
        );
        assert_eq!(probes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn root_resource_with_elevation_runs_normally() {
        let handler = Scripted::new(vec![present()]);
        let specs = vec![ResourceSpec::new(
            "fw",
            on(),
            Privilege::Root,
            Box::new(handler),
        )];

        let report = run(&specs, &PrivilegeContext::elevated());
        assert_eq!(report.outcomes[0].status, OutcomeStatus::Unchanged);
    }

    #[test]
    fn dependents_of_a_failure_are_skipped_untouched() {
        let broken = Scripted {
            probe_fails: true,
            ..Scripted::new(vec![])
        };
        let dependent = Scripted::new(vec![Observed::Absent, present()]);
        let (dep_probes, dep_applies) = dependent.counters();

        let specs = vec![
            ResourceSpec::new("pkg", on(), Privilege::User, Box::new(broken)),
            ResourceSpec::new("daemon", on(), Privilege::User, Box::new(dependent))
                .requires("pkg"),
        ];

        let report = run(&specs, &PrivilegeContext::user(501));
        assert!(matches!(
            report.outcomes[0].status,
            OutcomeStatus::Failed(FailureReason::Probe { .. })
        ));
        assert_eq!(
            report.outcomes[1].status,
            OutcomeStatus::Skipped(SkipReason::DependencyFailed {
                dependency: "pkg".into()
            })
        );
        assert_eq!(dep_probes.load(Ordering::SeqCst), 0);
        assert_eq!(dep_applies.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn skip_cascades_through_dependency_chains() {
        let broken = Scripted {
            apply_fails: true,
            ..Scripted::new(vec![Observed::Absent])
        };
        let specs = vec![
            ResourceSpec::new("a", on(), Privilege::User, Box::new(broken)),
            ResourceSpec::new(
                "b",
                on(),
                Privilege::User,
                Box::new(Scripted::new(vec![present()])),
            )
            .requires("a"),
            ResourceSpec::new(
                "c",
                on(),
                Privilege::User,
                Box::new(Scripted::new(vec![present()])),
            )
            .requires("b"),
        ];

        let report = run(&specs, &PrivilegeContext::user(501));
        assert!(matches!(
            report.outcomes[0].status,
            OutcomeStatus::Failed(FailureReason::Apply { .. })
        ));
        assert!(matches!(
            report.outcomes[1].status,
            OutcomeStatus::Skipped(SkipReason::DependencyFailed { .. })
        ));
        assert!(matches!(
            report.outcomes[2].status,
            OutcomeStatus::Skipped(SkipReason::DependencyFailed { .. })
        ));
    }

    #[test]
    fn independent_branch_still_converges_after_a_failure() {
        let broken = Scripted {
            probe_fails: true,
            ..Scripted::new(vec![])
        };
        let specs = vec![
            ResourceSpec::new("a", on(), Privilege::User, Box::new(broken)),
            ResourceSpec::new(
                "b",
                on(),
                Privilege::User,
                Box::new(Scripted::new(vec![Observed::Absent, present()])),
            ),
        ];

        let report = run(&specs, &PrivilegeContext::user(501));
        assert_eq!(report.outcomes[1].status, OutcomeStatus::Converged);
    }

    #[test]
    fn halt_on_failure_skips_the_rest_of_the_run() {
        let broken = Scripted {
            probe_fails: true,
            ..Scripted::new(vec![])
        };
        let untouched = Scripted::new(vec![present()]);
        let (probes, _) = untouched.counters();
        let specs = vec![
            ResourceSpec::new("a", on(), Privilege::User, Box::new(broken)),
            ResourceSpec::new("b", on(), Privilege::User, Box::new(untouched)),
        ];

        let opts = EngineOptions {
            halt_on_failure: true,
        };
        let report = reconcile(
            &specs,
            &PrivilegeContext::user(501),
            &opts,
            &mut NoProgress,
        )
        .unwrap();

        assert_eq!(
            report.outcomes[1].status,
            OutcomeStatus::Skipped(SkipReason::RunHalted)
        );
        assert_eq!(probes.load(Ordering::SeqCst), 0);
        assert_eq!(report.outcomes.len(), 2);
    }

    #[test]
    fn cycle_aborts_before_any_probe() {
        let a = Scripted::new(vec![present()]);
        let b = Scripted::new(vec![present()]);
        let (a_probes, _) = a.counters();
        let (b_probes, _) = b.counters();
        let specs = vec![
            ResourceSpec::new("a", on(), Privilege::User, Box::new(a)).requires("b"),
            ResourceSpec::new("b", on(), Privilege::User, Box::new(b)).requires("a"),
        ];

        let err = reconcile(
            &specs,
            &PrivilegeContext::user(501),
            &EngineOptions::default(),
            &mut NoProgress,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::DependencyCycle { .. }));
        assert_eq!(a_probes.load(Ordering::SeqCst), 0);
        assert_eq!(b_probes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn absent_set_converges_in_dependency_order() {
        // Pkg, Daemon (depends on Pkg), Firewall - all absent, all desired on
        let pkg = Scripted::new(vec![Observed::Absent, present()]);
        let daemon = Scripted::new(vec![Observed::Absent, present()]);
        let firewall = Scripted::new(vec![Observed::Absent, present()]);

        let specs = vec![
            ResourceSpec::new("pkg", on(), Privilege::User, Box::new(pkg)),
            ResourceSpec::new("daemon", on(), Privilege::User, Box::new(daemon)).requires("pkg"),
            ResourceSpec::new("firewall", on(), Privilege::User, Box::new(firewall)),
        ];

        let report = run(&specs, &PrivilegeContext::user(501));
        assert!(report.overall_success());
        let order: Vec<_> = report
            .outcomes
            .iter()
            .map(|o| o.id.as_str().to_string())
            .collect();
        assert_eq!(order, vec!["pkg", "daemon", "firewall"]);
        for outcome in &report.outcomes {
            assert_eq!(outcome.status, OutcomeStatus::Converged);
            assert_eq!(outcome.action, Action::Applied);
        }
    }
}
