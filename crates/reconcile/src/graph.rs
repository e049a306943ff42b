//! Dependency ordering over a descriptor set
//!
//! Kahn's algorithm with declaration order as the tie-breaker, so the same
//! descriptor set always yields the same traversal order.

use crate::descriptor::ResourceSpec;
use crate::error::ConfigError;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Compute a total execution order over the descriptor set
///
/// Returns indices into `specs` such that every resource appears strictly
/// after all of its prerequisites. Resources with no ordering constraint
/// between them keep their declaration order.
pub fn execution_order(specs: &[ResourceSpec]) -> Result<Vec<usize>, ConfigError> {
    let mut index_of: HashMap<&str, usize> = HashMap::with_capacity(specs.len());
    for (i, spec) in specs.iter().enumerate() {
        if index_of.insert(spec.id.as_str(), i).is_some() {
            return Err(ConfigError::DuplicateResource(spec.id.clone()));
        }
    }

    // dependents[i] lists the resources waiting on i
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); specs.len()];
    let mut indegree: Vec<usize> = vec![0; specs.len()];

    for (i, spec) in specs.iter().enumerate() {
        for dep in &spec.depends_on {
            let Some(&d) = index_of.get(dep.as_str()) else {
                return Err(ConfigError::UnknownDependency {
                    resource: spec.id.clone(),
                    dependency: dep.clone(),
                });
            };
            dependents[d].push(i);
            indegree[i] += 1;
        }
    }

    // Min-heap over declaration index keeps ties deterministic
    let mut ready: BinaryHeap<Reverse<usize>> = indegree
        .iter()
        .enumerate()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(i, _)| Reverse(i))
        .collect();

    let mut order = Vec::with_capacity(specs.len());
    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for &next in &dependents[i] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if order.len() < specs.len() {
        // Everything left over sits on a cycle or downstream of one
        let members = specs
            .iter()
            .enumerate()
            .filter(|&(i, _)| indegree[i] > 0)
            .map(|(_, s)| s.id.clone())
            .collect();
        return Err(ConfigError::DependencyCycle { members });
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{Apply, Probe, ResourceSpec};
    use crate::types::{Observed, Privilege, StateValue};
    use anyhow::Result;

    #[derive(Debug)]
    struct Inert;

    impl Probe for Inert {
        fn probe(&self) -> Result<Observed> {
            Ok(Observed::Absent)
        }
    }

    impl Apply for Inert {
        fn converge(&self, _desired: &StateValue) -> Result<()> {
            Ok(())
        }
    }

    fn spec(id: &str, deps: &[&str]) -> ResourceSpec {
        let mut s = ResourceSpec::new(id, StateValue::Flag(true), Privilege::User, Box::new(Inert));
        for d in deps {
            s = s.requires(*d);
        }
        s
    }

    fn ids(specs: &[ResourceSpec], order: &[usize]) -> Vec<String> {
        order
            .iter()
            .map(|&i| specs[i].id.as_str().to_string())
            .collect()
    }

    #[test]
    fn independent_resources_keep_declaration_order() {
        let specs = vec![spec("c", &[]), spec("a", &[]), spec("b", &[])];
        let order = execution_order(&specs).unwrap();
        assert_eq!(ids(&specs, &order), vec!["c", "a", "b"]);
    }

    #[test]
    fn dependencies_come_first() {
        let specs = vec![
            spec("daemon", &["pkg"]),
            spec("dns", &["daemon"]),
            spec("pkg", &[]),
        ];
        let order = execution_order(&specs).unwrap();
        assert_eq!(ids(&specs, &order), vec!["pkg", "daemon", "dns"]);
    }

    #[test]
    fn order_is_deterministic_across_runs() {
        let specs = vec![
            spec("b", &["root"]),
            spec("a", &["root"]),
            spec("root", &[]),
        ];
        let first = execution_order(&specs).unwrap();
        for _ in 0..10 {
            assert_eq!(execution_order(&specs).unwrap(), first);
        }
        assert_eq!(ids(&specs, &first), vec!["root", "b", "a"]);
    }

    #[test]
    fn cycle_is_rejected_with_members() {
        let specs = vec![spec("a", &["b"]), spec("b", &["a"]), spec("c", &[])];
        let err = execution_order(&specs).unwrap_err();
        match err {
            ConfigError::DependencyCycle { members } => {
                let names: Vec<_> = members.iter().map(|m| m.as_str()).collect();
                assert!(names.contains(&"a"));
                assert!(names.contains(&"b"));
                assert!(!names.contains(&"c"));
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let specs = vec![spec("a", &["ghost"])];
        let err = execution_order(&specs).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownDependency {
                resource: "a".into(),
                dependency: "ghost".into(),
            }
        );
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let specs = vec![spec("a", &[]), spec("a", &[])];
        let err = execution_order(&specs).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateResource("a".into()));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let specs = vec![spec("a", &["a"])];
        assert!(matches!(
            execution_order(&specs),
            Err(ConfigError::DependencyCycle { .. })
        ));
    }
}
