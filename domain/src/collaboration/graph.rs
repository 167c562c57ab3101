//! Dependency ordering for intervention steps.
//!
//! Kahn's algorithm over step ids. Unlike a best-effort sort, a cycle is an
//! error: no order is returned for a graph that has one.

use crate::core::error::DomainError;
use std::collections::{HashMap, HashSet, VecDeque};

/// Anything with an id and a list of ids it depends on.
pub trait DependencyNode {
    fn node_id(&self) -> &str;
    fn dependencies(&self) -> &[String];
}

/// Validated adjacency of a node list.
struct Graph {
    in_degree: Vec<usize>,
    dependents: Vec<Vec<usize>>,
}

fn build<N: DependencyNode>(nodes: &[N]) -> Result<Graph, DomainError> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    for (i, node) in nodes.iter().enumerate() {
        if index.insert(node.node_id(), i).is_some() {
            return Err(DomainError::InvalidConfiguration(format!(
                "duplicate step id '{}'",
                node.node_id()
            )));
        }
    }

    let mut in_degree = vec![0usize; nodes.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];

    for (i, node) in nodes.iter().enumerate() {
        let mut seen = HashSet::new();
        for dep in node.dependencies() {
            let Some(&j) = index.get(dep.as_str()) else {
                return Err(DomainError::UnknownDependency {
                    step: node.node_id().to_string(),
                    dependency: dep.clone(),
                });
            };
            if seen.insert(j) {
                in_degree[i] += 1;
                dependents[j].push(i);
            }
        }
    }

    Ok(Graph {
        in_degree,
        dependents,
    })
}

fn cycle_error<N: DependencyNode>(nodes: &[N], in_degree: &[usize]) -> DomainError {
    DomainError::CycleDetected(
        nodes
            .iter()
            .zip(in_degree)
            .filter(|(_, deg)| **deg > 0)
            .map(|(n, _)| n.node_id().to_string())
            .collect(),
    )
}

/// Indices of `nodes` in dependency order.
///
/// Ties keep input order, so an already-ordered chain comes back unchanged.
pub fn topological_order<N: DependencyNode>(nodes: &[N]) -> Result<Vec<usize>, DomainError> {
    let Graph {
        mut in_degree,
        dependents,
    } = build(nodes)?;

    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(i) = queue.pop_front() {
        order.push(i);
        for &d in &dependents[i] {
            in_degree[d] -= 1;
            if in_degree[d] == 0 {
                queue.push_back(d);
            }
        }
    }

    if order.len() < nodes.len() {
        return Err(cycle_error(nodes, &in_degree));
    }
    Ok(order)
}

/// Group indices into phases: a node enters the first phase after all of
/// its dependencies.
pub fn dependency_phases<N: DependencyNode>(nodes: &[N]) -> Result<Vec<Vec<usize>>, DomainError> {
    let Graph {
        mut in_degree,
        dependents,
    } = build(nodes)?;

    let mut current: Vec<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut phases = Vec::new();
    let mut placed = 0;

    while !current.is_empty() {
        let mut next = Vec::new();
        for &i in &current {
            for &d in &dependents[i] {
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    next.push(d);
                }
            }
        }
        next.sort_unstable();
        placed += current.len();
        phases.push(current);
        current = next;
    }

    if placed < nodes.len() {
        return Err(cycle_error(nodes, &in_degree));
    }
    Ok(phases)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Node(&'static str, Vec<String>);

    impl DependencyNode for Node {
        fn node_id(&self) -> &str {
            self.0
        }
        fn dependencies(&self) -> &[String] {
            &self.1
        }
    }

    fn node(id: &'static str, deps: &[&str]) -> Node {
        Node(id, deps.iter().map(|d| d.to_string()).collect())
    }

    #[test]
    fn test_chain_keeps_order() {
        let nodes = vec![node("a", &[]), node("b", &["a"]), node("c", &["b"])];
        assert_eq!(topological_order(&nodes).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_reverse_declared_chain_is_sorted() {
        let nodes = vec![node("c", &["b"]), node("b", &["a"]), node("a", &[])];
        assert_eq!(topological_order(&nodes).unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let nodes = vec![
            node("a", &[]),
            node("b", &["a", "d"]),
            node("c", &["b"]),
            node("d", &["c"]),
        ];
        let err = topological_order(&nodes).unwrap_err();
        assert_eq!(
            err,
            DomainError::CycleDetected(vec!["b".into(), "c".into(), "d".into()])
        );
        assert!(matches!(
            dependency_phases(&nodes),
            Err(DomainError::CycleDetected(_))
        ));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let nodes = vec![node("a", &["a"])];
        assert!(matches!(
            topological_order(&nodes),
            Err(DomainError::CycleDetected(_))
        ));
    }

    #[test]
    fn test_unknown_dependency() {
        let nodes = vec![node("a", &["ghost"])];
        assert_eq!(
            topological_order(&nodes).unwrap_err(),
            DomainError::UnknownDependency {
                step: "a".into(),
                dependency: "ghost".into()
            }
        );
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let nodes = vec![node("a", &[]), node("a", &[])];
        assert!(matches!(
            topological_order(&nodes),
            Err(DomainError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_phases_group_independent_steps() {
        let nodes = vec![
            node("lead", &[]),
            node("x", &["lead"]),
            node("y", &["lead"]),
            node("z", &["x", "y"]),
        ];
        assert_eq!(
            dependency_phases(&nodes).unwrap(),
            vec![vec![0], vec![1, 2], vec![3]]
        );
    }

    #[test]
    fn test_empty_graph() {
        let nodes: Vec<Node> = Vec::new();
        assert!(topological_order(&nodes).unwrap().is_empty());
        assert!(dependency_phases(&nodes).unwrap().is_empty());
    }
}
