//! Dependency resolution integration tests
//!
//! Tests closure resolution including:
//! - Hoisting dependencies ahead of the targets needing them
//! - Duplicate-free closures over arbitrary acyclic graphs
//! - Cycle and unknown identifier failures

mod common;

use common::*;
use pgext_core::Error;
use pgext_harness::DependencyResolver;
use proptest::prelude::*;
use test_case::test_case;

fn chain_registry() -> pgext_harness::ExtensionRegistry {
    // earthdistance -> cube, postgis_topology -> postgis, address_standardizer -> postgis
    registry_of(vec![
        RecordBuilder::contrib("cube").build(),
        RecordBuilder::contrib("earthdistance").deps(&["cube"]).build(),
        RecordBuilder::git("postgis", "https://example.org/postgis.git").build(),
        RecordBuilder::git("postgis_topology", "https://example.org/postgis.git")
            .deps(&["postgis"])
            .build(),
        RecordBuilder::staged("address_standardizer")
            .deps(&["postgis"])
            .build(),
    ])
}

#[cfg(test)]
mod dependency_tests {
    use super::*;
    use test_case::test_case;

    #[test_case(&["earthdistance"], &["cube", "earthdistance"] ; "single target with dependency")]
    #[test_case(&["earthdistance", "cube"], &["cube", "earthdistance"] ; "dependency listed after dependent")]
    #[test_case(&["cube", "earthdistance"], &["cube", "earthdistance"] ; "dependency listed first")]
    #[test_case(&["postgis_topology", "address_standardizer"], &["postgis", "postgis_topology", "address_standardizer"] ; "shared dependency appears once")]
    #[test_case(&["address_standardizer", "earthdistance"], &["postgis", "address_standardizer", "cube", "earthdistance"] ; "independent targets keep order")]
    fn test_closure_order(targets: &[&str], expected: &[&str]) {
        let registry = chain_registry();
        let resolver = DependencyResolver::new(&registry);
        assert_eq!(resolver.resolve_closure(targets).unwrap(), expected);
    }

    #[test]
    fn test_pair_closure_with_unknown_dependency_fails() {
        let registry = registry_of(vec![
            RecordBuilder::contrib("cube").build(),
            RecordBuilder::git("pg_fancy", "https://example.org/pg_fancy.git")
                .deps(&["not_registered"])
                .build(),
        ]);
        let resolver = DependencyResolver::new(&registry);

        let err = resolver.resolve_closure(&["cube", "pg_fancy"]).unwrap_err();
        assert!(
            matches!(err, Error::UnknownExtension { ref extension } if extension == "not_registered")
        );
    }

    #[test]
    fn test_cycle_through_registry_records() {
        let registry = registry_of(vec![
            RecordBuilder::contrib("a").deps(&["b"]).build(),
            RecordBuilder::contrib("b").deps(&["a"]).build(),
            RecordBuilder::contrib("c").build(),
        ]);
        let resolver = DependencyResolver::new(&registry);

        assert!(resolver.resolve_closure(&["c"]).is_ok());
        assert!(matches!(
            resolver.resolve_closure(&["c", "a"]),
            Err(Error::CircularDependency { .. })
        ));
    }
}

/// Acyclic graph: node `i` may only depend on nodes with a lower index
fn arb_dag() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1usize..10).prop_flat_map(|size| {
        (0..size)
            .map(|i| {
                if i == 0 {
                    Just(Vec::new()).boxed()
                } else {
                    prop::collection::vec(0..i, 0..3).boxed()
                }
            })
            .collect::<Vec<_>>()
    })
}

fn dag_registry(graph: &[Vec<usize>]) -> pgext_harness::ExtensionRegistry {
    let records = graph
        .iter()
        .enumerate()
        .map(|(i, deps)| {
            let names: Vec<String> = deps.iter().map(|d| format!("ext{d}")).collect();
            let names: Vec<&str> = names.iter().map(String::as_str).collect();
            RecordBuilder::contrib(&format!("ext{i}")).deps(&names).build()
        })
        .collect();
    registry_of(records)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_closure_is_duplicate_free_and_ordered(
        graph in arb_dag(),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 1..4),
    ) {
        let registry = dag_registry(&graph);
        let resolver = DependencyResolver::new(&registry);
        let targets: Vec<String> = picks
            .iter()
            .map(|pick| format!("ext{}", pick.index(graph.len())))
            .collect();

        let closure = resolver.resolve_closure(&targets).unwrap();

        // No duplicates
        let mut unique = closure.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), closure.len());

        // Every target is present
        for target in &targets {
            prop_assert!(closure.contains(target));
        }

        // Dependencies precede dependents
        let position = |name: &str| closure.iter().position(|c| c == name);
        for member in &closure {
            let index: usize = member.trim_start_matches("ext").parse().unwrap();
            let member_pos = position(member).unwrap();
            for dep in &graph[index] {
                let dep_pos = position(&format!("ext{dep}"));
                prop_assert!(dep_pos.is_some());
                prop_assert!(dep_pos.unwrap() < member_pos);
            }
        }
    }
}
