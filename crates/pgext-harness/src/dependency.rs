//! Dependency resolution using topological sort with DFS

use pgext_core::{Error, Result};
use std::collections::{HashMap, HashSet};

use crate::registry::ExtensionRegistry;

/// Dependency resolver using DFS-based topological sort
#[derive(Debug, Clone)]
pub struct DependencyResolver {
    registry: HashMap<String, Vec<String>>,
}

impl DependencyResolver {
    /// Create a new dependency resolver from an extension registry
    pub fn new(registry: &ExtensionRegistry) -> Self {
        let mut deps = HashMap::new();
        for (name, ext) in registry.extensions() {
            deps.insert(name.clone(), ext.dependencies.clone());
        }
        Self { registry: deps }
    }

    /// Resolve a single extension: its transitive dependencies, then itself
    pub fn resolve(&self, extension: &str) -> Result<Vec<String>> {
        self.resolve_closure(&[extension])
    }

    /// Resolve the duplicate-free closure of `targets`
    ///
    /// Targets keep their relative order; every dependency is hoisted before
    /// the first extension that needs it. An unknown identifier anywhere in
    /// the graph fails the whole resolution.
    pub fn resolve_closure<S: AsRef<str>>(&self, targets: &[S]) -> Result<Vec<String>> {
        let mut resolved = Vec::new();
        let mut seen = HashSet::new();
        let mut visiting = Vec::new();

        for target in targets {
            self.visit(target.as_ref(), &mut resolved, &mut seen, &mut visiting)?;
        }
        Ok(resolved)
    }

    /// Visit an extension node using DFS
    fn visit(
        &self,
        ext: &str,
        resolved: &mut Vec<String>,
        seen: &mut HashSet<String>,
        visiting: &mut Vec<String>,
    ) -> Result<()> {
        // Cycle detection
        if let Some(start) = visiting.iter().position(|v| v == ext) {
            return Err(Error::circular_dependency(&visiting[start..], ext));
        }

        // Already resolved
        if seen.contains(ext) {
            return Ok(());
        }

        let deps = self
            .registry
            .get(ext)
            .ok_or_else(|| Error::unknown_extension(ext))?;

        visiting.push(ext.to_string());

        // Visit dependencies first
        for dep in deps {
            self.visit(dep, resolved, seen, visiting)?;
        }

        visiting.pop();
        seen.insert(ext.to_string());
        resolved.push(ext.to_string());

        Ok(())
    }
}
