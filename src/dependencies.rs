//! Read-only view of a schematic's dependencies handed to tasks

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::artifact::Artifact;
use crate::definition::DependencyScope;
use crate::error::Result;
use crate::module_path::ResolvedModulePath;
use crate::product::SchematicProducts;

/// One resolved direct dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchematicDependency {
    pub scope: DependencyScope,
    pub artifact: Artifact,
}

/// Direct dependencies of the schematic under construction, plus the products
/// of every schematic constructed before it
#[derive(Debug, Clone, Default)]
pub struct SchematicDependencies {
    dependencies: Vec<SchematicDependency>,
    products: SchematicProducts,
}

impl SchematicDependencies {
    pub fn new(dependencies: Vec<SchematicDependency>, products: SchematicProducts) -> Self {
        Self {
            dependencies,
            products,
        }
    }

    pub fn dependencies(&self) -> &[SchematicDependency] {
        &self.dependencies
    }

    /// Direct artifacts declared in any of the scopes
    pub fn artifacts(&self, scopes: &[DependencyScope]) -> Vec<Artifact> {
        self.dependencies
            .iter()
            .filter(|dependency| scopes.contains(&dependency.scope))
            .map(|dependency| dependency.artifact.clone())
            .collect()
    }

    /// Resolved module path of the dependencies declared in any of the scopes
    pub fn resolve(&self, scopes: &[DependencyScope]) -> Result<ResolvedModulePath> {
        ResolvedModulePath::of(&self.artifacts(scopes))
    }

    pub fn module_path(&self, scopes: &[DependencyScope]) -> Result<BTreeSet<PathBuf>> {
        Ok(self.resolve(scopes)?.locations())
    }

    /// Module path of implementation dependencies
    pub fn implementation_module_path(&self) -> Result<BTreeSet<PathBuf>> {
        self.module_path(&[DependencyScope::Implementation])
    }

    pub fn schematic_products(&self) -> &SchematicProducts {
        &self.products
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Id;
    use crate::version::SemanticVersion;

    fn dependency(name: &str, version: &str, scope: DependencyScope) -> SchematicDependency {
        SchematicDependency {
            scope,
            artifact: Artifact::new(
                Id::named(name),
                SemanticVersion::parse(version).unwrap(),
                PathBuf::from(format!("{name}-{version}.module")),
            ),
        }
    }

    #[test]
    fn test_module_path_by_scope() {
        let dependencies = SchematicDependencies::new(
            vec![
                dependency("runtime", "1.0.0", DependencyScope::Implementation),
                dependency("junit", "5.0.0", DependencyScope::Test),
            ],
            SchematicProducts::new(),
        );
        assert_eq!(
            dependencies.implementation_module_path().unwrap(),
            BTreeSet::from([PathBuf::from("runtime-1.0.0.module")])
        );
        assert_eq!(
            dependencies
                .module_path(&[DependencyScope::Implementation, DependencyScope::Test])
                .unwrap()
                .len(),
            2
        );
        assert!(dependencies.module_path(&[]).unwrap().is_empty());
    }
}
