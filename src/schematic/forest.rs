//! Discovery, selection and ordering of schematics

use std::collections::BTreeSet;
use std::path::Path;

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use tracing::debug;

use super::Schematic;
use crate::error::{ConveyorError, Result};
use crate::hierarchy::HierarchyLoader;
use crate::plugin::Stage;

/// Every schematic reachable from the root of the requested schematic's chain
#[derive(Debug, Clone)]
pub struct SchematicForest {
    schematics: Vec<Schematic>,
    initial: usize,
}

impl SchematicForest {
    /// Walk up to the root schematic, then down through inclusions depth
    /// first, parents before children.
    pub fn discover(loader: &HierarchyLoader<'_>, path: &Path) -> Result<Self> {
        let initial = Schematic::load(loader, path)?;
        let load = |path: &Path| -> Result<Schematic> {
            if path == initial.path() {
                Ok(initial.clone())
            } else {
                Schematic::load(loader, path)
            }
        };

        let mut schematics: Vec<Schematic> = Vec::new();
        let mut pending = vec![initial.root_path().to_path_buf()];
        while let Some(path) = pending.pop() {
            if schematics.iter().any(|schematic| schematic.path() == path) {
                continue;
            }
            let schematic = load(&path)?;
            pending.extend(schematic.inclusions(loader).into_iter().rev());
            schematics.push(schematic);
        }
        for path in initial.hierarchy().schematic_paths() {
            if !schematics.iter().any(|schematic| schematic.path() == path) {
                schematics.push(load(path)?);
            }
        }
        let initial = schematics
            .iter()
            .position(|schematic| schematic.path() == initial.path())
            .unwrap_or_default();
        debug!(
            schematics = schematics.len(),
            initial = %schematics[initial].name(),
            "discovered schematics"
        );
        Ok(Self { schematics, initial })
    }

    pub fn schematics(&self) -> &[Schematic] {
        &self.schematics
    }

    pub fn initial(&self) -> &Schematic {
        &self.schematics[self.initial]
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.schematics
            .iter()
            .position(|schematic| schematic.name() == name)
    }

    /// Whether `dependent` declares `dependency`, directly or through the
    /// schematic dependencies of other schematics
    pub fn depends_on(&self, dependent: usize, dependency: usize) -> bool {
        let mut visited = vec![false; self.schematics.len()];
        let mut pending = vec![dependent];
        while let Some(current) = pending.pop() {
            if std::mem::replace(&mut visited[current], true) {
                continue;
            }
            for name in self.schematics[current].schematic_dependencies() {
                match self.find(name) {
                    Some(found) if found == dependency => return true,
                    Some(found) => pending.push(found),
                    None => {}
                }
            }
        }
        false
    }

    pub fn inherits_from(&self, child: usize, template: usize) -> bool {
        self.schematics[child].inherits_from(&self.schematics[template])
    }

    /// `template` or `dependency` must be constructed before `schematic`
    pub fn requires(&self, schematic: usize, other: usize) -> bool {
        schematic != other && (self.inherits_from(schematic, other) || self.depends_on(schematic, other))
    }

    /// The requested schematic, its templates, schematics inheriting from it
    /// and whatever these require, in discovery order
    pub fn selection(&self) -> Vec<usize> {
        let initial = self.initial;
        let mut selected: Vec<bool> = (0..self.schematics.len())
            .map(|index| {
                index == initial
                    || self.inherits_from(initial, index)
                    || self.inherits_from(index, initial)
                    || self.depends_on(initial, index)
            })
            .collect();
        let mut changed = true;
        while changed {
            changed = false;
            for index in 0..selected.len() {
                if !selected[index] {
                    continue;
                }
                for other in 0..selected.len() {
                    if !selected[other] && self.requires(index, other) {
                        selected[other] = true;
                        changed = true;
                    }
                }
            }
        }
        (0..selected.len()).filter(|&index| selected[index]).collect()
    }

    /// Topological order where requirements come first and unrelated
    /// schematics keep their discovery order
    pub fn order(&self, selection: &[usize]) -> Result<Vec<usize>> {
        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(selection.len(), selection.len());
        let nodes: Vec<NodeIndex> = selection.iter().map(|&index| graph.add_node(index)).collect();
        for (position, &schematic) in selection.iter().enumerate() {
            for (other_position, &other) in selection.iter().enumerate() {
                if self.requires(schematic, other) {
                    graph.add_edge(nodes[other_position], nodes[position], ());
                }
            }
        }

        let mut in_degree: Vec<usize> = nodes
            .iter()
            .map(|&node| graph.neighbors_directed(node, Direction::Incoming).count())
            .collect();
        let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|&position| in_degree[position] == 0).collect();
        let mut order = Vec::with_capacity(selection.len());
        while let Some(position) = ready.pop_first() {
            order.push(selection[position]);
            for next in graph.neighbors_directed(nodes[position], Direction::Outgoing) {
                let next = next.index();
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        if order.len() < selection.len() {
            let names = kosaraju_scc(&graph)
                .into_iter()
                .filter(|component| component.len() > 1)
                .flatten()
                .map(|node| self.schematics[graph[node]].name().to_string())
                .collect();
            return Err(ConveyorError::CyclicSchematics { names });
        }
        Ok(order)
    }

    /// Schematics other schematics depend on are built at least to ARCHIVE
    /// so their modules exist
    pub fn stage(&self, index: usize, requested: Stage) -> Stage {
        if requested >= Stage::Archive {
            return requested;
        }
        let is_dependency = (0..self.schematics.len())
            .any(|other| other != index && self.depends_on(other, index));
        if is_dependency {
            Stage::Archive
        } else {
            requested
        }
    }

    /// What to construct, in order, and to which stage
    pub fn plan(&self, requested: Stage) -> Result<Vec<(usize, Stage)>> {
        Ok(self
            .order(&self.selection())?
            .into_iter()
            .map(|index| (index, self.stage(index, requested)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{JsonDefinitionReader, ManualDefinition};
    use crate::repository::RepositorySettings;
    use serde_json::{json, Value};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        root_template: ManualDefinition,
        settings: RepositorySettings,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let settings = RepositorySettings {
                remote_cache: temp.path().join("cache"),
                offline: true,
            };
            Self {
                temp,
                root_template: ManualDefinition::default(),
                settings,
            }
        }

        fn write(&self, relative: &str, value: Value) -> PathBuf {
            let path = self.temp.path().join(relative).join("conveyor.json");
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, value.to_string()).unwrap();
            path
        }

        fn forest(&self, path: &Path) -> Result<SchematicForest> {
            let loader = HierarchyLoader::new(&JsonDefinitionReader, &self.root_template, "conveyor.json", &self.settings);
            SchematicForest::discover(&loader, path)
        }
    }

    fn names(forest: &SchematicForest, indexes: &[usize]) -> Vec<String> {
        indexes
            .iter()
            .map(|&index| forest.schematics()[index].name().to_string())
            .collect()
    }

    fn planned(forest: &SchematicForest, stage: Stage) -> Vec<(String, Stage)> {
        forest
            .plan(stage)
            .unwrap()
            .into_iter()
            .map(|(index, stage)| (forest.schematics()[index].name().to_string(), stage))
            .collect()
    }

    #[test]
    fn test_discovery_order_is_depth_first_parent_before_children() {
        let fixture = Fixture::new();
        let root = fixture.write("root", json!({
            "name": "root", "version": "1.0.0", "inclusions": ["b", "a"]
        }));
        fixture.write("root/b", json!({ "name": "b", "version": "1.0.0", "inclusions": ["b2", "b1"] }));
        fixture.write("root/b/b2", json!({ "name": "b2", "version": "1.0.0" }));
        fixture.write("root/b/b1", json!({ "name": "b1", "version": "1.0.0" }));
        fixture.write("root/a", json!({ "name": "a", "version": "1.0.0", "inclusions": ["a1"] }));
        fixture.write("root/a/a1", json!({ "name": "a1", "version": "1.0.0" }));

        let forest = fixture.forest(&root).unwrap();
        let all: Vec<usize> = (0..forest.schematics().len()).collect();
        assert_eq!(names(&forest, &all), vec!["root", "b", "b2", "b1", "a", "a1"]);
        assert_eq!(
            names(&forest, &forest.order(&forest.selection()).unwrap()),
            vec!["root", "b", "b2", "b1", "a", "a1"]
        );
    }

    #[test]
    fn test_discovery_starts_from_root_template() {
        let fixture = Fixture::new();
        fixture.write("root", json!({ "name": "root", "version": "1.0.0", "inclusions": ["first", "second"] }));
        fixture.write("root/first", json!({ "name": "first", "version": "1.0.0" }));
        let second = fixture.write("root/second", json!({ "name": "second", "version": "1.0.0" }));

        let forest = fixture.forest(&second).unwrap();
        assert_eq!(forest.initial().name(), "second");
        assert_eq!(forest.schematics().len(), 3);
        assert_eq!(planned(&forest, Stage::Compile), vec![
            ("root".to_string(), Stage::Compile),
            ("second".to_string(), Stage::Compile),
        ]);
    }

    #[test]
    fn test_dependencies_are_constructed_first_and_escalated() {
        let fixture = Fixture::new();
        let root = fixture.write("root", json!({
            "name": "root", "version": "1.0.0", "inclusions": ["app", "library"]
        }));
        fixture.write("root/app", json!({
            "name": "app", "version": "1.0.0", "dependencies": [{ "schematic": "library" }]
        }));
        fixture.write("root/library", json!({ "name": "library", "version": "1.0.0" }));

        let forest = fixture.forest(&root).unwrap();
        assert_eq!(planned(&forest, Stage::Compile), vec![
            ("root".to_string(), Stage::Compile),
            ("library".to_string(), Stage::Archive),
            ("app".to_string(), Stage::Compile),
        ]);
        assert_eq!(planned(&forest, Stage::Publish), vec![
            ("root".to_string(), Stage::Publish),
            ("library".to_string(), Stage::Publish),
            ("app".to_string(), Stage::Publish),
        ]);
    }

    #[test]
    fn test_transitive_dependency_is_ordered_first() {
        let fixture = Fixture::new();
        let root = fixture.write("root", json!({
            "name": "root", "version": "1.0.0", "inclusions": ["app", "service", "core"]
        }));
        fixture.write("root/app", json!({
            "name": "app", "version": "1.0.0", "dependencies": [{ "schematic": "service" }]
        }));
        fixture.write("root/service", json!({
            "name": "service", "version": "1.0.0", "dependencies": [{ "schematic": "core" }]
        }));
        fixture.write("root/core", json!({ "name": "core", "version": "1.0.0" }));

        let forest = fixture.forest(&root).unwrap();
        let app = forest.find("app").unwrap();
        let core = forest.find("core").unwrap();
        assert!(forest.depends_on(app, core));
        assert!(!forest.depends_on(core, app));
        assert_eq!(
            names(&forest, &forest.order(&forest.selection()).unwrap()),
            vec!["root", "core", "service", "app"]
        );
    }

    #[test]
    fn test_unrelated_sibling_is_skipped() {
        let fixture = Fixture::new();
        fixture.write("root", json!({
            "name": "root", "version": "1.0.0", "inclusions": ["app", "library", "unrelated"]
        }));
        let app = fixture.write("root/app", json!({
            "name": "app", "version": "1.0.0", "dependencies": [{ "schematic": "library" }]
        }));
        fixture.write("root/library", json!({ "name": "library", "version": "1.0.0" }));
        fixture.write("root/unrelated", json!({ "name": "unrelated", "version": "1.0.0" }));

        let forest = fixture.forest(&app).unwrap();
        assert_eq!(names(&forest, &forest.selection()), vec!["root", "app", "library"]);
        assert_eq!(planned(&forest, Stage::Compile), vec![
            ("root".to_string(), Stage::Compile),
            ("library".to_string(), Stage::Archive),
            ("app".to_string(), Stage::Compile),
        ]);
    }

    #[test]
    fn test_cyclic_schematic_dependencies_are_rejected() {
        let fixture = Fixture::new();
        let root = fixture.write("root", json!({
            "name": "root", "version": "1.0.0", "inclusions": ["a", "b"]
        }));
        fixture.write("root/a", json!({
            "name": "a", "version": "1.0.0", "dependencies": [{ "schematic": "b" }]
        }));
        fixture.write("root/b", json!({
            "name": "b", "version": "1.0.0", "dependencies": [{ "schematic": "a" }]
        }));

        let forest = fixture.forest(&root).unwrap();
        let error = forest.order(&forest.selection()).unwrap_err();
        match error {
            ConveyorError::CyclicSchematics { mut names } => {
                names.sort();
                assert_eq!(names, vec!["a", "b"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
