//! Module path resolution
//!
//! Artifact trees are flattened into relations: a root relation for every
//! directly declared artifact and an edge relation for every artifact some
//! other artifact requires. Candidates for one id are tried from the highest
//! version down; an edge candidate only counts when its requirer is the
//! version resolved for the requirer's own id. Requirers that lose to a
//! higher version drag the versions they introduced out of the module path.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use crate::artifact::Artifact;
use crate::error::{ConveyorError, Result};
use crate::id::Id;
use crate::version::SemanticVersion;

#[derive(Debug)]
struct Candidate {
    version: SemanticVersion,
    location: PathBuf,
    root: bool,
    /// (id index, version) of every artifact declaring this candidate
    requirers: Vec<(usize, SemanticVersion)>,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Unvisited,
    InProgress,
    Done(Option<usize>),
}

/// Relation graph built from artifact trees
#[derive(Debug, Default)]
pub struct ModulePath {
    ids: Vec<Id>,
    indexes: HashMap<Id, usize>,
    /// Per id, sorted by version descending once built
    candidates: Vec<Vec<Candidate>>,
}

impl ModulePath {
    /// Flatten the trees of directly declared artifacts into relations
    pub fn from_roots(roots: &[Artifact]) -> Self {
        let mut module_path = ModulePath::default();
        let mut pending: Vec<(&Artifact, Option<(usize, SemanticVersion)>)> =
            roots.iter().rev().map(|root| (root, None)).collect();
        while let Some((artifact, requirer)) = pending.pop() {
            let index = module_path.add(artifact, requirer);
            for dependency in artifact.dependencies.iter().rev() {
                pending.push((dependency, Some((index, artifact.version.clone()))));
            }
        }
        for candidates in &mut module_path.candidates {
            candidates.sort_by(|a, b| b.version.cmp(&a.version));
        }
        module_path
    }

    fn add(&mut self, artifact: &Artifact, requirer: Option<(usize, SemanticVersion)>) -> usize {
        let index = match self.indexes.get(&artifact.id) {
            Some(&index) => index,
            None => {
                let index = self.ids.len();
                self.ids.push(artifact.id.clone());
                self.indexes.insert(artifact.id.clone(), index);
                self.candidates.push(Vec::new());
                index
            }
        };
        let candidates = &mut self.candidates[index];
        let position = match candidates.iter().position(|candidate| candidate.version == artifact.version) {
            Some(position) => position,
            None => {
                candidates.push(Candidate {
                    version: artifact.version.clone(),
                    location: artifact.location.clone(),
                    root: false,
                    requirers: Vec::new(),
                });
                candidates.len() - 1
            }
        };
        let candidate = &mut candidates[position];
        match requirer {
            None => candidate.root = true,
            Some(requirer) => {
                if !candidate.requirers.contains(&requirer) {
                    candidate.requirers.push(requirer);
                }
            }
        }
        index
    }

    /// Pick one version per id
    pub fn resolve(&self) -> Result<ResolvedModulePath> {
        let mut states = vec![State::Unvisited; self.ids.len()];
        for index in 0..self.ids.len() {
            if matches!(states[index], State::Unvisited) {
                self.resolve_id(index, &mut states)?;
            }
        }
        let resolved: Vec<Option<&Candidate>> = states
            .iter()
            .enumerate()
            .map(|(index, state)| match state {
                State::Done(Some(position)) => Some(&self.candidates[index][*position]),
                _ => None,
            })
            .collect();
        let mut requirements: Vec<Vec<Id>> = vec![Vec::new(); self.ids.len()];
        for (index, candidates) in self.candidates.iter().enumerate() {
            for (requirer, version) in candidates.iter().flat_map(|candidate| &candidate.requirers) {
                let requirer_resolved = resolved[*requirer].is_some_and(|found| found.version == *version);
                if requirer_resolved && !requirements[*requirer].contains(&self.ids[index]) {
                    requirements[*requirer].push(self.ids[index].clone());
                }
            }
        }
        let artifacts: Vec<ResolvedArtifact> = resolved
            .iter()
            .zip(requirements)
            .enumerate()
            .filter_map(|(index, (candidate, dependencies))| {
                candidate.map(|candidate| ResolvedArtifact {
                    id: self.ids[index].clone(),
                    version: candidate.version.clone(),
                    location: candidate.location.clone(),
                    dependencies,
                })
            })
            .collect();
        debug!(artifacts = artifacts.len(), "resolved module path");
        Ok(ResolvedModulePath { artifacts })
    }

    /// Iterative depth-first evaluation: a frame waits on the resolution of
    /// the requirer of the candidate it is examining. Requirers still being
    /// decided further down the stack are skipped; a candidate is only
    /// rejected as cyclic once none of its other requirers satisfies it.
    fn resolve_id(&self, start: usize, states: &mut [State]) -> Result<()> {
        struct Frame {
            id: usize,
            candidate: usize,
            requirer: usize,
            deferred: Option<usize>,
        }

        impl Frame {
            fn new(id: usize) -> Self {
                Self {
                    id,
                    candidate: 0,
                    requirer: 0,
                    deferred: None,
                }
            }
        }

        states[start] = State::InProgress;
        let mut stack = vec![Frame::new(start)];
        while let Some(frame) = stack.last_mut() {
            let candidates = &self.candidates[frame.id];
            let Some(candidate) = candidates.get(frame.candidate) else {
                states[frame.id] = State::Done(None);
                stack.pop();
                continue;
            };
            if candidate.root {
                states[frame.id] = State::Done(Some(frame.candidate));
                stack.pop();
                continue;
            }
            let Some((requirer, requirer_version)) = candidate.requirers.get(frame.requirer) else {
                if let Some(deferred) = frame.deferred {
                    let mut chain: Vec<String> =
                        stack.iter().map(|frame| self.ids[frame.id].to_string()).collect();
                    chain.push(self.ids[deferred].to_string());
                    return Err(ConveyorError::CyclicRequirement { chain });
                }
                frame.candidate += 1;
                frame.requirer = 0;
                continue;
            };
            match states[*requirer] {
                State::Done(resolved) => {
                    let satisfied = resolved.is_some_and(|position| {
                        self.candidates[*requirer][position].version == *requirer_version
                    });
                    if satisfied {
                        states[frame.id] = State::Done(Some(frame.candidate));
                        stack.pop();
                    } else {
                        frame.requirer += 1;
                    }
                }
                State::InProgress => {
                    if frame.deferred.is_none() {
                        frame.deferred = Some(*requirer);
                    }
                    frame.requirer += 1;
                }
                State::Unvisited => {
                    let requirer = *requirer;
                    states[requirer] = State::InProgress;
                    stack.push(Frame::new(requirer));
                }
            }
        }
        Ok(())
    }
}

/// One artifact of a resolved module path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedArtifact {
    pub id: Id,
    pub version: SemanticVersion,
    pub location: PathBuf,
    /// Ids required by this version
    pub dependencies: Vec<Id>,
}

/// Exactly one version per id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedModulePath {
    artifacts: Vec<ResolvedArtifact>,
}

impl ResolvedModulePath {
    /// Resolve the trees of directly declared artifacts
    pub fn of(roots: &[Artifact]) -> Result<Self> {
        ModulePath::from_roots(roots).resolve()
    }

    pub fn artifacts(&self) -> &[ResolvedArtifact] {
        &self.artifacts
    }

    pub fn get(&self, id: &Id) -> Option<&ResolvedArtifact> {
        self.artifacts.iter().find(|artifact| artifact.id == *id)
    }

    pub fn version(&self, id: &Id) -> Option<&SemanticVersion> {
        self.get(id).map(|artifact| &artifact.version)
    }

    pub fn locations(&self) -> BTreeSet<PathBuf> {
        self.artifacts
            .iter()
            .map(|artifact| artifact.location.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Locations of an artifact and everything it requires, as resolved here
    pub fn view(&self, id: &Id) -> BTreeSet<PathBuf> {
        let mut locations = BTreeSet::new();
        let mut visited: Vec<&Id> = Vec::new();
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            if visited.contains(&id) {
                continue;
            }
            visited.push(id);
            if let Some(artifact) = self.get(id) {
                locations.insert(artifact.location.clone());
                pending.extend(artifact.dependencies.iter());
            }
        }
        locations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(name: &str, version: &str, dependencies: Vec<Artifact>) -> Artifact {
        Artifact::new(
            Id::named(name),
            SemanticVersion::parse(version).unwrap(),
            PathBuf::from(format!("{name}-{version}")),
        )
        .with_dependencies(dependencies)
    }

    fn resolved(roots: &[Artifact]) -> Vec<String> {
        ResolvedModulePath::of(roots)
            .unwrap()
            .locations()
            .into_iter()
            .map(|location| location.display().to_string())
            .collect()
    }

    #[test]
    fn test_single_root() {
        assert_eq!(resolved(&[artifact("a", "1.0.0", vec![])]), vec!["a-1.0.0"]);
    }

    #[test]
    fn test_empty() {
        assert!(ResolvedModulePath::of(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_highest_version_wins() {
        let roots = [
            artifact("plugin", "1.0.0", vec![artifact("dependency", "1.0.0", vec![])]),
            artifact("dependency", "2.0.0", vec![]),
        ];
        assert_eq!(resolved(&roots), vec!["dependency-2.0.0", "plugin-1.0.0"]);
    }

    #[test]
    fn test_transitive_higher_version_wins_over_root() {
        let roots = [
            artifact("a", "1.0.0", vec![artifact("c", "2.0.0", vec![])]),
            artifact("c", "1.0.0", vec![]),
        ];
        assert_eq!(resolved(&roots), vec!["a-1.0.0", "c-2.0.0"]);
    }

    #[test]
    fn test_exclusion_by_dominance() {
        // b:1 requires c:2, but b:1 loses to b:2 required by a, so c:2 is unreachable
        let roots = [
            artifact("a", "1.0.0", vec![artifact("b", "2.0.0", vec![])]),
            artifact("b", "1.0.0", vec![artifact("c", "2.0.0", vec![])]),
            artifact("c", "1.0.0", vec![]),
        ];
        assert_eq!(resolved(&roots), vec!["a-1.0.0", "b-2.0.0", "c-1.0.0"]);
    }

    #[test]
    fn test_dominated_requirer_drops_its_only_dependency() {
        let roots = [
            artifact("a", "1.0.0", vec![artifact("b", "2.0.0", vec![])]),
            artifact("b", "1.0.0", vec![artifact("only-from-old-b", "1.0.0", vec![])]),
        ];
        assert_eq!(resolved(&roots), vec!["a-1.0.0", "b-2.0.0"]);
    }

    #[test]
    fn test_falls_back_to_next_reachable_version() {
        // c:3 is only reachable through b:1, which loses; c:2 comes through a
        let roots = [
            artifact(
                "a",
                "1.0.0",
                vec![
                    artifact("b", "2.0.0", vec![]),
                    artifact("c", "2.0.0", vec![]),
                ],
            ),
            artifact("b", "1.0.0", vec![artifact("c", "3.0.0", vec![])]),
        ];
        assert_eq!(resolved(&roots), vec!["a-1.0.0", "b-2.0.0", "c-2.0.0"]);
    }

    #[test]
    fn test_same_version_from_two_requirers() {
        // the losing requirer must not hide the winning one
        let roots = [
            artifact("a", "1.0.0", vec![artifact("c", "2.0.0", vec![])]),
            artifact("b", "1.0.0", vec![artifact("c", "2.0.0", vec![])]),
            artifact("b", "2.0.0", vec![]),
        ];
        assert_eq!(resolved(&roots), vec!["a-1.0.0", "b-2.0.0", "c-2.0.0"]);
    }

    #[test]
    fn test_one_version_per_id() {
        let roots = [
            artifact("a", "1.0.0", vec![artifact("x", "1.0.0", vec![]), artifact("y", "3.0.0", vec![])]),
            artifact("b", "1.0.0", vec![artifact("x", "2.0.0", vec![artifact("y", "2.0.0", vec![])])]),
        ];
        let module_path = ResolvedModulePath::of(&roots).unwrap();
        assert_eq!(module_path.artifacts().len(), 4);
        assert_eq!(module_path.version(&Id::named("x")).unwrap().as_str(), "2.0.0");
        assert_eq!(module_path.version(&Id::named("y")).unwrap().as_str(), "3.0.0");
    }

    #[test]
    fn test_cyclic_requirer_chain_is_rejected() {
        // deciding a:2 needs b, deciding b:2 needs a
        let roots = [
            artifact("a", "1.0.0", vec![artifact("b", "2.0.0", vec![artifact("a", "2.0.0", vec![])])]),
            artifact("b", "1.0.0", vec![]),
        ];
        let error = ResolvedModulePath::of(&roots).unwrap_err();
        assert!(matches!(error, ConveyorError::CyclicRequirement { .. }));
    }

    #[test]
    fn test_resolution_does_not_depend_on_root_order() {
        // c:2 is required by both roots; b:2 waits on c, which b:1 also requires
        let a = artifact("a", "1.0.0", vec![artifact("c", "2.0.0", vec![artifact("b", "2.0.0", vec![])])]);
        let b = artifact("b", "1.0.0", vec![artifact("c", "2.0.0", vec![artifact("b", "2.0.0", vec![])])]);
        let expected = vec!["a-1.0.0", "b-2.0.0", "c-2.0.0"];
        assert_eq!(resolved(&[a.clone(), b.clone()]), expected);
        assert_eq!(resolved(&[b, a]), expected);
    }

    #[test]
    fn test_view_follows_resolved_subtree() {
        let plugin = artifact("plugin", "1.0.0", vec![artifact("shared", "1.0.0", vec![])]);
        let other = artifact("other", "1.0.0", vec![artifact("shared", "2.0.0", vec![])]);
        let module_path = ResolvedModulePath::of(&[plugin.clone(), other]).unwrap();

        let view: Vec<PathBuf> = module_path.view(&plugin.id).into_iter().collect();
        assert_eq!(view, vec![PathBuf::from("plugin-1.0.0"), PathBuf::from("shared-2.0.0")]);
        assert!(module_path.view(&Id::named("unknown")).is_empty());
    }
}
