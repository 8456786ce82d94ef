//! Project dependency graph resolution using petgraph.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::DfsPostOrder;
use petgraph::Direction;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::repository::RepositoryLocation;
use crate::solution::{SolutionLoader, SolutionProject};
use crate::unit::ProjectUnit;

/// Directed acyclic graph of project references.
///
/// Edges point from a project to the projects it depends on.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
    projects: HashMap<NodeIndex, SolutionProject>,
    cached_order: Vec<String>,
}

impl DependencyGraph {
    /// Builds the graph from a project listing.
    ///
    /// Repeated names collapse onto their first entry.
    ///
    /// # Errors
    ///
    /// Returns an error if a dependency names an unknown project or the
    /// references form a cycle.
    pub fn new(projects: Vec<SolutionProject>) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();
        let mut projects_map = HashMap::new();
        let mut declared = Vec::with_capacity(projects.len());

        for project in projects {
            if node_map.contains_key(&project.name) {
                continue;
            }
            let node = graph.add_node(project.name.clone());
            node_map.insert(project.name.clone(), node);
            declared.push(node);
            projects_map.insert(node, project);
        }

        let available = {
            let mut names: Vec<&str> = node_map.keys().map(String::as_str).collect();
            names.sort_unstable();
            names.join(", ")
        };

        for &from in &declared {
            let project = &projects_map[&from];
            for dep_name in &project.dependencies {
                let to = node_map
                    .get(dep_name)
                    .ok_or_else(|| Error::ProjectNotFound {
                        name: dep_name.clone(),
                        available: available.clone(),
                    })?;
                graph.update_edge(from, *to, ());
            }
        }

        toposort(&graph, None).map_err(|cycle| {
            Error::CircularDependency(format!(
                "Cycle detected involving: {}",
                graph[cycle.node_id()]
            ))
        })?;

        let cached_order = Self::dependency_first_order(&graph, &declared);

        Ok(Self {
            graph,
            node_map,
            projects: projects_map,
            cached_order,
        })
    }

    /// Post-order walk from each project in declaration order, so every
    /// project follows its dependencies and keeps its first-reached slot.
    fn dependency_first_order(graph: &DiGraph<String, ()>, declared: &[NodeIndex]) -> Vec<String> {
        let mut order = Vec::with_capacity(declared.len());
        let mut dfs = DfsPostOrder::empty(graph);

        for &start in declared {
            dfs.move_to(start);
            while let Some(node) = dfs.next(graph) {
                order.push(graph[node].clone());
            }
        }

        order
    }

    #[inline]
    pub fn get_project(&self, name: &str) -> Option<&SolutionProject> {
        self.node_map
            .get(name)
            .and_then(|idx| self.projects.get(idx))
    }

    /// Returns project names with dependencies before dependents.
    #[inline]
    pub fn topological_order(&self) -> &[String] {
        &self.cached_order
    }

    /// Returns direct dependencies of a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the project is not found in the graph.
    pub fn dependencies(&self, name: &str) -> Result<Vec<String>> {
        self.neighbors(name, Direction::Outgoing)
    }

    /// Returns direct dependents of a project (projects that reference it).
    ///
    /// # Errors
    ///
    /// Returns an error if the project is not found in the graph.
    pub fn dependents(&self, name: &str) -> Result<Vec<String>> {
        self.neighbors(name, Direction::Incoming)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Result<Vec<String>> {
        let node = self.node_map.get(name).ok_or_else(|| {
            let available: Vec<String> = self.cached_order.clone();
            Error::ProjectNotFound {
                name: name.to_string(),
                available: available.join(", "),
            }
        })?;

        Ok(self
            .graph
            .neighbors_directed(*node, direction)
            .map(|idx| self.graph[idx].clone())
            .collect())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cached_order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cached_order.is_empty()
    }
}

/// Turns a hub manifest into the ordered list of units to package.
pub struct DependencyGraphResolver<'a> {
    loader: &'a dyn SolutionLoader,
    solution_extension: String,
}

impl<'a> DependencyGraphResolver<'a> {
    pub fn new(loader: &'a dyn SolutionLoader, solution_extension: impl Into<String>) -> Self {
        Self {
            loader,
            solution_extension: solution_extension.into(),
        }
    }

    /// Loads the manifest and returns its units, dependencies first, each
    /// mapped to the repository that owns it.
    ///
    /// # Errors
    ///
    /// Fails on unreadable manifests, unknown references, cycles, or a unit
    /// without a sibling solution named after it.
    pub fn resolve(&self, manifest_path: &Path) -> Result<Vec<ProjectUnit>> {
        info!("Getting projects in {}", manifest_path.display());

        let solution = self.loader.load(manifest_path)?;
        let graph = DependencyGraph::new(solution.projects)?;

        let units = graph
            .topological_order()
            .iter()
            .filter_map(|name| graph.get_project(name))
            .map(|project| self.unit_for(project))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Resolved order: {}",
            units
                .iter()
                .map(|u| u.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(units)
    }

    fn unit_for(&self, project: &SolutionProject) -> Result<ProjectUnit> {
        let solution_path = self.owning_solution(project)?;
        let repository_root = solution_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(ProjectUnit {
            name: project.name.clone(),
            manifest_path: project.manifest_path.clone(),
            solution_path,
            repository: RepositoryLocation::new(repository_root),
            dependencies: project.dependencies.clone(),
            has_local_references: !project.dependencies.is_empty(),
        })
    }

    /// `<repo>/<Name>/<Name>.proj` is owned by `<repo>/<Name>.<ext>`.
    fn owning_solution(&self, project: &SolutionProject) -> Result<PathBuf> {
        let parent = project
            .manifest_path
            .parent()
            .and_then(Path::parent)
            .ok_or_else(|| {
                Error::expectation(format!(
                    "Project {} at {} has no parent directory.",
                    project.name,
                    project.manifest_path.display()
                ))
            })?;

        let solution_path = parent.join(format!("{}.{}", project.name, self.solution_extension));
        if !solution_path.is_file() {
            return Err(Error::expectation(format!(
                "Solution for project {} does not exist at {}.",
                project.name,
                solution_path.display()
            )));
        }

        Ok(solution_path)
    }
}
