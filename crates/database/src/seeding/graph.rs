//! Dependency graph shared by both seeder resolution paths
//!
//! Edges point from a prerequisite to the unit that depends on it. The whole
//! graph is ordered with Kahn's algorithm; a single unit's closure is ordered
//! with a depth-first post-order walk. Both report a cycle as the path of
//! names along it.

use std::collections::{HashMap, VecDeque};

use crate::error::{CycleError, DatabaseError, DatabaseResult};

#[derive(Debug, Clone)]
struct Node {
    name: String,
    dependencies: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

/// Named nodes with named prerequisites, in registration order
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl DependencyGraph {
    /// Build a graph, rejecting duplicate node names
    ///
    /// Dependencies on unknown names are accepted here and reported by the
    /// ordering operations that reach them.
    pub fn new<I, S>(nodes: I) -> DatabaseResult<Self>
    where
        I: IntoIterator<Item = (S, Vec<String>)>,
        S: Into<String>,
    {
        let mut graph = Self::default();
        for (name, dependencies) in nodes {
            let name = name.into();
            if graph.index.contains_key(&name) {
                return Err(DatabaseError::Registration(format!(
                    "Seeder '{}' is registered more than once",
                    name
                )));
            }
            graph.index.insert(name.clone(), graph.nodes.len());
            graph.nodes.push(Node { name, dependencies });
        }
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Declared prerequisites of a node
    pub fn dependencies(&self, name: &str) -> Option<&[String]> {
        self.index.get(name).map(|&i| self.nodes[i].dependencies.as_slice())
    }

    /// Node names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.name.as_str())
    }

    /// Fail if any node depends on a name that is not in the graph
    pub fn validate(&self) -> DatabaseResult<()> {
        for node in 0..self.nodes.len() {
            self.dependency_indices(node)?;
        }
        Ok(())
    }

    /// Order every node so that prerequisites come first (Kahn's algorithm)
    ///
    /// Nodes that become ready at the same time keep registration order.
    pub fn topological_order(&self) -> DatabaseResult<Vec<String>> {
        self.validate()?;

        let n = self.nodes.len();
        let mut in_degree = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

        for node in 0..n {
            for dep in self.dependency_indices(node)? {
                in_degree[node] += 1;
                dependents[dep].push(node);
            }
        }

        let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut processed = vec![false; n];
        let mut order = Vec::with_capacity(n);

        while let Some(current) = queue.pop_front() {
            processed[current] = true;
            order.push(current);

            for &dependent in &dependents[current] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() < n {
            return Err(self.cycle_among_unprocessed(&processed).into());
        }

        Ok(order.into_iter().map(|i| self.nodes[i].name.clone()).collect())
    }

    /// Order `name` and its transitive prerequisites, prerequisites first
    ///
    /// Nodes that depend on `name` are not included.
    pub fn closure_of(&self, name: &str) -> DatabaseResult<Vec<String>> {
        let &start = self.index.get(name).ok_or_else(|| {
            DatabaseError::Registration(format!("Seeder '{}' is not registered", name))
        })?;

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut order = Vec::new();
        self.visit(start, &mut marks, &mut order)?;

        Ok(order.into_iter().map(|i| self.nodes[i].name.clone()).collect())
    }

    /// Depth-first post-order walk with visiting/visited marks
    ///
    /// Each stack frame holds a node and the index of its next dependency.
    fn visit(&self, root: usize, marks: &mut [Mark], order: &mut Vec<usize>) -> DatabaseResult<()> {
        if marks[root] != Mark::Unvisited {
            return Ok(());
        }

        marks[root] = Mark::Visiting;
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;

            if next == self.nodes[node].dependencies.len() {
                stack.pop();
                marks[node] = Mark::Visited;
                order.push(node);
                continue;
            }
            frame.1 += 1;

            let dep = self.dependency_index(node, next)?;
            match marks[dep] {
                Mark::Visited => {}
                Mark::Visiting => return Err(self.cycle_through(&stack, dep).into()),
                Mark::Unvisited => {
                    marks[dep] = Mark::Visiting;
                    stack.push((dep, 0));
                }
            }
        }

        Ok(())
    }

    /// Path from `node`'s frame to the top of the stack, closed with `node`
    fn cycle_through(&self, stack: &[(usize, usize)], node: usize) -> CycleError {
        let start = stack.iter().position(|&(i, _)| i == node).unwrap_or(0);
        let mut path: Vec<String> = stack[start..]
            .iter()
            .map(|&(i, _)| self.nodes[i].name.clone())
            .collect();
        path.push(self.nodes[node].name.clone());
        CycleError::new(path)
    }

    /// Every node Kahn's algorithm could not process waits on another
    /// unprocessed node, so a walk from any of them must close a cycle.
    fn cycle_among_unprocessed(&self, processed: &[bool]) -> CycleError {
        let mut marks: Vec<Mark> = processed
            .iter()
            .map(|&done| if done { Mark::Visited } else { Mark::Unvisited })
            .collect();

        for node in 0..self.nodes.len() {
            if marks[node] != Mark::Unvisited {
                continue;
            }
            let mut order = Vec::new();
            if let Err(DatabaseError::Cycle(cycle)) = self.visit(node, &mut marks, &mut order) {
                return cycle;
            }
        }

        CycleError::new(
            self.nodes
                .iter()
                .zip(processed)
                .filter(|(_, &done)| !done)
                .map(|(n, _)| n.name.clone())
                .collect(),
        )
    }

    fn dependency_indices(&self, node: usize) -> DatabaseResult<Vec<usize>> {
        (0..self.nodes[node].dependencies.len())
            .map(|position| self.dependency_index(node, position))
            .collect()
    }

    fn dependency_index(&self, node: usize, position: usize) -> DatabaseResult<usize> {
        let current = &self.nodes[node];
        let dep = &current.dependencies[position];
        self.index.get(dep).copied().ok_or_else(|| {
            DatabaseError::Registration(format!(
                "Seeder '{}' depends on '{}', but '{}' was not found",
                current.name, dep, dep
            ))
        })
    }
}
