//! A small dependency-graph executor.
//!
//! Tasks declare their prerequisites and the artifact they produce. The graph
//! is expanded from a set of root tasks, deduplicating tasks by value, and
//! executed on a bounded worker pool:
//!
//! - a task whose artifact already exists is skipped (and, when found at
//!   build time, its prerequisites are not even expanded)
//! - a task runs only after all of its prerequisites are done
//! - tasks without a dependency relation run concurrently
//! - a failed task prevents every transitive dependent from running, while
//!   independent tasks carry on; the first failure is reported

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use indexmap::IndexMap;
use rayon::{Scope, ThreadPoolBuilder};
use thiserror::Error;
use tracing::{debug, error, info};

/// A unit of work in a [`TaskGraph`].
///
/// Task identity is the value itself: two equal tasks are the same task.
pub trait GraphTask: Clone + Eq + Hash + fmt::Display + Send + Sync {
    type Error: std::error::Error + Send + 'static;

    /// Tasks that must be done before this one can run.
    fn requires(&self) -> Vec<Self>;

    /// The artifact this task produces.
    fn output(&self) -> PathBuf;

    /// Produce the artifact.
    fn run(&self) -> Result<(), Self::Error>;

    /// Whether the task's artifact already exists.
    fn is_complete(&self) -> bool {
        self.output().exists()
    }
}

/// Lifecycle of one task within an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Pending,
    Running,
    Done,
    Failed,
}

#[derive(Error, Debug)]
pub enum ExecutorError<E: std::error::Error + 'static> {
    #[error("Dependency cycle through task {0}")]
    Cycle(String),

    #[error("Tasks {first} and {second} would both write `{}`", .path.display())]
    Collision {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("Task {task} failed: {source}")]
    Task {
        task: String,
        #[source]
        source: E,
    },

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug)]
struct Node {
    requires: Vec<usize>,
    dependents: Vec<usize>,
    /// Artifact found at build time.
    complete: bool,
}

/// Tasks reachable from a set of roots, deduplicated and ordered so that
/// every prerequisite comes before its dependents.
#[derive(Debug)]
pub struct TaskGraph<T: GraphTask> {
    tasks: IndexMap<T, Node>,
    roots: Vec<usize>,
}

impl<T: GraphTask> TaskGraph<T> {
    /// Expand `roots` into the graph of tasks that still need to happen.
    pub fn build(roots: &[T]) -> Result<Self, ExecutorError<T::Error>> {
        let mut graph = Self {
            tasks: IndexMap::new(),
            roots: Vec::with_capacity(roots.len()),
        };
        let mut outputs: HashMap<PathBuf, usize> = HashMap::new();
        let mut visiting: Vec<T> = Vec::new();

        for root in roots {
            let index = graph.visit(root, &mut outputs, &mut visiting)?;
            if !graph.roots.contains(&index) {
                graph.roots.push(index);
            }
        }
        Ok(graph)
    }

    fn visit(
        &mut self,
        task: &T,
        outputs: &mut HashMap<PathBuf, usize>,
        visiting: &mut Vec<T>,
    ) -> Result<usize, ExecutorError<T::Error>> {
        if let Some(index) = self.tasks.get_index_of(task) {
            return Ok(index);
        }
        if visiting.contains(task) {
            return Err(ExecutorError::Cycle(task.to_string()));
        }

        let complete = task.is_complete();
        let mut requires = Vec::new();
        if !complete {
            visiting.push(task.clone());
            for prerequisite in task.requires() {
                let index = self.visit(&prerequisite, outputs, visiting)?;
                if !requires.contains(&index) {
                    requires.push(index);
                }
            }
            visiting.pop();
        }

        // Checked after expansion so a prerequisite writing the same path is caught too.
        let output = task.output();
        if let Some(&other) = outputs.get(&output) {
            let first = self
                .tasks
                .get_index(other)
                .map(|(t, _)| t.to_string())
                .unwrap_or_default();
            return Err(ExecutorError::Collision {
                path: output,
                first,
                second: task.to_string(),
            });
        }

        let (index, _) = self.tasks.insert_full(
            task.clone(),
            Node {
                requires: requires.clone(),
                dependents: Vec::new(),
                complete,
            },
        );
        for prerequisite in requires {
            if let Some((_, node)) = self.tasks.get_index_mut(prerequisite) {
                node.dependents.push(index);
            }
        }
        outputs.insert(output, index);
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, task: &T) -> bool {
        self.tasks.contains_key(task)
    }

    /// Tasks in dependency order.
    pub fn tasks(&self) -> impl Iterator<Item = &T> {
        self.tasks.keys()
    }

    pub fn roots(&self) -> impl Iterator<Item = &T> {
        self.roots.iter().filter_map(|&i| self.tasks.get_index(i).map(|(t, _)| t))
    }
}

/// Outcome of executing a [`TaskGraph`].
#[derive(Debug)]
pub struct ExecutionReport<T: GraphTask> {
    pub states: Vec<(T, TaskState)>,
    pub executed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub not_run: usize,
    /// Task failures in the order they happened.
    pub errors: Vec<(T, T::Error)>,
}

impl<T: GraphTask> ExecutionReport<T> {
    pub fn state_of(&self, task: &T) -> Option<TaskState> {
        self.states
            .iter()
            .find(|(t, _)| t == task)
            .map(|(_, state)| *state)
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.not_run == 0
    }

    /// The report, or the first task failure.
    pub fn into_result(mut self) -> Result<Self, ExecutorError<T::Error>> {
        if self.errors.is_empty() {
            return Ok(self);
        }
        let (task, source) = self.errors.remove(0);
        Err(ExecutorError::Task {
            task: task.to_string(),
            source,
        })
    }
}

struct Progress<E> {
    remaining: Vec<usize>,
    states: Vec<TaskState>,
    errors: Vec<(usize, E)>,
    executed: usize,
    skipped: usize,
}

struct Context<'g, T: GraphTask> {
    graph: &'g TaskGraph<T>,
    progress: Mutex<Progress<T::Error>>,
}

/// Runs task graphs on a fixed number of worker threads.
#[derive(Debug, Clone, Copy)]
pub struct Executor {
    workers: usize,
}

impl Executor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Execute every task of `graph`.
    ///
    /// Only failing to start the worker pool is an error here; task failures
    /// are collected in the report.
    pub fn run<T: GraphTask>(
        &self,
        graph: TaskGraph<T>,
    ) -> Result<ExecutionReport<T>, ExecutorError<T::Error>> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("extract-worker-{}", i))
            .build()?;

        let nodes: Vec<&Node> = graph.tasks.values().collect();
        let states = nodes
            .iter()
            .map(|n| if n.complete { TaskState::Done } else { TaskState::Pending })
            .collect::<Vec<_>>();
        let remaining = nodes
            .iter()
            .map(|n| {
                n.requires
                    .iter()
                    .filter(|&&r| !nodes[r].complete)
                    .count()
            })
            .collect::<Vec<_>>();
        let skipped = nodes.iter().filter(|n| n.complete).count();
        let ready: Vec<usize> = (0..nodes.len())
            .filter(|&i| !nodes[i].complete && remaining[i] == 0)
            .collect();

        for (task, node) in &graph.tasks {
            if node.complete {
                debug!(task = %task, "Artifact exists, skipping");
            }
        }

        let started = Instant::now();
        let context = Context {
            graph: &graph,
            progress: Mutex::new(Progress {
                remaining,
                states,
                errors: Vec::new(),
                executed: 0,
                skipped,
            }),
        };

        pool.scope(|scope| {
            for index in ready {
                spawn_task(scope, &context, index);
            }
        });

        let progress = context
            .progress
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let failed = progress
            .states
            .iter()
            .filter(|s| **s == TaskState::Failed)
            .count();
        let not_run = progress
            .states
            .iter()
            .filter(|s| **s == TaskState::Pending)
            .count();

        info!(
            executed = progress.executed,
            skipped = progress.skipped,
            failed,
            not_run,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Task graph finished"
        );

        let tasks: Vec<T> = graph.tasks.into_keys().collect();
        let errors = progress
            .errors
            .into_iter()
            .map(|(i, e)| (tasks[i].clone(), e))
            .collect();
        Ok(ExecutionReport {
            states: tasks.into_iter().zip(progress.states).collect(),
            executed: progress.executed,
            skipped: progress.skipped,
            failed,
            not_run,
            errors,
        })
    }
}

fn spawn_task<'s, T: GraphTask>(scope: &Scope<'s>, context: &'s Context<'s, T>, index: usize) {
    scope.spawn(move |scope| {
        let Some((task, node)) = context.graph.tasks.get_index(index) else {
            return;
        };
        lock(&context.progress).states[index] = TaskState::Running;

        // Another run may have produced the artifact since the graph was built.
        let (state, outcome) = if task.is_complete() {
            debug!(task = %task, "Artifact appeared, skipping");
            (TaskState::Done, None)
        } else {
            info!(task = %task, "Running task");
            let started = Instant::now();
            match task.run() {
                Ok(()) => {
                    info!(
                        task = %task,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Task done"
                    );
                    (TaskState::Done, Some(Ok(())))
                }
                Err(err) => {
                    error!(task = %task, error = %err, "Task failed");
                    (TaskState::Failed, Some(Err(err)))
                }
            }
        };

        let mut ready = Vec::new();
        {
            let mut progress = lock(&context.progress);
            progress.states[index] = state;
            match outcome {
                None => progress.skipped += 1,
                Some(Ok(())) => progress.executed += 1,
                Some(Err(err)) => progress.errors.push((index, err)),
            }
            if state == TaskState::Done {
                for &dependent in &node.dependents {
                    progress.remaining[dependent] -= 1;
                    if progress.remaining[dependent] == 0 {
                        ready.push(dependent);
                    }
                }
            }
        }

        for dependent in ready {
            spawn_task(scope, context, dependent);
        }
    });
}

fn lock<E>(progress: &Mutex<Progress<E>>) -> std::sync::MutexGuard<'_, Progress<E>> {
    progress.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Error)]
    #[error("job {0} failed")]
    struct JobError(u32);

    /// A job writing `<file>.out` into a directory, optionally failing.
    #[derive(Debug, Clone)]
    struct Job {
        id: u32,
        file: u32,
        deps: Vec<Job>,
        dir: PathBuf,
        fail: bool,
        runs: Arc<AtomicUsize>,
    }

    impl PartialEq for Job {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }
    impl Eq for Job {}
    impl Hash for Job {
        fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
            self.id.hash(state);
        }
    }
    impl fmt::Display for Job {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Job({})", self.id)
        }
    }

    impl GraphTask for Job {
        type Error = JobError;

        fn requires(&self) -> Vec<Self> {
            self.deps.clone()
        }

        fn output(&self) -> PathBuf {
            self.dir.join(format!("{}.out", self.file))
        }

        fn run(&self) -> Result<(), JobError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(JobError(self.id));
            }
            std::fs::write(self.output(), b"done").map_err(|_| JobError(self.id))
        }
    }

    fn job(id: u32, deps: Vec<Job>, dir: &std::path::Path, runs: &Arc<AtomicUsize>) -> Job {
        Job {
            id,
            file: id,
            deps,
            dir: dir.to_path_buf(),
            fail: false,
            runs: runs.clone(),
        }
    }

    #[test]
    fn test_shared_prerequisite_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let shared = job(0, vec![], dir.path(), &runs);
        let a = job(1, vec![shared.clone()], dir.path(), &runs);
        let b = job(2, vec![shared.clone()], dir.path(), &runs);
        let root = job(3, vec![a, b], dir.path(), &runs);

        let graph = TaskGraph::build(&[root.clone()]).unwrap();
        assert_eq!(graph.len(), 4);
        // Prerequisites come first
        assert_eq!(graph.tasks().next(), Some(&shared));

        let report = Executor::new(4).run(graph).unwrap();
        assert_eq!(report.executed, 4);
        assert_eq!(runs.load(Ordering::SeqCst), 4);
        assert_eq!(report.state_of(&root), Some(TaskState::Done));
        assert!(report.is_success());
    }

    #[test]
    fn test_complete_task_is_not_expanded() {
        let dir = tempfile::tempdir().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let leaf = job(0, vec![], dir.path(), &runs);
        let root = job(1, vec![leaf.clone()], dir.path(), &runs);
        std::fs::write(root.output(), b"old").unwrap();

        let graph = TaskGraph::build(&[root.clone()]).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(!graph.contains(&leaf));

        let report = Executor::new(2).run(graph).unwrap();
        assert_eq!(report.executed, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read(root.output()).unwrap(), b"old");
    }

    #[test]
    fn test_failure_stops_dependents_only() {
        let dir = tempfile::tempdir().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let mut broken = job(0, vec![], dir.path(), &runs);
        broken.fail = true;
        let dependent = job(1, vec![broken.clone()], dir.path(), &runs);
        let root = job(2, vec![dependent.clone()], dir.path(), &runs);
        let independent = job(3, vec![], dir.path(), &runs);

        let graph = TaskGraph::build(&[root.clone(), independent.clone()]).unwrap();
        let report = Executor::new(2).run(graph).unwrap();

        assert_eq!(report.state_of(&broken), Some(TaskState::Failed));
        assert_eq!(report.state_of(&dependent), Some(TaskState::Pending));
        assert_eq!(report.state_of(&root), Some(TaskState::Pending));
        assert_eq!(report.state_of(&independent), Some(TaskState::Done));
        assert_eq!((report.failed, report.not_run, report.executed), (1, 2, 1));
        assert!(!dependent.output().exists());

        match report.into_result() {
            Err(ExecutorError::Task { task, source }) => {
                assert_eq!(task, "Job(0)");
                assert_eq!(source.0, 0);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_output_collision_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let a = job(1, vec![], dir.path(), &runs);
        let mut b = job(2, vec![], dir.path(), &runs);
        b.file = a.file;

        match TaskGraph::build(&[a.clone(), b]).unwrap_err() {
            ExecutorError::Collision { path, first, second } => {
                assert_eq!(path, a.output());
                assert_eq!(first, "Job(1)");
                assert_eq!(second, "Job(2)");
            }
            other => panic!("unexpected error: {other}"),
        }

        // The same task twice is one task, not a collision
        let graph = TaskGraph::build(&[a.clone(), a]).unwrap();
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_cycle_is_detected() {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        struct Loop(u32);
        impl fmt::Display for Loop {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "Loop({})", self.0)
            }
        }
        impl GraphTask for Loop {
            type Error = JobError;
            fn requires(&self) -> Vec<Self> {
                vec![Loop((self.0 + 1) % 3)]
            }
            fn output(&self) -> PathBuf {
                PathBuf::from(format!("/nonexistent/loop-{}", self.0))
            }
            fn run(&self) -> Result<(), JobError> {
                Ok(())
            }
        }

        let err = TaskGraph::build(&[Loop(0)]).unwrap_err();
        assert!(matches!(err, ExecutorError::Cycle(_)));
    }

    #[test]
    fn test_concurrency_is_bounded() {
        #[derive(Debug, Clone)]
        struct Sleeper {
            id: u32,
            active: Arc<AtomicUsize>,
            peak: Arc<AtomicUsize>,
        }
        impl PartialEq for Sleeper {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }
        impl Eq for Sleeper {}
        impl Hash for Sleeper {
            fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
                self.id.hash(state);
            }
        }
        impl fmt::Display for Sleeper {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "Sleeper({})", self.id)
            }
        }
        impl GraphTask for Sleeper {
            type Error = JobError;
            fn requires(&self) -> Vec<Self> {
                Vec::new()
            }
            fn output(&self) -> PathBuf {
                PathBuf::from(format!("/nonexistent/sleeper-{}", self.id))
            }
            fn run(&self) -> Result<(), JobError> {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(20));
                self.active.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<Sleeper> = (0..8)
            .map(|id| Sleeper {
                id,
                active: active.clone(),
                peak: peak.clone(),
            })
            .collect();

        let report = Executor::new(2).run(TaskGraph::build(&tasks).unwrap()).unwrap();
        assert_eq!(report.executed, 8);
        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 2, "peak concurrency {} exceeds 2 workers", peak);
        assert!(peak >= 1);
    }
}
