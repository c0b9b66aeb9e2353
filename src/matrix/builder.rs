//! Bounded-concurrency matrix construction

use super::{DurationMatrix, FailureMode, MatrixError, MatrixResult, StationDurations};
use crate::adapters::TravelTime;
use crate::models::Coordinates;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Progress callback: (matrix label, completed, total)
pub type ProgressCallback = Box<dyn Fn(&str, usize, usize) + Send + Sync>;

/// One oracle lookup in a matrix
#[derive(Debug, Clone, Copy)]
struct Task {
    origin: usize,
    destination: Option<usize>,
    from: Option<Coordinates>,
    to: Option<Coordinates>,
}

#[derive(Debug)]
enum Outcome {
    Resolved(u32),
    Unresolved(String),
}

pub struct MatrixBuilder<'a> {
    travel: TravelTime<'a>,
    workers: usize,
    failure_mode: FailureMode,
    progress: Option<&'a ProgressCallback>,
}

impl<'a> MatrixBuilder<'a> {
    pub fn new(travel: TravelTime<'a>) -> Self {
        Self {
            travel,
            workers: 4,
            failure_mode: FailureMode::default(),
            progress: None,
        }
    }

    /// Set the number of concurrent oracle calls.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    pub fn with_progress(mut self, callback: &'a ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Durations between every ordered pair of `points`, skipping self-pairs.
    pub fn pairwise(&self, label: &str, points: &[Option<Coordinates>]) -> MatrixResult<DurationMatrix> {
        let tasks: Vec<Task> = points
            .iter()
            .enumerate()
            .flat_map(|(i, from)| {
                points
                    .iter()
                    .enumerate()
                    .filter(move |(j, _)| *j != i)
                    .map(move |(j, to)| Task {
                        origin: i,
                        destination: Some(j),
                        from: *from,
                        to: *to,
                    })
            })
            .collect();

        let outcomes = self.run(label, &tasks)?;
        let mut matrix = DurationMatrix::new(points.len(), points.len());
        fill_matrix(&mut matrix, &tasks, outcomes);
        Ok(matrix)
    }

    /// Durations from every origin to every destination of a second list.
    pub fn cross(
        &self,
        label: &str,
        origins: &[Option<Coordinates>],
        destinations: &[Option<Coordinates>],
    ) -> MatrixResult<DurationMatrix> {
        let tasks: Vec<Task> = origins
            .iter()
            .enumerate()
            .flat_map(|(i, from)| {
                destinations.iter().enumerate().map(move |(j, to)| Task {
                    origin: i,
                    destination: Some(j),
                    from: *from,
                    to: *to,
                })
            })
            .collect();

        let outcomes = self.run(label, &tasks)?;
        let mut matrix = DurationMatrix::new(origins.len(), destinations.len());
        fill_matrix(&mut matrix, &tasks, outcomes);
        Ok(matrix)
    }

    /// One duration per origin to a single destination.
    pub fn to_single(
        &self,
        label: &str,
        origins: &[Option<Coordinates>],
        destination: Coordinates,
    ) -> MatrixResult<StationDurations> {
        let tasks: Vec<Task> = origins
            .iter()
            .enumerate()
            .map(|(i, from)| Task {
                origin: i,
                destination: None,
                from: *from,
                to: Some(destination),
            })
            .collect();

        let outcomes = self.run(label, &tasks)?;
        let mut station = StationDurations::new(origins.len());
        for (task, outcome) in tasks.iter().zip(outcomes) {
            match outcome {
                Outcome::Resolved(seconds) => station.insert(task.origin, seconds),
                Outcome::Unresolved(reason) => station.mark_unresolved(task.origin, reason),
            }
        }
        Ok(station)
    }

    /// Resolve every task on the worker pool. Output order matches `tasks`.
    fn run(&self, label: &str, tasks: &[Task]) -> MatrixResult<Vec<Outcome>> {
        let total = tasks.len();
        info!(
            "Building {} matrix: {} oracle lookups on {} workers",
            label, total, self.workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;

        let completed = AtomicUsize::new(0);
        let outcomes: MatrixResult<Vec<Outcome>> = pool.install(|| {
            tasks
                .par_iter()
                .map(|task| {
                    let outcome = self.resolve(task);

                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(callback) = self.progress {
                        callback(label, done, total);
                    }

                    outcome
                })
                .collect()
        });
        let outcomes = outcomes?;

        let unresolved = outcomes
            .iter()
            .filter(|o| matches!(o, Outcome::Unresolved(_)))
            .count();
        debug!(
            "{} matrix done: {} resolved, {} unresolved",
            label,
            total - unresolved,
            unresolved
        );
        Ok(outcomes)
    }

    fn resolve(&self, task: &Task) -> MatrixResult<Outcome> {
        let (from, to) = match (task.from, task.to) {
            (Some(from), Some(to)) => (from, to),
            (None, _) => return Ok(Outcome::Unresolved("origin has no coordinates".to_string())),
            (_, None) => {
                return Ok(Outcome::Unresolved(
                    "destination has no coordinates".to_string(),
                ))
            }
        };

        match self.travel.duration(from, to) {
            Ok(seconds) => Ok(Outcome::Resolved(seconds)),
            Err(source) if self.failure_mode == FailureMode::Lenient && !source.is_fatal() => {
                warn!(
                    "Unresolved duration origin={} destination={:?}: {}",
                    task.origin, task.destination, source
                );
                Ok(Outcome::Unresolved(source.to_string()))
            }
            Err(source) => Err(MatrixError::Pair {
                origin: task.origin,
                destination: task.destination,
                source,
            }),
        }
    }
}

fn fill_matrix(matrix: &mut DurationMatrix, tasks: &[Task], outcomes: Vec<Outcome>) {
    for (task, outcome) in tasks.iter().zip(outcomes) {
        let Some(destination) = task.destination else {
            continue;
        };
        match outcome {
            Outcome::Resolved(seconds) => matrix.insert(task.origin, destination, seconds),
            Outcome::Unresolved(reason) => matrix.mark_unresolved(task.origin, destination, reason),
        }
    }
}
