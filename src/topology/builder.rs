//! Fluent topology construction.
//!
//! Every chaining call returns a new [StreamHandle] pointing into the same
//! builder-owned graph. Mistakes are recorded as they happen and reported
//! together by [StreamBuilder::build], before any stage runs.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, instrument, warn};

use super::graph::{Stage, StageBody, StageKind, Topology};
use crate::branch::Predicate;
use crate::error::{BoxError, BuildError};
use crate::processor::Processor;
use crate::processors::{FilterFunc, MapFunc, Print};
use crate::source::Source;
use crate::types::Message;

/// Graph under construction. `frozen` once `build` has taken the stages.
#[derive(Default)]
struct Draft {
  stages: Vec<Stage>,
  names: HashSet<String>,
  sources: Vec<usize>,
  errors: Vec<BuildError>,
  frozen: bool,
}

impl Draft {
  fn add(&mut self, name: &str, body: StageBody, upstream: Option<(usize, usize)>) -> usize {
    if self.frozen {
      warn!(stage = name, "topology already built; stage ignored");
      return 0;
    }
    if !self.names.insert(name.to_string()) {
      self.errors.push(BuildError::DuplicateStage(name.to_string()));
    }
    let (kind, outputs) = match &body {
      StageBody::Source(_) => (StageKind::Source, 1),
      StageBody::Processor(_) => (StageKind::Processor, 1),
      StageBody::Branch(preds) => (StageKind::Branch, preds.len()),
    };
    if matches!(body, StageBody::Branch(ref p) if p.is_empty()) {
      self.errors.push(BuildError::EmptyBranch(name.to_string()));
    }

    let idx = self.stages.len();
    if let Some((parent, port)) = upstream {
      let parent_stage = &mut self.stages[parent];
      if parent_stage.downstream[port].is_some() {
        self.errors.push(BuildError::MultipleDownstream {
          stage: parent_stage.name.clone(),
          port,
        });
      } else {
        parent_stage.downstream[port] = Some(idx);
      }
    }
    if kind == StageKind::Source {
      self.sources.push(idx);
    }
    self.stages.push(Stage {
      name: name.to_string(),
      kind,
      upstream: upstream.map(|(parent, _)| parent),
      downstream: vec![None; outputs],
      body,
    });
    idx
  }
}

/// Entry point for building a [Topology].
#[derive(Default)]
pub struct StreamBuilder {
  draft: Arc<Mutex<Draft>>,
}

fn lock(draft: &Mutex<Draft>) -> MutexGuard<'_, Draft> {
  draft.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StreamBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds a source stage and returns the handle for its output stream.
  pub fn source(&self, name: &str, source: impl Source + 'static) -> StreamHandle {
    let node = lock(&self.draft).add(name, StageBody::Source(Box::new(source)), None);
    StreamHandle {
      draft: Arc::clone(&self.draft),
      node,
      port: 0,
    }
  }

  /// Validates the graph and freezes it.
  ///
  /// Fails on duplicate names, a graph without sources, empty branches or
  /// stages attached twice to the same handle. Handles that outlive the build
  /// are inert: chaining on them adds nothing.
  #[instrument(level = "trace", skip(self))]
  pub fn build(self) -> Result<Topology, BuildError> {
    let frozen = Draft {
      frozen: true,
      ..Draft::default()
    };
    let mut draft = std::mem::replace(&mut *lock(&self.draft), frozen);
    if let Some(err) = draft.errors.into_iter().next() {
      return Err(err);
    }
    if draft.sources.is_empty() {
      return Err(BuildError::NoSources);
    }
    check_acyclic(&draft.stages)?;
    for stage in &mut draft.stages {
      if stage.kind == StageKind::Processor && stage.downstream.iter().all(Option::is_none) {
        stage.kind = StageKind::Sink;
      }
    }

    let topology = Topology {
      stages: draft.stages,
      sources: draft.sources,
    };
    info!(
      stage_count = topology.stages.len(),
      source_count = topology.sources.len(),
      "topology built"
    );
    Ok(topology)
  }
}

/// Kahn's algorithm over the downstream edges; every stage must be visited.
fn check_acyclic(stages: &[Stage]) -> Result<(), BuildError> {
  let mut in_degree = vec![0usize; stages.len()];
  for stage in stages {
    for &d in stage.downstream.iter().flatten() {
      in_degree[d] += 1;
    }
  }
  let mut queue: VecDeque<usize> = (0..stages.len()).filter(|&i| in_degree[i] == 0).collect();
  let mut visited = 0;
  while let Some(idx) = queue.pop_front() {
    visited += 1;
    for &d in stages[idx].downstream.iter().flatten() {
      in_degree[d] -= 1;
      if in_degree[d] == 0 {
        queue.push_back(d);
      }
    }
  }
  if visited != stages.len() {
    let stuck = (0..stages.len())
      .find(|&i| in_degree[i] > 0)
      .map(|i| stages[i].name.clone())
      .unwrap_or_default();
    return Err(BuildError::Cycle(stuck));
  }
  Ok(())
}

/// One output stream of a stage. Chaining attaches a new stage to this output.
#[derive(Clone)]
pub struct StreamHandle {
  draft: Arc<Mutex<Draft>>,
  node: usize,
  port: usize,
}

impl StreamHandle {
  fn attach(&self, name: &str, body: StageBody) -> StreamHandle {
    let node = lock(&self.draft).add(name, body, Some((self.node, self.port)));
    StreamHandle {
      draft: Arc::clone(&self.draft),
      node,
      port: 0,
    }
  }

  /// Name of the stage this stream comes out of.
  pub fn stage(&self) -> String {
    lock(&self.draft)
      .stages
      .get(self.node)
      .map(|s| s.name.clone())
      .unwrap_or_default()
  }

  pub fn process(&self, name: &str, processor: impl Processor + 'static) -> StreamHandle {
    self.attach(name, StageBody::Processor(Box::new(processor)))
  }

  /// Transforms each message with `f`.
  pub fn map_func<F>(&self, name: &str, f: F) -> StreamHandle
  where
    F: Fn(Message) -> Result<Message, BoxError> + Send + Sync + 'static,
  {
    self.process(name, MapFunc::new(f))
  }

  /// Forwards only messages for which `f` returns true.
  pub fn filter_func<F>(&self, name: &str, f: F) -> StreamHandle
  where
    F: Fn(&Message) -> Result<bool, BoxError> + Send + Sync + 'static,
  {
    self.process(name, FilterFunc::new(Predicate::new(f)))
  }

  /// Prints each message to stdout and forwards it unchanged.
  pub fn print(&self, name: &str) -> StreamHandle {
    self.process(name, Print::new(name))
  }

  /// Routes each message to the first sub-stream whose predicate matches.
  ///
  /// Returns one handle per predicate, in the order given. Messages matching no
  /// predicate are discarded; put [Predicate::always] last for a default branch.
  pub fn branch_func<const N: usize>(
    &self,
    name: &str,
    predicates: [Predicate; N],
  ) -> [StreamHandle; N] {
    let branch = self.attach(name, StageBody::Branch(Vec::from(predicates)));
    std::array::from_fn(|port| StreamHandle {
      draft: Arc::clone(&branch.draft),
      node: branch.node,
      port,
    })
  }
}
