//! The frozen stage graph and its split into per-source pipelines.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use crate::branch::Predicate;
use crate::processor::Processor;
use crate::source::Source;

/// Role of a stage in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
  Source,
  Processor,
  Branch,
  /// A processor with nothing downstream.
  Sink,
}

impl fmt::Display for StageKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StageKind::Source => write!(f, "source"),
      StageKind::Processor => write!(f, "processor"),
      StageKind::Branch => write!(f, "branch"),
      StageKind::Sink => write!(f, "sink"),
    }
  }
}

pub(crate) enum StageBody {
  Source(Box<dyn Source>),
  Processor(Box<dyn Processor>),
  Branch(Vec<Predicate>),
}

pub(crate) struct Stage {
  pub(crate) name: String,
  pub(crate) kind: StageKind,
  pub(crate) upstream: Option<usize>,
  /// One slot for sources and processors, one per predicate for branches.
  pub(crate) downstream: Vec<Option<usize>>,
  pub(crate) body: StageBody,
}

/// Immutable, validated graph of stages. Produced by [crate::StreamBuilder::build].
pub struct Topology {
  pub(crate) stages: Vec<Stage>,
  pub(crate) sources: Vec<usize>,
}

/// What a pipeline stage does with a message.
pub(crate) enum StageOp {
  Processor(Box<dyn Processor>),
  Branch(Vec<Predicate>),
}

/// A non-source stage with downstream indices local to its [Pipeline].
pub(crate) struct PipelineStage {
  pub(crate) name: String,
  pub(crate) op: StageOp,
  pub(crate) downstream: Vec<Option<usize>>,
}

/// One source and every stage reachable from it, in topological order.
pub(crate) struct Pipeline {
  pub(crate) source_name: String,
  pub(crate) source: Box<dyn Source>,
  /// Local index of the stage fed directly by the source.
  pub(crate) entry: Option<usize>,
  pub(crate) stages: Vec<PipelineStage>,
}

impl Topology {
  fn index_of(&self, name: &str) -> Option<usize> {
    self.stages.iter().position(|s| s.name == name)
  }

  /// Global indices reachable from `root`, breadth-first, `root` included.
  fn reachable(&self, root: usize) -> Vec<usize> {
    let mut order = Vec::new();
    let mut queue = VecDeque::from([root]);
    while let Some(idx) = queue.pop_front() {
      order.push(idx);
      queue.extend(self.stages[idx].downstream.iter().flatten().copied());
    }
    order
  }

  /// Stage names in declaration order.
  pub fn stage_names(&self) -> Vec<&str> {
    self.stages.iter().map(|s| s.name.as_str()).collect()
  }

  pub fn source_names(&self) -> Vec<&str> {
    self
      .sources
      .iter()
      .map(|&i| self.stages[i].name.as_str())
      .collect()
  }

  pub fn kind(&self, name: &str) -> Option<StageKind> {
    self.index_of(name).map(|i| self.stages[i].kind)
  }

  pub fn upstream(&self, name: &str) -> Option<&str> {
    let idx = self.index_of(name)?;
    self.stages[idx]
      .upstream
      .map(|u| self.stages[u].name.as_str())
  }

  /// Downstream stage per output slot; `None` marks a slot with nothing attached.
  pub fn downstream(&self, name: &str) -> Option<Vec<Option<&str>>> {
    let idx = self.index_of(name)?;
    Some(
      self.stages[idx]
        .downstream
        .iter()
        .map(|d| d.map(|i| self.stages[i].name.as_str()))
        .collect(),
    )
  }

  /// Order in which stages are closed on shutdown: deepest first, each source after its stages.
  pub fn teardown_order(&self) -> Vec<&str> {
    let mut order: Vec<&str> = self
      .sources
      .iter()
      .flat_map(|&src| self.reachable(src))
      .map(|i| self.stages[i].name.as_str())
      .collect();
    order.reverse();
    order
  }

  /// Splits the graph into independent per-source pipelines.
  pub(crate) fn into_pipelines(self) -> Vec<Pipeline> {
    let orders: Vec<Vec<usize>> = self.sources.iter().map(|&s| self.reachable(s)).collect();
    let mut slots: Vec<Option<Stage>> = self.stages.into_iter().map(Some).collect();
    let mut pipelines = Vec::with_capacity(orders.len());

    for order in orders {
      let local: HashMap<usize, usize> = order
        .iter()
        .skip(1)
        .enumerate()
        .map(|(local, &global)| (global, local))
        .collect();
      let remap = |d: &Option<usize>| d.and_then(|g| local.get(&g).copied());

      let Some(source_stage) = slots[order[0]].take() else {
        continue;
      };
      let StageBody::Source(source) = source_stage.body else {
        continue;
      };
      let entry = source_stage.downstream.first().and_then(remap);

      let mut stages = Vec::with_capacity(order.len() - 1);
      for &global in order.iter().skip(1) {
        let Some(stage) = slots[global].take() else {
          continue;
        };
        let op = match stage.body {
          StageBody::Processor(p) => StageOp::Processor(p),
          StageBody::Branch(preds) => StageOp::Branch(preds),
          StageBody::Source(_) => continue,
        };
        stages.push(PipelineStage {
          name: stage.name,
          op,
          downstream: stage.downstream.iter().map(remap).collect(),
        });
      }

      pipelines.push(Pipeline {
        source_name: source_stage.name,
        source,
        entry,
        stages,
      });
    }
    pipelines
  }
}

impl fmt::Debug for Topology {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Topology")
      .field("stages", &self.stage_names())
      .field("sources", &self.source_names())
      .finish()
  }
}
