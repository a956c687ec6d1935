//! The per-source loop: consume, deliver through the pipeline, repeat.
//!
//! A pump owns its pipeline outright. Each message is driven through every
//! stage it reaches before the next `consume`, and cancellation is only
//! checked between consumes, so a delivery that has started always finishes.

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use super::config::TaskConfig;
use super::supervisor::{ErrorAction, Reporter};
use crate::branch::route;
use crate::error::StreamError;
use crate::pipe::{Committer, Pipe};
use crate::processor::Action;
use crate::topology::{Pipeline, PipelineStage, StageOp};
use crate::types::Message;

pub(crate) struct Pump {
  committer: Arc<Committer>,
  entry: Option<usize>,
  stages: Vec<PipelineStage>,
  reporter: Reporter,
  cancel: CancellationToken,
  config: TaskConfig,
}

impl Pump {
  /// Wraps the pipeline's source in a commit tracker and hands every processor its pipe.
  pub(crate) fn new(
    pipeline: Pipeline,
    reporter: Reporter,
    cancel: CancellationToken,
    config: TaskConfig,
  ) -> Self {
    let committer = Arc::new(Committer::new(pipeline.source_name, pipeline.source));
    let mut stages = pipeline.stages;
    for stage in &mut stages {
      if let StageOp::Processor(p) = &mut stage.op {
        p.with_pipe(Pipe::new(stage.name.clone(), Arc::clone(&committer)));
      }
    }
    Self {
      committer,
      entry: pipeline.entry,
      stages,
      reporter,
      cancel,
      config,
    }
  }

  pub(crate) fn committer(&self) -> Arc<Committer> {
    Arc::clone(&self.committer)
  }

  /// Runs until cancelled or told to stop by the error handler.
  /// Returns the stages, in topological order, for teardown.
  #[instrument(level = "debug", skip(self), fields(source = %self.committer.name()))]
  pub(crate) async fn run(mut self) -> Vec<PipelineStage> {
    debug!("pump started");
    let mut last_commit = Instant::now();

    loop {
      if self.cancel.is_cancelled() {
        break;
      }
      if let Some(interval) = self.config.commit_interval()
        && last_commit.elapsed() >= interval
      {
        last_commit = Instant::now();
        if !self.commit_stages().await {
          break;
        }
      }

      let keep_going = match self.committer.consume().await {
        Ok(Some(msg)) => match self.deliver(msg).await {
          Ok(()) => true,
          Err(err) => handle(&self.reporter, &self.cancel, err).await,
        },
        Ok(None) => {
          tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.idle_backoff()) => true,
          }
        }
        Err(error) => {
          let stage = self.committer.name().to_string();
          handle(&self.reporter, &self.cancel, StreamError::Consume { stage, error }).await
        }
      };
      if !keep_going {
        break;
      }
    }

    // Flush batched state before teardown.
    self.commit_stages().await;
    debug!("pump stopped");
    self.stages
  }

  /// Drives one message from the entry stage until it is dropped, discarded by a branch or leaves a sink.
  async fn deliver(&mut self, mut msg: Message) -> Result<(), StreamError> {
    let token = msg.token().cloned();
    let mut next = self.entry;

    while let Some(idx) = next {
      let stage = &mut self.stages[idx];
      trace!(stage = %stage.name, "delivering message");
      next = match &mut stage.op {
        StageOp::Processor(p) => match p
          .process(msg)
          .await
          .map_err(|e| StreamError::from_process(&stage.name, e))?
        {
          Action::Emit(mut out) => {
            out.set_token(token.clone());
            msg = out;
            stage.downstream[0]
          }
          Action::Drop => return Ok(()),
        },
        StageOp::Branch(predicates) => match route(&stage.name, predicates, &msg)? {
          Some(slot) => stage.downstream[slot],
          None => return Ok(()),
        },
      };
    }
    Ok(())
  }

  /// Calls every processor's commit hook. Returns false if the handler asked to stop.
  async fn commit_stages(&mut self) -> bool {
    let mut keep_going = true;
    for idx in 0..self.stages.len() {
      let stage = &mut self.stages[idx];
      let StageOp::Processor(p) = &mut stage.op else {
        continue;
      };
      if let Err(error) = p.commit().await {
        let err = StreamError::Commit {
          stage: stage.name.clone(),
          error,
        };
        if !handle(&self.reporter, &self.cancel, err).await {
          keep_going = false;
          break;
        }
      }
    }
    keep_going
  }
}

/// Reports `err` and applies the handler's verdict. Returns false if the pump must stop.
///
/// Borrows fields, not the pump: stages are not `Sync`, so `&Pump` held across
/// the await would make `run` non-`Send`.
async fn handle(reporter: &Reporter, cancel: &CancellationToken, err: StreamError) -> bool {
  match reporter.report(err).await {
    ErrorAction::Continue => true,
    ErrorAction::Stop => false,
    ErrorAction::Shutdown => {
      cancel.cancel();
      false
    }
  }
}
