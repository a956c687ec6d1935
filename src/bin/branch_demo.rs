//! CLI: branch a stream of random integers into even and odd sub-streams.
//!
//! Even numbers are printed and batch-committed; odd numbers are negated,
//! printed and batch-committed. Runs until Ctrl-C, then closes the task.
//!
//! Usage: `branch_demo [OPTIONS]`
//! Example: branch_demo --batch 1000 --seed 1234
//!
//! Set RUST_LOG=streamweave_topology=debug for pump lifecycle events.

use std::path::PathBuf;
use std::process;

use async_trait::async_trait;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use streamweave_topology::{
  Action, BoxError, CancellationToken, ErrorAction, Message, Pipe, Predicate, Processor, Source,
  StreamBuilder, Task, TaskConfig, Token, Value,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Branch random integers into even and odd sub-streams.
#[derive(Parser, Debug)]
#[command(name = "branch_demo")]
#[command(
  after_help = r#"Environment variables:
  STREAMS_CONFIG               Path to the JSON task config (same as --config).
  STREAMS_COMMIT_INTERVAL_MS   Period of the processors' commit hook; 0 disables it.
  STREAMS_IDLE_BACKOFF_MS      Pause after the source reports nothing available.
  RUST_LOG                     Log filter (default: info).

Examples:
  branch_demo
  branch_demo --batch 10 --seed 7"#
)]
struct Args {
  /// Messages per commit on each sub-stream.
  #[arg(long, default_value_t = 1000)]
  batch: usize,

  /// Seed for the random source.
  #[arg(long, default_value_t = 1234)]
  seed: u64,

  /// Optional JSON task config (`commit_interval_ms`, `idle_backoff_ms`).
  #[arg(long, value_name = "FILE", env = "STREAMS_CONFIG")]
  config: Option<PathBuf>,
}

/// Endless source of integers in `0..100`; offsets are counted but never persisted.
struct RandIntSource {
  rng: StdRng,
  offset: u64,
}

impl RandIntSource {
  fn new(seed: u64) -> Self {
    Self {
      rng: StdRng::seed_from_u64(seed),
      offset: 0,
    }
  }
}

#[async_trait]
impl Source for RandIntSource {
  async fn consume(&mut self) -> Result<Option<Message>, BoxError> {
    let n: i64 = self.rng.gen_range(0..100);
    self.offset += 1;
    Ok(Some(
      Message::from_value(Value::new(n)).with_token(Token::new(self.offset)),
    ))
  }

  async fn commit(&mut self, _token: &Token) -> Result<(), BoxError> {
    Ok(())
  }

  async fn close(&mut self) -> Result<(), BoxError> {
    Ok(())
  }
}

/// Commits every `batch`-th message and marks the rest.
struct CommitProcessor {
  pipe: Option<Pipe>,
  batch: usize,
  count: usize,
}

impl CommitProcessor {
  fn new(batch: usize) -> Self {
    Self {
      pipe: None,
      batch,
      count: 0,
    }
  }
}

#[async_trait]
impl Processor for CommitProcessor {
  fn with_pipe(&mut self, pipe: Pipe) {
    self.pipe = Some(pipe);
  }

  async fn process(&mut self, msg: Message) -> Result<Action, BoxError> {
    let pipe = self.pipe.as_ref().ok_or("pipe not wired")?;
    self.count += 1;
    if self.count >= self.batch {
      self.count = 0;
      pipe.commit(&msg).await?;
    } else {
      pipe.mark(&msg).await?;
    }
    Ok(Action::Drop)
  }
}

fn is_even(msg: &Message) -> Result<bool, BoxError> {
  Ok(msg.value.get::<i64>()? % 2 == 0)
}

fn is_odd(msg: &Message) -> Result<bool, BoxError> {
  Ok(msg.value.get::<i64>()? % 2 != 0)
}

fn negate(msg: Message) -> Result<Message, BoxError> {
  let n = *msg.value.get::<i64>()?;
  Ok(msg.with_value(Value::new(-n)))
}

fn load_config(path: Option<&PathBuf>) -> Result<TaskConfig, BoxError> {
  let config = match path {
    Some(p) => TaskConfig::from_json_file(p)?,
    None => TaskConfig::default(),
  };
  Ok(config.with_env_overrides()?)
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();
  let config = match load_config(args.config.as_ref()) {
    Ok(c) => c,
    Err(e) => {
      eprintln!("Error loading config: {}", e);
      process::exit(1);
    }
  };
  info!(batch = args.batch, seed = args.seed, ?config, "branch_demo starting");

  let builder = StreamBuilder::new();
  let [evens, odds] = builder
    .source("rand-source", RandIntSource::new(args.seed))
    .branch_func("branch", [Predicate::new(is_even), Predicate::new(is_odd)]);

  evens
    .print("print-event")
    .process("commit-sink1", CommitProcessor::new(args.batch));

  odds
    .map_func("negative-mapper", negate)
    .print("print-negative")
    .process("commit-sink2", CommitProcessor::new(args.batch));

  let topology = match builder.build() {
    Ok(t) => t,
    Err(e) => {
      eprintln!("Error building topology: {}", e);
      process::exit(1);
    }
  };

  let mut task = Task::with_config(topology, config);
  if let Err(e) = task.on_error(|err| {
    error!(%err, "stream failure");
    ErrorAction::Shutdown
  }) {
    eprintln!("Error registering handler: {}", e);
    process::exit(1);
  }

  let ctx = CancellationToken::new();
  if let Err(e) = task.start(&ctx) {
    eprintln!("Error starting task: {}", e);
    process::exit(1);
  }

  tokio::select! {
    _ = tokio::signal::ctrl_c() => info!("interrupt received"),
    _ = task.stopped() => info!("task stopped"),
  }

  if let Err(e) = task.close().await {
    eprintln!("Error closing task: {}", e);
    process::exit(1);
  }
  info!(
    acknowledgements = ?task.acknowledgements("rand-source"),
    "branch_demo finished"
  );
}
