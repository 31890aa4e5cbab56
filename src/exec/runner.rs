// src/exec/runner.rs

//! Individual node process runner.
//!
//! Each node runs inside a private scratch directory created under the
//! output root (same filesystem, so publication is an atomic rename). The
//! scratch directory is removed on every exit path — success, failure or a
//! spawn error — by `TempDir`'s drop. Declared outputs are staged inside the
//! scratch directory and renamed into their final resolved paths only after
//! the command exits successfully, so downstream nodes never observe a
//! partially written output.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::config::PipelineConfig;
use crate::dag::{NodeOutcome, ScheduledNode};
use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::resolve::render_command;

/// How many trailing stderr lines are kept for the failure report.
const STDERR_TAIL_LINES: usize = 20;

/// Result of one node's execution.
#[derive(Debug)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub duration: Duration,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
}

/// Spawn the background executor loop.
///
/// The returned sender is what [`super::RealExecutorBackend`] forwards
/// scheduled nodes to. Each node is executed on its own Tokio task, so
/// multiple nodes run in parallel up to whatever the scheduler dispatched.
pub fn spawn_executor(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    cfg: Arc<PipelineConfig>,
) -> mpsc::Sender<ScheduledNode> {
    let (tx, mut rx) = mpsc::channel::<ScheduledNode>(32);

    tokio::spawn(async move {
        info!("executor loop started");
        while let Some(node) = rx.recv().await {
            let runtime_tx = runtime_tx.clone();
            let cfg = Arc::clone(&cfg);
            tokio::spawn(async move {
                run_node(node, runtime_tx, cfg).await;
            });
        }
        info!("executor loop finished (channel closed)");
    });

    tx
}

/// Run a single node, emitting a `NodeCompleted` event on success/failure.
///
/// All setup errors (scratch dir, spawn, publication) are converted into a
/// failed completion with exit code -1 so the scheduler always hears back.
pub async fn run_node(
    node: ScheduledNode,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    cfg: Arc<PipelineConfig>,
) {
    let id = node.id;
    let label = node.label();

    let (outcome, stderr_tail) = match run_node_inner(&node, &cfg).await {
        Ok((result, tail)) => {
            if result.exit_code == 0 {
                (NodeOutcome::Success, None)
            } else {
                (NodeOutcome::Failed(result.exit_code), Some(tail))
            }
        }
        Err(err) => {
            error!(node = %label, error = %err, "node execution error");
            (NodeOutcome::Failed(-1), Some(format!("{err:#}")))
        }
    };

    let _ = runtime_tx
        .send(RuntimeEvent::NodeCompleted {
            id,
            outcome,
            stderr_tail,
        })
        .await;
}

async fn run_node_inner(
    node: &ScheduledNode,
    cfg: &PipelineConfig,
) -> anyhow::Result<(ExecutionResult, String)> {
    let root = Path::new(&cfg.paths.root);

    // Scratch directory under the output root: same filesystem, atomic rename.
    let scratch = tempfile::Builder::new()
        .prefix(&format!(".magpipe-{}-{}-", node.stage.name, node.sample))
        .tempdir_in(root)
        .with_context(|| format!("creating scratch dir under {}", root.display()))?;

    // Outputs are staged inside the scratch directory by file name.
    let staged: Vec<PathBuf> = node
        .outputs
        .iter()
        .map(|out| stage_path(scratch.path(), out))
        .collect::<anyhow::Result<_>>()?;

    let command = render_command(&node.stage, &node.sample, cfg, &node.inputs, &staged)
        .map_err(|e| anyhow!(e))?;

    let logs_dir = root.join(&cfg.folders.logs);
    tokio::fs::create_dir_all(&logs_dir)
        .await
        .with_context(|| format!("creating logs dir {}", logs_dir.display()))?;
    let stdout_path = logs_dir.join(format!("{}_{}.stdout", node.stage.name, node.sample));
    let stderr_path = logs_dir.join(format!("{}_{}.stderr", node.stage.name, node.sample));

    info!(node = %node.label(), cmd = %command, "starting node process");
    let started = Instant::now();

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(&command)
        .current_dir(scratch.path())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning process for node '{}'", node.label()))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Stream stdout to its log file.
    let stdout_task = {
        let path = stdout_path.clone();
        tokio::spawn(async move {
            if let Some(stdout) = stdout {
                let _ = stream_to_file(stdout, &path, None).await;
            }
            String::new()
        })
    };

    // Stream stderr to its log file, keeping the tail for failure reports.
    let stderr_task = {
        let path = stderr_path.clone();
        let label = node.label();
        tokio::spawn(async move {
            if let Some(stderr) = stderr {
                match stream_to_file(stderr, &path, Some(label)).await {
                    Ok(tail) => tail,
                    Err(_) => String::new(),
                }
            } else {
                String::new()
            }
        })
    };

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process of node '{}'", node.label()))?;

    let _ = stdout_task.await;
    let stderr_tail = stderr_task.await.unwrap_or_default();

    let exit_code = status.code().unwrap_or(-1);
    let duration = started.elapsed();

    info!(
        node = %node.label(),
        exit_code,
        success = status.success(),
        duration_ms = duration.as_millis() as u64,
        "node process exited"
    );

    if status.success() {
        publish_outputs(node, &staged).await?;
    }

    // `scratch` is dropped here (and on every earlier `?`), removing the
    // directory and everything the command left behind.
    drop(scratch);

    Ok((
        ExecutionResult {
            exit_code,
            duration,
            stdout_path,
            stderr_path,
        },
        stderr_tail,
    ))
}

/// Staged location of a declared output inside the scratch directory.
fn stage_path(scratch: &Path, output: &Path) -> anyhow::Result<PathBuf> {
    let name = output
        .file_name()
        .ok_or_else(|| anyhow!("output path '{}' has no file name", output.display()))?;
    Ok(scratch.join(name))
}

/// Move every staged output into its final resolved path by atomic rename.
async fn publish_outputs(node: &ScheduledNode, staged: &[PathBuf]) -> anyhow::Result<()> {
    for (staged_path, final_path) in staged.iter().zip(node.outputs.iter()) {
        if tokio::fs::metadata(staged_path).await.is_err() {
            return Err(anyhow!(
                "node '{}' exited successfully but did not write declared output '{}'",
                node.label(),
                final_path.display()
            ));
        }
        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating output dir {}", parent.display()))?;
        }
        tokio::fs::rename(staged_path, final_path)
            .await
            .with_context(|| {
                format!(
                    "publishing output '{}' for node '{}'",
                    final_path.display(),
                    node.label()
                )
            })?;
        debug!(node = %node.label(), output = %final_path.display(), "output published");
    }
    Ok(())
}

/// Stream a child pipe line-by-line into a log file. When `tail_label` is
/// set, also keep the last [`STDERR_TAIL_LINES`] lines and log them at debug.
async fn stream_to_file(
    pipe: impl tokio::io::AsyncRead + Unpin,
    path: &Path,
    tail_label: Option<String>,
) -> anyhow::Result<String> {
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("creating log file {}", path.display()))?;

    let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let reader = BufReader::new(pipe);
    let mut lines = reader.lines();

    while let Ok(Some(line)) = lines.next_line().await {
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;

        if let Some(ref label) = tail_label {
            debug!(node = %label, "stderr: {}", line);
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
    }
    file.flush().await?;

    Ok(tail.into_iter().collect::<Vec<_>>().join("\n"))
}
