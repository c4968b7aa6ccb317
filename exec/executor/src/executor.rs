//! The subprocess pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::warn;

use crate::task::LocalTask;
use crate::task::TaskCallback;
use crate::task::TaskResult;

struct Queued {
    task: LocalTask,
    callback: TaskCallback,
}

struct Inner {
    temp_dir: PathBuf,
    max_workers: usize,
    running: AtomicUsize,
    queued: AtomicUsize,
    task_counter: AtomicU64,
}

/// Bounded-concurrency subprocess pool with a FIFO queue.
///
/// Cloning shares the pool. Dropping every clone stops the scheduler once
/// the queue drains; running subprocesses finish.
#[derive(Clone)]
pub struct LocalExecutor {
    inner: Arc<Inner>,
    sender: mpsc::UnboundedSender<Queued>,
}

impl LocalExecutor {
    /// `max_workers` caps concurrent subprocesses; `temp_dir` hosts
    /// per-task scratch files and is created lazily.
    pub fn new(max_workers: usize, temp_dir: PathBuf) -> Self {
        let inner = Arc::new(Inner {
            temp_dir,
            max_workers: max_workers.max(1),
            running: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
            task_counter: AtomicU64::new(0),
        });
        let (sender, receiver) = mpsc::unbounded_channel();
        tokio::spawn(drive(Arc::clone(&inner), receiver));
        Self { inner, sender }
    }

    /// Enqueue a task. The callback fires exactly once, success or not.
    pub fn add_task(&self, task: LocalTask, callback: TaskCallback) {
        self.inner.queued.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(Queued { task, callback }).is_err() {
            // Scheduler gone during shutdown; nothing will run this.
            self.inner.queued.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Run one task and wait for its result.
    pub async fn exec(&self, task: LocalTask) -> TaskResult {
        let (tx, rx) = oneshot::channel();
        self.add_task(
            task,
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        rx.await
            .unwrap_or_else(|_| TaskResult::error("executor shut down"))
    }

    pub fn running_tasks(&self) -> usize {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn queued_tasks(&self) -> usize {
        self.inner.queued.load(Ordering::SeqCst)
    }

    pub fn max_workers(&self) -> usize {
        self.inner.max_workers
    }

    pub fn temp_dir(&self) -> &std::path::Path {
        &self.inner.temp_dir
    }
}

/// Scheduler loop: admit tasks in arrival order, at most `max_workers` at
/// once. Only this loop moves tasks from queued to running.
async fn drive(inner: Arc<Inner>, mut receiver: mpsc::UnboundedReceiver<Queued>) {
    let semaphore = Arc::new(Semaphore::new(inner.max_workers));
    while let Some(queued) = receiver.recv().await {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        inner.queued.fetch_sub(1, Ordering::SeqCst);
        inner.running.fetch_add(1, Ordering::SeqCst);
        let inner = Arc::clone(&inner);
        tokio::spawn(async move {
            let result = run_one(&inner, queued.task).await;
            inner.running.fetch_sub(1, Ordering::SeqCst);
            (queued.callback)(result);
            drop(permit);
        });
    }
}

async fn run_one(inner: &Inner, mut task: LocalTask) -> TaskResult {
    let mut scratch_files: Vec<PathBuf> = Vec::new();

    if task.write_input {
        let Some(input_name) = file_name_of(task.invocation.input()) else {
            return TaskResult::error(format!(
                "failed to extract filenames for {}",
                task.describe()
            ));
        };
        let Some(output_name) = file_name_of(task.invocation.output()) else {
            return TaskResult::error(format!(
                "failed to extract filenames for {}",
                task.describe()
            ));
        };
        if let Err(error) = tokio::fs::create_dir_all(&inner.temp_dir).await {
            return TaskResult::error(format!(
                "failed to create scratch dir {}: {error}",
                inner.temp_dir.display()
            ));
        }
        let id = inner.task_counter.fetch_add(1, Ordering::SeqCst);
        let input_path = inner.temp_dir.join(format!("{id}_{input_name}"));
        let output_path = inner.temp_dir.join(format!("{id}_{output_name}"));

        if let Err(error) = tokio::fs::write(&input_path, &task.input_data).await {
            return TaskResult::error(format!(
                "failed to stage input {}: {error}",
                input_path.display()
            ));
        }
        scratch_files.push(input_path.clone());
        if output_path != input_path {
            // A stale output from a previous run must not be mistaken for
            // this task's product.
            scratch_files.push(output_path.clone());
            let _ = tokio::fs::remove_file(&output_path).await;
        }

        task.invocation.set_input(&input_path.to_string_lossy());
        task.invocation.set_output(&output_path.to_string_lossy());
    }

    let result = spawn_and_wait(&task).await;
    let result = match result {
        Ok(mut result) => {
            if result.success && task.read_output {
                let output_path = task
                    .invocation
                    .output()
                    .map(PathBuf::from)
                    .unwrap_or_default();
                match tokio::fs::read(&output_path).await {
                    Ok(data) => {
                        debug!(
                            path = %output_path.display(),
                            bytes = data.len(),
                            "task output collected"
                        );
                        result.output_data = data;
                    }
                    Err(error) => {
                        result.success = false;
                        result.std_out =
                            format!("failed to read file {}: {error}", output_path.display());
                    }
                }
            }
            result
        }
        Err(message) => TaskResult::error(message),
    };

    for path in scratch_files {
        if let Err(error) = tokio::fs::remove_file(&path).await {
            if error.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), %error, "failed to remove scratch file");
            }
        }
    }
    result
}

async fn spawn_and_wait(task: &LocalTask) -> Result<TaskResult, String> {
    let started = Instant::now();

    let mut command = match &task.env_command {
        Some(env_command) => {
            // Run through a shell so the environment script applies to the
            // tool invocation.
            let mut words = vec![task.invocation.tool.executable.display().to_string()];
            words.extend(task.invocation.args.iter().cloned());
            let joined = shlex::try_join(words.iter().map(String::as_str))
                .map_err(|error| format!("failed to quote command: {error}"))?;
            let mut command = tokio::process::Command::new("sh");
            command.arg("-c").arg(format!("{env_command} && {joined}"));
            command
        }
        None => {
            let mut command = tokio::process::Command::new(&task.invocation.tool.executable);
            command.args(&task.invocation.args);
            command
        }
    };

    let output = command
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|error| format!("failed to execute {}: {error}", task.describe()))?;

    let mut std_out = String::from_utf8_lossy(&output.stdout).into_owned();
    if task.capture_stderr && !output.stderr.is_empty() {
        if !std_out.is_empty() && !std_out.ends_with('\n') {
            std_out.push('\n');
        }
        std_out.push_str(&String::from_utf8_lossy(&output.stderr));
    }

    Ok(TaskResult {
        success: output.status.success(),
        std_out,
        output_data: Vec::new(),
        execution_time: started.elapsed(),
    })
}

fn file_name_of(path: Option<&str>) -> Option<String> {
    let path = path?;
    let name = std::path::Path::new(path).file_name()?.to_str()?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

#[cfg(test)]
#[path = "executor.test.rs"]
mod tests;
