//! Task input and result types for the local executor.

use std::time::Duration;

use distbuild_invocation::ToolCommandline;

/// One subprocess to run.
#[derive(Debug, Clone, Default)]
pub struct LocalTask {
    pub invocation: ToolCommandline,
    /// Stage `input_data` to a scratch file and point the invocation's
    /// input (and output) at scratch paths before running.
    pub write_input: bool,
    /// Read the invocation's output file into the result afterwards.
    pub read_output: bool,
    pub input_data: Vec<u8>,
    /// Append captured stderr to `std_out`. Version probing turns this off
    /// because some tools print noise there.
    pub capture_stderr: bool,
    /// Environment-preparing command the tool must run under (vcvars).
    pub env_command: Option<String>,
}

impl LocalTask {
    pub fn new(invocation: ToolCommandline) -> Self {
        Self {
            invocation,
            write_input: false,
            read_output: false,
            input_data: Vec::new(),
            capture_stderr: true,
            env_command: None,
        }
    }

    /// Short description for logs and error messages.
    pub fn describe(&self) -> String {
        format!(
            "{} {}",
            self.invocation.tool.executable.display(),
            self.invocation.display_args()
        )
    }
}

/// What the subprocess produced.
#[derive(Debug, Clone, Default)]
pub struct TaskResult {
    pub success: bool,
    pub std_out: String,
    pub output_data: Vec<u8>,
    pub execution_time: Duration,
}

impl TaskResult {
    /// A synthetic failure produced without running anything.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            std_out: message.into(),
            output_data: Vec::new(),
            execution_time: Duration::ZERO,
        }
    }
}

/// Completion callback. Invoked exactly once per task, on an executor
/// worker; must not block.
pub type TaskCallback = Box<dyn FnOnce(TaskResult) + Send + 'static>;
