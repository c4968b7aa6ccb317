//! `distbuild` — the compiler front-end.
//!
//! Wraps one compiler invocation: preprocess locally, compile on a worker,
//! put the object file where the original command would have. Anything the
//! splitter cannot handle runs locally, unchanged, so the build behaves as
//! if the accelerator were not there.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use distbuild_client::RemoteToolClient;
use distbuild_config::ConfigFile;
use distbuild_executor::LocalExecutor;
use distbuild_executor::LocalTask;
use distbuild_invocation::InvocationRewriter;
use distbuild_invocation::InvokeKind;
use distbuild_invocation::ToolCommandline;
use distbuild_transport::TransportSettings;
use distbuild_version::VersionChecker;
use tracing::debug;
use tracing::warn;

use distbuild_cli::loadavg;
use distbuild_cli::logging;

/// Compiler front-end: `distbuild [options] -- <compiler> <args>...`.
#[derive(Debug, Parser)]
#[command(name = "distbuild", version, about)]
struct Args {
    /// Config file (default: $DISTBUILD_CONFIG or ~/.distbuild.toml).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Tool id to run as, instead of matching the executable name.
    #[arg(long, value_name = "ID")]
    tool: Option<String>,

    /// The compiler command line.
    #[arg(
        trailing_var_arg = true,
        allow_hyphen_values = true,
        required = true,
        value_name = "COMMAND"
    )]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init("warn");
    let args = Args::parse();

    let config_path = distbuild_config::find_config(args.config.as_deref());
    let config = match distbuild_config::load_config(&config_path) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("distbuild: {error}");
            return ExitCode::FAILURE;
        }
    };

    let rewriter = InvocationRewriter::new(config.tools.clone());
    let recognized = match &args.tool {
        Some(tool_id) => rewriter.parse(tool_id, args.command[1..].to_vec()),
        None => rewriter.recognize(&args.command),
    };
    let invocation = match recognized {
        Ok(invocation) => invocation,
        Err(error) => {
            // Not ours to accelerate.
            debug!(%error, "running locally");
            return run_local(&args.command);
        }
    };

    if invocation.kind != InvokeKind::Compile {
        return run_local(&args.command);
    }
    if config.client.max_load_average > 0.0 && loadavg::one_minute() > config.client.max_load_average
    {
        debug!("load average above threshold, running locally");
        return run_local(&args.command);
    }

    match compile_remote(&config, &rewriter, &invocation).await {
        RemoteResult::Done(code) => code,
        RemoteResult::FallBack(reason) => {
            warn!(%reason, "remote compile unavailable, running locally");
            run_local(&args.command)
        }
    }
}

enum RemoteResult {
    Done(ExitCode),
    FallBack(String),
}

async fn compile_remote(
    config: &ConfigFile,
    rewriter: &InvocationRewriter,
    invocation: &ToolCommandline,
) -> RemoteResult {
    let temp_dir = config.temp_dir();
    let preprocessed_path = preprocessed_path_for(&temp_dir, invocation);
    let split = match rewriter.split(invocation, &preprocessed_path.to_string_lossy()) {
        Ok(split) => split,
        Err(error) => return RemoteResult::FallBack(error.to_string()),
    };

    let executor = LocalExecutor::new(2, temp_dir);

    // Preprocess locally. A preprocessor failure is the same failure the
    // plain compiler would print, so surface it instead of retrying.
    if let Err(error) = tokio::fs::create_dir_all(
        preprocessed_path.parent().unwrap_or(&PathBuf::from(".")),
    )
    .await
    {
        return RemoteResult::FallBack(format!("cannot create scratch dir: {error}"));
    }
    let mut preprocess = LocalTask::new(split.preprocess.clone());
    preprocess.read_output = true;
    let pp_result = executor.exec(preprocess).await;
    if !pp_result.success {
        eprint!("{}", pp_result.std_out);
        let _ = tokio::fs::remove_file(&preprocessed_path).await;
        return RemoteResult::Done(ExitCode::FAILURE);
    }
    let _ = tokio::fs::remove_file(&preprocessed_path).await;

    // Version-match against the workers with this one tool's version.
    let checker = VersionChecker::new(executor, rewriter.clone());
    let versions = checker
        .determine_tool_versions(&[invocation.tool.tool_id.clone()])
        .await;

    let client = RemoteToolClient::new(
        config.client.clone(),
        TransportSettings::default(),
        versions,
    );
    client.start();

    let mut compile = split.compile.clone();
    rewriter.prepare_remote(&mut compile);
    let outcome = client.invoke_tool(&compile, &pp_result.output_data).await;
    client.stop();

    if outcome.success {
        if !outcome.std_out.is_empty() {
            eprint!("{}", outcome.std_out);
        }
        let Some(output_path) = split.compile.output().map(PathBuf::from) else {
            return RemoteResult::FallBack("compile half lost its output".to_string());
        };
        if let Some(parent) = output_path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        if let Err(error) = tokio::fs::write(&output_path, &outcome.file_data).await {
            eprintln!("distbuild: cannot write {}: {error}", output_path.display());
            return RemoteResult::Done(ExitCode::FAILURE);
        }
        return RemoteResult::Done(ExitCode::SUCCESS);
    }

    // A worker ran the tool and the tool failed: deterministic, the local
    // compiler would say the same. Everything else falls back.
    if outcome.worker.is_some() {
        eprint!("{}", outcome.std_out);
        return RemoteResult::Done(ExitCode::FAILURE);
    }
    RemoteResult::FallBack(outcome.std_out)
}

/// Scratch path for the preprocessed source: pid-qualified so concurrent
/// front-ends never collide.
fn preprocessed_path_for(temp_dir: &std::path::Path, invocation: &ToolCommandline) -> PathBuf {
    let stem = invocation
        .input()
        .map(|input| {
            std::path::Path::new(input)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unit".to_string())
        })
        .unwrap_or_else(|| "unit".to_string());
    temp_dir.join(format!("{}_{stem}.i", std::process::id()))
}

/// Run the original command untouched and mirror its exit status.
fn run_local(command: &[String]) -> ExitCode {
    let Some((executable, rest)) = command.split_first() else {
        eprintln!("distbuild: empty command");
        return ExitCode::FAILURE;
    };
    match std::process::Command::new(executable).args(rest).status() {
        Ok(status) => {
            if status.success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(status.code().unwrap_or(1).clamp(0, 255) as u8)
            }
        }
        Err(error) => {
            eprintln!("distbuild: failed to run {executable}: {error}");
            ExitCode::FAILURE
        }
    }
}
