//! Backend invoker
//!
//! Runs a backend executable as a child process for every inference:
//!
//! ```text
//! <program> [args...] --input <artifact> [--model <weights>]
//! ```
//!
//! Success is decided by the exit status. On exit 0 the trimmed stdout must
//! be exactly one line: the label, passed through verbatim (an RNN may answer
//! "a or t?"). A non-zero exit is a hard failure carrying the child's stderr.
//! A crashing or hanging backend never takes the service down: the child is
//! killed when the timeout expires.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use glyph_common::config::{RootFolder, TomlConfig};
use glyph_common::BackendKind;

/// Invocation errors
#[derive(Debug, Error)]
pub enum InvokeError {
    /// Backend disabled at startup (missing model weights, not configured)
    #[error("{kind} backend unavailable: {reason}")]
    Unavailable { kind: BackendKind, reason: String },

    /// The executable could not be started
    #[error("failed to start {kind} backend '{}': {source}", .program.display())]
    Spawn {
        kind: BackendKind,
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit status
    #[error("{kind} inference failed (exit code {code:?}):\n{stderr}")]
    Failed {
        kind: BackendKind,
        code: Option<i32>,
        stderr: String,
    },

    /// Exit 0 but no usable label
    #[error("{kind} backend returned invalid output: {reason}")]
    InvalidOutput { kind: BackendKind, reason: String },

    /// Child killed after exceeding the invocation timeout
    #[error("{kind} backend timed out after {}s", .after.as_secs_f64())]
    Timeout { kind: BackendKind, after: Duration },
}

/// How to run one backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSpec {
    pub program: PathBuf,
    /// Arguments placed before `--input`
    pub args: Vec<String>,
    /// Passed as `--model` when set; must exist at startup
    pub model: Option<PathBuf>,
}

impl BackendSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            model: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_model(mut self, model: impl Into<PathBuf>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[derive(Debug, Clone)]
enum BackendSlot {
    Ready(BackendSpec),
    Unavailable(String),
}

/// Availability of a backend as reported by `/health`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStatus {
    pub kind: BackendKind,
    pub available: bool,
    pub detail: Option<String>,
}

/// Dispatches artifacts to backend processes
#[derive(Debug, Clone, Default)]
pub struct BackendInvoker {
    backends: BTreeMap<BackendKind, BackendSlot>,
    timeout: Option<Duration>,
}

impl BackendInvoker {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            backends: BTreeMap::new(),
            timeout,
        }
    }

    /// Register a backend, disabling it when its model weights are missing
    pub fn with_backend(mut self, kind: BackendKind, spec: BackendSpec) -> Self {
        let slot = match &spec.model {
            Some(model) if !model.exists() => {
                let reason = format!("model file not found at {}", model.display());
                error!("{} backend disabled: {}", kind.display_name(), reason);
                BackendSlot::Unavailable(reason)
            }
            _ => {
                info!(
                    program = %spec.program.display(),
                    model = ?spec.model,
                    "{} backend ready",
                    kind.display_name()
                );
                BackendSlot::Ready(spec)
            }
        };
        self.backends.insert(kind, slot);
        self
    }

    /// Build the invoker for every backend kind from configuration
    ///
    /// Unset programs default to the sibling executables of the running
    /// binary; unset models default to `<models_dir>/<kind>/...`.
    pub fn from_config(toml: &TomlConfig, root: &RootFolder) -> Self {
        let models_dir = root.models_dir();
        let mut invoker = Self::new(toml.invoke_timeout());

        for &kind in BackendKind::all_variants() {
            let config = toml.backends.get(kind).cloned().unwrap_or_default();
            let program = config.program.unwrap_or_else(|| default_program(kind));
            let model = config
                .model
                .unwrap_or_else(|| models_dir.join(kind.default_model_file()));

            let spec = BackendSpec::new(program)
                .with_args(config.args)
                .with_model(model);
            invoker = invoker.with_backend(kind, spec);
        }

        invoker
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_available(&self, kind: BackendKind) -> bool {
        matches!(self.backends.get(&kind), Some(BackendSlot::Ready(_)))
    }

    pub fn status(&self) -> Vec<BackendStatus> {
        BackendKind::all_variants()
            .iter()
            .map(|&kind| match self.backends.get(&kind) {
                Some(BackendSlot::Ready(_)) => BackendStatus {
                    kind,
                    available: true,
                    detail: None,
                },
                Some(BackendSlot::Unavailable(reason)) => BackendStatus {
                    kind,
                    available: false,
                    detail: Some(reason.clone()),
                },
                None => BackendStatus {
                    kind,
                    available: false,
                    detail: Some("not configured".to_string()),
                },
            })
            .collect()
    }

    /// Run the backend for `kind` on an artifact and return its label
    pub async fn infer(&self, kind: BackendKind, artifact: &Path) -> Result<String, InvokeError> {
        let spec = match self.backends.get(&kind) {
            Some(BackendSlot::Ready(spec)) => spec,
            Some(BackendSlot::Unavailable(reason)) => {
                return Err(InvokeError::Unavailable {
                    kind,
                    reason: reason.clone(),
                })
            }
            None => {
                return Err(InvokeError::Unavailable {
                    kind,
                    reason: "not configured".to_string(),
                })
            }
        };

        let mut command = Command::new(&spec.program);
        command.args(&spec.args).arg("--input").arg(artifact);
        if let Some(model) = &spec.model {
            command.arg("--model").arg(model);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            program = %spec.program.display(),
            artifact = %artifact.display(),
            "Running {} backend",
            kind.display_name()
        );

        let spawn_error = |source: std::io::Error| InvokeError::Spawn {
            kind,
            program: spec.program.clone(),
            source,
        };

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| {
                    warn!(artifact = %artifact.display(), "{} backend timed out", kind.display_name());
                    InvokeError::Timeout { kind, after: limit }
                })?
                .map_err(spawn_error)?,
            None => command.output().await.map_err(spawn_error)?,
        };

        if !output.status.success() {
            return Err(InvokeError::Failed {
                kind,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8(output.stdout).map_err(|_| InvokeError::InvalidOutput {
            kind,
            reason: "stdout is not valid UTF-8".to_string(),
        })?;
        let label = stdout.trim();
        if label.is_empty() {
            return Err(InvokeError::InvalidOutput {
                kind,
                reason: "empty stdout".to_string(),
            });
        }
        if label.contains('\n') {
            return Err(InvokeError::InvalidOutput {
                kind,
                reason: format!("expected one line on stdout, got {}", label.lines().count()),
            });
        }

        Ok(label.to_string())
    }
}

/// Backend executable installed next to the running binary
pub fn default_program(kind: BackendKind) -> PathBuf {
    let name = format!("{}{}", kind.executable_name(), std::env::consts::EXE_SUFFIX);
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&name)))
        .unwrap_or_else(|| PathBuf::from(name))
}
