//! Process identity attached to checkpoints for provenance.
//!
//! A [`Process`] names who produced a checkpoint (pipeline executable, host,
//! optionally the orchestrator dag/task pair). It is an opaque identity tag:
//! nothing in the merge logic reads it.

use std::env;
use std::fmt;

use crate::error::HwmError;

fn default_name() -> String {
    env::current_exe()
        .ok()
        .and_then(|path| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "tidemark".to_string())
}

// Hostname probing mirrors the env-first approach used for usernames in
// connector builds; a real hostname lookup is not worth a dependency here.
fn default_host() -> String {
    for var in ["HOSTNAME", "COMPUTERNAME"] {
        if let Ok(host) = env::var(var) {
            if !host.is_empty() {
                return host;
            }
        }
    }
    "localhost".to_string()
}

/// Identity of the pipeline process producing checkpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    name: String,
    host: String,
    dag: String,
    task: String,
}

impl Process {
    /// Create a process identity with the given name and the default host.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: default_host(),
            dag: String::new(),
            task: String::new(),
        }
    }

    /// Override the host name.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Attach an orchestrator dag/task pair.
    ///
    /// Dag and task are always set together, and neither may contain `.`
    /// (it is the `full_name` delimiter).
    ///
    /// # Errors
    ///
    /// Returns [`HwmError::InvalidProcess`] if either part is empty or
    /// contains a dot.
    pub fn with_dag_task(
        mut self,
        dag: impl Into<String>,
        task: impl Into<String>,
    ) -> Result<Self, HwmError> {
        let dag = dag.into();
        let task = task.into();
        if dag.is_empty() || task.is_empty() {
            return Err(HwmError::InvalidProcess {
                reason: "dag and task must both be set".to_string(),
            });
        }
        if dag.contains('.') || task.contains('.') {
            return Err(HwmError::InvalidProcess {
                reason: "dag and task names cannot contain '.'".to_string(),
            });
        }
        self.dag = dag;
        self.task = task;
        Ok(self)
    }

    /// Process name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host name.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// `dag.task.name`, with unset parts skipped.
    #[must_use]
    pub fn full_name(&self) -> String {
        [self.dag.as_str(), self.task.as_str(), self.name.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Unique process identity: `full_name@host`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}@{}", self.full_name(), self.host)
    }
}

impl Default for Process {
    fn default() -> Self {
        Self::new(default_name())
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}
