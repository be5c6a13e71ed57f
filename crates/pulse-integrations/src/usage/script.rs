//! Subprocess-backed analytics.
//!
//! The external script prints one JSON report on stdout. Credentials reach it
//! through the environment only; nothing about them is echoed back to HTTP
//! callers.

use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pulse_core::config::{AnalyticsConfig, ScriptConfig};
use pulse_core::shutdown::ShutdownSignal;
use pulse_core::types::{describe_reported_error, AnalyticsReport, UsageSnapshot};
use pulse_telemetry::metrics::{global_metrics, UPSTREAM_REQUESTS_TOTAL, UPSTREAM_REQUEST_DURATION};
use pulse_telemetry::tracing_setup::upstream_span;
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn, Instrument};

use super::{degrade, UsageError, UsageSource};

/// Env var carrying the service-account key file path.
pub const CREDENTIALS_FILE_ENV: &str = "GOOGLE_SERVICE_ACCOUNT_FILE";
/// Env var carrying the impersonated admin identity.
pub const ADMIN_EMAIL_ENV: &str = "DOMAIN_ADMIN_EMAIL";

const SOURCE: &str = "analytics_script";
const STDERR_LOG_LIMIT: usize = 2048;

#[derive(Debug, Clone)]
struct Credentials {
    file: String,
    admin_email: String,
}

/// How a child run ended.
enum Finished {
    Exited {
        status: ExitStatus,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    WaitFailed(std::io::Error),
    TimedOut,
    ShutDown,
}

// ---------------------------------------------------------------------------
// ScriptRunner
// ---------------------------------------------------------------------------

/// Runs one configured analytics script and parses its report.
///
/// Every run is bounded: the child is killed (with its whole process group on
/// unix) when the timeout elapses or the shutdown signal fires, and it is
/// spawned with `kill_on_drop` so an abandoned request never leaks it.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    script: ScriptConfig,
    credentials: Option<Credentials>,
    shutdown: Option<ShutdownSignal>,
}

impl ScriptRunner {
    pub fn new(script: ScriptConfig) -> Self {
        Self {
            script,
            credentials: None,
            shutdown: None,
        }
    }

    /// Runner for `script` with the credentials from the analytics section,
    /// when both of them are set.
    pub fn for_analytics(analytics: &AnalyticsConfig, script: &ScriptConfig) -> Self {
        let runner = Self::new(script.clone());
        match (&analytics.credentials_file, &analytics.admin_email) {
            (Some(file), Some(email)) if analytics.has_credentials() => {
                runner.with_credentials(file.trim(), email.trim())
            }
            _ => runner,
        }
    }

    pub fn with_credentials(
        mut self,
        file: impl Into<String>,
        admin_email: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            file: file.into(),
            admin_email: admin_email.into(),
        });
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.script.timeout_secs)
    }

    /// Run and parse, degrading unavailability to `T::placeholder`.
    pub async fn fetch_report<T: AnalyticsReport>(&self) -> Result<T, UsageError> {
        degrade(SOURCE, self.run_report().await)
    }

    /// Run and parse without degrading.
    pub async fn run_report<T: AnalyticsReport>(&self) -> Result<T, UsageError> {
        let start = Instant::now();
        let result = self
            .run_and_parse::<T>()
            .instrument(upstream_span(SOURCE))
            .await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(UsageError::Unavailable(_)) => "unavailable",
            Err(UsageError::ContractViolation(_)) => "contract_violation",
        };
        let m = global_metrics();
        m.increment_counter(UPSTREAM_REQUESTS_TOTAL, &[("source", SOURCE), ("outcome", outcome)]);
        m.record_histogram(
            UPSTREAM_REQUEST_DURATION,
            &[("source", SOURCE)],
            start.elapsed().as_secs_f64(),
        );
        if let Err(UsageError::ContractViolation(reason)) = &result {
            warn!(reason = %reason, "analytics script broke the report contract");
        }
        result
    }

    async fn run_and_parse<T: AnalyticsReport>(&self) -> Result<T, UsageError> {
        let stdout = self.execute().await?;
        parse_report(&stdout)
    }

    /// Spawn the script and return its stdout if it exited cleanly.
    async fn execute(&self) -> Result<String, UsageError> {
        let Some(credentials) = &self.credentials else {
            return Err(UsageError::Unavailable(
                "analytics credentials are not configured".into(),
            ));
        };
        if self
            .shutdown
            .as_ref()
            .is_some_and(ShutdownSignal::is_shutting_down)
        {
            return Err(UsageError::Unavailable("service is shutting down".into()));
        }

        let mut cmd = Command::new(&self.script.program);
        cmd.args(&self.script.args)
            .envs(&self.script.env)
            .env(CREDENTIALS_FILE_ENV, &credentials.file)
            .env(ADMIN_EMAIL_ENV, &credentials.admin_email)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.script.working_dir {
            cmd.current_dir(dir);
        }
        // Own process group, so a timeout also takes out grandchildren.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            warn!(program = %self.script.program, error = %e, "failed to launch analytics script");
            UsageError::Unavailable("analytics script could not be started".into())
        })?;
        let pid = child.id();
        debug!(?pid, program = %self.script.program, "analytics script started");

        match self.wait(&mut child).await {
            Finished::Exited {
                status,
                stdout,
                stderr,
            } => {
                log_stderr(&stderr);
                if !status.success() {
                    warn!(%status, "analytics script failed");
                    return Err(UsageError::Unavailable(format!(
                        "analytics script exited with {}",
                        describe_status(status)
                    )));
                }
                String::from_utf8(stdout).map_err(|_| {
                    UsageError::ContractViolation("output is not valid UTF-8".into())
                })
            }
            Finished::WaitFailed(e) => {
                terminate(&mut child, pid).await;
                warn!(error = %e, "lost track of analytics script");
                Err(UsageError::Unavailable(
                    "analytics script could not be awaited".into(),
                ))
            }
            Finished::TimedOut => {
                terminate(&mut child, pid).await;
                warn!(timeout_secs = self.script.timeout_secs, "analytics script timed out");
                Err(UsageError::Unavailable(format!(
                    "analytics script timed out after {}s",
                    self.script.timeout_secs
                )))
            }
            Finished::ShutDown => {
                terminate(&mut child, pid).await;
                info!("analytics script stopped for shutdown");
                Err(UsageError::Unavailable("service is shutting down".into()))
            }
        }
    }

    /// Drain both pipes and wait for exit, bounded by the timeout and the
    /// shutdown signal.
    async fn wait(&self, child: &mut Child) -> Finished {
        let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take())
        else {
            return Finished::WaitFailed(std::io::Error::other("child pipes were not captured"));
        };

        let run = async {
            let mut out = Vec::new();
            let mut err = Vec::new();
            let (status, _, _) = tokio::join!(
                child.wait(),
                stdout.read_to_end(&mut out),
                stderr.read_to_end(&mut err),
            );
            (status, out, err)
        };

        let shutdown = self.shutdown.clone();
        let shutdown_requested = async move {
            match shutdown {
                Some(signal) => signal.triggered().await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            res = tokio::time::timeout(self.timeout(), run) => match res {
                Ok((Ok(status), stdout, stderr)) => Finished::Exited { status, stdout, stderr },
                Ok((Err(e), _, _)) => Finished::WaitFailed(e),
                Err(_) => Finished::TimedOut,
            },
            _ = shutdown_requested => Finished::ShutDown,
        }
    }
}

/// Kill the child and reap it.
async fn terminate(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        kill_process_group(pid);
    }
    if let Err(e) = child.kill().await {
        debug!(error = %e, "analytics script already gone");
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) with a negative pid signals the process group the child
    // leads; a stale id only yields ESRCH.
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

fn log_stderr(stderr: &[u8]) {
    if stderr.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let shown = match text.char_indices().nth(STDERR_LOG_LIMIT) {
        Some((idx, _)) => &text[..idx],
        None => text,
    };
    debug!(stderr = %shown, "analytics script stderr");
}

/// Parse one report from script stdout.
///
/// Empty output or an in-band `"error"` flag means the source is unavailable.
/// Anything else that fails to parse or normalize is a contract violation.
pub fn parse_report<T: AnalyticsReport>(stdout: &str) -> Result<T, UsageError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(UsageError::Unavailable(
            "analytics script produced no output".into(),
        ));
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| UsageError::ContractViolation(format!("output is not JSON: {e}")))?;
    if !value.is_object() {
        return Err(UsageError::ContractViolation(
            "output is not a JSON object".into(),
        ));
    }
    // Error reports carry partial shapes, so check before typed parsing.
    if let Some(message) = describe_reported_error(value.get("error")) {
        warn!(error = %message, "analytics script reported a failure");
        return Err(UsageError::Unavailable(
            "analytics source reported an error".into(),
        ));
    }

    let mut report: T = serde_json::from_value(value)
        .map_err(|e| UsageError::ContractViolation(format!("unexpected report shape: {e}")))?;
    report
        .normalize()
        .map_err(|e| UsageError::ContractViolation(e.to_string()))?;
    Ok(report)
}

// ---------------------------------------------------------------------------
// ScriptUsageSource
// ---------------------------------------------------------------------------

/// [`UsageSource`] backed by the external tracker script.
#[derive(Debug, Clone)]
pub struct ScriptUsageSource {
    runner: ScriptRunner,
}

impl ScriptUsageSource {
    pub fn new(runner: ScriptRunner) -> Self {
        Self { runner }
    }

    pub fn from_config(analytics: &AnalyticsConfig, shutdown: ShutdownSignal) -> Self {
        Self::new(ScriptRunner::for_analytics(analytics, &analytics.script).with_shutdown(shutdown))
    }

    /// Snapshot from the script; failures other than a contract violation
    /// come back as the placeholder.
    pub async fn fetch_usage_snapshot(&self) -> Result<UsageSnapshot, UsageError> {
        self.runner.fetch_report().await
    }
}

#[async_trait]
impl UsageSource for ScriptUsageSource {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn fetch(&self) -> Result<UsageSnapshot, UsageError> {
        self.fetch_usage_snapshot().await
    }
}
