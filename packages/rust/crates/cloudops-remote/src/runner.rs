//! One-shot remote command execution.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cloudops_types::{ExecutionResult, Failure, FailureKind, RemoteOutcome, Secret, SuccessOutcome};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::{DEFAULT_PORT, DEFAULT_USER, RemoteConfig};
use crate::error::{RemoteError, Result};
use crate::keys::load_private_key;
use crate::sanitize::CommandSanitizer;
use crate::session::{
    AuthMethods, CommandOutput, ConnectParams, RemoteTransport, SessionGuard, Ssh2Transport,
};

/// Extra time granted past the connect and command bounds before the worker
/// is abandoned.
const WORKER_GRACE: Duration = Duration::from_secs(2);

/// Characters of the command kept in log lines.
const LOGGED_COMMAND_CHARS: usize = 100;

/// Host to run on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Login user.
    pub user: String,
}

impl RemoteTarget {
    /// `root@host:22`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_string(),
        }
    }

    /// Override the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the user.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }
}

/// Per-request authentication material. Never stored.
#[derive(Debug, Clone)]
pub struct SshAuth {
    /// Password.
    pub password: Option<Secret>,
    /// Private key text.
    pub private_key: Option<Secret>,
    /// Private key file, used when no key text is given.
    pub private_key_path: Option<PathBuf>,
    /// Passphrase for an encrypted key.
    pub passphrase: Option<Secret>,
    /// Offer keys held by the local agent.
    pub use_agent: bool,
}

impl Default for SshAuth {
    fn default() -> Self {
        Self {
            password: None,
            private_key: None,
            private_key_path: None,
            passphrase: None,
            use_agent: true,
        }
    }
}

impl SshAuth {
    fn has_key(&self) -> bool {
        self.private_key.as_ref().is_some_and(|k| !k.is_empty()) || self.private_key_path.is_some()
    }

    fn has_any_method(&self) -> bool {
        self.password.is_some() || self.has_key() || self.use_agent
    }
}

/// One remote command request.
#[derive(Debug, Clone)]
pub struct RemoteRequest {
    /// Host.
    pub target: RemoteTarget,
    /// Authentication.
    pub auth: SshAuth,
    /// Shell command.
    pub command: String,
    /// Command bound override.
    pub timeout: Option<Duration>,
    /// Screen the command against the destructive-pattern list.
    pub sanitize: bool,
}

impl RemoteRequest {
    /// Request with agent authentication and sanitization on.
    pub fn new(target: RemoteTarget, command: impl Into<String>) -> Self {
        Self {
            target,
            auth: SshAuth::default(),
            command: command.into(),
            timeout: None,
            sanitize: true,
        }
    }

    /// Replace the authentication material.
    #[must_use]
    pub fn with_auth(mut self, auth: SshAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Override the command bound.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Toggle sanitization.
    #[must_use]
    pub fn with_sanitize(mut self, sanitize: bool) -> Self {
        self.sanitize = sanitize;
        self
    }
}

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing open.
    Disconnected,
    /// TCP connect and handshake in progress.
    Connecting,
    /// Logged in.
    Authenticated,
    /// Command submitted.
    CommandSent,
    /// Exit status received.
    Completed,
    /// Stopped on an error.
    Failed,
}

struct Lifecycle<'a> {
    host: &'a str,
    state: SessionState,
}

impl<'a> Lifecycle<'a> {
    fn new(host: &'a str) -> Self {
        Self {
            host,
            state: SessionState::Disconnected,
        }
    }

    fn advance(&mut self, next: SessionState) {
        debug!(host = self.host, from = ?self.state, to = ?next, "ssh session state");
        self.state = next;
    }

    fn check<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            debug!(host = self.host, state = ?self.state, error = %e, "ssh session failed");
            self.state = SessionState::Failed;
        }
        result
    }
}

/// Connect, authenticate, run, close. Blocking.
fn drive(
    transport: &dyn RemoteTransport,
    params: &ConnectParams,
    user: &str,
    auth: &AuthMethods,
    command: &str,
) -> Result<CommandOutput> {
    let mut lifecycle = Lifecycle::new(&params.host);

    lifecycle.advance(SessionState::Connecting);
    let session = lifecycle.check(transport.connect(params))?;
    let mut guard = SessionGuard::new(session, params.host.clone());

    lifecycle.check(guard.session()?.authenticate(user, auth))?;
    lifecycle.advance(SessionState::Authenticated);

    lifecycle.advance(SessionState::CommandSent);
    let output = lifecycle.check(guard.session()?.exec(command))?;
    lifecycle.advance(SessionState::Completed);
    Ok(output)
}

/// Runs one command per request over a fresh session.
pub struct RemoteCommandRunner {
    transport: Arc<dyn RemoteTransport>,
    config: RemoteConfig,
    sanitizer: CommandSanitizer,
}

impl RemoteCommandRunner {
    /// Runner over libssh2 with the configured host key policy.
    #[must_use]
    pub fn new(config: RemoteConfig) -> Self {
        let transport = Arc::new(Ssh2Transport::new(config.host_key_policy.clone()));
        Self::with_transport(transport, config)
    }

    /// Runner over an explicit transport.
    pub fn with_transport(transport: Arc<dyn RemoteTransport>, config: RemoteConfig) -> Self {
        let sanitizer =
            CommandSanitizer::default().with_extra_patterns(&config.extra_denied_patterns);
        Self {
            transport,
            config,
            sanitizer,
        }
    }

    /// Settings in use.
    #[must_use]
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Sanitizer in use.
    #[must_use]
    pub fn sanitizer(&self) -> &CommandSanitizer {
        &self.sanitizer
    }

    /// Execute `request`. Every failure is returned as a result.
    pub async fn run(&self, request: RemoteRequest) -> ExecutionResult {
        let span = info_span!(
            "ssh_execute",
            request_id = %Uuid::new_v4(),
            host = %request.target.host
        );
        self.run_inner(request).instrument(span).await
    }

    async fn run_inner(&self, request: RemoteRequest) -> ExecutionResult {
        let started = Instant::now();
        let fail = |err: RemoteError| -> ExecutionResult {
            warn!(error = %err, "ssh request rejected");
            Failure::from(err).with_elapsed(started.elapsed()).into()
        };

        if let Err(e) = self.validate(&request) {
            return fail(e);
        }
        let RemoteRequest {
            target,
            auth,
            command,
            timeout,
            ..
        } = request;

        let key = if auth.has_key() {
            match load_private_key(
                auth.private_key.as_ref(),
                auth.private_key_path.as_deref(),
                auth.passphrase.clone(),
            ) {
                Ok(key) => Some(key),
                Err(e) => return fail(e.into()),
            }
        } else {
            None
        };
        let methods = AuthMethods {
            key,
            password: auth.password,
            agent: auth.use_agent,
        };

        let command_timeout = self.config.command_timeout(timeout);
        let params = ConnectParams {
            host: target.host.clone(),
            port: target.port,
            connect_timeout: self.config.connect_timeout(),
            command_timeout,
        };
        info!(
            user = %target.user,
            port = target.port,
            command = %truncate(&command, LOGGED_COMMAND_CHARS),
            "executing ssh command"
        );

        let transport = Arc::clone(&self.transport);
        let user = target.user;
        let worker = tokio::task::spawn_blocking(move || {
            let connect_started = Instant::now();
            let result = drive(transport.as_ref(), &params, &user, &methods, &command);
            (result, connect_started.elapsed())
        });

        let hard_bound = self.config.connect_timeout() + command_timeout + WORKER_GRACE;
        match tokio::time::timeout(hard_bound, worker).await {
            Ok(Ok((Ok(output), elapsed))) => {
                info!(
                    exit_code = output.exit_code,
                    elapsed_ms = elapsed.as_millis(),
                    "ssh command finished"
                );
                success(output, elapsed, target.host)
            }
            Ok(Ok((Err(RemoteError::Timeout { elapsed }), _))) => {
                warn!(timeout_secs = elapsed.as_secs_f64(), "ssh command timed out");
                ExecutionResult::Timeout { elapsed }
            }
            Ok(Ok((Err(e), elapsed))) => {
                warn!(error = %e, "ssh command failed");
                Failure::from(e).with_elapsed(elapsed).into()
            }
            Ok(Err(e)) => Failure::new(FailureKind::Internal, format!("SSH worker failed: {e}"))
                .with_elapsed(started.elapsed())
                .into(),
            Err(_) => {
                warn!(
                    bound_secs = hard_bound.as_secs_f64(),
                    "ssh worker abandoned past its bound"
                );
                ExecutionResult::Timeout {
                    elapsed: command_timeout,
                }
            }
        }
    }

    fn validate(&self, request: &RemoteRequest) -> Result<()> {
        let target = &request.target;
        if target.host.trim().is_empty() {
            return Err(RemoteError::Parameter(
                "Hostname is required for SSH connection".to_string(),
            ));
        }
        if target.user.trim().is_empty() {
            return Err(RemoteError::Parameter(
                "Username is required for SSH connection".to_string(),
            ));
        }
        if target.port == 0 {
            return Err(RemoteError::Parameter(
                "Port must be between 1 and 65535".to_string(),
            ));
        }
        if !request.auth.has_any_method() {
            return Err(RemoteError::Parameter(
                "At least one authentication method is required: password, private key, or SSH agent"
                    .to_string(),
            ));
        }
        if request.sanitize {
            self.sanitizer.check(&request.command)?;
        } else if request.command.trim().is_empty() {
            return Err(RemoteError::EmptyCommand);
        }
        Ok(())
    }
}

impl std::fmt::Debug for RemoteCommandRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCommandRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn success(output: CommandOutput, elapsed: Duration, hostname: String) -> ExecutionResult {
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    ExecutionResult::Success(SuccessOutcome {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        warnings: (!stderr.is_empty()).then_some(stderr),
        remote: Some(RemoteOutcome {
            exit_code: output.exit_code,
            execution_time: elapsed,
            hostname,
        }),
    })
}

fn truncate(command: &str, max_chars: usize) -> String {
    match command.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &command[..idx]),
        None => command.to_string(),
    }
}
