//! Transport seam and the libssh2-backed implementation.
//!
//! Every method here blocks; the runner calls them from the blocking pool.

use std::io::{ErrorKind, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use ssh2::{CheckResult, KnownHostFileKind, Session};
use tracing::{debug, warn};

use crate::config::HostKeyPolicy;
use crate::error::{RemoteError, Result};
use crate::keys::PrivateKey;

/// Where to connect and how long each phase may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Connect, handshake and authentication bound.
    pub connect_timeout: Duration,
    /// Command bound.
    pub command_timeout: Duration,
}

/// Authentication material offered to the server, tried in field order.
#[derive(Debug, Clone, Default)]
pub struct AuthMethods {
    /// Public key.
    pub key: Option<PrivateKey>,
    /// Password.
    pub password: Option<cloudops_types::Secret>,
    /// Ask the local agent.
    pub agent: bool,
}

/// Captured result of one command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit status reported by the server.
    pub exit_code: i32,
    /// Standard output.
    pub stdout: Vec<u8>,
    /// Standard error.
    pub stderr: Vec<u8>,
}

/// Opens sessions.
pub trait RemoteTransport: Send + Sync {
    /// Open the transport and complete the handshake.
    ///
    /// # Errors
    ///
    /// [`RemoteError::Connection`] when the host cannot be reached or its key
    /// is refused.
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn RemoteSession>>;
}

/// One open session.
pub trait RemoteSession: Send {
    /// Authenticate as `user`.
    ///
    /// # Errors
    ///
    /// [`RemoteError::Authentication`] when every method is refused.
    fn authenticate(&mut self, user: &str, auth: &AuthMethods) -> Result<()>;

    /// Run exactly one command and wait for it to finish.
    ///
    /// # Errors
    ///
    /// [`RemoteError::Channel`] or [`RemoteError::Timeout`].
    fn exec(&mut self, command: &str) -> Result<CommandOutput>;

    /// Close the session.
    ///
    /// # Errors
    ///
    /// Any failure while disconnecting.
    fn close(&mut self) -> Result<()>;
}

/// Closes the wrapped session when dropped, on every path.
pub struct SessionGuard {
    session: Option<Box<dyn RemoteSession>>,
    host: String,
}

impl SessionGuard {
    /// Take ownership of `session`.
    pub fn new(session: Box<dyn RemoteSession>, host: impl Into<String>) -> Self {
        Self {
            session: Some(session),
            host: host.into(),
        }
    }

    /// Borrow the session.
    ///
    /// # Errors
    ///
    /// [`RemoteError::Internal`] after the session was closed.
    pub fn session(&mut self) -> Result<&mut (dyn RemoteSession + 'static)> {
        self.session
            .as_deref_mut()
            .ok_or_else(|| RemoteError::Internal("session already closed".to_string()))
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            match session.close() {
                Ok(()) => debug!(host = %self.host, "ssh session closed"),
                Err(e) => warn!(host = %self.host, error = %e, "error closing ssh session"),
            }
        }
    }
}

/// libssh2 transport.
#[derive(Debug, Clone, Default)]
pub struct Ssh2Transport {
    host_key_policy: HostKeyPolicy,
}

impl Ssh2Transport {
    /// Transport applying `host_key_policy`.
    #[must_use]
    pub fn new(host_key_policy: HostKeyPolicy) -> Self {
        Self { host_key_policy }
    }

    fn open_tcp(params: &ConnectParams) -> Result<TcpStream> {
        let addrs: Vec<SocketAddr> = (params.host.as_str(), params.port)
            .to_socket_addrs()
            .map_err(|e| {
                RemoteError::Connection(format!("failed to resolve {}: {e}", params.host))
            })?
            .collect();

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, params.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    debug!(%addr, error = %e, "tcp connect attempt failed");
                    last_error = Some(e);
                }
            }
        }
        Err(RemoteError::Connection(match last_error {
            Some(e) => format!("failed to connect to {}:{}: {e}", params.host, params.port),
            None => format!("no addresses found for {}", params.host),
        }))
    }

    fn verify_host_key(&self, session: &Session, params: &ConnectParams) -> Result<()> {
        let HostKeyPolicy::KnownHosts(path) = &self.host_key_policy else {
            return Ok(());
        };
        let mut known = session.known_hosts().map_err(connection_error)?;
        known
            .read_file(path, KnownHostFileKind::OpenSSH)
            .map_err(|e| {
                RemoteError::Connection(format!(
                    "failed to read known_hosts {}: {e}",
                    path.display()
                ))
            })?;
        let (key, _) = session
            .host_key()
            .ok_or_else(|| RemoteError::Connection("server sent no host key".to_string()))?;
        match known.check_port(&params.host, params.port, key) {
            CheckResult::Match => Ok(()),
            CheckResult::NotFound => Err(RemoteError::Connection(format!(
                "host key for {} not found in {}",
                params.host,
                path.display()
            ))),
            CheckResult::Mismatch => Err(RemoteError::Connection(format!(
                "host key mismatch for {}",
                params.host
            ))),
            CheckResult::Failure => Err(RemoteError::Connection(format!(
                "host key check failed for {}",
                params.host
            ))),
        }
    }
}

impl RemoteTransport for Ssh2Transport {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn RemoteSession>> {
        let tcp = Self::open_tcp(params)?;
        let mut session = Session::new().map_err(connection_error)?;
        session.set_timeout(millis(params.connect_timeout));
        session.set_compress(true);
        session.set_tcp_stream(tcp);
        session.handshake().map_err(connection_error)?;
        self.verify_host_key(&session, params)?;
        debug!(host = %params.host, port = params.port, "ssh handshake complete");

        Ok(Box::new(Ssh2Session {
            session,
            command_timeout: params.command_timeout,
        }))
    }
}

struct Ssh2Session {
    session: Session,
    command_timeout: Duration,
}

impl RemoteSession for Ssh2Session {
    fn authenticate(&mut self, user: &str, auth: &AuthMethods) -> Result<()> {
        let mut refused = Vec::new();

        if let Some(key) = &auth.key {
            let passphrase = key.passphrase().map(cloudops_types::Secret::expose);
            match self
                .session
                .userauth_pubkey_memory(user, None, key.pem().expose(), passphrase)
            {
                Ok(()) if self.session.authenticated() => return Ok(()),
                Ok(()) => refused.push(format!("publickey ({})", key.algorithm())),
                Err(e) => refused.push(format!("publickey ({}): {e}", key.algorithm())),
            }
        }
        if let Some(password) = &auth.password {
            match self.session.userauth_password(user, password.expose()) {
                Ok(()) if self.session.authenticated() => return Ok(()),
                Ok(()) => refused.push("password".to_string()),
                Err(e) => refused.push(format!("password: {e}")),
            }
        }
        if auth.agent {
            match self.session.userauth_agent(user) {
                Ok(()) if self.session.authenticated() => return Ok(()),
                Ok(()) => refused.push("agent".to_string()),
                Err(e) => refused.push(format!("agent: {e}")),
            }
        }

        if refused.is_empty() {
            refused.push("no methods offered".to_string());
        }
        Err(RemoteError::Authentication(format!(
            "{user}: {}",
            refused.join("; ")
        )))
    }

    fn exec(&mut self, command: &str) -> Result<CommandOutput> {
        let started = Instant::now();
        self.session.set_timeout(millis(self.command_timeout));
        let mut channel = self.session.channel_session().map_err(channel_error)?;
        channel.exec(command).map_err(channel_error)?;

        // Drain both streams without blocking so a full stderr window
        // cannot stall stdout.
        self.session.set_blocking(false);
        let mut output = CommandOutput::default();
        let mut buf = [0u8; 8192];
        loop {
            let mut progressed = false;
            match channel.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => {
                    output.stdout.extend_from_slice(&buf[..n]);
                    progressed = true;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => return Err(RemoteError::Channel(format!("stdout read failed: {e}"))),
            }
            match channel.stderr().read(&mut buf) {
                Ok(0) => {}
                Ok(n) => {
                    output.stderr.extend_from_slice(&buf[..n]);
                    progressed = true;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => return Err(RemoteError::Channel(format!("stderr read failed: {e}"))),
            }
            if channel.eof() && !progressed {
                break;
            }
            if started.elapsed() > self.command_timeout {
                self.session.set_blocking(true);
                if let Err(e) = channel.close() {
                    debug!(error = %e, "closing timed-out channel failed");
                }
                return Err(RemoteError::Timeout {
                    elapsed: self.command_timeout,
                });
            }
            if !progressed {
                std::thread::sleep(Duration::from_millis(10));
            }
        }
        self.session.set_blocking(true);

        channel.wait_close().map_err(channel_error)?;
        output.exit_code = channel.exit_status().map_err(channel_error)?;
        Ok(output)
    }

    fn close(&mut self) -> Result<()> {
        self.session.set_blocking(true);
        self.session
            .disconnect(None, "closing", None)
            .map_err(connection_error)
    }
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

/// `LIBSSH2_ERROR_TIMEOUT`.
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;

fn is_timeout(err: &ssh2::Error) -> bool {
    err.code() == ssh2::ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT)
}

fn connection_error(err: ssh2::Error) -> RemoteError {
    if is_timeout(&err) {
        RemoteError::Connection(format!("timed out: {err}"))
    } else {
        RemoteError::Connection(err.to_string())
    }
}

fn channel_error(err: ssh2::Error) -> RemoteError {
    RemoteError::Channel(err.to_string())
}
