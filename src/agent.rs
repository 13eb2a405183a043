//! Agent Lifecycle — identity at construction, one-shot start.
//!
//! `Agent::new` resolves the identity and fails fast on a malformed artifact
//! name. `Agent::start` is latched: the first call registers the build
//! exclusion, and if the host is in developer mode, hooks the quit path and
//! spawns the single background worker. Later calls do nothing.

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::config::AgentConfig;
use crate::connection::shutdown::ShutdownHandle;
use crate::connection::ConnectionManager;
use crate::host::Host;
use crate::identity::{self, Identity};
use crate::transport::ws::WsConnector;
use crate::transport::Connector;
use crate::{WarpError, WarpResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Background worker spawned.
    Started,
    /// `start` already ran in this process.
    AlreadyStarted,
    /// Not in developer mode, or disabled by configuration.
    Inert,
}

pub struct Agent {
    host: Arc<dyn Host>,
    config: AgentConfig,
    identity: Identity,
    started: AtomicBool,
    shutdown: Arc<ShutdownHandle>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Agent {
    /// Resolve identity from the deployed artifact at `artifact_path`.
    pub fn new(host: Arc<dyn Host>, config: AgentConfig, artifact_path: &Path) -> WarpResult<Self> {
        let artifact = identity::resolve_path(artifact_path)?;
        let identity = Identity::new(artifact, &host.game_dir(), &config);

        tracing::info!(
            version = %identity.artifact.version,
            checksum = identity.artifact.checksum.as_deref().unwrap_or("-"),
            project_root = %identity.project_root,
            "Warp agent identity resolved"
        );

        Ok(Self {
            host,
            config,
            identity,
            started: AtomicBool::new(false),
            shutdown: ShutdownHandle::new(),
            worker: Mutex::new(None),
        })
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn shutdown_handle(&self) -> Arc<ShutdownHandle> {
        self.shutdown.clone()
    }

    /// Start over WebSocket.
    pub fn start(&self) -> WarpResult<StartOutcome> {
        self.start_with(WsConnector::new(&self.identity, &self.config))
    }

    /// Start over the given transport.
    pub fn start_with<C>(&self, connector: C) -> WarpResult<StartOutcome>
    where
        C: Connector + Send + 'static,
    {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Warp agent already started");
            return Ok(StartOutcome::AlreadyStarted);
        }

        self.host.exclude_from_build(&self.identity.exclusion_pattern());

        if !self.config.enabled {
            tracing::info!("Warp agent disabled by configuration");
            return Ok(StartOutcome::Inert);
        }
        if !self.host.is_developer_mode() {
            tracing::debug!("Host not in developer mode, warp agent inert");
            return Ok(StartOutcome::Inert);
        }

        let handle = self.shutdown.clone();
        let close_timeout = self.config.close_timeout();
        self.host.on_quit(Box::new(move || {
            let closed = std::panic::catch_unwind(AssertUnwindSafe(|| handle.trigger(close_timeout)));
            match closed {
                Ok(true) => {}
                Ok(false) => tracing::warn!("Connection still open at quit"),
                Err(_) => tracing::error!("Shutdown hook panicked"),
            }
        }));

        let mut manager =
            ConnectionManager::new(connector, self.host.clone(), &self.config, self.shutdown.clone());

        // Detached: never keeps the host process alive
        let worker = std::thread::Builder::new()
            .name("warp-agent".to_string())
            .spawn(move || {
                manager.run();
                tracing::info!("Warp agent worker stopped");
            })
            .map_err(|e| WarpError::Spawn(e.to_string()))?;

        if let Ok(mut slot) = self.worker.lock() {
            *slot = Some(worker);
        }
        tracing::info!("Warp agent thread started");
        Ok(StartOutcome::Started)
    }

    /// True while the background worker is alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|w| !w.is_finished()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FakeConnector, FakeHost, HostCall};
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    fn artifact() -> PathBuf {
        PathBuf::from("/projects/novel/game/renpy_warp_1.4.0_3f9a2c.rpe")
    }

    fn test_config() -> AgentConfig {
        AgentConfig {
            retry_backoff_ms: 5,
            close_timeout_ms: 500,
            ..AgentConfig::default()
        }
    }

    fn wait_stopped(agent: &Agent) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if !agent.is_running() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_malformed_artifact_is_fatal() {
        let host = FakeHost::new();
        let result = Agent::new(host, test_config(), Path::new("/p/game/agent.ext"));
        assert!(matches!(result, Err(WarpError::MalformedArtifactName { .. })));
    }

    #[test]
    fn test_identity_from_artifact() {
        let host = FakeHost::new();
        let agent = Agent::new(host, test_config(), &artifact()).unwrap();
        let id = agent.identity();
        assert_eq!(id.artifact.version.to_string(), "1.4.0");
        assert_eq!(id.artifact.checksum.as_deref(), Some("3f9a2c"));
        assert_eq!(id.project_root, "/projects/novel");
    }

    #[test]
    fn test_inert_outside_developer_mode() {
        let host = FakeHost::new();
        host.developer.store(false, Ordering::SeqCst);
        let agent = Agent::new(host.clone(), test_config(), &artifact()).unwrap();

        assert_eq!(agent.start_with(FakeConnector::new(vec![])).unwrap(), StartOutcome::Inert);
        assert!(!agent.is_running());
        // Build exclusion is registered regardless
        assert_eq!(host.calls(), vec![HostCall::Exclude("game/renpy_warp_*.rpe".into())]);
        assert_eq!(host.quit_callback_count(), 0);
    }

    #[test]
    fn test_inert_when_disabled() {
        let host = FakeHost::new();
        let config = AgentConfig {
            enabled: false,
            ..test_config()
        };
        let agent = Agent::new(host, config, &artifact()).unwrap();
        assert_eq!(agent.start_with(FakeConnector::new(vec![])).unwrap(), StartOutcome::Inert);
    }

    #[test]
    fn test_start_is_idempotent_and_quit_stops_worker() {
        let host = FakeHost::new();
        let agent = Agent::new(host.clone(), test_config(), &artifact()).unwrap();

        let connector = FakeConnector::new(vec![]);
        let attempts = connector.attempts();
        assert_eq!(agent.start_with(connector).unwrap(), StartOutcome::Started);
        assert_eq!(
            agent.start_with(FakeConnector::new(vec![])).unwrap(),
            StartOutcome::AlreadyStarted
        );
        assert_eq!(agent.start().unwrap(), StartOutcome::AlreadyStarted);
        assert!(agent.is_running());
        assert_eq!(host.quit_callback_count(), 1);

        host.quit();
        assert!(wait_stopped(&agent), "worker must stop after quit");

        let count = attempts.lock().unwrap().len();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(attempts.lock().unwrap().len(), count, "no attempts after shutdown");
    }
}
