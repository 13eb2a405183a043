//! Identity Resolver — who this agent is, derived from its deployed artifact.
//!
//! The artifact is named `<name>_<version>[_<checksum>].<ext>`, e.g.
//! `renpy_warp_1.4.0_3f9a2c.rpe`. The peer uses version and checksum to decide
//! whether it trusts (or needs to replace) the running agent, so a name that
//! does not match is fatal.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::config::AgentConfig;
use crate::constants;
use crate::path_utils;
use crate::{WarpError, WarpResult};

const ARTIFACT_PATTERN: &str = r"^(?P<name>[A-Za-z0-9_\-]+?)_(?P<version>\d+\.\d+\.\d+)(?:_(?P<checksum>[a-z0-9]+))?\.(?P<ext>[A-Za-z0-9]+(?:\.[A-Za-z0-9]+)?)$";

fn artifact_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ARTIFACT_PATTERN).expect("artifact pattern is a valid regex"))
}

/// The part of the identity encoded in the artifact name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactIdentity {
    pub name: String,
    pub version: semver::Version,
    pub checksum: Option<String>,
    pub extension: String,
}

/// Parse an artifact file name. Pure and deterministic.
pub fn resolve(artifact_name: &str) -> WarpResult<ArtifactIdentity> {
    let malformed = || WarpError::MalformedArtifactName {
        name: artifact_name.to_string(),
        pattern: ARTIFACT_PATTERN.to_string(),
    };

    let caps = artifact_regex().captures(artifact_name).ok_or_else(malformed)?;
    // Leading zeros pass the regex but are not semver
    let version = semver::Version::parse(&caps["version"]).map_err(|_| malformed())?;

    Ok(ArtifactIdentity {
        name: caps["name"].to_string(),
        version,
        checksum: caps.name("checksum").map(|m| m.as_str().to_string()),
        extension: caps["ext"].to_string(),
    })
}

/// Resolve from a deployed path. A module loaded from inside a packaged
/// artifact sits one level below it, so the parent's name is tried second.
pub fn resolve_path(path: &Path) -> WarpResult<ArtifactIdentity> {
    let own = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match resolve(&own) {
        Ok(identity) => Ok(identity),
        Err(err) => {
            let parent = path
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned());
            match parent {
                Some(parent) => resolve(&parent).map_err(|_| err),
                None => Err(err),
            }
        }
    }
}

/// Full, immutable identity of this agent instance.
#[derive(Debug, Clone)]
pub struct Identity {
    pub pid: u32,
    /// Absolute, `/`-separated, without the trailing `game` directory.
    pub project_root: String,
    pub artifact: ArtifactIdentity,
    pub nonce: Option<String>,
    pub is_managed: bool,
}

impl Identity {
    pub fn new(artifact: ArtifactIdentity, game_dir: &Path, config: &AgentConfig) -> Self {
        Self {
            pid: std::process::id(),
            project_root: path_utils::to_posix(&path_utils::project_root(game_dir)),
            artifact,
            nonce: config.nonce.clone(),
            is_managed: config.is_managed,
        }
    }

    /// Headers attached to the connection handshake.
    pub fn handshake_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            (constants::HEADER_PID, self.pid.to_string()),
            (constants::HEADER_PROJECT_ROOT, self.project_root.clone()),
            (constants::HEADER_VERSION, self.artifact.version.to_string()),
        ];
        if let Some(checksum) = &self.artifact.checksum {
            headers.push((constants::HEADER_CHECKSUM, checksum.clone()));
        }
        if let Some(nonce) = &self.nonce {
            headers.push((constants::HEADER_NONCE, nonce.clone()));
        }
        if self.is_managed {
            headers.push((constants::HEADER_IS_MANAGED, "1".to_string()));
        }
        headers
    }

    /// Glob that keeps every version of the agent artifact out of builds.
    pub fn exclusion_pattern(&self) -> String {
        format!(
            "{}/{}_*.{}",
            constants::GAME_DIR_NAME,
            self.artifact.name,
            self.artifact.extension
        )
    }
}
