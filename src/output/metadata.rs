//! Records what was run, with which build of the tool, and on what machine.
//!
//! This is written alongside the results so that a folder of outputs can be traced back to the
//! model and program that produced it.
use anyhow::{Result, anyhow};
use chrono::prelude::*;
use platform_info::{PlatformInfo, PlatformInfoAPI, UNameAPI};
use serde::Serialize;
use std::fs;
use std::path::Path;

const METADATA_FILE_NAME: &str = "metadata.toml";

/// Constants generated at build time by `build.rs`
mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Label a commit hash, marking builds made from a modified working tree
fn describe_commit(hash: Option<&str>, dirty: Option<bool>) -> String {
    match (hash, dirty) {
        (None, _) => "unknown".into(),
        (Some(hash), Some(true)) => format!("{hash}-dirty"),
        (Some(hash), _) => hash.into(),
    }
}

fn build_profile(is_debug: bool) -> &'static str {
    if is_debug { "debug" } else { "release" }
}

#[derive(Serialize)]
struct Metadata<'a> {
    run: RunSection<'a>,
    build: BuildSection,
    platform: PlatformSection,
}

#[derive(Serialize)]
struct RunSection<'a> {
    model_path: &'a Path,
    /// Local time at which the output folder was written
    started: String,
}

/// Provenance of the executable
#[derive(Serialize)]
struct BuildSection {
    name: &'static str,
    version: &'static str,
    commit: String,
    profile: &'static str,
    /// Target triple, e.g. x86_64-unknown-linux-gnu
    target: &'static str,
    rustc: &'static str,
    built_at_utc: &'static str,
}

impl BuildSection {
    fn current() -> Self {
        Self {
            name: built_info::PKG_NAME,
            version: built_info::PKG_VERSION,
            commit: describe_commit(built_info::GIT_COMMIT_HASH_SHORT, built_info::GIT_DIRTY),
            profile: build_profile(built_info::DEBUG),
            target: built_info::TARGET,
            rustc: built_info::RUSTC_VERSION,
            built_at_utc: built_info::BUILT_TIME_UTC,
        }
    }
}

/// The `uname` fields of the host
#[derive(Serialize)]
struct PlatformSection {
    sysname: String,
    nodename: String,
    release: String,
    version: String,
    machine: String,
    osname: String,
}

impl PlatformSection {
    fn current() -> Result<Self> {
        let info = PlatformInfo::new()
            .map_err(|err| anyhow!("Unable to determine platform info: {err}"))?;
        let text = |value: &std::ffi::OsStr| value.to_string_lossy().into_owned();

        Ok(Self {
            sysname: text(info.sysname()),
            nodename: text(info.nodename()),
            release: text(info.release()),
            version: text(info.version()),
            machine: text(info.machine()),
            osname: text(info.osname()),
        })
    }
}

/// Write `metadata.toml` into the output folder
pub fn write_metadata(output_path: &Path, model_path: &Path) -> Result<()> {
    let metadata = Metadata {
        run: RunSection {
            model_path,
            started: Local::now().to_rfc2822(),
        },
        build: BuildSection::current(),
        platform: PlatformSection::current()?,
    };
    fs::write(output_path.join(METADATA_FILE_NAME), toml::to_string(&metadata)?)?;

    Ok(())
}
