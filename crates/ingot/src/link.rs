//! Native link driver
//!
//! The final link is an external collaborator: one toolchain invocation that
//! compiles and links the bootstrap unit plus every patched compilation unit
//! into a single shared artifact. `CYTHON_NO_PYINIT_EXPORT` is defined for
//! the whole invocation so no unit exports its raw entry point; the bootstrap
//! header `#undef`s it, leaving `PyInit_<package>` as the artifact's only
//! exported initializer. A link failure here is most commonly a missed
//! symbol rename or two descriptors sharing a qualified name.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use log::{debug, info};

use crate::error::{BuildError, BuildResult};

/// Search paths and output location for the link step.
#[derive(Debug, Clone, Default)]
pub struct LinkOptions {
    pub output: PathBuf,
    pub include_dirs: Vec<PathBuf>,
    pub library_dirs: Vec<PathBuf>,
    pub libraries: Vec<String>,
    pub extra_args: Vec<String>,
}

/// The toolchain driver, overridable for cross or pinned toolchains.
fn linker_command() -> Command {
    if let Ok(linker) = std::env::var("INGOT_LINKER") {
        return Command::new(linker);
    }
    if cfg!(target_os = "macos") {
        Command::new("clang")
    } else {
        Command::new("cc")
    }
}

/// Extension of the produced artifact on the current platform.
pub fn artifact_extension() -> &'static str {
    if cfg!(target_os = "windows") { "pyd" } else { "so" }
}

/// Link every compilation unit into one shared artifact.
///
/// `units` must list the bootstrap unit first; the order of the rest is
/// irrelevant to the toolchain but kept stable for reproducible diagnostics.
pub fn link_artifact(units: &[PathBuf], options: &LinkOptions) -> BuildResult<()> {
    let mut cmd = linker_command();
    cmd.arg("-shared")
        .arg("-fPIC")
        .arg("-DCYTHON_NO_PYINIT_EXPORT");
    if cfg!(target_os = "macos") {
        // Python symbols resolve against the hosting interpreter at load time.
        cmd.arg("-undefined").arg("dynamic_lookup");
    }
    for unit in units {
        cmd.arg(unit);
    }
    for dir in &options.include_dirs {
        cmd.arg(format!("-I{}", dir.display()));
    }
    for dir in &options.library_dirs {
        cmd.arg(format!("-L{}", dir.display()));
    }
    for library in &options.libraries {
        cmd.arg(format!("-l{library}"));
    }
    for arg in &options.extra_args {
        cmd.arg(arg);
    }
    cmd.arg("-o").arg(&options.output);

    debug!("link command: {cmd:?}");
    let output = cmd
        .output()
        .map_err(|err| BuildError::link(format!("failed to spawn toolchain: {err}")))?;
    if !output.status.success() {
        return Err(BuildError::Link(
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ));
    }
    info!("linked {}", options.output.display());
    Ok(())
}

/// Ask the host interpreter where its headers and libraries live.
///
/// Used when the caller configures no explicit search paths; failures are
/// surfaced as link errors since nothing else consumes the probe.
pub fn probe_python_paths() -> BuildResult<(Vec<PathBuf>, Vec<PathBuf>)> {
    let script = "import sysconfig\n\
                  print(sysconfig.get_path('include'))\n\
                  print(sysconfig.get_config_var('LIBDIR') or '')\n";
    let interpreter =
        std::env::var("INGOT_PYTHON").unwrap_or_else(|_| String::from("python3"));
    let output = Command::new(&interpreter)
        .arg("-c")
        .arg(script)
        .output()
        .map_err(|err| BuildError::link(format!("failed to spawn {interpreter}: {err}")))?;
    if !output.status.success() {
        return Err(BuildError::link(format!(
            "probing {interpreter} for search paths failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines = stdout.lines();
    let include_dirs = lines
        .next()
        .filter(|line| !line.is_empty())
        .map(|line| vec![PathBuf::from(line)])
        .unwrap_or_default();
    let library_dirs = lines
        .next()
        .filter(|line| !line.is_empty())
        .map(|line| vec![PathBuf::from(line)])
        .unwrap_or_default();
    Ok((include_dirs, library_dirs))
}

/// Default artifact path for a package: `<working>/<package>.<ext>`.
pub fn default_artifact_path(working_path: &Path, package_name: &str) -> PathBuf {
    working_path
        .join(package_name)
        .with_extension(artifact_extension())
}
