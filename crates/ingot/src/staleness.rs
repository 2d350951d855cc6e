//! Timestamp-based staleness tracking
//!
//! A descriptor is dirty when its newest persisted source representation is
//! newer than its generated output, when any timestamp cannot be read, or
//! unconditionally in force mode. Unreadable timestamps degrade to "assume
//! dirty": the only downside is an unnecessary retranslation, never a missed
//! one. Dirty state is derived fresh every build and never cached across runs
//! except implicitly through filesystem timestamps.

use std::{io, path::Path, time::SystemTime};

use log::debug;

use crate::{build_set::BuildSet, module_def::ModuleDef};

/// Modification time of one path.
pub fn modification_time(path: &Path) -> io::Result<SystemTime> {
    std::fs::metadata(path)?.modified()
}

/// Newest modification time across a descriptor's populated source slots.
///
/// Errors if a populated slot has no readable persisted copy — callers treat
/// that as dirty.
pub fn latest_source_time(def: &ModuleDef) -> io::Result<SystemTime> {
    let mut latest: Option<SystemTime> = None;
    for kind in def.populated_slots() {
        let time = modification_time(&def.source_path(kind))?;
        latest = Some(latest.map_or(time, |current| current.max(time)));
    }
    latest.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            "descriptor has no source representation",
        )
    })
}

/// Whether one descriptor needs retranslation.
pub fn is_dirty(def: &ModuleDef, annotate_html: bool, check_timestamps: bool) -> bool {
    if !check_timestamps {
        return true;
    }

    let dirty = (|| -> io::Result<bool> {
        let source_time = latest_source_time(def)?;
        let mut output_time = modification_time(&def.c_path)?;
        if annotate_html {
            output_time = output_time.max(modification_time(&def.annotation_path())?);
        }
        Ok(output_time < source_time)
    })()
    .unwrap_or(true);

    if dirty {
        debug!("module '{}' is dirty", def.qualified_name);
    }
    dirty
}

/// Per-descriptor dirty flags plus the aggregate flag, derived once per build.
#[derive(Debug)]
pub struct DirtyState {
    pub per_module: Vec<bool>,
    pub any_module_dirty: bool,
}

/// Assess every descriptor in the set.
pub fn assess(set: &BuildSet, annotate_html: bool, check_timestamps: bool) -> DirtyState {
    let per_module: Vec<bool> = set
        .modules()
        .iter()
        .map(|def| is_dirty(def, annotate_html, check_timestamps))
        .collect();
    let any_module_dirty = per_module.iter().any(|dirty| *dirty);
    DirtyState {
        per_module,
        any_module_dirty,
    }
}

/// Whether a set of generated output paths is older than the newest source in
/// the whole build set.
///
/// The bootstrap unit's content depends on every module's identity, not just
/// one, so its staleness is judged against the set-wide maximum.
pub fn outputs_are_stale(outputs: &[&Path], set: &BuildSet, check_timestamps: bool) -> bool {
    if !check_timestamps {
        return true;
    }

    (|| -> io::Result<bool> {
        let mut generated: Option<SystemTime> = None;
        for output in outputs {
            let time = modification_time(output)?;
            generated = Some(generated.map_or(time, |current| current.max(time)));
        }
        let Some(generated) = generated else {
            return Ok(true);
        };

        let mut newest_source: Option<SystemTime> = None;
        for def in set.modules() {
            let time = latest_source_time(def)?;
            newest_source = Some(newest_source.map_or(time, |current| current.max(time)));
        }
        Ok(newest_source.is_some_and(|source| generated < source))
    })()
    .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf, time::Duration};

    use super::*;

    fn set_mtime(path: &Path, time: SystemTime) {
        let file = fs::File::options()
            .write(true)
            .open(path)
            .expect("open for touch");
        file.set_modified(time).expect("set mtime");
    }

    fn leaf_with_sources(dir: &Path) -> ModuleDef {
        let mut def = ModuleDef::new("pkg.mod", false, dir.join("mod.c"));
        def.py_source = Some("x = 1\n".to_owned());
        def.persist().expect("persist sources");
        def
    }

    #[test]
    fn fresh_output_is_clean() {
        let dir = tempfile::tempdir().expect("temp dir");
        let def = leaf_with_sources(dir.path());
        fs::write(&def.c_path, "/* unit */").expect("write output");
        set_mtime(
            &def.c_path,
            SystemTime::now() + Duration::from_secs(5),
        );

        assert!(!is_dirty(&def, false, true));
    }

    #[test]
    fn touching_a_source_flips_to_dirty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let def = leaf_with_sources(dir.path());
        fs::write(&def.c_path, "/* unit */").expect("write output");
        set_mtime(&def.c_path, SystemTime::now() + Duration::from_secs(5));
        assert!(!is_dirty(&def, false, true));

        set_mtime(
            &def.source_path(crate::types::SourceKind::Python),
            SystemTime::now() + Duration::from_secs(10),
        );
        assert!(is_dirty(&def, false, true));
    }

    #[test]
    fn missing_output_is_dirty_regardless_of_timestamps() {
        let dir = tempfile::tempdir().expect("temp dir");
        let def = leaf_with_sources(dir.path());
        assert!(is_dirty(&def, false, true));
    }

    #[test]
    fn force_mode_marks_everything_dirty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let def = leaf_with_sources(dir.path());
        fs::write(&def.c_path, "/* unit */").expect("write output");
        set_mtime(&def.c_path, SystemTime::now() + Duration::from_secs(5));

        assert!(is_dirty(&def, false, false));
    }

    #[test]
    fn missing_annotation_output_is_dirty_when_requested() {
        let dir = tempfile::tempdir().expect("temp dir");
        let def = leaf_with_sources(dir.path());
        fs::write(&def.c_path, "/* unit */").expect("write output");
        set_mtime(&def.c_path, SystemTime::now() + Duration::from_secs(5));

        assert!(!is_dirty(&def, false, true));
        assert!(is_dirty(&def, true, true));
    }

    #[test]
    fn stale_generated_outputs_are_detected_set_wide() {
        let dir = tempfile::tempdir().expect("temp dir");
        let def = leaf_with_sources(dir.path());
        let set = crate::build_set::BuildSet::new("pkg.mod", vec![def]).expect("valid set");

        let generated: PathBuf = dir.path().join("bootstrap.pyx");
        fs::write(&generated, "").expect("write generated");
        set_mtime(&generated, SystemTime::now() - Duration::from_secs(3600));
        assert!(outputs_are_stale(&[&generated], &set, true));

        set_mtime(&generated, SystemTime::now() + Duration::from_secs(3600));
        assert!(!outputs_are_stale(&[&generated], &set, true));
    }
}
