//! Module descriptor: the unit of work for one build
//!
//! A [`ModuleDef`] identifies one module's qualified name, package-ness, and
//! source/output locations. Descriptors are immutable; preprocessors derive
//! updated copies through [`ModuleDef::with_sources`] rather than mutating in
//! place. The descriptor owns the in-memory text of whichever source slots are
//! populated; the persisted copies on disk are the source of truth for the
//! external translator.

use std::{
    fmt::Write as _,
    fs, io,
    path::{Path, PathBuf},
};

use sha2::{Digest, Sha256};

use crate::types::{FxIndexMap, SourceKind};

/// Derive the globally unique initializer symbol for a module.
///
/// The name is a stable hash of `(qualified_name, is_package)`, so two
/// descriptors collide only if their identity collides — which the build set
/// rejects up front. This is the linkage contract that lets hundreds of
/// independently translated units merge into one binary: the translator's
/// default `PyInit_<stem>` names are derived from leaf filename stems alone
/// and collide across modules sharing a stem (every package index, for one).
pub fn initializer_symbol(qualified_name: &str, is_package: bool) -> String {
    let digest = Sha256::digest(format!("{qualified_name}:{is_package}").as_bytes());
    let mut symbol = String::with_capacity(33);
    symbol.push('_');
    // 128 bits of the digest keeps the symbol readable in linker maps.
    for byte in &digest[..16] {
        let _ = write!(symbol, "{byte:02x}");
    }
    symbol
}

/// Write `content` to `path`, skipping the write when the file already holds
/// exactly that content. Preserving the modification time of unchanged files
/// is what makes the timestamp-based staleness check usable at all.
pub fn update_file(path: &Path, content: &str) -> io::Result<()> {
    if let Ok(existing) = fs::read_to_string(path) {
        if existing == content {
            return Ok(());
        }
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

/// Descriptor for one module of the package being bundled.
#[derive(Debug, Clone)]
pub struct ModuleDef {
    /// Dotted import path, unique within a build.
    pub qualified_name: String,
    /// True iff the module was discovered via an `__init__` index file.
    pub is_package: bool,
    /// Globally unique entry-point name assigned at construction.
    pub initializer_symbol: String,
    /// Where the translator writes the compilation unit for this module.
    pub c_path: PathBuf,
    /// Plain Python source, if present.
    pub py_source: Option<String>,
    /// Cython source, if present.
    pub pyx_source: Option<String>,
    /// Cython declarations, if present.
    pub pxd_source: Option<String>,
    /// Open metadata supplied by preprocessing stages. The core never reads
    /// it; a rewriter may both set and later consume the same key.
    pub custom_attributes: FxIndexMap<String, String>,
}

impl ModuleDef {
    /// Create a descriptor with a derived initializer symbol.
    pub fn new(qualified_name: impl Into<String>, is_package: bool, c_path: PathBuf) -> Self {
        let qualified_name = qualified_name.into();
        let initializer_symbol = initializer_symbol(&qualified_name, is_package);
        Self {
            qualified_name,
            is_package,
            initializer_symbol,
            c_path,
            py_source: None,
            pyx_source: None,
            pxd_source: None,
            custom_attributes: FxIndexMap::default(),
        }
    }

    /// Create a descriptor with an explicit entry-point name.
    ///
    /// Only the synthesized bootstrap unit uses this: it is the one unit that
    /// must keep the host-visible `PyInit_<package>` convention.
    pub fn new_with_symbol(
        qualified_name: impl Into<String>,
        is_package: bool,
        c_path: PathBuf,
        initializer_symbol: String,
    ) -> Self {
        Self {
            initializer_symbol,
            ..Self::new(qualified_name, is_package, c_path)
        }
    }

    /// Path of the persisted copy for one source slot.
    pub fn source_path(&self, kind: SourceKind) -> PathBuf {
        self.c_path.with_extension(kind.extension())
    }

    /// Path of the optional human-readable annotation output.
    pub fn annotation_path(&self) -> PathBuf {
        self.c_path.with_extension("html")
    }

    /// The in-memory text for one source slot.
    pub fn source(&self, kind: SourceKind) -> Option<&str> {
        match kind {
            SourceKind::Python => self.py_source.as_deref(),
            SourceKind::Cython => self.pyx_source.as_deref(),
            SourceKind::CythonDeclarations => self.pxd_source.as_deref(),
        }
    }

    /// Slots that carry text, in dispatch order.
    pub fn populated_slots(&self) -> impl Iterator<Item = SourceKind> + '_ {
        SourceKind::ALL
            .into_iter()
            .filter(|kind| self.source(*kind).is_some())
    }

    /// Whether any source slot is populated.
    pub fn has_sources(&self) -> bool {
        self.populated_slots().next().is_some()
    }

    /// The filename stem the translator derives its default entry-point name
    /// from: the containing directory for package indexes, the file stem for
    /// leaf modules.
    pub fn source_stem(&self) -> String {
        let component = if self.is_package {
            self.c_path.parent().and_then(Path::file_name)
        } else {
            self.c_path.file_stem()
        };
        component
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Functional update of the source slots. `None` keeps the existing slot;
    /// identity fields are always preserved.
    pub fn with_sources(
        &self,
        py_source: Option<String>,
        pyx_source: Option<String>,
        pxd_source: Option<String>,
    ) -> Self {
        Self {
            py_source: py_source.or_else(|| self.py_source.clone()),
            pyx_source: pyx_source.or_else(|| self.pyx_source.clone()),
            pxd_source: pxd_source.or_else(|| self.pxd_source.clone()),
            ..self.clone()
        }
    }

    /// Functional update of one custom attribute.
    pub fn with_attribute(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut updated = self.clone();
        updated
            .custom_attributes
            .insert(key.into(), value.into());
        updated
    }

    /// Persist every populated source slot next to the output path, skipping
    /// writes whose on-disk content is already current.
    pub fn persist(&self) -> io::Result<()> {
        for kind in self.populated_slots() {
            let text = self.source(kind).expect("slot reported populated");
            update_file(&self.source_path(kind), text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initializer_symbols_are_deterministic() {
        let a = initializer_symbol("pkg.mod", false);
        let b = initializer_symbol("pkg.mod", false);
        assert_eq!(a, b);
        assert!(a.starts_with('_'));
        assert_eq!(a.len(), 33);
    }

    #[test]
    fn initializer_symbols_distinguish_packageness() {
        // A package index and a leaf module may share a qualified name
        // candidate during collection; their symbols must never collide.
        assert_ne!(
            initializer_symbol("pkg", true),
            initializer_symbol("pkg", false)
        );
    }

    #[test]
    fn with_sources_preserves_identity() {
        let def = ModuleDef::new("pkg.mod", false, PathBuf::from("build/pkg/mod.c"));
        let updated = def.with_sources(Some("x = 1\n".to_owned()), None, None);
        assert_eq!(updated.qualified_name, def.qualified_name);
        assert_eq!(updated.initializer_symbol, def.initializer_symbol);
        assert_eq!(updated.py_source.as_deref(), Some("x = 1\n"));
        assert!(updated.pyx_source.is_none());
    }

    #[test]
    fn source_stem_uses_directory_for_packages() {
        let package = ModuleDef::new("pkg", true, PathBuf::from("build/pkg/__init__.c"));
        assert_eq!(package.source_stem(), "pkg");

        let leaf = ModuleDef::new("pkg.mod", false, PathBuf::from("build/pkg/mod.c"));
        assert_eq!(leaf.source_stem(), "mod");
    }

    #[test]
    fn update_file_skips_identical_content() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("module.py");
        update_file(&path, "x = 1\n").expect("first write");
        let first = fs::metadata(&path).and_then(|m| m.modified()).expect("mtime");

        update_file(&path, "x = 1\n").expect("second write");
        let second = fs::metadata(&path).and_then(|m| m.modified()).expect("mtime");
        assert_eq!(first, second);
    }
}
