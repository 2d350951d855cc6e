//! Intermediate representation of the bootstrap unit
//!
//! The bootstrap source is not assembled from interpolated strings scattered
//! across the generator. It is composed as an explicit representation —
//! ordered external declarations plus ordered statements with typed operands
//! — and rendered once. The tests inspect the representation directly
//! instead of diffing generated text.
//!
//! Descriptor slots are referenced by index: slot `i` renders as the local
//! bindings `name_i`, `spec_i`, `module_def_i`, `module_i`.

use std::fmt::Write as _;

use crate::build_set::BuildSet;

/// Name of the meta-path finder class in the generated unit.
pub const FINDER_CLASS: &str = "IngotFinder";
/// Name of the loader class in the generated unit.
pub const LOADER_CLASS: &str = "IngotLoader";

/// One forward-declared initializer entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializerDecl {
    pub symbol: String,
}

/// One step of the bootstrap routine, in execution order.
#[derive(Debug, Clone)]
pub enum BootstrapStmt {
    /// `import sys` and the importlib machinery imports.
    Prelude,
    /// Definition of the meta-path finder serving `find_spec` lookups from
    /// the registry.
    FinderClass { name: String },
    /// Definition of the loader serving `create_module` / `exec_module`,
    /// plus `get_code` exposing the module-level main hook.
    LoaderClass { name: String, main_hook: String },
    /// Materialize one descriptor: bind its name, build its spec, invoke its
    /// initializer (aborting on a NULL handle), and construct the module
    /// object without executing its body.
    Materialize {
        slot: usize,
        qualified_name: String,
        is_package: bool,
        symbol: String,
        loader: String,
    },
    /// Assemble the `name -> (spec, module)` registry over the given slots.
    Registry { slots: Vec<usize> },
    /// Install the finder at the front of the host's resolution order.
    InstallFinder { name: String },
    /// Replace the artifact's own identity with the root module object.
    PromoteRoot { slot: usize },
    /// Execute the root module's body — the only body run eagerly.
    ExecuteRoot { slot: usize },
}

/// The complete bootstrap unit: header declarations plus routine body.
#[derive(Debug)]
pub struct BootstrapUnit {
    pub declarations: Vec<InitializerDecl>,
    pub statements: Vec<BootstrapStmt>,
}

impl BootstrapUnit {
    /// Compose the unit for a finished build set.
    pub fn from_build_set(set: &BuildSet) -> Self {
        let declarations = set
            .modules()
            .iter()
            .map(|def| InitializerDecl {
                symbol: def.initializer_symbol.clone(),
            })
            .collect();

        let mut statements = vec![
            BootstrapStmt::Prelude,
            BootstrapStmt::FinderClass {
                name: FINDER_CLASS.to_owned(),
            },
            BootstrapStmt::LoaderClass {
                name: LOADER_CLASS.to_owned(),
                main_hook: crate::preprocess::MAIN_HOOK_NAME.to_owned(),
            },
        ];
        for (slot, def) in set.modules().iter().enumerate() {
            statements.push(BootstrapStmt::Materialize {
                slot,
                qualified_name: def.qualified_name.clone(),
                is_package: def.is_package,
                symbol: def.initializer_symbol.clone(),
                loader: LOADER_CLASS.to_owned(),
            });
        }
        statements.push(BootstrapStmt::Registry {
            slots: (0..set.len()).collect(),
        });
        statements.push(BootstrapStmt::InstallFinder {
            name: FINDER_CLASS.to_owned(),
        });
        statements.push(BootstrapStmt::PromoteRoot {
            slot: set.root_index(),
        });
        statements.push(BootstrapStmt::ExecuteRoot {
            slot: set.root_index(),
        });

        Self {
            declarations,
            statements,
        }
    }

    /// Render the C header: forward declarations for every entry point.
    ///
    /// The `#undef` restores symbol export for the bootstrap unit itself; all
    /// other units are compiled with `CYTHON_NO_PYINIT_EXPORT` in force so
    /// their renamed entry points stay internal.
    pub fn render_header(&self) -> String {
        let mut header = String::new();
        header.push_str("#undef CYTHON_NO_PYINIT_EXPORT\n");
        header.push_str("#ifdef __cplusplus\n");
        header.push_str("extern \"C\" {\n");
        header.push_str("#endif // __cplusplus\n");
        for decl in &self.declarations {
            let _ = writeln!(header, "    void* {}(void);", decl.symbol);
        }
        header.push_str("#ifdef __cplusplus\n}\n#endif // __cplusplus\n");
        header
    }

    /// Render the Cython source of the bootstrap routine.
    pub fn render_pyx(&self) -> String {
        let mut out = String::new();

        out.push_str("cdef extern from 'bootstrap.h':\n");
        for decl in &self.declarations {
            let _ = writeln!(out, "    void* {}()", decl.symbol);
        }
        out.push('\n');
        out.push_str("cdef extern from 'Python.h':\n");
        out.push_str("    object PyModule_FromDefAndSpec(void* module_def, object spec)\n");
        out.push_str("    int PyModule_ExecDef(object module, void* module_def)\n");
        out.push_str("    void* PyModule_GetDef(object module)\n");
        out.push('\n');
        out.push_str("cdef void bootstrap():\n");
        for statement in &self.statements {
            render_statement(statement, &mut out);
        }
        out.push_str("\nbootstrap()\n");
        out
    }
}

fn render_statement(statement: &BootstrapStmt, out: &mut String) {
    match statement {
        BootstrapStmt::Prelude => {
            out.push_str("    import sys\n\n");
            out.push_str("    from importlib.abc import Loader, MetaPathFinder\n");
            out.push_str("    from importlib.machinery import ModuleSpec\n\n");
        }
        BootstrapStmt::FinderClass { name } => {
            let _ = writeln!(out, "    class {name}(MetaPathFinder):");
            out.push_str("        @classmethod\n");
            out.push_str("        def find_spec(cls, fullname not None, path, target=None):\n");
            out.push_str("            cdef tuple module_info = module_infos.get(fullname)\n");
            out.push_str("            if module_info is None:\n");
            out.push_str("                return None\n");
            out.push_str("            return module_info[0]\n\n");
        }
        BootstrapStmt::LoaderClass { name, main_hook } => {
            let _ = writeln!(out, "    class {name}(Loader):");
            out.push_str("        @classmethod\n");
            out.push_str("        def get_code(cls, fullname not None):\n");
            out.push_str("            return (\n");
            out.push_str("                f'import {fullname}\\n'\n");
            out.push_str("                f'try:\\n'\n");
            let _ = writeln!(
                out,
                "                f'    from {{fullname}} import {main_hook}\\n'"
            );
            out.push_str("                f'except ImportError:\\n'\n");
            let _ = writeln!(out, "                f'    {main_hook} = None\\n'");
            out.push_str("                f'\\n'\n");
            let _ = writeln!(out, "                f'if {main_hook} is not None:\\n'");
            let _ = writeln!(out, "                f'    {main_hook}()\\n'");
            out.push_str("            )\n\n");
            out.push_str("        @classmethod\n");
            out.push_str("        def create_module(cls, spec not None):\n");
            out.push_str("            cdef tuple module_info = module_infos.get(spec.name)\n");
            out.push_str("            if module_info is None:\n");
            out.push_str("                return None\n");
            out.push_str("            return module_info[1]\n\n");
            out.push_str("        @classmethod\n");
            out.push_str("        def exec_module(cls, module not None):\n");
            out.push_str("            PyModule_ExecDef(module, PyModule_GetDef(module))\n\n");
        }
        BootstrapStmt::Materialize {
            slot,
            qualified_name,
            is_package,
            symbol,
            loader,
        } => {
            let _ = writeln!(out, "    cdef str name_{slot} = '{qualified_name}'");
            let _ = writeln!(
                out,
                "    cdef object spec_{slot} = ModuleSpec(name_{slot}, {loader}, is_package={})",
                if *is_package { "True" } else { "False" }
            );
            let _ = writeln!(out, "    cdef void* module_def_{slot} = {symbol}()");
            let _ = writeln!(out, "    if module_def_{slot} == NULL:");
            let _ = writeln!(
                out,
                "        raise ImportError('bundled module {qualified_name} failed to initialize')"
            );
            let _ = writeln!(
                out,
                "    cdef object module_{slot} = PyModule_FromDefAndSpec(module_def_{slot}, spec_{slot})\n"
            );
        }
        BootstrapStmt::Registry { slots } => {
            out.push_str("    cdef dict module_infos = {\n");
            for slot in slots {
                let _ = writeln!(out, "        name_{slot}: (spec_{slot}, module_{slot}),");
            }
            out.push_str("    }\n\n");
        }
        BootstrapStmt::InstallFinder { name } => {
            let _ = writeln!(out, "    sys.meta_path.insert(0, {name})");
        }
        BootstrapStmt::PromoteRoot { slot } => {
            let _ = writeln!(out, "    sys.modules[name_{slot}] = module_{slot}");
        }
        BootstrapStmt::ExecuteRoot { slot } => {
            let _ = writeln!(out, "    PyModule_ExecDef(module_{slot}, module_def_{slot})");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::module_def::ModuleDef;

    fn sample_set() -> BuildSet {
        let mut root = ModuleDef::new("pkg", true, PathBuf::from("build/pkg/__init__.c"));
        root.py_source = Some(String::new());
        let mut a = ModuleDef::new("pkg.a", false, PathBuf::from("build/pkg/a.c"));
        a.py_source = Some(String::new());
        let mut b = ModuleDef::new("pkg.b", false, PathBuf::from("build/pkg/b.c"));
        b.py_source = Some(String::new());
        BuildSet::new("pkg", vec![root, a, b]).expect("valid set")
    }

    #[test]
    fn declares_one_entry_point_per_descriptor() {
        let set = sample_set();
        let unit = BootstrapUnit::from_build_set(&set);
        assert_eq!(unit.declarations.len(), 3);
        for (decl, def) in unit.declarations.iter().zip(set.modules()) {
            assert_eq!(decl.symbol, def.initializer_symbol);
        }
    }

    #[test]
    fn registry_covers_every_slot_exactly_once() {
        let unit = BootstrapUnit::from_build_set(&sample_set());
        let registry = unit
            .statements
            .iter()
            .find_map(|statement| match statement {
                BootstrapStmt::Registry { slots } => Some(slots),
                _ => None,
            })
            .expect("registry statement present");
        assert_eq!(registry, &vec![0, 1, 2]);
    }

    #[test]
    fn root_is_promoted_and_executed_last() {
        let set = sample_set();
        let unit = BootstrapUnit::from_build_set(&set);
        let tail: Vec<&BootstrapStmt> = unit.statements.iter().rev().take(3).collect();
        assert!(
            matches!(tail[0], BootstrapStmt::ExecuteRoot { slot } if *slot == set.root_index())
        );
        assert!(
            matches!(tail[1], BootstrapStmt::PromoteRoot { slot } if *slot == set.root_index())
        );
        assert!(matches!(tail[2], BootstrapStmt::InstallFinder { .. }));
    }

    #[test]
    fn header_exports_only_through_the_undef() {
        let unit = BootstrapUnit::from_build_set(&sample_set());
        let header = unit.render_header();
        assert!(header.starts_with("#undef CYTHON_NO_PYINIT_EXPORT\n"));
        assert_eq!(header.matches("(void);").count(), 3);
    }

    #[test]
    fn rendered_source_materializes_before_registering() {
        let set = sample_set();
        let unit = BootstrapUnit::from_build_set(&set);
        let pyx = unit.render_pyx();

        let first_init = pyx
            .find(&format!("{}()", set.modules()[0].initializer_symbol))
            .expect("initializer invoked");
        let registry = pyx.find("cdef dict module_infos").expect("registry built");
        let install = pyx.find("sys.meta_path.insert(0,").expect("finder installed");
        assert!(first_init < registry);
        assert!(registry < install);
    }

    #[test]
    fn null_handles_abort_before_registration() {
        let pyx = BootstrapUnit::from_build_set(&sample_set()).render_pyx();
        assert_eq!(pyx.matches("== NULL:").count(), 3);
        assert!(pyx.contains("raise ImportError('bundled module pkg failed to initialize')"));
    }

    #[test]
    fn only_the_root_body_runs_eagerly() {
        let set = sample_set();
        let pyx = BootstrapUnit::from_build_set(&set).render_pyx();
        // One eager execution (the root's), plus the lazy hook in exec_module.
        assert_eq!(pyx.matches("PyModule_ExecDef(module_0, module_def_0)").count(), 1);
        assert_eq!(pyx.matches("PyModule_ExecDef(module_1").count(), 0);
        assert_eq!(pyx.matches("PyModule_ExecDef(module_2").count(), 0);
        assert!(pyx.contains("sys.modules[name_0] = module_0"));
        assert!(pyx.trim_end().ends_with("bootstrap()"));
    }
}
