//! End-to-end importer behavior: memoization, overlays, invalidation,
//! cycles, fan-out error positions and builtin packages.

use slate_importer::{Config, ImportError, Importer, TypesInfoMask};
use slate_lang::types::Type;
use slate_lang::universe;
use slate_test_helpers::{overlay, Workspace};
use std::path::Path;
use std::sync::Arc;

const SRC_DIR: &str = "/work";

fn import(imp: &Importer<'_>, ipath: &str) -> Result<Arc<slate_importer::Package>, ImportError> {
    imp.import_package(ipath, Path::new(SRC_DIR))
}

#[test]
fn idempotent_import_checks_once() {
    let ws = Workspace::new();
    ws.add_package("p", &[("a.sl", "package p\nfunc F() {}\n")]);
    let imp = ws.importer(Config::default());

    let first = import(&imp, "p").unwrap();
    let reads = ws.fs.read_count();
    assert!(reads > 0);

    let second = import(&imp, "p").unwrap();
    assert!(Arc::ptr_eq(&first, &second), "expected the memoized package");
    assert_eq!(ws.fs.read_count(), reads, "no re-parse without invalidation");
}

#[test]
fn overlay_edit_changes_hash_and_signature() {
    let ws = Workspace::new();
    ws.add_package("p", &[("a.sl", "package p\n")]);

    let cfg = Config {
        src_map: overlay(&[("/deps/p/a.sl", "package p\nfunc F() {}\n")]),
        ..Config::default()
    };
    let imp = ws.importer(cfg);
    let pkg = import(&imp, "p").unwrap();
    let obj = pkg.types.scope().lookup("F").expect("F from overlay");
    let Type::Func(sig) = &obj.ty else {
        panic!("F should be a func")
    };
    assert_eq!(sig.result, Type::Unit);
    let reads = ws.fs.read_count();

    // Identical overlay, same importer: served from state.
    import(&imp, "p").unwrap();
    assert_eq!(ws.fs.read_count(), reads);

    // One changed byte in the overlay busts the memo.
    let cfg = Config {
        src_map: overlay(&[("/deps/p/a.sl", "package p\nfunc F() int { return 0 }\n")]),
        ..Config::default()
    };
    let imp = ws.importer(cfg);
    let pkg = import(&imp, "p").unwrap();
    let Type::Func(sig) = &pkg.types.scope().lookup("F").unwrap().ty else {
        panic!("F should be a func")
    };
    assert_eq!(sig.result, Type::Int);
}

#[test]
fn overlay_hash_covers_unrelated_files() {
    // The hash is whole-overlay by contract: an edit to a file no package
    // depends on still forces a re-check of every overlay-aware state. The
    // on-disk file makes the re-parse observable through the read counter.
    let ws = Workspace::new();
    ws.add_package("p", &[("a.sl", "package p\nfunc OnDisk() {}\n")]);

    let base = &[("/deps/p/b.sl", "package p\nfunc F() {}\n")];
    let imp = ws.importer(Config {
        src_map: overlay(base),
        ..Config::default()
    });
    import(&imp, "p").unwrap();
    let reads = ws.fs.read_count();
    assert_eq!(reads, 1, "a.sl comes from disk, b.sl from the overlay");

    let widened = &[
        ("/deps/p/b.sl", "package p\nfunc F() {}\n"),
        ("/elsewhere/unrelated.sl", "package unrelated\n"),
    ];
    let imp = ws.importer(Config {
        src_map: overlay(widened),
        ..Config::default()
    });
    import(&imp, "p").unwrap();
    assert!(ws.fs.read_count() > reads, "wider overlay must force a re-check");
}

#[test]
fn import_cycle_is_rejected_and_does_not_wedge_the_importer() {
    let ws = Workspace::new();
    ws.add_package("a", &[("a.sl", "package a\nimport \"b\"\n")]);
    ws.add_package("b", &[("b.sl", "package b\nimport \"a\"\n")]);
    ws.add_package("c", &[("c.sl", "package c\n")]);
    let imp = ws.importer(Config::default());

    let err = import(&imp, "a").unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("import cycle:"), "unexpected error: {msg}");
    assert!(msg.contains("a(") && msg.contains("b("), "chain should name both: {msg}");

    // No lock is leaked: unrelated imports still work.
    assert!(import(&imp, "c").is_ok());
}

#[test]
fn dependency_failure_carries_import_spec_position() {
    let ws = Workspace::new();
    ws.add_package("x", &[("x.sl", "package x\nimport \"y\"\n")]);
    ws.add_package("y", &[("y.sl", "package y\nfunc {\n")]);
    let imp = ws.importer(Config::default());

    let err = import(&imp, "x").unwrap_err();
    let ImportError::Issue {
        path,
        row,
        col,
        message,
    } = err
    else {
        panic!("expected an annotated issue, got {err:?}")
    };
    assert_eq!(path, Path::new("/deps/x/x.sl"));
    assert_eq!(row, 1, "zero-based row of the import string");
    assert_eq!(col, 7, "zero-based column of the import string");
    assert!(message.contains("y.sl"), "message should surface the dep error: {message}");
}

#[test]
fn reverse_dep_invalidation_forces_rechecks_up_the_chain() {
    let ws = Workspace::new();
    ws.add_package("x", &[("x.sl", "package x\nimport \"y\"\n")]);
    ws.add_package("y", &[("y.sl", "package y\nimport \"z\"\n")]);
    ws.add_package("z", &[("z.sl", "package z\nfunc Z() {}\n")]);
    ws.add_package("w", &[("w.sl", "package w\n")]);
    let imp = ws.importer(Config::default());

    import(&imp, "x").unwrap();
    import(&imp, "w").unwrap();
    let reads = ws.fs.read_count();

    // Touch z: x and y are transitively stale, w stays cached.
    ws.invalidate_package("z");
    import(&imp, "x").unwrap();
    assert_eq!(ws.fs.read_count(), reads + 3, "x, y and z re-parse");
    import(&imp, "w").unwrap();
    assert_eq!(ws.fs.read_count(), reads + 3, "w is untouched by the invalidation");
}

#[test]
fn concurrent_requests_share_one_check() {
    let ws = Workspace::new();
    ws.add_package("p", &[("a.sl", "package p\nfunc F() {}\n")]);
    let imp = ws.importer(Config::default());

    let packages: Vec<Arc<slate_importer::Package>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| import(&imp, "p").unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(ws.fs.read_count(), 1, "exactly one parse despite 8 requesters");
    for pkg in &packages[1..] {
        assert!(Arc::ptr_eq(&packages[0], pkg));
    }
}

#[test]
fn parallel_and_sequential_fanout_agree() {
    let deps: Vec<String> = (0..6).map(|i| format!("d{i}")).collect();
    let root_src = {
        let mut s = String::from("package root\n");
        for d in &deps {
            s.push_str(&format!("import \"{d}\"\n"));
        }
        s
    };

    let run = |no_concurrency: bool| {
        let ws = Workspace::new();
        for d in &deps {
            ws.add_package(d, &[("d.sl", &format!("package {d}\nfunc F() {{}}\n"))]);
        }
        ws.add_package("root", &[("root.sl", &root_src)]);
        let imp = ws.importer(Config {
            no_concurrency,
            ..Config::default()
        });
        import(&imp, "root").unwrap()
    };

    let seq = run(true);
    let par = run(false);
    assert_eq!(seq.types.scope().names(), par.types.scope().names());
    assert!(seq.types.complete() && par.types.complete());
    let seq_imports = seq.imports.as_ref().unwrap();
    let par_imports = par.imports.as_ref().unwrap();
    assert_eq!(seq_imports.len(), par_imports.len());
    for (ipath, pkg) in seq_imports {
        assert_eq!(
            pkg.types.scope().names(),
            par_imports[ipath].types.scope().names()
        );
    }
}

#[test]
fn synthesized_packages_bypass_resolution() {
    let ws = Workspace::new();
    let imp = ws.importer(Config::default());

    let ext = imp.import("extern").unwrap();
    assert!(ext.is_fake());
    assert!(ext.complete());

    let intr = imp.import("intrinsics").unwrap();
    assert!(Arc::ptr_eq(&intr, &universe::intrinsics_package()));
    assert!(intr.scope().lookup("Sizeof").is_some());

    assert_eq!(ws.fs.read_count(), 0, "no file system access for builtins");
}

#[test]
fn nonzero_import_mode_is_rejected() {
    let ws = Workspace::new();
    let imp = ws.importer(Config::default());
    assert!(matches!(
        imp.import_from("extern", Path::new(SRC_DIR), 1),
        Err(ImportError::UnsupportedMode(1))
    ));
}

#[test]
fn extern_imports_type_check_against_the_trusting_scope() {
    let ws = Workspace::new();
    ws.add_package(
        "p",
        &[("a.sl", "package p\nimport \"intrinsics\"\nfunc F() int { return intrinsics.Sizeof(1) }\n")],
    );
    let imp = ws.importer(Config {
        check_funcs: true,
        ..Config::default()
    });
    let pkg = import(&imp, "p").unwrap();
    assert!(pkg.types.complete());
}

#[test]
fn type_info_is_collected_for_the_root_only_by_default() {
    let ws = Workspace::new();
    ws.add_package("q", &[("q.sl", "package q\nfunc G() {}\n")]);
    ws.add_package("p", &[("a.sl", "package p\nimport \"q\"\nfunc F() { q.G() }\n")]);

    let imp = ws.importer(Config {
        check_funcs: true,
        types_info: TypesInfoMask::ALL,
        ..Config::default()
    });
    let pkg = import(&imp, "p").unwrap();
    let info = pkg.info.as_ref().expect("root info requested");
    assert!(info.defs.as_ref().is_some_and(|m| !m.is_empty()));
    let dep = &pkg.imports.as_ref().unwrap()["q"];
    assert!(dep.info.is_none(), "deps collect no info unless asked");

    // With propagation enabled, dependencies collect info too.
    let ws = Workspace::new();
    ws.add_package("q", &[("q.sl", "package q\nfunc G() {}\n")]);
    ws.add_package("p", &[("a.sl", "package p\nimport \"q\"\nfunc F() { q.G() }\n")]);
    let imp = ws.importer(Config {
        check_funcs: true,
        types_info: TypesInfoMask::ALL,
        imports_types_info: true,
        ..Config::default()
    });
    let pkg = import(&imp, "p").unwrap();
    let dep = &pkg.imports.as_ref().unwrap()["q"];
    assert!(dep.info.is_some());
}

#[test]
fn test_files_and_their_imports_are_root_only() {
    let ws = Workspace::new();
    ws.add_package("assert", &[("assert.sl", "package assert\nfunc Ok() {}\n")]);
    ws.add_package(
        "p",
        &[
            ("a.sl", "package p\nfunc F() {}\n"),
            ("a_test.sl", "package p\nimport \"assert\"\nfunc TestF() { assert.Ok() }\n"),
        ],
    );

    let imp = ws.importer(Config {
        tests: true,
        check_funcs: true,
        ..Config::default()
    });
    let pkg = import(&imp, "p").unwrap();
    assert!(pkg.files.as_ref().unwrap().contains_key("a_test.sl"));
    assert!(pkg.imports.as_ref().unwrap().contains_key("assert"));

    let without = ws.importer(Config::default());
    let pkg = import(&without, "p").unwrap();
    assert!(!pkg.files.as_ref().unwrap().contains_key("a_test.sl"));
}

#[test]
fn hard_check_errors_are_returned_and_memoized() {
    let ws = Workspace::new();
    ws.add_package("p", &[("a.sl", "package p\nvar x undeclared_type\n")]);
    let imp = ws.importer(Config::default());

    let err = import(&imp, "p").unwrap_err();
    assert!(matches!(err, ImportError::Check(_)), "got {err:?}");
    let reads = ws.fs.read_count();

    // The failure is memoized like any other result.
    let again = import(&imp, "p").unwrap_err();
    assert_eq!(again.to_string(), err.to_string());
    assert_eq!(ws.fs.read_count(), reads);
}
