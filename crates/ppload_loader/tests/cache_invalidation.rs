mod common;

use std::path::PathBuf;
use std::sync::{Arc, Barrier};

use common::{context, write_at, Program};
use ppload_cache::{deserialize, CacheHeader, CacheRecord, TrailerState};
use ppload_config::{HashCheckPolicy, InvalidationMode, LoaderConfig};

fn project() -> (tempfile::TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let main = dir.path().join("main.ppy");
    let header = dir.path().join("header.pph");
    write_at(&main, "#include \"header.pph\"\nprint(VALUE)\n", 1_000);
    write_at(&header, "#define VALUE 1\n", 1_000);
    (dir, main, header)
}

#[test]
fn edited_header_invalidates_timestamp_entry() {
    let (_dir, main, header) = project();
    let ctx = context(LoaderConfig::default());

    let first = ctx.get_code(&main).unwrap();
    assert_eq!(first.lines, vec!["print(1)"]);
    assert_eq!(ctx.host().compiles(), 1);
    assert!(ctx.store().cache_path(&main).is_file());

    let cached = ctx.get_code(&main).unwrap();
    assert_eq!(cached, first);
    assert_eq!(ctx.host().compiles(), 1);

    write_at(&header, "#define VALUE 2\n", 1_010);
    let second = ctx.get_code(&main).unwrap();
    assert_eq!(second.lines, vec!["print(2)"]);
    assert_eq!(ctx.host().compiles(), 2);

    ctx.get_code(&main).unwrap();
    assert_eq!(ctx.host().compiles(), 2);
}

#[test]
fn new_process_sees_cached_entry() {
    let (_dir, main, header) = project();
    context(LoaderConfig::default()).get_code(&main).unwrap();

    let later = context(LoaderConfig::default());
    assert_eq!(later.get_code(&main).unwrap().lines, vec!["print(1)"]);
    assert_eq!(later.host().compiles(), 0);

    write_at(&header, "#define VALUE 2\n", 1_010);
    let again = context(LoaderConfig::default());
    assert_eq!(again.get_code(&main).unwrap().lines, vec!["print(2)"]);
    assert_eq!(again.host().compiles(), 1);
}

#[test]
fn edited_header_invalidates_checked_hash_entry() {
    let (_dir, main, header) = project();
    let ctx = context(LoaderConfig {
        invalidation: InvalidationMode::CheckedHash,
        ..LoaderConfig::default()
    });

    ctx.get_code(&main).unwrap();
    std::fs::write(&header, "#define VALUE 1\n").unwrap();
    assert_eq!(ctx.get_code(&main).unwrap().lines, vec!["print(1)"]);
    assert_eq!(ctx.host().compiles(), 1);

    write_at(&header, "#define VALUE 2\n", 1_000);
    assert_eq!(ctx.get_code(&main).unwrap().lines, vec!["print(2)"]);
    assert_eq!(ctx.host().compiles(), 2);
}

#[test]
fn unchecked_hash_entry_follows_host_policy() {
    let (_dir, main, header) = project();
    let unchecked = LoaderConfig {
        invalidation: InvalidationMode::UncheckedHash,
        ..LoaderConfig::default()
    };
    let ctx = context(unchecked.clone());
    ctx.get_code(&main).unwrap();

    std::fs::write(&header, "#define VALUE 2\n").unwrap();
    assert_eq!(ctx.get_code(&main).unwrap().lines, vec!["print(1)"]);

    let strict = context(LoaderConfig {
        check_hash_based_caches: HashCheckPolicy::Always,
        ..unchecked
    });
    assert_eq!(strict.get_code(&main).unwrap().lines, vec!["print(2)"]);
}

#[test]
fn deleted_dependency_does_not_invalidate() {
    let dir = tempfile::tempdir().unwrap();
    let main = dir.path().join("main.ppy");
    let a = dir.path().join("a.pph");
    let b = dir.path().join("b.pph");
    write_at(&main, "#include \"a.pph\"\n#include \"b.pph\"\nprint(A, B)\n", 1_000);
    write_at(&a, "#define A 1\n", 1_000);
    write_at(&b, "#define B 2\n", 1_000);

    let ctx = context(LoaderConfig::default());
    ctx.get_code(&main).unwrap();
    std::fs::remove_file(&a).unwrap();

    assert_eq!(ctx.get_code(&main).unwrap().lines, vec!["print(1, 2)"]);
    assert_eq!(ctx.host().compiles(), 1);
}

#[test]
fn edited_origin_is_caught_by_host_check() {
    let (_dir, main, _header) = project();
    let ctx = context(LoaderConfig::default());
    ctx.get_code(&main).unwrap();

    write_at(&main, "#include \"header.pph\"\nprint(VALUE + 1)\n", 1_005);
    assert_eq!(ctx.get_code(&main).unwrap().lines, vec!["print(1 + 1)"]);
    assert_eq!(ctx.host().compiles(), 2);
}

#[test]
fn sibling_sources_do_not_share_entries() {
    let dir = tempfile::tempdir().unwrap();
    let plain = dir.path().join("util.py");
    let family = dir.path().join("util.ppy");
    write_at(&plain, "print(1)\n", 1_000);
    write_at(&family, "print(2)\n", 1_000);

    let ctx = context(LoaderConfig::default());
    assert_ne!(ctx.store().cache_path(&plain), ctx.store().cache_path(&family));

    assert_eq!(ctx.get_code(&plain).unwrap().lines, vec!["print(1)"]);
    let unit = ctx.get_code(&family).unwrap();
    assert_eq!(unit.origin, family);
    assert_eq!(unit.lines, vec!["print(2)"]);
    assert_eq!(ctx.host().compiles(), 2);
}

#[test]
fn entry_for_another_origin_is_recompiled() {
    let dir = tempfile::tempdir().unwrap();
    let plain = dir.path().join("util.py");
    let family = dir.path().join("util.ppy");
    write_at(&plain, "print(1)\n", 1_000);
    write_at(&family, "print(2)\n", 1_000);

    let ctx = context(LoaderConfig::default());
    ctx.get_code(&plain).unwrap();
    let misplaced = std::fs::read(ctx.store().cache_path(&plain)).unwrap();
    std::fs::write(ctx.store().cache_path(&family), misplaced).unwrap();

    let unit = ctx.get_code(&family).unwrap();
    assert_eq!(unit.origin, family);
    assert_eq!(unit.lines, vec!["print(2)"]);
    assert_eq!(ctx.host().compiles(), 2);
}

#[test]
fn header_edited_during_compile_is_caught() {
    let (_dir, main, header) = project();
    let ctx = context(LoaderConfig::default());

    let stats = CacheHeader::for_origin(&main, ctx.config().invalidation).unwrap();
    let source = ctx.get_source_bytes(&main).unwrap();
    let compiled = ctx.source_to_unit(&source, &main).unwrap();
    write_at(&header, "#define VALUE 2\n", 1_010);
    let entry = ctx.serialize_cache(&compiled, &stats).unwrap();
    ctx.store().write(&main, &entry).unwrap();

    let later = context(LoaderConfig::default());
    assert_eq!(later.get_code(&main).unwrap().lines, vec!["print(2)"]);
    assert_eq!(later.host().compiles(), 1);
}

#[test]
fn header_edited_during_compile_is_caught_by_hash() {
    let (_dir, main, header) = project();
    let config = LoaderConfig {
        invalidation: InvalidationMode::CheckedHash,
        ..LoaderConfig::default()
    };
    let ctx = context(config.clone());

    let stats = CacheHeader::for_origin(&main, config.invalidation).unwrap();
    let source = ctx.get_source_bytes(&main).unwrap();
    let compiled = ctx.source_to_unit(&source, &main).unwrap();
    write_at(&header, "#define VALUE 2\n", 1_000);
    let entry = ctx.serialize_cache(&compiled, &stats).unwrap();
    ctx.store().write(&main, &entry).unwrap();

    let later = context(config);
    assert_eq!(later.get_code(&main).unwrap().lines, vec!["print(2)"]);
    assert_eq!(later.host().compiles(), 1);
}

#[test]
fn plain_entries_have_no_trailer() {
    let dir = tempfile::tempdir().unwrap();
    let plain = dir.path().join("plain.py");
    write_at(&plain, "print(1)\n", 1_000);

    let config = LoaderConfig::default();
    let ctx = context(config.clone());
    ctx.get_code(&plain).unwrap();

    let bytes = std::fs::read(ctx.store().cache_path(&plain)).unwrap();
    let record: CacheRecord<Program> = deserialize(&bytes, &config).unwrap();
    assert!(matches!(record.trailer, TrailerState::NotExpected));
    assert!(ctx.dependencies().is_empty());
}

#[test]
fn family_entries_always_have_a_trailer() {
    let dir = tempfile::tempdir().unwrap();
    let main = dir.path().join("solo.ppy");
    write_at(&main, "print(1)\n", 1_000);

    let config = LoaderConfig::default();
    let ctx = context(config.clone());
    ctx.get_code(&main).unwrap();

    let bytes = std::fs::read(ctx.store().cache_path(&main)).unwrap();
    let record: CacheRecord<Program> = deserialize(&bytes, &config).unwrap();
    match record.trailer {
        TrailerState::Present(trailer) => assert!(trailer.is_empty()),
        other => panic!("expected a trailer, got {other:?}"),
    }
}

#[test]
fn corrupt_entry_is_recompiled_and_replaced() {
    let (_dir, main, _header) = project();
    let ctx = context(LoaderConfig::default());
    let path = ctx.store().cache_path(&main);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"PPL\x01 definitely not a cache entry").unwrap();

    assert_eq!(ctx.get_code(&main).unwrap().lines, vec!["print(1)"]);
    assert_eq!(ctx.host().compiles(), 1);
    ctx.get_code(&main).unwrap();
    assert_eq!(ctx.host().compiles(), 1);
}

#[test]
fn truncated_trailer_forces_recompile() {
    let (_dir, main, _header) = project();
    let ctx = context(LoaderConfig::default());
    ctx.get_code(&main).unwrap();

    let path = ctx.store().cache_path(&main);
    let mut bytes = std::fs::read(&path).unwrap();
    bytes.truncate(bytes.len() - 2);
    std::fs::write(&path, bytes).unwrap();

    ctx.get_code(&main).unwrap();
    assert_eq!(ctx.host().compiles(), 2);
}

#[test]
fn unwritable_cache_still_loads() {
    let (dir, main, _header) = project();
    std::fs::write(dir.path().join("__ppcache__"), "in the way").unwrap();

    let ctx = context(LoaderConfig::default());
    assert_eq!(ctx.get_code(&main).unwrap().lines, vec!["print(1)"]);
    ctx.get_code(&main).unwrap();
    assert_eq!(ctx.host().compiles(), 2);
}

#[test]
fn concurrent_loads_compile_once() {
    let (_dir, main, _header) = project();
    let ctx = Arc::new(context(LoaderConfig::default()));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let barrier = Arc::clone(&barrier);
            let main = main.clone();
            std::thread::spawn(move || {
                barrier.wait();
                ctx.get_code(&main).unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().lines, vec!["print(1)"]);
    }
    assert_eq!(ctx.host().compiles(), 1);
    assert!(ctx.dependencies().is_empty());
}

#[test]
fn load_many_keeps_order() {
    let dir = tempfile::tempdir().unwrap();
    let paths: Vec<PathBuf> = (0..6)
        .map(|i| {
            let path = dir.path().join(format!("m{i}.ppy"));
            write_at(&path, &format!("#define N {i}\nprint(N)\n"), 1_000);
            path
        })
        .collect();
    let mut with_missing = paths.clone();
    with_missing.push(dir.path().join("missing.ppy"));

    let ctx = context(LoaderConfig::default());
    let results = ctx.load_many(&with_missing);
    for (i, result) in results.iter().take(6).enumerate() {
        assert_eq!(result.as_ref().unwrap().lines, vec![format!("print({i})")]);
    }
    assert!(results[6].is_err());
    assert_eq!(ctx.host().compiles(), 6);
}
