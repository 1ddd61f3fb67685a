use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dupestash::actions::{ActionExecutor, ActionMode};
use dupestash::duplicates::{DuplicateFinder, DuplicateResolver, FinderConfig, ResolverConfig};
use dupestash::scanner::{FileEntry, Hasher, Walker, WalkerConfig, DEFAULT_PREFIX_WINDOW};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Tree with `files_per_dir` files per directory, every third one a copy.
fn setup_tree(depth: usize, files_per_dir: usize) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    fill_dir(temp_dir.path(), depth, files_per_dir);
    temp_dir
}

fn fill_dir(path: &Path, depth: usize, files_per_dir: usize) {
    if depth == 0 {
        return;
    }
    fs::create_dir_all(path).expect("Failed to create dir");

    for i in 0..files_per_dir {
        let content = if i % 3 == 0 {
            "shared content for duplicates".to_string()
        } else {
            format!("unique content {} in {}", i, path.display())
        };
        fs::write(path.join(format!("file_{i}.txt")), content).expect("Failed to write file");
    }

    for i in 0..2 {
        fill_dir(&path.join(format!("dir_{i}")), depth - 1, files_per_dir);
    }
}

fn bench_walker(c: &mut Criterion) {
    let temp_dir = setup_tree(4, 10);
    let config = WalkerConfig::default();

    c.bench_function("walker_150_files", |b| {
        b.iter(|| {
            let walker = Walker::new(temp_dir.path(), config.clone());
            let files: Vec<_> = walker.walk().collect();
            black_box(files);
        })
    });
}

fn bench_hasher(c: &mut Criterion) {
    let mut group = c.benchmark_group("hasher");
    let hasher = Hasher::new();
    let temp_dir = TempDir::new().unwrap();

    for size_kb in [1usize, 1024, 10240] {
        let file_path = temp_dir.path().join(format!("bench_{size_kb}.dat"));
        fs::write(&file_path, vec![b'a'; size_kb * 1024]).expect("Failed to write bench file");

        group.bench_with_input(format!("full_{size_kb}KB"), &file_path, |b, path| {
            b.iter(|| black_box(hasher.full_digest(path).unwrap()));
        });
        group.bench_with_input(format!("prefix_{size_kb}KB"), &file_path, |b, path| {
            b.iter(|| black_box(hasher.prefix_digest(path, DEFAULT_PREFIX_WINDOW).unwrap()));
        });
    }
    group.finish();
}

/// Equal-size large files that differ early: the prefix stage should keep
/// this close to the cost of hashing one window per file.
fn bench_resolver_prefix_rejection(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let entries: Vec<FileEntry> = (0..8u8)
        .map(|i| {
            let path: PathBuf = temp_dir.path().join(format!("big_{i}.bin"));
            let mut data = vec![0u8; 4 * 1024 * 1024];
            data[0] = i;
            fs::write(&path, &data).unwrap();
            FileEntry::new(path, data.len() as u64)
        })
        .collect();

    c.bench_function("resolver_8x4MiB_prefix_differs", |b| {
        b.iter(|| {
            let mut resolver = DuplicateResolver::new(ResolverConfig::default());
            black_box(resolver.resolve_all(&entries));
        })
    });
}

fn bench_full_run(c: &mut Criterion) {
    let temp_dir = setup_tree(4, 10);
    let roots = vec![temp_dir.path().to_path_buf()];

    c.bench_function("report_run_150_files", |b| {
        b.iter(|| {
            let finder = DuplicateFinder::new(FinderConfig::default());
            let mut executor = ActionExecutor::new(ActionMode::Report);
            black_box(finder.run(&roots, &mut executor).unwrap());
        })
    });
}

criterion_group!(
    benches,
    bench_walker,
    bench_hasher,
    bench_resolver_prefix_rejection,
    bench_full_run
);
criterion_main!(benches);
