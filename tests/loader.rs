//! Network files written to disk and loaded back through the loader, the
//! registry and the driver binary.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use nnue_eval::config::{EvalOptions, DEFAULT_EVAL_FILE, DEFAULT_EVAL_FILE_BIG, DEFAULT_EVAL_FILE_CLASSIFIER};
use nnue_eval::nnue::{
    BigNetwork, Classifier, NetSize, NetworkLoader, NetworkRegistry, NnueError, SmallNetwork,
    SmallTransformer, FEATURE_COUNT,
};

struct TempDir(PathBuf);

impl TempDir {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("nnue_eval_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        TempDir(dir)
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

fn write_big(path: &Path, net: &BigNetwork) {
    let mut bytes = Vec::new();
    net.write_to(&mut bytes).unwrap();
    fs::write(path, bytes).unwrap();
}

fn write_small_compact(path: &Path, net: &SmallNetwork) {
    let mut bytes = Vec::new();
    net.write_compact(&mut bytes).unwrap();
    fs::write(path, bytes).unwrap();
}

fn write_classifier(path: &Path, classifier: &Classifier) {
    let mut bytes = Vec::new();
    classifier.write_to(&mut bytes).unwrap();
    fs::write(path, bytes).unwrap();
}

fn write_defaults(dir: &Path) -> (BigNetwork, SmallNetwork) {
    let big = BigNetwork::synthetic(40);
    let small = SmallNetwork::synthetic(41);
    write_big(&dir.join(DEFAULT_EVAL_FILE_BIG), &big);
    write_small_compact(&dir.join(DEFAULT_EVAL_FILE), &small);
    (big, small)
}

#[test]
fn loads_default_files_from_directory() {
    let dir = TempDir::new("defaults");
    let (big, small) = write_defaults(dir.path());
    write_classifier(&dir.path().join(DEFAULT_EVAL_FILE_CLASSIFIER), &Classifier::synthetic(1, 8, 8));

    let mut loader = NetworkLoader::with_directories(vec![dir.path().to_path_buf()]);
    let options = EvalOptions::new();
    loader.load(&options);
    assert_eq!(loader.identity().big, DEFAULT_EVAL_FILE_BIG);
    assert_eq!(loader.identity().small, DEFAULT_EVAL_FILE);
    assert_eq!(loader.identity().classifier, DEFAULT_EVAL_FILE_CLASSIFIER);

    let nets = loader.verify(&options).unwrap();
    assert_eq!(*nets.big, big);
    assert_eq!(nets.small.transformer, small.transformer);
    assert!(nets.classifier.is_some());
}

#[test]
fn loads_headerless_small_network() {
    let dir = TempDir::new("headerless");
    write_big(&dir.path().join(DEFAULT_EVAL_FILE_BIG), &BigNetwork::synthetic(2));

    // The headerless layout has no PSQT block
    let mut small = SmallNetwork::synthetic(3);
    let ft = &small.transformer;
    small.transformer = SmallTransformer::new(
        ft.biases().to_vec(),
        (0..FEATURE_COUNT).flat_map(|i| ft.row(i).to_vec()).collect(),
        vec![0; FEATURE_COUNT],
    );
    let mut bytes = Vec::new();
    small.write_headerless(&mut bytes).unwrap();
    fs::write(dir.path().join(DEFAULT_EVAL_FILE), bytes).unwrap();

    let mut loader = NetworkLoader::with_directories(vec![dir.path().to_path_buf()]);
    let options = EvalOptions::new();
    loader.load(&options);
    let nets = loader.verify(&options).unwrap();
    assert_eq!(nets.small.transformer, small.transformer);
    assert_eq!(nets.identity.small, DEFAULT_EVAL_FILE);
}

#[test]
fn missing_classifier_is_optional() {
    let dir = TempDir::new("no_classifier");
    write_defaults(dir.path());
    let mut loader = NetworkLoader::with_directories(vec![dir.path().to_path_buf()]);
    let options = EvalOptions::new();
    loader.load(&options);
    let nets = loader.verify(&options).unwrap();
    assert!(nets.classifier.is_none());
    assert_eq!(nets.identity.classifier, "None");
}

#[test]
fn missing_small_network_fails_verification() {
    let dir = TempDir::new("no_small");
    write_big(&dir.path().join(DEFAULT_EVAL_FILE_BIG), &BigNetwork::synthetic(1));
    let mut loader = NetworkLoader::with_directories(vec![dir.path().to_path_buf()]);
    let options = EvalOptions::new();
    loader.load(&options);
    match loader.verify(&options) {
        Err(NnueError::NotLoaded { size, requested, loaded }) => {
            assert_eq!(size, NetSize::Small);
            assert_eq!(requested, DEFAULT_EVAL_FILE);
            assert_eq!(loaded, "None");
        }
        other => panic!("expected NotLoaded, got {other:?}"),
    }
}

#[test]
fn corrupt_candidate_falls_through_to_next_directory() {
    let first = TempDir::new("corrupt_first");
    let second = TempDir::new("corrupt_second");
    let big = BigNetwork::synthetic(7);

    // Same name in both places; the first copy has a trailing byte
    let mut bytes = Vec::new();
    big.write_to(&mut bytes).unwrap();
    bytes.push(0);
    fs::write(first.path().join("custom-big.nnue"), &bytes).unwrap();
    write_big(&second.path().join("custom-big.nnue"), &big);
    write_small_compact(&second.path().join("custom-small.nnue"), &SmallNetwork::synthetic(8));

    let mut options = EvalOptions::new();
    options.apply_setoption("EvalFileBig", Some("custom-big.nnue"));
    options.apply_setoption("EvalFile", Some("custom-small.nnue"));

    let mut loader =
        NetworkLoader::with_directories(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
    loader.load(&options);
    let nets = loader.verify(&options).unwrap();
    assert_eq!(*nets.big, big);
    assert_eq!(nets.identity.big, "custom-big.nnue");
}

#[test]
fn loaded_class_is_not_reloaded() {
    let dir = TempDir::new("skip_reload");
    write_defaults(dir.path());
    let mut loader = NetworkLoader::with_directories(vec![dir.path().to_path_buf()]);
    let options = EvalOptions::new();
    loader.load(&options);

    // The files are gone, but the loaded networks still satisfy the request
    fs::remove_file(dir.path().join(DEFAULT_EVAL_FILE_BIG)).unwrap();
    fs::remove_file(dir.path().join(DEFAULT_EVAL_FILE)).unwrap();
    loader.load(&options);
    assert!(loader.verify(&options).is_ok());
}

#[test]
fn registry_reload_swaps_snapshot() {
    let dir = TempDir::new("registry");
    write_defaults(dir.path());
    let other_small = SmallNetwork::synthetic(99);
    write_small_compact(&dir.path().join("other-small.nnue"), &other_small);

    let registry = NetworkRegistry::new(NetworkLoader::with_directories(vec![dir.path().to_path_buf()]));
    let mut options = EvalOptions::new();
    let first = registry.reload(&options).unwrap();

    assert!(options.apply_setoption("EvalFile", Some("other-small.nnue")).is_some());
    let second = registry.reload(&options).unwrap();
    assert_eq!(second.small.transformer, other_small.transformer);
    assert_eq!(registry.identity().small, "other-small.nnue");

    // Holders of the first snapshot are unaffected
    assert_ne!(first.small.transformer, second.small.transformer);
    assert_eq!(first.identity.small, DEFAULT_EVAL_FILE);

    // A request that cannot be met leaves the published snapshot in place
    options.apply_setoption("EvalFile", Some("missing.nnue"));
    assert!(registry.reload(&options).is_err());
    assert!(std::sync::Arc::ptr_eq(&registry.current().unwrap(), &second));
}

fn run_driver(dir: &Path, input: &str) -> (String, Option<i32>) {
    let exe = env!("CARGO_BIN_EXE_nnue_eval");
    let mut child = Command::new(exe)
        .current_dir(dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn driver binary");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();
    (String::from_utf8_lossy(&output.stdout).into_owned(), output.status.code())
}

#[test]
fn driver_exits_when_networks_are_missing() {
    let dir = TempDir::new("driver_missing");
    let (stdout, code) = run_driver(dir.path(), "isready\n");
    assert_eq!(code, Some(1));
    let errors: Vec<&str> = stdout.lines().filter(|l| l.starts_with("info string ERROR: ")).collect();
    assert_eq!(errors.len(), 5);
    assert!(errors[1].contains(DEFAULT_EVAL_FILE_BIG));
    assert!(errors[2].contains("EvalFileBig"));
    assert!(errors[3].contains("https://tests.stockfishchess.org/api/nn/"));
    assert!(!stdout.contains("readyok"));
}

#[test]
fn driver_evaluates_with_networks_in_working_directory() {
    let dir = TempDir::new("driver_ok");
    write_defaults(dir.path());
    let (stdout, code) = run_driver(dir.path(), "isready\nposition startpos moves e2e4\neval\nquit\n");
    assert_eq!(code, Some(0));
    assert!(stdout.contains(&format!("info string NNUE evaluation using {DEFAULT_EVAL_FILE_BIG}")));
    assert!(stdout.contains(&format!("info string NNUE evaluation using {DEFAULT_EVAL_FILE}")));
    assert!(stdout.contains("readyok"));
    assert!(stdout.contains("Final evaluation"));
}
