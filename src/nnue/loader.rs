//! Network file resolution, loading and verification.
//!
//! For each size class the requested file name is tried against, in order:
//! the embedded payload (default names only, `embed` feature), the name as
//! given, the executable's directory and `DEFAULT_NNUE_DIRECTORY` when it
//! was set at compile time. The first source that parses wins and its name
//! becomes the class's identity.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::classifier::Classifier;
use super::error::{NetSize, NnueError};
use super::network::{BigNetwork, EvalFileIdentity, Networks, SmallNetwork};
use crate::config::EvalOptions;

/// Where a candidate network comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Embedded,
    File(PathBuf),
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Embedded => write!(f, "<internal>"),
            Source::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(feature = "embed")]
fn embedded(size: NetSize) -> Option<&'static [u8]> {
    match size {
        NetSize::Big => Some(include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/nets/nn-b1a57edbea57.nnue"
        ))),
        NetSize::Small => Some(include_bytes!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/nets/HL64-qa101-qb160-S2-T77novT79maraprmay.rearranged.8-bit.nnue"
        ))),
        NetSize::Classifier => None,
    }
}

#[cfg(not(feature = "embed"))]
fn embedded(_size: NetSize) -> Option<&'static [u8]> {
    None
}

/// Directories searched after the working directory
fn default_directories() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::new()];
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }
    if let Some(dir) = option_env!("DEFAULT_NNUE_DIRECTORY") {
        dirs.push(PathBuf::from(dir));
    }
    dirs
}

/// Loads networks per size class and tracks which file each came from.
#[derive(Debug)]
pub struct NetworkLoader {
    big: Option<Arc<BigNetwork>>,
    small: Option<Arc<SmallNetwork>>,
    classifier: Option<Arc<Classifier>>,
    identity: EvalFileIdentity,
    directories: Vec<PathBuf>,
}

impl Default for NetworkLoader {
    fn default() -> Self {
        Self::with_directories(default_directories())
    }
}

impl NetworkLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader searching only `directories` (an empty path is the working
    /// directory) after the embedded payload.
    #[must_use]
    pub fn with_directories(directories: Vec<PathBuf>) -> Self {
        NetworkLoader {
            big: None,
            small: None,
            classifier: None,
            identity: EvalFileIdentity::default(),
            directories,
        }
    }

    #[must_use]
    pub fn identity(&self) -> &EvalFileIdentity {
        &self.identity
    }

    /// Candidate sources for `name`, in the order they are tried.
    #[must_use]
    pub fn candidates(&self, size: NetSize, name: &str) -> Vec<Source> {
        let mut sources = Vec::with_capacity(self.directories.len() + 1);
        if name == EvalOptions::default_name(size) && embedded(size).is_some() {
            sources.push(Source::Embedded);
        }
        sources.extend(self.directories.iter().map(|dir| Source::File(dir.join(name))));
        sources
    }

    /// Try to load every size class whose requested file differs from the
    /// one currently loaded. Failures are logged, never returned.
    pub fn load(&mut self, options: &EvalOptions) {
        for size in NetSize::ALL {
            let requested = options.requested(size).to_string();
            for source in self.candidates(size, &requested) {
                if self.identity.get(size) == requested {
                    break;
                }
                match self.load_from(size, &source) {
                    Ok(()) => {
                        log::info!("loaded {size} network {requested} from {source}");
                        self.identity.set(size, requested.clone());
                    }
                    Err(err) => log::warn!("cannot load {size} network from {source}: {err}"),
                }
            }
        }
    }

    fn load_from(&mut self, size: NetSize, source: &Source) -> Result<(), NnueError> {
        match source {
            Source::Embedded => match embedded(size) {
                Some(mut bytes) => self.parse(size, &mut bytes),
                None => Err(NnueError::BadDimensions(format!("no embedded {size} network"))),
            },
            Source::File(path) => {
                let mut reader = BufReader::new(File::open(path)?);
                self.parse(size, &mut reader)
            }
        }
    }

    fn parse<R: Read>(&mut self, size: NetSize, reader: &mut R) -> Result<(), NnueError> {
        match size {
            NetSize::Big => self.big = Some(Arc::new(BigNetwork::read(reader)?)),
            NetSize::Small => self.small = Some(Arc::new(SmallNetwork::read(reader)?)),
            NetSize::Classifier => self.classifier = Some(Arc::new(Classifier::read(reader)?)),
        }
        Ok(())
    }

    /// Check that the requested big and small networks are loaded and bundle
    /// them. The classifier is optional.
    pub fn verify(&self, options: &EvalOptions) -> Result<Networks, NnueError> {
        let not_loaded = |size: NetSize| NnueError::NotLoaded {
            size,
            requested: options.requested(size).to_string(),
            loaded: self.identity.get(size).to_string(),
        };

        for size in [NetSize::Big, NetSize::Small] {
            if self.identity.get(size) != options.requested(size) {
                return Err(not_loaded(size));
            }
        }
        let big = self.big.clone().ok_or_else(|| not_loaded(NetSize::Big))?;
        let small = self.small.clone().ok_or_else(|| not_loaded(NetSize::Small))?;

        let classifier = if self.identity.classifier == options.requested(NetSize::Classifier) {
            self.classifier.clone()
        } else {
            log::info!("no classifier loaded, small network results near zero are always rechecked");
            None
        };

        Ok(Networks {
            big,
            small,
            classifier,
            identity: self.identity.clone(),
        })
    }

    /// Like [`NetworkLoader::verify`], but prints the diagnostic and ends
    /// the process when a required network is missing.
    pub fn verify_or_exit(&self, options: &EvalOptions) -> Networks {
        match self.verify(options) {
            Ok(nets) => {
                for size in NetSize::ALL {
                    let name = nets.identity.get(size);
                    if size != NetSize::Classifier || nets.classifier.is_some() {
                        println!("info string NNUE evaluation using {name}");
                    }
                }
                nets
            }
            Err(err) => {
                log::error!("{err}");
                for line in diagnostic(&err, options) {
                    println!("info string ERROR: {line}");
                }
                std::process::exit(1);
            }
        }
    }
}

/// The five lines printed before giving up on a missing network.
#[must_use]
pub fn diagnostic(err: &NnueError, options: &EvalOptions) -> [String; 5] {
    let (size, requested) = match err {
        NnueError::NotLoaded { size, requested, .. } => (*size, requested.clone()),
        _ => (NetSize::Big, options.requested(NetSize::Big).to_string()),
    };
    [
        "Network evaluation parameters compatible with the engine must be available.".to_string(),
        format!("The network file {requested} was not loaded successfully."),
        format!(
            "The UCI option {} might need to specify the full path, including the directory name, to the network file.",
            size.option_name()
        ),
        format!(
            "The default net can be downloaded from: https://tests.stockfishchess.org/api/nn/{}",
            EvalOptions::default_name(size)
        ),
        "The engine will be terminated now.".to_string(),
    ]
}

/// Process-wide holder of the active networks.
///
/// Reloading builds a fresh `Networks` and swaps the shared pointer, so
/// threads holding the previous snapshot keep evaluating with it.
#[derive(Debug, Default)]
pub struct NetworkRegistry {
    loader: Mutex<NetworkLoader>,
    current: RwLock<Option<Arc<Networks>>>,
}

impl NetworkRegistry {
    #[must_use]
    pub fn new(loader: NetworkLoader) -> Self {
        NetworkRegistry {
            loader: Mutex::new(loader),
            current: RwLock::new(None),
        }
    }

    /// Load whatever `options` request and publish the result if it verifies.
    pub fn reload(&self, options: &EvalOptions) -> Result<Arc<Networks>, NnueError> {
        let mut loader = self.loader.lock();
        loader.load(options);
        let nets = Arc::new(loader.verify(options)?);
        *self.current.write() = Some(Arc::clone(&nets));
        Ok(nets)
    }

    /// Like [`NetworkRegistry::reload`], but a missing network ends the
    /// process after printing the diagnostic.
    pub fn reload_or_exit(&self, options: &EvalOptions) -> Arc<Networks> {
        let mut loader = self.loader.lock();
        loader.load(options);
        let nets = Arc::new(loader.verify_or_exit(options));
        *self.current.write() = Some(Arc::clone(&nets));
        nets
    }

    /// Publish an already built set of networks.
    pub fn install(&self, nets: Networks) -> Arc<Networks> {
        let nets = Arc::new(nets);
        *self.current.write() = Some(Arc::clone(&nets));
        nets
    }

    /// Snapshot of the active networks, if any verified yet.
    #[must_use]
    pub fn current(&self) -> Option<Arc<Networks>> {
        self.current.read().clone()
    }

    #[must_use]
    pub fn identity(&self) -> EvalFileIdentity {
        self.loader.lock().identity().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_order() {
        let loader = NetworkLoader::with_directories(vec![PathBuf::new(), PathBuf::from("/opt/nets")]);
        let sources = loader.candidates(NetSize::Small, "net.nnue");
        assert_eq!(
            sources,
            vec![
                Source::File(PathBuf::from("net.nnue")),
                Source::File(PathBuf::from("/opt/nets/net.nnue")),
            ]
        );
    }

    #[test]
    fn test_verify_reports_missing_network() {
        let mut loader = NetworkLoader::with_directories(vec![PathBuf::from("/nonexistent-nnue-dir")]);
        let options = EvalOptions::new();
        loader.load(&options);
        assert_eq!(loader.identity(), &EvalFileIdentity::default());

        let err = loader.verify(&options).unwrap_err();
        assert!(matches!(err, NnueError::NotLoaded { size: NetSize::Big, .. }));
        let lines = diagnostic(&err, &options);
        assert!(lines[2].contains("EvalFileBig"));
        assert!(lines[3].ends_with(EvalOptions::default_name(NetSize::Big)));
    }

    #[test]
    fn test_registry_install_and_snapshot() {
        let registry = NetworkRegistry::default();
        assert!(registry.current().is_none());
        let first = registry.install(Networks::synthetic(1));
        let held = registry.current().unwrap();
        assert!(Arc::ptr_eq(&first, &held));

        registry.install(Networks::synthetic(2));
        // The earlier snapshot stays usable after the swap
        assert!(!Arc::ptr_eq(&held, &registry.current().unwrap()));
        assert_eq!(held.big.description, "synthetic big network (seed 1)");
    }
}
