//! Std adapters for existbench.
//!
//! In clean-arch terms: this is where we touch the world.
//! Every strategy answers the same question through a different OS mechanism.

mod bounded;
mod native;
mod setup;

pub use bounded::Bounded;
pub use setup::{CaseSetup, SetupError, StdCaseSetup};

use existbench_types::{Failure, ProbeOutcome, StrategyKind};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

pub trait ExistenceProbe: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn probe(&self, path: &Path) -> ProbeOutcome;

    /// Helper threads this probe started that are still running.
    fn in_flight(&self) -> usize {
        0
    }
}

impl<P: ExistenceProbe + ?Sized> ExistenceProbe for Box<P> {
    fn kind(&self) -> StrategyKind {
        (**self).kind()
    }

    fn probe(&self, path: &Path) -> ProbeOutcome {
        (**self).probe(path)
    }

    fn in_flight(&self) -> usize {
        (**self).in_flight()
    }
}

/// Map an I/O error onto the failure taxonomy.
pub fn failure_from_io(err: &io::Error) -> Failure {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => Failure::NotFound,
        io::ErrorKind::PermissionDenied => Failure::AccessDenied,
        _ => Failure::unexpected(err.to_string()),
    }
}

/// `Path::try_exists`; the baseline.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectQuery;

impl ExistenceProbe for DirectQuery {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DirectQuery
    }

    fn probe(&self, path: &Path) -> ProbeOutcome {
        match path.try_exists() {
            Ok(exists) => ProbeOutcome::found(exists),
            Err(err) => ProbeOutcome::failed(failure_from_io(&err)),
        }
    }
}

/// Raw OS primitive: `access(2)` on Unix, `GetFileAttributesW` on Windows.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeApiQuery;

impl ExistenceProbe for NativeApiQuery {
    fn kind(&self) -> StrategyKind {
        StrategyKind::NativeApiQuery
    }

    fn probe(&self, path: &Path) -> ProbeOutcome {
        match native::path_exists(path) {
            Ok(exists) => ProbeOutcome::found(exists),
            Err(failure) => ProbeOutcome::failed(failure),
        }
    }
}

/// Metadata lookup. Only "not found" reads as missing; any other failure is left unguarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataQuery;

impl ExistenceProbe for MetadataQuery {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MetadataQuery
    }

    fn probe(&self, path: &Path) -> ProbeOutcome {
        match fs::metadata(path) {
            Ok(_) => ProbeOutcome::found(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => ProbeOutcome::found(false),
            Err(err) => ProbeOutcome::failed(failure_from_io(&err)),
        }
    }
}

/// Metadata lookup where every failure reads as missing.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataQueryGuarded;

impl ExistenceProbe for MetadataQueryGuarded {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MetadataQueryGuarded
    }

    fn probe(&self, path: &Path) -> ProbeOutcome {
        ProbeOutcome::found(fs::metadata(path).is_ok())
    }
}

/// Open for reading; the handle is dropped before returning.
///
/// An existing file the caller may not read is reported as missing.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAttempt;

impl ExistenceProbe for OpenAttempt {
    fn kind(&self) -> StrategyKind {
        StrategyKind::OpenAttempt
    }

    fn probe(&self, path: &Path) -> ProbeOutcome {
        match fs::File::open(path) {
            Ok(_file) => ProbeOutcome::found(true),
            Err(_) => ProbeOutcome::found(false),
        }
    }
}

/// Build the probe for one strategy. `timeout` only affects the bounded variant.
pub fn strategy(kind: StrategyKind, timeout: Duration) -> Box<dyn ExistenceProbe> {
    match kind {
        StrategyKind::DirectQuery => Box::new(DirectQuery),
        StrategyKind::NativeApiQuery => Box::new(NativeApiQuery),
        StrategyKind::MetadataQuery => Box::new(MetadataQuery),
        StrategyKind::MetadataQueryGuarded => Box::new(MetadataQueryGuarded),
        StrategyKind::OpenAttempt => Box::new(OpenAttempt),
        StrategyKind::BoundedNativeApiQuery => Box::new(Bounded::new(NativeApiQuery, timeout)),
    }
}

pub fn strategies(kinds: &[StrategyKind], timeout: Duration) -> Vec<Box<dyn ExistenceProbe>> {
    kinds.iter().map(|k| strategy(*k, timeout)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    fn all() -> Vec<Box<dyn ExistenceProbe>> {
        strategies(&StrategyKind::ALL, Duration::from_secs(5))
    }

    #[test]
    fn every_strategy_sees_existing_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("test.txt");
        File::create(&path).expect("create fixture");

        for s in all() {
            let out = s.probe(&path);
            assert_eq!(
                out,
                ProbeOutcome::found(true),
                "{} should report an existing file",
                s.kind()
            );
        }
    }

    #[test]
    fn no_strategy_reports_missing_file_as_present() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("test.not");

        for s in all() {
            let out = s.probe(&path);
            assert!(!out.exists, "{} reported a missing file as present", s.kind());
            assert!(
                matches!(out.failure, None | Some(Failure::NotFound)),
                "{} should not fail on a plain missing file, got {:?}",
                s.kind(),
                out.failure
            );
        }
    }

    #[test]
    fn missing_parent_directory_reads_as_missing() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("no-such-dir").join("test.not");

        for s in all() {
            let out = s.probe(&path);
            assert!(!out.exists, "{}", s.kind());
        }
    }

    #[test]
    fn file_used_as_directory_is_never_present() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("plain.txt");
        File::create(&file).expect("create fixture");
        let path = file.join("child");

        for s in all() {
            let out = s.probe(&path);
            assert!(!out.exists, "{}", s.kind());
            assert!(
                matches!(
                    out.failure,
                    None | Some(Failure::NotFound) | Some(Failure::Unexpected { .. })
                ),
                "{}: {:?}",
                s.kind(),
                out.failure
            );
        }
    }

    #[test]
    fn repeated_probes_do_not_flap() {
        let dir = tempdir().expect("tempdir");
        let present = dir.path().join("test.txt");
        File::create(&present).expect("create fixture");
        let missing = dir.path().join("test.not");

        for s in all() {
            for path in [&present, &missing] {
                let first = s.probe(path);
                for _ in 0..20 {
                    assert_eq!(s.probe(path).exists, first.exists, "{}", s.kind());
                }
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn interior_nul_is_unexpected_for_native_query() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new(OsStr::from_bytes(b"/tmp/bad\0name"));
        let out = NativeApiQuery.probe(path);
        assert!(!out.exists);
        assert!(matches!(out.failure, Some(Failure::Unexpected { .. })));
    }

    #[cfg(unix)]
    #[test]
    #[allow(unsafe_code)]
    fn open_attempt_diverges_on_unreadable_file() {
        use std::os::unix::fs::PermissionsExt;

        // Root can read anything, so the divergence cannot be observed.
        if unsafe { libc::geteuid() } == 0 {
            return;
        }

        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("secret.txt");
        File::create(&path).expect("create fixture");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).expect("chmod");

        assert_eq!(OpenAttempt.probe(&path), ProbeOutcome::found(false));
        assert_eq!(DirectQuery.probe(&path), ProbeOutcome::found(true));
        assert_eq!(NativeApiQuery.probe(&path), ProbeOutcome::found(true));
        assert_eq!(MetadataQuery.probe(&path), ProbeOutcome::found(true));
    }

    #[test]
    fn failure_from_io_classifies_kinds() {
        let nf = io::Error::from(io::ErrorKind::NotFound);
        assert_eq!(failure_from_io(&nf), Failure::NotFound);

        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(failure_from_io(&denied), Failure::AccessDenied);

        let other = io::Error::other("network stalled");
        assert!(matches!(
            failure_from_io(&other),
            Failure::Unexpected { message } if message.contains("network stalled")
        ));
    }

    #[test]
    fn factory_builds_requested_kinds_in_order() {
        let kinds = [StrategyKind::OpenAttempt, StrategyKind::DirectQuery];
        let built = strategies(&kinds, Duration::from_millis(10));
        let got: Vec<StrategyKind> = built.iter().map(|s| s.kind()).collect();
        assert_eq!(got, kinds);
    }
}
