//! Per-case setup: make the ground truth hold before anything is measured.

use crate::{Bounded, ExistenceProbe, NativeApiQuery};
use existbench_types::{Category, PathCase};
use std::fs;
use std::io;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("fixtures are only supported for local_file cases (case is {0})")]
    FixtureCategory(Category),

    #[error("failed to prepare fixture {path}: {source}")]
    Fixture {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("expected {path} to exist, but it was not observed ({observed})")]
    NotObserved { path: String, observed: String },

    #[error("expected {path} to be absent, but it exists")]
    UnexpectedlyPresent { path: String },
}

pub trait CaseSetup {
    /// Establish (or verify) the case's ground truth. An error means "skip this case".
    fn prepare(&self, case: &PathCase) -> Result<(), SetupError>;

    fn in_flight(&self) -> usize {
        0
    }
}

/// Creates local fixtures on request, then checks every case with a bounded native probe.
pub struct StdCaseSetup {
    verify: Bounded<NativeApiQuery>,
}

impl StdCaseSetup {
    pub fn new(timeout: Duration) -> Self {
        Self {
            verify: Bounded::new(NativeApiQuery, timeout),
        }
    }

    fn apply_fixture(&self, case: &PathCase) -> Result<(), SetupError> {
        if case.category != Category::LocalFile {
            return Err(SetupError::FixtureCategory(case.category));
        }
        let path = case.as_path();
        let wrap = |source: io::Error| SetupError::Fixture {
            path: case.path.clone(),
            source,
        };

        if case.expected_exists {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(wrap)?;
                }
            }
            if !path.exists() {
                fs::File::create(path).map_err(wrap)?;
                tracing::debug!(case = %case.name, path = %case.path, "created fixture");
            }
        } else {
            match fs::remove_file(path) {
                Ok(()) => tracing::debug!(case = %case.name, path = %case.path, "removed fixture"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(wrap(err)),
            }
        }
        Ok(())
    }
}

impl CaseSetup for StdCaseSetup {
    fn prepare(&self, case: &PathCase) -> Result<(), SetupError> {
        if case.fixture {
            self.apply_fixture(case)?;
        }

        let outcome = self.verify.probe(case.as_path());
        if case.expected_exists {
            match outcome.failure {
                None if outcome.exists => Ok(()),
                None => Err(SetupError::NotObserved {
                    path: case.path.clone(),
                    observed: "missing".to_string(),
                }),
                Some(failure) => Err(SetupError::NotObserved {
                    path: case.path.clone(),
                    observed: failure.to_string(),
                }),
            }
        } else if outcome.exists {
            Err(SetupError::UnexpectedlyPresent {
                path: case.path.clone(),
            })
        } else {
            // Absent, unreachable and timed out all agree with "does not exist".
            Ok(())
        }
    }

    fn in_flight(&self) -> usize {
        self.verify.in_flight()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn setup() -> StdCaseSetup {
        StdCaseSetup::new(Duration::from_secs(5))
    }

    #[test]
    fn fixture_is_created_for_expected_existing_case() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("TEMP").join("test.txt");
        let case = PathCase::new(
            "local-existing",
            path.to_string_lossy(),
            true,
            Category::LocalFile,
        )
        .with_fixture();

        setup().prepare(&case).expect("fixture setup");
        assert!(path.is_file());

        // Second prepare leaves the existing file alone.
        setup().prepare(&case).expect("idempotent setup");
    }

    #[test]
    fn fixture_is_removed_for_expected_missing_case() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("test.not");
        fs::write(&path, b"stale").expect("write stale file");

        let case = PathCase::new("local-missing", path.to_string_lossy(), false, Category::LocalFile)
            .with_fixture();
        setup().prepare(&case).expect("fixture removal");
        assert!(!path.exists());
    }

    #[test]
    fn missing_ground_truth_skips_case() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("test.txt");
        let case = PathCase::new("unc-existing", path.to_string_lossy(), true, Category::UncPath);

        let err = setup().prepare(&case).unwrap_err();
        assert!(matches!(err, SetupError::NotObserved { .. }), "{err:?}");
    }

    #[test]
    fn present_path_expected_missing_skips_case() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("test.not");
        fs::write(&path, b"oops").expect("write");
        let case = PathCase::new("local-missing", path.to_string_lossy(), false, Category::LocalFile);

        let err = setup().prepare(&case).unwrap_err();
        assert!(matches!(err, SetupError::UnexpectedlyPresent { .. }));
    }

    #[test]
    fn fixture_refused_for_network_categories() {
        let case = PathCase::new("mapped", "Z:\\test.txt", true, Category::MappedDrive).with_fixture();
        let err = setup().prepare(&case).unwrap_err();
        assert!(matches!(
            err,
            SetupError::FixtureCategory(Category::MappedDrive)
        ));
        assert!(err.to_string().contains("mapped_drive"));
    }

    #[test]
    fn unreachable_expected_missing_case_is_accepted() {
        let case = PathCase::new(
            "inactive",
            "/nonexistent-existbench-mount/J/test.not",
            false,
            Category::InactiveMappedDrive,
        );
        setup().prepare(&case).expect("absent path is fine for an expected-missing case");
    }
}
