use std::collections::HashMap;
use std::sync::RwLock;

use crate::checksum::is_checksum_file;
use crate::types::Location;

const IGNORED_EXTENSIONS: &[&str] = &["asc", "md5", "sha1", "sha256", "sha512", "pom", "xml"];
const IGNORED_CLASSIFIERS: &[&str] = &["-sources.", "-javadoc."];

/// Receives successful artifact resolutions.
pub trait StatisticsRecorder: Send + Sync {
    fn record_resolved(&self, repository: &str, location: &Location);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatistics;

impl StatisticsRecorder for NoopStatistics {
    fn record_resolved(&self, _repository: &str, _location: &Location) {}
}

/// Counts resolutions per `/<repository>/<location>` in memory.
#[derive(Debug, Default)]
pub struct MemoryStatistics {
    counts: RwLock<HashMap<String, u64>>,
}

impl MemoryStatistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn count(&self, repository: &str, location: &Location) -> u64 {
        self.counts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&location.route_path(repository))
            .copied()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .sum()
    }
}

impl StatisticsRecorder for MemoryStatistics {
    fn record_resolved(&self, repository: &str, location: &Location) {
        *self
            .counts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(location.route_path(repository))
            .or_default() += 1;
    }
}

/// Whether a resolution counts as an artifact download. Checksums,
/// signatures, poms, metadata and source/javadoc jars are skipped.
#[must_use]
pub fn should_record(location: &Location) -> bool {
    let name = location.file_name();
    if name.is_empty() || is_checksum_file(name) {
        return false;
    }
    if location
        .extension()
        .is_some_and(|ext| IGNORED_EXTENSIONS.contains(&ext))
    {
        return false;
    }
    !IGNORED_CLASSIFIERS
        .iter()
        .any(|classifier| name.contains(classifier))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(path: &str) -> Location {
        Location::parse(path).unwrap()
    }

    #[test]
    fn test_should_record() {
        assert!(should_record(&loc("g/a/1.0/a-1.0.jar")));
        assert!(should_record(&loc("g/a/1.0/a-1.0.zip")));
        assert!(!should_record(&loc("g/a/1.0/a-1.0.pom")));
        assert!(!should_record(&loc("g/a/1.0/a-1.0.jar.sha1")));
        assert!(!should_record(&loc("g/a/1.0/a-1.0.jar.asc")));
        assert!(!should_record(&loc("g/a/maven-metadata.xml")));
        assert!(!should_record(&loc("g/a/1.0/a-1.0-sources.jar")));
        assert!(!should_record(&loc("g/a/1.0/a-1.0-javadoc.jar")));
        assert!(!should_record(&Location::root()));
    }

    #[test]
    fn test_memory_statistics() {
        let statistics = MemoryStatistics::new();
        let jar = loc("g/a/1.0/a-1.0.jar");

        statistics.record_resolved("releases", &jar);
        statistics.record_resolved("releases", &jar);
        statistics.record_resolved("snapshots", &jar);

        assert_eq!(statistics.count("releases", &jar), 2);
        assert_eq!(statistics.count("snapshots", &jar), 1);
        assert_eq!(statistics.total(), 3);
    }
}
