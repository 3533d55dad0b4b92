// Cluster endpoint shape detection

use once_cell::sync::Lazy;
use regex::Regex;

// Managed cluster DNS names follow `<cluster-id>.cluster-<hash>.<region>...`
// for the writer endpoint and `cluster-ro-` for the reader endpoint. Both
// resolve to a shifting underlying instance and must be re-identified before
// monitoring.
static WRITER_CLUSTER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z0-9-]+\.cluster-[a-z0-9]+\.[a-z0-9.-]+$").expect("valid pattern")
});

static READER_CLUSTER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z0-9-]+\.cluster-ro-[a-z0-9]+\.[a-z0-9.-]+$").expect("valid pattern")
});

/// Whether `host` is a cluster-level DNS name (writer or reader endpoint)
/// rather than a stable instance name.
pub fn is_cluster_endpoint(host: &str) -> bool {
    is_writer_cluster_endpoint(host) || is_reader_cluster_endpoint(host)
}

pub fn is_writer_cluster_endpoint(host: &str) -> bool {
    WRITER_CLUSTER_PATTERN.is_match(host)
}

pub fn is_reader_cluster_endpoint(host: &str) -> bool {
    READER_CLUSTER_PATTERN.is_match(host)
}
