/// Determines where a [`crate::Client`]'s feature flags come from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Source {
    /// Flags are fixed to the configured defaults; no fetch and no cache read happens.
    Local,
    /// Flags are fetched through the injected fetch function and cached in the
    /// configured storage medium.
    Remote,
}

/// Identifies the mechanism that produced the currently published flag snapshot.
///
/// Cache adoption counts as [`Provenance::Local`] even when the record was
/// originally fetched remotely; [`Provenance::Remote`] is set right after a
/// live fetch succeeds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// The snapshot was produced from the defaults or adopted from the cache.
    Local,
    /// The snapshot was produced by a live fetch.
    Remote,
}
