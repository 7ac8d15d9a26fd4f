//! Values the node reports about itself. The supervisor forwards them as-is.

/// Sync / connectivity snapshot reported by the node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeStatus {
    pub connected_peers: u64,
    pub is_synced: bool,
    pub synced_layer: u64,
    pub top_layer: u64,
    pub verified_layer: u64,
}

/// Software version of the node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: String,
    pub build: String,
}
