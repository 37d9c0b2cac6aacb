//! Property-based tests for tree algebra and snapshots
