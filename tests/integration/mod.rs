//! Integration tests for keytree

mod auto_update;
mod config_integration;
mod mapping_binding;
mod node_model;
mod snapshot_diff;
mod store_integration;
mod test_utils;
