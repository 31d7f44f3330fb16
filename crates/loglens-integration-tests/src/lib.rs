//! End-to-end integration tests for LogLens
//!
//! The tests under `tests/` wire the Graylog client, the refresh
//! orchestrator and the search page against a mocked REST API.
