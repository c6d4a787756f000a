//! Shared test utilities for proxy-fixture
//!
//! This module provides common helpers for integration tests:
//! - Mock proxy servers driven by `/bin/sh` scripts
//! - Git repository inspection

pub mod git_fixtures;
pub mod mock_server;
