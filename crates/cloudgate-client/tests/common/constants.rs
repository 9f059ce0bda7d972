//! Shared test constants

pub const TEST_TOKEN: &str = "test-token-123";
pub const TEST_USER_AGENT: &str = "cloudgate-tests/1.0";

pub const INSTANCES_PATH: &str = "/linode/instances";
pub const VOLUMES_PATH: &str = "/volumes";
