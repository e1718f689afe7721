//! Build metadata embedded by the build script.

/// Short git commit hash, or `unknown` outside a checkout.
pub const GIT_HASH: &str = env!("REBOOTMGR_GIT_HASH");

/// The build profile (`debug` or `release`).
pub const BUILD_PROFILE: &str = env!("REBOOTMGR_BUILD_PROFILE");

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version with git hash and profile, e.g. `"0.1.0 (abc1234, debug)"`.
pub fn version_string() -> String {
    format!("{VERSION} ({GIT_HASH}, {BUILD_PROFILE})")
}
