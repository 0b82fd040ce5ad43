//! Crate-wide constants.

/// Name of the build script executed for every project directory.
pub const BUILD_SCRIPT: &str = "build.loom.lua";

/// Default settings file, looked up in the invocation directory.
pub const SETTINGS_FILE: &str = ".loom-settings.toml";

/// Default name of the exported build file inside the root build directory.
pub const DEFAULT_BUILD_FILE: &str = "build.ninja";

/// Default root build directory, relative to the root project.
pub const DEFAULT_BUILD_DIR: &str = "build";

/// Minimum ninja version the exported file relies on (pools, implicit deps).
pub const NINJA_REQUIRED_VERSION: &str = "1.5";

/// Setting that overrides the root build directory.
pub const OPT_BUILD_DIRECTORY: &str = "loom.build_directory";

/// Setting that selects the platform the exported commands run on.
pub const OPT_PLATFORM: &str = "loom.platform";

/// Setting that overrides the exported build file name.
pub const OPT_BUILD_FILE: &str = "loom.build_file";
