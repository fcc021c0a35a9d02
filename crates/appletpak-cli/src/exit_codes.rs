//! Process exit codes
//!
//! Signing failures use a distinct negative code so wrapper scripts can tell
//! an unsigned build apart from a broken one.

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Build error - missing manifest, malformed source file, processing failure
pub const BUILD_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Repository error - install or publish failed
pub const REPOSITORY_ERROR: i32 = 6;

/// Signing error - missing certificate or private key
pub const SIGNING_ERROR: i32 = -1;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
