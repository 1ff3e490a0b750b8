//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Validation error - the request would be rejected
pub const VALIDATION_ERROR: i32 = 2;

/// Template error - rendering a step or layer fragment failed
pub const TEMPLATE_ERROR: i32 = 3;

/// Spec error - application spec missing, unparsable or incomplete
pub const SPEC_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
