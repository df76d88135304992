//! CLI Exit Code Registry
//!
//! Single source of truth for `comps` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | `compare`: the two addresses do not match            |
//! | 2    | Usage error (bad arguments, unknown output format)   |
//! | 3    | IO error (unreadable input, pdftotext, write failed) |
//! | 4    | Parse error (config TOML, invalid pattern, prior CSV)|
//! | 6    | `run --strict`: some appraisals matched no listing   |

use comparables_recon::ReconError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Addresses differ. Like `diff(1)`, exit 1 means "no match", not failure.
pub const EXIT_NO_MATCH: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Input could not be read or output could not be written.
pub const EXIT_IO: u8 = 3;

/// Config or auxiliary input could not be parsed.
pub const EXIT_PARSE: u8 = 4;

/// Unmatched appraisals present and `--strict` was given.
pub const EXIT_UNMATCHED: u8 = 6;

/// Map an engine error to its exit code. Every engine error is a config
/// problem.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_)
        | ReconError::ConfigValidation(_)
        | ReconError::InvalidPattern { .. } => EXIT_PARSE,
    }
}
