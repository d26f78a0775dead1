//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: cron jobs and wrappers branch
//! on them.
//!
//! | Code | Meaning                                                        |
//! |------|----------------------------------------------------------------|
//! | 0    | Audit clean: nothing absent, every check answered              |
//! | 1    | Absent volumes found                                           |
//! | 2    | CLI usage error (bad args, `--send-email` without recipient)   |
//! | 3    | Configuration error (region, profile option, API URL)          |
//! | 4    | Catalog unreachable while discovering accounts                 |
//! | 5    | Incomplete audit: checks failed or accounts skipped            |
//! | 6    | Notification could not be delivered                            |
//! | 7    | Report file could not be written                               |
//!
//! When several outcomes apply, 6 wins over 1, and 1 wins over 5.
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use volmon_recon::RunSummary;

/// Success - audit clean.
pub const EXIT_SUCCESS: u8 = 0;

/// At least one catalog volume is unknown to the platform.
/// Like `diff(1)`, exit 1 means "sources differ."
pub const EXIT_ABSENT: u8 = 1;

/// Usage error - bad arguments, missing required options.
/// clap uses the same code for its own parse errors.
pub const EXIT_USAGE: u8 = 2;

/// Missing region, missing profile option, unparsable config file.
pub const EXIT_CONFIG: u8 = 3;

/// The catalog could not be queried for the account list. Nothing was
/// reconciled.
pub const EXIT_CATALOG: u8 = 4;

/// Some checks failed or some accounts were skipped, and nothing absent was
/// found among what was checked.
pub const EXIT_INCOMPLETE: u8 = 5;

/// Absent volumes were found but the notification email failed.
pub const EXIT_NOTIFY: u8 = 6;

/// `--output` or `--absent-csv` could not be written.
pub const EXIT_OUTPUT: u8 = 7;

/// Exit code for a finished audit.
pub fn audit_exit_code(summary: &RunSummary, notify_failed: bool) -> u8 {
    if notify_failed {
        EXIT_NOTIFY
    } else if summary.total_absent > 0 {
        EXIT_ABSENT
    } else if !summary.is_complete() {
        EXIT_INCOMPLETE
    } else {
        EXIT_SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(absent: usize, failed: usize, skipped: usize) -> RunSummary {
        RunSummary {
            total_absent: absent,
            total_failed_checks: failed,
            skipped_entities: skipped,
            ..RunSummary::default()
        }
    }

    #[test]
    fn clean_run() {
        assert_eq!(audit_exit_code(&summary(0, 0, 0), false), EXIT_SUCCESS);
    }

    #[test]
    fn absent_outranks_incomplete() {
        assert_eq!(audit_exit_code(&summary(2, 1, 1), false), EXIT_ABSENT);
        assert_eq!(audit_exit_code(&summary(0, 1, 0), false), EXIT_INCOMPLETE);
        assert_eq!(audit_exit_code(&summary(0, 0, 1), false), EXIT_INCOMPLETE);
    }

    #[test]
    fn notify_failure_outranks_everything() {
        assert_eq!(audit_exit_code(&summary(3, 1, 0), true), EXIT_NOTIFY);
    }

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS, EXIT_ABSENT, EXIT_USAGE, EXIT_CONFIG,
            EXIT_CATALOG, EXIT_INCOMPLETE, EXIT_NOTIFY, EXIT_OUTPUT,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }
}
