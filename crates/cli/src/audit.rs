//! `volmon audit`: reconcile catalog volumes against the platform.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use log::info;

use volmon_api_client::{ClientOptions, CloudStackClient};
use volmon_catalog::open_catalog;
use volmon_config::load_profile;
use volmon_recon::{
    CheckFailure, EntityFailure, EntitySummary, ReconConfig, ReconObserver, Reconciler,
    Reconciliation,
};

use crate::exit_codes::{audit_exit_code, EXIT_SUCCESS};
use crate::notify::{self, SmtpNotifier};
use crate::report;
use crate::util::{highlight_fail, stdout_supports_color};
use crate::CliError;

#[derive(Args, Debug)]
#[command(after_help = "\
Exit codes: 0 clean, 1 absent volumes found, 3 configuration error,
4 catalog unreachable, 5 incomplete audit, 6 notification failed,
7 report file not written.

Examples:
  volmon audit --region lab
  volmon audit --region prod --account-id 42
  volmon audit --region prod --send-email --email-to ops@example.com
  volmon audit --send_email True --email_to ops@example.com
  volmon audit --json --output audit.json --absent-csv absent.csv
  volmon audit --config ./profiles.toml --cooldown-ms 0 --absent-only")]
pub struct AuditArgs {
    /// Region profile to use (default: lab)
    #[arg(long)]
    pub region: Option<String>,

    /// Profile file (.toml, or a cloudmonkey INI config)
    #[arg(long, env = "VOLMON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Audit only this project account id
    #[arg(long, alias = "accountid")]
    pub account_id: Option<u64>,

    /// Email the absent-volume report when anything is absent. Accepts an
    /// optional true/false value, as in `--send_email True`.
    #[arg(
        long,
        alias = "send_email",
        value_name = "BOOL",
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        action = clap::ArgAction::Set,
        value_parser = clap::builder::BoolishValueParser::new(),
    )]
    pub send_email: bool,

    /// Recipient for --send-email
    #[arg(long, alias = "email_to", value_name = "ADDR")]
    pub email_to: Option<String>,

    /// Print the full reconciliation as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Write the full reconciliation as JSON to a file
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Write absent volumes as CSV (- for stdout)
    #[arg(long, value_name = "FILE")]
    pub absent_csv: Option<PathBuf>,

    /// Print only the absent-volume table
    #[arg(long)]
    pub absent_only: bool,

    /// Pause after each account, overriding the profile (0 disables)
    #[arg(long, value_name = "MS")]
    pub cooldown_ms: Option<u64>,

    /// Never color the progress lines
    #[arg(long)]
    pub no_color: bool,

    /// Suppress progress lines and tables
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

// ── Progress ────────────────────────────────────────────────────────

/// Prints one line per finished account, plus a warning on stderr for each
/// failed check or skipped account.
struct TerminalObserver {
    progress: Option<Box<dyn Write>>,
    warnings: bool,
    color: bool,
}

impl TerminalObserver {
    fn new(args: &AuditArgs) -> Self {
        let progress: Option<Box<dyn Write>> = if args.quiet {
            None
        } else if args.json {
            // stdout carries the JSON document
            Some(Box::new(std::io::stderr()))
        } else {
            Some(Box::new(std::io::stdout()))
        };
        let color = !args.no_color && !args.json && stdout_supports_color();
        Self { progress, warnings: !args.quiet, color }
    }

    fn warn(&self, text: String) {
        if self.warnings {
            eprintln!("warning: {}", text);
        }
    }
}

impl ReconObserver for TerminalObserver {
    fn check_failed(&mut self, failure: &CheckFailure) {
        let id = failure.external_id.as_deref().unwrap_or("-");
        self.warn(format!(
            "check failed for volume {} ({}): {}",
            failure.volume_id, id, failure.error
        ));
    }

    fn entity_skipped(&mut self, failure: &EntityFailure) {
        self.warn(format!(
            "skipped account {} ({}): {}",
            failure.entity_name, failure.entity_id, failure.error
        ));
    }

    fn entity_finished(&mut self, summary: &EntitySummary) {
        let text = report::absent_line(&summary.entity_name, summary.absent);
        let text = highlight_fail(&text, self.color && summary.absent > 0);
        if let Some(out) = self.progress.as_mut() {
            let _ = writeln!(out, "{}", text);
        }
    }
}

// ── Command ─────────────────────────────────────────────────────────

pub fn cmd_audit(args: AuditArgs) -> Result<(), CliError> {
    let email_to = match (args.send_email, args.email_to.as_deref()) {
        (true, Some(to)) if !to.trim().is_empty() => Some(to.trim().to_string()),
        (true, _) => return Err(CliError::usage("--send-email requires --email-to ADDR")),
        (false, _) => None,
    };

    let profile =
        load_profile(args.region.as_deref(), args.config.as_deref()).map_err(CliError::config)?;
    info!("region '{}' from {}", profile.region, profile.source.display());

    let cooldown_ms = args.cooldown_ms.unwrap_or(profile.settings.cooldown_ms);
    let config = ReconConfig::from_cooldown_ms(cooldown_ms);

    let client = CloudStackClient::new(&profile.api, ClientOptions::from_settings(&profile.settings))
        .map_err(CliError::client)?;
    let catalog = open_catalog(&profile.catalog).map_err(CliError::catalog)?;

    let human = !args.json && !args.quiet;
    if human {
        println!(
            "account id => {}",
            args.account_id.map(|id| id.to_string()).unwrap_or_else(|| "None".to_string())
        );
        println!("send email? => {}", email_to.is_some());
    }

    let mut observer = TerminalObserver::new(&args);
    let mut reconciler = Reconciler::new(&config, catalog, &client);
    let recon = reconciler
        .run(args.account_id, &mut observer)
        .map_err(CliError::recon)?;

    if recon.summary.entities.is_empty() && recon.summary.skipped_entities == 0 && !args.quiet {
        match args.account_id {
            Some(id) => eprintln!("warning: no project account with id {}", id),
            None => eprintln!("warning: catalog lists no project accounts"),
        }
    }

    // Tables / JSON
    let json = report::to_json(&recon)?;
    if args.json {
        println!("{json}");
    } else if !args.quiet {
        if !args.absent_only {
            print!("{}", report::render_table(&recon.all_rows));
        }
        print!("{}", report::render_table(&recon.absent_rows));
    }
    if !args.quiet {
        eprintln!("{}", report::totals_text(&recon));
    }

    // Notify before writing report files.
    let mut notify_failed = false;
    if let Some(to) = email_to.as_deref() {
        notify_failed = !send_notification(&profile.region, &profile.settings, to, &recon, args.quiet);
    }

    if let Some(ref path) = args.output {
        report::write_json(path, &json)?;
        if !args.quiet {
            eprintln!("wrote {}", path.display());
        }
    }
    if let Some(ref path) = args.absent_csv {
        report::write_absent_csv(path, &recon.absent_rows)?;
        if !args.quiet && path.as_os_str() != "-" {
            eprintln!("wrote {}", path.display());
        }
    }

    finish(&recon, notify_failed)
}

/// Returns false when the relay could not take the message.
fn send_notification(
    region: &str,
    settings: &volmon_config::RunSettings,
    to: &str,
    recon: &Reconciliation,
    quiet: bool,
) -> bool {
    let absent = recon.summary.total_absent;
    if absent == 0 {
        info!("nothing absent, no notification");
        return true;
    }

    let notifier = SmtpNotifier::from_settings(settings);
    let subject = notify::subject(region, absent);
    match notifier.send(to, &subject, &report::email_body(region, recon)) {
        Ok(()) => {
            if !quiet {
                eprintln!("notified {}", to);
            }
            true
        }
        Err(e) => {
            eprintln!("error: notification to {} failed: {}", to, e);
            false
        }
    }
}

fn finish(recon: &Reconciliation, notify_failed: bool) -> Result<(), CliError> {
    let s = &recon.summary;
    let code = audit_exit_code(s, notify_failed);
    if code == EXIT_SUCCESS {
        return Ok(());
    }

    let message = if notify_failed {
        format!("{} absent volume(s) found; notification failed", s.total_absent)
    } else if s.total_absent > 0 {
        format!("{} absent volume(s) found", s.total_absent)
    } else {
        format!(
            "audit incomplete: {} check(s) failed, {} account(s) skipped",
            s.total_failed_checks, s.skipped_entities
        )
    };

    let hint = if notify_failed {
        Some("check smtp_host / smtp_port in the profile settings".to_string())
    } else if s.total_absent == 0 && s.total_examined == 0 && s.total_failed_checks > 0 {
        Some("every check failed; verify url, apikey and secretkey with `volmon profile`".to_string())
    } else {
        None
    };

    Err(CliError { code, message, hint })
}
