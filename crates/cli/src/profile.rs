//! `volmon profile`: show how a region resolves, secrets redacted.

use std::path::PathBuf;

use volmon_config::{load_profile, CatalogTarget, Profile};

use crate::exit_codes::EXIT_OUTPUT;
use crate::CliError;

pub fn cmd_profile(region: Option<String>, config: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    let profile = load_profile(region.as_deref(), config.as_deref()).map_err(CliError::config)?;

    if json {
        // Secret fields serialize as "***".
        let text = serde_json::to_string_pretty(&profile)
            .map_err(|e| CliError {
                code: EXIT_OUTPUT,
                message: format!("JSON serialization error: {e}"),
                hint: None,
            })?;
        println!("{text}");
    } else {
        print!("{}", render(&profile));
    }
    Ok(())
}

fn render(p: &Profile) -> String {
    let mut out = String::new();
    out.push_str(&format!("region:      {}\n", p.region));
    out.push_str(&format!("source:      {}\n", p.source.display()));
    out.push_str(&format!("url:         {}\n", p.api.url));
    out.push_str(&format!("apikey:      {}\n", p.api.api_key));
    out.push_str(&format!("secretkey:   {}\n", p.api.secret_key));
    out.push_str(&format!("catalog:     {}\n", p.catalog.describe()));
    if let CatalogTarget::MySql(t) = &p.catalog {
        out.push_str(&format!("db_password: {}\n", t.password));
    }
    let s = &p.settings;
    out.push_str(&format!("cooldown:    {} ms\n", s.cooldown_ms));
    out.push_str(&format!("timeout:     {} s, {} retries\n", s.timeout_secs, s.retries));
    out.push_str(&format!("smtp:        {}:{} from {}\n", s.smtp_host, s.smtp_port, s.mail_from));
    out
}
