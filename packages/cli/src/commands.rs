//! Subcommand execution and output rendering

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use sslward::engine::certificate::parse_certificate_pem;
use sslward::engine::{
    CertificateSource, CertificateStore, IssueSeverity, SslSettings, ValidationResult,
};
use sslward::{EXIT_INVALID, EXIT_OK, ProvisionError, ProvisionReport, Provisioner};

use crate::cli::{Cli, Command};

/// Run the parsed command line and return the process exit code
pub fn run(cli: &Cli) -> Result<i32> {
    let settings = SslSettings::from_lookup(|key| {
        cli.overrides
            .lookup(key)
            .or_else(|| std::env::var(key).ok())
    });
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return Ok(EXIT_INVALID);
        }
    };

    match &cli.command {
        Command::Inspect { cert } => inspect(&settings, cert.clone()),
        Command::Validate => {
            let provisioner = Provisioner::new(settings);
            match provisioner.validate() {
                Ok(result) => {
                    print_result(&result, cli.json)?;
                    Ok(result.exit_code())
                }
                Err(e) => Ok(report_error(&e)),
            }
        }
        Command::Generate => {
            let mut provisioner = Provisioner::new(settings);
            finish(provisioner.generate(), cli.json)
        }
        Command::Ensure => {
            let mut provisioner = Provisioner::new(settings);
            finish(provisioner.ensure(), cli.json)
        }
    }
}

fn finish(outcome: std::result::Result<ProvisionReport, ProvisionError>, json: bool) -> Result<i32> {
    match outcome {
        Ok(report) => {
            print_report(&report, json)?;
            Ok(report.exit_code())
        }
        Err(e) => Ok(report_error(&e)),
    }
}

fn report_error(error: &ProvisionError) -> i32 {
    match error {
        ProvisionError::Config(_) => eprintln!("configuration error: {error}"),
        ProvisionError::Generation(_) => eprintln!("{error}"),
    }
    error.exit_code()
}

fn inspect(settings: &SslSettings, cert: Option<PathBuf>) -> Result<i32> {
    let path = cert.unwrap_or_else(|| settings.paths().cert);
    let Some(bytes) = CertificateStore::new()
        .read(&path)
        .with_context(|| format!("reading {}", path.display()))?
    else {
        eprintln!("no certificate at {}", path.display());
        return Ok(EXIT_INVALID);
    };
    let record = parse_certificate_pem(&bytes, CertificateSource::Unknown)
        .with_context(|| format!("parsing {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(EXIT_OK)
}

fn print_report(report: &ProvisionReport, json: bool) -> Result<()> {
    if json {
        return print_json(report);
    }
    match &report.result {
        Some(result) => print_text(result),
        None => println!("TLS disabled (SSL_MODE=none)"),
    }
    println!(
        "action: {:?}, reload {}",
        report.action,
        if report.reload_due() { "due" } else { "not needed" }
    );
    Ok(())
}

fn print_result(result: &ValidationResult, json: bool) -> Result<()> {
    if json {
        print_json(result)
    } else {
        print_text(result);
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_text(result: &ValidationResult) {
    println!("status: {}", result.status);
    if let Some(cert) = &result.certificate {
        println!("  names: {}", cert.san_entries.join(", "));
        println!("  valid: {} .. {}", cert.not_before, cert.not_after);
        println!("  key:   {} {}", cert.key_algorithm, cert.fingerprint);
    }
    if let Some(expiry) = &result.expiry {
        println!("  days remaining: {}", expiry.remaining_days());
    }
    for issue in &result.issues {
        let marker = match issue.severity {
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
            IssueSeverity::Info => "info",
        };
        println!("  - [{marker}] {}: {}", issue.status, issue.message);
        if let Some(suggestion) = &issue.suggestion {
            println!("      hint: {suggestion}");
        }
    }
}
