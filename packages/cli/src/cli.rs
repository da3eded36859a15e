//! Command-line arguments

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// sslward - TLS certificate validation and self-signed provisioning
///
/// Settings come from the SSL_* environment variables; flags override them.
#[derive(Parser, Debug)]
#[command(name = "sslward", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print machine readable JSON instead of text
    #[arg(long, global = true, env = "SSLWARD_JSON")]
    pub json: bool,

    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Validate the configured certificate/key pair
    Validate,
    /// Generate a self-signed pair, store it, then validate it
    Generate,
    /// Validate, and generate a replacement when SSL_MODE allows
    Ensure,
    /// Print the parsed certificate as JSON
    Inspect {
        /// Certificate to inspect instead of the configured one
        cert: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ModeArg {
    Generate,
    Existing,
    None,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PolicyArg {
    Strict,
    Lenient,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum AlgorithmArg {
    Rsa,
    Ec,
}

/// Flags that take precedence over the matching environment variable
#[derive(clap::Args, Debug, Default, Clone)]
pub struct Overrides {
    /// SSL_MODE
    #[arg(long, global = true, value_enum)]
    pub mode: Option<ModeArg>,
    /// SSL_BASE_DIR
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,
    /// SSL_PATH
    #[arg(long, global = true)]
    pub ssl_path: Option<String>,
    /// SSL_CERT_PATH
    #[arg(long, global = true)]
    pub cert_path: Option<PathBuf>,
    /// SSL_KEY_PATH
    #[arg(long, global = true)]
    pub key_path: Option<PathBuf>,
    /// DOMAIN
    #[arg(short, long, global = true)]
    pub domain: Option<String>,
    /// ADDITIONAL_DOMAINS, comma separated
    #[arg(long, global = true)]
    pub additional_domains: Option<String>,
    /// SSL_WARN_DAYS
    #[arg(long, global = true)]
    pub warn_days: Option<u32>,
    /// SSL_CRITICAL_DAYS
    #[arg(long, global = true)]
    pub critical_days: Option<u32>,
    /// SSL_POLICY
    #[arg(long, global = true, value_enum)]
    pub policy: Option<PolicyArg>,
    /// SSL_KEY_ALGORITHM
    #[arg(long, global = true, value_enum)]
    pub algorithm: Option<AlgorithmArg>,
    /// SSL_RSA_BITS
    #[arg(long, global = true)]
    pub rsa_bits: Option<u32>,
    /// SSL_VALIDITY_DAYS
    #[arg(long, global = true)]
    pub validity_days: Option<u32>,
}

impl Overrides {
    /// Value for an environment variable name, if a flag set it
    pub fn lookup(&self, key: &str) -> Option<String> {
        let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string());
        match key {
            "SSL_MODE" => self.mode.map(|m| {
                match m {
                    ModeArg::Generate => "generate",
                    ModeArg::Existing => "existing",
                    ModeArg::None => "none",
                }
                .to_string()
            }),
            "SSL_BASE_DIR" => path(&self.base_dir),
            "SSL_PATH" => self.ssl_path.clone(),
            "SSL_CERT_PATH" => path(&self.cert_path),
            "SSL_KEY_PATH" => path(&self.key_path),
            "DOMAIN" => self.domain.clone(),
            "ADDITIONAL_DOMAINS" => self.additional_domains.clone(),
            "SSL_WARN_DAYS" => self.warn_days.map(|d| d.to_string()),
            "SSL_CRITICAL_DAYS" => self.critical_days.map(|d| d.to_string()),
            "SSL_POLICY" => self.policy.map(|p| {
                match p {
                    PolicyArg::Strict => "strict",
                    PolicyArg::Lenient => "lenient",
                }
                .to_string()
            }),
            "SSL_KEY_ALGORITHM" => self.algorithm.map(|a| {
                match a {
                    AlgorithmArg::Rsa => "rsa",
                    AlgorithmArg::Ec => "ec",
                }
                .to_string()
            }),
            "SSL_RSA_BITS" => self.rsa_bits.map(|b| b.to_string()),
            "SSL_VALIDITY_DAYS" => self.validity_days.map(|d| d.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_to_variable_names() {
        let cli = Cli::try_parse_from([
            "sslward",
            "ensure",
            "--domain",
            "example.com",
            "--mode",
            "existing",
            "--policy",
            "strict",
            "--warn-days",
            "45",
        ])
        .expect("parse");
        assert!(matches!(cli.command, Command::Ensure));
        assert_eq!(cli.overrides.lookup("DOMAIN").as_deref(), Some("example.com"));
        assert_eq!(cli.overrides.lookup("SSL_MODE").as_deref(), Some("existing"));
        assert_eq!(cli.overrides.lookup("SSL_POLICY").as_deref(), Some("strict"));
        assert_eq!(cli.overrides.lookup("SSL_WARN_DAYS").as_deref(), Some("45"));
        assert_eq!(cli.overrides.lookup("SSL_PATH"), None);
    }

    #[test]
    fn inspect_takes_optional_path() {
        let cli = Cli::try_parse_from(["sslward", "--json", "inspect", "/tmp/site.crt"]).expect("parse");
        assert!(cli.json);
        match cli.command {
            Command::Inspect { cert } => assert_eq!(cert, Some(PathBuf::from("/tmp/site.crt"))),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
