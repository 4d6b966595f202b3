//! `validate` command implementation.
//!
//! Runs the strict write-path validation over a config file: every route must
//! have at least one well-formed, duplicate-free target. The running router
//! is more lenient at load time and only drops what it cannot use; the
//! warnings here list exactly what it would drop.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use config_loader::{ConfigLoader, RawDocument};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    route_count: usize,
    target_count: usize,
    credentials_configured: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    let document = match ConfigLoader::load_document(&args.config) {
        Ok(document) => document,
        Err(e) => return invalid(config_path, e.to_string()),
    };
    if let Err(e) = ConfigLoader::validate(&document) {
        return invalid(config_path, e.to_string());
    }

    let (routes, credentials) = ConfigLoader::apply(&document);
    let warnings = collect_warnings(&document, routes.len(), credentials.is_configured());

    ValidationResult {
        valid: true,
        config_path,
        error: None,
        warnings: if warnings.is_empty() {
            None
        } else {
            Some(warnings)
        },
        summary: Some(ConfigSummary {
            route_count: routes.len(),
            target_count: routes.target_count(),
            credentials_configured: credentials.is_configured(),
        }),
    }
}

fn invalid(config_path: String, error: String) -> ValidationResult {
    ValidationResult {
        valid: false,
        config_path,
        error: Some(error),
        warnings: None,
        summary: None,
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(document: &RawDocument, route_count: usize, configured: bool) -> Vec<String> {
    let mut warnings = Vec::new();

    if !configured {
        warnings.push("Credentials are not set - the listener will stay stopped".to_string());
    }
    if route_count == 0 {
        warnings.push("No routes configured - every event will be reported as unrouted".to_string());
    }
    if document.routes.len() > route_count {
        warnings.push(format!(
            "{} route(s) have no usable target and will be ignored",
            document.routes.len() - route_count
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Routes: {}", summary.route_count);
            println!("  Targets: {}", summary.target_count);
            println!("  Credentials set: {}", summary.credentials_configured);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
