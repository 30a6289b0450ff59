//! vt - acceptance suite bootstrap
//!
//! Loads the suite configuration, exports it for the provider, renders
//! templates into `test-artifacts/` and wraps test runs.

use std::fs;
use std::path::Path;

use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use tracing::{debug, info};

use vcdtest::cli::{Cli, Command};
use vcdtest::config::ConfigLoader;
use vcdtest::propagate::propagation_plan;
use vcdtest::suite::start_or_halt;
use vcdtest::{CallStack, ENV_TF_ACC, Suite, SuiteSwitches, TemplateData, call_stack};

/// Exit code of `vt render` when the template does not render
const RENDER_FAILED_EXIT: i32 = 2;

fn setup_logging(cli_log_level: Option<&str>) -> Result<()> {
    let level = match cli_log_level.map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to WARN", other);
            tracing::Level::WARN
        }
        None => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre!("Failed to install subscriber: {}", e))?;

    debug!("Logging initialized (level: {:?})", level);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.log_level.as_deref()).context("Failed to setup logging")?;

    let mut switches = SuiteSwitches::from_env();
    if let Some(path) = cli.config {
        switches.config_path = Some(path);
    }
    let loader = ConfigLoader::new(std::env::current_dir().context("Failed to determine working directory")?);

    info!("vt starting");

    match cli.command {
        Command::Check => cmd_check(switches, &loader),
        Command::Env { reveal } => cmd_env(&switches, &loader, reveal),
        Command::Render { template, data, name } => cmd_render(&switches, &template, data, name),
        Command::Run { command } => cmd_run(switches, &loader, &command),
    }
}

fn cmd_check(switches: SuiteSwitches, loader: &ConfigLoader) -> Result<()> {
    let suite = start_or_halt(switches, loader);

    let Some(config) = suite.config() else {
        println!("{} Short test mode, configuration not loaded", "✓".green());
        return Ok(());
    };

    println!("{} Configuration loaded", "✓".green());
    println!("  User: {}", config.provider.user.cyan());
    println!("  URL: {}", config.provider.url.cyan());
    println!("  System org: {}", config.provider.sys_org);
    println!("  Org/VDC: {}/{}", config.vcd.org, config.vcd.vdc);
    if let Some(catalog) = &config.vcd.catalog.name {
        println!("  Catalog: {}", catalog);
    }
    if config.provider.allow_insecure {
        println!("  {}", "TLS verification disabled".yellow());
    }
    if !suite.switches().skip_template_writing {
        println!("  Artifacts: {}", suite.renderer().writer().dir().display());
    }
    Ok(())
}

fn cmd_env(switches: &SuiteSwitches, loader: &ConfigLoader, reveal: bool) -> Result<()> {
    let config = loader
        .load(switches.config_path.as_deref())
        .context("Failed to load configuration")?;

    if config.provider.tf_acceptance_tests {
        println!("export {}={}", ENV_TF_ACC, shell_quote("1"));
    }
    for assignment in propagation_plan(&config) {
        let value = if assignment.is_secret() && !reveal {
            "********".to_string()
        } else {
            assignment.value
        };
        println!("export {}={}", assignment.name, shell_quote(&value));
    }
    Ok(())
}

fn cmd_render(switches: &SuiteSwitches, template: &Path, data: Vec<(String, String)>, name: Option<String>) -> Result<()> {
    let source = fs::read_to_string(template).context(format!("Failed to read template {}", template.display()))?;

    let name = match name {
        Some(name) => name,
        None => template
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| eyre!("Cannot derive artifact name from {}", template.display()))?,
    };
    let data: TemplateData = data.into_iter().collect();
    let data = data.with_func_name(name);

    // An artifact that cannot be written halts with status 1
    let suite = Suite::unconfigured(switches.clone());
    let stack: CallStack = call_stack!();
    let text = suite.render(&stack, &source, &data);

    if text.is_empty() {
        eprintln!("{} Template {} did not render", "✗".red(), template.display());
        std::process::exit(RENDER_FAILED_EXIT);
    }
    print!("{}", text);
    Ok(())
}

fn cmd_run(switches: SuiteSwitches, loader: &ConfigLoader, command: &[String]) -> Result<()> {
    let (program, args) = command.split_first().ok_or_else(|| eyre!("No command given"))?;
    let suite = start_or_halt(switches, loader);

    let code = suite
        .run_command(program, args)
        .context(format!("Failed to run {}", program))?;

    info!("{} exited with {}", program, code);
    std::process::exit(code)
}

/// Single-quote a value for POSIX shells
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
