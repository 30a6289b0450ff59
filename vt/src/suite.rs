//! Suite startup
//!
//! [`Suite::start`] is the one place where configuration is loaded and
//! propagated. [`run_cases`] runs it to completion before the first test
//! body, and the resulting [`Suite`] is never mutated afterwards.
//!
//! Acceptance targets are declared with `harness = false` and hand their
//! cases to [`run_cases`] from `main`:
//!
//! ```ignore
//! fn main() {
//!     vcdtest::suite::run_cases(vcdtest::config_loader!(), &[("test_acc_org", test_acc_org)])
//! }
//! ```

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::process::Command;
use std::sync::{Arc, OnceLock};

use tracing::{debug, error, info};

use crate::artifact::ArtifactWriter;
use crate::caller::CallStack;
use crate::config::{ConfigError, ConfigLoader, TestConfig};
use crate::template::{TemplateData, TemplateRenderer};
use crate::{ARTIFACT_DIR, ENV_CONFIG, ENV_SHORT_TEST, ENV_SKIP_TEMPLATE_WRITING};

/// Environment switches read once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteSwitches {
    /// Configuration file replacing the default one (VCD_CONFIG)
    pub config_path: Option<PathBuf>,
    /// Skip configuration loading entirely (VCD_SHORT_TEST)
    pub short_test: bool,
    /// Render templates without writing artifacts (VCD_SKIP_TEMPLATE_WRITING)
    pub skip_template_writing: bool,
}

impl SuiteSwitches {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build switches from an arbitrary variable lookup; set-but-empty counts as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.is_empty());
        Self {
            config_path: non_empty(ENV_CONFIG).map(PathBuf::from),
            short_test: non_empty(ENV_SHORT_TEST).is_some(),
            skip_template_writing: non_empty(ENV_SKIP_TEMPLATE_WRITING).is_some(),
        }
    }

    pub fn artifact_writer(&self) -> ArtifactWriter {
        ArtifactWriter::new(ARTIFACT_DIR, !self.skip_template_writing)
    }
}

/// Loaded configuration plus the renderer every test shares
#[derive(Debug)]
pub struct Suite {
    config: Option<Arc<TestConfig>>,
    renderer: TemplateRenderer,
    switches: SuiteSwitches,
}

impl Suite {
    /// Load and propagate the configuration, unless running short tests
    pub fn start(switches: SuiteSwitches, loader: &ConfigLoader) -> Result<Self, ConfigError> {
        debug!(?switches, "Suite::start: called");

        let config = if switches.short_test {
            info!("Short test mode, skipping configuration");
            None
        } else {
            let config = loader.load(switches.config_path.as_deref())?;
            crate::propagate::propagate(&config);
            Some(Arc::new(config))
        };

        let renderer = TemplateRenderer::new(switches.artifact_writer());
        Ok(Self {
            config,
            renderer,
            switches,
        })
    }

    /// Suite without configuration, for rendering only
    pub fn unconfigured(switches: SuiteSwitches) -> Self {
        Self {
            config: None,
            renderer: TemplateRenderer::new(switches.artifact_writer()),
            switches,
        }
    }

    /// Suite with an already loaded configuration; nothing is propagated
    pub fn with_config(config: TestConfig, renderer: TemplateRenderer) -> Self {
        Self {
            config: Some(Arc::new(config)),
            renderer,
            switches: SuiteSwitches::default(),
        }
    }

    /// The configuration, absent in short test mode
    pub fn config(&self) -> Option<&TestConfig> {
        self.config.as_deref()
    }

    pub fn shared_config(&self) -> Option<Arc<TestConfig>> {
        self.config.clone()
    }

    pub fn switches(&self) -> &SuiteSwitches {
        &self.switches
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    /// Render like [`TemplateRenderer::render`], halting the process when the
    /// artifact cannot be written
    pub fn render(&self, stack: &CallStack, template: &str, data: &TemplateData) -> String {
        match self.renderer.render(stack, template, data) {
            Ok(text) => text,
            Err(e) => halt(&e),
        }
    }

    /// Run the test command with the propagated environment and return its exit code
    pub fn run_command(&self, program: &str, args: &[String]) -> std::io::Result<i32> {
        info!("Running: {} {}", program, args.join(" "));
        let status = Command::new(program).args(args).status()?;
        let code = status.code().unwrap_or(1);
        debug!(code, "Suite::run_command: finished");
        Ok(code)
    }
}

/// A named acceptance test body
pub type TestCase = (&'static str, fn(&Suite));

/// Exit status of a run with failed cases, as libtest reports it
const CASES_FAILED_EXIT: i32 = 101;

static SHARED: OnceLock<Suite> = OnceLock::new();

/// Start the suite or halt the process
pub fn start_or_halt(switches: SuiteSwitches, loader: &ConfigLoader) -> Suite {
    match Suite::start(switches, loader) {
        Ok(suite) => suite,
        Err(e) => halt(&e),
    }
}

/// Process-wide suite, started on first use from the environment switches
///
/// A configuration error halts the process: no test can produce a
/// meaningful result without it. Under [`run_cases`] the suite already
/// exists when a case calls this. From a libtest `#[test]` the first call
/// starts it, so every test reading the environment must call `shared`
/// before anything else, and environment writes then race with other test
/// threads.
pub fn shared(loader: ConfigLoader) -> &'static Suite {
    SHARED.get_or_init(|| start_or_halt(SuiteSwitches::from_env(), &loader))
}

/// Start the shared suite, then run `cases` one after another and exit
///
/// Startup (loading, propagation, or halting on a broken configuration)
/// completes before the first case runs. Command-line arguments not starting
/// with `-` filter cases by substring. Exits 0 when every case passes.
pub fn run_cases(loader: ConfigLoader, cases: &[TestCase]) -> ! {
    let suite = shared(loader);

    let filters: Vec<String> = std::env::args().skip(1).filter(|a| !a.starts_with('-')).collect();
    let selected: Vec<&TestCase> = cases
        .iter()
        .filter(|(name, _)| filters.is_empty() || filters.iter().any(|f| name.contains(f.as_str())))
        .collect();
    debug!(total = cases.len(), selected = selected.len(), "run_cases: called");

    println!("\nrunning {} tests", selected.len());
    let mut failed = Vec::new();
    for (name, case) in &selected {
        match std::panic::catch_unwind(AssertUnwindSafe(|| case(suite))) {
            Ok(()) => println!("test {} ... ok", name),
            Err(_) => {
                println!("test {} ... FAILED", name);
                failed.push(*name);
            }
        }
    }

    let passed = selected.len() - failed.len();
    if failed.is_empty() {
        println!("\ntest result: ok. {} passed; 0 failed\n", passed);
        std::process::exit(0)
    }

    println!("\nfailures:");
    for name in &failed {
        println!("    {}", name);
    }
    println!("\ntest result: FAILED. {} passed; {} failed\n", passed, failed.len());
    std::process::exit(CASES_FAILED_EXIT)
}

/// Log a fatal error and exit with status 1
pub fn halt(err: &dyn std::error::Error) -> ! {
    error!("Fatal: {}", err);
    eprintln!("vcdtest: {}", err);
    std::process::exit(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CONFIG_FILE_NAME, ENV_ORG, ENV_USER};
    use serial_test::serial;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_switches_default_off() {
        let switches = SuiteSwitches::from_lookup(lookup(&[]));
        assert_eq!(switches, SuiteSwitches::default());
        assert!(switches.artifact_writer().is_enabled());
    }

    #[test]
    fn test_switches_from_lookup() {
        let switches = SuiteSwitches::from_lookup(lookup(&[
            (ENV_CONFIG, "/tmp/cfg.json"),
            (ENV_SHORT_TEST, "1"),
            (ENV_SKIP_TEMPLATE_WRITING, "yes"),
        ]));

        assert_eq!(switches.config_path, Some(PathBuf::from("/tmp/cfg.json")));
        assert!(switches.short_test);
        assert!(switches.skip_template_writing);
        assert!(!switches.artifact_writer().is_enabled());
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        let switches = SuiteSwitches::from_lookup(lookup(&[(ENV_CONFIG, ""), (ENV_SHORT_TEST, "")]));
        assert!(switches.config_path.is_none());
        assert!(!switches.short_test);
    }

    #[test]
    fn test_short_test_skips_loading() {
        let temp_dir = TempDir::new().unwrap();
        let switches = SuiteSwitches {
            short_test: true,
            ..Default::default()
        };

        // No config file exists, yet startup succeeds
        let suite = Suite::start(switches, &ConfigLoader::new(temp_dir.path())).unwrap();
        assert!(suite.config().is_none());
    }

    #[test]
    fn test_start_fails_without_config() {
        let temp_dir = TempDir::new().unwrap();
        let result = Suite::start(SuiteSwitches::default(), &ConfigLoader::new(temp_dir.path()));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    #[serial]
    fn test_start_loads_and_propagates() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(CONFIG_FILE_NAME),
            r#"{"provider":{"user":"suite-user","sysOrg":"suite-org"},"vcd":{"org":"o1"}}"#,
        )
        .unwrap();

        let suite = Suite::start(SuiteSwitches::default(), &ConfigLoader::new(temp_dir.path())).unwrap();

        assert_eq!(suite.config().unwrap().vcd.org, "o1");
        assert_eq!(std::env::var(ENV_USER).unwrap(), "suite-user");
        assert_eq!(std::env::var(ENV_ORG).unwrap(), "suite-org");
    }

    #[test]
    fn test_shared_config_is_the_same_value() {
        let suite = Suite::with_config(TestConfig::default(), TemplateRenderer::new(ArtifactWriter::disabled()));
        let a = suite.shared_config().unwrap();
        let b = suite.shared_config().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_unconfigured_suite_honours_write_switch() {
        let switches = SuiteSwitches {
            skip_template_writing: true,
            ..Default::default()
        };
        let suite = Suite::unconfigured(switches);

        assert!(suite.config().is_none());
        assert!(!suite.renderer().writer().is_enabled());
        let text = suite.render(&CallStack::root("suite::tests::case"), "org = {{.Org}}", &TemplateData::new().with("Org", "o"));
        assert_eq!(text, "org = o");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_command_returns_exit_code() {
        let suite = Suite::with_config(TestConfig::default(), TemplateRenderer::new(ArtifactWriter::disabled()));
        let code = suite.run_command("sh", &["-c".to_string(), "exit 3".to_string()]).unwrap();
        assert_eq!(code, 3);
    }
}
