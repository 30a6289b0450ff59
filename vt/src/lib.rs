//! vcdtest - bootstrap and support layer for the vCD provider acceptance suite
//!
//! Loads the suite's JSON test configuration once, projects the provider
//! credentials into the process environment for the code under test, and
//! renders Terraform directives from templates while keeping a copy of every
//! rendered directive on disk for troubleshooting.
//!
//! # Layout
//!
//! ```text
//! <crate>/tests/vcd_test_config.json   # default config (override: VCD_CONFIG)
//! test-artifacts/                      # relative to the working directory
//! ├── org_tests.test_acc_org
//! └── custom_case                      # named via the FuncName override
//! ```
//!
//! # Example
//!
//! ```ignore
//! // tests/acceptance.rs, declared with `harness = false`
//! use vcdtest::{Suite, TemplateData, call_stack, config_loader, suite};
//!
//! fn test_acc_org(suite: &Suite) {
//!     let data = TemplateData::new().with("Org", "myorg");
//!     let hcl = suite.render(&call_stack!(), "org = {{.Org}}", &data);
//!     assert_eq!(hcl, "org = myorg");
//! }
//!
//! fn main() {
//!     suite::run_cases(config_loader!(), &[("test_acc_org", test_acc_org)])
//! }
//! ```

pub mod artifact;
pub mod caller;
pub mod cli;
pub mod config;
pub mod propagate;
pub mod suite;
pub mod template;

pub use artifact::{ArtifactError, ArtifactWriter};
pub use caller::{CallStack, short_name};
pub use config::{ConfigError, ConfigLoader, ConfigSource, TestConfig};
pub use propagate::{EnvAssignment, propagate, propagate_acceptance_flag, propagation_plan};
pub use suite::{Suite, SuiteSwitches, TestCase};
pub use template::{TemplateData, TemplateRenderer};

/// Name of the configuration file looked up next to the test sources
pub const CONFIG_FILE_NAME: &str = "vcd_test_config.json";

/// Directory receiving rendered templates, relative to the working directory
pub const ARTIFACT_DIR: &str = "test-artifacts";

/// Reserved template data key overriding the artifact name
pub const FUNC_NAME_KEY: &str = "FuncName";

// Consumed environment variables

/// Path of a configuration file replacing the default one
pub const ENV_CONFIG: &str = "VCD_CONFIG";

/// Skip configuration loading entirely (short tests)
pub const ENV_SHORT_TEST: &str = "VCD_SHORT_TEST";

/// Disable artifact writing
pub const ENV_SKIP_TEMPLATE_WRITING: &str = "VCD_SKIP_TEMPLATE_WRITING";

// Produced environment variables

/// Enables Terraform acceptance tests
pub const ENV_TF_ACC: &str = "TF_ACC";
pub const ENV_USER: &str = "VCD_USER";
pub const ENV_PASSWORD: &str = "VCD_PASSWORD";
pub const ENV_URL: &str = "VCD_URL";
pub const ENV_ORG: &str = "VCD_ORG";

/// Set-only: never cleared once a configuration enabled it
pub const ENV_ALLOW_UNVERIFIED_SSL: &str = "VCD_ALLOW_UNVERIFIED_SSL";
