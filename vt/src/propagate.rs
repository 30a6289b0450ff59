//! Environment propagation
//!
//! The provider under test reads its connection settings from the process
//! environment, so the loaded configuration is copied there once, before any
//! test body runs.

use tracing::{debug, info};

use crate::config::TestConfig;
use crate::{ENV_ALLOW_UNVERIFIED_SSL, ENV_ORG, ENV_PASSWORD, ENV_TF_ACC, ENV_URL, ENV_USER};

/// A single environment variable the suite exports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvAssignment {
    pub name: &'static str,
    pub value: String,
}

impl EnvAssignment {
    fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }

    /// Whether the value must be masked when displayed
    pub fn is_secret(&self) -> bool {
        self.name == ENV_PASSWORD
    }
}

/// Variables `propagate` would set for this configuration, in setting order
pub fn propagation_plan(cfg: &TestConfig) -> Vec<EnvAssignment> {
    let provider = &cfg.provider;
    let mut plan = vec![
        EnvAssignment::new(ENV_USER, &provider.user),
        EnvAssignment::new(ENV_PASSWORD, &provider.password),
        EnvAssignment::new(ENV_URL, &provider.url),
        EnvAssignment::new(ENV_ORG, &provider.sys_org),
    ];

    // Only ever set: a configuration without allowInsecure does not clear a
    // value exported earlier in the same process.
    if provider.allow_insecure {
        plan.push(EnvAssignment::new(ENV_ALLOW_UNVERIFIED_SSL, "1"));
    }
    plan
}

/// Export the provider section into the process environment
///
/// Must run during single-threaded startup, before tests are spawned
/// (see `suite::run_cases`).
pub fn propagate(cfg: &TestConfig) {
    let plan = propagation_plan(cfg);
    debug!(count = plan.len(), "propagate: called");

    for assignment in &plan {
        set_env(assignment.name, &assignment.value);
    }
    info!(
        user = %cfg.provider.user,
        url = %cfg.provider.url,
        insecure = cfg.provider.allow_insecure,
        "Propagated provider settings to environment"
    );
}

/// Export TF_ACC=1 when the configuration enables acceptance tests
pub fn propagate_acceptance_flag(cfg: &TestConfig) {
    if cfg.provider.tf_acceptance_tests {
        debug!("propagate_acceptance_flag: enabling acceptance tests");
        set_env(ENV_TF_ACC, "1");
    }
}

fn set_env(name: &str, value: &str) {
    // SAFETY: suite::run_cases and the vt binary start the suite before any
    // test or child exists. A libtest test starting suite::shared lazily
    // must be #[serial] to keep other test threads out of the environment.
    unsafe {
        std::env::set_var(name, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn config(json: &str) -> TestConfig {
        TestConfig::from_json(json).unwrap()
    }

    fn clear(names: &[&str]) {
        // SAFETY: serialized test, no other thread reads the environment
        unsafe {
            for name in names {
                std::env::remove_var(name);
            }
        }
    }

    #[test]
    fn test_plan_without_insecure_flag() {
        let cfg = config(r#"{"provider":{"user":"u","password":"p","url":"https://x","sysOrg":"o"}}"#);
        let plan = propagation_plan(&cfg);

        let names: Vec<_> = plan.iter().map(|a| a.name).collect();
        assert_eq!(names, vec![ENV_USER, ENV_PASSWORD, ENV_URL, ENV_ORG]);
        assert_eq!(plan[2].value, "https://x");
    }

    #[test]
    fn test_plan_with_insecure_flag() {
        let cfg = config(r#"{"provider":{"allowInsecure":true}}"#);
        let plan = propagation_plan(&cfg);

        assert_eq!(plan.len(), 5);
        assert_eq!(plan[4], EnvAssignment::new(ENV_ALLOW_UNVERIFIED_SSL, "1"));
    }

    #[test]
    fn test_only_password_is_secret() {
        let cfg = config(r#"{"provider":{"password":"p"}}"#);
        let secrets: Vec<_> = propagation_plan(&cfg).into_iter().filter(|a| a.is_secret()).collect();
        assert_eq!(secrets.len(), 1);
        assert_eq!(secrets[0].name, ENV_PASSWORD);
    }

    #[test]
    #[serial]
    fn test_propagate_sets_variables() {
        clear(&[ENV_USER, ENV_PASSWORD, ENV_URL, ENV_ORG, ENV_ALLOW_UNVERIFIED_SSL]);
        let cfg = config(r#"{"provider":{"user":"u","password":"p","url":"https://x","sysOrg":"o"}}"#);

        propagate(&cfg);

        assert_eq!(std::env::var(ENV_USER).unwrap(), "u");
        assert_eq!(std::env::var(ENV_PASSWORD).unwrap(), "p");
        assert_eq!(std::env::var(ENV_URL).unwrap(), "https://x");
        assert_eq!(std::env::var(ENV_ORG).unwrap(), "o");
        assert!(std::env::var(ENV_ALLOW_UNVERIFIED_SSL).is_err());
    }

    #[test]
    #[serial]
    fn test_insecure_flag_is_never_cleared() {
        clear(&[ENV_ALLOW_UNVERIFIED_SSL]);

        propagate(&config(r#"{"provider":{"allowInsecure":true}}"#));
        assert_eq!(std::env::var(ENV_ALLOW_UNVERIFIED_SSL).unwrap(), "1");

        propagate(&config(r#"{"provider":{"allowInsecure":false}}"#));
        assert_eq!(std::env::var(ENV_ALLOW_UNVERIFIED_SSL).unwrap(), "1");

        clear(&[ENV_ALLOW_UNVERIFIED_SSL]);
    }

    #[test]
    #[serial]
    fn test_acceptance_flag() {
        clear(&[ENV_TF_ACC]);

        propagate_acceptance_flag(&config(r#"{"provider":{"tfAcceptanceTests":false}}"#));
        assert!(std::env::var(ENV_TF_ACC).is_err());

        propagate_acceptance_flag(&config(r#"{"provider":{"tfAcceptanceTests":true}}"#));
        assert_eq!(std::env::var(ENV_TF_ACC).unwrap(), "1");

        clear(&[ENV_TF_ACC]);
    }
}
