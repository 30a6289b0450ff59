//! Acceptance harness for vcdtest
//!
//! Runs without libtest: `main` starts the shared suite, which loads and
//! propagates `vcd_test_config.json` (or `VCD_CONFIG`), before the first case
//! runs. A broken configuration stops the binary before any case.

use std::fs;

use vcdtest::{
    ARTIFACT_DIR, ENV_ORG, ENV_TF_ACC, ENV_URL, ENV_USER, Suite, TemplateData, TestCase, call_stack, config_loader,
    suite,
};

const CASES: &[TestCase] = &[
    ("test_environment_is_ready_in_first_case", test_environment_is_ready_in_first_case),
    ("test_shared_returns_the_started_suite", test_shared_returns_the_started_suite),
    ("test_acceptance_flag_follows_config", test_acceptance_flag_follows_config),
    ("test_render_names_artifact_after_case", test_render_names_artifact_after_case),
];

fn test_environment_is_ready_in_first_case(suite: &Suite) {
    let Some(config) = suite.config() else {
        // Short test mode: nothing was propagated
        return;
    };

    assert_eq!(std::env::var(ENV_USER).ok().as_deref(), Some(config.provider.user.as_str()));
    assert_eq!(std::env::var(ENV_URL).ok().as_deref(), Some(config.provider.url.as_str()));
    assert_eq!(std::env::var(ENV_ORG).ok().as_deref(), Some(config.provider.sys_org.as_str()));
}

fn test_shared_returns_the_started_suite(suite: &Suite) {
    assert!(std::ptr::eq(suite, suite::shared(config_loader!())));
}

fn test_acceptance_flag_follows_config(suite: &Suite) {
    let Some(config) = suite.config() else {
        return;
    };
    if config.provider.tf_acceptance_tests {
        assert_eq!(std::env::var(ENV_TF_ACC).unwrap(), "1");
    }
}

fn test_render_names_artifact_after_case(suite: &Suite) {
    let org = suite.config().map(|c| c.vcd.org.clone()).unwrap_or_else(|| "o".to_string());
    let data = TemplateData::new().with("Org", org.as_str());

    let text = suite.render(&call_stack!(), "org = {{.Org}}", &data);

    assert_eq!(text, format!("org = {}", org));
    if suite.renderer().writer().is_enabled() {
        let artifact = suite
            .renderer()
            .writer()
            .artifact_path("acceptance.test_render_names_artifact_after_case");
        assert!(artifact.starts_with(ARTIFACT_DIR));
        assert_eq!(fs::read_to_string(artifact).unwrap(), text);
    }
}

fn main() {
    suite::run_cases(config_loader!(), CASES)
}
