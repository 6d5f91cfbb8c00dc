use std::io::Write;

use contentguard_core::config::pipeline_config::{load_from_env, PipelineConfig, CONFIG_ENV_VAR};
use contentguard_core::interceptor::runtime_patch::{is_installed, uninstall, InstallOutcome};
use contentguard_core::interceptor::ContentPipeline;
use contentguard_core::monitoring::diagnostics::init_json_logging;
use contentguard_core::render::{RenderError, RenderRuntime};
use contentguard_core::RawNode;
use tempfile::NamedTempFile;

#[cfg(test)]
mod tests {
    use super::*;

    // Only test in this binary that touches the environment or the global runtime.
    #[test]
    fn env_config_drives_global_pipeline() {
        init_json_logging();
        // Safe to repeat.
        init_json_logging();

        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"placeholders": {{"function": "(callback)"}}, "boundary": {{"fallback_message": "Oops."}}}}"#
        )
        .unwrap();

        std::env::set_var(CONFIG_ENV_VAR, file.path());
        let config = load_from_env().expect("config from env");
        std::env::remove_var(CONFIG_ENV_VAR);

        let pipeline = ContentPipeline::from_config(config).unwrap();
        assert_eq!(pipeline.bootstrap(), Some(InstallOutcome::Installed));
        assert_eq!(pipeline.bootstrap(), Some(InstallOutcome::AlreadyInstalled));

        let rt = RenderRuntime::global();
        let text = rt.materialize_text(RawNode::Function("cb".into()));
        assert_eq!(text.text_content(), "(callback)");
        assert_eq!(
            pipeline.canonicalize(&RawNode::Function("cb".into())).as_text(),
            Some("(callback)")
        );

        let mut boundary = pipeline.mount("quiz");
        let outcome = boundary.render(|| Err(RenderError::View("x".into())));
        assert_eq!(outcome.node().text_content(), "Oops.");

        uninstall(rt);
        assert!(!is_installed(rt));

        assert!(matches!(
            load_from_env(),
            Ok(cfg) if cfg == PipelineConfig::default()
        ));
    }
}
