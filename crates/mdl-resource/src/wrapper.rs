//! The child-process environment wrapper.
//!
//! Real Nix integration (deriving a hermetic closure per action) lives
//! outside this core; this module defines the narrow contract it would
//! plug into — something that, given a requested variable set, decides what
//! a child process actually sees. Two implementations ship here: a
//! dependency-free [`HermeticWrapper`] that strips everything not
//! explicitly allowed, and a [`PassthroughWrapper`] used under
//! `--without-nix`.

use std::collections::BTreeMap;

use mdl_core::EnvironmentBlock;

/// Decides what environment a child process is spawned with.
pub trait CommandWrapper: Send + Sync {
    fn child_env(
        &self,
        document_env: &EnvironmentBlock,
        action_required: &[String],
        process_env: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String>;

    fn name(&self) -> &'static str;
}

/// Keeps only the union of globally passthrough vars, the action's own
/// declared required vars, and the document's exported vars — each
/// forwarded with its value from the parent process when present.
#[derive(Debug, Default, Clone, Copy)]
pub struct HermeticWrapper;

impl CommandWrapper for HermeticWrapper {
    fn child_env(
        &self,
        document_env: &EnvironmentBlock,
        action_required: &[String],
        process_env: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut child = BTreeMap::new();
        for name in document_env
            .passthrough
            .iter()
            .chain(action_required.iter())
            .chain(document_env.exported.iter())
        {
            if let Some(value) = process_env.get(name) {
                child.insert(name.clone(), value.clone());
            }
        }
        child
    }

    fn name(&self) -> &'static str {
        "hermetic"
    }
}

/// Inherits the parent environment verbatim — `--without-nix` mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughWrapper;

impl CommandWrapper for PassthroughWrapper {
    fn child_env(
        &self,
        _document_env: &EnvironmentBlock,
        _action_required: &[String],
        process_env: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        process_env.clone()
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }
}

/// Choose the wrapper for a run, per `--without-nix`.
pub fn select_wrapper(without_nix: bool) -> Box<dyn CommandWrapper> {
    if without_nix {
        Box::new(PassthroughWrapper)
    } else {
        Box::new(HermeticWrapper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process_env() -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert("HOME".to_string(), "/root".to_string());
        env.insert("PATH".to_string(), "/usr/bin".to_string());
        env.insert("SECRET".to_string(), "do-not-leak".to_string());
        env
    }

    #[test]
    fn hermetic_wrapper_strips_unlisted_vars() {
        let document_env = EnvironmentBlock {
            exported: vec!["HOME".to_string()],
            passthrough: vec!["PATH".to_string()],
        };
        let child = HermeticWrapper.child_env(&document_env, &[], &process_env());
        assert_eq!(child.get("HOME").map(String::as_str), Some("/root"));
        assert_eq!(child.get("PATH").map(String::as_str), Some("/usr/bin"));
        assert!(child.get("SECRET").is_none());
    }

    #[test]
    fn hermetic_wrapper_carries_action_required_vars() {
        let document_env = EnvironmentBlock::default();
        let child = HermeticWrapper.child_env(
            &document_env,
            &["SECRET".to_string()],
            &process_env(),
        );
        assert_eq!(child.get("SECRET").map(String::as_str), Some("do-not-leak"));
        assert!(child.get("HOME").is_none());
    }

    #[test]
    fn passthrough_wrapper_keeps_everything() {
        let document_env = EnvironmentBlock::default();
        let child = PassthroughWrapper.child_env(&document_env, &[], &process_env());
        assert_eq!(child, process_env());
    }

    #[test]
    fn select_wrapper_honors_without_nix_flag() {
        assert_eq!(select_wrapper(true).name(), "passthrough");
        assert_eq!(select_wrapper(false).name(), "hermetic");
    }
}
