use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::Deserialize;

use crate::binder::{HelperBinding, ResolutionCache};
use crate::compiler::CompiledBody;
use crate::helpers::{
    register_builtins, BlockHelper, HelperResolver, HelperTable, ResolverChain, ReturnHelper,
    ReturnHelperResolver,
};
use crate::path::{PathId, PathStore};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineOptions {
    /// Write `{{ }}` output without HTML encoding.
    pub no_escape: bool,
    /// Fail the render on paths that do not resolve instead of writing nothing.
    pub strict: bool,
}

impl EngineOptions {
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).context("invalid engine options")
    }
}

/// Everything one engine instance knows: options, helpers, partials,
/// resolvers and the block helper resolution cache.
pub struct Configuration {
    options: EngineOptions,
    block_helpers: ResolutionCache,
    helpers: Arc<HelperTable>,
    partials: RwLock<HashMap<String, CompiledBody>>,
    resolvers: ResolverChain,
}

impl Configuration {
    pub fn new(options: EngineOptions) -> Self {
        let helpers = Arc::new(HelperTable::new());
        let resolvers = ResolverChain::new();
        resolvers.push(Arc::new(ReturnHelperResolver::new(Arc::clone(&helpers))));

        let block_helpers = ResolutionCache::new();
        register_builtins(&block_helpers);

        Self {
            options,
            block_helpers,
            helpers,
            partials: RwLock::new(HashMap::new()),
            resolvers,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn block_helpers(&self) -> &ResolutionCache {
        &self.block_helpers
    }

    pub fn resolvers(&self) -> &ResolverChain {
        &self.resolvers
    }

    pub fn helpers(&self) -> &HelperTable {
        &self.helpers
    }

    pub fn helper(&self, path: &PathId) -> Option<Arc<dyn ReturnHelper>> {
        self.helpers.get(path)
    }

    pub fn partial(&self, name: &str) -> Option<CompiledBody> {
        self.partials.read().get(name).cloned()
    }

    pub fn register_helper(&self, name: &str, helper: Arc<dyn ReturnHelper>) {
        self.helpers.insert(PathStore::intern(name), helper);
    }

    /// Rebinds every call site already compiled against `name`.
    pub fn register_block_helper(&self, name: &str, helper: Arc<dyn BlockHelper>) {
        self.block_helpers
            .add_or_replace(&PathStore::intern(name), HelperBinding::Resolved(helper));
    }

    pub fn register_resolver(&self, resolver: Arc<dyn HelperResolver>) {
        self.resolvers.push(resolver);
    }

    pub fn register_partial(&self, name: &str, body: CompiledBody) {
        self.partials.write().insert(name.to_string(), body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_load_from_yaml() {
        let options = EngineOptions::from_yaml_str("strict: true\n").expect("options");
        assert!(options.strict);
        assert!(!options.no_escape);
    }

    #[test]
    fn unknown_option_is_rejected() {
        let error = EngineOptions::from_yaml_str("escape: false\n").unwrap_err();
        assert!(
            format!("{error:#}").contains("unknown field"),
            "unexpected error: {error:#}"
        );
    }

    #[test]
    fn builtins_and_return_resolver_are_installed() {
        let configuration = Configuration::new(EngineOptions::default());
        for name in ["each", "if", "unless", "with", "*inline"] {
            let cell = configuration
                .block_helpers()
                .get(&PathStore::intern(name))
                .unwrap_or_else(|| panic!("missing builtin {name}"));
            assert!(cell.binding().is_block_aware(), "{name} should be block aware");
        }
        assert_eq!(configuration.resolvers().len(), 1);
    }
}
