//! Language-preference-based provider ordering

use std::sync::Arc;

use crate::core::provider::Provider;

/// Reorders provider tiers based on per-language affinities
///
/// Default order is ascending tier. Any enabled provider that lists the
/// target language among its preferred languages is promoted ahead of
/// non-matching providers; relative order among matches (and among
/// non-matches) still follows tier. Implemented as a stable sort on a
/// boolean partition key with tier as the secondary key.
#[derive(Debug, Clone, Default)]
pub struct LanguagePreferenceMatcher;

impl LanguagePreferenceMatcher {
    /// Order the configured providers for the given target language
    pub fn order_providers(
        &self,
        target_lang: &str,
        providers: &[Arc<dyn Provider>],
    ) -> Vec<Arc<dyn Provider>> {
        let mut ordered: Vec<Arc<dyn Provider>> = providers.to_vec();
        ordered.sort_by_key(|p| {
            let promoted = p.enabled() && p.prefers_language(target_lang);
            (!promoted, p.tier())
        });
        ordered
    }
}
