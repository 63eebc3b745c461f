use crate::language::{load_grammar, resolve_grammar_path, GrammarSearchConfig};
use codegraph_core::{CodeGraphError, Language, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tree_sitter::Parser;

/// A resolved grammar kept alive in the process-wide cache (§4.1).
///
/// `_library` is never read directly; it exists to keep the `dlopen`ed shared object
/// mapped for as long as `language`'s function table is referenced.
struct CachedGrammar {
    language: tree_sitter::Language,
    _library: libloading::Library,
    last_used: Mutex<Instant>,
}

/// Caches one resolved grammar per language id and evicts entries idle past a configured
/// window. An in-flight `get_parser` call always refreshes `last_used` before returning,
/// so a sweep can never evict a grammar a caller is about to use.
pub struct ParserRegistry {
    search: GrammarSearchConfig,
    idle_window: Duration,
    cache: DashMap<Language, CachedGrammar>,
}

impl ParserRegistry {
    pub fn new(search: GrammarSearchConfig) -> Self {
        Self {
            search,
            idle_window: Duration::from_secs(600),
            cache: DashMap::new(),
        }
    }

    pub fn with_idle_window(mut self, idle_window: Duration) -> Self {
        self.idle_window = idle_window;
        self
    }

    /// Resolve (on first call) and return a fresh, ready-to-use parser for `language`.
    ///
    /// The expensive step — locating and `dlopen`ing the grammar — happens once per
    /// language and is cached; each call hands back a newly constructed `tree_sitter::Parser`
    /// so concurrent callers never contend on a shared parser instance.
    pub fn get_parser(&self, language: Language) -> Result<Parser> {
        if let Some(entry) = self.cache.get(&language) {
            *entry.last_used.lock() = Instant::now();
            return self.build_parser(&entry.language, language);
        }

        let path = resolve_grammar_path(&self.search, language)?;
        let (library, ts_language) = load_grammar(&path, language)?;
        let parser = self.build_parser(&ts_language, language)?;

        self.cache.insert(
            language,
            CachedGrammar {
                language: ts_language,
                _library: library,
                last_used: Mutex::new(Instant::now()),
            },
        );

        Ok(parser)
    }

    fn build_parser(&self, ts_language: &tree_sitter::Language, language: Language) -> Result<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(ts_language)
            .map_err(|e| CodeGraphError::GrammarLoadFailed {
                language: language.to_string(),
                reason: e.to_string(),
            })?;
        Ok(parser)
    }

    /// Evict grammars unused for longer than the configured idle window. Call this
    /// periodically from a background task; it is not self-scheduling.
    pub fn sweep_idle(&self) {
        let cutoff = self.idle_window;
        self.cache
            .retain(|_, entry| entry.last_used.lock().elapsed() < cutoff);
    }

    pub fn cached_languages(&self) -> Vec<Language> {
        self.cache.iter().map(|e| *e.key()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Without a real grammar .so on disk these only exercise the GrammarNotFound path;
    // the happy path (SemVer directory selection) is covered in language.rs's tests.

    #[test]
    fn missing_grammar_directory_surfaces_grammar_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = ParserRegistry::new(GrammarSearchConfig {
            search_root: tmp.path().to_path_buf(),
        });
        let err = registry.get_parser(Language::TypeScript).unwrap_err();
        assert!(matches!(err, CodeGraphError::GrammarNotFound { .. }));
    }

    #[test]
    fn sweep_idle_evicts_nothing_when_cache_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = ParserRegistry::new(GrammarSearchConfig {
            search_root: tmp.path().to_path_buf(),
        })
        .with_idle_window(Duration::from_millis(1));
        registry.sweep_idle();
        assert!(registry.cached_languages().is_empty());
    }
}
