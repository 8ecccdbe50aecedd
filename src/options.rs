use serde::{Deserialize, Serialize};

use crate::recursion::DEFAULT_MAX_DEPTH;

/// Duplicate key handling policy for mappings.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateKeyPolicy {
    /// Error out on encountering a duplicate key.
    Error,
    /// First key wins: later duplicate pairs are constructed and then dropped.
    FirstWins,
    /// Last key wins: later duplicate pairs overwrite the earlier value in place.
    LastWins,
}

/// Engine configuration options.
///
/// The options are engine-wide: every construction call of one engine sees the same
/// duplicate-key policy, unmatched-member behaviour and recursion bound.
///
/// Options can themselves be loaded from YAML:
///
/// ```rust
/// use saphyr_construct::options::{DuplicateKeyPolicy, Options};
///
/// let options: Options = saphyr_construct::from_str(
///     "duplicate_keys: LastWins\nignore_unmatched: true\nmax_recursion: 64\n",
/// )
/// .unwrap();
/// assert_eq!(options.duplicate_keys, DuplicateKeyPolicy::LastWins);
/// assert!(options.ignore_unmatched);
/// assert_eq!(options.max_recursion, 64);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Policy for duplicate keys in mappings, objects and dictionaries.
    pub duplicate_keys: DuplicateKeyPolicy,
    /// If true, mapping keys without a matching member are skipped together with their
    /// values, and missing required members are not reported.
    /// Default: false (an unmatched key is an error).
    pub ignore_unmatched: bool,
    /// Maximum nesting depth of any recursive walk (construction, document loading,
    /// saving and comparison). Default: 1000.
    pub max_recursion: usize,
    /// If true, interpret only the exact literals `true` and `false` as booleans.
    /// YAML 1.1 forms like `yes`/`no`/`on`/`off` will be rejected.
    /// Default: false (accept YAML 1.1 boolean forms).
    pub strict_booleans: bool,
    /// If true, plain scalars constructed into untyped targets are typed implicitly
    /// (null, booleans, integers, floats). If false they stay strings.
    /// Mapping keys of untyped maps always stay strings. Default: true.
    pub infer_scalar_types: bool,
    /// If true, text parsed by the engine has its YAML merge keys (`<<`) expanded
    /// before construction. Default: false (`<<` is an ordinary key).
    pub merge_keys: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            duplicate_keys: DuplicateKeyPolicy::Error,
            ignore_unmatched: false,
            max_recursion: DEFAULT_MAX_DEPTH,
            strict_booleans: false,
            infer_scalar_types: true,
            merge_keys: false,
        }
    }
}

/// Small immutable runtime configuration that the construction context needs.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Cfg {
    pub(crate) dup_policy: DuplicateKeyPolicy,
    pub(crate) ignore_unmatched: bool,
    pub(crate) max_recursion: usize,
    pub(crate) strict_booleans: bool,
    pub(crate) infer_scalar_types: bool,
    pub(crate) merge_keys: bool,
}

impl Cfg {
    #[inline]
    pub(crate) fn from_options(options: &Options) -> Self {
        Self {
            dup_policy: options.duplicate_keys,
            ignore_unmatched: options.ignore_unmatched,
            max_recursion: options.max_recursion,
            strict_booleans: options.strict_booleans,
            infer_scalar_types: options.infer_scalar_types,
            merge_keys: options.merge_keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_default() {
        let opts = Options::default();
        assert_eq!(opts.duplicate_keys, DuplicateKeyPolicy::Error);
        assert!(!opts.ignore_unmatched);
        assert_eq!(opts.max_recursion, 1000);
        assert!(!opts.strict_booleans);
        assert!(opts.infer_scalar_types);
        assert!(!opts.merge_keys);
    }

    #[test]
    fn test_cfg_snapshot() {
        let opts = Options {
            duplicate_keys: DuplicateKeyPolicy::FirstWins,
            ignore_unmatched: true,
            ..Options::default()
        };
        let cfg = Cfg::from_options(&opts);
        assert_eq!(cfg.dup_policy, DuplicateKeyPolicy::FirstWins);
        assert!(cfg.ignore_unmatched);
        assert_eq!(cfg.max_recursion, 1000);
    }
}
