//! Process-wide cache of compiled schema descriptors

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{FieldDescriptor, RecordType, Schema, SchemaDescriptor};
use crate::error::{Error, Result};
use crate::rules::{RuleError, RuleRegistry, UnknownRulePolicy};

static GLOBAL: Lazy<Arc<SchemaCache>> = Lazy::new(|| Arc::new(SchemaCache::default()));
static GLOBAL_STRICT: Lazy<Arc<SchemaCache>> = Lazy::new(|| {
    Arc::new(SchemaCache::new(
        RuleRegistry::with_builtins(),
        UnknownRulePolicy::Strict,
    ))
});

/// Compiled descriptors keyed by `TypeId`.
///
/// Descriptors are built on first request under the write lock (checked
/// again after acquiring it, so concurrent first requests build once) and
/// shared as `Arc`s afterwards. A failed build is not cached.
pub struct SchemaCache {
    registry: Arc<RuleRegistry>,
    policy: UnknownRulePolicy,
    descriptors: RwLock<HashMap<TypeId, Arc<SchemaDescriptor>>>,
    builds: AtomicUsize,
}

impl SchemaCache {
    /// Empty cache compiling tags against `registry`
    pub fn new(registry: RuleRegistry, policy: UnknownRulePolicy) -> Self {
        Self {
            registry: Arc::new(registry),
            policy,
            descriptors: RwLock::new(HashMap::new()),
            builds: AtomicUsize::new(0),
        }
    }

    /// The shared cache: built-in rules, lenient policy
    pub fn global() -> &'static SchemaCache {
        &GLOBAL
    }

    /// The shared cache for builtin rules under a strict policy
    pub fn global_strict() -> &'static SchemaCache {
        &GLOBAL_STRICT
    }

    pub(crate) fn shared(policy: UnknownRulePolicy) -> Arc<SchemaCache> {
        match policy {
            UnknownRulePolicy::Lenient => Arc::clone(&GLOBAL),
            UnknownRulePolicy::Strict => Arc::clone(&GLOBAL_STRICT),
        }
    }

    /// Descriptor for `T` from the shared cache, building it on first use
    pub fn get<T: Schema>() -> Result<Arc<SchemaDescriptor>> {
        Self::global().resolve(&RecordType::of::<T>())
    }

    /// Descriptor for `T` from this cache
    pub fn descriptor<T: Schema>(&self) -> Result<Arc<SchemaDescriptor>> {
        self.resolve(&RecordType::of::<T>())
    }

    /// Descriptor for a record type handle
    pub fn resolve(&self, record: &RecordType) -> Result<Arc<SchemaDescriptor>> {
        if let Some(descriptor) = self.descriptors.read().get(&record.type_id) {
            return Ok(Arc::clone(descriptor));
        }

        let mut descriptors = self.descriptors.write();
        if let Some(descriptor) = descriptors.get(&record.type_id) {
            return Ok(Arc::clone(descriptor));
        }
        let descriptor = Arc::new(self.build(record)?);
        descriptors.insert(record.type_id, Arc::clone(&descriptor));
        Ok(descriptor)
    }

    fn build(&self, record: &RecordType) -> Result<SchemaDescriptor> {
        let specs = (record.fields)();
        let mut fields = Vec::with_capacity(specs.len());
        for spec in specs {
            let rules = self
                .registry
                .compile(spec.validate, self.policy)
                .map_err(|e| match e {
                    RuleError::Unknown { rule } => Error::UnknownRule {
                        type_name: record.type_name,
                        field: spec.name,
                        rule,
                    },
                    RuleError::Invalid { rule, message } => Error::InvalidRule {
                        type_name: record.type_name,
                        field: spec.name,
                        rule,
                        message,
                    },
                })?;
            fields.push(FieldDescriptor::new(spec, rules));
        }

        self.builds.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            type_name = record.type_name,
            fields = fields.len(),
            "built schema descriptor"
        );
        Ok(SchemaDescriptor::new(
            record.type_id,
            record.type_name,
            fields,
        ))
    }

    /// Rule registry used for compilation
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Unknown-rule policy used for compilation
    pub fn policy(&self) -> UnknownRulePolicy {
        self.policy
    }

    /// Number of descriptors built so far
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::Relaxed)
    }

    /// Number of cached descriptors
    pub fn len(&self) -> usize {
        self.descriptors.read().len()
    }

    /// True when nothing is cached yet
    pub fn is_empty(&self) -> bool {
        self.descriptors.read().is_empty()
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(RuleRegistry::with_builtins(), UnknownRulePolicy::Lenient)
    }
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache")
            .field("policy", &self.policy)
            .field("cached", &self.len())
            .field("builds", &self.builds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::schema::{FieldSpec, FieldType, Record};

    struct Account;

    impl Schema for Account {
        fn fields() -> Vec<FieldSpec> {
            vec![
                FieldSpec::new("name", FieldType::String).validate("required,min=3"),
                FieldSpec::new("age", FieldType::UInt { bits: 8 })
                    .json("years")
                    .validate("max=120,shiny"),
            ]
        }

        fn from_record(_record: Record) -> std::result::Result<Self, ParseError> {
            Ok(Account)
        }
    }

    struct BadParam;

    impl Schema for BadParam {
        fn fields() -> Vec<FieldSpec> {
            vec![FieldSpec::new("name", FieldType::String).validate("min=abc")]
        }

        fn from_record(_record: Record) -> std::result::Result<Self, ParseError> {
            Ok(BadParam)
        }
    }

    #[test]
    fn test_builds_once_and_shares() {
        let cache = SchemaCache::default();
        let first = cache.descriptor::<Account>().unwrap();
        let second = cache.descriptor::<Account>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.builds(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_descriptor_contents() {
        let cache = SchemaCache::default();
        let descriptor = cache.descriptor::<Account>().unwrap();
        assert!(descriptor.type_name().ends_with("Account"));
        let names: Vec<&str> = descriptor.fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["name", "age"]);

        let age = descriptor.field("age").unwrap();
        assert_eq!(age.json_key(), "years");
        assert_eq!(age.tag(), "max=120,shiny");
        // "shiny" is dropped under the lenient policy
        let rules: Vec<&str> = age.rules().iter().map(|r| r.name()).collect();
        assert_eq!(rules, vec!["max"]);
    }

    #[test]
    fn test_strict_policy_fails_and_does_not_cache() {
        let cache = SchemaCache::new(RuleRegistry::with_builtins(), UnknownRulePolicy::Strict);
        let err = cache.descriptor::<Account>().unwrap_err();
        match err {
            Error::UnknownRule { field, rule, .. } => {
                assert_eq!(field, "age");
                assert_eq!(rule, "shiny");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(cache.is_empty());
        assert_eq!(cache.builds(), 0);
    }

    #[test]
    fn test_invalid_rule_parameter() {
        let cache = SchemaCache::default();
        let err = cache.descriptor::<BadParam>().unwrap_err();
        assert!(matches!(err, Error::InvalidRule { field: "name", .. }));
    }
}
