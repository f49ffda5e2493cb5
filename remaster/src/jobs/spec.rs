use serde::{Deserialize, Serialize};

use crate::destination::IndexSpec;
use crate::search::Projection;
use crate::source::IdPredicate;
use crate::transform::{AggregateRule, FanOutRule, RuleSet};

/// Policy for record-scoped failures (conflicts, malformed records).
///
/// Whatever the choice, the outcome stays observable: skipped records are
/// counted and logged, and a failed job carries the offending error in the
/// run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConflictPolicy {
    /// Log the record-scoped error, count the record as skipped, continue.
    #[default]
    SkipAndLog,
    /// Fail the whole job on the first record-scoped error.
    FailJob,
}

/// Descriptor of one independently-run migration job.
///
/// Created at orchestration start, immutable during its job's run. Each
/// descriptor owns its destination collection(s) exclusively; no two jobs
/// write to the same destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Logical entity name; also the handle `depends_on` lists refer to.
    pub entity: String,
    /// Source collection the cursor reads.
    pub source_collection: String,
    /// Selection predicate over the native identifier.
    pub predicate: IdPredicate,
    /// Primary destination collection.
    pub destination: String,
    /// Field-level transformation rules.
    pub rules: RuleSet,
    /// Supporting indexes provisioned on the destination.
    pub indexes: Vec<IndexSpec>,
    /// Derived aggregate resolved per record, if any.
    pub aggregate: Option<AggregateRule>,
    /// Fan-out of a multi-valued relation field, if any.
    pub fan_out: Option<FanOutRule>,
    /// Search projection written to the secondary sink, if any.
    pub projection: Option<Projection>,
    /// Entities whose destinations this job joins against. The orchestrator
    /// starts the job only once these are terminal.
    pub depends_on: Vec<String>,
    /// Record-scoped failure policy.
    pub conflict_policy: ConflictPolicy,
}

impl JobSpec {
    /// Creates a descriptor with no rules and no optional steps.
    pub fn new(entity: &str, source_collection: &str, destination: &str) -> Self {
        Self {
            entity: entity.to_owned(),
            source_collection: source_collection.to_owned(),
            predicate: IdPredicate::All,
            destination: destination.to_owned(),
            rules: RuleSet::new(),
            indexes: Vec::new(),
            aggregate: None,
            fan_out: None,
            projection: None,
            depends_on: Vec::new(),
            conflict_policy: ConflictPolicy::default(),
        }
    }

    pub fn with_predicate(mut self, predicate: IdPredicate) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_aggregate(mut self, aggregate: AggregateRule) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    pub fn with_fan_out(mut self, fan_out: FanOutRule) -> Self {
        self.fan_out = Some(fan_out);
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn depends_on(mut self, entity: &str) -> Self {
        self.depends_on.push(entity.to_owned());
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }
}
