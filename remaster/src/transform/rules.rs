use serde::{Deserialize, Serialize};

/// Policy for source fields no rule names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Passthrough {
    /// Only ruled fields appear in the transformed record.
    #[default]
    Deny,
    /// Unruled fields are copied verbatim; `Drop` rules remove them.
    Allow,
}

/// Type coercion applied to a copied field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Coercion {
    /// Copy the value unchanged.
    None,
    /// Native integer identifier to the canonical string form.
    CanonicalId,
    /// List of native identifiers, rewritten element-wise.
    CanonicalIdList,
    /// Scalar value to its string representation.
    Text,
    /// Epoch milliseconds to an RFC 3339 timestamp.
    TimestampMs,
}

/// One field-level transformation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldRule {
    /// Always copied; the record is malformed without it.
    Required {
        field: String,
        rename: Option<String>,
        coerce: Coercion,
    },
    /// Copied only when present and not empty/falsy, so optional fields are
    /// omitted rather than nulled out.
    Optional {
        field: String,
        rename: Option<String>,
        coerce: Coercion,
    },
    /// Rewrites a nested object with its own rule set.
    Nested { field: String, rules: RuleSet },
    /// Explicitly dropped from the destination shape.
    Drop { field: String },
}

/// Declarative transformation rule set for one entity.
///
/// Built fluently and interpreted by [`crate::transform::transform`]; the
/// rules are plain data so an entity's whole transform is inspectable
/// configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RuleSet {
    rules: Vec<FieldRule>,
    passthrough: Passthrough,
}

impl RuleSet {
    /// Creates an empty rule set denying passthrough.
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches unruled fields to verbatim copying.
    pub fn allow_passthrough(mut self) -> Self {
        self.passthrough = Passthrough::Allow;
        self
    }

    /// Adds a required copy of `field`.
    pub fn required(self, field: &str, coerce: Coercion) -> Self {
        self.push(FieldRule::Required {
            field: field.to_owned(),
            rename: None,
            coerce,
        })
    }

    /// Adds a required copy of `field`, stored as `rename`.
    pub fn required_as(self, field: &str, rename: &str, coerce: Coercion) -> Self {
        self.push(FieldRule::Required {
            field: field.to_owned(),
            rename: Some(rename.to_owned()),
            coerce,
        })
    }

    /// Adds an optional copy of `field`.
    pub fn optional(self, field: &str, coerce: Coercion) -> Self {
        self.push(FieldRule::Optional {
            field: field.to_owned(),
            rename: None,
            coerce,
        })
    }

    /// Adds an optional copy of `field`, stored as `rename`.
    pub fn optional_as(self, field: &str, rename: &str, coerce: Coercion) -> Self {
        self.push(FieldRule::Optional {
            field: field.to_owned(),
            rename: Some(rename.to_owned()),
            coerce,
        })
    }

    /// Adds a nested rewrite of the object field `field`.
    pub fn nested(self, field: &str, rules: RuleSet) -> Self {
        self.push(FieldRule::Nested {
            field: field.to_owned(),
            rules,
        })
    }

    /// Explicitly drops `field` from the destination shape.
    pub fn drop_field(self, field: &str) -> Self {
        self.push(FieldRule::Drop {
            field: field.to_owned(),
        })
    }

    /// Returns the rules in declaration order.
    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Returns the passthrough policy.
    pub fn passthrough(&self) -> Passthrough {
        self.passthrough
    }

    fn push(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }
}
