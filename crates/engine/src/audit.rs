//! Audit fields stamped onto every bulk mutation.

use salesdesk_store::FieldMap;
use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const UPDATED_BY: &str = "updatedBy";
pub const UPDATED_AT: &str = "updatedAt";

/// Supplies the acting user's identifier. The engine treats it as opaque.
pub trait IdentityProvider: Send + Sync + 'static {
    /// `None` when nobody is signed in; the `updatedBy` stamp is then skipped.
    fn acting_user(&self) -> Option<String>;
}

/// An identity fixed at construction, e.g. a service account.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<String>);

impl StaticIdentity {
    pub fn new(user: impl Into<String>) -> Self {
        Self(Some(user.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn acting_user(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Add `updatedAt` (and `updatedBy` when known) to `fields`.
///
/// Caller-supplied values for these keys are overwritten.
pub(crate) fn stamp(fields: &mut FieldMap, user: Option<&str>, at: OffsetDateTime) {
    // Rfc3339 formatting only fails for years outside 0..=9999.
    if let Ok(ts) = at.format(&Rfc3339) {
        fields.insert(UPDATED_AT.to_string(), Value::String(ts));
    }
    if let Some(user) = user {
        fields.insert(UPDATED_BY.to_string(), Value::String(user.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn stamp_overwrites_caller_audit_fields() {
        let mut fields = FieldMap::new();
        fields.insert(UPDATED_BY.into(), Value::String("spoofed".into()));
        fields.insert("assignedTo".into(), Value::String("u1".into()));

        stamp(&mut fields, Some("agent-4"), datetime!(2026-03-01 09:30 UTC));

        assert_eq!(fields[UPDATED_BY], "agent-4");
        assert_eq!(fields[UPDATED_AT], "2026-03-01T09:30:00Z");
        assert_eq!(fields["assignedTo"], "u1");
    }

    #[test]
    fn anonymous_stamp_skips_updated_by() {
        let mut fields = FieldMap::new();
        stamp(
            &mut fields,
            StaticIdentity::anonymous().acting_user().as_deref(),
            datetime!(2026-03-01 09:30 UTC),
        );
        assert!(!fields.contains_key(UPDATED_BY));
        assert!(fields.contains_key(UPDATED_AT));
    }
}
