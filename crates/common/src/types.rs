use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for identifiers derived from other identifiers.
///
/// Changing this value changes every derived ticket id, so it is fixed.
const DERIVED_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_4a0e_92c3_4d7a_b5e1_0c8f_3a27_d914);

/// Unique identifier for an aggregate instance (order, ticket, participant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Creates a new random aggregate ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an aggregate ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Derives a stable child ID from a parent ID and a discriminator.
    ///
    /// The same inputs always yield the same ID, which lets retried work
    /// address the entities a previous attempt already created.
    pub fn derived(parent: AggregateId, discriminator: &str) -> Self {
        let mut name = parent.0.as_bytes().to_vec();
        name.extend_from_slice(discriminator.as_bytes());
        Self(Uuid::new_v5(&DERIVED_ID_NAMESPACE, &name))
    }

    /// Parses an aggregate ID from its textual UUID form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AggregateId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AggregateId> for Uuid {
    fn from(id: AggregateId) -> Self {
        id.0
    }
}
