use serde::{Deserialize, Serialize};
use tally_resource::{
    Commitment, Nullifier, Resource, WireDecode, WireEncode, WireError, WireReader, commits_to,
    nullifies, put_u8,
};

const KIND_CREATED: u8 = 0;
const KIND_CONSUMED: u8 = 1;

/// Evidence accompanying a commitment or nullifier: the opening of the
/// resource behind it. Openings carry the quantities the balance check sums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Proof {
    /// Opens a commitment being created.
    Created { resource: Resource },
    /// Opens a nullifier being consumed.
    Consumed { resource: Resource },
}

impl Proof {
    pub fn created(resource: Resource) -> Self {
        Self::Created { resource }
    }

    pub fn consumed(resource: Resource) -> Self {
        Self::Consumed { resource }
    }

    pub fn resource(&self) -> &Resource {
        match self {
            Self::Created { resource } | Self::Consumed { resource } => resource,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }

    /// `Some(result)` for a creation proof, `None` for the wrong kind.
    pub fn verify_commitment(&self, commitment: &Commitment) -> Option<bool> {
        match self {
            Self::Created { resource } => Some(commits_to(commitment, resource)),
            Self::Consumed { .. } => None,
        }
    }

    /// `Some(result)` for a consumption proof, `None` for the wrong kind.
    pub fn verify_nullifier(&self, nullifier: &Nullifier) -> Option<bool> {
        match self {
            Self::Consumed { resource } => Some(nullifies(nullifier, resource)),
            Self::Created { .. } => None,
        }
    }
}

impl WireEncode for Proof {
    fn encode_to(&self, out: &mut Vec<u8>) {
        let kind = match self {
            Self::Created { .. } => KIND_CREATED,
            Self::Consumed { .. } => KIND_CONSUMED,
        };
        put_u8(out, kind);
        self.resource().encode_to(out);
    }
}

impl WireDecode for Proof {
    fn decode_from(reader: &mut WireReader<'_>) -> Result<Self, WireError> {
        match reader.read_u8()? {
            KIND_CREATED => Ok(Self::Created {
                resource: Resource::decode_from(reader)?,
            }),
            KIND_CONSUMED => Ok(Self::Consumed {
                resource: Resource::decode_from(reader)?,
            }),
            other => Err(WireError::UnknownProofKind(other)),
        }
    }
}
