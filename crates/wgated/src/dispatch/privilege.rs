//! Privilege tiers required by handlers and carried by requests.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Trust tier a handler requires.
///
/// Levels are compared by exact match: a caller holding `admin` cannot invoke
/// a handler that requires `session`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Privilege {
    /// No authentication.
    None,
    /// An authenticated account.
    Account,
    /// An account if one is available.
    AccountOptional,
    /// An established session.
    Session,
    /// An approved account.
    Approved,
    /// Support staff.
    Support,
    /// Administrators.
    Admin,
    /// Application editors.
    EditApp,
    /// Publisher members.
    MemberPublisher,
    /// Publisher editors.
    EditPublisher,
}

impl Privilege {
    /// Every tier in wire order.
    pub const ALL: [Self; 10] = [
        Self::None,
        Self::Account,
        Self::AccountOptional,
        Self::Session,
        Self::Approved,
        Self::Support,
        Self::Admin,
        Self::EditApp,
        Self::MemberPublisher,
        Self::EditPublisher,
    ];

    /// Value used on the wire.
    #[must_use]
    pub const fn wire_value(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Account => 1,
            Self::AccountOptional => 2,
            Self::Session => 3,
            Self::Approved => 4,
            Self::Support => 5,
            Self::Admin => 6,
            Self::EditApp => 7,
            Self::MemberPublisher => 8,
            Self::EditPublisher => 9,
        }
    }

    /// Maps a wire value back to a tier.
    #[must_use]
    pub const fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Account),
            2 => Some(Self::AccountOptional),
            3 => Some(Self::Session),
            4 => Some(Self::Approved),
            5 => Some(Self::Support),
            6 => Some(Self::Admin),
            7 => Some(Self::EditApp),
            8 => Some(Self::MemberPublisher),
            9 => Some(Self::EditPublisher),
            _ => None,
        }
    }
}

/// Raw privilege value carried by an inbound message.
///
/// Values outside the known tiers are kept so they can be reported; they
/// never satisfy any handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivilegeLevel(u32);

impl PrivilegeLevel {
    /// Wraps a raw wire value.
    #[must_use]
    pub const fn from_wire(value: u32) -> Self {
        Self(value)
    }

    /// Raw wire value.
    #[must_use]
    pub const fn wire_value(self) -> u32 {
        self.0
    }

    /// The tier this value names, if any.
    #[must_use]
    pub const fn privilege(self) -> Option<Privilege> {
        Privilege::from_wire(self.0)
    }

    /// Returns `true` only when this value names exactly `required`.
    #[must_use]
    pub fn satisfies(self, required: Privilege) -> bool {
        self.privilege() == Some(required)
    }
}

impl From<Privilege> for PrivilegeLevel {
    fn from(privilege: Privilege) -> Self {
        Self(privilege.wire_value())
    }
}

impl fmt::Display for PrivilegeLevel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.privilege() {
            Some(privilege) => fmt::Display::fmt(&privilege, formatter),
            None => write!(formatter, "unknown({})", self.0),
        }
    }
}
