//! Settings scopes.
//!
//! A [`Scope`] names one independent settings namespace, each with its own
//! file and dirty flag.  [`Scopes`] is a small bitset so that operations such
//! as "save everything" can address both namespaces in one call.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// One settings namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Machine-local settings, stored directly under the data root.
    Device,
    /// Per-account settings, stored under `<root>/<user id>/`.
    User,
}

impl Scope {
    /// Both scopes in the order combined operations visit them.
    pub const ALL: [Scope; 2] = [Scope::Device, Scope::User];

    /// Lowercase name used in logs and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Device => "device",
            Scope::User => "user",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Scope::Device => Scopes::DEVICE.0,
            Scope::User => Scopes::USER.0,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bitset of scopes addressed by a combined operation.
///
/// ```rust
/// use settings_core::{Scope, Scopes};
///
/// let both = Scopes::DEVICE | Scopes::USER;
/// assert_eq!(both, Scopes::ALL);
/// assert_eq!(both.iter().collect::<Vec<_>>(), vec![Scope::Device, Scope::User]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Scopes(pub u8);

impl Scopes {
    pub const NONE: Scopes = Scopes(0);
    pub const DEVICE: Scopes = Scopes(1 << 0);
    pub const USER: Scopes = Scopes(1 << 1);
    pub const ALL: Scopes = Scopes(Self::DEVICE.0 | Self::USER.0);

    /// Returns `true` if `scope` is part of this set.
    pub fn contains(&self, scope: Scope) -> bool {
        self.0 & scope.bit() != 0
    }

    /// Returns `true` if no scope is selected.
    pub fn is_empty(&self) -> bool {
        self.0 & Self::ALL.0 == 0
    }

    /// Iterates the selected scopes, Device before User.
    pub fn iter(self) -> impl Iterator<Item = Scope> {
        Scope::ALL.into_iter().filter(move |s| self.contains(*s))
    }
}

impl From<Scope> for Scopes {
    fn from(scope: Scope) -> Self {
        Scopes(scope.bit())
    }
}

impl BitOr for Scopes {
    type Output = Scopes;

    fn bitor(self, rhs: Scopes) -> Scopes {
        Scopes(self.0 | rhs.0)
    }
}

impl BitOr<Scope> for Scopes {
    type Output = Scopes;

    fn bitor(self, rhs: Scope) -> Scopes {
        self | Scopes::from(rhs)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
