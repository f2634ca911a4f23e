use std::fmt;

/// Result of asking a permission store about a single permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tristate {
    True,
    False,
    #[default]
    Undefined,
}

impl Tristate {
    pub fn from_bool(value: bool) -> Tristate {
        if value { Tristate::True } else { Tristate::False }
    }

    /// Collapses the tristate, treating `Undefined` as denied.
    pub fn as_bool(self) -> bool {
        matches!(self, Tristate::True)
    }

    pub fn is_defined(self) -> bool {
        !matches!(self, Tristate::Undefined)
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        Tristate::from_bool(value)
    }
}

/// The coarse role a permission is meant for when nobody configured it
/// explicitly.
///
/// Levels are ordered, so `SuggestedLevel::User < SuggestedLevel::Owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SuggestedLevel {
    None,
    User,
    Mod,
    Admin,
    Owner,
}

impl SuggestedLevel {
    pub const ALL: [SuggestedLevel; 5] = [
        SuggestedLevel::None,
        SuggestedLevel::User,
        SuggestedLevel::Mod,
        SuggestedLevel::Admin,
        SuggestedLevel::Owner,
    ];

    /// The role permission that stands in for permissions of this level,
    /// e.g. `bastion.admin` for the `bastion` namespace.
    ///
    /// `None` and `Owner` have no proxy: they are only ever granted
    /// explicitly.
    pub fn role_permission(self, namespace: &str) -> Option<String> {
        let role = match self {
            SuggestedLevel::None | SuggestedLevel::Owner => return None,
            SuggestedLevel::User => "user",
            SuggestedLevel::Mod => "mod",
            SuggestedLevel::Admin => "admin",
        };
        Some(format!("{namespace}.{role}"))
    }

    pub fn name(self) -> &'static str {
        match self {
            SuggestedLevel::None => "none",
            SuggestedLevel::User => "user",
            SuggestedLevel::Mod => "mod",
            SuggestedLevel::Admin => "admin",
            SuggestedLevel::Owner => "owner",
        }
    }
}

impl fmt::Display for SuggestedLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
