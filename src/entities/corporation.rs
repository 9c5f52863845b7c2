// 🏢 Corporation Entity - deduplicated business identity
//
// Identity is the UUID. Website, DBA and legal name are alternate keys used
// to recognise an incoming row as an already-known corporation.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// ALTERNATE KEYS
// ============================================================================

/// Alternate keys a corporation can be looked up by.
///
/// The declaration order is the match priority: the most specific key first,
/// the most ambiguous (legal name) last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorporationKey {
    Website,
    DoingBusinessAs,
    LegalName,
}

impl CorporationKey {
    /// Column holding this key in the store
    pub fn column(&self) -> &'static str {
        match self {
            CorporationKey::Website => "website",
            CorporationKey::DoingBusinessAs => "doing_business_as",
            CorporationKey::LegalName => "legal_name",
        }
    }

    /// Read the key's value off a corporation
    pub fn value_of<'a>(&self, corporation: &'a Corporation) -> Option<&'a str> {
        match self {
            CorporationKey::Website => corporation.website.as_deref(),
            CorporationKey::DoingBusinessAs => corporation.doing_business_as.as_deref(),
            CorporationKey::LegalName => corporation.legal_name.as_deref(),
        }
    }
}

impl fmt::Display for CorporationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

// ============================================================================
// CORPORATION ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corporation {
    /// Stable identity - assigned at creation, never changes
    pub id: Uuid,

    pub legal_name: Option<String>,
    pub doing_business_as: Option<String>,

    /// Treated as unique across the store
    pub website: Option<String>,
}

impl Corporation {
    pub fn new(
        id: Uuid,
        legal_name: Option<String>,
        doing_business_as: Option<String>,
        website: Option<String>,
    ) -> Self {
        Corporation {
            id,
            legal_name,
            doing_business_as,
            website,
        }
    }

    /// True when none of the alternate keys is present
    pub fn is_anonymous(&self) -> bool {
        self.website.is_none() && self.doing_business_as.is_none() && self.legal_name.is_none()
    }

    /// Best human-readable name for logs
    pub fn display_name(&self) -> &str {
        self.doing_business_as
            .as_deref()
            .or(self.legal_name.as_deref())
            .or(self.website.as_deref())
            .unwrap_or("<unnamed>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_value_of() {
        let corp = Corporation::new(
            Uuid::new_v4(),
            Some("Acme Inc".to_string()),
            None,
            Some("acme.test".to_string()),
        );

        assert_eq!(CorporationKey::Website.value_of(&corp), Some("acme.test"));
        assert_eq!(CorporationKey::DoingBusinessAs.value_of(&corp), None);
        assert_eq!(CorporationKey::LegalName.value_of(&corp), Some("Acme Inc"));
        assert_eq!(corp.display_name(), "Acme Inc");
    }

    #[test]
    fn test_anonymous_corporation() {
        let corp = Corporation::new(Uuid::new_v4(), None, None, None);
        assert!(corp.is_anonymous());
        assert_eq!(corp.display_name(), "<unnamed>");
    }
}
