//! Order ownership.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::UserId;

/// The identity an order belongs to.
///
/// Exactly one of a registered user id or a validated guest email - the
/// type makes "both" and "neither" unrepresentable, which the database
/// mirrors with a CHECK constraint. The core treats both variants as
/// opaque keys; resolving a request to an owner is the identity layer's
/// job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderOwner {
    /// A registered user.
    User(UserId),
    /// A guest checkout identified by email.
    Guest(Email),
}

impl fmt::Display for OrderOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Guest(email) => write!(f, "guest:{email}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_display_is_tagged() {
        let user = OrderOwner::User(UserId::new(5));
        assert_eq!(user.to_string(), "user:5");

        let email = Email::parse("g@example.com").expect("valid email");
        let guest = OrderOwner::Guest(email);
        assert_eq!(guest.to_string(), "guest:g@example.com");
    }
}
