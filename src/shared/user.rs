/**
 * User Data Structure
 *
 * This module defines the User struct owned by the User Directory, the
 * reserved broadcast pseudo-username, the viewed-peer type, and the profile
 * validation rules applied when accounts are created externally.
 */
use crate::shared::error::SharedError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Reserved pseudo-username addressing every other user at once.
///
/// A message whose receiver is this marker fans out to all live users; a
/// session viewing this marker receives the merged broadcast history.
pub const BROADCAST_USERNAME: &str = "broadcast";

/// Default administrative account seeded on first start.
pub const ADMIN_USERNAME: &str = "admin";

/// A known user of the system
///
/// Owned by the User Directory; the router treats users as immutable except
/// for existence (accounts are created and deleted by the external HTTP
/// layer). Usernames are unique and case-normalized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Unique, lowercased username
    pub username: String,
    /// Given name, shown in the user list
    pub firstname: String,
    /// Family name, shown in the user list
    pub lastname: String,
}

impl User {
    /// Create a user, normalizing the username (lowercase, trimmed)
    pub fn new(
        username: impl Into<String>,
        firstname: impl Into<String>,
        lastname: impl Into<String>,
    ) -> Self {
        Self {
            username: normalize_username(&username.into()),
            firstname: firstname.into(),
            lastname: lastname.into(),
        }
    }

    /// Display name used for list ordering and message attribution
    pub fn presentation(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }

    /// True for the reserved broadcast pseudo-user
    pub fn is_broadcast(&self) -> bool {
        self.username == BROADCAST_USERNAME
    }

    /// Validate the whole profile, reporting the first problem found
    pub fn validate(&self) -> Result<(), SharedError> {
        validate_name_field("firstname", &self.firstname)?;
        validate_name_field("lastname", &self.lastname)?;
        validate_name_field("username", &self.username)?;
        Ok(())
    }
}

/// Users order by display presentation, giving the stable list layout.
impl Ord for User {
    fn cmp(&self, other: &Self) -> Ordering {
        self.presentation()
            .cmp(&other.presentation())
            .then_with(|| self.username.cmp(&other.username))
    }
}

impl PartialOrd for User {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lowercase and trim a username before it is used as a key anywhere.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// The conversation a session is currently looking at
///
/// Every connected session has exactly one viewed peer; `Broadcast` is the
/// default after connecting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Peer {
    /// The distinguished "everyone" conversation
    Broadcast,
    /// A direct conversation with one user
    User(String),
}

impl Peer {
    /// Interpret a wire username, mapping the broadcast marker
    pub fn from_username(raw: &str) -> Self {
        let username = normalize_username(raw);
        if username == BROADCAST_USERNAME {
            Peer::Broadcast
        } else {
            Peer::User(username)
        }
    }

    /// The username stored and compared for this peer
    pub fn as_username(&self) -> &str {
        match self {
            Peer::Broadcast => BROADCAST_USERNAME,
            Peer::User(username) => username,
        }
    }

    /// True when this peer names the given user
    pub fn is_user(&self, username: &str) -> bool {
        matches!(self, Peer::User(u) if u == username)
    }
}

/// Length (1..=90) and character-class check shared by all profile fields.
fn validate_name_field(field: &'static str, value: &str) -> Result<(), SharedError> {
    const MIN: usize = 1;
    const MAX: usize = 90;
    let len = value.chars().count();
    if len < MIN || len > MAX {
        return Err(SharedError::validation(
            field,
            format!("must be at least {MIN} and at most {MAX} characters"),
        ));
    }
    if value
        .chars()
        .any(|ch| !(ch.is_alphanumeric() || (' '..='.').contains(&ch) || ch == '@'))
    {
        return Err(SharedError::validation(field, "includes illegal characters"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_is_normalized() {
        let user = User::new("  Alice ", "Alice", "Smith");
        assert_eq!(user.username, "alice");
    }

    #[test]
    fn test_presentation() {
        let user = User::new("bob", "Bob", "Jones");
        assert_eq!(user.presentation(), "Bob Jones");
    }

    #[test]
    fn test_ordering_by_presentation() {
        let mut users = vec![
            User::new("c", "Zoe", "Adams"),
            User::new("a", "Amy", "Baker"),
            User::new("b", "Mia", "Clark"),
        ];
        users.sort();
        let names: Vec<_> = users.iter().map(|u| u.firstname.as_str()).collect();
        assert_eq!(names, vec!["Amy", "Mia", "Zoe"]);
    }

    #[test]
    fn test_validate_rejects_empty_field() {
        let user = User::new("alice", "", "Smith");
        assert!(user.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_illegal_characters() {
        let user = User::new("alice", "Al<script>", "Smith");
        assert!(user.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_regular_profile() {
        let user = User::new("alice", "Alice", "Smith");
        assert!(user.validate().is_ok());
    }

    #[test]
    fn test_broadcast_marker() {
        let user = User::new(BROADCAST_USERNAME, "Broadcast", "");
        assert!(user.is_broadcast());
        assert!(!User::new("alice", "Alice", "Smith").is_broadcast());
    }

    #[test]
    fn test_peer_from_username() {
        assert_eq!(Peer::from_username("Broadcast"), Peer::Broadcast);
        assert_eq!(Peer::from_username("Alice"), Peer::User("alice".to_string()));
        assert!(Peer::User("alice".to_string()).is_user("alice"));
        assert!(!Peer::Broadcast.is_user("alice"));
    }
}
