//! Validated user identifier shared by tokens, counter keys, and usage records.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const USER_ID_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("User identifier cannot be empty.")]
	Empty,
	/// The identifier contains whitespace characters.
	#[error("User identifier contains whitespace.")]
	ContainsWhitespace,
	/// The identifier contains a control character.
	#[error("User identifier contains a control character.")]
	ContainsControl,
	/// The identifier exceeded the allowed character count.
	#[error("User identifier exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
}

/// Subject of every credential pair and the partition key for quota and usage state.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);
impl UserId {
	/// Creates a new identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref();

		validate(view)?;

		Ok(Self(view.to_owned()))
	}
}
impl Deref for UserId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for UserId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for UserId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<UserId> for String {
	fn from(value: UserId) -> Self {
		value.0
	}
}
impl TryFrom<String> for UserId {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate(&value)?;

		Ok(Self(value))
	}
}
impl FromStr for UserId {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Debug for UserId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "User({})", self.0)
	}
}
impl Display for UserId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

fn validate(view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace);
	}
	if view.chars().any(char::is_control) {
		return Err(IdentifierError::ContainsControl);
	}
	if view.len() > USER_ID_MAX_LEN {
		return Err(IdentifierError::TooLong { max: USER_ID_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn rejects_blank_and_padded_values() {
		assert_eq!(UserId::new(""), Err(IdentifierError::Empty));
		assert_eq!(UserId::new(" user-1"), Err(IdentifierError::ContainsWhitespace));
		assert_eq!(UserId::new("user\u{00A0}1"), Err(IdentifierError::ContainsWhitespace));

		let user = UserId::new("user-1").expect("Plain identifier should be valid.");

		assert_eq!(user.as_ref(), "user-1");
		assert_eq!(format!("{user:?}"), "User(user-1)");
	}

	#[test]
	fn length_limit_is_inclusive() {
		UserId::new("u".repeat(USER_ID_MAX_LEN)).expect("Exact length should succeed.");

		assert_eq!(
			UserId::new("u".repeat(USER_ID_MAX_LEN + 1)),
			Err(IdentifierError::TooLong { max: USER_ID_MAX_LEN })
		);
	}

	#[test]
	fn serde_enforces_validation() {
		let user: UserId =
			serde_json::from_str("\"user-42\"").expect("User should deserialize successfully.");

		assert_eq!(user.as_ref(), "user-42");
		assert!(serde_json::from_str::<UserId>("\"with space\"").is_err());
	}

	#[test]
	fn borrow_supports_str_lookup() {
		let map: HashMap<UserId, u8> =
			HashMap::from_iter([(UserId::new("user-7").expect("Lookup key should be valid."), 7)]);

		assert_eq!(map.get("user-7"), Some(&7));
	}
}
