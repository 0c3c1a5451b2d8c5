//! Lookup keys for dependency maps
//!
//! A [`Key`] identifies one registration inside a dependency map. Besides
//! plain strings and integers, a Rust type can act as a key (the moral
//! equivalent of mapping a dependency to a class), and several keys can be
//! combined into a composite key.
//!
//! # Examples
//!
//! ```
//! use dimap::Key;
//!
//! struct Redis;
//!
//! let by_name = Key::from("redis");
//! let by_type = Key::of::<Redis>();
//! let compound = Key::composite([Key::of::<Redis>(), Key::from("cache")]);
//!
//! assert_ne!(by_name, by_type);
//! assert_eq!(compound, Key::composite([Key::of::<Redis>(), Key::from("cache")]));
//! ```

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// Hashable lookup identifier for a dependency map entry.
///
/// Keys are immutable after construction. Equality and hashing compare the
/// wrapped value(s); keys of different kinds never compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
	/// String identifier.
	Str(Arc<str>),
	/// Integer identifier.
	Int(i64),
	/// A Rust type used as identifier.
	Type { id: TypeId, name: &'static str },
	/// Ordered combination of keys.
	Composite(Arc<[Key]>),
}

impl Key {
	/// Key identifying the type `T`.
	pub fn of<T: 'static>() -> Self {
		Key::Type {
			id: TypeId::of::<T>(),
			name: std::any::type_name::<T>(),
		}
	}

	/// Key combining several keys, compared element-wise.
	pub fn composite<I>(parts: I) -> Self
	where
		I: IntoIterator<Item = Key>,
	{
		Key::Composite(parts.into_iter().collect())
	}
}

impl From<&str> for Key {
	fn from(value: &str) -> Self {
		Key::Str(Arc::from(value))
	}
}

impl From<String> for Key {
	fn from(value: String) -> Self {
		Key::Str(Arc::from(value.as_str()))
	}
}

impl From<i64> for Key {
	fn from(value: i64) -> Self {
		Key::Int(value)
	}
}

impl fmt::Display for Key {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Key::Str(s) => write!(f, "{s:?}"),
			Key::Int(i) => write!(f, "{i}"),
			Key::Type { name, .. } => write!(f, "{name}"),
			Key::Composite(parts) => {
				write!(f, "(")?;
				for (i, part) in parts.iter().enumerate() {
					if i > 0 {
						write!(f, ", ")?;
					}
					write!(f, "{part}")?;
				}
				write!(f, ")")
			}
		}
	}
}
