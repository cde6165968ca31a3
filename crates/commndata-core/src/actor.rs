//! The acting user whose name is stamped into audit fields.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A non-empty username supplied by the calling layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Actor(String);

impl Actor {
  pub fn new(name: impl Into<String>) -> Result<Self> {
    let name = name.into();
    if name.trim().is_empty() {
      return Err(Error::EmptyActor);
    }
    Ok(Self(name))
  }

  pub fn name(&self) -> &str { &self.0 }
}

impl TryFrom<String> for Actor {
  type Error = Error;

  fn try_from(name: String) -> Result<Self> { Self::new(name) }
}

impl From<Actor> for String {
  fn from(actor: Actor) -> Self { actor.0 }
}

impl fmt::Display for Actor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}
