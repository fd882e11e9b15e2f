// larder/src/model/user.rs

/// The signed-in identity as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
  pub uid: String,
  pub email: Option<String>,
}

impl User {
  pub fn new(uid: impl Into<String>) -> Self {
    Self {
      uid: uid.into(),
      email: None,
    }
  }
}

/// Field names of a user record.
pub mod fields {
  pub const WALLET: &str = "wallet";
}
