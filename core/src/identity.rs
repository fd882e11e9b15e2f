// larder/src/identity.rs

use crate::model::User;
use tokio::sync::watch;

/// Who is signed in, and a way to follow changes.
pub trait IdentityProvider: Send + Sync {
  fn current(&self) -> Option<User>;
  fn subscribe(&self) -> watch::Receiver<Option<User>>;
}

/// Identity set explicitly by the host application.
#[derive(Debug)]
pub struct StaticIdentity {
  sender: watch::Sender<Option<User>>,
}

impl StaticIdentity {
  pub fn signed_out() -> Self {
    let (sender, _) = watch::channel(None);
    Self { sender }
  }

  pub fn signed_in(user: User) -> Self {
    let (sender, _) = watch::channel(Some(user));
    Self { sender }
  }

  pub fn sign_in(&self, user: User) {
    tracing::info!(user_id = %user.uid, "User signed in.");
    self.sender.send_replace(Some(user));
  }

  pub fn sign_out(&self) {
    tracing::info!("User signed out.");
    self.sender.send_replace(None);
  }
}

impl Default for StaticIdentity {
  fn default() -> Self {
    Self::signed_out()
  }
}

impl IdentityProvider for StaticIdentity {
  fn current(&self) -> Option<User> {
    self.sender.borrow().clone()
  }

  fn subscribe(&self) -> watch::Receiver<Option<User>> {
    self.sender.subscribe()
  }
}
