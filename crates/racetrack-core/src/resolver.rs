//! Tag resolution — the lookup step between a reader frame and an event.

use std::{future::Future, sync::Arc};

use crate::{
  error::StoreError, participant::ParticipantId, store::ParticipantRegistry,
};

/// Turns a raw tag string into a participant identity.
///
/// `Ok(None)` is the "not found" outcome: an unregistered or misread tag is
/// an expected steady-state event, not an error.
pub trait TagResolver: Send + Sync {
  type Error: StoreError;

  fn resolve<'a>(
    &'a self,
    tag: &'a str,
  ) -> impl Future<Output = Result<Option<ParticipantId>, Self::Error>> + Send + 'a;
}

/// A [`TagResolver`] backed directly by a [`ParticipantRegistry`].
pub struct RegistryResolver<R> {
  registry: Arc<R>,
}

impl<R> RegistryResolver<R> {
  pub fn new(registry: Arc<R>) -> Self { Self { registry } }
}

impl<R> Clone for RegistryResolver<R> {
  fn clone(&self) -> Self {
    Self {
      registry: Arc::clone(&self.registry),
    }
  }
}

impl<R: ParticipantRegistry> TagResolver for RegistryResolver<R> {
  type Error = R::Error;

  async fn resolve(&self, tag: &str) -> Result<Option<ParticipantId>, R::Error> {
    self.registry.find_by_tag(tag).await
  }
}
