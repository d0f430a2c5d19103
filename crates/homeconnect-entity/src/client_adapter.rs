//! Bridges a live [`homeconnect_client::Session`] into this crate's
//! [`Transport`] trait, so a real connection can be used anywhere
//! `T: Transport + Clone` is required without a wrapper type.

use std::time::Duration;

use homeconnect_client::{Environment, Session};
use homeconnect_proto::Message;

use crate::{error::EntityError, runtime::Transport};

impl<E: Environment> Transport for Session<E> {
    async fn send_sync(&self, message: Message, timeout: Duration) -> Result<Message, EntityError> {
        Session::send_sync(self, message, timeout).await.map_err(|err| EntityError::Transport(err.to_string()))
    }
}
