//! Verb helpers: `request` with the method fixed.

use super::{Channel, PendingResponse};
use crate::domain::envelope::ActionOptions;
use crate::domain::error::MuxResult;
use crate::domain::verb::Verb;
use serde::de::DeserializeOwned;

impl Channel {
    pub fn get<T: DeserializeOwned>(
        &self,
        options: ActionOptions,
    ) -> MuxResult<PendingResponse<T>> {
        self.request(options.with_method(Verb::Get))
    }

    pub fn post<T: DeserializeOwned>(
        &self,
        options: ActionOptions,
    ) -> MuxResult<PendingResponse<T>> {
        self.request(options.with_method(Verb::Post))
    }

    pub fn put<T: DeserializeOwned>(
        &self,
        options: ActionOptions,
    ) -> MuxResult<PendingResponse<T>> {
        self.request(options.with_method(Verb::Put))
    }

    pub fn patch<T: DeserializeOwned>(
        &self,
        options: ActionOptions,
    ) -> MuxResult<PendingResponse<T>> {
        self.request(options.with_method(Verb::Patch))
    }

    pub fn delete<T: DeserializeOwned>(
        &self,
        options: ActionOptions,
    ) -> MuxResult<PendingResponse<T>> {
        self.request(options.with_method(Verb::Delete))
    }
}
