use async_trait::async_trait;
use mockall::mock;
use visitbook_core::models::{
    booking::{BookingRecord, CancelOutcome, SubmissionRequest, SubmitOutcome},
    slot::SlotsPayload,
};

use crate::{delivery::CodeSender, BookingBackend};

// Mock collaborators for testing
mock! {
    pub Backend {}

    #[async_trait]
    impl BookingBackend for Backend {
        async fn get_slots(&self) -> eyre::Result<SlotsPayload>;

        async fn get_booking(&self, address: &str) -> eyre::Result<BookingRecord>;

        async fn submit_booking(&self, request: &SubmissionRequest) -> eyre::Result<SubmitOutcome>;

        async fn cancel_booking(&self, address: &str) -> eyre::Result<CancelOutcome>;
    }
}

mock! {
    pub CodeDelivery {}

    #[async_trait]
    impl CodeSender for CodeDelivery {
        async fn send_code(&self, address: &str, code: &str) -> eyre::Result<()>;
    }
}
