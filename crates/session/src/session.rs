use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tracing::{debug, info, warn};
use uuid::Uuid;
use visitbook_backend::{BookingBackend, CodeSender};
use visitbook_core::{
    errors::{BookingError, BookingResult, CancelFailure, RequestKind},
    filter,
    models::{
        booking::{Booking, BookingRecord, CancelOutcome, SubmissionRequest, SubmitOutcome},
        selection::Selection,
        slot::{Slot, SlotKey, SlotsPayload},
    },
};

use crate::{
    catalog::SlotCatalog,
    config::SessionConfig,
    verification::{CodeIssue, VerificationFlow, VerificationPhase},
};

const BOOKING_FAILED: &str = "Booking failed.";

/// Where a session stands, as far as the user is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unverified,
    Verifying,
    Browsing,
    Booked,
}

/// Handle for an outstanding backend request.
///
/// Hand it back to the matching `finish_*` method together with the
/// backend's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    kind: RequestKind,
    seq: u64,
    generation: u64,
    address: String,
}

impl Ticket {
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Address the request was made for.
    pub fn address(&self) -> &str {
        &self.address
    }
}

/// Ticket for a booking submission, carrying what was submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTicket {
    ticket: Ticket,
    request: SubmissionRequest,
    booking: Booking,
}

impl SubmitTicket {
    pub fn request(&self) -> &SubmissionRequest {
        &self.request
    }
}

/// Whether a backend response was applied or dropped as stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery<T> {
    Applied(T),
    /// The response belonged to a superseded address or was overtaken by a
    /// newer request of the same kind. Nothing changed.
    Discarded,
}

impl<T> Delivery<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Delivery::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Delivery::Applied(value) => Some(value),
            Delivery::Discarded => None,
        }
    }
}

/// One visitor's booking session.
///
/// Owns the verification flow, the slot catalog snapshot, the in-progress
/// selection and at most one booking. Every method runs to completion
/// before the next event is handled; backend calls go through
/// `begin_*`/`finish_*` pairs (or the `async` helpers that chain them) so
/// late answers for an old address are dropped instead of applied.
pub struct BookingSession {
    id: Uuid,
    backend: Arc<dyn BookingBackend>,
    sender: Arc<dyn CodeSender>,
    verification: VerificationFlow,
    catalog: SlotCatalog,
    selection: Selection,
    booking: Option<Booking>,
    generation: u64,
    next_seq: u64,
    latest: HashMap<RequestKind, u64>,
    in_flight: HashSet<RequestKind>,
    status: Option<String>,
}

impl BookingSession {
    pub fn new(
        backend: Arc<dyn BookingBackend>,
        sender: Arc<dyn CodeSender>,
        config: &SessionConfig,
    ) -> Self {
        let id = Uuid::new_v4();
        debug!(session = %id, "Booking session created");

        Self {
            id,
            backend,
            sender,
            verification: VerificationFlow::new(config.code_cooldown_secs, config.code_source()),
            catalog: SlotCatalog::default(),
            selection: Selection::default(),
            booking: None,
            generation: 0,
            next_seq: 0,
            latest: HashMap::new(),
            in_flight: HashSet::new(),
            status: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        match self.verification.phase() {
            VerificationPhase::Idle => SessionPhase::Unverified,
            VerificationPhase::CodeIssued => SessionPhase::Verifying,
            VerificationPhase::Verified if self.booking.is_some() => SessionPhase::Booked,
            VerificationPhase::Verified => SessionPhase::Browsing,
        }
    }

    pub fn verification(&self) -> &VerificationFlow {
        &self.verification
    }

    pub fn catalog(&self) -> &SlotCatalog {
        &self.catalog
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn booking(&self) -> Option<&Booking> {
        self.booking.as_ref()
    }

    /// Latest user-facing message, success or failure.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    /// True while any backend request is outstanding.
    pub fn is_loading(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn is_in_flight(&self, kind: RequestKind) -> bool {
        self.in_flight.contains(&kind)
    }

    /// Visit 1 slots that fit the current Visit 2 choice.
    pub fn visit1_options(&self) -> Vec<&Slot> {
        filter::admissible_visit1(self.selection.visit2.as_ref(), self.catalog.visit1())
    }

    /// Visit 2 slots that fit the current Visit 1 choice.
    pub fn visit2_options(&self) -> Vec<&Slot> {
        filter::admissible_visit2(self.selection.visit1.as_ref(), self.catalog.visit2())
    }

    fn say(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    fn record<T>(&mut self, result: BookingResult<T>) -> BookingResult<T> {
        if let Err(e) = &result {
            self.status = Some(e.to_string());
        }
        result
    }

    /// Drops everything tied to the previous address. Answers to requests
    /// made for it are discarded when they arrive.
    fn supersede(&mut self) {
        self.generation += 1;
        self.booking = None;
        self.selection.clear();
        self.in_flight.retain(|kind| *kind == RequestKind::Slots);
    }

    fn issue_ticket(&mut self, kind: RequestKind) -> Ticket {
        self.next_seq += 1;
        self.latest.insert(kind, self.next_seq);
        self.in_flight.insert(kind);

        debug!(session = %self.id, seq = self.next_seq, "Issuing {}", kind);
        Ticket {
            kind,
            seq: self.next_seq,
            generation: self.generation,
            address: self.verification.address().to_string(),
        }
    }

    /// Decides whether the answer for `ticket` may be applied, and if so
    /// marks the request as finished.
    fn settle(&mut self, ticket: &Ticket) -> bool {
        if self.latest.get(&ticket.kind) != Some(&ticket.seq) {
            debug!(session = %self.id, seq = ticket.seq, "Discarding overtaken {} response", ticket.kind);
            return false;
        }

        // The slot catalog is shared by every address; everything else
        // belongs to the address the request was made for.
        if ticket.kind != RequestKind::Slots && ticket.generation != self.generation {
            debug!(
                session = %self.id,
                "Discarding {} response for previous address {}",
                ticket.kind,
                ticket.address
            );
            return false;
        }

        self.in_flight.remove(&ticket.kind);
        true
    }

    /// Makes every outstanding request of `kind` stale without issuing a
    /// new one.
    fn invalidate(&mut self, kind: RequestKind) {
        self.latest.remove(&kind);
        if self.in_flight.remove(&kind) {
            debug!(session = %self.id, "Outstanding {} is now stale", kind);
        }
    }

    fn ensure_browsing(&self) -> BookingResult<()> {
        if !self.verification.is_verified() {
            return Err(BookingError::validation("Verify your email first."));
        }
        if self.booking.is_some() {
            return Err(BookingError::validation("You already have a booking."));
        }
        Ok(())
    }

    // Identity and verification

    /// Sets the visitor's name and address. A different address resets
    /// verification and clears the booking and selection held for the old
    /// one.
    pub fn set_identity(&mut self, name: &str, address: &str) {
        self.verification.set_display_name(name);

        if self.verification.change_address(address) {
            info!(session = %self.id, "Address changed to {}", self.verification.address());
            self.supersede();
        }
    }

    /// Issues a verification code without delivering it.
    ///
    /// # Errors
    ///
    /// `BookingError::Validation` if the name or address is blank.
    pub fn issue_code(&mut self, name: &str, address: &str) -> BookingResult<CodeIssue> {
        if name.trim().is_empty() || address.trim().is_empty() {
            return self.record(Err(BookingError::validation("Name and Email required.")));
        }

        self.set_identity(name, address);
        let result = self.verification.issue_code(name, address);
        self.record(result)
    }

    /// Issues a verification code and hands it to the delivery collaborator.
    ///
    /// Delivery failures are logged and otherwise ignored. While the
    /// countdown from the previous code is running this does nothing and
    /// returns [`CodeIssue::Throttled`].
    pub async fn request_code(&mut self, name: &str, address: &str) -> BookingResult<CodeIssue> {
        let issue = self.issue_code(name, address)?;

        if let CodeIssue::Issued { address, code } = &issue {
            let sender = Arc::clone(&self.sender);
            if let Err(e) = sender.send_code(address, code).await {
                warn!(session = %self.id, "Failed to deliver verification code to {}: {:#}", address, e);
            }
            self.say(format!(
                "A verification code has been sent to {}. If not received, check spam folder.",
                address
            ));
        }

        Ok(issue)
    }

    /// Advances the code countdown by one second.
    pub fn tick(&mut self) -> u32 {
        self.verification.tick()
    }

    /// Checks a submitted code. Returns `true` on the transition into the
    /// verified state.
    pub fn verify_code(&mut self, code: &str) -> BookingResult<bool> {
        let result = self.verification.verify(code);
        if let Ok(true) = result {
            self.say("Email verified.");
        }
        self.record(result)
    }

    /// Checks a submitted code and, on success, loads the slot catalog and
    /// any existing booking.
    ///
    /// Verification stands even when those loads fail. The first of their
    /// failures is returned inside `Ok` and left in [`BookingSession::status`].
    pub async fn verify(&mut self, code: &str) -> BookingResult<Option<BookingError>> {
        if !self.verify_code(code)? {
            return Ok(None);
        }

        let refreshed = self.refresh_catalog().await.err();
        let loaded = self.load_booking().await.err();

        let first = refreshed.or(loaded);
        if let Some(e) = &first {
            self.status = Some(e.to_string());
        }
        Ok(first)
    }

    // Selection

    /// Chooses (or clears) the Visit 1 slot. A Visit 2 choice that no
    /// longer falls on the following day is cleared.
    pub fn select_visit1(&mut self, key: Option<SlotKey>) -> BookingResult<()> {
        let result = self.apply_visit1(key);
        self.record(result)
    }

    fn apply_visit1(&mut self, key: Option<SlotKey>) -> BookingResult<()> {
        self.ensure_browsing()?;

        let Some(key) = key else {
            self.selection.visit1 = None;
            return Ok(());
        };

        let slot = self
            .catalog
            .find_visit1(key)
            .cloned()
            .ok_or_else(|| BookingError::validation(format!("Visit 1 slot {} is not available", key)))?;

        let stale = self
            .selection
            .visit2
            .as_ref()
            .is_some_and(|visit2| !filter::are_compatible(&slot, visit2));
        if stale {
            debug!(session = %self.id, "Clearing Visit 2 after Visit 1 moved to {}", key);
            self.selection.visit2 = None;
        }
        self.selection.visit1 = Some(slot);
        Ok(())
    }

    /// Chooses (or clears) the Visit 2 slot. A Visit 1 choice that no
    /// longer falls on the previous day is cleared.
    pub fn select_visit2(&mut self, key: Option<SlotKey>) -> BookingResult<()> {
        let result = self.apply_visit2(key);
        self.record(result)
    }

    fn apply_visit2(&mut self, key: Option<SlotKey>) -> BookingResult<()> {
        self.ensure_browsing()?;

        let Some(key) = key else {
            self.selection.visit2 = None;
            return Ok(());
        };

        let slot = self
            .catalog
            .find_visit2(key)
            .cloned()
            .ok_or_else(|| BookingError::validation(format!("Visit 2 slot {} is not available", key)))?;

        let stale = self
            .selection
            .visit1
            .as_ref()
            .is_some_and(|visit1| !filter::are_compatible(visit1, &slot));
        if stale {
            debug!(session = %self.id, "Clearing Visit 1 after Visit 2 moved to {}", key);
            self.selection.visit1 = None;
        }
        self.selection.visit2 = Some(slot);
        Ok(())
    }

    /// Re-points the selection at the current snapshot, dropping choices
    /// whose slots are gone.
    fn reconcile_selection(&mut self) {
        let visit1 = self
            .selection
            .visit1
            .take()
            .and_then(|slot| self.catalog.find_visit1(slot.key()).cloned());
        let visit2 = self
            .selection
            .visit2
            .take()
            .and_then(|slot| self.catalog.find_visit2(slot.key()).cloned());

        self.selection = Selection { visit1, visit2 };
        if !self.selection.is_consistent() {
            self.selection.visit2 = None;
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Clears both choices and refreshes the catalog.
    pub async fn reset_selection(&mut self) -> BookingResult<Delivery<()>> {
        self.clear_selection();
        self.refresh_catalog().await
    }

    // Slot catalog

    pub fn begin_refresh(&mut self) -> Ticket {
        self.issue_ticket(RequestKind::Slots)
    }

    pub fn finish_refresh(
        &mut self,
        ticket: Ticket,
        fetched: eyre::Result<SlotsPayload>,
    ) -> BookingResult<Delivery<()>> {
        if !self.settle(&ticket) {
            return Ok(Delivery::Discarded);
        }

        let result = self.catalog.apply_fetch(fetched);
        if result.is_ok() {
            self.reconcile_selection();
        }
        self.record(result).map(Delivery::Applied)
    }

    /// Replaces the catalog with the backend's current snapshot. On failure
    /// the previous snapshot stays in place.
    pub async fn refresh_catalog(&mut self) -> BookingResult<Delivery<()>> {
        let ticket = self.begin_refresh();
        let backend = Arc::clone(&self.backend);
        let fetched = backend.get_slots().await;
        self.finish_refresh(ticket, fetched)
    }

    // Booking lookup

    pub fn begin_load_booking(&mut self) -> BookingResult<Ticket> {
        if !self.verification.is_verified() {
            return self.record(Err(BookingError::validation("Verify your email first.")));
        }
        Ok(self.issue_ticket(RequestKind::Booking))
    }

    pub fn finish_load_booking(
        &mut self,
        ticket: Ticket,
        fetched: eyre::Result<BookingRecord>,
    ) -> BookingResult<Delivery<Option<Booking>>> {
        if !self.settle(&ticket) {
            return Ok(Delivery::Discarded);
        }

        let result = match fetched {
            Ok(record) => {
                self.booking = Booking::from_record(record);
                if self.booking.is_some() {
                    self.selection.clear();
                }
                Ok(Delivery::Applied(self.booking.clone()))
            }
            Err(e) => {
                warn!(session = %self.id, "Booking lookup for {} failed: {:#}", ticket.address, e);
                Err(BookingError::Fetch("Could not fetch booking".to_string()))
            }
        };
        self.record(result)
    }

    /// Fetches the booking held by the verified address. No booking is a
    /// normal answer, not an error.
    pub async fn load_booking(&mut self) -> BookingResult<Delivery<Option<Booking>>> {
        let ticket = self.begin_load_booking()?;
        let backend = Arc::clone(&self.backend);
        let fetched = backend.get_booking(&ticket.address).await;
        self.finish_load_booking(ticket, fetched)
    }

    // Submission

    /// Validates the selection and starts a submission.
    ///
    /// # Errors
    ///
    /// - `BookingError::InFlight` while another submission is outstanding
    /// - `BookingError::Validation` when unverified, already booked, the name
    ///   is blank, a visit is missing, or the visits are not one day apart
    pub fn begin_submit(&mut self) -> BookingResult<SubmitTicket> {
        let selection = self.selection.clone();
        self.begin_submit_selection(&selection)
    }

    /// Like [`BookingSession::begin_submit`], for a selection held by the
    /// caller instead of the session's own.
    pub fn begin_submit_selection(&mut self, selection: &Selection) -> BookingResult<SubmitTicket> {
        let result = self.prepare_submission(selection);
        self.record(result)
    }

    fn prepare_submission(&mut self, selection: &Selection) -> BookingResult<SubmitTicket> {
        if self.is_in_flight(RequestKind::Submit) {
            return Err(BookingError::InFlight(RequestKind::Submit));
        }
        self.ensure_browsing()?;

        let name = self.verification.display_name().to_string();
        if name.is_empty() {
            return Err(BookingError::validation("Name is required."));
        }

        let (Some(visit1), Some(visit2)) = (&selection.visit1, &selection.visit2) else {
            return Err(BookingError::validation("Select both slots"));
        };

        if !filter::are_compatible(visit1, visit2) {
            return Err(BookingError::validation(
                "Visit 2 must be exactly one day after Visit 1.",
            ));
        }

        let request = SubmissionRequest {
            address: self.verification.address().to_string(),
            name,
            visit1: visit1.key(),
            visit2: visit2.key(),
        };
        let booking = Booking::from_slots(visit1, visit2);
        let ticket = self.issue_ticket(RequestKind::Submit);

        Ok(SubmitTicket {
            ticket,
            request,
            booking,
        })
    }

    /// Applies the backend's answer to a submission. On success the booking
    /// is set and the selection cleared; the caller should refresh the
    /// catalog. On failure the selection is kept.
    pub fn finish_submit(
        &mut self,
        ticket: SubmitTicket,
        outcome: eyre::Result<SubmitOutcome>,
    ) -> BookingResult<Delivery<Booking>> {
        if !self.settle(&ticket.ticket) {
            return Ok(Delivery::Discarded);
        }

        let result = match outcome {
            Ok(SubmitOutcome { success: true, .. }) => {
                info!(
                    session = %self.id,
                    "Booked {} and {} for {}",
                    ticket.request.visit1,
                    ticket.request.visit2,
                    ticket.request.address
                );
                self.booking = Some(ticket.booking.clone());
                self.selection.clear();
                // A lookup started earlier would report the pre-submit state.
                self.invalidate(RequestKind::Booking);
                self.say("Booking successful!");
                Ok(Delivery::Applied(ticket.booking))
            }
            Ok(SubmitOutcome { message, .. }) => {
                let reason = message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| BOOKING_FAILED.to_string());
                Err(BookingError::Submission(reason))
            }
            Err(e) => {
                warn!(session = %self.id, "Submitting booking failed: {:#}", e);
                Err(BookingError::Submission("Error submitting booking".to_string()))
            }
        };
        self.record(result)
    }

    /// Submits the current selection and, once booked, refreshes the
    /// catalog so the taken slots disappear.
    pub async fn submit(&mut self) -> BookingResult<Delivery<Booking>> {
        let ticket = self.begin_submit()?;
        self.complete_submit(ticket).await
    }

    /// Submits a selection held by the caller.
    pub async fn submit_selection(&mut self, selection: &Selection) -> BookingResult<Delivery<Booking>> {
        let ticket = self.begin_submit_selection(selection)?;
        self.complete_submit(ticket).await
    }

    async fn complete_submit(&mut self, ticket: SubmitTicket) -> BookingResult<Delivery<Booking>> {
        let backend = Arc::clone(&self.backend);
        let outcome = backend.submit_booking(ticket.request()).await;

        let delivery = self.finish_submit(ticket, outcome)?;
        if delivery.is_applied() {
            let _ = self.refresh_catalog().await;
        }
        Ok(delivery)
    }

    // Cancellation

    /// Starts cancelling the current booking.
    ///
    /// # Errors
    ///
    /// - `BookingError::InFlight` while another cancellation is outstanding
    /// - `BookingError::Validation` when unverified or there is no booking
    pub fn begin_cancel(&mut self) -> BookingResult<Ticket> {
        let result = if self.is_in_flight(RequestKind::Cancel) {
            Err(BookingError::InFlight(RequestKind::Cancel))
        } else if !self.verification.is_verified() {
            Err(BookingError::validation("Verify your email first."))
        } else if self.booking.is_none() {
            Err(BookingError::validation("There is no booking to cancel."))
        } else {
            Ok(self.issue_ticket(RequestKind::Cancel))
        };
        self.record(result)
    }

    /// Applies the backend's answer to a cancellation. A transport failure
    /// and a "no booking found" answer are reported differently; neither
    /// touches local state.
    pub fn finish_cancel(
        &mut self,
        ticket: Ticket,
        outcome: eyre::Result<CancelOutcome>,
    ) -> BookingResult<Delivery<()>> {
        if !self.settle(&ticket) {
            return Ok(Delivery::Discarded);
        }

        let result = match outcome {
            Ok(CancelOutcome { success: true }) => {
                info!(session = %self.id, "Booking for {} cancelled", ticket.address);
                self.booking = None;
                self.selection.clear();
                self.invalidate(RequestKind::Booking);
                self.say("Booking cancelled.");
                Ok(Delivery::Applied(()))
            }
            Ok(CancelOutcome { success: false }) => {
                Err(BookingError::Cancellation(CancelFailure::NoBookingFound))
            }
            Err(e) => {
                warn!(session = %self.id, "Cancelling booking failed: {:#}", e);
                Err(BookingError::Cancellation(CancelFailure::Transport(e.to_string())))
            }
        };
        self.record(result)
    }

    /// Cancels the current booking and refreshes the catalog so the freed
    /// slots reappear.
    pub async fn cancel(&mut self) -> BookingResult<Delivery<()>> {
        let ticket = self.begin_cancel()?;
        let backend = Arc::clone(&self.backend);
        let outcome = backend.cancel_booking(&ticket.address).await;

        let delivery = self.finish_cancel(ticket, outcome)?;
        if delivery.is_applied() {
            let _ = self.refresh_catalog().await;
        }
        Ok(delivery)
    }
}
