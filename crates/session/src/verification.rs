use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info};
use visitbook_core::errors::{BookingError, BookingResult};

/// Seconds a visitor waits before another code can be sent.
pub const CODE_COOLDOWN_SECS: u32 = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationPhase {
    Idle,
    CodeIssued,
    Verified,
}

/// Identity being verified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationState {
    pub address: String,
    pub display_name: String,
    pub code_issued_at: Option<DateTime<Utc>>,
    pub code_expiry: Option<DateTime<Utc>>,
    pub verified: bool,
}

/// Where verification codes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeSource {
    /// Six random digits per issue.
    Random,
    /// The same code every time, for test deployments.
    Fixed(String),
}

impl CodeSource {
    fn next_code(&self) -> String {
        match self {
            CodeSource::Random => format!("{:06}", rand::thread_rng().gen_range(0..1_000_000)),
            CodeSource::Fixed(code) => code.clone(),
        }
    }
}

/// Result of asking for a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeIssue {
    /// A fresh code was issued and must be handed to the delivery collaborator.
    Issued { address: String, code: String },
    /// The countdown from the previous code is still running; nothing changed.
    Throttled { remaining_secs: u32 },
    /// The address is already verified; nothing changed.
    AlreadyVerified,
}

/// Seconds left before a code may be re-issued. Driven one second at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
}

impl Countdown {
    pub fn start(&mut self, secs: u32) {
        self.remaining = secs;
    }

    pub fn tick(&mut self) -> u32 {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining
    }

    pub fn reset(&mut self) {
        self.remaining = 0;
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.remaining > 0
    }
}

/// One-second clock for the countdown.
///
/// The driver calls [`CountdownTimer::sync`] after every event with
/// [`VerificationFlow::countdown_running`]. The interval is dropped as soon
/// as the countdown stops (reaching zero or an address change) and a fresh
/// one is started when a new countdown begins, so no stale tick survives.
#[derive(Debug, Default)]
pub struct CountdownTimer {
    interval: Option<Interval>,
}

impl CountdownTimer {
    pub fn sync(&mut self, running: bool) {
        match (running, self.interval.is_some()) {
            (true, false) => {
                let period = Duration::from_secs(1);
                let mut interval = interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.interval = Some(interval);
            }
            (false, true) => self.interval = None,
            _ => {}
        }
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Resolves on the next second, or never while stopped.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

/// Issues, throttles and checks one-time codes for a single address.
///
/// `Idle -> CodeIssued -> Verified`. Re-issuing is only possible once the
/// countdown reaches zero, and changing the address drops back to `Idle`
/// from any phase.
#[derive(Debug, Clone)]
pub struct VerificationFlow {
    state: VerificationState,
    phase: VerificationPhase,
    countdown: Countdown,
    expected_code: Option<String>,
    cooldown_secs: u32,
    codes: CodeSource,
}

impl Default for VerificationFlow {
    fn default() -> Self {
        Self::new(CODE_COOLDOWN_SECS, CodeSource::Random)
    }
}

impl VerificationFlow {
    pub fn new(cooldown_secs: u32, codes: CodeSource) -> Self {
        Self {
            state: VerificationState::default(),
            phase: VerificationPhase::Idle,
            countdown: Countdown::default(),
            expected_code: None,
            cooldown_secs,
            codes,
        }
    }

    pub fn state(&self) -> &VerificationState {
        &self.state
    }

    pub fn phase(&self) -> VerificationPhase {
        self.phase
    }

    pub fn is_verified(&self) -> bool {
        self.phase == VerificationPhase::Verified
    }

    pub fn address(&self) -> &str {
        &self.state.address
    }

    pub fn display_name(&self) -> &str {
        &self.state.display_name
    }

    pub fn remaining_secs(&self) -> u32 {
        self.countdown.remaining()
    }

    pub fn countdown_running(&self) -> bool {
        self.countdown.is_running()
    }

    pub fn set_display_name(&mut self, name: &str) {
        self.state.display_name = name.trim().to_string();
    }

    /// Switches to `address`, resetting everything tied to the old one.
    ///
    /// Returns `false` when the address is unchanged.
    pub fn change_address(&mut self, address: &str) -> bool {
        let address = address.trim();
        if address == self.state.address {
            return false;
        }

        debug!("Verification reset for new address {}", address);
        self.state = VerificationState {
            address: address.to_string(),
            display_name: std::mem::take(&mut self.state.display_name),
            ..VerificationState::default()
        };
        self.phase = VerificationPhase::Idle;
        self.countdown.reset();
        self.expected_code = None;
        true
    }

    /// Issues a code for `address` unless the countdown is still running.
    ///
    /// # Errors
    ///
    /// `BookingError::Validation` if the name or address is blank.
    pub fn issue_code(&mut self, name: &str, address: &str) -> BookingResult<CodeIssue> {
        if name.trim().is_empty() || address.trim().is_empty() {
            return Err(BookingError::validation("Name and Email required."));
        }

        self.change_address(address);
        self.set_display_name(name);

        if self.is_verified() {
            return Ok(CodeIssue::AlreadyVerified);
        }

        if self.countdown.is_running() {
            return Ok(CodeIssue::Throttled {
                remaining_secs: self.countdown.remaining(),
            });
        }

        let code = self.codes.next_code();
        let now = Utc::now();

        self.state.code_issued_at = Some(now);
        self.state.code_expiry = Some(now + chrono::Duration::seconds(i64::from(self.cooldown_secs)));
        self.expected_code = Some(code.clone());
        self.phase = VerificationPhase::CodeIssued;
        self.countdown.start(self.cooldown_secs);

        info!("Verification code issued for {}", self.state.address);
        Ok(CodeIssue::Issued {
            address: self.state.address.clone(),
            code,
        })
    }

    /// Advances the countdown by one second and returns what is left.
    pub fn tick(&mut self) -> u32 {
        self.countdown.tick()
    }

    /// Checks `submitted` against the issued code.
    ///
    /// Returns `true` on the transition into `Verified` and `false` when the
    /// address was already verified.
    ///
    /// # Errors
    ///
    /// `BookingError::InvalidCode` on any mismatch, or when no code has been
    /// issued. State is left untouched.
    pub fn verify(&mut self, submitted: &str) -> BookingResult<bool> {
        if self.is_verified() {
            return Ok(false);
        }

        match &self.expected_code {
            Some(expected) if expected == submitted => {
                self.phase = VerificationPhase::Verified;
                self.state.verified = true;
                self.expected_code = None;
                self.countdown.reset();
                info!("Address {} verified", self.state.address);
                Ok(true)
            }
            _ => Err(BookingError::InvalidCode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fixed_flow() -> VerificationFlow {
        VerificationFlow::new(3, CodeSource::Fixed("123456".to_string()))
    }

    #[test]
    fn random_codes_are_six_digits() {
        for _ in 0..50 {
            let code = CodeSource::Random.next_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn countdown_saturates_at_zero() {
        let mut countdown = Countdown::default();
        countdown.start(2);
        assert_eq!(countdown.tick(), 1);
        assert_eq!(countdown.tick(), 0);
        assert_eq!(countdown.tick(), 0);
        assert!(!countdown.is_running());
    }

    #[test]
    fn expiry_follows_cooldown() {
        let mut flow = VerificationFlow::new(180, CodeSource::Random);
        flow.issue_code("Ada", "a@x.com").unwrap();

        let state = flow.state();
        let issued = state.code_issued_at.unwrap();
        assert_eq!(state.code_expiry.unwrap() - issued, chrono::Duration::seconds(180));
    }

    #[test]
    fn verifying_without_a_code_fails() {
        let mut flow = fixed_flow();
        flow.change_address("a@x.com");
        assert_eq!(flow.verify("123456"), Err(BookingError::InvalidCode));
        assert_eq!(flow.phase(), VerificationPhase::Idle);
    }

    #[test]
    fn codes_are_single_use() {
        let mut flow = fixed_flow();
        flow.issue_code("Ada", "a@x.com").unwrap();

        assert_eq!(flow.verify("123456"), Ok(true));
        assert_eq!(flow.verify("123456"), Ok(false));
        assert!(flow.is_verified());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_follows_countdown() {
        let mut flow = fixed_flow();
        let mut timer = CountdownTimer::default();

        timer.sync(flow.countdown_running());
        assert!(!timer.is_running());

        flow.issue_code("Ada", "a@x.com").unwrap();
        timer.sync(flow.countdown_running());

        while flow.countdown_running() {
            timer.tick().await;
            flow.tick();
            timer.sync(flow.countdown_running());
        }

        assert!(!timer.is_running());
        assert_eq!(flow.remaining_secs(), 0);
    }
}
