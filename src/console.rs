//! Line-oriented driver for a [`BookingSession`].
//!
//! Input lines, countdown ticks and backend replies are handled one at a
//! time from a single `select!` loop. Backend calls run on spawned tasks and
//! report back over a channel, so the prompt stays responsive while a
//! request is outstanding.

use std::sync::Arc;

use chrono::Local;
use color_eyre::eyre::Result;
use tokio::{
    io::{stdin, AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{debug, warn};
use visitbook_backend::BookingBackend;
use visitbook_core::models::{
    booking::{BookingRecord, CancelOutcome, SubmitOutcome},
    slot::{Slot, SlotKey, SlotsPayload},
};
use visitbook_session::{
    verification::CountdownTimer, BookingSession, CodeIssue, SessionPhase, SubmitTicket, Ticket,
};

const HELP: &str = "\
Commands:
  code <email> <name>   send a verification code
  verify <code>         enter the code you received
  slots                 refresh available slots
  pick1 <n|key|none>    choose Visit 1 (option number or YYYY-MM-DD|HH:MM)
  pick2 <n|key|none>    choose Visit 2
  reset                 clear both choices and refresh
  submit                book the chosen pair
  cancel                cancel your booking
  booking               reload your booking
  show                  print the current state
  quit";

enum Reply {
    Slots(Ticket, eyre::Result<SlotsPayload>),
    Booking(Ticket, eyre::Result<BookingRecord>),
    Submit(SubmitTicket, eyre::Result<SubmitOutcome>),
    Cancel(Ticket, eyre::Result<CancelOutcome>),
}

struct Console {
    session: BookingSession,
    backend: Arc<dyn BookingBackend>,
    replies: mpsc::UnboundedSender<Reply>,
}

pub async fn run(session: BookingSession, backend: Arc<dyn BookingBackend>) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut console = Console {
        session,
        backend,
        replies: tx,
    };
    let mut timer = CountdownTimer::default();
    let mut lines = BufReader::new(stdin()).lines();

    println!("{}", HELP);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !console.handle_line(line.trim()).await {
                    break;
                }
            }
            _ = timer.tick() => {
                if console.session.tick() == 0 {
                    println!("You can request a new code.");
                }
            }
            Some(reply) = rx.recv() => console.handle_reply(reply),
        }

        timer.sync(console.session.verification().countdown_running());
    }

    Ok(())
}

impl Console {
    /// Returns `false` when the user asked to quit.
    async fn handle_line(&mut self, line: &str) -> bool {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "" => {}
            "quit" | "exit" => return false,
            "help" => println!("{}", HELP),
            "show" => self.render(),
            "code" => self.request_code(rest).await,
            "verify" => self.verify(rest),
            "slots" => self.refresh(),
            "pick1" => self.pick(rest, true),
            "pick2" => self.pick(rest, false),
            "reset" => {
                self.session.clear_selection();
                self.refresh();
            }
            "submit" => self.submit(),
            "cancel" => self.cancel(),
            "booking" => self.load_booking(),
            other => println!("Unknown command {:?}. Type `help`.", other),
        }
        true
    }

    async fn request_code(&mut self, rest: &str) {
        let (address, name) = rest.split_once(' ').unwrap_or((rest, ""));

        match self.session.request_code(name, address).await {
            Ok(CodeIssue::Throttled { remaining_secs }) => {
                println!("Please wait {}s before requesting another code.", remaining_secs)
            }
            Ok(CodeIssue::AlreadyVerified) => println!("{} is already verified.", address),
            Ok(CodeIssue::Issued { .. }) | Err(_) => self.print_status(),
        }
    }

    fn verify(&mut self, code: &str) {
        match self.session.verify_code(code) {
            Ok(true) => {
                self.print_status();
                self.refresh();
                self.load_booking();
            }
            Ok(false) => println!("Already verified."),
            Err(_) => self.print_status(),
        }
    }

    fn refresh(&mut self) {
        let ticket = self.session.begin_refresh();
        let backend = Arc::clone(&self.backend);
        let replies = self.replies.clone();

        tokio::spawn(async move {
            let fetched = backend.get_slots().await;
            let _ = replies.send(Reply::Slots(ticket, fetched));
        });
    }

    fn load_booking(&mut self) {
        let Ok(ticket) = self.session.begin_load_booking() else {
            return self.print_status();
        };
        let backend = Arc::clone(&self.backend);
        let replies = self.replies.clone();

        tokio::spawn(async move {
            let fetched = backend.get_booking(ticket.address()).await;
            let _ = replies.send(Reply::Booking(ticket, fetched));
        });
    }

    fn submit(&mut self) {
        let Ok(ticket) = self.session.begin_submit() else {
            return self.print_status();
        };
        println!("Submitting...");
        let backend = Arc::clone(&self.backend);
        let replies = self.replies.clone();

        tokio::spawn(async move {
            let outcome = backend.submit_booking(ticket.request()).await;
            let _ = replies.send(Reply::Submit(ticket, outcome));
        });
    }

    fn cancel(&mut self) {
        let Ok(ticket) = self.session.begin_cancel() else {
            return self.print_status();
        };
        println!("Cancelling...");
        let backend = Arc::clone(&self.backend);
        let replies = self.replies.clone();

        tokio::spawn(async move {
            let outcome = backend.cancel_booking(ticket.address()).await;
            let _ = replies.send(Reply::Cancel(ticket, outcome));
        });
    }

    fn pick(&mut self, choice: &str, first: bool) {
        let key = match self.resolve_choice(choice, first) {
            Ok(key) => key,
            Err(message) => return println!("{}", message),
        };

        let result = if first {
            self.session.select_visit1(key)
        } else {
            self.session.select_visit2(key)
        };

        match result {
            Ok(()) => self.render(),
            Err(_) => self.print_status(),
        }
    }

    /// Turns `none`, a 1-based option number or a slot key into a choice.
    fn resolve_choice(&self, choice: &str, first: bool) -> std::result::Result<Option<SlotKey>, String> {
        if choice.is_empty() || choice == "none" {
            return Ok(None);
        }

        if let Ok(n) = choice.parse::<usize>() {
            let options = if first {
                self.session.visit1_options()
            } else {
                self.session.visit2_options()
            };
            return n
                .checked_sub(1)
                .and_then(|i| options.get(i))
                .map(|slot| Some(slot.key()))
                .ok_or_else(|| format!("No option {}", n));
        }

        choice.parse::<SlotKey>().map(Some).map_err(|e| e.to_string())
    }

    fn handle_reply(&mut self, reply: Reply) {
        let applied = match reply {
            Reply::Slots(ticket, fetched) => self.session.finish_refresh(ticket, fetched).map(|d| d.is_applied()),
            Reply::Booking(ticket, fetched) => {
                self.session.finish_load_booking(ticket, fetched).map(|d| d.is_applied())
            }
            Reply::Submit(ticket, outcome) => {
                let result = self.session.finish_submit(ticket, outcome).map(|d| d.is_applied());
                if matches!(result, Ok(true)) {
                    self.refresh();
                }
                result
            }
            Reply::Cancel(ticket, outcome) => {
                let result = self.session.finish_cancel(ticket, outcome).map(|d| d.is_applied());
                if matches!(result, Ok(true)) {
                    self.refresh();
                }
                result
            }
        };

        match applied {
            Ok(true) => self.render(),
            Ok(false) => debug!("Dropped stale backend reply"),
            Err(e) => {
                warn!("{}", e);
                self.print_status();
            }
        }
    }

    fn print_status(&mut self) {
        if let Some(status) = self.session.status() {
            println!("{}", status);
        }
        self.session.clear_status();
    }

    fn render(&mut self) {
        let session = &self.session;
        let verification = session.verification();

        println!();
        match session.phase() {
            SessionPhase::Unverified => println!("Not verified. Use `code <email> <name>`."),
            SessionPhase::Verifying => println!(
                "Waiting for the code sent to {} (resend in {}s)",
                verification.address(),
                verification.remaining_secs()
            ),
            SessionPhase::Browsing => {
                println!("Booking as {} <{}>", verification.display_name(), verification.address());
                let catalog = session.catalog();
                if !catalog.is_loaded() {
                    println!("Loading slots...");
                } else if let Some(at) = catalog.refreshed_at() {
                    println!("Slots as of {}", at.with_timezone(&Local).format("%H:%M:%S"));
                }
                print_options("Visit 1", &session.visit1_options(), session.selection().visit1.as_ref());
                print_options("Visit 2", &session.visit2_options(), session.selection().visit2.as_ref());
            }
            SessionPhase::Booked => {
                if let Some(booking) = session.booking() {
                    println!("Your booking:");
                    println!("  Visit 1: {}", booking.describe_visit1());
                    println!("  Visit 2: {}", booking.describe_visit2());
                }
            }
        }
        if session.is_loading() {
            println!("(loading...)");
        }

        self.print_status();
    }
}

fn print_options(title: &str, options: &[&Slot], chosen: Option<&Slot>) {
    println!("{}:", title);
    if options.is_empty() {
        println!("  No matching slots available");
    }
    for (i, slot) in options.iter().enumerate() {
        let marker = if chosen.is_some_and(|c| c.key() == slot.key()) { "*" } else { " " };
        println!("{} {:>2}. {}  [{}]", marker, i + 1, slot.label(), slot.key());
    }
}
