// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The conversation state machine.
//!
//! [`step`] is a pure function: given a session, one inbound payload and the
//! catalog in effect, it returns the next session together with everything
//! that must be committed alongside it (the finalized order, its tokens and
//! the outbound jobs). It never performs I/O; the engine commits the result.
//!
//! ```text
//! AwaitingStart ──any──▶ AwaitingDate ──date──▶ AwaitingJunction ──location──▶ AwaitingMenu
//! AwaitingMenu ──items──▶ AwaitingAddress (delivery) ──address──▶ AwaitingPaymentScreenshot
//! AwaitingMenu ──items──▶ AwaitingPaymentScreenshot (pickup)
//! AwaitingPaymentScreenshot ──image──▶ AwaitingVerification ──link──▶ Completed | Rejected
//! any ──restart──▶ AwaitingStart ──▶ AwaitingDate
//! ```

use chrono::{DateTime, Utc};
use tracing::error;

use sadhya_core::{
    CatalogSnapshot, DraftOrder, InboundPayload, Order, OutboundIntent, OutboxJob, Session, Stage,
    TokenAction, VerificationToken, redact_phone,
};

use crate::ids::IdGenerator;
use crate::order::{self, IncompleteDraft};
use crate::parser::{self, ParseContext, ParsedInput, ValidationError};
use crate::prompts;
use crate::settings::FlowSettings;

/// How many dates the rejection message lists.
const LISTED_DATES: usize = 7;

/// Everything [`step`] reads.
pub struct StepInput<'a> {
    pub session: &'a Session,
    pub payload: &'a InboundPayload,
    pub now: DateTime<Utc>,
    pub catalog: &'a CatalogSnapshot,
    pub settings: &'a FlowSettings,
    pub ids: &'a dyn IdGenerator,
}

/// What happened to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Advanced { from: Stage, to: Stage },
    /// A control token reset the draft; the flow resumed at the date prompt.
    Restarted { from: Stage },
    /// Input rejected; the stage prompt was repeated.
    Reprompted { stage: Stage, error: ValidationError },
    /// The draft could not be finalized and the flow was restarted.
    Recovered { from: Stage, reason: IncompleteDraft },
}

impl StepOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            StepOutcome::Advanced { .. } => "advanced",
            StepOutcome::Restarted { .. } => "restarted",
            StepOutcome::Reprompted { .. } => "reprompted",
            StepOutcome::Recovered { .. } => "recovered",
        }
    }
}

/// Next session state plus the effects to commit with it.
///
/// The returned session keeps the input's version; the caller bumps it
/// when building the commit.
#[derive(Debug, Clone)]
pub struct Step {
    pub session: Session,
    pub order: Option<Order>,
    pub tokens: Vec<VerificationToken>,
    pub jobs: Vec<OutboxJob>,
    pub outcome: StepOutcome,
}

struct Builder<'a> {
    input: &'a StepInput<'a>,
    ctx: ParseContext<'a>,
    next: Session,
    jobs: Vec<OutboxJob>,
}

impl<'a> Builder<'a> {
    fn phone(&self) -> &str {
        &self.input.session.phone
    }

    fn say(&mut self, intents: impl IntoIterator<Item = OutboundIntent>) {
        self.jobs.extend(intents.into_iter().map(OutboxJob::send));
    }

    fn finish(self, outcome: StepOutcome) -> Step {
        Step {
            session: self.next,
            order: None,
            tokens: Vec::new(),
            jobs: self.jobs,
            outcome,
        }
    }

    fn advance(mut self, to: Stage) -> Step {
        let from = self.input.session.stage;
        self.next.stage = to;
        self.finish(StepOutcome::Advanced { from, to })
    }

    fn start_over(&mut self) {
        self.next.draft = DraftOrder::default();
        self.next.order_id = None;
        self.next.stage = Stage::AwaitingDate;
        let dates = self.ctx.available_dates(prompts::BUTTONS_PER_MESSAGE);
        let welcome = prompts::welcome(self.phone(), self.input.settings, &dates);
        self.say([welcome]);
    }

    fn request_payment(mut self) -> Step {
        let order_id = self.input.ids.order_id(self.ctx.today);
        let intents = prompts::payment_request(
            self.phone(),
            &order_id,
            &self.next.draft,
            self.input.settings,
        );
        self.say(intents);
        self.next.order_id = Some(order_id);
        self.advance(Stage::AwaitingPaymentScreenshot)
    }

    fn submit(mut self, media_id: String) -> Step {
        let input = self.input;
        let order_id = match &self.next.order_id {
            Some(id) => id.clone(),
            None => input.ids.order_id(self.ctx.today),
        };
        let order = match order::finalize(
            &self.next.draft,
            order_id,
            &input.session.phone,
            format!("whatsapp-media:{media_id}"),
            input.now,
        ) {
            Ok(order) => order,
            Err(reason) => {
                error!(
                    phone = %redact_phone(&input.session.phone),
                    error = %reason,
                    "draft could not be finalized, restarting flow"
                );
                let from = input.session.stage;
                let apology = prompts::order_error(self.phone());
                self.say([apology]);
                self.start_over();
                return self.finish(StepOutcome::Recovered { from, reason });
            }
        };

        let tokens: Vec<VerificationToken> = [TokenAction::Verify, TokenAction::Reject]
            .into_iter()
            .map(|action| VerificationToken {
                token: input.ids.token(),
                order_id: order.order_id.clone(),
                action,
                consumed_at: None,
                created_at: input.now,
            })
            .collect();

        self.say([prompts::submission_confirmed(&order, input.settings)]);
        let notices: Vec<OutboundIntent> = input
            .settings
            .admin_phones
            .iter()
            .map(|admin| {
                prompts::admin_notification(admin, &order, &tokens, &input.settings.base_url)
            })
            .collect();
        self.say(notices);
        self.jobs.push(OutboxJob::ArchiveProof {
            order_id: order.order_id.clone(),
            media_id,
        });
        self.jobs.push(OutboxJob::SyncOrder {
            order_id: order.order_id.clone(),
        });

        self.next.order_id = Some(order.order_id.clone());
        self.next.draft = DraftOrder::default();
        let mut step = self.advance(Stage::AwaitingVerification);
        step.order = Some(order);
        step.tokens = tokens;
        step
    }

    fn reprompt(mut self, error: ValidationError) -> Step {
        let stage = self.input.session.stage;
        let reason = error.to_string();
        let phone = self.phone().to_string();
        let intents = match stage {
            Stage::AwaitingStart => Vec::new(),
            Stage::AwaitingDate => vec![prompts::date_retry(
                &phone,
                &reason,
                &self.ctx.available_dates(LISTED_DATES),
            )],
            Stage::AwaitingJunction => {
                prompts::junction_prompt(&phone, &format!("{reason}\n\n"), self.input.catalog)
            }
            Stage::AwaitingMenu => vec![prompts::menu_retry(&phone, &reason)],
            Stage::AwaitingAddress => vec![OutboundIntent::text(&phone, reason)],
            Stage::AwaitingPaymentScreenshot => {
                let body = match &self.next.order_id {
                    Some(id) => format!("{reason} (Order *{id}*)"),
                    None => reason,
                };
                vec![OutboundIntent::text(&phone, body)]
            }
            Stage::AwaitingVerification => vec![prompts::awaiting_verification(
                &phone,
                self.next.order_id.as_ref(),
            )],
            Stage::Completed => vec![prompts::finished(&phone, true)],
            Stage::Rejected => vec![prompts::finished(&phone, false)],
            Stage::Abandoned => vec![prompts::expired(&phone)],
        };
        self.say(intents);
        self.finish(StepOutcome::Reprompted { stage, error })
    }
}

/// Applies one inbound payload to a session.
pub fn step(input: &StepInput<'_>) -> Step {
    let settings = input.settings;
    let ctx = ParseContext {
        today: settings.local_date(input.now),
        min_lead_days: settings.min_lead_days,
        booking_window_days: settings.booking_window_days,
        max_quantity_per_item: settings.max_quantity_per_item,
        catalog: input.catalog,
    };
    let mut next = input.session.clone();
    next.last_activity_at = input.now;
    let mut b = Builder {
        input,
        ctx,
        next,
        jobs: Vec::new(),
    };

    match parser::parse(input.session.stage, input.payload, &b.ctx) {
        Ok(ParsedInput::Restart) => {
            b.start_over();
            b.finish(StepOutcome::Restarted {
                from: input.session.stage,
            })
        }
        Ok(ParsedInput::Greeting) => {
            b.start_over();
            b.advance(Stage::AwaitingDate)
        }
        Ok(ParsedInput::Date(date)) => {
            b.next.draft.delivery_date = Some(date);
            let intents = prompts::date_accepted(b.phone(), date, input.catalog);
            b.say(intents);
            b.advance(Stage::AwaitingJunction)
        }
        Ok(ParsedInput::Junction(junction)) => {
            b.next.draft.junction = Some(junction);
            let menu = prompts::menu(b.phone(), &b.next.draft, input.catalog);
            b.say([menu]);
            b.advance(Stage::AwaitingMenu)
        }
        Ok(ParsedInput::LineItems(items)) => {
            let mut draft = b.next.draft.clone();
            draft.line_items = items;
            if draft.checked_total().is_none() {
                return b.reprompt(ValidationError::TotalTooLarge);
            }
            b.next.draft = draft;
            let delivery = b.next.draft.junction.as_ref().is_some_and(|j| j.is_delivery());
            if delivery {
                let request = prompts::address_request(b.phone(), &b.next.draft);
                b.say([request]);
                b.advance(Stage::AwaitingAddress)
            } else {
                b.next.draft.delivery_address = None;
                b.request_payment()
            }
        }
        Ok(ParsedInput::Address(address)) => {
            b.next.draft.delivery_address = Some(address);
            b.request_payment()
        }
        Ok(ParsedInput::Screenshot { media_id }) => b.submit(media_id),
        Err(error) => b.reprompt(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use proptest::prelude::*;
    use sadhya_core::{JunctionKind, Location, MenuItem, OrderId, VerificationStatus};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct SeqIds(AtomicU32);

    impl IdGenerator for SeqIds {
        fn order_id(&self, date: NaiveDate) -> OrderId {
            OrderId(format!("EO{}T{:05}", date.format("%y%m%d"), self.0.fetch_add(1, Ordering::SeqCst)))
        }

        fn token(&self) -> String {
            format!("tok-{}", self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    fn catalog() -> CatalogSnapshot {
        CatalogSnapshot::new(
            vec![
                MenuItem {
                    number: 1,
                    name: "Veg Sadhya".into(),
                    price: 150,
                    description: None,
                    active: true,
                },
                MenuItem {
                    number: 3,
                    name: "Palada Pradhaman".into(),
                    price: 40,
                    description: None,
                    active: true,
                },
            ],
            vec![
                Location {
                    id: "vyttila_delivery".into(),
                    name: "Vyttila".into(),
                    kind: JunctionKind::Delivery,
                    fee: 50,
                    active: true,
                },
                Location {
                    id: "pickup".into(),
                    name: "Pickup Only".into(),
                    kind: JunctionKind::Pickup,
                    fee: 0,
                    active: true,
                },
            ],
        )
    }

    fn settings() -> FlowSettings {
        FlowSettings {
            admin_phones: vec!["919000000001".into(), "919000000002".into()],
            base_url: "https://sadhya.example".into(),
            ..FlowSettings::default()
        }
    }

    fn now() -> DateTime<Utc> {
        // 10:00 IST on 20 Aug 2026.
        Utc.with_ymd_and_hms(2026, 8, 20, 4, 30, 0).unwrap()
    }

    fn text(body: &str) -> InboundPayload {
        InboundPayload::Text { body: body.into() }
    }

    fn select(id: &str) -> InboundPayload {
        InboundPayload::Selection {
            id: id.into(),
            title: id.into(),
        }
    }

    fn image() -> InboundPayload {
        InboundPayload::Image {
            media_id: "media-1".into(),
            mime_type: Some("image/jpeg".into()),
            caption: None,
        }
    }

    struct Run {
        session: Session,
        catalog: CatalogSnapshot,
        settings: FlowSettings,
        ids: SeqIds,
    }

    impl Run {
        fn new() -> Self {
            Self {
                session: Session::new("919812345678", now()),
                catalog: catalog(),
                settings: settings(),
                ids: SeqIds(AtomicU32::new(0)),
            }
        }

        fn send(&mut self, payload: InboundPayload) -> Step {
            let out = step(&StepInput {
                session: &self.session,
                payload: &payload,
                now: now(),
                catalog: &self.catalog,
                settings: &self.settings,
                ids: &self.ids,
            });
            self.session = out.session.clone();
            out
        }
    }

    #[test]
    fn pickup_flow_skips_address_and_finalizes() {
        let mut run = Run::new();
        assert_eq!(run.send(text("hi")).session.stage, Stage::AwaitingDate);
        assert_eq!(run.send(select("date_2026-08-23")).session.stage, Stage::AwaitingJunction);
        assert_eq!(run.send(select("pickup")).session.stage, Stage::AwaitingMenu);

        let menu = run.send(text("1 x 2, 3 x 1"));
        assert_eq!(
            menu.outcome,
            StepOutcome::Advanced {
                from: Stage::AwaitingMenu,
                to: Stage::AwaitingPaymentScreenshot
            }
        );
        let reserved = menu.session.order_id.clone().unwrap();
        let OutboxJob::Send { intent } = &menu.jobs[0] else {
            panic!("expected payment message");
        };
        assert!(intent.body().contains(reserved.as_str()));
        assert!(intent.body().contains("₹340"));

        let done = run.send(image());
        assert_eq!(done.session.stage, Stage::AwaitingVerification);
        let order = done.order.unwrap();
        assert_eq!(order.order_id, reserved);
        assert_eq!(order.total, 340);
        assert_eq!(order.verification_status, VerificationStatus::Pending);
        assert_eq!(order.payment_proof_ref.as_deref(), Some("whatsapp-media:media-1"));
        assert_eq!(done.tokens.len(), 2);
        assert_ne!(done.tokens[0].token, done.tokens[1].token);

        let labels: Vec<&str> = done.jobs.iter().map(OutboxJob::label).collect();
        assert_eq!(labels, vec!["send", "send", "send", "archive_proof", "sync_order"]);
        assert_eq!(done.session.draft, DraftOrder::default());
    }

    #[test]
    fn delivery_flow_requires_address() {
        let mut run = Run::new();
        run.send(text("hello"));
        run.send(text("2026-08-24"));
        run.send(text("Vyttila"));
        assert_eq!(run.send(text("1x2,3x1")).session.stage, Stage::AwaitingAddress);

        let rejected = run.send(image());
        assert!(matches!(
            rejected.outcome,
            StepOutcome::Reprompted {
                stage: Stage::AwaitingAddress,
                error: ValidationError::ExpectedAddress
            }
        ));

        run.send(InboundPayload::Location {
            latitude: 9.97,
            longitude: 76.32,
            name: None,
            address: None,
        });
        assert_eq!(run.session.stage, Stage::AwaitingPaymentScreenshot);
        let order = run.send(image()).order.unwrap();
        assert_eq!(order.total, 390);
        assert!(order.delivery_address.is_some());
    }

    #[test]
    fn rejected_date_restates_constraint_without_moving() {
        let mut run = Run::new();
        run.send(text("hi"));
        let out = run.send(text("2026-08-22"));
        assert_eq!(out.session.stage, Stage::AwaitingDate);
        assert!(out.session.draft.delivery_date.is_none());
        assert_eq!(out.jobs.len(), 1);
        let OutboxJob::Send { intent } = &out.jobs[0] else {
            panic!("expected send");
        };
        assert!(intent.body().contains("at least 3 days"));
        assert!(intent.body().contains("23 Aug 2026"));
    }

    #[test]
    fn restart_discards_draft_and_reissues_date_prompt() {
        let mut run = Run::new();
        run.send(text("hi"));
        run.send(text("2026-08-24"));
        run.send(text("pickup"));
        let out = run.send(text("restart"));
        assert_eq!(
            out.outcome,
            StepOutcome::Restarted {
                from: Stage::AwaitingMenu
            }
        );
        assert_eq!(out.session.stage, Stage::AwaitingDate);
        assert_eq!(out.session.draft, DraftOrder::default());
        assert!(out.session.order_id.is_none());
    }

    #[test]
    fn waiting_for_admin_only_answers_with_status() {
        let mut run = Run::new();
        for p in [text("hi"), text("2026-08-24"), text("pickup"), text("1x1"), image()] {
            run.send(p);
        }
        let out = run.send(text("any news?"));
        assert_eq!(out.session.stage, Stage::AwaitingVerification);
        assert!(out.order.is_none() && out.tokens.is_empty());
        let OutboxJob::Send { intent } = &out.jobs[0] else {
            panic!("expected send");
        };
        assert!(intent.body().contains("awaiting payment verification"));
    }

    #[test]
    fn missing_draft_fields_recover_by_restarting() {
        let mut run = Run::new();
        run.session.stage = Stage::AwaitingPaymentScreenshot;
        let out = run.send(image());
        assert!(matches!(
            out.outcome,
            StepOutcome::Recovered {
                reason: IncompleteDraft::MissingDate,
                ..
            }
        ));
        assert_eq!(out.session.stage, Stage::AwaitingDate);
        assert!(out.order.is_none());
        let OutboxJob::Send { intent } = &out.jobs[0] else {
            panic!("expected an apology first");
        };
        assert_eq!(intent, &prompts::order_error("919812345678"));
    }

    fn allowed(from: Stage, to: Stage, restarted: bool) -> bool {
        use Stage::*;
        if from == to || (restarted && to == AwaitingDate) {
            return true;
        }
        matches!(
            (from, to),
            (AwaitingStart, AwaitingDate)
                | (AwaitingDate, AwaitingJunction)
                | (AwaitingJunction, AwaitingMenu)
                | (AwaitingMenu, AwaitingAddress)
                | (AwaitingMenu, AwaitingPaymentScreenshot)
                | (AwaitingAddress, AwaitingPaymentScreenshot)
                | (AwaitingPaymentScreenshot, AwaitingVerification)
        )
    }

    fn payload_strategy() -> impl Strategy<Value = InboundPayload> {
        prop_oneof![
            Just(text("hi")),
            Just(text("restart")),
            Just(text("2026-08-23")),
            Just(text("2026-08-21")),
            Just(select("date_2026-08-25")),
            Just(select("pickup")),
            Just(text("vyttila")),
            Just(text("nowhere")),
            Just(text("1 x 2, 3 x 1")),
            Just(text("9 x 1")),
            Just(text("12 Temple Road")),
            Just(image()),
            Just(InboundPayload::Unsupported { kind: "sticker".into() }),
        ]
    }

    proptest! {
        #[test]
        fn stage_moves_only_along_the_graph(payloads in prop::collection::vec(payload_strategy(), 1..40)) {
            let mut run = Run::new();
            let mut visited_address = false;
            for payload in payloads {
                let from = run.session.stage;
                let out = run.send(payload);
                let to = out.session.stage;
                let restarted = matches!(out.outcome, StepOutcome::Restarted { .. } | StepOutcome::Recovered { .. });
                prop_assert!(allowed(from, to, restarted), "illegal {from} -> {to}");

                if restarted || to == Stage::AwaitingDate {
                    visited_address = false;
                }
                if to == Stage::AwaitingAddress {
                    visited_address = true;
                }
                if from == Stage::AwaitingMenu && to == Stage::AwaitingPaymentScreenshot {
                    // Only pickup may skip the address stage.
                    let junction = out.session.draft.junction.as_ref().unwrap();
                    prop_assert!(!junction.is_delivery());
                }
                if from == Stage::AwaitingAddress && to == Stage::AwaitingPaymentScreenshot {
                    prop_assert!(visited_address);
                }
                if let Some(order) = &out.order {
                    prop_assert_eq!(order.recomputed_total(), order.total);
                    prop_assert_eq!(out.tokens.len(), 2);
                }
            }
        }
    }
}
