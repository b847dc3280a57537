// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stage-aware parsing of inbound payloads into typed input.
//!
//! The parser never touches storage. Given the stage a session is in and
//! what the customer sent, it either produces a [`ParsedInput`] or a
//! [`ValidationError`] whose message is shown to the customer before the
//! stage prompt is repeated.

use chrono::{Days, NaiveDate};
use thiserror::Error;

use sadhya_core::{
    CatalogSnapshot, DeliveryAddress, InboundPayload, Junction, LineItem, Stage,
};

/// Words that restart the flow from any stage.
pub const CONTROL_TOKENS: [&str; 3] = ["restart", "start", "new order"];

/// Prefix of the reply-button ids offered by the date prompt.
pub const DATE_BUTTON_PREFIX: &str = "date_";

const MENU_SEPARATORS: [char; 3] = ['x', '*', '×'];

/// Input accepted at a stage.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedInput {
    /// A control token; the flow starts over.
    Restart,
    /// Anything at all, accepted by `AwaitingStart`.
    Greeting,
    Date(NaiveDate),
    Junction(Junction),
    LineItems(Vec<LineItem>),
    Address(DeliveryAddress),
    Screenshot { media_id: String },
}

/// Why an input was not accepted. Always recovered by re-prompting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please send a date in YYYY-MM-DD format or tap one of the buttons.")]
    NotADate,

    #[error("We need at least {min_lead_days} days to prepare. The earliest date is {earliest}.")]
    DateTooSoon {
        earliest: NaiveDate,
        min_lead_days: u32,
    },

    #[error("Bookings are open only until {latest}.")]
    DateTooLate { latest: NaiveDate },

    #[error("That location is not available. Please pick one of the listed options.")]
    UnknownLocation,

    #[error("Please tell us what you'd like to order.")]
    EmptyOrder,

    #[error("Could not read \"{0}\". Use the format: item number x quantity.")]
    MalformedPair(String),

    #[error("Item {0} is not on the menu.")]
    UnknownItem(u32),

    #[error("Quantity for item {0} must be at least 1.")]
    NonPositiveQuantity(u32),

    #[error("At most {max} of item {item} can be ordered at once.")]
    QuantityTooLarge { item: u32, max: u32 },

    #[error("That order is too large for us to take. Please order fewer items.")]
    TotalTooLarge,

    #[error("Please type your delivery address or share your location.")]
    ExpectedAddress,

    #[error("Please send a screenshot of your payment transaction.")]
    ExpectedImage,

    #[error("That message can't be used right now.")]
    UnexpectedInput { stage: Stage },
}

/// Everything the parser needs besides the payload itself.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    /// Local calendar date at the time the message is handled.
    pub today: NaiveDate,
    pub min_lead_days: u32,
    pub booking_window_days: u32,
    pub max_quantity_per_item: u32,
    pub catalog: &'a CatalogSnapshot,
}

impl ParseContext<'_> {
    /// First date that can still be booked.
    pub fn earliest_date(&self) -> NaiveDate {
        self.today
            .checked_add_days(Days::new(u64::from(self.min_lead_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Last date inside the booking window.
    pub fn latest_date(&self) -> NaiveDate {
        self.earliest_date()
            .checked_add_days(Days::new(u64::from(self.booking_window_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    /// The bookable dates in order, at most `limit` of them.
    pub fn available_dates(&self, limit: usize) -> Vec<NaiveDate> {
        self.earliest_date()
            .iter_days()
            .take_while(|d| *d <= self.latest_date())
            .take(limit)
            .collect()
    }
}

/// Whether `text` is one of the [`CONTROL_TOKENS`].
pub fn is_control_token(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    CONTROL_TOKENS.contains(&normalized.as_str())
}

/// Interprets `payload` against `stage`.
///
/// Control tokens win at every stage.
pub fn parse(
    stage: Stage,
    payload: &InboundPayload,
    ctx: &ParseContext<'_>,
) -> Result<ParsedInput, ValidationError> {
    let control = match payload {
        InboundPayload::Selection { id, title } => is_control_token(id) || is_control_token(title),
        InboundPayload::Text { body } => is_control_token(body),
        _ => false,
    };
    if control {
        return Ok(ParsedInput::Restart);
    }

    match stage {
        Stage::AwaitingStart => Ok(ParsedInput::Greeting),
        Stage::AwaitingDate => parse_date(payload, ctx).map(ParsedInput::Date),
        Stage::AwaitingJunction => parse_junction(payload, ctx.catalog).map(ParsedInput::Junction),
        Stage::AwaitingMenu => match payload.text() {
            Some(text) => parse_menu(text, ctx.catalog, ctx.max_quantity_per_item)
                .map(ParsedInput::LineItems),
            None => Err(ValidationError::EmptyOrder),
        },
        Stage::AwaitingAddress => parse_address(payload).map(ParsedInput::Address),
        Stage::AwaitingPaymentScreenshot => match payload {
            InboundPayload::Image { media_id, .. } => Ok(ParsedInput::Screenshot {
                media_id: media_id.clone(),
            }),
            _ => Err(ValidationError::ExpectedImage),
        },
        Stage::AwaitingVerification | Stage::Completed | Stage::Rejected | Stage::Abandoned => {
            Err(ValidationError::UnexpectedInput { stage })
        }
    }
}

/// Reads a delivery date from a date button or typed text and checks the booking window.
pub fn parse_date(
    payload: &InboundPayload,
    ctx: &ParseContext<'_>,
) -> Result<NaiveDate, ValidationError> {
    let raw = match payload {
        InboundPayload::Selection { id, .. } => id.as_str(),
        InboundPayload::Text { body } => body.as_str(),
        _ => return Err(ValidationError::NotADate),
    };
    let raw = raw.trim();
    let raw = raw.strip_prefix(DATE_BUTTON_PREFIX).unwrap_or(raw);

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d %b %Y"))
        .map_err(|_| ValidationError::NotADate)?;

    if date < ctx.earliest_date() {
        return Err(ValidationError::DateTooSoon {
            earliest: ctx.earliest_date(),
            min_lead_days: ctx.min_lead_days,
        });
    }
    if date > ctx.latest_date() {
        return Err(ValidationError::DateTooLate {
            latest: ctx.latest_date(),
        });
    }
    Ok(date)
}

/// Resolves a location button or typed name against the active locations.
pub fn parse_junction(
    payload: &InboundPayload,
    catalog: &CatalogSnapshot,
) -> Result<Junction, ValidationError> {
    let found = match payload {
        InboundPayload::Selection { id, title } => catalog
            .find_location(id)
            .or_else(|| catalog.find_location(title)),
        InboundPayload::Text { body } => catalog.find_location(body),
        _ => None,
    };
    found
        .map(|l| l.to_junction())
        .ok_or(ValidationError::UnknownLocation)
}

/// Parses `"<item> x <qty>, ..."` into line items priced from `catalog`.
///
/// Input is trimmed and lowercased. `x`, `*` and `×` separate item from
/// quantity, with or without spaces. Empty segments are skipped and
/// repeated items are merged in order of first appearance. Any bad pair
/// rejects the whole input.
pub fn parse_menu(
    text: &str,
    catalog: &CatalogSnapshot,
    max_quantity: u32,
) -> Result<Vec<LineItem>, ValidationError> {
    let normalized = text.trim().to_lowercase();
    let mut merged: Vec<(u32, u64)> = Vec::new();

    for segment in normalized.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (item, quantity) = split_pair(segment)
            .ok_or_else(|| ValidationError::MalformedPair(segment.to_string()))?;
        match merged.iter_mut().find(|(n, _)| *n == item) {
            Some((_, q)) => *q = q.saturating_add(quantity),
            None => merged.push((item, quantity)),
        }
    }

    if merged.is_empty() {
        return Err(ValidationError::EmptyOrder);
    }

    merged
        .into_iter()
        .map(|(number, quantity)| {
            let item = catalog
                .menu_item(number)
                .ok_or(ValidationError::UnknownItem(number))?;
            if quantity == 0 {
                return Err(ValidationError::NonPositiveQuantity(number));
            }
            let quantity = u32::try_from(quantity)
                .ok()
                .filter(|q| *q <= max_quantity)
                .ok_or(ValidationError::QuantityTooLarge {
                    item: number,
                    max: max_quantity,
                })?;
            Ok(LineItem {
                item_number: number,
                name: item.name.clone(),
                unit_price: item.price,
                quantity,
            })
        })
        .collect()
}

fn split_pair(segment: &str) -> Option<(u32, u64)> {
    let (item, quantity) = segment.split_once(MENU_SEPARATORS)?;
    let (item, quantity) = (item.trim(), quantity.trim());
    if !is_digits(item) || !is_digits(quantity) {
        return None;
    }
    // Absurdly long numbers are unknown items or too-large quantities, not syntax errors.
    let item = item.parse::<u32>().unwrap_or(u32::MAX);
    let quantity = quantity.parse::<u64>().unwrap_or(u64::MAX);
    Some((item, quantity))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Reads a shared location or typed address.
pub fn parse_address(payload: &InboundPayload) -> Result<DeliveryAddress, ValidationError> {
    match payload {
        InboundPayload::Location {
            latitude,
            longitude,
            ..
        } => Ok(DeliveryAddress::Geo {
            latitude: *latitude,
            longitude: *longitude,
            maps_link: maps_link(*latitude, *longitude),
        }),
        InboundPayload::Text { body } if !body.trim().is_empty() => Ok(DeliveryAddress::Text {
            text: body.trim().to_string(),
        }),
        _ => Err(ValidationError::ExpectedAddress),
    }
}

pub fn maps_link(latitude: f64, longitude: f64) -> String {
    format!("https://www.google.com/maps/place/{latitude},{longitude}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sadhya_core::{JunctionKind, Location, MenuItem};

    fn catalog() -> CatalogSnapshot {
        let menu = [
            (1, "Veg Sadhya", 150),
            (2, "Non-Veg Sadhya", 200),
            (3, "Palada Pradhaman", 40),
            (4, "Parippu/Gothambu Payasam", 40),
            (5, "Kaaya Varuthathu", 30),
            (6, "Sharkkaravaratti", 30),
        ]
        .into_iter()
        .map(|(number, name, price)| MenuItem {
            number,
            name: name.to_string(),
            price,
            description: None,
            active: true,
        })
        .collect();
        let locations = vec![
            Location {
                id: "vyttila_delivery".into(),
                name: "Vyttila".into(),
                kind: JunctionKind::Delivery,
                fee: 50,
                active: true,
            },
            Location {
                id: "kakkanad_delivery".into(),
                name: "Kakkanad".into(),
                kind: JunctionKind::Delivery,
                fee: 50,
                active: false,
            },
            Location {
                id: "pickup".into(),
                name: "Pickup Only".into(),
                kind: JunctionKind::Pickup,
                fee: 0,
                active: true,
            },
        ];
        CatalogSnapshot::new(menu, locations)
    }

    fn ctx(catalog: &CatalogSnapshot) -> ParseContext<'_> {
        ParseContext {
            today: NaiveDate::from_ymd_opt(2026, 8, 20).unwrap(),
            min_lead_days: 3,
            booking_window_days: 30,
            max_quantity_per_item: 50,
            catalog,
        }
    }

    fn text(body: &str) -> InboundPayload {
        InboundPayload::Text { body: body.into() }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, d).unwrap()
    }

    #[test]
    fn control_tokens_win_at_every_stage() {
        let catalog = catalog();
        for stage in [
            Stage::AwaitingStart,
            Stage::AwaitingMenu,
            Stage::AwaitingPaymentScreenshot,
            Stage::Completed,
            Stage::Abandoned,
        ] {
            assert_eq!(parse(stage, &text("  Restart "), &ctx(&catalog)), Ok(ParsedInput::Restart));
            assert_eq!(parse(stage, &text("NEW ORDER"), &ctx(&catalog)), Ok(ParsedInput::Restart));
        }
        assert!(!is_control_token("restarting"));
    }

    #[test]
    fn date_lead_time_boundary() {
        let catalog = catalog();
        let ctx = ctx(&catalog);
        assert_eq!(parse_date(&text("2026-08-23"), &ctx), Ok(day(23)));
        assert_eq!(
            parse_date(&text("2026-08-22"), &ctx),
            Err(ValidationError::DateTooSoon {
                earliest: day(23),
                min_lead_days: 3
            })
        );
    }

    #[test]
    fn date_from_button_id_and_window_end() {
        let catalog = catalog();
        let ctx = ctx(&catalog);
        let button = InboundPayload::Selection {
            id: "date_2026-08-24".into(),
            title: "24 Aug 2026".into(),
        };
        assert_eq!(parse_date(&button, &ctx), Ok(day(24)));
        assert_eq!(parse_date(&text("25 Aug 2026"), &ctx), Ok(day(25)));
        assert!(parse_date(&text("2026-09-22"), &ctx).is_ok());
        assert!(matches!(
            parse_date(&text("2026-09-23"), &ctx),
            Err(ValidationError::DateTooLate { .. })
        ));
        assert_eq!(parse_date(&text("tomorrow"), &ctx), Err(ValidationError::NotADate));
    }

    #[test]
    fn available_dates_start_at_lead_time() {
        let catalog = catalog();
        assert_eq!(ctx(&catalog).available_dates(3), vec![day(23), day(24), day(25)]);
    }

    #[test]
    fn junction_matches_active_locations_only() {
        let catalog = catalog();
        let pick = InboundPayload::Selection {
            id: "pickup".into(),
            title: "Pickup Only".into(),
        };
        assert_eq!(parse_junction(&pick, &catalog).unwrap().delivery_fee, 0);
        assert_eq!(parse_junction(&text("vyttila"), &catalog).unwrap().id, "vyttila_delivery");
        assert_eq!(
            parse_junction(&text("Kakkanad"), &catalog),
            Err(ValidationError::UnknownLocation)
        );
    }

    #[test]
    fn menu_two_pairs() {
        let items = parse_menu("1 x 2, 3 x 1", &catalog(), 50).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!((items[0].item_number, items[0].quantity), (1, 2));
        assert_eq!((items[1].name.as_str(), items[1].unit_price), ("Palada Pradhaman", 40));
    }

    #[test]
    fn menu_compact_and_alternate_separators_parse_identically() {
        let catalog = catalog();
        let spaced = parse_menu("1 x 2", &catalog, 50).unwrap();
        assert_eq!(parse_menu("1x2", &catalog, 50).unwrap(), spaced);
        assert_eq!(parse_menu("1X2", &catalog, 50).unwrap(), spaced);
        assert_eq!(parse_menu("1*2", &catalog, 50).unwrap(), spaced);
        assert_eq!(parse_menu("1 × 2,", &catalog, 50).unwrap(), spaced);
    }

    #[test]
    fn menu_merges_repeated_items() {
        let items = parse_menu("3x1, 1x2, 3x4", &catalog(), 50).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!((items[0].item_number, items[0].quantity), (3, 5));
        assert_eq!(items[1].item_number, 1);
    }

    #[test]
    fn menu_rejections() {
        let catalog = catalog();
        assert_eq!(
            parse_menu("1 x 0", &catalog, 50),
            Err(ValidationError::NonPositiveQuantity(1))
        );
        assert_eq!(parse_menu("9 x 1", &catalog, 50), Err(ValidationError::UnknownItem(9)));
        assert_eq!(parse_menu(" , ", &catalog, 50), Err(ValidationError::EmptyOrder));
        assert_eq!(
            parse_menu("1 x 2, two veg", &catalog, 50),
            Err(ValidationError::MalformedPair("two veg".into()))
        );
        assert_eq!(
            parse_menu("1 x -1", &catalog, 50),
            Err(ValidationError::MalformedPair("1 x -1".into()))
        );
        assert_eq!(
            parse_menu("1 x 30, 1 x 30", &catalog, 50),
            Err(ValidationError::QuantityTooLarge { item: 1, max: 50 })
        );
        assert_eq!(
            parse_menu("2 x 99999999999999999999", &catalog, 50),
            Err(ValidationError::QuantityTooLarge { item: 2, max: 50 })
        );
    }

    #[test]
    fn address_from_location_or_text() {
        let shared = InboundPayload::Location {
            latitude: 9.9658,
            longitude: 76.3186,
            name: None,
            address: None,
        };
        let DeliveryAddress::Geo { maps_link, .. } = parse_address(&shared).unwrap() else {
            panic!("expected geo address");
        };
        assert_eq!(maps_link, "https://www.google.com/maps/place/9.9658,76.3186");
        assert_eq!(
            parse_address(&text("  12 Temple Road ")).unwrap(),
            DeliveryAddress::Text {
                text: "12 Temple Road".into()
            }
        );
        assert_eq!(parse_address(&text("   ")), Err(ValidationError::ExpectedAddress));
    }

    #[test]
    fn screenshot_stage_needs_an_image() {
        let catalog = catalog();
        let image = InboundPayload::Image {
            media_id: "m-1".into(),
            mime_type: Some("image/jpeg".into()),
            caption: None,
        };
        assert_eq!(
            parse(Stage::AwaitingPaymentScreenshot, &image, &ctx(&catalog)),
            Ok(ParsedInput::Screenshot {
                media_id: "m-1".into()
            })
        );
        assert_eq!(
            parse(Stage::AwaitingPaymentScreenshot, &text("paid"), &ctx(&catalog)),
            Err(ValidationError::ExpectedImage)
        );
    }

    #[test]
    fn terminal_stages_reject_everything_else() {
        let catalog = catalog();
        assert_eq!(
            parse(Stage::Completed, &text("hi"), &ctx(&catalog)),
            Err(ValidationError::UnexpectedInput {
                stage: Stage::Completed
            })
        );
        assert_eq!(
            parse(Stage::AwaitingStart, &InboundPayload::Unsupported { kind: "sticker".into() }, &ctx(&catalog)),
            Ok(ParsedInput::Greeting)
        );
    }
}
