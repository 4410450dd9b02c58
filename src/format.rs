//! Turning query responses into renderable turns.
//!
//! Everything here is pure: the same response always yields the same
//! `Reply`, which keeps the rendering policy testable without a terminal.

use crate::api::{PropertyListing, QueryResponse};
use crate::state::TurnBody;

/// Inputs answered locally, compared case-insensitively after trimming
pub const GREETINGS: [&str; 5] = ["hi", "hello", "hey", "good morning", "good afternoon"];

pub const GREETING_REPLY: &str = "Hello! I'm your property search assistant. I can help you find \
apartments, villas, and other properties in Dubai. Try asking me things like:\n\n\
• Show me 1 bedroom apartments\n\
• Properties under 100,000 AED\n\
• Luxury apartments in Dubai\n\n\
What are you looking for?";

pub const NO_RESULTS_MESSAGE: &str =
    "Sorry, I couldn't find any properties matching your criteria. Try adjusting your search!";

pub const ERROR_MESSAGE: &str = "Sorry, I encountered an error. Please try again.";

/// Example queries offered on the welcome screen
pub const SUGGESTIONS: [&str; 4] = [
    "Show me 1 bedroom apartments",
    "Properties under 100,000 AED",
    "Luxury apartments in Dubai",
    "How many properties do you have?",
];

const DEFAULT_CURRENCY: &str = "AED";

/// What a successful response turns into
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// What the view shows
    pub body: TurnBody,
    /// The same content as plain text
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingStatus {
    ForSale,
    ForRent,
    Unknown,
}

impl ListingStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ListingStatus::ForSale => "For Sale",
            ListingStatus::ForRent => "For Rent",
            ListingStatus::Unknown => "N/A",
        }
    }
}

/// A listing with every display default applied
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyCard {
    pub title: String,
    pub location: String,
    pub property_type: String,
    pub bedrooms: String,
    pub bathrooms: String,
    pub area: String,
    pub price: String,
    pub status: ListingStatus,
    pub link: Option<String>,
}

impl PropertyCard {
    /// `position` is zero-based; the fallback title counts from one.
    pub fn from_listing(listing: &PropertyListing, position: usize) -> Self {
        let title = listing
            .property_name
            .clone()
            .unwrap_or_else(|| format!("Property {}", position + 1));

        let location = format!(
            "{}, {}",
            listing.community_name.as_deref().unwrap_or(""),
            listing.city_name.as_deref().unwrap_or("")
        );

        let area = listing
            .total_area_sqm
            .filter(|sqm| *sqm != 0.0)
            .map(format_number)
            .unwrap_or_else(|| "N/A".to_string());

        let currency = listing
            .asking_price_currency
            .as_deref()
            .unwrap_or(DEFAULT_CURRENCY);

        let status = if listing.for_sale {
            ListingStatus::ForSale
        } else if listing.for_rent {
            ListingStatus::ForRent
        } else {
            ListingStatus::Unknown
        };

        Self {
            title,
            location,
            property_type: listing.property_type.clone().unwrap_or_else(|| "N/A".to_string()),
            bedrooms: format_number(listing.number_of_bedrooms.unwrap_or(0.0)),
            bathrooms: format_number(listing.bathrooms_total.unwrap_or(0.0)),
            area,
            price: format!("{} {}", currency, format_grouped(listing.asking_price.unwrap_or(0.0))),
            status,
            link: listing.listing_url.clone(),
        }
    }

    pub fn details(&self) -> String {
        format!(
            "Type: {} | {} bed | {} bath",
            self.property_type, self.bedrooms, self.bathrooms
        )
    }

    pub fn to_text(&self) -> String {
        let mut text = format!(
            "**{}**\nLocation: {}\n{}\nArea: {} sqm\n{}\n[{}]",
            self.title,
            self.location,
            self.details(),
            self.area,
            self.price,
            self.status.label()
        );
        if let Some(link) = &self.link {
            text.push_str(&format!("\nView Details: {}", link));
        }
        text
    }
}

/// Apply the rendering policy: count answer, then listings, then the
/// no-results message.
pub fn render_reply(response: &QueryResponse) -> Reply {
    if response.is_count_query {
        let text = response.response.clone().unwrap_or_default();
        return Reply {
            body: TurnBody::Text(text.clone()),
            text,
        };
    }

    if !response.properties.is_empty() {
        let found = response
            .properties_found
            .map(format_number)
            .unwrap_or_else(|| response.properties.len().to_string());
        let header = format!("Found **{} properties** matching your search!", found);
        let cards: Vec<PropertyCard> = response
            .properties
            .iter()
            .enumerate()
            .map(|(i, listing)| PropertyCard::from_listing(listing, i))
            .collect();

        let body = TurnBody::Listings { header, cards };
        let text = plain_text(&body);
        return Reply { body, text };
    }

    Reply {
        body: TurnBody::Text(NO_RESULTS_MESSAGE.to_string()),
        text: NO_RESULTS_MESSAGE.to_string(),
    }
}

/// Plain-text rendition of a turn body, used for history and stdout
pub fn plain_text(body: &TurnBody) -> String {
    match body {
        TurnBody::Text(text) | TurnBody::Error(text) => text.clone(),
        TurnBody::Listings { header, cards } => {
            let mut text = header.clone();
            for card in cards {
                text.push_str("\n\n");
                text.push_str(&card.to_text());
            }
            text
        }
    }
}

/// Shortest decimal form: `120` not `120.0`, `85.5` stays `85.5`
pub fn format_number(value: f64) -> String {
    format!("{}", value)
}

/// en-US grouping with at most three fraction digits: `1234567.5` →
/// `1,234,567.5`
pub fn format_grouped(value: f64) -> String {
    if !value.is_finite() {
        return format_number(value);
    }

    let millis = (value.abs() * 1000.0).round() as u128;
    let whole = (millis / 1000).to_string();
    let fraction = millis % 1000;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3 + 5);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    if fraction > 0 {
        let digits = format!("{:03}", fraction);
        grouped.push('.');
        grouped.push_str(digits.trim_end_matches('0'));
    }

    if value < 0.0 && millis > 0 {
        grouped.insert(0, '-');
    }

    grouped
}
