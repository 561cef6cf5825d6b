use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use reqwest::Url;
use serde::Serialize;

use crate::models::{Event, EventId};
use crate::utils::escape_html;

pub const CITY_SELECT_ID: &str = "citySearch";
pub const VENUE_SELECT_ID: &str = "venueSearch";
pub const SEARCH_FORM_IDS: [&str; 2] = ["searchForm", "search-form"];
pub const SEARCH_INPUT_IDS: [&str; 2] = ["searchBar", "name"];
pub const CARD_CONTAINER_CLASS: &str = "row-1";
pub const CARD_CLASS: &str = "div-block-5";

pub const POPUP_TITLE_ID: &str = "popup-text-block";
pub const VENUE_NAME_ID: &str = "venue-name";
pub const VENUE_ADDRESS_ID: &str = "venue-address";
pub const DATE_TIME_ID: &str = "date-time";
pub const EVENT_BUTTON_ID: &str = "eventButton";
pub const DESCRIPTION_ID: &str = "description-paragraph";
pub const PRICE_LABEL_ID: &str = "priceLabel";

const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/";
const DAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// `Wed, Oct 21, 2026 | 8:05 PM` in the viewer's zone.
pub fn format_display_date(date: DateTime<Utc>, tz: Tz) -> String {
    let local = date.with_timezone(&tz);
    let (is_pm, hour) = local.hour12();
    format!(
        "{}, {} {}, {} | {}:{:02} {}",
        DAY_NAMES[local.weekday().num_days_from_monday() as usize],
        MONTH_NAMES[local.month0() as usize],
        local.day(),
        local.year(),
        hour,
        local.minute(),
        if is_pm { "PM" } else { "AM" }
    )
}

/// The source timestamp travels with the card so filters never
/// have to read `display_date` back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventCard {
    pub id: EventId,
    pub event_name: String,
    pub thumbnail: String,
    pub display_date: String,
    pub starts_at: DateTime<Utc>,
    pub venue: String,
    pub address: String,
    pub description: String,
    pub url: String,
    pub ticket_price: String,
    pub visible: bool,
}

impl EventCard {
    pub fn from_event(event: &Event, tz: Tz) -> Self {
        Self {
            id: event.id(),
            event_name: event.event_name.clone(),
            thumbnail: event.thumbnail.clone(),
            display_date: format_display_date(event.date, tz),
            starts_at: event.date,
            venue: event.location_name.clone(),
            address: event.location.clone(),
            description: event.description.clone(),
            url: event.url.clone(),
            ticket_price: event.ticket_price.clone(),
            visible: true,
        }
    }

    pub fn to_html(&self) -> String {
        let style = if self.visible { "opacity: 1" } else { "opacity: 1; display: none" };
        format!(
            concat!(
                r#"<div class="{card}" style="{style}" data-id="{id}" data-starts-at="{starts}" "#,
                r#"data-venue="{venue}" data-location="{address}" data-url="{url}" "#,
                r#"data-ticket-price="{price}">"#,
                r#"<div class="top"><img src="{thumb}" loading="lazy" alt="" class="image-3">"#,
                r#"<div class="inner-block"><div class="event-name">{name}</div></div></div>"#,
                r#"<div class="bottom"><div class="date">{date}</div>"#,
                r#"<div class="venue">{venue}</div></div></div>"#
            ),
            card = CARD_CLASS,
            style = style,
            id = self.id,
            starts = self.starts_at.to_rfc3339(),
            venue = escape_html(&self.venue),
            address = escape_html(&self.address),
            url = escape_html(&self.url),
            price = escape_html(&self.ticket_price),
            thumb = escape_html(&self.thumbnail),
            name = escape_html(&self.event_name),
            date = escape_html(&self.display_date),
        )
    }
}

pub fn render_cards(events: &[Event], tz: Tz) -> Vec<EventCard> {
    events.iter().map(|e| EventCard::from_event(e, tz)).collect()
}

pub fn cards_html(cards: &[EventCard]) -> String {
    let inner: String = cards.iter().map(EventCard::to_html).collect();
    format!(r#"<div class="{CARD_CONTAINER_CLASS}">{inner}</div>"#)
}

pub fn city_options_html(cities: &[String], selected: Option<&str>) -> String {
    let known = selected.map_or(false, |city| cities.iter().any(|c| c == city));
    let placeholder_selected = if known { "" } else { " selected" };
    let mut html = format!(r#"<option value=""{placeholder_selected}>Choose a City</option>"#);
    for city in cities {
        html.push_str(&option_html(city, city, selected == Some(city.as_str())));
    }
    html
}

pub fn venue_options_html(venues: &[String], selected: &str) -> String {
    let mut html = String::new();
    if !venues.is_empty() {
        html.push_str(&option_html("all", "All Venues", selected == "all"));
    }
    for venue in venues {
        html.push_str(&option_html(venue, venue, selected == venue));
    }
    html
}

fn option_html(value: &str, label: &str, selected: bool) -> String {
    format!(
        r#"<option value="{}"{}>{}</option>"#,
        escape_html(value),
        if selected { " selected" } else { "" },
        escape_html(label)
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailPanel {
    pub title: String,
    pub venue_name: String,
    pub venue_address: String,
    pub maps_url: String,
    pub date_time: String,
    pub event_href: String,
    pub description: String,
    pub price: String,
}

impl DetailPanel {
    pub fn for_card(card: &EventCard) -> Self {
        let venue_name = if card.venue.trim().is_empty() {
            "N/A".to_string()
        } else {
            card.venue.clone()
        };
        let event_href = if card.url.trim().is_empty() {
            "#".to_string()
        } else {
            card.url.clone()
        };
        Self {
            title: card.event_name.clone(),
            venue_name,
            venue_address: card.address.clone(),
            maps_url: maps_search_url(&card.address),
            date_time: card.display_date.clone(),
            event_href,
            description: card.description.clone(),
            price: card.ticket_price.clone(),
        }
    }

    pub fn fragments(&self) -> Vec<(&'static str, String)> {
        vec![
            (POPUP_TITLE_ID, escape_html(&self.title)),
            (VENUE_NAME_ID, escape_html(&self.venue_name)),
            (
                VENUE_ADDRESS_ID,
                format!(
                    r#"<a href="{}" target="_blank">{}</a>"#,
                    escape_html(&self.maps_url),
                    escape_html(&self.venue_address)
                ),
            ),
            (DATE_TIME_ID, escape_html(&self.date_time)),
            (DESCRIPTION_ID, escape_html(&self.description)),
            (PRICE_LABEL_ID, escape_html(&self.price)),
        ]
    }

    pub fn event_button_html(&self) -> String {
        format!(
            r#"<a id="{EVENT_BUTTON_ID}" href="{}" target="_blank">Get Tickets</a>"#,
            escape_html(&self.event_href)
        )
    }
}

pub fn maps_search_url(address: &str) -> String {
    match Url::parse_with_params(MAPS_SEARCH_URL, [("api", "1"), ("query", address)]) {
        Ok(url) => url.into(),
        Err(_) => MAPS_SEARCH_URL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::fixtures::event;
    use chrono::TimeZone;
    use chrono_tz::America::Los_Angeles;
    use scraper::{Html, Selector};

    fn la(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Los_Angeles
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn display_date_format() {
        assert_eq!(
            format_display_date(la(2026, 10, 21, 20, 5), Los_Angeles),
            "Wed, Oct 21, 2026 | 8:05 PM"
        );
        assert_eq!(
            format_display_date(la(2026, 11, 1, 0, 0), Los_Angeles),
            "Sun, Nov 1, 2026 | 12:00 AM"
        );
    }

    #[test]
    fn card_keeps_timestamp_across_local_midnight() {
        // 23:30 in Los Angeles is 06:30 the next day in UTC.
        let starts = la(2026, 10, 21, 23, 30);
        let card = EventCard::from_event(&event("Late", "X", "LA", starts), Los_Angeles);

        assert_eq!(card.display_date, "Wed, Oct 21, 2026 | 11:30 PM");
        assert_eq!(card.starts_at, starts);
        assert_eq!(
            card.starts_at.with_timezone(&Los_Angeles).date_naive(),
            chrono::NaiveDate::from_ymd_opt(2026, 10, 21).unwrap()
        );
    }

    #[test]
    fn board_html_has_one_card_per_event() {
        let events = vec![
            event("First Show", "X", "LA", la(2026, 10, 21, 20, 0)),
            event("Second Show", "Y", "LA", la(2026, 10, 22, 20, 0)),
        ];
        let html = cards_html(&render_cards(&events, Los_Angeles));
        let document = Html::parse_fragment(&html);
        let cards = Selector::parse("div.row-1 > div.div-block-5").unwrap();
        let names = Selector::parse(".event-name").unwrap();

        assert_eq!(document.select(&cards).count(), 2);
        let rendered: Vec<String> = document
            .select(&names)
            .map(|node| node.text().collect())
            .collect();
        assert_eq!(rendered, ["First Show", "Second Show"]);
    }

    #[test]
    fn card_html_escapes_markup() {
        let mut hostile = event("Show", "X", "LA", la(2026, 10, 21, 20, 0));
        hostile.event_name = "<script>alert(1)</script>".to_string();
        let html = EventCard::from_event(&hostile, Los_Angeles).to_html();
        let document = Html::parse_fragment(&html);

        assert_eq!(document.select(&Selector::parse("script").unwrap()).count(), 0);
        let name: String = document
            .select(&Selector::parse(".event-name").unwrap())
            .next()
            .unwrap()
            .text()
            .collect();
        assert_eq!(name, "<script>alert(1)</script>");
    }

    #[test]
    fn hidden_cards_render_display_none() {
        let mut card = EventCard::from_event(
            &event("Show", "X", "LA", la(2026, 10, 21, 20, 0)),
            Los_Angeles,
        );
        card.visible = false;
        assert!(card.to_html().contains("display: none"));
    }

    #[test]
    fn option_lists() {
        let cities = vec!["Los Angeles".to_string(), "New York".to_string()];
        let html = city_options_html(&cities, Some("New York"));
        let document = Html::parse_fragment(&format!("<select>{html}</select>"));
        let options: Vec<_> = document.select(&Selector::parse("option").unwrap()).collect();
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].value().attr("value"), Some(""));
        assert!(options[2].value().attr("selected").is_some());

        let unknown = city_options_html(&cities, Some("Chicago"));
        assert!(unknown.starts_with(r#"<option value="" selected>Choose a City</option>"#));

        assert_eq!(venue_options_html(&[], "all"), "");
        let venues = venue_options_html(&["The Comedy Store".to_string()], "all");
        assert!(venues.starts_with(r#"<option value="all" selected>All Venues</option>"#));
    }

    #[test]
    fn detail_panel_fallbacks_and_maps_link() {
        let mut source = event("Show", "", "LA", la(2026, 10, 21, 20, 0));
        source.url = String::new();
        source.location = "8433 Sunset Blvd, West Hollywood".to_string();
        let panel = DetailPanel::for_card(&EventCard::from_event(&source, Los_Angeles));

        assert_eq!(panel.venue_name, "N/A");
        assert_eq!(panel.event_href, "#");
        assert_eq!(
            panel.maps_url,
            "https://www.google.com/maps/search/?api=1&query=8433+Sunset+Blvd%2C+West+Hollywood"
        );
        let ids: Vec<_> = panel.fragments().into_iter().map(|(id, _)| id).collect();
        assert!(ids.contains(&VENUE_ADDRESS_ID));
        assert!(panel.event_button_html().contains(r##"href="#""##));
    }
}
