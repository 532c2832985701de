// Static localization tables. Clients fetch these once at startup; the
// cache header keeps them from asking again for an hour.

use axum::{http::header, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/Cultures", get(get_cultures))
        .route("/Countries", get(get_countries))
        .route("/ParentalRatings", get(get_parental_ratings))
        .route("/Options", get(get_localization_options))
}

const CACHE_CONTROL: (header::HeaderName, &str) =
    (header::CACHE_CONTROL, "public, max-age=3600");

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CultureDto {
    name: String,
    display_name: String,
    two_letter_iso_language_name: String,
    three_letter_iso_language_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CountryDto {
    name: String,
    display_name: String,
    two_letter_iso_region_name: String,
    three_letter_iso_region_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ParentalRatingDto {
    name: String,
    value: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct LocalizationOption {
    name: String,
    value: String,
}

async fn get_cultures() -> impl IntoResponse {
    let cultures: Vec<CultureDto> = [
        ("en-US", "English (United States)", "en", "eng"),
        ("en-GB", "English (United Kingdom)", "en", "eng"),
        ("de-DE", "German (Germany)", "de", "deu"),
        ("fr-FR", "French (France)", "fr", "fra"),
        ("es-ES", "Spanish (Spain)", "es", "spa"),
        ("it-IT", "Italian (Italy)", "it", "ita"),
        ("nl-NL", "Dutch (Netherlands)", "nl", "nld"),
        ("pt-BR", "Portuguese (Brazil)", "pt", "por"),
        ("ja-JP", "Japanese (Japan)", "ja", "jpn"),
        ("ko-KR", "Korean (Korea)", "ko", "kor"),
        ("zh-CN", "Chinese (Simplified)", "zh", "zho"),
        ("ru-RU", "Russian (Russia)", "ru", "rus"),
        ("pl-PL", "Polish (Poland)", "pl", "pol"),
        ("sv-SE", "Swedish (Sweden)", "sv", "swe"),
    ]
    .into_iter()
    .map(|(name, display, iso2, iso3)| CultureDto {
        name: name.to_string(),
        display_name: display.to_string(),
        two_letter_iso_language_name: iso2.to_string(),
        three_letter_iso_language_name: iso3.to_string(),
    })
    .collect();

    ([CACHE_CONTROL], Json(cultures))
}

async fn get_countries() -> impl IntoResponse {
    let countries: Vec<CountryDto> = [
        ("US", "United States", "USA"),
        ("GB", "United Kingdom", "GBR"),
        ("DE", "Germany", "DEU"),
        ("FR", "France", "FRA"),
        ("ES", "Spain", "ESP"),
        ("IT", "Italy", "ITA"),
        ("NL", "Netherlands", "NLD"),
        ("CA", "Canada", "CAN"),
        ("AU", "Australia", "AUS"),
        ("BR", "Brazil", "BRA"),
        ("JP", "Japan", "JPN"),
        ("KR", "South Korea", "KOR"),
        ("SE", "Sweden", "SWE"),
        ("NO", "Norway", "NOR"),
        ("DK", "Denmark", "DNK"),
        ("FI", "Finland", "FIN"),
    ]
    .into_iter()
    .map(|(code, name, code3)| CountryDto {
        name: name.to_string(),
        display_name: name.to_string(),
        two_letter_iso_region_name: code.to_string(),
        three_letter_iso_region_name: code3.to_string(),
    })
    .collect();

    ([CACHE_CONTROL], Json(countries))
}

async fn get_parental_ratings() -> impl IntoResponse {
    let ratings: Vec<ParentalRatingDto> = [
        ("G", 0),
        ("PG", 10),
        ("PG-13", 13),
        ("R", 17),
        ("NC-17", 18),
        ("TV-Y", 0),
        ("TV-Y7", 7),
        ("TV-G", 0),
        ("TV-PG", 10),
        ("TV-14", 14),
        ("TV-MA", 17),
    ]
    .into_iter()
    .map(|(name, value)| ParentalRatingDto {
        name: name.to_string(),
        value,
    })
    .collect();

    ([CACHE_CONTROL], Json(ratings))
}

async fn get_localization_options() -> impl IntoResponse {
    let options: Vec<LocalizationOption> = [
        ("English", "en-US"),
        ("German", "de-DE"),
        ("French", "fr-FR"),
        ("Spanish", "es-ES"),
        ("Japanese", "ja-JP"),
    ]
    .into_iter()
    .map(|(name, value)| LocalizationOption {
        name: name.to_string(),
        value: value.to_string(),
    })
    .collect();

    ([CACHE_CONTROL], Json(options))
}
