//! The tour entity: storage shape, API shape, and input validation.
//!
//! Storage and API representations are separate types. [`TourDocument`]
//! carries BSON ids and dates and is what the collection persists;
//! [`Tour`] is the wire shape with a hex id, RFC 3339 dates, the
//! `durationWeeks` virtual, and no `createdAt` (that field never leaves
//! the database).

use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId, Bson, Document};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const MIN_NAME_LEN: usize = 10;
pub const MAX_NAME_LEN: usize = 40;
pub const DEFAULT_RATING: f64 = 4.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl Difficulty {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "difficult" => Some(Difficulty::Difficult),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        }
    }
}

fn default_rating() -> f64 {
    DEFAULT_RATING
}

/// Storage shape of a tour (BSON types, `_id` key).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub duration: f64,
    pub max_group_size: i64,
    pub difficulty: Difficulty,
    #[serde(default = "default_rating")]
    pub ratings_average: f64,
    #[serde(default)]
    pub ratings_quantity: i64,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<f64>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub created_at: bson::DateTime,
    #[serde(default)]
    pub start_dates: Vec<bson::DateTime>,
    #[serde(default)]
    pub secret_tour: bool,
}

/// API shape of a tour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub duration: f64,
    pub duration_weeks: f64,
    pub max_group_size: i64,
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i64,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<f64>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: bool,
}

impl From<TourDocument> for Tour {
    fn from(doc: TourDocument) -> Self {
        Tour {
            id: doc.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            duration_weeks: doc.duration / 7.0,
            name: doc.name,
            slug: doc.slug,
            duration: doc.duration,
            max_group_size: doc.max_group_size,
            difficulty: doc.difficulty,
            ratings_average: doc.ratings_average,
            ratings_quantity: doc.ratings_quantity,
            price: doc.price,
            price_discount: doc.price_discount,
            summary: doc.summary,
            description: doc.description,
            image_cover: doc.image_cover,
            images: doc.images,
            start_dates: doc.start_dates.iter().map(|d| d.to_chrono()).collect(),
            secret_tour: doc.secret_tour,
        }
    }
}

/// Create payload. Every field is optional so validation can report the
/// full set of messages instead of failing on the first missing field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourInput {
    pub name: Option<String>,
    pub duration: Option<f64>,
    pub max_group_size: Option<i64>,
    pub difficulty: Option<String>,
    pub ratings_average: Option<f64>,
    pub ratings_quantity: Option<i64>,
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub secret_tour: Option<bool>,
}

impl TourInput {
    /// Validate and convert into a storage document. The slug and the
    /// creation timestamp are set here (insert-time behavior).
    pub fn into_document(self) -> Result<TourDocument, AppError> {
        let mut errors = Vec::new();

        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        match &name {
            None => errors.push("A tour must have a name".to_string()),
            Some(n) if n.chars().count() < MIN_NAME_LEN => {
                errors.push("A tour name must be equal or more than 10 characters".to_string())
            }
            Some(n) if n.chars().count() > MAX_NAME_LEN => {
                errors.push("A tour name must be equal or less than 40 characters".to_string())
            }
            _ => {}
        }

        if self.duration.is_none() {
            errors.push("A tour must have a duration".to_string());
        }
        if self.max_group_size.is_none() {
            errors.push("A tour must have a group size".to_string());
        }

        let difficulty = match self.difficulty.as_deref() {
            None => {
                errors.push("A tour must have a difficulty".to_string());
                None
            }
            Some(raw) => {
                let parsed = Difficulty::parse(raw);
                if parsed.is_none() {
                    errors.push(
                        "A difficulty level must be easy, medium or difficult".to_string(),
                    );
                }
                parsed
            }
        };

        let ratings_average = self.ratings_average.unwrap_or(DEFAULT_RATING);
        if ratings_average < 1.0 {
            errors.push("Rating must be equal or more than 1".to_string());
        }
        if ratings_average > 5.0 {
            errors.push("Rating must be equal or less than 5".to_string());
        }

        if self.price.is_none() {
            errors.push("A tour must have a price".to_string());
        }
        if let (Some(price), Some(discount)) = (self.price, self.price_discount) {
            if discount >= price {
                errors.push(format!(
                    "Price discount ({}) must be below the regular price",
                    discount
                ));
            }
        }

        let summary = self
            .summary
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if summary.is_none() {
            errors.push("A tour must have a summary".to_string());
        }
        if self.image_cover.is_none() {
            errors.push("A tour must have an image cover".to_string());
        }

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let (Some(name), Some(duration), Some(max_group_size), Some(difficulty), Some(price), Some(summary), Some(image_cover)) = (
            name,
            self.duration,
            self.max_group_size,
            difficulty,
            self.price,
            summary,
            self.image_cover,
        ) else {
            // every None above pushed an error, so this is unreachable
            return Err(AppError::Validation(vec!["Invalid input data".to_string()]));
        };

        Ok(TourDocument {
            id: None,
            slug: Some(slugify(&name)),
            name,
            duration,
            max_group_size,
            difficulty,
            ratings_average,
            ratings_quantity: self.ratings_quantity.unwrap_or(0),
            price,
            price_discount: self.price_discount,
            summary,
            description: self.description.map(|d| d.trim().to_string()),
            image_cover,
            images: self.images.unwrap_or_default(),
            created_at: bson::DateTime::now(),
            start_dates: self
                .start_dates
                .unwrap_or_default()
                .into_iter()
                .map(bson::DateTime::from_chrono)
                .collect(),
            secret_tour: self.secret_tour.unwrap_or(false),
        })
    }
}

/// Partial update payload (PATCH). Only the provided fields are written.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourUpdate {
    pub name: Option<String>,
    pub duration: Option<f64>,
    pub max_group_size: Option<i64>,
    pub difficulty: Option<String>,
    pub ratings_average: Option<f64>,
    pub ratings_quantity: Option<i64>,
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub secret_tour: Option<bool>,
}

impl TourUpdate {
    /// Validate the provided fields and build the `$set` document.
    /// An empty patch yields an empty document (a no-op write).
    pub fn into_set_document(self) -> Result<Document, AppError> {
        let mut errors = Vec::new();
        let mut set = Document::new();

        if let Some(name) = self.name {
            let name = name.trim().to_string();
            if name.chars().count() < MIN_NAME_LEN {
                errors.push("A tour name must be equal or more than 10 characters".to_string());
            } else if name.chars().count() > MAX_NAME_LEN {
                errors.push("A tour name must be equal or less than 40 characters".to_string());
            } else {
                set.insert("name", name);
            }
        }
        if let Some(duration) = self.duration {
            set.insert("duration", duration);
        }
        if let Some(size) = self.max_group_size {
            set.insert("maxGroupSize", size);
        }
        if let Some(raw) = self.difficulty.as_deref() {
            match Difficulty::parse(raw) {
                Some(difficulty) => {
                    set.insert("difficulty", difficulty.as_str());
                }
                None => errors
                    .push("A difficulty level must be easy, medium or difficult".to_string()),
            }
        }
        if let Some(rating) = self.ratings_average {
            if rating < 1.0 {
                errors.push("Rating must be equal or more than 1".to_string());
            } else if rating > 5.0 {
                errors.push("Rating must be equal or less than 5".to_string());
            } else {
                set.insert("ratingsAverage", rating);
            }
        }
        if let Some(quantity) = self.ratings_quantity {
            set.insert("ratingsQuantity", quantity);
        }
        if let Some(price) = self.price {
            set.insert("price", price);
        }
        if let Some(discount) = self.price_discount {
            // cross-field check only when the patch carries both values
            if let Some(price) = self.price {
                if discount >= price {
                    errors.push(format!(
                        "Price discount ({}) must be below the regular price",
                        discount
                    ));
                } else {
                    set.insert("priceDiscount", discount);
                }
            } else {
                set.insert("priceDiscount", discount);
            }
        }
        if let Some(summary) = self.summary {
            set.insert("summary", summary.trim().to_string());
        }
        if let Some(description) = self.description {
            set.insert("description", description.trim().to_string());
        }
        if let Some(cover) = self.image_cover {
            set.insert("imageCover", cover);
        }
        if let Some(images) = self.images {
            set.insert("images", images);
        }
        if let Some(dates) = self.start_dates {
            let dates: Vec<Bson> = dates
                .into_iter()
                .map(|d| Bson::DateTime(bson::DateTime::from_chrono(d)))
                .collect();
            set.insert("startDates", dates);
        }
        if let Some(secret) = self.secret_tour {
            set.insert("secretTour", secret);
        }

        if errors.is_empty() {
            Ok(set)
        } else {
            Err(AppError::Validation(errors))
        }
    }
}

/// Lowercase the name and collapse anything non-alphanumeric into
/// single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
