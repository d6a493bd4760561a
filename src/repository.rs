//! Tour persistence: the [`TourStore`] seam and its MongoDB implementation.
//!
//! Handlers only ever see the trait, so tests can swap in an in-memory
//! store. `MongoTourStore` translates a [`ListQuery`] into BSON filter /
//! sort / projection documents and owns the two fixed aggregation
//! pipelines (per-difficulty stats, per-year monthly plan). Every
//! pipeline is prefixed with a match that keeps secret tours out of
//! aggregations; plain finds do not exclude them.

use async_trait::async_trait;
use chrono::TimeZone;
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document};
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{Collection, Database, IndexModel};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::AppError;
use crate::features::{FilterOp, FilterValue, ListQuery, SortOrder};
use crate::model::{Tour, TourDocument};

/// Name of the backing collection.
pub const COLLECTION: &str = "tours";

/// Minimum average rating a tour needs to enter the stats aggregation.
pub const STATS_MIN_RATING: f64 = 4.5;

#[async_trait]
pub trait TourStore: Send + Sync {
    /// One filtered / sorted / projected / paginated page of tours.
    /// Raw JSON because the projection decides which fields survive.
    async fn list(&self, query: &ListQuery) -> Result<Vec<Value>, AppError>;

    async fn get(&self, id: &str) -> Result<Option<Tour>, AppError>;

    async fn create(&self, document: TourDocument) -> Result<Tour, AppError>;

    /// Apply the `$set` fields and return the pre-update document.
    async fn update(&self, id: &str, set: Document) -> Result<Option<Tour>, AppError>;

    async fn delete(&self, id: &str) -> Result<Option<Tour>, AppError>;

    async fn stats(&self) -> Result<Vec<DifficultyStats>, AppError>;

    async fn monthly_plan(&self, year: i32) -> Result<Vec<MonthlyPlanEntry>, AppError>;
}

/// One `tour-stats` aggregation row, grouped by upper-cased difficulty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyStats {
    #[serde(rename = "_id")]
    pub difficulty: String,
    pub num_tours: i64,
    pub num_ratings: i64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

/// One month of the per-year plan aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPlanEntry {
    pub month: u32,
    pub num_tour_starts: i64,
    pub tours: Vec<String>,
}

pub struct MongoTourStore {
    tours: Collection<TourDocument>,
    // untyped handle: projected finds and aggregations return raw documents
    raw: Collection<Document>,
}

impl MongoTourStore {
    pub fn new(database: &Database) -> Self {
        Self {
            tours: database.collection(COLLECTION),
            raw: database.collection(COLLECTION),
        }
    }

    /// Create the indexes the collection relies on. The unique index on
    /// `name` is what turns a repeated tour name into an E11000 write
    /// error, which [`AppError`] maps to the duplicate-field response.
    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        self.tours.create_index(name_index(), None).await?;
        Ok(())
    }

    /// Bulk-import tours (dev-data seeding). Returns the number inserted.
    pub async fn import(&self, documents: Vec<TourDocument>) -> Result<usize, AppError> {
        if documents.is_empty() {
            return Ok(0);
        }
        let result = self.tours.insert_many(documents, None).await?;
        Ok(result.inserted_ids.len())
    }

    /// Drop every tour (dev-data reset). Returns the number removed.
    pub async fn purge(&self) -> Result<u64, AppError> {
        let result = self.raw.delete_many(doc! {}, None).await?;
        Ok(result.deleted_count)
    }
}

#[async_trait]
impl TourStore for MongoTourStore {
    async fn list(&self, query: &ListQuery) -> Result<Vec<Value>, AppError> {
        let options = FindOptions::builder()
            .sort(sort_document(query))
            .projection(projection_document(query))
            .skip(query.skip())
            .limit(query.limit)
            .build();

        let mut cursor = self.raw.find(filter_document(query), options).await?;
        let mut tours = Vec::new();
        while cursor.advance().await? {
            let document = cursor.deserialize_current().map_err(to_parse_error)?;
            tours.push(document_to_json(document));
        }
        Ok(tours)
    }

    async fn get(&self, id: &str) -> Result<Option<Tour>, AppError> {
        let oid = parse_object_id(id)?;
        let document = self.tours.find_one(doc! { "_id": oid }, None).await?;
        Ok(document.map(Tour::from))
    }

    async fn create(&self, mut document: TourDocument) -> Result<Tour, AppError> {
        document.id = Some(ObjectId::new());
        self.tours.insert_one(&document, None).await?;
        Ok(Tour::from(document))
    }

    async fn update(&self, id: &str, set: Document) -> Result<Option<Tour>, AppError> {
        let oid = parse_object_id(id)?;
        if set.is_empty() {
            // nothing to write; still report whether the tour exists
            let document = self.tours.find_one(doc! { "_id": oid }, None).await?;
            return Ok(document.map(Tour::from));
        }
        // the driver returns the pre-update document by default
        let document = self
            .tours
            .find_one_and_update(doc! { "_id": oid }, doc! { "$set": set }, None)
            .await?;
        Ok(document.map(Tour::from))
    }

    async fn delete(&self, id: &str) -> Result<Option<Tour>, AppError> {
        let oid = parse_object_id(id)?;
        let document = self
            .tours
            .find_one_and_delete(doc! { "_id": oid }, None)
            .await?;
        Ok(document.map(Tour::from))
    }

    async fn stats(&self) -> Result<Vec<DifficultyStats>, AppError> {
        let mut cursor = self.raw.aggregate(stats_pipeline(), None).await?;
        let mut rows = Vec::new();
        while cursor.advance().await? {
            let document = cursor.deserialize_current().map_err(to_parse_error)?;
            rows.push(bson::from_document(document).map_err(to_parse_error)?);
        }
        Ok(rows)
    }

    async fn monthly_plan(&self, year: i32) -> Result<Vec<MonthlyPlanEntry>, AppError> {
        let mut cursor = self.raw.aggregate(monthly_plan_pipeline(year)?, None).await?;
        let mut entries = Vec::new();
        while cursor.advance().await? {
            let document = cursor.deserialize_current().map_err(to_parse_error)?;
            entries.push(bson::from_document(document).map_err(to_parse_error)?);
        }
        Ok(entries)
    }
}

pub fn name_index() -> IndexModel {
    IndexModel::builder()
        .keys(doc! { "name": 1 })
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn parse_object_id(id: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(id).map_err(|_| AppError::Cast {
        path: "_id".to_string(),
        value: id.to_string(),
    })
}

fn to_parse_error(err: impl std::fmt::Display) -> AppError {
    AppError::Parse(err.to_string())
}

// ---- ListQuery → BSON ----

pub fn filter_document(query: &ListQuery) -> Document {
    let mut filter = Document::new();
    for condition in &query.conditions {
        let value = bson_value(&condition.value);
        match condition.op {
            FilterOp::Eq => {
                filter.insert(&condition.field, value);
            }
            op => {
                // range operators on the same field merge into one clause,
                // e.g. ?duration[gte]=5&duration[lte]=9
                let operator = mongo_operator(op);
                match filter.get_mut(&condition.field) {
                    Some(Bson::Document(clauses)) => {
                        clauses.insert(operator, value);
                    }
                    _ => {
                        let mut clauses = Document::new();
                        clauses.insert(operator, value);
                        filter.insert(&condition.field, clauses);
                    }
                }
            }
        }
    }
    filter
}

pub fn sort_document(query: &ListQuery) -> Document {
    let mut sort = Document::new();
    for key in &query.sort {
        let direction = match key.order {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        };
        sort.insert(&key.field, direction);
    }
    sort
}

/// Include-list projection when `fields` was given; otherwise only
/// `createdAt` is excluded (it never leaves the database).
pub fn projection_document(query: &ListQuery) -> Document {
    match &query.fields {
        Some(fields) => {
            let mut projection = Document::new();
            for field in fields {
                projection.insert(field, 1);
            }
            projection
        }
        None => doc! { "createdAt": 0 },
    }
}

fn mongo_operator(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Eq => "$eq",
        FilterOp::Gt => "$gt",
        FilterOp::Gte => "$gte",
        FilterOp::Lt => "$lt",
        FilterOp::Lte => "$lte",
    }
}

fn bson_value(value: &FilterValue) -> Bson {
    match value {
        FilterValue::Number(n) => Bson::Double(*n),
        FilterValue::Bool(b) => Bson::Boolean(*b),
        FilterValue::Text(s) => Bson::String(s.clone()),
    }
}

// ---- Aggregation pipelines ----

pub fn stats_pipeline() -> Vec<Document> {
    with_secret_tours_excluded(vec![
        doc! { "$match": { "ratingsAverage": { "$gte": STATS_MIN_RATING } } },
        doc! { "$group": {
            "_id": { "$toUpper": "$difficulty" },
            "numTours": { "$sum": 1 },
            "numRatings": { "$sum": "$ratingsQuantity" },
            "avgRating": { "$avg": "$ratingsAverage" },
            "avgPrice": { "$avg": "$price" },
            "minPrice": { "$min": "$price" },
            "maxPrice": { "$max": "$price" },
        } },
        doc! { "$sort": { "avgPrice": 1 } },
    ])
}

pub fn monthly_plan_pipeline(year: i32) -> Result<Vec<Document>, AppError> {
    let from = year_date(year, 1, 1)?;
    let to = year_date(year, 12, 31)?;

    Ok(with_secret_tours_excluded(vec![
        doc! { "$unwind": "$startDates" },
        doc! { "$match": { "startDates": { "$gte": from, "$lte": to } } },
        doc! { "$group": {
            "_id": { "$month": "$startDates" },
            "numTourStarts": { "$sum": 1 },
            "tours": { "$push": "$name" },
        } },
        doc! { "$addFields": { "month": "$_id" } },
        doc! { "$project": { "_id": 0 } },
        doc! { "$sort": { "numTourStarts": -1 } },
        doc! { "$limit": 12 },
    ]))
}

/// Secret tours never enter aggregations.
fn with_secret_tours_excluded(mut pipeline: Vec<Document>) -> Vec<Document> {
    pipeline.insert(0, doc! { "$match": { "secretTour": { "$ne": true } } });
    pipeline
}

fn year_date(year: i32, month: u32, day: u32) -> Result<Bson, AppError> {
    let date = chrono::Utc
        .with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .ok_or_else(|| AppError::BadRequest(format!("Invalid year: {}", year)))?;
    Ok(Bson::DateTime(bson::DateTime::from_chrono(date)))
}

// ---- BSON → API JSON ----

/// Convert a raw BSON document into API JSON: ObjectIds become hex
/// strings, dates become RFC 3339 strings, and the `durationWeeks`
/// virtual is attached whenever `duration` survived the projection.
pub fn document_to_json(document: Document) -> Value {
    let duration_weeks = duration_of(&document).map(|d| d / 7.0);

    let mut map = Map::new();
    for (key, value) in document {
        map.insert(key, bson_to_json(value));
    }
    if let Some(weeks) = duration_weeks {
        map.insert("durationWeeks".to_string(), json_number(weeks));
    }
    Value::Object(map)
}

fn duration_of(document: &Document) -> Option<f64> {
    match document.get("duration") {
        Some(Bson::Double(v)) => Some(*v),
        Some(Bson::Int32(v)) => Some(f64::from(*v)),
        Some(Bson::Int64(v)) => Some(*v as f64),
        _ => None,
    }
}

fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => Value::String(dt.to_chrono().to_rfc3339()),
        Bson::Double(v) => json_number(v),
        Bson::Int32(v) => Value::from(v),
        Bson::Int64(v) => Value::from(v),
        Bson::String(s) => Value::String(s),
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Null => Value::Null,
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::Document(doc) => document_to_json(doc),
        other => other.into_relaxed_extjson(),
    }
}

fn json_number(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}
