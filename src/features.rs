//! Query-feature builder.
//!
//! Translates the raw query string of a list request into typed filter,
//! sort, field-projection, and pagination clauses:
//!
//! `?difficulty=easy&price[lt]=1000&sort=-ratingsAverage,price&fields=name,price&page=2&limit=10`
//!
//! Everything except the reserved `page` / `sort` / `limit` / `fields`
//! parameters becomes a filter condition. The storage layer decides how
//! a [`ListQuery`] maps onto the database.

use std::collections::HashMap;

use crate::error::AppError;

/// Parameters with query-feature meaning; everything else filters.
pub const RESERVED_PARAMS: &[&str] = &["page", "sort", "limit", "fields"];

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOp {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "gt" => Some(FilterOp::Gt),
            "gte" => Some(FilterOp::Gte),
            "lt" => Some(FilterOp::Lt),
            "lte" => Some(FilterOp::Lte),
            _ => None,
        }
    }
}

/// Filter values are coerced: numeric strings compare numerically,
/// `true` / `false` as booleans, anything else as text.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl FilterValue {
    pub fn parse(raw: &str) -> Self {
        if let Ok(number) = raw.parse::<f64>() {
            return FilterValue::Number(number);
        }
        match raw {
            "true" => FilterValue::Bool(true),
            "false" => FilterValue::Bool(false),
            _ => FilterValue::Text(raw.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub field: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub conditions: Vec<FilterCondition>,
    pub sort: Vec<SortKey>,
    /// Include-list projection; `None` selects all fields.
    pub fields: Option<Vec<String>>,
    pub page: u64,
    pub limit: i64,
}

impl Default for ListQuery {
    fn default() -> Self {
        ListQuery {
            conditions: Vec::new(),
            sort: default_sort(),
            fields: None,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ListQuery {
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, AppError> {
        let mut conditions = Vec::new();
        // HashMap iteration order is arbitrary; sort for determinism
        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort();
        for key in keys {
            if RESERVED_PARAMS.contains(&key.as_str()) {
                continue;
            }
            let (field, op) = parse_filter_key(key)?;
            conditions.push(FilterCondition {
                field,
                op,
                value: FilterValue::parse(&params[key]),
            });
        }

        let sort = match params.get("sort") {
            Some(raw) => parse_sort(raw),
            None => default_sort(),
        };

        let fields = params
            .get("fields")
            .map(|raw| parse_fields(raw))
            .filter(|fields| !fields.is_empty());

        let page = match params.get("page") {
            Some(raw) => parse_positive(raw, "page")? as u64,
            None => DEFAULT_PAGE,
        };
        let limit = match params.get("limit") {
            Some(raw) => parse_positive(raw, "limit")?,
            None => DEFAULT_LIMIT,
        };

        Ok(ListQuery {
            conditions,
            sort,
            fields,
            page,
            limit,
        })
    }

    /// Number of records skipped before this page starts.
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit as u64)
    }
}

fn parse_filter_key(key: &str) -> Result<(String, FilterOp), AppError> {
    match key.find('[') {
        None => {
            if key.contains(']') || key.is_empty() {
                return Err(AppError::BadRequest(format!(
                    "Malformed filter parameter: {}",
                    key
                )));
            }
            Ok((key.to_string(), FilterOp::Eq))
        }
        Some(open) => {
            if open == 0 || !key.ends_with(']') || open + 1 >= key.len() - 1 {
                return Err(AppError::BadRequest(format!(
                    "Malformed filter parameter: {}",
                    key
                )));
            }
            let field = &key[..open];
            let raw_op = &key[open + 1..key.len() - 1];
            let op = FilterOp::parse(raw_op).ok_or_else(|| {
                AppError::BadRequest(format!("Unsupported filter operator: {}", raw_op))
            })?;
            Ok((field.to_string(), op))
        }
    }
}

fn parse_sort(raw: &str) -> Vec<SortKey> {
    let keys: Vec<SortKey> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty() && *part != "-")
        .map(|part| match part.strip_prefix('-') {
            Some(field) => SortKey {
                field: field.to_string(),
                order: SortOrder::Descending,
            },
            None => SortKey {
                field: part.to_string(),
                order: SortOrder::Ascending,
            },
        })
        .collect();

    if keys.is_empty() {
        default_sort()
    } else {
        keys
    }
}

fn default_sort() -> Vec<SortKey> {
    vec![SortKey {
        field: "createdAt".to_string(),
        order: SortOrder::Descending,
    }]
}

fn parse_fields(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_positive(raw: &str, name: &str) -> Result<i64, AppError> {
    let value = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::BadRequest(format!("{} must be a positive integer", name)))?;
    if value <= 0 {
        return Err(AppError::BadRequest(format!(
            "{} must be a positive integer",
            name
        )));
    }
    Ok(value)
}
