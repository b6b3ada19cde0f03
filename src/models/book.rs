use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Physical condition of a listed book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookCondition {
    New,
    LikeNew,
    Good,
    Fair,
    Worn,
}

impl BookCondition {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "new" => Ok(BookCondition::New),
            "like_new" => Ok(BookCondition::LikeNew),
            "good" => Ok(BookCondition::Good),
            "fair" => Ok(BookCondition::Fair),
            "worn" => Ok(BookCondition::Worn),
            _ => Err(format!("Invalid condition: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookCondition::New => "new",
            BookCondition::LikeNew => "like_new",
            BookCondition::Good => "good",
            BookCondition::Fair => "fair",
            BookCondition::Worn => "worn",
        }
    }
}

/// Book listed for lending, and optionally for sale
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub author: String,
    pub genre: String,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub condition: String,
    pub daily_fee: Decimal,
    pub selling_price: Option<Decimal>,
    pub is_available: bool,
    pub created_at: NaiveDateTime,
}

impl Book {
    pub fn is_for_sale(&self) -> bool {
        self.selling_price.is_some()
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }

    pub fn condition_enum(&self) -> BookCondition {
        BookCondition::from_str(&self.condition).unwrap_or(BookCondition::Good)
    }
}

/// Listing payload shared by create and full update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookDetails {
    pub title: String,
    pub author: String,
    pub genre: String,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_condition")]
    pub condition: BookCondition,
    pub daily_fee: Decimal,
    #[serde(default)]
    pub selling_price: Option<Decimal>,
}

fn default_condition() -> BookCondition {
    BookCondition::Good
}

impl BookDetails {
    /// Trim text fields and check the listing is well-formed
    pub fn normalized(mut self) -> Result<Self, String> {
        self.title = self.title.trim().to_string();
        self.author = self.author.trim().to_string();
        self.genre = self.genre.trim().to_string();

        if self.title.is_empty() {
            return Err("Title is required".to_string());
        }
        if self.author.is_empty() {
            return Err("Author is required".to_string());
        }
        if self.genre.is_empty() {
            return Err("Genre is required".to_string());
        }
        if self.title.len() > 300 || self.author.len() > 200 {
            return Err("Title or author is too long".to_string());
        }
        if self.daily_fee <= Decimal::ZERO {
            return Err("Daily fee must be greater than zero".to_string());
        }
        if matches!(self.selling_price, Some(p) if p <= Decimal::ZERO) {
            return Err("Selling price must be greater than zero".to_string());
        }
        self.isbn = self.isbn.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Ok(self)
    }
}

/// Filters for browsing a society's shelf
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub search: Option<String>,
    pub genre: Option<String>,
    pub available_only: bool,
}

impl BookFilter {
    /// ILIKE pattern for the search term, with wildcards in user input escaped
    pub fn search_pattern(&self) -> Option<String> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(|s| {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{}%", escaped)
        })
    }
}
