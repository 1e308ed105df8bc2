//! Keyword taxonomy: the term lists and type tokens the rule cascade matches against.
//!
//! The tables are plain data so they can be edited as TOML without touching
//! the evaluation order in `rules`. Any list omitted from a TOML file keeps
//! its built-in value.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Taxonomy {
    /// Type tokens that always mean money coming in
    pub income_types: Vec<String>,
    pub income_terms: Vec<String>,

    /// Type tokens that gate the person-to-person check
    pub transfer_types: Vec<String>,
    pub counterparty_terms: Vec<String>,
    pub financial_terms: Vec<String>,
    pub financial_merchant_categories: Vec<String>,

    pub essential_terms: Vec<String>,
    pub essential_merchant_categories: Vec<String>,
    pub grocery_merchants: Vec<String>,

    pub lifestyle_terms: Vec<String>,
    pub lifestyle_merchant_categories: Vec<String>,
    pub eatery_names: Vec<String>,

    /// Type tokens for which the card heuristics run
    pub card_payment_types: Vec<String>,
    pub card_dining_terms: Vec<String>,
    pub card_market_terms: Vec<String>,
    /// Card payments with fewer description characters than this are `Other`
    pub short_description_chars: usize,

    pub service_terms: Vec<String>,
}

fn terms(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self {
            income_types: terms(&["topup", "reward", "interest"]),
            income_terms: terms(&[
                "payment from",
                "transfer from",
                "refund",
                "reward",
                "interest earned",
                "income",
                "deposit",
                "salary",
            ]),
            transfer_types: terms(&["transfer", "fee"]),
            counterparty_terms: terms(&["to person_name", "from person_name"]),
            financial_terms: terms(&[
                "transfer to",
                "transfer from",
                "to person_name",
                "fee",
                "delivery",
                "account_ref",
                "closing",
                "pocket withdrawal",
            ]),
            financial_merchant_categories: terms(&["financial services"]),
            essential_terms: terms(&[
                "carrefour",
                "aldi",
                "lidl",
                "colruyt",
                "food",
                "groceries",
                "supermarket",
                "healthcare",
                "pharmacy",
                "utilities",
                "bill",
                "orange",
                "electric",
                "water",
                "transportation",
                "sncb",
                "de lijn",
                "metro",
                "bus",
                "education",
                "university",
                "school",
                "wash campus",
            ]),
            essential_merchant_categories: terms(&[
                "utilities & bills",
                "transportation",
                "education",
            ]),
            grocery_merchants: terms(&[
                "carrefour",
                "aldi",
                "lidl",
                "colruyt",
                "okay",
                "condis",
                "primaprix",
                "norma",
                "euroshop",
                "action",
                "mcdonald",
                "delhaize",
                "continente",
                "intermarche",
                "hema",
                "supermercado",
                "wenzhou",
                "amigo",
                "tradys",
                "asiatic",
                "asian",
            ]),
            lifestyle_terms: terms(&[
                "restaurant",
                "cafe",
                "bar",
                "cinema",
                "entertainment",
                "shopping",
                "retail",
                "amazon",
                "netflix",
                "streaming",
                "personal care",
                "beauty",
                "hobby",
                "travel",
                "flight",
                "hotel",
                "vacation",
                "uber",
                "taxi",
                "bolt",
                "pico",
                "doner",
                "pizza",
                "airbnb",
                "booking",
                "hairdresser",
                "nail",
                "manicure",
                "massage",
                "spa",
                "gym",
                "yoga",
                "coffee",
                "chocolate",
                "museum",
                "theater",
                "circus",
            ]),
            lifestyle_merchant_categories: terms(&[
                "entertainment",
                "shopping & retail",
                "personal care",
            ]),
            eatery_names: terms(&[
                "pico",
                "doner",
                "restaurant",
                "atelier",
                "theo",
                "chez",
                "cafe",
                "bar",
                "bakery",
                "pastry",
                "croissanterie",
                "sandwich",
                "frituur",
                "friterie",
                "kebab",
                "pizza",
                "burger",
                "hot dog",
                "tacos",
                "sushi",
                "chinese",
                "indian",
                "vietnamese",
                "thai",
                "tapas",
                "ramen",
                "curry",
                "pasta",
                "ristorante",
                "trattoria",
            ]),
            card_payment_types: terms(&["card payment"]),
            card_dining_terms: terms(&["food", "eat", "dine", "meal", "snack"]),
            card_market_terms: terms(&["market", "store", "shop", "superm"]),
            short_description_chars: 10,
            service_terms: terms(&["service", "servicios"]),
        }
    }
}

impl Taxonomy {
    /// Parse a taxonomy from TOML. Lists that are absent keep their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let taxonomy: Taxonomy = toml::from_str(s).context("parse taxonomy")?;
        taxonomy.validate()?;
        Ok(taxonomy)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        Self::from_toml_str(&s).with_context(|| format!("load taxonomy {}", path.display()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serialize taxonomy")
    }

    /// Reject tables that would make the cascade degenerate.
    ///
    /// A blank term is contained in every string, so it would fire its tier
    /// for every record.
    pub fn validate(&self) -> Result<()> {
        for (name, list) in self.named_lists() {
            if let Some(pos) = list.iter().position(|t| t.trim().is_empty()) {
                bail!("taxonomy list '{name}' has a blank term at index {pos}");
            }
        }
        if self.short_description_chars == 0 {
            bail!("short_description_chars must be at least 1");
        }
        Ok(())
    }

    fn named_lists(&self) -> [(&'static str, &Vec<String>); 16] {
        [
            ("income_types", &self.income_types),
            ("income_terms", &self.income_terms),
            ("transfer_types", &self.transfer_types),
            ("counterparty_terms", &self.counterparty_terms),
            ("financial_terms", &self.financial_terms),
            ("financial_merchant_categories", &self.financial_merchant_categories),
            ("essential_terms", &self.essential_terms),
            ("essential_merchant_categories", &self.essential_merchant_categories),
            ("grocery_merchants", &self.grocery_merchants),
            ("lifestyle_terms", &self.lifestyle_terms),
            ("lifestyle_merchant_categories", &self.lifestyle_merchant_categories),
            ("eatery_names", &self.eatery_names),
            ("card_payment_types", &self.card_payment_types),
            ("card_dining_terms", &self.card_dining_terms),
            ("card_market_terms", &self.card_market_terms),
            ("service_terms", &self.service_terms),
        ]
    }
}
