//! Deterministic rule cascade over a transaction's descriptive fields.
//!
//! Tiers are evaluated top to bottom and the first tier with a matching rule
//! decides the label. Order runs from the least ambiguous signal (exact type
//! tokens) to the most generic (substring heuristics), so a record hitting
//! several keyword sets resolves by precedence:
//!
//! 1. income type tokens
//! 2. income keywords
//! 3. transfer/fee types with person-to-person phrasing
//! 4. financial keywords and merchant categories
//! 5. essential keywords and merchant categories
//! 6. known grocery merchants
//! 7. lifestyle keywords and merchant categories
//! 8. known eateries
//! 9. card payment heuristics (dining, market, short description)
//! 10. generic service terms
//!
//! Anything left over is `Other`.

use tracing::debug;

use crate::classifier::{ClassificationResult, Classifier, Provenance};
use crate::label::CategoryLabel;
use crate::taxonomy::Taxonomy;

/// Free-text field a keyword rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Description,
    MerchantCategory,
}

/// A single match predicate. Terms are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Any term is a substring of any of the listed fields
    KeywordMatch { fields: Vec<Field>, terms: Vec<String> },
    /// The type token equals one of the tokens
    ExactTypeMatch(Vec<String>),
    /// Any term is a substring of the merchant category
    MerchantCategoryMatch(Vec<String>),
    /// `inner` only applies when the type token is one of `types`
    TypeGated { types: Vec<String>, inner: Box<Matcher> },
    /// The description has fewer than `max_chars` characters
    ShortDescription { max_chars: usize },
}

/// Lowercased view of a record, computed once per evaluation.
struct Normalized {
    description: String,
    merchant_category: String,
    transaction_type: String,
}

impl Normalized {
    fn new(description: &str, merchant_category: &str, transaction_type: &str) -> Self {
        Self {
            description: description.to_lowercase(),
            merchant_category: merchant_category.to_lowercase(),
            transaction_type: transaction_type.trim().to_lowercase(),
        }
    }

    fn field(&self, field: Field) -> &str {
        match field {
            Field::Description => &self.description,
            Field::MerchantCategory => &self.merchant_category,
        }
    }
}

fn lowered(list: &[String]) -> Vec<String> {
    list.iter().map(|t| t.to_lowercase()).collect()
}

fn tokens(list: &[String]) -> Vec<String> {
    list.iter().map(|t| t.trim().to_lowercase()).collect()
}

fn contains_any(haystack: &str, terms: &[String]) -> bool {
    !haystack.is_empty() && terms.iter().any(|t| haystack.contains(t.as_str()))
}

impl Matcher {
    pub fn keyword(fields: &[Field], terms: &[String]) -> Self {
        Matcher::KeywordMatch {
            fields: fields.to_vec(),
            terms: lowered(terms),
        }
    }

    pub fn exact_type(types: &[String]) -> Self {
        Matcher::ExactTypeMatch(tokens(types))
    }

    pub fn merchant_category(terms: &[String]) -> Self {
        Matcher::MerchantCategoryMatch(lowered(terms))
    }

    pub fn type_gated(types: &[String], inner: Matcher) -> Self {
        Matcher::TypeGated {
            types: tokens(types),
            inner: Box::new(inner),
        }
    }

    fn matches(&self, f: &Normalized) -> bool {
        match self {
            Matcher::KeywordMatch { fields, terms } => {
                fields.iter().any(|&field| contains_any(f.field(field), terms))
            }
            Matcher::ExactTypeMatch(types) => types.iter().any(|t| *t == f.transaction_type),
            Matcher::MerchantCategoryMatch(terms) => contains_any(&f.merchant_category, terms),
            Matcher::TypeGated { types, inner } => {
                types.iter().any(|t| *t == f.transaction_type) && inner.matches(f)
            }
            Matcher::ShortDescription { max_chars } => f.description.chars().count() < *max_chars,
        }
    }
}

/// An ordered group of rules sharing one target label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tier {
    pub name: String,
    pub label: CategoryLabel,
    pub rules: Vec<Matcher>,
}

impl Tier {
    pub fn new(name: impl Into<String>, label: CategoryLabel, rules: Vec<Matcher>) -> Self {
        Self {
            name: name.into(),
            label,
            rules,
        }
    }

    fn fires(&self, f: &Normalized) -> bool {
        self.rules.iter().any(|r| r.matches(f))
    }
}

/// Outcome of running the cascade on one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation<'a> {
    pub label: CategoryLabel,
    /// The tier that fired, `None` when the default applied
    pub tier: Option<&'a Tier>,
}

/// Local, pure classifier built from a [`Taxonomy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEngine {
    tiers: Vec<Tier>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        RuleEngine::new(&Taxonomy::default())
    }
}

impl RuleEngine {
    pub fn new(tx: &Taxonomy) -> Self {
        use CategoryLabel::*;
        use Field::*;

        let card = |inner: Matcher| Matcher::type_gated(&tx.card_payment_types, inner);

        let tiers = vec![
            Tier::new("income-type", IncomeReceipts, vec![Matcher::exact_type(&tx.income_types)]),
            Tier::new(
                "income-keywords",
                IncomeReceipts,
                vec![Matcher::keyword(&[Description], &tx.income_terms)],
            ),
            Tier::new(
                "p2p-transfer",
                FinancialManagement,
                vec![Matcher::type_gated(
                    &tx.transfer_types,
                    Matcher::keyword(&[Description], &tx.counterparty_terms),
                )],
            ),
            Tier::new(
                "financial",
                FinancialManagement,
                vec![
                    Matcher::keyword(&[Description], &tx.financial_terms),
                    Matcher::merchant_category(&tx.financial_merchant_categories),
                ],
            ),
            Tier::new(
                "essential",
                EssentialLiving,
                vec![
                    Matcher::keyword(&[Description, MerchantCategory], &tx.essential_terms),
                    Matcher::merchant_category(&tx.essential_merchant_categories),
                ],
            ),
            Tier::new(
                "grocery-merchant",
                EssentialLiving,
                vec![Matcher::keyword(&[Description], &tx.grocery_merchants)],
            ),
            Tier::new(
                "lifestyle",
                LifestyleSpending,
                vec![
                    Matcher::keyword(&[Description, MerchantCategory], &tx.lifestyle_terms),
                    Matcher::merchant_category(&tx.lifestyle_merchant_categories),
                ],
            ),
            Tier::new(
                "eatery",
                LifestyleSpending,
                vec![Matcher::keyword(&[Description], &tx.eatery_names)],
            ),
            Tier::new(
                "card-dining",
                LifestyleSpending,
                vec![card(Matcher::keyword(&[Description], &tx.card_dining_terms))],
            ),
            Tier::new(
                "card-market",
                EssentialLiving,
                vec![card(Matcher::keyword(&[Description], &tx.card_market_terms))],
            ),
            // Stops short card descriptions before the generic service check.
            Tier::new(
                "card-short-description",
                Other,
                vec![card(Matcher::ShortDescription {
                    max_chars: tx.short_description_chars,
                })],
            ),
            Tier::new(
                "service",
                FinancialManagement,
                vec![Matcher::keyword(&[Description], &tx.service_terms)],
            ),
        ];

        Self { tiers }
    }

    /// Build an engine from an explicit tier list, evaluated in the given order.
    pub fn from_tiers(tiers: Vec<Tier>) -> Self {
        Self { tiers }
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn evaluate(
        &self,
        description: &str,
        merchant_category: &str,
        transaction_type: &str,
    ) -> Evaluation<'_> {
        let f = Normalized::new(description, merchant_category, transaction_type);
        match self.tiers.iter().find(|tier| tier.fires(&f)) {
            Some(tier) => {
                debug!(tier = %tier.name, label = %tier.label, description, "rule tier matched");
                Evaluation {
                    label: tier.label,
                    tier: Some(tier),
                }
            }
            None => Evaluation {
                label: CategoryLabel::Other,
                tier: None,
            },
        }
    }
}

impl Classifier for RuleEngine {
    fn classify(
        &self,
        description: &str,
        merchant_category: &str,
        transaction_type: &str,
    ) -> ClassificationResult {
        let eval = self.evaluate(description, merchant_category, transaction_type);
        let tier = eval
            .tier
            .map(|t| t.name.clone())
            .unwrap_or_else(|| "default".to_string());
        ClassificationResult::new(eval.label, Provenance::Rule { tier })
    }

    fn name(&self) -> &str {
        "rules"
    }
}
