//! Prompt text sent to the text-generation service.

use supercat_core::CategoryLabel;

pub const SYSTEM: &str = "You are a financial transaction categorization assistant. \
Always respond with only the category name.";

/// User message describing the five categories and the transaction's fields.
pub fn user_prompt(description: &str, merchant_category: &str, transaction_type: &str) -> String {
    let mut s =
        String::from("Categorize this financial transaction into ONE of these 5 categories:\n");
    for (i, label) in CategoryLabel::ALL.iter().enumerate() {
        s.push_str(&format!("{}. {} ({})\n", i + 1, label, label.description()));
    }
    s.push_str(&format!(
        "\nTransaction details:\n\
         - Description: {description}\n\
         - Current Category: {merchant_category}\n\
         - Type: {transaction_type}\n\n\
         Respond with ONLY the category name (e.g., \"{}\" or \"{}\").\n",
        CategoryLabel::EssentialLiving,
        CategoryLabel::FinancialManagement,
    ));
    s
}
