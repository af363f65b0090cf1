//! Prompts for page extraction and semantic field comparison.
//!
//! Every prompt lives here so the call sites in [`crate::pipeline::llm`] and
//! [`crate::matching::oracle`] only deal with transport, retries and parsing.
//! Callers can override the extraction system prompt via
//! [`crate::config::PipelineConfig::system_prompt`].

use crate::model::MatchField;

/// Default system prompt for extracting investment fields from one page.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an investment analyst reading a single page of a startup pitch deck.
Extract ONLY the following fields when the page states them:

- company_name: the company's name
- company_website: website URL or domain
- company_email: contact email address
- sector: industry sector or vertical (FinTech, HealthTech, EdTech, ...)
- location: headquarters or operating location (city, country, region)
- stage: investment stage (Pre-seed, Seed, Series A, Series B, Series C, ...)
- check_size: amount being raised or funding goal, in USD
- lead: investor role sought. One of "Lead Investor", "Co-Investor",
  "Both (Lead & Co-Investor)", a named firm (e.g. "Acme Ventures"), or "Unknown"
- investment_theme: the single most relevant theme, two at most

Preferred investment themes:
  Healthcare: Digital Health, MedTech, Biotech & Pharma, Healthcare Services & Delivery,
    Healthcare IT & Infrastructure, Insurance & Fintech in Healthcare,
    Longevity & Emerging Trends
  Technology: FinTech, EdTech, B2B SaaS, AI/ML, Cybersecurity, E-commerce, Mobile Apps
  Industry: CleanTech, AgTech, FoodTech, Supply Chain, Manufacturing, Energy
  Emerging: Web3, Blockchain, AR/VR, Robotics, Climate Tech

Good theme: "Digital Health" or "FinTech, B2B SaaS".
Bad theme: "Digital Health, AI, Healthcare Services, Analytics" (overlapping, too many).

Reply with ONE JSON object containing exactly these nine keys. Use null for any
field the page does not mention. No prose, no code fences.

Example:
{"company_name": "HealthTech Solutions", "company_website": "www.healthtechsolutions.com",
 "company_email": "contact@healthtechsolutions.com", "sector": "HealthTech",
 "location": "Boston, MA", "stage": "Series A", "check_size": "$5M",
 "lead": "Lead Investor", "investment_theme": "Digital Health"}"#;

/// Build the user message carrying one page's text.
pub fn extraction_user_prompt(page_number: usize, page_text: &str) -> String {
    format!(
        "Extract the investment information from this pitch deck page.\n\n\
         Page {page_number} content:\n\"\"\"\n{page_text}\n\"\"\"\n\n\
         For investment_theme give the primary theme only (two at most).\n\
         JSON:"
    )
}

/// Domain rules the comparison model applies for a given field family.
///
/// `lead` has none; only the general synonym guidance applies to it.
fn comparison_rules(field: MatchField) -> Option<&'static str> {
    let rules = match field {
        MatchField::Location => {
            "- \"Global\", \"Worldwide\" and \"International\" match ANY location\n\
             - A region matches the countries inside it\n\
             - Country codes match full names (US = United States, UK = United Kingdom)"
        }
        MatchField::Stage => {
            "- \"Early stage\" includes pre-seed, seed and series-a\n\
             - \"Late stage\" includes series-b, series-c, series-d and growth\n\
             - \"Growth\" matches \"expansion\" and \"scale-up\"\n\
             - A specific stage matches a broader category that contains it"
        }
        MatchField::Sector | MatchField::InvestmentTheme => {
            "- Related industries match (fintech = financial services)\n\
             - Technology subcategories match (AI = machine learning = artificial intelligence)\n\
             - Broader categories include specific ones (healthcare includes medtech and biotech)"
        }
        MatchField::CheckSize => {
            "- Overlapping ranges match (1-5M matches 2-10M)\n\
             - Different notations of the same amount match ($1M = $1,000,000)"
        }
        MatchField::Lead => return None,
    };
    Some(rules)
}

/// Build the single-turn prompt asking whether two values are equivalent.
///
/// The model must answer with exactly `MATCH` or `NO_MATCH`.
pub fn comparison_prompt(pitch_value: &str, fund_value: &str, field: MatchField) -> String {
    let rules = comparison_rules(field)
        .map(|rules| format!("Rules for {field}:\n{rules}\n\n"))
        .unwrap_or_default();
    format!(
        "Compare these two {field} values and decide whether they are semantically \
         similar or related.\n\n\
         Pitch deck {field}: \"{pitch_value}\"\n\
         Fund {field}: \"{fund_value}\"\n\n\
         {rules}\
         Also treat synonyms, industry-standard terminology, and abbreviations versus \
         full forms as equivalent.\n\n\
         Respond with only \"MATCH\" or \"NO_MATCH\"."
    )
}
