//! Prompt text for the disclosure analysis call.
//!
//! Every prompt string lives here so that a wording change touches exactly
//! one place and tests can inspect prompts without a live model.
//!
//! Callers can override the default via
//! [`crate::config::AnalysisConfig::system_prompt`]; the constants here are
//! used only when no override is provided.

use crate::output::DisclosureLabels;

/// Default system prompt for analysing a disclosure document.
///
/// Asks for exactly the markdown subset the HTML renderer understands.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a financial analyst who reads corporate disclosure filings and writes concise analysis reports for investors.

You receive the extracted text of one disclosure document together with its disclosure type and specific type.

Write the report with these sections:

1. SUMMARY
   - What was disclosed, by whom, and when
   - The key figures (amounts, ratios, dates, counterparties)

2. FINANCIAL IMPACT
   - Effect on revenue, earnings, capital structure or cash flow
   - Compare against the company's size where the document allows

3. SIGNIFICANCE FOR INVESTORS
   - Why the disclosure matters, and for which kind of investor

4. OUTLOOK AND RISKS
   - Expected follow-up events
   - Risk factors stated or clearly implied by the document

Formatting rules:
   - Use # for the report title, ## for the sections above, ### for subsections
   - Use - for bullet lists and 1. 2. 3. for ordered lists; do not nest lists
   - Use GFM pipe tables for figures that compare several items
   - Use **bold** for key figures and conclusions
   - Do NOT wrap the report in ```markdown fences
   - Do NOT invent figures that are not in the document; say when data is missing
   - Output ONLY the report"#;

/// Appended to the document text when it was cut to fit the token budget.
pub const TRUNCATION_NOTICE: &str =
    "[The document was too long and only its beginning was analysed. Upload a shorter document for a complete analysis.]";

/// Build the user message sent alongside the system prompt.
pub fn analysis_input(document_text: &str, labels: &DisclosureLabels) -> String {
    format!(
        "Document content: {}\nDisclosure type: {}\nSpecific type: {}",
        document_text, labels.disclosure_type, labels.specific_type
    )
}
