//! The schema-constrained extraction prompt.
//!
//! Centralising the prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the JSON field list below is the wire
//!    contract that [`crate::record::InvoiceRecord`] deserializes against;
//!    changing either side means editing exactly one other place.
//!
//! 2. **Testability** — unit tests inspect the prompt directly without
//!    spinning up a real model, so schema regressions are caught before a
//!    single API call is spent.
//!
//! The instruction text matters: buyer-name stripping, the 5–10 word summary
//! bound, date and amount formatting all live in the prompt, not in
//! post-processing. The model does the normalization; the parser only
//! defends against the cases where it didn't.

/// Build the extraction prompt for one batch.
///
/// `page_range` is the batch's human-readable label (`"Pages 16-30"` or
/// `"All"`), included so the model knows it may be looking at a slice of a
/// larger document.
pub fn extraction_prompt(page_range: &str) -> String {
    format!(
        r#"Act as a senior forensic accountant. Analyze this PDF chunk ({page_range}).
Extract data strictly into a PARENT-CHILD hierarchy.

CRITICAL EXTRACTION RULES:
1. **Buyer_Name_Only**: Extract ONLY the Legal Company Name OR Person Name. DO NOT include address, email, or phone.
   - BAD: "Olivia Smith, 123 Street, NY"
   - GOOD: "Olivia Smith" OR "Really Great Company"
2. **Summary**: Write a short 5-10 word summary of the WHOLE invoice (e.g., "Web Design and SEO Services").
3. **Line Items**: Extract the physical table of goods/services.
4. **Formatting**: Dates MUST be YYYY-MM-DD. Amounts must be floats.

JSON STRUCTURE (Return a LIST of these objects):
[
    {{
        "Invoice_ID": "string (keep zeros)",
        "Date_Issued": "YYYY-MM-DD",
        "Due_Date": "YYYY-MM-DD",
        "Seller_Name": "string",
        "Buyer_Name_Only": "string (Name ONLY, no address)",
        "Total_Amount": float,
        "Tax_Amount": float,
        "Currency": "string",
        "Bank_IBAN": "string",
        "General_Summary": "string",
        "Line_Items": [
            {{
                "Description": "string",
                "Quantity": float,
                "Unit_Price": float,
                "Line_Total": float
            }}
        ]
    }}
]"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every field the deserializer knows must be named in the prompt schema,
    /// so the model and the parser cannot drift apart silently.
    #[test]
    fn prompt_names_every_schema_field() {
        let prompt = extraction_prompt("All");
        for field in [
            "Invoice_ID",
            "Date_Issued",
            "Due_Date",
            "Seller_Name",
            "Buyer_Name_Only",
            "Total_Amount",
            "Tax_Amount",
            "Currency",
            "Bank_IBAN",
            "General_Summary",
            "Line_Items",
            "Description",
            "Quantity",
            "Unit_Price",
            "Line_Total",
        ] {
            assert!(prompt.contains(field), "prompt is missing field {field}");
        }
    }

    #[test]
    fn prompt_interpolates_page_range() {
        assert!(extraction_prompt("Pages 16-30").contains("(Pages 16-30)"));
        assert!(extraction_prompt("All").contains("(All)"));
    }

    #[test]
    fn prompt_does_not_mention_filename() {
        // Filename is stamped by the aggregator; the model must not be asked
        // for it.
        assert!(!extraction_prompt("All").contains("Filename"));
    }
}
