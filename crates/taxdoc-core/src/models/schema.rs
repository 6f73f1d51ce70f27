//! Supported document types and their canonical field lists.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A tax document type the extractor knows how to prompt for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "W-2")]
    W2,
    #[serde(rename = "1099-INT")]
    Form1099Int,
    #[serde(rename = "1099-DIV")]
    Form1099Div,
    #[serde(rename = "1099-MISC")]
    Form1099Misc,
    #[serde(rename = "1099-NEC")]
    Form1099Nec,
    #[serde(rename = "UK-PAYE-Payslip")]
    UkPayePayslip,
    #[serde(rename = "UK-P60")]
    UkP60,
    #[serde(rename = "UK-P45")]
    UkP45,
    /// Free-form document; the caller supplies every field.
    #[serde(rename = "Custom")]
    Custom,
}

impl DocumentType {
    /// All types, in selector order.
    pub const ALL: [DocumentType; 9] = [
        DocumentType::W2,
        DocumentType::Form1099Int,
        DocumentType::Form1099Div,
        DocumentType::Form1099Misc,
        DocumentType::Form1099Nec,
        DocumentType::UkPayePayslip,
        DocumentType::UkP60,
        DocumentType::UkP45,
        DocumentType::Custom,
    ];

    /// Label used in prompts, records and the CLI.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::W2 => "W-2",
            DocumentType::Form1099Int => "1099-INT",
            DocumentType::Form1099Div => "1099-DIV",
            DocumentType::Form1099Misc => "1099-MISC",
            DocumentType::Form1099Nec => "1099-NEC",
            DocumentType::UkPayePayslip => "UK-PAYE-Payslip",
            DocumentType::UkP60 => "UK-P60",
            DocumentType::UkP45 => "UK-P45",
            DocumentType::Custom => "Custom",
        }
    }

    /// Canonical fields extracted by default for this type.
    pub fn default_fields(&self) -> &'static [&'static str] {
        match self {
            DocumentType::W2 => &[
                "employer_name",
                "employer_ein",
                "employee_ssn",
                "employee_name",
                "wages_tips_other",
                "federal_income_tax_withheld",
                "social_security_wages",
                "social_security_tax_withheld",
                "medicare_wages",
                "medicare_tax_withheld",
                "state",
                "state_income",
            ],
            DocumentType::Form1099Int => &[
                "payer_name",
                "payer_tin",
                "recipient_name",
                "recipient_tin",
                "interest_income",
                "early_withdrawal_penalty",
                "interest_on_us_savings_bonds",
                "federal_income_tax_withheld",
                "investment_expenses",
            ],
            DocumentType::Form1099Div => &[
                "payer_name",
                "total_ordinary_dividends",
                "qualified_dividends",
                "capital_gain_distributions",
                "federal_income_tax_withheld",
                "section_199a_dividends",
                "nondividend_distributions",
            ],
            DocumentType::Form1099Misc => &[
                "payer_name",
                "recipient_name",
                "rents",
                "royalties",
                "other_income",
                "federal_income_tax_withheld",
                "nonemployee_compensation",
            ],
            DocumentType::Form1099Nec => &[
                "payer_name",
                "payer_tin",
                "recipient_name",
                "recipient_tin",
                "nonemployee_compensation",
                "federal_income_tax_withheld",
            ],
            DocumentType::UkPayePayslip => &[
                // Employee & employer
                "employer_name",
                "employer_paye_reference",
                "employee_name",
                "national_insurance_number",
                "tax_code",
                "ni_category",
                // Pay period
                "pay_date",
                "pay_period",
                "tax_year",
                // Earnings
                "gross_pay",
                "basic_pay",
                "overtime_pay",
                "bonus",
                "commission",
                "taxable_benefits",
                "benefits_in_kind",
                // Deductions
                "paye_tax_withheld",
                "national_insurance_employee",
                "national_insurance_employer",
                // Pension
                "pension_contribution_employee",
                "pension_contribution_employer",
                "pension_scheme_name",
                // Student loan
                "student_loan_deduction",
                "student_loan_plan_type",
                // Other deductions
                "other_deductions",
                "attachment_of_earnings",
                "net_pay",
                // Year to date
                "ytd_gross_pay",
                "ytd_paye_tax",
                "ytd_national_insurance",
                "ytd_pension_contributions",
            ],
            DocumentType::UkP60 => &[
                "employer_name",
                "employer_paye_reference",
                "employee_name",
                "national_insurance_number",
                "tax_code",
                "tax_year",
                "total_pay_in_year",
                "total_tax_in_year",
                "total_ni_contributions",
                "ni_category",
                "total_pension_contributions",
                "total_student_loan_deductions",
                "statutory_maternity_pay",
                "statutory_paternity_pay",
                "statutory_sick_pay",
            ],
            DocumentType::UkP45 => &[
                "employer_name",
                "employer_paye_reference",
                "employee_name",
                "national_insurance_number",
                "tax_code",
                "leaving_date",
                "total_pay_to_date",
                "total_tax_to_date",
                "student_loan_deduction_to_date",
            ],
            DocumentType::Custom => &[],
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    /// Parse a label, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        DocumentType::ALL
            .iter()
            .find(|t| t.label().eq_ignore_ascii_case(wanted))
            .copied()
            .ok_or_else(|| {
                let known: Vec<&str> = DocumentType::ALL.iter().map(|t| t.label()).collect();
                format!("unknown document type '{}' (expected one of: {})", wanted, known.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels() {
        assert_eq!("W-2".parse::<DocumentType>(), Ok(DocumentType::W2));
        assert_eq!("uk-p60".parse::<DocumentType>(), Ok(DocumentType::UkP60));
        assert_eq!(" 1099-NEC ".parse::<DocumentType>(), Ok(DocumentType::Form1099Nec));
        assert!("1040".parse::<DocumentType>().is_err());
    }

    #[test]
    fn test_label_round_trips_through_serde() {
        let json = serde_json::to_string(&DocumentType::UkPayePayslip).unwrap();
        assert_eq!(json, "\"UK-PAYE-Payslip\"");
    }

    #[test]
    fn test_custom_has_no_defaults() {
        assert!(DocumentType::Custom.default_fields().is_empty());
        for t in DocumentType::ALL.iter().filter(|t| **t != DocumentType::Custom) {
            assert!(!t.default_fields().is_empty(), "{} has no fields", t);
        }
    }

    #[test]
    fn test_default_fields_are_unique() {
        for t in DocumentType::ALL {
            let fields = t.default_fields();
            let mut seen = std::collections::HashSet::new();
            for f in fields {
                assert!(seen.insert(*f), "{} repeats {}", t, f);
            }
        }
    }
}
