use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::parse_amount;

#[derive(Deserialize, Serialize, Debug, Clone, FromRow)]
pub struct Account {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub attempts: i64,
    pub lock_time: Option<String>,
}

/// Raw `expenses` row. Amount comes back as text so legacy non-numeric
/// values can be coerced instead of failing to decode.
#[derive(Debug, Clone, FromRow)]
pub struct ExpenseRow {
    pub id: i64,
    pub user: String,
    pub amount: String,
    pub category: String,
    pub date: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Expense {
    pub id: i64,
    pub user: String,
    pub amount: f64,
    pub category: String,
    pub date: String,
}

impl From<ExpenseRow> for Expense {
    fn from(row: ExpenseRow) -> Self {
        Expense {
            id: row.id,
            user: row.user,
            amount: parse_amount(&row.amount),
            category: row.category,
            date: row.date,
        }
    }
}

impl Expense {
    /// `YYYY-MM` bucket of the record, i.e. the first seven characters of the date.
    pub fn month(&self) -> &str {
        month_prefix(&self.date)
    }
}

pub fn month_prefix(date: &str) -> &str {
    match date.char_indices().nth(7) {
        Some((idx, _)) => &date[..idx],
        None => date,
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ExpenseForm {
    pub amount: String,
    pub category: String,
    #[serde(default)]
    pub custom_category: Option<String>,
    pub date: String,
}

impl ExpenseForm {
    /// A non-empty custom category overrides the selected one.
    pub fn effective_category(&self) -> &str {
        match self.custom_category.as_deref().map(str::trim) {
            Some(custom) if !custom.is_empty() => custom,
            _ => &self.category,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct MonthQuery {
    #[serde(default)]
    pub month: Option<String>,
}

impl MonthQuery {
    /// The month filter, if present and shaped `YYYY-MM`. Anything else
    /// means no filter.
    pub fn selected(&self) -> Option<&str> {
        self.month.as_deref().filter(|m| is_month_key(m))
    }
}

/// `YYYY-MM` with a month between 01 and 12.
pub fn is_month_key(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return false;
    }
    if !bytes[..4].iter().chain(&bytes[5..]).all(u8::is_ascii_digit) {
        return false;
    }
    matches!(value[5..].parse::<u8>(), Ok(1..=12))
}

/// Budget amounts arrive as JSON numbers from the dashboard script but
/// older clients post them as strings.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum LenientAmount {
    Number(f64),
    Text(String),
}

impl LenientAmount {
    pub fn value(&self) -> f64 {
        match self {
            LenientAmount::Number(n) if n.is_finite() => *n,
            LenientAmount::Number(_) => 0.0,
            LenientAmount::Text(s) => parse_amount(s),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SetBudget {
    pub month: String,
    pub amount: LenientAmount,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ClearMonth {
    pub month: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_prefix_takes_first_seven_chars() {
        assert_eq!(month_prefix("2024-01-05"), "2024-01");
        assert_eq!(month_prefix("2024-1"), "2024-1");
        assert_eq!(month_prefix(""), "");
    }

    #[test]
    fn custom_category_overrides_selection() {
        let mut form = ExpenseForm {
            amount: "10".into(),
            category: "food".into(),
            custom_category: Some("  ".into()),
            date: "2024-01-01".into(),
        };
        assert_eq!(form.effective_category(), "food");
        form.custom_category = Some("gifts".into());
        assert_eq!(form.effective_category(), "gifts");
    }

    #[test]
    fn budget_amount_accepts_number_or_text() {
        let body: SetBudget = serde_json::from_str(r#"{"month":"2024-01","amount":"250.5"}"#).unwrap();
        assert_eq!(body.amount.value(), 250.5);
        let body: SetBudget = serde_json::from_str(r#"{"month":"2024-01","amount":100}"#).unwrap();
        assert_eq!(body.amount.value(), 100.0);
        let body: SetBudget = serde_json::from_str(r#"{"month":"2024-01","amount":"lots"}"#).unwrap();
        assert_eq!(body.amount.value(), 0.0);
    }

    #[test]
    fn empty_month_query_is_no_filter() {
        let q = MonthQuery { month: Some(String::new()) };
        assert_eq!(q.selected(), None);
    }

    #[test]
    fn malformed_month_query_is_no_filter() {
        for raw in ["x');alert(1);('", "2024-1", "2024-13", "2024/01", "24-01-01", "２０２４-01"] {
            let q = MonthQuery { month: Some(raw.into()) };
            assert_eq!(q.selected(), None, "{raw:?}");
        }
        let q = MonthQuery { month: Some("2024-01".into()) };
        assert_eq!(q.selected(), Some("2024-01"));
    }
}
