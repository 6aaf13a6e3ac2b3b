//! Normalises a finished job's output into [`ParsedCostAnalysis`].
//!
//! Structured (V3) output is preferred. When it has no `summary`, the free
//! text response is parsed on a best-effort basis; that path never fails and
//! does not report how much it understood.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Serialize;

use crate::job::CompletionPayload;
use crate::structured::StructuredData;

pub const DEFAULT_VAT_RATE: f64 = 20.0;
const TOTALS_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    Structured,
    TextFallback,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MaterialLine {
    pub description: String,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LabourSummary {
    pub description: String,
    pub hours: f64,
    pub rate: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedCostAnalysis {
    pub source: AnalysisSource,
    pub materials: Vec<MaterialLine>,
    pub materials_total: f64,
    pub labour: LabourSummary,
    pub vat_rate: f64,
    pub vat_amount: f64,
    pub subtotal: f64,
    pub total_cost: f64,
    pub raw_text: String,
}

impl ParsedCostAnalysis {
    pub fn from_payload(payload: &CompletionPayload) -> Self {
        payload
            .structured_data
            .as_ref()
            .and_then(|data| Self::from_structured(data, &payload.response))
            .unwrap_or_else(|| parse_cost_text(&payload.response))
    }

    /// `None` when the structured output has no summary to anchor the totals.
    pub fn from_structured(data: &StructuredData, raw_text: &str) -> Option<Self> {
        let summary = data.summary.as_ref()?;

        let materials: Vec<MaterialLine> = data
            .materials
            .as_ref()
            .map(|section| {
                section
                    .items
                    .iter()
                    .map(|item| MaterialLine {
                        description: item.description.clone(),
                        quantity: Some(item.quantity),
                        unit_price: Some(item.unit_price),
                        total: item.total,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let labour = match &data.labour {
            Some(section) => LabourSummary {
                description: section
                    .tasks
                    .iter()
                    .map(|t| t.description.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
                hours: section.total_hours,
                rate: section.hourly_rate,
                total: section.total,
            },
            None => LabourSummary {
                total: summary.labour_total,
                ..Default::default()
            },
        };

        Some(Self {
            source: AnalysisSource::Structured,
            materials,
            materials_total: summary.materials_total,
            labour,
            vat_rate: summary.vat_rate,
            vat_amount: summary.vat_amount,
            subtotal: summary.subtotal,
            total_cost: summary.grand_total,
            raw_text: raw_text.to_string(),
        })
    }

    /// Display check only; inconsistent totals are shown with a warning.
    pub fn totals_consistent(&self) -> bool {
        (self.total_cost - (self.subtotal + self.vat_amount)).abs() <= TOTALS_TOLERANCE
    }
}

static MONEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"£\s*([0-9][0-9,]*(?:\.[0-9]+)?)").expect("money pattern"));
static BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+").expect("bullet pattern"));
static QUANTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\d+(?:\.\d+)?)\s*(?:x|×|m|no\.?|pcs|lengths?)?\s+").expect("quantity pattern")
});
static UNIT_PRICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@\s*£\s*([0-9][0-9,]*(?:\.[0-9]+)?)").expect("unit price pattern"));
static HOURS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:hours|hour|hrs|hr|h)\b").expect("hours pattern")
});
static HOURLY_RATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)£\s*([0-9][0-9,]*(?:\.[0-9]+)?)\s*(?:/|per)\s*(?:hour|hr|h)\b")
        .expect("rate pattern")
});
static PERCENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("percent pattern"));
static LABOUR_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\W*labou?r").expect("labour pattern"));
static VAT_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bvat\b").expect("vat pattern"));
static SUBTOTAL_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bsub[\s-]?total\b").expect("subtotal pattern"));
static TOTAL_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\W*(?:grand\s+|estimated\s+)?total\b").expect("total pattern"));

fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

fn last_money(line: &str) -> Option<f64> {
    MONEY
        .captures_iter(line)
        .last()
        .and_then(|caps| parse_amount(&caps[1]))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Best-effort extraction of costs from a free text response.
pub fn parse_cost_text(text: &str) -> ParsedCostAnalysis {
    let mut materials = Vec::new();
    let mut labour = LabourSummary::default();
    let mut vat_rate = None;
    let mut vat_amount = None;
    let mut subtotal = None;
    let mut total = None;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let body = BULLET.replace(trimmed, "");

        if SUBTOTAL_LINE.is_match(trimmed) {
            subtotal = last_money(trimmed).or(subtotal);
        } else if TOTAL_LINE.is_match(trimmed) {
            total = last_money(trimmed).or(total);
        } else if VAT_LINE.is_match(trimmed) {
            if let Some(caps) = PERCENT.captures(trimmed) {
                vat_rate = parse_amount(&caps[1]);
            }
            vat_amount = last_money(trimmed).or(vat_amount);
        } else if LABOUR_LINE.is_match(&body) {
            if let Some(caps) = HOURS.captures(trimmed) {
                labour.hours += parse_amount(&caps[1]).unwrap_or_default();
            }
            let rate_at = HOURLY_RATE.captures(trimmed).and_then(|caps| {
                labour.rate = parse_amount(&caps[1]).unwrap_or(labour.rate);
                caps.get(0).map(|m| m.start())
            });
            // A lone hourly rate is not a labour total.
            if let Some(last) = MONEY.captures_iter(trimmed).last() {
                let last_at = last.get(0).map(|m| m.start());
                if rate_at.is_none() || rate_at != last_at {
                    labour.total += parse_amount(&last[1]).unwrap_or_default();
                }
            }
            if labour.description.is_empty() {
                labour.description = trimmed.to_string();
            }
        } else if BULLET.is_match(trimmed) {
            let Some(amount) = last_money(trimmed) else {
                continue;
            };
            let quantity = QUANTITY
                .captures(&body)
                .and_then(|caps| parse_amount(&caps[1]));
            let unit_price = UNIT_PRICE
                .captures(&body)
                .and_then(|caps| parse_amount(&caps[1]));
            let cut = body
                .find(|c: char| c == '£' || c == '@' || c == ':' || c == '=')
                .unwrap_or(body.len());
            let description = body[..cut]
                .trim()
                .trim_end_matches(|c: char| c == '-' || c == '–' || c.is_whitespace())
                .to_string();
            materials.push(MaterialLine {
                description,
                quantity,
                unit_price,
                total: amount,
            });
        }
    }

    if labour.total == 0.0 && labour.hours > 0.0 && labour.rate > 0.0 {
        labour.total = round2(labour.hours * labour.rate);
    }

    let materials_total = round2(materials.iter().map(|m| m.total).sum());
    let subtotal = subtotal.unwrap_or_else(|| round2(materials_total + labour.total));
    let vat_rate = vat_rate.unwrap_or(DEFAULT_VAT_RATE);
    let vat_amount = vat_amount.unwrap_or_else(|| round2(subtotal * vat_rate / 100.0));
    let total_cost = total.unwrap_or_else(|| round2(subtotal + vat_amount));

    ParsedCostAnalysis {
        source: AnalysisSource::TextFallback,
        materials,
        materials_total,
        labour,
        vat_rate,
        vat_amount,
        subtotal,
        total_cost,
        raw_text: text.to_string(),
    }
}
