//! Complexity, token and price estimation from a requirements document.
//!
//! Everything here is a pure function of the document text (and the pricing
//! table), so identical input always produces identical estimates.

use crate::config::PricingConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Tokens attributed to the requirements document in every generation call.
pub const PRD_TOKENS: u64 = 3000;

/// Fixed prompt overhead per generation call.
pub const BASE_PROMPT_TOKENS: u64 = 2000;

/// Output tokens per estimated line of code.
pub const TOKENS_PER_LOC: u64 = 4;

const MIN_PAGES: usize = 3;
const MAX_PAGES: usize = 15;
const COMPONENTS_PER_PAGE: usize = 4;
const SHARED_COMPONENTS: usize = 10;
const MAX_COUNTED_UNITS: usize = 10;

const WEIGHT_AUTH: usize = 800;
const WEIGHT_DATABASE: usize = 600;
const WEIGHT_PAYMENTS: usize = 500;
const WEIGHT_FILE_UPLOAD: usize = 400;
const WEIGHT_REALTIME: usize = 700;
const WEIGHT_API_INTEGRATION: usize = 300;
const WEIGHT_FORM: usize = 150;
const WEIGHT_PAGE: usize = 250;
const WEIGHT_COMPONENT: usize = 100;

fn word_pattern(words: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b({})\b", words)).expect("Invalid regex pattern")
}

static AUTH_RE: Lazy<Regex> =
    Lazy::new(|| word_pattern(r"auth|login|signup|sign.?up|sign.?in|password|oauth|jwt|session"));
static DATABASE_RE: Lazy<Regex> = Lazy::new(|| {
    word_pattern(r"database|db|storage|persist|crud|sql|postgres|mysql|mongo|supabase|firebase")
});
static PAYMENTS_RE: Lazy<Regex> = Lazy::new(|| {
    word_pattern(r"payment|stripe|checkout|subscription|billing|purchase|cart|e.?commerce")
});
static FILE_UPLOAD_RE: Lazy<Regex> =
    Lazy::new(|| word_pattern(r"upload|file|image|media|attachment|storage|s3|blob"));
static REALTIME_RE: Lazy<Regex> = Lazy::new(|| {
    word_pattern(r"realtime|real.?time|websocket|live|streaming|notification|chat")
});
static DASHBOARD_RE: Lazy<Regex> =
    Lazy::new(|| word_pattern(r"dashboard|analytics|chart|metrics|report"));
static API_RE: Lazy<Regex> =
    Lazy::new(|| word_pattern(r"api|integration|third.?party|external|webhook"));
static FORM_RE: Lazy<Regex> = Lazy::new(|| word_pattern(r"form|input|submit|validation"));
static PAGE_RE: Lazy<Regex> = Lazy::new(|| {
    word_pattern(r"page|screen|view|route|dashboard|home|landing|profile|settings")
});

/// Feature categories detected by keyword vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    Authentication,
    Database,
    Payments,
    FileUpload,
    Realtime,
    Dashboard,
}

impl Feature {
    fn pattern(self) -> &'static Regex {
        match self {
            Feature::Authentication => &AUTH_RE,
            Feature::Database => &DATABASE_RE,
            Feature::Payments => &PAYMENTS_RE,
            Feature::FileUpload => &FILE_UPLOAD_RE,
            Feature::Realtime => &REALTIME_RE,
            Feature::Dashboard => &DASHBOARD_RE,
        }
    }

    /// Case-insensitive whole-word match against this feature's vocabulary.
    pub fn detect(self, text: &str) -> bool {
        self.pattern().is_match(text)
    }
}

/// Ordered complexity buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    Simple,
    Medium,
    Complex,
    Enterprise,
}

impl ComplexityTier {
    /// Tier for an estimated line count (thresholds 2000 / 5000 / 10000).
    pub fn from_lines_of_code(loc: usize) -> Self {
        match loc {
            0..=1999 => ComplexityTier::Simple,
            2000..=4999 => ComplexityTier::Medium,
            5000..=9999 => ComplexityTier::Complex,
            _ => ComplexityTier::Enterprise,
        }
    }

    /// Iteration budget for the tier.
    pub fn iteration_count(self) -> u32 {
        match self {
            ComplexityTier::Simple => 2,
            ComplexityTier::Medium => 4,
            ComplexityTier::Complex => 6,
            ComplexityTier::Enterprise => 10,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ComplexityTier::Simple => "Simple App",
            ComplexityTier::Medium => "Medium Complexity",
            ComplexityTier::Complex => "Complex Application",
            ComplexityTier::Enterprise => "Enterprise Grade",
        }
    }
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComplexityTier::Simple => "simple",
            ComplexityTier::Medium => "medium",
            ComplexityTier::Complex => "complex",
            ComplexityTier::Enterprise => "enterprise",
        };
        f.write_str(name)
    }
}

/// Features detected in a requirements document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetectedFeatures {
    pub authentication: bool,
    pub database: bool,
    pub payments: bool,
    pub file_upload: bool,
    pub realtime: bool,
    /// Raw mention count of integration vocabulary.
    pub api_integrations: usize,
    /// Raw mention count of form vocabulary.
    pub forms: usize,
}

/// Result of [`analyze_complexity`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComplexityAnalysis {
    pub page_count: usize,
    pub component_count: usize,
    pub features: DetectedFeatures,
    pub estimated_lines_of_code: usize,
    pub tier: ComplexityTier,
}

/// How the token estimate was assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBreakdown {
    pub prd_tokens: u64,
    pub code_generation_tokens: u64,
    pub iteration_tokens: u64,
}

/// Projected token usage for a whole build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEstimate {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    /// Authoritative loop bound for the build.
    pub iteration_count: u32,
    pub breakdown: TokenBreakdown,
}

/// Projected price in USD, each field rounded to cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingEstimate {
    pub input_cost: f64,
    pub output_cost: f64,
    pub base_cost: f64,
    pub margin: f64,
    pub total_cost: f64,
}

/// All three estimates for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub analysis: ComplexityAnalysis,
    pub tokens: TokenEstimate,
    pub pricing: PricingEstimate,
}

/// Derives a complexity analysis from requirements text.
///
/// # Examples
///
/// ```
/// use forge_core::{analyze_complexity, ComplexityTier};
///
/// let analysis = analyze_complexity("A landing page with a login form.");
/// assert!(analysis.features.authentication);
/// assert_eq!(analysis.page_count, 3);
/// assert_eq!(analysis.tier, ComplexityTier::Medium);
/// ```
pub fn analyze_complexity(doc: &str) -> ComplexityAnalysis {
    let features = DetectedFeatures {
        authentication: Feature::Authentication.detect(doc),
        database: Feature::Database.detect(doc),
        payments: Feature::Payments.detect(doc),
        file_upload: Feature::FileUpload.detect(doc),
        realtime: Feature::Realtime.detect(doc),
        api_integrations: API_RE.find_iter(doc).count(),
        forms: FORM_RE.find_iter(doc).count(),
    };

    let distinct_pages: BTreeSet<String> = PAGE_RE
        .find_iter(doc)
        .map(|m| m.as_str().to_lowercase())
        .collect();
    let page_count = distinct_pages.len().clamp(MIN_PAGES, MAX_PAGES);
    let component_count = page_count * COMPONENTS_PER_PAGE + SHARED_COMPONENTS;

    let mut loc = page_count * WEIGHT_PAGE + component_count * WEIGHT_COMPONENT;
    for (present, weight) in [
        (features.authentication, WEIGHT_AUTH),
        (features.database, WEIGHT_DATABASE),
        (features.payments, WEIGHT_PAYMENTS),
        (features.file_upload, WEIGHT_FILE_UPLOAD),
        (features.realtime, WEIGHT_REALTIME),
    ] {
        if present {
            loc += weight;
        }
    }
    loc += features.api_integrations.min(MAX_COUNTED_UNITS) * WEIGHT_API_INTEGRATION;
    loc += features.forms.min(MAX_COUNTED_UNITS) * WEIGHT_FORM;

    ComplexityAnalysis {
        page_count,
        component_count,
        features,
        estimated_lines_of_code: loc,
        tier: ComplexityTier::from_lines_of_code(loc),
    }
}

/// Projects token usage; the iteration count depends only on the tier.
pub fn estimate_tokens(analysis: &ComplexityAnalysis) -> TokenEstimate {
    let iterations = analysis.tier.iteration_count();
    let code_generation_tokens = analysis.estimated_lines_of_code as u64 * TOKENS_PER_LOC;
    let input_tokens = (BASE_PROMPT_TOKENS + PRD_TOKENS) * u64::from(iterations);
    let output_tokens = code_generation_tokens;

    TokenEstimate {
        input_tokens,
        output_tokens,
        total_tokens: input_tokens + output_tokens,
        iteration_count: iterations,
        breakdown: TokenBreakdown {
            prd_tokens: PRD_TOKENS,
            code_generation_tokens,
            iteration_tokens: code_generation_tokens / u64::from(iterations.max(1)),
        },
    }
}

/// Rounds to the nearest cent.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Prices a token estimate. The total never drops below `minimum_charge`.
pub fn calculate_pricing(estimate: &TokenEstimate, pricing: &PricingConfig) -> PricingEstimate {
    let input_cost = estimate.input_tokens as f64 / 1_000_000.0 * pricing.input_per_million;
    let output_cost = estimate.output_tokens as f64 / 1_000_000.0 * pricing.output_per_million;
    let base_cost = input_cost + output_cost;
    let margin = base_cost * (pricing.margin_multiplier - 1.0);
    let total = base_cost * pricing.margin_multiplier;

    PricingEstimate {
        input_cost: round_cents(input_cost),
        output_cost: round_cents(output_cost),
        base_cost: round_cents(base_cost),
        margin: round_cents(margin),
        total_cost: round_cents(total).max(pricing.minimum_charge),
    }
}

/// Runs all three estimation stages.
pub fn estimate(doc: &str, pricing: &PricingConfig) -> Estimate {
    let analysis = analyze_complexity(doc);
    let tokens = estimate_tokens(&analysis);
    let pricing = calculate_pricing(&tokens, pricing);
    Estimate {
        analysis,
        tokens,
        pricing,
    }
}
