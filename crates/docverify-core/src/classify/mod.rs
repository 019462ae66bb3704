//! Feature extraction and keyword-weighted document classification.

pub mod structure;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::fields::patterns::{
    any_match, LINE_ITEM_PATTERNS, PAYMENT_TERMS_PATTERNS, TABLE_PATTERNS, TAX_ID_PATTERNS,
};
use crate::models::Metadata;

pub use structure::{analyze_structure, DocumentStructure, TableSpan};

const INVOICE_KEYWORDS: &[&str] = &[
    "invoice", "faktura", "rechnung", "facture", "factura",
    "bill to", "payment terms", "due date", "invoice date",
    "invoice number", "customer number", "account number",
];

const RECEIPT_KEYWORDS: &[&str] = &[
    "receipt", "paragon", "quittung", "reçu", "recibo",
    "cash register", "store", "retail", "cashier", "terminal",
    "thank you for your purchase", "return policy",
];

const ORDER_KEYWORDS: &[&str] = &[
    "order", "purchase order", "zamówienie", "bestellung", "commande", "pedido",
    "order number", "order date", "shipping method", "delivery date",
];

const VAT_TERMS: &[&str] = &["vat", "tax", "mwst", "ust", "iva", "tva", "podatek"];

const DELIVERY_TERMS: &[&str] = &[
    "delivery", "ship to", "shipping address", "dostawa", "lieferung", "livraison", "envío",
];

/// Per-language indicator words, in tie-break order.
const LANGUAGE_INDICATORS: &[(&str, &[&str])] = &[
    ("en", &["invoice", "receipt", "total", "payment", "date", "amount", "tax"]),
    ("pl", &["faktura", "paragon", "suma", "płatność", "data", "kwota", "podatek", "razem"]),
    ("de", &["rechnung", "quittung", "gesamt", "zahlung", "datum", "betrag", "steuer"]),
    ("fr", &["facture", "reçu", "total", "paiement", "date", "montant", "taxe"]),
    ("es", &["factura", "recibo", "total", "pago", "fecha", "importe", "impuesto"]),
];

/// Language reported when no indicator is present.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Type reported when no candidate type wins outright.
pub const FALLBACK_TYPE: &str = "invoice";

const FALLBACK_CONFIDENCE: f64 = 0.5;
const MAX_CONFIDENCE: f64 = 0.95;

/// Boolean document features the classifier and decision tree branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureFlag {
    HasInvoiceKeywords,
    HasReceiptKeywords,
    #[serde(alias = "has_tables")]
    HasTableStructure,
    HasVatReferences,
    HasTaxId,
    HasPaymentTerms,
    HasLineItems,
    HasDeliveryInfo,
    HasPurchaseOrder,
}

impl FeatureFlag {
    pub const ALL: [FeatureFlag; 9] = [
        FeatureFlag::HasInvoiceKeywords,
        FeatureFlag::HasReceiptKeywords,
        FeatureFlag::HasTableStructure,
        FeatureFlag::HasVatReferences,
        FeatureFlag::HasTaxId,
        FeatureFlag::HasPaymentTerms,
        FeatureFlag::HasLineItems,
        FeatureFlag::HasDeliveryInfo,
        FeatureFlag::HasPurchaseOrder,
    ];

    /// Snake-case name used in configuration and reports.
    pub fn name(&self) -> &'static str {
        match self {
            FeatureFlag::HasInvoiceKeywords => "has_invoice_keywords",
            FeatureFlag::HasReceiptKeywords => "has_receipt_keywords",
            FeatureFlag::HasTableStructure => "has_table_structure",
            FeatureFlag::HasVatReferences => "has_vat_references",
            FeatureFlag::HasTaxId => "has_tax_id",
            FeatureFlag::HasPaymentTerms => "has_payment_terms",
            FeatureFlag::HasLineItems => "has_line_items",
            FeatureFlag::HasDeliveryInfo => "has_delivery_info",
            FeatureFlag::HasPurchaseOrder => "has_purchase_order",
        }
    }

    /// Parse a flag name. `has_tables` is accepted for the table flag.
    pub fn from_name(name: &str) -> Option<Self> {
        if name == "has_tables" {
            return Some(FeatureFlag::HasTableStructure);
        }
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// Signals derived from a document's text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub has_invoice_keywords: bool,
    pub has_receipt_keywords: bool,
    pub has_table_structure: bool,
    pub has_vat_references: bool,
    pub has_tax_id: bool,
    pub has_payment_terms: bool,
    pub has_line_items: bool,
    pub has_delivery_info: bool,
    pub has_purchase_order: bool,
    /// Indicator-word hits per language.
    pub language_scores: IndexMap<String, u32>,
}

impl Features {
    /// Value of a boolean feature.
    pub fn flag(&self, flag: FeatureFlag) -> bool {
        match flag {
            FeatureFlag::HasInvoiceKeywords => self.has_invoice_keywords,
            FeatureFlag::HasReceiptKeywords => self.has_receipt_keywords,
            FeatureFlag::HasTableStructure => self.has_table_structure,
            FeatureFlag::HasVatReferences => self.has_vat_references,
            FeatureFlag::HasTaxId => self.has_tax_id,
            FeatureFlag::HasPaymentTerms => self.has_payment_terms,
            FeatureFlag::HasLineItems => self.has_line_items,
            FeatureFlag::HasDeliveryInfo => self.has_delivery_info,
            FeatureFlag::HasPurchaseOrder => self.has_purchase_order,
        }
    }

    /// Language with the most indicator hits; the earliest language wins ties.
    pub fn primary_language(&self) -> &str {
        let mut best: Option<(&str, u32)> = None;
        for (lang, &score) in &self.language_scores {
            if best.is_none_or(|(_, b)| score > b) {
                best = Some((lang, score));
            }
        }
        best.map(|(lang, _)| lang).unwrap_or(DEFAULT_LANGUAGE)
    }
}

/// A feature condition contributing to a type's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Present(FeatureFlag),
    Absent(FeatureFlag),
}

/// One row of the scoring table.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeight {
    pub document_type: &'static str,
    pub signal: Signal,
    pub weight: u32,
}

const fn weight(document_type: &'static str, signal: Signal, weight: u32) -> ScoreWeight {
    ScoreWeight {
        document_type,
        signal,
        weight,
    }
}

/// Feature weights per candidate type.
pub const SCORE_WEIGHTS: &[ScoreWeight] = &[
    weight("invoice", Signal::Present(FeatureFlag::HasInvoiceKeywords), 2),
    weight("invoice", Signal::Present(FeatureFlag::HasVatReferences), 1),
    weight("invoice", Signal::Present(FeatureFlag::HasTaxId), 1),
    weight("invoice", Signal::Present(FeatureFlag::HasPaymentTerms), 2),
    weight("invoice", Signal::Present(FeatureFlag::HasLineItems), 1),
    weight("invoice", Signal::Present(FeatureFlag::HasTableStructure), 1),
    weight("receipt", Signal::Present(FeatureFlag::HasReceiptKeywords), 2),
    weight("receipt", Signal::Absent(FeatureFlag::HasPaymentTerms), 1),
    weight("receipt", Signal::Absent(FeatureFlag::HasTaxId), 1),
    weight("receipt", Signal::Present(FeatureFlag::HasTableStructure), 1),
    weight("order", Signal::Present(FeatureFlag::HasPurchaseOrder), 2),
    weight("order", Signal::Present(FeatureFlag::HasLineItems), 1),
    weight("order", Signal::Present(FeatureFlag::HasTableStructure), 1),
    weight("order", Signal::Present(FeatureFlag::HasDeliveryInfo), 1),
];

/// Candidate types and the divisor mapping their score to a confidence.
pub const CANDIDATE_TYPES: &[(&str, f64)] = &[("invoice", 10.0), ("receipt", 8.0), ("order", 8.0)];

/// A metadata signature that identifies a vendor-specific format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorFormat {
    /// Type reported for matching documents.
    pub document_type: String,
    /// Exact value of the `source` metadata key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Prefix of the `filename` metadata key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename_prefix: Option<String>,
    #[serde(default = "default_vendor_confidence")]
    pub confidence: f64,
}

fn default_vendor_confidence() -> f64 {
    MAX_CONFIDENCE
}

impl VendorFormat {
    /// The Adobe transaction export.
    pub fn adobe() -> Self {
        Self {
            document_type: "adobe_json".to_string(),
            source: Some("adobe".to_string()),
            filename_prefix: Some("Adobe_Transaction".to_string()),
            confidence: MAX_CONFIDENCE,
        }
    }

    fn matches(&self, metadata: &Metadata) -> bool {
        let source_hit = self
            .source
            .as_ref()
            .is_some_and(|s| metadata.get("source") == Some(s));
        let filename_hit = self.filename_prefix.as_ref().is_some_and(|prefix| {
            metadata
                .get("filename")
                .is_some_and(|f| f.starts_with(prefix.as_str()))
        });
        source_hit || filename_hit
    }
}

/// Outcome of [`DocumentClassifier::classify_document`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationAttributes {
    pub confidence: f64,
    pub language: String,
    pub features: Features,
    pub has_tables: bool,
    pub has_line_items: bool,
    /// Raw score per candidate type; empty for vendor formats.
    pub scores: IndexMap<String, u32>,
}

/// Keyword-driven classifier.
#[derive(Debug, Clone)]
pub struct DocumentClassifier {
    vendor_formats: Vec<VendorFormat>,
}

impl DocumentClassifier {
    /// Create a classifier that recognises the Adobe export format.
    pub fn new() -> Self {
        Self {
            vendor_formats: vec![VendorFormat::adobe()],
        }
    }

    /// Create a classifier with an explicit vendor format list.
    pub fn with_vendor_formats(vendor_formats: Vec<VendorFormat>) -> Self {
        Self { vendor_formats }
    }

    /// Derive features from text. Metadata is accepted for interface
    /// symmetry with detection but does not influence any feature.
    pub fn extract_features(&self, text: &str, _metadata: Option<&Metadata>) -> Features {
        let lower = text.to_lowercase();
        let contains_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

        let language_scores = LANGUAGE_INDICATORS
            .iter()
            .map(|(lang, words)| {
                let hits = words.iter().filter(|w| lower.contains(*w)).count() as u32;
                (lang.to_string(), hits)
            })
            .collect();

        Features {
            has_invoice_keywords: contains_any(INVOICE_KEYWORDS),
            has_receipt_keywords: contains_any(RECEIPT_KEYWORDS),
            has_table_structure: detect_table_structure(text),
            has_vat_references: contains_any(VAT_TERMS),
            has_tax_id: any_match(&TAX_ID_PATTERNS, text),
            has_payment_terms: any_match(&PAYMENT_TERMS_PATTERNS, text),
            has_line_items: any_match(&LINE_ITEM_PATTERNS, text),
            has_delivery_info: contains_any(DELIVERY_TERMS),
            has_purchase_order: contains_any(ORDER_KEYWORDS),
            language_scores,
        }
    }

    /// Classify a document, returning its type and supporting attributes.
    pub fn classify_document(
        &self,
        text: &str,
        metadata: Option<&Metadata>,
    ) -> (String, ClassificationAttributes) {
        let features = self.extract_features(text, metadata);
        let language = features.primary_language().to_string();

        let vendor = metadata.and_then(|m| self.vendor_formats.iter().find(|v| v.matches(m)));
        if let Some(vendor) = vendor {
            info!("Classified document as vendor format {}", vendor.document_type);
            return (
                vendor.document_type.clone(),
                ClassificationAttributes {
                    confidence: vendor.confidence,
                    language,
                    has_tables: features.has_table_structure,
                    has_line_items: features.has_line_items,
                    features,
                    scores: IndexMap::new(),
                },
            );
        }

        let scores = score_features(&features);
        debug!("Classification scores: {:?}", scores);

        let (doc_type, confidence) = pick_type(&scores);
        info!("Classified document as {} ({:.2} confidence)", doc_type, confidence);

        (
            doc_type,
            ClassificationAttributes {
                confidence,
                language,
                has_tables: features.has_table_structure,
                has_line_items: features.has_line_items,
                features,
                scores,
            },
        )
    }
}

impl Default for DocumentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply [`SCORE_WEIGHTS`] to a feature set.
pub fn score_features(features: &Features) -> IndexMap<String, u32> {
    let mut scores: IndexMap<String, u32> = CANDIDATE_TYPES
        .iter()
        .map(|(name, _)| (name.to_string(), 0))
        .collect();

    for row in SCORE_WEIGHTS {
        let hit = match row.signal {
            Signal::Present(flag) => features.flag(flag),
            Signal::Absent(flag) => !features.flag(flag),
        };
        if hit {
            *scores.entry(row.document_type.to_string()).or_insert(0) += row.weight;
        }
    }

    scores
}

/// The candidate whose score beats every other one, or the fallback type.
pub fn pick_type(scores: &IndexMap<String, u32>) -> (String, f64) {
    for (candidate, divisor) in CANDIDATE_TYPES {
        let Some(&score) = scores.get(*candidate) else {
            continue;
        };
        let beats_all = scores
            .iter()
            .filter(|(other, _)| other.as_str() != *candidate)
            .all(|(_, &other)| score > other);
        if beats_all {
            let confidence = (FALLBACK_CONFIDENCE + f64::from(score) / divisor).min(MAX_CONFIDENCE);
            return (candidate.to_string(), confidence);
        }
    }
    (FALLBACK_TYPE.to_string(), FALLBACK_CONFIDENCE)
}

fn detect_table_structure(text: &str) -> bool {
    any_match(&TABLE_PATTERNS, text) || analyze_structure(text).has_tables()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const INVOICE_TEXT: &str = "INVOICE\nInvoice Number: INV-001\nBill To: ACME\n\
        Payment Terms: Net 30\nVAT ID: DE123456789\nSubtotal 100.00\nTax 23.00";

    const RECEIPT_TEXT: &str = "CORNER STORE\nReceipt #0042\nMilk 2.50\nTotal 2.50\n\
        Thank you for your purchase";

    #[test]
    fn test_extract_invoice_features() {
        let classifier = DocumentClassifier::new();
        let features = classifier.extract_features(INVOICE_TEXT, None);

        assert!(features.has_invoice_keywords);
        assert!(features.has_payment_terms);
        assert!(features.has_tax_id);
        assert!(features.has_vat_references);
        assert!(!features.has_receipt_keywords);
        assert_eq!(features.primary_language(), "en");
    }

    #[test]
    fn test_language_scores() {
        let classifier = DocumentClassifier::new();
        let features = classifier
            .extract_features("Faktura VAT\nData: 2024-01-15\nRazem: 100 zł\nKwota", None);

        assert_eq!(features.language_scores["pl"], 4);
        assert_eq!(features.primary_language(), "pl");
    }

    #[test]
    fn test_primary_language_tie_prefers_first() {
        let features = Features {
            language_scores: [("en".to_string(), 1), ("de".to_string(), 1)].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(features.primary_language(), "en");
        assert_eq!(Features::default().primary_language(), "en");
    }

    #[test]
    fn test_classify_invoice() {
        let classifier = DocumentClassifier::new();
        let (doc_type, attrs) = classifier.classify_document(INVOICE_TEXT, None);

        assert_eq!(doc_type, "invoice");
        // keywords 2 + vat 1 + tax id 1 + terms 2
        assert_eq!(attrs.scores["invoice"], 6);
        assert_eq!(attrs.confidence, 0.95);
        assert_eq!(attrs.language, "en");
    }

    #[test]
    fn test_classify_receipt() {
        let classifier = DocumentClassifier::new();
        let (doc_type, attrs) = classifier.classify_document(RECEIPT_TEXT, None);

        assert_eq!(doc_type, "receipt");
        // keywords 2 + no terms 1 + no tax id 1
        assert_eq!(attrs.scores["receipt"], 4);
        assert_eq!(attrs.confidence, 0.95);
    }

    #[test]
    fn test_plain_text_leans_receipt() {
        let classifier = DocumentClassifier::new();
        // Only the two absence signals fire.
        let (doc_type, attrs) = classifier.classify_document("hello world", None);
        assert_eq!(doc_type, "receipt");
        assert_eq!(attrs.confidence, 0.75);
    }

    #[test]
    fn test_score_features() {
        let features = Features {
            has_payment_terms: true,
            has_tax_id: true,
            ..Default::default()
        };
        let scores = score_features(&features);
        assert_eq!(scores["invoice"], 3);
        assert_eq!(scores["receipt"], 0);
        assert_eq!(scores["order"], 0);
    }

    #[test]
    fn test_pick_type_tie_falls_back() {
        let scores: IndexMap<String, u32> = [("invoice", 2), ("receipt", 2), ("order", 0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(pick_type(&scores), ("invoice".to_string(), 0.5));

        let zeros: IndexMap<String, u32> = CANDIDATE_TYPES
            .iter()
            .map(|(k, _)| (k.to_string(), 0))
            .collect();
        assert_eq!(pick_type(&zeros), ("invoice".to_string(), 0.5));

        let order_wins: IndexMap<String, u32> = [("invoice", 1), ("receipt", 0), ("order", 4)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(pick_type(&order_wins), ("order".to_string(), 0.95));
    }

    #[test]
    fn test_vendor_short_circuit() {
        let classifier = DocumentClassifier::new();
        let mut metadata = Metadata::new();
        metadata.insert("filename".into(), "Adobe_Transaction_No_123.pdf".into());

        let (doc_type, attrs) = classifier.classify_document("anything", Some(&metadata));
        assert_eq!(doc_type, "adobe_json");
        assert_eq!(attrs.confidence, 0.95);
        assert!(attrs.scores.is_empty());
    }

    #[test]
    fn test_feature_flag_names() {
        for flag in FeatureFlag::ALL {
            assert_eq!(FeatureFlag::from_name(flag.name()), Some(flag));
        }
        assert_eq!(
            FeatureFlag::from_name("has_tables"),
            Some(FeatureFlag::HasTableStructure)
        );
        assert_eq!(FeatureFlag::from_name("colour"), None);
    }
}
