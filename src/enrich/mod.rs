//! Answer enrichment: ASN annotation and CDN classification.

pub mod asn;
pub mod cdn;

pub use asn::{AsnClient, AsnRecord};
