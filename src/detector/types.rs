use serde::Serialize;
use std::collections::BTreeSet;

/// What kind of relayed interaction an alert describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertCategory {
    Generic,
    Swap,
}

impl AlertCategory {
    pub fn alert_id(&self) -> &'static str {
        match self {
            Self::Generic => "FLASHBOTS-TRANSACTIONS",
            Self::Swap => "FLASHBOTS-SWAP-TRANSACTIONS",
        }
    }
}

/// A relayed transaction that touched a contract. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRecord {
    pub category: AlertCategory,
    pub from_address: String,
    pub to_address: String,
    pub transaction_hash: String,
    pub block_number: u64,
    /// Log emitter addresses, lowercase `0x` hex.
    pub involved_addresses: BTreeSet<String>,
    pub anomaly_score: String,
}

impl AlertRecord {
    /// Render the record in the shape downstream alert consumers expect.
    pub fn to_finding(&self) -> Finding {
        Finding {
            name: "Flashbots transactions",
            description: format!(
                "{} interacted with {} in a flashbots transaction",
                self.from_address, self.to_address
            ),
            alert_id: self.category.alert_id(),
            severity: "low",
            finding_type: "info",
            addresses: self.involved_addresses.iter().cloned().collect(),
            metadata: FindingMetadata {
                from: self.from_address.clone(),
                to: self.to_address.clone(),
                hash: self.transaction_hash.clone(),
                block_number: self.block_number,
                anomaly_score: self.anomaly_score.clone(),
            },
            labels: vec![
                Label {
                    entity: self.from_address.clone(),
                    entity_type: "address",
                    label: "Attacker",
                    confidence: 0.6,
                },
                Label {
                    entity: self.transaction_hash.clone(),
                    entity_type: "transaction",
                    label: "Suspicious",
                    confidence: 0.7,
                },
            ],
        }
    }
}

// ============================================================
// Wire shape
// ============================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub name: &'static str,
    pub description: String,
    pub alert_id: &'static str,
    pub severity: &'static str,
    #[serde(rename = "type")]
    pub finding_type: &'static str,
    pub addresses: Vec<String>,
    pub metadata: FindingMetadata,
    pub labels: Vec<Label>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingMetadata {
    pub from: String,
    pub to: String,
    pub hash: String,
    pub block_number: u64,
    pub anomaly_score: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub entity: String,
    pub entity_type: &'static str,
    pub label: &'static str,
    pub confidence: f32,
}
