//! Broker contract metadata.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Contract {
    pub fn with_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            is_active: true,
            ..Default::default()
        }
    }
}

/// Whether `candidate` is shaped like a broker contract id (`CON.F.US.MGC.Z25`).
pub fn looks_like_contract_id(candidate: &str) -> bool {
    let text = candidate.trim().to_uppercase();
    text.starts_with("CON.") && text.matches('.').count() >= 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_id_shape() {
        assert!(looks_like_contract_id("CON.F.US.MGC.Z25"));
        assert!(looks_like_contract_id(" con.f.us.mgc.z25 "));
        assert!(!looks_like_contract_id("MGCZ25"));
        assert!(!looks_like_contract_id("CON.F.MGC"));
    }

    #[test]
    fn deserializes_sparse_payload() {
        let contract: Contract = serde_json::from_str(r#"{"id":"CON.F.US.MGC.Z25"}"#).unwrap();
        assert_eq!(contract.id, "CON.F.US.MGC.Z25");
        assert!(contract.is_active);
        assert!(contract.symbol.is_none());

        let contract: Contract = serde_json::from_str(
            r#"{"id":"CON.F.US.MGC.Z25","name":"MGCZ5","description":"Micro Gold","isActive":false}"#,
        )
        .unwrap();
        assert_eq!(contract.name.as_deref(), Some("MGCZ5"));
        assert!(!contract.is_active);
    }
}
