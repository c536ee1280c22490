use serde::{Deserialize, Serialize};
use std::fmt;

/// Payment methods offered at the terminal, serialized to the values the
/// backend recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "PIX")]
    Pix,
    /// Payment link, settled as a card payment on the backend side.
    #[serde(rename = "CREDIT_CARD")]
    Link,
    #[serde(rename = "CASH")]
    Cash,
}

impl PaymentMethod {
    pub fn as_backend_value(&self) -> &'static str {
        match self {
            Self::Pix => "PIX",
            Self::Link => "CREDIT_CARD",
            Self::Cash => "CASH",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_backend_value())
    }
}

/// Status of a sale's payment as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn is_paid(&self) -> bool {
        matches!(self, Self::Paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_backend_values() {
        assert_eq!(PaymentMethod::Pix.as_backend_value(), "PIX");
        assert_eq!(PaymentMethod::Link.as_backend_value(), "CREDIT_CARD");
        assert_eq!(PaymentMethod::Cash.as_backend_value(), "CASH");
    }

    #[test]
    fn test_status_roundtrip() {
        let status: PaymentStatus = serde_json::from_str("\"PENDING\"").unwrap();
        assert_eq!(status, PaymentStatus::Pending);
        assert!(!status.is_paid());

        let status: PaymentStatus = serde_json::from_str("\"PAID\"").unwrap();
        assert!(status.is_paid());
    }
}
