use serde::{Deserialize, Serialize};

/// The eight ABO/Rh blood types accepted everywhere a blood type appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum BloodType {
    #[serde(rename = "A+")]
    #[sqlx(rename = "A+")]
    APos,
    #[serde(rename = "A-")]
    #[sqlx(rename = "A-")]
    ANeg,
    #[serde(rename = "B+")]
    #[sqlx(rename = "B+")]
    BPos,
    #[serde(rename = "B-")]
    #[sqlx(rename = "B-")]
    BNeg,
    #[serde(rename = "AB+")]
    #[sqlx(rename = "AB+")]
    AbPos,
    #[serde(rename = "AB-")]
    #[sqlx(rename = "AB-")]
    AbNeg,
    #[serde(rename = "O+")]
    #[sqlx(rename = "O+")]
    OPos,
    #[serde(rename = "O-")]
    #[sqlx(rename = "O-")]
    ONeg,
}

/// Urgency of a blood request. Ordering matters: listings sort high first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

/// Account role. Fixed at registration; there is no self-promotion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Donor,
    Patient,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Role::Donor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blood_type_uses_clinical_notation() {
        let json = serde_json::to_string(&BloodType::ONeg).unwrap();
        assert_eq!(json, "\"O-\"");
        let parsed: BloodType = serde_json::from_str("\"AB+\"").unwrap();
        assert_eq!(parsed, BloodType::AbPos);
    }

    #[test]
    fn urgency_orders_low_to_high() {
        assert!(Urgency::High > Urgency::Medium);
        assert!(Urgency::Medium > Urgency::Low);
    }

    #[test]
    fn roles_are_lowercase_on_the_wire() {
        assert_eq!(serde_json::to_string(&Role::Patient).unwrap(), "\"patient\"");
    }
}
