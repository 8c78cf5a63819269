//! Charging-profile validation, storage and clear-matching.
//!
//! Both dialects share the schedule rules, so profiles are kept and checked
//! in their canonical camelCase JSON form: V16 names the profile id
//! `chargingProfileId` and carries one schedule object, V201 names it `id`
//! and carries an array. Accessors normalize both shapes.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Purposes that only apply to the station itself (connector/EVSE 0).
const STATION_MAX_PURPOSES: [&str; 2] = ["ChargePointMaxProfile", "ChargingStationMaxProfile"];
const TX_PROFILE: &str = "TxProfile";

/// A profile installed on a connector, in canonical JSON form.
#[derive(Debug, Clone)]
pub struct StoredChargingProfile {
    json: Value,
}

impl StoredChargingProfile {
    pub fn from_value(json: Value) -> Self {
        Self { json }
    }

    pub fn json(&self) -> &Value {
        &self.json
    }

    pub fn id(&self) -> Option<i64> {
        self.json
            .get("chargingProfileId")
            .or_else(|| self.json.get("id"))
            .and_then(Value::as_i64)
    }

    pub fn stack_level(&self) -> Option<i64> {
        self.json.get("stackLevel").and_then(Value::as_i64)
    }

    pub fn purpose(&self) -> Option<&str> {
        self.json
            .get("chargingProfilePurpose")
            .and_then(Value::as_str)
    }

    pub fn is_tx_profile(&self) -> bool {
        self.purpose() == Some(TX_PROFILE)
    }

    /// The schedules, normalized to a list (V16 stores a single object).
    pub fn schedules(&self) -> Vec<&Value> {
        match self.json.get("chargingSchedule") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(single) => vec![single],
            None => Vec::new(),
        }
    }
}

/// Context the validation rules depend on.
#[derive(Debug, Clone, Copy)]
pub struct ProfileContext {
    /// Connector (V16) or EVSE (V201) the profile targets; 0 = station.
    pub connector_id: i64,
    pub connector_has_transaction: bool,
    pub max_stack_level: i64,
}

/// Check a profile against the placement and schedule rules.
///
/// A violation is a business rejection (the command answers `Rejected`),
/// not a wire error, so the reason comes back as a plain string for the
/// handler to log.
pub fn validate(profile: &StoredChargingProfile, ctx: &ProfileContext, now: DateTime<Utc>) -> Result<(), String> {
    let stack_level = profile
        .stack_level()
        .ok_or("profile has no stackLevel")?;
    if stack_level < 0 || stack_level > ctx.max_stack_level {
        return Err(format!(
            "stackLevel {stack_level} outside 0..={}",
            ctx.max_stack_level
        ));
    }

    let purpose = profile
        .purpose()
        .ok_or("profile has no chargingProfilePurpose")?;
    if STATION_MAX_PURPOSES.contains(&purpose) && ctx.connector_id != 0 {
        return Err(format!("{purpose} must target connector/EVSE 0"));
    }
    if purpose == TX_PROFILE {
        if ctx.connector_id == 0 {
            return Err("TxProfile must target a concrete connector/EVSE".to_string());
        }
        if !ctx.connector_has_transaction {
            return Err("TxProfile requires an active transaction".to_string());
        }
    }

    let kind = profile.json().get("chargingProfileKind").and_then(Value::as_str);
    let has_recurrency = profile.json().get("recurrencyKind").is_some();
    match kind {
        Some("Recurring") if !has_recurrency => {
            return Err("Recurring profile without recurrencyKind".to_string())
        }
        Some(_) | None if has_recurrency && kind != Some("Recurring") => {
            return Err("recurrencyKind on a non-Recurring profile".to_string())
        }
        _ => {}
    }

    let valid_from = rfc3339(profile.json().get("validFrom"));
    let valid_to = rfc3339(profile.json().get("validTo"));
    if let (Some(from), Some(to)) = (valid_from, valid_to) {
        if from >= to {
            return Err("validFrom must precede validTo".to_string());
        }
    }
    if let Some(to) = valid_to {
        if to <= now {
            return Err("profile is already expired".to_string());
        }
    }

    let schedules = profile.schedules();
    if schedules.is_empty() {
        return Err("profile has no chargingSchedule".to_string());
    }
    for schedule in schedules {
        validate_schedule(schedule)?;
    }
    Ok(())
}

fn validate_schedule(schedule: &Value) -> Result<(), String> {
    if let Some(id) = schedule.get("id").and_then(Value::as_i64) {
        if id <= 0 {
            return Err(format!("schedule id {id} must be positive"));
        }
    }
    if let Some(duration) = schedule.get("duration").and_then(Value::as_i64) {
        if duration <= 0 {
            return Err(format!("schedule duration {duration} must be positive"));
        }
    }
    if let Some(rate) = schedule.get("minChargingRate").and_then(Value::as_f64) {
        if rate < 0.0 {
            return Err(format!("minChargingRate {rate} must not be negative"));
        }
    }

    let periods = schedule
        .get("chargingSchedulePeriod")
        .and_then(Value::as_array)
        .filter(|p| !p.is_empty())
        .ok_or("schedule needs at least one chargingSchedulePeriod")?;

    let mut previous_start: Option<i64> = None;
    for period in periods {
        let start = period
            .get("startPeriod")
            .and_then(Value::as_i64)
            .ok_or("period has no startPeriod")?;
        if start < 0 {
            return Err(format!("startPeriod {start} must not be negative"));
        }
        if let Some(prev) = previous_start {
            if start <= prev {
                return Err("startPeriod values must strictly increase".to_string());
            }
        }
        previous_start = Some(start);

        let limit = period
            .get("limit")
            .and_then(Value::as_f64)
            .ok_or("period has no limit")?;
        if limit <= 0.0 {
            return Err(format!("period limit {limit} must be positive"));
        }

        let phases = period.get("numberPhases").and_then(Value::as_i64);
        if let Some(n) = phases {
            if !(1..=3).contains(&n) {
                return Err(format!("numberPhases {n} outside 1..=3"));
            }
        }
        if let Some(phase) = period.get("phaseToUse").and_then(Value::as_i64) {
            let max = phases.unwrap_or(3);
            if phase < 1 || phase > max {
                return Err(format!("phaseToUse {phase} exceeds numberPhases {max}"));
            }
        }
    }
    Ok(())
}

fn rfc3339(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Filter used by ClearChargingProfile.
#[derive(Debug, Clone, Default)]
pub struct ClearProfileCriteria {
    pub id: Option<i64>,
    pub purpose: Option<String>,
    pub stack_level: Option<i64>,
}

/// A profile matches when any of four independent conditions holds:
/// its id equals the requested one; no purpose filter is given and the
/// stackLevel matches; the profile carries no stackLevel and the purpose
/// matches; or both stackLevel and purpose match.
pub fn clear_matches(profile: &StoredChargingProfile, criteria: &ClearProfileCriteria) -> bool {
    let id_matches = criteria.id.is_some() && profile.id() == criteria.id;
    let level_matches =
        criteria.stack_level.is_some() && profile.stack_level() == criteria.stack_level;
    let purpose_matches = criteria
        .purpose
        .as_deref()
        .map(|purpose| profile.purpose() == Some(purpose))
        .unwrap_or(false);

    id_matches
        || (criteria.purpose.is_none() && level_matches)
        || (profile.stack_level().is_none() && purpose_matches)
        || (level_matches && purpose_matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tx_profile() -> StoredChargingProfile {
        StoredChargingProfile::from_value(json!({
            "chargingProfileId": 11,
            "stackLevel": 2,
            "chargingProfilePurpose": "TxProfile",
            "chargingProfileKind": "Absolute",
            "chargingSchedule": {
                "chargingRateUnit": "A",
                "chargingSchedulePeriod": [
                    {"startPeriod": 0, "limit": 16.0},
                    {"startPeriod": 600, "limit": 8.0, "numberPhases": 3}
                ]
            }
        }))
    }

    fn ctx(connector_id: i64, has_tx: bool) -> ProfileContext {
        ProfileContext {
            connector_id,
            connector_has_transaction: has_tx,
            max_stack_level: 9,
        }
    }

    #[test]
    fn tx_profile_needs_a_transaction() {
        let profile = tx_profile();
        assert!(validate(&profile, &ctx(1, true), Utc::now()).is_ok());
        assert!(validate(&profile, &ctx(1, false), Utc::now()).is_err());
        assert!(validate(&profile, &ctx(0, true), Utc::now()).is_err());
    }

    #[test]
    fn station_max_profile_only_on_connector_zero() {
        let profile = StoredChargingProfile::from_value(json!({
            "chargingProfileId": 3,
            "stackLevel": 0,
            "chargingProfilePurpose": "ChargePointMaxProfile",
            "chargingProfileKind": "Absolute",
            "chargingSchedule": {
                "chargingRateUnit": "W",
                "chargingSchedulePeriod": [{"startPeriod": 0, "limit": 11000.0}]
            }
        }));
        assert!(validate(&profile, &ctx(0, false), Utc::now()).is_ok());
        assert!(validate(&profile, &ctx(1, false), Utc::now()).is_err());
    }

    #[test]
    fn recurring_requires_recurrency_kind_and_vice_versa() {
        let mut value = tx_profile().json().clone();
        value["chargingProfileKind"] = json!("Recurring");
        let profile = StoredChargingProfile::from_value(value.clone());
        assert!(validate(&profile, &ctx(1, true), Utc::now()).is_err());

        value["recurrencyKind"] = json!("Daily");
        let profile = StoredChargingProfile::from_value(value.clone());
        assert!(validate(&profile, &ctx(1, true), Utc::now()).is_ok());

        value["chargingProfileKind"] = json!("Absolute");
        let profile = StoredChargingProfile::from_value(value);
        assert!(validate(&profile, &ctx(1, true), Utc::now()).is_err());
    }

    #[test]
    fn expired_and_inverted_validity_windows_are_rejected() {
        let mut value = tx_profile().json().clone();
        value["validFrom"] = json!("2024-01-02T00:00:00Z");
        value["validTo"] = json!("2024-01-01T00:00:00Z");
        let profile = StoredChargingProfile::from_value(value.clone());
        assert!(validate(&profile, &ctx(1, true), Utc::now()).is_err());

        value["validFrom"] = json!("2023-01-01T00:00:00Z");
        value["validTo"] = json!("2023-06-01T00:00:00Z");
        let profile = StoredChargingProfile::from_value(value);
        assert!(validate(&profile, &ctx(1, true), Utc::now()).is_err());
    }

    #[test]
    fn schedule_periods_must_increase_with_positive_limits() {
        let mut value = tx_profile().json().clone();
        value["chargingSchedule"]["chargingSchedulePeriod"] = json!([
            {"startPeriod": 0, "limit": 16.0},
            {"startPeriod": 0, "limit": 8.0}
        ]);
        let profile = StoredChargingProfile::from_value(value.clone());
        assert!(validate(&profile, &ctx(1, true), Utc::now()).is_err());

        value["chargingSchedule"]["chargingSchedulePeriod"] =
            json!([{"startPeriod": 0, "limit": 0.0}]);
        let profile = StoredChargingProfile::from_value(value);
        assert!(validate(&profile, &ctx(1, true), Utc::now()).is_err());
    }

    #[test]
    fn phase_to_use_bounded_by_number_phases() {
        let mut value = tx_profile().json().clone();
        value["chargingSchedule"]["chargingSchedulePeriod"] =
            json!([{"startPeriod": 0, "limit": 16.0, "numberPhases": 1, "phaseToUse": 2}]);
        let profile = StoredChargingProfile::from_value(value);
        assert!(validate(&profile, &ctx(1, true), Utc::now()).is_err());
    }

    #[test]
    fn v201_schedule_array_is_accepted() {
        let profile = StoredChargingProfile::from_value(json!({
            "id": 42,
            "stackLevel": 1,
            "chargingProfilePurpose": "TxDefaultProfile",
            "chargingProfileKind": "Absolute",
            "chargingSchedule": [{
                "id": 1,
                "chargingRateUnit": "W",
                "chargingSchedulePeriod": [{"startPeriod": 0, "limit": 7400.0}]
            }]
        }));
        assert!(validate(&profile, &ctx(1, false), Utc::now()).is_ok());
        assert_eq!(profile.id(), Some(42));
    }

    #[test]
    fn clear_matching_rules() {
        let profile = tx_profile(); // id 11, stackLevel 2, TxProfile

        let by_id = ClearProfileCriteria {
            id: Some(11),
            ..Default::default()
        };
        assert!(clear_matches(&profile, &by_id));

        let by_level = ClearProfileCriteria {
            stack_level: Some(2),
            ..Default::default()
        };
        assert!(clear_matches(&profile, &by_level));

        let both_match = ClearProfileCriteria {
            purpose: Some("TxProfile".into()),
            stack_level: Some(2),
            ..Default::default()
        };
        assert!(clear_matches(&profile, &both_match));

        let both_mismatch = ClearProfileCriteria {
            purpose: Some("TxProfile".into()),
            stack_level: Some(5),
            ..Default::default()
        };
        assert!(!clear_matches(&profile, &both_mismatch));

        assert!(!clear_matches(&profile, &ClearProfileCriteria::default()));
    }

    #[test]
    fn clear_match_disjuncts_are_independent() {
        let profile = tx_profile(); // id 11, stackLevel 2, TxProfile

        // A mismatching id does not veto the stackLevel disjunct.
        let wrong_id_matching_level = ClearProfileCriteria {
            id: Some(999),
            stack_level: Some(2),
            ..Default::default()
        };
        assert!(clear_matches(&profile, &wrong_id_matching_level));

        // A purpose-only filter matches a profile with a stackLevel only
        // when paired with a matching level; with a level present it needs
        // the combined disjunct.
        let purpose_only = ClearProfileCriteria {
            purpose: Some("TxProfile".into()),
            ..Default::default()
        };
        assert!(!clear_matches(&profile, &purpose_only));

        // Against a profile carrying no stackLevel the purpose disjunct
        // applies on its own.
        let levelless = StoredChargingProfile::from_value(json!({
            "chargingProfileId": 30,
            "chargingProfilePurpose": "TxProfile",
            "chargingProfileKind": "Absolute",
            "chargingSchedule": {
                "chargingRateUnit": "A",
                "chargingSchedulePeriod": [{"startPeriod": 0, "limit": 16.0}]
            }
        }));
        assert!(clear_matches(&levelless, &purpose_only));
    }
}
