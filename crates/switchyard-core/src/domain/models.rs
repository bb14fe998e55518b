use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// GraphQL serialises `ID` fields as strings; REST and gRPC send numbers.
mod flexible_id {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        match RawId::deserialize(deserializer)? {
            RawId::Number(value) => Ok(value),
            RawId::Text(value) => value.trim().parse().map_err(serde::de::Error::custom),
        }
    }
}

/// One viewer profile attached to an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    #[serde(deserialize_with = "flexible_id::deserialize")]
    pub id: i64,
    pub profile_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_child_profile: bool,
}

/// Plan details nested inside a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub plan_name: String,
    #[serde(default)]
    pub price: Option<f64>,
}

/// Active subscription of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    #[serde(deserialize_with = "flexible_id::deserialize")]
    pub id: i64,
    #[serde(default)]
    pub plan_name: Option<String>,
    pub status: String,
    #[serde(default)]
    pub billing_cycle: Option<String>,
    #[serde(default)]
    pub plan: Option<PlanSummary>,
}

impl SubscriptionSummary {
    /// Copies the nested plan name into `plan_name` when upstream only sent the nested form.
    pub fn normalized(mut self) -> Self {
        if self.plan_name.is_none() {
            self.plan_name = self.plan.as_ref().map(|plan| plan.plan_name.clone());
        }
        self
    }
}

/// One billing history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    #[serde(deserialize_with = "flexible_id::deserialize")]
    pub id: i64,
    pub amount: f64,
    #[serde(alias = "status")]
    pub payment_status: String,
    #[serde(default)]
    pub payment_date: Option<String>,
}

/// Catalog entry recommended on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
    #[serde(deserialize_with = "flexible_id::deserialize")]
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Locally synthesized usage section; no upstream call backs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchHistory {
    pub total_watched: u32,
    pub recent_watch_count: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub last_watched_date: OffsetDateTime,
}

impl WatchHistory {
    pub fn placeholder(now: OffsetDateTime) -> Self {
        Self {
            total_watched: 42,
            recent_watch_count: 12,
            last_watched_date: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_takes_plan_name_from_nested_plan() {
        let subscription: SubscriptionSummary = serde_json::from_str(
            r#"{"id":9,"status":"ACTIVE","billingCycle":"MONTHLY","plan":{"planName":"Premium","price":12.5}}"#,
        )
        .expect("valid subscription");

        let normalized = subscription.normalized();

        assert_eq!(normalized.plan_name.as_deref(), Some("Premium"));
    }

    #[test]
    fn subscription_keeps_explicit_plan_name() {
        let subscription = SubscriptionSummary {
            id: 1,
            plan_name: Some(String::from("Basic")),
            status: String::from("ACTIVE"),
            billing_cycle: None,
            plan: Some(PlanSummary {
                plan_name: String::from("Other"),
                price: None,
            }),
        };

        assert_eq!(subscription.normalized().plan_name.as_deref(), Some("Basic"));
    }

    #[test]
    fn ids_accept_numeric_strings() {
        let content: ContentSummary =
            serde_json::from_str(r#"{"id":"17","title":"Dune","contentType":"MOVIE"}"#)
                .expect("string id");

        assert_eq!(content.id, 17);
        assert!(serde_json::from_str::<ContentSummary>(r#"{"id":"x","title":"Dune"}"#).is_err());
    }

    #[test]
    fn payment_accepts_short_status_field() {
        let payment: PaymentRecord = serde_json::from_str(
            r#"{"id":3,"amount":9.99,"status":"PAID","paymentDate":"2024-05-01"}"#,
        )
        .expect("valid payment");

        assert_eq!(payment.payment_status, "PAID");
    }

    #[test]
    fn watch_history_date_is_rfc3339() {
        let now = OffsetDateTime::from_unix_timestamp(1_790_000_000)
            .expect("in range");

        let json = serde_json::to_value(WatchHistory::placeholder(now))
            .expect("serializable");

        assert_eq!(json["lastWatchedDate"], "2026-09-21T14:13:20Z");
        assert_eq!(json["totalWatched"], 42);
    }
}
