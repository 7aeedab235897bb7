//! Linked-rate resolution.
//!
//! Upstream pricing batches mix master entries (directly-set prices) with
//! linked entries that derive their prices from a master via a fixed offset
//! or a percentage. The resolver validates dependency completeness for the
//! requested operation and materializes every linked entry into a concrete,
//! non-linked entry. Stateless; operates on a caller-owned batch.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Inclusive stay date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// True when the two ranges share at least one date.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && self.end >= other.start
    }
}

/// How a linked entry derives its price from its master.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkAdjustment {
    /// Fixed amount added to the master price (negative for discounts).
    Offset(f64),
    /// Percentage applied to the master price (-95.0 means 5% of master).
    Percentage(f64),
}

/// Reference from a linked entry to its master rate plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLink {
    pub master_rate_plan_code: String,
    pub adjustment: LinkAdjustment,
}

/// One rate entry in a pricing batch.
///
/// `link` being `Some` is what the wire format calls "IsLinked"; modeling
/// the master code and the offset-xor-percentage pair inside it keeps the
/// exactly-one-adjustment invariant out of runtime checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub room_type_code: String,
    pub rate_plan_code: String,
    pub range: DateRange,
    pub first_adult_rate: f64,
    pub second_adult_rate: f64,
    pub additional_adult_rate: Option<f64>,
    pub child_rate: Option<f64>,
    pub currency_code: String,
    pub link: Option<RateLink>,
}

impl RateEntry {
    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }
}

/// Policy flags derived from the requested channel operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionPolicy {
    /// False when the partner performs linked-rate math itself or the
    /// operation type does not support linked rates; linked entries are
    /// then dropped and masters pass through unchanged.
    pub allow_linked: bool,
    /// True for rate-plan creation: masters must be created before entries
    /// deriving from them, so a master missing from the batch is a hard
    /// failure. Updates may reference masters that already exist at the
    /// partner.
    pub is_creation: bool,
}

/// Validation failures abort the whole batch; no partial resolution.
#[derive(Debug, Error, PartialEq)]
pub enum RateError {
    #[error("linked rate plan {rate_plan} references itself as master")]
    SelfReference { rate_plan: String },
    #[error(
        "linked rate plan {rate_plan} requires master {master} which is not part of the creation batch"
    )]
    MissingMaster { rate_plan: String, master: String },
    #[error(
        "no master entry of plan {master} covers room type {room_type} for {start}..{end} required by linked rate plan {rate_plan}"
    )]
    NoOverlappingMaster {
        rate_plan: String,
        master: String,
        room_type: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("master rate plan {rate_plan} has a non-positive adult rate")]
    InvalidMasterRate { rate_plan: String },
}

/// Resolves linked rate entries against the masters in the same batch.
#[derive(Debug, Default)]
pub struct RateResolver;

impl RateResolver {
    pub fn new() -> Self {
        Self
    }

    /// Validate dependency completeness without materializing anything.
    ///
    /// Self-references are rejected for every operation type. A master
    /// absent from the batch is rejected only for creation operations;
    /// updates assume it already exists at the partner.
    pub fn validate_dependencies(
        &self,
        batch: &[RateEntry],
        is_creation: bool,
    ) -> Result<(), RateError> {
        for entry in batch {
            let Some(link) = &entry.link else {
                if entry.first_adult_rate <= 0.0 || entry.second_adult_rate <= 0.0 {
                    return Err(RateError::InvalidMasterRate {
                        rate_plan: entry.rate_plan_code.clone(),
                    });
                }
                continue;
            };

            if link.master_rate_plan_code == entry.rate_plan_code {
                return Err(RateError::SelfReference {
                    rate_plan: entry.rate_plan_code.clone(),
                });
            }

            let master_in_batch = batch.iter().any(|candidate| {
                !candidate.is_linked() && candidate.rate_plan_code == link.master_rate_plan_code
            });
            if is_creation && !master_in_batch {
                return Err(RateError::MissingMaster {
                    rate_plan: entry.rate_plan_code.clone(),
                    master: link.master_rate_plan_code.clone(),
                });
            }
        }

        Ok(())
    }

    /// Resolve a batch: masters pass through unchanged, linked entries are
    /// materialized into concrete non-linked entries. One exception: in
    /// update mode, an entry whose master is absent from the batch comes
    /// back still linked, and the partner derives its price. Output order
    /// is not significant to callers.
    pub fn resolve(
        &self,
        batch: Vec<RateEntry>,
        policy: ResolutionPolicy,
    ) -> Result<Vec<RateEntry>, RateError> {
        if !policy.allow_linked {
            return Ok(batch.into_iter().filter(|e| !e.is_linked()).collect());
        }

        self.validate_dependencies(&batch, policy.is_creation)?;

        let (masters, linked): (Vec<_>, Vec<_>) =
            batch.into_iter().partition(|e| !e.is_linked());

        let mut resolved = masters.clone();
        for entry in linked {
            // Partitioned on is_linked, so the link is always present.
            let Some(link) = entry.link.clone() else {
                continue;
            };

            let candidates: Vec<&RateEntry> = masters
                .iter()
                .filter(|m| {
                    m.rate_plan_code == link.master_rate_plan_code
                        && m.room_type_code == entry.room_type_code
                        && m.range.overlaps(&entry.range)
                })
                .collect();

            let Some(master) = candidates.first() else {
                let master_exists_in_batch = masters
                    .iter()
                    .any(|m| m.rate_plan_code == link.master_rate_plan_code);
                if !policy.is_creation && !master_exists_in_batch {
                    // Master lives only at the partner; leave the entry
                    // linked so the message builder emits the derivation
                    // attributes and the partner computes the price.
                    resolved.push(entry);
                    continue;
                }
                return Err(RateError::NoOverlappingMaster {
                    rate_plan: entry.rate_plan_code.clone(),
                    master: link.master_rate_plan_code.clone(),
                    room_type: entry.room_type_code.clone(),
                    start: entry.range.start,
                    end: entry.range.end,
                });
            };

            if candidates.len() > 1 {
                // Latent ambiguity in the upstream data: several masters
                // overlap the linked range. First in batch order wins.
                warn!(
                    rate_plan = %entry.rate_plan_code,
                    master = %link.master_rate_plan_code,
                    room_type = %entry.room_type_code,
                    candidates = candidates.len(),
                    "multiple overlapping masters for linked rate; using first in batch order"
                );
            }

            resolved.push(materialize(&entry, master, link.adjustment));
        }

        Ok(resolved)
    }
}

/// Compute concrete prices for one linked entry against its master.
///
/// Adult rates are floored at 0.01, additional/child rates at 0. All
/// non-price attributes come from the linked entry; the result carries no
/// link attributes.
fn materialize(linked: &RateEntry, master: &RateEntry, adjustment: LinkAdjustment) -> RateEntry {
    let (first, second, additional, child) = match adjustment {
        LinkAdjustment::Offset(offset) => (
            adult_floor(master.first_adult_rate + offset),
            adult_floor(master.second_adult_rate + offset),
            master.additional_adult_rate.map(|r| extra_floor(r + offset)),
            master.child_rate.map(|r| extra_floor(r + offset)),
        ),
        LinkAdjustment::Percentage(percentage) => {
            let multiplier = 1.0 + percentage / 100.0;
            (
                adult_floor(master.first_adult_rate * multiplier),
                adult_floor(master.second_adult_rate * multiplier),
                master
                    .additional_adult_rate
                    .map(|r| extra_floor(r * multiplier)),
                master.child_rate.map(|r| extra_floor(r * multiplier)),
            )
        }
    };

    RateEntry {
        room_type_code: linked.room_type_code.clone(),
        rate_plan_code: linked.rate_plan_code.clone(),
        range: linked.range,
        first_adult_rate: first,
        second_adult_rate: second,
        additional_adult_rate: additional,
        child_rate: child,
        currency_code: linked.currency_code.clone(),
        link: None,
    }
}

fn adult_floor(rate: f64) -> f64 {
    rate.max(0.01)
}

fn extra_floor(rate: f64) -> f64 {
    rate.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn master(plan: &str, room: &str, first: f64, second: f64) -> RateEntry {
        RateEntry {
            room_type_code: room.to_string(),
            rate_plan_code: plan.to_string(),
            range: DateRange::new(date(2026, 9, 1), date(2026, 9, 30)),
            first_adult_rate: first,
            second_adult_rate: second,
            additional_adult_rate: Some(40.0),
            child_rate: None,
            currency_code: "EUR".to_string(),
            link: None,
        }
    }

    fn linked(plan: &str, room: &str, master_plan: &str, adjustment: LinkAdjustment) -> RateEntry {
        RateEntry {
            room_type_code: room.to_string(),
            rate_plan_code: plan.to_string(),
            range: DateRange::new(date(2026, 9, 10), date(2026, 9, 20)),
            first_adult_rate: 0.0,
            second_adult_rate: 0.0,
            additional_adult_rate: None,
            child_rate: None,
            currency_code: "EUR".to_string(),
            link: Some(RateLink {
                master_rate_plan_code: master_plan.to_string(),
                adjustment,
            }),
        }
    }

    const CREATE: ResolutionPolicy = ResolutionPolicy {
        allow_linked: true,
        is_creation: true,
    };
    const UPDATE: ResolutionPolicy = ResolutionPolicy {
        allow_linked: true,
        is_creation: false,
    };

    #[test]
    fn test_offset_resolution() {
        let resolver = RateResolver::new();
        let batch = vec![
            master("BAR", "DBL", 200.0, 180.0),
            linked("CORP", "DBL", "BAR", LinkAdjustment::Offset(-20.0)),
        ];

        let resolved = resolver.resolve(batch, CREATE).unwrap();
        let corp = resolved
            .iter()
            .find(|e| e.rate_plan_code == "CORP")
            .unwrap();

        assert!((corp.first_adult_rate - 180.0).abs() < 1e-9);
        assert!((corp.second_adult_rate - 160.0).abs() < 1e-9);
        assert!((corp.additional_adult_rate.unwrap() - 20.0).abs() < 1e-9);
        assert!(corp.child_rate.is_none());
        assert!(!corp.is_linked());
        assert_eq!(corp.currency_code, "EUR");
    }

    #[test]
    fn test_percentage_floor_never_reaches_zero() {
        let resolver = RateResolver::new();
        let batch = vec![
            master("BAR", "DBL", 10.0, 10.0),
            linked("PROMO", "DBL", "BAR", LinkAdjustment::Percentage(-95.0)),
        ];

        let resolved = resolver.resolve(batch, CREATE).unwrap();
        let promo = resolved
            .iter()
            .find(|e| e.rate_plan_code == "PROMO")
            .unwrap();

        assert!((promo.first_adult_rate - 0.5).abs() < 1e-9);
        assert!(promo.first_adult_rate > 0.0);

        // A -200% percentage would go negative; adult rates floor at 0.01,
        // additional rates at 0.
        let batch = vec![
            master("BAR", "DBL", 10.0, 10.0),
            linked("FREE", "DBL", "BAR", LinkAdjustment::Percentage(-200.0)),
        ];
        let resolved = resolver.resolve(batch, CREATE).unwrap();
        let free = resolved
            .iter()
            .find(|e| e.rate_plan_code == "FREE")
            .unwrap();
        assert!((free.first_adult_rate - 0.01).abs() < 1e-12);
        assert!((free.additional_adult_rate.unwrap() - 0.0).abs() < 1e-12);
    }

    #[test]
    fn test_masters_pass_through_unchanged() {
        let resolver = RateResolver::new();
        let original = master("BAR", "DBL", 200.0, 180.0);
        let resolved = resolver.resolve(vec![original.clone()], CREATE).unwrap();
        assert_eq!(resolved, vec![original]);
    }

    #[test]
    fn test_linked_entries_dropped_when_policy_disallows_them() {
        let resolver = RateResolver::new();
        let batch = vec![
            master("BAR", "DBL", 200.0, 180.0),
            linked("CORP", "DBL", "BAR", LinkAdjustment::Offset(-20.0)),
        ];
        let resolved = resolver
            .resolve(
                batch,
                ResolutionPolicy {
                    allow_linked: false,
                    is_creation: true,
                },
            )
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].rate_plan_code, "BAR");
    }

    #[test]
    fn test_self_reference_is_rejected_for_any_operation() {
        let resolver = RateResolver::new();
        for policy in [CREATE, UPDATE] {
            let batch = vec![linked("LOOP", "DBL", "LOOP", LinkAdjustment::Offset(-5.0))];
            let err = resolver.resolve(batch, policy).unwrap_err();
            assert_eq!(
                err,
                RateError::SelfReference {
                    rate_plan: "LOOP".to_string()
                }
            );
        }
    }

    #[test]
    fn test_creation_requires_master_in_batch() {
        let resolver = RateResolver::new();
        let batch = vec![linked("CORP", "DBL", "BAR", LinkAdjustment::Offset(-20.0))];

        let err = resolver.resolve(batch.clone(), CREATE).unwrap_err();
        assert_eq!(
            err,
            RateError::MissingMaster {
                rate_plan: "CORP".to_string(),
                master: "BAR".to_string(),
            }
        );

        // Same batch passes for updates: the master pre-exists at the
        // partner and the entry stays linked for partner-side derivation.
        let resolved = resolver.resolve(batch, UPDATE).unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].is_linked());
    }

    #[test]
    fn test_room_type_mismatch_fails_with_context() {
        let resolver = RateResolver::new();
        let batch = vec![
            master("BAR", "SGL", 100.0, 90.0),
            linked("CORP", "DBL", "BAR", LinkAdjustment::Offset(-10.0)),
        ];

        let err = resolver.resolve(batch, CREATE).unwrap_err();
        match err {
            RateError::NoOverlappingMaster {
                rate_plan,
                master,
                room_type,
                ..
            } => {
                assert_eq!(rate_plan, "CORP");
                assert_eq!(master, "BAR");
                assert_eq!(room_type, "DBL");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_overlapping_dates_fail() {
        let resolver = RateResolver::new();
        let mut m = master("BAR", "DBL", 100.0, 90.0);
        m.range = DateRange::new(date(2026, 10, 1), date(2026, 10, 31));
        let batch = vec![
            m,
            linked("CORP", "DBL", "BAR", LinkAdjustment::Offset(-10.0)),
        ];

        assert!(matches!(
            resolver.resolve(batch, CREATE),
            Err(RateError::NoOverlappingMaster { .. })
        ));
    }

    #[test]
    fn test_first_overlapping_master_wins() {
        let resolver = RateResolver::new();
        let mut september_alt = master("BAR", "DBL", 300.0, 280.0);
        september_alt.range = DateRange::new(date(2026, 9, 15), date(2026, 9, 25));

        let batch = vec![
            master("BAR", "DBL", 200.0, 180.0),
            september_alt,
            linked("CORP", "DBL", "BAR", LinkAdjustment::Offset(-20.0)),
        ];

        let resolved = resolver.resolve(batch, CREATE).unwrap();
        let corp = resolved
            .iter()
            .find(|e| e.rate_plan_code == "CORP")
            .unwrap();
        assert!((corp.first_adult_rate - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_positive_master_rate_is_rejected() {
        let resolver = RateResolver::new();
        let batch = vec![master("BAR", "DBL", 0.0, 180.0)];
        assert_eq!(
            resolver.resolve(batch, CREATE).unwrap_err(),
            RateError::InvalidMasterRate {
                rate_plan: "BAR".to_string()
            }
        );
    }

    #[test]
    fn test_validation_failure_aborts_whole_batch() {
        let resolver = RateResolver::new();
        let batch = vec![
            master("BAR", "DBL", 200.0, 180.0),
            linked("GOOD", "DBL", "BAR", LinkAdjustment::Offset(-20.0)),
            linked("LOOP", "DBL", "LOOP", LinkAdjustment::Offset(-5.0)),
        ];
        // The valid entries do not survive a batch containing one bad one.
        assert!(resolver.resolve(batch, CREATE).is_err());
    }
}
