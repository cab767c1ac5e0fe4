//! Pure reduction of fetched quest records into a dashboard snapshot.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;

use trustquests_types::models::{Quest, QuestCompletion, QuestStatus};
use trustquests_types::time::start_of_day;

use crate::AnalyticsConfig;

/// Everything fetched for one quest.
#[derive(Debug, Clone)]
pub struct QuestData {
    pub quest: Quest,
    pub completions: Vec<QuestCompletion>,
    pub deposit: Deposit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositSource {
    /// Read from the escrow contract.
    Escrow,
    /// `reward_amount × max_completions`.
    Estimate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Deposit {
    pub amount: f64,
    pub source: DepositSource,
}

impl Deposit {
    pub fn estimate(quest: &Quest) -> Self {
        Self {
            amount: quest.reward_amount * f64::from(quest.max_completions),
            source: DepositSource::Estimate,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusBreakdown {
    pub total: u64,
    pub active: u64,
    pub paused: u64,
    pub ended: u64,
}

impl StatusBreakdown {
    fn count(&mut self, status: QuestStatus) {
        self.total += 1;
        match status {
            QuestStatus::Active => self.active += 1,
            QuestStatus::Paused => self.paused += 1,
            QuestStatus::Ended => self.ended += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    /// Distinct addresses with at least one record.
    pub participants: u64,
    pub started: u64,
    pub completed: u64,
    /// Percent, 0 when nothing was started.
    pub completion_rate: f64,
    pub rewards_distributed: f64,
    pub total_deposited: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStage {
    pub stage: &'static str,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub completions: u64,
    /// Distinct addresses completing on this day.
    pub participants: u64,
    pub rewards: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantStat {
    pub address: String,
    pub completions: u64,
    pub rewards: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestSummary {
    pub id: String,
    pub title: String,
    pub status: QuestStatus,
    pub started: u64,
    pub completed: u64,
    pub completion_rate: f64,
    pub rewards_distributed: f64,
    pub deposit: Deposit,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub creator: String,
    pub generated_at: DateTime<Utc>,
    pub cutoff: NaiveDate,
    pub status: StatusBreakdown,
    pub totals: Totals,
    pub funnel: Vec<FunnelStage>,
    pub time_series: Vec<DailyPoint>,
    pub top_participants: Vec<ParticipantStat>,
    pub quests: Vec<QuestSummary>,
}

pub fn completion_rate(completed: u64, started: u64) -> f64 {
    if started == 0 {
        return 0.0;
    }
    completed as f64 / started as f64 * 100.0
}

/// Calendar days of the time-series window: the last `window_days` days
/// ending `today`, never starting before `cutoff`.
pub fn window_days(today: NaiveDate, window_days: u32, cutoff: NaiveDate) -> Vec<NaiveDate> {
    if window_days == 0 {
        return Vec::new();
    }
    let first = today
        .checked_sub_days(Days::new(u64::from(window_days - 1)))
        .unwrap_or(today)
        .max(cutoff);
    first.iter_days().take_while(|d| *d <= today).collect()
}

#[derive(Default)]
struct DayBucket {
    completions: u64,
    addresses: HashSet<String>,
    rewards: f64,
}

pub fn build_snapshot(
    creator: &str,
    config: &AnalyticsConfig,
    now: DateTime<Utc>,
    data: Vec<QuestData>,
) -> AnalyticsSnapshot {
    let cutoff = start_of_day(config.cutoff);

    let mut status = StatusBreakdown::default();
    let mut totals = Totals::default();
    let mut addresses: HashSet<String> = HashSet::new();
    let mut per_participant: HashMap<String, ParticipantStat> = HashMap::new();
    let mut rewarded = 0u64;
    let mut quests = Vec::with_capacity(data.len());

    let mut days: BTreeMap<NaiveDate, DayBucket> = window_days(now.date_naive(), config.window_days, config.cutoff)
        .into_iter()
        .map(|d| (d, DayBucket::default()))
        .collect();

    for QuestData { quest, completions, deposit } in data {
        status.count(quest.status);
        totals.total_deposited += deposit.amount;

        let mut summary = QuestSummary {
            id: quest.id,
            title: quest.title,
            status: quest.status,
            started: 0,
            completed: 0,
            completion_rate: 0.0,
            rewards_distributed: 0.0,
            deposit,
            created_at: quest.created_at,
        };

        let in_range = completions
            .iter()
            .filter(|c| c.completed_at.unwrap_or(c.started_at) >= cutoff);
        for record in in_range {
            addresses.insert(record.user_address.clone());
            summary.started += 1;

            if !record.is_completed() {
                continue;
            }
            summary.completed += 1;
            summary.rewards_distributed += record.reward_amount;
            if record.reward_amount > 0.0 {
                rewarded += 1;
            }

            let stat = per_participant
                .entry(record.user_address.clone())
                .or_insert_with(|| ParticipantStat {
                    address: record.user_address.clone(),
                    completions: 0,
                    rewards: 0.0,
                });
            stat.completions += 1;
            stat.rewards += record.reward_amount;

            let day = record.completed_at.unwrap_or(record.started_at).date_naive();
            if let Some(bucket) = days.get_mut(&day) {
                bucket.completions += 1;
                bucket.addresses.insert(record.user_address.clone());
                bucket.rewards += record.reward_amount;
            }
        }

        summary.completion_rate = completion_rate(summary.completed, summary.started);
        totals.started += summary.started;
        totals.completed += summary.completed;
        totals.rewards_distributed += summary.rewards_distributed;
        quests.push(summary);
    }

    totals.participants = addresses.len() as u64;
    totals.completion_rate = completion_rate(totals.completed, totals.started);

    let funnel = vec![
        FunnelStage { stage: "participants", count: totals.participants },
        FunnelStage { stage: "started", count: totals.started },
        FunnelStage { stage: "completed", count: totals.completed },
        FunnelStage { stage: "rewarded", count: rewarded },
    ];

    let time_series = days
        .into_iter()
        .map(|(date, bucket)| DailyPoint {
            date,
            completions: bucket.completions,
            participants: bucket.addresses.len() as u64,
            rewards: bucket.rewards,
        })
        .collect();

    let mut top_participants: Vec<ParticipantStat> = per_participant.into_values().collect();
    top_participants.sort_by(rank_participants);
    top_participants.truncate(config.top_n);

    quests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

    AnalyticsSnapshot {
        creator: creator.to_string(),
        generated_at: now,
        cutoff: config.cutoff,
        status,
        totals,
        funnel,
        time_series,
        top_participants,
        quests,
    }
}

// Completions desc, then rewards desc, then address for a stable order
fn rank_participants(a: &ParticipantStat, b: &ParticipantStat) -> Ordering {
    b.completions
        .cmp(&a.completions)
        .then_with(|| b.rewards.partial_cmp(&a.rewards).unwrap_or(Ordering::Equal))
        .then_with(|| a.address.cmp(&b.address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use trustquests_types::models::CompletionStatus;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn quest(id: &str, status: QuestStatus, reward: f64, max: u32) -> Quest {
        Quest {
            id: id.to_string(),
            space_id: None,
            creator_address: "0xc0ffee0000000000000000000000000000000001".to_string(),
            title: format!("Quest {}", id),
            description: None,
            reward_amount: reward,
            max_completions: max,
            status,
            escrow_id: None,
            created_at: at(2025, 2, 1, 0),
            updated_at: at(2025, 2, 1, 0),
        }
    }

    fn started(quest_id: &str, user: &str, when: DateTime<Utc>) -> QuestCompletion {
        QuestCompletion {
            id: format!("{}-{}", quest_id, user),
            quest_id: quest_id.to_string(),
            user_address: user.to_string(),
            status: CompletionStatus::Started,
            reward_amount: 0.0,
            started_at: when,
            completed_at: None,
        }
    }

    fn completed(quest_id: &str, user: &str, reward: f64, when: DateTime<Utc>) -> QuestCompletion {
        QuestCompletion {
            status: CompletionStatus::Completed,
            reward_amount: reward,
            completed_at: Some(when),
            ..started(quest_id, user, when)
        }
    }

    fn data(quest: Quest, completions: Vec<QuestCompletion>) -> QuestData {
        let deposit = Deposit::estimate(&quest);
        QuestData { quest, completions, deposit }
    }

    fn config() -> AnalyticsConfig {
        AnalyticsConfig {
            cutoff: date(2025, 1, 1),
            ..AnalyticsConfig::default()
        }
    }

    #[test]
    fn completion_rate_is_completed_over_started() {
        let now = at(2025, 3, 10, 12);
        let snapshot = build_snapshot(
            "0xc0ffee",
            &config(),
            now,
            vec![
                data(
                    quest("a", QuestStatus::Active, 5.0, 10),
                    vec![
                        completed("a", "0x01", 5.0, at(2025, 3, 9, 8)),
                        started("a", "0x02", at(2025, 3, 9, 9)),
                        started("a", "0x03", at(2025, 3, 9, 10)),
                    ],
                ),
                data(
                    quest("b", QuestStatus::Ended, 2.0, 5),
                    vec![completed("b", "0x01", 2.0, at(2025, 3, 8, 8))],
                ),
            ],
        );

        assert_eq!(snapshot.totals.started, 4);
        assert_eq!(snapshot.totals.completed, 2);
        assert_eq!(snapshot.totals.participants, 3);
        assert_eq!(snapshot.totals.completion_rate, 2.0 / 4.0 * 100.0);
        assert_eq!(snapshot.totals.rewards_distributed, 7.0);
        // Estimates: 5 × 10 + 2 × 5
        assert_eq!(snapshot.totals.total_deposited, 60.0);

        assert_eq!(snapshot.status.total, 2);
        assert_eq!(snapshot.status.active, 1);
        assert_eq!(snapshot.status.ended, 1);

        let a = snapshot.quests.iter().find(|q| q.id == "a").unwrap();
        assert_eq!(a.completion_rate, 1.0 / 3.0 * 100.0);

        let counts: Vec<u64> = snapshot.funnel.iter().map(|s| s.count).collect();
        assert_eq!(counts, vec![3, 4, 2, 2]);
    }

    #[test]
    fn nothing_started_means_zero_rate() {
        let snapshot = build_snapshot(
            "0xc0ffee",
            &config(),
            at(2025, 3, 10, 12),
            vec![data(quest("a", QuestStatus::Paused, 1.0, 1), vec![])],
        );
        assert_eq!(snapshot.totals.completion_rate, 0.0);
        assert_eq!(snapshot.quests[0].completion_rate, 0.0);
    }

    #[test]
    fn daily_participants_are_distinct_completers() {
        let now = at(2025, 3, 10, 12);
        let snapshot = build_snapshot(
            "0xc0ffee",
            &config(),
            now,
            vec![
                data(
                    quest("a", QuestStatus::Active, 1.0, 0),
                    vec![
                        completed("a", "0x01", 1.0, at(2025, 3, 9, 8)),
                        completed("a", "0x02", 1.0, at(2025, 3, 9, 9)),
                        started("a", "0x03", at(2025, 3, 9, 10)),
                    ],
                ),
                data(
                    quest("b", QuestStatus::Active, 3.0, 0),
                    vec![completed("b", "0x01", 3.0, at(2025, 3, 9, 11))],
                ),
            ],
        );

        assert_eq!(snapshot.time_series.len(), 14);
        assert_eq!(snapshot.time_series.first().unwrap().date, date(2025, 2, 25));
        assert_eq!(snapshot.time_series.last().unwrap().date, date(2025, 3, 10));

        let day = snapshot
            .time_series
            .iter()
            .find(|p| p.date == date(2025, 3, 9))
            .unwrap();
        assert_eq!(day.completions, 3);
        assert_eq!(day.participants, 2);
        assert_eq!(day.rewards, 5.0);

        let quiet: u64 = snapshot
            .time_series
            .iter()
            .filter(|p| p.date != date(2025, 3, 9))
            .map(|p| p.completions)
            .sum();
        assert_eq!(quiet, 0);
    }

    #[test]
    fn window_never_precedes_cutoff() {
        assert_eq!(window_days(date(2025, 1, 5), 14, date(2025, 1, 1)).len(), 5);
        assert_eq!(window_days(date(2025, 1, 5), 14, date(2024, 1, 1)).len(), 14);
        assert!(window_days(date(2024, 12, 31), 14, date(2025, 1, 1)).is_empty());
        assert!(window_days(date(2025, 1, 5), 0, date(2024, 1, 1)).is_empty());
    }

    #[test]
    fn records_before_cutoff_are_ignored() {
        let snapshot = build_snapshot(
            "0xc0ffee",
            &config(),
            at(2025, 3, 10, 12),
            vec![data(
                quest("a", QuestStatus::Active, 1.0, 0),
                vec![
                    completed("a", "0x01", 1.0, at(2024, 12, 31, 23)),
                    completed("a", "0x02", 1.0, at(2025, 1, 1, 0)),
                ],
            )],
        );
        assert_eq!(snapshot.totals.started, 1);
        assert_eq!(snapshot.top_participants.len(), 1);
        assert_eq!(snapshot.top_participants[0].address, "0x02");
    }

    #[test]
    fn started_before_cutoff_but_completed_after_counts() {
        let mut record = completed("a", "0x01", 2.0, at(2025, 1, 2, 9));
        record.started_at = at(2024, 12, 31, 23);

        let snapshot = build_snapshot(
            "0xc0ffee",
            &config(),
            at(2025, 1, 5, 12),
            vec![data(quest("a", QuestStatus::Active, 2.0, 0), vec![record])],
        );
        assert_eq!(snapshot.totals.started, 1);
        assert_eq!(snapshot.totals.completed, 1);
        assert_eq!(snapshot.totals.rewards_distributed, 2.0);
        assert_eq!(snapshot.top_participants[0].address, "0x01");

        let day = snapshot
            .time_series
            .iter()
            .find(|p| p.date == date(2025, 1, 2))
            .unwrap();
        assert_eq!(day.completions, 1);
        assert_eq!(day.participants, 1);
    }

    #[test]
    fn top_participants_ranking() {
        let day = at(2025, 3, 1, 0);
        let mut records = Vec::new();
        for (i, user) in ["0x0b", "0x0a", "0x0c", "0x0d"].iter().enumerate() {
            records.push(completed(&format!("q{}", i), user, 1.0, day));
        }
        // 0x0d completes twice
        records.push(completed("q9", "0x0d", 1.0, day));
        // 0x0c earns more for the same count
        records[2].reward_amount = 4.0;

        let snapshot = build_snapshot(
            "0xc0ffee",
            &AnalyticsConfig { top_n: 3, ..config() },
            at(2025, 3, 10, 12),
            vec![data(quest("x", QuestStatus::Active, 1.0, 0), records)],
        );

        let ranked: Vec<&str> = snapshot
            .top_participants
            .iter()
            .map(|p| p.address.as_str())
            .collect();
        assert_eq!(ranked, vec!["0x0d", "0x0c", "0x0a"]);
    }
}
