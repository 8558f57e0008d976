//! Rank command for showing a group's standings over one or more logical days.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use pp_core::{DateSpan, GroupId, PetRanking, ScoringEngine};
use pp_db::Database;
use serde::Serialize;

use super::util::{parse_date, today_for, truncate, viewer};
use crate::{Config, RankArgs};

/// Rank with a trailing `=` when shared with another pet.
pub fn rank_label(ranking: &PetRanking) -> String {
    if ranking.is_tied {
        format!("{}=", ranking.rank)
    } else {
        ranking.rank.to_string()
    }
}

/// Format a period for headings.
fn describe_span(span: DateSpan) -> String {
    if span.start == span.end {
        span.end.to_string()
    } else {
        format!("{} to {}", span.start, span.end)
    }
}

/// Format rankings for human-readable output.
pub fn format_rankings<W: Write>(
    writer: &mut W,
    group_id: &GroupId,
    span: DateSpan,
    rankings: &[PetRanking],
) -> Result<()> {
    writeln!(writer, "Rankings for {group_id}, {}", describe_span(span))?;
    writeln!(writer)?;

    if rankings.is_empty() {
        writeln!(writer, "No scores in this period.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<4}  {:<12}  {:<12}  {:>6}  {:>5}  {:>4}  {:>3}  Last activity",
        "Rank", "Pet", "Owner", "Points", "Today", "Good", "Bad"
    )?;
    writeln!(
        writer,
        "────  ────────────  ────────────  ──────  ─────  ────  ───  ────────────────"
    )?;
    for ranking in rankings {
        let last_activity = ranking.last_activity_at.map_or_else(
            || "-".to_string(),
            |at| at.format("%Y-%m-%d %H:%M").to_string(),
        );
        writeln!(
            writer,
            "{:<4}  {:<12}  {:<12}  {:>+6}  {:>+5}  {:>4}  {:>3}  {}",
            rank_label(ranking),
            truncate(&ranking.pet_name, 12),
            truncate(&ranking.owner_name, 12),
            ranking.total_points,
            ranking.today_points,
            ranking.positive_behaviors,
            ranking.negative_behaviors,
            last_activity,
        )?;
    }

    Ok(())
}

/// JSON output structure.
#[derive(Debug, Serialize)]
pub struct JsonRankings<'a> {
    pub group_id: &'a GroupId,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub today: NaiveDate,
    pub rankings: &'a [PetRanking],
}

/// Runs `pp rank`.
pub fn run<W: Write>(
    writer: &mut W,
    engine: &ScoringEngine<Database>,
    args: &RankArgs,
    config: &Config,
) -> Result<()> {
    run_at(writer, engine, args, config, Utc::now())
}

pub fn run_at<W: Write>(
    writer: &mut W,
    engine: &ScoringEngine<Database>,
    args: &RankArgs,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<()> {
    let viewer = viewer(args.user.user.as_deref(), config)?;
    let today = today_for(engine, viewer.as_ref(), now)?;
    let end = args.date.as_deref().map(parse_date).transpose()?.unwrap_or(today);
    let span = DateSpan::ending(end, args.days);

    let rankings = engine.rankings(&args.group, span, today)?;

    if args.json {
        let output = JsonRankings {
            group_id: &args.group,
            start: span.start,
            end: span.end,
            today,
            rankings: &rankings,
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
        return Ok(());
    }

    format_rankings(writer, &args.group, span, &rankings)
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, TimeZone};
    use insta::assert_snapshot;
    use pp_core::{
        BehaviorCategory, BehaviorDraft, BehaviorId, PetId, RecordBehavior, Species, UserId,
    };

    use crate::UserArg;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap()
    }

    fn draft(name: &str, points: i32) -> BehaviorDraft {
        BehaviorDraft {
            name: name.to_string(),
            category: BehaviorCategory::Training,
            point_value: points,
            min_interval_minutes: 5,
            species: Species::Both,
            active: true,
        }
    }

    /// Rex and Tom tie on points and bad behavior; Whiskers trails.
    fn engine() -> ScoringEngine<Database> {
        let mut db = Database::open_in_memory().unwrap();
        let alice = UserId::new("alice").unwrap();
        let family = GroupId::new("family").unwrap();
        db.add_group(&family, "Family", now()).unwrap();
        db.grant_group_access(&alice, &family).unwrap();
        for (id, name, species) in [
            ("rex", "Rex", Species::Dog),
            ("tom", "Tom", Species::Dog),
            ("whiskers", "Whiskers", Species::Cat),
        ] {
            let pet = PetId::new(id).unwrap();
            db.add_pet(&pet, name, species, &alice, "Alice").unwrap();
            db.add_member(&family, &pet).unwrap();
        }

        let mut engine = ScoringEngine::new(db);
        engine
            .add_behavior(BehaviorId::new("sit").unwrap(), draft("Sit", 5))
            .unwrap();
        engine
            .add_behavior(BehaviorId::new("chewed").unwrap(), draft("Chewed", -2))
            .unwrap();

        let log = |engine: &mut ScoringEngine<Database>, pet: &str, behavior: &str, ago: i64| {
            let request = RecordBehavior::new(
                PetId::new(pet).unwrap(),
                BehaviorId::new(behavior).unwrap(),
                alice.clone(),
            )
            .in_groups([family.clone()])
            .at(now() - Duration::minutes(ago));
            engine.record_behavior_at(request, now()).unwrap();
        };
        log(&mut engine, "rex", "sit", 60);
        log(&mut engine, "rex", "chewed", 50);
        log(&mut engine, "tom", "sit", 40);
        log(&mut engine, "tom", "chewed", 30);
        log(&mut engine, "whiskers", "sit", 20);
        log(&mut engine, "whiskers", "chewed", 10);
        log(&mut engine, "whiskers", "chewed", 0);
        engine
    }

    fn args(date: Option<&str>, days: u32, json: bool) -> RankArgs {
        RankArgs {
            group: GroupId::new("family").unwrap(),
            date: date.map(str::to_string),
            days,
            user: UserArg::default(),
            json,
        }
    }

    #[test]
    fn ranks_todays_scores_with_ties() {
        let engine = engine();
        let mut output = Vec::new();
        run_at(&mut output, &engine, &args(None, 1, false), &Config::default(), now()).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Rankings for family, 2025-06-11

        Rank  Pet           Owner         Points  Today  Good  Bad  Last activity
        ────  ────────────  ────────────  ──────  ─────  ────  ───  ────────────────
        1=    Rex           Alice             +3     +3     1    1  2025-06-10 11:10
        1=    Tom           Alice             +3     +3     1    1  2025-06-10 11:30
        3     Whiskers      Alice             +1     +1     1    2  2025-06-10 12:00
        ");
    }

    #[test]
    fn earlier_days_have_no_scores() {
        let engine = engine();
        let mut output = Vec::new();
        let args = args(Some("2025-06-10"), 1, false);
        run_at(&mut output, &engine, &args, &Config::default(), now()).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Rankings for family, 2025-06-10

        No scores in this period.
        ");
    }

    #[test]
    fn multi_day_period_in_json() {
        let engine = engine();
        let mut output = Vec::new();
        let args = args(Some("2025-06-12"), 3, true);
        run_at(&mut output, &engine, &args, &Config::default(), now()).unwrap();

        let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(parsed["start"], "2025-06-10");
        assert_eq!(parsed["end"], "2025-06-12");
        assert_eq!(parsed["today"], "2025-06-11");
        let rankings = parsed["rankings"].as_array().unwrap();
        assert_eq!(rankings.len(), 3);
        assert_eq!(rankings[0]["pet_id"], "rex");
        assert_eq!(rankings[0]["is_tied"], true);
        assert_eq!(rankings[2]["rank"], 3);
        assert_eq!(rankings[2]["today_points"], 1);
    }

    #[test]
    fn unknown_group_is_an_error() {
        let engine = engine();
        let mut output = Vec::new();
        let mut args = args(None, 1, false);
        args.group = GroupId::new("nope").unwrap();
        let err = run_at(&mut output, &engine, &args, &Config::default(), now()).unwrap_err();
        assert_eq!(err.to_string(), "group nope not found");
    }
}
