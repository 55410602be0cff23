use crate::infra::InMemoryNoticePublisher;
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use std::sync::Arc;
use std::time::{Duration as StdDuration, UNIX_EPOCH};
use trackline::error::AppError;
use trackline::workflows::tracks::{
    JoinRequest, MemberId, MemoryTrackStore, NewOrganization, NewSubmission, NewTrack,
    PeriodStandings, PeriodStartDay, ProofKind, ProofReference, ScoringRule, Track, TrackService,
    VerificationDecision, VerificationRequest,
};

type DemoService = TrackService<MemoryTrackStore, InMemoryNoticePublisher>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Print the standings after every simulated week instead of only the last
    #[arg(long)]
    pub(crate) weekly_standings: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct StandingsArgs {
    /// Rank the period containing this RFC 3339 instant (defaults to the final
    /// simulated week)
    #[arg(long, value_parser = crate::infra::parse_timestamp)]
    pub(crate) at: Option<DateTime<Utc>>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(MemoryTrackStore::default());
    let notices = Arc::new(InMemoryNoticePublisher::default());
    let service = TrackService::new(store, notices.clone());

    println!("Trackline season demo");

    let season = seed_season(&service)?;
    println!(
        "Track: {} (Monday periods, manual scoring 0..=100)",
        season.track.name
    );
    println!("Members: Avery rides a five-week streak, Blair starts in week three,");
    println!("and Casey loses week three to a rejected proof.");

    if args.weekly_standings {
        for (index, at) in season.weeks.iter().enumerate() {
            let standings = service.leaderboard(&season.track.id, *at)?;
            println!("\nWeek {} standings", index + 1);
            render_standings(&standings);
        }
    } else {
        let final_week = season.weeks.last().copied().unwrap_or_else(season_start);
        let standings = service.leaderboard(&season.track.id, final_week)?;
        println!("\nFinal week standings");
        render_standings(&standings);
    }

    println!("\nStreak profiles");
    for member in ["mem-avery", "mem-blair", "mem-casey"] {
        if let Some(membership) =
            service.membership_profile(&season.track.id, &MemberId(member.to_string()))?
        {
            println!(
                "- {}: current {} week(s), longest {}",
                membership.display_name, membership.streak.current, membership.streak.longest
            );
        }
    }

    let events = notices.events();
    println!("\nVerification notices dispatched: {}", events.len());

    Ok(())
}

pub(crate) fn run_standings(args: StandingsArgs) -> Result<(), AppError> {
    let store = Arc::new(MemoryTrackStore::default());
    let notices = Arc::new(InMemoryNoticePublisher::default());
    let service = TrackService::new(store, notices);

    let season = seed_season(&service)?;
    let at = args
        .at
        .unwrap_or_else(|| season.weeks.last().copied().unwrap_or_else(season_start));

    let standings = service.leaderboard(&season.track.id, at)?;
    println!("Track: {}", season.track.name);
    render_standings(&standings);
    Ok(())
}

struct SeededSeason {
    track: Track,
    weeks: Vec<DateTime<Utc>>,
}

fn coach() -> MemberId {
    MemberId("mem-coach".to_string())
}

/// Monday 2024-01-01 12:00 UTC.
fn season_start() -> DateTime<Utc> {
    (UNIX_EPOCH + StdDuration::from_secs(1_704_110_400)).into()
}

/// Runs a five-week season against a fresh service: three members with
/// different attendance patterns, every decision issued by the coach.
fn seed_season(service: &DemoService) -> Result<SeededSeason, AppError> {
    let start = season_start();
    let weeks: Vec<DateTime<Utc>> = (0..5).map(|n| start + Duration::days(7 * n)).collect();

    let org = service.create_organization(
        coach(),
        NewOrganization {
            name: "Riverside Run Collective".to_string(),
            admins: Vec::new(),
        },
        weeks[0],
    )?;
    let track = service.create_track(
        &org.id,
        &coach(),
        NewTrack {
            name: "5k Every Week".to_string(),
            period_start_day: PeriodStartDay::Monday,
            scoring: ScoringRule::Manual {
                min_score: 0,
                max_score: 100,
            },
            max_members: None,
        },
        weeks[0],
    )?;

    for (member, name) in [
        ("mem-avery", "Avery"),
        ("mem-blair", "Blair"),
        ("mem-casey", "Casey"),
    ] {
        service.join_track(
            &track.id,
            MemberId(member.to_string()),
            JoinRequest {
                display_name: name.to_string(),
            },
            weeks[0],
        )?;
    }

    // (member, week index, score, approved)
    let script: [(&str, usize, u32, bool); 13] = [
        ("mem-avery", 0, 18, true),
        ("mem-avery", 1, 20, true),
        ("mem-avery", 2, 22, true),
        ("mem-avery", 3, 19, true),
        ("mem-avery", 4, 20, true),
        ("mem-blair", 2, 15, true),
        ("mem-blair", 3, 15, true),
        ("mem-blair", 4, 15, true),
        ("mem-casey", 0, 20, true),
        ("mem-casey", 1, 21, true),
        ("mem-casey", 2, 0, false),
        ("mem-casey", 3, 21, true),
        ("mem-casey", 4, 21, true),
    ];

    for (member, week, score, approved) in script {
        let at = weeks[week];
        let submission = service.create_submission(
            &track.id,
            &MemberId(member.to_string()),
            NewSubmission {
                description: format!("Weekly 5k, week {}", week + 1),
                proof: ProofReference {
                    url: format!(
                        "https://proofs.example.com/{member}/week-{}.png",
                        week + 1
                    ),
                    kind: ProofKind::Image,
                },
            },
            at,
        )?;
        let request = if approved {
            VerificationRequest {
                decision: VerificationDecision::Approved,
                score: Some(score),
            }
        } else {
            VerificationRequest {
                decision: VerificationDecision::Rejected,
                score: None,
            }
        };
        service.verify(&submission.id, &coach(), request, at)?;
    }

    Ok(SeededSeason { track, weeks })
}

fn render_standings(standings: &PeriodStandings) {
    println!(
        "Period {} -> {}",
        standings.period_start.format("%Y-%m-%d"),
        standings.period_end.format("%Y-%m-%d")
    );
    if standings.entries.is_empty() {
        println!("No approved submissions this period");
        return;
    }
    for entry in &standings.entries {
        println!(
            "{:>2}. {:<8} base {:>3} x {:<4} = {:>6.2} (streak {}, longest {})",
            entry.rank,
            entry.display_name,
            entry.base_score,
            entry.multiplier,
            entry.total_score,
            entry.current_streak,
            entry.longest_streak
        );
    }
}
