use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};
use planner_core::types::parse_label;
use planner_core::*;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "wplan")]
#[command(about = "Multi-user workout planner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bearer token, resolved through the configured token table
    #[arg(long, global = true)]
    token: Option<String>,

    /// Act as this user id (local use; ignored when --token is given)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Reference date for status derivation (defaults to the local date)
    #[arg(long, global = true)]
    today: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Plans: create, list, share with coaches
    #[command(subcommand)]
    Plan(PlanCommand),

    /// Weeks of a plan
    #[command(subcommand)]
    Week(WeekCommand),

    /// Calendar days
    #[command(subcommand)]
    Day(DayCommand),

    /// Training sessions (up to three per day)
    #[command(subcommand)]
    Session(SessionCommand),

    /// Lettered moveframes of a session
    #[command(subcommand)]
    Moveframe(MoveframeCommand),

    /// Repetition rows of a moveframe
    #[command(subcommand)]
    Movelap(MovelapCommand),

    /// Per-sport distance and time summaries
    #[command(subcommand)]
    Totals(TotalsCommand),
}

#[derive(Subcommand)]
enum PlanCommand {
    /// Plans you own or coach
    List,
    Create {
        #[arg(long)]
        name: String,
        /// template-weeks, yearly-plan, workouts-done, archive
        #[arg(long = "type", value_parser = parse_label::<PlanType>)]
        plan_type: PlanType,
    },
    Show {
        id: String,
    },
    Rename {
        id: String,
        #[arg(long)]
        name: String,
    },
    Delete {
        id: String,
    },
    /// Give a coach write access
    Grant {
        id: String,
        #[arg(long)]
        coach: String,
    },
    Revoke {
        id: String,
        #[arg(long)]
        coach: String,
    },
    /// Re-derive planned statuses against --today
    Refresh {
        id: String,
    },
}

#[derive(Args)]
struct WeekFields {
    #[arg(long)]
    period: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

impl From<WeekFields> for NewWeek {
    fn from(fields: WeekFields) -> Self {
        NewWeek {
            period_id: fields.period,
            notes: fields.notes,
        }
    }
}

#[derive(Subcommand)]
enum WeekCommand {
    Add {
        plan: String,
        #[command(flatten)]
        fields: WeekFields,
    },
    Show {
        id: String,
    },
    Update {
        id: String,
        #[command(flatten)]
        fields: WeekFields,
    },
    Delete {
        id: String,
    },
    /// Copy a week to the end of a plan, shifting its dates
    Copy {
        id: String,
        #[arg(long)]
        to_plan: String,
        #[arg(long, default_value_t = 7, allow_hyphen_values = true)]
        shift_days: i64,
    },
    /// Move a week to a 1-based position in its plan
    Move {
        id: String,
        #[arg(long)]
        position: u32,
    },
}

#[derive(Args)]
struct DayFields {
    #[arg(long)]
    period: Option<String>,
    #[arg(long)]
    weather: Option<String>,
    #[arg(long)]
    feeling: Option<u8>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Subcommand)]
enum DayCommand {
    Add {
        week: String,
        #[arg(long)]
        date: NaiveDate,
        #[command(flatten)]
        fields: DayFields,
    },
    Show {
        id: String,
    },
    Update {
        id: String,
        #[command(flatten)]
        fields: DayFields,
    },
    Delete {
        id: String,
    },
    /// Deep copy with execution state reset
    Copy {
        id: String,
        #[arg(long)]
        to_week: String,
        #[arg(long)]
        date: NaiveDate,
    },
    Move {
        id: String,
        #[arg(long)]
        to_week: String,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Copy into an athlete's week with statuses derived from the date
    Assign {
        id: String,
        #[arg(long)]
        to_week: String,
        #[arg(long)]
        date: NaiveDate,
    },
}

#[derive(Args)]
struct SessionFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    code: Option<String>,
    /// Start time, HH:MM:SS
    #[arg(long)]
    time: Option<NaiveTime>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long, value_parser = parse_label::<SessionStatus>)]
    status: Option<SessionStatus>,
}

#[derive(Subcommand)]
enum SessionCommand {
    Add {
        day: String,
        #[command(flatten)]
        fields: SessionFields,
    },
    Show {
        id: String,
    },
    Update {
        id: String,
        #[command(flatten)]
        fields: SessionFields,
    },
    /// Report completion
    Complete {
        id: String,
        #[arg(long, allow_hyphen_values = true)]
        percentage: i32,
        #[arg(long)]
        as_different: bool,
        #[arg(long)]
        hr_max: Option<u16>,
        #[arg(long)]
        hr_avg: Option<u16>,
        #[arg(long)]
        calories: Option<u32>,
        #[arg(long)]
        feeling: Option<u8>,
        #[arg(long)]
        notes: Option<String>,
    },
    Delete {
        id: String,
    },
    Copy {
        id: String,
        #[arg(long)]
        to_day: String,
    },
    Move {
        id: String,
        #[arg(long)]
        to_day: String,
        /// Zero-based slot in the destination day
        #[arg(long)]
        index: Option<usize>,
    },
    /// Exchange the days of two sessions
    Switch {
        first: String,
        second: String,
    },
    /// Renumber a day's sessions in the listed order
    Reorder {
        day: String,
        #[arg(required = true)]
        order: Vec<String>,
        #[arg(long)]
        expected_version: Option<u64>,
    },
}

#[derive(Args)]
struct LapFields {
    #[arg(long)]
    distance: Option<u32>,
    #[arg(long)]
    speed: Option<String>,
    /// Target time in seconds
    #[arg(long)]
    time: Option<u32>,
    /// Pause after the repetition, in seconds
    #[arg(long)]
    pause: Option<u32>,
    #[arg(long, value_parser = parse_label::<RestType>)]
    rest: Option<RestType>,
    #[arg(long)]
    alarm: Option<u32>,
    #[arg(long)]
    sound: Option<String>,
    #[arg(long)]
    lap_notes: Option<String>,
}

impl From<LapFields> for NewMovelap {
    fn from(fields: LapFields) -> Self {
        NewMovelap {
            distance_m: fields.distance,
            speed: fields.speed,
            time_seconds: fields.time,
            pause_seconds: fields.pause,
            rest_type: fields.rest,
            alarm_seconds: fields.alarm,
            sound: fields.sound,
            notes: fields.lap_notes,
        }
    }
}

#[derive(Args)]
struct PlacementArgs {
    #[arg(long, conflicts_with_all = ["after", "replace"])]
    before: Option<String>,
    #[arg(long, conflicts_with_all = ["before", "replace"])]
    after: Option<String>,
    #[arg(long, conflicts_with_all = ["before", "after"])]
    replace: Option<String>,
}

impl From<PlacementArgs> for Placement {
    fn from(args: PlacementArgs) -> Self {
        match (args.before, args.after, args.replace) {
            (Some(target), _, _) => Placement::Before(target),
            (_, Some(target), _) => Placement::After(target),
            (_, _, Some(target)) => Placement::Replace(target),
            _ => Placement::Append,
        }
    }
}

#[derive(Subcommand)]
enum MoveframeCommand {
    Add {
        session: String,
        #[arg(long, value_parser = parse_label::<Sport>)]
        sport: Sport,
        #[arg(long, value_parser = parse_label::<MoveframeType>)]
        kind: Option<MoveframeType>,
        #[arg(long, value_parser = parse_label::<WorkType>)]
        role: Option<WorkType>,
        #[arg(long)]
        section: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Number of identical repetitions to create
        #[arg(long, default_value_t = 0)]
        reps: u32,
        #[command(flatten)]
        lap: LapFields,
    },
    Show {
        id: String,
    },
    Update {
        id: String,
        #[arg(long, value_parser = parse_label::<Sport>)]
        sport: Option<Sport>,
        #[arg(long, value_parser = parse_label::<MoveframeType>)]
        kind: Option<MoveframeType>,
        #[arg(long)]
        section: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Rewrite the movelaps as this many identical repetitions
        #[arg(long)]
        reps: Option<u32>,
        #[command(flatten)]
        lap: LapFields,
    },
    Delete {
        id: String,
    },
    /// Set MAIN, SECONDARY, or NONE
    Role {
        id: String,
        #[arg(value_parser = parse_label::<WorkType>)]
        role: WorkType,
    },
    Copy {
        id: String,
        #[arg(long)]
        to_session: String,
        #[command(flatten)]
        placement: PlacementArgs,
    },
    Move {
        id: String,
        #[arg(long)]
        to_session: String,
        /// Zero-based slot; takes precedence over --before/--after/--replace
        #[arg(long)]
        index: Option<usize>,
        #[command(flatten)]
        placement: PlacementArgs,
    },
    /// Append a copy to a session (its own by default)
    Duplicate {
        id: String,
        #[arg(long)]
        to_session: Option<String>,
    },
    /// Re-letter a session's moveframes in the listed order
    Reorder {
        session: String,
        #[arg(required = true)]
        order: Vec<String>,
        #[arg(long)]
        expected_version: Option<u64>,
    },
}

#[derive(Subcommand)]
enum MovelapCommand {
    Add {
        moveframe: String,
        /// Zero-based insert position (append by default)
        #[arg(long)]
        position: Option<usize>,
        #[command(flatten)]
        lap: LapFields,
    },
    Show {
        id: String,
    },
    Update {
        id: String,
        #[command(flatten)]
        lap: LapFields,
    },
    Status {
        id: String,
        #[arg(value_parser = parse_label::<MovelapStatus>)]
        status: MovelapStatus,
    },
    Flags {
        id: String,
        #[arg(long)]
        skipped: Option<bool>,
        #[arg(long)]
        disabled: Option<bool>,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
enum TotalsCommand {
    Day { id: String },
    Week { id: String },
}

fn main() -> ExitCode {
    // Initialize logging
    planner_core::logging::init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(exit_code(e.kind()))
        }
    }
}

fn exit_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::ValidationFailed | ErrorKind::CapacityExceeded | ErrorKind::Conflict => 2,
        ErrorKind::NotFound | ErrorKind::Unauthorized => 3,
        ErrorKind::Internal => 1,
    }
}

fn resolve_actor(token: Option<&str>, user: Option<&str>, config: &Config) -> Result<String> {
    if let Some(token) = token {
        return StaticTokens::from_config(&config.identity).resolve(token);
    }
    if let Some(user) = user {
        return Ok(user.to_string());
    }
    config.identity.default_user.clone().ok_or_else(|| {
        Error::Unauthorized("No identity: pass --token or --user, or set identity.default_user".into())
    })
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn deleted(id: &str) -> Result<()> {
    emit(&serde_json::json!({ "deleted": id }))
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(data_dir) = cli.data_dir {
        config.data.data_dir = data_dir;
    }

    let actor = resolve_actor(cli.token.as_deref(), cli.user.as_deref(), &config)?;
    let today = cli
        .today
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    tracing::debug!("Acting as {} (today = {})", actor, today);

    let store = FileStore::new(config.store_path());
    tracing::debug!("Plan store at {:?}", store.path());
    let mut planner = Planner::new(store, actor, today);
    if config.journal.enabled {
        planner = planner.with_journal(Box::new(JsonlJournal::new(config.journal_path())));
    }

    match cli.command {
        Commands::Plan(command) => cmd_plan(&mut planner, command),
        Commands::Week(command) => cmd_week(&mut planner, command),
        Commands::Day(command) => cmd_day(&mut planner, command),
        Commands::Session(command) => cmd_session(&mut planner, command),
        Commands::Moveframe(command) => cmd_moveframe(&mut planner, command),
        Commands::Movelap(command) => cmd_movelap(&mut planner, command),
        Commands::Totals(command) => cmd_totals(&planner, command),
    }
}

type CliPlanner = Planner<FileStore>;

fn cmd_plan(planner: &mut CliPlanner, command: PlanCommand) -> Result<()> {
    match command {
        PlanCommand::List => emit(&planner.plans()?),
        PlanCommand::Create { name, plan_type } => emit(&planner.create_plan(&name, plan_type)?),
        PlanCommand::Show { id } => emit(&planner.plan(&id)?),
        PlanCommand::Rename { id, name } => emit(&planner.rename_plan(&id, &name)?),
        PlanCommand::Delete { id } => {
            planner.delete_plan(&id)?;
            deleted(&id)
        }
        PlanCommand::Grant { id, coach } => emit(&planner.grant_coach(&id, &coach)?),
        PlanCommand::Revoke { id, coach } => emit(&planner.revoke_coach(&id, &coach)?),
        PlanCommand::Refresh { id } => {
            let changed = planner.refresh_statuses(&id)?;
            emit(&serde_json::json!({ "plan": id, "changed": changed }))
        }
    }
}

fn cmd_week(planner: &mut CliPlanner, command: WeekCommand) -> Result<()> {
    match command {
        WeekCommand::Add { plan, fields } => emit(&planner.add_week(&plan, fields.into())?),
        WeekCommand::Show { id } => emit(&planner.week(&id)?),
        WeekCommand::Update { id, fields } => emit(&planner.update_week(&id, fields.into())?),
        WeekCommand::Delete { id } => {
            planner.delete_week(&id)?;
            deleted(&id)
        }
        WeekCommand::Copy {
            id,
            to_plan,
            shift_days,
        } => emit(&planner.copy_week(&id, &to_plan, shift_days)?),
        WeekCommand::Move { id, position } => emit(&planner.move_week(&id, position)?),
    }
}

fn cmd_day(planner: &mut CliPlanner, command: DayCommand) -> Result<()> {
    match command {
        DayCommand::Add { week, date, fields } => {
            let input = NewDay {
                date,
                period_id: fields.period,
                weather: fields.weather,
                feeling: fields.feeling,
                notes: fields.notes,
            };
            emit(&planner.add_day(&week, input)?)
        }
        DayCommand::Show { id } => emit(&planner.day(&id)?),
        DayCommand::Update { id, fields } => {
            let patch = DayPatch {
                period_id: fields.period,
                weather: fields.weather,
                feeling: fields.feeling,
                notes: fields.notes,
            };
            emit(&planner.update_day(&id, patch)?)
        }
        DayCommand::Delete { id } => {
            planner.delete_day(&id)?;
            deleted(&id)
        }
        DayCommand::Copy { id, to_week, date } => emit(&planner.copy_day(&id, &to_week, date)?),
        DayCommand::Move { id, to_week, date } => emit(&planner.move_day(&id, &to_week, date)?),
        DayCommand::Assign { id, to_week, date } => {
            emit(&planner.assign_day(&id, &to_week, date)?)
        }
    }
}

fn cmd_session(planner: &mut CliPlanner, command: SessionCommand) -> Result<()> {
    match command {
        SessionCommand::Add { day, fields } => {
            let input = NewSession {
                name: fields.name,
                code: fields.code,
                time: fields.time,
                location: fields.location,
                notes: fields.notes,
                status: fields.status,
            };
            emit(&planner.add_session(&day, input)?)
        }
        SessionCommand::Show { id } => emit(&planner.session(&id)?),
        SessionCommand::Update { id, fields } => {
            let patch = SessionPatch {
                name: fields.name,
                code: fields.code,
                time: fields.time,
                location: fields.location,
                notes: fields.notes,
                status: fields.status,
            };
            emit(&planner.update_session(&id, patch)?)
        }
        SessionCommand::Complete {
            id,
            percentage,
            as_different,
            hr_max,
            hr_avg,
            calories,
            feeling,
            notes,
        } => {
            let report = CompletionReport {
                percentage,
                as_different,
                heart_rate_max: hr_max,
                heart_rate_avg: hr_avg,
                calories,
                feeling,
                notes,
            };
            emit(&planner.complete_session(&id, &report)?)
        }
        SessionCommand::Delete { id } => {
            planner.delete_session(&id)?;
            deleted(&id)
        }
        SessionCommand::Copy { id, to_day } => emit(&planner.copy_session(&id, &to_day)?),
        SessionCommand::Move { id, to_day, index } => match index {
            Some(index) => emit(&planner.move_session_to_index(&id, &to_day, index)?),
            None => emit(&planner.move_session(&id, &to_day)?),
        },
        SessionCommand::Switch { first, second } => {
            emit(&planner.switch_sessions(&first, &second)?)
        }
        SessionCommand::Reorder {
            day,
            order,
            expected_version,
        } => emit(&planner.reorder_sessions(&day, &order, expected_version)?),
    }
}

fn repeated_laps(reps: u32, lap: LapFields) -> Vec<NewMovelap> {
    let template = NewMovelap::from(lap);
    vec![template; reps as usize]
}

fn cmd_moveframe(planner: &mut CliPlanner, command: MoveframeCommand) -> Result<()> {
    match command {
        MoveframeCommand::Add {
            session,
            sport,
            kind,
            role,
            section,
            description,
            reps,
            lap,
        } => {
            let mut input = NewMoveframe::of(sport);
            input.kind = kind.unwrap_or_default();
            input.work_type = role.unwrap_or_default();
            input.section_id = section;
            input.description = description;
            input.movelaps = repeated_laps(reps, lap);
            emit(&planner.add_moveframe(&session, input)?)
        }
        MoveframeCommand::Show { id } => emit(&planner.moveframe(&id)?),
        MoveframeCommand::Update {
            id,
            sport,
            kind,
            section,
            description,
            reps,
            lap,
        } => {
            let patch = MoveframePatch {
                sport,
                kind,
                section_id: section,
                description,
                movelaps: reps.map(|reps| repeated_laps(reps, lap)),
            };
            emit(&planner.update_moveframe(&id, patch)?)
        }
        MoveframeCommand::Delete { id } => {
            planner.delete_moveframe(&id)?;
            deleted(&id)
        }
        MoveframeCommand::Role { id, role } => emit(&planner.set_work_type(&id, role)?),
        MoveframeCommand::Copy {
            id,
            to_session,
            placement,
        } => emit(&planner.copy_moveframe(&id, &to_session, placement.into())?),
        MoveframeCommand::Move {
            id,
            to_session,
            index,
            placement,
        } => match index {
            Some(index) => emit(&planner.move_moveframe_to_index(&id, &to_session, index)?),
            None => emit(&planner.move_moveframe(&id, &to_session, placement.into())?),
        },
        MoveframeCommand::Duplicate { id, to_session } => {
            emit(&planner.duplicate_moveframe(&id, to_session.as_deref())?)
        }
        MoveframeCommand::Reorder {
            session,
            order,
            expected_version,
        } => emit(&planner.reorder_moveframes(&session, &order, expected_version)?),
    }
}

fn cmd_movelap(planner: &mut CliPlanner, command: MovelapCommand) -> Result<()> {
    match command {
        MovelapCommand::Add {
            moveframe,
            position,
            lap,
        } => emit(&planner.add_movelap(&moveframe, lap.into(), position)?),
        MovelapCommand::Show { id } => emit(&planner.movelap(&id)?),
        MovelapCommand::Update { id, lap } => emit(&planner.update_movelap(&id, lap.into())?),
        MovelapCommand::Status { id, status } => emit(&planner.set_movelap_status(&id, status)?),
        MovelapCommand::Flags {
            id,
            skipped,
            disabled,
        } => emit(&planner.set_movelap_flags(&id, skipped, disabled)?),
        MovelapCommand::Delete { id } => {
            planner.delete_movelap(&id)?;
            deleted(&id)
        }
    }
}

fn cmd_totals(planner: &CliPlanner, command: TotalsCommand) -> Result<()> {
    match command {
        TotalsCommand::Day { id } => emit(&planner.day_totals(&id)?),
        TotalsCommand::Week { id } => emit(&planner.week_totals(&id)?),
    }
}
