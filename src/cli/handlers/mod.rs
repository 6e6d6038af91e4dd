mod init;
pub use init::cmd_init;

use std::io::{BufReader, IsTerminal};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

/// Workspace directory override (set by -C)
static WORKSPACE_DIR_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::cli::prompt::{LinePrompt, NoTerminal};
use crate::io::config_io;
use crate::io::lock::FileLock;
use crate::io::store::{JsonStore, TaskStore};
use crate::io::workspace_io;
use crate::model::catalog::{Group, Tag};
use crate::model::field::{FieldMap, FieldName, FieldValue, parse_date};
use crate::model::task::{DateRange, NewTask, Priority, Task};
use crate::model::workspace::Workspace;
use crate::ops::apply::{apply_plan, set_completed_cascade};
use crate::ops::plan::{EditSession, build_update_plan};
use crate::ops::query::{TaskFilter, sort_tasks};
use crate::ops::resolve::{self, ConflictPrompt, FixedChoice, Resolution, SubtaskOutcome};
use crate::ops::{calendar, check, reconcile, similar, tree};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;

    if let Some(ref dir) = cli.workspace_dir {
        let abs = std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?;
        let _ = WORKSPACE_DIR_OVERRIDE.set(abs);
    }

    match cli.command {
        Commands::Init(args) => cmd_init(args),

        // Read commands
        Commands::List(args) => cmd_list(args, json),
        Commands::Show(args) => cmd_show(args, json),
        Commands::Tags => cmd_tags(json),
        Commands::Groups => cmd_groups(json),
        Commands::Analyze(args) => cmd_analyze(args, json),
        Commands::Similar => cmd_similar(json),
        Commands::CheckDates => cmd_check_dates(json),
        Commands::Calendar(args) => cmd_calendar(args, json),

        // Write commands
        Commands::Add(args) => cmd_add(args, json),
        Commands::Sub(args) => cmd_sub(args, json),
        Commands::Reschedule(args) => cmd_reschedule(args, json),
        Commands::Done(args) => cmd_set_completed(args, true, json),
        Commands::Undone(args) => cmd_set_completed(args, false, json),
        Commands::Rm(args) => cmd_rm(args, json),
        Commands::TagNew(args) => cmd_tag_new(args),
        Commands::GroupNew(args) => cmd_group_new(args),
        Commands::Bulk(args) => cmd_bulk(args, json),

        Commands::Config(args) => cmd_config(args, json),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Where discovery (and `init`) starts: the -C directory or the cwd.
fn start_dir() -> std::io::Result<PathBuf> {
    match WORKSPACE_DIR_OVERRIDE.get() {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir(),
    }
}

fn load_workspace_cwd() -> Result<Workspace, Box<dyn std::error::Error>> {
    let root = workspace_io::discover_workspace(&start_dir()?)?;
    Ok(workspace_io::load_workspace(&root)?)
}

/// Open the store for reading.
fn open_read() -> Result<(Workspace, JsonStore), Box<dyn std::error::Error>> {
    let workspace = load_workspace_cwd()?;
    let store = workspace_io::open_store(&workspace)?;
    Ok((workspace, store))
}

/// Take the workspace lock, then open the store, so the read is fresh.
fn open_write() -> Result<(Workspace, FileLock, JsonStore), Box<dyn std::error::Error>> {
    let workspace = load_workspace_cwd()?;
    let lock = FileLock::acquire_default(&workspace.data_dir)?;
    let store = workspace_io::open_store(&workspace)?;
    Ok((workspace, lock, store))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}

fn parse_opt_date(raw: Option<&str>) -> Result<Option<NaiveDate>, String> {
    raw.map(|s| parse_date(s.trim())).transpose()
}

/// Build a draft from the shared task flags.
fn draft_from(title: &str, fields: &TaskFieldArgs) -> Result<NewTask, Box<dyn std::error::Error>> {
    let priority = match fields.priority.as_deref() {
        Some(p) => Priority::from_str(p)?,
        None => Priority::default(),
    };
    Ok(NewTask {
        title: title.to_string(),
        description: fields.description.clone(),
        priority,
        start_date: parse_opt_date(fields.start.as_deref())?,
        due_date: parse_opt_date(fields.due.as_deref())?,
        group_id: fields.group.clone(),
        tags: fields
            .tags
            .iter()
            .map(|t| t.trim_start_matches('#').to_string())
            .collect(),
        parent_id: None,
    })
}

/// The confirmation surface for a date conflict: a flag answers without
/// asking; otherwise ask on the terminal, or cancel when stdin is piped.
fn conflict_prompt(flag: Option<ResolveArg>, requested: DateRange) -> Box<dyn ConflictPrompt> {
    let fixed = |r| Box::new(FixedChoice(r)) as Box<dyn ConflictPrompt>;
    match flag {
        Some(ResolveArg::Widen) => fixed(Resolution::WidenParent),
        Some(ResolveArg::Clamp) => fixed(Resolution::ClampSubtask),
        Some(ResolveArg::Cancel) => fixed(Resolution::Cancel),
        None if std::io::stdin().is_terminal() => {
            let mut prompt = LinePrompt::new(BufReader::new(std::io::stdin()), std::io::stderr());
            prompt.requested = requested;
            Box::new(prompt)
        }
        None => Box::new(NoTerminal),
    }
}

fn print_outcome(outcome: &SubtaskOutcome) {
    println!("{}", format_outcome(outcome));
    if let SubtaskOutcome::Cancelled { conflict } = outcome {
        for line in format_conflict(conflict).iter().skip(1) {
            println!("{}", line);
        }
    }
}

/// Resolve a bulk/analyze selection to tasks (with their subtrees).
fn select_tasks(
    forest: &[Task],
    args: &SelectArgs,
    max_depth: usize,
) -> Result<Vec<Task>, Box<dyn std::error::Error>> {
    if !args.ids.is_empty() {
        return args
            .ids
            .iter()
            .map(|id| {
                tree::find(forest, id, max_depth)
                    .cloned()
                    .ok_or_else(|| format!("task not found: {}", id).into())
            })
            .collect();
    }
    if args.tag.is_none() && args.group.is_none() {
        return Ok(Vec::new());
    }
    let filter = TaskFilter {
        tag: args.tag.clone(),
        group: args.group.clone(),
        ..Default::default()
    };
    Ok(filter.apply(forest).into_iter().cloned().collect())
}

/// Parse `FIELD=VALUE`.
fn parse_assignment(raw: &str) -> Result<(FieldName, FieldValue), Box<dyn std::error::Error>> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{}'", raw))?;
    let field: FieldName = name.trim().parse()?;
    Ok((field, field.parse_value(value)?))
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(args: ListArgs, json: bool) -> CmdResult {
    let (_, store) = open_read()?;
    let forest = store.snapshot();

    let completed = match (args.open, args.done) {
        (true, _) => Some(false),
        (_, true) => Some(true),
        _ => None,
    };
    let text = args
        .search
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(|e| format!("invalid --search regex: {}", e))?;
    let filter = TaskFilter {
        tag: args.tag,
        group: args.group,
        completed,
        text,
    };
    let mut tasks = filter.apply(&forest);
    sort_tasks(&mut tasks);

    if json {
        let out: Vec<TaskJson> = tasks.iter().map(|t| task_to_json(t)).collect();
        return print_json(&out);
    }
    for task in tasks {
        print_lines(&format_task_tree(task, 0));
    }
    Ok(())
}

fn cmd_show(args: IdArg, json: bool) -> CmdResult {
    let (_, store) = open_read()?;
    let task = store
        .get(&args.id)
        .ok_or_else(|| format!("task not found: {}", args.id))?;
    if json {
        return print_json(&task_to_json(&task));
    }
    print_lines(&format_task_detail(&task));
    Ok(())
}

fn cmd_tags(json: bool) -> CmdResult {
    let (_, store) = open_read()?;
    let tags = store.tags();
    if json {
        return print_json(&tags);
    }
    for tag in &tags {
        println!("{}", format_tag(tag));
    }
    Ok(())
}

fn cmd_groups(json: bool) -> CmdResult {
    let (_, store) = open_read()?;
    let groups = store.groups();
    if json {
        return print_json(&groups);
    }
    for group in &groups {
        println!("{}", format_group(group));
    }
    Ok(())
}

fn cmd_analyze(args: SelectArgs, json: bool) -> CmdResult {
    let (workspace, store) = open_read()?;
    let tasks = select_tasks(&store.snapshot(), &args, workspace.config.tree.max_depth)?;
    if tasks.is_empty() {
        return Err("select at least one task".into());
    }
    let analysis = reconcile::analyze_fields(&tasks);
    if json {
        return print_json(&analysis);
    }
    print_lines(&format_field_analysis(&analysis));
    Ok(())
}

fn cmd_similar(json: bool) -> CmdResult {
    let (_, store) = open_read()?;
    let report = similar::group_similar(&store.snapshot());
    if json {
        return print_json(&report);
    }
    print_lines(&format_similar(&report));
    Ok(())
}

fn cmd_check_dates(json: bool) -> CmdResult {
    let (workspace, store) = open_read()?;
    let result = check::check_dates(&store.snapshot(), workspace.config.tree.max_depth);
    if json {
        print_json(&result)?;
    } else {
        print_lines(&format_date_check(&result));
    }
    if !result.valid {
        return Err(format!("{} date conflict(s)", result.issues.len()).into());
    }
    Ok(())
}

fn cmd_calendar(args: CalendarArgs, json: bool) -> CmdResult {
    let (workspace, store) = open_read()?;
    let from = match parse_opt_date(args.from.as_deref())? {
        Some(d) => d,
        None => chrono::Local::now().date_naive(),
    };
    let days = args.days.unwrap_or(workspace.config.calendar.default_days);
    if days > calendar::MAX_DAYS {
        return Err(format!(
            "calendar window must be at most {} days, got {}",
            calendar::MAX_DAYS,
            days
        )
        .into());
    }
    let max_depth = workspace.config.tree.max_depth;
    let forest = store.snapshot();
    let view = calendar::calendar(&forest, from, days, max_depth);
    if json {
        return print_json(&view);
    }
    print_lines(&format_calendar(&view, &forest, max_depth));
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_add(args: AddArgs, json: bool) -> CmdResult {
    let draft = draft_from(&args.title, &args.fields)?;
    let (_, _lock, mut store) = open_write()?;
    let task = store.create_task(draft)?;
    if json {
        return print_json(&task);
    }
    println!("{}", task.id);
    Ok(())
}

fn cmd_sub(args: SubArgs, json: bool) -> CmdResult {
    let drafts = args
        .titles
        .iter()
        .map(|title| draft_from(title, &args.fields))
        .collect::<Result<Vec<_>, _>>()?;
    let requested = drafts.first().map(NewTask::dates).unwrap_or_default();

    let (_, _lock, mut store) = open_write()?;
    let mut prompt = conflict_prompt(args.resolve, requested);
    let outcomes = resolve::create_subtasks(&mut store, prompt.as_mut(), &args.parent, drafts)?;
    if json {
        return print_json(&outcomes);
    }
    for outcome in &outcomes {
        print_outcome(outcome);
    }
    Ok(())
}

fn cmd_reschedule(args: RescheduleArgs, json: bool) -> CmdResult {
    if args.start.is_none() && args.due.is_none() {
        return Err("nothing to change: pass --start and/or --due".into());
    }
    let (_, _lock, mut store) = open_write()?;
    let task = store
        .get(&args.id)
        .ok_or_else(|| format!("task not found: {}", args.id))?;

    // An omitted flag keeps the current bound; an empty one clears it
    let bound = |flag: &Option<String>, current: Option<NaiveDate>| match flag.as_deref() {
        None => Ok(current),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_date(s.trim()).map(Some),
    };
    let dates = DateRange::new(
        bound(&args.start, task.start_date)?,
        bound(&args.due, task.due_date)?,
    );

    if task.is_subtask() {
        let mut prompt = conflict_prompt(args.resolve, dates);
        let outcome = resolve::reschedule_subtask(&mut store, prompt.as_mut(), &task.id, dates)?;
        if json {
            return print_json(&outcome);
        }
        print_outcome(&outcome);
        return Ok(());
    }

    let mut patch = FieldMap::new();
    patch.insert(
        FieldName::StartDate,
        dates.start.map_or(FieldValue::Empty, FieldValue::Date),
    );
    patch.insert(
        FieldName::DueDate,
        dates.due.map_or(FieldValue::Empty, FieldValue::Date),
    );
    let updated = store.update_task(&task.id, &patch)?;
    if json {
        return print_json(&updated);
    }
    println!("{}", updated.id);
    Ok(())
}

fn cmd_set_completed(args: IdsArg, completed: bool, json: bool) -> CmdResult {
    let (workspace, _lock, mut store) = open_write()?;
    let mut ids = Vec::new();
    for id in &args.ids {
        ids.extend(set_completed_cascade(
            &mut store,
            id,
            completed,
            workspace.config.tree.max_depth,
        )?);
    }
    if json {
        return print_json(&IdsJson { ids });
    }
    print_lines(&ids);
    Ok(())
}

fn cmd_rm(args: IdsArg, json: bool) -> CmdResult {
    let (_, _lock, mut store) = open_write()?;
    let mut ids = Vec::new();
    for id in &args.ids {
        // An earlier id may already have taken this one with its subtree
        if ids.contains(id) {
            continue;
        }
        ids.extend(store.delete_task(id)?);
    }
    if json {
        return print_json(&IdsJson { ids });
    }
    print_lines(&ids);
    Ok(())
}

fn cmd_tag_new(args: CatalogArgs) -> CmdResult {
    let (_, _lock, mut store) = open_write()?;
    store.create_tag(Tag {
        id: args.id.clone(),
        name: args.name,
        color: args.color,
    })?;
    println!("{}", args.id);
    Ok(())
}

fn cmd_group_new(args: GroupNewArgs) -> CmdResult {
    let (_, _lock, mut store) = open_write()?;
    let id = args.catalog.id.clone();
    store.create_group(Group {
        id: args.catalog.id,
        name: args.catalog.name,
        color: args.catalog.color,
        description: args.description,
    })?;
    println!("{}", id);
    Ok(())
}

fn cmd_bulk(args: BulkArgs, json: bool) -> CmdResult {
    let (workspace, _lock, mut store) = open_write()?;
    let max_depth = workspace.config.tree.max_depth;
    let tasks = select_tasks(&store.snapshot(), &args.select, max_depth)?;

    let mut session = EditSession::new();
    session.max_depth = max_depth;
    session.cascade_to_subtasks = if args.cascade {
        true
    } else if args.no_cascade {
        false
    } else {
        workspace.config.bulk.cascade_to_subtasks
    };
    for raw in &args.set {
        let (field, value) = parse_assignment(raw)?;
        session.set_common(field, value);
    }
    for raw in &args.each {
        let (task_id, assignment) = raw
            .split_once(':')
            .ok_or_else(|| format!("expected ID:FIELD=VALUE, got '{}'", raw))?;
        let (field, value) = parse_assignment(assignment)?;
        session.set_individual(task_id.trim(), field, value);
    }
    for raw in &args.clear {
        let field: FieldName = raw.trim().parse()?;
        session.set_clear(field);
    }

    let plan = build_update_plan(&tasks, &session)?;
    if args.dry_run {
        if json {
            return print_json(&BulkJson {
                plan: &plan,
                report: None,
            });
        }
        print_lines(&format_plan(&plan));
        return Ok(());
    }

    let report = apply_plan(&mut store, &plan);
    if json {
        print_json(&BulkJson {
            plan: &plan,
            report: Some(&report),
        })?;
    } else {
        print_lines(&format_apply_report(&report));
    }
    if !report.is_success() {
        return Err(format!("{} task(s) not updated", report.failed.len()).into());
    }
    Ok(())
}

fn cmd_config(args: ConfigArgs, json: bool) -> CmdResult {
    let workspace = load_workspace_cwd()?;
    let Some(key) = args.key else {
        if json {
            return print_json(&workspace.config);
        }
        for key in config_io::settable_keys() {
            if let Some(value) = config_io::get_value(&workspace.config, key) {
                println!("{} = {}", key, value);
            }
        }
        return Ok(());
    };

    let Some(value) = args.value else {
        let value = config_io::get_value(&workspace.config, &key)
            .ok_or_else(|| format!("unknown config key: {}", key))?;
        println!("{}", value);
        return Ok(());
    };

    let _lock = FileLock::acquire_default(&workspace.data_dir)?;
    let (_, mut doc) = config_io::read_config(&workspace.data_dir)?;
    config_io::set_value(&mut doc, &key, &value)?;
    config_io::write_config(&workspace.data_dir, &doc)?;
    tracing::info!(%key, %value, "updated config");
    println!("{} = {}", key, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn forest() -> Vec<Task> {
        let mut a = Task::new("T-001", "Laundry");
        a.tags.insert("chores".into());
        let mut b = Task::new("T-002", "Dishes");
        b.group_id = Some("home".into());
        let mut sub = Task::new("T-002.1", "Dry");
        sub.parent_id = Some("T-002".into());
        b.subtasks.push(sub);
        vec![a, b]
    }

    fn select(ids: &[&str], tag: Option<&str>, group: Option<&str>) -> SelectArgs {
        SelectArgs {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            tag: tag.map(str::to_string),
            group: group.map(str::to_string),
        }
    }

    fn ids(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_select_by_ids_reaches_subtasks() {
        let tasks = select_tasks(&forest(), &select(&["T-002.1", "T-001"], None, None), 2).unwrap();
        assert_eq!(ids(&tasks), vec!["T-002.1", "T-001"]);
        assert!(select_tasks(&forest(), &select(&["T-009"], None, None), 2).is_err());
    }

    #[test]
    fn test_select_by_filter() {
        let by_tag = select_tasks(&forest(), &select(&[], Some("chores"), None), 2).unwrap();
        assert_eq!(ids(&by_tag), vec!["T-001"]);
        let by_group = select_tasks(&forest(), &select(&[], None, Some("home")), 2).unwrap();
        assert_eq!(ids(&by_group), vec!["T-002"]);
        assert!(select_tasks(&forest(), &select(&[], None, None), 2).unwrap().is_empty());
    }

    #[test]
    fn test_parse_assignment() {
        let (field, value) = parse_assignment("due=2024-01-20").unwrap();
        assert_eq!(field, FieldName::DueDate);
        assert_eq!(value, FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, 20).unwrap()));

        let (field, value) = parse_assignment("title=a=b").unwrap();
        assert_eq!(field, FieldName::Title);
        assert_eq!(value, FieldValue::Text("a=b".into()));

        assert!(parse_assignment("priority").is_err());
        assert!(parse_assignment("colour=red").is_err());
        assert!(parse_assignment("priority=someday").is_err());
    }

    #[test]
    fn test_draft_from_flags() {
        let fields = TaskFieldArgs {
            description: None,
            priority: Some("urgent".into()),
            start: Some("2024-01-02".into()),
            due: None,
            group: None,
            tags: vec!["#diy".into()],
        };
        let draft = draft_from("Paint", &fields).unwrap();
        assert_eq!(draft.priority, Priority::Urgent);
        assert_eq!(draft.start_date, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert!(draft.tags.contains("diy"));

        let bad = TaskFieldArgs {
            due: Some("tomorrow".into()),
            ..fields
        };
        assert!(draft_from("Paint", &bad).is_err());
    }
}
