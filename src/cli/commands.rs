use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "td", about = concat!("taskdeck v", env!("CARGO_PKG_VERSION"), " - tasks, subtasks, bulk edits"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different workspace directory
    #[arg(short = 'C', long = "workspace-dir", global = true)]
    pub workspace_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new workspace in the current directory
    Init(InitArgs),
    /// List top-level tasks with their subtasks
    List(ListArgs),
    /// Show task details
    Show(IdArg),
    /// Add a top-level task
    Add(AddArgs),
    /// Add one or more subtasks under a parent
    Sub(SubArgs),
    /// Change a task's dates
    Reschedule(RescheduleArgs),
    /// Mark tasks complete (subtasks included)
    Done(IdsArg),
    /// Mark tasks open again (subtasks included)
    Undone(IdsArg),
    /// Delete tasks and their subtasks
    Rm(IdsArg),
    /// List tags
    Tags,
    /// Create a tag
    TagNew(CatalogArgs),
    /// List groups
    Groups,
    /// Create a group
    GroupNew(GroupNewArgs),
    /// Show which fields a selection of tasks shares
    Analyze(SelectArgs),
    /// Edit several tasks at once
    Bulk(BulkArgs),
    /// Cluster tasks with the same priority, group and tags
    Similar,
    /// Report subtasks whose dates fall outside their parent's
    CheckDates,
    /// Show dated tasks day by day
    Calendar(CalendarArgs),
    /// Read or set a workspace setting
    Config(ConfigArgs),
}

// ---------------------------------------------------------------------------
// Shared args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct IdArg {
    /// Task ID
    pub id: String,
}

#[derive(Args)]
pub struct IdsArg {
    /// Task IDs
    #[arg(required = true)]
    pub ids: Vec<String>,
}

/// How to settle a subtask/parent date conflict without asking
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ResolveArg {
    /// Stretch the parent to cover the subtask
    Widen,
    /// Pull the subtask inside the parent
    Clamp,
    /// Save nothing
    Cancel,
}

/// Fields shared by `add` and `sub`
#[derive(Args)]
pub struct TaskFieldArgs {
    /// Description
    #[arg(short = 'd', long)]
    pub description: Option<String>,
    /// Priority (low, medium, high, urgent)
    #[arg(short = 'p', long)]
    pub priority: Option<String>,
    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,
    /// Due date (YYYY-MM-DD)
    #[arg(long)]
    pub due: Option<String>,
    /// Group ID
    #[arg(short = 'g', long)]
    pub group: Option<String>,
    /// Tag ID (repeatable)
    #[arg(short = 't', long = "tag")]
    pub tags: Vec<String>,
}

// ---------------------------------------------------------------------------
// Command args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Workspace name (default: inferred from directory name)
    #[arg(long)]
    pub name: Option<String>,
    /// Reinitialize even if taskdeck/ already exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ListArgs {
    /// Only tasks with this tag
    #[arg(long)]
    pub tag: Option<String>,
    /// Only tasks in this group
    #[arg(long)]
    pub group: Option<String>,
    /// Only open tasks
    #[arg(long, conflicts_with = "done")]
    pub open: bool,
    /// Only completed tasks
    #[arg(long)]
    pub done: bool,
    /// Regex matched against title and description
    #[arg(long)]
    pub search: Option<String>,
}

#[derive(Args)]
pub struct AddArgs {
    /// Task title
    pub title: String,
    #[command(flatten)]
    pub fields: TaskFieldArgs,
}

#[derive(Args)]
pub struct SubArgs {
    /// Parent task ID
    pub parent: String,
    /// Subtask titles; each becomes its own subtask
    #[arg(required = true)]
    pub titles: Vec<String>,
    #[command(flatten)]
    pub fields: TaskFieldArgs,
    /// Settle date conflicts without prompting
    #[arg(long, value_enum)]
    pub resolve: Option<ResolveArg>,
}

#[derive(Args)]
pub struct RescheduleArgs {
    /// Task ID
    pub id: String,
    /// New start date (YYYY-MM-DD, "" to clear)
    #[arg(long)]
    pub start: Option<String>,
    /// New due date (YYYY-MM-DD, "" to clear)
    #[arg(long)]
    pub due: Option<String>,
    /// Settle date conflicts without prompting
    #[arg(long, value_enum)]
    pub resolve: Option<ResolveArg>,
}

#[derive(Args)]
pub struct CatalogArgs {
    /// ID
    pub id: String,
    /// Display name
    pub name: String,
    /// Color as #rrggbb
    #[arg(long, default_value = "#888888")]
    pub color: String,
}

#[derive(Args)]
pub struct GroupNewArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,
    /// Description
    #[arg(short = 'd', long)]
    pub description: Option<String>,
}

/// Which tasks a bulk command works on: explicit IDs, or a filter over
/// top-level tasks
#[derive(Args)]
pub struct SelectArgs {
    /// Task IDs
    pub ids: Vec<String>,
    /// Select top-level tasks with this tag
    #[arg(long)]
    pub tag: Option<String>,
    /// Select top-level tasks in this group
    #[arg(long)]
    pub group: Option<String>,
}

#[derive(Args)]
pub struct BulkArgs {
    #[command(flatten)]
    pub select: SelectArgs,
    /// Set a field on every selected task: FIELD=VALUE (repeatable)
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    pub set: Vec<String>,
    /// Set a field on one task: ID:FIELD=VALUE (repeatable)
    #[arg(long = "each", value_name = "ID:FIELD=VALUE")]
    pub each: Vec<String>,
    /// Clear a field on every selected task (repeatable)
    #[arg(long = "clear", value_name = "FIELD")]
    pub clear: Vec<String>,
    /// Copy priority, group and tag edits onto subtasks
    #[arg(long, conflicts_with = "no_cascade")]
    pub cascade: bool,
    /// Leave subtasks alone even if the workspace cascades by default
    #[arg(long)]
    pub no_cascade: bool,
    /// Print the plan without writing
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct CalendarArgs {
    /// First day (YYYY-MM-DD, default: today)
    #[arg(long)]
    pub from: Option<String>,
    /// Number of days (default from config)
    #[arg(long)]
    pub days: Option<u32>,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Setting key, e.g. tree.max_depth (omit to show all)
    pub key: Option<String>,
    /// New value (omit to read)
    pub value: Option<String>,
}
