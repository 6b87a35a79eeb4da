use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::PathBuf;

use threadstate_rs::app::{Application, RunContext, UnitOfWork, WorkingState};
use threadstate_rs::config::StoreConfig;
use threadstate_rs::state::{DeclaredType, FieldDecl, Model, ModelSchema, StateModel};
use threadstate_rs::thread;

#[derive(Parser, Debug)]
#[command(author, version, about = "To-do list persisted in thread metadata", long_about = None)]
struct Args {
    /// Store configuration file (YAML); defaults to environment variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new thread
    Create,
    /// Print the stored to-do list
    Show {
        #[arg(short, long)]
        thread: String,
    },
    /// Add a task
    Add {
        #[arg(short, long)]
        thread: String,

        /// What needs doing
        #[arg(short, long)]
        description: String,

        /// Due date (RFC 3339), defaults to one day from now
        #[arg(long)]
        due: Option<DateTime<Utc>>,
    },
    /// Mark a task as done
    Done {
        #[arg(short, long)]
        thread: String,

        /// Position of the task as printed by `show`
        #[arg(short, long)]
        index: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Task {
    description: String,
    due: DateTime<Utc>,
    done: bool,
}

impl Model for Task {
    fn schema() -> &'static ModelSchema {
        static SCHEMA: Lazy<ModelSchema> = Lazy::new(|| {
            ModelSchema::new(
                "Task",
                vec![
                    FieldDecl::new("description", DeclaredType::string()),
                    FieldDecl::new("due", DeclaredType::datetime()),
                    FieldDecl::new("done", DeclaredType::boolean()),
                ],
            )
        });
        &SCHEMA
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TodoState {
    todos: Vec<Task>,
}

impl Model for TodoState {
    fn schema() -> &'static ModelSchema {
        static SCHEMA: Lazy<ModelSchema> = Lazy::new(|| {
            ModelSchema::new(
                "TodoState",
                vec![FieldDecl::new("todos", DeclaredType::list_of::<Task>())],
            )
        });
        &SCHEMA
    }
}

impl StateModel for TodoState {}

struct AddTask {
    due: DateTime<Utc>,
}

#[async_trait]
impl UnitOfWork<TodoState> for AddTask {
    fn name(&self) -> &str {
        "add-task"
    }

    async fn run(
        &self,
        input: String,
        state: &mut WorkingState<TodoState>,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let task = Task {
            description: input,
            due: self.due,
            done: false,
        };
        let reply = format!("Added '{}' due {}", task.description, task.due);
        state.value_mut().todos.push(task);
        Ok(reply)
    }
}

struct CompleteTask {
    index: usize,
}

#[async_trait]
impl UnitOfWork<TodoState> for CompleteTask {
    fn name(&self) -> &str {
        "complete-task"
    }

    async fn run(
        &self,
        _input: String,
        state: &mut WorkingState<TodoState>,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let index = self.index;
        let description = state
            .value()
            .todos
            .get(index)
            .map(|t| t.description.clone())
            .ok_or_else(|| format!("no task at index {}", index))?;

        state.stage(move |s| s.todos[index].done = true);
        Ok(format!("Completed '{}'", description))
    }
}

fn print_todos(state: &TodoState) {
    if state.todos.is_empty() {
        println!("No tasks.");
        return;
    }
    for (i, task) in state.todos.iter().enumerate() {
        let mark = if task.done { "x" } else { " " };
        println!("{:>3}. [{}] {} (due {})", i, mark, task.description, task.due);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::from_env()?,
    };
    log::info!("Using {:?} store", config.backend);

    let store = thread::open_store(&config)?;
    let app: Application<TodoState> = Application::new("ToDo App", store);

    match args.command {
        Commands::Create => {
            let thread = app.create_thread().await?;
            println!("{}", thread.id);
        }
        Commands::Show { thread } => {
            let state = app.load(&thread).await?;
            print_todos(&state);
        }
        Commands::Add {
            thread,
            description,
            due,
        } => {
            let work = AddTask {
                due: due.unwrap_or_else(|| Utc::now() + Duration::days(1)),
            };
            let reply = app
                .run(&RunContext::for_thread(thread), description, &work)
                .await?;
            println!("{}", reply);
        }
        Commands::Done { thread, index } => {
            let reply = app
                .run(&RunContext::for_thread(thread), String::new(), &CompleteTask { index })
                .await?;
            println!("{}", reply);
        }
    }

    Ok(())
}
